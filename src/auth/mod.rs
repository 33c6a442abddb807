/// Authentication module
///
/// Credential hashing, access-token codec, refresh-token rotation,
/// session orchestration and the request-time access guard.

mod claims;
mod clock;
mod guard;
mod jwt;
mod password;
mod refresh_token;
mod session;

pub use claims::Claims;
pub use clock::{Clock, ManualClock, SystemClock};
pub use guard::{AccessGuard, AuthenticatedIdentity};
pub use jwt::TokenCodec;
pub use password::{hash_password, validate_password_strength, verify_password, CredentialHasher};
pub use refresh_token::{
    generate_refresh_token, hash_token, RefreshTokenStore, RotatedRefreshToken,
    REFRESH_TOKEN_LENGTH,
};
pub use session::{LoginOutcome, NewIdentity, SessionManager, TokenPair};
