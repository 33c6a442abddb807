mod auth;
mod health_check;
mod users;

pub use auth::{login, logout, refresh, register, UserResponse};
pub use health_check::health_check;
pub use users::{get_current_user, get_user};
