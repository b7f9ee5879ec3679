mod admin;
mod auth;
mod health_check;
mod sessions;

pub use admin::list_active_users;
pub use auth::{change_password, get_current_user, login, logout, refresh, register};
pub use health_check::health_check;
pub use sessions::{list_sessions, logout_all, logout_session};
