//! HTTP layer: routing, sessions, forms, and server-rendered pages.

mod auth;
mod error;
mod forms;
mod routes;
pub mod session;
mod tasks;
mod views;


pub use auth::CurrentUser;
pub use error::AppError;
pub use routes::{router, serve, AppState};
