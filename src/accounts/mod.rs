//! Accounts module - user records, password hashing and reset tokens.
//!
//! - `store`: the user table (register, authenticate, password changes)
//! - `password`: salted PBKDF2-HMAC-SHA256 hashes in a self-describing string
//! - `reset`: signed, expiring password reset tokens (never persisted)

pub mod password;
pub mod reset;
mod store;

pub use reset::ResetTokens;
pub use store::{AccountError, User, UserStore};
