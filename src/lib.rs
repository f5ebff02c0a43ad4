//! # To-Do List
//!
//! A small multi-user to-do list web application.
//!
//! Users register, sign in, keep a list of dated tasks, tick them off, and
//! recover a forgotten password through an emailed, time-limited link.
//!
//! ## Request Flow
//!
//! ```text
//!   browser ──► axum Router ──► Session (cookie) ──► handler
//!                                                   │
//!                              ┌────────────────────┼──────────────┐
//!                              ▼                    ▼              ▼
//!                         UserStore            TaskStore        Mailer
//!                              └──────── SQLite ────┘
//! ```
//!
//! ## Modules
//! - `accounts`: credential store, password hashing, reset tokens
//! - `todo`: task store and ownership checks
//! - `api`: routes, sessions and flash messages, forms, pages
//! - `notify`: outgoing email contract
//! - `db`: shared SQLite connection and schema
//! - `config`: environment configuration

pub mod accounts;
pub mod api;
pub mod config;
pub mod db;
pub mod notify;
pub mod todo;

pub use config::Config;
