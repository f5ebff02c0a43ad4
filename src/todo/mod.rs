//! Todo module - dated tasks owned by a single user.
//!
//! Every lookup by task id goes through an ownership check before the task is
//! shown or changed; only `add` skips it since the owner is the caller.

mod store;

pub use store::{Task, TaskError, TaskOrder, TaskStore, TaskUpdate};
