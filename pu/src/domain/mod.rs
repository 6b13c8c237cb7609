//! Domain types for price update runs

mod id;
mod request;
mod security;
mod status;
mod task;

pub use id::WorkerId;
pub use request::UpdateRequest;
pub use security::{EphemeralData, Security};
pub use status::{StatusSink, TaskStatus, UpdateStatus};
pub use task::{Task, TaskKind};
