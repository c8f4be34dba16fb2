//! Worker tier: queue consumption and command dispatch

pub mod dispatch;
pub mod processor;

pub use dispatch::{dispatch, CommandKind};
pub use processor::{Worker, WorkerConfig};
