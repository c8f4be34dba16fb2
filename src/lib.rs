//! Teller - chat-platform command gateway and ledger worker
//!
//! Teller terminates slash-command webhooks from the chat platform, verifies
//! them, and hands the slow work to a queue-fed worker tier that drives an
//! append-only company ledger.
//!
//! ## Services
//!
//! - **Gateway** (`teller`): signature verification, command normalization,
//!   permission gating, deferred acknowledgement, queue hand-off
//! - **Worker** (`teller-worker`): queue consumer, command dispatch, ledger
//!   writes, deferred follow-up delivery

pub mod auth;
pub mod config;
pub mod followup;
pub mod handlers;
pub mod interaction;
pub mod ledger;
pub mod queue;
pub mod secrets;
pub mod server;
pub mod store;
pub mod types;
pub mod worker;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, TellerError};
