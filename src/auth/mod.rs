//! Authorization for Teller
//!
//! Role and channel gating for normalized commands. Authentication (the
//! webhook signature) lives in `interaction::verify`; this module only decides
//! whether an already-authenticated member may run a command here.

pub mod permissions;

pub use permissions::{DenyReason, Policy, PolicyTable};
