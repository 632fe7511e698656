//! Turn-taking pipeline: controller, deferred actions, per-call session host.

pub mod hooks;
pub mod messages;
pub mod session;
pub mod timer;
pub mod trace;
pub mod turn;
