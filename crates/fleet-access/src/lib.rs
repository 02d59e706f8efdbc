//! Access control for the command bot: allow-list, admin invites and pending approvals.
pub mod access_gate;
pub mod access_store;
pub mod directives;

pub use access_gate::*;
pub use access_store::*;
pub use directives::*;
