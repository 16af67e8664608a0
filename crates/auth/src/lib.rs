//! `shopledger-auth`: actor identity and permission checks.
//!
//! Authentication happens upstream; this crate only models the already
//! authenticated staff member and the flags it was granted.

pub mod actor;
pub mod authorize;
pub mod permissions;

pub use actor::Actor;
pub use authorize::{authorize, AuthzError};
pub use permissions::Permission;
