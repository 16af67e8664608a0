use thiserror::Error;

use crate::{Actor, Permission};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: {actor} lacks permission '{permission}'")]
    Forbidden { actor: String, permission: String },
}

/// Check that `actor` holds `required` (or the wildcard).
///
/// Pure policy check: no IO, no panics.
pub fn authorize(actor: &Actor, required: &Permission) -> Result<(), AuthzError> {
    if actor.has(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            actor: actor.name.clone(),
            permission: required.as_str().to_string(),
        })
    }
}
