use std::net::IpAddr;

use shopledger_auth::Actor;

/// The authenticated staff member behind a request, and where it came from.
///
/// Inserted by [`crate::middleware::actor_middleware`]; present on every
/// ledger route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor: Actor,
    origin: Option<IpAddr>,
}

impl ActorContext {
    pub fn new(actor: Actor, origin: Option<IpAddr>) -> Self {
        Self { actor, origin }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn origin(&self) -> Option<IpAddr> {
        self.origin
    }
}
