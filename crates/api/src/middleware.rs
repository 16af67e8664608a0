//! Actor extraction.
//!
//! Authentication happens in the gateway in front of this service, which
//! forwards the authenticated staff member as headers:
//!
//! - `x-actor-id`: UUID of the staff member
//! - `x-actor-name`: display name recorded on audit entries
//! - `x-actor-permissions`: comma-separated permission flags (may be empty)
//! - `x-forwarded-for`: client address; the first entry is recorded as origin

use std::net::IpAddr;

use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use thiserror::Error;

use shopledger_auth::{Actor, Permission};
use shopledger_core::UserId;

use crate::app::errors;
use crate::context::ActorContext;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_NAME_HEADER: &str = "x-actor-name";
pub const ACTOR_PERMISSIONS_HEADER: &str = "x-actor-permissions";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActorHeaderError {
    #[error("missing {0} header")]
    Missing(&'static str),
    #[error("invalid {0} header")]
    Invalid(&'static str),
}

pub async fn actor_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let actor = actor_from_headers(req.headers()).map_err(|e| {
        errors::json_error(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", e.to_string())
    })?;
    let origin = origin_from_headers(req.headers());

    req.extensions_mut().insert(ActorContext::new(actor, origin));
    Ok(next.run(req).await)
}

pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ActorHeaderError> {
    let id: UserId = header_str(headers, ACTOR_ID_HEADER)?
        .ok_or(ActorHeaderError::Missing(ACTOR_ID_HEADER))?
        .parse()
        .map_err(|_| ActorHeaderError::Invalid(ACTOR_ID_HEADER))?;

    let name = header_str(headers, ACTOR_NAME_HEADER)?
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(ActorHeaderError::Missing(ACTOR_NAME_HEADER))?;

    let permissions = header_str(headers, ACTOR_PERMISSIONS_HEADER)?
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| Permission::new(p.to_string()))
        .collect();

    Ok(Actor::new(id, name, permissions))
}

/// First `x-forwarded-for` entry, if it parses as an address.
pub fn origin_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(FORWARDED_FOR_HEADER)?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

fn header_str<'a>(
    headers: &'a HeaderMap,
    name: &'static str,
) -> Result<Option<&'a str>, ActorHeaderError> {
    headers
        .get(name)
        .map(|v| v.to_str().map_err(|_| ActorHeaderError::Invalid(name)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn actor_is_read_from_gateway_headers() {
        let id = UserId::new();
        let map = headers(&[
            (ACTOR_ID_HEADER, &id.to_string()),
            (ACTOR_NAME_HEADER, " Amina "),
            (ACTOR_PERMISSIONS_HEADER, "sales.post, inventory.restock,,"),
        ]);

        let actor = actor_from_headers(&map).unwrap();
        assert_eq!(actor.id, id);
        assert_eq!(actor.name, "Amina");
        assert!(actor.has(&Permission::SELL));
        assert!(actor.has(&Permission::RESTOCK));
        assert!(!actor.has(&Permission::RECONCILE));
    }

    #[test]
    fn missing_or_malformed_identity_is_rejected() {
        let id = UserId::new().to_string();
        assert_eq!(
            actor_from_headers(&headers(&[(ACTOR_NAME_HEADER, "x")])),
            Err(ActorHeaderError::Missing(ACTOR_ID_HEADER))
        );
        assert_eq!(
            actor_from_headers(&headers(&[(ACTOR_ID_HEADER, "nope"), (ACTOR_NAME_HEADER, "x")])),
            Err(ActorHeaderError::Invalid(ACTOR_ID_HEADER))
        );
        assert_eq!(
            actor_from_headers(&headers(&[(ACTOR_ID_HEADER, &id), (ACTOR_NAME_HEADER, "  ")])),
            Err(ActorHeaderError::Missing(ACTOR_NAME_HEADER))
        );
    }

    #[test]
    fn origin_is_first_forwarded_address() {
        let map = headers(&[(FORWARDED_FOR_HEADER, "203.0.113.9, 10.0.0.1")]);
        assert_eq!(origin_from_headers(&map), Some("203.0.113.9".parse().unwrap()));
        assert_eq!(origin_from_headers(&headers(&[(FORWARDED_FOR_HEADER, "unknown")])), None);
        assert_eq!(origin_from_headers(&HeaderMap::new()), None);
    }
}
