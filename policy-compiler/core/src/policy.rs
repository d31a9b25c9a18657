//! The resolved, kind-tagged policy model.
//!
//! These types mirror the policy resources' specs outside the API layer. The
//! kind set is closed, so dispatch is a plain enum rather than trait objects.

use crate::dataplane::Predicate;
use crate::routes::HttpRouteMatch;
use std::{fmt, time};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PolicyKind {
    RateLimit,
    Auth,
}

/// Identifies one policy object.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolicyRef {
    pub kind: PolicyKind,
    pub namespace: String,
    pub name: String,
}

/// Restricts a named entry to the route rules it selects.
///
/// An entry carrying selectors applies only to rules admitted by at least one
/// of them; an empty selector list admits nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteSelector {
    pub matches: Vec<HttpRouteMatch>,
    pub hostnames: Vec<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rate {
    pub limit: u32,
    pub window: time::Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedLimit {
    pub name: String,
    pub rates: Vec<Rate>,
    pub when: Vec<Predicate>,
    pub counters: Vec<String>,
    pub selectors: Option<Vec<RouteSelector>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RateLimitSpec {
    pub limits: Vec<NamedLimit>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedAuthRule {
    pub name: String,
    pub when: Vec<Predicate>,
    /// Request-context values forwarded to the auth service with each check.
    pub forward: Vec<String>,
    pub selectors: Option<Vec<RouteSelector>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthSpec {
    pub rules: Vec<NamedAuthRule>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicySpec {
    RateLimit(RateLimitSpec),
    Auth(AuthSpec),
}

/// The single policy attributed to a route rule after inheritance.
///
/// Never persisted; recomputed from scratch on every compilation pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectivePolicy {
    pub source: PolicyRef,
    pub spec: PolicySpec,
}

// === impl PolicyKind ===

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimit => "RateLimitPolicy".fmt(f),
            Self::Auth => "AuthPolicy".fmt(f),
        }
    }
}

// === impl PolicyRef ===

impl fmt::Display for PolicyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// === impl PolicySpec ===

impl PolicySpec {
    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::RateLimit(_) => PolicyKind::RateLimit,
            Self::Auth(_) => PolicyKind::Auth,
        }
    }
}
