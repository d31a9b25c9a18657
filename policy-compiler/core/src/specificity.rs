//! Deterministic ordering of route-rule matches within one gateway.
//!
//! The data plane evaluates action sets top to bottom, so the compiled order
//! must put the most specific match first and must be a strict total order:
//! shuffling the input may never change the output.

use crate::routes::{HttpRouteMatch, PathMatch};
use chrono::{offset::Utc, DateTime};
use std::cmp::Ordering;

/// One route-rule match bound to a single hostname, competing for evaluation
/// order. The payload travels with the candidate through the sort.
#[derive(Clone, Debug)]
pub struct MatchCandidate<T> {
    pub hostname: String,
    pub route_match: HttpRouteMatch,
    pub creation_timestamp: Option<DateTime<Utc>>,
    pub namespace: String,
    pub name: String,
    pub payload: T,
}

/// Orders candidates most-specific first.
pub fn sort_candidates<T>(candidates: &mut [MatchCandidate<T>]) {
    candidates.sort_by(compare);
}

/// `Less` means `a` is evaluated before `b`.
///
/// Keys, in sequence until a difference is found: hostname specificity, path
/// match type, path length, method presence, header-match count, query-match
/// count, creation timestamp, then `namespace/name` as the final tiebreak.
pub fn compare<T>(a: &MatchCandidate<T>, b: &MatchCandidate<T>) -> Ordering {
    hostname_precedence(&a.hostname, &b.hostname)
        .then_with(|| path_precedence(a.route_match.path.as_ref(), b.route_match.path.as_ref()))
        .then_with(|| {
            b.route_match
                .method
                .is_some()
                .cmp(&a.route_match.method.is_some())
        })
        .then_with(|| b.route_match.headers.len().cmp(&a.route_match.headers.len()))
        .then_with(|| {
            b.route_match
                .query_params
                .len()
                .cmp(&a.route_match.query_params.len())
        })
        .then_with(|| timestamp_precedence(a.creation_timestamp, b.creation_timestamp))
        .then_with(|| {
            (a.namespace.as_str(), a.name.as_str()).cmp(&(b.namespace.as_str(), b.name.as_str()))
        })
}

fn hostname_precedence(a: &str, b: &str) -> Ordering {
    let labels = |h: &str| h.split('.').count();
    labels(b)
        .cmp(&labels(a))
        .then_with(|| is_wildcard(a).cmp(&is_wildcard(b)))
        .then_with(|| a.cmp(b))
}

fn is_wildcard(hostname: &str) -> bool {
    hostname.starts_with('*')
}

fn path_precedence(a: Option<&PathMatch>, b: Option<&PathMatch>) -> Ordering {
    // Exact > RegularExpression > PathPrefix > no path at all.
    fn rank(path: Option<&PathMatch>) -> u8 {
        match path {
            Some(PathMatch::Exact(_)) => 0,
            Some(PathMatch::Regex(_)) => 1,
            Some(PathMatch::Prefix(_)) => 2,
            None => 3,
        }
    }
    fn len(path: Option<&PathMatch>) -> usize {
        path.map(|p| p.value().len()).unwrap_or(0)
    }

    rank(a).cmp(&rank(b)).then_with(|| len(b).cmp(&len(a)))
}

fn timestamp_precedence(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    // Earlier creation wins; a resource with no timestamp yet sorts last.
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
