//! Computes the single effective policy, per kind, for every route rule
//! reachable from a gateway.

use crate::topology::{GatewayNode, ListenerNode, RouteNode};
use gateway_policy_compiler_core::policy::{EffectivePolicy, PolicyKind, PolicyRef};

/// The outcome of resolving one policy kind for one route under one listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Resolved {
    pub effective: EffectivePolicy,

    /// Policies declared somewhere on the chain but beaten by the effective
    /// one, paired with the winner.
    pub shadowed: Vec<(PolicyRef, PolicyRef)>,
}

/// Precedence, highest to lowest: the nearest ancestor `overrides` (listener
/// section before whole gateway), the route's own declaration, the nearest
/// ancestor `defaults` (a bare ancestor spec counts as defaults). An ancestor
/// override always wins over anything the route declares. Returns `None` for
/// a free route.
pub(crate) fn resolve(
    gateway: &GatewayNode,
    listener: &ListenerNode,
    route: &RouteNode,
    kind: PolicyKind,
) -> Option<Resolved> {
    let rt = route.policies.get(kind);
    let ls = listener.policies.get(kind);
    let gw = gateway.policies.get(kind);

    if let (Some(ls), Some(gw)) = (ls, gw) {
        if ls.overrides.is_some() && gw.overrides.is_some() {
            tracing::debug!(
                nearer = %ls.source,
                farther = %gw.source,
                "both ancestor levels declare overrides; the nearer wins"
            );
        }
    }

    let (winner, spec) = ls
        .and_then(|p| p.overrides.as_ref().map(|s| (p, s)))
        .or_else(|| gw.and_then(|p| p.overrides.as_ref().map(|s| (p, s))))
        .or_else(|| rt.and_then(|p| p.authoritative().map(|s| (p, s))))
        .or_else(|| {
            ls.and_then(|p| p.defaults.as_ref().or(p.proper.as_ref()).map(|s| (p, s)))
        })
        .or_else(|| {
            gw.and_then(|p| p.defaults.as_ref().or(p.proper.as_ref()).map(|s| (p, s)))
        })?;

    let shadowed = [rt, ls, gw]
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty() && p.source != winner.source)
        .map(|p| (p.source.clone(), winner.source.clone()))
        .collect();

    Some(Resolved {
        effective: EffectivePolicy {
            source: winner.source.clone(),
            spec: spec.clone(),
        },
        shadowed,
    })
}
