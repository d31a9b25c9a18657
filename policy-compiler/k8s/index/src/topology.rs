//! Links policy objects to the routing nodes they target and builds, per
//! gateway, the closure of reachable listeners, routes, and rules.
//!
//! Attachment is direct only; inheritance across levels is the resolver's
//! job. A route attached to several gateways (or listeners) appears once per
//! attachment path, which is why rule identity is derived from the full
//! parent chain rather than the route's own name.

use crate::compiler::CompileError;
use crate::policy::DeclaredPolicy;
use crate::routes;
use crate::snapshot::{ObjectRef, Snapshot};
use ahash::AHashMap as HashMap;
use chrono::{offset::Utc, DateTime};
use gateway_policy_compiler_core::policy::{PolicyKind, PolicyRef};
use gateway_policy_compiler_core::routes::HttpRouteMatch;
use gateway_policy_compiler_k8s_api::{self as api, httproute::parent_ref_targets_kind, Time};

/// Direct policy attachments for one routing node; at most one per kind.
#[derive(Clone, Debug, Default)]
pub(crate) struct NodePolicies {
    pub ratelimit: Option<DeclaredPolicy>,
    pub auth: Option<DeclaredPolicy>,
}

/// Where each policy object landed, plus the objects that failed to land.
#[derive(Debug, Default)]
pub(crate) struct Attachments {
    pub gateways: HashMap<ObjectRef, NodePolicies>,
    pub listeners: HashMap<(ObjectRef, String), NodePolicies>,
    pub routes: HashMap<ObjectRef, NodePolicies>,

    /// Policies whose target ref resolved to nothing.
    pub missing: Vec<PolicyRef>,

    /// Policies rejected because an older object already held their node,
    /// with the object that kept it.
    pub conflicted: Vec<(PolicyRef, PolicyRef)>,
}

pub(crate) struct GatewayNode {
    pub gateway_class: String,
    pub id: ObjectRef,
    pub policies: NodePolicies,
    pub listeners: Vec<ListenerNode>,
}

pub(crate) struct ListenerNode {
    pub name: String,
    pub hostname: Option<String>,
    pub policies: NodePolicies,
    pub routes: Vec<RouteNode>,
}

pub(crate) struct RouteNode {
    pub id: ObjectRef,
    /// Already narrowed to hostnames the listener can serve.
    pub hostnames: Vec<String>,
    pub creation_timestamp: Option<DateTime<Utc>>,
    pub policies: NodePolicies,
    pub rules: Vec<RuleNode>,
}

#[derive(Clone)]
pub(crate) struct RuleNode {
    pub index: usize,
    pub matches: Vec<HttpRouteMatch>,
}

// === impl NodePolicies ===

impl NodePolicies {
    pub fn get(&self, kind: PolicyKind) -> Option<&DeclaredPolicy> {
        match kind {
            PolicyKind::RateLimit => self.ratelimit.as_ref(),
            PolicyKind::Auth => self.auth.as_ref(),
        }
    }

    /// Installs `policy`, keeping the older object when two of one kind
    /// target the same node. Returns the rejected (loser, winner) pair on
    /// conflict.
    fn attach(&mut self, policy: DeclaredPolicy) -> Option<(PolicyRef, PolicyRef)> {
        let slot = match policy.source.kind {
            PolicyKind::RateLimit => &mut self.ratelimit,
            PolicyKind::Auth => &mut self.auth,
        };
        match slot {
            None => {
                *slot = Some(policy);
                None
            }
            Some(current) if older(&policy, current) => {
                let conflict = (current.source.clone(), policy.source.clone());
                *slot = Some(policy);
                Some(conflict)
            }
            Some(current) => Some((policy.source.clone(), current.source.clone())),
        }
    }
}

/// Oldest creation timestamp wins; a missing timestamp sorts newest; ties
/// break on namespace/name.
fn older(a: &DeclaredPolicy, b: &DeclaredPolicy) -> bool {
    let key = |p: &DeclaredPolicy| {
        (
            p.creation_timestamp.is_none(),
            p.creation_timestamp,
            p.source.namespace.clone(),
            p.source.name.clone(),
        )
    };
    key(a) < key(b)
}

/// Resolves every policy object's target ref against the snapshot.
pub(crate) fn attach_policies(snapshot: &Snapshot) -> Attachments {
    let mut attachments = Attachments::default();

    let mut declared: Vec<DeclaredPolicy> = snapshot
        .ratelimit_policies
        .values()
        .map(DeclaredPolicy::from_ratelimit)
        .chain(snapshot.auth_policies.values().map(DeclaredPolicy::from_auth))
        .collect();
    // Attachment order must not depend on map iteration; conflicts resolve by
    // age, not arrival.
    declared.sort_by(|a, b| a.source.cmp(&b.source));

    for policy in declared {
        attachments.attach(snapshot, policy);
    }
    attachments
}

// === impl Attachments ===

impl Attachments {
    fn attach(&mut self, snapshot: &Snapshot, policy: DeclaredPolicy) {
        let target = policy.target_ref.clone();
        let local_ns = policy.source.namespace.clone();

        let node = if target.targets_kind::<api::Gateway>() {
            let id = ObjectRef {
                namespace: target.namespace.clone().unwrap_or_else(|| local_ns.clone()),
                name: target.name.clone(),
            };
            match snapshot.gateways.get(&id) {
                None => {
                    self.missing.push(policy.source.clone());
                    return;
                }
                Some(gateway) => match target.section_name {
                    Some(section) => {
                        if !gateway.spec.listeners.iter().any(|l| l.name == section) {
                            self.missing.push(policy.source.clone());
                            return;
                        }
                        self.listeners.entry((id, section)).or_default()
                    }
                    None => self.gateways.entry(id).or_default(),
                },
            }
        } else if target.targets_kind::<api::HttpRoute>() {
            let id = ObjectRef {
                namespace: target.namespace.clone().unwrap_or(local_ns),
                name: target.name.clone(),
            };
            if !snapshot.routes.contains_key(&id) {
                self.missing.push(policy.source.clone());
                return;
            }
            self.routes.entry(id).or_default()
        } else {
            tracing::warn!(
                policy = %policy.source,
                kind = %target.canonical_kind(),
                "unsupported target kind"
            );
            self.missing.push(policy.source.clone());
            return;
        };

        if let Some((loser, winner)) = node.attach(policy) {
            tracing::debug!(%loser, %winner, "conflicting policies target one node; the older wins");
            self.conflicted.push((loser, winner));
        }
    }
}

/// Builds the closure of routing nodes reachable from one gateway.
pub(crate) fn gateway_topology(
    snapshot: &Snapshot,
    id: &ObjectRef,
    attachments: &Attachments,
) -> Result<GatewayNode, CompileError> {
    let gateway = snapshot
        .gateways
        .get(id)
        .ok_or_else(|| CompileError::GatewayNotFound(id.clone()))?;

    let class = &gateway.spec.gateway_class_name;
    if !snapshot.gateway_classes.contains_key(class) {
        return Err(CompileError::UnknownGatewayClass {
            gateway: id.clone(),
            class: class.clone(),
        });
    }

    let mut listeners = Vec::with_capacity(gateway.spec.listeners.len());
    for listener in &gateway.spec.listeners {
        if listener.name.is_empty() {
            return Err(CompileError::UnnamedListener {
                gateway: id.clone(),
            });
        }
        listeners.push(ListenerNode {
            name: listener.name.clone(),
            hostname: listener.hostname.clone(),
            policies: attachments
                .listeners
                .get(&(id.clone(), listener.name.clone()))
                .cloned()
                .unwrap_or_default(),
            routes: Vec::new(),
        });
    }

    // Routes in namespace/name order so stable sorting downstream sees a
    // deterministic insertion order.
    let mut route_ids: Vec<&ObjectRef> = snapshot.routes.keys().collect();
    route_ids.sort();

    for route_id in route_ids {
        let route = &snapshot.routes[route_id];

        let mut attached: Vec<String> = Vec::new();
        for parent_ref in route.spec.parent_refs.iter().flatten() {
            if !parent_ref_targets_kind::<api::Gateway>(parent_ref) {
                continue;
            }
            let parent_ns = parent_ref
                .namespace
                .as_deref()
                .unwrap_or(&route_id.namespace);
            if parent_ns != id.namespace || parent_ref.name != id.name {
                continue;
            }
            match &parent_ref.section_name {
                Some(section) => {
                    if listeners.iter().any(|l| l.name == *section) {
                        attached.push(section.clone());
                    } else {
                        tracing::debug!(
                            route = %route_id,
                            section,
                            "parent ref names an unknown listener"
                        );
                    }
                }
                None => attached.extend(listeners.iter().map(|l| l.name.clone())),
            }
        }
        attached.sort();
        attached.dedup();
        if attached.is_empty() {
            continue;
        }

        let Some(converted) = convert_route(route_id, route) else {
            continue;
        };
        let policies = attachments
            .routes
            .get(route_id)
            .cloned()
            .unwrap_or_default();

        for listener in listeners
            .iter_mut()
            .filter(|l| attached.contains(&l.name))
        {
            let hostnames = routes::hostnames_for(&converted.hostnames, listener.hostname.as_deref());
            if hostnames.is_empty() {
                continue;
            }
            listener.routes.push(RouteNode {
                id: route_id.clone(),
                hostnames,
                creation_timestamp: converted.creation_timestamp,
                policies: policies.clone(),
                rules: converted.rules.clone(),
            });
        }
    }

    Ok(GatewayNode {
        gateway_class: class.clone(),
        id: id.clone(),
        policies: attachments.gateways.get(id).cloned().unwrap_or_default(),
        listeners,
    })
}

struct ConvertedRoute {
    hostnames: Vec<String>,
    creation_timestamp: Option<DateTime<Utc>>,
    rules: Vec<RuleNode>,
}

/// A route that fails conversion contributes nothing; the rest of the
/// gateway still compiles.
fn convert_route(id: &ObjectRef, route: &api::HttpRoute) -> Option<ConvertedRoute> {
    let rules = route
        .spec
        .rules
        .iter()
        .flatten()
        .enumerate()
        .map(|(index, rule)| {
            let matches = rule
                .matches
                .clone()
                .into_iter()
                .flatten()
                .map(routes::try_match)
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok(RuleNode {
                index,
                // A rule with no matches applies to every request.
                matches: if matches.is_empty() {
                    vec![HttpRouteMatch::any()]
                } else {
                    matches
                },
            })
        })
        .collect::<anyhow::Result<Vec<_>>>();

    match rules {
        Ok(rules) => Some(ConvertedRoute {
            hostnames: route.spec.hostnames.clone().unwrap_or_default(),
            creation_timestamp: route.metadata.creation_timestamp.clone().map(|Time(t)| t),
            rules,
        }),
        Err(error) => {
            tracing::warn!(%error, route = %id, "failed to convert route");
            None
        }
    }
}
