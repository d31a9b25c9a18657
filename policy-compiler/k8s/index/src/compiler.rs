//! Turns resolved policies into the per-gateway action-set document.
//!
//! Each (rule match, hostname) pair that carries at least one action becomes
//! one action set; the whole list is ordered by the specificity sort so the
//! data plane evaluates the most specific match first.

use crate::cluster_info::ClusterInfo;
use crate::resolver::{self, Resolved};
use crate::snapshot::{ObjectRef, Snapshot};
use crate::topology::{self, Attachments, GatewayNode, ListenerNode, RouteNode, RuleNode};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use gateway_policy_compiler_core::dataplane::{
    Action, ActionSet, Config, DataItem, Operator, Predicate, RouteRuleConditions,
    AUTH_SERVICE_NAME, RATELIMIT_SERVICE_NAME,
};
use gateway_policy_compiler_core::policy::{
    EffectivePolicy, PolicyKind, PolicyRef, PolicySpec, RouteSelector,
};
use gateway_policy_compiler_core::routes::{
    HeaderMatch, HttpRouteMatch, PathMatch, QueryParamMatch,
};
use gateway_policy_compiler_core::specificity::{sort_candidates, MatchCandidate};
use std::collections::BTreeSet;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("gateway {0} not found in snapshot")]
    GatewayNotFound(ObjectRef),

    #[error("gateway {gateway} references unknown gateway class {class}")]
    UnknownGatewayClass { gateway: ObjectRef, class: String },

    #[error("gateway {gateway} has a listener with no name; rule identities cannot be derived")]
    UnnamedListener { gateway: ObjectRef },
}

/// Per-policy acceptance/enforcement outcome of a pass, for the status
/// collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyReport {
    pub policy: PolicyRef,
    pub condition: PolicyCondition,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyCondition {
    /// The policy contributed at least one action somewhere.
    Enforced,
    /// The target ref resolved to nothing; the policy is inert.
    MissingTarget,
    /// Accepted, but beaten everywhere by another policy.
    Overridden { by: PolicyRef },
    /// Accepted, but an older policy already holds the targeted node.
    ConflictingAttachment { winner: PolicyRef },
    /// Accepted, but the target has no reachable route rules.
    NoReachableRules,
    /// Accepted and effective somewhere, but every entry's route selectors
    /// matched nothing.
    SelectorsMatchNothing,
}

/// The result of compiling every managed gateway in a snapshot.
#[derive(Debug, Default)]
pub struct Compilation {
    pub configs: HashMap<ObjectRef, Config>,
    pub reports: Vec<PolicyReport>,
}

pub struct CompiledGateway {
    pub config: Config,
    pub reports: Vec<PolicyReport>,
}

/// Compiles every gateway whose class is known. A gateway that fails with an
/// invariant violation is skipped (its previous document stands); the rest of
/// the snapshot still compiles.
pub fn compile(snapshot: &Snapshot, cluster: &ClusterInfo) -> Compilation {
    let attachments = topology::attach_policies(snapshot);
    let mut tracker = EnforcementTracker::default();
    tracker.seed_attachments(&attachments);

    let mut configs = HashMap::default();
    let mut gateway_ids: Vec<&ObjectRef> = snapshot.gateways.keys().collect();
    gateway_ids.sort();

    for id in gateway_ids {
        match topology::gateway_topology(snapshot, id, &attachments) {
            Ok(gateway) => {
                configs.insert(id.clone(), compile_topology(cluster, &gateway, &mut tracker));
            }
            Err(error @ CompileError::UnknownGatewayClass { .. }) => {
                tracing::debug!(%error, "skipping unmanaged gateway");
            }
            Err(error) => {
                tracing::error!(%error, gateway = %id, "failed to compile gateway");
            }
        }
    }

    Compilation {
        configs,
        reports: tracker.into_reports(&attachments),
    }
}

/// Compiles a single gateway. Reports cover the policies attached within this
/// gateway's closure plus snapshot-wide rejections (missing targets,
/// conflicting attachments).
pub fn compile_gateway(
    snapshot: &Snapshot,
    id: &ObjectRef,
    cluster: &ClusterInfo,
) -> Result<CompiledGateway, CompileError> {
    let attachments = topology::attach_policies(snapshot);
    let gateway = topology::gateway_topology(snapshot, id, &attachments)?;

    let mut tracker = EnforcementTracker::default();
    tracker.seed_topology(&gateway);
    let config = compile_topology(cluster, &gateway, &mut tracker);

    Ok(CompiledGateway {
        config,
        reports: tracker.into_reports(&attachments),
    })
}

fn compile_topology(
    cluster: &ClusterInfo,
    gateway: &GatewayNode,
    tracker: &mut EnforcementTracker,
) -> Config {
    let mut candidates: Vec<MatchCandidate<ActionSet>> = Vec::new();

    for listener in &gateway.listeners {
        for route in &listener.routes {
            let auth = resolver::resolve(gateway, listener, route, PolicyKind::Auth);
            let ratelimit = resolver::resolve(gateway, listener, route, PolicyKind::RateLimit);
            for resolution in [&auth, &ratelimit].into_iter().flatten() {
                tracker.record_shadowed(resolution);
            }

            for rule in &route.rules {
                let mut actions = Vec::new();
                // Auth checks run before rate-limit counters are spent.
                if let Some(Resolved { effective, .. }) = &auth {
                    actions.extend(auth_actions(route, rule, effective, tracker));
                }
                if let Some(Resolved { effective, .. }) = &ratelimit {
                    actions.extend(ratelimit_actions(route, rule, effective, tracker));
                }
                if actions.is_empty() {
                    // Free route: nothing applies to this rule.
                    continue;
                }

                for (match_index, route_match) in rule.matches.iter().enumerate() {
                    for hostname in &route.hostnames {
                        candidates.push(MatchCandidate {
                            hostname: hostname.clone(),
                            route_match: route_match.clone(),
                            creation_timestamp: route.creation_timestamp,
                            namespace: route.id.namespace.clone(),
                            name: route.id.name.clone(),
                            payload: ActionSet {
                                name: action_set_name(
                                    gateway,
                                    listener,
                                    route,
                                    rule.index,
                                    match_index,
                                    hostname,
                                ),
                                route_rule_conditions: RouteRuleConditions {
                                    hostnames: vec![hostname.clone()],
                                    matches: predicates_for(route_match),
                                },
                                actions: actions.clone(),
                            },
                        });
                    }
                }
            }
        }
    }

    sort_candidates(&mut candidates);

    let referenced: BTreeSet<&str> = candidates
        .iter()
        .flat_map(|c| c.payload.actions.iter())
        .map(|action| action.service_name.as_str())
        .collect();
    let services = cluster
        .services()
        .into_iter()
        .filter(|(name, _)| referenced.contains(name.as_str()))
        .collect();

    Config {
        services,
        action_sets: candidates.into_iter().map(|c| c.payload).collect(),
    }
}

/// Names are derived from the full routing path plus the hostname, so they
/// are stable across passes and unique across hostnames, matches, and
/// attachment paths.
fn action_set_name(
    gateway: &GatewayNode,
    listener: &ListenerNode,
    route: &RouteNode,
    rule_index: usize,
    match_index: usize,
    hostname: &str,
) -> String {
    format!(
        "{}#{}#{}#{}#rule-{}-{}#{}",
        gateway.gateway_class, gateway.id, listener.name, route.id, rule_index, match_index, hostname
    )
}

fn ratelimit_actions(
    route: &RouteNode,
    rule: &RuleNode,
    effective: &EffectivePolicy,
    tracker: &mut EnforcementTracker,
) -> Vec<Action> {
    let PolicySpec::RateLimit(spec) = &effective.spec else {
        return Vec::new();
    };

    let mut actions = Vec::new();
    for limit in &spec.limits {
        if !admits(limit.selectors.as_deref(), rule, &route.hostnames) {
            continue;
        }
        let mut data = vec![DataItem::Static {
            key: format!("limit.{}__{}", limit.name, effective.source),
            value: "1".to_string(),
        }];
        data.extend(limit.counters.iter().map(|path| DataItem::Selector {
            path: path.clone(),
        }));
        actions.push(Action {
            service_name: RATELIMIT_SERVICE_NAME.to_string(),
            // Scoped by the route's identity, not the policy's, so swapping
            // policies on a route reuses its counters.
            scope: route.id.to_string(),
            conditions: limit.when.clone(),
            data,
        });
    }
    tracker.record_contribution(&effective.source, !actions.is_empty());
    actions
}

fn auth_actions(
    route: &RouteNode,
    rule: &RuleNode,
    effective: &EffectivePolicy,
    tracker: &mut EnforcementTracker,
) -> Vec<Action> {
    let PolicySpec::Auth(spec) = &effective.spec else {
        return Vec::new();
    };

    let mut actions = Vec::new();
    for auth_rule in &spec.rules {
        if !admits(auth_rule.selectors.as_deref(), rule, &route.hostnames) {
            continue;
        }
        let mut data = vec![DataItem::Static {
            key: format!("auth.{}__{}", auth_rule.name, effective.source),
            value: "1".to_string(),
        }];
        data.extend(auth_rule.forward.iter().map(|path| DataItem::Selector {
            path: path.clone(),
        }));
        actions.push(Action {
            service_name: AUTH_SERVICE_NAME.to_string(),
            scope: route.id.to_string(),
            conditions: auth_rule.when.clone(),
            data,
        });
    }
    tracker.record_contribution(&effective.source, !actions.is_empty());
    actions
}

/// No selectors admits everything; an entry with selectors applies if any of
/// them admits the rule.
fn admits(selectors: Option<&[RouteSelector]>, rule: &RuleNode, hostnames: &[String]) -> bool {
    let Some(selectors) = selectors else {
        return true;
    };
    selectors
        .iter()
        .any(|selector| selector_admits(selector, rule, hostnames))
}

fn selector_admits(selector: &RouteSelector, rule: &RuleNode, hostnames: &[String]) -> bool {
    if !selector.hostnames.is_empty()
        && !selector
            .hostnames
            .iter()
            .any(|hostname| hostnames.contains(hostname))
    {
        return false;
    }
    if selector.matches.is_empty() {
        return true;
    }
    selector
        .matches
        .iter()
        .any(|sm| rule.matches.iter().any(|rm| match_subsumes(rm, sm)))
}

/// Whether rule match `rm` pins everything selector match `sm` requires.
fn match_subsumes(rm: &HttpRouteMatch, sm: &HttpRouteMatch) -> bool {
    if let Some(path) = &sm.path {
        if rm.path.as_ref() != Some(path) {
            return false;
        }
    }
    if let Some(method) = &sm.method {
        if rm.method.as_ref() != Some(method) {
            return false;
        }
    }
    sm.headers.iter().all(|header| rm.headers.contains(header))
        && sm
            .query_params
            .iter()
            .all(|query| rm.query_params.contains(query))
}

fn predicates_for(route_match: &HttpRouteMatch) -> Vec<Predicate> {
    let mut predicates = Vec::new();

    if let Some(method) = &route_match.method {
        predicates.push(Predicate {
            selector: "request.method".to_string(),
            operator: Operator::Equal,
            value: method.as_str().to_string(),
        });
    }

    if let Some(path) = &route_match.path {
        let (operator, value) = match path {
            PathMatch::Exact(value) => (Operator::Equal, value.clone()),
            PathMatch::Prefix(value) => (Operator::StartsWith, value.clone()),
            PathMatch::Regex(regex) => (Operator::Matches, regex.as_str().to_string()),
        };
        predicates.push(Predicate {
            selector: "request.url_path".to_string(),
            operator,
            value,
        });
    }

    for header in &route_match.headers {
        predicates.push(match header {
            HeaderMatch::Exact(name, value) => Predicate {
                selector: format!("request.headers.{name}"),
                operator: Operator::Equal,
                value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            },
            HeaderMatch::Regex(name, regex) => Predicate {
                selector: format!("request.headers.{name}"),
                operator: Operator::Matches,
                value: regex.as_str().to_string(),
            },
        });
    }

    for query in &route_match.query_params {
        predicates.push(match query {
            QueryParamMatch::Exact(name, value) => Predicate {
                selector: format!("request.query_params.{name}"),
                operator: Operator::Equal,
                value: value.clone(),
            },
            QueryParamMatch::Regex(name, regex) => Predicate {
                selector: format!("request.query_params.{name}"),
                operator: Operator::Matches,
                value: regex.as_str().to_string(),
            },
        });
    }

    predicates
}

/// Accumulates what happened to each attached policy across a pass.
#[derive(Debug, Default)]
struct EnforcementTracker {
    attached: HashSet<PolicyRef>,
    enforced: HashSet<PolicyRef>,
    shadowed: HashMap<PolicyRef, PolicyRef>,
    effective_unused: HashSet<PolicyRef>,
}

impl EnforcementTracker {
    fn seed_attachments(&mut self, attachments: &Attachments) {
        let nodes = attachments
            .gateways
            .values()
            .chain(attachments.listeners.values())
            .chain(attachments.routes.values());
        for node in nodes {
            for policy in [&node.ratelimit, &node.auth].into_iter().flatten() {
                self.attached.insert(policy.source.clone());
            }
        }
    }

    fn seed_topology(&mut self, gateway: &GatewayNode) {
        let mut nodes = vec![&gateway.policies];
        for listener in &gateway.listeners {
            nodes.push(&listener.policies);
            nodes.extend(listener.routes.iter().map(|route| &route.policies));
        }
        for node in nodes {
            for policy in [&node.ratelimit, &node.auth].into_iter().flatten() {
                self.attached.insert(policy.source.clone());
            }
        }
    }

    fn record_shadowed(&mut self, resolution: &Resolved) {
        for (loser, winner) in &resolution.shadowed {
            self.shadowed
                .entry(loser.clone())
                .or_insert_with(|| winner.clone());
        }
    }

    fn record_contribution(&mut self, policy: &PolicyRef, contributed: bool) {
        if contributed {
            self.enforced.insert(policy.clone());
        } else {
            self.effective_unused.insert(policy.clone());
        }
    }

    fn into_reports(self, attachments: &Attachments) -> Vec<PolicyReport> {
        let mut reports = Vec::new();

        for policy in &attachments.missing {
            reports.push(PolicyReport {
                policy: policy.clone(),
                condition: PolicyCondition::MissingTarget,
            });
        }
        for (loser, winner) in &attachments.conflicted {
            reports.push(PolicyReport {
                policy: loser.clone(),
                condition: PolicyCondition::ConflictingAttachment {
                    winner: winner.clone(),
                },
            });
        }

        let mut attached: Vec<PolicyRef> = self.attached.into_iter().collect();
        attached.sort();
        for policy in attached {
            let condition = if self.enforced.contains(&policy) {
                PolicyCondition::Enforced
            } else if let Some(by) = self.shadowed.get(&policy) {
                PolicyCondition::Overridden { by: by.clone() }
            } else if self.effective_unused.contains(&policy) {
                PolicyCondition::SelectorsMatchNothing
            } else {
                PolicyCondition::NoReachableRules
            };
            reports.push(PolicyReport { policy, condition });
        }

        reports
    }
}
