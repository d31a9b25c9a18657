mod resolver;

use crate::{ClusterInfo, Index, ObjectRef, PolicyCondition, PolicyReport, SharedIndex, Snapshot};
use chrono::TimeZone;
use gateway_policy_compiler_k8s_api::{self as k8s, ResourceExt};
use kubert::index::{IndexClusterResource, IndexNamespacedResource};
use std::sync::Arc;

const CLASS: &str = "external";

struct TestConfig {
    index: SharedIndex,
    _tracing: tracing::subscriber::DefaultGuard,
}

impl Default for TestConfig {
    fn default() -> Self {
        let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
        let _tracing = tracing::subscriber::set_default(subscriber);
        let index = Index::shared(Arc::new(ClusterInfo::default()));
        <Index as IndexClusterResource<k8s::GatewayClass>>::apply(
            &mut index.write(),
            mk_gateway_class(CLASS),
        );
        Self { index, _tracing }
    }
}

fn mk_snapshot(
    gateways: impl IntoIterator<Item = k8s::Gateway>,
    routes: impl IntoIterator<Item = k8s::HttpRoute>,
    ratelimits: impl IntoIterator<Item = k8s::policy::RateLimitPolicy>,
    auths: impl IntoIterator<Item = k8s::policy::AuthPolicy>,
) -> Snapshot {
    let mut snapshot = Snapshot::default();
    snapshot
        .gateway_classes
        .insert(CLASS.to_string(), mk_gateway_class(CLASS));
    for gateway in gateways {
        snapshot.gateways.insert(oref(&gateway), gateway);
    }
    for route in routes {
        snapshot.routes.insert(oref(&route), route);
    }
    for policy in ratelimits {
        snapshot.ratelimit_policies.insert(oref(&policy), policy);
    }
    for policy in auths {
        snapshot.auth_policies.insert(oref(&policy), policy);
    }
    snapshot
}

fn oref<R: ResourceExt>(resource: &R) -> ObjectRef {
    ObjectRef::new(
        resource.namespace().expect("resource must have a namespace"),
        resource.name_unchecked(),
    )
}

fn mk_time(secs: i64) -> k8s::Time {
    k8s::Time(chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs))
}

fn meta(ns: impl ToString, name: impl ToString) -> k8s::ObjectMeta {
    k8s::ObjectMeta {
        namespace: Some(ns.to_string()),
        name: Some(name.to_string()),
        creation_timestamp: Some(mk_time(0)),
        ..Default::default()
    }
}

fn mk_gateway_class(name: impl ToString) -> k8s::GatewayClass {
    k8s::GatewayClass {
        metadata: k8s::ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: k8s::GatewayClassSpec {
            controller_name: "policy.gateway.io/compiler".to_string(),
        },
    }
}

fn mk_gateway(
    ns: impl ToString,
    name: impl ToString,
    listeners: Vec<(&str, Option<&str>)>,
) -> k8s::Gateway {
    k8s::Gateway {
        metadata: meta(ns, name),
        spec: k8s::GatewaySpec {
            gateway_class_name: CLASS.to_string(),
            listeners: listeners
                .into_iter()
                .map(|(name, hostname)| k8s::Listener {
                    name: name.to_string(),
                    hostname: hostname.map(ToString::to_string),
                    port: 80,
                    protocol: "HTTP".to_string(),
                })
                .collect(),
        },
    }
}

fn mk_parent_ref(gateway: &str, section_name: Option<&str>) -> k8s::ParentReference {
    k8s::ParentReference {
        group: Some("gateway.networking.k8s.io".to_string()),
        kind: Some("Gateway".to_string()),
        namespace: None,
        name: gateway.to_string(),
        section_name: section_name.map(ToString::to_string),
    }
}

fn mk_route(
    ns: impl ToString,
    name: impl ToString,
    parents: Vec<k8s::ParentReference>,
    hostnames: Vec<&str>,
    rules: Vec<k8s::httproute::HttpRouteRule>,
) -> k8s::HttpRoute {
    k8s::HttpRoute {
        metadata: meta(ns, name),
        spec: k8s::HttpRouteSpec {
            parent_refs: Some(parents),
            hostnames: if hostnames.is_empty() {
                None
            } else {
                Some(hostnames.iter().map(ToString::to_string).collect())
            },
            rules: Some(rules),
        },
    }
}

fn mk_rule(matches: Vec<k8s::httproute::HttpRouteMatch>) -> k8s::httproute::HttpRouteRule {
    k8s::httproute::HttpRouteRule {
        matches: Some(matches),
    }
}

fn prefix_match(path: &str) -> k8s::httproute::HttpRouteMatch {
    k8s::httproute::HttpRouteMatch {
        path: Some(k8s::httproute::HttpPathMatch::PathPrefix {
            value: path.to_string(),
        }),
        ..Default::default()
    }
}

fn exact_match(path: &str) -> k8s::httproute::HttpRouteMatch {
    k8s::httproute::HttpRouteMatch {
        path: Some(k8s::httproute::HttpPathMatch::Exact {
            value: path.to_string(),
        }),
        ..Default::default()
    }
}

fn target_gateway(name: &str) -> k8s::policy::PolicyTargetRef {
    k8s::policy::PolicyTargetRef {
        group: Some("gateway.networking.k8s.io".to_string()),
        kind: "Gateway".to_string(),
        name: name.to_string(),
        namespace: None,
        section_name: None,
    }
}

fn target_listener(gateway: &str, section: &str) -> k8s::policy::PolicyTargetRef {
    k8s::policy::PolicyTargetRef {
        section_name: Some(section.to_string()),
        ..target_gateway(gateway)
    }
}

fn target_route(name: &str) -> k8s::policy::PolicyTargetRef {
    k8s::policy::PolicyTargetRef {
        group: Some("gateway.networking.k8s.io".to_string()),
        kind: "HTTPRoute".to_string(),
        name: name.to_string(),
        namespace: None,
        section_name: None,
    }
}

/// Which layer of the policy spec the entries are declared in.
enum Decl {
    Defaults,
    Overrides,
    Proper,
}

fn mk_limits(entries: Vec<(&str, u32, &str)>) -> k8s::policy::RateLimitRules {
    k8s::policy::RateLimitRules {
        limits: Some(
            entries
                .into_iter()
                .map(|(name, limit, window)| {
                    (
                        name.to_string(),
                        k8s::policy::Limit {
                            rates: vec![k8s::policy::Rate {
                                limit,
                                window: window.to_string(),
                            }],
                            when: None,
                            counters: None,
                            route_selectors: None,
                        },
                    )
                })
                .collect(),
        ),
    }
}

fn mk_ratelimit(
    ns: impl ToString,
    name: impl ToString,
    target: k8s::policy::PolicyTargetRef,
    decl: Decl,
    limits: k8s::policy::RateLimitRules,
) -> k8s::policy::RateLimitPolicy {
    let (defaults, overrides, proper) = match decl {
        Decl::Defaults => (Some(limits), None, Default::default()),
        Decl::Overrides => (None, Some(limits), Default::default()),
        Decl::Proper => (None, None, limits),
    };
    k8s::policy::RateLimitPolicy {
        metadata: meta(ns, name),
        spec: k8s::policy::RateLimitPolicySpec {
            target_ref: target,
            defaults,
            overrides,
            proper,
        },
    }
}

fn mk_auth_rules(names: Vec<&str>) -> k8s::policy::AuthRules {
    k8s::policy::AuthRules {
        rules: Some(
            names
                .into_iter()
                .map(|name| (name.to_string(), k8s::policy::AuthRule::default()))
                .collect(),
        ),
    }
}

fn mk_auth(
    ns: impl ToString,
    name: impl ToString,
    target: k8s::policy::PolicyTargetRef,
    decl: Decl,
    rules: k8s::policy::AuthRules,
) -> k8s::policy::AuthPolicy {
    let (defaults, overrides, proper) = match decl {
        Decl::Defaults => (Some(rules), None, Default::default()),
        Decl::Overrides => (None, Some(rules), Default::default()),
        Decl::Proper => (None, None, rules),
    };
    k8s::policy::AuthPolicy {
        metadata: meta(ns, name),
        spec: k8s::policy::AuthPolicySpec {
            target_ref: target,
            defaults,
            overrides,
            proper,
        },
    }
}

fn condition_for<'r>(
    reports: &'r [PolicyReport],
    ns: &str,
    name: &str,
) -> Option<&'r PolicyCondition> {
    reports
        .iter()
        .find(|report| report.policy.namespace == ns && report.policy.name == name)
        .map(|report| &report.condition)
}
