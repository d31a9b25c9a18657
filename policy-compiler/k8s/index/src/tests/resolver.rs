use super::*;
use crate::{resolver, topology};
use gateway_policy_compiler_core::policy::{PolicyKind, PolicyRef, PolicySpec, Rate};
use std::time::Duration;

fn policy_ref(kind: PolicyKind, ns: &str, name: &str) -> PolicyRef {
    PolicyRef {
        kind,
        namespace: ns.to_string(),
        name: name.to_string(),
    }
}

fn resolve_first(
    snapshot: &Snapshot,
    gateway: &ObjectRef,
    kind: PolicyKind,
) -> Option<resolver::Resolved> {
    let attachments = topology::attach_policies(snapshot);
    let gateway = topology::gateway_topology(snapshot, gateway, &attachments)
        .expect("gateway must build");
    let listener = gateway.listeners.first().expect("gateway must have a listener");
    let route = listener.routes.first().expect("listener must have a route");
    resolver::resolve(&gateway, listener, route, kind)
}

fn rates_of(resolved: &resolver::Resolved) -> Vec<Rate> {
    match &resolved.effective.spec {
        PolicySpec::RateLimit(spec) => spec.limits.iter().flat_map(|l| l.rates.clone()).collect(),
        PolicySpec::Auth(_) => panic!("expected a rate-limit spec"),
    }
}

#[test]
fn gateway_defaults_apply_to_a_free_route() {
    let snapshot = mk_snapshot(
        vec![mk_gateway("ns-0", "gw", vec![("http", None)])],
        vec![mk_route(
            "ns-0",
            "route-0",
            vec![mk_parent_ref("gw", None)],
            vec!["toys.example.com"],
            vec![mk_rule(vec![prefix_match("/toys")])],
        )],
        vec![mk_ratelimit(
            "ns-0",
            "gw-limits",
            target_gateway("gw"),
            Decl::Defaults,
            mk_limits(vec![("base", 1, "3m")]),
        )],
        vec![],
    );

    let resolved = resolve_first(&snapshot, &ObjectRef::new("ns-0", "gw"), PolicyKind::RateLimit)
        .expect("the gateway default must apply");
    assert_eq!(
        resolved.effective.source,
        policy_ref(PolicyKind::RateLimit, "ns-0", "gw-limits")
    );
    assert_eq!(
        rates_of(&resolved),
        vec![Rate {
            limit: 1,
            window: Duration::from_secs(180),
        }]
    );
    assert_eq!(resolved.shadowed, vec![]);
}

#[test]
fn route_policy_beats_gateway_defaults() {
    let snapshot = mk_snapshot(
        vec![mk_gateway("ns-0", "gw", vec![("http", None)])],
        vec![mk_route(
            "ns-0",
            "route-0",
            vec![mk_parent_ref("gw", None)],
            vec!["toys.example.com"],
            vec![mk_rule(vec![prefix_match("/toys")])],
        )],
        vec![
            mk_ratelimit(
                "ns-0",
                "gw-limits",
                target_gateway("gw"),
                Decl::Defaults,
                mk_limits(vec![("base", 1, "3m")]),
            ),
            mk_ratelimit(
                "ns-0",
                "route-limits",
                target_route("route-0"),
                Decl::Proper,
                mk_limits(vec![("base", 10, "3m")]),
            ),
        ],
        vec![],
    );

    let resolved = resolve_first(&snapshot, &ObjectRef::new("ns-0", "gw"), PolicyKind::RateLimit)
        .expect("the route policy must apply");
    assert_eq!(
        resolved.effective.source,
        policy_ref(PolicyKind::RateLimit, "ns-0", "route-limits")
    );
    assert_eq!(
        rates_of(&resolved),
        vec![Rate {
            limit: 10,
            window: Duration::from_secs(180),
        }]
    );
    assert_eq!(
        resolved.shadowed,
        vec![(
            policy_ref(PolicyKind::RateLimit, "ns-0", "gw-limits"),
            policy_ref(PolicyKind::RateLimit, "ns-0", "route-limits"),
        )]
    );
}

#[test]
fn gateway_override_beats_route_policy() {
    let snapshot = mk_snapshot(
        vec![mk_gateway("ns-0", "gw", vec![("http", None)])],
        vec![mk_route(
            "ns-0",
            "route-0",
            vec![mk_parent_ref("gw", None)],
            vec!["toys.example.com"],
            vec![mk_rule(vec![prefix_match("/toys")])],
        )],
        vec![
            mk_ratelimit(
                "ns-0",
                "gw-limits",
                target_gateway("gw"),
                Decl::Overrides,
                mk_limits(vec![("base", 1, "3m")]),
            ),
            mk_ratelimit(
                "ns-0",
                "route-limits",
                target_route("route-0"),
                Decl::Proper,
                mk_limits(vec![("base", 10, "3m")]),
            ),
        ],
        vec![],
    );

    let resolved = resolve_first(&snapshot, &ObjectRef::new("ns-0", "gw"), PolicyKind::RateLimit)
        .expect("the gateway override must apply");
    assert_eq!(
        resolved.effective.source,
        policy_ref(PolicyKind::RateLimit, "ns-0", "gw-limits")
    );
    assert_eq!(
        rates_of(&resolved),
        vec![Rate {
            limit: 1,
            window: Duration::from_secs(180),
        }]
    );
    assert_eq!(
        resolved.shadowed,
        vec![(
            policy_ref(PolicyKind::RateLimit, "ns-0", "route-limits"),
            policy_ref(PolicyKind::RateLimit, "ns-0", "gw-limits"),
        )]
    );
}

#[test]
fn listener_section_override_beats_gateway_override() {
    let snapshot = mk_snapshot(
        vec![mk_gateway("ns-0", "gw", vec![("http", None)])],
        vec![mk_route(
            "ns-0",
            "route-0",
            vec![mk_parent_ref("gw", None)],
            vec!["toys.example.com"],
            vec![mk_rule(vec![prefix_match("/toys")])],
        )],
        vec![
            mk_ratelimit(
                "ns-0",
                "gw-limits",
                target_gateway("gw"),
                Decl::Overrides,
                mk_limits(vec![("base", 1, "3m")]),
            ),
            mk_ratelimit(
                "ns-0",
                "listener-limits",
                target_listener("gw", "http"),
                Decl::Overrides,
                mk_limits(vec![("base", 5, "1m")]),
            ),
        ],
        vec![],
    );

    let resolved = resolve_first(&snapshot, &ObjectRef::new("ns-0", "gw"), PolicyKind::RateLimit)
        .expect("the listener override must apply");
    assert_eq!(
        resolved.effective.source,
        policy_ref(PolicyKind::RateLimit, "ns-0", "listener-limits")
    );
    assert_eq!(
        resolved.shadowed,
        vec![(
            policy_ref(PolicyKind::RateLimit, "ns-0", "gw-limits"),
            policy_ref(PolicyKind::RateLimit, "ns-0", "listener-limits"),
        )]
    );
}

#[test]
fn free_route_has_no_effective_policy() {
    let snapshot = mk_snapshot(
        vec![mk_gateway("ns-0", "gw", vec![("http", None)])],
        vec![mk_route(
            "ns-0",
            "route-0",
            vec![mk_parent_ref("gw", None)],
            vec!["toys.example.com"],
            vec![mk_rule(vec![prefix_match("/toys")])],
        )],
        vec![],
        vec![],
    );

    assert_eq!(
        resolve_first(&snapshot, &ObjectRef::new("ns-0", "gw"), PolicyKind::RateLimit),
        None
    );
}

#[test]
fn policy_kinds_resolve_independently() {
    let snapshot = mk_snapshot(
        vec![mk_gateway("ns-0", "gw", vec![("http", None)])],
        vec![mk_route(
            "ns-0",
            "route-0",
            vec![mk_parent_ref("gw", None)],
            vec!["toys.example.com"],
            vec![mk_rule(vec![prefix_match("/toys")])],
        )],
        vec![mk_ratelimit(
            "ns-0",
            "route-limits",
            target_route("route-0"),
            Decl::Proper,
            mk_limits(vec![("base", 10, "3m")]),
        )],
        vec![mk_auth(
            "ns-0",
            "gw-auth",
            target_gateway("gw"),
            Decl::Defaults,
            mk_auth_rules(vec!["api-key"]),
        )],
    );
    let gw = ObjectRef::new("ns-0", "gw");

    let ratelimit = resolve_first(&snapshot, &gw, PolicyKind::RateLimit).expect("must resolve");
    assert_eq!(
        ratelimit.effective.source,
        policy_ref(PolicyKind::RateLimit, "ns-0", "route-limits")
    );
    // The auth default is not shadowed by the rate-limit route policy.
    assert_eq!(ratelimit.shadowed, vec![]);

    let auth = resolve_first(&snapshot, &gw, PolicyKind::Auth).expect("must resolve");
    assert_eq!(
        auth.effective.source,
        policy_ref(PolicyKind::Auth, "ns-0", "gw-auth")
    );
}

#[test]
fn a_policy_with_no_entries_is_inert() {
    let snapshot = mk_snapshot(
        vec![mk_gateway("ns-0", "gw", vec![("http", None)])],
        vec![mk_route(
            "ns-0",
            "route-0",
            vec![mk_parent_ref("gw", None)],
            vec!["toys.example.com"],
            vec![mk_rule(vec![prefix_match("/toys")])],
        )],
        vec![mk_ratelimit(
            "ns-0",
            "gw-limits",
            target_gateway("gw"),
            Decl::Defaults,
            mk_limits(vec![]),
        )],
        vec![],
    );

    assert_eq!(
        resolve_first(&snapshot, &ObjectRef::new("ns-0", "gw"), PolicyKind::RateLimit),
        None
    );
}
