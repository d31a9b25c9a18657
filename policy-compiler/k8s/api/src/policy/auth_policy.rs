use super::{PolicyTargetRef, RouteSelector, WhenPredicate};
use std::collections::BTreeMap;

/// AuthPolicy attaches authentication/authorization rules to a Gateway
/// (optionally one of its Listeners via `sectionName`) or to an HTTPRoute.
///
/// Declaration layers carry the same semantics as RateLimitPolicy:
/// `defaults`, `overrides`, or a bare spec.
#[derive(
    Clone, Debug, kube::CustomResource, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[kube(
    group = "policy.gateway.io",
    version = "v1alpha1",
    kind = "AuthPolicy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AuthPolicySpec {
    pub target_ref: PolicyTargetRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<AuthRules>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<AuthRules>,

    #[serde(flatten)]
    pub proper: AuthRules,
}

#[derive(
    Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub struct AuthRules {
    /// Named auth rules; each compiles into one enforcement action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<BTreeMap<String, AuthRule>>,
}

#[derive(
    Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct AuthRule {
    /// Additional request-context conditions gating this rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Vec<WhenPredicate>>,

    /// Context selectors forwarded to the auth service with each check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_selectors: Option<Vec<RouteSelector>>,
}
