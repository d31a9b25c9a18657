use super::{PolicyTargetRef, RouteSelector, WhenPredicate};
use std::collections::BTreeMap;

/// RateLimitPolicy attaches rate-limiting rules to a Gateway (optionally one
/// of its Listeners via `sectionName`) or to an HTTPRoute.
///
/// Limits may be declared in a `defaults` block (applied where the target's
/// descendants declare nothing more specific), an `overrides` block (always
/// wins over descendants), or bare on the spec (authoritative for the target
/// itself).
#[derive(
    Clone, Debug, kube::CustomResource, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[kube(
    group = "policy.gateway.io",
    version = "v1alpha1",
    kind = "RateLimitPolicy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicySpec {
    pub target_ref: PolicyTargetRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<RateLimitRules>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<RateLimitRules>,

    #[serde(flatten)]
    pub proper: RateLimitRules,
}

#[derive(
    Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub struct RateLimitRules {
    /// Named limit entries; each compiles into one enforcement action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<BTreeMap<String, Limit>>,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Limit {
    pub rates: Vec<Rate>,

    /// Additional request-context conditions gating this limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Vec<WhenPredicate>>,

    /// Context selectors whose values qualify the counter, e.g. a user id
    /// extracted from the auth context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counters: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_selectors: Option<Vec<RouteSelector>>,
}

#[derive(
    Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub struct Rate {
    /// Maximum number of requests per window.
    pub limit: u32,

    /// Window duration, e.g. `30s`, `3m`, `1h`.
    pub window: String,
}
