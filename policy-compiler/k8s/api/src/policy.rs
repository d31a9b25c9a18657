pub mod auth_policy;
pub mod ratelimit_policy;
mod target_ref;

pub use self::auth_policy::{AuthPolicy, AuthPolicySpec, AuthRule, AuthRules};
pub use self::ratelimit_policy::{Limit, Rate, RateLimitPolicy, RateLimitPolicySpec, RateLimitRules};
pub use self::target_ref::PolicyTargetRef;

use crate::httproute::HttpRouteMatch;

/// Narrows a named policy entry to the route rules it selects. An absent
/// constraint dimension admits everything.
#[derive(
    Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct RouteSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<HttpRouteMatch>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostnames: Option<Vec<String>>,
}

/// A request-context condition attached to a policy entry, evaluated by the
/// enforcement filter before the entry's action runs.
#[derive(
    Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub struct WhenPredicate {
    pub selector: String,
    pub operator: WhenOperator,
    pub value: String,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum WhenOperator {
    Eq,
    Neq,
    StartsWith,
    EndsWith,
    Matches,
}

/// Whether `group`/`kind` name the given resource type. Empty and `core`
/// groups are equivalent; comparisons are case-insensitive.
pub(crate) fn targets_kind<T>(group: Option<&str>, kind: &str) -> bool
where
    T: kube::Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();

    let t_group = T::group(&dt);
    let t_group = if t_group.is_empty() {
        "core"
    } else {
        &t_group
    };

    group.unwrap_or("core").eq_ignore_ascii_case(t_group)
        && kind.eq_ignore_ascii_case(&T::kind(&dt))
}
