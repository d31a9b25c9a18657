use crate::routes;
use anyhow::{anyhow, bail, Result};
use chrono::{offset::Utc, DateTime};
use gateway_policy_compiler_core::dataplane::{Operator, Predicate};
use gateway_policy_compiler_core::policy::{
    AuthSpec, NamedAuthRule, NamedLimit, PolicyKind, PolicyRef, PolicySpec, Rate, RateLimitSpec,
    RouteSelector,
};
use gateway_policy_compiler_k8s_api::{self as api, ResourceExt, Time};
use std::time;

/// A policy object with its declaration layers converted to the domain model.
///
/// A layer that declares no entries is treated as absent, so an empty object
/// neither wins a resolution nor counts as shadowed.
#[derive(Clone, Debug)]
pub(crate) struct DeclaredPolicy {
    pub source: PolicyRef,
    pub creation_timestamp: Option<DateTime<Utc>>,
    pub target_ref: api::policy::PolicyTargetRef,
    pub defaults: Option<PolicySpec>,
    pub overrides: Option<PolicySpec>,
    pub proper: Option<PolicySpec>,
}

// === impl DeclaredPolicy ===

impl DeclaredPolicy {
    pub fn from_ratelimit(policy: &api::policy::RateLimitPolicy) -> Self {
        let source = PolicyRef {
            kind: PolicyKind::RateLimit,
            namespace: policy.namespace().unwrap_or_default(),
            name: policy.name_unchecked(),
        };
        Self {
            creation_timestamp: policy.metadata.creation_timestamp.clone().map(|Time(t)| t),
            target_ref: policy.spec.target_ref.clone(),
            defaults: policy
                .spec
                .defaults
                .as_ref()
                .and_then(|rules| convert_ratelimit_rules(&source, rules)),
            overrides: policy
                .spec
                .overrides
                .as_ref()
                .and_then(|rules| convert_ratelimit_rules(&source, rules)),
            proper: convert_ratelimit_rules(&source, &policy.spec.proper),
            source,
        }
    }

    pub fn from_auth(policy: &api::policy::AuthPolicy) -> Self {
        let source = PolicyRef {
            kind: PolicyKind::Auth,
            namespace: policy.namespace().unwrap_or_default(),
            name: policy.name_unchecked(),
        };
        Self {
            creation_timestamp: policy.metadata.creation_timestamp.clone().map(|Time(t)| t),
            target_ref: policy.spec.target_ref.clone(),
            defaults: policy
                .spec
                .defaults
                .as_ref()
                .and_then(|rules| convert_auth_rules(&source, rules)),
            overrides: policy
                .spec
                .overrides
                .as_ref()
                .and_then(|rules| convert_auth_rules(&source, rules)),
            proper: convert_auth_rules(&source, &policy.spec.proper),
            source,
        }
    }

    /// The layer used when this object is the nearest declaration for a rule.
    pub fn authoritative(&self) -> Option<&PolicySpec> {
        self.overrides
            .as_ref()
            .or(self.proper.as_ref())
            .or(self.defaults.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.defaults.is_none() && self.overrides.is_none() && self.proper.is_none()
    }
}

fn convert_ratelimit_rules(
    policy: &PolicyRef,
    rules: &api::policy::RateLimitRules,
) -> Option<PolicySpec> {
    let limits = rules.limits.as_ref().filter(|limits| !limits.is_empty())?;
    let limits = limits
        .iter()
        .map(|(name, limit)| NamedLimit {
            name: name.clone(),
            rates: limit
                .rates
                .iter()
                .filter_map(|rate| match parse_window(&rate.window) {
                    Ok(window) => Some(Rate {
                        limit: rate.limit,
                        window,
                    }),
                    Err(error) => {
                        tracing::warn!(%error, %policy, limit = %name, "ignoring rate with invalid window");
                        None
                    }
                })
                .collect(),
            when: limit.when.iter().flatten().map(when_predicate).collect(),
            counters: limit.counters.clone().unwrap_or_default(),
            selectors: limit
                .route_selectors
                .as_ref()
                .map(|selectors| convert_selectors(policy, selectors)),
        })
        .collect();
    Some(PolicySpec::RateLimit(RateLimitSpec { limits }))
}

fn convert_auth_rules(policy: &PolicyRef, rules: &api::policy::AuthRules) -> Option<PolicySpec> {
    let rules = rules.rules.as_ref().filter(|rules| !rules.is_empty())?;
    let rules = rules
        .iter()
        .map(|(name, rule)| NamedAuthRule {
            name: name.clone(),
            when: rule.when.iter().flatten().map(when_predicate).collect(),
            forward: rule.forward.clone().unwrap_or_default(),
            selectors: rule
                .route_selectors
                .as_ref()
                .map(|selectors| convert_selectors(policy, selectors)),
        })
        .collect();
    Some(PolicySpec::Auth(AuthSpec { rules }))
}

/// A selector that fails conversion is dropped with a warning: it matches
/// nothing rather than aborting the object, since selector validation belongs
/// to the admission collaborator.
fn convert_selectors(
    policy: &PolicyRef,
    selectors: &[api::policy::RouteSelector],
) -> Vec<RouteSelector> {
    selectors
        .iter()
        .filter_map(|selector| match convert_selector(selector) {
            Ok(selector) => Some(selector),
            Err(error) => {
                tracing::warn!(%error, %policy, "malformed route selector matches nothing");
                None
            }
        })
        .collect()
}

fn convert_selector(selector: &api::policy::RouteSelector) -> Result<RouteSelector> {
    Ok(RouteSelector {
        matches: selector
            .matches
            .clone()
            .into_iter()
            .flatten()
            .map(routes::try_match)
            .collect::<Result<_>>()?,
        hostnames: selector.hostnames.clone().unwrap_or_default(),
    })
}

fn when_predicate(when: &api::policy::WhenPredicate) -> Predicate {
    let operator = match when.operator {
        api::policy::WhenOperator::Eq => Operator::Equal,
        api::policy::WhenOperator::Neq => Operator::NotEqual,
        api::policy::WhenOperator::StartsWith => Operator::StartsWith,
        api::policy::WhenOperator::EndsWith => Operator::EndsWith,
        api::policy::WhenOperator::Matches => Operator::Matches,
    };
    Predicate {
        selector: when.selector.clone(),
        operator,
        value: when.value.clone(),
    }
}

pub(crate) fn parse_window(s: &str) -> Result<time::Duration> {
    let s = s.trim();
    let offset = s
        .rfind(|c: char| c.is_ascii_digit())
        .ok_or_else(|| anyhow!("{} does not contain a window duration value", s))?;
    let (magnitude, unit) = s.split_at(offset + 1);
    let magnitude = magnitude.parse::<u64>()?;

    let mul = match unit {
        "" if magnitude == 0 => 0,
        "ms" => 1,
        "s" => 1000,
        "m" => 1000 * 60,
        "h" => 1000 * 60 * 60,
        "d" => 1000 * 60 * 60 * 24,
        _ => bail!(
            "invalid window unit {} (expected one of 'ms', 's', 'm', 'h', or 'd')",
            unit
        ),
    };

    let ms = magnitude
        .checked_mul(mul)
        .ok_or_else(|| anyhow!("window value {} overflows when converted to 'ms'", s))?;
    Ok(time::Duration::from_millis(ms))
}
