//! The declarative configuration document consumed by the data-plane
//! enforcement filter.
//!
//! One document is compiled per gateway and replaced wholesale on every pass;
//! the output sink is responsible for diffing it against the extension
//! resource it is applied to.

use std::collections::BTreeMap;

pub const RATELIMIT_SERVICE_NAME: &str = "ratelimit-service";
pub const AUTH_SERVICE_NAME: &str = "auth-service";

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub services: BTreeMap<String, ServiceEntry>,
    pub action_sets: Vec<ActionSet>,
}

/// An enforcement extension service the filter calls out to.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntry {
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub endpoint: String,
    pub failure_mode: FailureMode,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    RateLimit,
    Auth,
}

/// What the filter does with a request when the extension service is
/// unreachable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    Allow,
    Deny,
}

/// The per-hostname unit of enforcement: when the rule conditions hold, the
/// actions run in order.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSet {
    pub name: String,
    pub route_rule_conditions: RouteRuleConditions,
    pub actions: Vec<Action>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRuleConditions {
    pub hostnames: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<Predicate>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub service_name: String,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Predicate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<DataItem>,
}

/// One entry of an action's payload: either a literal key/value or a value
/// extracted from the request context at enforcement time.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataItem {
    Static { key: String, value: String },
    Selector { path: String },
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Predicate {
    pub selector: String,
    pub operator: Operator,
    pub value: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equal,
    NotEqual,
    StartsWith,
    EndsWith,
    Matches,
}
