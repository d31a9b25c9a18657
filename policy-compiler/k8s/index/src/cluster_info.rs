use gateway_policy_compiler_core::dataplane::{
    FailureMode, ServiceEntry, ServiceType, AUTH_SERVICE_NAME, RATELIMIT_SERVICE_NAME,
};
use std::collections::BTreeMap;

/// Cluster-wide configuration: where the enforcement extension services live
/// and how the data-plane filter degrades when they are unreachable.
#[derive(Clone, Debug)]
pub struct ClusterInfo {
    pub ratelimit_endpoint: String,
    pub auth_endpoint: String,
}

// === impl ClusterInfo ===

impl Default for ClusterInfo {
    fn default() -> Self {
        Self {
            ratelimit_endpoint: "ratelimit.gateway-system.svc.cluster.local:8081".to_string(),
            auth_endpoint: "auth.gateway-system.svc.cluster.local:50051".to_string(),
        }
    }
}

impl ClusterInfo {
    /// The full services section. Rate limiting fails open so an unreachable
    /// limiter does not take traffic down; auth fails closed.
    pub(crate) fn services(&self) -> BTreeMap<String, ServiceEntry> {
        let mut services = BTreeMap::new();
        services.insert(
            RATELIMIT_SERVICE_NAME.to_string(),
            ServiceEntry {
                service_type: ServiceType::RateLimit,
                endpoint: self.ratelimit_endpoint.clone(),
                failure_mode: FailureMode::Allow,
            },
        );
        services.insert(
            AUTH_SERVICE_NAME.to_string(),
            ServiceEntry {
                service_type: ServiceType::Auth,
                endpoint: self.auth_endpoint.clone(),
                failure_mode: FailureMode::Deny,
            },
        );
        services
    }
}
