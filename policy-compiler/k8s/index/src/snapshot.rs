use ahash::AHashMap as HashMap;
use gateway_policy_compiler_k8s_api as api;
use std::fmt;

/// Namespace/name coordinates of a namespaced resource.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObjectRef {
    pub namespace: String,
    pub name: String,
}

/// One consistent view of the routing and policy objects relevant to
/// compilation. Supplied fresh by the caller on every pass; the compiler holds
/// nothing between passes.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub gateway_classes: HashMap<String, api::GatewayClass>,
    pub gateways: HashMap<ObjectRef, api::Gateway>,
    pub routes: HashMap<ObjectRef, api::HttpRoute>,
    pub ratelimit_policies: HashMap<ObjectRef, api::policy::RateLimitPolicy>,
    pub auth_policies: HashMap<ObjectRef, api::policy::AuthPolicy>,
}

// === impl ObjectRef ===

impl ObjectRef {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
