//! Watch-driven wrapper around the compiler: holds the current snapshot,
//! recompiles wholesale on every relevant change, and republishes per-gateway
//! documents.

use crate::cluster_info::ClusterInfo;
use crate::compiler::{self, PolicyReport};
use crate::snapshot::{ObjectRef, Snapshot};
use ahash::AHashMap as HashMap;
use gateway_policy_compiler_core::dataplane::Config;
use gateway_policy_compiler_k8s_api::{self as api, ResourceExt};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug)]
pub struct Index {
    snapshot: Snapshot,
    cluster_info: Arc<ClusterInfo>,
    watches: HashMap<ObjectRef, watch::Sender<Config>>,
    reports: Vec<PolicyReport>,
}

pub type SharedIndex = Arc<RwLock<Index>>;

// === impl Index ===

impl Index {
    pub fn shared(cluster_info: Arc<ClusterInfo>) -> SharedIndex {
        Arc::new(RwLock::new(Self {
            snapshot: Snapshot::default(),
            cluster_info,
            watches: HashMap::default(),
            reports: Vec::new(),
        }))
    }

    /// Subscribes to the compiled document for a gateway. The receiver holds
    /// an empty document until the gateway compiles.
    pub fn gateway_config_rx(
        &mut self,
        namespace: impl ToString,
        name: impl ToString,
    ) -> watch::Receiver<Config> {
        let id = ObjectRef::new(namespace, name);
        tracing::debug!(gateway = %id, "subscribing to gateway config");
        let snapshot = &self.snapshot;
        let cluster_info = &self.cluster_info;
        self.watches
            .entry(id.clone())
            .or_insert_with(|| {
                let config = match compiler::compile_gateway(snapshot, &id, cluster_info) {
                    Ok(compiled) => compiled.config,
                    Err(error) => {
                        tracing::debug!(%error, gateway = %id, "no document for gateway yet");
                        Config::default()
                    }
                };
                watch::channel(config).0
            })
            .subscribe()
    }

    /// Per-policy outcomes of the last pass, for the status collaborator.
    pub fn policy_reports(&self) -> &[PolicyReport] {
        &self.reports
    }

    fn recompile(&mut self) {
        let compilation = compiler::compile(&self.snapshot, &self.cluster_info);
        self.reports = compilation.reports;

        for (id, tx) in &self.watches {
            match compilation.configs.get(id) {
                Some(config) => {
                    tx.send_if_modified(|current| {
                        if current != config {
                            *current = config.clone();
                            true
                        } else {
                            false
                        }
                    });
                }
                // The gateway is gone: retract its document.
                None if !self.snapshot.gateways.contains_key(id) => {
                    tx.send_if_modified(|current| {
                        if *current != Config::default() {
                            *current = Config::default();
                            true
                        } else {
                            false
                        }
                    });
                }
                // Present but uncompiled (unmanaged class or invariant
                // violation): the previous document stands.
                None => {}
            }
        }
    }
}

impl kubert::index::IndexClusterResource<api::GatewayClass> for Index {
    fn apply(&mut self, class: api::GatewayClass) {
        let name = class.name_unchecked();
        tracing::debug!(%name, "indexing gateway class");
        self.snapshot.gateway_classes.insert(name, class);
        self.recompile();
    }

    fn delete(&mut self, name: String) {
        self.snapshot.gateway_classes.remove(&name);
        self.recompile();
    }
}

impl kubert::index::IndexNamespacedResource<api::Gateway> for Index {
    fn apply(&mut self, gateway: api::Gateway) {
        let namespace = gateway.namespace().expect("Gateway must have a namespace");
        let id = ObjectRef::new(namespace, gateway.name_unchecked());
        tracing::debug!(gateway = %id, "indexing gateway");
        self.snapshot.gateways.insert(id, gateway);
        self.recompile();
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.snapshot.gateways.remove(&ObjectRef { namespace, name });
        self.recompile();
    }
}

impl kubert::index::IndexNamespacedResource<api::HttpRoute> for Index {
    fn apply(&mut self, route: api::HttpRoute) {
        let namespace = route.namespace().expect("HTTPRoute must have a namespace");
        let id = ObjectRef::new(namespace, route.name_unchecked());
        tracing::debug!(route = %id, "indexing route");
        self.snapshot.routes.insert(id, route);
        self.recompile();
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.snapshot.routes.remove(&ObjectRef { namespace, name });
        self.recompile();
    }
}

impl kubert::index::IndexNamespacedResource<api::policy::RateLimitPolicy> for Index {
    fn apply(&mut self, policy: api::policy::RateLimitPolicy) {
        let namespace = policy
            .namespace()
            .expect("RateLimitPolicy must have a namespace");
        let id = ObjectRef::new(namespace, policy.name_unchecked());
        tracing::debug!(policy = %id, "indexing rate-limit policy");
        self.snapshot.ratelimit_policies.insert(id, policy);
        self.recompile();
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.snapshot
            .ratelimit_policies
            .remove(&ObjectRef { namespace, name });
        self.recompile();
    }
}

impl kubert::index::IndexNamespacedResource<api::policy::AuthPolicy> for Index {
    fn apply(&mut self, policy: api::policy::AuthPolicy) {
        let namespace = policy
            .namespace()
            .expect("AuthPolicy must have a namespace");
        let id = ObjectRef::new(namespace, policy.name_unchecked());
        tracing::debug!(policy = %id, "indexing auth policy");
        self.snapshot.auth_policies.insert(id, policy);
        self.recompile();
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.snapshot
            .auth_policies
            .remove(&ObjectRef { namespace, name });
        self.recompile();
    }
}
