use super::targets_kind;

/// The pointer from a policy object to the routing resource it governs.
#[derive(
    Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTargetRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    pub kind: String,

    pub name: String,

    /// Defaults to the policy's own namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Narrows the target to a named sub-section of the resource, e.g. one
    /// Listener of a Gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
}

impl PolicyTargetRef {
    /// Returns the target ref kind, qualified by its group, if necessary.
    pub fn canonical_kind(&self) -> String {
        if let Some(group) = self.group.as_deref() {
            format!("{kind}.{group}", kind = self.kind)
        } else {
            self.kind.clone()
        }
    }

    /// Checks whether the target references the given resource type.
    pub fn targets_kind<T>(&self) -> bool
    where
        T: kube::Resource,
        T::DynamicType: Default,
    {
        targets_kind::<T>(self.group.as_deref(), &self.kind)
    }

    /// Checks whether the target references the given namespaced resource,
    /// resolving an absent target namespace against `local_ns`.
    pub fn targets<T>(&self, resource: &T, local_ns: &str) -> bool
    where
        T: kube::Resource,
        T::DynamicType: Default,
    {
        if !self.targets_kind::<T>() {
            return false;
        }

        let tns = self.namespace.as_deref().unwrap_or(local_ns);
        match resource.meta().namespace.as_deref() {
            Some(rns) if rns.eq_ignore_ascii_case(tns) => {}
            _ => return false,
        };

        match resource.meta().name.as_deref() {
            Some(rname) => rname.eq_ignore_ascii_case(&self.name),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Gateway, GatewaySpec, HttpRoute, ObjectMeta};

    fn gateway(ns: &str, name: &str) -> Gateway {
        Gateway {
            metadata: ObjectMeta {
                namespace: Some(ns.to_string()),
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            spec: GatewaySpec::default(),
        }
    }

    #[test]
    fn targets_gateway_in_local_namespace() {
        let t = PolicyTargetRef {
            group: Some("gateway.networking.k8s.io".to_string()),
            kind: "Gateway".to_string(),
            name: "edge".to_string(),
            namespace: None,
            section_name: None,
        };
        assert!(t.targets_kind::<Gateway>());
        assert!(!t.targets_kind::<HttpRoute>());
        assert!(t.targets(&gateway("appns", "edge"), "appns"));
        assert!(!t.targets(&gateway("otherns", "edge"), "appns"));
    }

    #[test]
    fn explicit_namespace_overrides_the_local_default() {
        let t = PolicyTargetRef {
            group: None,
            kind: "Gateway".to_string(),
            name: "edge".to_string(),
            namespace: Some("infra".to_string()),
            section_name: None,
        };
        // Group mismatch: an unset group means core.
        assert!(!t.targets_kind::<Gateway>());

        let t = PolicyTargetRef {
            group: Some("gateway.networking.k8s.io".to_string()),
            ..t
        };
        assert!(t.targets(&gateway("infra", "edge"), "appns"));
        assert!(!t.targets(&gateway("appns", "edge"), "appns"));
    }
}
