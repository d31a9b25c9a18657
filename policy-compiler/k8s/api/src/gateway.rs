/// GatewayClass describes a class of Gateways available for use. It is the
/// root of every gateway's identity chain.
#[derive(
    Clone,
    Debug,
    Default,
    kube::CustomResource,
    serde::Deserialize,
    serde::Serialize,
    schemars::JsonSchema,
)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1beta1",
    kind = "GatewayClass"
)]
#[serde(rename_all = "camelCase")]
pub struct GatewayClassSpec {
    /// The controller responsible for Gateways of this class.
    pub controller_name: String,
}

/// Gateway represents an instance of a service-traffic handling
/// infrastructure, bound to a GatewayClass, exposing one or more Listeners.
#[derive(
    Clone,
    Debug,
    Default,
    kube::CustomResource,
    serde::Deserialize,
    serde::Serialize,
    schemars::JsonSchema,
)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1beta1",
    kind = "Gateway",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    pub gateway_class_name: String,
    pub listeners: Vec<Listener>,
}

#[derive(
    Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    /// Name is unique within the Gateway and is the section name policies and
    /// routes may attach to.
    pub name: String,

    /// Hostname specifies the virtual hostname to match for requests on this
    /// listener. May carry a single leading wildcard label (`*.`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    pub port: u16,

    pub protocol: String,
}
