#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod gateway;
pub mod httproute;
pub mod policy;

pub use self::gateway::{Gateway, GatewayClass, GatewayClassSpec, GatewaySpec, Listener};
pub use self::httproute::{HttpRoute, HttpRouteSpec, ParentReference};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
pub use kube::api::{ObjectMeta, ResourceExt};
