//! Gateway policy compiler
//!
//! Compiles declarative traffic-policy objects (rate limiting, auth) attached
//! to Gateway-API routing resources into the per-gateway action-set documents
//! interpreted by the data-plane enforcement filter:
//!
//! ```text
//! [ GatewayClass ] <- [ Gateway ] <- [ HTTPRoute ] <- [ RateLimitPolicy / AuthPolicy ]
//!                         |
//!                     topology -> resolver -> compiler -> Config (per gateway)
//! ```
//!
//! Every pass rebuilds the attachment topology from a consistent snapshot,
//! resolves each route rule's effective policy through the defaults/overrides
//! hierarchy, and emits one ordered action-set list per gateway. Nothing is
//! patched incrementally: a pass either replaces a gateway's whole document or
//! leaves the previous one standing.
//!
//! The `Index` wrapper feeds the snapshot from watch events and republishes
//! compiled documents over per-gateway watch channels; the surrounding
//! reconciler decides when to apply them to the data plane.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod cluster_info;
mod compiler;
mod index;
mod policy;
mod resolver;
mod routes;
mod snapshot;
mod topology;

#[cfg(test)]
mod tests;

pub use self::cluster_info::ClusterInfo;
pub use self::compiler::{
    compile, compile_gateway, Compilation, CompileError, CompiledGateway, PolicyCondition,
    PolicyReport,
};
pub use self::index::{Index, SharedIndex};
pub use self::snapshot::{ObjectRef, Snapshot};
