//! Shading network compiler.
//!
//! A network is compiled depth-first from its root into one [`ShaderGroup`]: producers
//! are emitted before consumers, partial compound connections are bridged with
//! composing/decomposing adaptor shaders, and a context-specific terminal adaptor is
//! appended when the group is committed.
//!
//! [`ShaderGroup`]: crate::target::ShaderGroup

pub mod literal;
pub mod metadata;
pub mod network;
pub mod node;
pub mod nodes;
pub mod ramp;

pub use metadata::{ParamInfo, ParamType, ShaderInfo, ShadingNodeRegistry};
pub use network::{NetworkContext, NetworkKey, ShadingNetworkExporter};
pub use node::{GenericShadingNodeExporter, ShadingNodeExporter};
