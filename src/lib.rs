//! tfsynth - configuration synthesis for Terraform JSON
//!
//! Declare resources, data sources, providers, variables, locals and
//! outputs in a tree of stacks and scopes, patch the generated bodies
//! through path-keyed overrides, and serialize each stack into a
//! Terraform JSON document whose elements follow their dependency order.

pub mod app;
pub mod config;
pub mod error;
pub mod graph;
pub mod overrides;
pub mod synth;
pub mod tree;
pub mod value;

pub use app::{AppFile, AppFileError};
pub use config::{ConfigError, EffectiveConfig};
pub use error::SynthError;
pub use graph::{Cycle, DependencyGraph};
pub use overrides::{GeneratorShape, OverrideAction, OverridePath, SpecialBlockTable};
pub use synth::output::{write_app, OutputError};
pub use synth::{synthesize, Linkage, SerializedDocument, SynthOptions, Synthesis, SynthesizedApp};
pub use tfsynth_manifest::{ErrorCode, ErrorReport, SynthManifest};
pub use tfsynth_naming::KeyCase;
pub use tree::{Declaration, Element, ElementKind, NodeId, Tree};
pub use value::{Properties, Reference, Value};
