//! Feature registry: the single authority for where features live on screen.

pub mod model;
pub mod store;

pub use model::{
    AdvanceOn, Feature, FeatureEntry, FeatureSpec, FlowStep, GhostFeature, Screen, ScreenCheck,
    ScreenNavigate, StepSpec,
};
pub use store::{FeatureRegistry, RegistryEvent};
