//! Tour engine: step model, flow expansion, and the runner state machine.

pub mod flow;
pub mod runner;
pub mod step;

pub use flow::expand;
pub use runner::TourRunner;
pub use step::{TourStep, merge_step};
