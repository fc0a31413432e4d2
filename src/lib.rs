//! Tour Guide: AI-planned guided tours over a host application's UI.

pub mod ai;
pub mod config;
pub mod error;
pub mod guide;
pub mod host;
pub mod navigation;
pub mod presenter;
pub mod prompt;
pub mod registry;
pub mod state;
pub mod tour;

pub use guide::{Guide, GuideBuilder};
