//! Contracts with the host page: location, DOM, router and chat panel.
//!
//! The guide never touches a real DOM. Everything it needs from the page
//! goes through these traits so the engine can run against a browser
//! binding, a headless test double, or anything in between.

pub mod memory;

use async_trait::async_trait;
use tokio::sync::broadcast;

pub use memory::{MemoryHost, RecordedMessage, RecordingMessages};

/// A DOM event as seen by a capturing document-level listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    /// Event name, e.g. "click".
    pub name: String,
    /// Locators of the event target followed by its ancestors.
    pub path: Vec<String>,
}

impl DomEvent {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: vec![target.into()],
        }
    }

    /// Add an ancestor of the target.
    pub fn within(mut self, ancestor: impl Into<String>) -> Self {
        self.path.push(ancestor.into());
        self
    }

    /// Whether the target matches `locator` or sits inside an element that
    /// does.
    pub fn hits(&self, locator: &str) -> bool {
        self.path.iter().any(|p| p == locator)
    }
}

/// The page the guide runs in.
pub trait Host: Send + Sync {
    /// Current pathname.
    fn current_route(&self) -> String;

    /// Fallback navigation: push a history entry and fire a synthetic
    /// pop-state so client-side routers pick it up.
    fn push_route(&self, path: &str);

    /// Whether an element matching `locator` is in the document.
    fn has_element(&self, locator: &str) -> bool;

    /// Capturing document-level event stream.
    fn dom_events(&self) -> broadcast::Receiver<DomEvent>;
}

/// Client-side router injected by the host application.
#[async_trait]
pub trait Router: Send + Sync {
    async fn navigate(&self, path: &str);
}

/// What a chat-panel message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    User,
    Ai,
    Error,
    /// Navigation announcements and other status lines.
    Status,
    /// Offers to resume a paused tour.
    Resume,
}

/// The chat panel, or whatever the host uses to show messages.
pub trait MessageSink: Send + Sync {
    fn add_message(&self, kind: MessageKind, text: &str);

    /// Panel visibility changed.
    fn set_panel_open(&self, _open: bool) {}
}
