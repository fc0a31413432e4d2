//! In-memory host and message sink, for headless runs and tests.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

use super::{DomEvent, Host, MessageKind, MessageSink};

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 64;

#[derive(Default)]
struct Page {
    route: String,
    elements: HashSet<String>,
    pushes: Vec<String>,
}

/// A page held in memory: a pathname, a set of present locators, and an
/// event bus.
pub struct MemoryHost {
    page: Mutex<Page>,
    tx: broadcast::Sender<DomEvent>,
}

impl MemoryHost {
    pub fn new(route: impl Into<String>) -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self {
            page: Mutex::new(Page {
                route: route.into(),
                ..Default::default()
            }),
            tx,
        }
    }

    pub fn set_route(&self, route: impl Into<String>) {
        self.page().route = route.into();
    }

    pub fn mount(&self, locator: impl Into<String>) {
        self.page().elements.insert(locator.into());
    }

    pub fn unmount(&self, locator: &str) {
        self.page().elements.remove(locator);
    }

    /// Fire an event at the document.
    pub fn dispatch(&self, event: DomEvent) {
        debug!(event = %event.name, target = ?event.path.first(), "Dispatching DOM event");
        let _ = self.tx.send(event);
    }

    /// Paths pushed through the history fallback, oldest first.
    pub fn history_pushes(&self) -> Vec<String> {
        self.page().pushes.clone()
    }

    fn page(&self) -> std::sync::MutexGuard<'_, Page> {
        self.page.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Host for MemoryHost {
    fn current_route(&self) -> String {
        self.page().route.clone()
    }

    fn push_route(&self, path: &str) {
        let mut page = self.page();
        page.pushes.push(path.to_string());
        page.route = path.to_string();
    }

    fn has_element(&self, locator: &str) -> bool {
        self.page().elements.contains(locator)
    }

    fn dom_events(&self) -> broadcast::Receiver<DomEvent> {
        self.tx.subscribe()
    }
}

/// A message captured by `RecordingMessages`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMessage {
    pub kind: MessageKind,
    pub text: String,
}

/// Message sink that keeps every message and logs it.
#[derive(Default)]
pub struct RecordingMessages {
    messages: Mutex<Vec<RecordedMessage>>,
    open: Mutex<bool>,
}

impl RecordingMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Texts of every message of `kind`, oldest first.
    pub fn texts(&self, kind: MessageKind) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|m| m.kind == kind)
            .map(|m| m.text)
            .collect()
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MessageSink for RecordingMessages {
    fn add_message(&self, kind: MessageKind, text: &str) {
        tracing::info!(kind = ?kind, "{}", text);
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedMessage {
                kind,
                text: text.to_string(),
            });
    }

    fn set_panel_open(&self, open: bool) {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner) = open;
    }
}
