//! Shared guide state: config, collaborators, conversation, and the tour
//! session slots.
//!
//! One `GuideState` is built at the composition root and handed by `Arc` to
//! every component. Locks are only ever held for a field read or swap, never
//! across an `.await` or a call into a collaborator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::ai::{AiProvider, ChatMessage};
use crate::config::{ConfigUpdate, GuideConfig};
use crate::host::Router;
use crate::presenter::PresenterTour;
use crate::registry::{Feature, FeatureRegistry};
use crate::tour::TourStep;

/// Teardown callback released when a tour ends.
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// Where the tour lifecycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TourPhase {
    Idle,
    Running,
    Paused,
}

impl std::fmt::Display for TourPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
        };
        write!(f, "{s}")
    }
}

/// Steps and position saved when the user pauses a tour.
#[derive(Debug, Clone)]
pub struct PausedTour {
    /// The full expanded sequence of the paused tour.
    pub steps: Vec<TourStep>,
    pub resume_index: usize,
    pub paused_at: DateTime<Utc>,
}

impl PausedTour {
    /// Steps still to show.
    pub fn remaining(&self) -> Vec<TourStep> {
        self.steps
            .get(self.resume_index..)
            .map(<[TourStep]>::to_vec)
            .unwrap_or_default()
    }
}

/// The running tour.
pub(crate) struct ActiveTour {
    pub id: Uuid,
    pub tour: Arc<dyn PresenterTour>,
    pub steps: Vec<TourStep>,
    /// Auto-advance listener per step index.
    pub listeners: HashMap<usize, AbortHandle>,
}

/// Process-wide guide state.
pub struct GuideState {
    config: RwLock<GuideConfig>,
    provider: Arc<dyn AiProvider>,
    router: RwLock<Option<Arc<dyn Router>>>,
    registry: Arc<FeatureRegistry>,
    history: Mutex<Vec<ChatMessage>>,
    active: Mutex<Option<ActiveTour>>,
    paused: Mutex<Option<PausedTour>>,
    cleanups: Mutex<Vec<Cleanup>>,
    panel_open: AtomicBool,
    starts: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl GuideState {
    pub fn new(
        config: GuideConfig,
        provider: Arc<dyn AiProvider>,
        registry: Arc<FeatureRegistry>,
        router: Option<Arc<dyn Router>>,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            provider,
            router: RwLock::new(router),
            registry,
            history: Mutex::new(Vec::new()),
            active: Mutex::new(None),
            paused: Mutex::new(None),
            cleanups: Mutex::new(Vec::new()),
            panel_open: AtomicBool::new(false),
            starts: AtomicU64::new(0),
        }
    }

    // ── Config and collaborators ────────────────────────────────────────

    pub fn config(&self) -> GuideConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_config(&self, mut update: ConfigUpdate) {
        if let Some(router) = update.router.take() {
            self.set_router(Some(router));
        }
        self.config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(update);
    }

    pub fn provider(&self) -> Arc<dyn AiProvider> {
        self.provider.clone()
    }

    pub fn router(&self) -> Option<Arc<dyn Router>> {
        self.router
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_router(&self, router: Option<Arc<dyn Router>>) {
        *self.router.write().unwrap_or_else(PoisonError::into_inner) = router;
    }

    pub fn registry(&self) -> &Arc<FeatureRegistry> {
        &self.registry
    }

    /// Registry snapshot, followed by config features the registry does not
    /// know about.
    pub fn features(&self) -> Vec<Feature> {
        let mut features = self.registry.snapshot();
        let known: Vec<String> = features.iter().map(|f| f.id.clone()).collect();
        let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
        features.extend(
            config
                .features
                .iter()
                .filter(|f| !known.contains(&f.id))
                .cloned(),
        );
        features
    }

    pub fn set_panel_open(&self, open: bool) {
        self.panel_open.store(open, Ordering::SeqCst);
    }

    pub fn is_panel_open(&self) -> bool {
        self.panel_open.load(Ordering::SeqCst)
    }

    // ── Conversation ───────────────────────────────────────────────────

    pub fn history(&self) -> Vec<ChatMessage> {
        lock(&self.history).clone()
    }

    /// Append one completed round-trip.
    pub fn record_exchange(&self, user: ChatMessage, assistant: ChatMessage) {
        let mut history = lock(&self.history);
        history.push(user);
        history.push(assistant);
    }

    // ── Tour session ───────────────────────────────────────────────────

    pub fn phase(&self) -> TourPhase {
        if lock(&self.active).is_some() {
            TourPhase::Running
        } else if lock(&self.paused).is_some() {
            TourPhase::Paused
        } else {
            TourPhase::Idle
        }
    }

    /// Claim the next start generation. Only the latest claim may install
    /// a session.
    pub(crate) fn begin_start(&self) -> u64 {
        self.starts.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn is_latest_start(&self, generation: u64) -> bool {
        self.starts.load(Ordering::SeqCst) == generation
    }

    /// Install `session`, handing back whatever it displaced.
    pub(crate) fn install_session(&self, session: ActiveTour) -> Option<ActiveTour> {
        lock(&self.active).replace(session)
    }

    pub(crate) fn take_session(&self) -> Option<ActiveTour> {
        lock(&self.active).take()
    }

    /// Take the session only if it is still `id`.
    pub(crate) fn take_session_if(&self, id: Uuid) -> Option<ActiveTour> {
        let mut active = lock(&self.active);
        if active.as_ref().is_some_and(|s| s.id == id) {
            active.take()
        } else {
            None
        }
    }

    /// Presenter tour of the running session, optionally pinned to `id`.
    pub(crate) fn active_tour(&self, id: Option<Uuid>) -> Option<Arc<dyn PresenterTour>> {
        lock(&self.active)
            .as_ref()
            .filter(|s| id.is_none_or(|id| s.id == id))
            .map(|s| s.tour.clone())
    }

    /// Track the auto-advance listener for `index`, aborting the one it
    /// replaces. Returns false when the session is gone.
    pub(crate) fn track_listener(&self, id: Uuid, index: usize, handle: AbortHandle) -> bool {
        let replaced = {
            let mut active = lock(&self.active);
            match active.as_mut().filter(|s| s.id == id) {
                Some(session) => session.listeners.insert(index, handle.clone()),
                None => {
                    handle.abort();
                    return false;
                }
            }
        };
        if let Some(old) = replaced {
            old.abort();
        }
        self.add_cleanup(Box::new(move || handle.abort()));
        true
    }

    pub fn add_cleanup(&self, cleanup: Cleanup) {
        lock(&self.cleanups).push(cleanup);
    }

    /// Run and forget every pending cleanup.
    pub fn run_cleanups(&self) -> usize {
        let pending = std::mem::take(&mut *lock(&self.cleanups));
        let count = pending.len();
        for cleanup in pending {
            cleanup();
        }
        count
    }

    pub fn set_paused(&self, paused: PausedTour) {
        *lock(&self.paused) = Some(paused);
    }

    pub fn take_paused(&self) -> Option<PausedTour> {
        lock(&self.paused).take()
    }

    pub fn paused(&self) -> Option<PausedTour> {
        lock(&self.paused).clone()
    }
}
