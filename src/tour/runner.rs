//! Tour runner: turns AI steps into a presenter tour and drives its
//! lifecycle.
//!
//! Idle → Running → (Completed | Paused) → Idle. At most one tour runs;
//! starting another tears the previous one down first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::OnceCell;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::flow::expand;
use super::step::{TourStep, merge_step};
use crate::config::{ButtonLabels, TourOptions};
use crate::error::Result;
use crate::host::{Host, MessageKind, MessageSink};
use crate::navigation::Navigator;
use crate::presenter::{
    BeforeShow, ButtonAction, Presenter, PresenterOptions, PresenterStep, StepButton, TourHandler,
};
use crate::registry::AdvanceOn;
use crate::state::{ActiveTour, GuideState, PausedTour};

/// Runs guided tours against the presenter.
pub struct TourRunner {
    state: Arc<GuideState>,
    navigator: Arc<Navigator>,
    presenter: Arc<dyn Presenter>,
    host: Arc<dyn Host>,
    messages: Arc<dyn MessageSink>,
    loaded: OnceCell<()>,
}

impl TourRunner {
    pub fn new(
        state: Arc<GuideState>,
        navigator: Arc<Navigator>,
        presenter: Arc<dyn Presenter>,
        host: Arc<dyn Host>,
        messages: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            state,
            navigator,
            presenter,
            host,
            messages,
            loaded: OnceCell::new(),
        }
    }

    /// Start a tour over `steps`, replacing whatever is running.
    ///
    /// Overlapping starts resolve to the latest call: an earlier start that
    /// is still waiting on the screen gives up instead of installing.
    pub async fn start(self: &Arc<Self>, steps: Vec<TourStep>, options: Option<TourOptions>) -> Result<()> {
        let generation = self.state.begin_start();
        self.loaded
            .get_or_try_init(|| self.presenter.load())
            .await?;

        self.end_active_session();
        self.state.run_cleanups();
        self.state.take_paused();

        if steps.is_empty() {
            debug!("Empty tour, nothing to show");
            return Ok(());
        }

        let config = self.state.config();
        let options = options.unwrap_or(config.tour);
        let features = self.state.features();

        let merged: Vec<TourStep> = steps
            .into_iter()
            .map(|step| merge_step(step, &features))
            .collect();

        let first_screen_ready = match merged.first() {
            Some(first) if first.needs_screen() => {
                self.navigator.ensure_on_correct_screen(first).await;
                true
            }
            _ => false,
        };
        if !self.state.is_latest_start(generation) {
            debug!("A newer tour started while this one was loading");
            return Ok(());
        }

        let expanded: Vec<TourStep> = merged
            .iter()
            .flat_map(|step| {
                match features.iter().find(|f| f.id == step.feature_id) {
                    Some(feature) if step.flow_index.is_none() => expand(step, feature),
                    _ => vec![step.clone()],
                }
            })
            .collect();

        let session_id = Uuid::new_v4();
        let total = expanded.len();
        let tour = self.presenter.create_tour(PresenterOptions::default());
        for (index, step) in expanded.iter().enumerate() {
            let screen_ready = index == 0 && first_screen_ready;
            tour.add_step(self.presenter_step(
                session_id,
                index,
                total,
                step,
                &options,
                &config.labels,
                screen_ready,
            ));
        }
        tour.on_complete(self.on_complete(session_id));
        tour.on_cancel(self.on_cancel(session_id));

        let displaced = self.state.install_session(ActiveTour {
            id: session_id,
            tour: tour.clone(),
            steps: expanded,
            listeners: HashMap::new(),
        });
        if let Some(displaced) = displaced {
            let released = self.state.run_cleanups();
            warn!(session = %displaced.id, released, "Tour displaced by a concurrent start");
            displaced.tour.complete();
        }

        info!(session = %session_id, steps = total, "Starting tour");
        tour.start().await;
        Ok(())
    }

    /// Resume the paused tour from where it stopped. False when nothing is
    /// paused.
    pub async fn resume(self: &Arc<Self>) -> Result<bool> {
        let Some(paused) = self.state.take_paused() else {
            return Ok(false);
        };
        info!(resume_index = paused.resume_index, "Resuming tour");
        self.start(paused.remaining(), None).await?;
        Ok(true)
    }

    /// Stop for good: drop any paused tour and end the running one.
    pub fn cancel(&self) {
        self.state.take_paused();
        if let Some(session) = self.state.take_session() {
            let released = self.state.run_cleanups();
            info!(session = %session.id, released, "Tour cancelled");
            session.tour.cancel();
        }
        self.state.run_cleanups();
    }

    /// Advance the running tour. False when none is running.
    pub async fn step_complete(&self) -> bool {
        match self.state.active_tour(None) {
            Some(tour) if tour.is_active() => {
                tour.next().await;
                true
            }
            _ => false,
        }
    }

    /// Show `message` under the current step, or clear the error with `None`.
    pub fn step_fail(&self, message: Option<&str>) -> bool {
        let Some(tour) = self.state.active_tour(None) else {
            return false;
        };
        let Some(index) = tour.current_step() else {
            return false;
        };
        tour.set_step_error(index, message.map(str::to_string));
        true
    }

    /// Tear down the running session without touching the paused slot.
    fn end_active_session(&self) {
        let Some(session) = self.state.take_session() else {
            return;
        };
        let released = self.state.run_cleanups();
        info!(session = %session.id, released, "Replacing running tour");
        session.tour.complete();
    }

    /// Build the presenter step for `index`. `screen_ready` marks a screen
    /// that `start` already resolved, so the first show skips it.
    #[allow(clippy::too_many_arguments)]
    fn presenter_step(
        self: &Arc<Self>,
        session_id: Uuid,
        index: usize,
        total: usize,
        step: &TourStep,
        options: &TourOptions,
        labels: &ButtonLabels,
        screen_ready: bool,
    ) -> PresenterStep {
        let last = index + 1 == total;
        let mut buttons = Vec::with_capacity(3);
        if index > 0 {
            buttons.push(StepButton::new(&labels.back, ButtonAction::Back));
        }
        buttons.push(StepButton::new(&labels.pause, ButtonAction::Pause));
        let forward = if last {
            StepButton::new(&labels.done, ButtonAction::Complete)
        } else {
            StepButton::new(&labels.next, ButtonAction::Next)
        };
        buttons.push(forward.muted(step.advance_on.is_some()));

        let progress = (options.show_progress && total > 1)
            .then(|| format!("{} / {}", index + 1, total));

        let runner = Arc::downgrade(self);
        let hook_step = step.clone();
        let hook_options = options.clone();
        let screen_ready = Arc::new(AtomicBool::new(screen_ready));
        let before_show: BeforeShow = Arc::new(move || {
            let runner = runner.clone();
            let step = hook_step.clone();
            let options = hook_options.clone();
            let skip_screen = screen_ready.swap(false, Ordering::SeqCst);
            async move {
                match runner.upgrade() {
                    Some(runner) => {
                        runner
                            .before_show(session_id, index, step, options, skip_screen)
                            .await
                    }
                    None => step.selector,
                }
            }
            .boxed()
        });

        PresenterStep {
            id: step.id.clone(),
            title: step.title.clone(),
            text: step.text.clone(),
            attach_to: step.selector.clone(),
            position: step.position.unwrap_or_default(),
            before_show: Some(before_show),
            buttons,
            progress,
        }
    }

    /// Get the page ready for step `index` and return its target.
    async fn before_show(
        self: Arc<Self>,
        session_id: Uuid,
        index: usize,
        step: TourStep,
        options: TourOptions,
        skip_screen: bool,
    ) -> Option<String> {
        if let Some(route) = step.route.as_deref()
            && route != self.navigator.current_route()
        {
            let label = self
                .state
                .features()
                .into_iter()
                .find(|f| f.id == step.feature_id)
                .map(|f| f.name);
            self.navigator
                .navigate_to_route(route, label.as_deref())
                .await;
        }

        // Navigation may have mounted the target
        let fresh = merge_step(step, &self.state.features());
        if !skip_screen && fresh.needs_screen() {
            self.navigator.ensure_on_correct_screen(&fresh).await;
        }

        let timeout = self.state.config().navigation.element_timeout;
        if let Some(wait_for) = fresh.wait_for.as_deref() {
            self.navigator.wait_for_element(wait_for, timeout).await;
        }
        if let Some(selector) = fresh.selector.as_deref() {
            self.navigator.wait_for_element(selector, timeout).await;
        }

        if let Some(advance_on) = fresh.advance_on.as_ref() {
            self.watch_advance(session_id, index, advance_on, fresh.selector.as_deref(), &options);
        }

        fresh.selector
    }

    /// Listen for the step's `advance_on` event and move the tour on.
    fn watch_advance(
        &self,
        session_id: Uuid,
        index: usize,
        advance_on: &AdvanceOn,
        step_selector: Option<&str>,
        options: &TourOptions,
    ) {
        let Some(locator) = advance_on.selector.as_deref().or(step_selector).map(str::to_string)
        else {
            warn!(step = index, "advance_on has no selector to watch");
            return;
        };
        let event_name = advance_on.event.clone();
        let delay = advance_on
            .delay_ms
            .map(Duration::from_millis)
            .unwrap_or(options.advance_delay);

        let mut events = self.host.dom_events();
        let state = Arc::downgrade(&self.state);
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.name == event_name && event.hits(&locator) => break,
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return,
                }
            }
            tokio::time::sleep(delay).await;

            let Some(tour) = state.upgrade().and_then(|s| s.active_tour(Some(session_id))) else {
                return;
            };
            if tour.is_active() && tour.current_step() == Some(index) {
                debug!(step = index, event = %event_name, "Auto-advancing tour");
                tour.next().await;
            }
        });

        self.state.track_listener(session_id, index, task.abort_handle());
    }

    fn on_complete(&self, session_id: Uuid) -> TourHandler {
        let state = Arc::downgrade(&self.state);
        Box::new(move |_index| {
            let Some(state) = state.upgrade() else {
                return;
            };
            if state.take_session_if(session_id).is_none() {
                return;
            }
            let released = state.run_cleanups();
            state.take_paused();
            info!(session = %session_id, released, "Tour complete");
        })
    }

    fn on_cancel(&self, session_id: Uuid) -> TourHandler {
        let state: Weak<GuideState> = Arc::downgrade(&self.state);
        let messages = self.messages.clone();
        Box::new(move |index| {
            let Some(state) = state.upgrade() else {
                return;
            };
            let Some(session) = state.take_session_if(session_id) else {
                return;
            };
            state.run_cleanups();

            let resume_index = index.unwrap_or(0);
            info!(session = %session_id, resume_index, "Tour paused");
            state.set_paused(PausedTour {
                steps: session.steps,
                resume_index,
                paused_at: Utc::now(),
            });
            messages.add_message(
                MessageKind::Resume,
                &format!("Tour paused. Resume from step {}.", resume_index + 1),
            );
        })
    }
}
