//! Presenter contract: the collaborator that paints tooltips and overlays.
//!
//! Shaped after step-based tour libraries: a tour is built step by step,
//! each step may carry a `before_show` hook the presenter awaits before the
//! step becomes current, and the tour reports completion and cancellation
//! through handlers.

pub mod headless;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::ai::Position;
use crate::error::PresenterError;

pub use headless::{HeadlessPresenter, HeadlessTour, ShownStep};

/// Runs before a step is shown. Resolves to the locator the step should
/// attach to, or `None` to show it unanchored.
pub type BeforeShow = Arc<dyn Fn() -> BoxFuture<'static, Option<String>> + Send + Sync>;

/// Called with the current step index when a tour completes or cancels.
pub type TourHandler = Box<dyn Fn(Option<usize>) + Send + Sync>;

/// What a step button does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Back,
    Next,
    Complete,
    /// Cancels the tour; the guide treats this as a pause.
    Pause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepButton {
    pub text: String,
    pub action: ButtonAction,
    /// Rendered de-emphasized.
    pub muted: bool,
}

impl StepButton {
    pub fn new(text: impl Into<String>, action: ButtonAction) -> Self {
        Self {
            text: text.into(),
            action,
            muted: false,
        }
    }

    pub fn muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }
}

/// One presenter step.
#[derive(Clone)]
pub struct PresenterStep {
    pub id: String,
    pub title: String,
    pub text: String,
    pub attach_to: Option<String>,
    pub position: Position,
    pub before_show: Option<BeforeShow>,
    pub buttons: Vec<StepButton>,
    /// Progress label such as "2 / 5".
    pub progress: Option<String>,
}

impl fmt::Debug for PresenterStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenterStep")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("attach_to", &self.attach_to)
            .field("position", &self.position)
            .field("before_show", &self.before_show.is_some())
            .field("buttons", &self.buttons)
            .field("progress", &self.progress)
            .finish()
    }
}

/// Tour-wide presenter options.
#[derive(Debug, Clone)]
pub struct PresenterOptions {
    pub modal_overlay: bool,
    pub scroll_to: bool,
}

impl Default for PresenterOptions {
    fn default() -> Self {
        Self {
            modal_overlay: true,
            scroll_to: true,
        }
    }
}

/// The rendering library.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Make the library available. Callers memoize; implementations may
    /// still be called more than once.
    async fn load(&self) -> Result<(), PresenterError>;

    fn create_tour(&self, options: PresenterOptions) -> Arc<dyn PresenterTour>;
}

/// One tour object inside the presenter.
///
/// Implementations must not hold internal locks while running `before_show`
/// hooks or handlers: handlers call back into the guide.
#[async_trait]
pub trait PresenterTour: Send + Sync {
    fn add_step(&self, step: PresenterStep);

    fn on_complete(&self, handler: TourHandler);

    fn on_cancel(&self, handler: TourHandler);

    async fn start(&self);

    /// Show the next step, or complete on the last one.
    async fn next(&self);

    async fn back(&self);

    fn complete(&self);

    fn cancel(&self);

    fn is_active(&self) -> bool;

    /// Index of the step on screen while active.
    fn current_step(&self) -> Option<usize>;

    /// Show `error` under the step's text, or clear it with `None`.
    fn set_step_error(&self, index: usize, error: Option<String>);

    /// Handle a button click.
    async fn press(&self, action: ButtonAction) {
        match action {
            ButtonAction::Back => self.back().await,
            ButtonAction::Next => self.next().await,
            ButtonAction::Complete => self.complete(),
            ButtonAction::Pause => self.cancel(),
        }
    }
}
