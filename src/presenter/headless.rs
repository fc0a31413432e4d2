//! Headless presenter: keeps tour state in memory and logs what it would
//! paint. Used by the demo binary and the tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info};

use super::{
    Presenter, PresenterOptions, PresenterStep, PresenterTour, StepButton, TourHandler,
};
use crate::error::PresenterError;

/// A step as it was shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownStep {
    pub index: usize,
    pub id: String,
    pub title: String,
    pub attached_to: Option<String>,
    pub progress: Option<String>,
}

/// Presenter that renders nothing.
#[derive(Default)]
pub struct HeadlessPresenter {
    loads: AtomicUsize,
    tours: Mutex<Vec<Arc<HeadlessTour>>>,
}

impl HeadlessPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `load` ran.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Every tour created so far, oldest first.
    pub fn tours(&self) -> Vec<Arc<HeadlessTour>> {
        self.tours
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_tour(&self) -> Option<Arc<HeadlessTour>> {
        self.tours().pop()
    }
}

#[async_trait]
impl Presenter for HeadlessPresenter {
    async fn load(&self) -> Result<(), PresenterError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create_tour(&self, options: PresenterOptions) -> Arc<dyn PresenterTour> {
        let tour = Arc::new(HeadlessTour::new(options));
        self.tours
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tour.clone());
        tour
    }
}

type SharedHandler = Arc<dyn Fn(Option<usize>) + Send + Sync>;

#[derive(Default)]
struct TourInner {
    steps: Vec<PresenterStep>,
    current: Option<usize>,
    active: bool,
    shown: Vec<ShownStep>,
    errors: HashMap<usize, String>,
    on_complete: Vec<SharedHandler>,
    on_cancel: Vec<SharedHandler>,
}

/// Tour held by `HeadlessPresenter`.
pub struct HeadlessTour {
    options: PresenterOptions,
    inner: Mutex<TourInner>,
}

impl HeadlessTour {
    fn new(options: PresenterOptions) -> Self {
        Self {
            options,
            inner: Mutex::new(TourInner::default()),
        }
    }

    pub fn options(&self) -> &PresenterOptions {
        &self.options
    }

    pub fn step_count(&self) -> usize {
        self.inner().steps.len()
    }

    pub fn step(&self, index: usize) -> Option<PresenterStep> {
        self.inner().steps.get(index).cloned()
    }

    pub fn buttons(&self, index: usize) -> Vec<StepButton> {
        self.step(index).map(|s| s.buttons).unwrap_or_default()
    }

    /// Every step shown so far, in order.
    pub fn shown(&self) -> Vec<ShownStep> {
        self.inner().shown.clone()
    }

    /// Step text with its inline error, as it would be painted.
    pub fn rendered_text(&self, index: usize) -> Option<String> {
        let inner = self.inner();
        let step = inner.steps.get(index)?;
        Some(match inner.errors.get(&index) {
            Some(error) => format!("{}\n\n⚠ {}", step.text, error),
            None => step.text.clone(),
        })
    }

    fn inner(&self) -> MutexGuard<'_, TourInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn show(&self, index: usize) {
        let step = {
            let inner = self.inner();
            if !inner.active {
                return;
            }
            match inner.steps.get(index) {
                Some(step) => step.clone(),
                None => return,
            }
        };

        let attached_to = match &step.before_show {
            Some(hook) => hook().await,
            None => step.attach_to.clone(),
        };

        let mut inner = self.inner();
        // Cancelled while the hook ran
        if !inner.active {
            return;
        }
        inner.current = Some(index);
        info!(
            step = index,
            title = %step.title,
            target = ?attached_to,
            progress = ?step.progress,
            "Showing tour step"
        );
        inner.shown.push(ShownStep {
            index,
            id: step.id,
            title: step.title,
            attached_to,
            progress: step.progress,
        });
    }

    fn finish(&self, cancelled: bool) {
        let (handlers, current) = {
            let mut inner = self.inner();
            if !inner.active {
                return;
            }
            inner.active = false;
            let handlers = if cancelled {
                inner.on_cancel.clone()
            } else {
                inner.on_complete.clone()
            };
            (handlers, inner.current)
        };
        debug!(cancelled, step = ?current, "Tour finished");
        for handler in handlers {
            handler(current);
        }
    }
}

#[async_trait]
impl PresenterTour for HeadlessTour {
    fn add_step(&self, step: PresenterStep) {
        self.inner().steps.push(step);
    }

    fn on_complete(&self, handler: TourHandler) {
        self.inner().on_complete.push(Arc::from(handler));
    }

    fn on_cancel(&self, handler: TourHandler) {
        self.inner().on_cancel.push(Arc::from(handler));
    }

    async fn start(&self) {
        {
            let mut inner = self.inner();
            if inner.steps.is_empty() {
                return;
            }
            inner.active = true;
            inner.current = None;
        }
        self.show(0).await;
    }

    async fn next(&self) {
        let target = {
            let inner = self.inner();
            if !inner.active {
                return;
            }
            match inner.current {
                None => return,
                Some(current) if current + 1 < inner.steps.len() => Some(current + 1),
                Some(_) => None,
            }
        };
        match target {
            Some(index) => self.show(index).await,
            None => self.complete(),
        }
    }

    async fn back(&self) {
        let target = {
            let inner = self.inner();
            match inner.current {
                Some(current) if inner.active && current > 0 => current - 1,
                _ => return,
            }
        };
        self.show(target).await;
    }

    fn complete(&self) {
        self.finish(false);
    }

    fn cancel(&self) {
        self.finish(true);
    }

    fn is_active(&self) -> bool {
        self.inner().active
    }

    fn current_step(&self) -> Option<usize> {
        let inner = self.inner();
        inner.current.filter(|_| inner.active)
    }

    fn set_step_error(&self, index: usize, error: Option<String>) {
        let mut inner = self.inner();
        match error {
            Some(error) => {
                inner.errors.insert(index, error);
            }
            None => {
                inner.errors.remove(&index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Position;
    use crate::presenter::ButtonAction;

    fn step(id: &str) -> PresenterStep {
        PresenterStep {
            id: id.to_string(),
            title: id.to_uppercase(),
            text: format!("About {id}"),
            attach_to: Some(format!("#{id}")),
            position: Position::Auto,
            before_show: None,
            buttons: vec![StepButton::new("Next", ButtonAction::Next)],
            progress: None,
        }
    }

    fn tour_with(ids: &[&str]) -> Arc<dyn PresenterTour> {
        let presenter = HeadlessPresenter::new();
        let tour = presenter.create_tour(PresenterOptions::default());
        for id in ids {
            tour.add_step(step(id));
        }
        tour
    }

    #[tokio::test]
    async fn walks_steps_and_completes() {
        let tour = tour_with(&["a", "b"]);
        let completed = Arc::new(Mutex::new(None));
        let seen = completed.clone();
        tour.on_complete(Box::new(move |index| {
            *seen.lock().unwrap() = Some(index);
        }));

        tour.start().await;
        assert_eq!(tour.current_step(), Some(0));
        tour.next().await;
        assert_eq!(tour.current_step(), Some(1));
        tour.next().await;
        assert!(!tour.is_active());
        assert_eq!(*completed.lock().unwrap(), Some(Some(1)));
    }

    #[tokio::test]
    async fn pause_button_cancels_with_index() {
        let tour = tour_with(&["a", "b", "c"]);
        let cancelled = Arc::new(Mutex::new(None));
        let seen = cancelled.clone();
        tour.on_cancel(Box::new(move |index| {
            *seen.lock().unwrap() = index;
        }));

        tour.start().await;
        tour.press(ButtonAction::Next).await;
        tour.press(ButtonAction::Pause).await;
        assert!(!tour.is_active());
        assert_eq!(*cancelled.lock().unwrap(), Some(1));
    }

    #[tokio::test]
    async fn before_show_picks_attachment() {
        let presenter = HeadlessPresenter::new();
        let tour = presenter.create_tour(PresenterOptions::default());
        let mut first = step("a");
        first.before_show = Some(Arc::new(|| {
            Box::pin(async { Some("#resolved".to_string()) })
                as futures::future::BoxFuture<'static, Option<String>>
        }));
        tour.add_step(first);
        tour.start().await;

        let headless = presenter.last_tour().unwrap();
        assert_eq!(headless.shown()[0].attached_to.as_deref(), Some("#resolved"));
    }

    #[tokio::test]
    async fn back_stops_at_first_step() {
        let tour = tour_with(&["a", "b"]);
        tour.start().await;
        tour.back().await;
        assert_eq!(tour.current_step(), Some(0));
        tour.next().await;
        tour.back().await;
        assert_eq!(tour.current_step(), Some(0));
    }

    #[tokio::test]
    async fn step_error_is_rendered_and_cleared() {
        let presenter = HeadlessPresenter::new();
        let tour = presenter.create_tour(PresenterOptions::default());
        tour.add_step(step("a"));
        let headless = presenter.last_tour().unwrap();

        tour.set_step_error(0, Some("Fill in a name first".to_string()));
        assert!(headless.rendered_text(0).unwrap().contains("Fill in a name first"));
        tour.set_step_error(0, None);
        assert_eq!(headless.rendered_text(0).unwrap(), "About a");
    }
}
