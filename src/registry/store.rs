//! Feature registry: live and ghost features plus their flow steps.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::model::{Feature, FeatureEntry, FeatureSpec, FlowStep, StepSpec};

/// Default broadcast channel capacity. Sized for a full page mounting its
/// bindings in one tick.
const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

/// Change notification fanned out to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    FeatureRegistered { id: String },
    FeatureGhosted { id: String },
    StepRegistered { feature_id: String, parent_step: Option<usize>, index: usize },
    StepRemoved { feature_id: String, parent_step: Option<usize>, index: usize },
}

/// Flow steps of one feature keyed by `(parent_step, index)`.
///
/// `None` sorts before `Some`, so iteration yields every top-level step
/// before any child.
type StepTree = BTreeMap<(Option<usize>, usize), StepSpec>;

#[derive(Default)]
struct Inner {
    /// Registration order of ids, for stable snapshots.
    order: Vec<String>,
    entries: HashMap<String, FeatureEntry>,
    steps: HashMap<String, StepTree>,
}

/// Registry of features the tour can point at.
///
/// Features are never removed: unregistering downgrades to a ghost so the
/// AI can still reference features that live on other pages.
pub struct FeatureRegistry {
    inner: RwLock<Inner>,
    tx: broadcast::Sender<RegistryEvent>,
}

impl FeatureRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    /// Create a registry whose subscribers may trail by up to `capacity`
    /// events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            inner: RwLock::new(Inner::default()),
            tx,
        }
    }

    /// Subscribe to change events. Drop the receiver to unsubscribe.
    ///
    /// Delivery is lossy past the channel capacity: a receiver that trails
    /// by more gets `RecvError::Lagged` and skips the oldest events. On lag,
    /// re-read `snapshot()` rather than replaying events.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.tx.subscribe()
    }

    /// Upsert a live feature, replacing any live or ghost entry with its id.
    pub fn register_feature(&self, spec: FeatureSpec) {
        if spec.id.trim().is_empty() || spec.name.trim().is_empty() {
            warn!(
                id = %spec.id,
                name = %spec.name,
                "Dropped feature registration: id and name are required"
            );
            return;
        }
        let id = spec.id.clone();
        {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            if !inner.entries.contains_key(&id) {
                inner.order.push(id.clone());
            }
            inner.entries.insert(id.clone(), FeatureEntry::Live(spec));
        }
        debug!(feature = %id, "Registered feature");
        self.notify(RegistryEvent::FeatureRegistered { id });
    }

    /// Downgrade a feature to a ghost and drop its flow steps.
    pub fn unregister_feature(&self, id: &str) {
        {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            let Some(entry) = inner.entries.remove(id) else {
                return;
            };
            inner.entries.insert(id.to_string(), entry.into_ghost());
            inner.steps.remove(id);
        }
        debug!(feature = %id, "Feature unmounted, kept as ghost");
        self.notify(RegistryEvent::FeatureGhosted { id: id.to_string() });
    }

    /// Upsert one flow step of `feature_id`.
    pub fn register_step(
        &self,
        feature_id: &str,
        index: usize,
        parent_step: Option<usize>,
        spec: StepSpec,
    ) {
        if feature_id.trim().is_empty() {
            warn!(index, "Dropped step registration: feature id is required");
            return;
        }
        {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            inner
                .steps
                .entry(feature_id.to_string())
                .or_default()
                .insert((parent_step, index), spec);
        }
        self.notify(RegistryEvent::StepRegistered {
            feature_id: feature_id.to_string(),
            parent_step,
            index,
        });
    }

    /// Remove one flow step. Removing the last one drops the feature's step
    /// map, never the feature.
    pub fn unregister_step(&self, feature_id: &str, index: usize, parent_step: Option<usize>) {
        {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            let Some(tree) = inner.steps.get_mut(feature_id) else {
                return;
            };
            if tree.remove(&(parent_step, index)).is_none() {
                return;
            }
            if tree.is_empty() {
                inner.steps.remove(feature_id);
            }
        }
        self.notify(RegistryEvent::StepRemoved {
            feature_id: feature_id.to_string(),
            parent_step,
            index,
        });
    }

    /// True only for a mounted (non-ghost) feature.
    pub fn is_registered(&self, id: &str) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.entries.get(id).is_some_and(FeatureEntry::is_live)
    }

    /// Plain records for every live and ghost feature, in registration order.
    pub fn snapshot(&self) -> Vec<Feature> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .order
            .iter()
            .filter_map(|id| {
                let entry = inner.entries.get(id)?;
                let flow = inner.steps.get(id).map(flatten).unwrap_or_default();
                Some(entry.to_feature(flow))
            })
            .collect()
    }

    /// Number of known features, live or ghost.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notify(&self, event: RegistryEvent) {
        // No receivers is fine
        let _ = self.tx.send(event);
    }
}

impl Default for FeatureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Top-level steps in index order, each followed by its children in index
/// order. Children of a missing parent are dropped.
fn flatten(tree: &StepTree) -> Vec<FlowStep> {
    let entry = |parent_step: Option<usize>, index: usize, spec: &StepSpec| FlowStep {
        index,
        parent_step,
        selector: spec.selector.clone(),
        wait_for: spec.wait_for.clone(),
        advance_on: spec.advance_on.clone(),
    };

    let mut flow = Vec::with_capacity(tree.len());
    for ((_, index), spec) in tree.iter().filter(|((parent, _), _)| parent.is_none()) {
        flow.push(entry(None, *index, spec));
        flow.extend(
            tree.range((Some(*index), 0)..=(Some(*index), usize::MAX))
                .map(|((parent, child), spec)| entry(*parent, *child, spec)),
        );
    }
    flow
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export() -> FeatureSpec {
        FeatureSpec::new("export", "Export")
            .with_description("Export the canvas")
            .with_selector("#export-btn")
            .with_route("/canvas")
    }

    #[test]
    fn unregister_keeps_ghost() {
        let registry = FeatureRegistry::new();
        registry.register_feature(export());
        registry.unregister_feature("export");

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        let ghost = &snapshot[0];
        assert_eq!(ghost.id, "export");
        assert!(ghost.ghost);
        assert_eq!(ghost.selector, None);
        assert_eq!(ghost.name, "Export");
        assert_eq!(ghost.description.as_deref(), Some("Export the canvas"));
        assert_eq!(ghost.route.as_deref(), Some("/canvas"));
        assert!(!registry.is_registered("export"));
    }

    #[test]
    fn reregister_restores_live_entry() {
        let registry = FeatureRegistry::new();
        registry.register_feature(export());
        registry.unregister_feature("export");
        registry.register_feature(export().with_selector("#export-v2"));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot[0].ghost);
        assert_eq!(snapshot[0].selector.as_deref(), Some("#export-v2"));
        assert!(registry.is_registered("export"));
    }

    #[test]
    fn unregister_unknown_is_noop() {
        let registry = FeatureRegistry::new();
        let mut rx = registry.subscribe();
        registry.unregister_feature("missing");
        assert!(registry.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn registration_without_identity_is_dropped() {
        let registry = FeatureRegistry::new();
        registry.register_feature(FeatureSpec::new("", "Nameless id"));
        registry.register_feature(FeatureSpec::new("no-name", " "));
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_keeps_registration_order() {
        let registry = FeatureRegistry::new();
        registry.register_feature(FeatureSpec::new("b", "B"));
        registry.register_feature(FeatureSpec::new("a", "A"));
        registry.register_feature(FeatureSpec::new("b", "B again"));

        let ids: Vec<_> = registry.snapshot().into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn flow_inlines_children_after_parent() {
        let registry = FeatureRegistry::new();
        registry.register_feature(FeatureSpec::new("form", "Form"));
        registry.register_step("form", 1, None, StepSpec::at(".submit"));
        registry.register_step("form", 1, Some(0), StepSpec::at(".name"));
        registry.register_step("form", 0, None, StepSpec::at(".open"));
        registry.register_step("form", 0, Some(0), StepSpec::at(".email"));
        registry.register_step("form", 3, Some(9), StepSpec::at(".orphan"));

        let snapshot = registry.snapshot();
        let flow = &snapshot[0].flow;
        let selectors: Vec<_> = flow.iter().filter_map(|s| s.selector.as_deref()).collect();
        assert_eq!(selectors, vec![".open", ".email", ".name", ".submit"]);
        assert_eq!(flow[1].parent_step, Some(0));
        assert_eq!(flow[2].index, 1);
    }

    #[test]
    fn removing_last_step_drops_flow_but_not_feature() {
        let registry = FeatureRegistry::new();
        registry.register_feature(FeatureSpec::new("form", "Form"));
        registry.register_step("form", 0, None, StepSpec::at(".a"));
        registry.unregister_step("form", 0, None);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].flow.is_empty());
        assert!(registry.is_registered("form"));
    }

    #[test]
    fn unregister_feature_prunes_steps() {
        let registry = FeatureRegistry::new();
        registry.register_feature(FeatureSpec::new("form", "Form"));
        registry.register_step("form", 0, None, StepSpec::at(".a"));
        registry.unregister_feature("form");
        assert!(registry.snapshot()[0].flow.is_empty());

        registry.register_feature(FeatureSpec::new("form", "Form"));
        assert!(registry.snapshot()[0].flow.is_empty());
    }

    #[test]
    fn subscribers_see_every_mutation() {
        let registry = FeatureRegistry::new();
        let mut rx = registry.subscribe();

        registry.register_feature(export());
        registry.register_step("export", 0, None, StepSpec::at(".a"));
        registry.unregister_step("export", 0, None);
        registry.unregister_feature("export");

        assert_eq!(
            rx.try_recv().unwrap(),
            RegistryEvent::FeatureRegistered { id: "export".to_string() }
        );
        assert!(matches!(rx.try_recv().unwrap(), RegistryEvent::StepRegistered { index: 0, .. }));
        assert!(matches!(rx.try_recv().unwrap(), RegistryEvent::StepRemoved { index: 0, .. }));
        assert_eq!(
            rx.try_recv().unwrap(),
            RegistryEvent::FeatureGhosted { id: "export".to_string() }
        );
    }

    #[test]
    fn subscribers_keep_up_with_a_page_mount_burst() {
        let registry = FeatureRegistry::new();
        let mut rx = registry.subscribe();
        for i in 0..500 {
            registry.register_feature(FeatureSpec::new(format!("f{i}"), format!("Feature {i}")));
        }

        let mut seen = 0;
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, RegistryEvent::FeatureRegistered { .. }));
            seen += 1;
        }
        assert_eq!(seen, 500);
    }

    #[test]
    fn lagging_subscriber_recovers_from_snapshot() {
        let registry = FeatureRegistry::with_capacity(4);
        let mut rx = registry.subscribe();
        for i in 0..10 {
            registry.register_feature(FeatureSpec::new(format!("f{i}"), format!("Feature {i}")));
        }

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(6))
        ));
        assert_eq!(registry.snapshot().len(), 10);
    }
}
