//! In-memory test doubles for the store and notification seams.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::notifier::NotificationSink;
use super::store::ResourceStore;
use super::types::{
    ActionOutcome, LifecycleError, ManagedResource, NotificationEvent, ResourceKind, ResourceState,
};

/// Resource store backed by a map keyed on the resource handle
pub struct InMemoryStore {
    kind: ResourceKind,
    resources: Mutex<BTreeMap<String, ManagedResource>>,
    failing: HashSet<String>,
    fail_listing: bool,
    pub mutations: AtomicUsize,
    pub released: AtomicBool,
}

impl InMemoryStore {
    pub fn new(kind: ResourceKind, resources: Vec<ManagedResource>) -> Self {
        Self {
            kind,
            resources: Mutex::new(
                resources
                    .into_iter()
                    .map(|r| (r.handle.clone(), r))
                    .collect(),
            ),
            failing: HashSet::new(),
            fail_listing: false,
            mutations: AtomicUsize::new(0),
            released: AtomicBool::new(false),
        }
    }

    /// Make every mutation of this handle fail
    pub fn failing_on(mut self, handle: &str) -> Self {
        self.failing.insert(handle.to_string());
        self
    }

    /// Make the listing call fail
    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn get(&self, handle: &str) -> Option<ManagedResource> {
        self.resources.lock().unwrap().get(handle).cloned()
    }

    fn check(&self, resource: &ManagedResource, operation: &'static str) -> Result<(), LifecycleError> {
        if self.failing.contains(&resource.handle) {
            return Err(LifecycleError::remote(self.kind, operation, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn list_resources(&self) -> Result<Vec<ManagedResource>, LifecycleError> {
        if self.fail_listing {
            return Err(LifecycleError::remote(self.kind, "list", "connection refused"));
        }
        Ok(self.resources.lock().unwrap().values().cloned().collect())
    }

    async fn disable(&self, resource: &ManagedResource) -> Result<ActionOutcome, LifecycleError> {
        self.check(resource, "disable")?;
        let mut resources = self.resources.lock().unwrap();
        match resources.get_mut(&resource.handle) {
            Some(stored) if stored.state == ResourceState::Disabled => Ok(ActionOutcome::AlreadyApplied),
            Some(stored) => {
                stored.state = ResourceState::Disabled;
                self.mutations.fetch_add(1, Ordering::SeqCst);
                Ok(ActionOutcome::Applied)
            }
            None => Err(LifecycleError::remote(self.kind, "disable", "no such resource")),
        }
    }

    async fn delete(&self, resource: &ManagedResource) -> Result<ActionOutcome, LifecycleError> {
        self.check(resource, "delete")?;
        match self.resources.lock().unwrap().remove(&resource.handle) {
            Some(_) => {
                self.mutations.fetch_add(1, Ordering::SeqCst);
                Ok(ActionOutcome::Applied)
            }
            None => Ok(ActionOutcome::AlreadyApplied),
        }
    }

    async fn release(&self) -> Result<(), LifecycleError> {
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Notification sink that keeps every event it receives
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<NotificationEvent>>,
    pub reject: bool,
}

impl RecordingNotifier {
    pub fn rejecting() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            reject: true,
        }
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<(), LifecycleError> {
        if self.reject {
            return Err(LifecycleError::Notification("sink offline".to_string()));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
