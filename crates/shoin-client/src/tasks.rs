//! Registry of in-flight background work ("pending tasks").
//!
//! Producers [`add`](PendingTasks::add) and [`remove`](PendingTasks::remove)
//! tasks (or hold a [`PendingTaskGuard`]); consumers either register a
//! synchronous listener with [`subscribe`](PendingTasks::subscribe) or await
//! changes on [`watch`](PendingTasks::watch).
//!
//! Every mutation swaps in a new `Arc<TaskMap>`, so readers never see a
//! half-applied change. Mutations are serialized and listeners run on the
//! mutating thread before the mutation returns. A listener may itself add
//! or remove tasks; the nested change is delivered to every listener and the
//! outer, now stale, notification round stops.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex};
use shoin_types::PendingTask;
use tokio::sync::watch;
use tracing::trace;

/// Task key → display name, in insertion order.
pub type TaskMap = IndexMap<String, String>;

type Listener = Arc<dyn Fn(&TaskMap) + Send + Sync>;

/// One-line summary of the mapping, e.g. `"Analyzing Report (+2)"`.
///
/// The first-inserted task is the one named.
pub fn summarize(tasks: &TaskMap) -> Option<String> {
    shoin_types::summarize(tasks.values().map(String::as_str))
}

pub struct PendingTasks {
    state: watch::Sender<Arc<TaskMap>>,
    /// Held for the whole of a mutation, listener calls included.
    mutation: ReentrantMutex<()>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
    /// Bumped by every commit.
    generation: AtomicU64,
}

impl Default for PendingTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PendingTasks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTasks")
            .field("tasks", &*self.current())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

impl PendingTasks {
    pub fn new() -> Self {
        let (state, _) = watch::channel(Arc::new(TaskMap::new()));
        Self {
            state,
            mutation: ReentrantMutex::new(()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Add or rename a task. Renaming keeps its position.
    pub fn add(&self, key: impl Into<String>, display_name: impl Into<String>) {
        let _guard = self.mutation.lock();
        let (key, display_name) = (key.into(), display_name.into());
        trace!(key = %key, display_name = %display_name, "pending task added");

        let mut next = TaskMap::clone(&self.current());
        next.insert(key, display_name);
        self.commit(next);
    }

    /// Add a task record; same as [`add`](Self::add).
    pub fn insert(&self, task: PendingTask) {
        self.add(task.key, task.display_name);
    }

    /// Remove a task. Returns `false` (and notifies nobody) if it was absent.
    pub fn remove(&self, key: &str) -> bool {
        let _guard = self.mutation.lock();
        let current = self.current();
        if !current.contains_key(key) {
            return false;
        }
        trace!(key, "pending task removed");

        let mut next = TaskMap::clone(&current);
        next.shift_remove(key);
        self.commit(next);
        true
    }

    /// Current mapping.
    pub fn current(&self) -> Arc<TaskMap> {
        Arc::clone(&self.state.borrow())
    }

    /// Current tasks as records, in insertion order.
    pub fn tasks(&self) -> Vec<PendingTask> {
        self.current()
            .iter()
            .map(|(key, name)| PendingTask::new(key.as_str(), name.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    pub fn summary(&self) -> Option<String> {
        summarize(&self.current())
    }

    /// Async view of the mapping for consumers on a runtime.
    pub fn watch(&self) -> watch::Receiver<Arc<TaskMap>> {
        self.state.subscribe()
    }

    /// Call `listener` now with the current mapping and again after every
    /// change, until the returned [`Subscription`] is dropped.
    pub fn subscribe<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&TaskMap) + Send + Sync + 'static,
    {
        let _guard = self.mutation.lock();
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(listener);
        self.listeners.lock().push((id, Arc::clone(&listener)));

        listener(&self.current());

        Subscription {
            registry: Arc::downgrade(self),
            id,
        }
    }

    /// Register a task for as long as the returned guard lives.
    pub fn track(
        self: &Arc<Self>,
        key: impl Into<String>,
        display_name: impl Into<String>,
    ) -> PendingTaskGuard {
        let key = key.into();
        self.add(key.clone(), display_name);
        PendingTaskGuard {
            registry: Arc::clone(self),
            key,
        }
    }

    /// [`track`](Self::track) under a freshly generated key.
    pub fn track_new(self: &Arc<Self>, display_name: impl Into<String>) -> PendingTaskGuard {
        let task = PendingTask::with_generated_key(display_name);
        self.track(task.key, task.display_name)
    }

    fn commit(&self, next: TaskMap) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let next = Arc::new(next);
        self.state.send_replace(Arc::clone(&next));

        // snapshot so listeners can (un)subscribe without deadlocking
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            // a listener committed a newer map, which everyone has already seen
            if self.generation.load(Ordering::SeqCst) != generation {
                break;
            }
            listener(&next);
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.listeners.lock().retain(|(existing, _)| *existing != id);
    }
}

/// Listener registration; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    registry: Weak<PendingTasks>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}

/// Removes its task from the registry when dropped.
#[must_use = "dropping the guard removes the task immediately"]
pub struct PendingTaskGuard {
    registry: Arc<PendingTasks>,
    key: String,
}

impl PendingTaskGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for PendingTaskGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.key);
    }
}
