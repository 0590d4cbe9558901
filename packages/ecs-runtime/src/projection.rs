//! Read-only projections: derived views recomputed once per frame and
//! exposed to callers outside the scheduler loop (e.g. the API server).

use std::sync::Arc;

use parking_lot::Mutex;

use ecs_core::{EcsError, Store};

use crate::system::BoxFuture;

/// The outcome of one projection evaluation.
#[derive(Debug, Clone)]
pub enum ProjectionStatus<T> {
    /// Has not produced a first value yet.
    Loading,
    Ready(T),
    Failed(EcsError),
    /// Stop recomputing this projection; its last `Ready`/`Failed` value is final.
    Halt,
}

impl<T> ProjectionStatus<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            ProjectionStatus::Ready(value) => Some(value),
            _ => None,
        }
    }
}

fn status_changed<T: PartialEq>(old: &ProjectionStatus<T>, new: &ProjectionStatus<T>) -> bool {
    match (old, new) {
        (ProjectionStatus::Loading, ProjectionStatus::Loading) => false,
        (ProjectionStatus::Ready(a), ProjectionStatus::Ready(b)) => a != b,
        (ProjectionStatus::Failed(a), ProjectionStatus::Failed(b)) => a.to_string() != b.to_string(),
        (ProjectionStatus::Halt, ProjectionStatus::Halt) => false,
        _ => true,
    }
}

/// A derived, read-only view over the Store, recomputed every frame until it halts.
pub trait Projection: Send + Sync {
    type Attrs: Send + Sync + Clone + 'static;
    type Output: Send + Sync + Clone + PartialEq + 'static;

    fn name(&self) -> &'static str;

    /// Runs any number of queries against `store` and produces the next status.
    fn update(&self, store: &Store, attrs: &Self::Attrs) -> ProjectionStatus<Self::Output>;

    /// Called once per frame when the status actually changed. Never called
    /// with `new == Halt`; a halted evaluation freezes the last published
    /// status instead of replacing it.
    fn on_change(
        &self,
        _attrs: &Self::Attrs,
        _new: &ProjectionStatus<Self::Output>,
        _old: &ProjectionStatus<Self::Output>,
    ) {
    }
}

trait ErasedProjection: Send + Sync {
    fn name(&self) -> &'static str;
    fn update_and_notify(self: Arc<Self>, store: Arc<Store>) -> BoxFuture<'static, ()>;
}

struct ProjectionHandle<P: Projection> {
    projection: Arc<P>,
    attrs: P::Attrs,
    last: Mutex<ProjectionStatus<P::Output>>,
}

impl<P: Projection + 'static> ErasedProjection for ProjectionHandle<P> {
    fn name(&self) -> &'static str {
        self.projection.name()
    }

    fn update_and_notify(self: Arc<Self>, store: Arc<Store>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            // `update` always runs, even after a prior Halt: a later
            // evaluation may leave Halt and resume publishing.
            let new_status = self.projection.update(&store, &self.attrs);
            if matches!(new_status, ProjectionStatus::Halt) {
                return;
            }
            let old_status = self.last.lock().clone();
            if status_changed(&old_status, &new_status) {
                self.projection.on_change(&self.attrs, &new_status, &old_status);
            }
            *self.last.lock() = new_status;
        })
    }
}

/// The set of projections a scheduler drives at each frame boundary.
#[derive(Clone, Default)]
pub struct Projections {
    handles: Vec<Arc<dyn ErasedProjection>>,
}

impl Projections {
    pub fn new() -> Self {
        Self { handles: Vec::new() }
    }

    pub fn register<P: Projection + 'static>(&mut self, projection: P, attrs: P::Attrs) {
        self.handles.push(Arc::new(ProjectionHandle {
            projection: Arc::new(projection),
            attrs,
            last: Mutex::new(ProjectionStatus::Loading),
        }));
    }

    /// Concurrently re-evaluates every registered projection against `store`.
    pub async fn update_all(&self, store: &Arc<Store>) {
        let mut join_set = tokio::task::JoinSet::new();
        for handle in self.handles.clone() {
            let store = store.clone();
            join_set.spawn(async move { handle.update_and_notify(store).await });
        }
        while let Some(res) = join_set.join_next().await {
            if let Err(join_err) = res {
                tracing::error!(error = %join_err, "projection update task panicked");
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecs_core::config::EngineConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountProjection;

    impl Projection for CountProjection {
        type Attrs = ();
        type Output = usize;

        fn name(&self) -> &'static str {
            "count"
        }

        fn update(&self, store: &Store, _attrs: &()) -> ProjectionStatus<usize> {
            ProjectionStatus::Ready(store.all_entities().len())
        }
    }

    #[tokio::test]
    async fn update_all_runs_every_registered_projection() {
        let store = Arc::new(Store::new(EngineConfig::default()));
        let mut projections = Projections::new();
        projections.register(CountProjection, ());
        projections.update_all(&store).await;
    }

    #[tokio::test]
    async fn on_change_fires_only_when_status_differs() {
        static CHANGES: AtomicUsize = AtomicUsize::new(0);

        struct Flip(AtomicUsize);
        impl Projection for Flip {
            type Attrs = ();
            type Output = usize;
            fn name(&self) -> &'static str {
                "flip"
            }
            fn update(&self, _store: &Store, _attrs: &()) -> ProjectionStatus<usize> {
                ProjectionStatus::Ready(self.0.load(Ordering::SeqCst) / 2)
            }
            fn on_change(
                &self,
                _attrs: &(),
                _new: &ProjectionStatus<usize>,
                _old: &ProjectionStatus<usize>,
            ) {
                CHANGES.fetch_add(1, Ordering::SeqCst);
            }
        }

        let store = Arc::new(Store::new(EngineConfig::default()));
        let mut projections = Projections::new();
        projections.register(Flip(AtomicUsize::new(0)), ());
        projections.update_all(&store).await;
        projections.update_all(&store).await;
        assert_eq!(CHANGES.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn halt_is_reevaluated_and_resumes_publishing() {
        static ON_CHANGE_CALLS: AtomicUsize = AtomicUsize::new(0);

        struct HaltOnce(AtomicUsize);
        impl Projection for HaltOnce {
            type Attrs = ();
            type Output = usize;
            fn name(&self) -> &'static str {
                "halt-once"
            }
            fn update(&self, _store: &Store, _attrs: &()) -> ProjectionStatus<usize> {
                let call = self.0.fetch_add(1, Ordering::SeqCst) + 1;
                if call == 1 {
                    ProjectionStatus::Halt
                } else {
                    ProjectionStatus::Ready(call)
                }
            }
            fn on_change(
                &self,
                _attrs: &(),
                _new: &ProjectionStatus<usize>,
                _old: &ProjectionStatus<usize>,
            ) {
                ON_CHANGE_CALLS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let store = Arc::new(Store::new(EngineConfig::default()));
        let mut projections = Projections::new();
        projections.register(HaltOnce(AtomicUsize::new(0)), ());

        // First evaluation returns Halt: no publish, no on_change.
        projections.update_all(&store).await;
        assert_eq!(ON_CHANGE_CALLS.load(Ordering::SeqCst), 0);

        // Evaluation keeps running on later frames and leaves Halt, resuming publishing.
        projections.update_all(&store).await;
        assert_eq!(ON_CHANGE_CALLS.load(Ordering::SeqCst), 1);
    }
}
