//! The frame loop: Startup -> (FrameStart -> Batch -> FrameEnd -> FrameIdle)*
//! -> Shutdown, driving registered systems and projections against one Store.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ecs_core::event::StampedEvent;
use ecs_core::{EcsError, Result, Store};

use crate::projection::Projections;
use crate::system::{EventSystem, RunCondition, System};

/// The scheduler's current phase, surfaced mainly for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Startup,
    FrameStart,
    Batch,
    FrameEnd,
    FrameIdle,
    Shutdown,
}

/// Owns system/event-system registrations and drives the frame loop.
///
/// Batch placement happens eagerly at registration time: a system is
/// inserted into the earliest existing batch whose locked-component union is
/// disjoint from its own, or appended as a new batch if none qualifies.
/// `run_after` is always honored first and strictly: it forces placement
/// into a batch index after every named predecessor's batch, even when an
/// earlier batch would otherwise have been lock-disjoint.
pub struct Scheduler {
    store: Arc<Store>,
    phase: Phase,
    frame_count: u64,
    startup_systems: Vec<Arc<dyn System>>,
    frame_start_systems: Vec<Arc<dyn System>>,
    batches: Vec<Vec<Arc<dyn System>>>,
    frame_end_systems: Vec<Arc<dyn System>>,
    shutdown_systems: Vec<Arc<dyn System>>,
    event_systems: Vec<Arc<dyn EventSystem>>,
    projections: Projections,
}

impl Scheduler {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            phase: Phase::Startup,
            frame_count: 0,
            startup_systems: Vec::new(),
            frame_start_systems: Vec::new(),
            batches: Vec::new(),
            frame_end_systems: Vec::new(),
            shutdown_systems: Vec::new(),
            event_systems: Vec::new(),
            projections: Projections::new(),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn projections_mut(&mut self) -> &mut Projections {
        &mut self.projections
    }

    pub fn add_startup_system(&mut self, system: Arc<dyn System>) {
        self.startup_systems.push(system);
    }

    pub fn add_frame_start_system(&mut self, system: Arc<dyn System>) {
        self.frame_start_systems.push(system);
    }

    pub fn add_frame_end_system(&mut self, system: Arc<dyn System>) {
        self.frame_end_systems.push(system);
    }

    pub fn add_shutdown_system(&mut self, system: Arc<dyn System>) {
        self.shutdown_systems.push(system);
    }

    pub fn add_event_system(&mut self, system: Arc<dyn EventSystem>) {
        self.event_systems.push(system);
    }

    /// Registers a concurrently-scheduled system, placing it into a batch.
    pub fn add_batch_system(&mut self, system: Arc<dyn System>) -> Result<()> {
        let locks: std::collections::HashSet<TypeId> =
            system.locked_components().iter().map(|l| l.type_id).collect();

        let mut earliest_allowed = 0;
        for predecessor in system.run_after() {
            let idx = self
                .batches
                .iter()
                .position(|batch| batch.iter().any(|s| s.name() == *predecessor))
                .ok_or_else(|| {
                    EcsError::ArgumentShape(format!(
                        "system '{}' declares run_after('{}') but no such system is registered yet",
                        system.name(),
                        predecessor
                    ))
                })?;
            earliest_allowed = earliest_allowed.max(idx + 1);
        }

        let target = self.batches.iter().enumerate().skip(earliest_allowed).find_map(|(i, batch)| {
            let batch_locks: std::collections::HashSet<TypeId> = batch
                .iter()
                .flat_map(|s| s.locked_components().into_iter().map(|l| l.type_id))
                .collect();
            batch_locks.is_disjoint(&locks).then_some(i)
        });

        match target {
            Some(i) => self.batches[i].push(system),
            None => self.batches.push(vec![system]),
        }
        Ok(())
    }

    fn all_registered_systems(&self) -> impl Iterator<Item = &Arc<dyn System>> {
        self.startup_systems
            .iter()
            .chain(self.frame_start_systems.iter())
            .chain(self.batches.iter().flatten())
            .chain(self.frame_end_systems.iter())
            .chain(self.shutdown_systems.iter())
    }

    fn evaluate_conditions(&self) -> Result<HashMap<String, bool>> {
        let mut cache = HashMap::new();
        for system in self.all_registered_systems() {
            for condition in system.run_conditions() {
                if !cache.contains_key(condition.label()) {
                    let value = condition
                        .evaluate(&self.store)
                        .map_err(|_| EcsError::NonBooleanRunCondition(condition.label().to_string()))?;
                    cache.insert(condition.label().to_string(), value);
                }
            }
        }
        Ok(cache)
    }

    fn gated_in(system: &Arc<dyn System>, cache: &HashMap<String, bool>) -> bool {
        system
            .run_conditions()
            .iter()
            .all(|c| cache.get(c.label()).copied().unwrap_or(false))
    }

    async fn run_serial(&self, systems: &[Arc<dyn System>], cache: &HashMap<String, bool>) {
        for system in systems {
            if !Self::gated_in(system, cache) {
                continue;
            }
            let store = self.store.clone();
            let sys = system.clone();
            let name = system.name();
            match tokio::spawn(async move { sys.run(store).await }).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::error!(system = name, error = %err, "system returned an error"),
                Err(join_err) => tracing::error!(system = name, error = %join_err, "system panicked"),
            }
        }
    }

    async fn run_batch(&self, batch: &[Arc<dyn System>], cache: &HashMap<String, bool>) {
        let mut join_set = tokio::task::JoinSet::new();
        for system in batch {
            if !Self::gated_in(system, cache) {
                continue;
            }
            let store = self.store.clone();
            let sys = system.clone();
            let name = system.name();
            join_set.spawn(async move { (name, sys.run(store).await) });
        }
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok((name, Ok(()))) => {
                    let _ = name;
                }
                Ok((name, Err(err))) => tracing::error!(system = name, error = %err, "system returned an error"),
                Err(join_err) => tracing::error!(error = %join_err, "system task panicked"),
            }
        }
    }

    async fn dispatch_events(&self, events: &[StampedEvent]) {
        if self.event_systems.is_empty() || events.is_empty() {
            return;
        }
        let mut groups: HashMap<ecs_core::event::BatchKey, Vec<(Arc<dyn EventSystem>, StampedEvent)>> =
            HashMap::new();
        for event in events {
            for handler in &self.event_systems {
                if handler.event_type() == event.event_type {
                    groups
                        .entry(event.batch_key.clone())
                        .or_default()
                        .push((handler.clone(), event.clone()));
                }
            }
        }

        let mut join_set = tokio::task::JoinSet::new();
        for (_, group) in groups {
            let store = self.store.clone();
            join_set.spawn(async move {
                for (handler, event) in group {
                    let name = handler.name();
                    if let Err(err) = handler.handle(store.clone(), event).await {
                        tracing::error!(system = name, error = %err, "event system returned an error");
                    }
                }
            });
        }
        while let Some(res) = join_set.join_next().await {
            if let Err(join_err) = res {
                tracing::error!(error = %join_err, "event dispatch task panicked");
            }
        }
    }

    /// Runs the startup phase once, before any frame.
    pub async fn run_startup(&mut self) -> Result<()> {
        self.phase = Phase::Startup;
        let cache = self.evaluate_conditions()?;
        let systems = self.startup_systems.clone();
        self.run_serial(&systems, &cache).await;
        Ok(())
    }

    /// Runs one full frame: FrameStart, every batch in order (each a
    /// concurrency barrier), FrameEnd, then waits out any remaining frame
    /// budget while projections are concurrently refreshed.
    pub async fn run_frame(&mut self) -> Result<()> {
        let frame_started_at = Instant::now();

        self.store.events().swap();
        let event_batches = self.store.drain_event_batches();

        let cache = self.evaluate_conditions()?;

        let projection_handle = {
            let store = self.store.clone();
            let projections = self.projections.clone();
            tokio::spawn(async move { projections.update_all(&store).await })
        };

        self.phase = Phase::FrameStart;
        let frame_start_systems = self.frame_start_systems.clone();
        self.run_serial(&frame_start_systems, &cache).await;
        // Batches are dispatched in order: a later batch holds carry-over
        // events that shared a key with an earlier batch's event, so
        // delivering them out of order would reorder same-key events.
        for batch in &event_batches {
            self.dispatch_events(batch).await;
        }

        self.phase = Phase::Batch;
        let batches = self.batches.clone();
        for batch in &batches {
            self.run_batch(batch, &cache).await;
        }

        self.phase = Phase::FrameEnd;
        let frame_end_systems = self.frame_end_systems.clone();
        self.run_serial(&frame_end_systems, &cache).await;

        self.phase = Phase::FrameIdle;
        let elapsed = frame_started_at.elapsed();
        if let Some(remaining) = self.store.config().frame_period().checked_sub(elapsed) {
            tokio::time::sleep(remaining).await;
        }

        if let Err(join_err) = projection_handle.await {
            tracing::error!(error = %join_err, "projection refresh task panicked");
        }

        self.frame_count += 1;
        Ok(())
    }

    /// Runs the shutdown phase, bounded by `EngineConfig::shutdown_timeout_ms`.
    pub async fn run_shutdown(&mut self) -> Result<()> {
        self.phase = Phase::Shutdown;
        let cache = self.evaluate_conditions()?;
        let systems = self.shutdown_systems.clone();
        let timeout = Duration::from_millis(self.store.config().shutdown_timeout_ms);
        if tokio::time::timeout(timeout, self.run_serial(&systems, &cache)).await.is_err() {
            tracing::warn!("shutdown systems did not finish within the configured timeout");
        }
        Ok(())
    }

    /// Runs startup, then frames until `shutdown` resolves, then shutdown.
    pub async fn run(&mut self, mut shutdown: tokio::sync::oneshot::Receiver<()>) -> Result<()> {
        self.run_startup().await?;
        loop {
            if shutdown.try_recv().is_ok() {
                break;
            }
            self.run_frame().await?;
        }
        self.run_shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecs_core::config::EngineConfig;
    use ecs_core::LockedComponent;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    struct Marker;
    impl ecs_core::component::Component for Marker {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn counting_system(name: &'static str, counter: Arc<AtomicUsize>) -> Arc<dyn System> {
        crate::system::FnSystem::new(name, move |_store| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .into_arc()
    }

    #[tokio::test]
    async fn run_frame_runs_every_phase_once() {
        let store = Arc::new(Store::new(EngineConfig::default()));
        let mut scheduler = Scheduler::new(store);
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.add_frame_start_system(counting_system("start", counter.clone()));
        scheduler.add_batch_system(counting_system("batch", counter.clone())).unwrap();
        scheduler.add_frame_end_system(counting_system("end", counter.clone()));

        scheduler.run_frame().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.frame_count(), 1);
    }

    #[tokio::test]
    async fn disjoint_lock_systems_share_a_batch() {
        let store = Arc::new(Store::new(EngineConfig::default()));
        let mut scheduler = Scheduler::new(store);

        let sys_a = crate::system::FnSystem::new("a", |_s| async { Ok(()) })
            .locking(vec![LockedComponent {
                type_id: TypeId::of::<Marker>(),
                tag: None,
            }])
            .into_arc();
        let sys_b = crate::system::FnSystem::new("b", |_s| async { Ok(()) })
            .locking(vec![LockedComponent {
                type_id: TypeId::of::<u32>(),
                tag: None,
            }])
            .into_arc();

        scheduler.add_batch_system(sys_a).unwrap();
        scheduler.add_batch_system(sys_b).unwrap();
        assert_eq!(scheduler.batches.len(), 1);
        assert_eq!(scheduler.batches[0].len(), 2);
    }

    #[tokio::test]
    async fn conflicting_lock_systems_get_separate_batches() {
        let store = Arc::new(Store::new(EngineConfig::default()));
        let mut scheduler = Scheduler::new(store);
        let lock = LockedComponent {
            type_id: TypeId::of::<Marker>(),
            tag: None,
        };
        let sys_a = crate::system::FnSystem::new("a", |_s| async { Ok(()) })
            .locking(vec![lock.clone()])
            .into_arc();
        let sys_b = crate::system::FnSystem::new("b", |_s| async { Ok(()) })
            .locking(vec![lock])
            .into_arc();

        scheduler.add_batch_system(sys_a).unwrap();
        scheduler.add_batch_system(sys_b).unwrap();
        assert_eq!(scheduler.batches.len(), 2);
    }

    #[tokio::test]
    async fn run_after_forces_a_strictly_later_batch() {
        let store = Arc::new(Store::new(EngineConfig::default()));
        let mut scheduler = Scheduler::new(store);
        let sys_a = crate::system::FnSystem::new("a", |_s| async { Ok(()) }).into_arc();
        let sys_b = crate::system::FnSystem::new("b", |_s| async { Ok(()) })
            .after(vec!["a"])
            .into_arc();

        scheduler.add_batch_system(sys_a).unwrap();
        scheduler.add_batch_system(sys_b).unwrap();
        assert_eq!(scheduler.batches.len(), 2);
    }

    #[tokio::test]
    async fn a_panicking_system_does_not_abort_the_frame() {
        let store = Arc::new(Store::new(EngineConfig::default()));
        let mut scheduler = Scheduler::new(store);
        scheduler.add_batch_system(
            crate::system::FnSystem::new("panics", |_s| async { panic!("boom") }).into_arc(),
        ).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.add_frame_end_system(counting_system("end", counter.clone()));

        scheduler.run_frame().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_condition_gates_a_system_out() {
        let store = Arc::new(Store::new(EngineConfig::default()));
        let mut scheduler = Scheduler::new(store);
        let counter = Arc::new(AtomicUsize::new(0));
        let gated = {
            let counter = counter.clone();
            crate::system::FnSystem::new("gated", move |_s| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .gated_by(vec![RunCondition::new("never", |_store| Ok(false))])
            .into_arc()
        };
        scheduler.add_frame_start_system(gated);
        scheduler.run_frame().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
