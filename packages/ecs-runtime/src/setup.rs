//! Fluent builder for assembling a [`Scheduler`] before the first frame.

use std::sync::Arc;

use ecs_core::{Result, Store};

use crate::projection::Projection;
use crate::scheduler::Scheduler;
use crate::state::StateEnum;
use crate::system::{EventSystem, System};

/// Accumulates system/state/projection registrations, then hands back a
/// ready-to-run [`Scheduler`]. Mirrors a registry's fluent `register(...)`
/// style, one call per registration, consumed and returned by value.
pub struct Setup {
    scheduler: Scheduler,
}

impl Setup {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            scheduler: Scheduler::new(store),
        }
    }

    pub fn add_startup_system(mut self, system: Arc<dyn System>) -> Self {
        self.scheduler.add_startup_system(system);
        self
    }

    pub fn add_frame_start_system(mut self, system: Arc<dyn System>) -> Self {
        self.scheduler.add_frame_start_system(system);
        self
    }

    /// Registers a concurrently-scheduled system; fails if it declares a
    /// `run_after` predecessor that was never registered.
    pub fn add_system(mut self, system: Arc<dyn System>) -> Result<Self> {
        self.scheduler.add_batch_system(system)?;
        Ok(self)
    }

    /// Registers a set of systems as a unit, in order.
    pub fn add_system_set(mut self, systems: Vec<Arc<dyn System>>) -> Result<Self> {
        for system in systems {
            self.scheduler.add_batch_system(system)?;
        }
        Ok(self)
    }

    pub fn add_frame_end_system(mut self, system: Arc<dyn System>) -> Self {
        self.scheduler.add_frame_end_system(system);
        self
    }

    pub fn add_shutdown_system(mut self, system: Arc<dyn System>) -> Self {
        self.scheduler.add_shutdown_system(system);
        self
    }

    pub fn add_event_system(mut self, system: Arc<dyn EventSystem>) -> Self {
        self.scheduler.add_event_system(system);
        self
    }

    /// Installs `S`'s default state before the first frame.
    pub fn init_state<S: StateEnum>(self) -> Result<Self> {
        crate::state::init_state::<S>(self.scheduler.store())?;
        Ok(self)
    }

    pub fn register_projection<P: Projection + 'static>(mut self, projection: P, attrs: P::Attrs) -> Self {
        self.scheduler.projections_mut().register(projection, attrs);
        self
    }

    pub fn build(self) -> Scheduler {
        self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecs_core::config::EngineConfig;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Phase {
        Idle,
    }
    impl StateEnum for Phase {
        fn default_state() -> Self {
            Phase::Idle
        }
        fn declared() -> &'static [Self] {
            &[Phase::Idle]
        }
    }

    #[test]
    fn builder_chains_registrations_and_builds() {
        let store = Arc::new(Store::new(EngineConfig::default()));
        let scheduler = Setup::new(store)
            .add_startup_system(crate::system::FnSystem::new("s", |_s| async { Ok(()) }).into_arc())
            .init_state::<Phase>()
            .unwrap()
            .build();
        assert_eq!(crate::state::get_state::<Phase>(scheduler.store()), Some(Phase::Idle));
    }
}
