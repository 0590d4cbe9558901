//! Scheduler integration tests: phase ordering, state transitions, and
//! projection refresh against a live `ecs-core` Store.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ecs_core::command::{Commands, EntitySpec, SystemContext};
use ecs_core::component::Component;
use ecs_core::config::EngineConfig;
use ecs_core::query::{Entity, Query};
use ecs_core::Store;

use ecs_runtime::projection::{Projection, ProjectionStatus};
use ecs_runtime::state::{get_state, in_state, StateEnum};
use ecs_runtime::system::FnSystem;
use ecs_runtime::Setup;

#[derive(Debug, Clone)]
struct Position {
    x: f32,
    y: f32,
}

impl Component for Position {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum GamePhase {
    Menu,
    Playing,
}

impl StateEnum for GamePhase {
    fn default_state() -> Self {
        GamePhase::Menu
    }
    fn declared() -> &'static [Self] {
        &[GamePhase::Menu, GamePhase::Playing]
    }
}

#[tokio::test]
async fn a_full_frame_spawns_and_queries_through_the_scheduler() {
    let store = Arc::new(Store::new(EngineConfig::default()));
    let spawner = FnSystem::new("spawner", |store: Arc<Store>| async move {
        let mut cmds = Commands::new(&store, SystemContext::sync("spawner"));
        cmds.spawn(EntitySpec::new().with_component(Position { x: 1.0, y: 1.0 }))?;
        cmds.commit()?;
        Ok(())
    })
    .into_arc();

    let mut scheduler = Setup::new(store.clone()).add_frame_start_system(spawner).build();

    scheduler.run_frame().await.unwrap();

    let results = Query::<(Entity, Position)>::new(&store).stream().unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn run_after_keeps_a_dependent_system_strictly_later() {
    let store = Arc::new(Store::new(EngineConfig::default()));
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let first = {
        let order = order.clone();
        FnSystem::new("first", move |_store| {
            let order = order.clone();
            async move {
                order.lock().push("first");
                Ok(())
            }
        })
        .into_arc()
    };
    let second = {
        let order = order.clone();
        FnSystem::new("second", move |_store| {
            let order = order.clone();
            async move {
                order.lock().push("second");
                Ok(())
            }
        })
        .after(vec!["first"])
        .into_arc()
    };

    let mut scheduler = Setup::new(store)
        .add_system(second)
        .unwrap()
        .add_system(first)
        .unwrap()
        .build();

    scheduler.run_frame().await.unwrap();
    assert_eq!(*order.lock(), vec!["first", "second"]);
}

#[tokio::test]
async fn state_transition_gates_a_system_via_run_condition() {
    let store = Arc::new(Store::new(EngineConfig::default()));
    let counter = Arc::new(AtomicUsize::new(0));

    let playing_only = {
        let counter = counter.clone();
        FnSystem::new("playing_only", move |_store| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .gated_by(vec![in_state(GamePhase::Playing)])
        .into_arc()
    };

    let mut scheduler = Setup::new(store.clone())
        .init_state::<GamePhase>()
        .unwrap()
        .add_frame_start_system(playing_only)
        .build();

    scheduler.run_frame().await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    ecs_runtime::state::set_state::<GamePhase>(&store, &SystemContext::sync("driver"), GamePhase::Playing).unwrap();
    assert_eq!(get_state::<GamePhase>(&store), Some(GamePhase::Playing));

    scheduler.run_frame().await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

struct EntityCountProjection;

impl Projection for EntityCountProjection {
    type Attrs = ();
    type Output = usize;

    fn name(&self) -> &'static str {
        "entity_count"
    }

    fn update(&self, store: &Store, _attrs: &()) -> ProjectionStatus<usize> {
        ProjectionStatus::Ready(store.all_entities().len())
    }
}

#[tokio::test]
async fn projection_reflects_store_state_after_a_frame() {
    let store = Arc::new(Store::new(EngineConfig::default()));
    let spawner = FnSystem::new("spawner", |store: Arc<Store>| async move {
        let mut cmds = Commands::new(&store, SystemContext::sync("spawner"));
        cmds.spawn(EntitySpec::new().with_component(Position { x: 0.0, y: 0.0 }))?;
        cmds.commit()?;
        Ok(())
    })
    .into_arc();

    let mut scheduler = Setup::new(store.clone())
        .add_frame_start_system(spawner)
        .register_projection(EntityCountProjection, ())
        .build();

    scheduler.run_frame().await.unwrap();
    assert_eq!(store.all_entities().len(), 1);
}
