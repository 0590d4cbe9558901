//! Cross-module integration tests for the Store, Query engine, and Command executor.

use std::any::Any;

use ecs_core::command::{Commands, EntitySpec, SystemContext};
use ecs_core::component::Component;
use ecs_core::config::EngineConfig;
use ecs_core::event::ComponentCreated;
use ecs_core::query::{Entity, Query, Scope};
use ecs_core::store::Store;

#[derive(Debug, Clone)]
struct Position {
    x: f32,
    y: f32,
}

impl Component for Position {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn static_tags(&self) -> &'static [&'static str] {
        &["spatial"]
    }
}

#[test]
fn spawn_query_and_despawn_round_trip() {
    let store = Store::new(EngineConfig::default());

    let mut cmds = Commands::new(&store, SystemContext::sync("setup"));
    let entity = cmds
        .spawn(EntitySpec::new().with_component(Position { x: 1.0, y: 2.0 }))
        .unwrap();
    cmds.commit().unwrap();

    let results = Query::<(Entity, Position)>::new(&store).stream().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, entity);

    let mut cmds = Commands::new(&store, SystemContext::sync("teardown"));
    cmds.despawn(entity);
    cmds.commit().unwrap();

    assert!(Query::<(Entity, Position)>::new(&store).stream().unwrap().is_empty());
}

#[test]
fn lifecycle_event_is_delivered_on_the_next_frame_only() {
    let store = Store::new(EngineConfig::default());
    let mut cmds = Commands::new(&store, SystemContext::sync("setup"));
    cmds.spawn(EntitySpec::new().with_component(Position { x: 0.0, y: 0.0 }))
        .unwrap();
    cmds.commit().unwrap();

    // Frame N: the event was enqueued into the write buffer, not yet readable.
    assert!(store.drain_events_of::<ComponentCreated>().is_empty());

    // Scheduler boundary: swap promotes the write buffer to the read buffer.
    store.events().swap();

    let delivered = store.drain_events_of::<ComponentCreated>();
    assert_eq!(delivered.len(), 1);

    // Frame N+2: already drained, nothing left.
    store.events().swap();
    assert!(store.drain_events_of::<ComponentCreated>().is_empty());
}

#[test]
fn tag_scoped_query_requires_full_tag_set() {
    let store = Store::new(EngineConfig::default());
    let mut cmds = Commands::new(&store, SystemContext::sync("setup"));
    let boss = cmds
        .spawn(EntitySpec::new().with_tagged_component(Position { x: 0.0, y: 0.0 }, vec!["boss".to_string()]))
        .unwrap();
    let plain = cmds
        .spawn(EntitySpec::new().with_component(Position { x: 5.0, y: 5.0 }))
        .unwrap();
    cmds.commit().unwrap();

    // Position carries its static "spatial" tag plus the instance "boss" tag.
    let tagged = store.tagged_components(&["spatial".to_string(), "boss".to_string()]);
    assert!(tagged.iter().any(|(e, _, _)| *e == boss));
    assert!(!tagged.iter().any(|(e, _, _)| *e == plain));
}

#[test]
fn scope_for_descendants_of_walks_the_whole_subtree() {
    let store = Store::new(EngineConfig::default());

    let mut cmds = Commands::new(&store, SystemContext::sync("setup"));
    let grandchild = cmds.spawn(EntitySpec::new().with_component(Position { x: 0.0, y: 0.0 })).unwrap();
    cmds.commit().unwrap();

    let mut cmds = Commands::new(&store, SystemContext::sync("setup"));
    let child = cmds
        .spawn(EntitySpec::new().with_component(Position { x: 1.0, y: 1.0 }).with_child(grandchild))
        .unwrap();
    cmds.commit().unwrap();

    let mut cmds = Commands::new(&store, SystemContext::sync("setup"));
    let root = cmds
        .spawn(EntitySpec::new().with_component(Position { x: 2.0, y: 2.0 }).with_child(child))
        .unwrap();
    cmds.commit().unwrap();

    let descendants: Vec<_> = Query::<Entity>::new(&store)
        .scope(Scope::ForDescendantsOf(root))
        .stream()
        .unwrap();
    assert_eq!(descendants.len(), 2);
    assert!(descendants.contains(&child));
    assert!(descendants.contains(&grandchild));
}
