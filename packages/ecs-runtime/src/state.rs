//! Named-state finite state machine resource and its run-conditions.
//!
//! The current state lives as a resource, so it is subject to the same
//! single-writer CUD discipline as any other resource: only a synchronous
//! system may transition it.

use std::any::Any;

use ecs_core::command::ExecutionMode;
use ecs_core::event::BatchKey;
use ecs_core::resource::Resource;
use ecs_core::{EcsError, Result, Store, SystemContext};

use crate::system::RunCondition;

/// A closed set of named states for one state machine resource.
pub trait StateEnum: std::fmt::Debug + Clone + Copy + PartialEq + Send + Sync + 'static {
    fn default_state() -> Self;
    fn declared() -> &'static [Self];
}

#[derive(Debug, Clone)]
struct CurrentState<S>(S);

impl<S: StateEnum> Resource for CurrentState<S> {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Emitted whenever a state machine resource transitions.
#[derive(Debug, Clone)]
pub struct StateTransition<S: StateEnum> {
    pub previous: S,
    pub current: S,
}

impl<S: StateEnum> ecs_core::event::Event for StateTransition<S> {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Installs `S`'s default state. Called once during setup, before the first frame.
pub fn init_state<S: StateEnum>(store: &Store) -> Result<()> {
    store.insert_resource(CurrentState(S::default_state()))
}

pub fn get_state<S: StateEnum>(store: &Store) -> Option<S> {
    store.with_resource::<CurrentState<S>, _>(|c| c.0)
}

/// Transitions the state machine resource `S` to `next`, emitting a
/// [`StateTransition`] event. Only permitted from a synchronous system.
pub fn set_state<S: StateEnum>(store: &Store, ctx: &SystemContext, next: S) -> Result<()> {
    if ctx.mode == ExecutionMode::Async {
        return Err(EcsError::WrongPhase(
            "set_state is not permitted from an async system".to_string(),
        ));
    }
    if !S::declared().contains(&next) {
        return Err(EcsError::ArgumentShape(format!(
            "state {next:?} is not declared for {}",
            std::any::type_name::<S>()
        )));
    }
    let previous = get_state::<S>(store).unwrap_or_else(S::default_state);
    store.update_resource(CurrentState(next))?;
    store.emit_event(StateTransition { previous, current: next }, BatchKey::Default);
    Ok(())
}

/// A run-condition true exactly when `S`'s current state equals `expected`.
pub fn in_state<S: StateEnum>(expected: S) -> RunCondition {
    RunCondition::new(
        format!("in_state::<{}>({:?})", std::any::type_name::<S>(), expected),
        move |store| Ok(get_state::<S>(store).map(|s| s == expected).unwrap_or(false)),
    )
}

/// A run-condition true whenever `S`'s current state is not `excluded`.
pub fn not_in_state<S: StateEnum>(excluded: S) -> RunCondition {
    RunCondition::new(
        format!("not_in_state::<{}>({:?})", std::any::type_name::<S>(), excluded),
        move |store| Ok(get_state::<S>(store).map(|s| s != excluded).unwrap_or(true)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecs_core::config::EngineConfig;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Phase {
        Menu,
        Playing,
    }

    impl StateEnum for Phase {
        fn default_state() -> Self {
            Phase::Menu
        }
        fn declared() -> &'static [Self] {
            &[Phase::Menu, Phase::Playing]
        }
    }

    #[test]
    fn init_state_installs_the_default() {
        let store = Store::new(EngineConfig::default());
        init_state::<Phase>(&store).unwrap();
        assert_eq!(get_state::<Phase>(&store), Some(Phase::Menu));
    }

    #[test]
    fn set_state_transitions_and_emits_event() {
        let store = Store::new(EngineConfig::default());
        init_state::<Phase>(&store).unwrap();
        let ctx = SystemContext::sync("menu_system");
        set_state::<Phase>(&store, &ctx, Phase::Playing).unwrap();
        assert_eq!(get_state::<Phase>(&store), Some(Phase::Playing));

        store.events().swap();
        let events = store.drain_events_of::<StateTransition<Phase>>();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn set_state_from_async_system_is_rejected() {
        let store = Store::new(EngineConfig::default());
        init_state::<Phase>(&store).unwrap();
        let ctx = SystemContext::async_with_locks("async_sys", vec![]);
        let err = set_state::<Phase>(&store, &ctx, Phase::Playing).unwrap_err();
        assert!(matches!(err, EcsError::WrongPhase(_)));
    }

    #[test]
    fn run_conditions_reflect_current_state() {
        let store = Store::new(EngineConfig::default());
        init_state::<Phase>(&store).unwrap();
        assert!(in_state(Phase::Menu).evaluate(&store).unwrap());
        assert!(not_in_state(Phase::Playing).evaluate(&store).unwrap());
    }
}
