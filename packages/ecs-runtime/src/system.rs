//! System and event-system traits, and the run-condition type.

use std::any::TypeId;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ecs_core::event::{Event, StampedEvent};
use ecs_core::{LockedComponent, Result, Store};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A boolean gate evaluated once per frame and cached by label, so every
/// system referencing the same condition sees a consistent answer.
#[derive(Clone)]
pub struct RunCondition {
    label: String,
    check: Arc<dyn Fn(&Store) -> Result<bool> + Send + Sync>,
}

impl RunCondition {
    pub fn new(label: impl Into<String>, check: impl Fn(&Store) -> Result<bool> + Send + Sync + 'static) -> Self {
        Self {
            label: label.into(),
            check: Arc::new(check),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn evaluate(&self, store: &Store) -> Result<bool> {
        (self.check)(store)
    }
}

/// A unit of scheduled work. Registered into the scheduler's startup,
/// frame-start, batch, frame-end, or shutdown phases.
pub trait System: Send + Sync {
    fn name(&self) -> &'static str;

    /// Component types (optionally tag-qualified) this system's body
    /// mutates. Ignored with a warning for systems in serial phases.
    fn locked_components(&self) -> Vec<LockedComponent> {
        Vec::new()
    }

    /// Names of systems this one must run strictly after, within `BatchSystems`.
    fn run_after(&self) -> &[&'static str] {
        &[]
    }

    fn run_conditions(&self) -> Vec<RunCondition> {
        Vec::new()
    }

    fn run(&self, store: Arc<Store>) -> BoxFuture<'static, Result<()>>;
}

/// A system invoked once per matching event rather than once per frame.
pub trait EventSystem: Send + Sync {
    fn name(&self) -> &'static str;
    fn event_type(&self) -> TypeId;
    fn handle(&self, store: Arc<Store>, event: StampedEvent) -> BoxFuture<'static, Result<()>>;
}

/// Adapts a plain async closure into a [`System`].
pub struct FnSystem<F> {
    name: &'static str,
    locked: Vec<LockedComponent>,
    run_after: Vec<&'static str>,
    conditions: Vec<RunCondition>,
    handler: F,
}

impl<F, Fut> FnSystem<F>
where
    F: Fn(Arc<Store>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    pub fn new(name: &'static str, handler: F) -> Self {
        Self {
            name,
            locked: Vec::new(),
            run_after: Vec::new(),
            conditions: Vec::new(),
            handler,
        }
    }

    pub fn locking(mut self, locked: Vec<LockedComponent>) -> Self {
        self.locked = locked;
        self
    }

    pub fn after(mut self, predecessors: Vec<&'static str>) -> Self {
        self.run_after = predecessors;
        self
    }

    pub fn gated_by(mut self, conditions: Vec<RunCondition>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn into_arc(self) -> Arc<dyn System> {
        Arc::new(self)
    }
}

impl<F, Fut> System for FnSystem<F>
where
    F: Fn(Arc<Store>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn locked_components(&self) -> Vec<LockedComponent> {
        self.locked.clone()
    }

    fn run_after(&self) -> &[&'static str] {
        &self.run_after
    }

    fn run_conditions(&self) -> Vec<RunCondition> {
        self.conditions.clone()
    }

    fn run(&self, store: Arc<Store>) -> BoxFuture<'static, Result<()>> {
        Box::pin((self.handler)(store))
    }
}

/// Adapts a plain async closure into an [`EventSystem`] for one concrete event type.
pub struct FnEventSystem<E, F> {
    name: &'static str,
    handler: F,
    _marker: std::marker::PhantomData<fn(E)>,
}

impl<E, F, Fut> FnEventSystem<E, F>
where
    E: Event + Clone + 'static,
    F: Fn(Arc<Store>, E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    pub fn new(name: &'static str, handler: F) -> Arc<dyn EventSystem> {
        Arc::new(Self {
            name,
            handler,
            _marker: std::marker::PhantomData,
        })
    }
}

impl<E, F, Fut> EventSystem for FnEventSystem<E, F>
where
    E: Event + Clone + 'static,
    F: Fn(Arc<Store>, E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn event_type(&self) -> TypeId {
        TypeId::of::<E>()
    }

    fn handle(&self, store: Arc<Store>, event: StampedEvent) -> BoxFuture<'static, Result<()>> {
        match event.downcast::<E>() {
            Some(payload) => Box::pin((self.handler)(store, payload.clone())),
            None => Box::pin(async { Ok(()) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecs_core::config::EngineConfig;

    #[tokio::test]
    async fn fn_system_runs_its_closure() {
        let store = Arc::new(Store::new(EngineConfig::default()));
        let system = FnSystem::new("noop", |_store| async { Ok(()) }).into_arc();
        system.run(store).await.unwrap();
    }

    #[test]
    fn run_condition_evaluates_its_closure() {
        let store = Store::new(EngineConfig::default());
        let cond = RunCondition::new("always_true", |_store| Ok(true));
        assert!(cond.evaluate(&store).unwrap());
    }
}
