//! Frame-based scheduler, state machine, and projection runtime.
//!
//! Built on `ecs-core`'s Store/Query/Command layer. A [`Setup`] builder
//! assembles systems, initial states, and projections into a [`Scheduler`],
//! which then owns the Startup -> (FrameStart -> Batch -> FrameEnd ->
//! FrameIdle)* -> Shutdown loop.

pub mod projection;
pub mod scheduler;
pub mod setup;
pub mod state;
pub mod system;

pub use projection::{Projection, ProjectionStatus, Projections};
pub use scheduler::{Phase, Scheduler};
pub use setup::Setup;
pub use state::{get_state, in_state, init_state, not_in_state, set_state, StateEnum, StateTransition};
pub use system::{EventSystem, FnEventSystem, FnSystem, RunCondition, System};
