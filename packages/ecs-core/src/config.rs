//! Engine configuration.

/// Tunables for the Store and Scheduler.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Frames per second; a frame never completes sooner than `1 / fps_limit` seconds (15-240).
    pub fps_limit: u32,
    /// Maximum number of events drained from the event table in a single frame.
    pub max_events_per_tick: usize,
    /// How long the scheduler waits for in-flight batch tasks during graceful shutdown.
    pub shutdown_timeout_ms: u64,
    /// Initial capacity hint for the component map, in rows.
    pub initial_component_capacity: usize,
    /// Initial capacity hint for each event buffer, in events.
    pub initial_event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fps_limit: 60,
            max_events_per_tick: 10_000,
            shutdown_timeout_ms: 5_000,
            initial_component_capacity: 1024,
            initial_event_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// The minimum wall-clock duration of one frame under this configuration.
    pub fn frame_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.fps_limit as f64)
    }
}
