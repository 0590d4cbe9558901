//! Inspection and smoke-test CLI for the ECS runtime.
//!
//! A scratch `Store` lives for the duration of one invocation; there is no
//! persistence layer to point this at, so every subcommand builds its own
//! entities before reading them back. `inspect` and `elevate` are debug/test
//! only entry points, compiled in behind the `debug-tools` feature.

use std::any::Any;

use clap::{Parser, Subcommand};

use ecs_core::command::{Commands, EntitySpec, SystemContext};
use ecs_core::component::Component;
use ecs_core::config::EngineConfig;
use ecs_core::query::{Entity, Query};
use ecs_core::Store;

#[derive(Parser, Debug)]
#[command(about = "Inspection and smoke-test CLI for the ECS runtime")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Spawns `count` demo entities and reports how many the Query engine sees back.
    Spawn {
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
    /// Prints the engine's default configuration.
    Config,
    /// Builds a Store and Scheduler, runs one frame, and dumps internal state.
    #[cfg(feature = "debug-tools")]
    Inspect {
        #[arg(long, default_value_t = 10)]
        entity_count: usize,
    },
    /// Elevates the calling task to a system context and issues a command through it.
    #[cfg(feature = "debug-tools")]
    Elevate,
}

#[derive(Debug, Clone)]
struct DemoMarker {
    label: String,
}

impl Component for DemoMarker {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Spawn { count } => run_spawn(count)?,
        Command::Config => println!("{:#?}", EngineConfig::default()),
        #[cfg(feature = "debug-tools")]
        Command::Inspect { entity_count } => debug_tools::run_inspect(entity_count).await?,
        #[cfg(feature = "debug-tools")]
        Command::Elevate => debug_tools::run_elevate().await?,
    }
    Ok(())
}

fn run_spawn(count: usize) -> anyhow::Result<()> {
    let store = Store::new(EngineConfig::default());
    let mut commands = Commands::new(&store, SystemContext::sync("ecs-tool"));
    for i in 0..count {
        commands.spawn(EntitySpec::new().with_component(DemoMarker {
            label: format!("entity-{i}"),
        }))?;
    }
    let spawned = commands.commit()?;

    let seen = Query::<Entity>::new(&store).stream()?;
    tracing::info!(requested = count, committed = spawned.len(), visible = seen.len(), "spawn complete");
    println!("requested {count}, committed {}, visible to query {}", spawned.len(), seen.len());
    Ok(())
}

#[cfg(feature = "debug-tools")]
mod debug_tools {
    use std::sync::Arc;

    use ecs_core::command::{Commands, EntitySpec, SystemContext};
    use ecs_core::config::EngineConfig;
    use ecs_core::query::{Entity, Query};
    use ecs_core::Store;
    use ecs_runtime::Setup;

    use super::DemoMarker;

    /// Spawns `entity_count` entities, runs startup + one frame through a
    /// bare `Scheduler` (no systems registered), and prints what the
    /// scheduler and store see afterward.
    pub async fn run_inspect(entity_count: usize) -> anyhow::Result<()> {
        let store = Arc::new(Store::new(EngineConfig::default()));
        {
            let mut commands = Commands::new(&store, SystemContext::sync("ecs-tool-inspect"));
            for i in 0..entity_count {
                commands.spawn(EntitySpec::new().with_component(DemoMarker {
                    label: format!("entity-{i}"),
                }))?;
            }
            commands.commit()?;
        }

        let mut scheduler = Setup::new(Arc::clone(&store)).build();
        scheduler.run_startup().await?;
        scheduler.run_frame().await?;

        let visible = Query::<Entity>::new(&store).stream()?;
        println!("scheduler phase: {:?}", scheduler.phase());
        println!("scheduler frame count: {}", scheduler.frame_count());
        println!("store version: {}", store.version());
        println!("entities visible to query: {}", visible.len());
        Ok(())
    }

    /// Demonstrates elevating the calling task to a system context: outside
    /// the `scope`, no ambient context exists; inside it, `Commands` calls
    /// that require one succeed.
    pub async fn run_elevate() -> anyhow::Result<()> {
        println!(
            "ambient context before elevation: {:?}",
            SystemContext::try_current().is_some()
        );

        let store = Store::new(EngineConfig::default());
        let ctx = SystemContext::sync("ecs-tool-elevate");
        let spawned = ctx
            .clone()
            .scope(async {
                println!(
                    "ambient context during elevation: {:?}",
                    SystemContext::try_current().map(|c| c.system_name)
                );
                let mut commands = Commands::new(&store, SystemContext::try_current().unwrap());
                commands.spawn(EntitySpec::new().with_component(DemoMarker {
                    label: "elevated".to_string(),
                }))?;
                commands.commit()
            })
            .await?;

        println!("elevated command spawned {} entit(y/ies)", spawned.len());
        Ok(())
    }
}
