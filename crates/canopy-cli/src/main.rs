//! Canopy CLI.
//!
//! - `canopy demo` - tick a built-in guard forest
//! - `canopy run --tree <file>` - tick a tree loaded from YAML (see `trees/guard.yaml`)
//! - `canopy check-config` - print the effective configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use canopy::prelude::*;

#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Behavior-tree engine driver", version)]
struct Cli {
    /// Directory holding canopy.yaml
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tick the built-in demo forest
    Demo {
        /// Number of ticks
        #[arg(short, long, default_value_t = 10)]
        ticks: u64,

        /// Override the handler seed from the config
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Tick a tree loaded from a YAML subtree file
    Run {
        /// Subtree file; its top node becomes the root's child
        #[arg(long)]
        tree: PathBuf,

        /// Number of ticks
        #[arg(short, long, default_value_t = 1)]
        ticks: u64,
    },

    /// Load canopy.yaml and print the effective configuration
    CheckConfig,
}

/// Stand-in agent for the driver. Its behaviors only touch these fields.
#[derive(Debug, Default)]
struct Walker {
    id: u64,
    tick: u64,
    stamina: u32,
    actions: Vec<String>,
}

impl Agent for Walker {
    fn stable_id(&self) -> u64 {
        self.id
    }

    fn kind(&self) -> &str {
        "walker"
    }
}

fn behaviors() -> Behaviors<Walker> {
    Behaviors::new()
        .with_condition("always", |_, _| true)
        .with_condition("never", |_, _| false)
        .with_condition("even_tick", |w: &Walker, _| w.tick % 2 == 0)
        .with_condition("tired", |w: &Walker, _| w.stamina == 0)
        .with_condition("alarm", |_, g: &Globals| {
            g.values.get("alarm").and_then(|v| v.as_bool()).unwrap_or(false)
        })
        .with_command("rest", |w: &mut Walker, _| {
            w.stamina += 3;
            w.actions.push("rest".into());
        })
        .with_command("walk", |w: &mut Walker, _| {
            w.stamina = w.stamina.saturating_sub(1);
            w.actions.push("walk".into());
        })
        .with_command("look", |w: &mut Walker, _| w.actions.push("look".into()))
        .with_command("raise_alarm", |w: &mut Walker, g: &mut Globals| {
            g.values.insert("alarm".into(), true.into());
            w.actions.push("raise_alarm".into());
        })
        .with_command("flee", |w: &mut Walker, g: &mut Globals| {
            g.values.remove("alarm");
            w.actions.push("flee".into());
        })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let project_root = match cli.project {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = EngineConfig::load_from_dir(&project_root)?;

    match cli.command {
        Commands::Demo { ticks, seed } => {
            let mut handler_config = config.handler.clone();
            if let Some(seed) = seed {
                handler_config.seed = seed;
            }
            let forest = demo_forest(&config)?;
            drive(&forest, "patrol", handler_config, ticks)
        }
        Commands::Run { tree, ticks } => {
            let forest = forest_from_file(&config, &tree)?;
            drive(&forest, "main", config.handler.clone(), ticks)
        }
        Commands::CheckConfig => {
            println!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}

/// `patrol` reacts to alarms and otherwise wanders; raising the alarm
/// hands over to the `panic` tree through a Transition.
fn demo_forest(config: &EngineConfig) -> Result<Forest> {
    let mut forest = Forest::new();
    let patrol = forest.create_with("patrol", config.hashing);
    let panic = forest.create_with("panic", config.hashing);

    let react = Subtree::new("react", NodeKind::Sequence).with_children([
        Subtree::condition("alarmed?", "alarm"),
        Subtree::new(
            "to panic",
            NodeKind::Transition {
                target: Some("panic".into()),
            },
        ),
    ]);
    let wander = Subtree::new("wander", NodeKind::ProbSelector).with_children([
        Subtree::command("walk", "walk").with_weight(3.0),
        Subtree::command("look", "look"),
        Subtree::new("maybe alarm", NodeKind::Limiter { limit: 1 })
            .with_child(Subtree::command("raise", "raise_alarm"))
            .with_weight(0.5),
    ]);
    let rest = Subtree::new("rest", NodeKind::Sequence).with_children([
        Subtree::condition("tired?", "tired"),
        Subtree::command("sleep", "rest"),
    ]);
    add_top(
        &mut forest,
        patrol,
        Subtree::new("top", NodeKind::Selector).with_children([react, rest, wander]),
    )?;
    add_top(
        &mut forest,
        panic,
        Subtree::new(
            "shout",
            NodeKind::EchoDecorator {
                message: "panicking".into(),
            },
        )
        .with_child(Subtree::command("run away", "flee")),
    )?;
    Ok(forest)
}

fn forest_from_file(config: &EngineConfig, path: &Path) -> Result<Forest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read tree from {}", path.display()))?;
    let subtree: Subtree = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse tree from {}", path.display()))?;

    let mut forest = Forest::new();
    let id = forest.create_with("main", config.hashing);
    add_top(&mut forest, id, subtree)?;
    Ok(forest)
}

fn add_top(forest: &mut Forest, id: TreeId, subtree: Subtree) -> Result<()> {
    let tree = forest
        .get_mut(id)
        .with_context(|| format!("tree {id} vanished"))?;
    let root = tree.root().clone();
    tree.add(subtree, &root, None, false)?;
    Ok(())
}

fn drive(forest: &Forest, tree: &str, config: HandlerConfig, ticks: u64) -> Result<()> {
    let mut walker = Walker {
        id: 1,
        stamina: 2,
        ..Walker::default()
    };
    let mut handler = AiHandler::with_config(Arc::new(behaviors()), config);
    handler.setup(forest, &walker, Some(tree.into()), false)?;

    for tick in 1..=ticks {
        walker.tick = tick;
        let status = handler.tick(forest, &mut walker)?;
        let last = walker.actions.last().map(String::as_str).unwrap_or("-");
        println!("tick {tick:>3}  {:<8}  {last}", status.as_str());
    }

    if let Some(bb) = handler.blackboard() {
        println!("{}", serde_json::to_string_pretty(&bb.snapshot())?);
    }
    Ok(())
}
