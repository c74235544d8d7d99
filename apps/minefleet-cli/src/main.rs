//! Minefleet CLI
//!
//! Command-line front end for the minefleet agent core: route planning on
//! the voxel grid and an offline simulation of one mining agent against a
//! loopback session.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use minefleet_core::ports::{LoopbackSessionFactory, MemoryInventory, MemoryStateStore};
use minefleet_core::{
    AgentPorts, AgentRuntime, ConnectionEvent, Coord, FleetConfig, FleetError, Region,
    SystemClock, TickReport, Tool, pathfinder,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

mod tui;

/// Minefleet - autonomous mining agents
///
/// Plans routes and simulates a mining agent without a live server.
#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available minefleet commands
#[derive(Subcommand)]
enum Commands {
    /// Compute a route between two cells
    ///
    /// Prints one coordinate per line, start and goal included, or
    /// `no path` when the goal cannot be reached.
    Path {
        /// Start cell as x,y,z
        #[arg(long, allow_hyphen_values = true)]
        from: Coord,

        /// Goal cell as x,y,z
        #[arg(long, allow_hyphen_values = true)]
        to: Coord,

        /// Impassable cell as x,y,z (repeatable)
        #[arg(long = "block", allow_hyphen_values = true)]
        blocked: Vec<Coord>,
    },

    /// Run one agent against an offline loopback server
    ///
    /// The agent walks to the target, mines the queued areas and reports
    /// its progress when it finishes or when the tick limit is reached.
    Simulate(SimulateArgs),
}

#[derive(clap::Args)]
struct SimulateArgs {
    /// Starting position as x,y,z
    #[arg(long, allow_hyphen_values = true)]
    start: Coord,

    /// Area to mine as x1,y1,z1:x2,y2,z2 (repeatable)
    #[arg(long = "area", allow_hyphen_values = true)]
    areas: Vec<Region>,

    /// Cell to walk to before mining, as x,y,z
    #[arg(long, allow_hyphen_values = true)]
    target: Option<Coord>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many ticks
    #[arg(long, default_value_t = 1000)]
    max_ticks: u64,

    /// Override the configured tick interval
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Durability of each tool
    #[arg(long, default_value_t = 59)]
    durability: u32,

    /// Number of reserve tools
    #[arg(long, default_value_t = 2)]
    spares: usize,

    /// Print connection events as JSON lines
    #[arg(long)]
    json_events: bool,

    /// Show a live dashboard
    #[arg(short, long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if let Err(e) = run_command(cli.command).await {
        error!("Command failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize tracing subscriber for structured logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = if verbose {
        EnvFilter::new("minefleet=debug,minefleet_core=debug,minefleet_msg=debug")
    } else {
        EnvFilter::new("minefleet=info,minefleet_core=info,minefleet_msg=info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();
}

async fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Path { from, to, blocked } => {
            run_path(from, to, &blocked);
            Ok(())
        }
        Commands::Simulate(args) => {
            info!(start = %args.start, areas = args.areas.len(), "starting simulation");
            run_simulate(args).await
        }
    }
}

/// Run the path command
///
/// The search is confined to the bounding box of every given cell plus a
/// one-cell margin, so an unreachable goal ends the search.
fn run_path(from: Coord, to: Coord, blocked: &[Coord]) {
    let walls: HashSet<Coord> = blocked.iter().copied().collect();
    let (lo, hi) = blocked
        .iter()
        .chain([&from, &to])
        .fold((from, from), |(lo, hi), c| {
            (
                Coord::new(lo.x.min(c.x), lo.y.min(c.y), lo.z.min(c.z)),
                Coord::new(hi.x.max(c.x), hi.y.max(c.y), hi.z.max(c.z)),
            )
        });
    let bounds = Region::new(
        Coord::new(lo.x.saturating_sub(1), lo.y.saturating_sub(1), lo.z.saturating_sub(1)),
        Coord::new(hi.x.saturating_add(1), hi.y.saturating_add(1), hi.z.saturating_add(1)),
    );

    let path = pathfinder::find_path(from, to, |c| bounds.contains(c) && !walls.contains(c));
    if path.is_empty() {
        println!("no path");
        return;
    }
    for cell in path {
        println!("{cell}");
    }
}

/// Run the simulate command
async fn run_simulate(args: SimulateArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref()).context("Failed to load configuration")?;
    if let Some(tick_ms) = args.tick_ms {
        config.engine.tick_ms = tick_ms;
        config.validate().context("Invalid --tick-ms")?;
    }

    let mut sim = Simulation::new(&args, &config).context("Failed to create agent runtime")?;

    if args.watch {
        tui::run_dashboard(&mut sim, config.engine.tick())
            .await
            .context("Dashboard failed")?;
    } else {
        run_headless(&mut sim, config.engine.tick()).await?;
    }

    let report = sim
        .runtime
        .report_progress()
        .context("Failed to render progress report")?;
    let snapshot = sim.runtime.snapshot()?;
    sim.runtime.shutdown();

    println!("agent:        {}", snapshot.agent_id);
    println!("position:     {}", snapshot.position);
    println!("state:        {}", snapshot.state);
    println!("mined blocks: {}", snapshot.mined_blocks);
    println!("ticks:        {}", sim.ticks);
    if let Some(reason) = &sim.gave_up {
        println!("gave up:      {reason}");
    }
    println!("{report}");

    Ok(())
}

async fn run_headless(sim: &mut Simulation, tick: std::time::Duration) -> Result<()> {
    let mut interval = tokio::time::interval(tick);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = sim.tick().context("Simulation tick failed")?;
                if sim.json_events {
                    for event in &report.events {
                        println!("{}", serde_json::to_string(event)?);
                    }
                }
                if sim.is_done()? {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                warn!("interrupted, stopping simulation");
                break;
            }
        }
    }

    Ok(())
}

/// One simulated agent and its run bookkeeping.
pub(crate) struct Simulation {
    pub(crate) runtime: AgentRuntime,
    pub(crate) ticks: u64,
    pub(crate) max_ticks: u64,
    pub(crate) json_events: bool,
    pub(crate) gave_up: Option<String>,
}

impl Simulation {
    fn new(args: &SimulateArgs, config: &FleetConfig) -> Result<Self> {
        let inventory = MemoryInventory::with_tools(
            (1..=args.spares).map(|i| Tool::new(format!("pickaxe-{i}"), args.durability)),
        );
        let ports = AgentPorts {
            factory: Box::new(LoopbackSessionFactory::new()),
            clock: Arc::new(SystemClock::new()),
            store: Arc::new(MemoryStateStore::new()),
            inventory: Arc::new(inventory),
            notifier: None,
        };

        let mut runtime = AgentRuntime::new(&config.server.username, args.start, config, ports)?;
        runtime.set_tool(&Tool::new("pickaxe-0", args.durability))?;
        if let Some(target) = args.target
            && runtime.set_target(target)? == 0
            && target != args.start
        {
            warn!(%target, "no route to target");
        }
        for area in &args.areas {
            runtime.set_mining_area(*area)?;
        }
        runtime.start();

        Ok(Self {
            runtime,
            ticks: 0,
            max_ticks: args.max_ticks,
            json_events: args.json_events && !args.watch,
            gave_up: None,
        })
    }

    /// Advances the agent by one tick.
    pub(crate) fn tick(&mut self) -> Result<TickReport> {
        let report = self.runtime.tick()?;
        self.ticks += 1;
        for event in &report.events {
            if let ConnectionEvent::ReconnectFailed { error } = event {
                self.gave_up = Some(error.clone());
            }
        }
        Ok(report)
    }

    /// Whether the run should stop.
    pub(crate) fn is_done(&self) -> Result<bool> {
        Ok(self.ticks >= self.max_ticks
            || self.gave_up.is_some()
            || self.runtime.is_finished()?)
    }
}

/// Load configuration from an explicit path, or defaults when none is given.
fn load_config(path: Option<&PathBuf>) -> Result<FleetConfig> {
    let Some(path) = path else {
        return Ok(FleetConfig::default());
    };
    if !path.exists() {
        return Err(FleetError::ConfigNotFound(path.clone()).into());
    }
    Ok(FleetConfig::load(path)?)
}
