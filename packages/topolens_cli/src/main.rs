//! Topolens command line
//!
//! Loads a topology snapshot (JSON `{ "devices": [...], "links": [...] }`)
//! and runs one engine operation against it, printing JSON to stdout.
//!
//! ```bash
//! topolens --topology campus.json view core-001 --group
//! topolens --topology campus.json view core-001 --group > view.json
//! topolens --topology campus.json expand view.json group-prefix-0
//! topolens --topology campus.json reachable core-001 --max-hops 2 --mode dfs
//! topolens --topology campus.json path core-001 access-003 --k 3
//! topolens --topology campus.json connections dist-100
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use topolens::{
    EngineConfig, GroupingConfig, InMemoryStore, PathAlgorithm, SearchMode, TopologyEngine,
    VisualGraph,
};

#[derive(Parser)]
#[command(name = "topolens")]
#[command(version = "0.1.0")]
#[command(about = "Explore a device topology snapshot")]
struct Cli {
    /// Topology snapshot file
    #[arg(long, short = 't', global = true, default_value = "topology.json")]
    topology: PathBuf,

    /// Engine config file (falls back to $TOPOLENS_CONFIG, then defaults)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Bfs,
    Dfs,
}

impl From<Mode> for SearchMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Bfs => SearchMode::Bfs,
            Mode::Dfs => SearchMode::Dfs,
        }
    }
}

#[derive(clap::Args)]
struct GroupingArgs {
    /// Collapse leaf devices into groups
    #[arg(long)]
    group: bool,

    /// Group by device type as well as name prefix
    #[arg(long)]
    by_type: bool,

    /// Group leftovers by depth band
    #[arg(long)]
    by_depth: bool,

    /// Minimum members per group
    #[arg(long)]
    min_group_size: Option<usize>,

    /// Only devices at least this deep are grouped
    #[arg(long)]
    max_depth: Option<usize>,
}

impl GroupingArgs {
    fn apply(&self, base: &GroupingConfig) -> GroupingConfig {
        let mut grouping = base.clone();
        grouping.enabled |= self.group;
        grouping.group_by_type |= self.by_type;
        grouping.group_by_depth |= self.by_depth;
        if let Some(size) = self.min_group_size {
            grouping.min_group_size = size;
        }
        if let Some(depth) = self.max_depth {
            grouping.max_depth = depth;
        }
        grouping
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the visual graph around a root device
    View {
        root: String,

        /// Hops to extract (0 = configured default)
        #[arg(long, short, default_value_t = 0)]
        radius: usize,

        #[command(flatten)]
        grouping: GroupingArgs,
    },

    /// Expand a group in a previously printed visual graph
    Expand {
        /// Visual graph JSON produced by `view` or `expand`
        graph: PathBuf,

        group_id: String,

        /// Members to explore from (defaults to the group's own members)
        #[arg(long, value_delimiter = ',')]
        members: Vec<String>,

        /// Hops explored around each member (0 = configured default)
        #[arg(long, short, default_value_t = 0)]
        depth: usize,

        #[command(flatten)]
        grouping: GroupingArgs,
    },

    /// List devices reachable from a start device
    Reachable {
        start: String,

        /// Hop bound (0 = unbounded)
        #[arg(long, default_value_t = 0)]
        max_hops: usize,

        #[arg(long, value_enum, default_value = "bfs")]
        mode: Mode,
    },

    /// Find the cheapest path(s) between two devices
    Path {
        from: String,
        to: String,

        /// Return up to this many loopless paths instead of one
        #[arg(long)]
        k: Option<usize>,
    },

    /// Show a device's uplinks, downlinks and peers
    Connections { device: String },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::from_env()?,
    };
    let store = InMemoryStore::load(&cli.topology)
        .with_context(|| format!("loading topology from {}", cli.topology.display()))?;
    log::info!(
        "Loaded {} devices and {} links from {}",
        store.device_count(),
        store.link_count(),
        cli.topology.display()
    );
    let base_grouping = config.grouping.clone();
    let engine = TopologyEngine::with_config(store, config);

    match cli.command {
        Commands::View {
            root,
            radius,
            grouping,
        } => {
            let graph = engine
                .extract_visual(&root, radius, &grouping.apply(&base_grouping))
                .await?;
            print_json(&graph)
        }
        Commands::Expand {
            graph,
            group_id,
            members,
            depth,
            grouping,
        } => {
            let raw = std::fs::read_to_string(&graph)
                .with_context(|| format!("reading {}", graph.display()))?;
            let current: VisualGraph = serde_json::from_str(&raw)?;
            let root = current.root.clone();
            let expansion = engine
                .expand_group(
                    &current,
                    &group_id,
                    &members,
                    &root,
                    &grouping.apply(&base_grouping),
                    depth,
                )
                .await?;
            print_json(&expansion.graph)
        }
        Commands::Reachable {
            start,
            max_hops,
            mode,
        } => {
            let devices = engine.find_reachable(&start, max_hops, mode.into()).await?;
            print_json(&devices)
        }
        Commands::Path { from, to, k } => {
            let algorithm = match k {
                Some(k) => PathAlgorithm::KShortest { k },
                None => PathAlgorithm::Dijkstra,
            };
            let paths = engine.find_shortest_path(&from, &to, algorithm).await?;
            print_json(&paths)
        }
        Commands::Connections { device } => {
            let connections = engine.device_connections(&device).await?;
            print_json(&connections)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
