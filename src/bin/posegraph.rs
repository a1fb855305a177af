use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use posegraph::{
    FrameIndex, NodeId, PumpOutcome, SceneComposer, SyntheticGraph, TcpPublisher, UpdateAdapter,
    ViewerConfig, WorldState, WorldStore, compose_local, compose_world,
};

#[derive(Parser, Debug)]
#[command(name = "posegraph", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a snapshot JSON file and report every violation.
    Validate(ValidateArgs),
    /// Print the render matrix of one node (or one edge) at one frame.
    Compose(ComposeArgs),
    /// Print every placed node and edge of a snapshot at one frame.
    Scene(SceneArgs),
    /// Connect to a producer and apply pushed snapshots as they arrive.
    Listen(ListenArgs),
    /// Publish synthetic camera/headset/world snapshots to connecting viewers.
    Serve(ServeArgs),
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input snapshot JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Input snapshot JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Node id.
    #[arg(long)]
    node: u32,

    /// Compose the local transform towards this neighbor instead of the world transform.
    #[arg(long)]
    neighbor: Option<u32>,

    /// Frame index (0-based).
    #[arg(long, default_value_t = 0)]
    frame: u64,
}

#[derive(Parser, Debug)]
struct SceneArgs {
    /// Input snapshot JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame index (0-based).
    #[arg(long, default_value_t = 0)]
    frame: u64,
}

#[derive(Parser, Debug)]
struct ListenArgs {
    /// Viewer config JSON; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Producer `host:port`.
    #[arg(long)]
    endpoint: Option<String>,

    /// Event name carrying snapshots.
    #[arg(long)]
    event: Option<String>,

    /// Active frame.
    #[arg(long)]
    frame: Option<u64>,

    /// Stop after this many applied snapshots.
    #[arg(long)]
    max_updates: Option<u64>,
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Listen address.
    #[arg(long, default_value = posegraph::DEFAULT_ENDPOINT)]
    addr: String,

    /// Event name carrying snapshots.
    #[arg(long, default_value = posegraph::DEFAULT_EVENT)]
    event: String,

    /// Frames per snapshot.
    #[arg(long, default_value_t = 1)]
    frames: u64,

    /// Seed of the first snapshot; each republish uses the next seed.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Republish period in milliseconds.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Stop after this many publishes (runs forever when omitted).
    #[arg(long)]
    count: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Validate(args) => cmd_validate(args),
        Command::Compose(args) => cmd_compose(args),
        Command::Scene(args) => cmd_scene(args),
        Command::Listen(args) => cmd_listen(args),
        Command::Serve(args) => cmd_serve(args),
    }
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let state = WorldState::from_path(&args.in_path)
        .with_context(|| format!("validate '{}'", args.in_path.display()))?;
    let (solved, total) = state.solved_counts();
    println!(
        "ok: {} nodes, {} frames, {solved}/{total} local transforms solved",
        state.nodes().len(),
        state.frames().len(),
    );
    Ok(())
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let state = WorldState::from_path(&args.in_path)?;
    let frame = FrameIndex(args.frame);
    let matrix = match args.neighbor {
        Some(neighbor) => compose_local(&state, NodeId(args.node), NodeId(neighbor), frame)?,
        None => compose_world(&state, NodeId(args.node), frame)?,
    };
    println!("{}", serde_json::to_string(&matrix)?);
    Ok(())
}

fn cmd_scene(args: SceneArgs) -> anyhow::Result<()> {
    let state = WorldState::from_path(&args.in_path)?;
    let scene = SceneComposer::new(FrameIndex(args.frame)).compose_frame(&state);
    for (node, err) in &scene.omitted_nodes {
        tracing::info!(%node, "omitted: {err}");
    }
    println!("{}", serde_json::to_string_pretty(&scene)?);
    Ok(())
}

fn cmd_listen(args: ListenArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ViewerConfig::from_path(path)?,
        None => ViewerConfig::default(),
    };
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(event) = args.event {
        config.event = event;
    }
    if let Some(frame) = args.frame {
        config.active_frame = frame;
    }
    config.validate()?;

    let store = Arc::new(WorldStore::new());
    let mut adapter = UpdateAdapter::connect(&config, Arc::clone(&store))
        .with_context(|| format!("connect to producer at {}", config.endpoint))?;
    let composer = SceneComposer::new(config.active_frame());
    let cancel = adapter.cancel_handle();

    let stats = adapter.run_with(|outcome| {
        let PumpOutcome::Applied { generation } = outcome else {
            return;
        };
        if let Some(state) = store.current() {
            let scene = composer.compose_frame(&state);
            match serde_json::to_string(&scene) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!("failed to encode scene: {err}"),
            }
        }
        if args.max_updates.is_some_and(|max| *generation >= max) {
            cancel.cancel();
        }
    });
    tracing::info!(?stats, "listener stopped");
    Ok(())
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let publisher = TcpPublisher::bind(args.addr.as_str(), args.event)
        .with_context(|| format!("bind publisher to {}", args.addr))?;

    let mut published = 0u64;
    loop {
        let graph = SyntheticGraph::demo_rig(args.frames, args.seed.wrapping_add(published))?;
        let viewers = publisher.publish(&graph.to_world_state())?;
        published += 1;
        tracing::info!(published, viewers, "published synthetic snapshot");
        if args.count.is_some_and(|count| published >= count) {
            break;
        }
        std::thread::sleep(Duration::from_millis(args.interval_ms));
    }
    Ok(())
}
