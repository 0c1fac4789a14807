#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;

use episode_engine as engine;
use robot_config as robots;

mod batch;
mod inspect;

#[derive(Parser, Debug)]
#[command(
    name = "teleop-convert",
    version,
    about = "Convert teleoperation episodes into state/action training datasets",
    disable_help_subcommand = true
)]
struct Cli {
    /// Directory of robot descriptor files (*.yaml, *.yml, *.json); merged over built-ins
    #[arg(long, env = "TELEOP_ROBOTS_DIR", global = true)]
    robots_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum SourceKind {
    /// JSON episode files
    Json,
    /// Collector directories holding robot_data.csv
    Csv,
}

impl From<SourceKind> for engine::SourceFormat {
    fn from(k: SourceKind) -> Self {
        match k {
            SourceKind::Json => engine::SourceFormat::Json,
            SourceKind::Csv => engine::SourceFormat::Csv,
        }
    }
}

/// Where raw episodes come from; shared by `convert` and `inspect`.
#[derive(clap::Args, Debug, Clone)]
struct SourceArgs {
    /// Input directory (JSON files or per-episode CSV directories)
    #[arg(long)]
    input: PathBuf,
    #[arg(long, value_enum, default_value_t = SourceKind::Json)]
    source: SourceKind,
    /// Robot descriptor name
    #[arg(long)]
    robot: String,
    /// Root of per-episode image directories (<root>/<episode>/images) for JSON sources
    #[arg(long, env = "TELEOP_IMAGES_DIR", default_value = ".")]
    images_dir: PathBuf,
    /// Episode prompt for CSV sources
    #[arg(long, default_value = engine::DEFAULT_PROMPT)]
    prompt: String,
    /// First episode number (by numeric file or directory name)
    #[arg(long)]
    start_episode: Option<u64>,
    /// Last episode number, inclusive
    #[arg(long)]
    end_episode: Option<u64>,
}

impl SourceArgs {
    fn range(&self) -> Option<std::ops::RangeInclusive<u64>> {
        match (self.start_episode, self.end_episode) {
            (None, None) => None,
            (s, e) => Some(s.unwrap_or(0)..=e.unwrap_or(u64::MAX)),
        }
    }

    fn discover(&self) -> Result<Vec<PathBuf>> {
        let format = engine::SourceFormat::from(self.source);
        let paths = format.discover(&self.input, self.range())?;
        info!(input = %self.input.display(), episodes = paths.len(), "discovered episodes");
        Ok(paths)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List known robot descriptors
    RobotList {
        /// Print descriptors as JSON
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Validate a descriptor file or a directory of descriptors
    RobotValidate {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Print the parsed descriptors as JSON
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Convert raw episodes into a dataset directory
    Convert {
        #[command(flatten)]
        src: SourceArgs,
        /// Output dataset directory
        #[arg(long)]
        out: PathBuf,
        /// Frames per second recorded in the dataset (default: descriptor's default_fps)
        #[arg(long)]
        fps: Option<u32>,
        /// Episodes converted in parallel
        #[arg(long, default_value_t = 4usize)]
        jobs: usize,
        /// Skip image decoding and store placeholder images
        #[arg(long, action = ArgAction::SetTrue)]
        no_images: bool,
        /// Remove an existing dataset at --out first
        #[arg(long, action = ArgAction::SetTrue)]
        overwrite: bool,
        /// Write Prometheus text metrics to this file when done
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },
    /// Report gripper values, transitions and gripper deltas per episode
    Inspect {
        #[command(flatten)]
        src: SourceArgs,
        /// Print the report as JSON
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Show what a dataset directory holds
    Status {
        /// Dataset directory
        #[arg(long)]
        out: PathBuf,
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();
    let robots_dir = cli.robots_dir.as_deref();

    match cli.command {
        Commands::RobotList { json } => robot_list(robots_dir, json),
        Commands::RobotValidate { file, dir, json } => {
            robot_validate(file.as_deref(), dir.as_deref(), json)
        }
        Commands::Convert {
            src,
            out,
            fps,
            jobs,
            no_images,
            overwrite,
            metrics_out,
        } => {
            let registry = load_registry(robots_dir)?;
            let opts = batch::ConvertOptions {
                out,
                fps,
                jobs,
                no_images,
                overwrite,
                metrics_out,
            };
            batch::run(&registry, &src, opts).await
        }
        Commands::Inspect { src, json } => {
            let registry = load_registry(robots_dir)?;
            inspect::run(&registry, &src, json)
        }
        Commands::Status { out, json } => dataset_status(&out, json),
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Built-in descriptors, overridden by name from `dir` when given.
fn load_registry(dir: Option<&Path>) -> Result<robots::RobotRegistry> {
    let mut registry = robots::RobotRegistry::with_builtin()?;
    if let Some(dir) = dir {
        let n = registry.extend_from_dir(dir)?;
        info!(dir = %dir.display(), loaded = n, "merged robot descriptors");
    }
    Ok(registry)
}

fn robot_list(dir: Option<&Path>, json: bool) -> Result<()> {
    let registry = load_registry(dir)?;
    if json {
        let all: Vec<&robots::RobotDescriptor> = registry.iter().collect();
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(());
    }
    for d in registry.iter() {
        let gripper = match d.gripper() {
            Some(g) => format!("{:?}", g.method()).to_lowercase(),
            None => "none".to_string(),
        };
        let filter = d
            .filter_mode()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}\tjoints={}\tstate_dim={}\taction_dim={}\tgripper={}\tfilter_mode={}",
            d.name(),
            d.num_joints(),
            d.state_dim(),
            d.action_dim(),
            gripper,
            filter
        );
    }
    Ok(())
}

fn robot_validate(file: Option<&Path>, dir: Option<&Path>, json: bool) -> Result<()> {
    match (file, dir) {
        (Some(f), None) => {
            let desc = robots::load_descriptor_file(f)?;
            println!(
                "ok: {} (state_dim={}, action_dim={})",
                desc.name(),
                desc.state_dim(),
                desc.action_dim()
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&desc)?);
            }
        }
        (None, Some(d)) => {
            let reg = robots::load_descriptors_dir(d)?;
            println!("ok: loaded {} robots", reg.len());
            if json {
                let all: Vec<&robots::RobotDescriptor> = reg.iter().collect();
                println!("{}", serde_json::to_string_pretty(&all)?);
            }
        }
        _ => {
            return Err(anyhow::anyhow!("provide --file <path> or --dir <dir>"));
        }
    }
    Ok(())
}

fn dataset_status(out: &Path, json: bool) -> Result<()> {
    let status = engine::read_dataset_status(out)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    println!("Dataset {}:", out.display());
    println!("  Robot: {}", status.schema.robot_type);
    println!("  FPS: {}", status.schema.fps);
    println!(
        "  State/action dims: {}/{}",
        status.schema.state_dim, status.schema.action_dim
    );
    println!("  Episodes: {}", status.episodes);
    println!("  Frames: {}", status.frames);
    Ok(())
}
