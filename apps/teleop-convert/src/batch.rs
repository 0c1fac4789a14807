use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use episode_engine::{
    self as engine, DatasetSchema, DatasetSink, DirectoryDatasetSink, FileImageLoader,
    FrameRecord, ImageLoader, MetricsHub, PlaceholderImageLoader, SourceFormat,
};
use robot_config::{RobotDescriptor, RobotRegistry};

use crate::SourceArgs;

#[derive(Debug)]
pub(crate) struct ConvertOptions {
    pub out: PathBuf,
    pub fps: Option<u32>,
    pub jobs: usize,
    pub no_images: bool,
    pub overwrite: bool,
    pub metrics_out: Option<PathBuf>,
}

/// Result of the parallel half of the pipeline for one episode.
enum Outcome {
    Ready {
        name: String,
        frames: Vec<FrameRecord>,
        diagnostics: Vec<engine::Diagnostic>,
    },
    Empty {
        name: String,
        diagnostics: Vec<engine::Diagnostic>,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tally {
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub frames: usize,
}

/// Shared, read-only inputs of every worker.
struct Job {
    format: SourceFormat,
    images_root: PathBuf,
    prompt: String,
    desc: RobotDescriptor,
    loader: Box<dyn ImageLoader>,
    image_size: (u32, u32),
}

impl Job {
    fn process(&self, path: &Path) -> Outcome {
        let raw = match self.format.load(path, &self.images_root, &self.prompt) {
            Ok(raw) => raw,
            Err(e) => {
                return Outcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        let (converted, diagnostics) = engine::convert_episode(&raw, &self.desc).into_parts();
        match converted {
            Some(ep) => Outcome::Ready {
                frames: engine::load_frames(self.loader.as_ref(), &ep, self.image_size),
                name: ep.name,
                diagnostics,
            },
            None => Outcome::Empty {
                name: raw.name,
                diagnostics,
            },
        }
    }
}

/// Convert every discovered episode. Loading, conversion and image decoding run on up to
/// `jobs` blocking workers; commits happen one at a time in discovery order.
pub(crate) async fn run(
    registry: &RobotRegistry,
    src: &SourceArgs,
    opts: ConvertOptions,
) -> Result<()> {
    let desc = registry.lookup(&src.robot)?.clone();
    let paths = src.discover()?;
    let schema = DatasetSchema::for_robot(&desc, opts.fps);
    let mut sink = DirectoryDatasetSink::create(&opts.out, schema.clone(), opts.overwrite)?;
    let metrics = MetricsHub::new().map_err(anyhow::Error::msg)?;

    let loader: Box<dyn ImageLoader> = if opts.no_images {
        Box::new(PlaceholderImageLoader)
    } else {
        Box::new(FileImageLoader)
    };
    let job = Arc::new(Job {
        format: src.source.into(),
        images_root: src.images_dir.clone(),
        prompt: src.prompt.clone(),
        desc,
        loader,
        image_size: schema.image_size,
    });

    info!(
        robot = %schema.robot_type,
        episodes = paths.len(),
        jobs = opts.jobs,
        out = %opts.out.display(),
        "starting conversion"
    );

    let window = opts.jobs.max(1);
    let mut in_flight: VecDeque<(PathBuf, JoinHandle<Outcome>)> = VecDeque::new();
    let mut tally = Tally::default();

    for path in paths {
        if in_flight.len() >= window {
            if let Some((p, handle)) = in_flight.pop_front() {
                finish(&p, handle, &mut sink, &metrics, &mut tally).await;
            }
        }
        let job = Arc::clone(&job);
        let worker_path = path.clone();
        let handle = tokio::task::spawn_blocking(move || job.process(&worker_path));
        in_flight.push_back((path, handle));
    }
    while let Some((p, handle)) = in_flight.pop_front() {
        finish(&p, handle, &mut sink, &metrics, &mut tally).await;
    }

    if let Some(path) = &opts.metrics_out {
        std::fs::write(path, metrics.encode_text())
            .with_context(|| format!("writing metrics: {}", path.display()))?;
    }

    println!(
        "converted {} episodes ({} frames), skipped {}, failed {} -> {}",
        tally.converted,
        tally.frames,
        tally.skipped,
        tally.failed,
        opts.out.display()
    );
    if tally.failed > 0 {
        anyhow::bail!("{} episode(s) failed", tally.failed);
    }
    Ok(())
}

async fn finish<S: DatasetSink>(
    path: &Path,
    handle: JoinHandle<Outcome>,
    sink: &mut S,
    metrics: &MetricsHub,
    tally: &mut Tally,
) {
    let outcome = match handle.await {
        Ok(o) => o,
        Err(e) => Outcome::Failed {
            error: format!("worker failed: {e}"),
        },
    };
    match outcome {
        Outcome::Ready {
            name,
            frames,
            diagnostics,
        } => {
            metrics.record_diagnostics(&diagnostics);
            match engine::commit_frames(sink, &name, frames) {
                Ok(summary) => {
                    tally.converted += 1;
                    tally.frames += summary.length;
                    metrics.conv.episodes_converted.inc();
                    metrics.conv.frames_written.inc_by(summary.length as u64);
                    info!(
                        episode = %name,
                        index = summary.index,
                        frames = summary.length,
                        diagnostics = diagnostics.len(),
                        "episode written"
                    );
                }
                Err(e) => {
                    tally.failed += 1;
                    metrics.conv.episodes_failed.inc();
                    error!(episode = %name, error = %e, "commit failed");
                }
            }
        }
        Outcome::Empty { name, diagnostics } => {
            metrics.record_diagnostics(&diagnostics);
            tally.skipped += 1;
            metrics.conv.episodes_skipped.inc();
            warn!(episode = %name, "no frames left, episode skipped");
        }
        Outcome::Failed { error } => {
            tally.failed += 1;
            metrics.conv.episodes_failed.inc();
            error!(path = %path.display(), %error, "episode failed");
        }
    }
}
