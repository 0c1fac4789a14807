//! Dataset output.
//!
//! On-disk layout written by [`DirectoryDatasetSink`]:
//!
//! ```text
//! <root>/meta/info.json               dataset schema
//! <root>/meta/episodes.jsonl          one line per committed episode
//! <root>/data/episode_000000.jsonl    one line per frame
//! <root>/images/episode_000000/frame_000000.png
//! ```

use crate::convert::ConvertedEpisode;
use crate::error::{EngineError, Result};
use crate::traits::{DatasetSink, ImageLoader};
use image::RgbImage;
use robot_config::RobotDescriptor;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

const INFO_FILE: &str = "meta/info.json";
const EPISODES_FILE: &str = "meta/episodes.jsonl";

/// Shape of every record in a dataset, derived from the robot descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub robot_type: String,
    pub fps: u32,
    /// (width, height) of stored frame images.
    pub image_size: (u32, u32),
    pub state_dim: usize,
    pub action_dim: usize,
    pub state_names: Vec<String>,
    pub action_names: Vec<String>,
}

impl DatasetSchema {
    /// `fps` overrides the descriptor's default rate.
    pub fn for_robot(desc: &RobotDescriptor, fps: Option<u32>) -> Self {
        let mut names: Vec<String> = (1..=desc.num_joints())
            .map(|i| format!("joint_{i}"))
            .collect();
        if desc.use_dummy_dimension() {
            names.push("pad".to_string());
        }
        if desc.has_gripper() {
            names.push("gripper".to_string());
        }
        Self {
            robot_type: desc.name().to_string(),
            fps: fps.unwrap_or(desc.default_fps()),
            image_size: desc.image_size(),
            state_dim: desc.state_dim(),
            action_dim: desc.action_dim(),
            action_names: names.iter().map(|n| format!("delta_{n}")).collect(),
            state_names: names,
        }
    }
}

/// One frame handed to a [`DatasetSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub image: RgbImage,
    pub state: Vec<f32>,
    pub action: Vec<f32>,
    pub task: String,
}

impl FrameRecord {
    pub(crate) fn check(&self, schema: &DatasetSchema) -> Result<()> {
        if self.state.len() != schema.state_dim || self.action.len() != schema.action_dim {
            return Err(EngineError::Sink(format!(
                "frame shape mismatch: state {} / action {}, schema expects {} / {}",
                self.state.len(),
                self.action.len(),
                schema.state_dim,
                schema.action_dim
            )));
        }
        if self.image.dimensions() != schema.image_size {
            let (w, h) = self.image.dimensions();
            return Err(EngineError::Sink(format!(
                "image is {w}x{h}, schema expects {}x{}",
                schema.image_size.0, schema.image_size.1
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub id: Uuid,
    pub index: usize,
    pub name: String,
    pub length: usize,
    pub tasks: Vec<String>,
    /// RFC 3339 commit timestamp.
    pub committed_at: String,
}

#[derive(Serialize)]
struct FrameLine<'a> {
    episode_index: usize,
    frame_index: usize,
    image: String,
    state: &'a [f32],
    action: &'a [f32],
    task: &'a str,
}

/// Writes a dataset as plain files. An episode becomes visible in `meta/episodes.jsonl`
/// only after all its frames and images are on disk.
#[derive(Debug)]
pub struct DirectoryDatasetSink {
    root: PathBuf,
    schema: DatasetSchema,
    next_index: usize,
    pending: Vec<FrameRecord>,
}

impl DirectoryDatasetSink {
    /// Open the dataset at `root`, creating it if needed.
    ///
    /// An existing dataset is appended to when its schema matches and rejected otherwise.
    /// With `overwrite`, any existing content under `root` is removed first.
    pub fn create(
        root: impl Into<PathBuf>,
        schema: DatasetSchema,
        overwrite: bool,
    ) -> Result<Self> {
        let root = root.into();
        if overwrite && root.exists() {
            tracing::info!(root = %root.display(), "removing existing dataset");
            fs::remove_dir_all(&root)?;
        }

        let info_path = root.join(INFO_FILE);
        let next_index = if info_path.is_file() {
            let existing: DatasetSchema = read_json(&info_path)?;
            if existing != schema {
                return Err(EngineError::Sink(format!(
                    "dataset at {} was written for {} (state {} / action {}), not {}",
                    root.display(),
                    existing.robot_type,
                    existing.state_dim,
                    existing.action_dim,
                    schema.robot_type
                )));
            }
            read_summaries(&root)?.len()
        } else {
            fs::create_dir_all(root.join("meta"))?;
            write_atomic(&info_path, &serde_json::to_vec_pretty(&schema).map_err(sink_err)?)?;
            0
        };
        fs::create_dir_all(root.join("data"))?;
        fs::create_dir_all(root.join("images"))?;

        tracing::info!(
            root = %root.display(),
            robot = %schema.robot_type,
            episodes = next_index,
            "opened dataset"
        );
        Ok(Self {
            root,
            schema,
            next_index,
            pending: Vec::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of committed episodes.
    pub fn episodes(&self) -> usize {
        self.next_index
    }

    fn images_dir(&self, index: usize) -> PathBuf {
        self.root.join("images").join(format!("episode_{index:06}"))
    }

    fn data_file(&self, index: usize) -> PathBuf {
        self.root.join("data").join(format!("episode_{index:06}.jsonl"))
    }

    fn write_frames(&self, index: usize, frames: &[FrameRecord]) -> Result<()> {
        let images_dir = self.images_dir(index);
        fs::create_dir_all(&images_dir)?;

        let mut data = Vec::new();
        for (i, frame) in frames.iter().enumerate() {
            let name = format!("frame_{i:06}.png");
            frame.image.save(images_dir.join(&name)).map_err(sink_err)?;
            let line = FrameLine {
                episode_index: index,
                frame_index: i,
                image: format!("images/episode_{index:06}/{name}"),
                state: &frame.state,
                action: &frame.action,
                task: &frame.task,
            };
            serde_json::to_writer(&mut data, &line).map_err(sink_err)?;
            data.push(b'\n');
        }
        write_atomic(&self.data_file(index), &data)
    }

    fn remove_episode_files(&self, index: usize) {
        let _ = fs::remove_dir_all(self.images_dir(index));
        let _ = fs::remove_file(self.data_file(index));
    }
}

impl DatasetSink for DirectoryDatasetSink {
    fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    fn add_frame(&mut self, frame: FrameRecord) -> Result<()> {
        frame.check(&self.schema)?;
        self.pending.push(frame);
        Ok(())
    }

    fn commit_episode(&mut self, episode: &str) -> Result<EpisodeSummary> {
        let frames = std::mem::take(&mut self.pending);
        if frames.is_empty() {
            return Err(EngineError::Sink(format!("episode {episode}: no frames to commit")));
        }
        let index = self.next_index;

        let written = self
            .write_frames(index, &frames)
            .and_then(|()| summarize(index, episode, &frames));
        let summary = match written {
            Ok(s) => s,
            Err(e) => {
                self.remove_episode_files(index);
                return Err(e);
            }
        };

        let mut line = serde_json::to_vec(&summary).map_err(sink_err)?;
        line.push(b'\n');
        let appended = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(EPISODES_FILE))
            .and_then(|mut f| f.write_all(&line));
        if let Err(e) = appended {
            self.remove_episode_files(index);
            return Err(e.into());
        }

        self.next_index += 1;
        tracing::info!(episode, index, frames = summary.length, "committed episode");
        Ok(summary)
    }

    fn abort_episode(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(frames = self.pending.len(), "aborting staged episode");
        }
        self.pending.clear();
    }
}

fn summarize(index: usize, name: &str, frames: &[FrameRecord]) -> Result<EpisodeSummary> {
    let mut tasks: Vec<String> = Vec::new();
    for f in frames {
        if !tasks.contains(&f.task) {
            tasks.push(f.task.clone());
        }
    }
    let committed_at = OffsetDateTime::now_utc().format(&Rfc3339).map_err(sink_err)?;
    Ok(EpisodeSummary {
        id: Uuid::new_v4(),
        index,
        name: name.to_string(),
        length: frames.len(),
        tasks,
        committed_at,
    })
}

/// Decode the images of `episode` and pair them with its state/action rows. Rows beyond the
/// shortest of the four sequences are dropped.
pub fn load_frames<L>(
    loader: &L,
    episode: &ConvertedEpisode,
    image_size: (u32, u32),
) -> Vec<FrameRecord>
where
    L: ImageLoader + ?Sized,
{
    let lens = [
        episode.images.len(),
        episode.states.len(),
        episode.actions.len(),
        episode.tasks.len(),
    ];
    if lens.iter().any(|&n| n != lens[0]) {
        tracing::warn!(
            episode = %episode.name,
            images = lens[0],
            states = lens[1],
            actions = lens[2],
            tasks = lens[3],
            "episode sequences differ in length, extra rows dropped"
        );
    }
    episode
        .images
        .iter()
        .zip(&episode.states)
        .zip(&episode.actions)
        .zip(&episode.tasks)
        .map(|(((image, state), action), task)| FrameRecord {
            image: loader.load(image, image_size),
            state: state.clone(),
            action: action.clone(),
            task: task.clone(),
        })
        .collect()
}

/// Stage `frames` into `sink`, then commit them as episode `name`.
///
/// Any failure aborts the staged episode; nothing is retried.
pub fn commit_frames<S>(
    sink: &mut S,
    name: &str,
    frames: Vec<FrameRecord>,
) -> Result<EpisodeSummary>
where
    S: DatasetSink + ?Sized,
{
    for record in frames {
        if let Err(e) = sink.add_frame(record) {
            sink.abort_episode();
            return Err(e);
        }
    }
    match sink.commit_episode(name) {
        Ok(summary) => Ok(summary),
        Err(e) => {
            sink.abort_episode();
            Err(e)
        }
    }
}

/// [`load_frames`] followed by [`commit_frames`].
pub fn write_episode<S, L>(
    sink: &mut S,
    loader: &L,
    episode: &ConvertedEpisode,
) -> Result<EpisodeSummary>
where
    S: DatasetSink + ?Sized,
    L: ImageLoader + ?Sized,
{
    let frames = load_frames(loader, episode, sink.schema().image_size);
    commit_frames(sink, &episode.name, frames)
}

/// What a dataset directory holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetStatus {
    pub schema: DatasetSchema,
    pub episodes: usize,
    pub frames: usize,
    pub summaries: Vec<EpisodeSummary>,
}

pub fn read_dataset_status(root: &Path) -> Result<DatasetStatus> {
    let schema: DatasetSchema = read_json(&root.join(INFO_FILE))?;
    let summaries = read_summaries(root)?;
    Ok(DatasetStatus {
        schema,
        episodes: summaries.len(),
        frames: summaries.iter().map(|s| s.length).sum(),
        summaries,
    })
}

fn read_summaries(root: &Path) -> Result<Vec<EpisodeSummary>> {
    let path = root.join(EPISODES_FILE);
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(fs::File::open(&path)?);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let summary: EpisodeSummary = serde_json::from_str(&line)
            .map_err(|e| EngineError::Sink(format!("{}: {e}", path.display())))?;
        out.push(summary);
    }
    Ok(out)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read(path)?;
    serde_json::from_slice(&raw).map_err(|e| EngineError::Sink(format!("{}: {e}", path.display())))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut w = BufWriter::new(fs::File::create(&tmp)?);
        w.write_all(bytes)?;
        w.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn sink_err(e: impl std::fmt::Display) -> EngineError {
    EngineError::Sink(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::PlaceholderImageLoader;
    use robot_config::GripperPolicy;

    fn desc() -> RobotDescriptor {
        RobotDescriptor::builder("arm", 2)
            .gripper(GripperPolicy::direct(["g"]).unwrap())
            .image_size(8, 6)
            .build()
            .unwrap()
    }

    fn episode(name: &str, frames: usize) -> ConvertedEpisode {
        ConvertedEpisode {
            name: name.to_string(),
            images: (0..frames).map(|i| PathBuf::from(format!("f{i}.jpg"))).collect(),
            states: vec![vec![0.1, 0.2, 0.0, 1.0]; frames],
            actions: vec![vec![0.0; 4]; frames],
            tasks: vec!["pick".to_string(); frames],
            source_positions: (0..frames).collect(),
        }
    }

    #[test]
    fn test_schema_for_robot() {
        let s = DatasetSchema::for_robot(&desc(), None);
        assert_eq!(s.fps, 10);
        assert_eq!(s.state_dim, 4);
        assert_eq!(s.state_names, vec!["joint_1", "joint_2", "pad", "gripper"]);
        assert_eq!(s.action_names[3], "delta_gripper");
        assert_eq!(DatasetSchema::for_robot(&desc(), Some(30)).fps, 30);
    }

    #[test]
    fn test_directory_sink_commit() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ds");
        let mut sink =
            DirectoryDatasetSink::create(&root, DatasetSchema::for_robot(&desc(), None), false)
                .unwrap();

        let s0 = write_episode(&mut sink, &PlaceholderImageLoader, &episode("a", 3)).unwrap();
        let s1 = write_episode(&mut sink, &PlaceholderImageLoader, &episode("b", 2)).unwrap();
        assert_eq!((s0.index, s1.index), (0, 1));
        assert_eq!(s0.tasks, vec!["pick"]);
        assert!(OffsetDateTime::parse(&s0.committed_at, &Rfc3339).is_ok());

        assert!(root.join("images/episode_000000/frame_000002.png").is_file());
        let data = fs::read_to_string(root.join("data/episode_000001.jsonl")).unwrap();
        assert_eq!(data.lines().count(), 2);
        let first: serde_json::Value = serde_json::from_str(data.lines().next().unwrap()).unwrap();
        assert_eq!(first["image"], "images/episode_000001/frame_000000.png");
        assert_eq!(first["state"].as_array().unwrap().len(), 4);

        let status = read_dataset_status(&root).unwrap();
        assert_eq!(status.episodes, 2);
        assert_eq!(status.frames, 5);
        assert_eq!(status.schema.robot_type, "arm");
    }

    #[test]
    fn test_reopen_appends_and_rejects_other_schema() {
        let dir = tempfile::tempdir().unwrap();
        let schema = DatasetSchema::for_robot(&desc(), None);
        {
            let mut sink = DirectoryDatasetSink::create(dir.path(), schema.clone(), false).unwrap();
            write_episode(&mut sink, &PlaceholderImageLoader, &episode("a", 1)).unwrap();
        }
        let sink = DirectoryDatasetSink::create(dir.path(), schema.clone(), false).unwrap();
        assert_eq!(sink.episodes(), 1);

        let mut other = schema.clone();
        other.state_dim = 9;
        let err = DirectoryDatasetSink::create(dir.path(), other, false).unwrap_err();
        assert!(matches!(err, EngineError::Sink(_)));

        let fresh = DirectoryDatasetSink::create(dir.path(), schema, true).unwrap();
        assert_eq!(fresh.episodes(), 0);
    }

    #[test]
    fn test_bad_frame_aborts_episode() {
        let dir = tempfile::tempdir().unwrap();
        let schema = DatasetSchema::for_robot(&desc(), None);
        let mut sink = DirectoryDatasetSink::create(dir.path(), schema, false).unwrap();
        let mut ep = episode("bad", 3);
        ep.states[2] = vec![0.0; 3];
        let err = write_episode(&mut sink, &PlaceholderImageLoader, &ep).unwrap_err();
        assert!(matches!(err, EngineError::Sink(_)));
        assert_eq!(sink.episodes(), 0);
        assert!(!dir.path().join("data/episode_000000.jsonl").exists());

        // the staged frames were dropped, the next episode starts clean
        let s = write_episode(&mut sink, &PlaceholderImageLoader, &episode("ok", 1)).unwrap();
        assert_eq!((s.index, s.length), (0, 1));
    }

    #[test]
    fn test_load_frames_with_uneven_sequences() {
        let mut ep = episode("uneven", 3);
        ep.actions.truncate(2);
        ep.tasks.push("extra".to_string());
        let frames = load_frames(&PlaceholderImageLoader, &ep, (8, 6));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].task, "pick");
        assert_eq!(frames[0].image.dimensions(), (8, 6));
    }

    #[test]
    fn test_commit_without_frames_fails() {
        let dir = tempfile::tempdir().unwrap();
        let schema = DatasetSchema::for_robot(&desc(), None);
        let mut sink = DirectoryDatasetSink::create(dir.path(), schema, false).unwrap();
        assert!(sink.commit_episode("empty").is_err());
        assert_eq!(read_dataset_status(dir.path()).unwrap().episodes, 0);
    }
}
