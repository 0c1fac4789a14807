//! Raw episode sources.
//!
//! Two on-disk layouts are understood:
//! - JSON episode files: `{ "episode_name": .., "prompt": .., "frames": [ {..}, .. ] }`,
//!   with images under `<images_root>/<episode_name>/images/`.
//! - Collector CSV directories: `<dir>/robot_data.csv` plus `<dir>/images/`.
//!
//! Structural failures (unreadable file, not an episode) are [`EngineError::EpisodeLoad`];
//! problems inside a single frame are left for the converter to diagnose.

use crate::error::{EngineError, Result};
use crate::frame::{FieldValue, RawEpisode, RawFrame, DEFAULT_PROMPT, JOINT_ANGLES_FIELD};
use serde::Deserialize;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

pub const CSV_FILE_NAME: &str = "robot_data.csv";
pub const TCP_POSE_FIELD: &str = "tcp_pose";

const TCP_COLUMNS: [&str; 6] = ["x", "y", "z", "rx", "ry", "rz"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Csv,
}

impl SourceFormat {
    /// Episode locations under `dir`, ordered by numeric name where there is one.
    pub fn discover(
        self,
        dir: &Path,
        range: Option<RangeInclusive<u64>>,
    ) -> Result<Vec<PathBuf>> {
        match self {
            SourceFormat::Json => discover_json_episodes(dir, range),
            SourceFormat::Csv => discover_csv_episodes(dir, range),
        }
    }

    /// Load one episode found by [`SourceFormat::discover`].
    ///
    /// `images_root` only matters for JSON files; CSV directories carry their own images.
    pub fn load(self, path: &Path, images_root: &Path, prompt: &str) -> Result<RawEpisode> {
        match self {
            SourceFormat::Json => load_json_episode(path, images_root),
            SourceFormat::Csv => load_csv_episode(path, prompt),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EpisodeFile {
    episode_name: String,
    #[serde(default)]
    prompt: Option<String>,
    frames: Vec<RawFrame>,
}

pub fn load_json_episode(path: &Path, images_root: &Path) -> Result<RawEpisode> {
    let raw = fs::read_to_string(path).map_err(|e| EngineError::load(path, e))?;
    let file: EpisodeFile = serde_json::from_str(&raw).map_err(|e| EngineError::load(path, e))?;
    if file.episode_name.trim().is_empty() {
        return Err(EngineError::load(path, "episode_name is empty"));
    }
    let prompt = file
        .prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PROMPT.to_string());
    let image_dir = images_root.join(&file.episode_name).join("images");
    tracing::debug!(
        path = %path.display(),
        episode = %file.episode_name,
        frames = file.frames.len(),
        "loaded json episode"
    );
    Ok(RawEpisode::new(file.episode_name, prompt, file.frames).with_image_dir(image_dir))
}

/// Read a collector directory. Columns `j1..jN` become `joint_angles`, `x..rz` become
/// `tcp_pose`; every other column keeps its header as the field name. Empty cells are
/// left out of the frame. A truncated row keeps the cells it has.
pub fn load_csv_episode(dir: &Path, prompt: &str) -> Result<RawEpisode> {
    let csv_path = dir.join(CSV_FILE_NAME);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(&csv_path)
        .map_err(|e| EngineError::load(&csv_path, e))?;
    let headers = reader
        .headers()
        .map_err(|e| EngineError::load(&csv_path, e))?
        .clone();
    let layout = CsvLayout::from_headers(&headers);
    if layout.joints.is_empty() {
        return Err(EngineError::load(&csv_path, "no joint columns (j1, j2, ..)"));
    }

    let mut frames = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| EngineError::load(&csv_path, e))?;
        frames.push(layout.frame(&record));
    }

    let name = dir
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| EngineError::load(dir, "episode directory has no name"))?;
    tracing::debug!(path = %csv_path.display(), frames = frames.len(), "loaded csv episode");
    Ok(RawEpisode::new(name, prompt, frames).with_image_dir(dir.join("images")))
}

/// Column positions resolved once from the header row.
struct CsvLayout {
    joints: Vec<usize>,
    tcp: Option<[usize; 6]>,
    other: Vec<(usize, String)>,
}

impl CsvLayout {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let find = |name: &str| headers.iter().position(|h| h == name);

        let mut joints = Vec::new();
        while let Some(i) = find(&format!("j{}", joints.len() + 1)) {
            joints.push(i);
        }

        let tcp_found: Vec<usize> = TCP_COLUMNS.iter().filter_map(|&c| find(c)).collect();
        let tcp = <[usize; 6]>::try_from(tcp_found).ok();

        let other = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !joints.contains(i) && !tcp.is_some_and(|t| t.contains(i)))
            .map(|(i, h)| (i, h.to_string()))
            .collect();
        Self { joints, tcp, other }
    }

    fn frame(&self, record: &csv::StringRecord) -> RawFrame {
        let mut frame = RawFrame::new();
        frame.insert(JOINT_ANGLES_FIELD, self.list(record, &self.joints));
        if let Some(tcp) = &self.tcp {
            frame.insert(TCP_POSE_FIELD, self.list(record, tcp));
        }
        for (i, name) in &self.other {
            if let Some(cell) = record.get(*i).filter(|c| !c.is_empty()) {
                frame.insert(name.clone(), parse_cell(cell));
            }
        }
        frame
    }

    fn list(&self, record: &csv::StringRecord, columns: &[usize]) -> FieldValue {
        FieldValue::List(
            columns
                .iter()
                .map_while(|&i| record.get(i))
                .map(parse_cell)
                .collect(),
        )
    }
}

fn parse_cell(cell: &str) -> FieldValue {
    if let Ok(i) = cell.parse::<i64>() {
        FieldValue::Int(i)
    } else if let Ok(x) = cell.parse::<f64>() {
        FieldValue::Float(x)
    } else {
        FieldValue::Text(cell.to_string())
    }
}

/// `*.json` files in `dir`. With a range, only files whose stem is a number inside it.
pub fn discover_json_episodes(
    dir: &Path,
    range: Option<RangeInclusive<u64>>,
) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| EngineError::load(dir, e))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            found.push(path);
        }
    }
    Ok(select(found, range))
}

/// Subdirectories of `dir` that hold a `robot_data.csv`.
pub fn discover_csv_episodes(
    dir: &Path,
    range: Option<RangeInclusive<u64>>,
) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| EngineError::load(dir, e))? {
        let path = entry?.path();
        if path.join(CSV_FILE_NAME).is_file() {
            found.push(path);
        }
    }
    Ok(select(found, range))
}

fn episode_number(path: &Path) -> Option<u64> {
    path.file_stem()?.to_str()?.parse().ok()
}

fn select(mut paths: Vec<PathBuf>, range: Option<RangeInclusive<u64>>) -> Vec<PathBuf> {
    if let Some(range) = range {
        paths.retain(|p| episode_number(p).is_some_and(|n| range.contains(&n)));
    }
    // numbered episodes first, in numeric order
    paths.sort_by(|a, b| {
        let ka = (episode_number(a).unwrap_or(u64::MAX), a);
        let kb = (episode_number(b).unwrap_or(u64::MAX), b);
        ka.cmp(&kb)
    });
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_json_episode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("3.json");
        let body = json!({
            "episode_name": "3",
            "prompt": "stack blocks",
            "frames": [
                {"frame_id": 0, "joint_angles": [1, 2, 3, 4, 5, 6], "robot_mode": 7},
                {"frame_id": 1, "joint_angles": [1.5, 2, 3, 4, 5, 6], "robot_mode": 7, "note": null}
            ]
        });
        fs::write(&path, body.to_string()).unwrap();

        let ep = load_json_episode(&path, Path::new("/imgs")).unwrap();
        assert_eq!(ep.name, "3");
        assert_eq!(ep.prompt, "stack blocks");
        assert_eq!(ep.image_dir, PathBuf::from("/imgs/3/images"));
        assert_eq!(ep.frames.len(), 2);
        assert_eq!(ep.frames[1].joint_angles().unwrap()[0], 1.5);
        assert!(!ep.frames[1].contains("note"));
    }

    #[test]
    fn test_json_default_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("e.json");
        fs::write(&path, r#"{"episode_name": "e", "frames": []}"#).unwrap();
        let ep = load_json_episode(&path, dir.path()).unwrap();
        assert_eq!(ep.prompt, DEFAULT_PROMPT);
        assert!(ep.frames.is_empty());
    }

    #[test]
    fn test_json_structural_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"frames": 3}"#).unwrap();
        let err = load_json_episode(&path, dir.path()).unwrap_err();
        assert!(matches!(err, EngineError::EpisodeLoad { .. }));

        let missing = load_json_episode(&dir.path().join("nope.json"), dir.path()).unwrap_err();
        assert!(matches!(missing, EngineError::EpisodeLoad { .. }));
    }

    #[test]
    fn test_load_csv_episode() {
        let dir = tempfile::tempdir().unwrap();
        let ep_dir = dir.path().join("12");
        fs::create_dir(&ep_dir).unwrap();
        fs::write(
            ep_dir.join(CSV_FILE_NAME),
            "frame_id,timestamp,image_path,j1,j2,j3,j4,j5,j6,x,y,z,rx,ry,rz,gripper_tooldo1,gripper_tooldo2,robot_mode\n\
             0,0.00,frame_000000.jpg,10,20,30,40,50,60,300,0,200,180,0,90,1,0,7\n\
             1,0.10,frame_000001.jpg,11,20,30,40,50,60,301,0,200,180,0,90,,0,5\n",
        )
        .unwrap();

        let ep = load_csv_episode(&ep_dir, "pick").unwrap();
        assert_eq!(ep.name, "12");
        assert_eq!(ep.prompt, "pick");
        assert_eq!(ep.image_dir, ep_dir.join("images"));
        assert_eq!(ep.frames.len(), 2);

        let f0 = &ep.frames[0];
        assert_eq!(f0.joint_angles().unwrap(), vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0]);
        assert_eq!(f0.vector(TCP_POSE_FIELD).unwrap().unwrap().len(), 6);
        assert_eq!(f0.mode_tag(), Some(7));
        assert_eq!(f0.scalar("gripper_tooldo1").unwrap(), Some(1.0));
        assert_eq!(f0.image_path().unwrap(), Some("frame_000000.jpg"));
        assert!(!f0.contains("j1"));

        // empty cell means the field is absent
        assert!(!ep.frames[1].contains("gripper_tooldo1"));
    }

    #[test]
    fn test_csv_short_rows_keep_their_frames() {
        let dir = tempfile::tempdir().unwrap();
        let ep_dir = dir.path().join("5");
        fs::create_dir(&ep_dir).unwrap();
        fs::write(
            ep_dir.join(CSV_FILE_NAME),
            "frame_id,j1,j2,gripper_tooldo1,robot_mode\n0,1,2,0,7\n1,1,2\n2,1\n3,1,2,1,7\n",
        )
        .unwrap();

        let ep = load_csv_episode(&ep_dir, "p").unwrap();
        assert_eq!(ep.frames.len(), 4);
        assert_eq!(ep.frames[1].joint_angles().unwrap(), vec![1.0, 2.0]);
        assert_eq!(ep.frames[1].mode_tag(), None);
        assert!(!ep.frames[1].contains("gripper_tooldo1"));
        // cut inside the joints: only the cells present
        assert_eq!(ep.frames[2].joint_angles().unwrap(), vec![1.0]);
        assert_eq!(ep.frames[3].mode_tag(), Some(7));
    }

    #[test]
    fn test_csv_without_joint_columns() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CSV_FILE_NAME), "frame_id,robot_mode\n0,7\n").unwrap();
        let err = load_csv_episode(dir.path(), "p").unwrap_err();
        assert!(matches!(err, EngineError::EpisodeLoad { .. }));
    }

    #[test]
    fn test_discover_json_range_and_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1.json", "2.json", "10.json", "notes.json", "readme.txt"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        let names = |paths: Vec<PathBuf>| -> Vec<String> {
            paths
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect()
        };

        let all = discover_json_episodes(dir.path(), None).unwrap();
        assert_eq!(names(all), vec!["1.json", "2.json", "10.json", "notes.json"]);

        let some = discover_json_episodes(dir.path(), Some(2..=10)).unwrap();
        assert_eq!(names(some), vec!["2.json", "10.json"]);
    }

    #[test]
    fn test_discover_csv_directories() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1", "2", "empty"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("1").join(CSV_FILE_NAME), "j1\n0\n").unwrap();
        fs::write(dir.path().join("2").join(CSV_FILE_NAME), "j1\n0\n").unwrap();
        let found = SourceFormat::Csv.discover(dir.path(), None).unwrap();
        assert_eq!(found, vec![dir.path().join("1"), dir.path().join("2")]);
    }
}
