use anyhow::Result;
use serde::Serialize;
use tracing::warn;

use episode_engine::{self as engine, ConvertedEpisode, SourceFormat};
use robot_config::RobotRegistry;

use crate::SourceArgs;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct GripperReport {
    pub episode: String,
    pub frames: usize,
    /// Frames with the gripper at 0.0 / 1.0 / anything else.
    pub zeros: usize,
    pub ones: usize,
    pub other: usize,
    pub min: f32,
    pub max: f32,
    /// Frame-to-frame changes of the gripper state.
    pub transitions: usize,
    /// Actions whose gripper delta is non-zero.
    pub nonzero_deltas: usize,
    pub diagnostics: usize,
}

pub(crate) fn gripper_report(ep: &ConvertedEpisode, index: usize) -> GripperReport {
    let values: Vec<f32> = ep
        .states
        .iter()
        .map(|s| s.get(index).copied().unwrap_or(0.0))
        .collect();
    let zeros = values.iter().filter(|v| **v == 0.0).count();
    let ones = values.iter().filter(|v| **v == 1.0).count();
    GripperReport {
        episode: ep.name.clone(),
        frames: values.len(),
        zeros,
        ones,
        other: values.len() - zeros - ones,
        min: values.iter().copied().fold(f32::INFINITY, f32::min),
        max: values.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        transitions: values.windows(2).filter(|w| w[0] != w[1]).count(),
        nonzero_deltas: ep
            .actions
            .iter()
            .filter(|a| a.get(index).is_some_and(|d| *d != 0.0))
            .count(),
        diagnostics: 0,
    }
}

pub(crate) fn run(registry: &RobotRegistry, src: &SourceArgs, json: bool) -> Result<()> {
    let desc = registry.lookup(&src.robot)?;
    let Some(index) = desc.gripper_index() else {
        anyhow::bail!("robot {} has no gripper channel", desc.name());
    };
    let format = SourceFormat::from(src.source);

    let mut reports = Vec::new();
    for path in src.discover()? {
        let raw = match format.load(&path, &src.images_dir, &src.prompt) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping episode");
                continue;
            }
        };
        let (converted, diagnostics) = engine::convert_episode(&raw, desc).into_parts();
        let Some(ep) = converted else {
            warn!(episode = %raw.name, "no frames left after filtering");
            continue;
        };
        let mut report = gripper_report(&ep, index);
        report.diagnostics = diagnostics.len();
        reports.push(report);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }
    for r in &reports {
        println!(
            "{}\tframes={}\tzeros={}\tones={}\tother={}\trange=[{:.3}, {:.3}]\ttransitions={}\tnonzero_deltas={}",
            r.episode,
            r.frames,
            r.zeros,
            r.ones,
            r.other,
            r.min,
            r.max,
            r.transitions,
            r.nonzero_deltas
        );
    }
    let total: usize = reports.iter().map(|r| r.nonzero_deltas).sum();
    println!(
        "{} episodes inspected, {} non-zero gripper deltas",
        reports.len(),
        total
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_gripper_report() {
        let ep = ConvertedEpisode {
            name: "e".to_string(),
            images: vec![PathBuf::new(); 5],
            states: [0.0, 0.0, 1.0, 1.0, 0.5]
                .iter()
                .map(|g| vec![0.0, 0.0, *g])
                .collect(),
            actions: [0.0, 0.0, 1.0, 0.0, -0.5]
                .iter()
                .map(|g| vec![0.0, 0.0, *g])
                .collect(),
            tasks: vec!["t".to_string(); 5],
            source_positions: (0..5).collect(),
        };
        let r = gripper_report(&ep, 2);
        assert_eq!((r.zeros, r.ones, r.other), (2, 2, 1));
        assert_eq!(r.transitions, 2);
        assert_eq!(r.nonzero_deltas, 2);
        assert_eq!((r.min, r.max), (0.0, 1.0));
    }
}
