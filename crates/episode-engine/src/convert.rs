use crate::delta::{synthesize_action, EpisodeHistory};
use crate::diagnostics::{Diagnosed, Diagnostic};
use crate::filter::filter_frames;
use crate::frame::{FieldError, RawEpisode, RawFrame};
use crate::gripper::extract_gripper;
use crate::pad::{pad_action, pad_state};
use robot_config::{RegistryError, RobotDescriptor, RobotRegistry};
use serde::Serialize;
use std::path::PathBuf;

/// Dataset-ready arrays for one episode.
///
/// `images`, `states`, `actions` and `tasks` always have the same length: one entry per
/// frame that survived filtering and parsing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvertedEpisode {
    pub name: String,
    pub images: Vec<PathBuf>,
    pub states: Vec<Vec<f32>>,
    pub actions: Vec<Vec<f32>>,
    pub tasks: Vec<String>,
    /// Position of each converted frame in the raw episode.
    pub source_positions: Vec<usize>,
}

impl ConvertedEpisode {
    fn with_capacity(name: &str, n: usize) -> Self {
        Self {
            name: name.to_string(),
            images: Vec::with_capacity(n),
            states: Vec::with_capacity(n),
            actions: Vec::with_capacity(n),
            tasks: Vec::with_capacity(n),
            source_positions: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Fields of one frame after parsing, before padding.
struct ParsedFrame<'a> {
    joints: Vec<f64>,
    gripper: Option<f64>,
    actions: Option<Vec<f64>>,
    image: PathBuf,
    task: Option<&'a str>,
}

fn parse_frame<'a>(
    frame: &'a RawFrame,
    position: usize,
    episode: &RawEpisode,
    desc: &RobotDescriptor,
) -> Result<ParsedFrame<'a>, FieldError> {
    let joints = frame.joint_angles()?;
    let gripper = extract_gripper(frame, desc.gripper())?;
    let actions = frame.actions()?;
    let image_name = match frame.image_path()? {
        Some(p) => p.to_string(),
        None => {
            let id = frame.frame_id()?.unwrap_or(position as u64);
            format!("frame_{id:06}.jpg")
        }
    };
    let task = frame.task()?;
    Ok(ParsedFrame {
        joints,
        gripper,
        actions,
        image: episode.image_dir.join(image_name),
        task,
    })
}

/// Convert one raw episode under `desc`.
///
/// Returns `None` (with an [`Diagnostic::EmptyEpisode`]) when no frame survives the mode
/// filter and per-frame parsing. Frames are processed strictly in order: synthesized
/// actions read the previous converted frame's joints and gripper value.
pub fn convert_episode(
    raw: &RawEpisode,
    desc: &RobotDescriptor,
) -> Diagnosed<Option<ConvertedEpisode>> {
    let (kept, mut diagnostics) = filter_frames(&raw.frames, desc).into_parts();
    let n = desc.num_joints();

    let mut out = ConvertedEpisode::with_capacity(&raw.name, kept.len());
    let mut history = EpisodeHistory::new();

    for k in kept {
        let parsed = match parse_frame(k.frame, k.position, raw, desc) {
            Ok(p) => p,
            Err(e) => {
                diagnostics.push(
                    Diagnostic::FrameDropped {
                        frame: None,
                        reason: e.to_string(),
                    }
                    .at_frame(k.position),
                );
                continue;
            }
        };

        let (state, state_diags) = pad_state(&parsed.joints, parsed.gripper, desc).into_parts();
        diagnostics.extend(state_diags.into_iter().map(|d| d.at_frame(k.position)));

        let mut joints = parsed.joints;
        joints.resize(n, 0.0);
        let index = history.push(joints, parsed.gripper);

        let raw_action = match parsed.actions {
            Some(a) => a,
            None => synthesize_action(index, &history, desc),
        };
        let (action, action_diags) = pad_action(&raw_action, desc).into_parts();
        diagnostics.extend(action_diags.into_iter().map(|d| d.at_frame(k.position)));

        out.images.push(parsed.image);
        out.states.push(state);
        out.actions.push(action);
        out.tasks
            .push(parsed.task.unwrap_or(raw.prompt.as_str()).to_string());
        out.source_positions.push(k.position);
    }

    debug_assert!(
        out.images.len() == out.states.len()
            && out.states.len() == out.actions.len()
            && out.actions.len() == out.tasks.len()
    );

    if out.is_empty() {
        diagnostics.push(Diagnostic::EmptyEpisode {
            episode: raw.name.clone(),
        });
    }
    for d in &diagnostics {
        d.emit(&raw.name);
    }
    tracing::debug!(
        episode = %raw.name,
        frames = out.len(),
        diagnostics = diagnostics.len(),
        "converted episode"
    );

    let value = (!out.is_empty()).then_some(out);
    Diagnosed::new(value, diagnostics)
}

/// Look the robot up by name, then [`convert_episode`].
pub fn convert_with_registry(
    raw: &RawEpisode,
    registry: &RobotRegistry,
    robot: &str,
) -> Result<Diagnosed<Option<ConvertedEpisode>>, RegistryError> {
    let desc = registry.lookup(robot)?;
    Ok(convert_episode(raw, desc))
}
