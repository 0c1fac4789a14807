//! Soft failures recorded during conversion.
//!
//! A noisy field log should still yield as much data as possible, so short joint arrays,
//! odd action lengths and missing gripper readings are repaired in place and reported
//! here instead of being raised.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Fewer joint angles than the descriptor's joint count; missing entries zero-filled.
    ShortJointAngles {
        frame: Option<usize>,
        found: usize,
        expected: usize,
    },
    /// Fewer action entries than joints; missing joint deltas zero-filled.
    ShortActions {
        frame: Option<usize>,
        found: usize,
        expected: usize,
    },
    /// Action vector longer than expected, or lacking the gripper delta at `num_joints`.
    ActionLengthMismatch {
        frame: Option<usize>,
        found: usize,
        expected: usize,
    },
    /// Descriptor declares a gripper but the frame yielded no value; `0.0` used.
    GripperMissing { frame: Option<usize> },
    /// Frames removed by the control-mode filter.
    FramesFiltered {
        mode: i64,
        kept: usize,
        dropped: usize,
    },
    /// A field could not be parsed; the whole frame was skipped.
    FrameDropped { frame: Option<usize>, reason: String },
    /// No frame survived filtering and parsing; the episode contributes nothing.
    EmptyEpisode { episode: String },
}

impl Diagnostic {
    /// Attach the position of the frame within its raw episode.
    pub fn at_frame(mut self, position: usize) -> Self {
        match &mut self {
            Diagnostic::ShortJointAngles { frame, .. }
            | Diagnostic::ShortActions { frame, .. }
            | Diagnostic::ActionLengthMismatch { frame, .. }
            | Diagnostic::GripperMissing { frame }
            | Diagnostic::FrameDropped { frame, .. } => *frame = Some(position),
            Diagnostic::FramesFiltered { .. } | Diagnostic::EmptyEpisode { .. } => {}
        }
        self
    }

    pub fn frame(&self) -> Option<usize> {
        match self {
            Diagnostic::ShortJointAngles { frame, .. }
            | Diagnostic::ShortActions { frame, .. }
            | Diagnostic::ActionLengthMismatch { frame, .. }
            | Diagnostic::GripperMissing { frame }
            | Diagnostic::FrameDropped { frame, .. } => *frame,
            Diagnostic::FramesFiltered { .. } | Diagnostic::EmptyEpisode { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Diagnostic::ShortJointAngles { .. } => "short_joint_angles",
            Diagnostic::ShortActions { .. } => "short_actions",
            Diagnostic::ActionLengthMismatch { .. } => "action_length_mismatch",
            Diagnostic::GripperMissing { .. } => "gripper_missing",
            Diagnostic::FramesFiltered { .. } => "frames_filtered",
            Diagnostic::FrameDropped { .. } => "frame_dropped",
            Diagnostic::EmptyEpisode { .. } => "empty_episode",
        }
    }

    /// Malformed source data, as opposed to informational bookkeeping.
    pub fn is_malformed_frame(&self) -> bool {
        matches!(
            self,
            Diagnostic::ShortJointAngles { .. }
                | Diagnostic::ShortActions { .. }
                | Diagnostic::ActionLengthMismatch { .. }
                | Diagnostic::FrameDropped { .. }
        )
    }

    /// Filter counts and empty episodes are progress; everything else is a warning.
    pub fn level(&self) -> tracing::Level {
        match self {
            Diagnostic::FramesFiltered { .. } | Diagnostic::EmptyEpisode { .. } => {
                tracing::Level::INFO
            }
            _ => tracing::Level::WARN,
        }
    }

    pub(crate) fn emit(&self, episode: &str) {
        if self.level() == tracing::Level::INFO {
            tracing::info!(episode, "{self}")
        } else {
            tracing::warn!(episode, "{self}")
        }
    }
}

struct FramePrefix(Option<usize>);

impl fmt::Display for FramePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(i) => write!(f, "frame {i}: "),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ShortJointAngles {
                frame,
                found,
                expected,
            } => write!(
                f,
                "{}{found} joint angles, expected {expected} (zero-filled)",
                FramePrefix(*frame)
            ),
            Diagnostic::ShortActions {
                frame,
                found,
                expected,
            } => write!(
                f,
                "{}{found} action entries, expected at least {expected} (zero-filled)",
                FramePrefix(*frame)
            ),
            Diagnostic::ActionLengthMismatch {
                frame,
                found,
                expected,
            } => write!(
                f,
                "{}action length {found}, expected {expected}",
                FramePrefix(*frame)
            ),
            Diagnostic::GripperMissing { frame } => {
                write!(f, "{}no gripper reading, using 0.0", FramePrefix(*frame))
            }
            Diagnostic::FramesFiltered {
                mode,
                kept,
                dropped,
            } => write!(
                f,
                "filtered {} -> {kept} frames (mode=={mode})",
                kept + dropped
            ),
            Diagnostic::FrameDropped { frame, reason } => {
                write!(f, "{}dropped: {reason}", FramePrefix(*frame))
            }
            Diagnostic::EmptyEpisode { episode } => {
                write!(f, "episode {episode} has no convertible frames")
            }
        }
    }
}

/// A value together with the soft failures met while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosed<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Diagnosed<T> {
    pub fn new(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self { value, diagnostics }
    }

    pub fn clean(value: T) -> Self {
        Self::new(value, Vec::new())
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Diagnosed<U> {
        Diagnosed {
            value: f(self.value),
            diagnostics: self.diagnostics,
        }
    }

    pub fn into_parts(self) -> (T, Vec<Diagnostic>) {
        (self.value, self.diagnostics)
    }
}
