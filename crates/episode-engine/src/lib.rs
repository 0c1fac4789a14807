//! episode-engine: turn raw teleoperation episodes into dataset-ready tensors
//!
//! The engine is a pure, synchronous, single-pass transform. Given a
//! [`RobotDescriptor`](robot_config::RobotDescriptor) and a [`RawEpisode`], it filters frames
//! by control mode, resolves a gripper scalar per frame, pads joint readings into
//! fixed-width state vectors, and pads (or synthesizes, by first differences) the matching
//! action vectors. Frame-level problems never abort an episode: they come back as
//! [`Diagnostic`]s next to the converted value.
//!
//! Loading raw episodes, decoding images and writing the dataset are collaborators behind
//! the narrow seams in [`source`], [`ImageLoader`] and [`DatasetSink`].
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod error;
pub use error::{EngineError, Result};

mod diagnostics;
pub use diagnostics::{Diagnosed, Diagnostic};

mod frame;
pub use frame::{FieldError, FieldValue, RawEpisode, RawFrame, DEFAULT_PROMPT};

mod gripper;
pub use gripper::extract_gripper;

mod filter;
pub use filter::{filter_frames, KeptFrame};

mod pad;
pub use pad::{pad_action, pad_state};

mod delta;
pub use delta::{synthesize_action, EpisodeHistory};

mod convert;
pub use convert::{convert_episode, convert_with_registry, ConvertedEpisode};

pub mod source;
pub use source::SourceFormat;

mod traits;
pub use traits::{DatasetSink, ImageLoader};

mod images;
pub use images::{placeholder_image, FileImageLoader, PlaceholderImageLoader};

mod sink;
pub use sink::{
    commit_frames, load_frames, read_dataset_status, write_episode, DatasetSchema, DatasetStatus,
    DirectoryDatasetSink, EpisodeSummary, FrameRecord,
};

mod metrics;
pub use metrics::{ConversionMetrics, MetricsHub};

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::MemorySink;
