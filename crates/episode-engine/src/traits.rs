use crate::sink::{DatasetSchema, EpisodeSummary, FrameRecord};
use crate::Result;
use image::RgbImage;
use std::path::Path;

pub trait ImageLoader: Send + Sync {
    /// Decode `path` as RGB at exactly `size` (width, height). Never fails: unreadable
    /// images come back as a placeholder.
    fn load(&self, path: &Path, size: (u32, u32)) -> RgbImage;
}

/// Destination for converted episodes.
///
/// Frames are staged with [`add_frame`](DatasetSink::add_frame) and become visible only
/// once [`commit_episode`](DatasetSink::commit_episode) succeeds. A failed commit leaves
/// nothing of the episode behind.
pub trait DatasetSink {
    fn schema(&self) -> &DatasetSchema;

    fn add_frame(&mut self, frame: FrameRecord) -> Result<()>;

    fn commit_episode(&mut self, episode: &str) -> Result<EpisodeSummary>;

    /// Discard all staged frames.
    fn abort_episode(&mut self);
}
