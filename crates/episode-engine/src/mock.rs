use crate::sink::{DatasetSchema, EpisodeSummary, FrameRecord};
use crate::traits::DatasetSink;
use crate::{EngineError, Result};
use uuid::Uuid;

/// In-memory [`DatasetSink`] with optional failure injection.
#[derive(Debug)]
pub struct MemorySink {
    schema: DatasetSchema,
    pending: Vec<FrameRecord>,
    committed: Vec<(EpisodeSummary, Vec<FrameRecord>)>,
    fail_commit_of: Option<String>,
    aborted: usize,
}

impl MemorySink {
    pub fn new(schema: DatasetSchema) -> Self {
        Self {
            schema,
            pending: Vec::new(),
            committed: Vec::new(),
            fail_commit_of: None,
            aborted: 0,
        }
    }

    /// Make `commit_episode` fail for the named episode.
    pub fn failing_commit_of(mut self, episode: impl Into<String>) -> Self {
        self.fail_commit_of = Some(episode.into());
        self
    }

    pub fn committed(&self) -> &[(EpisodeSummary, Vec<FrameRecord>)] {
        &self.committed
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn aborted(&self) -> usize {
        self.aborted
    }
}

impl DatasetSink for MemorySink {
    fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    fn add_frame(&mut self, frame: FrameRecord) -> Result<()> {
        frame.check(&self.schema)?;
        self.pending.push(frame);
        Ok(())
    }

    fn commit_episode(&mut self, episode: &str) -> Result<EpisodeSummary> {
        if self.fail_commit_of.as_deref() == Some(episode) {
            return Err(EngineError::Sink(format!("injected commit failure for {episode}")));
        }
        if self.pending.is_empty() {
            return Err(EngineError::Sink(format!("episode {episode}: no frames to commit")));
        }
        let frames = std::mem::take(&mut self.pending);
        let summary = EpisodeSummary {
            id: Uuid::new_v4(),
            index: self.committed.len(),
            name: episode.to_string(),
            length: frames.len(),
            tasks: frames.iter().map(|f| f.task.clone()).take(1).collect(),
            committed_at: String::new(),
        };
        self.committed.push((summary.clone(), frames));
        Ok(summary)
    }

    fn abort_episode(&mut self) {
        self.pending.clear();
        self.aborted += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::PlaceholderImageLoader;
    use crate::{convert_episode, write_episode, RawEpisode, RawFrame};
    use robot_config::{GripperPolicy, RobotDescriptor};

    fn desc() -> RobotDescriptor {
        RobotDescriptor::builder("arm", 3)
            .gripper(GripperPolicy::max_of_sources(["a", "b"]).unwrap())
            .image_size(4, 4)
            .build()
            .unwrap()
    }

    fn raw(name: &str) -> RawEpisode {
        let frames = (0..4)
            .map(|i| {
                RawFrame::new()
                    .with("joint_angles", vec![f64::from(i); 3])
                    .with("a", 0.2)
                    .with("b", 0.9)
            })
            .collect();
        RawEpisode::new(name, "push", frames)
    }

    #[test]
    fn test_convert_then_write() {
        let d = desc();
        let mut sink = MemorySink::new(DatasetSchema::for_robot(&d, None));
        let conv = convert_episode(&raw("e1"), &d).value.unwrap();
        let summary = write_episode(&mut sink, &PlaceholderImageLoader, &conv).unwrap();
        assert_eq!(summary.length, 4);
        let (_, frames) = &sink.committed()[0];
        assert_eq!(frames[0].state.len(), 5);
        assert!((frames[0].state[4] - 0.9).abs() < 1e-6);
        assert_eq!(frames[0].task, "push");
    }

    #[test]
    fn test_failed_commit_leaves_nothing() {
        let d = desc();
        let mut sink = MemorySink::new(DatasetSchema::for_robot(&d, None)).failing_commit_of("bad");
        let bad = convert_episode(&raw("bad"), &d).value.unwrap();
        assert!(write_episode(&mut sink, &PlaceholderImageLoader, &bad).is_err());
        assert!(sink.committed().is_empty());
        assert_eq!(sink.pending(), 0);
        assert_eq!(sink.aborted(), 1);

        let good = convert_episode(&raw("good"), &d).value.unwrap();
        write_episode(&mut sink, &PlaceholderImageLoader, &good).unwrap();
        assert_eq!(sink.committed().len(), 1);
        assert_eq!(sink.committed()[0].0.index, 0);
    }
}
