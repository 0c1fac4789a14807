use crate::diagnostics::{Diagnosed, Diagnostic};
use crate::frame::RawFrame;
use robot_config::RobotDescriptor;

/// A frame admitted by [`filter_frames`], with its position in the raw sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeptFrame<'a> {
    pub position: usize,
    pub frame: &'a RawFrame,
}

/// Keep only frames whose mode tag equals the descriptor's `filter_mode`, in order.
///
/// Without a configured mode every frame is kept and no diagnostic is produced. Frames
/// lacking a usable mode tag never match.
pub fn filter_frames<'a>(
    frames: &'a [RawFrame],
    desc: &RobotDescriptor,
) -> Diagnosed<Vec<KeptFrame<'a>>> {
    let all = frames
        .iter()
        .enumerate()
        .map(|(position, frame)| KeptFrame { position, frame });

    let Some(mode) = desc.filter_mode() else {
        return Diagnosed::clean(all.collect());
    };

    let kept: Vec<KeptFrame<'a>> = all.filter(|k| k.frame.mode_tag() == Some(mode)).collect();
    let dropped = frames.len() - kept.len();
    let diag = Diagnostic::FramesFiltered {
        mode,
        kept: kept.len(),
        dropped,
    };
    Diagnosed::new(kept, vec![diag])
}
