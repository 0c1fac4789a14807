use robot_config::RobotDescriptor;

/// Per-episode memo of what each converted frame resolved to.
///
/// Joint readings are stored in the recorded unit, already cut or zero-filled to
/// `num_joints`, and gripper values as extracted. Action synthesis reads the previous
/// entry, so the history is owned by one episode conversion and never shared.
#[derive(Debug, Clone, Default)]
pub struct EpisodeHistory {
    joints: Vec<Vec<f64>>,
    grippers: Vec<Option<f64>>,
}

impl EpisodeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame; returns its index within the history.
    pub fn push(&mut self, joints: Vec<f64>, gripper: Option<f64>) -> usize {
        self.joints.push(joints);
        self.grippers.push(gripper);
        self.joints.len() - 1
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn joints(&self, index: usize) -> Option<&[f64]> {
        self.joints.get(index).map(Vec::as_slice)
    }

    pub fn gripper(&self, index: usize) -> Option<f64> {
        self.grippers.get(index).copied().flatten()
    }
}

/// Derive a raw action for frame `index` as the first difference with frame `index - 1`.
///
/// The result has the pre-padding layout `[joint deltas.., gripper delta?]` in the
/// recorded joint unit, and must go through [`pad_action`](crate::pad_action) like an
/// explicit action so conversion happens exactly once. Frame 0 has no predecessor and
/// yields all zeros. Missing gripper readings count as `0.0` on either side.
pub fn synthesize_action(
    index: usize,
    history: &EpisodeHistory,
    desc: &RobotDescriptor,
) -> Vec<f64> {
    let n = desc.num_joints();
    let mut action = vec![0.0; n + usize::from(desc.has_gripper())];
    if index == 0 {
        return action;
    }
    let (Some(cur), Some(prev)) = (history.joints(index), history.joints(index - 1)) else {
        return action;
    };

    for (j, slot) in action.iter_mut().take(n).enumerate() {
        if let (Some(c), Some(p)) = (cur.get(j), prev.get(j)) {
            *slot = c - p;
        }
    }
    if desc.has_gripper() {
        let cur_g = history.gripper(index).unwrap_or(0.0);
        let prev_g = history.gripper(index - 1).unwrap_or(0.0);
        action[n] = cur_g - prev_g;
    }
    action
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pad_action;
    use robot_config::GripperPolicy;

    fn e6() -> RobotDescriptor {
        RobotDescriptor::builder("e6", 6)
            .gripper(GripperPolicy::threshold(["gripper_tooldo1"], 0.5).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_first_frame_is_zero() {
        let mut h = EpisodeHistory::new();
        h.push(vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0], Some(1.0));
        let raw = synthesize_action(0, &h, &e6());
        assert_eq!(raw, vec![0.0; 7]);
        assert_eq!(pad_action(&raw, &e6()).value, vec![0.0; 8]);
    }

    #[test]
    fn test_first_differences() {
        let mut h = EpisodeHistory::new();
        h.push(vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0], Some(0.0));
        h.push(vec![11.0, 18.0, 30.0, 40.0, 50.0, 61.5], Some(1.0));
        let raw = synthesize_action(1, &h, &e6());
        assert_eq!(raw, vec![1.0, -2.0, 0.0, 0.0, 0.0, 1.5, 1.0]);
    }

    #[test]
    fn test_gripper_delta_treats_absent_as_zero() {
        let mut h = EpisodeHistory::new();
        h.push(vec![0.0; 6], None);
        h.push(vec![0.0; 6], Some(1.0));
        h.push(vec![0.0; 6], None);
        let d = e6();
        assert_eq!(synthesize_action(1, &h, &d)[6], 1.0);
        assert_eq!(synthesize_action(2, &h, &d)[6], -1.0);
    }

    #[test]
    fn test_no_gripper_layout() {
        let d = e6().to_builder().without_gripper().build().unwrap();
        let mut h = EpisodeHistory::new();
        h.push(vec![1.0; 6], Some(1.0));
        h.push(vec![2.0; 6], Some(0.0));
        assert_eq!(synthesize_action(1, &h, &d), vec![1.0; 6]);
    }

    #[test]
    fn test_deltas_converted_once_by_padder() {
        let d = e6();
        let mut h = EpisodeHistory::new();
        h.push(vec![0.0; 6], Some(0.0));
        h.push(vec![180.0, 0.0, 0.0, 0.0, 0.0, 0.0], Some(0.0));
        let padded = pad_action(&synthesize_action(1, &h, &d), &d);
        assert!(padded.is_clean());
        assert!((f64::from(padded.value[0]) - std::f64::consts::PI).abs() < 1e-6);
    }
}
