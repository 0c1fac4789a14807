use crate::diagnostics::{Diagnosed, Diagnostic};
use robot_config::RobotDescriptor;

/// Fixed-width state vector: `[joints.., dummy?, gripper?]`.
///
/// Only the first `num_joints` readings are used; a short reading is zero-filled. Joints
/// are converted to the descriptor's output unit. With a gripper channel an absent value
/// becomes `0.0`. The result always has exactly `state_dim` entries.
pub fn pad_state(
    joint_angles: &[f64],
    gripper: Option<f64>,
    desc: &RobotDescriptor,
) -> Diagnosed<Vec<f32>> {
    let n = desc.num_joints();
    let mut diagnostics = Vec::new();
    if joint_angles.len() < n {
        diagnostics.push(Diagnostic::ShortJointAngles {
            frame: None,
            found: joint_angles.len(),
            expected: n,
        });
    }

    let conv = desc.joint_conversion();
    let mut state: Vec<f32> = Vec::with_capacity(desc.state_dim());
    state.extend((0..n).map(|i| conv.apply(joint_angles.get(i).copied().unwrap_or(0.0)) as f32));
    if desc.use_dummy_dimension() {
        state.push(0.0);
    }
    if desc.has_gripper() {
        if gripper.is_none() {
            diagnostics.push(Diagnostic::GripperMissing { frame: None });
        }
        state.push(gripper.unwrap_or(0.0) as f32);
    }

    debug_assert_eq!(state.len(), desc.state_dim());
    Diagnosed::new(state, diagnostics)
}

/// Fixed-width action vector: `[joint deltas.., dummy?, gripper delta?]`.
///
/// The expected raw layout is `num_joints` joint deltas followed, when the robot has a
/// gripper, by the gripper delta at index `num_joints`. Joint deltas get the same unit
/// conversion as joint positions; the gripper delta is copied as-is. Any other length is
/// repaired (zero-fill or truncation) and reported. The result always has exactly
/// `action_dim` entries.
pub fn pad_action(raw_actions: &[f64], desc: &RobotDescriptor) -> Diagnosed<Vec<f32>> {
    let n = desc.num_joints();
    let expected = n + usize::from(desc.has_gripper());
    let mut diagnostics = Vec::new();
    if raw_actions.len() < n {
        diagnostics.push(Diagnostic::ShortActions {
            frame: None,
            found: raw_actions.len(),
            expected: n,
        });
    } else if raw_actions.len() != expected {
        diagnostics.push(Diagnostic::ActionLengthMismatch {
            frame: None,
            found: raw_actions.len(),
            expected,
        });
    }

    let conv = desc.joint_conversion();
    let mut action: Vec<f32> = Vec::with_capacity(desc.action_dim());
    action.extend((0..n).map(|i| conv.apply(raw_actions.get(i).copied().unwrap_or(0.0)) as f32));
    if desc.use_dummy_dimension() {
        action.push(0.0);
    }
    if desc.has_gripper() {
        action.push(raw_actions.get(n).copied().unwrap_or(0.0) as f32);
    }

    debug_assert_eq!(action.len(), desc.action_dim());
    Diagnosed::new(action, diagnostics)
}
