use crate::error::Result;
use crate::types::{GripperPolicy, RobotDescriptor};
use crate::units::JointUnit;

/// Descriptors shipped with the converter.
pub fn builtin_descriptors() -> Result<Vec<RobotDescriptor>> {
    Ok(vec![
        RobotDescriptor::builder("dobot_e6", 6)
            .gripper(
                GripperPolicy::threshold(["gripper_tooldo1"], 0.5)?
                    .with_precomputed_field("gripper")
                    .with_discrete(true),
            )
            .dummy_dimension(true)
            .joint_units(JointUnit::Deg, JointUnit::Rad)
            .filter_mode(Some(7))
            .data_collector("Dobot-Arm-DataCollect")
            .build()?,
        RobotDescriptor::builder("7dof_robot", 7)
            .gripper(
                GripperPolicy::direct(["gripper_position"])?
                    .with_precomputed_field("gripper")
                    .with_discrete(false)
                    .with_value_range(0.0, 1.0),
            )
            .dummy_dimension(true)
            .joint_units(JointUnit::Deg, JointUnit::Rad)
            .build()?,
        RobotDescriptor::builder("6dof_no_gripper", 6)
            .dummy_dimension(true)
            .joint_units(JointUnit::Deg, JointUnit::Rad)
            .build()?,
    ])
}
