//! Persisted descriptor format, as authored in YAML/JSON config files.

use crate::error::{RegistryError, Result};
use crate::types::{
    ExtractionMethod, GripperPolicy, RobotDescriptor, DEFAULT_FPS, DEFAULT_IMAGE_SIZE,
    DEFAULT_DISCRETE, DEFAULT_THRESHOLD,
};
use crate::units::JointUnit;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodName {
    #[default]
    Direct,
    Threshold,
    #[serde(alias = "max_of_sources")]
    Max,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GripperFile {
    #[serde(default)]
    pub source_fields: Vec<String>,
    #[serde(default)]
    pub extraction_method: MethodName,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_discrete")]
    pub discrete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default = "default_value_range")]
    pub value_range: (f64, f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorFile {
    pub name: String,
    pub num_joints: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gripper: Option<GripperFile>,
    #[serde(default = "default_true", alias = "use_dummy_dim")]
    pub use_dummy_dimension: bool,
    #[serde(default = "default_input_unit", alias = "joint_units")]
    pub joint_input_unit: JointUnit,
    #[serde(default = "default_output_unit", alias = "joint_output_units")]
    pub joint_output_unit: JointUnit,
    #[serde(default, alias = "filter_robot_mode")]
    pub filter_mode: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dim: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_dim: Option<usize>,
    #[serde(default = "default_fps")]
    pub default_fps: u32,
    #[serde(default = "default_image_size")]
    pub image_size: (u32, u32),
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_collector: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_discrete() -> bool {
    DEFAULT_DISCRETE
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_value_range() -> (f64, f64) {
    (0.0, 1.0)
}

fn default_input_unit() -> JointUnit {
    JointUnit::Deg
}

fn default_output_unit() -> JointUnit {
    JointUnit::Rad
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

fn default_image_size() -> (u32, u32) {
    DEFAULT_IMAGE_SIZE
}

impl GripperFile {
    fn into_policy(self, robot: &str) -> Result<GripperPolicy> {
        let mut sources = self.source_fields;
        if sources.is_empty() {
            // A lone field_name doubles as the only source.
            if let Some(f) = &self.field_name {
                sources.push(f.clone());
            }
        }
        let method = match self.extraction_method {
            MethodName::Direct => ExtractionMethod::Direct,
            MethodName::Threshold => ExtractionMethod::Threshold(self.threshold),
            MethodName::Max => ExtractionMethod::MaxOfSources,
        };
        let mut policy = GripperPolicy::new(sources, method).map_err(|e| match e {
            RegistryError::InvalidDescriptor { reason, .. } => {
                RegistryError::invalid(robot, format!("gripper: {reason}"))
            }
            other => other,
        })?;
        policy = policy
            .with_discrete(self.discrete)
            .with_value_range(self.value_range.0, self.value_range.1);
        if let Some(f) = self.field_name {
            policy = policy.with_precomputed_field(f);
        }
        Ok(policy)
    }
}

impl From<&GripperPolicy> for GripperFile {
    fn from(p: &GripperPolicy) -> Self {
        let (extraction_method, threshold) = match p.method() {
            ExtractionMethod::Direct => (MethodName::Direct, DEFAULT_THRESHOLD),
            ExtractionMethod::Threshold(t) => (MethodName::Threshold, t),
            ExtractionMethod::MaxOfSources => (MethodName::Max, DEFAULT_THRESHOLD),
        };
        Self {
            source_fields: p.source_fields().to_vec(),
            extraction_method,
            threshold,
            discrete: p.is_discrete(),
            field_name: p.precomputed_field().map(str::to_string),
            value_range: p.value_range(),
        }
    }
}

impl TryFrom<DescriptorFile> for RobotDescriptor {
    type Error = RegistryError;

    fn try_from(file: DescriptorFile) -> Result<Self> {
        let mut b = RobotDescriptor::builder(file.name.clone(), file.num_joints)
            .dummy_dimension(file.use_dummy_dimension)
            .joint_units(file.joint_input_unit, file.joint_output_unit)
            .filter_mode(file.filter_mode)
            .default_fps(file.default_fps)
            .image_size(file.image_size.0, file.image_size.1)
            .declared_dims(file.state_dim, file.action_dim);
        if let Some(g) = file.gripper {
            b = b.gripper(g.into_policy(&file.name)?);
        }
        if let Some(c) = file.data_collector {
            b = b.data_collector(c);
        }
        b.build()
    }
}

impl From<RobotDescriptor> for DescriptorFile {
    fn from(d: RobotDescriptor) -> Self {
        Self {
            name: d.name().to_string(),
            num_joints: d.num_joints(),
            gripper: d.gripper().map(GripperFile::from),
            use_dummy_dimension: d.use_dummy_dimension(),
            joint_input_unit: d.joint_input_unit(),
            joint_output_unit: d.joint_output_unit(),
            filter_mode: d.filter_mode(),
            state_dim: Some(d.state_dim()),
            action_dim: Some(d.action_dim()),
            default_fps: d.default_fps(),
            image_size: d.image_size(),
            data_collector: d.data_collector().map(str::to_string),
        }
    }
}
