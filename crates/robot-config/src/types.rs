use crate::error::{RegistryError, Result};
use crate::format::DescriptorFile;
use crate::units::{JointUnit, UnitConversion};
use serde::{Deserialize, Serialize};

pub const DEFAULT_THRESHOLD: f64 = 0.5;
pub const DEFAULT_DISCRETE: bool = true;
pub const DEFAULT_FPS: u32 = 10;
pub const DEFAULT_IMAGE_SIZE: (u32, u32) = (224, 224);

/// How a single gripper scalar is resolved from a frame's raw fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtractionMethod {
    /// First present source field, unconverted.
    Direct,
    /// First present source field, binarized: `1.0` when strictly above the threshold.
    Threshold(f64),
    /// Maximum over the declared source fields, missing ones counting as `0.0`. Absent when
    /// none of them is present.
    MaxOfSources,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GripperPolicy {
    source_fields: Vec<String>,
    method: ExtractionMethod,
    discrete: bool,
    precomputed_field: Option<String>,
    value_range: (f64, f64),
}

impl GripperPolicy {
    pub fn new<I, S>(source_fields: I, method: ExtractionMethod) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let source_fields: Vec<String> = source_fields.into_iter().map(Into::into).collect();
        if source_fields.is_empty() {
            return Err(RegistryError::invalid(
                "gripper",
                "source_fields must not be empty",
            ));
        }
        if let ExtractionMethod::Threshold(t) = method {
            if !t.is_finite() {
                return Err(RegistryError::invalid("gripper", "threshold must be finite"));
            }
        }
        Ok(Self {
            source_fields,
            method,
            discrete: DEFAULT_DISCRETE,
            precomputed_field: None,
            value_range: (0.0, 1.0),
        })
    }

    pub fn direct<I, S>(source_fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(source_fields, ExtractionMethod::Direct)
    }

    pub fn threshold<I, S>(source_fields: I, threshold: f64) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(source_fields, ExtractionMethod::Threshold(threshold))
    }

    pub fn max_of_sources<I, S>(source_fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(source_fields, ExtractionMethod::MaxOfSources)
    }

    /// Documents the intended output domain; extraction itself does not enforce it.
    pub fn with_discrete(mut self, discrete: bool) -> Self {
        self.discrete = discrete;
        self
    }

    /// A field that, when present, already holds the resolved gripper value.
    pub fn with_precomputed_field(mut self, field: impl Into<String>) -> Self {
        self.precomputed_field = Some(field.into());
        self
    }

    pub fn with_value_range(mut self, lo: f64, hi: f64) -> Self {
        self.value_range = (lo, hi);
        self
    }

    pub fn source_fields(&self) -> &[String] {
        &self.source_fields
    }

    pub fn method(&self) -> ExtractionMethod {
        self.method
    }

    pub fn is_discrete(&self) -> bool {
        self.discrete
    }

    pub fn precomputed_field(&self) -> Option<&str> {
        self.precomputed_field.as_deref()
    }

    pub fn value_range(&self) -> (f64, f64) {
        self.value_range
    }
}

/// Immutable description of a robot's kinematic and gripper shape.
///
/// `state_dim` and `action_dim` are derived as
/// `num_joints + dummy slot + gripper slot` when the descriptor is built. To change the
/// joint count or gripper presence, go through [`RobotDescriptor::to_builder`] and build a
/// new descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DescriptorFile", into = "DescriptorFile")]
pub struct RobotDescriptor {
    name: String,
    num_joints: usize,
    gripper: Option<GripperPolicy>,
    use_dummy_dimension: bool,
    joint_conversion: UnitConversion,
    filter_mode: Option<i64>,
    default_fps: u32,
    image_size: (u32, u32),
    data_collector: Option<String>,
    state_dim: usize,
    action_dim: usize,
}

impl RobotDescriptor {
    pub fn builder(name: impl Into<String>, num_joints: usize) -> DescriptorBuilder {
        DescriptorBuilder {
            name: name.into(),
            num_joints,
            gripper: None,
            use_dummy_dimension: true,
            joint_input_unit: JointUnit::Deg,
            joint_output_unit: JointUnit::Rad,
            filter_mode: None,
            default_fps: DEFAULT_FPS,
            image_size: DEFAULT_IMAGE_SIZE,
            data_collector: None,
            declared_dims: None,
        }
    }

    /// Start a new builder pre-filled with this descriptor's settings.
    pub fn to_builder(&self) -> DescriptorBuilder {
        DescriptorBuilder {
            name: self.name.clone(),
            num_joints: self.num_joints,
            gripper: self.gripper.clone(),
            use_dummy_dimension: self.use_dummy_dimension,
            joint_input_unit: self.joint_conversion.from_unit(),
            joint_output_unit: self.joint_conversion.to_unit(),
            filter_mode: self.filter_mode,
            default_fps: self.default_fps,
            image_size: self.image_size,
            data_collector: self.data_collector.clone(),
            declared_dims: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_joints(&self) -> usize {
        self.num_joints
    }

    pub fn gripper(&self) -> Option<&GripperPolicy> {
        self.gripper.as_ref()
    }

    pub fn has_gripper(&self) -> bool {
        self.gripper.is_some()
    }

    pub fn use_dummy_dimension(&self) -> bool {
        self.use_dummy_dimension
    }

    pub fn joint_input_unit(&self) -> JointUnit {
        self.joint_conversion.from_unit()
    }

    pub fn joint_output_unit(&self) -> JointUnit {
        self.joint_conversion.to_unit()
    }

    pub fn joint_conversion(&self) -> UnitConversion {
        self.joint_conversion
    }

    pub fn filter_mode(&self) -> Option<i64> {
        self.filter_mode
    }

    pub fn default_fps(&self) -> u32 {
        self.default_fps
    }

    /// Target image size as (width, height).
    pub fn image_size(&self) -> (u32, u32) {
        self.image_size
    }

    pub fn data_collector(&self) -> Option<&str> {
        self.data_collector.as_deref()
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    /// Index of the dummy slot in state/action vectors, if any.
    pub fn dummy_index(&self) -> Option<usize> {
        self.use_dummy_dimension.then_some(self.num_joints)
    }

    /// Index of the gripper slot in state/action vectors, if any.
    pub fn gripper_index(&self) -> Option<usize> {
        self.gripper
            .as_ref()
            .map(|_| self.num_joints + usize::from(self.use_dummy_dimension))
    }
}

pub(crate) fn derived_dim(num_joints: usize, dummy: bool, gripper: bool) -> usize {
    num_joints + usize::from(dummy) + usize::from(gripper)
}

#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    name: String,
    num_joints: usize,
    gripper: Option<GripperPolicy>,
    use_dummy_dimension: bool,
    joint_input_unit: JointUnit,
    joint_output_unit: JointUnit,
    filter_mode: Option<i64>,
    default_fps: u32,
    image_size: (u32, u32),
    data_collector: Option<String>,
    declared_dims: Option<(Option<usize>, Option<usize>)>,
}

impl DescriptorBuilder {
    pub fn num_joints(mut self, num_joints: usize) -> Self {
        self.num_joints = num_joints;
        self
    }

    pub fn gripper(mut self, gripper: GripperPolicy) -> Self {
        self.gripper = Some(gripper);
        self
    }

    pub fn without_gripper(mut self) -> Self {
        self.gripper = None;
        self
    }

    pub fn dummy_dimension(mut self, enabled: bool) -> Self {
        self.use_dummy_dimension = enabled;
        self
    }

    pub fn joint_units(mut self, input: JointUnit, output: JointUnit) -> Self {
        self.joint_input_unit = input;
        self.joint_output_unit = output;
        self
    }

    pub fn filter_mode(mut self, mode: Option<i64>) -> Self {
        self.filter_mode = mode;
        self
    }

    pub fn default_fps(mut self, fps: u32) -> Self {
        self.default_fps = fps;
        self
    }

    pub fn image_size(mut self, width: u32, height: u32) -> Self {
        self.image_size = (width, height);
        self
    }

    pub fn data_collector(mut self, collector: impl Into<String>) -> Self {
        self.data_collector = Some(collector.into());
        self
    }

    /// Dimensions stated explicitly by a config author. They are checked against the
    /// derivation formula at build time, never taken as-is.
    pub fn declared_dims(mut self, state_dim: Option<usize>, action_dim: Option<usize>) -> Self {
        self.declared_dims = Some((state_dim, action_dim));
        self
    }

    pub fn build(self) -> Result<RobotDescriptor> {
        let name = self.name;
        if name.trim().is_empty() {
            return Err(RegistryError::invalid(&name, "name must not be empty"));
        }
        if self.num_joints == 0 {
            return Err(RegistryError::invalid(&name, "num_joints must be >= 1"));
        }
        let joint_conversion =
            UnitConversion::between(self.joint_input_unit, self.joint_output_unit).ok_or_else(
                || {
                    RegistryError::invalid(
                        &name,
                        format!(
                            "joint units {} -> {} measure different quantities",
                            self.joint_input_unit.as_str(),
                            self.joint_output_unit.as_str()
                        ),
                    )
                },
            )?;
        if self.default_fps == 0 {
            return Err(RegistryError::invalid(&name, "default_fps must be > 0"));
        }
        if self.image_size.0 == 0 || self.image_size.1 == 0 {
            return Err(RegistryError::invalid(&name, "image_size must be non-zero"));
        }

        let dim = derived_dim(
            self.num_joints,
            self.use_dummy_dimension,
            self.gripper.is_some(),
        );
        if let Some((state, action)) = self.declared_dims {
            for (label, declared) in [("state_dim", state), ("action_dim", action)] {
                if let Some(d) = declared {
                    if d != dim {
                        return Err(RegistryError::invalid(
                            &name,
                            format!("{label}={d} disagrees with derived dimension {dim}"),
                        ));
                    }
                }
            }
        }

        Ok(RobotDescriptor {
            name,
            num_joints: self.num_joints,
            gripper: self.gripper,
            use_dummy_dimension: self.use_dummy_dimension,
            joint_conversion,
            filter_mode: self.filter_mode,
            default_fps: self.default_fps,
            image_size: self.image_size,
            data_collector: self.data_collector,
            state_dim: dim,
            action_dim: dim,
        })
    }
}
