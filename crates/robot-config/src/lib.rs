//! robot-config: declarative robot descriptors and a name-keyed registry
//!
//! A [`RobotDescriptor`] captures everything the episode engine needs to know about a
//! robot's shape: joint count, gripper semantics, the optional dummy padding slot, joint
//! unit conventions and the control-mode filter. Descriptors are immutable once built;
//! the derived state/action widths are computed at construction and never edited in place.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod error;
pub use error::{RegistryError, Result};

pub mod units;
pub use units::{JointUnit, UnitConversion, UnitDimension};

mod types;
pub use types::{DescriptorBuilder, ExtractionMethod, GripperPolicy, RobotDescriptor};

mod format;
pub use format::{DescriptorFile, GripperFile, MethodName};

mod loader;
pub use loader::{load_descriptor_file, load_descriptors_dir, RobotRegistry};

mod builtin;
pub use builtin::builtin_descriptors;
