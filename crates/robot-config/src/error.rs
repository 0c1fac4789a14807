use thiserror::Error;

pub type Result<T, E = RegistryError> = core::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("unknown robot: {name} (available: {})", .available.join(", "))]
    UnknownRobot {
        name: String,
        available: Vec<String>,
    },
    #[error("invalid descriptor {name}: {reason}")]
    InvalidDescriptor { name: String, reason: String },
}

impl RegistryError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
