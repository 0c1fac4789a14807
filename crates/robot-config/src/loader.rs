use crate::builtin::builtin_descriptors;
use crate::error::{RegistryError, Result};
use crate::types::RobotDescriptor;
use anyhow::Context;
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Caller-owned name -> descriptor map.
///
/// Registration overwrites any previous entry with the same name. Lookups only need
/// `&self`, so a registry can be shared across conversion workers behind an `Arc`;
/// re-registration while workers are running must be serialized by the owner.
#[derive(Debug, Default, Clone)]
pub struct RobotRegistry {
    robots: HashMap<String, RobotDescriptor>,
}

impl RobotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in catalogue.
    pub fn with_builtin() -> Result<Self> {
        let mut reg = Self::new();
        for desc in builtin_descriptors()? {
            reg.register(desc);
        }
        Ok(reg)
    }

    /// Insert or replace; returns the descriptor previously registered under that name.
    pub fn register(&mut self, desc: RobotDescriptor) -> Option<RobotDescriptor> {
        let name = desc.name().to_string();
        let previous = self.robots.insert(name.clone(), desc);
        if previous.is_some() {
            tracing::debug!(robot = %name, "replaced robot descriptor");
        }
        previous
    }

    pub fn lookup(&self, name: &str) -> Result<&RobotDescriptor> {
        self.robots
            .get(name)
            .ok_or_else(|| RegistryError::UnknownRobot {
                name: name.to_string(),
                available: self.names().into_iter().map(str::to_string).collect(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.robots.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.robots.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.robots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.robots.is_empty()
    }

    /// Descriptors in name order.
    pub fn iter(&self) -> impl Iterator<Item = &RobotDescriptor> {
        let mut all: Vec<&RobotDescriptor> = self.robots.values().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all.into_iter()
    }

    /// Register every descriptor found in `dir`; returns how many were loaded.
    pub fn extend_from_dir(&mut self, dir: impl AsRef<Path>) -> anyhow::Result<usize> {
        let loaded = load_descriptors_dir(dir)?;
        let n = loaded.len();
        for (_, desc) in loaded.robots {
            self.register(desc);
        }
        Ok(n)
    }
}

pub fn load_descriptor_file(path: impl AsRef<Path>) -> anyhow::Result<RobotDescriptor> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading descriptor: {}", path.display()))?;
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let desc: RobotDescriptor = if is_json {
        serde_json::from_str(&raw)
            .with_context(|| format!("decoding descriptor: {}", path.display()))?
    } else {
        let val: Value = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing yaml: {}", path.display()))?;
        serde_yaml::from_value(val)
            .with_context(|| format!("decoding descriptor: {}", path.display()))?
    };
    Ok(desc)
}

pub fn load_descriptors_dir(dir: impl AsRef<Path>) -> anyhow::Result<RobotRegistry> {
    let dir = dir.as_ref();
    let mut reg = RobotRegistry::default();
    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("reading directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if let Some(ext) = path.extension() {
            if ext == "yml" || ext == "yaml" || ext == "json" {
                entries.push(path);
            }
        }
    }
    entries.sort();
    for p in entries {
        let desc = load_descriptor_file(&p)?;
        reg.register(desc);
    }
    tracing::info!(dir = %dir.display(), robots = reg.len(), "loaded robot descriptors");
    Ok(reg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GripperPolicy;

    #[test]
    fn test_lookup_unknown_robot() {
        let reg = RobotRegistry::new();
        let err = reg.lookup("ghost").unwrap_err();
        assert!(matches!(err, RegistryError::UnknownRobot { ref name, .. } if name == "ghost"));
    }

    #[test]
    fn test_register_overwrites_by_name() {
        let mut reg = RobotRegistry::new();
        let a = RobotDescriptor::builder("arm", 6).build().unwrap();
        let b = RobotDescriptor::builder("arm", 7)
            .gripper(GripperPolicy::direct(["g"]).unwrap())
            .build()
            .unwrap();
        assert!(reg.register(a).is_none());
        let replaced = reg.register(b).unwrap();
        assert_eq!(replaced.num_joints(), 6);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.lookup("arm").unwrap().state_dim(), 9);
    }

    #[test]
    fn test_builtin_catalogue() {
        let reg = RobotRegistry::with_builtin().unwrap();
        assert_eq!(reg.names(), vec!["6dof_no_gripper", "7dof_robot", "dobot_e6"]);
        let e6 = reg.lookup("dobot_e6").unwrap();
        assert_eq!(e6.state_dim(), 8);
        assert_eq!(e6.filter_mode(), Some(7));
    }

    #[test]
    fn test_load_dir_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a.yaml"),
            "name: alpha\nnum_joints: 5\nuse_dummy_dimension: false\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("b.json"),
            r#"{"name": "beta", "num_joints": 2, "gripper": {"source_fields": ["g"]}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let reg = load_descriptors_dir(dir.path()).unwrap();
        assert_eq!(reg.names(), vec!["alpha", "beta"]);
        assert_eq!(reg.lookup("alpha").unwrap().state_dim(), 5);
        assert_eq!(reg.lookup("beta").unwrap().state_dim(), 4);
    }

    #[test]
    fn test_load_invalid_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "name: broken\nnum_joints: 0\n").unwrap();
        let err = load_descriptor_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.yaml"));
    }

    #[test]
    fn test_shipped_configs() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/robots");
        let reg = load_descriptors_dir(dir).unwrap();
        let e6 = reg.lookup("dobot_e6").unwrap();
        let builtin = RobotRegistry::with_builtin().unwrap();
        assert_eq!(e6, builtin.lookup("dobot_e6").unwrap());

        let binary = reg.lookup("7dof_binary_gripper").unwrap();
        assert_eq!((binary.state_dim(), binary.action_dim()), (9, 9));
        assert_eq!(reg.lookup("7dof_no_gripper").unwrap().state_dim(), 8);

        let gantry = reg.lookup("linear_gantry").unwrap();
        assert_eq!(gantry.joint_conversion().apply(250.0), 0.25);
        assert_eq!(gantry.default_fps(), 30);
    }
}
