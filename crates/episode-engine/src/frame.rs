use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

pub const JOINT_ANGLES_FIELD: &str = "joint_angles";
pub const MODE_FIELD: &str = "robot_mode";
pub const ACTIONS_FIELD: &str = "actions";
pub const IMAGE_FIELD: &str = "image_path";
pub const FRAME_ID_FIELD: &str = "frame_id";
pub const TASK_FIELD: &str = "task";

pub const DEFAULT_PROMPT: &str = "manipulation task";

/// One raw value as recorded by a collector. Anything that is not a recognizable scalar
/// or list lands in `Other`, so decoding a frame never fails on a single odd field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<FieldValue>),
    Other(serde_json::Value),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Other(serde_json::Value::Null))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(x) => Some(*x),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
            FieldValue::List(_) | FieldValue::Other(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            FieldValue::Float(x) if x.fract() == 0.0 && x.is_finite() => Some(*x as i64),
            FieldValue::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "text",
            FieldValue::List(_) => "list",
            FieldValue::Other(_) => "object",
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(i64::from(v))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<Vec<f64>> for FieldValue {
    fn from(v: Vec<f64>) -> Self {
        FieldValue::List(v.into_iter().map(FieldValue::Float).collect())
    }
}

impl From<&[f64]> for FieldValue {
    fn from(v: &[f64]) -> Self {
        FieldValue::List(v.iter().copied().map(FieldValue::Float).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("field {field}: expected {expected}, found {found}")]
pub struct FieldError {
    pub field: String,
    pub expected: &'static str,
    pub found: String,
}

impl FieldError {
    fn new(field: &str, expected: &'static str, value: &FieldValue) -> Self {
        let found = match value {
            FieldValue::Text(s) => format!("text {s:?}"),
            other => other.type_name().to_string(),
        };
        Self {
            field: field.to_string(),
            expected,
            found,
        }
    }
}

/// A mapping of named fields for one recorded frame.
///
/// Typed accessors treat a missing key and an explicit `null` alike as absent, and return
/// a [`FieldError`] when the value is present but unusable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawFrame {
    fields: BTreeMap<String, FieldValue>,
}

impl RawFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn scalar(&self, key: &str) -> Result<Option<f64>, FieldError> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| FieldError::new(key, "number", v)),
        }
    }

    pub fn vector(&self, key: &str) -> Result<Option<Vec<f64>>, FieldError> {
        match self.get(key) {
            None => Ok(None),
            Some(FieldValue::List(items)) => items
                .iter()
                .map(|item| {
                    item.as_f64()
                        .ok_or_else(|| FieldError::new(key, "list of numbers", item))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(v) => Err(FieldError::new(key, "list of numbers", v)),
        }
    }

    pub fn text(&self, key: &str) -> Result<Option<&str>, FieldError> {
        match self.get(key) {
            None => Ok(None),
            Some(FieldValue::Text(s)) => Ok(Some(s.as_str())),
            Some(v) => Err(FieldError::new(key, "text", v)),
        }
    }

    /// Joint readings; a frame without the field reads as an empty sequence.
    pub fn joint_angles(&self) -> Result<Vec<f64>, FieldError> {
        Ok(self.vector(JOINT_ANGLES_FIELD)?.unwrap_or_default())
    }

    /// Discrete control-mode tag. Only numeric tags count; missing, text or non-integer
    /// tags read as `None`.
    pub fn mode_tag(&self) -> Option<i64> {
        match self.get(MODE_FIELD)? {
            v @ (FieldValue::Int(_) | FieldValue::Float(_)) => v.as_i64(),
            _ => None,
        }
    }

    /// Explicit action vector; an empty list counts as "not recorded".
    pub fn actions(&self) -> Result<Option<Vec<f64>>, FieldError> {
        Ok(self.vector(ACTIONS_FIELD)?.filter(|a| !a.is_empty()))
    }

    pub fn frame_id(&self) -> Result<Option<u64>, FieldError> {
        match self.get(FRAME_ID_FIELD) {
            None => Ok(None),
            Some(v) => v
                .as_i64()
                .and_then(|i| u64::try_from(i).ok())
                .map(Some)
                .ok_or_else(|| FieldError::new(FRAME_ID_FIELD, "non-negative integer", v)),
        }
    }

    pub fn image_path(&self) -> Result<Option<&str>, FieldError> {
        self.text(IMAGE_FIELD)
    }

    /// Per-frame override of the episode prompt.
    pub fn task(&self) -> Result<Option<&str>, FieldError> {
        self.text(TASK_FIELD)
    }
}

/// One recorded episode as handed over by a raw episode source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEpisode {
    pub name: String,
    pub prompt: String,
    /// Directory that relative frame image paths resolve against.
    pub image_dir: PathBuf,
    pub frames: Vec<RawFrame>,
}

impl RawEpisode {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>, frames: Vec<RawFrame>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            image_dir: PathBuf::from("images"),
            frames,
        }
    }

    pub fn with_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(v: serde_json::Value) -> RawFrame {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_decode_mixed_fields() {
        let f = frame(json!({
            "frame_id": 3,
            "joint_angles": [1, 2.5, -3],
            "robot_mode": 7,
            "gripper_tooldo1": 0.7,
            "image_path": "frame_000003.jpg",
            "meta": {"k": "v"},
            "missing": null
        }));
        assert_eq!(f.frame_id().unwrap(), Some(3));
        assert_eq!(f.joint_angles().unwrap(), vec![1.0, 2.5, -3.0]);
        assert_eq!(f.mode_tag(), Some(7));
        assert_eq!(f.scalar("gripper_tooldo1").unwrap(), Some(0.7));
        assert_eq!(f.image_path().unwrap(), Some("frame_000003.jpg"));
        assert!(!f.contains("missing"));
        assert!(f.contains("meta"));
    }

    #[test]
    fn test_malformed_values_report_field() {
        let f = frame(json!({
            "joint_angles": [1.0, "abc"],
            "gripper": "open",
            "frame_id": -1
        }));
        let err = f.joint_angles().unwrap_err();
        assert_eq!(err.field, "joint_angles");
        assert!(err.to_string().contains("\"abc\""));
        assert!(f.scalar("gripper").is_err());
        assert!(f.frame_id().is_err());
    }

    #[test]
    fn test_numeric_text_is_accepted() {
        let f = frame(json!({"gripper_tooldo2": "1"}));
        assert_eq!(f.scalar("gripper_tooldo2").unwrap(), Some(1.0));
    }

    #[test]
    fn test_text_mode_tag_is_not_a_mode() {
        let f = frame(json!({"robot_mode": "7"}));
        assert_eq!(f.mode_tag(), None);
        assert_eq!(frame(json!({"robot_mode": 7})).mode_tag(), Some(7));
    }

    #[test]
    fn test_missing_joint_angles_is_empty() {
        let f = RawFrame::new();
        assert!(f.joint_angles().unwrap().is_empty());
        assert_eq!(f.mode_tag(), None);
    }

    #[test]
    fn test_empty_actions_count_as_absent() {
        let f = frame(json!({"actions": []}));
        assert_eq!(f.actions().unwrap(), None);
        let f = frame(json!({"actions": [0.1, 0.2]}));
        assert_eq!(f.actions().unwrap(), Some(vec![0.1, 0.2]));
    }

    #[test]
    fn test_float_mode_tag_with_integral_value() {
        let f = RawFrame::new().with(MODE_FIELD, 7.0);
        assert_eq!(f.mode_tag(), Some(7));
        let f = RawFrame::new().with(MODE_FIELD, 7.5);
        assert_eq!(f.mode_tag(), None);
    }
}
