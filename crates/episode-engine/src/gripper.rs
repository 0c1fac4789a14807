use crate::frame::{FieldError, RawFrame};
use robot_config::{ExtractionMethod, GripperPolicy};

/// Resolve the frame's gripper scalar under `policy`.
///
/// `Ok(None)` means "no reading": either the robot has no gripper channel or none of the
/// consulted fields is present. The caller decides between skipping and zero-filling.
/// A consulted field holding a non-numeric value is an error.
pub fn extract_gripper(
    frame: &RawFrame,
    policy: Option<&GripperPolicy>,
) -> Result<Option<f64>, FieldError> {
    let Some(policy) = policy else {
        return Ok(None);
    };

    if let Some(field) = policy.precomputed_field() {
        if let Some(v) = frame.scalar(field)? {
            return Ok(Some(v));
        }
    }

    match policy.method() {
        ExtractionMethod::Direct => first_present(frame, policy),
        ExtractionMethod::Threshold(threshold) => Ok(first_present(frame, policy)?
            .map(|raw| if raw > threshold { 1.0 } else { 0.0 })),
        ExtractionMethod::MaxOfSources => max_of_sources(frame, policy),
    }
}

fn first_present(frame: &RawFrame, policy: &GripperPolicy) -> Result<Option<f64>, FieldError> {
    for field in policy.source_fields() {
        if let Some(v) = frame.scalar(field)? {
            return Ok(Some(v));
        }
    }
    Ok(None)
}

fn max_of_sources(frame: &RawFrame, policy: &GripperPolicy) -> Result<Option<f64>, FieldError> {
    let mut any_present = false;
    let mut best = f64::NEG_INFINITY;
    for field in policy.source_fields() {
        let v = match frame.scalar(field)? {
            Some(v) => {
                any_present = true;
                v
            }
            None => 0.0,
        };
        best = best.max(v);
    }
    Ok(any_present.then_some(best))
}
