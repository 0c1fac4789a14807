use crate::diagnostics::Diagnostic;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct ConversionMetrics {
    pub episodes_converted: IntCounter,
    pub episodes_skipped: IntCounter,
    pub episodes_failed: IntCounter,
    pub frames_written: IntCounter,
    pub frames_filtered: IntCounter,
    pub diagnostics: IntCounterVec,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub conv: ConversionMetrics,
}

fn counter(name: &str, help: &str) -> Result<IntCounter, String> {
    IntCounter::new(name, help).map_err(|e| format!("metrics init error: {e}"))
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let diagnostics = IntCounterVec::new(
            Opts::new("teleop_diagnostics", "Conversion diagnostics by kind"),
            &["kind"],
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let conv = ConversionMetrics {
            episodes_converted: counter(
                "teleop_episodes_converted",
                "Episodes converted and committed",
            )?,
            episodes_skipped: counter(
                "teleop_episodes_skipped",
                "Episodes with no frames left after filtering",
            )?,
            episodes_failed: counter(
                "teleop_episodes_failed",
                "Episodes that failed to load or commit",
            )?,
            frames_written: counter("teleop_frames_written", "Frames written to the dataset")?,
            frames_filtered: counter(
                "teleop_frames_filtered",
                "Frames removed by the control-mode filter",
            )?,
            diagnostics,
        };
        let _ = registry.register(Box::new(conv.episodes_converted.clone()));
        let _ = registry.register(Box::new(conv.episodes_skipped.clone()));
        let _ = registry.register(Box::new(conv.episodes_failed.clone()));
        let _ = registry.register(Box::new(conv.frames_written.clone()));
        let _ = registry.register(Box::new(conv.frames_filtered.clone()));
        let _ = registry.register(Box::new(conv.diagnostics.clone()));
        Ok(Self { registry, conv })
    }

    /// Count each diagnostic by kind; filter diagnostics also feed `frames_filtered`.
    pub fn record_diagnostics(&self, diagnostics: &[Diagnostic]) {
        for d in diagnostics {
            self.conv.diagnostics.with_label_values(&[d.kind()]).inc();
            if let Diagnostic::FramesFiltered { dropped, .. } = d {
                self.conv.frames_filtered.inc_by(*dropped as u64);
            }
        }
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_encode() {
        let hub = MetricsHub::new().unwrap();
        hub.record_diagnostics(&[
            Diagnostic::FramesFiltered {
                mode: 7,
                kept: 7,
                dropped: 3,
            },
            Diagnostic::GripperMissing { frame: Some(1) },
            Diagnostic::GripperMissing { frame: Some(2) },
        ]);
        hub.conv.episodes_converted.inc();
        hub.conv.frames_written.inc_by(7);

        assert_eq!(hub.conv.frames_filtered.get(), 3);
        assert_eq!(
            hub.conv
                .diagnostics
                .with_label_values(&["gripper_missing"])
                .get(),
            2
        );
        let text = hub.encode_text();
        assert!(text.contains("teleop_frames_written 7"));
        assert!(text.contains("teleop_diagnostics{kind=\"frames_filtered\"} 1"));
    }
}
