use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;

/// Counters accumulated by a render session.
#[derive(Debug, Default, Clone)]
pub struct RenderMetrics {
    render_passes: u64,
    activations: u64,
    effects_flushed: u64,
    forms_shown: u64,
    payload_bytes: u64,
    boundaries_resolved: u64,
    boundaries_timed_out: u64,
}

impl RenderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_render(&mut self, activations: usize, effects: usize) {
        self.render_passes = self.render_passes.saturating_add(1);
        self.activations = self.activations.saturating_add(activations as u64);
        self.effects_flushed = self.effects_flushed.saturating_add(effects as u64);
    }

    pub fn record_form(&mut self, payload_len: usize) {
        self.forms_shown = self.forms_shown.saturating_add(1);
        self.payload_bytes = self.payload_bytes.saturating_add(payload_len as u64);
    }

    pub fn record_boundaries(&mut self, resolved: usize, timed_out: usize) {
        self.boundaries_resolved = self.boundaries_resolved.saturating_add(resolved as u64);
        self.boundaries_timed_out = self.boundaries_timed_out.saturating_add(timed_out as u64);
    }

    pub fn snapshot(&self, tick: u64) -> MetricSnapshot {
        MetricSnapshot {
            tick,
            render_passes: self.render_passes,
            activations: self.activations,
            effects_flushed: self.effects_flushed,
            forms_shown: self.forms_shown,
            payload_bytes: self.payload_bytes,
            boundaries_resolved: self.boundaries_resolved,
            boundaries_timed_out: self.boundaries_timed_out,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub tick: u64,
    pub render_passes: u64,
    pub activations: u64,
    pub effects_flushed: u64,
    pub forms_shown: u64,
    pub payload_bytes: u64,
    pub boundaries_resolved: u64,
    pub boundaries_timed_out: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "render_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("tick".to_string(), json!(self.tick));
        map.insert("render_passes".to_string(), json!(self.render_passes));
        map.insert("activations".to_string(), json!(self.activations));
        map.insert("effects_flushed".to_string(), json!(self.effects_flushed));
        map.insert("forms_shown".to_string(), json!(self.forms_shown));
        map.insert("payload_bytes".to_string(), json!(self.payload_bytes));
        map.insert(
            "boundaries_resolved".to_string(),
            json!(self.boundaries_resolved),
        );
        map.insert(
            "boundaries_timed_out".to_string(),
            json!(self.boundaries_timed_out),
        );
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_accumulates_counts() {
        let mut metrics = RenderMetrics::new();
        metrics.record_render(3, 2);
        metrics.record_render(1, 0);
        metrics.record_form(120);
        metrics.record_boundaries(1, 1);

        let snapshot = metrics.snapshot(7);
        assert_eq!(snapshot.render_passes, 2);
        assert_eq!(snapshot.activations, 4);
        assert_eq!(snapshot.effects_flushed, 2);
        assert_eq!(snapshot.payload_bytes, 120);
        assert_eq!(snapshot.boundaries_timed_out, 1);

        let event = snapshot.to_log_event("target");
        assert_eq!(event.message, "render_metrics");
        assert_eq!(event.field("tick"), Some(&json!(7)));
    }
}
