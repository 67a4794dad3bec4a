use std::sync::{Arc, Mutex};

use crate::logging::{LogLevel, Logger, METRICS_TARGET, SESSION_TARGET, event_with_fields};
use crate::metrics::RenderMetrics;

use super::audit::{SessionAudit, SessionAuditEvent, SessionAuditStage};

/// Forwards audit records to a structured logger.
pub struct AuditLogger {
    logger: Logger,
    level: LogLevel,
    target: String,
}

impl AuditLogger {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            level: LogLevel::Debug,
            target: format!("{SESSION_TARGET}.audit"),
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }
}

impl SessionAudit for AuditLogger {
    fn record(&self, event: SessionAuditEvent) {
        let level = match event.stage {
            SessionAuditStage::BoundaryTimedOut => LogLevel::Warn,
            _ => self.level,
        };
        let fields = event.details.into_iter();
        let _ = self.logger.log_event(event_with_fields(
            level,
            &self.target,
            event.stage.as_str(),
            fields,
        ));
    }
}

/// Emits metric snapshots every `interval_ticks` ticks. Zero disables it.
pub struct MetricsReporter {
    logger: Logger,
    metrics: Arc<Mutex<RenderMetrics>>,
    target: String,
    interval_ticks: u64,
    last_emit: Option<u64>,
}

impl MetricsReporter {
    pub fn new(logger: Logger, metrics: Arc<Mutex<RenderMetrics>>) -> Self {
        Self {
            logger,
            metrics,
            target: METRICS_TARGET.to_string(),
            interval_ticks: 20,
            last_emit: None,
        }
    }

    pub fn with_interval(mut self, ticks: u64) -> Self {
        self.interval_ticks = ticks;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Emit a snapshot if the interval elapsed. Returns true when one was
    /// written.
    pub fn on_tick(&mut self, tick: u64) -> bool {
        if self.interval_ticks == 0 {
            return false;
        }
        if let Some(last) = self.last_emit {
            if tick.saturating_sub(last) < self.interval_ticks {
                return false;
            }
        }
        self.last_emit = Some(tick);
        self.emit(tick)
    }

    /// Emit a snapshot regardless of the interval.
    pub fn emit(&self, tick: u64) -> bool {
        match self.metrics.lock() {
            Ok(guard) => {
                let event = guard.snapshot(tick).to_log_event(&self.target);
                self.logger.log_event(event).is_ok()
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;
    use crate::runtime::audit::SessionAuditEventBuilder;
    use serde_json::json;

    #[test]
    fn audit_logger_writes_one_event_per_record() {
        let sink = MemorySink::new();
        let audit = AuditLogger::new(Logger::new(sink.clone()));
        let mut builder = SessionAuditEventBuilder::new(SessionAuditStage::BoundaryTimedOut);
        builder.detail("boundary", json!("data"));
        audit.record(builder.finish());

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "boundary_timed_out");
        assert_eq!(events[0].level, LogLevel::Warn);
        assert_eq!(events[0].field("boundary"), Some(&json!("data")));
    }

    #[test]
    fn metrics_reporter_respects_its_interval() {
        let sink = MemorySink::new();
        let metrics = Arc::new(Mutex::new(RenderMetrics::new()));
        let mut reporter =
            MetricsReporter::new(Logger::new(sink.clone()), metrics).with_interval(5);
        assert!(reporter.on_tick(0));
        assert!(!reporter.on_tick(4));
        assert!(reporter.on_tick(5));
        assert_eq!(sink.messages(), vec!["render_metrics", "render_metrics"]);

        let mut off = MetricsReporter::new(Logger::new(sink.clone()), Arc::default())
            .with_interval(0);
        assert!(!off.on_tick(100));
    }
}
