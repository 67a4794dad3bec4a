//! Session orchestration: one player's render loop against a host.
//!
//! A session renders its root, shows the payload, and reacts to two host
//! inputs: fired scheduler handles ([`Session::on_tick`]) and form responses
//! ([`Session::handle_response`]). Forms cannot be updated in place, so a
//! refresh means closing the current form and presenting a new one on the
//! next tick.

use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::builder::{BuildOptions, BuildOutput, build};
use crate::element::Node;
use crate::error::{FiberError, Result};
use crate::hooks::DirtyFlag;
use crate::logging::{
    LogLevel, Logger, METRICS_TARGET, SESSION_TARGET, SUSPENSE_TARGET, event_with_fields, json_kv,
};
use crate::metrics::RenderMetrics;
use crate::protocol::{ButtonTable, SerializedForm, Serializer};
use crate::registry::{FiberRegistry, Player};
use crate::suspense::{BoundaryRegistry, SuspenseReport};

pub mod audit;
pub mod diagnostics;
pub mod driver;
pub mod host;
mod input_lock;

pub use self::audit::{
    BufferedAudit, NullSessionAudit, SessionAudit, SessionAuditEvent, SessionAuditEventBuilder,
    SessionAuditStage,
};
pub use self::diagnostics::{AuditLogger, MetricsReporter};
pub use self::host::{
    FormResponse, FormSurface, FormTicket, Host, InputLock, InputPermissions, RunHandle,
    TickScheduler,
};
pub use self::input_lock::InputLockGuard;

/// Configuration knobs for a session.
#[derive(Clone)]
pub struct SessionConfig {
    /// Ticks between suspense polls while a boundary is pending.
    pub poll_interval_ticks: u64,
    /// Timeout for boundaries that do not set their own.
    pub default_suspense_timeout_ticks: u64,
    /// Upper bound on build passes per presentation while state keeps
    /// changing during the build.
    pub max_render_passes: usize,
    pub logger: Option<Logger>,
    pub metrics: Option<Arc<Mutex<RenderMetrics>>>,
    /// Ticks between metrics snapshots. Zero disables snapshots.
    pub metrics_interval_ticks: u64,
    pub metrics_target: String,
    pub audit: Option<Arc<dyn SessionAudit>>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ticks: 1,
            default_suspense_timeout_ticks: 100,
            max_render_passes: 4,
            logger: None,
            metrics: None,
            metrics_interval_ticks: 0,
            metrics_target: METRICS_TARGET.to_string(),
            audit: None,
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("poll_interval_ticks", &self.poll_interval_ticks)
            .field(
                "default_suspense_timeout_ticks",
                &self.default_suspense_timeout_ticks,
            )
            .field("max_render_passes", &self.max_render_passes)
            .field("logger", &self.logger)
            .field("metrics", &self.metrics.is_some())
            .field("metrics_interval_ticks", &self.metrics_interval_ticks)
            .field("audit", &self.audit.is_some())
            .finish()
    }
}

impl SessionConfig {
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn SessionAudit>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_poll_interval(mut self, ticks: u64) -> Self {
        self.poll_interval_ticks = ticks.max(1);
        self
    }

    pub fn with_suspense_timeout(mut self, ticks: u64) -> Self {
        self.default_suspense_timeout_ticks = ticks;
        self
    }

    pub fn with_max_render_passes(mut self, passes: usize) -> Self {
        self.max_render_passes = passes.max(1);
        self
    }

    pub fn with_metrics_interval(mut self, ticks: u64) -> Self {
        self.metrics_interval_ticks = ticks;
        self
    }

    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(RenderMetrics::new())));
        }
    }

    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    pub fn metrics_handle(&self) -> Option<Arc<Mutex<RenderMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Open,
    Closed,
}

/// What a form response leads to.
enum Next {
    Continue,
    Teardown(&'static str),
}

/// One player's render loop.
pub struct Session {
    player: Player,
    root: Node,
    config: SessionConfig,
    registry: FiberRegistry,
    boundaries: BoundaryRegistry,
    dirty: DirtyFlag,
    serializer: Serializer,
    status: SessionStatus,
    lock: Option<InputLockGuard>,
    watch: Option<RunHandle>,
    poll: Option<RunHandle>,
    refresh: Option<RunHandle>,
    refresh_pending: bool,
    showing: bool,
    buttons: ButtonTable,
    last_payload: Option<String>,
    reporter: Option<MetricsReporter>,
}

impl Session {
    pub fn new(player: Player, root: impl Into<Node>, mut config: SessionConfig) -> Self {
        config.logger = config
            .logger
            .take()
            .map(|logger| logger.with_field("player", player.id()));
        let reporter = match (&config.logger, &config.metrics) {
            (Some(logger), Some(metrics)) if config.metrics_interval_ticks > 0 => Some(
                MetricsReporter::new(logger.clone(), Arc::clone(metrics))
                    .with_interval(config.metrics_interval_ticks)
                    .with_target(config.metrics_target.clone()),
            ),
            _ => None,
        };
        Self {
            player,
            root: root.into(),
            config,
            registry: FiberRegistry::new(),
            boundaries: BoundaryRegistry::new(),
            dirty: DirtyFlag::new(),
            serializer: Serializer::new(),
            status: SessionStatus::Idle,
            lock: None,
            watch: None,
            poll: None,
            refresh: None,
            refresh_pending: false,
            showing: false,
            buttons: ButtonTable::default(),
            last_payload: None,
            reporter,
        }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    /// True while any suspense boundary is pending.
    pub fn is_waiting(&self) -> bool {
        self.boundaries.any_pending()
    }

    pub fn is_showing(&self) -> bool {
        self.showing
    }

    pub fn refresh_pending(&self) -> bool {
        self.refresh_pending
    }

    pub fn last_payload(&self) -> Option<&str> {
        self.last_payload.as_deref()
    }

    pub fn registry(&self) -> &FiberRegistry {
        &self.registry
    }

    pub fn boundaries(&self) -> &BoundaryRegistry {
        &self.boundaries
    }

    pub fn boundaries_mut(&mut self) -> &mut BoundaryRegistry {
        &mut self.boundaries
    }

    pub fn buttons(&self) -> &ButtonTable {
        &self.buttons
    }

    /// Handle of the running suspense poll, if any.
    pub fn poll_handle(&self) -> Option<RunHandle> {
        self.poll
    }

    /// Acquire the input lock, start the state watch and show the first
    /// form. Opening twice is a no-op.
    pub fn open<H: Host>(&mut self, host: &mut H) -> Result<()> {
        if self.status != SessionStatus::Idle {
            return Ok(());
        }
        self.lock = Some(InputLockGuard::acquire(&mut *host, &self.player)?);
        self.status = SessionStatus::Open;
        self.watch = Some(host.run_interval(1));
        self.audit(SessionAuditStage::SessionOpened, [json_kv("player", self.player.id())]);
        self.log(LogLevel::Info, "session_opened", [json_kv("name", self.player.name())]);

        if let Err(err) = self.present(host) {
            self.teardown(host, "error");
            return Err(err);
        }
        Ok(())
    }

    /// React to the response of the form currently shown.
    pub fn handle_response<H: Host>(&mut self, host: &mut H, response: FormResponse) -> Result<()> {
        if !self.is_open() || !self.showing {
            return Ok(());
        }
        self.showing = false;
        self.audit(
            SessionAuditStage::ResponseReceived,
            [
                json_kv("canceled", response.canceled),
                json_kv("selection", json!(response.selection)),
            ],
        );
        match self.respond(host, response) {
            Ok(Next::Continue) => Ok(()),
            Ok(Next::Teardown(reason)) => {
                self.teardown(host, reason);
                Ok(())
            }
            Err(err) => {
                self.log_error("response_failed", &err);
                self.teardown(host, "error");
                Err(err)
            }
        }
    }

    /// React to a fired scheduler handle. Unknown handles are ignored.
    pub fn on_tick<H: Host>(&mut self, host: &mut H, handle: RunHandle) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        let outcome = if self.refresh == Some(handle) {
            self.refresh = None;
            self.present(host)
        } else if self.poll == Some(handle) {
            self.poll_boundaries(host)
        } else if self.watch == Some(handle) {
            self.watch_state(host);
            Ok(())
        } else {
            Ok(())
        };

        if let Err(err) = outcome {
            self.log_error("tick_failed", &err);
            self.teardown(host, "error");
            return Err(err);
        }
        if self.registry.exit_requested(&self.player) {
            self.teardown(host, "exit");
        }
        let tick = host.current_tick();
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.on_tick(tick);
        }
        Ok(())
    }

    /// End the session from outside.
    pub fn close<H: Host>(&mut self, host: &mut H) {
        self.teardown(host, "closed");
    }

    fn respond<H: Host>(&mut self, host: &mut H, response: FormResponse) -> Result<Next> {
        let selection = match response.selection {
            Some(index) if !response.canceled => index,
            _ => {
                if self.refresh_pending {
                    self.refresh_pending = false;
                    self.refresh = Some(host.run_next_tick());
                    return Ok(Next::Continue);
                }
                return Ok(Next::Teardown("dismissed"));
            }
        };

        let pressed = self.buttons.press(selection)?;
        if !pressed {
            self.log(
                LogLevel::Warn,
                "unknown_selection",
                [json_kv("selection", selection)],
            );
        }
        if self.registry.exit_requested(&self.player) {
            return Ok(Next::Teardown("exit"));
        }
        self.present(host)?;
        Ok(Next::Continue)
    }

    /// Render, serialize and show. Starts the suspense poll when a boundary
    /// is pending.
    fn present<H: Host>(&mut self, host: &mut H) -> Result<()> {
        let now = host.current_tick();
        let form = self.render(now)?;
        host.show(&self.player, &form.payload)?;
        self.showing = true;
        self.refresh_pending = false;

        self.record_metrics(|m| m.record_form(form.payload.len()));
        self.audit(
            SessionAuditStage::FormShown,
            [
                json_kv("bytes", form.payload.len()),
                json_kv("nodes", form.node_count),
                json_kv("buttons", form.buttons.len()),
            ],
        );
        self.log(
            LogLevel::Debug,
            "form_shown",
            [
                json_kv("tick", now),
                json_kv("bytes", form.payload.len()),
                json_kv("waiting", self.boundaries.any_pending()),
            ],
        );

        self.buttons = form.buttons;
        self.last_payload = Some(form.payload);

        if self.boundaries.any_pending() && self.poll.is_none() {
            self.poll = Some(host.run_interval(self.config.poll_interval_ticks));
        }
        Ok(())
    }

    /// Build until state settles or the pass budget runs out, then
    /// serialize the last tree.
    fn render(&mut self, now: u64) -> Result<SerializedForm> {
        let mut passes = 0;
        loop {
            self.dirty.take();
            let output = self.build_pass(now)?;
            passes += 1;
            let report = self.boundaries.poll_all(now, &mut self.registry);
            self.note_report(&report);

            let settled = !self.dirty.is_set() && !report.all_just_resolved();
            if settled || passes >= self.config.max_render_passes {
                let form = self.serializer.serialize(&output.root)?;
                self.audit(
                    SessionAuditStage::RenderCommitted,
                    [
                        json_kv("passes", passes),
                        json_kv("activations", output.activated.len()),
                        json_kv("root_disabled", output.root_disabled),
                    ],
                );
                return Ok(form);
            }
        }
    }

    fn build_pass(&mut self, now: u64) -> Result<BuildOutput> {
        let options = BuildOptions::new(self.player.clone())
            .with_dirty(self.dirty.clone())
            .at_tick(now)
            .with_default_timeout(self.config.default_suspense_timeout_ticks);
        let output = build(
            &mut self.registry,
            &mut self.boundaries,
            &options,
            self.root.clone(),
        )?;
        self.record_metrics(|m| m.record_render(output.activated.len(), output.effects_run));
        Ok(output)
    }

    /// Suspense poll tick: rebuild so effects keep firing, then poll.
    fn poll_boundaries<H: Host>(&mut self, host: &mut H) -> Result<()> {
        let now = host.current_tick();
        if self.boundaries.any_pending() {
            self.build_pass(now)?;
        }
        let report = self.boundaries.poll_all(now, &mut self.registry);
        self.note_report(&report);

        if !self.boundaries.any_pending() {
            if let Some(poll) = self.poll.take() {
                host.clear_run(poll);
            }
        }
        if report.all_just_resolved() {
            self.request_refresh(host);
        }
        Ok(())
    }

    /// State watch tick: a changed state outside a suspense wait refreshes.
    fn watch_state<H: Host>(&mut self, host: &mut H) {
        if self.boundaries.any_pending() || self.refresh_pending || self.refresh.is_some() {
            return;
        }
        if self.dirty.is_set() {
            self.request_refresh(host);
        }
    }

    fn request_refresh<H: Host>(&mut self, host: &mut H) {
        if self.refresh_pending {
            return;
        }
        self.refresh_pending = true;
        if self.showing {
            host.close_all_forms(&self.player);
        } else {
            self.refresh_pending = false;
            self.refresh = Some(host.run_next_tick());
        }
    }

    fn note_report(&mut self, report: &SuspenseReport) {
        if report.is_quiet() && report.listener_errors.is_empty() {
            return;
        }
        self.record_metrics(|m| {
            m.record_boundaries(report.newly_resolved.len(), report.newly_timed_out.len())
        });
        for id in &report.newly_resolved {
            self.audit(SessionAuditStage::BoundaryResolved, [json_kv("boundary", id.as_str())]);
            self.log_target(
                LogLevel::Info,
                SUSPENSE_TARGET,
                "boundary_resolved",
                [json_kv("boundary", id.as_str())],
            );
        }
        for id in &report.newly_timed_out {
            self.audit(SessionAuditStage::BoundaryTimedOut, [json_kv("boundary", id.as_str())]);
            self.log_target(
                LogLevel::Warn,
                SUSPENSE_TARGET,
                "boundary_timed_out",
                [json_kv("boundary", id.as_str())],
            );
        }
        for message in &report.listener_errors {
            self.log_target(
                LogLevel::Error,
                SUSPENSE_TARGET,
                "boundary_listener_failed",
                [json_kv("error", message.as_str())],
            );
        }
    }

    /// Stop scheduled runs, delete every fiber of the session and release
    /// the input lock. Runs at most once.
    fn teardown<H: Host>(&mut self, host: &mut H, reason: &'static str) {
        if self.status == SessionStatus::Closed {
            return;
        }
        for handle in [self.watch.take(), self.poll.take(), self.refresh.take()]
            .into_iter()
            .flatten()
        {
            host.clear_run(handle);
        }
        if self.showing {
            self.showing = false;
            host.close_all_forms(&self.player);
        }
        let cancelled = self.boundaries.cancel_all();
        self.boundaries.clear();
        let removed = self.registry.clear_player(&self.player);
        let released = match self.lock.take() {
            Some(mut guard) => guard.release(&mut *host),
            None => false,
        };
        self.refresh_pending = false;
        self.buttons = ButtonTable::default();
        self.status = SessionStatus::Closed;

        let fields = [
            json_kv("reason", reason),
            json_kv("fibers_removed", removed),
            json_kv("boundaries_cancelled", cancelled),
            json_kv("lock_released", released),
        ];
        self.audit(SessionAuditStage::SessionClosed, fields.clone());
        self.log(LogLevel::Info, "session_closed", fields);
    }

    fn record_metrics(&self, f: impl FnOnce(&mut RenderMetrics)) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                f(&mut guard);
            }
        }
    }

    fn audit<I>(&self, stage: SessionAuditStage, details: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(audit) = self.config.audit.as_ref() {
            let mut builder = SessionAuditEventBuilder::new(stage);
            for (key, value) in details {
                builder.detail(key, value);
            }
            audit.record(builder.finish());
        }
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        self.log_target(level, SESSION_TARGET, message, fields);
    }

    fn log_target<I>(&self, level: LogLevel, target: &str, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.config.logger.as_ref() {
            let event = event_with_fields(level, target, message, fields);
            let _ = logger.log_event(event);
        }
    }

    fn log_error(&self, message: &str, err: &FiberError) {
        self.log(
            LogLevel::Error,
            message,
            [
                json_kv("error", err.to_string()),
                json_kv("programmer_error", err.is_programmer_error()),
            ],
        );
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("player", &self.player)
            .field("status", &self.status)
            .field("fibers", &self.registry.len())
            .field("waiting", &self.boundaries.any_pending())
            .field("refresh_pending", &self.refresh_pending)
            .finish_non_exhaustive()
    }
}

/// Build and serialize `root` once for `player`, without a host.
///
/// Boundaries found here are polled once; fibers stay in `registry`.
pub fn render_once(
    registry: &mut FiberRegistry,
    player: &Player,
    root: impl Into<Node>,
) -> Result<SerializedForm> {
    let mut boundaries = BoundaryRegistry::new();
    let options = BuildOptions::new(player.clone());
    let output = build(registry, &mut boundaries, &options, root.into())?;
    boundaries.poll_all(options.now_tick, registry);
    Serializer::new().serialize(&output.root)
}
