//! Fiber and hooks render engine for server-driven Bedrock forms.
//!
//! Components are plain closures over a [`HookCx`]. Each render pass expands
//! the element tree into fibers, resolves inherited controls, and serializes
//! the result into a fixed-width payload the client-side form decodes by
//! offset. A [`Session`] drives the pass loop for one player against a
//! [`Host`] that shows forms, schedules ticks and locks input.

pub mod builder;
pub mod context;
pub mod element;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod metrics;
pub mod protocol;
pub mod registry;
pub mod runtime;
pub mod suspense;
pub mod value;

pub use builder::{BuildOptions, BuildOutput, BuiltElement, RootState, TreeBuilder, build};
pub use context::{Context, SuspenseProps, suspense};
pub use element::{
    Component, Controls, Element, Node, Position, Props, Tag, button, fragment, image, panel, text,
};
pub use error::{FiberError, Result};
pub use hooks::{
    Cleanup, DirtyFlag, Dispatch, EventSignal, ExitHandle, HookCx, LocalSignal, RefHandle, Setter,
    cleanup,
};
pub use logging::{LogEvent, LogFields, LogLevel, Logger, LoggingError, LoggingResult};
pub use metrics::{MetricSnapshot, RenderMetrics};
pub use protocol::{ButtonTable, PayloadReader, SerializedForm, Serializer};
pub use registry::{Fiber, FiberId, FiberRegistry, Phase, Player};
pub use runtime::audit::{
    BufferedAudit, NullSessionAudit, SessionAudit, SessionAuditEvent, SessionAuditEventBuilder,
    SessionAuditStage,
};
pub use runtime::diagnostics::{AuditLogger, MetricsReporter};
pub use runtime::driver::{ScriptStep, SimulatedHost, run_scripted};
pub use runtime::{
    FormResponse, FormSurface, Host, InputLock, InputPermissions, RunHandle, Session,
    SessionConfig, SessionStatus, TickScheduler, render_once,
};
pub use suspense::{BoundaryRegistry, SuspenseOutcome, SuspenseReport};
pub use value::{Callback, SameValue, Value, callback};
