//! Context cells, providers and the per-path context snapshot.

mod core;

pub use self::core::{
    Context, ContextId, ContextKind, ContextSnapshot, ProviderBinding, SUSPENSE_CONTEXT,
    SuspenseMeta, SuspenseProps, suspense,
};
