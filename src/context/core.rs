use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::element::{Element, ElementType, Node, Props};
use crate::error::{FiberError, Result};

pub type ContextId = u64;

/// Identity reserved for suspense boundary providers.
pub const SUSPENSE_CONTEXT: ContextId = 0;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(SUSPENSE_CONTEXT + 1);

/// A typed context cell. Cloning keeps the identity.
pub struct Context<T> {
    id: ContextId,
    default: Rc<T>,
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            default: Rc::clone(&self.default),
        }
    }
}

impl<T> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("id", &self.id).finish()
    }
}

impl<T: Clone + 'static> Context<T> {
    pub fn new(default: T) -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            default: Rc::new(default),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn default_value(&self) -> T {
        (*self.default).clone()
    }

    /// Provider element exposing `value` to every descendant.
    pub fn provide<I, N>(&self, value: T, children: I) -> Element
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        let binding = ProviderBinding {
            context: self.id,
            value: Rc::new(value),
            kind: ContextKind::Normal,
        };
        Element::from_parts(ElementType::Provider(binding), Props::new()).children(children)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspenseMeta {
    pub id: String,
    /// Ticks to wait before forcing resolution; `None` uses the session default.
    pub timeout_ticks: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum ContextKind {
    Normal,
    SuspenseBoundary(SuspenseMeta),
}

/// What a provider element pushes onto the context path.
#[derive(Clone)]
pub struct ProviderBinding {
    context: ContextId,
    value: Rc<dyn Any>,
    kind: ContextKind,
}

impl ProviderBinding {
    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn value(&self) -> &Rc<dyn Any> {
        &self.value
    }

    pub fn kind(&self) -> &ContextKind {
        &self.kind
    }

    pub fn suspense_meta(&self) -> Option<&SuspenseMeta> {
        match &self.kind {
            ContextKind::SuspenseBoundary(meta) => Some(meta),
            ContextKind::Normal => None,
        }
    }
}

impl fmt::Debug for ProviderBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderBinding")
            .field("context", &self.context)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct SuspenseProps {
    pub id: String,
    pub timeout_ticks: Option<u64>,
}

impl SuspenseProps {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timeout_ticks: None,
        }
    }

    pub fn timeout_ticks(mut self, ticks: u64) -> Self {
        self.timeout_ticks = Some(ticks);
        self
    }
}

/// Suspense boundary around `children`.
pub fn suspense<I, N>(props: SuspenseProps, children: I) -> Element
where
    I: IntoIterator<Item = N>,
    N: Into<Node>,
{
    let meta = SuspenseMeta {
        id: props.id,
        timeout_ticks: props.timeout_ticks,
    };
    let binding = ProviderBinding {
        context: SUSPENSE_CONTEXT,
        value: Rc::new(meta.clone()),
        kind: ContextKind::SuspenseBoundary(meta),
    };
    Element::from_parts(ElementType::Provider(binding), Props::new()).children(children)
}

/// Context values visible at one point of the tree walk.
///
/// Snapshots are copy-on-write: pushing a provider yields a new snapshot and
/// leaves the parent's untouched, so siblings outside the provider never see
/// its value.
#[derive(Clone, Default)]
pub struct ContextSnapshot {
    values: Rc<HashMap<ContextId, Rc<dyn Any>>>,
    boundary: Option<Rc<str>>,
}

impl ContextSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binding(&self, binding: &ProviderBinding) -> Self {
        let mut values = (*self.values).clone();
        values.insert(binding.context, Rc::clone(&binding.value));
        let boundary = match &binding.kind {
            ContextKind::SuspenseBoundary(meta) => Some(Rc::from(meta.id.as_str())),
            ContextKind::Normal => self.boundary.clone(),
        };
        Self {
            values: Rc::new(values),
            boundary,
        }
    }

    pub fn contains(&self, context: ContextId) -> bool {
        self.values.contains_key(&context)
    }

    /// Nearest provided value for `context`, or its default.
    pub fn read<T: Clone + 'static>(&self, context: &Context<T>) -> Result<T> {
        match self.values.get(&context.id) {
            Some(value) => value
                .downcast_ref::<T>()
                .cloned()
                .ok_or(FiberError::ContextMismatch {
                    context: context.id,
                }),
            None => Ok(context.default_value()),
        }
    }

    pub fn nearest_boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ContextSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.values.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("ContextSnapshot")
            .field("contexts", &ids)
            .field("boundary", &self.boundary)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding_of(element: &Element) -> ProviderBinding {
        match element.element_type() {
            ElementType::Provider(binding) => binding.clone(),
            other => panic!("expected provider, got {other:?}"),
        }
    }

    #[test]
    fn read_falls_back_to_default() {
        let ctx = Context::new("default".to_string());
        let snapshot = ContextSnapshot::new();
        assert_eq!(snapshot.read(&ctx).unwrap(), "default");
    }

    #[test]
    fn nested_providers_shadow_and_parent_is_untouched() {
        let ctx = Context::new(0u32);
        let outer = ContextSnapshot::new().with_binding(&binding_of(&ctx.provide(1, Vec::<Node>::new())));
        let inner = outer.with_binding(&binding_of(&ctx.provide(2, Vec::<Node>::new())));

        assert_eq!(inner.read(&ctx).unwrap(), 2);
        assert_eq!(outer.read(&ctx).unwrap(), 1);
    }

    #[test]
    fn suspense_binding_sets_nearest_boundary() {
        let element = suspense(SuspenseProps::new("loader"), Vec::<Node>::new());
        let binding = binding_of(&element);
        assert_eq!(binding.suspense_meta().map(|m| m.id.as_str()), Some("loader"));

        let snapshot = ContextSnapshot::new().with_binding(&binding);
        assert_eq!(snapshot.nearest_boundary(), Some("loader"));

        let ctx = Context::new(false);
        let nested = snapshot.with_binding(&binding_of(&ctx.provide(true, Vec::<Node>::new())));
        assert_eq!(nested.nearest_boundary(), Some("loader"));
    }

    #[test]
    fn distinct_contexts_get_distinct_ids() {
        let a = Context::new(1u8);
        let b = Context::new(1u8);
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), SUSPENSE_CONTEXT);
    }
}
