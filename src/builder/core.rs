use std::collections::HashMap;

use crate::context::{ContextSnapshot, ProviderBinding};
use crate::element::{Component, Element, ElementType, Node, Tag};
use crate::error::Result;
use crate::hooks::DirtyFlag;
use crate::registry::{BoundaryAnchor, FiberId, FiberRegistry, Player};
use crate::suspense::{BoundaryRegistry, DiscoveredBoundary};

use super::inheritance::{BuiltElement, RootState, inherit};
use super::normalize::normalize;

const BOUNDARY_NAME: &str = "Suspense";

/// Inputs of one build pass.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub player: Player,
    pub dirty: DirtyFlag,
    pub now_tick: u64,
    pub default_timeout_ticks: u64,
}

impl BuildOptions {
    pub fn new(player: Player) -> Self {
        Self {
            player,
            dirty: DirtyFlag::new(),
            now_tick: 0,
            default_timeout_ticks: 100,
        }
    }

    pub fn with_dirty(mut self, dirty: DirtyFlag) -> Self {
        self.dirty = dirty;
        self
    }

    pub fn at_tick(mut self, tick: u64) -> Self {
        self.now_tick = tick;
        self
    }

    pub fn with_default_timeout(mut self, ticks: u64) -> Self {
        self.default_timeout_ticks = ticks;
        self
    }
}

#[derive(Debug)]
pub struct BuildOutput {
    pub root: BuiltElement,
    /// Component fibers activated this pass, in activation order.
    pub activated: Vec<FiberId>,
    pub effects_run: usize,
    pub boundaries: Vec<DiscoveredBoundary>,
    /// True when a pending boundary forced the root disabled.
    pub root_disabled: bool,
}

/// Walk state of the expand phase.
#[derive(Clone)]
struct Scope {
    path: String,
    fiber: Option<FiberId>,
    snapshot: ContextSnapshot,
}

/// Per-pass expansion state. Counters start empty for every pass, so
/// unkeyed siblings get the same ids each time they render in the same
/// order.
pub struct TreeBuilder<'r> {
    registry: &'r mut FiberRegistry,
    player: Player,
    dirty: DirtyFlag,
    counters: HashMap<String, usize>,
    activated: Vec<FiberId>,
    effects_run: usize,
    boundaries: Vec<DiscoveredBoundary>,
}

impl<'r> TreeBuilder<'r> {
    pub fn new(registry: &'r mut FiberRegistry, player: Player, dirty: DirtyFlag) -> Self {
        Self {
            registry,
            player,
            dirty,
            counters: HashMap::new(),
            activated: Vec::new(),
            effects_run: 0,
            boundaries: Vec::new(),
        }
    }

    /// Expand components and providers, leaving only primitive tags.
    pub fn expand(&mut self, root: Node) -> Result<Node> {
        let scope = Scope {
            path: String::new(),
            fiber: None,
            snapshot: ContextSnapshot::new(),
        };
        self.expand_node(root, &scope)
    }

    pub fn activated(&self) -> &[FiberId] {
        &self.activated
    }

    fn expand_node(&mut self, node: Node, scope: &Scope) -> Result<Node> {
        match node {
            Node::Element(element) => self.expand_element(element, scope),
            Node::List(items) => items
                .into_iter()
                .map(|item| self.expand_node(item, scope))
                .collect::<Result<Vec<_>>>()
                .map(Node::List),
            other => Ok(other),
        }
    }

    fn expand_element(&mut self, element: Element, scope: &Scope) -> Result<Node> {
        let Element { ty, key, mut props } = element;
        match ty {
            ElementType::Component(component) => self.expand_component(component, key, props, scope),
            ElementType::Provider(binding) => {
                let children = props.take_children();
                self.expand_provider(&binding, children, scope)
            }
            ElementType::Tag(tag) => {
                let children = props
                    .take_children()
                    .into_iter()
                    .map(|child| self.expand_node(child, scope))
                    .collect::<Result<Vec<_>>>()?;
                props.set_children(children);
                let mut out = Element::from_parts(ElementType::Tag(tag), props);
                out.key = key;
                Ok(Node::Element(out))
            }
        }
    }

    fn expand_component(
        &mut self,
        component: Component,
        key: Option<String>,
        props: crate::element::Props,
        scope: &Scope,
    ) -> Result<Node> {
        let path = self.child_path(&scope.path, component.name(), key.as_deref());
        let id = self.enter_fiber(&path, component.name(), scope);

        let activation = self.registry.activate(
            &id,
            scope.snapshot.clone(),
            &self.dirty,
            |cx| component.render(cx, &props),
        )?;
        self.activated.push(id.clone());
        self.effects_run += activation.effects_run;

        let inner = Scope {
            path,
            fiber: Some(id),
            snapshot: scope.snapshot.clone(),
        };
        let rendered = self.expand_node(activation.output, &inner)?;
        Ok(wrap(rendered))
    }

    fn expand_provider(
        &mut self,
        binding: &ProviderBinding,
        children: Vec<Node>,
        scope: &Scope,
    ) -> Result<Node> {
        let snapshot = scope.snapshot.with_binding(binding);
        let inner = match binding.suspense_meta() {
            Some(meta) => {
                let path = self.child_path(&scope.path, BOUNDARY_NAME, Some(&meta.id));
                let id = self.enter_fiber(&path, BOUNDARY_NAME, scope);
                if let Some(fiber) = self.registry.get_fiber_mut(&id) {
                    fiber.context_snapshot = snapshot.clone();
                    if fiber.suspense.is_none() {
                        fiber.suspense = Some(BoundaryAnchor {
                            meta: meta.clone(),
                            resolved: false,
                        });
                    }
                }
                self.boundaries.push(DiscoveredBoundary {
                    meta: meta.clone(),
                    anchor: id.clone(),
                });
                Scope {
                    path,
                    fiber: Some(id),
                    snapshot,
                }
            }
            None => Scope {
                path: scope.path.clone(),
                fiber: scope.fiber.clone(),
                snapshot,
            },
        };
        let expanded = children
            .into_iter()
            .map(|child| self.expand_node(child, &inner))
            .collect::<Result<Vec<_>>>()?;
        Ok(wrap(Node::List(expanded)))
    }

    /// Get or create the fiber at `path` and link it under the scope's fiber.
    fn enter_fiber(&mut self, path: &str, name: &str, scope: &Scope) -> FiberId {
        let id = self.registry.get_or_create(&self.player, path, name);
        if let Some(parent) = &scope.fiber {
            self.registry.link_child(parent, &id);
        }
        self.registry.reset_children(&id);
        if let Some(fiber) = self.registry.get_fiber_mut(&id) {
            fiber.nearest_boundary = scope.snapshot.nearest_boundary().map(Into::into);
        }
        id
    }

    fn child_path(&mut self, parent: &str, name: &str, key: Option<&str>) -> String {
        let segment = match key {
            Some(key) => format!("{name}[{key}]"),
            None => {
                let counter = self
                    .counters
                    .entry(format!("{parent}/{name}"))
                    .or_insert(0);
                let segment = format!("{name}#{counter}");
                *counter += 1;
                segment
            }
        };
        if parent.is_empty() {
            segment
        } else {
            format!("{parent}/{segment}")
        }
    }

    /// Normalize and resolve inheritance for an expanded tree.
    pub fn finish(self, expanded: Node, root_state: RootState) -> Result<BuildOutput> {
        let mut top = normalize(expanded);
        let root = if top.len() == 1 {
            top.remove(0)
        } else {
            let mut fragment = Element::tag(Tag::Fragment);
            fragment
                .props
                .set_children(top.into_iter().map(Node::Element).collect());
            fragment
        };
        Ok(BuildOutput {
            root: inherit(root, root_state)?,
            activated: self.activated,
            effects_run: self.effects_run,
            boundaries: self.boundaries,
            root_disabled: !root_state.enabled,
        })
    }
}

fn wrap(node: Node) -> Node {
    let mut fragment = Element::tag(Tag::Fragment);
    fragment.props.set_children(vec![node]);
    Node::Element(fragment)
}

/// Run expand, boundary discovery, normalize and inheritance for one pass.
///
/// The root is forced disabled while any boundary of the session is pending.
pub fn build(
    registry: &mut FiberRegistry,
    boundaries: &mut BoundaryRegistry,
    options: &BuildOptions,
    root: Node,
) -> Result<BuildOutput> {
    let mut builder = TreeBuilder::new(registry, options.player.clone(), options.dirty.clone());
    let expanded = builder.expand(root)?;
    boundaries.discover(
        &builder.boundaries,
        options.now_tick,
        options.default_timeout_ticks,
    );
    let root_state = if boundaries.any_pending() {
        RootState::disabled()
    } else {
        RootState::default()
    };
    builder.finish(expanded, root_state)
}
