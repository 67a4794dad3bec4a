use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::context::ProviderBinding;
use crate::error::{FiberError, Result};
use crate::hooks::HookCx;
use crate::value::Value;

pub const TEXT_PROP: &str = "text";
pub const LABEL_PROP: &str = "label";
pub const TEXTURE_PROP: &str = "texture";
pub const ON_PRESS_PROP: &str = "on_press";

/// Primitive element tags understood by the wire serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Panel,
    Text,
    Button,
    Image,
    Fragment,
}

impl Tag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Panel => "panel",
            Self::Text => "text",
            Self::Button => "button",
            Self::Image => "image",
            Self::Fragment => "fragment",
        }
    }

    /// Transparent tags pass inheritance through and emit no bytes.
    pub fn is_transparent(self) -> bool {
        matches!(self, Self::Fragment)
    }

    pub fn is_interactive(self) -> bool {
        matches!(self, Self::Button)
    }

    /// Prop carried in the record's content field.
    pub fn content_prop(self) -> Option<&'static str> {
        match self {
            Self::Text => Some(TEXT_PROP),
            Self::Button => Some(LABEL_PROP),
            Self::Image => Some(TEXTURE_PROP),
            Self::Panel | Self::Fragment => None,
        }
    }
}

pub type RenderFn = dyn Fn(&mut HookCx<'_>, &Props) -> Result<Node>;

/// A named function component.
///
/// The name takes part in fiber identity, so two components sharing a name
/// under the same parent are told apart by key or position only.
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    render: Rc<RenderFn>,
}

impl Component {
    pub fn new<F>(name: impl Into<Rc<str>>, render: F) -> Self
    where
        F: Fn(&mut HookCx<'_>, &Props) -> Result<Node> + 'static,
    {
        Self {
            name: name.into(),
            render: Rc::new(render),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element(&self, props: Props) -> Element {
        Element::from_parts(ElementType::Component(self.clone()), props)
    }

    /// Element with no props.
    pub fn call(&self) -> Element {
        self.element(Props::new())
    }

    pub(crate) fn render(&self, cx: &mut HookCx<'_>, props: &Props) -> Result<Node> {
        (self.render)(cx, props)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component").field("name", &self.name).finish()
    }
}

#[derive(Clone, Debug)]
pub enum ElementType {
    Tag(Tag),
    Component(Component),
    Provider(ProviderBinding),
}

/// Prop map plus children. Keys are ordered so iteration is deterministic.
#[derive(Clone, Debug, Default)]
pub struct Props {
    values: BTreeMap<String, Value>,
    children: Vec<Node>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn push_child(&mut self, child: impl Into<Node>) {
        self.children.push(child.into());
    }

    pub fn set_children(&mut self, children: Vec<Node>) {
        self.children = children;
    }

    pub fn take_children(&mut self) -> Vec<Node> {
        std::mem::take(&mut self.children)
    }

    /// Numeric prop, `None` when absent or nullish.
    pub fn number(&self, name: &str) -> Result<Option<f64>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(value) if value.is_nullish() => Ok(None),
            Some(Value::Number(n)) => Ok(Some(*n)),
            Some(_) => Err(invalid(name, "a number")),
        }
    }

    pub fn boolean(&self, name: &str) -> Result<Option<bool>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(value) if value.is_nullish() => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(invalid(name, "a boolean")),
        }
    }

    pub fn string(&self, name: &str) -> Result<Option<&str>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(value) if value.is_nullish() => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s)),
            Some(_) => Err(invalid(name, "a string")),
        }
    }
}

fn invalid(prop: &str, expected: &'static str) -> FiberError {
    FiberError::InvalidProp {
        prop: prop.to_string(),
        expected,
    }
}

#[derive(Clone, Debug)]
pub struct Element {
    pub(crate) ty: ElementType,
    pub(crate) key: Option<String>,
    pub(crate) props: Props,
}

impl Element {
    pub fn from_parts(ty: ElementType, props: Props) -> Self {
        Self {
            ty,
            key: None,
            props,
        }
    }

    pub fn tag(tag: Tag) -> Self {
        Self::from_parts(ElementType::Tag(tag), Props::new())
    }

    pub fn element_type(&self) -> &ElementType {
        &self.ty
    }

    pub fn key_value(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.set(name, value);
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.props.push_child(child);
        self
    }

    pub fn children<I, N>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        for child in children {
            self.props.push_child(child);
        }
        self
    }
}

/// A child slot before normalization.
///
/// Lists flatten, and `Empty`, `Text` and `Number` are dropped by the
/// normalize pass. Text content belongs in a `text()` element's prop instead.
#[derive(Clone, Debug, Default)]
pub enum Node {
    Element(Element),
    List(Vec<Node>),
    Text(Rc<str>),
    Number(f64),
    #[default]
    Empty,
}

impl From<Element> for Node {
    fn from(value: Element) -> Self {
        Self::Element(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(value: Vec<Node>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<Element>> for Node {
    fn from(value: Vec<Element>) -> Self {
        Self::List(value.into_iter().map(Node::Element).collect())
    }
}

impl From<Option<Element>> for Node {
    fn from(value: Option<Element>) -> Self {
        value.map(Node::Element).unwrap_or(Node::Empty)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Self::Text(Rc::from(value))
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Self::Text(Rc::from(value))
    }
}

impl From<f64> for Node {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_prop_access_rejects_wrong_kind() {
        let props = Props::new().with("x", "left");
        let err = props.number("x").unwrap_err();
        assert!(matches!(err, FiberError::InvalidProp { ref prop, .. } if prop == "x"));
    }

    #[test]
    fn nullish_props_read_as_absent() {
        let props = Props::new().with("visible", Value::Null);
        assert_eq!(props.boolean("visible").unwrap(), None);
        assert_eq!(props.boolean("enabled").unwrap(), None);
    }

    #[test]
    fn option_element_becomes_empty_node() {
        let node: Node = None::<Element>.into();
        assert!(matches!(node, Node::Empty));
    }
}
