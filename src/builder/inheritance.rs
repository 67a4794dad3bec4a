use crate::element::{Controls, Element, ElementType, Node, ON_PRESS_PROP, Position, Props, Tag};
use crate::error::Result;
use crate::value::Callback;

/// Inheritance state at the root of the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootState {
    pub visible: bool,
    pub enabled: bool,
    pub x: f64,
    pub y: f64,
}

impl Default for RootState {
    fn default() -> Self {
        Self {
            visible: true,
            enabled: true,
            x: 0.0,
            y: 0.0,
        }
    }
}

impl RootState {
    /// Root forced disabled, used while a suspense boundary is pending.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Fully resolved primitive element, ready for serialization.
#[derive(Clone)]
pub struct BuiltElement {
    pub tag: Tag,
    /// Control props after inheritance: `visible`, `enabled`, `x` and `y`
    /// are the effective values.
    pub controls: Controls,
    pub props: Props,
    pub on_press: Option<Callback>,
    pub children: Vec<BuiltElement>,
}

impl BuiltElement {
    pub fn is_transparent(&self) -> bool {
        self.tag.is_transparent()
    }

    /// Pre-order iterator over this element and every descendant.
    pub fn walk(&self) -> Vec<&BuiltElement> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Pre-order walk skipping transparent nodes.
    pub fn records(&self) -> Vec<&BuiltElement> {
        self.walk()
            .into_iter()
            .filter(|node| !node.is_transparent())
            .collect()
    }
}

impl std::fmt::Debug for BuiltElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltElement")
            .field("tag", &self.tag)
            .field("controls", &self.controls)
            .field("has_on_press", &self.on_press.is_some())
            .field("children", &self.children)
            .finish()
    }
}

/// Resolve effective visibility, enabled state and position top-down.
pub fn inherit(element: Element, parent: RootState) -> Result<BuiltElement> {
    let tag = match element.ty {
        ElementType::Tag(tag) => tag,
        ElementType::Component(_) | ElementType::Provider(_) => Tag::Fragment,
    };
    let mut props = element.props;
    let children = props.take_children();

    let (controls, state) = if tag.is_transparent() {
        (Controls::default(), parent)
    } else {
        let mut controls = Controls::from_props(&props)?;
        controls.visible = controls.visible && (!controls.inherit_visible || parent.visible);
        controls.enabled = controls.enabled && (!controls.inherit_enabled || parent.enabled);
        if controls.position == Position::Relative {
            controls.x += parent.x;
            controls.y += parent.y;
        }
        controls.write_into(&mut props);
        let state = RootState {
            visible: controls.visible,
            enabled: controls.enabled,
            x: controls.x,
            y: controls.y,
        };
        (controls, state)
    };

    let on_press = if tag.is_interactive() {
        props
            .get(ON_PRESS_PROP)
            .and_then(|value| value.as_callback())
            .cloned()
    } else {
        None
    };

    let children = children
        .into_iter()
        .filter_map(|child| match child {
            Node::Element(element) => Some(inherit(element, state)),
            _ => None,
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(BuiltElement {
        tag,
        controls,
        props,
        on_press,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{button, fragment, panel, text};
    use crate::value::callback;

    #[test]
    fn relative_positions_accumulate() {
        let tree = panel()
            .at(100.0, 100.0)
            .absolute()
            .child(panel().at(20.0, 20.0).child(text("hi").at(10.0, 10.0)));
        let built = inherit(tree, RootState::default()).unwrap();
        let parent = &built.children[0];
        let child = &parent.children[0];
        assert_eq!((built.controls.x, built.controls.y), (100.0, 100.0));
        assert_eq!((parent.controls.x, parent.controls.y), (120.0, 120.0));
        assert_eq!((child.controls.x, child.controls.y), (130.0, 130.0));
        assert_eq!(child.props.number("x").unwrap(), Some(130.0));
    }

    #[test]
    fn hidden_or_disabled_ancestors_win() {
        let tree = panel()
            .visible(false)
            .child(fragment(vec![panel().enabled(false).child(text("deep").visible(true))]));
        let built = inherit(tree, RootState::default()).unwrap();
        let deep = &built.children[0].children[0].children[0];
        assert!(!deep.controls.visible);
        assert!(!deep.controls.enabled);
    }

    #[test]
    fn opting_out_of_inheritance_ignores_ancestors() {
        let tree = panel()
            .visible(false)
            .child(text("shown").inherit_visible(false));
        let built = inherit(tree, RootState::default()).unwrap();
        assert!(built.children[0].controls.visible);
    }

    #[test]
    fn fragments_pass_state_through() {
        let tree = panel().at(5.0, 5.0).child(fragment(vec![text("a").at(1.0, 1.0)]));
        let built = inherit(tree, RootState::default()).unwrap();
        let fragment = &built.children[0];
        assert_eq!(fragment.controls, Controls::default());
        assert_eq!(fragment.children[0].controls.x, 6.0);
    }

    #[test]
    fn disabled_root_disables_buttons() {
        let tree = panel().child(button("go", callback(|| Ok(()))));
        let built = inherit(tree, RootState::disabled()).unwrap();
        let button = &built.children[0];
        assert!(!button.controls.enabled);
        assert!(button.on_press.is_some());
    }
}
