use crate::value::{Callback, Value};

use super::controls::Position;
use super::core::{Element, LABEL_PROP, Node, ON_PRESS_PROP, TEXT_PROP, TEXTURE_PROP, Tag};

pub fn panel() -> Element {
    Element::tag(Tag::Panel)
}

pub fn text(content: impl Into<Value>) -> Element {
    Element::tag(Tag::Text).prop(TEXT_PROP, content)
}

pub fn button(label: impl Into<Value>, on_press: Callback) -> Element {
    Element::tag(Tag::Button)
        .prop(LABEL_PROP, label)
        .prop(ON_PRESS_PROP, Value::Callback(on_press))
}

pub fn image(texture: impl Into<Value>) -> Element {
    Element::tag(Tag::Image).prop(TEXTURE_PROP, texture)
}

pub fn fragment<I, N>(children: I) -> Element
where
    I: IntoIterator<Item = N>,
    N: Into<Node>,
{
    Element::tag(Tag::Fragment).children(children)
}

impl Element {
    pub fn size(self, width: f64, height: f64) -> Self {
        self.prop("width", width).prop("height", height)
    }

    pub fn at(self, x: f64, y: f64) -> Self {
        self.prop("x", x).prop("y", y)
    }

    pub fn visible(self, visible: bool) -> Self {
        self.prop("visible", visible)
    }

    pub fn enabled(self, enabled: bool) -> Self {
        self.prop("enabled", enabled)
    }

    pub fn layer(self, layer: f64) -> Self {
        self.prop("layer", layer)
    }

    pub fn alpha(self, alpha: f64) -> Self {
        self.prop("alpha", alpha)
    }

    pub fn absolute(self) -> Self {
        self.prop("position", Position::Absolute.as_str())
    }

    pub fn relative(self) -> Self {
        self.prop("position", Position::Relative.as_str())
    }

    pub fn inherit_visible(self, inherit: bool) -> Self {
        self.prop("inherit_visible", inherit)
    }

    pub fn inherit_enabled(self, inherit: bool) -> Self {
        self.prop("inherit_enabled", inherit)
    }
}
