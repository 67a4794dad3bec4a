use crate::error::{FiberError, Result};

use super::core::Props;

/// Control fields every primitive element carries after normalization.
pub const CONTROL_PROPS: [&str; 11] = [
    "width",
    "height",
    "x",
    "y",
    "visible",
    "enabled",
    "layer",
    "alpha",
    "inherit_visible",
    "inherit_enabled",
    "position",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Relative,
    Absolute,
}

impl Position {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relative => "relative",
            Self::Absolute => "absolute",
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "relative" => Ok(Self::Relative),
            "absolute" => Ok(Self::Absolute),
            _ => Err(FiberError::InvalidProp {
                prop: "position".to_string(),
                expected: "`relative` or `absolute`",
            }),
        }
    }
}

/// Normalized control props of one element, before inheritance.
///
/// `inherit_visible` / `inherit_enabled` decide whether the element follows its
/// ancestors' visibility and enabled state; both default to true.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Controls {
    pub width: f64,
    pub height: f64,
    pub x: f64,
    pub y: f64,
    pub visible: bool,
    pub enabled: bool,
    pub layer: f64,
    pub alpha: f64,
    pub inherit_visible: bool,
    pub inherit_enabled: bool,
    pub position: Position,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            x: 0.0,
            y: 0.0,
            visible: true,
            enabled: true,
            layer: 0.0,
            alpha: 1.0,
            inherit_visible: true,
            inherit_enabled: true,
            position: Position::Relative,
        }
    }
}

impl Controls {
    pub fn from_props(props: &Props) -> Result<Self> {
        let defaults = Self::default();
        let position = match props.string("position")? {
            Some(raw) => Position::parse(raw)?,
            None => defaults.position,
        };
        Ok(Self {
            width: props.number("width")?.unwrap_or(defaults.width),
            height: props.number("height")?.unwrap_or(defaults.height),
            x: props.number("x")?.unwrap_or(defaults.x),
            y: props.number("y")?.unwrap_or(defaults.y),
            visible: props.boolean("visible")?.unwrap_or(defaults.visible),
            enabled: props.boolean("enabled")?.unwrap_or(defaults.enabled),
            layer: props.number("layer")?.unwrap_or(defaults.layer),
            alpha: props.number("alpha")?.unwrap_or(defaults.alpha),
            inherit_visible: props
                .boolean("inherit_visible")?
                .unwrap_or(defaults.inherit_visible),
            inherit_enabled: props
                .boolean("inherit_enabled")?
                .unwrap_or(defaults.inherit_enabled),
            position,
        })
    }

    /// Write every control field back into `props`, filling defaults.
    pub fn write_into(&self, props: &mut Props) {
        props.set("width", self.width);
        props.set("height", self.height);
        props.set("x", self.x);
        props.set("y", self.y);
        props.set("visible", self.visible);
        props.set("enabled", self.enabled);
        props.set("layer", self.layer);
        props.set("alpha", self.alpha);
        props.set("inherit_visible", self.inherit_visible);
        props.set("inherit_enabled", self.inherit_enabled);
        props.set("position", self.position.as_str());
    }
}
