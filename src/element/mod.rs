//! Virtual element tree handed to the builder each render pass.
//!
//! Elements are rebuilt from scratch on every pass; only fibers and their hook
//! slots persist. Control fields live in the prop map like any other prop so
//! the order a caller sets them in never matters downstream.

mod builders;
mod controls;
mod core;

pub use self::builders::{button, fragment, image, panel, text};
pub use self::controls::{CONTROL_PROPS, Controls, Position};
pub use self::core::{
    Component, Element, ElementType, LABEL_PROP, Node, ON_PRESS_PROP, Props, RenderFn, TEXT_PROP,
    TEXTURE_PROP, Tag,
};
