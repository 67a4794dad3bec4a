//! Tree builder: expand components and providers, normalize children, then
//! resolve parent-to-child inheritance.

mod core;
mod inheritance;
mod normalize;

pub use self::core::{BuildOptions, BuildOutput, TreeBuilder, build};
pub use self::inheritance::{BuiltElement, RootState, inherit};
pub use self::normalize::normalize;
