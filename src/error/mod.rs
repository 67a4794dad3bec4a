mod types;

pub use types::{FiberError, Result};
