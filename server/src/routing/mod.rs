pub mod dispatch;
pub mod path;

pub use dispatch::{Operation, PathKind, Verb};
pub use path::{PathResolver, PrefixMatch};
