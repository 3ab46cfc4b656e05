pub mod path;
pub mod resolver;
pub mod resource;
pub mod tree;

pub use path::FsPath;
pub use resolver::PathResolver;
pub use resource::{Properties, Resource, ResourceRef, ResourceType, same_resource};
pub use tree::{ResourceTreeNode, attach};
