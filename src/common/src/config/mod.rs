pub mod cli;
mod tree;

pub use tree::ConfigTree;

use std::path::Path;

use crate::error::ChainError;

/// Typed view over one section of a [`ConfigTree`].
pub trait FromConfigTree: Sized {
    fn from_tree(tree: &ConfigTree) -> Result<Self, ChainError>;

    /// Reads `path` and builds the typed config from it.
    fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self, ChainError> {
        let tree = ConfigTree::from_file(path)?;
        Self::from_tree(&tree)
    }
}
