use std::collections::BTreeMap;

use extrpc_primitives::{CallPath, Error, Result, Shape};
use tracing::trace;

use crate::Handler;

/// One entry of a [`Registry`]
#[derive(Debug)]
pub enum Node<H> {
    /// A callable function
    Function(H),
    /// A named grouping of further entries
    Group(Registry<H>),
}

/// The background context's function tree.
///
/// Built once at setup and read-only afterwards; the [`Dispatcher`](crate::Dispatcher)
/// takes ownership of it.
#[derive(Debug)]
pub struct Registry<H> {
    entries: BTreeMap<String, Node<H>>,
}

impl<H> Default for Registry<H> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<H> Registry<H> {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a function, replacing any entry with the same name
    pub fn function(mut self, name: impl Into<String>, handler: H) -> Self {
        self.insert(name, Node::Function(handler));
        self
    }

    /// Adds a nested group, replacing any entry with the same name
    pub fn group(mut self, name: impl Into<String>, group: Registry<H>) -> Self {
        self.insert(name, Node::Group(group));
        self
    }

    /// Inserts an entry, returning the one it replaced
    pub fn insert(&mut self, name: impl Into<String>, node: Node<H>) -> Option<Node<H>> {
        self.entries.insert(name.into(), node)
    }

    /// Looks up a direct child
    pub fn get(&self, name: &str) -> Option<&Node<H>> {
        self.entries.get(name)
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node<H>)> {
        self.entries.iter()
    }

    /// Number of direct children
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the function at `path`
    pub fn resolve(&self, path: &CallPath) -> Result<&H> {
        let unknown = || Error::UnknownFunction {
            path: path.to_string(),
        };

        let (last, parents) = path.segments().split_last().ok_or_else(unknown)?;

        let mut group = self;
        for segment in parents {
            group = match group.entries.get(segment) {
                Some(Node::Group(inner)) => inner,
                Some(Node::Function(_)) | None => return Err(unknown()),
            };
        }

        match group.entries.get(last) {
            Some(Node::Function(handler)) => {
                trace!(%path, "Resolved function");
                Ok(handler)
            }
            Some(Node::Group(_)) => Err(Error::NotCallable {
                path: path.to_string(),
            }),
            None => Err(unknown()),
        }
    }

    /// The name skeleton sent to callers
    pub fn shape(&self) -> Shape {
        let mut shape = Shape::new();
        for (name, node) in &self.entries {
            match node {
                Node::Function(_) => shape.insert_function(name.as_str()),
                Node::Group(group) => shape.insert_group(name.as_str(), group.shape()),
            }
        }
        shape
    }

    /// Full paths of every function
    pub fn leaf_paths(&self) -> Vec<CallPath> {
        self.shape().leaf_paths()
    }
}

impl Registry<Box<dyn Handler>> {
    /// Adds a function of any handler type to a registry of boxed handlers
    pub fn handler(self, name: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.function(name, Box::new(handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry<&'static str> {
        Registry::new()
            .function("syncCall", "sync")
            .function("asyncCall", "async")
            .group(
                "nestedObject",
                Registry::new()
                    .function("nested", "nested")
                    .group("deeper", Registry::new().function("deepest", "deepest")),
            )
    }

    fn resolve(path: &str) -> Result<&'static str> {
        registry()
            .resolve(&CallPath::parse(path).unwrap())
            .copied()
    }

    #[test]
    fn test_resolve_functions() {
        assert_eq!(resolve("syncCall"), Ok("sync"));
        assert_eq!(resolve("nestedObject.nested"), Ok("nested"));
        assert_eq!(resolve("nestedObject[deeper]['deepest']"), Ok("deepest"));
    }

    #[test]
    fn test_resolve_unknown() {
        for path in ["missing", "nestedObject.missing", "syncCall.inner", "missing.nested"] {
            assert_eq!(
                resolve(path),
                Err(Error::UnknownFunction {
                    path: path.to_string()
                })
            );
        }
    }

    #[test]
    fn test_resolve_group_is_not_callable() {
        assert_eq!(
            resolve("nestedObject.deeper"),
            Err(Error::NotCallable {
                path: "nestedObject.deeper".to_string()
            })
        );
    }

    #[test]
    fn test_shape_mirrors_tree() {
        let registry = registry();
        let paths: Vec<String> = registry.leaf_paths().iter().map(ToString::to_string).collect();
        assert_eq!(
            paths,
            [
                "asyncCall",
                "nestedObject.deeper.deepest",
                "nestedObject.nested",
                "syncCall"
            ]
        );
        assert_eq!(registry.shape().len(), registry.len());
    }

    #[test]
    fn test_insert_replaces() {
        let mut registry = registry();
        let previous = registry.insert("syncCall", Node::Function("replaced"));
        assert!(matches!(previous, Some(Node::Function("sync"))));
        assert_eq!(
            registry.resolve(&CallPath::root("syncCall")).copied(),
            Ok("replaced")
        );
    }
}
