//! Object paths for locating nested values in error messages.

use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
enum Segment {
    Field(String),
    Index(usize),
}

#[derive(Debug)]
struct Node {
    parent: ObjectPath,
    segment: Segment,
}

/// Immutable, append-only route to a nested value.
///
/// Descending never mutates: `field` and `index` return a new path sharing
/// the parent chain, so paths are cheap to clone and pass down a recursion.
#[derive(Debug, Clone, Default)]
pub struct ObjectPath {
    root: Option<Arc<str>>,
    node: Option<Arc<Node>>,
}

impl ObjectPath {
    /// The anonymous root path. Renders as an empty string.
    pub fn root() -> Self {
        Self::default()
    }

    /// A root path with a name, rendered as that name.
    pub fn named(name: &str) -> Self {
        Self {
            root: Some(Arc::from(name)),
            node: None,
        }
    }

    pub fn field(&self, name: &str) -> Self {
        self.descend(Segment::Field(name.to_string()))
    }

    pub fn index(&self, index: usize) -> Self {
        self.descend(Segment::Index(index))
    }

    fn descend(&self, segment: Segment) -> Self {
        Self {
            root: self.root.clone(),
            node: Some(Arc::new(Node {
                parent: self.clone(),
                segment,
            })),
        }
    }

    /// True for an anonymous root with no descent.
    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.node.is_none()
    }

    fn segments(&self) -> Vec<&Segment> {
        let mut out = Vec::new();
        let mut cursor = self.node.as_ref();
        while let Some(node) = cursor {
            out.push(&node.segment);
            cursor = node.parent.node.as_ref();
        }
        out.reverse();
        out
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        if let Some(root) = &self.root {
            f.write_str(root)?;
            wrote = true;
        }
        for segment in self.segments() {
            match segment {
                Segment::Field(name) => {
                    if wrote {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                Segment::Index(i) => write!(f, "[{}]", i)?,
            }
            wrote = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_empty() {
        assert!(ObjectPath::root().is_empty());
        assert_eq!(ObjectPath::root().to_string(), "");
    }

    #[test]
    fn test_named_root() {
        let path = ObjectPath::named("expct");
        assert!(!path.is_empty());
        assert_eq!(path.to_string(), "expct");
        assert_eq!(path.field("a").to_string(), "expct.a");
    }

    #[test]
    fn test_fields_and_indices() {
        let path = ObjectPath::root().field("f1").field("items").index(2).field("x");
        assert_eq!(path.to_string(), "f1.items[2].x");
        assert_eq!(ObjectPath::root().index(0).to_string(), "[0]");
    }

    #[test]
    fn test_descent_does_not_mutate_parent() {
        let parent = ObjectPath::root().field("a");
        let left = parent.field("b");
        let right = parent.field("c");
        assert_eq!(parent.to_string(), "a");
        assert_eq!(left.to_string(), "a.b");
        assert_eq!(right.to_string(), "a.c");
    }
}
