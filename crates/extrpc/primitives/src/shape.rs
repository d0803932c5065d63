use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::Value;

use crate::{CallPath, Error, Result};

/// The call-path skeleton of a function tree: names only, no function bodies.
///
/// On the wire a shape is a JSON object whose leaves are `null` and whose
/// groups are nested objects:
///
/// ```json
/// { "syncCall": null, "nestedObject": { "nested": null } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shape(BTreeMap<String, ShapeNode>);

/// One entry of a [`Shape`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeNode {
    /// A callable leaf
    Function,
    /// A named grouping of further entries
    Group(Shape),
}

impl Shape {
    /// An empty shape
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a callable leaf
    pub fn insert_function(&mut self, name: impl Into<String>) {
        self.0.insert(name.into(), ShapeNode::Function);
    }

    /// Adds a nested group
    pub fn insert_group(&mut self, name: impl Into<String>, group: Shape) {
        self.0.insert(name.into(), ShapeNode::Group(group));
    }

    /// Looks up a direct child
    pub fn get(&self, name: &str) -> Option<&ShapeNode> {
        self.0.get(name)
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ShapeNode)> {
        self.0.iter()
    }

    /// Number of direct children
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Full paths of every callable leaf, in key order
    pub fn leaf_paths(&self) -> Vec<CallPath> {
        let mut paths = Vec::new();
        self.collect_paths(None, &mut paths);
        paths
    }

    fn collect_paths(&self, prefix: Option<&CallPath>, out: &mut Vec<CallPath>) {
        for (name, node) in &self.0 {
            let path = match prefix {
                Some(prefix) => prefix.child(name.as_str()),
                None => CallPath::root(name.as_str()),
            };
            match node {
                ShapeNode::Function => out.push(path),
                ShapeNode::Group(group) => group.collect_paths(Some(&path), out),
            }
        }
    }

    /// The JSON form sent over the wire
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(name, node)| {
                    let value = match node {
                        ShapeNode::Function => Value::Null,
                        ShapeNode::Group(group) => group.to_value(),
                    };
                    (name.clone(), value)
                })
                .collect(),
        )
    }
}

impl TryFrom<Value> for Shape {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let entries = match value {
            Value::Object(entries) => entries,
            other => {
                return Err(Error::MalformedResponse(format!(
                    "function tree must be an object, got {other}"
                )));
            }
        };

        entries
            .into_iter()
            .map(|(name, value)| {
                let node = match value {
                    Value::Null => ShapeNode::Function,
                    Value::Object(_) => ShapeNode::Group(Shape::try_from(value)?),
                    other => {
                        return Err(Error::MalformedResponse(format!(
                            "unexpected value {other} for `{name}` in function tree"
                        )));
                    }
                };
                Ok((name, node))
            })
            .collect::<Result<BTreeMap<_, _>>>()
            .map(Self)
    }
}

impl Serialize for Shape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter())
    }
}

impl Serialize for ShapeNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Function => serializer.serialize_unit(),
            Self::Group(group) => group.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Shape {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Self::try_from(Value::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}
