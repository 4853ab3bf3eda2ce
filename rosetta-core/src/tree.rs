//! Nested translation trees, the wire and static-data shape before flattening.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{RosettaResult, TranslationValue, ValidationError};

/// Nested mapping of translation keys.
pub type TreeTranslations = BTreeMap<String, TreeValue>;

/// One node of a translation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeValue {
    /// A string or an explicit `null`.
    Leaf(TranslationValue),
    /// A nested subtree.
    Branch(TreeTranslations),
}

impl TreeValue {
    /// Leaf holding a translation.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Leaf(Some(value.into()))
    }

    /// Leaf explicitly holding no translation.
    pub fn null() -> Self {
        Self::Leaf(None)
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Self::Branch(_))
    }
}

impl From<&str> for TreeValue {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for TreeValue {
    fn from(value: String) -> Self {
        Self::Leaf(Some(value))
    }
}

impl From<TreeTranslations> for TreeValue {
    fn from(tree: TreeTranslations) -> Self {
        Self::Branch(tree)
    }
}

/// Parse a translation tree from JSON text.
pub fn parse_tree_str(json: &str) -> RosettaResult<TreeTranslations> {
    serde_json::from_str(json).map_err(|e| {
        ValidationError::InvalidTree {
            reason: e.to_string(),
        }
        .into()
    })
}

/// Parse a translation tree from a JSON value.
///
/// The root must be an object; leaves must be strings or `null`.
pub fn parse_tree_value(value: &serde_json::Value) -> RosettaResult<TreeTranslations> {
    TreeTranslations::deserialize(value).map_err(|e| {
        ValidationError::InvalidTree {
            reason: e.to_string(),
        }
        .into()
    })
}

/// Build a tree from `(path, value)` pairs where path segments are pre-split.
///
/// Later pairs overwrite earlier ones at the same path; a leaf on the way
/// down is replaced by a branch.
pub fn tree_from_paths<'a, I>(pairs: I) -> TreeTranslations
where
    I: IntoIterator<Item = (&'a [&'a str], TranslationValue)>,
{
    let mut root = TreeTranslations::new();
    for (path, value) in pairs {
        insert_path(&mut root, path, value);
    }
    root
}

fn insert_path(node: &mut TreeTranslations, path: &[&str], value: TranslationValue) {
    match path {
        [] => {}
        [last] => {
            node.insert((*last).to_string(), TreeValue::Leaf(value));
        }
        [head, rest @ ..] => {
            let child = node
                .entry((*head).to_string())
                .or_insert_with(|| TreeValue::Branch(TreeTranslations::new()));
            if !child.is_branch() {
                *child = TreeValue::Branch(TreeTranslations::new());
            }
            if let TreeValue::Branch(sub) = child {
                insert_path(sub, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RosettaError;

    #[test]
    fn test_parse_nested_tree() {
        let tree = parse_tree_str(r#"{"greet":{"formal":"Good day"},"bye":null}"#).unwrap();
        assert_eq!(tree.get("bye"), Some(&TreeValue::null()));
        match tree.get("greet") {
            Some(TreeValue::Branch(sub)) => {
                assert_eq!(sub.get("formal"), Some(&TreeValue::text("Good day")));
            }
            other => panic!("expected branch, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_number_leaf() {
        let err = parse_tree_str(r#"{"count": 3}"#).unwrap_err();
        assert!(matches!(err, RosettaError::Validation(ValidationError::InvalidTree { .. })));
    }

    #[test]
    fn test_parse_rejects_non_object_root() {
        let value = serde_json::json!(["a", "b"]);
        assert!(parse_tree_value(&value).is_err());
    }

    #[test]
    fn test_serialize_null_leaf() {
        let mut tree = TreeTranslations::new();
        tree.insert("k".to_string(), TreeValue::null());
        assert_eq!(serde_json::to_string(&tree).unwrap(), r#"{"k":null}"#);
    }

    #[test]
    fn test_tree_from_paths_replaces_leaf_with_branch() {
        let a: &[&str] = &["menu"];
        let b: &[&str] = &["menu", "open"];
        let tree = tree_from_paths([(a, Some("Menu".to_string())), (b, Some("Open".to_string()))]);
        match tree.get("menu") {
            Some(TreeValue::Branch(sub)) => {
                assert_eq!(sub.get("open"), Some(&TreeValue::text("Open")));
            }
            other => panic!("expected branch, got {:?}", other),
        }
    }
}
