//! Translation flattener.
//!
//! Converts a nested [`TreeTranslations`] into [`FlatTranslations`] keyed by
//! the dotted path from the root, and back.

use crate::{FlatTranslations, TreeTranslations, TreeValue};

/// Separator joining path segments in flat keys.
pub const KEY_SEPARATOR: char = '.';

/// Flatten a tree into joined-path keys.
///
/// Every leaf (string or explicit null) appears exactly once under its
/// joined path. Empty branches contribute nothing.
pub fn flatten(tree: &TreeTranslations) -> FlatTranslations {
    let mut out = FlatTranslations::new();
    let mut path = String::new();
    flatten_into(tree, &mut path, &mut out);
    out
}

fn flatten_into(tree: &TreeTranslations, path: &mut String, out: &mut FlatTranslations) {
    for (segment, value) in tree {
        let restore = path.len();
        if !path.is_empty() {
            path.push(KEY_SEPARATOR);
        }
        path.push_str(segment);
        match value {
            TreeValue::Leaf(leaf) => {
                out.insert(path.clone(), leaf.clone());
            }
            TreeValue::Branch(sub) => flatten_into(sub, path, out),
        }
        path.truncate(restore);
    }
}

/// Rebuild a tree from flat keys.
///
/// Keys are applied in sorted order, so when one key is a path prefix of
/// another (`menu` and `menu.open`) the deeper key wins.
pub fn unflatten(flat: &FlatTranslations) -> TreeTranslations {
    let mut keys: Vec<&String> = flat.keys().collect();
    keys.sort();

    let split: Vec<(Vec<&str>, &Option<String>)> = keys
        .into_iter()
        .map(|key| (key.split(KEY_SEPARATOR).collect(), &flat[key]))
        .collect();

    crate::tree::tree_from_paths(
        split
            .iter()
            .map(|(segments, value)| (segments.as_slice(), (*value).clone())),
    )
}
