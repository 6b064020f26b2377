//! Dependency ordering for batches of paths
//!
//! Paths are inserted into a trie keyed by segment and walked breadth first,
//! so every item is emitted in a level strictly after every item that names
//! one of its ancestors.
//!
//! ```text
//!  a.txt  /a/b.txt  /a/c/d.txt  /a/e.txt  f.txt
//!
//!  (root)
//!   ├── a.txt      level 1: a.txt, f.txt
//!   ├── f.txt
//!   └── a
//!       ├── b.txt  level 2: /a/b.txt, /a/e.txt
//!       ├── e.txt
//!       └── c
//!           └── d.txt   level 3: /a/c/d.txt
//! ```

use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Normalize a path: trim whitespace, force a leading `/`, drop empty segments
pub fn sanitize_path(path: &str) -> String {
    let segments: Vec<&str> = segments(path).collect();
    format!("/{}", segments.join("/"))
}

/// Non-empty segments of `path`
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.trim().split('/').filter(|s| !s.is_empty())
}

struct TrieNode<T> {
    children: BTreeMap<String, TrieNode<T>>,
    items: Vec<T>,
}

impl<T> TrieNode<T> {
    fn new() -> Self {
        Self {
            children: BTreeMap::new(),
            items: Vec::new(),
        }
    }
}

/// Orders items by the depth of their path
pub struct PathOrderer<T> {
    root: TrieNode<T>,
    rootless: Vec<T>,
}

impl<T> PathOrderer<T> {
    /// Build the trie. `extractor` yields each item's path.
    pub fn new<F>(items: impl IntoIterator<Item = T>, extractor: F) -> Self
    where
        F: Fn(&T) -> &str,
    {
        let mut root = TrieNode::new();
        let mut rootless = Vec::new();

        for item in items {
            let parts: Vec<String> = segments(extractor(&item)).map(str::to_string).collect();
            if parts.is_empty() {
                // the root itself never terminates an item
                rootless.push(item);
                continue;
            }
            let mut node = &mut root;
            for part in parts {
                node = node.children.entry(part).or_insert_with(TrieNode::new);
            }
            node.items.push(item);
        }

        if !rootless.is_empty() {
            debug!(count = rootless.len(), "items without a path segment left unordered");
        }
        Self { root, rootless }
    }

    /// Items whose path had no segments at all, such as `""` or `"/"`
    pub fn take_rootless(&mut self) -> Vec<T> {
        std::mem::take(&mut self.rootless)
    }

    /// Invoke `callback` once per depth with the items ending at that depth,
    /// shallowest first. Depths with no items are skipped.
    pub fn traverse_levels<F>(self, mut callback: F)
    where
        F: FnMut(usize, Vec<T>),
    {
        let mut queue = VecDeque::new();
        queue.push_back((1usize, self.root.children));

        let mut current_depth = 1;
        let mut level = Vec::new();

        while let Some((depth, children)) = queue.pop_front() {
            if depth != current_depth {
                if !level.is_empty() {
                    callback(current_depth, std::mem::take(&mut level));
                }
                current_depth = depth;
            }
            for (_, child) in children {
                level.extend(child.items);
                if !child.children.is_empty() {
                    queue.push_back((depth + 1, child.children));
                }
            }
        }
        if !level.is_empty() {
            callback(current_depth, level);
        }
    }

    /// Collect the levels into a vector
    pub fn into_levels(self) -> Vec<Vec<T>> {
        let mut levels = Vec::new();
        self.traverse_levels(|_, items| levels.push(items));
        levels
    }
}
