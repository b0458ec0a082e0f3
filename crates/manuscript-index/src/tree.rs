//! Directory hierarchy built from the index's flat path list.
//!
//! Groups paths by their leading segment relative to a project root, one
//! level per recursion step, so depth never exceeds the deepest path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One entry of the project tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Directory { name: String, children: Vec<TreeNode> },
    File { name: String, path: PathBuf },
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Directory { name, .. } | TreeNode::File { name, .. } => name,
        }
    }
}

/// Build the tree for `paths` relative to `root`.
///
/// Paths outside `root` are skipped. Directories come before files; both
/// are sorted by name.
pub fn build_tree(root: &Path, paths: &[PathBuf]) -> Vec<TreeNode> {
    let entries: Vec<(Vec<String>, PathBuf)> = paths
        .iter()
        .filter_map(|path| {
            let relative = path.strip_prefix(root).ok()?;
            let segments: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            if segments.is_empty() {
                None
            } else {
                Some((segments, path.clone()))
            }
        })
        .collect();
    group(entries)
}

fn group(entries: Vec<(Vec<String>, PathBuf)>) -> Vec<TreeNode> {
    let mut directories: BTreeMap<String, Vec<(Vec<String>, PathBuf)>> = BTreeMap::new();
    let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();

    for (mut segments, path) in entries {
        if segments.len() == 1 {
            files.insert(segments.remove(0), path);
        } else {
            let head = segments.remove(0);
            directories.entry(head).or_default().push((segments, path));
        }
    }

    let mut nodes: Vec<TreeNode> = directories
        .into_iter()
        .map(|(name, children)| TreeNode::Directory {
            name,
            children: group(children),
        })
        .collect();
    nodes.extend(
        files
            .into_iter()
            .map(|(name, path)| TreeNode::File { name, path }),
    );
    nodes
}

/// Render the tree as an indented listing. `label` may append text after a
/// file name (an id, for instance).
pub fn render<F>(nodes: &[TreeNode], label: &F) -> String
where
    F: Fn(&Path) -> Option<String>,
{
    let mut out = String::new();
    render_level(nodes, label, 0, &mut out);
    out
}

fn render_level<F>(nodes: &[TreeNode], label: &F, depth: usize, out: &mut String)
where
    F: Fn(&Path) -> Option<String>,
{
    let indent = "  ".repeat(depth);
    for node in nodes {
        match node {
            TreeNode::Directory { name, children } => {
                out.push_str(&format!("{indent}{name}/\n"));
                render_level(children, label, depth + 1, out);
            }
            TreeNode::File { name, path } => match label(path) {
                Some(extra) => out.push_str(&format!("{indent}{name}  {extra}\n")),
                None => out.push_str(&format!("{indent}{name}\n")),
            },
        }
    }
}
