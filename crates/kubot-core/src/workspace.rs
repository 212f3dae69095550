//! Workspace indexing.
//!
//! A workspace is a local directory of suite scripts. It is walked once and
//! folded into a trie keyed by path segment. Only files directly under the
//! root are schedulable; sub-directories are recorded (so the operator can be
//! told about them) but never scheduled.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{CoreError, CoreResult};

/// One directory in the workspace tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirNode {
    /// File names directly inside this directory, in walk order.
    pub files: Vec<String>,
    /// Sub-directories keyed by their name.
    pub children: BTreeMap<String, DirNode>,
}

impl DirNode {
    /// Look up a direct child directory.
    pub fn child(&self, name: &str) -> Option<&DirNode> {
        self.children.get(name)
    }

    /// Descend along `segments`, creating missing nodes.
    fn descend<'a, I>(&mut self, segments: I) -> &mut DirNode
    where
        I: IntoIterator<Item = &'a str>,
    {
        segments
            .into_iter()
            .fold(self, |node, segment| node.children.entry(segment.to_string()).or_default())
    }
}

/// The scanned workspace: the root path plus its directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceTree {
    path: PathBuf,
    root: DirNode,
}

impl WorkspaceTree {
    /// Walk `root_path` once and build the tree.
    ///
    /// Fails if the root cannot be read. Sub-directories are reported with a
    /// single aggregated warning.
    pub fn scan(root_path: impl AsRef<Path>) -> CoreResult<Self> {
        let root_path = root_path.as_ref();
        std::fs::read_dir(root_path).map_err(|source| CoreError::Io {
            path: root_path.to_path_buf(),
            source,
        })?;

        let mut root = DirNode::default();
        let mut unnamed = Vec::new();
        for entry in WalkDir::new(root_path).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            let rel = entry
                .path()
                .strip_prefix(root_path)
                .unwrap_or_else(|_| entry.path());
            // Lossy names keep one segment per path level, so depth is preserved.
            let segments: Vec<String> = rel
                .components()
                .filter_map(|c| match c {
                    Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect();

            let Some((last, parents)) = segments.split_last() else {
                continue;
            };

            if entry.file_type().is_dir() {
                root.descend(segments.iter().map(String::as_str));
            } else if entry.depth() == 1 && entry.file_name().to_str().is_none() {
                // The remote command line cannot name this file.
                unnamed.push(last.clone());
            } else {
                root.descend(parents.iter().map(String::as_str))
                    .files
                    .push(last.clone());
            }
        }

        if !unnamed.is_empty() {
            warn!(
                skipped = %unnamed.join(","),
                "root files with non UTF-8 names will not be scheduled"
            );
        }

        let tree = Self {
            path: root_path.to_path_buf(),
            root,
        };

        let discarded = tree.subdirectory_names();
        if !discarded.is_empty() {
            warn!(
                discarded = %discarded.join(","),
                "sub-directories will be discarded, only root-level scripts are scheduled"
            );
        }
        debug!(
            path = %tree.path.display(),
            suites = tree.root.files.len(),
            "workspace indexed"
        );

        Ok(tree)
    }

    /// The workspace root on the local filesystem.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The root directory node.
    pub fn root(&self) -> &DirNode {
        &self.root
    }

    /// Suite file names that will be scheduled.
    pub fn schedulable(&self) -> &[String] {
        &self.root.files
    }

    /// Names of the root's sub-directories, which are not scheduled.
    pub fn subdirectory_names(&self) -> Vec<String> {
        self.root.children.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_records_root_files_and_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("dir1")).unwrap();
        fs::create_dir(dir.path().join("dir2")).unwrap();
        fs::write(dir.path().join("file1.robot"), "x").unwrap();
        fs::write(dir.path().join("dir1").join("file2.robot"), "x").unwrap();
        fs::write(dir.path().join("dir2").join("file3.robot"), "x").unwrap();

        let tree = WorkspaceTree::scan(dir.path()).unwrap();

        assert_eq!(tree.schedulable(), ["file1.robot"]);
        assert_eq!(tree.subdirectory_names(), vec!["dir1", "dir2"]);
        assert_eq!(tree.root().child("dir1").unwrap().files, vec!["file2.robot"]);
        assert_eq!(tree.root().child("dir2").unwrap().files, vec!["file3.robot"]);
    }

    #[test]
    fn one_file_and_one_directory_yields_one_suite() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("only.robot"), "x").unwrap();
        fs::create_dir(dir.path().join("resources")).unwrap();

        let tree = WorkspaceTree::scan(dir.path()).unwrap();

        assert_eq!(tree.schedulable().len(), 1);
        assert_eq!(tree.schedulable()[0], "only.robot");
        assert_eq!(tree.subdirectory_names(), vec!["resources"]);
    }

    #[test]
    fn nested_directories_are_built_as_a_trie() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a").join("b").join("c")).unwrap();
        fs::write(dir.path().join("a").join("b").join("deep.robot"), "x").unwrap();

        let tree = WorkspaceTree::scan(dir.path()).unwrap();

        let b = tree.root().child("a").unwrap().child("b").unwrap();
        assert_eq!(b.files, vec!["deep.robot"]);
        assert!(b.child("c").unwrap().files.is_empty());
        assert!(tree.schedulable().is_empty());
        assert_eq!(tree.root().children.len(), 1);
    }

    #[test]
    fn files_are_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.robot", "a.robot", "b.robot"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }

        let tree = WorkspaceTree::scan(dir.path()).unwrap();
        assert_eq!(tree.schedulable(), ["a.robot", "b.robot", "c.robot"]);
    }

    #[test]
    fn empty_workspace_has_nothing_to_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let tree = WorkspaceTree::scan(dir.path()).unwrap();
        assert!(tree.schedulable().is_empty());
        assert!(tree.subdirectory_names().is_empty());
        assert_eq!(tree.path(), dir.path());
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_directory_keeps_its_files_nested() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let odd = dir.path().join(OsStr::from_bytes(b"sub\xff"));
        fs::create_dir(&odd).unwrap();
        fs::write(odd.join("nested.robot"), "x").unwrap();
        fs::write(dir.path().join("top.robot"), "x").unwrap();

        let tree = WorkspaceTree::scan(dir.path()).unwrap();

        assert_eq!(tree.schedulable(), ["top.robot"]);
        assert_eq!(tree.subdirectory_names(), vec!["sub\u{fffd}"]);
        assert_eq!(
            tree.root().child("sub\u{fffd}").unwrap().files,
            vec!["nested.robot"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_root_file_is_not_scheduled() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"bad\xfe.robot")), "x").unwrap();
        fs::write(dir.path().join("good.robot"), "x").unwrap();

        let tree = WorkspaceTree::scan(dir.path()).unwrap();

        assert_eq!(tree.schedulable(), ["good.robot"]);
        assert!(tree.subdirectory_names().is_empty());
    }

    #[test]
    fn unreadable_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        let err = WorkspaceTree::scan(&missing).unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }));
    }
}
