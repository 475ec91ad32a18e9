//! Folder hierarchy over a flat remote listing.
//!
//! The listing arrives as `(id, name, path)` records with no structure. The
//! tree is an arena: nodes live in one `Vec`, children point at siblings by
//! index, and the whole arena is swapped out when the listing changes. A
//! `NodeId` is only meaningful against the tree that produced it.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use log::warn;

use crate::error::{Error, Result};
use crate::record::FileRecord;

/// Index of a folder in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// The root folder. Present in every tree, even an empty one.
    pub const ROOT: NodeId = NodeId(0);
}

/// One folder: lexically ordered subfolders plus name-sorted files.
#[derive(Debug, Default)]
pub struct FolderNode {
    pub children: BTreeMap<String, NodeId>,
    pub files: Vec<FileRecord>,
}

/// Arena-backed folder tree built from a flat listing.
#[derive(Debug)]
pub struct FolderTree {
    nodes: Vec<FolderNode>,
    total: usize,
}

impl FolderTree {
    /// Builds the tree, rejecting listings where two records share an id.
    pub fn build(records: &[FileRecord]) -> Result<FolderTree> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            if !seen.insert(record.id.as_str()) {
                return Err(Error::DuplicateId(record.id.clone()));
            }
        }
        Ok(Self::from_records(records.iter()))
    }

    /// Builds the tree keeping the most recent record per duplicated id.
    ///
    /// Returns the duplicated ids so callers can surface the data problem;
    /// each one is also logged here.
    pub fn build_lossy(records: &[FileRecord]) -> (FolderTree, Vec<String>) {
        let mut last: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dupes: Vec<String> = Vec::new();
        for (index, record) in records.iter().enumerate() {
            if last.insert(record.id.as_str(), index).is_some() {
                if !dupes.iter().any(|id| id == &record.id) {
                    dupes.push(record.id.clone());
                }
            }
        }
        for id in &dupes {
            warn!("duplicate file id `{id}` in listing; keeping the latest entry");
        }
        let kept = records
            .iter()
            .enumerate()
            .filter(|(index, record)| last[record.id.as_str()] == *index)
            .map(|(_, record)| record);
        (Self::from_records(kept), dupes)
    }

    fn from_records<'a>(records: impl Iterator<Item = &'a FileRecord>) -> FolderTree {
        let mut tree = FolderTree {
            nodes: vec![FolderNode::default()],
            total: 0,
        };
        for record in records {
            // Empty segments (doubled or leading slashes) are dropped; the
            // final segment is the file itself, everything before it a folder.
            let segments: Vec<&str> = record.path.split('/').filter(|s| !s.is_empty()).collect();
            let folder_segments = match segments.len() {
                0 => &[][..],
                n => &segments[..n - 1],
            };
            let mut node = NodeId::ROOT;
            for segment in folder_segments {
                node = tree.child_or_insert(node, segment);
            }
            tree.nodes[node.0].files.push(record.clone());
            tree.total += 1;
        }
        for node in &mut tree.nodes {
            node.files
                .sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
        }
        tree
    }

    fn child_or_insert(&mut self, parent: NodeId, segment: &str) -> NodeId {
        if let Some(&child) = self.nodes[parent.0].children.get(segment) {
            return child;
        }
        let child = NodeId(self.nodes.len());
        self.nodes.push(FolderNode::default());
        self.nodes[parent.0].children.insert(segment.to_string(), child);
        child
    }

    pub fn node(&self, id: NodeId) -> &FolderNode {
        &self.nodes[id.0]
    }

    /// Walks `path` down from the root, naming the segment that fails.
    pub fn resolve(&self, path: &[String]) -> Result<NodeId> {
        let mut node = NodeId::ROOT;
        for (depth, segment) in path.iter().enumerate() {
            match self.nodes[node.0].children.get(segment) {
                Some(&child) => node = child,
                None => {
                    return Err(Error::InvalidPath {
                        path: path[..depth].join("/"),
                        segment: segment.clone(),
                    })
                }
            }
        }
        Ok(node)
    }

    pub fn folder_at(&self, path: &[String]) -> Result<&FolderNode> {
        self.resolve(path).map(|id| self.node(id))
    }

    /// Total files under `id`, subfolders included. Drives the folder badges.
    pub fn count_files(&self, id: NodeId) -> usize {
        let mut total = 0;
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            total += node.files.len();
            stack.extend(node.children.values().copied());
        }
        total
    }

    /// Depth-first flattening in which files sort by name and subfolders by
    /// `segment + "/"`. This merged order reproduces exactly the listing
    /// sorted by full path, so prev/next over the flattened sequence agrees
    /// with the global ordering.
    pub fn flatten(&self) -> Vec<&FileRecord> {
        enum Step<'a> {
            Folder(NodeId),
            File(&'a FileRecord),
        }
        let mut out = Vec::with_capacity(self.total);
        let mut stack = vec![Step::Folder(NodeId::ROOT)];
        while let Some(step) = stack.pop() {
            match step {
                Step::File(record) => out.push(record),
                Step::Folder(id) => {
                    let node = &self.nodes[id.0];
                    let mut entries: Vec<(&str, bool, Step)> = node
                        .files
                        .iter()
                        .map(|record| (record.name.as_str(), false, Step::File(record)))
                        .collect();
                    for (segment, &child) in &node.children {
                        entries.push((segment.as_str(), true, Step::Folder(child)));
                    }
                    entries.sort_by(|a, b| cmp_listing_key(a.0, a.1, b.0, b.1));
                    for (_, _, step) in entries.into_iter().rev() {
                        stack.push(step);
                    }
                }
            }
        }
        out
    }

    /// Number of records in the whole tree.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Compares folder entries as if folder names carried a trailing `/`, which
/// is how they appear inside full paths.
fn cmp_listing_key(a: &str, a_folder: bool, b: &str, b_folder: bool) -> Ordering {
    let a_bytes = a.bytes().chain(a_folder.then_some(b'/'));
    let b_bytes = b.bytes().chain(b_folder.then_some(b'/'));
    a_bytes.cmp(b_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, path: &str) -> FileRecord {
        let name = path.rsplit('/').next().unwrap_or(path);
        FileRecord::new(id, name, path)
    }

    fn sample_records() -> Vec<FileRecord> {
        vec![
            record("f1", "session_01/grasp/trial_a.json"),
            record("f2", "session_01/grasp/trial_b.json"),
            record("f3", "session_01/release/trial_a.json"),
            record("f4", "calibration.json"),
            record("f5", "session_02/trial_c.json"),
        ]
    }

    #[test]
    fn builds_nested_folders_from_paths() {
        let tree = FolderTree::build(&[
            record("a", "a/b/x.json"),
            record("b", "a/c/y.json"),
        ])
        .unwrap();

        let root = tree.node(NodeId::ROOT);
        assert!(root.files.is_empty());
        assert_eq!(root.children.len(), 1);

        let a = tree.node(root.children["a"]);
        let names: Vec<&String> = a.children.keys().collect();
        assert_eq!(names, ["b", "c"]);
        assert_eq!(tree.node(a.children["b"]).files.len(), 1);
        assert_eq!(tree.node(a.children["c"]).files.len(), 1);
    }

    #[test]
    fn count_matches_record_total() {
        let records = sample_records();
        let tree = FolderTree::build(&records).unwrap();
        assert_eq!(tree.count_files(NodeId::ROOT), records.len());
        assert_eq!(tree.len(), records.len());

        let session = tree.resolve(&["session_01".into()]).unwrap();
        assert_eq!(tree.count_files(session), 3);
    }

    #[test]
    fn flatten_equals_paths_sorted() {
        let records = sample_records();
        let tree = FolderTree::build(&records).unwrap();

        let mut expected: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        expected.sort();
        let actual: Vec<&str> = tree.flatten().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(actual, expected);

        // Rebuilding from the same listing reproduces the ordering.
        let again = FolderTree::build(&records).unwrap();
        let repeat: Vec<&str> = again.flatten().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(repeat, actual);
    }

    #[test]
    fn flatten_orders_file_against_sibling_folder() {
        // File "b+.json" vs folder "b": '+' (0x2B) sorts before '/' (0x2F),
        // so the file precedes the folder's subtree, exactly as in a path
        // sort. A plain name comparison would get this wrong.
        let records = vec![
            record("x", "b+.json"),
            record("y", "b/inner.json"),
            record("z", "b"),
        ];
        let tree = FolderTree::build(&records).unwrap();
        let flat: Vec<&str> = tree.flatten().iter().map(|r| r.path.as_str()).collect();

        let mut expected: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        expected.sort();
        assert_eq!(flat, expected);
        assert_eq!(flat, ["b", "b+.json", "b/inner.json"]);
    }

    #[test]
    fn resolve_reports_failing_segment() {
        let tree = FolderTree::build(&sample_records()).unwrap();
        let err = tree
            .resolve(&["session_01".into(), "nope".into()])
            .unwrap_err();
        match err {
            Error::InvalidPath { path, segment } => {
                assert_eq!(path, "session_01");
                assert_eq!(segment, "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_ids_rejected_strictly() {
        let records = vec![record("dup", "a/x.json"), record("dup", "b/y.json")];
        let err = FolderTree::build(&records).unwrap_err();
        assert!(matches!(err, Error::DuplicateId(id) if id == "dup"));
    }

    #[test]
    fn lossy_build_keeps_latest_and_reports() {
        let records = vec![
            record("dup", "old/x.json"),
            record("keep", "k.json"),
            record("dup", "new/x.json"),
        ];
        let (tree, dropped) = FolderTree::build_lossy(&records);
        assert_eq!(dropped, ["dup"]);
        assert_eq!(tree.len(), 2);
        let flat: Vec<&str> = tree.flatten().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(flat, ["k.json", "new/x.json"]);
    }

    #[test]
    fn path_normalization_drops_empty_segments() {
        let tree = FolderTree::build(&[record("a", "/sessions//day_1/run.json")]).unwrap();
        let folder = tree
            .folder_at(&["sessions".into(), "day_1".into()])
            .unwrap();
        assert_eq!(folder.files.len(), 1);
    }

    #[test]
    fn empty_listing_builds_empty_root() {
        let tree = FolderTree::build(&[]).unwrap();
        assert!(tree.is_empty());
        assert!(tree.node(NodeId::ROOT).children.is_empty());
        assert!(tree.flatten().is_empty());
    }

    #[test]
    fn files_within_folder_sorted_by_name() {
        let tree = FolderTree::build(&[
            record("2", "run/b.json"),
            record("1", "run/a.json"),
            record("3", "run/c.json"),
        ])
        .unwrap();
        let folder = tree.folder_at(&["run".into()]).unwrap();
        let names: Vec<&str> = folder.files.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a.json", "b.json", "c.json"]);
    }
}
