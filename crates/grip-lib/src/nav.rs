//! Navigation as a pure reducer.
//!
//! Shells own one `NavigationState` per session and fold `Intent`s into it;
//! every transition returns a fresh state, so a shell can render any
//! snapshot it holds without worrying about aliased mutation. The tree is
//! passed in rather than stored: it is rebuilt wholesale when the listing
//! changes, and a state validated against one tree may legitimately fail
//! against the next (stale paths surface as `Error::InvalidPath`).

use std::collections::BTreeSet;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::record::{FileRecord, FrameCounts, Side, ViewMode};
use crate::tree::FolderTree;

/// Monotonic ticket tying an in-flight download to the selection that
/// requested it. Completions carrying a stale ticket are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Generation(u64);

impl Generation {
    fn next(self) -> Generation {
        Generation(self.0 + 1)
    }
}

/// Everything a user can do to the navigator.
#[derive(Debug, Clone)]
pub enum Intent {
    /// Descend into a child folder of the current one.
    EnterFolder(String),
    /// Pop one level; no-op at the root.
    GoBack,
    /// Flip a folder's expansion in the tree-style view, by full path.
    ToggleExpand(String),
    /// Select a file for viewing.
    SelectFile(FileRecord),
    /// Move the selection within the current folder listing; +1/-1 from the
    /// prev/next buttons, clamped at both ends.
    SelectRelative(i32),
    SetMode(ViewMode),
    SetSide(Side),
    /// Jump the single-frame cursor; clamped to the known frame range.
    SetFrameIndex(usize),
}

/// Immutable navigation snapshot.
///
/// Invariant: `frame_index` is `Some` exactly when `mode` is `SingleFrame`
/// and a file is selected, and once frame counts are known it stays within
/// `0..counts.bound()`.
#[derive(Debug, Clone)]
pub struct NavigationState {
    current_path: Vec<String>,
    selected: Option<FileRecord>,
    expanded: BTreeSet<String>,
    side: Side,
    mode: ViewMode,
    frame_index: Option<usize>,
    counts: Option<FrameCounts>,
    generation: Generation,
}

impl Default for NavigationState {
    fn default() -> Self {
        NavigationState {
            current_path: Vec::new(),
            selected: None,
            expanded: BTreeSet::new(),
            side: Side::Left,
            mode: ViewMode::TimeSeries,
            frame_index: None,
            counts: None,
            generation: Generation(0),
        }
    }
}

impl NavigationState {
    pub fn current_path(&self) -> &[String] {
        &self.current_path
    }

    pub fn selected(&self) -> Option<&FileRecord> {
        self.selected.as_ref()
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.contains(path)
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn frame_index(&self) -> Option<usize> {
        self.frame_index
    }

    pub fn counts(&self) -> Option<FrameCounts> {
        self.counts
    }

    /// Ticket to attach to a download issued for the current selection.
    pub fn load_ticket(&self) -> Generation {
        self.generation
    }

    /// `Root / session_01 / grasp` style caption for the header line.
    pub fn breadcrumb(&self) -> String {
        let mut crumb = String::from("Root");
        for segment in &self.current_path {
            crumb.push_str(" / ");
            crumb.push_str(segment);
        }
        crumb
    }

    /// Zero-based position of the selection within the current folder's
    /// file listing, with the listing length. Drives the "File i / N"
    /// caption and the prev/next button enablement.
    pub fn listing_position(&self, tree: &FolderTree) -> Option<(usize, usize)> {
        let selected = self.selected.as_ref()?;
        let files = &tree.folder_at(&self.current_path).ok()?.files;
        let index = files.iter().position(|r| r.id == selected.id)?;
        Some((index, files.len()))
    }

    /// Folds one intent into a new state. The tree must be the one the
    /// shell is currently displaying.
    pub fn apply(&self, intent: Intent, tree: &FolderTree) -> Result<NavigationState> {
        let mut next = self.clone();
        match intent {
            Intent::EnterFolder(segment) => {
                let here = tree.resolve(&self.current_path)?;
                if !tree.node(here).children.contains_key(&segment) {
                    return Err(Error::InvalidPath {
                        path: self.current_path.join("/"),
                        segment,
                    });
                }
                next.current_path.push(segment);
                next.clear_selection();
            }
            Intent::GoBack => {
                if next.current_path.pop().is_some() {
                    next.clear_selection();
                }
            }
            Intent::ToggleExpand(path) => {
                if !next.expanded.remove(&path) {
                    next.expanded.insert(path);
                }
            }
            Intent::SelectFile(record) => next.select(record),
            Intent::SelectRelative(delta) => {
                if let Some(target) = self.relative_record(delta, tree)? {
                    next.select(target);
                }
            }
            Intent::SetMode(mode) => {
                if mode != self.mode {
                    next.mode = mode;
                    next.frame_index = match mode {
                        ViewMode::SingleFrame if next.selected.is_some() => {
                            Some(next.clamp_index(0))
                        }
                        _ => None,
                    };
                }
            }
            Intent::SetSide(side) => {
                next.side = side;
                if let Some(index) = next.frame_index {
                    next.frame_index = Some(next.clamp_index(index));
                }
            }
            Intent::SetFrameIndex(index) => {
                if self.mode == ViewMode::SingleFrame && self.selected.is_some() {
                    next.frame_index = Some(self.clamp_index(index));
                } else {
                    debug!("frame index {index} ignored outside single-frame viewing");
                }
            }
        }
        Ok(next)
    }

    /// Completion handler for a finished download. Returns `None` when the
    /// ticket is stale, in which case the result must be discarded.
    pub fn apply_frame_counts(
        &self,
        ticket: Generation,
        counts: FrameCounts,
    ) -> Option<NavigationState> {
        if ticket != self.generation {
            debug!("discarding frame counts for superseded selection");
            return None;
        }
        if counts.mismatched() {
            warn!(
                "left/right frame counts disagree ({:?} vs {:?}); clamping to the smaller",
                counts.left, counts.right
            );
        }
        let mut next = self.clone();
        next.counts = Some(counts);
        if let Some(index) = next.frame_index {
            next.frame_index = Some(next.clamp_index(index));
        }
        Some(next)
    }

    /// Recovery from a stale path or an inconsistent listing: back to the
    /// root with nothing selected, keeping side, mode, and expansion marks.
    pub fn reset_to_root(&self) -> NavigationState {
        let mut next = self.clone();
        next.current_path.clear();
        next.clear_selection();
        next
    }

    fn select(&mut self, record: FileRecord) {
        self.selected = Some(record);
        self.counts = None;
        self.frame_index = (self.mode == ViewMode::SingleFrame).then_some(0);
        self.generation = self.generation.next();
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.counts = None;
        self.frame_index = None;
        self.generation = self.generation.next();
    }

    fn relative_record(&self, delta: i32, tree: &FolderTree) -> Result<Option<FileRecord>> {
        let selected = match &self.selected {
            Some(record) => record,
            None => return Ok(None),
        };
        let files = &tree.folder_at(&self.current_path)?.files;
        let Some(position) = files.iter().position(|r| r.id == selected.id) else {
            return Ok(None);
        };
        let target =
            (position as i64 + delta as i64).clamp(0, files.len() as i64 - 1) as usize;
        if target == position {
            return Ok(None);
        }
        Ok(Some(files[target].clone()))
    }

    fn clamp_index(&self, index: usize) -> usize {
        match self.counts.and_then(|c| c.bound()) {
            Some(bound) => index.min(bound.saturating_sub(1)),
            None => index,
        }
    }
}
