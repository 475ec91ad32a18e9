use serde::{Deserialize, Serialize};

/// One file from the remote listing, before any tree structure is imposed.
///
/// `path` is a `/`-joined segment sequence whose final segment equals
/// `name`; `id` is the opaque handle the store downloads by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub path: String,
}

impl FileRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, path: impl Into<String>) -> Self {
        FileRecord {
            id: id.into(),
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Which arm-hand unit a stream belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    /// Field-key prefix, e.g. `left` in `left_wrist_pose`.
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    /// Human-facing label for titles and radio buttons.
    pub fn label(self) -> &'static str {
        match self {
            Side::Left => "Left",
            Side::Right => "Right",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a view spans the whole recording or a single frame of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    TimeSeries,
    SingleFrame,
}

impl ViewMode {
    pub fn label(self) -> &'static str {
        match self {
            ViewMode::TimeSeries => "Time Series",
            ViewMode::SingleFrame => "Single Frame",
        }
    }
}

/// Tactile sensor placement on one hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TactileSite {
    Finger0,
    Finger1,
    Finger2,
    Palm,
}

impl TactileSite {
    /// Comparison-grid order: three fingers, then the palm.
    pub const ALL: [TactileSite; 4] = [
        TactileSite::Finger0,
        TactileSite::Finger1,
        TactileSite::Finger2,
        TactileSite::Palm,
    ];

    /// Field-key fragment, e.g. `finger_0` in `left_finger_0_tactile`.
    pub fn as_str(self) -> &'static str {
        match self {
            TactileSite::Finger0 => "finger_0",
            TactileSite::Finger1 => "finger_1",
            TactileSite::Finger2 => "finger_2",
            TactileSite::Palm => "palm",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TactileSite::Finger0 => "Finger 0",
            TactileSite::Finger1 => "Finger 1",
            TactileSite::Finger2 => "Finger 2",
            TactileSite::Palm => "Palm",
        }
    }
}

impl std::fmt::Display for TactileSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-side frame counts of a loaded recording.
///
/// The sides of one file normally agree; when they do not, navigation clamps
/// against the smaller count so any selected frame is renderable on both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCounts {
    pub left: Option<usize>,
    pub right: Option<usize>,
}

impl FrameCounts {
    pub fn new(left: Option<usize>, right: Option<usize>) -> Self {
        FrameCounts { left, right }
    }

    pub fn get(&self, side: Side) -> Option<usize> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    /// Upper bound for frame indices: the minimum over the sides present.
    pub fn bound(&self) -> Option<usize> {
        match (self.left, self.right) {
            (Some(l), Some(r)) => Some(l.min(r)),
            (Some(l), None) => Some(l),
            (None, Some(r)) => Some(r),
            (None, None) => None,
        }
    }

    pub fn mismatched(&self) -> bool {
        matches!((self.left, self.right), (Some(l), Some(r)) if l != r)
    }
}
