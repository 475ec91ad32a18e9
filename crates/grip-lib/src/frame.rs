//! Decoded recording documents.
//!
//! A recording is a JSON object mapping field keys such as
//! `left_wrist_pose` or `right_palm_tactile` to rectangular numeric arrays
//! whose first axis is the frame axis. Decoding is one pass: every
//! array-valued field either becomes a `Matrix` or is remembered with the
//! reason it failed, so one malformed stream degrades only the views that
//! read it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::record::{FrameCounts, Side, TactileSite};

/// Columns of a wrist-pose stream: 3 position values then a unit
/// quaternion in w, x, y, z order.
pub const WRIST_POSE_WIDTH: usize = 7;

pub(crate) fn wrist_key(side: Side) -> String {
    format!("{side}_wrist_pose")
}

pub(crate) fn joints_key(side: Side) -> String {
    format!("{side}_joint_states")
}

pub(crate) fn tactile_key(side: Side, site: TactileSite) -> String {
    format!("{side}_{site}_tactile")
}

/// Row-major rectangular array; rows are frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Builds from per-frame rows; `None` when the rows are ragged.
    pub fn from_rows(rows: &[Vec<f64>]) -> Option<Matrix> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != cols) {
            return None;
        }
        Some(Matrix {
            rows: rows.len(),
            cols,
            data: rows.concat(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// True when there is nothing to render: no frames, or zero-width rows
    /// (an absent tactile sensor is encoded either way).
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.data[r * self.cols + col]).collect()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// All values in row-major order.
    pub fn values(&self) -> &[f64] {
        &self.data
    }
}

fn matrix_from_value(value: &Value) -> std::result::Result<Matrix, String> {
    let frames = value
        .as_array()
        .ok_or_else(|| "expected an array of frames".to_string())?;
    let mut data = Vec::new();
    let mut cols: Option<usize> = None;
    for (index, frame) in frames.iter().enumerate() {
        let row = frame
            .as_array()
            .ok_or_else(|| format!("frame {index} is not an array"))?;
        match cols {
            None => cols = Some(row.len()),
            Some(expected) if expected != row.len() => {
                return Err(format!(
                    "ragged rows: frame {index} has {} values, expected {expected}",
                    row.len()
                ));
            }
            Some(_) => {}
        }
        for (position, value) in row.iter().enumerate() {
            let number = value.as_f64().ok_or_else(|| {
                format!("non-numeric value at frame {index}, position {position}")
            })?;
            data.push(number);
        }
    }
    Ok(Matrix {
        rows: frames.len(),
        cols: cols.unwrap_or(0),
        data,
    })
}

/// One decoded recording with typed, shape-checked access to its streams.
#[derive(Debug, Clone)]
pub struct SensorFrame {
    fields: BTreeMap<String, Matrix>,
    defects: BTreeMap<String, String>,
    key_count: usize,
}

impl SensorFrame {
    /// Decodes a downloaded document. Fails only when the bytes are not a
    /// JSON object; per-field shape problems are deferred to the accessor
    /// that touches the field.
    pub fn from_slice(bytes: &[u8]) -> Result<SensorFrame> {
        let doc: BTreeMap<String, Value> = serde_json::from_slice(bytes)?;
        let key_count = doc.len();
        let mut fields = BTreeMap::new();
        let mut defects = BTreeMap::new();
        for (key, value) in &doc {
            if !value.is_array() {
                continue;
            }
            match matrix_from_value(value) {
                Ok(matrix) => {
                    fields.insert(key.clone(), matrix);
                }
                Err(reason) => {
                    defects.insert(key.clone(), reason);
                }
            }
        }
        Ok(SensorFrame {
            fields,
            defects,
            key_count,
        })
    }

    /// Number of top-level keys in the document, array-valued or not.
    pub fn key_count(&self) -> usize {
        self.key_count
    }

    /// The stream fields that decoded cleanly, in key order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    fn field(&self, key: &str) -> Result<&Matrix> {
        if let Some(matrix) = self.fields.get(key) {
            return Ok(matrix);
        }
        match self.defects.get(key) {
            Some(reason) => Err(Error::schema(key, reason.clone())),
            None => Err(Error::schema(key, "missing from recording")),
        }
    }

    /// `[F, 7]` wrist stream for one side.
    pub fn wrist_pose(&self, side: Side) -> Result<&Matrix> {
        let key = wrist_key(side);
        let matrix = self.field(&key)?;
        if matrix.cols() != WRIST_POSE_WIDTH {
            return Err(Error::schema(
                key,
                format!(
                    "expected {WRIST_POSE_WIDTH} columns (position + quaternion), found {}",
                    matrix.cols()
                ),
            ));
        }
        Ok(matrix)
    }

    /// `[F, J]` joint-angle stream for one side; J is fixed per side.
    pub fn joint_states(&self, side: Side) -> Result<&Matrix> {
        let key = joints_key(side);
        let matrix = self.field(&key)?;
        self.check_frame_axis(&key, matrix, side)?;
        Ok(matrix)
    }

    /// `[F, S]` tactile stream for one site; `S == 0` is a valid absent
    /// sensor, not an error, and is exempt from the frame-axis check.
    pub fn tactile(&self, side: Side, site: TactileSite) -> Result<&Matrix> {
        let key = tactile_key(side, site);
        let matrix = self.field(&key)?;
        if !matrix.is_empty() {
            self.check_frame_axis(&key, matrix, side)?;
        }
        Ok(matrix)
    }

    /// Frame count of one side, defined by its wrist stream.
    pub fn frame_count(&self, side: Side) -> Result<usize> {
        self.wrist_pose(side).map(Matrix::rows)
    }

    pub fn frame_counts(&self) -> FrameCounts {
        FrameCounts::new(
            self.frame_count(Side::Left).ok(),
            self.frame_count(Side::Right).ok(),
        )
    }

    pub fn summary(&self, name: &str) -> RecordingSummary {
        let counts = self.frame_counts();
        RecordingSummary {
            name: name.to_string(),
            key_count: self.key_count,
            left_frames: counts.left,
            right_frames: counts.right,
        }
    }

    fn check_frame_axis(&self, key: &str, matrix: &Matrix, side: Side) -> Result<()> {
        // Only checkable when the side's wrist stream itself decoded.
        if let Ok(expected) = self.frame_count(side) {
            if matrix.rows() != expected {
                return Err(Error::schema(
                    key,
                    format!("{} frames, expected {expected}", matrix.rows()),
                ));
            }
        }
        Ok(())
    }
}

/// Headline facts shown in the data-summary panel and `grip summary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub name: String,
    pub key_count: usize,
    pub left_frames: Option<usize>,
    pub right_frames: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> SensorFrame {
        SensorFrame::from_slice(&serde_json::to_vec(&value).unwrap()).unwrap()
    }

    fn bimanual_doc() -> SensorFrame {
        doc(json!({
            "left_wrist_pose": [[0.1, 0.2, 0.3, 1.0, 0.0, 0.0, 0.0],
                                [0.2, 0.3, 0.4, 0.9, 0.1, 0.0, 0.0]],
            "right_wrist_pose": [[1.1, 1.2, 1.3, 1.0, 0.0, 0.0, 0.0],
                                 [1.2, 1.3, 1.4, 0.9, 0.1, 0.0, 0.0]],
            "left_joint_states": [[0.0, 0.5, 1.0], [0.1, 0.6, 1.1]],
            "left_palm_tactile": [[1.0, 2.0], [3.0, 4.0]],
            "left_finger_2_tactile": [[], []],
            "task_name": "pick_place",
        }))
    }

    #[test]
    fn decodes_streams_and_counts_keys() {
        let frame = bimanual_doc();
        assert_eq!(frame.key_count(), 6);
        assert_eq!(frame.frame_count(Side::Left).unwrap(), 2);
        assert_eq!(
            frame.frame_counts(),
            FrameCounts::new(Some(2), Some(2))
        );

        let wrist = frame.wrist_pose(Side::Left).unwrap();
        assert_eq!((wrist.rows(), wrist.cols()), (2, 7));
        assert_eq!(wrist.row(1)[0], 0.2);
        assert_eq!(wrist.column(3), vec![1.0, 0.9]);
    }

    #[test]
    fn malformed_bytes_are_a_decode_error() {
        let err = SensorFrame::from_slice(b"{ nope").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        // A JSON value that is not an object is equally undecodable.
        let err = SensorFrame::from_slice(b"[1, 2, 3]").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn missing_field_is_a_schema_error() {
        let frame = bimanual_doc();
        let err = frame.joint_states(Side::Right).unwrap_err();
        match err {
            Error::Schema { field, reason } => {
                assert_eq!(field, "right_joint_states");
                assert!(reason.contains("missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ragged_field_fails_only_its_own_accessor() {
        let frame = doc(json!({
            "left_wrist_pose": [[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]],
            "left_joint_states": [[1.0, 2.0], [3.0]],
        }));
        let err = frame.joint_states(Side::Left).unwrap_err();
        assert!(matches!(err, Error::Schema { ref reason, .. } if reason.contains("ragged")));
        // The sibling stream is untouched.
        assert!(frame.wrist_pose(Side::Left).is_ok());
    }

    #[test]
    fn non_numeric_value_is_reported_with_position() {
        let frame = doc(json!({
            "left_wrist_pose": [[0.0, "x", 0.0, 1.0, 0.0, 0.0, 0.0]],
        }));
        let err = frame.wrist_pose(Side::Left).unwrap_err();
        assert!(
            matches!(err, Error::Schema { ref reason, .. } if reason.contains("frame 0, position 1"))
        );
    }

    #[test]
    fn wrong_wrist_width_is_rejected() {
        let frame = doc(json!({
            "left_wrist_pose": [[1.0, 2.0, 3.0]],
        }));
        let err = frame.wrist_pose(Side::Left).unwrap_err();
        assert!(matches!(err, Error::Schema { ref reason, .. } if reason.contains("7 columns")));
    }

    #[test]
    fn frame_axis_mismatch_is_rejected() {
        let pose = [0.0f64; 7];
        let frame = doc(json!({
            "left_wrist_pose": [pose, pose],
            "left_joint_states": [[0.0, 0.0]],
        }));
        let err = frame.joint_states(Side::Left).unwrap_err();
        assert!(matches!(err, Error::Schema { ref reason, .. } if reason.contains("expected 2")));
    }

    #[test]
    fn empty_tactile_is_valid_either_encoding() {
        let pose = [0.0f64; 7];
        let frame = doc(json!({
            "left_wrist_pose": [pose, pose],
            "left_finger_0_tactile": [],
            "left_finger_1_tactile": [[], []],
        }));
        let zero_rows = frame.tactile(Side::Left, TactileSite::Finger0).unwrap();
        assert!(zero_rows.is_empty());
        let zero_cols = frame.tactile(Side::Left, TactileSite::Finger1).unwrap();
        assert!(zero_cols.is_empty());
        assert_eq!(zero_cols.rows(), 2);
    }

    #[test]
    fn summary_reports_per_side_frames() {
        let pose = [0.0f64; 7];
        let frame = doc(json!({
            "left_wrist_pose": [pose, pose, pose],
            "notes": "left hand only",
        }));
        let summary = frame.summary("trial_a.json");
        assert_eq!(summary.name, "trial_a.json");
        assert_eq!(summary.key_count, 2);
        assert_eq!(summary.left_frames, Some(3));
        assert_eq!(summary.right_frames, None);
    }

    #[test]
    fn matrix_from_rows_rejects_ragged_input() {
        assert!(Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_none());
        let matrix = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(matrix.get(1, 0), 3.0);
        assert_eq!(matrix.values(), [1.0, 2.0, 3.0, 4.0]);
    }
}
