//! Backend-independent view construction.
//!
//! Every view of a recording is first built as a `RenderDescriptor`, a plain
//! data structure with no toolkit types in it. The CLI draws descriptors to
//! PNG, the TUI to the terminal, the GUI to egui; all three consume the same
//! output of the pure functions below, which keeps the per-view semantics
//! (labels, orientation, statistics, degradation) in exactly one place.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frame::{joints_key, tactile_key, wrist_key, SensorFrame};
use crate::record::{Side, TactileSite};

/// Summary statistics over one value set. `std` is the population standard
/// deviation. Any non-finite input poisons all four fields to NaN.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ValueStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

pub fn value_stats(values: &[f64]) -> ValueStats {
    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
        return ValueStats {
            min: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
            std: f64::NAN,
        };
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for &value in values {
        min = min.min(value);
        max = max.max(value);
        sum += value;
    }
    let mean = sum / values.len() as f64;
    let variance = values
        .iter()
        .map(|value| {
            let d = value - mean;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;
    ValueStats {
        min,
        max,
        mean,
        std: variance.sqrt(),
    }
}

/// Shape facts shown beside a whole-recording heatmap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridSummary {
    pub frame_count: usize,
    pub sensor_count: usize,
    pub total_points: usize,
}

/// One cell of the side-by-side tactile comparison. `values` is `None` for
/// an absent sensor; `legend` marks the single cell that carries the shared
/// color scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TactileCell {
    pub title: String,
    pub values: Option<Vec<f64>>,
    pub legend: bool,
}

/// What a backend is asked to draw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RenderDescriptor {
    /// One line per label over the frame axis.
    TimeSeriesLines {
        title: String,
        labels: Vec<String>,
        series: Vec<Vec<f64>>,
    },
    /// Labelled scalar readouts for a single frame.
    FrameMetrics {
        title: String,
        labels: Vec<String>,
        values: Vec<f64>,
    },
    /// Per-sensor intensity row for a single frame.
    Heatmap1D {
        title: String,
        values: Vec<f64>,
        stats: ValueStats,
    },
    /// Whole-recording intensity image, sensor-major: row = sensor index,
    /// column = frame index.
    HeatmapGrid {
        title: String,
        rows: usize,
        cols: usize,
        values: Vec<f64>,
        summary: GridSummary,
    },
    /// All four tactile sites of one hand at one frame.
    CompositeGrid {
        title: String,
        cells: Vec<TactileCell>,
    },
    /// Nothing to draw; the reason is shown in place of the view.
    Unavailable { reason: String },
}

impl RenderDescriptor {
    pub fn title(&self) -> Option<&str> {
        match self {
            RenderDescriptor::TimeSeriesLines { title, .. }
            | RenderDescriptor::FrameMetrics { title, .. }
            | RenderDescriptor::Heatmap1D { title, .. }
            | RenderDescriptor::HeatmapGrid { title, .. }
            | RenderDescriptor::CompositeGrid { title, .. } => Some(title),
            RenderDescriptor::Unavailable { .. } => None,
        }
    }
}

/// Drawing seam implemented by each shell and by the PNG exporter.
pub trait Renderer {
    fn draw(&mut self, descriptor: &RenderDescriptor) -> anyhow::Result<()>;
}

/// Finite min/max over `values`, padded so axis and color ranges never
/// collapse: no finite input gives `(0, 1)`, a constant input is widened
/// by half a unit each way.
pub fn finite_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in values.filter(|value| value.is_finite()) {
        min = min.min(value);
        max = max.max(value);
    }
    if min > max {
        return (0.0, 1.0);
    }
    if min == max {
        return (min - 0.5, max + 0.5);
    }
    (min, max)
}

/// Shared intensity ramp for heatmap cells, `t` in `0..=1` (clamped).
/// Non-finite intensities map to a neutral gray so one bad value cannot
/// blank a whole image.
pub fn heat_rgb(t: f64) -> [u8; 3] {
    if !t.is_finite() {
        return [128, 128, 128];
    }
    const ANCHORS: [[u8; 3]; 5] = [
        [68, 1, 84],
        [59, 82, 139],
        [33, 145, 140],
        [94, 201, 98],
        [253, 231, 37],
    ];
    let t = t.clamp(0.0, 1.0) * (ANCHORS.len() - 1) as f64;
    let low = t.floor() as usize;
    let high = (low + 1).min(ANCHORS.len() - 1);
    let blend = t - low as f64;
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * blend).round() as u8;
    [
        mix(ANCHORS[low][0], ANCHORS[high][0]),
        mix(ANCHORS[low][1], ANCHORS[high][1]),
        mix(ANCHORS[low][2], ANCHORS[high][2]),
    ]
}

const WRIST_LABELS: [&str; 7] = ["x", "y", "z", "qw", "qx", "qy", "qz"];

fn no_data(key: &str) -> RenderDescriptor {
    RenderDescriptor::Unavailable {
        reason: format!("No data available for {key}"),
    }
}

/// Wrist pose view: position and quaternion readouts at one frame, or all
/// seven channels as lines over the recording.
pub fn render_wrist_pose(
    frame: &SensorFrame,
    side: Side,
    frame_index: Option<usize>,
) -> Result<RenderDescriptor> {
    let pose = frame.wrist_pose(side)?;
    if pose.rows() == 0 {
        return Ok(no_data(&wrist_key(side)));
    }
    let labels: Vec<String> = WRIST_LABELS.iter().map(|s| s.to_string()).collect();
    Ok(match frame_index {
        Some(index) => {
            let index = index.min(pose.rows() - 1);
            RenderDescriptor::FrameMetrics {
                title: format!("{} wrist pose, frame {index}", side.label()),
                labels,
                values: pose.row(index).to_vec(),
            }
        }
        None => RenderDescriptor::TimeSeriesLines {
            title: format!("{} wrist pose", side.label()),
            labels,
            series: (0..pose.cols()).map(|c| pose.column(c)).collect(),
        },
    })
}

/// Joint angles view: `J{i}` readouts at one frame, or one line per joint.
pub fn render_joint_states(
    frame: &SensorFrame,
    side: Side,
    frame_index: Option<usize>,
) -> Result<RenderDescriptor> {
    let joints = frame.joint_states(side)?;
    if joints.rows() == 0 || joints.cols() == 0 {
        return Ok(no_data(&joints_key(side)));
    }
    Ok(match frame_index {
        Some(index) => {
            let index = index.min(joints.rows() - 1);
            RenderDescriptor::FrameMetrics {
                title: format!("{} joint states, frame {index}", side.label()),
                labels: (0..joints.cols()).map(|j| format!("J{j}")).collect(),
                values: joints.row(index).to_vec(),
            }
        }
        None => RenderDescriptor::TimeSeriesLines {
            title: format!("{} joint states", side.label()),
            labels: (0..joints.cols()).map(|j| format!("Joint {j}")).collect(),
            series: (0..joints.cols()).map(|c| joints.column(c)).collect(),
        },
    })
}

/// Tactile view for one site: a per-sensor intensity row with statistics at
/// one frame, or the whole recording as a sensor-by-frame image.
pub fn render_tactile(
    frame: &SensorFrame,
    side: Side,
    site: TactileSite,
    frame_index: Option<usize>,
) -> Result<RenderDescriptor> {
    let matrix = frame.tactile(side, site)?;
    if matrix.is_empty() {
        return Ok(no_data(&tactile_key(side, site)));
    }
    Ok(match frame_index {
        Some(index) => {
            let index = index.min(matrix.rows() - 1);
            let values = matrix.row(index).to_vec();
            let stats = value_stats(&values);
            RenderDescriptor::Heatmap1D {
                title: format!("{} {} tactile, frame {index}", side.label(), site.label()),
                values,
                stats,
            }
        }
        None => {
            // Transposed so each sensor reads as a horizontal stripe.
            let mut values = Vec::with_capacity(matrix.rows() * matrix.cols());
            for sensor in 0..matrix.cols() {
                values.extend(matrix.column(sensor));
            }
            RenderDescriptor::HeatmapGrid {
                title: format!("{} {} tactile", side.label(), site.label()),
                rows: matrix.cols(),
                cols: matrix.rows(),
                values,
                summary: GridSummary {
                    frame_count: matrix.rows(),
                    sensor_count: matrix.cols(),
                    total_points: matrix.rows() * matrix.cols(),
                },
            }
        }
    })
}

/// All four tactile sites of one hand at one frame. Only meaningful in
/// single-frame viewing; absent sites stay in the grid as empty cells, and
/// the color legend goes to the last cell that has data.
pub fn render_all_tactile_comparison(
    frame: &SensorFrame,
    side: Side,
    frame_index: Option<usize>,
) -> Result<RenderDescriptor> {
    let Some(index) = frame_index else {
        return Ok(RenderDescriptor::Unavailable {
            reason: "Tactile comparison requires single-frame viewing".to_string(),
        });
    };
    let mut cells = Vec::with_capacity(TactileSite::ALL.len());
    for site in TactileSite::ALL {
        let matrix = frame.tactile(side, site)?;
        let values = if matrix.is_empty() {
            None
        } else {
            Some(matrix.row(index.min(matrix.rows() - 1)).to_vec())
        };
        cells.push(TactileCell {
            title: site.label().to_string(),
            values,
            legend: false,
        });
    }
    if let Some(cell) = cells.iter_mut().rev().find(|c| c.values.is_some()) {
        cell.legend = true;
    }
    Ok(RenderDescriptor::CompositeGrid {
        title: format!("{} tactile comparison, frame {index}", side.label()),
        cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}"
        );
    }

    fn frame_with_tactile() -> SensorFrame {
        // 5 frames, 8 sensors, value = frame * 8 + sensor.
        let tactile: Vec<Vec<f64>> = (0..5)
            .map(|f| (0..8).map(|s| (f * 8 + s) as f64).collect())
            .collect();
        let pose: Vec<Vec<f64>> = (0..5)
            .map(|f| {
                vec![f as f64, 0.5, -0.5, 1.0, 0.0, 0.0, 0.0]
            })
            .collect();
        let doc = json!({
            "left_wrist_pose": pose,
            "left_joint_states": [[0.0, 1.0], [0.1, 1.1], [0.2, 1.2], [0.3, 1.3], [0.4, 1.4]],
            "left_finger_0_tactile": tactile,
            "left_finger_1_tactile": [[1.0], [2.0], [3.0], [4.0], [5.0]],
            "left_finger_2_tactile": [[], [], [], [], []],
            "left_palm_tactile": [[9.0, 8.0], [7.0, 6.0], [5.0, 4.0], [3.0, 2.0], [1.0, 0.0]],
        });
        SensorFrame::from_slice(&serde_json::to_vec(&doc).unwrap()).unwrap()
    }

    #[test]
    fn wrist_frame_values_match_series_columns() {
        let frame = frame_with_tactile();
        let series = match render_wrist_pose(&frame, Side::Left, None).unwrap() {
            RenderDescriptor::TimeSeriesLines { labels, series, .. } => {
                assert_eq!(labels, ["x", "y", "z", "qw", "qx", "qy", "qz"]);
                assert_eq!(series.len(), 7);
                series
            }
            other => panic!("unexpected descriptor: {other:?}"),
        };
        let metrics = match render_wrist_pose(&frame, Side::Left, Some(3)).unwrap() {
            RenderDescriptor::FrameMetrics { values, .. } => values,
            other => panic!("unexpected descriptor: {other:?}"),
        };
        for (channel, value) in metrics.iter().enumerate() {
            assert_eq!(*value, series[channel][3]);
        }
    }

    #[test]
    fn joint_labels_differ_by_mode() {
        let frame = frame_with_tactile();
        match render_joint_states(&frame, Side::Left, Some(0)).unwrap() {
            RenderDescriptor::FrameMetrics { labels, values, .. } => {
                assert_eq!(labels, ["J0", "J1"]);
                assert_eq!(values, [0.0, 1.0]);
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }
        match render_joint_states(&frame, Side::Left, None).unwrap() {
            RenderDescriptor::TimeSeriesLines { labels, series, .. } => {
                assert_eq!(labels, ["Joint 0", "Joint 1"]);
                assert_eq!(series[1], [1.0, 1.1, 1.2, 1.3, 1.4]);
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }
    }

    #[test]
    fn tactile_frame_slice_and_stats() {
        let frame = frame_with_tactile();
        match render_tactile(&frame, Side::Left, TactileSite::Finger0, Some(2)).unwrap() {
            RenderDescriptor::Heatmap1D { values, stats, .. } => {
                let expected: Vec<f64> = (16..24).map(|v| v as f64).collect();
                assert_eq!(values, expected);
                assert_close(stats.min, 16.0, 1e-12);
                assert_close(stats.max, 23.0, 1e-12);
                assert_close(stats.mean, 19.5, 1e-12);
                // Population std of 8 consecutive integers.
                assert_close(stats.std, 5.25f64.sqrt(), 1e-12);
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }
    }

    #[test]
    fn tactile_series_is_sensor_major() {
        let frame = frame_with_tactile();
        match render_tactile(&frame, Side::Left, TactileSite::Palm, None).unwrap() {
            RenderDescriptor::HeatmapGrid {
                rows,
                cols,
                values,
                summary,
                ..
            } => {
                assert_eq!((rows, cols), (2, 5));
                assert_eq!(values[..5], [9.0, 7.0, 5.0, 3.0, 1.0]);
                assert_eq!(values[5..], [8.0, 6.0, 4.0, 2.0, 0.0]);
                assert_eq!(summary.frame_count, 5);
                assert_eq!(summary.sensor_count, 2);
                assert_eq!(summary.total_points, 10);
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }
    }

    #[test]
    fn empty_tactile_degrades_in_both_modes() {
        let frame = frame_with_tactile();
        for frame_index in [Some(2), None] {
            match render_tactile(&frame, Side::Left, TactileSite::Finger2, frame_index).unwrap() {
                RenderDescriptor::Unavailable { reason } => {
                    assert!(reason.contains("left_finger_2_tactile"));
                }
                other => panic!("unexpected descriptor: {other:?}"),
            }
        }
    }

    #[test]
    fn comparison_keeps_four_cells_in_site_order() {
        let frame = frame_with_tactile();
        match render_all_tactile_comparison(&frame, Side::Left, Some(1)).unwrap() {
            RenderDescriptor::CompositeGrid { cells, .. } => {
                let titles: Vec<&str> = cells.iter().map(|c| c.title.as_str()).collect();
                assert_eq!(titles, ["Finger 0", "Finger 1", "Finger 2", "Palm"]);
                assert!(cells[2].values.is_none());
                assert_eq!(cells[3].values.as_deref(), Some(&[7.0, 6.0][..]));
                let legends: Vec<bool> = cells.iter().map(|c| c.legend).collect();
                assert_eq!(legends, [false, false, false, true]);
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }
    }

    #[test]
    fn comparison_legend_falls_back_when_palm_absent() {
        let pose = [0.0f64; 7];
        let doc = json!({
            "left_wrist_pose": [pose],
            "left_finger_0_tactile": [[1.0]],
            "left_finger_1_tactile": [[2.0]],
            "left_finger_2_tactile": [[3.0]],
            "left_palm_tactile": [],
        });
        let frame = SensorFrame::from_slice(&serde_json::to_vec(&doc).unwrap()).unwrap();
        match render_all_tactile_comparison(&frame, Side::Left, Some(0)).unwrap() {
            RenderDescriptor::CompositeGrid { cells, .. } => {
                let legends: Vec<bool> = cells.iter().map(|c| c.legend).collect();
                assert_eq!(legends, [false, false, true, false]);
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }
    }

    #[test]
    fn comparison_requires_a_frame_index() {
        let frame = frame_with_tactile();
        match render_all_tactile_comparison(&frame, Side::Left, None).unwrap() {
            RenderDescriptor::Unavailable { reason } => {
                assert!(reason.contains("single-frame"));
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }
    }

    #[test]
    fn out_of_range_frame_clamps_to_last() {
        let frame = frame_with_tactile();
        match render_wrist_pose(&frame, Side::Left, Some(999)).unwrap() {
            RenderDescriptor::FrameMetrics { title, values, .. } => {
                assert!(title.contains("frame 4"));
                assert_eq!(values[0], 4.0);
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }
    }

    #[test]
    fn stats_propagate_non_finite_values() {
        let stats = value_stats(&[1.0, f64::NAN, 3.0]);
        assert!(stats.min.is_nan());
        assert!(stats.max.is_nan());
        assert!(stats.mean.is_nan());
        assert!(stats.std.is_nan());

        let empty = value_stats(&[]);
        assert!(empty.mean.is_nan());
    }

    #[test]
    fn stats_on_plain_values() {
        let stats = value_stats(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_close(stats.mean, 5.0, 1e-12);
        assert_close(stats.std, 2.0, 1e-12);
        assert_close(stats.min, 2.0, 1e-12);
        assert_close(stats.max, 9.0, 1e-12);
    }

    #[test]
    fn bounds_skip_non_finite_and_pad_degenerate_ranges() {
        assert_eq!(finite_bounds([1.0, f64::NAN, 3.0].into_iter()), (1.0, 3.0));
        assert_eq!(finite_bounds([f64::NAN].into_iter()), (0.0, 1.0));
        assert_eq!(finite_bounds(std::iter::empty()), (0.0, 1.0));
        assert_eq!(finite_bounds([2.0, 2.0].into_iter()), (1.5, 2.5));
    }

    #[test]
    fn heat_ramp_endpoints_and_bad_input() {
        assert_eq!(heat_rgb(0.0), [68, 1, 84]);
        assert_eq!(heat_rgb(1.0), [253, 231, 37]);
        assert_eq!(heat_rgb(-3.0), heat_rgb(0.0));
        assert_eq!(heat_rgb(2.0), heat_rgb(1.0));
        assert_eq!(heat_rgb(f64::NAN), [128, 128, 128]);
    }
}
