use assert_cmd::cargo::cargo_bin_cmd;
use grip_lib::frame::RecordingSummary;
use grip_lib::render::RenderDescriptor;
use grip_lib::FileRecord;
use std::{error::Error, fs, path::PathBuf};

#[test]
fn listing_walks_nested_folders() -> Result<(), Box<dyn Error>> {
    let root = sample_path("test_data/recordings");

    let mut cmd = cargo_bin_cmd!("grip");
    cmd.args(["list", "--root", &root, "--format", "json"]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let records: Vec<FileRecord> = serde_json::from_slice(&output)?;

    let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        [
            "calibration.json",
            "session_2024_03/pick_place_001.json",
            "session_2024_03/pick_place_002.json",
            "session_2024_04/handover/trial_a.json",
        ]
    );
    Ok(())
}

#[test]
fn summary_reports_keys_and_frames() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/bimanual_sample.json");

    let mut cmd = cargo_bin_cmd!("grip");
    cmd.args(["summary", "--input", &input]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let summary: RecordingSummary = serde_json::from_slice(&output)?;

    assert_eq!(summary.name, "bimanual_sample.json");
    assert_eq!(summary.key_count, 14);
    assert_eq!(summary.left_frames, Some(5));
    assert_eq!(summary.right_frames, Some(5));
    Ok(())
}

#[test]
fn tactile_frame_descriptor_carries_stats() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/bimanual_sample.json");

    let mut cmd = cargo_bin_cmd!("grip");
    cmd.args([
        "describe", "--input", &input, "--view", "tactile", "--side", "left", "--site",
        "finger_0", "--frame", "2",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();

    match serde_json::from_slice::<RenderDescriptor>(&output)? {
        RenderDescriptor::Heatmap1D {
            title,
            values,
            stats,
        } => {
            assert_eq!(title, "Left Finger 0 tactile, frame 2");
            let expected: Vec<f64> = (16..24).map(f64::from).collect();
            assert_eq!(values, expected);
            assert_close(stats.mean, 19.5, 1e-12);
            assert_close(stats.std, 5.25f64.sqrt(), 1e-12);
        }
        other => panic!("unexpected descriptor: {other:?}"),
    }
    Ok(())
}

#[test]
fn comparison_keeps_absent_site_as_empty_cell() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/bimanual_sample.json");

    let mut cmd = cargo_bin_cmd!("grip");
    cmd.args([
        "describe",
        "--input",
        &input,
        "--view",
        "comparison",
        "--side",
        "right",
        "--frame",
        "0",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();

    match serde_json::from_slice::<RenderDescriptor>(&output)? {
        RenderDescriptor::CompositeGrid { title, cells } => {
            assert_eq!(title, "Right tactile comparison, frame 0");
            let titles: Vec<&str> = cells.iter().map(|c| c.title.as_str()).collect();
            assert_eq!(titles, ["Finger 0", "Finger 1", "Finger 2", "Palm"]);
            assert!(cells[2].values.is_none(), "finger_2 records no sensors");
            let legends: Vec<bool> = cells.iter().map(|c| c.legend).collect();
            assert_eq!(legends, [false, false, false, true]);
        }
        other => panic!("unexpected descriptor: {other:?}"),
    }
    Ok(())
}

#[test]
fn export_round_trips_tactile_csv() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/bimanual_sample.json");
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("finger_0.csv");

    let mut cmd = cargo_bin_cmd!("grip");
    cmd.args([
        "export",
        "--input",
        &input,
        "--side",
        "left",
        "--site",
        "finger_0",
        "--out",
        out.to_str().expect("utf8 path"),
    ]);
    cmd.assert().success();

    let text = fs::read_to_string(&out)?;
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("sensor_0,sensor_1,sensor_2,sensor_3,sensor_4,sensor_5,sensor_6,sensor_7")
    );
    assert_eq!(lines.clone().count(), 5, "one row per frame");
    let frame_2 = lines.nth(2).expect("frame row");
    assert_eq!(frame_2, "16,17,18,19,20,21,22,23");
    Ok(())
}

#[test]
fn plot_writes_png_images() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/bimanual_sample.json");
    let dir = tempfile::tempdir()?;
    let lines_png = dir.path().join("wrist.png");
    let grid_png = dir.path().join("palm.png");

    let mut cmd = cargo_bin_cmd!("grip");
    cmd.args([
        "plot",
        "--input",
        &input,
        "--view",
        "wrist",
        "--side",
        "left",
        "--out",
        lines_png.to_str().expect("utf8 path"),
    ]);
    cmd.assert().success();

    let mut cmd = cargo_bin_cmd!("grip");
    cmd.args([
        "plot",
        "--input",
        &input,
        "--view",
        "tactile",
        "--side",
        "left",
        "--site",
        "palm",
        "--out",
        grid_png.to_str().expect("utf8 path"),
    ]);
    cmd.assert().success();

    for path in [&lines_png, &grid_png] {
        let bytes = fs::read(path)?;
        assert!(bytes.len() > 8, "png should not be empty");
        assert_eq!(bytes[..4], *b"\x89PNG");
    }
    Ok(())
}

fn assert_close(a: f64, b: f64, tol: f64) {
    let diff = (a - b).abs();
    assert!(
        diff <= tol,
        "diff {} exceeded tol {} ({} vs {})",
        diff,
        tol,
        a,
        b
    );
}

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .expect("crates dir")
        .parent()
        .expect("workspace root")
        .to_path_buf()
}

fn sample_path(relative: &str) -> String {
    workspace_root()
        .join(relative)
        .to_string_lossy()
        .to_string()
}
