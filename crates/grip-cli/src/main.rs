use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use grip_lib::{
    frame::SensorFrame,
    render::{
        finite_bounds, heat_rgb, render_all_tactile_comparison, render_joint_states,
        render_tactile, render_wrist_pose, RenderDescriptor, Renderer, TactileCell,
    },
    storage::{list_all, LocalDirStore},
    tree::{FolderTree, NodeId},
    Side, TactileSite,
};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "grip",
    version,
    about = "GRIP: grasp recording inspection tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SideArg {
    Left,
    Right,
}

impl SideArg {
    fn side(self) -> Side {
        match self {
            SideArg::Left => Side::Left,
            SideArg::Right => Side::Right,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SiteArg {
    #[value(name = "finger_0")]
    Finger0,
    #[value(name = "finger_1")]
    Finger1,
    #[value(name = "finger_2")]
    Finger2,
    Palm,
}

impl SiteArg {
    fn site(self) -> TactileSite {
        match self {
            SiteArg::Finger0 => TactileSite::Finger0,
            SiteArg::Finger1 => TactileSite::Finger1,
            SiteArg::Finger2 => TactileSite::Finger2,
            SiteArg::Palm => TactileSite::Palm,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ViewArg {
    Wrist,
    Joints,
    Tactile,
    Comparison,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ListFormat {
    Tree,
    Paths,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List recordings under a directory as a tree, flat paths, or JSON records
    List {
        #[arg(long)]
        root: PathBuf,
        #[arg(long, default_value = "tree")]
        format: ListFormat,
    },
    /// Print shape facts for one recording: key count and per-hand frame counts
    Summary {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Build a view descriptor for one recording and print it as JSON
    Describe {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value = "wrist")]
        view: ViewArg,
        #[arg(long, default_value = "left")]
        side: SideArg,
        #[arg(long, default_value = "finger_0")]
        site: SiteArg,
        #[arg(long)]
        frame: Option<usize>,
    },
    /// Export one tactile matrix as CSV, one frame per row
    Export {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value = "left")]
        side: SideArg,
        #[arg(long, default_value = "finger_0")]
        site: SiteArg,
        #[arg(long)]
        out: PathBuf,
    },
    /// Render a view to a PNG via plotters
    Plot {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value = "wrist")]
        view: ViewArg,
        #[arg(long, default_value = "left")]
        side: SideArg,
        #[arg(long, default_value = "finger_0")]
        site: SiteArg,
        #[arg(long)]
        frame: Option<usize>,
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::List { root, format } => cmd_list(&root, format)?,
        Commands::Summary { input } => cmd_summary(input.as_deref())?,
        Commands::Describe {
            input,
            view,
            side,
            site,
            frame,
        } => cmd_describe(input.as_deref(), view, side, site, frame)?,
        Commands::Export {
            input,
            side,
            site,
            out,
        } => cmd_export(input.as_deref(), side, site, &out)?,
        Commands::Plot {
            input,
            view,
            side,
            site,
            frame,
            out,
        } => cmd_plot(input.as_deref(), view, side, site, frame, &out)?,
    }
    Ok(())
}

fn load_recording(input: Option<&Path>) -> Result<SensorFrame> {
    let bytes = match input {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?
        }
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };
    Ok(SensorFrame::from_slice(&bytes)?)
}

fn describe(
    recording: &SensorFrame,
    view: ViewArg,
    side: Side,
    site: TactileSite,
    frame: Option<usize>,
) -> Result<RenderDescriptor> {
    Ok(match view {
        ViewArg::Wrist => render_wrist_pose(recording, side, frame)?,
        ViewArg::Joints => render_joint_states(recording, side, frame)?,
        ViewArg::Tactile => render_tactile(recording, side, site, frame)?,
        ViewArg::Comparison => render_all_tactile_comparison(recording, side, frame)?,
    })
}

fn cmd_list(root: &Path, format: ListFormat) -> Result<()> {
    let store = LocalDirStore::new(root);
    let records = list_all(&store, store.root_id())?;
    let tree = FolderTree::build(&records)?;
    match format {
        ListFormat::Json => println!("{}", serde_json::to_string(&records)?),
        ListFormat::Paths => {
            for record in tree.flatten() {
                println!("{}", record.path);
            }
        }
        ListFormat::Tree => print_folder(&tree, NodeId::ROOT, 0),
    }
    Ok(())
}

fn print_folder(tree: &FolderTree, id: NodeId, depth: usize) {
    let node = tree.node(id);
    let indent = "  ".repeat(depth);
    for record in &node.files {
        println!("{indent}{}", record.name);
    }
    for (segment, &child) in &node.children {
        println!("{indent}{segment}/ ({} files)", tree.count_files(child));
        print_folder(tree, child, depth + 1);
    }
}

fn cmd_summary(input: Option<&Path>) -> Result<()> {
    let recording = load_recording(input)?;
    let name = input
        .and_then(|path| path.file_name())
        .and_then(|name| name.to_str())
        .unwrap_or("recording");
    let summary = recording.summary(name);
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_describe(
    input: Option<&Path>,
    view: ViewArg,
    side: SideArg,
    site: SiteArg,
    frame: Option<usize>,
) -> Result<()> {
    let recording = load_recording(input)?;
    let descriptor = describe(&recording, view, side.side(), site.site(), frame)?;
    println!("{}", serde_json::to_string(&descriptor)?);
    Ok(())
}

fn cmd_export(input: Option<&Path>, side: SideArg, site: SiteArg, out: &Path) -> Result<()> {
    let recording = load_recording(input)?;
    let matrix = recording.tactile(side.side(), site.site())?;
    if matrix.is_empty() {
        bail!(
            "no tactile data recorded for {} {}",
            side.side().label(),
            site.site().label()
        );
    }
    let mut writer =
        csv::Writer::from_path(out).with_context(|| format!("creating {}", out.display()))?;
    let header: Vec<String> = (0..matrix.cols()).map(|s| format!("sensor_{s}")).collect();
    writer.write_record(&header)?;
    for row in 0..matrix.rows() {
        let fields: Vec<String> = matrix.row(row).iter().map(|v| v.to_string()).collect();
        writer.write_record(&fields)?;
    }
    writer.flush()?;
    Ok(())
}

fn cmd_plot(
    input: Option<&Path>,
    view: ViewArg,
    side: SideArg,
    site: SiteArg,
    frame: Option<usize>,
    out: &Path,
) -> Result<()> {
    let recording = load_recording(input)?;
    let descriptor = describe(&recording, view, side.side(), site.site(), frame)?;
    let mut renderer = PngRenderer {
        out: out.to_path_buf(),
    };
    renderer.draw(&descriptor)
}

/// Plotters-backed PNG renderer for view descriptors.
struct PngRenderer {
    out: PathBuf,
}

impl Renderer for PngRenderer {
    fn draw(&mut self, descriptor: &RenderDescriptor) -> Result<()> {
        if let RenderDescriptor::Unavailable { reason } = descriptor {
            eprintln!("{reason}");
            return Ok(());
        }
        let backend = BitMapBackend::new(&self.out, (800, 480));
        let root = backend.into_drawing_area();
        root.fill(&WHITE)?;
        match descriptor {
            RenderDescriptor::TimeSeriesLines {
                title,
                labels,
                series,
            } => draw_lines(&root, title, labels, series)?,
            RenderDescriptor::FrameMetrics {
                title,
                labels,
                values,
            } => draw_bars(&root, title, labels, values)?,
            RenderDescriptor::Heatmap1D { title, values, .. } => {
                let (min, span) = heat_scale(values);
                draw_grid(&root, title, 1, values.len(), values, min, span)?;
            }
            RenderDescriptor::HeatmapGrid {
                title,
                rows,
                cols,
                values,
                ..
            } => {
                let (min, span) = heat_scale(values);
                draw_grid(&root, title, *rows, *cols, values, min, span)?;
            }
            RenderDescriptor::CompositeGrid { title, cells } => {
                draw_composite(&root, title, cells)?
            }
            RenderDescriptor::Unavailable { .. } => {}
        }
        root.present()?;
        Ok(())
    }
}

type Canvas<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

fn heat_scale(values: &[f64]) -> (f64, f64) {
    let (min, max) = finite_bounds(values.iter().copied());
    (min, (max - min).max(f64::EPSILON))
}

fn draw_lines(root: &Canvas, title: &str, labels: &[String], series: &[Vec<f64>]) -> Result<()> {
    let frames = series.iter().map(|values| values.len()).max().unwrap_or(0);
    let x_max = frames.saturating_sub(1).max(1) as f64;
    let (y_min, y_max) = finite_bounds(series.iter().flatten().copied());
    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(title, ("sans-serif", 24))
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)?;
    chart.configure_mesh().draw()?;
    for (index, values) in series.iter().enumerate() {
        let color = Palette99::pick(index).mix(0.9);
        chart
            .draw_series(LineSeries::new(
                values
                    .iter()
                    .enumerate()
                    .map(|(frame, value)| (frame as f64, *value)),
                color.stroke_width(2),
            ))?
            .label(
                labels
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| format!("series {index}")),
            )
            .legend(move |(x, y)| {
                Rectangle::new([(x, y - 4), (x + 12, y + 4)], color.filled())
            });
    }
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}

fn draw_bars(root: &Canvas, title: &str, labels: &[String], values: &[f64]) -> Result<()> {
    let (y_min, y_max) = finite_bounds(values.iter().copied());
    let y_min = y_min.min(0.0);
    let y_max = y_max.max(0.0);
    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(title, ("sans-serif", 24))
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(0..values.len() as i32, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_label_formatter(&|x| labels.get(*x as usize).cloned().unwrap_or_default())
        .draw()?;
    chart.draw_series(values.iter().enumerate().map(|(index, value)| {
        Rectangle::new(
            [(index as i32, 0.0), (index as i32 + 1, *value)],
            Palette99::pick(index).mix(0.6).filled(),
        )
    }))?;
    Ok(())
}

fn draw_grid(
    area: &Canvas,
    title: &str,
    rows: usize,
    cols: usize,
    values: &[f64],
    min: f64,
    span: f64,
) -> Result<()> {
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption(title, ("sans-serif", 24))
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(0..cols as i32, 0..rows as i32)?;
    chart.configure_mesh().disable_mesh().draw()?;
    chart.draw_series((0..rows * cols).map(|cell| {
        let row = cell / cols;
        let col = cell % cols;
        let [r, g, b] = heat_rgb((values[cell] - min) / span);
        Rectangle::new(
            [
                (col as i32, row as i32),
                (col as i32 + 1, row as i32 + 1),
            ],
            RGBColor(r, g, b).filled(),
        )
    }))?;
    Ok(())
}

fn draw_composite(root: &Canvas, title: &str, cells: &[TactileCell]) -> Result<()> {
    let root = root.titled(title, ("sans-serif", 24))?;
    // One scale across every site, so cells stay comparable.
    let shared: Vec<f64> = cells
        .iter()
        .flat_map(|cell| cell.values.iter().flatten().copied())
        .collect();
    let (min, span) = heat_scale(&shared);
    let areas = root.split_evenly((2, 2));
    for (cell, area) in cells.iter().zip(areas.iter()) {
        match &cell.values {
            Some(values) => draw_grid(area, &cell.title, 1, values.len(), values, min, span)?,
            None => {
                area.titled(&format!("{} (no data)", cell.title), ("sans-serif", 18))?;
            }
        }
    }
    Ok(())
}
