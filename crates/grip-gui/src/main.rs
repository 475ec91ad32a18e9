use eframe::{egui, egui::ViewportBuilder};
use egui_plot::{Legend, Line, Plot};
use grip_lib::config::Config;
use grip_lib::nav::{Generation, Intent, NavigationState};
use grip_lib::record::{FileRecord, Side, TactileSite, ViewMode};
use grip_lib::render::{finite_bounds, heat_rgb, RenderDescriptor, TactileCell, ValueStats};
use grip_lib::storage::{CachedStore, LocalDirStore};
use grip_lib::tree::FolderTree;
use rfd::FileDialog;
use std::sync::Arc;
use std::time::Duration;

fn main() -> eframe::Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: ViewportBuilder::default().with_inner_size([1100.0, 720.0]),
        ..Default::default()
    };
    eframe::run_native(
        "GRIP Recording Viewer",
        native_options,
        Box::new(|_cc| Ok(Box::<GripApp>::default())),
    )
}

#[derive(Copy, Clone, PartialEq)]
enum GuiTab {
    Wrist,
    Joints,
    Fingers,
    Palm,
    All,
}

impl GuiTab {
    fn title(&self) -> &'static str {
        match self {
            GuiTab::Wrist => "Wrist Pose",
            GuiTab::Joints => "Joint States",
            GuiTab::Fingers => "Fingers",
            GuiTab::Palm => "Palm",
            GuiTab::All => "All Sites",
        }
    }

    fn all() -> [GuiTab; 5] {
        [
            GuiTab::Wrist,
            GuiTab::Joints,
            GuiTab::Fingers,
            GuiTab::Palm,
            GuiTab::All,
        ]
    }
}

mod router;
mod store;

use router::{FetchRouter, FetchUpdate, SharedStore};
use store::ViewStore;

struct GripApp {
    views: FetchRouter,
    files: SharedStore,
    tree: FolderTree,
    nav: NavigationState,
    root: String,
    ttl: Duration,
    active_tab: GuiTab,
    status: String,
    pending: Option<Generation>,
    listing_pending: bool,
    access_hash: Option<String>,
    locked: bool,
    password_entry: String,
    gate_error: String,
}

impl Default for GripApp {
    fn default() -> Self {
        let config = Config::load(None).unwrap_or_default();
        let ttl = config.cache_ttl();
        let root = config.root.clone().unwrap_or_else(|| ".".to_string());
        let files: SharedStore = Arc::new(CachedStore::new(LocalDirStore::new(&root), ttl));
        let locked = config.access_hash.is_some();
        let mut app = GripApp {
            views: FetchRouter::new(ViewStore::new()),
            files,
            tree: FolderTree::build_lossy(&[]).0,
            nav: NavigationState::default(),
            root,
            ttl,
            active_tab: GuiTab::Wrist,
            status: "No listing yet".into(),
            pending: None,
            listing_pending: false,
            access_hash: config.access_hash,
            locked,
            password_entry: String::new(),
            gate_error: String::new(),
        };
        if !app.locked {
            app.relist();
        }
        app
    }
}

impl GripApp {
    fn relist(&mut self) {
        self.listing_pending = true;
        self.status = format!("Listing {}", self.root);
        self.views.relist(self.files.clone(), self.root.clone());
    }

    fn refresh(&mut self) {
        self.files.invalidate();
        self.relist();
    }

    fn pick_root(&mut self) {
        if let Some(path) = FileDialog::new().pick_folder() {
            self.set_root(path.display().to_string());
        }
    }

    fn set_root(&mut self, root: String) {
        self.root = root;
        self.files = Arc::new(CachedStore::new(LocalDirStore::new(&self.root), self.ttl));
        self.nav = self.nav.reset_to_root();
        self.views.clear();
        self.pending = None;
        self.relist();
    }

    fn try_unlock(&mut self) {
        let expected = match &self.access_hash {
            Some(hash) => hash.clone(),
            None => {
                self.locked = false;
                return;
            }
        };
        if grip_keys::verify_password(&self.password_entry, &expected) {
            self.locked = false;
            self.gate_error.clear();
            self.password_entry.clear();
            self.relist();
        } else {
            self.gate_error = "Password does not match the configured access hash".into();
        }
    }

    fn dispatch(&mut self, intent: Intent) {
        match self.nav.apply(intent, &self.tree) {
            Ok(next) => {
                let selection_changed = next.load_ticket() != self.nav.load_ticket();
                self.nav = next;
                if selection_changed {
                    self.begin_load();
                }
            }
            Err(err) => {
                // Integrity faults leave the navigator at the root.
                self.status = err.to_string();
                self.nav = self.nav.reset_to_root();
                self.views.clear();
            }
        }
    }

    fn begin_load(&mut self) {
        self.views.clear();
        match self.nav.selected() {
            Some(record) => {
                self.status = format!("Loading {}", record.name);
                let ticket = self.nav.load_ticket();
                self.pending = Some(ticket);
                self.views.fetch(self.files.clone(), ticket, record.clone());
            }
            None => self.pending = None,
        }
    }

    fn handle_update(&mut self, update: FetchUpdate) {
        match update {
            FetchUpdate::Listing { root, result } => {
                if root != self.root {
                    return; // superseded by a newer root choice
                }
                self.listing_pending = false;
                match result {
                    Ok(records) => {
                        let (tree, dropped) = FolderTree::build_lossy(&records);
                        self.status = if dropped.is_empty() {
                            format!("{} recordings under {}", tree.len(), self.root)
                        } else {
                            format!(
                                "{} recordings under {} ({} duplicate ids dropped)",
                                tree.len(),
                                self.root,
                                dropped.len()
                            )
                        };
                        self.tree = tree;
                        self.nav = self.nav.reset_to_root();
                        self.views.clear();
                        self.pending = None;
                    }
                    Err(err) => {
                        self.status = format!("Listing failed: {err}");
                    }
                }
            }
            FetchUpdate::Recording {
                ticket,
                name,
                result,
            } => {
                if self.pending == Some(ticket) {
                    self.pending = None;
                }
                match result {
                    Ok(frame) => {
                        let counts = frame.frame_counts();
                        let Some(next) = self.nav.apply_frame_counts(ticket, counts) else {
                            return; // superseded selection
                        };
                        self.nav = next;
                        self.status = if counts.mismatched() {
                            format!("Loaded {name} (left/right frame counts disagree)")
                        } else {
                            format!("Loaded {name}")
                        };
                        self.views.set_recording(frame);
                    }
                    Err(err) => {
                        if ticket == self.nav.load_ticket() {
                            self.status = format!("Load failed: {err}");
                            self.views.clear();
                        }
                    }
                }
            }
        }
    }

    fn sync_view_params(&mut self) {
        self.views.set_side(self.nav.side());
        self.views.set_frame_index(self.nav.frame_index());
    }

    fn current_listing(&self) -> (Vec<(String, usize)>, Vec<FileRecord>) {
        match self.tree.folder_at(self.nav.current_path()) {
            Ok(folder) => {
                let folders = folder
                    .children
                    .iter()
                    .map(|(segment, &id)| (segment.clone(), self.tree.count_files(id)))
                    .collect();
                (folders, folder.files.clone())
            }
            Err(_) => (Vec::new(), Vec::new()),
        }
    }

    fn show_gate(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(120.0);
                ui.heading("GRIP Recording Viewer");
                ui.label("This viewer is password protected.");
                ui.add_space(8.0);
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.password_entry)
                        .password(true)
                        .hint_text("Access password"),
                );
                let submitted =
                    response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                if ui.button("Unlock").clicked() || submitted {
                    self.try_unlock();
                }
                if !self.gate_error.is_empty() {
                    ui.colored_label(egui::Color32::LIGHT_RED, &self.gate_error);
                }
            });
        });
    }

    fn show_navigator(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("navigator")
            .min_width(280.0)
            .show(ctx, |ui| {
                ui.heading("Recordings");
                ui.horizontal(|ui| {
                    ui.label("Root:");
                    ui.monospace(&self.root);
                });
                ui.horizontal(|ui| {
                    if ui.button("Choose folder").clicked() {
                        self.pick_root();
                    }
                    if ui.button("Refresh").clicked() {
                        self.refresh();
                    }
                });

                ui.separator();
                ui.label(self.nav.breadcrumb());
                if ui
                    .add_enabled(
                        !self.nav.current_path().is_empty(),
                        egui::Button::new("Back"),
                    )
                    .clicked()
                {
                    self.dispatch(Intent::GoBack);
                }

                let (folders, files_here) = self.current_listing();
                for (segment, count) in &folders {
                    if ui.button(format!("{segment}/  ({count} files)")).clicked() {
                        self.dispatch(Intent::EnterFolder(segment.clone()));
                    }
                }
                for record in &files_here {
                    let selected = self
                        .nav
                        .selected()
                        .map(|r| r.id == record.id)
                        .unwrap_or(false);
                    if ui.selectable_label(selected, &record.name).clicked() {
                        self.dispatch(Intent::SelectFile(record.clone()));
                    }
                }
                if folders.is_empty() && files_here.is_empty() {
                    ui.label("No recordings in this folder");
                }

                ui.separator();
                let position = self.nav.listing_position(&self.tree);
                ui.horizontal(|ui| {
                    let at_start = matches!(position, Some((0, _)));
                    let at_end = matches!(position, Some((i, n)) if i + 1 >= n);
                    if ui
                        .add_enabled(position.is_some() && !at_start, egui::Button::new("Previous"))
                        .clicked()
                    {
                        self.dispatch(Intent::SelectRelative(-1));
                    }
                    if ui
                        .add_enabled(position.is_some() && !at_end, egui::Button::new("Next"))
                        .clicked()
                    {
                        self.dispatch(Intent::SelectRelative(1));
                    }
                    if let Some((index, len)) = position {
                        ui.label(format!("File {} / {}", index + 1, len));
                    }
                });

                ui.separator();
                ui.horizontal(|ui| {
                    ui.label("Side");
                    for side in Side::BOTH {
                        if ui
                            .selectable_label(self.nav.side() == side, side.label())
                            .clicked()
                        {
                            self.dispatch(Intent::SetSide(side));
                        }
                    }
                });
                ui.horizontal(|ui| {
                    ui.label("Mode");
                    for mode in [ViewMode::TimeSeries, ViewMode::SingleFrame] {
                        if ui
                            .selectable_label(self.nav.mode() == mode, mode.label())
                            .clicked()
                        {
                            self.dispatch(Intent::SetMode(mode));
                        }
                    }
                });
                ui.horizontal(|ui| {
                    ui.label("Finger");
                    for site in [
                        TactileSite::Finger0,
                        TactileSite::Finger1,
                        TactileSite::Finger2,
                    ] {
                        if ui
                            .selectable_label(self.views.finger() == site, site.label())
                            .clicked()
                        {
                            self.views.set_finger(site);
                        }
                    }
                });
                if self.nav.mode() == ViewMode::SingleFrame {
                    if let Some(bound) = self
                        .nav
                        .counts()
                        .and_then(|c| c.bound())
                        .filter(|&bound| bound > 0)
                    {
                        let mut index = self.nav.frame_index().unwrap_or(0).min(bound - 1);
                        let slider =
                            ui.add(egui::Slider::new(&mut index, 0..=bound - 1).text("Frame"));
                        if slider.changed() {
                            self.dispatch(Intent::SetFrameIndex(index));
                        }
                    }
                }

                ui.separator();
                if let Some(frame) = self.views.recording() {
                    let counts = frame.frame_counts();
                    ui.label(format!("{} top-level keys", frame.key_count()));
                    ui.label(format!("Left: {}", frames_text(counts.left)));
                    ui.label(format!("Right: {}", frames_text(counts.right)));
                    ui.separator();
                }
                ui.label(format!("Status: {}", self.status));
            });
    }

    fn show_view(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.views.recording().is_none() {
                let hint = if self.pending.is_some() {
                    "Loading recording..."
                } else if self.listing_pending {
                    "Listing recordings..."
                } else {
                    "Select a recording in the navigator."
                };
                ui.centered_and_justified(|ui| {
                    ui.label(hint);
                });
                return;
            }
            match self.views.descriptor(self.active_tab) {
                Some(descriptor) => show_descriptor(ui, descriptor),
                None => {
                    ui.centered_and_justified(|ui| {
                        ui.label("Preparing view...");
                    });
                }
            }
        });
    }
}

impl eframe::App for GripApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.locked {
            self.show_gate(ctx);
            return;
        }

        for update in self.views.poll() {
            self.handle_update(update);
        }
        if self.pending.is_some() || self.listing_pending {
            // Worker completions arrive without user input; keep polling.
            ctx.request_repaint_after(Duration::from_millis(120));
        }

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.vertical(|ui| {
                ui.heading("GRIP — Grasp Recording Viewer");
                ui.label("Browse recording folders and inspect wrist, joint, and tactile streams.");
                ui.horizontal(|ui| {
                    for tab in GuiTab::all() {
                        let selected = self.active_tab == tab;
                        if ui.selectable_label(selected, tab.title()).clicked() {
                            self.active_tab = tab;
                        }
                    }
                });
            });
        });

        egui::TopBottomPanel::bottom("bottom").show(ctx, |ui| {
            ui.horizontal(|ui| match self.active_tab {
                GuiTab::Wrist => ui.label("Wrist pose: position and orientation per frame."),
                GuiTab::Joints => ui.label("Joint states: one angle trace per joint."),
                GuiTab::Fingers => ui.label("Fingertip tactile array for the chosen finger."),
                GuiTab::Palm => ui.label("Palm tactile array."),
                GuiTab::All => ui.label("All tactile sites side by side at one frame."),
            });
        });

        self.show_navigator(ctx);
        self.sync_view_params();
        self.views.prepare(self.active_tab);
        self.show_view(ctx);
    }
}

fn show_descriptor(ui: &mut egui::Ui, descriptor: &RenderDescriptor) {
    match descriptor {
        RenderDescriptor::TimeSeriesLines {
            title,
            labels,
            series,
        } => show_series(ui, title, labels, series),
        RenderDescriptor::FrameMetrics {
            title,
            labels,
            values,
        } => {
            ui.heading(title);
            for (label, value) in labels.iter().zip(values) {
                ui.monospace(format!("{label:>4}  {value:+.4}"));
            }
        }
        RenderDescriptor::Heatmap1D {
            title,
            values,
            stats,
        } => {
            ui.heading(title);
            let (min, span) = heat_span(values);
            paint_heat_row(ui, values, min, span);
            show_stats(ui, stats);
            ui.label(format!("{} sensors", values.len()));
        }
        RenderDescriptor::HeatmapGrid {
            title,
            rows,
            cols,
            values,
            summary,
        } => {
            ui.heading(title);
            let (min, span) = heat_span(values);
            paint_heat_grid(ui, *rows, *cols, values, min, span);
            ui.label(format!(
                "{} sensors × {} frames ({} points)",
                summary.sensor_count, summary.frame_count, summary.total_points
            ));
        }
        RenderDescriptor::CompositeGrid { title, cells } => show_composite(ui, title, cells),
        RenderDescriptor::Unavailable { reason } => {
            ui.centered_and_justified(|ui| {
                ui.colored_label(egui::Color32::YELLOW, reason);
            });
        }
    }
}

fn show_series(ui: &mut egui::Ui, title: &str, labels: &[String], series: &[Vec<f64>]) {
    ui.heading(title);
    Plot::new("series_plot")
        .height(420.0)
        .legend(Legend::default())
        .show(ui, |plot_ui| {
            for (index, (label, values)) in labels.iter().zip(series).enumerate() {
                let points: Vec<[f64; 2]> = values
                    .iter()
                    .enumerate()
                    .map(|(frame, &value)| [frame as f64, value])
                    .collect();
                plot_ui.line(
                    Line::new(points)
                        .stroke(egui::Stroke::new(1.5, series_color(index)))
                        .name(label),
                );
            }
        });
}

fn show_stats(ui: &mut egui::Ui, stats: &ValueStats) {
    ui.monospace(format!("min  {:+.4}   max {:+.4}", stats.min, stats.max));
    ui.monospace(format!("mean {:+.4}   std {:.4}", stats.mean, stats.std));
}

fn show_composite(ui: &mut egui::Ui, title: &str, cells: &[TactileCell]) {
    ui.heading(title);
    // One scale across every site, so cells stay comparable.
    let (min, max) = finite_bounds(
        cells
            .iter()
            .filter_map(|cell| cell.values.as_ref())
            .flat_map(|values| values.iter().copied()),
    );
    let span = (max - min).max(f64::EPSILON);
    for pair in cells.chunks(2) {
        ui.columns(2, |columns| {
            for (column, cell) in columns.iter_mut().zip(pair) {
                column.group(|ui| {
                    ui.label(&cell.title);
                    match &cell.values {
                        Some(values) => {
                            paint_heat_row(ui, values, min, span);
                            if cell.legend {
                                paint_heat_legend(ui, min, max);
                            }
                        }
                        None => {
                            ui.colored_label(egui::Color32::GRAY, "No data");
                        }
                    }
                });
            }
        });
    }
}

fn paint_heat_row(ui: &mut egui::Ui, values: &[f64], min: f64, span: f64) {
    if values.is_empty() {
        return;
    }
    let avail = ui.available_width();
    let cell = (avail / values.len() as f32).clamp(4.0, 32.0);
    let height = 36.0;
    let (response, painter) = ui.allocate_painter(
        egui::vec2(cell * values.len() as f32, height),
        egui::Sense::hover(),
    );
    let origin = response.rect.min;
    for (index, &value) in values.iter().enumerate() {
        let [r, g, b] = heat_rgb((value - min) / span);
        let rect = egui::Rect::from_min_size(
            origin + egui::vec2(index as f32 * cell, 0.0),
            egui::vec2(cell, height),
        );
        painter.rect_filled(rect.shrink(0.5), 2.0, egui::Color32::from_rgb(r, g, b));
    }
}

fn paint_heat_grid(
    ui: &mut egui::Ui,
    rows: usize,
    cols: usize,
    values: &[f64],
    min: f64,
    span: f64,
) {
    if rows == 0 || cols == 0 {
        return;
    }
    let avail = ui.available_width();
    let cell_w = (avail / cols as f32).clamp(2.0, 28.0);
    let cell_h = (360.0 / rows as f32).clamp(4.0, 28.0);
    let (response, painter) = ui.allocate_painter(
        egui::vec2(cell_w * cols as f32, cell_h * rows as f32),
        egui::Sense::hover(),
    );
    let origin = response.rect.min;
    for row in 0..rows {
        for col in 0..cols {
            let [r, g, b] = heat_rgb((values[row * cols + col] - min) / span);
            let rect = egui::Rect::from_min_size(
                origin + egui::vec2(col as f32 * cell_w, row as f32 * cell_h),
                egui::vec2(cell_w, cell_h),
            );
            painter.rect_filled(rect.shrink(0.25), 0.0, egui::Color32::from_rgb(r, g, b));
        }
    }
}

fn paint_heat_legend(ui: &mut egui::Ui, min: f64, max: f64) {
    ui.horizontal(|ui| {
        ui.monospace(format!("{min:+.2}"));
        let (response, painter) =
            ui.allocate_painter(egui::vec2(140.0, 12.0), egui::Sense::hover());
        let rect = response.rect;
        let steps = 48;
        let step_w = rect.width() / steps as f32;
        for step in 0..steps {
            let [r, g, b] = heat_rgb(step as f64 / (steps - 1) as f64);
            let slice = egui::Rect::from_min_size(
                rect.min + egui::vec2(step as f32 * step_w, 0.0),
                egui::vec2(step_w + 0.5, rect.height()),
            );
            painter.rect_filled(slice, 0.0, egui::Color32::from_rgb(r, g, b));
        }
        ui.monospace(format!("{max:+.2}"));
    });
}

const SERIES_COLORS: [egui::Color32; 7] = [
    egui::Color32::from_rgb(0x1f, 0x77, 0xb4),
    egui::Color32::from_rgb(0xff, 0x7f, 0x0e),
    egui::Color32::from_rgb(0x2c, 0xa0, 0x2c),
    egui::Color32::from_rgb(0xd6, 0x27, 0x28),
    egui::Color32::from_rgb(0x94, 0x67, 0xbd),
    egui::Color32::from_rgb(0x17, 0xbe, 0xcf),
    egui::Color32::from_rgb(0x7f, 0x7f, 0x7f),
];

fn series_color(index: usize) -> egui::Color32 {
    SERIES_COLORS[index % SERIES_COLORS.len()]
}

fn heat_span(values: &[f64]) -> (f64, f64) {
    let (min, max) = finite_bounds(values.iter().copied());
    (min, (max - min).max(f64::EPSILON))
}

fn frames_text(frames: Option<usize>) -> String {
    match frames {
        Some(count) => format!("{count} frames"),
        None => "missing".to_string(),
    }
}
