use std::{
    io::{self, Stdout},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use grip_lib::{
    config::Config,
    frame::SensorFrame,
    nav::{Intent, NavigationState},
    render::{
        finite_bounds, render_all_tactile_comparison, render_joint_states, render_tactile,
        render_wrist_pose, RenderDescriptor, TactileCell,
    },
    storage::{CachedStore, LocalDirStore},
    tree::{FolderTree, NodeId},
    FileRecord, Side, TactileSite, ViewMode,
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    prelude::CrosstermBackend,
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Chart, Dataset, GraphType, List, ListItem, ListState, Paragraph,
        Tabs, Wrap,
    },
    Frame, Terminal,
};

/// Listing id of the store root for a `LocalDirStore`.
const ROOT_FOLDER: &str = "";

fn main() -> Result<()> {
    let config = Config::load(None)?;
    let root = std::env::args()
        .nth(1)
        .or_else(|| config.root.clone())
        .unwrap_or_else(|| ".".to_string());
    let store = CachedStore::new(LocalDirStore::new(&root), config.cache_ttl());
    let records = store
        .list_all(ROOT_FOLDER)
        .with_context(|| format!("listing recordings under {root}"))?;
    let tree = FolderTree::build(&records)?;
    let mut app = App::new(store, tree, root);

    let mut terminal = setup_terminal()?;
    let tick_rate = Duration::from_millis(150);
    let mut last_tick = Instant::now();

    while !app.should_quit {
        terminal.draw(|f| draw(f, &mut app))?;
        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }

    restore_terminal()?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("initializing terminal")
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Tab {
    Browse,
    Wrist,
    Joints,
    Tactile,
    Compare,
}

impl Tab {
    fn title(&self) -> &'static str {
        match self {
            Tab::Browse => "Browse",
            Tab::Wrist => "Wrist pose",
            Tab::Joints => "Joints",
            Tab::Tactile => "Tactile",
            Tab::Compare => "Compare",
        }
    }

    fn all() -> [Tab; 5] {
        [Tab::Browse, Tab::Wrist, Tab::Joints, Tab::Tactile, Tab::Compare]
    }

    fn next(self) -> Self {
        match self {
            Tab::Browse => Tab::Wrist,
            Tab::Wrist => Tab::Joints,
            Tab::Joints => Tab::Tactile,
            Tab::Tactile => Tab::Compare,
            Tab::Compare => Tab::Browse,
        }
    }

    fn prev(self) -> Self {
        match self {
            Tab::Browse => Tab::Compare,
            Tab::Wrist => Tab::Browse,
            Tab::Joints => Tab::Wrist,
            Tab::Tactile => Tab::Joints,
            Tab::Compare => Tab::Tactile,
        }
    }

    fn index(self) -> usize {
        match self {
            Tab::Browse => 0,
            Tab::Wrist => 1,
            Tab::Joints => 2,
            Tab::Tactile => 3,
            Tab::Compare => 4,
        }
    }
}

/// One line of the tree-style navigator listing.
enum Row {
    Folder {
        path: String,
        name: String,
        depth: usize,
        expanded: bool,
        files: usize,
    },
    File {
        record: FileRecord,
        parent: Vec<String>,
        depth: usize,
    },
}

struct App {
    store: CachedStore<LocalDirStore>,
    tree: FolderTree,
    nav: NavigationState,
    tab: Tab,
    site: TactileSite,
    cursor: usize,
    list_state: ListState,
    recording: Option<SensorFrame>,
    root_label: String,
    status: String,
    should_quit: bool,
}

impl App {
    fn new(store: CachedStore<LocalDirStore>, tree: FolderTree, root_label: String) -> App {
        let status = format!("{} recordings. Enter expands a folder or opens a file.", tree.len());
        App {
            store,
            tree,
            nav: NavigationState::default(),
            tab: Tab::Browse,
            site: TactileSite::Finger0,
            cursor: 0,
            list_state: ListState::default(),
            recording: None,
            root_label,
            status,
            should_quit: false,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Left => self.tab = self.tab.prev(),
            KeyCode::Right => self.tab = self.tab.next(),
            KeyCode::Char('1') => self.tab = Tab::Browse,
            KeyCode::Char('2') => self.tab = Tab::Wrist,
            KeyCode::Char('3') => self.tab = Tab::Joints,
            KeyCode::Char('4') => self.tab = Tab::Tactile,
            KeyCode::Char('5') => self.tab = Tab::Compare,
            KeyCode::Up => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down => {
                let rows = self.visible_rows();
                self.cursor = (self.cursor + 1).min(rows.len().saturating_sub(1));
            }
            KeyCode::Enter => self.activate_cursor(),
            KeyCode::Backspace => self.dispatch(Intent::GoBack),
            KeyCode::Char('[') => self.dispatch(Intent::SelectRelative(-1)),
            KeyCode::Char(']') => self.dispatch(Intent::SelectRelative(1)),
            KeyCode::Char('s') => {
                let side = match self.nav.side() {
                    Side::Left => Side::Right,
                    Side::Right => Side::Left,
                };
                self.dispatch(Intent::SetSide(side));
            }
            KeyCode::Char('m') => {
                let mode = match self.nav.mode() {
                    ViewMode::TimeSeries => ViewMode::SingleFrame,
                    ViewMode::SingleFrame => ViewMode::TimeSeries,
                };
                self.dispatch(Intent::SetMode(mode));
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                if let Some(index) = self.nav.frame_index() {
                    self.dispatch(Intent::SetFrameIndex(index + 1));
                }
            }
            KeyCode::Char('-') => {
                if let Some(index) = self.nav.frame_index() {
                    self.dispatch(Intent::SetFrameIndex(index.saturating_sub(1)));
                }
            }
            KeyCode::Char('f') => {
                let sites = TactileSite::ALL;
                let index = sites.iter().position(|s| *s == self.site).unwrap_or(0);
                self.site = sites[(index + 1) % sites.len()];
                self.status = format!("Tactile site: {}", self.site.label());
            }
            KeyCode::Char('r') => self.refresh(),
            _ => {}
        }
    }

    /// Tree listing with expanded folders inlined, the order the cursor
    /// moves through.
    fn visible_rows(&self) -> Vec<Row> {
        fn push(
            tree: &FolderTree,
            nav: &NavigationState,
            id: NodeId,
            path: &mut Vec<String>,
            rows: &mut Vec<Row>,
        ) {
            let node = tree.node(id);
            for (segment, &child) in &node.children {
                let full = if path.is_empty() {
                    segment.clone()
                } else {
                    format!("{}/{}", path.join("/"), segment)
                };
                let expanded = nav.is_expanded(&full);
                rows.push(Row::Folder {
                    path: full,
                    name: segment.clone(),
                    depth: path.len(),
                    expanded,
                    files: tree.count_files(child),
                });
                if expanded {
                    path.push(segment.clone());
                    push(tree, nav, child, path, rows);
                    path.pop();
                }
            }
            for record in &node.files {
                rows.push(Row::File {
                    record: record.clone(),
                    parent: path.clone(),
                    depth: path.len(),
                });
            }
        }

        let mut rows = Vec::new();
        push(&self.tree, &self.nav, NodeId::ROOT, &mut Vec::new(), &mut rows);
        rows
    }

    fn activate_cursor(&mut self) {
        let rows = self.visible_rows();
        match rows.into_iter().nth(self.cursor) {
            Some(Row::Folder { path, .. }) => self.dispatch(Intent::ToggleExpand(path)),
            Some(Row::File { record, parent, .. }) => self.open_file(&parent, record),
            None => {}
        }
    }

    /// Jumps the navigator to the file's folder and selects it, so prev/next
    /// afterwards walk that folder's listing.
    fn open_file(&mut self, parent: &[String], record: FileRecord) {
        let stepped = (|| -> grip_lib::Result<NavigationState> {
            let mut state = self.nav.reset_to_root();
            for segment in parent {
                state = state.apply(Intent::EnterFolder(segment.clone()), &self.tree)?;
            }
            state.apply(Intent::SelectFile(record), &self.tree)
        })();
        match stepped {
            Ok(next) => {
                self.nav = next;
                self.load_selection();
            }
            Err(err) => {
                self.status = format!("Error: {err}");
                self.nav = self.nav.reset_to_root();
            }
        }
    }

    fn dispatch(&mut self, intent: Intent) {
        match self.nav.apply(intent, &self.tree) {
            Ok(next) => {
                let selection_changed = next.load_ticket() != self.nav.load_ticket();
                self.nav = next;
                if selection_changed {
                    self.load_selection();
                }
            }
            Err(err) => {
                // Path integrity faults leave the navigator at the root.
                self.status = format!("Error: {err}");
                self.nav = self.nav.reset_to_root();
            }
        }
    }

    fn load_selection(&mut self) {
        self.recording = None;
        let Some(record) = self.nav.selected().cloned() else {
            return;
        };
        let ticket = self.nav.load_ticket();
        let loaded = (|| -> grip_lib::Result<SensorFrame> {
            let bytes = self.store.download(&record.id)?;
            SensorFrame::from_slice(&bytes)
        })();
        match loaded {
            Ok(frame) => {
                if let Some(next) = self.nav.apply_frame_counts(ticket, frame.frame_counts()) {
                    self.nav = next;
                    self.recording = Some(frame);
                    self.status = format!("Loaded {}", record.path);
                }
            }
            Err(err) => self.status = format!("Error: {err}"),
        }
    }

    fn refresh(&mut self) {
        self.store.invalidate();
        let result = (|| -> Result<FolderTree> {
            let records = self.store.list_all(ROOT_FOLDER)?;
            Ok(FolderTree::build(&records)?)
        })();
        match result {
            Ok(tree) => {
                self.tree = tree;
                self.nav = self.nav.reset_to_root();
                self.recording = None;
                self.cursor = 0;
                self.status = format!("Listing refreshed ({} recordings)", self.tree.len());
            }
            Err(err) => self.status = format!("Error: {err}"),
        }
    }
}

fn draw(f: &mut Frame, app: &mut App) {
    let size = f.size();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(size);
    draw_tabs(f, layout[0], app);
    match app.tab {
        Tab::Browse => draw_browse(f, layout[1], app),
        _ => draw_view(f, layout[1], app),
    }
    draw_status(f, layout[2], app);
}

fn draw_tabs(f: &mut Frame, area: Rect, app: &App) {
    let titles: Vec<Line> = Tab::all().iter().map(|t| Line::from(t.title())).collect();
    let tabs = Tabs::new(titles)
        .select(app.tab.index())
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("GRIP TUI (ratatui) — {}", app.root_label)),
        );
    f.render_widget(tabs, area);
}

fn draw_browse(f: &mut Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(42), Constraint::Min(0)])
        .split(area);

    let rows = app.visible_rows();
    app.cursor = app.cursor.min(rows.len().saturating_sub(1));
    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| match row {
            Row::Folder {
                name,
                depth,
                expanded,
                files,
                ..
            } => {
                let arrow = if *expanded { "▾" } else { "▸" };
                ListItem::new(Line::from(format!(
                    "{}{arrow} {name}/ ({files} files)",
                    "  ".repeat(*depth)
                )))
            }
            Row::File { record, depth, .. } => {
                let text = format!("{}  {}", "  ".repeat(*depth), record.name);
                let selected = app
                    .nav
                    .selected()
                    .map_or(false, |current| current.id == record.id);
                if selected {
                    ListItem::new(Line::from(Span::styled(
                        text,
                        Style::default().fg(Color::Green),
                    )))
                } else {
                    ListItem::new(Line::from(text))
                }
            }
        })
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Recordings"))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    if rows.is_empty() {
        app.list_state.select(None);
    } else {
        app.list_state.select(Some(app.cursor));
    }
    f.render_stateful_widget(list, chunks[0], &mut app.list_state);

    draw_detail(f, chunks[1], app);
}

fn draw_detail(f: &mut Frame, area: Rect, app: &App) {
    let mut lines = vec![Line::from(app.nav.breadcrumb())];
    match app.nav.selected() {
        Some(record) => {
            lines.push(Line::from(record.path.clone()));
            if let Some((index, len)) = app.nav.listing_position(&app.tree) {
                lines.push(Line::from(format!("File {} / {}", index + 1, len)));
            }
            if let Some(recording) = &app.recording {
                let summary = recording.summary(&record.name);
                lines.push(Line::from(format!(
                    "{} keys | left {} | right {}",
                    summary.key_count,
                    frames_text(summary.left_frames),
                    frames_text(summary.right_frames)
                )));
            }
        }
        None => lines.push(Line::from("No recording selected.")),
    }
    lines.push(Line::from(""));
    lines.push(Line::from(format!("Side: {}", app.nav.side().label())));
    lines.push(Line::from(format!("Mode: {}", app.nav.mode().label())));
    lines.push(Line::from(format!("Tactile site: {}", app.site.label())));
    if let Some(index) = app.nav.frame_index() {
        match app.nav.counts().and_then(|c| c.bound()) {
            Some(bound) => lines.push(Line::from(format!("Frame: {} / {}", index + 1, bound))),
            None => lines.push(Line::from(format!("Frame: {}", index + 1))),
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from("↑/↓ move · Enter expand or open · Backspace up"));
    lines.push(Line::from("[ / ] prev/next file · s side · m mode"));
    lines.push(Line::from("+/- frame · f tactile site · r refresh · q quit"));
    let detail = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Selection"));
    f.render_widget(detail, area);
}

fn draw_view(f: &mut Frame, area: Rect, app: &App) {
    let Some(recording) = app.recording.as_ref() else {
        let hint = Paragraph::new("Select a recording in the Browse tab first.")
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(app.tab.title()));
        f.render_widget(hint, area);
        return;
    };
    let descriptor = match app.tab {
        Tab::Wrist => render_wrist_pose(recording, app.nav.side(), app.nav.frame_index()),
        Tab::Joints => render_joint_states(recording, app.nav.side(), app.nav.frame_index()),
        Tab::Tactile => render_tactile(recording, app.nav.side(), app.site, app.nav.frame_index()),
        Tab::Compare => {
            render_all_tactile_comparison(recording, app.nav.side(), app.nav.frame_index())
        }
        Tab::Browse => return,
    };
    match descriptor {
        Ok(descriptor) => draw_descriptor(f, area, &descriptor),
        Err(err) => {
            let message = Paragraph::new(Line::from(Span::styled(
                err.to_string(),
                Style::default().fg(Color::Red),
            )))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(app.tab.title()));
            f.render_widget(message, area);
        }
    }
}

fn draw_descriptor(f: &mut Frame, area: Rect, descriptor: &RenderDescriptor) {
    match descriptor {
        RenderDescriptor::TimeSeriesLines {
            title,
            labels,
            series,
        } => draw_series_chart(f, area, title, labels, series),
        RenderDescriptor::FrameMetrics {
            title,
            labels,
            values,
        } => {
            let lines: Vec<Line> = labels
                .iter()
                .zip(values)
                .map(|(label, value)| Line::from(format!("{label:>8}  {value:+.4}")))
                .collect();
            let body = Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title(title.clone()));
            f.render_widget(body, area);
        }
        RenderDescriptor::Heatmap1D {
            title,
            values,
            stats,
        } => {
            let (min, span) = heat_span(values);
            let lines = vec![
                Line::from(shade_row(values, min, span)),
                Line::from(""),
                Line::from(format!("min {:.3}   max {:.3}", stats.min, stats.max)),
                Line::from(format!("mean {:.3}   std {:.3}", stats.mean, stats.std)),
                Line::from(format!("{} sensors", values.len())),
            ];
            let body = Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title(title.clone()));
            f.render_widget(body, area);
        }
        RenderDescriptor::HeatmapGrid {
            title,
            rows,
            cols,
            values,
            summary,
        } => {
            let (min, span) = heat_span(values);
            let mut lines = vec![Line::from(format!(
                "{} sensors × {} frames ({} points)",
                summary.sensor_count, summary.frame_count, summary.total_points
            ))];
            for row in 0..*rows {
                let slice = &values[row * cols..(row + 1) * cols];
                lines.push(Line::from(format!("{row:>3} {}", shade_row(slice, min, span))));
            }
            let body = Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title(title.clone()));
            f.render_widget(body, area);
        }
        RenderDescriptor::CompositeGrid { title, cells } => {
            draw_compare_grid(f, area, title, cells)
        }
        RenderDescriptor::Unavailable { reason } => {
            let body = Paragraph::new(Line::from(Span::styled(
                reason.clone(),
                Style::default().fg(Color::Yellow),
            )))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Unavailable"));
            f.render_widget(body, area);
        }
    }
}

const SERIES_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Green,
    Color::Magenta,
    Color::Blue,
    Color::Red,
];

fn draw_series_chart(f: &mut Frame, area: Rect, title: &str, labels: &[String], series: &[Vec<f64>]) {
    let frames = series.iter().map(Vec::len).max().unwrap_or(0);
    let x_max = frames.saturating_sub(1).max(1) as f64;
    let (y_min, y_max) = finite_bounds(series.iter().flatten().copied());
    let points: Vec<Vec<(f64, f64)>> = series
        .iter()
        .map(|values| {
            values
                .iter()
                .enumerate()
                .map(|(frame, value)| (frame as f64, *value))
                .collect()
        })
        .collect();
    let datasets: Vec<Dataset> = points
        .iter()
        .enumerate()
        .map(|(index, data)| {
            Dataset::default()
                .name(labels.get(index).cloned().unwrap_or_default())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(SERIES_COLORS[index % SERIES_COLORS.len()]))
                .data(data)
        })
        .collect();
    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .x_axis(
            Axis::default()
                .title("frame")
                .bounds([0.0, x_max])
                .labels(vec![
                    Span::from("0"),
                    Span::from(format!("{}", frames.saturating_sub(1))),
                ]),
        )
        .y_axis(Axis::default().bounds([y_min, y_max]).labels(vec![
            Span::from(format!("{y_min:.2}")),
            Span::from(format!("{y_max:.2}")),
        ]));
    f.render_widget(chart, area);
}

fn draw_compare_grid(f: &mut Frame, area: Rect, title: &str, cells: &[TactileCell]) {
    let outer = Block::default().borders(Borders::ALL).title(title.to_string());
    let inner = outer.inner(area);
    f.render_widget(outer, area);

    // One scale across every site, so cells stay comparable.
    let shared: Vec<f64> = cells
        .iter()
        .flat_map(|cell| cell.values.iter().flatten().copied())
        .collect();
    let (min, span) = heat_span(&shared);

    let row_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(inner);
    let mut cell_areas = Vec::with_capacity(4);
    for row_area in row_areas.iter() {
        let halves = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(*row_area);
        cell_areas.push(halves[0]);
        cell_areas.push(halves[1]);
    }

    for (cell, cell_area) in cells.iter().zip(cell_areas) {
        let cell_title = if cell.legend {
            format!("{} (scale)", cell.title)
        } else {
            cell.title.clone()
        };
        let body = match &cell.values {
            Some(values) => Paragraph::new(vec![
                Line::from(shade_row(values, min, span)),
                Line::from(format!("{} sensors", values.len())),
            ]),
            None => Paragraph::new(Line::from(Span::styled(
                "No data",
                Style::default().fg(Color::DarkGray),
            ))),
        };
        f.render_widget(
            body.block(Block::default().borders(Borders::ALL).title(cell_title)),
            cell_area,
        );
    }
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let status = Paragraph::new(app.status.as_str())
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(Wrap { trim: true });
    f.render_widget(status, area);
}

fn frames_text(frames: Option<usize>) -> String {
    match frames {
        Some(count) => format!("{count} frames"),
        None => "missing".to_string(),
    }
}

const SHADES: [char; 5] = [' ', '░', '▒', '▓', '█'];

fn heat_span(values: &[f64]) -> (f64, f64) {
    let (min, max) = finite_bounds(values.iter().copied());
    (min, (max - min).max(f64::EPSILON))
}

/// One terminal row of shade blocks, darkest-to-brightest; `?` marks a
/// non-finite sample.
fn shade_row(values: &[f64], min: f64, span: f64) -> String {
    values
        .iter()
        .map(|value| {
            let t = (value - min) / span;
            if !t.is_finite() {
                '?'
            } else {
                SHADES[(t.clamp(0.0, 1.0) * (SHADES.len() - 1) as f64).round() as usize]
            }
        })
        .collect()
}
