use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use hand_scorer::{
    FileProbe, Point, Scheme, SessionController, Side, Size,
};
use log::warn;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing a bulk score string
    BulkEntry(String),
}

pub struct App {
    pub session: SessionController<FileProbe>,
    pub case_state: TableState,
    pub input_mode: InputMode,
    pub status: String,
    pub save_path: PathBuf,
    pub export_path: PathBuf,
    container: Size,
}

impl App {
    pub fn new(
        session: SessionController<FileProbe>,
        save_path: PathBuf,
        export_path: PathBuf,
    ) -> Self {
        let mut case_state = TableState::default();
        case_state.select(session.current_index());

        Self {
            session,
            case_state,
            input_mode: InputMode::Normal,
            status: String::from("Ready"),
            save_path,
            export_path,
            container: Size::default(),
        }
    }

    fn report<T>(&mut self, action: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("{} failed: {:#}", action, err);
                self.status = format!("{action} failed: {err:#}");
                None
            }
        }
    }

    fn sync_selection(&mut self) {
        self.case_state.select(self.session.current_index());
    }

    pub fn next_case(&mut self) {
        let res = self.session.next_case().map_err(Into::into);
        self.report("Next case", res);
        self.sync_selection();
    }

    pub fn previous_case(&mut self) {
        let res = self.session.previous_case().map_err(Into::into);
        self.report("Previous case", res);
        self.sync_selection();
    }

    pub fn toggle_scheme(&mut self) {
        let scheme = self.session.scheme().toggle();
        self.session.select_scheme(scheme);
    }

    pub fn select_side(&mut self, side: Side) {
        self.session.select_side(side);
    }

    pub fn set_score(&mut self, value: Option<u8>) {
        if self.session.highlighted().is_none() {
            self.status = String::from("Select a landmark first (n/p)");
            return;
        }
        let res = self.session.edit_highlighted(value).map_err(Into::into);
        self.report("Edit", res);
    }

    pub fn toggle_reviewed(&mut self) {
        let res = self.session.toggle_reviewed().map_err(Into::into);
        if let Some(state) = self.report("Reviewed", res) {
            self.status = format!("Reviewed: {}", if state { "yes" } else { "no" });
        }
    }

    pub fn save(&mut self) {
        let path = self.save_path.clone();
        let res = self.session.save(&path);
        if self.report("Save", res).is_some() {
            self.status = format!("Saved to {}", path.display());
        }
    }

    pub fn export(&mut self) {
        let path = self.export_path.clone();
        let res = self.session.export(&path);
        if self.report("Export", res).is_some() {
            self.status = format!("Exported to {}", path.display());
        }
    }

    pub fn reload(&mut self) {
        let path = self.save_path.clone();
        let res = self.session.load_session(&path);
        if self.report("Load", res).is_some() {
            self.status = format!("Loaded {}", path.display());
        }
        self.sync_selection();
    }

    pub fn apply_bulk(&mut self, text: &str) {
        let res = self.session.bulk_entry(text).map_err(Into::into);
        if let Some(count) = self.report("Bulk entry", res) {
            self.status = format!("Set {count} landmarks");
        }
    }

    pub fn move_highlighted(&mut self, delta: isize) {
        if let Some(name) = self.session.highlighted() {
            let res = self.session.move_landmark(name, delta).map_err(Into::into);
            self.report("Reorder", res);
        }
    }

    /// Keep the layout engine in step with the diagram panel size.
    ///
    /// Terminal cells are roughly twice as tall as wide, so one row counts
    /// as two layout units.
    fn fit_diagram(&mut self, area: Rect) {
        let container = Size::new(f64::from(area.width), f64::from(area.height) * 2.0);
        if container != self.container {
            self.container = container;
            self.session.resize(container);
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if let InputMode::BulkEntry(buffer) = &mut app.input_mode {
                match key.code {
                    KeyCode::Enter => {
                        let text = std::mem::take(buffer);
                        app.input_mode = InputMode::Normal;
                        app.apply_bulk(&text);
                    }
                    KeyCode::Esc => app.input_mode = InputMode::Normal,
                    KeyCode::Backspace => {
                        buffer.pop();
                    }
                    KeyCode::Char(c) => buffer.push(c),
                    _ => {}
                }
                continue;
            }

            if handle_normal_key(app, key) {
                return Ok(());
            }
        }
    }
}

/// Returns true when the user asked to quit
fn handle_normal_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Down | KeyCode::Char('j') => app.next_case(),
        KeyCode::Up | KeyCode::Char('k') => app.previous_case(),
        KeyCode::Tab => app.toggle_scheme(),
        KeyCode::Left | KeyCode::Char('L') => app.select_side(Side::L),
        KeyCode::Right | KeyCode::Char('R') => app.select_side(Side::R),
        KeyCode::Char('n') => app.session.highlight_step(true),
        KeyCode::Char('p') => app.session.highlight_step(false),
        KeyCode::Char(c @ '0'..='5') => app.set_score(c.to_digit(10).map(|d| d as u8)),
        KeyCode::Backspace | KeyCode::Delete => app.set_score(None),
        KeyCode::Char('a') => {
            let res = app.session.set_all_positive().map_err(Into::into);
            app.report("All positive", res);
        }
        KeyCode::Char('z') => {
            let res = app.session.set_all_negative().map_err(Into::into);
            app.report("All negative", res);
        }
        KeyCode::Char('+') => app.move_highlighted(1),
        KeyCode::Char('-') => app.move_highlighted(-1),
        KeyCode::Char('v') => app.toggle_reviewed(),
        KeyCode::Char('s') => app.save(),
        KeyCode::Char('e') => app.export(),
        KeyCode::Char('o') => app.reload(),
        KeyCode::Char('b') => app.input_mode = InputMode::BulkEntry(String::new()),
        _ => {}
    }
    false
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30), // Case list
            Constraint::Percentage(40), // Hand diagram
            Constraint::Percentage(30), // Landmark scores
        ])
        .split(chunks[1]);

    render_cases(f, content_chunks[0], app);
    render_diagram(f, content_chunks[1], app);
    render_scores(f, content_chunks[2], app);

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let session = &app.session;

    let mut spans = vec![];
    for (i, scheme) in Scheme::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if *scheme == session.scheme() {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(scheme.as_str(), style));
    }

    spans.push(Span::raw("  |  Hand: "));
    spans.push(Span::styled(
        if session.side() == Side::L { "Left" } else { "Right" },
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ));

    spans.push(Span::raw("  |  "));
    match session.current_case() {
        Some(case) => {
            let index = session.current_index().map(|i| i + 1).unwrap_or(0);
            spans.push(Span::styled(
                format!("Case {}/{}: {}", index, session.cases().len(), truncate(case, 40)),
                Style::default().fg(Color::White),
            ));
            if session.is_current_reviewed() {
                spans.push(Span::styled(" ✓ reviewed", Style::default().fg(Color::Green)));
            }
        }
        None => spans.push(Span::styled("No case", Style::default().fg(Color::DarkGray))),
    }

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_cases(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["#", "Case", "L", "R", "✓"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let repo = app.session.repository();
    let rows: Vec<Row> = app
        .session
        .cases()
        .iter()
        .enumerate()
        .map(|(i, case)| {
            let name = std::path::Path::new(case)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| case.clone());
            let count = |side: Side| {
                repo.record(case, side)
                    .map(|r| r.scored_count().to_string())
                    .unwrap_or_else(|_| String::from("-"))
            };
            let reviewed = repo.is_reviewed(case).unwrap_or(false);

            Row::new(vec![
                Cell::from(format!("{}", i + 1)),
                Cell::from(truncate(&name, 24)),
                Cell::from(count(Side::L)),
                Cell::from(count(Side::R)),
                Cell::from(if reviewed { "✓" } else { "" })
                    .style(Style::default().fg(Color::Green)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Min(10),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(2),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Cases "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.case_state);
}

/// Map a layout point to a terminal cell inside `area`
fn to_cell(area: Rect, p: Point) -> Option<(u16, u16)> {
    if !(p.x >= 0.0 && p.y >= 0.0) {
        return None;
    }
    let col = p.x.floor() as u16;
    let row = (p.y / 2.0).floor() as u16;
    if col >= area.width || row >= area.height {
        return None;
    }
    Some((area.x + col, area.y + row))
}

fn render_diagram(f: &mut Frame, area: Rect, app: &mut App) {
    let color = match app.session.scheme() {
        Scheme::Jsn => Color::Green,
        Scheme::Be => Color::Blue,
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(format!(" {} - {} hand ", app.session.scheme(), app.session.side()));
    let inner = block.inner(area);
    f.render_widget(block, area);

    app.fit_diagram(inner);
    let session = &app.session;

    if !session.controls_enabled() {
        let msg = Paragraph::new("No image loaded").style(Style::default().fg(Color::DarkGray));
        f.render_widget(msg, inner);
        return;
    }

    // Outline of the drawn diagram, same placement as the controls
    if let Some(placement) = session.layout().placement() {
        let d = placement.diagram_rect();
        let top_left = to_cell(inner, Point::new(d.x, d.y));
        let bottom_right = to_cell(inner, Point::new(d.x + d.width - 1.0, d.y + d.height - 2.0));
        if let (Some((x0, y0)), Some((x1, y1))) = (top_left, bottom_right) {
            let outline = Rect::new(x0, y0, x1.saturating_sub(x0) + 1, y1.saturating_sub(y0) + 1);
            f.render_widget(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray)),
                outline.intersection(inner),
            );
        }
    }

    for (name, rect) in session.control_rects() {
        let Some((x, y)) = to_cell(inner, rect.center()) else {
            continue;
        };
        let value = session
            .value(name)
            .map(|s| s.to_string())
            .unwrap_or_else(|| String::from("•"));
        let highlighted = session.highlighted() == Some(name.as_str());
        let style = if highlighted {
            Style::default().fg(Color::Black).bg(color).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        };
        let cell = Rect::new(x, y, 1, 1).intersection(inner);
        f.render_widget(Paragraph::new(Span::styled(value, style)), cell);
    }
}

fn render_scores(f: &mut Frame, area: Rect, app: &App) {
    let session = &app.session;
    let header = Row::new(["Landmark", "Score"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    }))
    .style(Style::default().bg(Color::DarkGray));

    let mut state = TableState::default();
    let rows: Vec<Row> = session
        .ordered_landmarks()
        .iter()
        .enumerate()
        .map(|(i, lm)| {
            if session.highlighted() == Some(lm.name) {
                state.select(Some(i));
            }
            let value = session
                .value(lm.name)
                .map(|s| s.to_string())
                .unwrap_or_default();
            Row::new(vec![Cell::from(lm.name), Cell::from(value)])
        })
        .collect();

    let allowed: Vec<String> = session
        .scheme()
        .ordinal_values()
        .iter()
        .map(|v| v.to_string())
        .collect();

    let table = Table::new(rows, [Constraint::Min(10), Constraint::Length(6)])
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" Scores [{}] ", allowed.join(","))),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));

    let spans = match &app.input_mode {
        InputMode::BulkEntry(buffer) => vec![
            Span::styled(" Bulk: ", Style::default().fg(Color::Cyan)),
            Span::raw(buffer.clone()),
            Span::styled("▏", Style::default().fg(Color::Yellow)),
            Span::raw("  ("),
            key("Enter"),
            Span::raw(" apply, "),
            key("Esc"),
            Span::raw(" cancel)"),
        ],
        InputMode::Normal => vec![
            Span::styled(format!(" {} ", app.status), Style::default().fg(Color::Cyan)),
            Span::raw("| "),
            key("j/k"),
            Span::raw(" Case | "),
            key("Tab"),
            Span::raw(" JSN/BE | "),
            key("←/→"),
            Span::raw(" Side | "),
            key("n/p"),
            Span::raw(" Joint | "),
            key("0-5"),
            Span::raw(" Score | "),
            key("a/z"),
            Span::raw(" All +/- | "),
            key("b"),
            Span::raw(" Bulk | "),
            key("v"),
            Span::raw(" Reviewed | "),
            key("s/e/o"),
            Span::raw(" Save/Export/Open | "),
            Span::styled("q", Style::default().fg(Color::Red)),
            Span::raw(" Quit"),
        ],
    };

    let status_bar = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let keep: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{keep}...")
    }
}
