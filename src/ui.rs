use crate::model::{Task, TaskId};
use crate::session::{Applied, Persistence, Rejected, Session};
use crate::storage::{StoreLocation, TaskFile};
use crate::view::Filter;
use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::Duration;

pub fn run(session: Session<TaskFile>, location: StoreLocation) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(session, location);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App<P: Persistence> {
    session: Session<P>,
    location: StoreLocation,
    selected: usize,
    status: String,
    mode: Mode,
}

enum Mode {
    Normal,
    Adding(FieldValue),
    Editing { task_id: TaskId, field: FieldValue },
    Searching(FieldValue),
    ConfirmDelete { task_id: TaskId },
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_char(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_char(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_char(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

enum FieldKey {
    Submit,
    Cancel,
    Changed,
    Moved,
}

impl<P: Persistence> App<P> {
    fn new(session: Session<P>, location: StoreLocation) -> Self {
        let status = format!(
            "Loaded {} tasks from {}",
            session.tasks().len(),
            location.path.display()
        );
        App {
            session,
            location,
            selected: 0,
            status,
            mode: Mode::Normal,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let (next, quit) = match mode {
            Mode::Normal => (Mode::Normal, self.handle_normal_key(key)),
            Mode::Adding(field) => (self.handle_add_key(field, key), false),
            Mode::Editing { task_id, field } => (self.handle_edit_key(task_id, field, key), false),
            Mode::Searching(field) => (self.handle_search_key(field, key), false),
            Mode::ConfirmDelete { task_id } => (self.handle_confirm_key(task_id, key), false),
        };
        // Normal-mode keys may open a new mode themselves.
        if matches!(self.mode, Mode::Normal) {
            self.mode = next;
        }
        self.clamp_selection();
        quit
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('c') if control => return true,
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.selected += 1,
            KeyCode::Char('a') | KeyCode::Char('n') => {
                self.mode = Mode::Adding(FieldValue::new(""));
                self.status = "New task (Enter save, Esc cancel)".into();
            }
            KeyCode::Char('e') => match self.current_task() {
                Some(task) => {
                    let field = FieldValue::new(&task.text);
                    let task_id = task.id;
                    self.mode = Mode::Editing { task_id, field };
                    self.status = format!("Editing task {}", task_id);
                }
                None => self.status = "No task selected to edit".into(),
            },
            KeyCode::Char(' ') | KeyCode::Enter | KeyCode::Char('x') => {
                if let Some(id) = self.current_task().map(|t| t.id) {
                    let result = self.session.toggle_complete(id);
                    self.report(result, format!("Toggled task {}", id));
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => match self.current_task().map(|t| t.id) {
                Some(task_id) => {
                    self.mode = Mode::ConfirmDelete { task_id };
                    self.status = format!("Delete task {}? (y to confirm, n/Esc to cancel)", task_id);
                }
                None => self.status = "No task selected to delete".into(),
            },
            KeyCode::Char('u') => {
                let result = self.session.undo();
                self.report(result, "Undone".into());
            }
            KeyCode::Char('r') | KeyCode::Char('U') => {
                let result = self.session.redo();
                self.report(result, "Redone".into());
            }
            KeyCode::Char('1') => self.set_filter(Filter::All),
            KeyCode::Char('2') => self.set_filter(Filter::Completed),
            KeyCode::Char('3') => self.set_filter(Filter::Incomplete),
            KeyCode::Char('f') | KeyCode::Tab => {
                let next = self.session.filter().next();
                self.set_filter(next);
            }
            KeyCode::Char('/') => {
                self.mode = Mode::Searching(FieldValue::new(self.session.search_term()));
                self.status = "Search (Enter keep, Esc clear)".into();
            }
            KeyCode::Esc => {
                if !self.session.search_term().is_empty() {
                    self.set_search(String::new());
                    self.status = "Search cleared".into();
                }
            }
            _ => {}
        }
        false
    }

    fn handle_add_key(&mut self, mut field: FieldValue, key: KeyEvent) -> Mode {
        match process_field_key(&mut field, key) {
            FieldKey::Cancel => {
                self.status = "Canceled".into();
                Mode::Normal
            }
            FieldKey::Submit => match self.session.add_task(field.value.clone()) {
                Ok(Applied::Added(id)) => {
                    self.status = format!("Added task {}", id);
                    self.select_task(id);
                    Mode::Normal
                }
                Ok(_) => Mode::Normal,
                Err(err) => {
                    self.status = format!("Could not add: {}", err);
                    Mode::Adding(field)
                }
            },
            FieldKey::Changed | FieldKey::Moved => Mode::Adding(field),
        }
    }

    fn handle_edit_key(&mut self, task_id: TaskId, mut field: FieldValue, key: KeyEvent) -> Mode {
        match process_field_key(&mut field, key) {
            FieldKey::Cancel => {
                self.status = "Canceled".into();
                Mode::Normal
            }
            FieldKey::Submit => match self.session.edit_task(task_id, field.value.clone()) {
                Ok(_) => {
                    self.status = format!("Updated task {}", task_id);
                    Mode::Normal
                }
                Err(Rejected::BlankText) => {
                    self.status = "Could not edit: task text is empty".into();
                    Mode::Editing { task_id, field }
                }
                Err(err) => {
                    self.status = format!("Could not edit: {}", err);
                    Mode::Normal
                }
            },
            FieldKey::Changed | FieldKey::Moved => Mode::Editing { task_id, field },
        }
    }

    fn handle_search_key(&mut self, mut field: FieldValue, key: KeyEvent) -> Mode {
        match process_field_key(&mut field, key) {
            FieldKey::Cancel => {
                self.set_search(String::new());
                self.status = "Search cleared".into();
                Mode::Normal
            }
            FieldKey::Submit => {
                self.status = format!("{} matching", self.session.visible().len());
                Mode::Normal
            }
            FieldKey::Changed => {
                self.set_search(field.value.clone());
                self.selected = 0;
                Mode::Searching(field)
            }
            FieldKey::Moved => Mode::Searching(field),
        }
    }

    fn handle_confirm_key(&mut self, task_id: TaskId, key: KeyEvent) -> Mode {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                let result = self.session.remove_task(task_id);
                self.report(result, format!("Deleted task {}", task_id));
                Mode::Normal
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
                Mode::Normal
            }
            _ => Mode::ConfirmDelete { task_id },
        }
    }

    fn report(&mut self, result: Result<Applied, Rejected>, message: String) {
        self.status = match result {
            Ok(_) => match self.session.save_error() {
                Some(err) => format!("{} (not saved: {})", message, err),
                None => message,
            },
            Err(err) => capitalize(&err.to_string()),
        };
    }

    fn set_filter(&mut self, filter: Filter) {
        self.session.set_filter(filter);
        self.selected = 0;
        self.status = format!("Showing {} tasks", filter);
    }

    fn set_search(&mut self, term: String) {
        self.session.set_search_term(term);
    }

    fn current_task(&self) -> Option<&Task> {
        self.session.visible().get(self.selected).copied()
    }

    fn select_task(&mut self, id: TaskId) {
        if let Some(idx) = self.session.visible().iter().position(|t| t.id == id) {
            self.selected = idx;
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.session.visible().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        self.draw_controls(f, layout[1]);
        self.draw_list(f, layout[2]);
        self.draw_footer(f, layout[3]);

        match &self.mode {
            Mode::Adding(field) => draw_input(f, "New Task", field),
            Mode::Editing { field, .. } => draw_input(f, "Edit Task", field),
            Mode::ConfirmDelete { task_id } => self.draw_confirm(f, *task_id),
            Mode::Searching(_) | Mode::Normal => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let saved = match (self.session.save_error(), self.session.last_saved()) {
            (Some(_), _) => Span::styled("save failed", Style::default().fg(Color::LightRed)),
            (None, Some(at)) => Span::styled(
                format!("saved {}", format_elapsed(at)),
                Style::default().fg(Color::Gray),
            ),
            (None, None) => Span::styled("unchanged", Style::default().fg(Color::Gray)),
        };
        let title = Line::from(vec![
            Span::styled(
                "taskpad ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                self.location.scope.label(),
                Style::default().fg(Color::Green),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", self.location.path.display()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  •  "),
            saved,
        ]);
        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_controls(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);

        let selected = Filter::ALL
            .iter()
            .position(|filter| *filter == self.session.filter())
            .unwrap_or(0);
        let tabs = Tabs::new(Filter::ALL.iter().map(|filter| filter.label()).collect::<Vec<_>>())
            .select(selected)
            .block(Block::default().borders(Borders::ALL).title("Filter"))
            .highlight_style(
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::LightGreen)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_widget(tabs, chunks[0]);

        let searching = matches!(self.mode, Mode::Searching(_));
        let text = match &self.mode {
            Mode::Searching(field) => field.with_caret(),
            _ if self.session.search_term().is_empty() => "Search...".to_string(),
            _ => self.session.search_term().to_string(),
        };
        let style = if searching {
            Style::default().fg(Color::Cyan)
        } else if self.session.search_term().is_empty() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::White)
        };
        let search = Paragraph::new(Span::styled(text, style))
            .block(Block::default().borders(Borders::ALL).title("Search"));
        f.render_widget(search, chunks[1]);
    }

    fn draw_list(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let visible = self.session.visible();
        let title = format!(
            "Tasks ({} of {})",
            visible.len(),
            self.session.tasks().len()
        );
        let block = Block::default()
            .title(Span::styled(
                title,
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        if visible.is_empty() {
            let msg = if self.session.tasks().is_empty() {
                "No tasks yet. Press a to add one."
            } else {
                "No tasks match the current filter."
            };
            let paragraph = Paragraph::new(msg)
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            f.render_widget(paragraph, area);
            return;
        }

        let items = visible.iter().map(|task| task_item(task)).collect::<Vec<_>>();
        let mut state = ListState::default();
        state.select(Some(self.selected));
        let list = List::new(items).block(block).highlight_style(
            Style::default()
                .bg(Color::Rgb(252, 214, 112))
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let history = self.session.history();
        let recorded = history.current().recorded_at;
        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(rows[1]);
        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, bottom[0]);

        let position = Paragraph::new(Line::from(vec![
            Span::styled(
                format!("history {}/{}", history.cursor() + 1, history.len()),
                Style::default().fg(Color::Magenta),
            ),
            Span::raw("  "),
            Span::styled(
                format!("at {}", format_elapsed(recorded)),
                Style::default().fg(Color::DarkGray),
            ),
        ]))
        .alignment(Alignment::Right)
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(position, bottom[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let enabled = |on: bool, color: Color| {
            if on {
                Style::default().fg(color)
            } else {
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::DIM)
            }
        };
        Line::from(vec![
            Span::styled("↑↓ / j k", Style::default().fg(Color::LightCyan)),
            Span::raw(" move  "),
            Span::styled("a", Style::default().fg(Color::LightMagenta)),
            Span::raw(" add  "),
            Span::styled("space", Style::default().fg(Color::LightGreen)),
            Span::raw(" toggle  "),
            Span::styled("e", Style::default().fg(Color::LightYellow)),
            Span::raw(" edit  "),
            Span::styled("d", Style::default().fg(Color::LightRed)),
            Span::raw(" delete  "),
            Span::styled("1 2 3 / f", Style::default().fg(Color::LightCyan)),
            Span::raw(" filter  "),
            Span::styled("/", Style::default().fg(Color::LightCyan)),
            Span::raw(" search  "),
            Span::styled("u", enabled(self.session.can_undo(), Color::LightYellow)),
            Span::styled(" undo  ", enabled(self.session.can_undo(), Color::Reset)),
            Span::styled("r", enabled(self.session.can_redo(), Color::LightYellow)),
            Span::styled(" redo  ", enabled(self.session.can_redo(), Color::Reset)),
            Span::styled("q", Style::default().fg(Color::LightRed)),
            Span::raw(" quit"),
        ])
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, task_id: TaskId) {
        let area = centered_rect(50, 30, f.size());
        let text = self
            .session
            .tasks()
            .get(task_id)
            .map(|t| t.text.clone())
            .unwrap_or_else(|| task_id.to_string());
        let body = vec![
            Line::from(Span::styled(
                format!("Delete \"{}\"?", text),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Confirm Delete",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

fn process_field_key(field: &mut FieldValue, key: KeyEvent) -> FieldKey {
    match key.code {
        KeyCode::Esc => FieldKey::Cancel,
        KeyCode::Enter => FieldKey::Submit,
        KeyCode::Left => {
            field.move_left();
            FieldKey::Moved
        }
        KeyCode::Right => {
            field.move_right();
            FieldKey::Moved
        }
        KeyCode::Home => {
            field.cursor = 0;
            FieldKey::Moved
        }
        KeyCode::End => {
            field.cursor = field.value.len();
            FieldKey::Moved
        }
        KeyCode::Backspace => {
            field.backspace();
            FieldKey::Changed
        }
        KeyCode::Char(c)
            if !key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            field.insert_char(c);
            FieldKey::Changed
        }
        _ => FieldKey::Moved,
    }
}

fn draw_input(f: &mut ratatui::Frame<'_>, title: &str, field: &FieldValue) {
    let area = centered_rect(60, 25, f.size());
    let lines = vec![
        Line::from(Span::styled(
            field.with_caret(),
            Style::default().fg(Color::Cyan),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Enter to save • Esc to cancel",
            Style::default().fg(Color::Gray),
        )),
    ];
    let dialog = Paragraph::new(lines)
        .block(
            Block::default()
                .title(Span::styled(
                    title.to_string(),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn task_item(task: &Task) -> ListItem<'static> {
    let (mark, text_style) = if task.completed {
        (
            "[x]",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::CROSSED_OUT),
        )
    } else {
        ("[ ]", Style::default().fg(Color::White))
    };
    ListItem::new(Line::from(vec![
        Span::styled(format!("{} ", mark), Style::default().fg(Color::LightGreen)),
        Span::styled(format!("{:>3} ", task.id), Style::default().fg(Color::DarkGray)),
        Span::styled(task.text.clone(), text_style),
    ]))
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn prev_char(cursor: usize, text: &str) -> usize {
    text[..cursor]
        .char_indices()
        .next_back()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_char(cursor: usize, text: &str) -> usize {
    text[cursor..]
        .chars()
        .next()
        .map(|ch| cursor + ch.len_utf8())
        .unwrap_or(text.len())
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn format_elapsed(at: DateTime<Utc>) -> String {
    let secs = (Utc::now() - at).num_seconds().max(0);
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}
