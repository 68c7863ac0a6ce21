use anyhow::{bail, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::api::JobTrackerApi;
use crate::bridge::{self, BoardCommand, Bridge};
use crate::error::ApiError;
use crate::models::{Application, ApplicationStatus, InterviewType};
use crate::notice::{Level, Notice};
use crate::pipeline::{InterviewDraft, Pipeline, Position};
use crate::session::{SessionService, SessionState};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const INTERVIEW_FIELDS: [&str; 4] = ["Type", "Date (YYYY-MM-DDTHH:MM)", "Location / link", "Notes"];

#[derive(Debug, Clone, PartialEq)]
enum Mode {
    Browse,
    Detail,
    EditNotes { buffer: String },
    Interview { draft: InterviewDraft, field: usize },
    ConfirmDelete,
}

#[derive(Debug, PartialEq)]
enum Step {
    Stay,
    Send(BoardCommand),
    Quit,
}

struct BoardState {
    pipeline: Pipeline,
    column: usize,
    row: usize,
    mode: Mode,
    footer: Option<Notice>,
}

impl BoardState {
    fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            column: 0,
            row: 0,
            mode: Mode::Browse,
            footer: None,
        }
    }

    fn status(&self) -> ApplicationStatus {
        ApplicationStatus::ALL[self.column]
    }

    fn column_len(&self, status: ApplicationStatus) -> usize {
        self.pipeline.buckets().column(status).len()
    }

    fn cursor(&self) -> Position {
        Position::new(self.status(), self.row)
    }

    fn current(&self) -> Option<&Application> {
        self.pipeline.buckets().get(self.cursor())
    }

    fn clamp_row(&mut self) {
        self.row = self.row.min(self.column_len(self.status()).saturating_sub(1));
    }

    /// Called after every batch of worker events.
    fn sync(&mut self) {
        self.clamp_row();
        if let Some(latest) = self.pipeline.notices.drain().pop() {
            self.footer = Some(latest);
        }
        if self.mode != Mode::Browse && self.pipeline.selected().is_none() {
            self.mode = Mode::Browse;
        }
    }

    fn shift(&mut self, destination: Position) -> Step {
        let source = self.cursor();
        let Some(pending) = self.pipeline.begin_move(source, destination) else {
            return Step::Stay;
        };
        self.column = destination.status.index();
        self.row = destination.index.min(self.column_len(destination.status).saturating_sub(1));
        Step::Send(BoardCommand::UpdateStatus(pending))
    }

    fn shift_status(&mut self, target: Option<ApplicationStatus>) -> Step {
        match target {
            Some(status) if self.current().is_some() => {
                let index = self.row.min(self.column_len(status));
                self.shift(Position::new(status, index))
            }
            _ => Step::Stay,
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> Step {
        match self.mode {
            Mode::Browse => self.browse_key(code),
            Mode::Detail => self.detail_key(code),
            Mode::EditNotes { .. } => self.notes_key(code),
            Mode::Interview { .. } => self.interview_key(code),
            Mode::ConfirmDelete => self.confirm_key(code),
        }
    }

    fn browse_key(&mut self, code: KeyCode) -> Step {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Step::Quit,
            KeyCode::Left | KeyCode::Char('h') => {
                self.column = self.column.saturating_sub(1);
                self.clamp_row();
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.column = (self.column + 1).min(ApplicationStatus::ALL.len() - 1);
                self.clamp_row();
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.row + 1 < self.column_len(self.status()) {
                    self.row += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => self.row = self.row.saturating_sub(1),
            KeyCode::Char('H') => return self.shift_status(self.status().prev()),
            KeyCode::Char('L') => return self.shift_status(self.status().next()),
            KeyCode::Char('J') => {
                if self.row + 1 < self.column_len(self.status()) {
                    return self.shift(Position::new(self.status(), self.row + 1));
                }
            }
            KeyCode::Char('K') => {
                if self.row > 0 {
                    return self.shift(Position::new(self.status(), self.row - 1));
                }
            }
            KeyCode::Enter => {
                if let Some(id) = self.current().map(|a| a.id.clone()) {
                    if self.pipeline.select(&id) {
                        self.mode = Mode::Detail;
                    }
                }
            }
            KeyCode::Char('r') => return Step::Send(BoardCommand::Load(self.pipeline.begin_load())),
            _ => {}
        }
        Step::Stay
    }

    fn detail_key(&mut self, code: KeyCode) -> Step {
        let Some(app) = self.pipeline.selected() else {
            self.mode = Mode::Browse;
            return Step::Stay;
        };
        match code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.pipeline.close_detail();
                self.mode = Mode::Browse;
            }
            KeyCode::Char('n') => {
                self.mode = Mode::EditNotes {
                    buffer: app.notes.clone().unwrap_or_default(),
                }
            }
            KeyCode::Char('i') => {
                self.mode = Mode::Interview {
                    draft: InterviewDraft::from_interview(app.interview.as_ref()),
                    field: 0,
                }
            }
            KeyCode::Char('d') => self.mode = Mode::ConfirmDelete,
            _ => {}
        }
        Step::Stay
    }

    fn notes_key(&mut self, code: KeyCode) -> Step {
        let Mode::EditNotes { buffer } = &mut self.mode else {
            return Step::Stay;
        };
        match code {
            KeyCode::Esc => self.mode = Mode::Detail,
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(c) => buffer.push(c),
            KeyCode::Enter => {
                let notes = std::mem::take(buffer);
                self.mode = Mode::Detail;
                if let Some(app) = self.pipeline.selected() {
                    return Step::Send(BoardCommand::SaveNotes {
                        id: app.id.clone(),
                        notes,
                    });
                }
            }
            _ => {}
        }
        Step::Stay
    }

    fn interview_key(&mut self, code: KeyCode) -> Step {
        let Mode::Interview { draft, field } = &mut self.mode else {
            return Step::Stay;
        };
        match code {
            KeyCode::Esc => self.mode = Mode::Detail,
            KeyCode::Tab | KeyCode::Down => *field = (*field + 1) % INTERVIEW_FIELDS.len(),
            KeyCode::BackTab | KeyCode::Up => {
                *field = (*field + INTERVIEW_FIELDS.len() - 1) % INTERVIEW_FIELDS.len()
            }
            KeyCode::Left | KeyCode::Right if *field == 0 => {
                draft.interview_type = Some(cycle_type(draft.interview_type, code == KeyCode::Right));
            }
            KeyCode::Char(c) if *field > 0 => {
                if let Some(text) = text_field(draft, *field) {
                    text.push(c);
                }
            }
            KeyCode::Backspace => {
                if let Some(text) = text_field(draft, *field) {
                    text.pop();
                }
            }
            KeyCode::Enter => {
                let validated = draft.validate();
                match validated {
                    Ok(interview) => {
                        self.mode = Mode::Detail;
                        if let Some(app) = self.pipeline.selected() {
                            return Step::Send(BoardCommand::ScheduleInterview {
                                id: app.id.clone(),
                                interview,
                            });
                        }
                    }
                    Err(e) => self.pipeline.notices.error(e.to_string()),
                }
            }
            _ => {}
        }
        Step::Stay
    }

    fn confirm_key(&mut self, code: KeyCode) -> Step {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                self.mode = Mode::Detail;
                if let Some(app) = self.pipeline.selected() {
                    return Step::Send(BoardCommand::Delete { id: app.id.clone() });
                }
            }
            _ => self.mode = Mode::Detail,
        }
        Step::Stay
    }
}

fn cycle_type(current: Option<InterviewType>, forward: bool) -> InterviewType {
    let all = InterviewType::ALL;
    let Some(pos) = current.and_then(|t| all.iter().position(|x| *x == t)) else {
        return all[0];
    };
    if forward {
        all[(pos + 1) % all.len()]
    } else {
        all[(pos + all.len() - 1) % all.len()]
    }
}

fn text_field(draft: &mut InterviewDraft, field: usize) -> Option<&mut String> {
    match field {
        1 => Some(&mut draft.scheduled_date),
        2 => Some(&mut draft.location),
        3 => Some(&mut draft.notes),
        _ => None,
    }
}

pub fn run_board(api: Arc<dyn JobTrackerApi>, session: &SessionService) -> Result<()> {
    let bridge = Bridge::start(api)?;
    let mut state = BoardState::new(Pipeline::new());
    let load = state.pipeline.begin_load();
    bridge.dispatch(&mut state.pipeline, BoardCommand::Load(load));

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, &bridge, session);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

/// A 401 anywhere clears the session; the board then leaves for the login prompt.
fn ensure_session(session_rx: &watch::Receiver<SessionState>) -> Result<()> {
    if *session_rx.borrow() == SessionState::Anonymous {
        bail!(ApiError::Unauthorized);
    }
    Ok(())
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut BoardState,
    bridge: &Bridge,
    session: &SessionService,
) -> Result<()> {
    let session_rx = session.subscribe();
    loop {
        for event in bridge.drain() {
            if let Some(follow_up) = bridge::apply(&mut state.pipeline, event) {
                bridge.dispatch(&mut state.pipeline, follow_up);
            }
        }
        state.sync();
        ensure_session(&session_rx)?;

        terminal.draw(|frame| draw(frame, state))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match state.handle_key(key.code) {
                Step::Quit => break,
                Step::Send(command) => bridge.dispatch(&mut state.pipeline, command),
                Step::Stay => {}
            }
        }
    }
    Ok(())
}

fn status_color(status: ApplicationStatus) -> Color {
    match status {
        ApplicationStatus::Applied => Color::Blue,
        ApplicationStatus::Screening => Color::Yellow,
        ApplicationStatus::Interview => Color::Magenta,
        ApplicationStatus::Offer => Color::Green,
        ApplicationStatus::Rejected => Color::Red,
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}

fn draw(frame: &mut Frame, state: &BoardState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1), Constraint::Length(1)])
        .split(frame.area());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 5); 5])
        .split(rows[0]);

    for (i, (status, apps)) in state.pipeline.buckets().columns().enumerate() {
        let width = columns[i].width.saturating_sub(4) as usize;
        let items: Vec<ListItem> = apps
            .iter()
            .map(|app| {
                ListItem::new(vec![
                    Line::from(Span::styled(
                        truncate(&app.title, width),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(truncate(&app.company, width)),
                ])
            })
            .collect();

        let active = i == state.column;
        let border_style = if active {
            Style::default().fg(status_color(status))
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border_style)
                    .title(format!(" {} ({}) ", status.label(), apps.len())),
            )
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("> ");

        let mut list_state = ListState::default();
        if active && !apps.is_empty() {
            list_state.select(Some(state.row));
        }
        frame.render_stateful_widget(list, columns[i], &mut list_state);
    }

    let footer = match &state.footer {
        Some(notice) => {
            let color = match notice.level {
                Level::Success => Color::Green,
                Level::Error => Color::Red,
            };
            Paragraph::new(format!(" {}", notice.message)).style(Style::default().fg(color))
        }
        None if state.pipeline.is_loading() => Paragraph::new(" Loading applications...")
            .style(Style::default().fg(Color::DarkGray)),
        None => Paragraph::new(""),
    };
    frame.render_widget(footer, rows[1]);

    let help = match state.mode {
        Mode::Browse => " h/l:column  j/k:card  H/L:move status  J/K:reorder  enter:open  r:refresh  q:quit",
        Mode::Detail => " n:notes  i:interview  d:delete  esc:close",
        Mode::EditNotes { .. } => " type to edit  enter:save  esc:cancel",
        Mode::Interview { .. } => " tab:next field  left/right:type  enter:schedule  esc:cancel",
        Mode::ConfirmDelete => " y:confirm delete  any other key:cancel",
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        rows[2],
    );

    if state.mode != Mode::Browse {
        if let Some(app) = state.pipeline.selected() {
            let area = popup_area(frame.area(), 70, 70);
            frame.render_widget(Clear, area);
            let detail = Paragraph::new(build_detail(app, &state.mode))
                .block(Block::default().borders(Borders::ALL).title(" Application "))
                .wrap(Wrap { trim: false });
            frame.render_widget(detail, area);
        }
    }
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn build_detail<'a>(app: &'a Application, mode: &'a Mode) -> Text<'a> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines: Vec<Line> = vec![
        Line::from(Span::styled(app.title.as_str(), bold)),
        Line::from(format!("at {}", app.company)),
        Line::from(Span::styled(
            format!("Status: {}", app.status.label()),
            Style::default().fg(status_color(app.status)),
        )),
    ];
    if !app.location.is_empty() {
        lines.push(Line::from(format!("Location: {}", app.location)));
    }
    if let Some(date) = &app.applied_date {
        lines.push(Line::from(format!("Applied: {}", date)));
    }
    match (app.salary_min, app.salary_max) {
        (Some(min), Some(max)) => lines.push(Line::from(format!("Salary: ${:.0} - ${:.0}", min, max))),
        (Some(min), None) => lines.push(Line::from(format!("Salary: ${:.0}+", min))),
        (None, Some(max)) => lines.push(Line::from(format!("Salary: up to ${:.0}", max))),
        (None, None) => {}
    }
    if let Some(url) = &app.application_url {
        lines.push(Line::from(format!("URL: {}", url)));
    }
    lines.push(Line::from(""));

    lines.push(Line::from(Span::styled("Notes", bold)));
    match mode {
        Mode::EditNotes { buffer } => lines.push(Line::from(format!("  {}_", buffer))),
        _ => match app.notes.as_deref().filter(|n| !n.is_empty()) {
            Some(notes) => lines.extend(notes.lines().map(|l| Line::from(format!("  {}", l)))),
            None => lines.push(Line::from(Span::styled("  (none)", Style::default().fg(Color::DarkGray)))),
        },
    }
    lines.push(Line::from(""));

    lines.push(Line::from(Span::styled("Interview", bold)));
    match mode {
        Mode::Interview { draft, field } => {
            let values = [
                draft.interview_type.map(|t| t.label().to_string()).unwrap_or_default(),
                draft.scheduled_date.clone(),
                draft.location.clone(),
                draft.notes.clone(),
            ];
            for (i, (label, value)) in INTERVIEW_FIELDS.iter().zip(values).enumerate() {
                let marker = if i == *field { ">" } else { " " };
                let cursor = if i == *field && i > 0 { "_" } else { "" };
                lines.push(Line::from(format!("{} {}: {}{}", marker, label, value, cursor)));
            }
        }
        _ => match &app.interview {
            Some(interview) => {
                lines.push(Line::from(format!(
                    "  {} on {}",
                    interview.interview_type.label(),
                    interview.scheduled_date
                )));
                if !interview.location.is_empty() {
                    lines.push(Line::from(format!("  {}", interview.location)));
                }
                if !interview.notes.is_empty() {
                    lines.push(Line::from(format!("  {}", interview.notes)));
                }
            }
            None => lines.push(Line::from(Span::styled(
                "  (not scheduled)",
                Style::default().fg(Color::DarkGray),
            ))),
        },
    }

    if *mode == Mode::ConfirmDelete {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Delete this application? (y/n)",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    }

    Text::from(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordId;
    use crate::pipeline::tests::app;
    use crate::pipeline::Buckets;
    use crate::session::{LocalStore, TokenStore};

    fn loaded() -> BoardState {
        let mut pipeline = Pipeline::new();
        let load = pipeline.begin_load();
        pipeline.finish_load(
            load,
            Ok(vec![
                app(1, ApplicationStatus::Applied),
                app(2, ApplicationStatus::Applied),
                app(3, ApplicationStatus::Screening),
            ]),
        );
        BoardState::new(pipeline)
    }

    fn column_ids(state: &BoardState, status: ApplicationStatus) -> Vec<RecordId> {
        state
            .pipeline
            .buckets()
            .column(status)
            .iter()
            .map(|a| a.id.clone())
            .collect()
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let mut state = loaded();
        state.handle_key(KeyCode::Char('j'));
        state.handle_key(KeyCode::Char('j'));
        assert_eq!(state.row, 1);

        state.handle_key(KeyCode::Char('l'));
        assert_eq!((state.column, state.row), (1, 0));

        state.handle_key(KeyCode::Char('l'));
        state.handle_key(KeyCode::Char('l'));
        state.handle_key(KeyCode::Char('l'));
        state.handle_key(KeyCode::Char('l'));
        assert_eq!(state.column, 4);
        assert!(state.current().is_none());
    }

    #[test]
    fn test_shift_right_moves_card_and_cursor() {
        let mut state = loaded();
        state.handle_key(KeyCode::Char('j'));
        let step = state.handle_key(KeyCode::Char('L'));

        let Step::Send(BoardCommand::UpdateStatus(pending)) = step else {
            panic!("expected a status update, got {:?}", step);
        };
        assert_eq!(pending.application_id, RecordId::Number(2));
        assert_eq!(pending.status, ApplicationStatus::Screening);
        assert_eq!(column_ids(&state, ApplicationStatus::Screening), vec![RecordId::Number(3), RecordId::Number(2)]);
        assert_eq!((state.column, state.row), (1, 1));
        assert_eq!(state.current().map(|a| a.id.clone()), Some(RecordId::Number(2)));
    }

    #[test]
    fn test_shift_past_the_edges_sends_nothing() {
        let mut state = loaded();
        assert_eq!(state.handle_key(KeyCode::Char('H')), Step::Stay);
        assert_eq!(state.handle_key(KeyCode::Char('K')), Step::Stay);

        // empty column has nothing to move
        state.column = 2;
        assert_eq!(state.handle_key(KeyCode::Char('L')), Step::Stay);
    }

    #[test]
    fn test_reorder_within_column() {
        let mut state = loaded();
        let step = state.handle_key(KeyCode::Char('J'));
        assert!(matches!(step, Step::Send(BoardCommand::UpdateStatus(_))));
        assert_eq!(column_ids(&state, ApplicationStatus::Applied), vec![RecordId::Number(2), RecordId::Number(1)]);
        assert_eq!(state.row, 1);
    }

    #[test]
    fn test_notes_edit_sends_buffer() {
        let mut state = loaded();
        state.handle_key(KeyCode::Enter);
        assert_eq!(state.mode, Mode::Detail);

        state.handle_key(KeyCode::Char('n'));
        for c in "call back".chars() {
            state.handle_key(KeyCode::Char(c));
        }
        state.handle_key(KeyCode::Backspace);
        let step = state.handle_key(KeyCode::Enter);
        assert_eq!(
            step,
            Step::Send(BoardCommand::SaveNotes {
                id: RecordId::Number(1),
                notes: "call bac".into(),
            })
        );
        assert_eq!(state.mode, Mode::Detail);
    }

    #[test]
    fn test_interview_form_rejects_incomplete_draft() {
        let mut state = loaded();
        state.handle_key(KeyCode::Enter);
        state.handle_key(KeyCode::Char('i'));
        assert_eq!(state.handle_key(KeyCode::Enter), Step::Stay);
        assert!(state.pipeline.notices.has_errors());
        assert!(matches!(state.mode, Mode::Interview { .. }));

        state.handle_key(KeyCode::Right);
        state.handle_key(KeyCode::Tab);
        for c in "2030-06-01T09:00".chars() {
            state.handle_key(KeyCode::Char(c));
        }
        let step = state.handle_key(KeyCode::Enter);
        let Step::Send(BoardCommand::ScheduleInterview { id, interview }) = step else {
            panic!("expected an interview command, got {:?}", step);
        };
        assert_eq!(id, RecordId::Number(1));
        assert_eq!(interview.interview_type, InterviewType::PhoneScreen);
        assert_eq!(interview.scheduled_date, "2030-06-01T09:00");
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let mut state = loaded();
        state.handle_key(KeyCode::Enter);
        state.handle_key(KeyCode::Char('d'));
        assert_eq!(state.handle_key(KeyCode::Char('n')), Step::Stay);
        assert_eq!(state.mode, Mode::Detail);

        state.handle_key(KeyCode::Char('d'));
        let step = state.handle_key(KeyCode::Char('y'));
        assert_eq!(step, Step::Send(BoardCommand::Delete { id: RecordId::Number(1) }));

        // once the delete lands the detail view goes away
        state.pipeline.finish_delete(&RecordId::Number(1), Ok(()));
        state.sync();
        assert_eq!(state.mode, Mode::Browse);
        assert!(state.footer.as_ref().is_some_and(|n| !n.is_error()));
        assert_eq!(state.pipeline.buckets().column(ApplicationStatus::Applied).len(), 1);
    }

    #[test]
    fn test_refresh_issues_load() {
        let mut state = loaded();
        let step = state.handle_key(KeyCode::Char('r'));
        assert!(matches!(step, Step::Send(BoardCommand::Load(_))));
        assert!(state.pipeline.is_loading());
        assert_eq!(state.handle_key(KeyCode::Char('q')), Step::Quit);
    }

    #[test]
    fn test_sync_clamps_cursor_after_reload() {
        let mut state = loaded();
        state.row = 1;
        let load = state.pipeline.begin_load();
        state.pipeline.finish_load(load, Ok(vec![app(5, ApplicationStatus::Applied)]));
        state.sync();
        assert_eq!(state.row, 0);
        assert_eq!(state.pipeline.buckets(), &Buckets::partition(vec![app(5, ApplicationStatus::Applied)]));
    }

    #[test]
    fn test_board_exits_when_session_ends() {
        let store = LocalStore::open_in_memory().unwrap();
        store.save_token("live").unwrap();
        let session = SessionService::new(store);
        session.initialize().unwrap();
        let rx = session.subscribe();
        assert!(ensure_session(&rx).is_ok());

        session.clear().unwrap();
        let err = ensure_session(&rx).unwrap_err();
        assert!(err.to_string().contains("Session expired"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Staff Engineer", 8), "Staff...");
        assert_eq!(truncate("SRE", 8), "SRE");
    }
}
