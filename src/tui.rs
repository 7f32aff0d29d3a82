use anyhow::Result;
use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::board::{FetchTicket, JobBoard, Phase};
use crate::display;
use crate::fetcher::{FetchError, JobFeed};
use crate::models::JobListing;

type FetchOutcome = (FetchTicket, Result<Vec<JobListing>, FetchError>);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

struct AppState {
    board: JobBoard,
    selected: usize,
    scroll_offset: u16,
}

impl AppState {
    fn new(board: JobBoard) -> Self {
        Self {
            board,
            selected: 0,
            scroll_offset: 0,
        }
    }

    fn jobs(&self) -> &[JobListing] {
        &self.board.state().jobs
    }

    fn current_job(&self) -> Option<&JobListing> {
        self.jobs().get(self.selected)
    }

    fn next(&mut self) {
        if !self.jobs().is_empty() && self.selected < self.jobs().len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }
}

fn spawn_fetch(feed: &Arc<dyn JobFeed>, ticket: FetchTicket, tx: &Sender<FetchOutcome>) {
    let feed = Arc::clone(feed);
    let tx = tx.clone();
    thread::spawn(move || {
        let result = feed.fetch(&ticket.query, ticket.page);
        // receiver gone means the UI already exited
        let _ = tx.send((ticket, result));
    });
}

/// Browse listings interactively. The board's draft should already hold the
/// filters to start with; they are applied on entry.
pub fn run_browse(feed: Arc<dyn JobFeed>, board: JobBoard) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut state = AppState::new(board);
    let ticket = state.board.apply_filters();
    spawn_fetch(&feed, ticket, &tx);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, &feed, &tx, &rx);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    feed: &Arc<dyn JobFeed>,
    tx: &Sender<FetchOutcome>,
    rx: &Receiver<FetchOutcome>,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        while let Ok((ticket, result)) = rx.try_recv() {
            if state.board.complete(&ticket, result) {
                state.selected = 0;
                state.scroll_offset = 0;
            }
        }
        list_state.select(if state.jobs().is_empty() { None } else { Some(state.selected) });

        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let ticket = match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => {
                    state.next();
                    None
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    state.prev();
                    None
                }
                KeyCode::Char('J') | KeyCode::PageDown => {
                    state.scroll_down();
                    None
                }
                KeyCode::Char('K') | KeyCode::PageUp => {
                    state.scroll_up();
                    None
                }
                KeyCode::Char('n') | KeyCode::Right => state.board.next_page(),
                KeyCode::Char('p') | KeyCode::Left => state.board.prev_page(),
                KeyCode::Char('r') => Some(state.board.refresh()),
                KeyCode::Char('x') => Some(state.board.reset_filters()),
                _ => None,
            };
            if let Some(ticket) = ticket {
                spawn_fetch(feed, ticket, tx);
            }
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let board = &state.board;
    let header = Paragraph::new(format!(
        " {} jobs | page {} | {}",
        board.source().display_name(),
        board.page(),
        board.active_query().summary()
    ))
    .style(Style::default().add_modifier(Modifier::BOLD));
    frame.render_widget(header, rows[0]);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[1]);

    // Left panel: job list
    let items: Vec<ListItem> = state
        .jobs()
        .iter()
        .map(|job| {
            let org = job.organization.as_deref().unwrap_or("?");
            ListItem::new(format!("{} | {}", display::truncate(&job.title, 40), org))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Jobs ({}) ", state.jobs().len()
        )))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: job detail
    let detail = build_detail(state);
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);

    // Footer: fetch status or help
    let footer = match board.state().phase {
        Phase::Loading => Paragraph::new(" Loading jobs...").style(Style::default().fg(Color::Yellow)),
        Phase::Failed => Paragraph::new(format!(
            " Error: {}",
            board.state().error.as_deref().unwrap_or("unknown error")
        ))
        .style(Style::default().fg(Color::Red)),
        Phase::Idle | Phase::Success => {
            let next = if board.has_next() { "n:next " } else { "" };
            let prev = if board.has_prev() { "p:prev " } else { "" };
            Paragraph::new(format!(
                " j/k:navigate  J/K:scroll  {}{}r:refresh  x:reset filters  q:quit",
                prev, next
            ))
            .style(Style::default().fg(Color::DarkGray))
        }
    };
    frame.render_widget(footer, rows[2]);
}

fn build_detail(state: &AppState) -> Text<'_> {
    let Some(job) = state.current_job() else {
        return Text::raw(match state.board.state().phase {
            Phase::Success => "No jobs found.",
            _ => "",
        });
    };

    let mut lines: Vec<Line> = Vec::new();

    // Header
    lines.push(Line::from(Span::styled(
        job.title.as_str(),
        Style::default().add_modifier(Modifier::BOLD),
    )));

    if let Some(org) = &job.organization {
        lines.push(Line::from(format!("at {}", org)));
    }

    let mode_style = match job.remote_derived {
        Some(true) => Style::default().fg(Color::Green),
        _ => Style::default().fg(Color::Cyan),
    };
    lines.push(Line::from(Span::styled(display::work_mode(job.remote_derived), mode_style)));

    let locations = display::locations(job);
    if !locations.is_empty() {
        lines.push(Line::from(format!("Location: {}", locations)));
    }

    if let Some(salary) = job.salary_raw.as_ref().and_then(display::salary_range) {
        lines.push(Line::from(format!("Salary: {}", salary)));
    }

    lines.push(Line::from(Span::styled(
        display::posted_label(job, Utc::now()),
        Style::default().fg(Color::DarkGray),
    )));

    if let Some(url) = &job.url {
        lines.push(Line::from(format!("Apply: {}", url)));
    }

    lines.push(Line::from(""));

    if let Some(text) = job.description_text() {
        lines.push(Line::from(Span::styled(
            "Description",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for line in textwrap::fill(text, 70).lines() {
            lines.push(Line::from(line.to_string()));
        }
    } else {
        lines.push(Line::from(Span::styled(
            "(No description fetched)",
            Style::default().fg(Color::DarkGray),
        )));
    }

    Text::from(lines)
}
