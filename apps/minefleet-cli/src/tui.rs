//! Terminal dashboard for `minefleet simulate --watch`.
//!
//! Steps the simulation on the configured tick and shows the agent's
//! position, state, tool wear and the most recent connection events.

use crate::Simulation;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use minefleet_core::Lifecycle;
use minefleet_core::engine::EngineSnapshot;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

const EVENT_LOG_LEN: usize = 50;

/// Dashboard state
struct DashboardApp {
    /// Latest engine view
    snapshot: Option<EngineSnapshot>,

    /// Equipped tool as (id, durability, max)
    tool: Option<(String, u32, u32)>,

    lifecycle: Lifecycle,
    progress: u32,
    ticks: u64,

    /// Most recent events, newest last
    events: VecDeque<String>,

    finished: bool,
    should_quit: bool,
}

impl DashboardApp {
    fn new() -> Self {
        Self {
            snapshot: None,
            tool: None,
            lifecycle: Lifecycle::Disconnected,
            progress: 0,
            ticks: 0,
            events: VecDeque::with_capacity(EVENT_LOG_LEN),
            finished: false,
            should_quit: false,
        }
    }

    fn handle_input(&mut self, key: KeyCode) {
        if matches!(key, KeyCode::Char('q') | KeyCode::Esc) {
            self.should_quit = true;
        }
    }

    fn push_event(&mut self, line: String) {
        if self.events.len() == EVENT_LOG_LEN {
            self.events.pop_front();
        }
        self.events.push_back(line);
    }

    /// Steps the simulation once unless it already finished.
    fn advance(&mut self, sim: &mut Simulation) -> Result<()> {
        if !self.finished {
            let report = sim.tick()?;
            for event in &report.events {
                self.push_event(serde_json::to_string(event)?);
            }
            if let Some(step) = report.step {
                self.push_event(format!("step: {step:?}"));
            }
            self.finished = sim.is_done()?;
        }

        self.snapshot = Some(sim.runtime.snapshot()?);
        self.tool = sim
            .runtime
            .current_tool()?
            .map(|t| (t.id, t.durability, t.max_durability));
        self.lifecycle = sim.runtime.connection().lifecycle();
        self.progress = sim.runtime.mining_stats()?.progress_percent();
        self.ticks = sim.ticks;
        Ok(())
    }
}

/// Run the dashboard until the user quits
pub async fn run_dashboard(sim: &mut Simulation, tick: Duration) -> Result<()> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("Failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let mut app = DashboardApp::new();
    let result = run_app(&mut terminal, &mut app, sim, tick).await;

    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    result
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut DashboardApp,
    sim: &mut Simulation,
    tick: Duration,
) -> Result<()> {
    loop {
        app.advance(sim)?;
        terminal
            .draw(|f| ui(f, app))
            .map_err(|e| anyhow::anyhow!("Failed to draw UI: {}", e))?;

        if event::poll(tick).context("Failed to poll events")?
            && let Event::Key(key) = event::read().context("Failed to read event")?
            && key.kind == KeyEventKind::Press
        {
            app.handle_input(key.code);
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn ui(frame: &mut Frame, app: &DashboardApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(8), // Agent
            Constraint::Length(3), // Progress
            Constraint::Min(5),    // Events
            Constraint::Length(3), // Status bar
        ])
        .split(frame.area());

    let agent_id = app
        .snapshot
        .as_ref()
        .map_or("-", |s| s.agent_id.as_str());
    let title = Paragraph::new(Line::from(vec![
        Span::styled(
            "Minefleet - ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            agent_id,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(title, chunks[0]);

    render_agent(frame, app, chunks[1]);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(app.progress.min(100) as u16);
    frame.render_widget(gauge, chunks[2]);

    let items: Vec<ListItem> = app
        .events
        .iter()
        .rev()
        .map(|e| ListItem::new(e.as_str()))
        .collect();
    let events = List::new(items).block(Block::default().borders(Borders::ALL).title("Events"));
    frame.render_widget(events, chunks[3]);

    let status = if app.finished {
        "Finished - press 'q' to quit"
    } else {
        "Running - press 'q' to stop"
    };
    let status = Paragraph::new(status)
        .style(Style::default().fg(Color::Green))
        .block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(status, chunks[4]);
}

fn render_agent(frame: &mut Frame, app: &DashboardApp, area: Rect) {
    let label = |name: &str| Span::styled(format!("{name:<12}"), Style::default().fg(Color::Gray));

    let mut lines = vec![Line::from(vec![
        label("connection"),
        Span::raw(format!("{:?}", app.lifecycle)),
    ])];
    if let Some(s) = &app.snapshot {
        lines.push(Line::from(vec![label("state"), Span::raw(s.state.to_string())]));
        lines.push(Line::from(vec![
            label("position"),
            Span::raw(s.position.to_string()),
        ]));
        lines.push(Line::from(vec![
            label("queued"),
            Span::raw(format!("{} (route {})", s.queued, s.route_remaining)),
        ]));
        lines.push(Line::from(vec![
            label("mined"),
            Span::raw(s.mined_blocks.to_string()),
        ]));
    }
    let tool = match &app.tool {
        Some((id, d, m)) => format!("{id} {d}/{m}"),
        None => "none".to_string(),
    };
    lines.push(Line::from(vec![label("tool"), Span::raw(tool)]));
    lines.push(Line::from(vec![label("ticks"), Span::raw(app.ticks.to_string())]));

    let agent = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Agent"));
    frame.render_widget(agent, area);
}
