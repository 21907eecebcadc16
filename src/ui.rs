use anyhow::Result;
use crossterm::event::{self, Event};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::app::App;
use crate::bus::Bus;
use crate::command::{Command, Group};
use crate::display::LiveLabel;
use crate::feedback::Variant;

const TITLE: &str = "MAV Tools";
const KEY_HINTS: &str =
    " ←/→ select   Enter press   1-8 direct   d toggle dark mode   q quit ";

struct Palette {
    bg: Color,
    fg: Color,
    accent: Color,
    muted: Color,
}

impl Palette {
    fn for_theme(dark: bool) -> Self {
        if dark {
            Self {
                bg: Color::Black,
                fg: Color::White,
                accent: Color::Yellow,
                muted: Color::DarkGray,
            }
        } else {
            Self {
                bg: Color::White,
                fg: Color::Black,
                accent: Color::Blue,
                muted: Color::Gray,
            }
        }
    }
}

/// Ticks at `period`, drains pending input, and redraws when something
/// visible changed. Returns when the operator quits.
pub async fn run<Bk: Backend, B: Bus>(
    terminal: &mut Terminal<Bk>,
    mut app: App<B>,
    period: Duration,
) -> Result<()> {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut clock = String::new();

    info!("UI loop running at {:?} per tick", period);
    loop {
        ticker.tick().await;

        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) => app.handle_key(key).await,
                Event::Resize(_, _) => app.mark_dirty(),
                _ => {}
            }
        }
        if app.should_quit() {
            info!("Quit requested");
            return Ok(());
        }

        let mut redraw = app.tick();
        let now = chrono::Local::now().format("%H:%M:%S").to_string();
        if now != clock {
            clock = now;
            redraw = true;
        }
        if redraw {
            terminal.draw(|frame| render(frame, &app, &clock))?;
        }
    }
}

pub fn render<B: Bus>(frame: &mut Frame, app: &App<B>, clock: &str) {
    let palette = Palette::for_theme(app.is_dark());
    let area = frame.area();
    frame.render_widget(
        Block::default().style(Style::default().bg(palette.bg).fg(palette.fg)),
        area,
    );

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // header
            Constraint::Length(1),
            Constraint::Length(1), // flight mode
            Constraint::Length(3), // flight mode controls
            Constraint::Length(1), // arming state
            Constraint::Length(3), // arming controls
            Constraint::Length(1), // battery
            Constraint::Length(1), // status
            Constraint::Min(0),
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(frame, rows[0], clock, &palette);
    render_value(frame, rows[2], "Current Flight Mode: ", &app.flight_mode, &palette);
    render_controls(frame, rows[3], app, Group::FlightMode, &palette);
    render_value(frame, rows[4], "Current Arming State: ", &app.arming_state, &palette);
    render_controls(frame, rows[5], app, Group::Arming, &palette);
    render_value(frame, rows[6], "Battery Status: ", &app.battery, &palette);
    render_status(frame, rows[7], app.status());

    frame.render_widget(
        Paragraph::new(KEY_HINTS).style(Style::default().fg(palette.bg).bg(palette.accent)),
        rows[9],
    );
}

fn render_header(frame: &mut Frame, area: Rect, clock: &str, palette: &Palette) {
    let style = Style::default().fg(palette.bg).bg(palette.accent);
    let parts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(clock.len() as u16 + 1)])
        .split(area);
    frame.render_widget(Paragraph::new(format!(" {}", TITLE)).style(style), parts[0]);
    frame.render_widget(
        Paragraph::new(format!("{} ", clock))
            .alignment(Alignment::Right)
            .style(style.add_modifier(Modifier::BOLD)),
        parts[1],
    );
}

fn render_value(frame: &mut Frame, area: Rect, title: &str, label: &LiveLabel, palette: &Palette) {
    let line = Line::from(vec![
        Span::styled(
            format!(" {}", title),
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(label.value().to_string(), Style::default().fg(palette.fg)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_controls<B: Bus>(
    frame: &mut Frame,
    area: Rect,
    app: &App<B>,
    group: Group,
    palette: &Palette,
) {
    let commands: Vec<Command> = Command::in_group(group).collect();
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Ratio(1, commands.len() as u32); commands.len()])
        .split(area);

    for (command, cell) in commands.into_iter().zip(cells.iter()) {
        let style = match app.variant(command) {
            Variant::Default => Style::default().fg(palette.fg).bg(palette.bg),
            Variant::Success => Style::default().fg(Color::Black).bg(Color::Green),
            Variant::Error => Style::default().fg(Color::White).bg(Color::Red),
        };
        let border = if app.focused() == command {
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.muted)
        };
        let button = Paragraph::new(command.label())
            .alignment(Alignment::Center)
            .style(style)
            .block(Block::default().borders(Borders::ALL).border_style(border));
        frame.render_widget(button, *cell);
    }
}

fn render_status(frame: &mut Frame, area: Rect, status: Option<&str>) {
    let text = status.unwrap_or_default();
    frame.render_widget(
        Paragraph::new(format!(" {}", text)).style(Style::default().fg(Color::Red)),
        area,
    );
}
