use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::bus::{Bus, Names};
use crate::command::{dispatch, Command};
use crate::display::LiveLabel;
use crate::feedback::{Feedback, Variant};
use crate::telemetry::Telemetry;

/// Dashboard state owned by the UI context.
pub struct App<B: Bus> {
    bus: Arc<B>,
    names: Names,
    telemetry: &'static Telemetry,
    pub flight_mode: LiveLabel,
    pub arming_state: LiveLabel,
    pub battery: LiveLabel,
    feedback: Feedback,
    feedback_seen: u64,
    focus: usize,
    dark: bool,
    /// Text of the last transport failure, cleared by the next call that
    /// gets a response.
    status: Option<String>,
    dirty: bool,
    should_quit: bool,
}

impl<B: Bus> App<B> {
    pub fn new(
        bus: Arc<B>,
        names: Names,
        telemetry: &'static Telemetry,
        feedback_delay: Duration,
        dark: bool,
    ) -> Self {
        Self {
            bus,
            names,
            telemetry,
            flight_mode: LiveLabel::flight_mode(),
            arming_state: LiveLabel::arming_state(),
            battery: LiveLabel::battery_status(),
            feedback: Feedback::new(feedback_delay),
            feedback_seen: 0,
            focus: 0,
            dark,
            status: None,
            dirty: true,
            should_quit: false,
        }
    }

    /// Re-reads the telemetry labels. Returns whether anything on screen
    /// changed since the previous tick.
    pub fn tick(&mut self) -> bool {
        let mut changed = std::mem::take(&mut self.dirty);
        changed |= self.flight_mode.refresh(self.telemetry);
        changed |= self.arming_state.refresh(self.telemetry);
        changed |= self.battery.refresh(self.telemetry);

        let version = self.feedback.version();
        if version != self.feedback_seen {
            self.feedback_seen = version;
            changed = true;
        }
        changed
    }

    pub async fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        self.dirty = true;
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('d') => self.toggle_theme(),
            KeyCode::Right | KeyCode::Tab => self.focus_next(),
            KeyCode::Left | KeyCode::BackTab => self.focus_prev(),
            KeyCode::Enter | KeyCode::Char(' ') => {
                self.press(Command::ALL[self.focus]).await;
            }
            KeyCode::Char(c @ '1'..='8') => {
                let index = c as usize - '1' as usize;
                self.focus = index;
                self.press(Command::ALL[index]).await;
            }
            _ => {}
        }
    }

    /// Runs `command` to completion, then shows its outcome on the control.
    /// The UI context is blocked for as long as the call takes.
    pub async fn press(&mut self, command: Command) -> JoinHandle<()> {
        let variant = match dispatch(&*self.bus, &self.names, command).await {
            Ok(response) => {
                self.status = None;
                Variant::from_outcome(response.accepted())
            }
            Err(e) => {
                self.status = Some(format!("{} failed: {:#}", command.label(), e));
                Variant::Error
            }
        };
        self.dirty = true;
        self.feedback.show(command, variant)
    }

    pub fn toggle_theme(&mut self) {
        self.dark = !self.dark;
        self.dirty = true;
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % Command::ALL.len();
    }

    pub fn focus_prev(&mut self) {
        self.focus = (self.focus + Command::ALL.len() - 1) % Command::ALL.len();
    }

    pub fn focused(&self) -> Command {
        Command::ALL[self.focus]
    }

    pub fn variant(&self, command: Command) -> Variant {
        self.feedback.variant(command)
    }

    pub fn is_dark(&self) -> bool {
        self.dark
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Forces a redraw on the next tick, e.g. after a terminal resize.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}
