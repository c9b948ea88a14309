use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::error::{ReaderError, Result};
use crate::panes::ProgressPane;

use super::{UIState, UI};

const SPEED_STEP: f32 = 0.25;
const MIN_SPEED: f32 = 0.25;
const MAX_SPEED: f32 = 4.0;

impl UI {
    pub(super) async fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.state = UIState::Finished;
            return;
        }

        match &self.state {
            UIState::Menu => match key.code {
                KeyCode::Esc => self.close_menu(),
                KeyCode::Up | KeyCode::Char('k') => {
                    self.menu_index = self.menu_index.saturating_sub(1);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.menu_index = (self.menu_index + 1).min(2);
                }
                KeyCode::Enter => match self.menu_index {
                    0 => self.state = UIState::KeyBindings,
                    1 => self.state = UIState::About,
                    _ => self.state = UIState::Finished,
                },
                _ => {}
            },
            UIState::KeyBindings | UIState::About => match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => {
                    self.state = UIState::Menu;
                }
                _ => {}
            },
            UIState::Login { .. } | UIState::Finished => {
                self.state = UIState::Finished;
            }
            UIState::Reading => match key.code {
                KeyCode::Esc => self.open_menu(),
                KeyCode::Char('q') => self.state = UIState::Finished,
                KeyCode::Char(' ') => {
                    let outcome = self.controller.toggle_play_pause().await;
                    self.report(outcome);
                }
                KeyCode::Left | KeyCode::Char('h') => {
                    let outcome = self.controller.previous().await;
                    self.report(outcome);
                }
                KeyCode::Right | KeyCode::Char('l') => {
                    let outcome = self.controller.next().await;
                    self.report(outcome);
                }
                KeyCode::Char('+') | KeyCode::Char('=') => self.step_speed(SPEED_STEP),
                KeyCode::Char('-') => self.step_speed(-SPEED_STEP),
                KeyCode::Char(ch @ '0'..='9') => {
                    let tenths = ch.to_digit(10).unwrap_or(0);
                    let outcome = self.controller.seek(f64::from(tenths) / 10.0).await;
                    self.report(outcome);
                }
                _ => {}
            },
        }
    }

    pub(super) async fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.state != UIState::Reading {
            return;
        }
        if let MouseEventKind::Down(_) = mouse.kind {
            let position = ProgressPane::fraction_at(self.progress_area, mouse.column, mouse.row);
            if let Some(fraction) = position {
                let outcome = self.controller.seek(fraction).await;
                self.report(outcome);
            }
        }
    }

    fn step_speed(&mut self, delta: f32) {
        let speed = (self.controller.speed() + delta).clamp(MIN_SPEED, MAX_SPEED);
        let outcome = self.controller.set_speed(speed);
        self.report(outcome);
    }

    /// Surface a controller outcome in the status line. Session-ending errors
    /// stop the reader.
    pub(super) fn report(&mut self, outcome: Result<()>) {
        match outcome {
            Ok(()) => {}
            Err(ReaderError::Authentication) => {
                self.auth.redirect_to_login();
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, "Session ended");
                self.message = Some(e.to_string());
                self.state = UIState::Finished;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Playback problem");
                self.message = Some(e.to_string());
            }
        }
    }

    pub(super) fn open_menu(&mut self) {
        self.prev_state = Some(Box::new(self.state.clone()));
        self.menu_index = 0;
        self.state = UIState::Menu;
    }

    pub(super) fn close_menu(&mut self) {
        self.state = self
            .prev_state
            .take()
            .map(|s| *s)
            .unwrap_or(UIState::Reading);
    }
}
