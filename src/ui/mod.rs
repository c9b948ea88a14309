mod playback;
mod rendering;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, layout::Rect, Terminal};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::audio::PlaybackFinished;
use crate::engine::PlaybackController;
use crate::panes::{ProgressPane, SentencesPane, StatusBarPane};
use crate::speech::{AuthProvider, ChannelEvent, ConnectionFeed, EventStream};

const FRAME_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Debug, Clone, PartialEq)]
enum UIState {
    Reading,
    Menu,
    KeyBindings,
    About,
    /// The session was rejected; shows where to log in.
    Login { url: String },
    Finished,
}

/// What woke the event loop.
enum Wake {
    Connected(EventStream),
    Channel(Option<ChannelEvent>),
    Finished(PlaybackFinished),
    PollLoad,
    Frame,
}

/// Terminal front-end of one reading session.
pub struct UI {
    state: UIState,
    controller: PlaybackController,
    auth: Arc<dyn AuthProvider>,
    feed: ConnectionFeed,
    events: Option<EventStream>,
    finished_rx: mpsc::UnboundedReceiver<PlaybackFinished>,
    poll_interval: Duration,
    sentences: SentencesPane,
    progress: ProgressPane,
    status_bar: StatusBarPane,
    progress_area: Rect,
    should_exit: Arc<AtomicBool>,
    menu_index: usize,
    prev_state: Option<Box<UIState>>,
    message: Option<String>,
}

impl UI {
    pub fn new(
        controller: PlaybackController,
        auth: Arc<dyn AuthProvider>,
        feed: ConnectionFeed,
        finished_rx: mpsc::UnboundedReceiver<PlaybackFinished>,
        poll_interval: Duration,
    ) -> Self {
        let should_exit = Arc::new(AtomicBool::new(false));
        Self::setup_signal_handler(should_exit.clone());

        Self {
            state: UIState::Reading,
            controller,
            auth,
            feed,
            events: None,
            finished_rx,
            poll_interval,
            sentences: SentencesPane,
            progress: ProgressPane,
            status_bar: StatusBarPane,
            progress_area: Rect::default(),
            should_exit,
            menu_index: 0,
            prev_state: None,
            message: None,
        }
    }

    fn setup_signal_handler(should_exit: Arc<AtomicBool>) {
        let result = ctrlc::set_handler(move || {
            let _ = disable_raw_mode();
            let _ = execute!(
                io::stdout(),
                LeaveAlternateScreen,
                DisableMouseCapture,
                crossterm::cursor::Show
            );
            should_exit.store(true, Ordering::SeqCst);
            std::process::exit(0);
        });
        if let Err(e) = result {
            tracing::warn!(error = %e, "Could not install signal handler");
        }
    }

    /// The login URL, when the session ended in a login redirect.
    pub fn login_url(&self) -> Option<&str> {
        match &self.state {
            UIState::Login { url } => Some(url),
            _ => None,
        }
    }

    /// Runs the main UI event loop until the reader quits.
    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_loop(&mut terminal).await;

        self.cleanup(&mut terminal)?;

        result
    }

    fn cleanup(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        Ok(())
    }

    async fn run_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<()> {
        let mut frame_tick = tokio::time::interval(FRAME_INTERVAL);
        frame_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut load_tick = tokio::time::interval(self.poll_interval);
        load_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.should_exit.load(Ordering::Relaxed) {
                self.state = UIState::Finished;
            }
            if let Some(url) = self.auth.pending_login() {
                if !matches!(self.state, UIState::Login { .. } | UIState::Finished) {
                    self.state = UIState::Login { url };
                }
            }
            if self.state == UIState::Finished {
                break;
            }

            let wake = tokio::select! {
                Some(stream) = self.feed.recv() => Wake::Connected(stream),
                event = next_event(&mut self.events) => Wake::Channel(event),
                Some(finished) = self.finished_rx.recv() => Wake::Finished(finished),
                _ = load_tick.tick() => Wake::PollLoad,
                _ = frame_tick.tick() => Wake::Frame,
            };

            match wake {
                Wake::Connected(stream) => {
                    tracing::debug!("Following new synthesis connection");
                    self.events = Some(stream);
                }
                Wake::Channel(Some(event)) => {
                    let outcome = self.controller.handle_channel_event(event).await;
                    self.report(outcome);
                }
                Wake::Channel(None) => {
                    tracing::debug!("Synthesis connection ended");
                    self.events = None;
                }
                Wake::Finished(finished) => {
                    let outcome = self.controller.on_playback_finished(finished).await;
                    self.report(outcome);
                }
                Wake::PollLoad => {
                    let outcome = self.controller.poll_load().await.map(|_| ());
                    self.report(outcome);
                }
                Wake::Frame => {
                    while event::poll(Duration::ZERO)? {
                        let event = event::read()?;
                        self.handle_input(event).await;
                    }
                    terminal.draw(|f| self.render(f))?;
                }
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, event: Event) {
        match event {
            Event::Key(key) => self.handle_key(key).await,
            Event::Mouse(mouse) => self.handle_mouse(mouse).await,
            _ => {}
        }
    }
}

async fn next_event(events: &mut Option<EventStream>) -> Option<ChannelEvent> {
    match events.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
