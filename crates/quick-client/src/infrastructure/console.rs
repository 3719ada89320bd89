//! Console front end: raw mode, input events, output surface and notices.
//!
//! The console is the only UI of the binary.  Terminal sessions draw the
//! remote shell straight into it.  Graphical sessions have no renderer here
//! and use it for input capture and status lines only.

use std::io::{stdout, Write};
use std::time::Duration;

use anyhow::Context;
use crossterm::cursor::MoveTo;
use crossterm::event::{
    self, DisableBracketedPaste, DisableFocusChange, DisableMouseCapture, EnableBracketedPaste,
    EnableFocusChange, EnableMouseCapture, Event,
};
use crossterm::execute;
use crossterm::terminal::{self, disable_raw_mode, enable_raw_mode, Clear, ClearType, SetTitle};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, warn};

use quick_core::{ErrorPrompt, Notice, RecoveryAction, TerminalSize, ViewportBox};

use crate::application::presenter::Presenter;
use crate::application::terminal::TerminalSurface;

/// How often the input reader checks whether anyone still listens.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Cell size assumed when the console does not report pixels.
const FALLBACK_CELL: (u32, u32) = (8, 16);

// ── Raw mode ──────────────────────────────────────────────────────────────────

/// Raw mode plus bracketed paste, focus events and optionally mouse capture.
/// Everything is restored on drop.
pub struct ConsoleGuard {
    mouse: bool,
}

impl ConsoleGuard {
    /// # Errors
    ///
    /// Fails when stdout is not a terminal.
    pub fn enter(mouse: bool) -> anyhow::Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        let guard = Self { mouse };
        let mut out = stdout();
        execute!(out, EnableBracketedPaste, EnableFocusChange)
            .context("failed to configure console")?;
        if mouse {
            execute!(out, EnableMouseCapture).context("failed to enable mouse capture")?;
        }
        Ok(guard)
    }
}

impl Drop for ConsoleGuard {
    fn drop(&mut self) {
        let mut out = stdout();
        if self.mouse {
            let _ = execute!(out, DisableMouseCapture);
        }
        let _ = execute!(out, DisableFocusChange, DisableBracketedPaste);
        let _ = disable_raw_mode();
    }
}

// ── Input ─────────────────────────────────────────────────────────────────────

/// Forwards console events into a channel until the receiver is dropped.
pub fn spawn_input_reader() -> UnboundedReceiver<Event> {
    let (tx, rx) = unbounded_channel();
    tokio::task::spawn_blocking(move || {
        while !tx.is_closed() {
            match event::poll(POLL_INTERVAL) {
                Ok(true) => match event::read() {
                    Ok(ev) => {
                        if tx.send(ev).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("console read failed: {e}");
                        break;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    warn!("console poll failed: {e}");
                    break;
                }
            }
        }
        debug!("console input reader stopped");
    });
    rx
}

// ── Geometry ──────────────────────────────────────────────────────────────────

/// Console size in cells, 80×24 when unknown.
pub fn console_size() -> TerminalSize {
    terminal::size()
        .map(|(cols, rows)| TerminalSize::new(cols, rows))
        .unwrap_or(TerminalSize::new(80, 24))
}

/// Console size in pixels, estimated from the cell count when the console
/// does not report it.
pub fn window_box() -> ViewportBox {
    match terminal::window_size() {
        Ok(size) if size.width > 0 && size.height > 0 => {
            ViewportBox::new(u32::from(size.width), u32::from(size.height))
        }
        _ => {
            let cells = console_size();
            ViewportBox::new(
                u32::from(cells.cols) * FALLBACK_CELL.0,
                u32::from(cells.rows) * FALLBACK_CELL.1,
            )
        }
    }
}

/// Pixel size of one cell for `window`.
pub fn cell_size(window: ViewportBox, cells: TerminalSize) -> (f64, f64) {
    if cells.cols == 0 || cells.rows == 0 {
        return (f64::from(FALLBACK_CELL.0), f64::from(FALLBACK_CELL.1));
    }
    (
        f64::from(window.width) / f64::from(cells.cols),
        f64::from(window.height) / f64::from(cells.rows),
    )
}

// ── Surface ───────────────────────────────────────────────────────────────────

/// Draws terminal output on stdout.
#[derive(Debug, Default)]
pub struct ConsoleSurface;

impl TerminalSurface for ConsoleSurface {
    fn clear(&mut self) {
        if let Err(e) = execute!(stdout(), Clear(ClearType::All), MoveTo(0, 0)) {
            debug!("console clear failed: {e}");
        }
    }

    fn write(&mut self, text: &str) {
        let mut out = stdout().lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            debug!("console write failed: {e}");
        }
    }

    fn size(&self) -> TerminalSize {
        console_size()
    }
}

// ── Notices ───────────────────────────────────────────────────────────────────

/// Shows notices in the console title and, optionally, as status lines.
///
/// Prompts are held until the session loop asks for them with
/// [`ConsolePresenter::take_prompt`].
pub struct ConsolePresenter {
    title: String,
    echo: bool,
    prompt: Option<ErrorPrompt>,
}

impl ConsolePresenter {
    /// `echo` prints every notice as a line.  Leave it off while a remote
    /// shell owns the screen.
    pub fn new(title: impl Into<String>, echo: bool) -> Self {
        Self {
            title: title.into(),
            echo,
            prompt: None,
        }
    }

    pub fn take_prompt(&mut self) -> Option<ErrorPrompt> {
        self.prompt.take()
    }

    pub fn has_prompt(&self) -> bool {
        self.prompt.is_some()
    }

    /// Prints a line regardless of `echo`.
    pub fn line(&mut self, text: &str) {
        let mut out = stdout().lock();
        let _ = write!(out, "{text}\r\n");
        let _ = out.flush();
    }

    fn status(&mut self, text: &str) {
        let _ = execute!(stdout(), SetTitle(format!("{} - {text}", self.title)));
        if self.echo {
            self.line(text);
        }
    }
}

impl Presenter for ConsolePresenter {
    fn present(&mut self, notice: &Notice) {
        match notice {
            Notice::Loading(text) | Notice::Warning(text) => self.status(text),
            Notice::Success { text, .. } | Notice::Info { text, .. } => self.status(text),
            Notice::DismissModals => self.prompt = None,
            Notice::Prompt(prompt) => {
                self.status(&prompt.message);
                self.prompt = Some(prompt.clone());
            }
            Notice::NotFound => self.line("404 Page not found"),
        }
    }
}

/// Text of a blocking prompt and its key bindings.
pub fn render_prompt(prompt: &ErrorPrompt) -> String {
    let keys = if prompt.can_reload() {
        format!(
            "[r] {}  [any other key] {}",
            RecoveryAction::Reload.label(),
            RecoveryAction::Close.label()
        )
    } else {
        format!("[any key] {}", RecoveryAction::Close.label())
    };
    format!("{} ({})\r\n{keys}", prompt.message, prompt.code)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
