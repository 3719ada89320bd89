//! Session driver.
//!
//! Wires the console, the transports and the adapters together for one
//! session and runs the event loop until the session ends.
//!
//! ```text
//! run()
//!  ├─ resolve route (access / term)
//!  ├─ SessionBootstrap::try_create ── HttpSessionApi (POST /quick)
//!  ├─ term   ─→ spawn_terminal_transport ─→ TerminalMessageAdapter ─┐
//!  └─ access ─→ GuacTunnel::spawn ────────→ GraphicalTunnelAdapter ─┤
//!                                                                    │
//!            tokio::select! { transport events, console input, resize }
//! ```
//!
//! Each loop ends when the connection lifecycle reaches `Disconnected`, when
//! the user quits through the command prefix, or (graphical only) when a
//! blocking error prompt is raised.  A prompt offering "Reload" may turn the
//! result into [`SessionOutcome::Reload`], and the caller starts over.

use anyhow::Context;
use crossterm::event::{Event, KeyCode, KeyEventKind};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, trace};

use quick_core::{
    ClipboardPayload, DecodedPayload, Notice, SessionDescriptor, SessionMode, TerminalSize,
    ViewportManager,
};

use crate::application::bootstrap::{BootstrapError, SessionBootstrap};
use crate::application::context::SessionContext;
use crate::application::graphical::GraphicalTunnelAdapter;
use crate::application::presenter::Presenter;
use crate::application::terminal::{write_bootstrap_failure, TerminalMessageAdapter, TerminalSurface};
use crate::domain::config::ClientConfig;
use crate::domain::hotkeys::HOTKEYS;
use crate::domain::launch::{LaunchParams, Route};
use crate::infrastructure::console::{
    cell_size, console_size, render_prompt, spawn_input_reader, window_box, ConsoleGuard,
    ConsolePresenter, ConsoleSurface,
};
use crate::infrastructure::debounce::ResizeQueue;
use crate::infrastructure::guac::GuacTunnel;
use crate::infrastructure::http_api::HttpSessionApi;
use crate::infrastructure::input::{
    key_event_keysyms, terminal_bytes, Command, CommandRouter, PointerAction, PointerTracker,
    Routed, COMMAND_HELP,
};
use crate::infrastructure::os_clipboard::OsClipboard;
use crate::infrastructure::term_ws::{spawn_terminal_transport, terminal_url};

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The user closed the session, or it ended on its own.
    Closed,
    /// The user picked "Reload" on an error prompt.
    Reload,
}

/// Runs one session from bootstrap to teardown.
///
/// # Errors
///
/// Console setup failures and a display tunnel that refuses to start.
/// Bootstrap and transport failures are shown to the user instead.
pub async fn run(
    config: &ClientConfig,
    payload: DecodedPayload,
    launch: &LaunchParams,
) -> anyhow::Result<SessionOutcome> {
    let route = launch.resolve_route(&payload.descriptor);
    let mode = route.session_mode();
    info!(
        asset = %payload.asset_identity(),
        route = ?route,
        "starting session"
    );

    let bootstrap = SessionBootstrap::new(HttpSessionApi::new(config.server_url.clone())?);

    match route {
        Route::Term => {
            let _console = ConsoleGuard::enter(false)?;
            let session = create_session(&bootstrap, &payload, mode).await;
            run_terminal(config, payload, session).await
        }
        Route::Access => {
            let _console = ConsoleGuard::enter(true)?;
            let session = create_session(&bootstrap, &payload, mode).await;
            run_graphical(config, payload, launch, session).await
        }
    }
}

async fn create_session(
    bootstrap: &SessionBootstrap<HttpSessionApi>,
    payload: &DecodedPayload,
    mode: SessionMode,
) -> Result<SessionDescriptor, BootstrapError> {
    bootstrap.try_create(&payload.asset_identity(), mode).await
}

// ── Terminal ──────────────────────────────────────────────────────────────────

async fn run_terminal(
    config: &ClientConfig,
    payload: DecodedPayload,
    session: Result<SessionDescriptor, BootstrapError>,
) -> anyhow::Result<SessionOutcome> {
    let mut surface = ConsoleSurface;
    let mut presenter = ConsolePresenter::new(payload.display_name(), false);

    let session = match session {
        Ok(session) => session,
        Err(e) => {
            write_bootstrap_failure(&mut surface, &e.user_message());
            return Ok(SessionOutcome::Closed);
        }
    };

    // The terminal viewport is measured in cells and follows the console.
    let viewport = ViewportManager::tracking(surface.size().into());
    let ctx = SessionContext::new(payload, session, viewport);
    let clipboard = ctx.clipboard_bridge(Some(Box::new(OsClipboard::new())));
    let url = terminal_url(config, ctx.session_id(), ctx.viewport.current().into(), &ctx.payload.raw);
    let (outbound, mut events) = spawn_terminal_transport(url);
    let mut adapter =
        TerminalMessageAdapter::new(surface, outbound, ctx, clipboard, config.keepalive_interval);
    presenter.present_all(&adapter.on_session_created());

    let mut input = spawn_input_reader();
    let mut router = CommandRouter::default();
    let mut resizes = ResizeQueue::new(config.resize_debounce);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let notices = adapter.handle_event(event);
                presenter.present_all(&notices);
                if adapter.is_finished() {
                    break;
                }
            }
            event = input.recv() => {
                let Some(event) = event else { break };
                match event {
                    Event::Key(key) => match router.route(key) {
                        Routed::Forward(key) => {
                            if let Some(bytes) = terminal_bytes(&key) {
                                adapter.on_input(&bytes);
                            }
                        }
                        Routed::Command(Command::Quit) => {
                            if !adapter.is_open() {
                                break;
                            }
                            // The transport reports Closed once the socket is down.
                            adapter.teardown();
                        }
                        Routed::Command(Command::Paste) => {
                            presenter.present_all(&adapter.on_paste(None));
                        }
                        Routed::Command(Command::CopyLastLine) => {
                            presenter.present_all(&adapter.on_copy_last_line());
                        }
                        Routed::Command(Command::Help) => presenter.line(COMMAND_HELP),
                        Routed::Command(Command::HotKey(_)) => {
                            debug!("key combinations apply to graphical sessions only");
                        }
                        Routed::Swallowed => {}
                    },
                    Event::Paste(text) => presenter.present_all(&adapter.on_paste(Some(text))),
                    Event::Resize(cols, rows) => resizes.push(TerminalSize::new(cols, rows)),
                    _ => {}
                }
            }
            Some(size) = resizes.next() => adapter.on_window_resize(size),
        }
    }

    resizes.cancel();
    adapter.teardown();
    info!("terminal session ended");
    Ok(SessionOutcome::Closed)
}

// ── Graphical ─────────────────────────────────────────────────────────────────

async fn run_graphical(
    config: &ClientConfig,
    payload: DecodedPayload,
    launch: &LaunchParams,
    session: Result<SessionDescriptor, BootstrapError>,
) -> anyhow::Result<SessionOutcome> {
    let mut presenter = ConsolePresenter::new(payload.display_name(), true);

    let session = match session {
        Ok(session) => session,
        Err(e) => {
            presenter.present(&Notice::warning(format!(
                "Failed to create session, {}.",
                e.user_message()
            )));
            return Ok(SessionOutcome::Closed);
        }
    };

    let window = window_box();
    let viewport =
        ViewportManager::from_params(launch.width.as_deref(), launch.height.as_deref(), window);
    let ctx = SessionContext::new(payload, session, viewport);
    let clipboard = ctx.clipboard_bridge(Some(Box::new(OsClipboard::new())));
    let (tunnel, mut events) = GuacTunnel::spawn(config.session_endpoint(ctx.session_id(), "tunnel"));
    let mut adapter = GraphicalTunnelAdapter::new(tunnel, ctx, clipboard, config);
    let notices = adapter.start().context("failed to start display tunnel")?;
    presenter.present_all(&notices);

    let (cell_width, cell_height) = cell_size(window, console_size());
    let mut pointer = PointerTracker::new(cell_width, cell_height);
    let mut input = spawn_input_reader();
    let mut router = CommandRouter::default();
    let mut resizes = ResizeQueue::new(config.resize_debounce);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let notices = adapter.handle_event(event);
                presenter.present_all(&notices);
                if adapter.is_finished() || presenter.has_prompt() {
                    break;
                }
            }
            event = input.recv() => {
                let Some(event) = event else { break };
                match event {
                    Event::Key(key) => match router.route(key) {
                        Routed::Forward(key) => {
                            for (pressed, keysym) in key_event_keysyms(&key) {
                                if !pressed {
                                    adapter.on_key_up(keysym);
                                } else if adapter.on_key_down(keysym) {
                                    // Raw mode already keeps the console from acting on it.
                                    trace!(keysym, "local key handling suppressed");
                                }
                            }
                        }
                        Routed::Command(Command::Quit) => break,
                        Routed::Command(Command::HotKey(index)) => {
                            match HOTKEYS.get(index) {
                                Some(hotkey) if adapter.hotkeys_available() => {
                                    debug!(combination = hotkey.label, "sending key combination");
                                    presenter.present_all(&adapter.send_combination(hotkey.keysyms));
                                }
                                _ => debug!(index, "key combination not available"),
                            }
                        }
                        Routed::Command(Command::Paste) => {
                            presenter.present_all(&adapter.on_focus_gained());
                        }
                        Routed::Command(Command::CopyLastLine) => {
                            debug!("copy last line applies to terminal sessions only");
                        }
                        Routed::Command(Command::Help) => presenter.line(COMMAND_HELP),
                        Routed::Swallowed => {}
                    },
                    Event::Mouse(mouse) => {
                        for action in pointer.translate(&mouse) {
                            match action {
                                PointerAction::Down(state) => adapter.on_mouse_down(state),
                                PointerAction::Up(state) => adapter.on_mouse_up(state),
                                PointerAction::Move(state) => adapter.on_mouse_move(state),
                            }
                        }
                    }
                    Event::Paste(text) => {
                        presenter.present_all(&adapter.send_clipboard(ClipboardPayload::text(text)));
                    }
                    Event::FocusGained => presenter.present_all(&adapter.on_focus_gained()),
                    Event::Resize(cols, rows) => resizes.push(TerminalSize::new(cols, rows)),
                    _ => {}
                }
            }
            Some(cells) = resizes.next() => {
                let window = window_box();
                let (cell_width, cell_height) = cell_size(window, cells);
                pointer.set_cell_size(cell_width, cell_height);
                adapter.on_window_resize(window);
            }
        }
    }

    resizes.cancel();
    adapter.disconnect();
    info!("graphical session ended");

    match presenter.take_prompt() {
        Some(prompt) => {
            presenter.line(&render_prompt(&prompt));
            Ok(await_choice(&mut input, prompt.can_reload()).await)
        }
        None => Ok(SessionOutcome::Closed),
    }
}

/// Waits for the key that answers an error prompt.
async fn await_choice(input: &mut UnboundedReceiver<Event>, can_reload: bool) -> SessionOutcome {
    while let Some(event) = input.recv().await {
        let Event::Key(key) = event else { continue };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        let reload = matches!(key.code, KeyCode::Char('r') | KeyCode::Enter);
        return if reload && can_reload {
            SessionOutcome::Reload
        } else {
            SessionOutcome::Closed
        };
    }
    SessionOutcome::Closed
}

// ── Tests ─────────────────────────────────────────────────────────────────────
