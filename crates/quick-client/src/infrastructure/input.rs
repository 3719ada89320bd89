//! Console input translation.
//!
//! Turns `crossterm` key and mouse events into what the adapters consume:
//!
//! | Input                 | Graphical session         | Terminal session        |
//! |-----------------------|---------------------------|-------------------------|
//! | key press             | keysym press + release    | VT byte sequence        |
//! | mouse button / move   | [`MouseState`] in pixels  | ignored                 |
//! | `Ctrl+]` then a key   | client [`Command`]        | client [`Command`]      |
//!
//! Consoles report presses only, so each press becomes a complete
//! press/release pair wrapped in its modifiers.

use crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::application::graphical::MouseState;
use crate::domain::hotkeys::{
    KEYSYM_ALT_L, KEYSYM_BACKSPACE, KEYSYM_CONTROL_L, KEYSYM_DELETE, KEYSYM_SHIFT_L,
    KEYSYM_SUPER_L, KEYSYM_TAB,
};

// ── Keysyms ───────────────────────────────────────────────────────────────────

/// X11 keysym for a key, `None` for keys the tunnel has no use for.
pub fn keysym_for(code: KeyCode) -> Option<u32> {
    let keysym = match code {
        KeyCode::Char(c) => {
            let cp = u32::from(c);
            // Latin-1 maps directly; everything else uses the Unicode range.
            if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
                cp
            } else {
                0x0100_0000 | cp
            }
        }
        KeyCode::Enter => 0xFF0D,
        KeyCode::Backspace => KEYSYM_BACKSPACE,
        KeyCode::Tab | KeyCode::BackTab => KEYSYM_TAB,
        KeyCode::Esc => 0xFF1B,
        KeyCode::Home => 0xFF50,
        KeyCode::Left => 0xFF51,
        KeyCode::Up => 0xFF52,
        KeyCode::Right => 0xFF53,
        KeyCode::Down => 0xFF54,
        KeyCode::PageUp => 0xFF55,
        KeyCode::PageDown => 0xFF56,
        KeyCode::End => 0xFF57,
        KeyCode::Insert => 0xFF63,
        KeyCode::Delete => KEYSYM_DELETE,
        KeyCode::F(n @ 1..=24) => 0xFFBE + u32::from(n) - 1,
        _ => return None,
    };
    Some(keysym)
}

/// The press/release sequence for one key event, as `(pressed, keysym)`.
pub fn key_event_keysyms(event: &KeyEvent) -> Vec<(bool, u32)> {
    if event.kind == KeyEventKind::Release {
        return Vec::new();
    }
    let Some(key) = keysym_for(event.code) else {
        return Vec::new();
    };

    let mut modifiers = Vec::new();
    if event.modifiers.contains(KeyModifiers::CONTROL) {
        modifiers.push(KEYSYM_CONTROL_L);
    }
    if event.modifiers.contains(KeyModifiers::ALT) {
        modifiers.push(KEYSYM_ALT_L);
    }
    if event.modifiers.contains(KeyModifiers::SUPER) {
        modifiers.push(KEYSYM_SUPER_L);
    }
    // Shift is already folded into printable characters.
    let shifted = event.code == KeyCode::BackTab
        || (event.modifiers.contains(KeyModifiers::SHIFT) && !matches!(event.code, KeyCode::Char(_)));
    if shifted {
        modifiers.push(KEYSYM_SHIFT_L);
    }

    let mut sequence: Vec<(bool, u32)> = modifiers.iter().map(|&m| (true, m)).collect();
    sequence.push((true, key));
    sequence.push((false, key));
    sequence.extend(modifiers.iter().rev().map(|&m| (false, m)));
    sequence
}

// ── Terminal bytes ────────────────────────────────────────────────────────────

/// VT input for one key event.  `None` for releases and unmapped keys.
pub fn terminal_bytes(event: &KeyEvent) -> Option<String> {
    if event.kind == KeyEventKind::Release {
        return None;
    }
    let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
    let alt = event.modifiers.contains(KeyModifiers::ALT);

    let base = match event.code {
        KeyCode::Char(c) if ctrl => control_char(c)?.to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "\r".to_string(),
        KeyCode::Backspace => "\x7f".to_string(),
        KeyCode::Tab => "\t".to_string(),
        KeyCode::BackTab => "\x1b[Z".to_string(),
        KeyCode::Esc => "\x1b".to_string(),
        KeyCode::Up => "\x1b[A".to_string(),
        KeyCode::Down => "\x1b[B".to_string(),
        KeyCode::Right => "\x1b[C".to_string(),
        KeyCode::Left => "\x1b[D".to_string(),
        KeyCode::Home => "\x1b[H".to_string(),
        KeyCode::End => "\x1b[F".to_string(),
        KeyCode::Insert => "\x1b[2~".to_string(),
        KeyCode::Delete => "\x1b[3~".to_string(),
        KeyCode::PageUp => "\x1b[5~".to_string(),
        KeyCode::PageDown => "\x1b[6~".to_string(),
        KeyCode::F(n) => function_key(n)?.to_string(),
        _ => return None,
    };
    Some(if alt { format!("\x1b{base}") } else { base })
}

fn control_char(c: char) -> Option<char> {
    let byte = match c {
        'a'..='z' => c as u8 - b'a' + 1,
        'A'..='Z' => c as u8 - b'A' + 1,
        ' ' | '@' | '2' => 0x00,
        '[' | '3' => 0x1B,
        '\\' | '4' => 0x1C,
        ']' | '5' => 0x1D,
        '^' | '6' => 0x1E,
        '_' | '7' => 0x1F,
        _ => return None,
    };
    Some(char::from(byte))
}

fn function_key(n: u8) -> Option<&'static str> {
    Some(match n {
        1 => "\x1bOP",
        2 => "\x1bOQ",
        3 => "\x1bOR",
        4 => "\x1bOS",
        5 => "\x1b[15~",
        6 => "\x1b[17~",
        7 => "\x1b[18~",
        8 => "\x1b[19~",
        9 => "\x1b[20~",
        10 => "\x1b[21~",
        11 => "\x1b[23~",
        12 => "\x1b[24~",
        _ => return None,
    })
}

// ── Command prefix ────────────────────────────────────────────────────────────

/// Client-side actions reached through `Ctrl+]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    /// Index into `HOTKEYS`.
    HotKey(usize),
    CopyLastLine,
    Paste,
    Help,
}

/// Key bindings shown by [`Command::Help`].
pub const COMMAND_HELP: &str =
    "Ctrl+] then: q quit | 1-8 key combination | c copy last line | v paste | Ctrl+] send Ctrl+]";

/// Where one key event goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Forward(KeyEvent),
    Command(Command),
    Swallowed,
}

/// Splits console keys into session input and client commands.
#[derive(Debug, Default)]
pub struct CommandRouter {
    armed: bool,
}

fn is_prefix(event: &KeyEvent) -> bool {
    event.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(event.code, KeyCode::Char(']') | KeyCode::Char('5'))
}

impl CommandRouter {
    pub fn route(&mut self, event: KeyEvent) -> Routed {
        if event.kind == KeyEventKind::Release {
            return Routed::Swallowed;
        }
        if !self.armed {
            if is_prefix(&event) {
                self.armed = true;
                return Routed::Swallowed;
            }
            return Routed::Forward(event);
        }

        self.armed = false;
        if is_prefix(&event) {
            return Routed::Forward(event);
        }
        match event.code {
            KeyCode::Char('q') => Routed::Command(Command::Quit),
            KeyCode::Char(c @ '1'..='8') => {
                Routed::Command(Command::HotKey(c as usize - '1' as usize))
            }
            KeyCode::Char('c') => Routed::Command(Command::CopyLastLine),
            KeyCode::Char('v') => Routed::Command(Command::Paste),
            KeyCode::Char('?') | KeyCode::Char('h') => Routed::Command(Command::Help),
            _ => Routed::Swallowed,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

// ── Pointer ───────────────────────────────────────────────────────────────────

/// A pointer event for the graphical adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerAction {
    Down(MouseState),
    Up(MouseState),
    Move(MouseState),
}

/// Converts cell-based console mouse events into pixel positions and keeps
/// track of held buttons.
#[derive(Debug)]
pub struct PointerTracker {
    cell_width: f64,
    cell_height: f64,
    left: bool,
    middle: bool,
    right: bool,
}

impl PointerTracker {
    pub fn new(cell_width: f64, cell_height: f64) -> Self {
        Self {
            cell_width,
            cell_height,
            left: false,
            middle: false,
            right: false,
        }
    }

    pub fn set_cell_size(&mut self, cell_width: f64, cell_height: f64) {
        self.cell_width = cell_width;
        self.cell_height = cell_height;
    }

    fn state(&self, event: &MouseEvent) -> MouseState {
        MouseState {
            x: (f64::from(event.column) + 0.5) * self.cell_width,
            y: (f64::from(event.row) + 0.5) * self.cell_height,
            left: self.left,
            middle: self.middle,
            right: self.right,
            scroll_up: false,
            scroll_down: false,
        }
    }

    fn set_button(&mut self, button: MouseButton, held: bool) {
        match button {
            MouseButton::Left => self.left = held,
            MouseButton::Middle => self.middle = held,
            MouseButton::Right => self.right = held,
        }
    }

    pub fn translate(&mut self, event: &MouseEvent) -> Vec<PointerAction> {
        match event.kind {
            MouseEventKind::Down(button) => {
                self.set_button(button, true);
                vec![PointerAction::Down(self.state(event))]
            }
            MouseEventKind::Up(button) => {
                self.set_button(button, false);
                vec![PointerAction::Up(self.state(event))]
            }
            MouseEventKind::Drag(_) | MouseEventKind::Moved => {
                vec![PointerAction::Move(self.state(event))]
            }
            MouseEventKind::ScrollUp => {
                let released = self.state(event);
                let pressed = MouseState {
                    scroll_up: true,
                    ..released
                };
                vec![PointerAction::Down(pressed), PointerAction::Up(released)]
            }
            MouseEventKind::ScrollDown => {
                let released = self.state(event);
                let pressed = MouseState {
                    scroll_down: true,
                    ..released
                };
                vec![PointerAction::Down(pressed), PointerAction::Up(released)]
            }
            MouseEventKind::ScrollLeft | MouseEventKind::ScrollRight => Vec::new(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    // ── Keysyms ───────────────────────────────────────────────────────────────

    #[test]
    fn test_keysym_mapping() {
        assert_eq!(keysym_for(KeyCode::Char('a')), Some(0x61));
        assert_eq!(keysym_for(KeyCode::Char('é')), Some(0xE9));
        assert_eq!(keysym_for(KeyCode::Char('€')), Some(0x0100_20AC));
        assert_eq!(keysym_for(KeyCode::Enter), Some(0xFF0D));
        assert_eq!(keysym_for(KeyCode::F(1)), Some(0xFFBE));
        assert_eq!(keysym_for(KeyCode::F(12)), Some(0xFFC9));
        assert_eq!(keysym_for(KeyCode::CapsLock), None);
    }

    #[test]
    fn test_plain_key_is_press_then_release() {
        let seq = key_event_keysyms(&key(KeyCode::Char('A'), KeyModifiers::SHIFT));
        assert_eq!(seq, vec![(true, 0x41), (false, 0x41)]);
    }

    #[test]
    fn test_modifiers_wrap_the_key() {
        let seq = key_event_keysyms(&key(
            KeyCode::Left,
            KeyModifiers::CONTROL | KeyModifiers::SHIFT,
        ));
        assert_eq!(
            seq,
            vec![
                (true, KEYSYM_CONTROL_L),
                (true, KEYSYM_SHIFT_L),
                (true, 0xFF51),
                (false, 0xFF51),
                (false, KEYSYM_SHIFT_L),
                (false, KEYSYM_CONTROL_L),
            ]
        );
    }

    #[test]
    fn test_backtab_is_shift_tab() {
        let seq = key_event_keysyms(&key(KeyCode::BackTab, KeyModifiers::SHIFT));
        assert_eq!(
            seq,
            vec![
                (true, KEYSYM_SHIFT_L),
                (true, KEYSYM_TAB),
                (false, KEYSYM_TAB),
                (false, KEYSYM_SHIFT_L)
            ]
        );
    }

    // ── Terminal bytes ────────────────────────────────────────────────────────

    #[test]
    fn test_terminal_bytes() {
        assert_eq!(terminal_bytes(&key(KeyCode::Char('l'), KeyModifiers::NONE)).as_deref(), Some("l"));
        assert_eq!(terminal_bytes(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)).as_deref(), Some("\x03"));
        assert_eq!(terminal_bytes(&key(KeyCode::Char('b'), KeyModifiers::ALT)).as_deref(), Some("\x1bb"));
        assert_eq!(terminal_bytes(&key(KeyCode::Enter, KeyModifiers::NONE)).as_deref(), Some("\r"));
        assert_eq!(terminal_bytes(&key(KeyCode::Up, KeyModifiers::NONE)).as_deref(), Some("\x1b[A"));
        assert_eq!(terminal_bytes(&key(KeyCode::F(5), KeyModifiers::NONE)).as_deref(), Some("\x1b[15~"));
        assert_eq!(terminal_bytes(&key(KeyCode::F(20), KeyModifiers::NONE)), None);
    }

    // ── Command prefix ────────────────────────────────────────────────────────

    #[test]
    fn test_prefix_then_command() {
        // Arrange
        let mut router = CommandRouter::default();

        // Act
        let first = router.route(key(KeyCode::Char(']'), KeyModifiers::CONTROL));
        let armed = router.is_armed();
        let second = router.route(key(KeyCode::Char('3'), KeyModifiers::NONE));

        // Assert
        assert_eq!(first, Routed::Swallowed);
        assert!(armed);
        assert_eq!(second, Routed::Command(Command::HotKey(2)));
        assert!(!router.is_armed());
    }

    #[test]
    fn test_double_prefix_forwards_literal() {
        let mut router = CommandRouter::default();
        let prefix = key(KeyCode::Char(']'), KeyModifiers::CONTROL);
        router.route(prefix);
        assert_eq!(router.route(prefix), Routed::Forward(prefix));
    }

    #[test]
    fn test_unbound_key_after_prefix_is_swallowed() {
        let mut router = CommandRouter::default();
        router.route(key(KeyCode::Char('5'), KeyModifiers::CONTROL));
        assert_eq!(router.route(key(KeyCode::Char('z'), KeyModifiers::NONE)), Routed::Swallowed);
        let plain = key(KeyCode::Char('z'), KeyModifiers::NONE);
        assert_eq!(router.route(plain), Routed::Forward(plain));
    }

    // ── Pointer ───────────────────────────────────────────────────────────────

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn test_pointer_tracks_buttons_and_cell_centres() {
        let mut pointer = PointerTracker::new(8.0, 16.0);

        let down = pointer.translate(&mouse(MouseEventKind::Down(MouseButton::Left), 2, 1));
        let drag = pointer.translate(&mouse(MouseEventKind::Drag(MouseButton::Left), 3, 1));
        let up = pointer.translate(&mouse(MouseEventKind::Up(MouseButton::Left), 3, 1));

        assert_eq!(
            down,
            vec![PointerAction::Down(MouseState {
                left: true,
                ..MouseState::at(20.0, 24.0)
            })]
        );
        assert_eq!(
            drag,
            vec![PointerAction::Move(MouseState {
                left: true,
                ..MouseState::at(28.0, 24.0)
            })]
        );
        assert_eq!(up, vec![PointerAction::Up(MouseState::at(28.0, 24.0))]);
    }

    #[test]
    fn test_scroll_is_press_and_release() {
        let mut pointer = PointerTracker::new(10.0, 10.0);
        let actions = pointer.translate(&mouse(MouseEventKind::ScrollDown, 0, 0));
        assert_eq!(
            actions,
            vec![
                PointerAction::Down(MouseState {
                    scroll_down: true,
                    ..MouseState::at(5.0, 5.0)
                }),
                PointerAction::Up(MouseState::at(5.0, 5.0)),
            ]
        );
    }
}
