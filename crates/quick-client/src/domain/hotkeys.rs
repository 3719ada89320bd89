//! Predefined key combinations for graphical sessions.
//!
//! Values are X11 keysyms as understood by the display tunnel.

/// Left Control.
pub const KEYSYM_CONTROL_L: u32 = 0xFFE3;
/// Left Shift.
pub const KEYSYM_SHIFT_L: u32 = 0xFFE1;
/// Left Alt.
pub const KEYSYM_ALT_L: u32 = 0xFFE9;
/// Left Super ("Windows" key).
pub const KEYSYM_SUPER_L: u32 = 0xFFEB;
pub const KEYSYM_TAB: u32 = 0xFF09;
pub const KEYSYM_BACKSPACE: u32 = 0xFF08;
pub const KEYSYM_DELETE: u32 = 0xFFFF;

/// A named combination offered in the hotkey menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotKey {
    pub label: &'static str,
    pub keysyms: &'static [u32],
}

/// Menu order.
pub const HOTKEYS: &[HotKey] = &[
    HotKey {
        label: "Alt + Tab",
        keysyms: &[KEYSYM_ALT_L, KEYSYM_TAB],
    },
    HotKey {
        label: "Ctrl + Alt + Delete",
        keysyms: &[KEYSYM_CONTROL_L, KEYSYM_ALT_L, KEYSYM_DELETE],
    },
    HotKey {
        label: "Ctrl + Alt + Backspace",
        keysyms: &[KEYSYM_CONTROL_L, KEYSYM_ALT_L, KEYSYM_BACKSPACE],
    },
    HotKey {
        label: "Windows + D",
        keysyms: &[KEYSYM_SUPER_L, 'd' as u32],
    },
    HotKey {
        label: "Windows + E",
        keysyms: &[KEYSYM_SUPER_L, 'e' as u32],
    },
    HotKey {
        label: "Windows + R",
        keysyms: &[KEYSYM_SUPER_L, 'r' as u32],
    },
    HotKey {
        label: "Windows + X",
        keysyms: &[KEYSYM_SUPER_L, 'x' as u32],
    },
    HotKey {
        label: "Windows",
        keysyms: &[KEYSYM_SUPER_L],
    },
];

/// `true` for protocols whose sessions offer the hotkey menu.
pub fn hotkeys_supported(protocol: &str) -> bool {
    matches!(protocol, "rdp" | "vnc")
}
