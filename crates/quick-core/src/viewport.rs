//! Viewport sizing and display scaling.
//!
//! A session either runs at a fixed size (both `width` and `height` launch
//! parameters supplied and valid) or tracks the local window.  In fixed mode
//! window resizes are still observed but never reach the adapter.

/// A width × height box, in pixels (graphical) or cells (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportBox {
    pub width: u32,
    pub height: u32,
}

impl ViewportBox {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Owns the viewport of one session.
#[derive(Debug, Clone)]
pub struct ViewportManager {
    fixed: Option<ViewportBox>,
    window: ViewportBox,
}

fn parse_dimension(raw: Option<&str>) -> Option<u32> {
    raw.map(str::trim)
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|v| *v > 0)
}

impl ViewportManager {
    /// Builds the viewport from the optional `width`/`height` launch
    /// parameters and the current window size.
    ///
    /// Fixed mode requires both values to be positive integers.  One missing
    /// or invalid value means tracking mode.
    pub fn from_params(width: Option<&str>, height: Option<&str>, window: ViewportBox) -> Self {
        let fixed = match (parse_dimension(width), parse_dimension(height)) {
            (Some(w), Some(h)) => Some(ViewportBox::new(w, h)),
            _ => None,
        };
        Self { fixed, window }
    }

    /// Tracking viewport that follows the window.
    pub fn tracking(window: ViewportBox) -> Self {
        Self {
            fixed: None,
            window,
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed.is_some()
    }

    /// The effective viewport: the fixed box, or the last known window size.
    pub fn current(&self) -> ViewportBox {
        self.fixed.unwrap_or(self.window)
    }

    /// Last observed window size, regardless of mode.
    pub fn window(&self) -> ViewportBox {
        self.window
    }

    /// Records a window resize.
    ///
    /// Returns the new box when the adapter must be told, `None` in fixed
    /// mode or when the size did not change.
    pub fn on_window_resize(&mut self, window: ViewportBox) -> Option<ViewportBox> {
        let changed = self.window != window;
        self.window = window;
        if self.is_fixed() || !changed {
            return None;
        }
        Some(window)
    }
}

/// Scale factor applied to the remote display.
///
/// Both ratios divide by the display height; `display_width` does not take
/// part.  Mouse coordinates are divided by this same value, so the two must
/// stay in step.  A zero-height display yields `1.0`.
pub fn display_scale(viewport: ViewportBox, _display_width: u32, display_height: u32) -> f64 {
    if display_height == 0 {
        return 1.0;
    }
    let by_height = f64::from(viewport.height) / f64::from(display_height);
    let by_width = f64::from(viewport.width) / f64::from(display_height);
    by_height.min(by_width)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
