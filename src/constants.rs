//! Application-wide constants
//!
//! Magic numbers and string literals used throughout the banner, kept in one
//! place so the geometry and protocol values have a single source of truth.

/// Configuration file constants
pub mod config {
    /// Global configuration file read when --config is not given
    pub const DEFAULT_PATH: &str = "/etc/classification-banner/banner.conf";
}

/// Banner strip geometry and labels
pub mod banner {
    /// Nominal strip height requested before text layout fixes the real height
    pub const NOMINAL_HEIGHT: u16 = 5;

    /// Vertical padding above and below the rendered text line, in pixels
    pub const VERTICAL_PADDING: u16 = 2;

    /// Horizontal inset of the left/right text slots from the strip edges
    pub const SIDE_INSET: u16 = 20;

    /// Width of the username/hostname/hint side slots, in character cells
    pub const SIDE_CELL_CHARS: u16 = 20;

    /// Hint shown beside the message while escape-to-hide is active
    pub const ESC_HINT: &str = "  (ESC to hide temporarily)  ";

    /// Font family used for the escape hint regardless of the label font
    pub const ESC_HINT_FONT: &str = "liberation-sans";

    /// Size token used for the escape hint
    pub const ESC_HINT_SIZE: &str = "xx-small";
}

/// Escape-to-hide constants
pub mod esc {
    /// X11 keysym generated by the Escape key
    pub const ESCAPE_KEYSYM: u32 = 0xff1b;

    /// Lower clamp bound for esc_timeout, in seconds
    pub const MIN_TIMEOUT: u64 = 1;

    /// Upper clamp bound for esc_timeout, in seconds
    pub const MAX_TIMEOUT: u64 = 60;
}

/// X11 protocol constants
pub mod x11 {
    /// Override redirect flag for unmanaged windows
    pub const OVERRIDE_REDIRECT: u32 = 1;

    /// Bits per pixel required of the server's depth format for PutImage upload
    pub const REQUIRED_BITS_PER_PIXEL: u8 = 32;
}
