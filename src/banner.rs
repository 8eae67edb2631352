//! Banner windows: realization of layout requests and the escape-hide
//! lifecycle
//!
//! Each banner is an override-redirect X11 window carrying a pre-composed
//! strip image. Hiding never blocks: an escape press records a restore
//! deadline and the event loop wakes up when it is due.

use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperExt;

use crate::color::opacity_to_cardinal;
use crate::constants::{banner, x11};
use crate::font::Canvas;
use crate::layout::{BannerRequest, BannerRole, Sides};
use crate::system;
use crate::x11_utils::{self, AppContext};

/// Escape-hide lifecycle for one banner: Visible to Hidden(restore_at) and
/// back. Kept free of X calls so the transitions are testable.
#[derive(Debug, Default)]
pub struct EscapeHide {
    restore_at: Option<Instant>,
}

impl EscapeHide {
    /// Escape pressed while visible: start the hide window. Returns false
    /// when already hidden (an unmapped window gets no keys anyway).
    pub fn press(&mut self, now: Instant, timeout: Duration) -> bool {
        if self.restore_at.is_some() {
            return false;
        }
        self.restore_at = Some(now + timeout);
        true
    }

    pub fn hidden(&self) -> bool {
        self.restore_at.is_some()
    }

    /// Deadline for the automatic restore, if one is pending
    pub fn deadline(&self) -> Option<Instant> {
        self.restore_at
    }

    /// True once the hide window has elapsed; clears the state
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.restore_at {
            Some(at) if now >= at => {
                self.restore_at = None;
                true
            }
            _ => false,
        }
    }

    /// Cancel a pending restore (teardown or explicit remap)
    pub fn cancel(&mut self) {
        self.restore_at = None;
    }
}

/// One realized banner window
pub struct Banner<'a> {
    pub window: Window,
    pub role: BannerRole,
    pub escape: EscapeHide,
    canvas: Canvas,
    depth: u8,
    byte_order: ImageOrder,
    gc: Gcontext,
    conn: &'a RustConnection,
}

impl<'a> Banner<'a> {
    /// Realize a layout request: compose the strip image, then create and
    /// map the window. The bottom banner is anchored so its realized
    /// height ends exactly at the region's bottom edge.
    pub fn new(ctx: &AppContext<'a>, request: &BannerRequest) -> Result<Self> {
        let depth = ctx.screen.root_depth;
        match x11_utils::bits_per_pixel(ctx.conn, depth) {
            Some(x11::REQUIRED_BITS_PER_PIXEL) => {}
            other => anyhow::bail!(
                "unsupported pixel format for depth {depth}: {other:?} bits per pixel (truecolor visual required)"
            ),
        }

        let canvas = compose(ctx, request);
        let region = request.region;
        let x = region.x;
        let y = match request.role {
            BannerRole::Top => region.y,
            BannerRole::Bottom => {
                (i32::from(region.y) + i32::from(region.height) - i32::from(canvas.height()))
                    as i16
            }
        };

        let window = Self::create_window(ctx, x, y, canvas.width(), canvas.height())?;

        // Destroy the window again if any later setup step fails
        struct WindowGuard<'a> {
            conn: &'a RustConnection,
            window: Window,
            armed: bool,
        }
        impl Drop for WindowGuard<'_> {
            fn drop(&mut self) {
                if self.armed {
                    if let Err(err) = self.conn.destroy_window(self.window) {
                        error!(window = self.window, %err, "failed to clean up banner window after setup failure");
                    }
                    let _ = self.conn.flush();
                }
            }
        }
        let mut guard = WindowGuard {
            conn: ctx.conn,
            window,
            armed: true,
        };

        Self::setup_window_properties(ctx, window)?;

        let gc = ctx
            .conn
            .generate_id()
            .context("failed to generate graphics context id")?;
        ctx.conn
            .create_gc(gc, window, &CreateGCAux::new())
            .context("failed to create banner graphics context")?;

        ctx.conn
            .map_window(window)
            .context("failed to map banner window")?;
        info!(
            window,
            role = ?request.role,
            x,
            y,
            width = canvas.width(),
            height = canvas.height(),
            "created banner window"
        );

        guard.armed = false;
        Ok(Self {
            window,
            role: request.role,
            escape: EscapeHide::default(),
            canvas,
            depth,
            byte_order: ctx.conn.setup().image_byte_order,
            gc,
            conn: ctx.conn,
        })
    }

    fn create_window(ctx: &AppContext, x: i16, y: i16, width: u16, height: u16) -> Result<Window> {
        let window = ctx
            .conn
            .generate_id()
            .context("failed to generate banner window id")?;
        ctx.conn
            .create_window(
                ctx.screen.root_depth,
                window,
                ctx.screen.root,
                x,
                y,
                width,
                height,
                0,
                WindowClass::INPUT_OUTPUT,
                ctx.screen.root_visual,
                &CreateWindowAux::new()
                    .background_pixel(ctx.settings.background.to_pixel())
                    .override_redirect(x11::OVERRIDE_REDIRECT)
                    .event_mask(
                        EventMask::EXPOSURE
                            | EventMask::KEY_PRESS
                            | EventMask::BUTTON_PRESS
                            | EventMask::STRUCTURE_NOTIFY
                            | EventMask::VISIBILITY_CHANGE,
                    ),
            )
            .context("failed to create banner window")?;
        Ok(window)
    }

    /// WM_NAME/WM_CLASS, keep-above, sticky, skip taskbar/pager, opacity
    fn setup_window_properties(ctx: &AppContext, window: Window) -> Result<()> {
        let atoms = ctx.atoms;
        ctx.conn
            .change_property8(
                PropMode::REPLACE,
                window,
                AtomEnum::WM_NAME,
                AtomEnum::STRING,
                b"classification-banner",
            )
            .context("failed to set WM_NAME")?;
        ctx.conn
            .change_property8(
                PropMode::REPLACE,
                window,
                AtomEnum::WM_CLASS,
                AtomEnum::STRING,
                b"classification-banner\0classification-banner\0",
            )
            .context("failed to set WM_CLASS")?;
        ctx.conn
            .change_property32(
                PropMode::REPLACE,
                window,
                atoms.net_wm_state,
                AtomEnum::ATOM,
                &[
                    atoms.net_wm_state_above,
                    atoms.net_wm_state_sticky,
                    atoms.net_wm_state_skip_taskbar,
                    atoms.net_wm_state_skip_pager,
                ],
            )
            .context("failed to set _NET_WM_STATE")?;
        ctx.conn
            .change_property32(
                PropMode::REPLACE,
                window,
                atoms.net_wm_window_opacity,
                AtomEnum::CARDINAL,
                &[opacity_to_cardinal(ctx.settings.opacity)],
            )
            .context("failed to set window opacity")?;
        Ok(())
    }

    /// Upload the composed strip; called on Expose
    pub fn redraw(&self) -> Result<()> {
        let data = self.wire_bytes();
        self.conn
            .put_image(
                ImageFormat::Z_PIXMAP,
                self.window,
                self.gc,
                self.canvas.width(),
                self.canvas.height(),
                0,
                0,
                0,
                self.depth,
                &data,
            )
            .context("failed to upload banner image")?;
        self.conn
            .flush()
            .context("failed to flush after banner redraw")?;
        Ok(())
    }

    fn wire_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.canvas.pixels().len() * 4);
        for &pixel in self.canvas.pixels() {
            let bytes = if self.byte_order == ImageOrder::MSB_FIRST {
                pixel.to_be_bytes()
            } else {
                pixel.to_le_bytes()
            };
            data.extend_from_slice(&bytes);
        }
        data
    }

    /// Escape pressed: unmap and schedule the automatic restore
    pub fn hide_for(&mut self, timeout: Duration) -> Result<()> {
        if !self.escape.press(Instant::now(), timeout) {
            return Ok(());
        }
        info!(
            window = self.window,
            role = ?self.role,
            seconds = timeout.as_secs(),
            "escape pressed, hiding banner temporarily"
        );
        self.conn
            .unmap_window(self.window)
            .context("failed to unmap banner window")?;
        self.conn
            .flush()
            .context("failed to flush after hiding banner")?;
        Ok(())
    }

    /// Remap and raise, clearing any pending hide deadline
    pub fn restore(&mut self) -> Result<()> {
        self.escape.cancel();
        self.conn
            .map_window(self.window)
            .context("failed to map banner window")?;
        self.raise()?;
        self.conn
            .flush()
            .context("failed to flush after restoring banner")?;
        Ok(())
    }

    /// Keep-above for an override-redirect window is our job, not the WM's
    pub fn raise(&self) -> Result<()> {
        self.conn
            .configure_window(
                self.window,
                &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
            )
            .context("failed to raise banner window")?;
        Ok(())
    }

    /// Clicking the banner focuses it so it can receive the escape key
    pub fn focus(&self) -> Result<()> {
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, self.window, x11rb::CURRENT_TIME)
            .context("failed to focus banner window")?;
        self.conn
            .flush()
            .context("failed to flush after focusing banner")?;
        Ok(())
    }

    /// UnmapNotify arrived. An external hide is undone immediately; our own
    /// escape-hide unmap stays down until its deadline.
    pub fn handle_unmapped(&mut self) -> Result<()> {
        if self.escape.hidden() {
            return Ok(());
        }
        debug!(window = self.window, "banner hidden externally, restoring");
        self.restore()
    }
}

impl Drop for Banner<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.conn.free_gc(self.gc) {
            error!(window = self.window, %err, "failed to free banner graphics context");
        }
        if let Err(err) = self.conn.destroy_window(self.window) {
            error!(window = self.window, %err, "failed to destroy banner window");
        }
        let _ = self.conn.flush();
    }
}

/// Compose the strip image for a request: background fill, centered
/// message, and whichever side slots the planner reserved
fn compose(ctx: &AppContext, request: &BannerRequest) -> Canvas {
    let label = &ctx.fonts.label;
    let hint = &ctx.fonts.hint;
    let settings = ctx.settings;

    let width = request.region.width;
    let height =
        (label.line_height() + 2 * banner::VERTICAL_PADDING).max(banner::NOMINAL_HEIGHT);
    let mut canvas = Canvas::filled(width, height, settings.background);
    let text_y = i32::from(banner::VERTICAL_PADDING);

    // The message is centered in whatever the side slots leave over; equal
    // reservations on both sides keep it visually centered on the strip
    let (left_reserved, right_reserved) = match request.sides {
        Sides::None => (0, 0),
        Sides::SysInfo => {
            let cell = label.cell_width(banner::SIDE_CELL_CHARS);
            (cell, cell)
        }
        Sides::EscHint => {
            let cell = hint.cell_width(banner::SIDE_CELL_CHARS);
            (cell, cell)
        }
    };
    let middle = i32::from(width) - i32::from(left_reserved) - i32::from(right_reserved);
    let message_width = label.text_width(&settings.message);
    let message_x = i32::from(left_reserved) + (middle - i32::from(message_width)) / 2;
    label.draw(
        &mut canvas,
        message_x,
        text_y,
        &settings.message,
        settings.foreground,
    );

    match request.sides {
        Sides::None => {}
        Sides::SysInfo => {
            let user = system::username();
            let host = system::hostname();
            label.draw(
                &mut canvas,
                i32::from(banner::SIDE_INSET),
                text_y,
                &user,
                settings.foreground,
            );
            let host_x = i32::from(width)
                - i32::from(banner::SIDE_INSET)
                - i32::from(label.text_width(&host));
            label.draw(&mut canvas, host_x, text_y, &host, settings.foreground);
        }
        Sides::EscHint => {
            let hint_y =
                text_y + (i32::from(label.line_height()) - i32::from(hint.line_height())) / 2;
            hint.draw(&mut canvas, 0, hint_y, banner::ESC_HINT, settings.foreground);
        }
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_press_hides_until_exactly_the_timeout() {
        let mut esc = EscapeHide::default();
        let now = Instant::now();
        let timeout = Duration::from_secs(15);

        assert!(esc.press(now, timeout));
        assert!(esc.hidden());
        assert_eq!(esc.deadline(), Some(now + timeout));

        // Not due one tick before the deadline, due exactly on it
        assert!(!esc.take_due(now + timeout - Duration::from_millis(1)));
        assert!(esc.hidden());
        assert!(esc.take_due(now + timeout));
        assert!(!esc.hidden());
        assert_eq!(esc.deadline(), None);
    }

    #[test]
    fn second_press_while_hidden_is_ignored() {
        let mut esc = EscapeHide::default();
        let now = Instant::now();
        let timeout = Duration::from_secs(10);

        assert!(esc.press(now, timeout));
        assert!(!esc.press(now + Duration::from_secs(1), timeout));
        // Deadline is unchanged by the second press
        assert_eq!(esc.deadline(), Some(now + timeout));
    }

    #[test]
    fn press_works_again_after_the_restore() {
        let mut esc = EscapeHide::default();
        let now = Instant::now();
        let timeout = Duration::from_secs(5);

        assert!(esc.press(now, timeout));
        assert!(esc.take_due(now + timeout));
        assert!(esc.press(now + timeout, timeout));
        assert_eq!(esc.deadline(), Some(now + timeout + timeout));
    }

    #[test]
    fn cancel_clears_a_pending_restore() {
        let mut esc = EscapeHide::default();
        let now = Instant::now();

        assert!(esc.press(now, Duration::from_secs(30)));
        esc.cancel();
        assert!(!esc.hidden());
        assert!(!esc.take_due(now + Duration::from_secs(60)));
    }

    #[test]
    fn visible_state_is_never_due() {
        let mut esc = EscapeHide::default();
        assert!(!esc.hidden());
        assert_eq!(esc.deadline(), None);
        assert!(!esc.take_due(Instant::now()));
    }
}
