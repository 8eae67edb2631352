//! Event dispatch for the banner windows

use anyhow::Result;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{Keycode, Visibility, Window};

use crate::banner::Banner;
use crate::x11_utils::AppContext;

/// What the UI loop should do after an event was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    /// Screen topology changed: tear every banner down and re-plan
    Rebuild,
}

pub fn handle_event<'a>(
    ctx: &AppContext<'a>,
    banners: &mut HashMap<Window, Banner<'a>>,
    event: Event,
    escape_keycode: Option<Keycode>,
) -> Result<LoopAction> {
    match event {
        Event::Expose(event) => {
            if event.count == 0
                && let Some(banner) = banners.get(&event.window)
            {
                banner.redraw()?;
            }
        }
        Event::KeyPress(event) => {
            if ctx.settings.esc
                && escape_keycode == Some(event.detail)
                && let Some(banner) = banners.get_mut(&event.event)
            {
                banner.hide_for(Duration::from_secs(ctx.settings.esc_timeout))?;
            }
        }
        Event::ButtonPress(event) => {
            // A click gives the banner input focus so Escape reaches it
            if let Some(banner) = banners.get(&event.event) {
                banner.focus()?;
            }
        }
        Event::UnmapNotify(event) => {
            if let Some(banner) = banners.get_mut(&event.window) {
                banner.handle_unmapped()?;
            }
        }
        Event::VisibilityNotify(event) => {
            if event.state != Visibility::UNOBSCURED
                && let Some(banner) = banners.get(&event.window)
            {
                banner.raise()?;
                ctx.conn.flush()?;
            }
        }
        Event::RandrScreenChangeNotify(_) => {
            debug!("screen topology changed, relaunching banners");
            return Ok(LoopAction::Rebuild);
        }
        _ => (),
    }
    Ok(LoopAction::Continue)
}
