//! X11 helpers: shared application context, cached atoms, monitor
//! enumeration, and keyboard mapping lookup

use anyhow::{Context, Result};
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::randr::{self, ConnectionExt as RandrExt};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::config::Settings;
use crate::constants::esc;
use crate::font::FontSet;
use crate::layout::{MonitorGeometry, Region};

/// Application context holding immutable shared state
pub struct AppContext<'a> {
    pub conn: &'a RustConnection,
    pub screen: &'a Screen,
    pub settings: &'a Settings,
    pub atoms: &'a CachedAtoms,
    pub fonts: &'a FontSet,
}

/// Pre-cached X11 atoms to avoid repeated roundtrips
pub struct CachedAtoms {
    pub net_wm_state: Atom,
    pub net_wm_state_above: Atom,
    pub net_wm_state_sticky: Atom,
    pub net_wm_state_skip_taskbar: Atom,
    pub net_wm_state_skip_pager: Atom,
    pub net_wm_window_opacity: Atom,
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        // Do all intern_atom roundtrips once at startup
        Ok(Self {
            net_wm_state: intern(conn, b"_NET_WM_STATE")?,
            net_wm_state_above: intern(conn, b"_NET_WM_STATE_ABOVE")?,
            net_wm_state_sticky: intern(conn, b"_NET_WM_STATE_STICKY")?,
            net_wm_state_skip_taskbar: intern(conn, b"_NET_WM_STATE_SKIP_TASKBAR")?,
            net_wm_state_skip_pager: intern(conn, b"_NET_WM_STATE_SKIP_PAGER")?,
            net_wm_window_opacity: intern(conn, b"_NET_WM_WINDOW_OPACITY")?,
        })
    }
}

fn intern(conn: &RustConnection, name: &[u8]) -> Result<Atom> {
    Ok(conn
        .intern_atom(false, name)
        .with_context(|| format!("failed to intern {} atom", String::from_utf8_lossy(name)))?
        .reply()
        .with_context(|| {
            format!(
                "failed to get reply for {} atom",
                String::from_utf8_lossy(name)
            )
        })?
        .atom)
}

/// Enumerate connected monitors via RandR. Errors degrade to the
/// single-region fallback at the call site instead of crashing.
pub fn enumerate_monitors(conn: &RustConnection, root: Window) -> Result<Vec<MonitorGeometry>> {
    let reply = conn
        .randr_get_monitors(root, true)
        .context("failed to send RandR GetMonitors request")?
        .reply()
        .context("RandR GetMonitors request failed")?;
    let monitors: Vec<MonitorGeometry> = reply
        .monitors
        .iter()
        .enumerate()
        .map(|(index, monitor)| MonitorGeometry {
            index,
            x: monitor.x,
            y: monitor.y,
            width: monitor.width,
            height: monitor.height,
        })
        .collect();
    for monitor in &monitors {
        debug!(
            index = monitor.index,
            x = monitor.x,
            y = monitor.y,
            width = monitor.width,
            height = monitor.height,
            "connected monitor"
        );
    }
    Ok(monitors)
}

/// Current root window geometry; the spanning region and the fallback when
/// monitor enumeration fails. Queried live because the setup snapshot goes
/// stale after a RandR resolution change.
pub fn root_region(conn: &RustConnection, root: Window) -> Result<Region> {
    let geometry = conn
        .get_geometry(root)
        .context("failed to send root geometry request")?
        .reply()
        .context("failed to get root window geometry")?;
    Ok(Region {
        x: 0,
        y: 0,
        width: geometry.width,
        height: geometry.height,
    })
}

/// Subscribe to RandR screen-change notifications on the root window
pub fn watch_screen_changes(conn: &RustConnection, root: Window) -> Result<()> {
    conn.randr_select_input(root, randr::NotifyMask::SCREEN_CHANGE)
        .context("failed to select RandR screen-change input")?;
    Ok(())
}

/// Resolve the keycode generating the Escape keysym, if any is mapped
pub fn escape_keycode(conn: &RustConnection) -> Result<Option<Keycode>> {
    let setup = conn.setup();
    let min_keycode = setup.min_keycode;
    let count = setup.max_keycode - min_keycode + 1;
    let mapping = conn
        .get_keyboard_mapping(min_keycode, count)
        .context("failed to send keyboard mapping request")?
        .reply()
        .context("failed to get keyboard mapping")?;
    let per_keycode = usize::from(mapping.keysyms_per_keycode);
    if per_keycode == 0 {
        return Ok(None);
    }
    Ok(mapping
        .keysyms
        .chunks(per_keycode)
        .position(|keysyms| keysyms.contains(&esc::ESCAPE_KEYSYM))
        .map(|offset| min_keycode + offset as u8))
}

/// Pixel depth format check: the canvas upload assumes 32 bits per pixel
/// scanlines for the root depth
pub fn bits_per_pixel(conn: &RustConnection, depth: u8) -> Option<u8> {
    conn.setup()
        .pixmap_formats
        .iter()
        .find(|format| format.depth == depth)
        .map(|format| format.bits_per_pixel)
}
