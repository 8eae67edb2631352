#![forbid(unsafe_code)]

mod banner;
mod color;
mod config;
mod constants;
mod event_handler;
mod font;
mod layout;
mod system;
mod x11_utils;

use anyhow::{Context, Result, bail};
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Instant;
use tracing::{Level as TraceLevel, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::Window;
use x11rb::rust_connection::RustConnection;

use banner::Banner;
use config::{Args, Settings};
use event_handler::{LoopAction, handle_event};
use font::FontSet;
use x11_utils::{AppContext, CachedAtoms};

/// Everything that can wake the UI loop
enum LoopMessage {
    X11(Event),
    Signal(i32),
    ConnectionLost(x11rb::errors::ConnectionError),
}

fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    // A banner without a display session is a hard error; checked up front
    // so the diagnostic is specific rather than a connection failure
    if std::env::var_os("DISPLAY").is_none() {
        bail!("DISPLAY environment variable is not set; an active X session is required");
    }

    let args = Args::parse();
    let file_values = config::read_config_file(&args.config);
    let settings = Settings::resolve(&file_values, &args);
    info!(?settings, "resolved effective settings");

    let (conn, screen_num) = x11rb::connect(None).context("failed to connect to the X server")?;
    let conn = Arc::new(conn);
    let conn_ref: &RustConnection = &conn;
    let screen = &conn_ref.setup().roots[screen_num];
    info!(
        screen = screen_num,
        width = screen.width_in_pixels,
        height = screen.height_in_pixels,
        "connected to X server"
    );

    let atoms = CachedAtoms::new(conn_ref)?;
    let fonts = FontSet::load(&settings)?;
    let escape_keycode = x11_utils::escape_keycode(conn_ref)?;
    if settings.esc && escape_keycode.is_none() {
        warn!("no keycode maps the Escape keysym, escape-to-hide will not trigger");
    }
    x11_utils::watch_screen_changes(conn_ref, screen.root)?;

    let (tx, rx) = mpsc::channel();
    spawn_event_pump(Arc::clone(&conn), tx.clone());
    spawn_signal_listener(tx)?;

    let ctx = AppContext {
        conn: conn_ref,
        screen,
        settings: &settings,
        atoms: &atoms,
        fonts: &fonts,
    };
    let mut banners = build_banners(&ctx)?;

    loop {
        // Restore banners whose escape-hide window has elapsed, then wait
        // until the next deadline (or indefinitely when none is pending)
        let now = Instant::now();
        for banner in banners.values_mut() {
            if banner.escape.take_due(now)
                && let Err(err) = banner.restore()
            {
                error!(window = banner.window, %err, "failed to restore banner");
            }
        }
        let next_deadline = banners
            .values()
            .filter_map(|banner| banner.escape.deadline())
            .min();

        let message = match next_deadline {
            Some(deadline) => {
                match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => {
                        bail!("event channel closed unexpectedly")
                    }
                }
            }
            None => rx.recv().context("event channel closed unexpectedly")?,
        };

        match message {
            LoopMessage::X11(event) => {
                match handle_event(&ctx, &mut banners, event, escape_keycode) {
                    Ok(LoopAction::Continue) => {}
                    Ok(LoopAction::Rebuild) => {
                        // Destroy-and-relaunch from the cached settings
                        banners.clear();
                        banners = build_banners(&ctx)?;
                    }
                    Err(err) => error!(%err, "error while handling event"),
                }
            }
            LoopMessage::Signal(signal) => {
                info!(signal, "received termination signal, shutting down");
                break;
            }
            LoopMessage::ConnectionLost(err) => {
                return Err(err).context("lost connection to the X server");
            }
        }
    }

    drop(banners);
    conn_ref.flush().context("failed to flush on shutdown")?;
    Ok(())
}

/// Forward X events into the loop channel from a dedicated thread; the
/// loop itself can then wait with a timeout for escape-hide restores
fn spawn_event_pump(conn: Arc<RustConnection>, tx: mpsc::Sender<LoopMessage>) {
    thread::spawn(move || {
        loop {
            match conn.wait_for_event() {
                Ok(event) => {
                    if tx.send(LoopMessage::X11(event)).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx.send(LoopMessage::ConnectionLost(err));
                    break;
                }
            }
        }
    });
}

fn spawn_signal_listener(tx: mpsc::Sender<LoopMessage>) -> Result<()> {
    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("failed to register signal handlers")?;
    thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            let _ = tx.send(LoopMessage::Signal(signal));
        }
    });
    Ok(())
}

/// Plan the layout from the current topology and realize every banner
fn build_banners<'a>(ctx: &AppContext<'a>) -> Result<HashMap<Window, Banner<'a>>> {
    let monitors = match x11_utils::enumerate_monitors(ctx.conn, ctx.screen.root) {
        Ok(monitors) => {
            if monitors.is_empty() {
                warn!("display server reported no monitors, using single-region fallback");
            }
            monitors
        }
        Err(err) => {
            warn!(%err, "monitor enumeration failed, using single-region fallback");
            Vec::new()
        }
    };
    let root = x11_utils::root_region(ctx.conn, ctx.screen.root)?;
    let requests = layout::plan(ctx.settings, &monitors, root);
    if requests.is_empty() {
        warn!("both top and bottom banners are disabled, nothing to display");
    }

    let mut banners = HashMap::new();
    for request in &requests {
        let banner = Banner::new(ctx, request)?;
        banners.insert(banner.window, banner);
    }
    ctx.conn
        .flush()
        .context("failed to flush after banner creation")?;
    Ok(banners)
}
