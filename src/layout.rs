//! Layout planning: settings plus monitor topology decide how many banner
//! strips exist, where they sit, and which text slots each one carries.
//!
//! Pure functions of `Settings` and geometry; no display connection here so
//! the whole decision table is testable.

use crate::config::Settings;

/// One connected monitor as reported by the display server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorGeometry {
    pub index: usize,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

/// A logical screen area that receives one banner pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerRole {
    Top,
    Bottom,
}

/// Which fixed-width side slots flank the centered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sides {
    /// Message centered alone
    None,
    /// Username on the left, hostname on the right (top banner only)
    SysInfo,
    /// Escape hint on the left, a matching blank reservation on the right
    /// so the message stays visually centered
    EscHint,
}

/// One banner window to realize; consumed by the rendering boundary and
/// discarded when the window is destroyed or the screen changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BannerRequest {
    pub role: BannerRole,
    pub region: Region,
    pub sides: Sides,
}

impl From<MonitorGeometry> for Region {
    fn from(monitor: MonitorGeometry) -> Self {
        Self {
            x: monitor.x,
            y: monitor.y,
            width: monitor.width,
            height: monitor.height,
        }
    }
}

/// Convert settings and topology into an ordered banner request list.
///
/// A static resolution override wins over the real topology; otherwise each
/// monitor gets its own pair unless spanning collapses everything into the
/// root region. `root` doubles as the fallback when enumeration failed, so
/// an empty monitor list degrades to a single-region layout instead of
/// producing nothing.
pub fn plan(settings: &Settings, monitors: &[MonitorGeometry], root: Region) -> Vec<BannerRequest> {
    let regions: Vec<Region> = if settings.hres != 0 && settings.vres != 0 {
        vec![Region {
            x: 0,
            y: 0,
            width: clamp_dimension(settings.hres),
            height: clamp_dimension(settings.vres),
        }]
    } else if !settings.spanning && monitors.len() > 1 {
        monitors.iter().copied().map(Region::from).collect()
    } else {
        vec![root]
    };

    let mut requests = Vec::new();
    for region in regions {
        if settings.show_top {
            requests.push(BannerRequest {
                role: BannerRole::Top,
                region,
                sides: sides_for(settings, BannerRole::Top),
            });
        }
        if settings.show_bottom {
            requests.push(BannerRequest {
                role: BannerRole::Bottom,
                region,
                sides: sides_for(settings, BannerRole::Bottom),
            });
        }
    }
    requests
}

fn sides_for(settings: &Settings, role: BannerRole) -> Sides {
    if role == BannerRole::Top && settings.sys_info {
        Sides::SysInfo
    } else if settings.esc {
        Sides::EscHint
    } else {
        Sides::None
    }
}

fn clamp_dimension(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Args, Settings};
    use clap::Parser;
    use std::collections::HashMap;

    fn settings() -> Settings {
        let args = Args::try_parse_from(["classification-banner"]).unwrap();
        Settings::resolve(&HashMap::new(), &args)
    }

    fn two_monitors() -> Vec<MonitorGeometry> {
        vec![
            MonitorGeometry {
                index: 0,
                x: 0,
                y: 0,
                width: 1920,
                height: 1080,
            },
            MonitorGeometry {
                index: 1,
                x: 1920,
                y: 0,
                width: 1280,
                height: 1024,
            },
        ]
    }

    fn root() -> Region {
        Region {
            x: 0,
            y: 0,
            width: 3200,
            height: 1080,
        }
    }

    #[test]
    fn two_monitors_without_spanning_get_independent_pairs() {
        let requests = plan(&settings(), &two_monitors(), root());
        assert_eq!(requests.len(), 4);
        // First pair covers the first monitor, second pair the second
        assert_eq!(requests[0].region.width, 1920);
        assert_eq!(requests[1].region.width, 1920);
        assert_eq!(requests[2].region.x, 1920);
        assert_eq!(requests[2].region.width, 1280);
        assert_eq!(requests[3].region.height, 1024);
    }

    #[test]
    fn spanning_collapses_two_monitors_into_one_pair() {
        let mut settings = settings();
        settings.spanning = true;
        let requests = plan(&settings, &two_monitors(), root());
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].region, root());
        assert_eq!(requests[1].region, root());
        assert_eq!(requests[0].region.x, 0);
        assert_eq!(requests[0].region.y, 0);
    }

    #[test]
    fn single_monitor_uses_the_root_region() {
        let monitors = vec![MonitorGeometry {
            index: 0,
            x: 0,
            y: 0,
            width: 1920,
            height: 1080,
        }];
        let requests = plan(&settings(), &monitors, root());
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].region, root());
    }

    #[test]
    fn no_monitors_degrades_to_the_root_region() {
        let requests = plan(&settings(), &[], root());
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].region, root());
    }

    #[test]
    fn static_resolution_override_ignores_topology() {
        let mut settings = settings();
        settings.hres = 800;
        settings.vres = 600;
        let requests = plan(&settings, &two_monitors(), root());
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].region,
            Region {
                x: 0,
                y: 0,
                width: 800,
                height: 600,
            }
        );
    }

    #[test]
    fn static_resolution_needs_both_axes() {
        let mut settings = settings();
        settings.hres = 800;
        let requests = plan(&settings, &two_monitors(), root());
        // Only one axis set: fall through to the real topology
        assert_eq!(requests.len(), 4);
    }

    #[test]
    fn hidden_top_leaves_only_bottom_requests() {
        let mut settings = settings();
        settings.show_top = false;
        let requests = plan(&settings, &two_monitors(), root());
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.role == BannerRole::Bottom));
    }

    #[test]
    fn both_hidden_produces_nothing() {
        let mut settings = settings();
        settings.show_top = false;
        settings.show_bottom = false;
        assert!(plan(&settings, &two_monitors(), root()).is_empty());
    }

    #[test]
    fn pairs_are_ordered_top_before_bottom() {
        let requests = plan(&settings(), &[], root());
        assert_eq!(requests[0].role, BannerRole::Top);
        assert_eq!(requests[1].role, BannerRole::Bottom);
    }

    #[test]
    fn sys_info_reserves_slots_on_the_top_banner_only() {
        let mut settings = settings();
        settings.sys_info = true;
        let requests = plan(&settings, &[], root());
        assert_eq!(requests[0].sides, Sides::SysInfo);
        // Bottom banner keeps the escape hint instead
        assert_eq!(requests[1].sides, Sides::EscHint);
    }

    #[test]
    fn escape_hint_is_reserved_while_esc_is_enabled() {
        let requests = plan(&settings(), &[], root());
        assert_eq!(requests[0].sides, Sides::EscHint);
        assert_eq!(requests[1].sides, Sides::EscHint);
    }

    #[test]
    fn no_side_slots_when_esc_is_disabled() {
        let mut settings = settings();
        settings.esc = false;
        let requests = plan(&settings, &[], root());
        assert_eq!(requests[0].sides, Sides::None);
        assert_eq!(requests[1].sides, Sides::None);
    }
}
