//! Configuration resolution for the banner
//!
//! Effective settings come from three layers: built-in defaults, the global
//! configuration file, and command-line flags. Later layers win, so a flag
//! always overrides the file and the file always overrides the defaults.
//! The file has no declared schema; values are coerced by shape (digits →
//! integer, digits.digits → float, true/false/yes/no → boolean, anything
//! else stays text).

use clap::Parser;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::color::HexColor;
use crate::constants::esc;

/// Command-line options; every flag overrides the matching config file key
#[derive(Debug, Parser)]
#[command(
    name = "classification-banner",
    version,
    about = "Display a classification banner on every screen"
)]
pub struct Args {
    /// Set the classification message
    #[arg(short, long)]
    pub message: Option<String>,

    /// Set the foreground (text) color
    #[arg(short, long)]
    pub fgcolor: Option<String>,

    /// Set the background color
    #[arg(short, long)]
    pub bgcolor: Option<String>,

    /// Set the horizontal screen resolution
    #[arg(short = 'x', long)]
    pub hres: Option<u32>,

    /// Set the vertical screen resolution
    #[arg(short = 'y', long)]
    pub vres: Option<u32>,

    /// Set the window opacity for composited window managers
    #[arg(short, long, allow_negative_numbers = true)]
    pub opacity: Option<f64>,

    /// Font family
    #[arg(long)]
    pub font: Option<String>,

    /// Font size
    #[arg(long)]
    pub size: Option<String>,

    /// Set the font weight
    #[arg(long)]
    pub weight: Option<String>,

    /// Disable the 'ESC to hide' message
    #[arg(long)]
    pub disable_esc: bool,

    /// Configure how long ESC will hide the banner, in seconds
    #[arg(long)]
    pub esc_timeout: Option<u64>,

    /// Disable the top banner
    #[arg(long)]
    pub hide_top: bool,

    /// Disable the bottom banner
    #[arg(long)]
    pub hide_bottom: bool,

    /// Show user and hostname in the top banner
    #[arg(long)]
    pub system_info: bool,

    /// Enable banner(s) to span across screens as a single banner
    #[arg(long)]
    pub enable_spanning: bool,

    /// Read configuration from this file instead of the system default
    #[arg(long, value_name = "FILE", default_value = crate::constants::config::DEFAULT_PATH)]
    pub config: PathBuf,
}

/// A config file value after best-effort type coercion
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl ConfigValue {
    /// Every value has a textual form; used for keys consumed as text
    fn to_text(&self) -> String {
        match self {
            Self::Int(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::Bool(value) => value.to_string(),
            Self::Text(value) => value.clone(),
        }
    }
}

static INT_RE: OnceLock<Option<Regex>> = OnceLock::new();
static FLOAT_RE: OnceLock<Option<Regex>> = OnceLock::new();
static BOOL_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn int_re() -> Option<&'static Regex> {
    INT_RE.get_or_init(|| Regex::new(r"^[0-9]+$").ok()).as_ref()
}

fn float_re() -> Option<&'static Regex> {
    FLOAT_RE
        .get_or_init(|| Regex::new(r"^[0-9]+\.[0-9]+$").ok())
        .as_ref()
}

fn bool_re() -> Option<&'static Regex> {
    BOOL_RE
        .get_or_init(|| Regex::new(r"(?i)^(true|false|yes|no)$").ok())
        .as_ref()
}

/// Coerce a raw file value by shape. Numeric-looking text such as a version
/// string "1.0" becomes a float; a preserved quirk of the shipped format.
fn coerce(raw: &str) -> ConfigValue {
    if int_re().is_some_and(|re| re.is_match(raw)) {
        if let Ok(value) = raw.parse::<i64>() {
            return ConfigValue::Int(value);
        }
    } else if float_re().is_some_and(|re| re.is_match(raw)) {
        if let Ok(value) = raw.parse::<f64>() {
            return ConfigValue::Float(value);
        }
    } else if bool_re().is_some_and(|re| re.is_match(raw)) {
        let truthy = raw.eq_ignore_ascii_case("true") || raw.eq_ignore_ascii_case("yes");
        return ConfigValue::Bool(truthy);
    }
    ConfigValue::Text(raw.to_string())
}

/// Parse ini-style `key = value` lines. Section headers and comments are
/// skipped; malformed lines are ignored rather than fatal.
fn parse_config(contents: &str) -> HashMap<String, ConfigValue> {
    let mut values = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        // Single [global] section; the header carries no information
        if line.starts_with('[') {
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) => {
                values.insert(key.trim().to_ascii_lowercase(), coerce(value.trim()));
            }
            None => debug!(line, "ignoring malformed config line"),
        }
    }
    values
}

/// Read the config file; a missing or unreadable file is not an error,
/// the built-in defaults simply apply
pub fn read_config_file(path: &Path) -> HashMap<String, ConfigValue> {
    match fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents),
        Err(err) => {
            debug!(path = %path.display(), %err, "config file not readable, using built-in defaults");
            HashMap::new()
        }
    }
}

mod defaults {
    use crate::color::HexColor;

    pub const MESSAGE: &str = "UNCLASSIFIED";
    pub const FOREGROUND: HexColor = HexColor {
        r: 0xFF,
        g: 0xFF,
        b: 0xFF,
    };
    pub const BACKGROUND: HexColor = HexColor {
        r: 0x00,
        g: 0x7A,
        b: 0x33,
    };
    pub const FONT: &str = "liberation-sans";
    pub const SIZE: &str = "small";
    pub const WEIGHT: &str = "bold";
    pub const OPACITY: f64 = 0.75;
    pub const ESC_TIMEOUT: u64 = 15;
}

/// Effective settings for one configure pass; immutable once built.
/// Windows are torn down and rebuilt from the cached value on screen change.
#[derive(Debug, Clone)]
pub struct Settings {
    pub message: String,
    pub foreground: HexColor,
    pub background: HexColor,
    pub font: String,
    pub size: String,
    pub weight: String,
    pub opacity: f64,
    pub esc: bool,
    pub esc_timeout: u64,
    pub show_top: bool,
    pub show_bottom: bool,
    pub sys_info: bool,
    pub spanning: bool,
    /// Static horizontal resolution; 0 means "use the real topology"
    pub hres: u32,
    /// Static vertical resolution; 0 means "use the real topology"
    pub vres: u32,
}

impl Settings {
    /// Merge the three layers into one record and clamp out-of-range values
    pub fn resolve(file: &HashMap<String, ConfigValue>, args: &Args) -> Self {
        let mut settings = Self {
            message: args
                .message
                .clone()
                .unwrap_or_else(|| get_text(file, "message", defaults::MESSAGE)),
            foreground: resolve_color(
                args.fgcolor.as_deref(),
                file,
                "foreground",
                defaults::FOREGROUND,
            ),
            background: resolve_color(
                args.bgcolor.as_deref(),
                file,
                "background",
                defaults::BACKGROUND,
            ),
            font: args
                .font
                .clone()
                .unwrap_or_else(|| get_text(file, "font", defaults::FONT)),
            size: args
                .size
                .clone()
                .unwrap_or_else(|| get_text(file, "size", defaults::SIZE)),
            weight: args
                .weight
                .clone()
                .unwrap_or_else(|| get_text(file, "weight", defaults::WEIGHT)),
            opacity: args
                .opacity
                .unwrap_or_else(|| get_float(file, "opacity", defaults::OPACITY)),
            esc: if args.disable_esc {
                false
            } else {
                get_bool(file, "esc", true)
            },
            esc_timeout: args
                .esc_timeout
                .unwrap_or_else(|| get_unsigned(file, "esc_timeout", defaults::ESC_TIMEOUT)),
            show_top: if args.hide_top {
                false
            } else {
                get_bool(file, "show_top", true)
            },
            show_bottom: if args.hide_bottom {
                false
            } else {
                get_bool(file, "show_bottom", true)
            },
            sys_info: if args.system_info {
                true
            } else {
                get_bool(file, "sys_info", false)
            },
            spanning: if args.enable_spanning {
                true
            } else {
                get_bool(file, "spanning", false)
            },
            hres: args
                .hres
                .unwrap_or_else(|| get_resolution(file, "horizontal_resolution")),
            vres: args
                .vres
                .unwrap_or_else(|| get_resolution(file, "vertical_resolution")),
        };
        settings.validate_and_clamp();
        settings
    }

    /// Clamp values to safe ranges; out-of-range input is never an error
    fn validate_and_clamp(&mut self) {
        if self.esc_timeout < esc::MIN_TIMEOUT {
            warn!(
                esc_timeout = self.esc_timeout,
                min = esc::MIN_TIMEOUT,
                "esc_timeout below minimum, clamping"
            );
            self.esc_timeout = esc::MIN_TIMEOUT;
        } else if self.esc_timeout > esc::MAX_TIMEOUT {
            warn!(
                esc_timeout = self.esc_timeout,
                max = esc::MAX_TIMEOUT,
                "esc_timeout exceeds maximum, clamping"
            );
            self.esc_timeout = esc::MAX_TIMEOUT;
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            warn!(opacity = self.opacity, "opacity outside [0, 1], clamping");
            self.opacity = self.opacity.clamp(0.0, 1.0);
        }
    }
}

fn get_text(file: &HashMap<String, ConfigValue>, key: &str, default: &str) -> String {
    file.get(key)
        .map_or_else(|| default.to_string(), ConfigValue::to_text)
}

fn get_bool(file: &HashMap<String, ConfigValue>, key: &str, default: bool) -> bool {
    match file.get(key) {
        None => default,
        Some(ConfigValue::Bool(value)) => *value,
        Some(ConfigValue::Int(value)) => *value != 0,
        Some(other) => {
            warn!(key, value = ?other, default, "expected a boolean config value, using default");
            default
        }
    }
}

fn get_unsigned(file: &HashMap<String, ConfigValue>, key: &str, default: u64) -> u64 {
    match file.get(key) {
        None => default,
        Some(ConfigValue::Int(value)) if *value >= 0 => *value as u64,
        Some(other) => {
            warn!(key, value = ?other, default, "expected an integer config value, using default");
            default
        }
    }
}

fn get_float(file: &HashMap<String, ConfigValue>, key: &str, default: f64) -> f64 {
    match file.get(key) {
        None => default,
        Some(ConfigValue::Float(value)) => *value,
        Some(ConfigValue::Int(value)) => *value as f64,
        Some(other) => {
            warn!(key, value = ?other, default, "expected a numeric config value, using default");
            default
        }
    }
}

fn get_resolution(file: &HashMap<String, ConfigValue>, key: &str) -> u32 {
    u32::try_from(get_unsigned(file, key, 0)).unwrap_or_else(|_| {
        warn!(key, "resolution value out of range, ignoring");
        0
    })
}

fn resolve_color(
    cli: Option<&str>,
    file: &HashMap<String, ConfigValue>,
    key: &str,
    fallback: HexColor,
) -> HexColor {
    let raw = match cli {
        Some(value) => value.to_string(),
        None => match file.get(key) {
            Some(value) => value.to_text(),
            None => return fallback,
        },
    };
    HexColor::parse(&raw).unwrap_or_else(|| {
        warn!(key, value = %raw, fallback = %fallback, "unparseable color, using default");
        fallback
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_from(contents: &str, argv: &[&str]) -> Settings {
        let file = parse_config(contents);
        let mut full_argv = vec!["classification-banner"];
        full_argv.extend_from_slice(argv);
        let args = Args::try_parse_from(full_argv).unwrap();
        Settings::resolve(&file, &args)
    }

    #[test]
    fn coerces_digit_values_to_integers() {
        let values = parse_config("esc_timeout = 42");
        assert_eq!(values["esc_timeout"], ConfigValue::Int(42));
    }

    #[test]
    fn coerces_decimal_values_to_floats() {
        let values = parse_config("opacity = 0.75");
        assert_eq!(values["opacity"], ConfigValue::Float(0.75));
    }

    #[test]
    fn coerces_version_like_text_to_float() {
        // Known quirk of the untyped format: "1.0" is a float, not text
        let values = parse_config("message = 1.0");
        assert_eq!(values["message"], ConfigValue::Float(1.0));
    }

    #[test]
    fn coerces_booleans_in_any_case() {
        for (raw, expected) in [
            ("true", true),
            ("TRUE", true),
            ("yes", true),
            ("Yes", true),
            ("false", false),
            ("no", false),
            ("NO", false),
        ] {
            let values = parse_config(&format!("esc = {raw}"));
            assert_eq!(values["esc"], ConfigValue::Bool(expected), "raw: {raw}");
        }
    }

    #[test]
    fn keeps_everything_else_as_text() {
        let values = parse_config("message = hello");
        assert_eq!(values["message"], ConfigValue::Text("hello".to_string()));
    }

    #[test]
    fn skips_comments_sections_and_malformed_lines() {
        let values = parse_config(
            "[global]\n# comment\n; other comment\nnot a pair\n\nmessage = SECRET\n",
        );
        assert_eq!(values.len(), 1);
        assert_eq!(values["message"], ConfigValue::Text("SECRET".to_string()));
    }

    #[test]
    fn keys_are_case_insensitive() {
        let values = parse_config("Message = SECRET");
        assert!(values.contains_key("message"));
    }

    #[test]
    fn built_in_defaults_apply_when_everything_is_absent() {
        let settings = resolve_from("", &[]);
        assert_eq!(settings.message, "UNCLASSIFIED");
        assert_eq!(settings.foreground, HexColor::parse("#FFFFFF").unwrap());
        assert_eq!(settings.background, HexColor::parse("#007A33").unwrap());
        assert_eq!(settings.font, "liberation-sans");
        assert_eq!(settings.size, "small");
        assert_eq!(settings.weight, "bold");
        assert_eq!(settings.opacity, 0.75);
        assert!(settings.esc);
        assert_eq!(settings.esc_timeout, 15);
        assert!(settings.show_top);
        assert!(settings.show_bottom);
        assert!(!settings.sys_info);
        assert!(!settings.spanning);
        assert_eq!(settings.hres, 0);
        assert_eq!(settings.vres, 0);
    }

    #[test]
    fn file_values_override_defaults() {
        let settings = resolve_from(
            "message = TOP SECRET\nbackground = #FF0000\nesc = no\nhorizontal_resolution = 1920\nvertical_resolution = 1080\n",
            &[],
        );
        assert_eq!(settings.message, "TOP SECRET");
        assert_eq!(settings.background, HexColor::parse("#FF0000").unwrap());
        assert!(!settings.esc);
        assert_eq!(settings.hres, 1920);
        assert_eq!(settings.vres, 1080);
    }

    #[test]
    fn command_line_overrides_file_for_every_option() {
        let file = "message = FROM FILE\n\
                    foreground = #111111\n\
                    background = #222222\n\
                    font = file-font\n\
                    size = large\n\
                    weight = normal\n\
                    opacity = 0.5\n\
                    esc = yes\n\
                    esc_timeout = 30\n\
                    show_top = yes\n\
                    show_bottom = yes\n\
                    sys_info = no\n\
                    spanning = no\n\
                    horizontal_resolution = 800\n\
                    vertical_resolution = 600\n";
        let settings = resolve_from(
            file,
            &[
                "-m",
                "FROM CLI",
                "-f",
                "#AAAAAA",
                "-b",
                "#BBBBBB",
                "-x",
                "2560",
                "-y",
                "1440",
                "-o",
                "0.9",
                "--font",
                "cli-font",
                "--size",
                "medium",
                "--weight",
                "bold",
                "--disable-esc",
                "--esc-timeout",
                "45",
                "--hide-top",
                "--hide-bottom",
                "--system-info",
                "--enable-spanning",
            ],
        );
        assert_eq!(settings.message, "FROM CLI");
        assert_eq!(settings.foreground, HexColor::parse("#AAAAAA").unwrap());
        assert_eq!(settings.background, HexColor::parse("#BBBBBB").unwrap());
        assert_eq!(settings.hres, 2560);
        assert_eq!(settings.vres, 1440);
        assert_eq!(settings.opacity, 0.9);
        assert_eq!(settings.font, "cli-font");
        assert_eq!(settings.size, "medium");
        assert_eq!(settings.weight, "bold");
        assert!(!settings.esc);
        assert_eq!(settings.esc_timeout, 45);
        assert!(!settings.show_top);
        assert!(!settings.show_bottom);
        assert!(settings.sys_info);
        assert!(settings.spanning);
    }

    #[test]
    fn esc_timeout_is_clamped_into_range() {
        for (input, expected) in [(0, 1), (1, 1), (15, 15), (60, 60), (61, 60), (9999, 60)] {
            let settings = resolve_from(&format!("esc_timeout = {input}"), &[]);
            assert_eq!(settings.esc_timeout, expected, "input: {input}");
        }
    }

    #[test]
    fn esc_timeout_from_command_line_is_clamped_too() {
        let settings = resolve_from("", &["--esc-timeout", "120"]);
        assert_eq!(settings.esc_timeout, 60);
    }

    #[test]
    fn opacity_is_clamped_into_unit_range() {
        let settings = resolve_from("", &["-o", "1.5"]);
        assert_eq!(settings.opacity, 1.0);
        let settings = resolve_from("", &["-o", "-0.5"]);
        assert_eq!(settings.opacity, 0.0);
    }

    #[test]
    fn loosely_typed_values_still_resolve() {
        // Digits coerce to Int first; boolean keys accept nonzero as true
        let settings = resolve_from("esc = 1\nmessage = 42\n", &[]);
        assert!(settings.esc);
        assert_eq!(settings.message, "42");
    }

    #[test]
    fn mistyped_values_fall_back_to_defaults() {
        let settings = resolve_from("esc = maybe\nopacity = dark\n", &[]);
        assert!(settings.esc);
        assert_eq!(settings.opacity, 0.75);
    }

    #[test]
    fn unparseable_colors_fall_back_to_defaults() {
        let settings = resolve_from("foreground = chartreuse\n", &[]);
        assert_eq!(settings.foreground, HexColor::parse("#FFFFFF").unwrap());
    }

    #[test]
    fn missing_file_resolves_to_defaults() {
        let values = read_config_file(Path::new("/nonexistent/banner.conf"));
        assert!(values.is_empty());
    }

    #[test]
    fn default_config_path_is_the_system_location() {
        let args = Args::try_parse_from(["classification-banner"]).unwrap();
        assert_eq!(
            args.config,
            PathBuf::from("/etc/classification-banner/banner.conf")
        );
    }
}
