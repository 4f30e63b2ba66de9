// mulegraph/src/config.rs
//
// Runtime configuration. Defaults carry the tuned constants; an optional
// JSON file overrides any subset; the host binary's flags override the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub layout:  LayoutConfig,
    pub export:  ExportConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }
}

// ── Service ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url:     String,
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { base_url: "http://127.0.0.1:5000".into(), timeout_secs: 30 }
    }
}

// ── Layout ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub width:             f64,
    pub height:            f64,
    pub link_distance:     f64, // spring rest length between linked nodes
    pub charge_strength:   f64, // negative = repulsion, inverse-distance falloff
    pub collide_radius:    f64, // minimum separation per node
    pub velocity_decay:    f64, // fraction of velocity lost each tick
    pub alpha_min:         f64, // energy below which the loop stops
    pub alpha_decay:       f64,
    pub drag_alpha_target: f64, // re-heating ceiling while a node is dragged
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let alpha_min = 0.001;
        Self {
            width:             1200.0,
            height:            700.0,
            link_distance:     90.0,
            charge_strength:   -180.0,
            collide_radius:    18.0,
            velocity_decay:    0.4,
            alpha_min,
            alpha_decay:       1.0 - alpha_min.powf(1.0 / 300.0),
            drag_alpha_target: 0.25,
        }
    }
}

// ── Export ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    /// Canvas pre-fill for rasterized exports.
    pub fn background(&self) -> [u8; 3] {
        match self {
            Self::Light => [0xf5, 0xf7, 0xff],
            Self::Dark  => [0x0b, 0x0f, 0x1d],
        }
    }

    pub fn background_hex(&self) -> String {
        let [r, g, b] = self.background();
        format!("#{r:02x}{g:02x}{b:02x}")
    }

    pub fn text(&self) -> &'static str {
        match self {
            Self::Light => "#111827",
            Self::Dark  => "#e5e7eb",
        }
    }

    pub fn muted(&self) -> &'static str {
        match self {
            Self::Light => "rgba(15,23,42,0.62)",
            Self::Dark  => "rgba(226,232,240,0.62)",
        }
    }

    pub fn link(&self) -> &'static str {
        match self {
            Self::Light => "rgba(15,23,42,0.22)",
            Self::Dark  => "rgba(226,232,240,0.22)",
        }
    }

    pub fn grid(&self) -> &'static str {
        match self {
            Self::Light => "rgba(0,0,0,0.08)",
            Self::Dark  => "rgba(255,255,255,0.08)",
        }
    }

    pub fn brand(&self) -> &'static str { "#4f46e5" }
}

impl std::str::FromStr for Theme {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark"  => Ok(Self::Dark),
            other   => Err(format!("unknown theme {other:?}")),
        }
    }
}

/// Fixed page format in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageFormat {
    pub width:  f64,
    pub height: f64,
}

impl PageFormat {
    pub const A4_PORTRAIT: PageFormat = PageFormat { width: 595.28, height: 841.89 };
}

impl Default for PageFormat {
    fn default() -> Self { Self::A4_PORTRAIT }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub theme:         Theme,
    pub capture_scale: f64,
    pub page:          PageFormat,
    pub output_dir:    PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            theme:         Theme::Light,
            capture_scale: 2.0,
            page:          PageFormat::A4_PORTRAIT,
            output_dir:    PathBuf::from("mulegraph_output"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: Config = serde_json::from_str(
            r#"{"layout": {"link_distance": 120}, "export": {"theme": "dark"}}"#,
        ).unwrap();
        assert_eq!(cfg.layout.link_distance, 120.0);
        assert_eq!(cfg.layout.charge_strength, -180.0);
        assert_eq!(cfg.export.theme, Theme::Dark);
        assert_eq!(cfg.export.page, PageFormat::A4_PORTRAIT);
        assert_eq!(cfg.service, ServiceConfig::default());
    }

    #[test]
    fn alpha_decay_reaches_min_in_about_300_ticks() {
        let c = LayoutConfig::default();
        let remaining = (1.0 - c.alpha_decay).powi(300);
        assert!((remaining - c.alpha_min).abs() < 1e-9);
    }

    #[test]
    fn theme_backgrounds() {
        assert_eq!(Theme::Light.background_hex(), "#f5f7ff");
        assert_eq!(Theme::Dark.background_hex(), "#0b0f1d");
        assert_eq!("dark".parse::<Theme>(), Ok(Theme::Dark));
    }

    #[test]
    fn load_from_file() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("mulegraph.json");
        std::fs::write(&path, r#"{"service": {"base_url": "http://analysis:8080"}}"#).unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.service.base_url, "http://analysis:8080");
        assert_eq!(cfg.service.timeout_secs, 30);
    }
}
