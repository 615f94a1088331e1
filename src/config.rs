//! Viewport settings, read from TOML.
//!
//! Every field has a default, so an empty file (or none at all) is valid:
//!
//! ```toml
//! zoom_min = "normal"
//! zoom_max = "out8x"
//! sorter = "quadratic"
//! draw_bounding_boxes = true
//! ```

use serde::Deserialize;
use std::{fs, path::Path};
use thiserror::Error;

use crate::{
    engine::{sorter::SorterKind, zoom::ZoomLevel},
    world::signs::SignLayers,
};

/// Largest leaf region, in screen pixels², drawn in one pass.
pub const DEFAULT_MAX_DRAW_AREA: i64 = 180_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bad config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("zoom_min {min:?} is beyond zoom_max {max:?}")]
    ZoomRange { min: ZoomLevel, max: ZoomLevel },
    #[error("max_draw_area must be positive, got {0}")]
    DrawArea(i64),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub zoom_min: ZoomLevel,
    pub zoom_max: ZoomLevel,
    /// Tallest bridge on the map, in height levels.
    pub max_bridge_height: i32,
    pub smooth_scroll: bool,
    pub draw_bounding_boxes: bool,
    pub draw_dirty_blocks: bool,
    pub sorter: SorterKind,
    pub max_draw_area: i64,

    pub show_town_names: bool,
    pub show_station_names: bool,
    pub show_waypoint_names: bool,
    pub show_signs: bool,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            zoom_min: ZoomLevel::MIN,
            zoom_max: ZoomLevel::MAX,
            max_bridge_height: 12,
            smooth_scroll: true,
            draw_bounding_boxes: false,
            draw_dirty_blocks: false,
            sorter: SorterKind::default(),
            max_draw_area: DEFAULT_MAX_DRAW_AREA,
            show_town_names: true,
            show_station_names: true,
            show_waypoint_names: true,
            show_signs: true,
        }
    }
}

impl ViewportConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let cfg = Self::from_toml_str(&text)?;
        log::debug!("loaded viewport config from {}: {cfg:?}", path.display());
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.zoom_min > self.zoom_max {
            return Err(ConfigError::ZoomRange {
                min: self.zoom_min,
                max: self.zoom_max,
            });
        }
        if self.max_draw_area <= 0 {
            return Err(ConfigError::DrawArea(self.max_draw_area));
        }
        Ok(())
    }

    /// Sign kinds enabled for drawing and hit tests.
    pub fn sign_layers(&self) -> SignLayers {
        let mut layers = SignLayers::empty();
        layers.set(SignLayers::TOWNS, self.show_town_names);
        layers.set(SignLayers::STATIONS, self.show_station_names);
        layers.set(SignLayers::WAYPOINTS, self.show_waypoint_names);
        layers.set(SignLayers::SIGNS, self.show_signs);
        layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(ViewportConfig::from_toml_str("").unwrap(), ViewportConfig::default());
    }

    #[test]
    fn fields_override_defaults() {
        let cfg = ViewportConfig::from_toml_str(
            r#"
            zoom_max = "out4x"
            sorter = "quadratic"
            show_signs = false
            max_draw_area = 5000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.zoom_max, ZoomLevel::Out4x);
        assert_eq!(cfg.sorter, SorterKind::Quadratic);
        assert_eq!(cfg.max_draw_area, 5000);
        assert!(cfg.smooth_scroll);
        assert!(!cfg.sign_layers().contains(SignLayers::SIGNS));
        assert!(cfg.sign_layers().contains(SignLayers::TOWNS));
    }

    #[test]
    fn inverted_zoom_range_is_rejected() {
        let err = ViewportConfig::from_toml_str("zoom_min = \"out8x\"\nzoom_max = \"out2x\"").unwrap_err();
        assert!(matches!(err, ConfigError::ZoomRange { .. }));
    }

    #[test]
    fn unknown_sorter_is_a_parse_error() {
        let err = ViewportConfig::from_toml_str("sorter = \"bubble\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ViewportConfig::load("/nonexistent/isoview.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/isoview.toml"));
    }
}
