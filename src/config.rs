use serde::Deserialize;

use crate::error::ScanError;
use crate::media::MediaConstraints;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub tick_interval_ms: u64,
    pub camera_width: u32,
    pub camera_height: u32,
    pub demo_ticks: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            tick_interval_ms: 3000,
            camera_width: 1280,
            camera_height: 720,
            demo_ticks: 3,
        }
    }
}

impl Configuration {
    /// Layered load: defaults, then an optional `leafscan.toml`, then
    /// `LEAFSCAN_*` environment variables.
    pub fn load() -> Result<Self, ScanError> {
        let defaults = Configuration::default();
        let settings = config::Config::builder()
            .set_default("tick_interval_ms", defaults.tick_interval_ms)?
            .set_default("camera_width", defaults.camera_width as u64)?
            .set_default("camera_height", defaults.camera_height as u64)?
            .set_default("demo_ticks", defaults.demo_ticks as u64)?
            .add_source(config::File::with_name("leafscan").required(false))
            .add_source(config::Environment::with_prefix("LEAFSCAN"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn constraints(&self) -> MediaConstraints {
        MediaConstraints {
            width: self.camera_width,
            height: self.camera_height,
        }
    }
}
