//! Persistent application configuration model and defaults.

/// Root configuration persisted to `trackdeck.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    /// Playback startup preferences.
    #[serde(default)]
    pub playback: PlaybackConfig,
    /// Audio output device preferences.
    #[serde(default)]
    pub output: OutputConfig,
    /// Console display preferences.
    #[serde(default)]
    pub ui: UiConfig,
}

/// Playback startup preferences. Volume is not persisted back; this is only
/// the session's starting value.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_volume")]
    pub initial_volume: f32,
}

/// Output device and format preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct OutputConfig {
    /// Empty means the host default output device.
    #[serde(default)]
    pub output_device_name: String,
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,
    #[serde(default = "default_channel_count")]
    pub channel_count: u16,
}

/// Console display preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct UiConfig {
    /// How long a like/unlike banner stays on screen.
    #[serde(default = "default_banner_display_ms")]
    pub banner_display_ms: u64,
    /// Progress report interval for the elapsed/duration line.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            initial_volume: default_volume(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            output_device_name: String::new(),
            sample_rate_hz: default_sample_rate_hz(),
            channel_count: default_channel_count(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            banner_display_ms: default_banner_display_ms(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

fn default_volume() -> f32 {
    0.5
}

fn default_sample_rate_hz() -> u32 {
    48_000
}

fn default_channel_count() -> u16 {
    2
}

fn default_banner_display_ms() -> u64 {
    3_000
}

fn default_progress_interval_ms() -> u64 {
    500
}

/// Clamps loaded values into supported ranges.
pub fn sanitize_config(config: Config) -> Config {
    Config {
        playback: PlaybackConfig {
            initial_volume: config.playback.initial_volume.clamp(0.0, 1.0),
        },
        output: OutputConfig {
            output_device_name: config.output.output_device_name,
            sample_rate_hz: config.output.sample_rate_hz.clamp(8_000, 192_000),
            channel_count: config.output.channel_count.clamp(1, 8),
        },
        ui: UiConfig {
            banner_display_ms: config.ui.banner_display_ms.max(500),
            progress_interval_ms: config.ui.progress_interval_ms.max(100),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.playback.initial_volume, 0.5);
        assert_eq!(config.output.sample_rate_hz, 48_000);
        assert_eq!(config.output.channel_count, 2);
        assert_eq!(config.ui.banner_display_ms, 3_000);
        assert_eq!(config.ui.progress_interval_ms, 500);
    }

    #[test]
    fn test_sanitize_clamps_out_of_range_values() {
        let config = sanitize_config(Config {
            playback: PlaybackConfig {
                initial_volume: 2.0,
            },
            output: OutputConfig {
                output_device_name: "default".to_string(),
                sample_rate_hz: 1_000_000,
                channel_count: 0,
            },
            ui: UiConfig {
                banner_display_ms: 10,
                progress_interval_ms: 0,
            },
        });
        assert_eq!(config.playback.initial_volume, 1.0);
        assert_eq!(config.output.sample_rate_hz, 192_000);
        assert_eq!(config.output.channel_count, 1);
        assert_eq!(config.ui.banner_display_ms, 500);
        assert_eq!(config.ui.progress_interval_ms, 100);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").expect("empty config parses");
        assert_eq!(config, Config::default());
    }
}
