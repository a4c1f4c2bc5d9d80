//! # Playback Configuration
//!
//! Tuning knobs for the chunked playback engine.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};

/// Engine configuration.
///
/// Controls read-ahead depth, request sizes and the accepted speed range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Queue depth below which more chunks are requested.
    ///
    /// Default: 2.
    #[serde(default = "default_low_watermark")]
    pub low_watermark: usize,

    /// Number of chunks asked for per read-ahead request.
    ///
    /// Default: 2.
    #[serde(default = "default_fetch_window")]
    pub fetch_window: usize,

    /// Fraction of the active chunk after which a read-ahead request is sent
    /// even if the queue is above the watermark.
    ///
    /// Default: 0.7 (70%).
    #[serde(default = "default_progress_prefetch_ratio")]
    pub progress_prefetch_ratio: f64,

    /// Speed used when a caller passes none.
    ///
    /// Default: 1.0.
    #[serde(default = "default_speed")]
    pub default_speed: f32,

    /// Default: 0.25.
    #[serde(default = "default_min_speed")]
    pub min_speed: f32,

    /// Default: 4.0.
    #[serde(default = "default_max_speed")]
    pub max_speed: f32,

    /// MIME type handed to the audio output with every chunk.
    ///
    /// Default: `audio/mpeg`.
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            low_watermark: default_low_watermark(),
            fetch_window: default_fetch_window(),
            progress_prefetch_ratio: default_progress_prefetch_ratio(),
            default_speed: default_speed(),
            min_speed: default_min_speed(),
            max_speed: default_max_speed(),
            mime_type: default_mime_type(),
        }
    }
}

impl PlaybackConfig {
    /// Configuration for slow producers.
    ///
    /// - Deeper queue (4 chunks)
    /// - Larger request windows (4 chunks)
    /// - Earlier in-chunk trigger (50%)
    pub fn eager() -> Self {
        Self {
            low_watermark: 4,
            fetch_window: 4,
            progress_prefetch_ratio: 0.5,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.low_watermark == 0 {
            return Err(invalid("low_watermark must be > 0"));
        }

        if self.fetch_window == 0 {
            return Err(invalid("fetch_window must be > 0"));
        }

        if !(self.progress_prefetch_ratio > 0.0 && self.progress_prefetch_ratio <= 1.0) {
            return Err(invalid("progress_prefetch_ratio must be in (0.0, 1.0]"));
        }

        if !(self.min_speed.is_finite() && self.max_speed.is_finite()) || self.min_speed <= 0.0 {
            return Err(invalid("speed bounds must be finite and positive"));
        }

        if self.min_speed > self.max_speed {
            return Err(invalid("min_speed cannot exceed max_speed"));
        }

        self.check_speed(self.default_speed)
            .map_err(|_| invalid("default_speed must lie within [min_speed, max_speed]"))?;

        if self.mime_type.trim().is_empty() {
            return Err(invalid("mime_type must not be empty"));
        }

        Ok(())
    }

    /// Accept `speed` if it is finite and inside the configured bounds.
    pub fn check_speed(&self, speed: f32) -> Result<f32> {
        if speed.is_finite() && speed >= self.min_speed && speed <= self.max_speed {
            Ok(speed)
        } else {
            Err(PlaybackError::InvalidSpeed {
                speed,
                min: self.min_speed,
                max: self.max_speed,
            })
        }
    }
}

fn invalid(message: &str) -> PlaybackError {
    PlaybackError::InvalidConfig(message.to_string())
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_low_watermark() -> usize {
    2
}

fn default_fetch_window() -> usize {
    2
}

fn default_progress_prefetch_ratio() -> f64 {
    0.7
}

fn default_speed() -> f32 {
    1.0
}

fn default_min_speed() -> f32 {
    0.25
}

fn default_max_speed() -> f32 {
    4.0
}

fn default_mime_type() -> String {
    "audio/mpeg".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlaybackConfig::default();
        assert_eq!(config.low_watermark, 2);
        assert_eq!(config.fetch_window, 2);
        assert_eq!(config.progress_prefetch_ratio, 0.7);
        assert_eq!(config.mime_type, "audio/mpeg");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_eager_preset() {
        let eager = PlaybackConfig::eager();
        assert!(eager.low_watermark > PlaybackConfig::default().low_watermark);
        assert!(eager.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PlaybackConfig {
            fetch_window: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = PlaybackConfig {
            progress_prefetch_ratio: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = PlaybackConfig {
            min_speed: 2.0,
            max_speed: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = PlaybackConfig {
            default_speed: 10.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PlaybackError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_check_speed() {
        let config = PlaybackConfig::default();
        assert_eq!(config.check_speed(1.5).unwrap(), 1.5);
        assert!(config.check_speed(0.1).is_err());
        assert!(config.check_speed(f32::NAN).is_err());
        assert!(config.check_speed(f32::INFINITY).is_err());
    }

    #[test]
    fn test_serde_fills_defaults() {
        let config: PlaybackConfig = serde_json::from_str(r#"{"low_watermark": 3}"#).unwrap();
        assert_eq!(config.low_watermark, 3);
        assert_eq!(config.fetch_window, 2);
        assert_eq!(config.max_speed, 4.0);
    }
}
