// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

use crate::error::CliError;
use crate::utils;
use dmcodec::params::{RateControl, SessionConfig};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Session settings read from a `--config` JSON file.
///
/// Every field is optional; flags given on the command line win over the
/// file, and the file wins over the library defaults.
///
/// ```json
/// { "resolution": "1280x720", "fps": "30000/1001", "bitrate": "4Mbps",
///   "gop": 15, "qp": "10:40", "rate_control": "storage" }
/// ```
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub resolution: Option<String>,
    pub stride: Option<u32>,
    pub fps: Option<String>,
    pub bitrate: Option<String>,
    pub gop: Option<u32>,
    pub qp: Option<String>,
    pub aspect_ratio: Option<String>,
    pub rate_control: Option<String>,
    pub quality: Option<u8>,
    pub codec_name: Option<String>,
}

impl FileConfig {
    /// Load the file, or return empty settings when no path was given.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let Some(path) = path else {
            return Ok(FileConfig::default());
        };
        let text = fs::read_to_string(path)
            .map_err(|e| CliError::Io(format!("{}: {}", path.display(), e)))?;
        let config: FileConfig = serde_json::from_str(&text)
            .map_err(|e| CliError::InvalidArgs(format!("{}: {}", path.display(), e)))?;
        log::debug!("Loaded configuration from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Fill every field still unset in `self` from `fallback`.
    pub fn or(self, fallback: FileConfig) -> FileConfig {
        FileConfig {
            resolution: self.resolution.or(fallback.resolution),
            stride: self.stride.or(fallback.stride),
            fps: self.fps.or(fallback.fps),
            bitrate: self.bitrate.or(fallback.bitrate),
            gop: self.gop.or(fallback.gop),
            qp: self.qp.or(fallback.qp),
            aspect_ratio: self.aspect_ratio.or(fallback.aspect_ratio),
            rate_control: self.rate_control.or(fallback.rate_control),
            quality: self.quality.or(fallback.quality),
            codec_name: self.codec_name.or(fallback.codec_name),
        }
    }

    pub fn dimensions(&self) -> Result<(u32, u32), CliError> {
        let resolution = self
            .resolution
            .as_deref()
            .ok_or_else(|| CliError::InvalidArgs("a resolution is required".to_string()))?;
        utils::parse_resolution(resolution)
    }

    /// Apply the settings on top of a library session configuration.
    pub fn apply(&self, mut config: SessionConfig) -> Result<SessionConfig, CliError> {
        if let Some(fps) = &self.fps {
            config = config.with_frame_rate(utils::parse_rational(fps)?);
        }
        if let Some(bitrate) = &self.bitrate {
            config = config.with_bitrate(utils::parse_bitrate(bitrate)?);
        }
        if let Some(gop) = self.gop {
            config = config.with_gop(gop);
        }
        if let Some(qp) = &self.qp {
            config = config.with_qp(utils::parse_qp(qp)?);
        }
        if let Some(aspect) = &self.aspect_ratio {
            config = config.with_aspect_ratio(utils::parse_rational(&aspect.replace(':', "/"))?);
        }
        if let Some(name) = &self.rate_control {
            let mode = RateControl::from_name(name).ok_or_else(|| {
                CliError::InvalidArgs(format!(
                    "Invalid rate control: {} (supported: low-delay, storage, none)",
                    name
                ))
            })?;
            config = config.with_rate_control(mode);
        }
        if let Some(quality) = self.quality {
            config = config.with_quality(quality);
        }
        if let Some(name) = &self.codec_name {
            config = config.with_codec_name(name.clone());
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmcodec::hw::CodecFamily;
    use dmcodec::params::Rational;

    #[test]
    fn test_flags_override_file() {
        let file: FileConfig =
            serde_json::from_str(r#"{ "resolution": "1280x720", "gop": 15, "bitrate": "2Mbps" }"#)
                .unwrap();
        let flags = FileConfig {
            bitrate: Some("500".to_string()),
            ..FileConfig::default()
        };
        let merged = flags.or(file);
        assert_eq!(merged.dimensions().unwrap(), (1280, 720));

        let config = merged
            .apply(SessionConfig::new(CodecFamily::H264Encode, 1280, 720))
            .unwrap();
        assert_eq!(config.bitrate, Some(500_000));
        assert_eq!(config.gop, Some(15));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_json::from_str::<FileConfig>(r#"{ "bitrat": "1" }"#).is_err());
    }

    #[test]
    fn test_aspect_and_rate_control() {
        let file = FileConfig {
            aspect_ratio: Some("16:11".to_string()),
            rate_control: Some("storage".to_string()),
            ..FileConfig::default()
        };
        let config = file
            .apply(SessionConfig::new(CodecFamily::H264Encode, 720, 576))
            .unwrap();
        assert_eq!(config.aspect_ratio, Some(Rational::new(16, 11)));
        assert_eq!(config.rate_control, RateControl::Storage);

        let bad = FileConfig {
            rate_control: Some("turbo".to_string()),
            ..FileConfig::default()
        };
        assert!(bad
            .apply(SessionConfig::new(CodecFamily::H264Encode, 720, 576))
            .is_err());
    }

    #[test]
    fn test_missing_resolution() {
        assert!(matches!(
            FileConfig::default().dimensions(),
            Err(CliError::InvalidArgs(_))
        ));
    }
}
