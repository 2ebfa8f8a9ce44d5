// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

use crate::error::CliError;
use crate::Backend;
use dmcodec::engine::Platform;
use dmcodec::mock::MockEngine;
use dmcodec::params::{QpRange, Rational};
use signal_hook::consts::SIGINT;
use signal_hook::flag;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Parse resolution string in format "WxH" or "W*H"
pub fn parse_resolution(s: &str) -> Result<(u32, u32), CliError> {
    let (width_str, height_str) = s
        .split_once('x')
        .or_else(|| s.split_once('*'))
        .ok_or_else(|| {
            CliError::InvalidArgs(format!(
                "Invalid resolution format (expected WxH or W*H): {}",
                s
            ))
        })?;

    let width = width_str
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid width in resolution: {}", s)))?;
    let height = height_str
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid height in resolution: {}", s)))?;

    if width == 0 || height == 0 {
        return Err(CliError::InvalidArgs(format!(
            "Resolution dimensions must be positive: {}",
            s
        )));
    }

    Ok((width, height))
}

/// Parse a rational such as a frame rate, "30" or "30000/1001"
pub fn parse_rational(s: &str) -> Result<Rational, CliError> {
    let invalid = || CliError::InvalidArgs(format!("Invalid rational (expected N or N/D): {}", s));
    let (num, den) = match s.split_once('/') {
        Some((num, den)) => (
            num.trim().parse::<u32>().map_err(|_| invalid())?,
            den.trim().parse::<u32>().map_err(|_| invalid())?,
        ),
        None => (s.trim().parse::<u32>().map_err(|_| invalid())?, 1),
    };
    if num == 0 || den == 0 {
        return Err(invalid());
    }
    Ok(Rational::new(num, den))
}

/// Parse a QP range "MIN:MAX"
pub fn parse_qp(s: &str) -> Result<QpRange, CliError> {
    let invalid = || CliError::InvalidArgs(format!("Invalid QP range (expected MIN:MAX): {}", s));
    let (min, max) = s.split_once(':').ok_or_else(invalid)?;
    Ok(QpRange {
        min: min.trim().parse::<u8>().map_err(|_| invalid())?,
        max: max.trim().parse::<u8>().map_err(|_| invalid())?,
    })
}

/// Parse bitrate from string into bits per second.
///
/// Plain numbers are kbps; "kbps" and "Mbps" suffixes are accepted.
pub fn parse_bitrate(s: &str) -> Result<u32, CliError> {
    let s_lower = s.to_lowercase();
    let invalid = || CliError::InvalidArgs(format!("Invalid bitrate: {}", s));

    let (value_str, scale) = if let Some(value_str) = s_lower.strip_suffix("mbps") {
        (value_str, 1_000_000)
    } else if let Some(value_str) = s_lower.strip_suffix("kbps") {
        (value_str, 1_000)
    } else {
        (s_lower.as_str(), 1_000)
    };

    let value = value_str.trim().parse::<u32>().map_err(|_| invalid())?;
    value.checked_mul(scale).ok_or_else(invalid)
}

/// Install signal handler for graceful shutdown on Ctrl+C
///
/// Returns an Arc<AtomicBool> that will be set to true when SIGINT is received.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>, CliError> {
    let term = Arc::new(AtomicBool::new(false));

    flag::register(SIGINT, Arc::clone(&term))
        .map_err(|e| CliError::General(format!("Failed to register signal handler: {}", e)))?;

    log::debug!("Installed SIGINT handler");
    Ok(term)
}

/// Create the platform for the selected backend.
pub fn open_platform(backend: Backend) -> Result<Arc<Platform>, CliError> {
    match backend {
        Backend::Native => {
            let platform = Platform::native()?;
            log::debug!("Using codec engine backend '{}'", platform.engine_name());
            Ok(platform)
        }
        Backend::Mock => {
            log::warn!("Using mock backend: output is synthetic");
            Ok(Platform::new(Arc::new(MockEngine::new())))
        }
    }
}

/// NAL unit types for H.264
const NAL_TYPE_SLICE: u8 = 1;
const NAL_TYPE_IDR: u8 = 5;
const NAL_TYPE_SEI: u8 = 6;
const NAL_TYPE_SPS: u8 = 7;
const NAL_TYPE_PPS: u8 = 8;
const NAL_TYPE_AUD: u8 = 9;

/// Parse NAL units from Annex-B format bitstream
///
/// Annex-B format uses start codes:
/// - 0x00 0x00 0x00 0x01 (4-byte)
/// - 0x00 0x00 0x01 (3-byte)
///
/// Returns the byte range of each NAL unit including its start code.
fn nal_ranges(data: &[u8]) -> Vec<(usize, usize)> {
    let start_code_at = |i: usize| -> Option<usize> {
        if data[i..].starts_with(&[0, 0, 0, 1]) {
            Some(4)
        } else if data[i..].starts_with(&[0, 0, 1]) {
            Some(3)
        } else {
            None
        }
    };

    let mut starts = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match start_code_at(i) {
            Some(len) => {
                starts.push(i);
                i += len;
            }
            None => i += 1,
        }
    }

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| (start, starts.get(n + 1).copied().unwrap_or(data.len())))
        .collect()
}

/// The NAL unit in `range` without its start code.
fn nal_payload(data: &[u8], (start, end): (usize, usize)) -> &[u8] {
    let body = &data[start..end];
    let skip = if body.starts_with(&[0, 0, 0, 1]) { 4 } else { 3 };
    body.get(skip..).unwrap_or(&[])
}

/// Split an H.264 Annex-B stream into access units.
///
/// A new access unit starts at an AUD, SPS, PPS or SEI that follows a coded
/// slice, or at a slice whose `first_mb_in_slice` is zero after a previous
/// slice. Each access unit keeps its start codes.
pub fn split_access_units(data: &[u8]) -> Vec<&[u8]> {
    let mut units = Vec::new();
    let mut unit_start: Option<usize> = None;
    let mut has_slice = false;

    for range in nal_ranges(data) {
        let payload = nal_payload(data, range);
        let Some(&header) = payload.first() else {
            continue;
        };
        let nal_type = header & 0x1f;

        let is_slice = nal_type == NAL_TYPE_SLICE || nal_type == NAL_TYPE_IDR;
        // first_mb_in_slice is ue(v); zero encodes as a single '1' bit.
        let first_slice = is_slice && payload.get(1).is_some_and(|b| b & 0x80 != 0);
        let starts_unit = matches!(
            nal_type,
            NAL_TYPE_AUD | NAL_TYPE_SPS | NAL_TYPE_PPS | NAL_TYPE_SEI
        ) || first_slice;

        if has_slice && starts_unit {
            if let Some(start) = unit_start {
                units.push(&data[start..range.0]);
            }
            unit_start = None;
            has_slice = false;
        }
        if unit_start.is_none() {
            unit_start = Some(range.0);
        }
        has_slice |= is_slice;
    }

    if let Some(start) = unit_start {
        units.push(&data[start..]);
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nal(kind: u8, body: &[u8]) -> Vec<u8> {
        let mut out = vec![0, 0, 0, 1, kind];
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_parse_resolution_valid() {
        assert_eq!(parse_resolution("1600x1200").unwrap(), (1600, 1200));
        assert_eq!(parse_resolution("720x576").unwrap(), (720, 576));
        assert_eq!(parse_resolution("1280*720").unwrap(), (1280, 720));
    }

    #[test]
    fn test_parse_resolution_invalid() {
        assert!(parse_resolution("1920").is_err());
        assert!(parse_resolution("1920x").is_err());
        assert!(parse_resolution("x1080").is_err());
        assert!(parse_resolution("1920x1080x60").is_err());
        assert!(parse_resolution("0x0").is_err());
        assert!(parse_resolution("-1920x1080").is_err());
    }

    #[test]
    fn test_parse_bitrate() {
        assert_eq!(parse_bitrate("6000").unwrap(), 6_000_000);
        assert_eq!(parse_bitrate("500kbps").unwrap(), 500_000);
        assert_eq!(parse_bitrate("4Mbps").unwrap(), 4_000_000);
        assert!(parse_bitrate("abc").is_err());
        assert!(parse_bitrate("-1000").is_err());
        assert!(parse_bitrate("9000000Mbps").is_err());
    }

    #[test]
    fn test_parse_rational_and_qp() {
        assert_eq!(parse_rational("25").unwrap(), Rational::new(25, 1));
        assert_eq!(parse_rational("30000/1001").unwrap(), Rational::new(30000, 1001));
        assert!(parse_rational("30/0").is_err());
        assert!(parse_rational("fast").is_err());

        let qp = parse_qp("10:40").unwrap();
        assert_eq!((qp.min, qp.max), (10, 40));
        assert!(parse_qp("10").is_err());
    }

    #[test]
    fn test_split_access_units() {
        let mut stream = Vec::new();
        stream.extend(nal(0x67, &[0x42, 0x00, 0x1e]));
        stream.extend(nal(0x68, &[0xce, 0x3c]));
        stream.extend(nal(0x65, &[0x88, 0x84]));
        // Second slice of the same picture.
        stream.extend(nal(0x65, &[0x40, 0x11]));
        stream.extend(nal(0x41, &[0x9a, 0x02]));
        stream.extend(nal(0x41, &[0x9a, 0x03]));

        let units = split_access_units(&stream);
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].len(), 8 + 7 + 7 + 7);
        assert_eq!(units[1], &nal(0x41, &[0x9a, 0x02])[..]);
        assert_eq!(units[2], &nal(0x41, &[0x9a, 0x03])[..]);
    }

    #[test]
    fn test_split_access_units_without_start_code() {
        assert!(split_access_units(&[1, 2, 3]).is_empty());
        assert!(split_access_units(&[]).is_empty());
    }
}
