// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

//! Codec parameter construction.
//!
//! Every codec instance is created with a static parameter block (the
//! resolution, frame-rate, bit-rate and format envelope, fixed for the
//! lifetime of the instance) and driven with a dynamic parameter block that
//! can be resubmitted to a live instance.
//!
//! [`build`] produces both blocks in three layers:
//!
//! 1. the family-wide defaults ([`defaults`]),
//! 2. the caller's [`SessionConfig`] (geometry, frame rate, bit-rate, QP
//!    bounds, GOP, aspect ratio, rate control),
//! 3. fixed policy: NV12 input, no B-frames, VUI timing derived from the
//!    frame rate, capture width equal to the input width.

use std::{ffi::CString, fmt};

use dmcodec_sys as ffi;

use crate::{hw::CodecFamily, Error};

/// Largest width or height accepted by any family.
pub const MAX_DIMENSION: u32 = 4096;

/// Highest H.264 quantiser.
pub const MAX_QP: u8 = 51;

/// A rational number, used for frame rates and aspect ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub const fn new(num: u32, den: u32) -> Self {
        Rational { num, den }
    }

    /// Frame rate in the thousandths-of-a-frame unit used by the codecs.
    pub fn milli(&self) -> u32 {
        if self.den == 0 {
            return 0;
        }
        ((self.num as u64 * 1000) / self.den as u64).min(u32::MAX as u64) as u32
    }
}

impl Default for Rational {
    fn default() -> Self {
        Rational::new(30, 1)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Pixel layouts known to the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 4:2:0 semi-planar: a luma plane followed by interleaved CbCr.
    #[default]
    Nv12,
    /// 4:2:0 planar.
    I420,
    /// 4:2:2 interleaved.
    Yuyv,
}

impl PixelFormat {
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            PixelFormat::Nv12 => *b"NV12",
            PixelFormat::I420 => *b"I420",
            PixelFormat::Yuyv => *b"YUYV",
        }
    }

    /// Parse a four character code, case-insensitively.
    pub fn from_fourcc(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "NV12" => Some(PixelFormat::Nv12),
            "I420" | "YU12" => Some(PixelFormat::I420),
            "YUYV" | "YUY2" => Some(PixelFormat::Yuyv),
            _ => None,
        }
    }

    pub fn plane_count(&self) -> usize {
        match self {
            PixelFormat::Nv12 => 2,
            PixelFormat::I420 => 3,
            PixelFormat::Yuyv => 1,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.fourcc()))
    }
}

/// Chroma layouts as understood by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChromaFormat {
    NotApplicable,
    Yuv420Planar,
    Yuv422Interleaved,
    Yuv420SemiPlanar,
}

impl ChromaFormat {
    pub fn raw(&self) -> i32 {
        match self {
            ChromaFormat::NotApplicable => ffi::XDM_CHROMA_NA,
            ChromaFormat::Yuv420Planar => ffi::XDM_YUV_420P,
            ChromaFormat::Yuv422Interleaved => ffi::XDM_YUV_422ILE,
            ChromaFormat::Yuv420SemiPlanar => ffi::XDM_YUV_420SP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingPreset {
    Default,
    HighQuality,
    HighSpeed,
}

impl EncodingPreset {
    pub fn raw(&self) -> i32 {
        match self {
            EncodingPreset::Default => ffi::XDM_DEFAULT,
            EncodingPreset::HighQuality => ffi::XDM_HIGH_QUALITY,
            EncodingPreset::HighSpeed => ffi::XDM_HIGH_SPEED,
        }
    }
}

/// Rate-control mode of the video encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RateControl {
    /// Constant bit-rate tuned for low delay.
    #[default]
    LowDelay,
    /// Variable bit-rate tuned for storage.
    Storage,
    /// No rate control; quality follows the QP bounds.
    Disabled,
}

impl RateControl {
    pub fn raw(&self) -> i32 {
        match self {
            RateControl::LowDelay => ffi::IVIDEO_LOW_DELAY,
            RateControl::Storage => ffi::IVIDEO_STORAGE,
            RateControl::Disabled => ffi::IVIDEO_NONE,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "cbr" | "low-delay" | "lowdelay" => Some(RateControl::LowDelay),
            "vbr" | "storage" => Some(RateControl::Storage),
            "none" | "disabled" | "cqp" => Some(RateControl::Disabled),
            _ => None,
        }
    }
}

/// Whether a call produces full access units or only headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderMode {
    AccessUnit,
    HeaderOnly,
}

impl HeaderMode {
    pub fn raw(&self) -> i32 {
        match self {
            HeaderMode::AccessUnit => ffi::XDM_ENCODE_AU,
            HeaderMode::HeaderOnly => ffi::XDM_GENERATE_HEADER,
        }
    }
}

/// Inclusive quantiser bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QpRange {
    pub min: u8,
    pub max: u8,
}

impl QpRange {
    pub const fn new(min: u8, max: u8) -> Self {
        QpRange { min, max }
    }
}

/// Caller-facing stream configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub family: CodecFamily,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Rational,
    /// Target bit-rate in bits per second; the family default when unset.
    pub bitrate: Option<u32>,
    pub qp: Option<QpRange>,
    /// Intra frame interval in frames.
    pub gop: Option<u32>,
    /// Sample aspect ratio written to the VUI.
    pub aspect_ratio: Option<Rational>,
    pub rate_control: RateControl,
    pub pixel_format: PixelFormat,
    /// JPEG quality factor, 1 to 100.
    pub quality: Option<u8>,
    /// Algorithm name registered with the engine; the family default when
    /// unset.
    pub codec_name: Option<String>,
}

impl SessionConfig {
    pub fn new(family: CodecFamily, width: u32, height: u32) -> Self {
        SessionConfig {
            family,
            width,
            height,
            frame_rate: Rational::default(),
            bitrate: None,
            qp: None,
            gop: None,
            aspect_ratio: None,
            rate_control: RateControl::default(),
            pixel_format: PixelFormat::default(),
            quality: None,
            codec_name: None,
        }
    }

    pub fn with_frame_rate(mut self, frame_rate: Rational) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    pub fn with_qp(mut self, qp: QpRange) -> Self {
        self.qp = Some(qp);
        self
    }

    pub fn with_gop(mut self, gop: u32) -> Self {
        self.gop = Some(gop);
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: Rational) -> Self {
        self.aspect_ratio = Some(aspect_ratio);
        self
    }

    pub fn with_rate_control(mut self, rate_control: RateControl) -> Self {
        self.rate_control = rate_control;
        self
    }

    pub fn with_pixel_format(mut self, pixel_format: PixelFormat) -> Self {
        self.pixel_format = pixel_format;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_codec_name(mut self, name: impl Into<String>) -> Self {
        self.codec_name = Some(name.into());
        self
    }

    /// Algorithm name used to create the codec instance.
    pub fn codec_name(&self) -> &str {
        self.codec_name
            .as_deref()
            .unwrap_or_else(|| self.family.default_codec_name())
    }
}

/// Static parameters of the H.264 decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderParams {
    pub max_width: u32,
    pub max_height: u32,
    pub max_frame_rate: u32,
    pub max_bit_rate: u32,
    pub force_chroma: ChromaFormat,
}

/// Dynamic parameters of the H.264 decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderDynamicParams {
    pub decode_header: HeaderMode,
    /// Output pitch in pixels; zero keeps the native width.
    pub display_width: u32,
    pub skip_frames: bool,
    pub display_order: bool,
}

/// Static parameters of the H.264 encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H264EncoderParams {
    pub encoding_preset: EncodingPreset,
    pub rate_control: RateControl,
    pub max_width: u32,
    pub max_height: u32,
    pub max_frame_rate: u32,
    pub max_bit_rate: u32,
    pub max_inter_frame_interval: u32,
    pub input_chroma: ChromaFormat,
    pub recon_chroma: ChromaFormat,
    pub profile_idc: u32,
    pub level_idc: u32,
    /// VUI enable flags; 0x04 selects the VUI buffer passed with the
    /// dynamic parameters.
    pub enable_vui: u32,
}

/// VUI timing block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VuiTiming {
    pub num_units_in_tick: u32,
    pub time_scale: u32,
    pub fixed_frame_rate: bool,
}

/// Dynamic parameters of the H.264 encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H264EncoderDynamicParams {
    pub input_width: u32,
    pub input_height: u32,
    pub ref_frame_rate: u32,
    pub target_frame_rate: u32,
    pub target_bit_rate: u32,
    pub intra_frame_interval: u32,
    pub generate_header: HeaderMode,
    /// Line pitch of the captured picture in pixels; zero means the input
    /// width.
    pub capture_width: u32,
    pub force_idr: bool,
    pub inter_frame_interval: u32,
    pub mb_data: bool,
    pub qp_min: u8,
    pub qp_max: u8,
    pub qp_init: u8,
    pub aspect_ratio: Option<Rational>,
    pub timing: Option<VuiTiming>,
    pub pic_timing_sei: bool,
}

/// Static parameters of the JPEG encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegEncoderParams {
    pub max_width: u32,
    pub max_height: u32,
    pub max_scans: u32,
    pub force_chroma: ChromaFormat,
}

/// Dynamic parameters of the JPEG encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegEncoderDynamicParams {
    /// Access units per call; zero encodes the whole picture.
    pub num_au: u32,
    pub input_chroma: ChromaFormat,
    pub input_width: u32,
    pub input_height: u32,
    pub capture_width: u32,
    pub generate_header: HeaderMode,
    pub quality: u8,
}

/// Static parameter block of one codec instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticParams {
    H264Decode(DecoderParams),
    H264Encode(H264EncoderParams),
    JpegEncode(JpegEncoderParams),
}

impl StaticParams {
    pub fn family(&self) -> CodecFamily {
        match self {
            StaticParams::H264Decode(_) => CodecFamily::H264Decode,
            StaticParams::H264Encode(_) => CodecFamily::H264Encode,
            StaticParams::JpegEncode(_) => CodecFamily::JpegEncode,
        }
    }

    /// Maximum picture geometry fixed at creation.
    pub fn max_geometry(&self) -> (u32, u32) {
        match self {
            StaticParams::H264Decode(p) => (p.max_width, p.max_height),
            StaticParams::H264Encode(p) => (p.max_width, p.max_height),
            StaticParams::JpegEncode(p) => (p.max_width, p.max_height),
        }
    }
}

/// Dynamic parameter block of one codec instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicParams {
    H264Decode(DecoderDynamicParams),
    H264Encode(H264EncoderDynamicParams),
    JpegEncode(JpegEncoderDynamicParams),
}

impl DynamicParams {
    pub fn family(&self) -> CodecFamily {
        match self {
            DynamicParams::H264Decode(_) => CodecFamily::H264Decode,
            DynamicParams::H264Encode(_) => CodecFamily::H264Encode,
            DynamicParams::JpegEncode(_) => CodecFamily::JpegEncode,
        }
    }

    /// Effective capture pitch of an encoder, resolving zero to the input
    /// width. `None` for decoders.
    pub fn capture_width(&self) -> Option<u32> {
        match self {
            DynamicParams::H264Decode(_) => None,
            DynamicParams::H264Encode(p) => Some(effective_capture(p.capture_width, p.input_width)),
            DynamicParams::JpegEncode(p) => Some(effective_capture(p.capture_width, p.input_width)),
        }
    }

    /// Set the capture pitch of an encoder. Returns `false` for decoders.
    pub fn set_capture_width(&mut self, width: u32) -> bool {
        match self {
            DynamicParams::H264Decode(_) => false,
            DynamicParams::H264Encode(p) => {
                p.capture_width = width;
                true
            }
            DynamicParams::JpegEncode(p) => {
                p.capture_width = width;
                true
            }
        }
    }
}

fn effective_capture(capture_width: u32, input_width: u32) -> u32 {
    if capture_width == 0 {
        input_width
    } else {
        capture_width
    }
}

/// The single pixel layout each family accepts.
pub fn accepted_format(family: CodecFamily) -> PixelFormat {
    match family {
        CodecFamily::H264Decode | CodecFamily::H264Encode | CodecFamily::JpegEncode => {
            PixelFormat::Nv12
        }
    }
}

/// Family-wide default parameter blocks.
pub fn defaults(family: CodecFamily) -> (StaticParams, DynamicParams) {
    match family {
        CodecFamily::H264Decode => (
            StaticParams::H264Decode(DecoderParams {
                max_width: 1920,
                max_height: 1088,
                max_frame_rate: 30000,
                max_bit_rate: 10_000_000,
                force_chroma: ChromaFormat::Yuv420SemiPlanar,
            }),
            DynamicParams::H264Decode(DecoderDynamicParams {
                decode_header: HeaderMode::AccessUnit,
                display_width: 0,
                skip_frames: false,
                display_order: true,
            }),
        ),
        CodecFamily::H264Encode => (
            StaticParams::H264Encode(H264EncoderParams {
                encoding_preset: EncodingPreset::Default,
                rate_control: RateControl::LowDelay,
                max_width: 1600,
                max_height: 1200,
                max_frame_rate: 30000,
                max_bit_rate: 6_000_000,
                max_inter_frame_interval: 0,
                input_chroma: ChromaFormat::Yuv420Planar,
                recon_chroma: ChromaFormat::NotApplicable,
                profile_idc: 100,
                level_idc: 40,
                enable_vui: 0,
            }),
            DynamicParams::H264Encode(H264EncoderDynamicParams {
                input_width: 1600,
                input_height: 1200,
                ref_frame_rate: 30000,
                target_frame_rate: 30000,
                target_bit_rate: 6_000_000,
                intra_frame_interval: 30,
                generate_header: HeaderMode::AccessUnit,
                capture_width: 0,
                force_idr: false,
                inter_frame_interval: 1,
                mb_data: false,
                qp_min: 0,
                qp_max: MAX_QP,
                qp_init: 28,
                aspect_ratio: None,
                timing: None,
                pic_timing_sei: false,
            }),
        ),
        CodecFamily::JpegEncode => (
            StaticParams::JpegEncode(JpegEncoderParams {
                max_width: 1600,
                max_height: 1200,
                max_scans: 15,
                force_chroma: ChromaFormat::Yuv420Planar,
            }),
            DynamicParams::JpegEncode(JpegEncoderDynamicParams {
                num_au: 0,
                input_chroma: ChromaFormat::Yuv420SemiPlanar,
                input_width: 1600,
                input_height: 1200,
                capture_width: 0,
                generate_header: HeaderMode::AccessUnit,
                quality: 75,
            }),
        ),
    }
}

/// Check a configuration before any resource is acquired for it.
pub fn validate(config: &SessionConfig) -> Result<(), Error> {
    let expected = accepted_format(config.family);
    if config.pixel_format != expected {
        return Err(Error::InvalidPixelFormat {
            requested: config.pixel_format,
            expected,
        });
    }
    if config.width == 0 || config.height == 0 {
        return Err(Error::InvalidConfiguration(format!(
            "dimensions {}x{} must be non-zero",
            config.width, config.height
        )));
    }
    if config.width > MAX_DIMENSION || config.height > MAX_DIMENSION {
        return Err(Error::InvalidConfiguration(format!(
            "dimensions {}x{} exceed {}x{}",
            config.width, config.height, MAX_DIMENSION, MAX_DIMENSION
        )));
    }
    if config.width % 2 != 0 || config.height % 2 != 0 {
        return Err(Error::InvalidConfiguration(format!(
            "dimensions {}x{} must be even for 4:2:0 chroma",
            config.width, config.height
        )));
    }
    if config.frame_rate.num == 0 || config.frame_rate.den == 0 || config.frame_rate.milli() == 0
    {
        return Err(Error::InvalidConfiguration(format!(
            "frame rate {} must be positive",
            config.frame_rate
        )));
    }
    if let Some(qp) = config.qp {
        if qp.min > qp.max || qp.max > MAX_QP {
            return Err(Error::InvalidConfiguration(format!(
                "QP range {}..{} must satisfy min <= max <= {}",
                qp.min, qp.max, MAX_QP
            )));
        }
    }
    if config.gop == Some(0) {
        return Err(Error::InvalidConfiguration(
            "GOP size must be at least 1".to_string(),
        ));
    }
    if config.bitrate == Some(0) {
        return Err(Error::InvalidConfiguration(
            "bit-rate must be positive".to_string(),
        ));
    }
    if let Some(quality) = config.quality {
        if !(1..=100).contains(&quality) {
            return Err(Error::InvalidConfiguration(format!(
                "JPEG quality {} must be within 1..=100",
                quality
            )));
        }
    }
    if let Some(aspect) = config.aspect_ratio {
        if aspect.num == 0 || aspect.den == 0 || aspect.num > 0xffff || aspect.den > 0xffff {
            return Err(Error::InvalidConfiguration(format!(
                "aspect ratio {} must have components within 1..=65535",
                aspect
            )));
        }
    }
    if config.codec_name().is_empty() {
        return Err(Error::InvalidConfiguration(
            "codec name must not be empty".to_string(),
        ));
    }
    // The runtime looks the algorithm up by C string.
    CString::new(config.codec_name())?;
    Ok(())
}

/// Build the static and dynamic parameter blocks for a configuration.
pub fn build(config: &SessionConfig) -> Result<(StaticParams, DynamicParams), Error> {
    validate(config)?;
    let (mut static_params, mut dynamic) = defaults(config.family);
    apply_config(config, &mut static_params, &mut dynamic);
    apply_policy(config, &mut static_params, &mut dynamic);
    Ok((static_params, dynamic))
}

fn apply_config(config: &SessionConfig, static_params: &mut StaticParams, dynamic: &mut DynamicParams) {
    let fps = config.frame_rate.milli();
    match (static_params, dynamic) {
        (StaticParams::H264Decode(p), DynamicParams::H264Decode(_)) => {
            p.max_width = config.width;
            p.max_height = config.height;
            p.max_frame_rate = fps;
            if let Some(bitrate) = config.bitrate {
                p.max_bit_rate = bitrate;
            }
        }
        (StaticParams::H264Encode(p), DynamicParams::H264Encode(d)) => {
            p.max_width = config.width;
            p.max_height = config.height;
            p.max_frame_rate = fps;
            p.rate_control = config.rate_control;
            d.input_width = config.width;
            d.input_height = config.height;
            d.ref_frame_rate = fps;
            d.target_frame_rate = fps;
            if let Some(bitrate) = config.bitrate {
                p.max_bit_rate = bitrate;
                d.target_bit_rate = bitrate;
            }
            if let Some(gop) = config.gop {
                d.intra_frame_interval = gop;
            }
            if let Some(qp) = config.qp {
                d.qp_min = qp.min;
                d.qp_max = qp.max;
                d.qp_init = d.qp_init.clamp(qp.min, qp.max);
            }
            d.aspect_ratio = config.aspect_ratio;
        }
        (StaticParams::JpegEncode(p), DynamicParams::JpegEncode(d)) => {
            p.max_width = config.width;
            p.max_height = config.height;
            d.input_width = config.width;
            d.input_height = config.height;
            if let Some(quality) = config.quality {
                d.quality = quality;
            }
        }
        _ => unreachable!("defaults() pairs parameter blocks of one family"),
    }
}

fn apply_policy(config: &SessionConfig, static_params: &mut StaticParams, dynamic: &mut DynamicParams) {
    match (static_params, dynamic) {
        (StaticParams::H264Decode(p), DynamicParams::H264Decode(d)) => {
            p.force_chroma = ChromaFormat::Yuv420SemiPlanar;
            d.decode_header = HeaderMode::AccessUnit;
        }
        (StaticParams::H264Encode(p), DynamicParams::H264Encode(d)) => {
            p.input_chroma = ChromaFormat::Yuv420SemiPlanar;
            p.encoding_preset = EncodingPreset::HighSpeed;
            p.max_inter_frame_interval = 0;
            p.enable_vui = 0x04;
            d.inter_frame_interval = 0;
            d.capture_width = d.input_width;
            d.timing = Some(VuiTiming {
                num_units_in_tick: config.frame_rate.den,
                time_scale: config.frame_rate.num,
                fixed_frame_rate: true,
            });
            d.pic_timing_sei = true;
        }
        (StaticParams::JpegEncode(_), DynamicParams::JpegEncode(d)) => {
            d.input_chroma = ChromaFormat::Yuv420SemiPlanar;
            d.capture_width = d.input_width;
            d.generate_header = HeaderMode::AccessUnit;
        }
        _ => unreachable!("defaults() pairs parameter blocks of one family"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h264(params: &(StaticParams, DynamicParams)) -> (&H264EncoderParams, &H264EncoderDynamicParams) {
        match params {
            (StaticParams::H264Encode(p), DynamicParams::H264Encode(d)) => (p, d),
            _ => panic!("expected H.264 encoder parameters"),
        }
    }

    #[test]
    fn test_rational_milli() {
        assert_eq!(Rational::new(30, 1).milli(), 30000);
        assert_eq!(Rational::new(30000, 1001).milli(), 29970);
        assert_eq!(Rational::new(25, 0).milli(), 0);
    }

    #[test]
    fn test_h264_encoder_layers() {
        let config = SessionConfig::new(CodecFamily::H264Encode, 1280, 720)
            .with_frame_rate(Rational::new(25, 1))
            .with_bitrate(2_000_000)
            .with_gop(50)
            .with_qp(QpRange::new(10, 40))
            .with_aspect_ratio(Rational::new(16, 11));
        let params = build(&config).unwrap();
        let (p, d) = h264(&params);

        // Caller overrides
        assert_eq!((p.max_width, p.max_height), (1280, 720));
        assert_eq!((d.input_width, d.input_height), (1280, 720));
        assert_eq!(p.max_frame_rate, 25000);
        assert_eq!(d.target_frame_rate, 25000);
        assert_eq!(d.target_bit_rate, 2_000_000);
        assert_eq!(d.intra_frame_interval, 50);
        assert_eq!((d.qp_min, d.qp_max), (10, 40));
        assert_eq!(d.aspect_ratio, Some(Rational::new(16, 11)));

        // Policy
        assert_eq!(p.input_chroma, ChromaFormat::Yuv420SemiPlanar);
        assert_eq!(p.encoding_preset, EncodingPreset::HighSpeed);
        assert_eq!(p.max_inter_frame_interval, 0);
        assert_eq!(d.inter_frame_interval, 0);
        assert_eq!(p.enable_vui, 0x04);
        assert_eq!(d.capture_width, 1280);
        assert_eq!(
            d.timing,
            Some(VuiTiming {
                num_units_in_tick: 1,
                time_scale: 25,
                fixed_frame_rate: true,
            })
        );
        assert!(d.pic_timing_sei);
    }

    #[test]
    fn test_h264_encoder_family_defaults_survive() {
        let params = build(&SessionConfig::new(CodecFamily::H264Encode, 640, 480)).unwrap();
        let (p, d) = h264(&params);
        assert_eq!(p.max_bit_rate, 6_000_000);
        assert_eq!(d.target_bit_rate, 6_000_000);
        assert_eq!(d.intra_frame_interval, 30);
        assert_eq!((d.qp_min, d.qp_max, d.qp_init), (0, 51, 28));
        assert_eq!(p.rate_control, RateControl::LowDelay);
    }

    #[test]
    fn test_initial_qp_clamped_to_range() {
        let config =
            SessionConfig::new(CodecFamily::H264Encode, 640, 480).with_qp(QpRange::new(30, 45));
        let params = build(&config).unwrap();
        assert_eq!(h264(&params).1.qp_init, 30);
    }

    #[test]
    fn test_decoder_params() {
        let config = SessionConfig::new(CodecFamily::H264Decode, 720, 576);
        match build(&config).unwrap() {
            (StaticParams::H264Decode(p), DynamicParams::H264Decode(d)) => {
                assert_eq!((p.max_width, p.max_height), (720, 576));
                assert_eq!(p.force_chroma, ChromaFormat::Yuv420SemiPlanar);
                assert_eq!(d.decode_header, HeaderMode::AccessUnit);
                assert_eq!(d.display_width, 0);
            }
            other => panic!("unexpected parameters {:?}", other),
        }
    }

    #[test]
    fn test_jpeg_params() {
        let config = SessionConfig::new(CodecFamily::JpegEncode, 800, 600).with_quality(90);
        match build(&config).unwrap() {
            (StaticParams::JpegEncode(p), DynamicParams::JpegEncode(d)) => {
                assert_eq!((p.max_width, p.max_height), (800, 600));
                assert_eq!(d.quality, 90);
                assert_eq!(d.input_chroma, ChromaFormat::Yuv420SemiPlanar);
                assert_eq!(d.capture_width, 800);
            }
            other => panic!("unexpected parameters {:?}", other),
        }
    }

    #[test]
    fn test_rejects_foreign_pixel_format() {
        let config = SessionConfig::new(CodecFamily::H264Encode, 640, 480)
            .with_pixel_format(PixelFormat::Yuyv);
        assert!(matches!(
            build(&config),
            Err(Error::InvalidPixelFormat {
                requested: PixelFormat::Yuyv,
                expected: PixelFormat::Nv12,
            })
        ));
    }

    #[test]
    fn test_rejects_invalid_configurations() {
        let base = SessionConfig::new(CodecFamily::H264Encode, 640, 480);
        let invalid = [
            SessionConfig::new(CodecFamily::H264Encode, 0, 480),
            SessionConfig::new(CodecFamily::H264Encode, 641, 480),
            SessionConfig::new(CodecFamily::H264Encode, 8192, 480),
            base.clone().with_frame_rate(Rational::new(0, 1)),
            base.clone().with_qp(QpRange::new(40, 20)),
            base.clone().with_qp(QpRange::new(0, 52)),
            base.clone().with_gop(0),
            base.clone().with_bitrate(0),
            base.clone().with_quality(0),
            base.clone().with_aspect_ratio(Rational::new(0, 1)),
            base.clone().with_codec_name(""),
        ];
        for config in invalid.iter() {
            assert!(
                matches!(build(config), Err(Error::InvalidConfiguration(_))),
                "accepted {:?}",
                config
            );
        }
    }

    #[test]
    fn test_capture_width_resolution() {
        let (_, mut dynamic) = build(&SessionConfig::new(CodecFamily::H264Encode, 640, 480)).unwrap();
        assert_eq!(dynamic.capture_width(), Some(640));
        assert!(dynamic.set_capture_width(0));
        assert_eq!(dynamic.capture_width(), Some(640));
        assert!(dynamic.set_capture_width(704));
        assert_eq!(dynamic.capture_width(), Some(704));

        let (_, mut dec) = defaults(CodecFamily::H264Decode);
        assert_eq!(dec.capture_width(), None);
        assert!(!dec.set_capture_width(704));
    }

    #[test]
    fn test_codec_name_default_and_override() {
        let config = SessionConfig::new(CodecFamily::JpegEncode, 640, 480);
        assert_eq!(config.codec_name(), "jpegenc");
        assert_eq!(config.clone().with_codec_name("jpegenc_ti").codec_name(), "jpegenc_ti");
        assert!(matches!(
            build(&config.with_codec_name("jpeg\0enc")),
            Err(Error::CString(_))
        ));
        assert_eq!(
            build(&SessionConfig::new(CodecFamily::H264Encode, 640, 480).with_codec_name("h264\0"))
                .unwrap_err()
                .kind(),
            crate::ErrorKind::InvalidConfiguration
        );
    }

    #[test]
    fn test_pixel_format_names() {
        assert_eq!(PixelFormat::from_fourcc("nv12"), Some(PixelFormat::Nv12));
        assert_eq!(PixelFormat::from_fourcc("YUY2"), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc("RGB3"), None);
        assert_eq!(PixelFormat::Nv12.to_string(), "NV12");
        assert_eq!(PixelFormat::Nv12.plane_count(), 2);
        assert_eq!(PixelFormat::Yuyv.plane_count(), 1);
        assert_eq!(RateControl::from_name("VBR"), Some(RateControl::Storage));
    }
}
