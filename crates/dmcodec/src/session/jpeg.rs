// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

use std::sync::Arc;

use super::{CodecSession, EncodedUnit, Input, Output, SessionCore, SessionState};
use crate::{
    engine::Platform,
    frame::{Frame, Packet},
    hw::{CodecFamily, ProcessArgs},
    params::{DynamicParams, SessionConfig, StaticParams},
    Error,
};

/// Baseline JPEG still-image encode session.
///
/// Shares the encode domain with [`H264Encoder`](super::H264Encoder), so the
/// two cannot be open on one platform at the same time. Every picture is
/// coded independently and reported as a key frame.
#[derive(Debug)]
pub struct JpegEncoder {
    core: SessionCore,
}

impl JpegEncoder {
    pub fn open(platform: &Arc<Platform>, config: &SessionConfig) -> Result<Self, Error> {
        let mut core = SessionCore::open(platform, config, CodecFamily::JpegEncode)?;
        core.min_output_size()?;
        core.finish_open();
        Ok(JpegEncoder { core })
    }

    /// Encode one picture into `packet`.
    pub fn encode(&mut self, frame: &Frame<'_>, packet: &mut Packet) -> Result<EncodedUnit, Error> {
        self.core.encode(frame, packet, ProcessArgs::JpegEncode, true)
    }

    /// Change the quality factor used for the following pictures.
    pub fn set_quality(&mut self, quality: u8) -> Result<(), Error> {
        if !(1..=100).contains(&quality) {
            return Err(Error::InvalidConfiguration(format!(
                "JPEG quality {} must be within 1..=100",
                quality
            )));
        }
        self.core.reconfigure("quality", |dynamic| {
            if let DynamicParams::JpegEncode(d) = dynamic {
                d.quality = quality;
            }
        })
    }

    pub fn min_packet_size(&self) -> usize {
        self.core.min_output_size().unwrap_or(0)
    }

    pub fn state(&self) -> SessionState {
        self.core.state
    }

    pub fn static_params(&self) -> Option<&StaticParams> {
        self.core.static_params()
    }

    pub fn dynamic_params(&self) -> Option<&DynamicParams> {
        self.core.dynamic_params()
    }

    pub fn close(&mut self) {
        self.core.close();
    }
}

impl CodecSession for JpegEncoder {
    fn family(&self) -> CodecFamily {
        CodecFamily::JpegEncode
    }

    fn state(&self) -> SessionState {
        self.core.state
    }

    fn codec_name(&self) -> &str {
        &self.core.codec
    }

    fn process_one<'s>(&'s mut self, input: Input<'_>) -> Result<Output<'s>, Error> {
        self.core.ensure_ready("encode")?;
        match input {
            Input::Picture { frame, packet } => self.encode(frame, packet).map(Output::Encoded),
            Input::AccessUnit(_) => Err(Error::InvalidConfiguration(
                "an encoder takes pictures, not compressed access units".to_string(),
            )),
        }
    }

    fn close(&mut self) {
        self.core.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mock::{FailPoint, MockEngine},
        session::H264Encoder,
    };

    #[test]
    fn test_jpeg_pictures_are_key_frames() {
        let mock = Arc::new(MockEngine::new());
        let platform = Platform::new(mock.clone());
        let config = SessionConfig::new(CodecFamily::JpegEncode, 64, 48).with_quality(80);
        let mut encoder = JpegEncoder::open(&platform, &config).unwrap();

        let luma = vec![0u8; 64 * 48];
        let chroma = vec![0u8; 64 * 24];
        let frame = Frame::nv12(64, 48, 64, &luma, &chroma);
        let mut packet = Packet::with_capacity(encoder.min_packet_size());
        for _ in 0..2 {
            let unit = encoder.encode(&frame, &mut packet).unwrap();
            assert!(unit.key_frame);
            assert_eq!(&packet.data()[..2], &[0xff, 0xd8]);
        }
    }

    #[test]
    fn test_jpeg_shares_stride_reconfiguration() {
        let mock = Arc::new(MockEngine::new());
        let platform = Platform::new(mock.clone());
        let config = SessionConfig::new(CodecFamily::JpegEncode, 64, 48);
        let mut encoder = JpegEncoder::open(&platform, &config).unwrap();

        let luma = vec![0u8; 128 * 48];
        let chroma = vec![0u8; 128 * 24];
        let frame = Frame::nv12(64, 48, 128, &luma, &chroma);
        let mut packet = Packet::with_capacity(encoder.min_packet_size());

        mock.fail_next(FailPoint::SetParams);
        let err = encoder.encode(&frame, &mut packet).unwrap_err();
        assert!(matches!(err, Error::ReconfigurationFailed { .. }));
        assert_eq!(encoder.dynamic_params().and_then(DynamicParams::capture_width), Some(64));

        let unit = encoder.encode(&frame, &mut packet).unwrap();
        assert!(unit.reconfigured);
        assert_eq!(encoder.dynamic_params().and_then(DynamicParams::capture_width), Some(128));
    }

    #[test]
    fn test_quality_update() {
        let mock = Arc::new(MockEngine::new());
        let platform = Platform::new(mock.clone());
        let config = SessionConfig::new(CodecFamily::JpegEncode, 64, 48);
        let mut encoder = JpegEncoder::open(&platform, &config).unwrap();
        encoder.set_quality(95).unwrap();
        assert!(encoder.set_quality(0).is_err());
        match encoder.dynamic_params() {
            Some(DynamicParams::JpegEncode(d)) => assert_eq!(d.quality, 95),
            other => panic!("unexpected parameters {:?}", other),
        }
    }

    #[test]
    fn test_jpeg_and_h264_share_the_encode_slot() {
        let mock = Arc::new(MockEngine::new());
        let platform = Platform::new(mock);
        let jpeg = JpegEncoder::open(&platform, &SessionConfig::new(CodecFamily::JpegEncode, 64, 48))
            .unwrap();
        let h264 = SessionConfig::new(CodecFamily::H264Encode, 64, 48);
        assert!(matches!(
            H264Encoder::open(&platform, &h264),
            Err(Error::EngineUnavailable(_))
        ));
        drop(jpeg);
        assert!(H264Encoder::open(&platform, &h264).is_ok());
    }
}
