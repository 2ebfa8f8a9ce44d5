// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

use std::sync::Arc;

use super::{CodecSession, EncodedUnit, Input, Output, SessionCore, SessionState, INPUT_ID};
use crate::{
    engine::Platform,
    frame::{Frame, Packet},
    hw::{CodecFamily, ProcessArgs},
    params::{DynamicParams, SessionConfig, StaticParams},
    Error,
};

/// H.264 encode session.
///
/// Pictures are read in place from the caller's NV12 planes; the encoded
/// access unit is written into the caller's [`Packet`], which must hold at
/// least [`min_packet_size`](H264Encoder::min_packet_size) bytes.
///
/// When a picture's stride differs from the capture width the encoder was
/// last configured with, the new stride is submitted to the hardware before
/// the picture is encoded. A rejected update leaves the previous parameters
/// in place and fails the call with [`Error::ReconfigurationFailed`].
#[derive(Debug)]
pub struct H264Encoder {
    core: SessionCore,
}

impl H264Encoder {
    /// Open an encoder. On failure every resource acquired along the way has
    /// already been released.
    pub fn open(platform: &Arc<Platform>, config: &SessionConfig) -> Result<Self, Error> {
        let mut core = SessionCore::open(platform, config, CodecFamily::H264Encode)?;
        core.min_output_size()?;
        core.finish_open();
        Ok(H264Encoder { core })
    }

    /// Encode one picture into `packet`.
    pub fn encode(&mut self, frame: &Frame<'_>, packet: &mut Packet) -> Result<EncodedUnit, Error> {
        let args = ProcessArgs::H264Encode {
            input_id: INPUT_ID,
            top_field_first: true,
            insert_user_data: false,
        };
        self.core.encode(frame, packet, args, false)
    }

    /// Change the target bit-rate of the running stream.
    pub fn set_bitrate(&mut self, bitrate: u32) -> Result<(), Error> {
        let max = match self.core.static_params() {
            Some(StaticParams::H264Encode(p)) => p.max_bit_rate,
            _ => u32::MAX,
        };
        if bitrate == 0 || bitrate > max {
            return Err(Error::InvalidConfiguration(format!(
                "bit-rate {} must be within 1..={}",
                bitrate, max
            )));
        }
        self.core.reconfigure("bit-rate", |dynamic| {
            if let DynamicParams::H264Encode(d) = dynamic {
                d.target_bit_rate = bitrate;
            }
        })
    }

    /// Change the intra frame interval of the running stream.
    pub fn set_gop(&mut self, gop: u32) -> Result<(), Error> {
        if gop == 0 {
            return Err(Error::InvalidConfiguration(
                "GOP size must be at least 1".to_string(),
            ));
        }
        self.core.reconfigure("GOP size", |dynamic| {
            if let DynamicParams::H264Encode(d) = dynamic {
                d.intra_frame_interval = gop;
            }
        })
    }

    /// Smallest packet capacity the hardware accepts for one access unit.
    pub fn min_packet_size(&self) -> usize {
        self.core.min_output_size().unwrap_or(0)
    }

    pub fn state(&self) -> SessionState {
        self.core.state
    }

    pub fn width(&self) -> u32 {
        self.core.width
    }

    pub fn height(&self) -> u32 {
        self.core.height
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

impl CodecSession for H264Encoder {
    fn family(&self) -> CodecFamily {
        CodecFamily::H264Encode
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
        mock::{Call, FailPoint, MockEngine},
        transcode::FrameClassification,
    };

    fn open(config: SessionConfig) -> (Arc<MockEngine>, Arc<Platform>, H264Encoder) {
        let mock = Arc::new(MockEngine::new());
        let platform = Platform::new(mock.clone());
        let encoder = H264Encoder::open(&platform, &config).unwrap();
        (mock, platform, encoder)
    }

    fn h264(encoder: &H264Encoder) -> crate::params::H264EncoderDynamicParams {
        match encoder.dynamic_params() {
            Some(DynamicParams::H264Encode(d)) => d.clone(),
            other => panic!("unexpected parameters {:?}", other),
        }
    }

    #[test]
    fn test_gop_drives_key_frames() {
        let config = SessionConfig::new(CodecFamily::H264Encode, 64, 64).with_gop(3);
        let (_mock, _platform, mut encoder) = open(config);
        let luma = vec![0u8; 64 * 64];
        let chroma = vec![0u8; 64 * 32];
        let frame = Frame::nv12(64, 64, 64, &luma, &chroma);
        let mut packet = Packet::with_capacity(encoder.min_packet_size());

        let mut keys = Vec::new();
        for _ in 0..6 {
            let unit = encoder.encode(&frame, &mut packet).unwrap();
            assert!(!unit.reconfigured);
            assert_eq!(packet.size(), unit.bytes);
            keys.push(unit.key_frame);
        }
        assert_eq!(keys, vec![true, false, false, true, false, false]);
        assert_eq!(&packet.data()[..4], &[0, 0, 0, 1]);
    }

    #[test]
    fn test_stride_change_reconfigures_once() {
        let config = SessionConfig::new(CodecFamily::H264Encode, 64, 64);
        let (mock, _platform, mut encoder) = open(config);
        let luma = vec![0u8; 96 * 64];
        let chroma = vec![0u8; 96 * 32];
        let frame = Frame::nv12(64, 64, 96, &luma, &chroma);
        let mut packet = Packet::with_capacity(encoder.min_packet_size());

        mock.clear_calls();
        let unit = encoder.encode(&frame, &mut packet).unwrap();
        assert!(unit.reconfigured);
        assert_eq!(h264(&encoder).capture_width, 96);

        let unit = encoder.encode(&frame, &mut packet).unwrap();
        assert!(!unit.reconfigured);
        let controls = mock
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Control { .. }))
            .count();
        assert_eq!(controls, 1);
    }

    #[test]
    fn test_rejected_bitrate_restores_params() {
        let config = SessionConfig::new(CodecFamily::H264Encode, 64, 64).with_bitrate(1_000_000);
        let (mock, _platform, mut encoder) = open(config);
        let before = h264(&encoder);

        mock.fail_next(FailPoint::SetParams);
        let err = encoder.set_bitrate(500_000).unwrap_err();
        assert!(matches!(err, Error::ReconfigurationFailed { .. }));
        assert_eq!(h264(&encoder), before);
        assert_eq!(encoder.state(), SessionState::Ready);

        encoder.set_bitrate(500_000).unwrap();
        encoder.set_gop(60).unwrap();
        let after = h264(&encoder);
        assert_eq!(after.target_bit_rate, 500_000);
        assert_eq!(after.intra_frame_interval, 60);
        assert_eq!(
            mock.accepted_params(CodecFamily::H264Encode),
            encoder.dynamic_params().cloned()
        );
    }

    #[test]
    fn test_bitrate_bounded_by_static_maximum() {
        let config = SessionConfig::new(CodecFamily::H264Encode, 64, 64).with_bitrate(1_000_000);
        let (_mock, _platform, mut encoder) = open(config);
        assert!(matches!(
            encoder.set_bitrate(2_000_000),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(encoder.set_gop(0).is_err());
    }

    #[test]
    fn test_small_packet_rejected() {
        let config = SessionConfig::new(CodecFamily::H264Encode, 64, 64);
        let (_mock, _platform, mut encoder) = open(config);
        let luma = vec![0u8; 64 * 64];
        let chroma = vec![0u8; 64 * 32];
        let frame = Frame::nv12(64, 64, 64, &luma, &chroma);
        let mut packet = Packet::with_capacity(16);
        assert!(matches!(
            encoder.encode(&frame, &mut packet),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_oversized_output_is_processing_failure() {
        let config = SessionConfig::new(CodecFamily::H264Encode, 64, 64);
        let (mock, _platform, mut encoder) = open(config);
        let luma = vec![0u8; 64 * 64];
        let chroma = vec![0u8; 64 * 32];
        let frame = Frame::nv12(64, 64, 64, &luma, &chroma);
        let mut packet = Packet::with_capacity(encoder.min_packet_size());
        mock.set_bytes_generated(packet.capacity() + 1);
        let err = encoder.encode(&frame, &mut packet).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(encoder.state(), SessionState::Ready);
    }

    #[test]
    fn test_unit_classification() {
        let config = SessionConfig::new(CodecFamily::H264Encode, 64, 64);
        let (mock, _platform, mut encoder) = open(config);
        mock.script_frame_types(&[dmcodec_sys::IVIDEO_I_FRAME]);
        let luma = vec![0u8; 64 * 64];
        let chroma = vec![0u8; 64 * 32];
        let frame = Frame::nv12(64, 64, 64, &luma, &chroma);
        let mut packet = Packet::with_capacity(encoder.min_packet_size());
        let unit = encoder.encode(&frame, &mut packet).unwrap();
        assert_eq!(unit.classification, FrameClassification::I);
        assert!(packet.key_frame());
    }
}
