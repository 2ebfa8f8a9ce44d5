// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

use std::sync::Arc;

use super::{CodecSession, Decoded, Input, Output, SessionCore, SessionState};
use crate::{
    engine::Platform,
    hw::CodecFamily,
    params::{DynamicParams, SessionConfig, StaticParams},
    Error,
};

/// H.264 decode session.
///
/// Each call to [`decode`](H264Decoder::decode) copies one access unit into
/// the session's contiguous input region and returns the picture the
/// hardware released, viewing the session's output planes. The view borrows
/// the decoder, so it must be dropped (or copied) before the next unit.
///
/// # Examples
///
/// ```no_run
/// use dmcodec::engine::Platform;
/// use dmcodec::hw::CodecFamily;
/// use dmcodec::params::SessionConfig;
/// use dmcodec::session::H264Decoder;
///
/// let platform = Platform::native()?;
/// let config = SessionConfig::new(CodecFamily::H264Decode, 1280, 720);
/// let mut decoder = H264Decoder::open(&platform, &config)?;
/// let decoded = decoder.decode(&[0, 0, 0, 1, 0x67])?;
/// println!("consumed {} bytes", decoded.bytes_consumed);
/// # Ok::<(), dmcodec::Error>(())
/// ```
#[derive(Debug)]
pub struct H264Decoder {
    core: SessionCore,
}

impl H264Decoder {
    /// Open a decoder. On failure every resource acquired along the way has
    /// already been released.
    pub fn open(platform: &Arc<Platform>, config: &SessionConfig) -> Result<Self, Error> {
        let mut core = SessionCore::open(platform, config, CodecFamily::H264Decode)?;
        core.allocate_decode_buffers()?;
        core.finish_open();
        Ok(H264Decoder { core })
    }

    /// Decode one access unit.
    ///
    /// An input larger than [`input_capacity`](Self::input_capacity) fails
    /// with [`Error::InputTooLarge`] before anything is written. Failures
    /// leave the decoder ready for the next unit.
    pub fn decode(&mut self, data: &[u8]) -> Result<Decoded<'_>, Error> {
        self.core.decode(data)
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

    /// Capacity of the compressed input region in bytes.
    pub fn input_capacity(&self) -> usize {
        self.core.input_capacity()
    }

    /// Sizes of the output planes carved from the output region.
    pub fn output_planes(&self) -> Vec<usize> {
        self.core.output_planes()
    }

    pub fn close(&mut self) {
        self.core.close();
    }
}

impl CodecSession for H264Decoder {
    fn family(&self) -> CodecFamily {
        CodecFamily::H264Decode
    }

    fn state(&self) -> SessionState {
        self.core.state
    }

    fn codec_name(&self) -> &str {
        &self.core.codec
    }

    fn process_one<'s>(&'s mut self, input: Input<'_>) -> Result<Output<'s>, Error> {
        self.core.ensure_ready("decode")?;
        match input {
            Input::AccessUnit(data) => self.decode(data).map(Output::Decoded),
            Input::Picture { .. } => Err(Error::InvalidConfiguration(
                "a decoder takes compressed access units, not pictures".to_string(),
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
        transcode::FrameClassification,
    };
    use dmcodec_sys as ffi;

    fn open(width: u32, height: u32) -> (Arc<MockEngine>, Arc<Platform>, H264Decoder) {
        let mock = Arc::new(MockEngine::new());
        let platform = Platform::new(mock.clone());
        let config = SessionConfig::new(CodecFamily::H264Decode, width, height);
        let decoder = H264Decoder::open(&platform, &config).unwrap();
        (mock, platform, decoder)
    }

    #[test]
    fn test_decoder_buffers_follow_reported_sizes() {
        let (_mock, _platform, decoder) = open(320, 240);
        assert_eq!(decoder.state(), SessionState::Ready);
        assert_eq!(decoder.input_capacity(), 320 * 240 / 2);
        assert_eq!(decoder.output_planes(), vec![320 * 240, 320 * 240 / 2]);
    }

    #[test]
    fn test_decode_returns_frame_in_output_region() {
        let (mock, _platform, mut decoder) = open(64, 64);
        mock.script_frame_types(&[ffi::IVIDEO_IDR_FRAME, ffi::IVIDEO_P_FRAME]);

        let decoded = decoder.decode(&[0u8; 512]).unwrap();
        assert_eq!(decoded.bytes_consumed, 512);
        assert_eq!(decoded.classification, FrameClassification::Idr);
        let frame = decoded.frame.unwrap();
        assert!(frame.key_frame());
        assert_eq!((frame.width(), frame.height()), (64, 64));
        assert_eq!(frame.planes()[0].data()[0], 0x10);
        assert_eq!(frame.planes()[1].data()[0], 0x80);

        let decoded = decoder.decode(&[0u8; 100]).unwrap();
        assert_eq!(decoded.classification, FrameClassification::P);
        assert!(!decoded.frame.unwrap().key_frame());
    }

    #[test]
    fn test_decode_failure_keeps_session_ready() {
        let (mock, _platform, mut decoder) = open(64, 64);
        mock.fail_next(FailPoint::Process);
        let err = decoder.decode(&[1u8; 16]).unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.extended_error().unwrap().is_corrupted_data());
        assert_eq!(decoder.state(), SessionState::Ready);
        assert!(decoder.decode(&[1u8; 16]).is_ok());
    }

    #[test]
    fn test_oversized_unit_is_rejected_before_processing() {
        let (mock, _platform, mut decoder) = open(64, 64);
        mock.clear_calls();
        let capacity = decoder.input_capacity();
        let err = decoder.decode(&vec![0u8; capacity + 1]).unwrap_err();
        assert!(matches!(err, Error::InputTooLarge { .. }));
        assert!(mock.calls().is_empty());
        assert_eq!(decoder.state(), SessionState::Ready);
    }

    #[test]
    fn test_out_of_region_picture_is_rejected() {
        let (mock, _platform, mut decoder) = open(64, 64);
        mock.set_picture_planes(vec![(0x1000, 64 * 64), (0x2000, 64 * 32)]);
        let err = decoder.decode(&[0u8; 32]).unwrap_err();
        assert!(matches!(err, Error::InvalidOutput(_)));
        assert!(err.is_recoverable());
        assert_eq!(decoder.state(), SessionState::Ready);
    }

    #[test]
    fn test_second_decoder_is_refused() {
        let (mock, platform, mut decoder) = open(64, 64);
        let config = SessionConfig::new(CodecFamily::H264Decode, 64, 64);
        let before = mock.counts();
        assert!(matches!(
            H264Decoder::open(&platform, &config),
            Err(Error::EngineUnavailable(_))
        ));
        assert_eq!(mock.counts(), before);

        decoder.close();
        assert!(H264Decoder::open(&platform, &config).is_ok());
    }
}
