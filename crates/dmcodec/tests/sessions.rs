// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors
//
// Session Lifecycle Tests
//
// TESTING LAYERS:
//
// Layer 1 (Mock engine - No hardware required):
//   - test_open_failure_releases_everything: failure injected at every open step
//   - test_decode_standard_definition: 720x576 decode of a 4096-byte unit
//   - test_encode_stride_change: 1600x1200 encode with a padded capture stride
//   - test_failed_reconfiguration_keeps_params: rejected update is a no-op
//   - test_recovery_after_processing_failure: session survives a bad unit
//   - test_random_access_units: random payload sizes up to the input capacity
//
// Layer 3 (Hardware Integration - Requires a DM365 codec runtime):
//   - test_native_encode_decode: opens both domains on the real engine
//
// RUN LAYER 1:
//   cargo test --test sessions
//
// RUN LAYER 3 (on hardware):
//   DMCODEC_LIBRARY=/usr/lib/libdmcodec.so cargo test --test sessions -- --ignored --nocapture

use std::sync::Arc;

use dmcodec::{
    engine::Platform,
    frame::{Frame, Packet},
    hw::{CodecFamily, ControlCommand},
    mock::{Call, FailPoint, MockEngine},
    params::{DynamicParams, Rational, SessionConfig},
    session::{H264Decoder, H264Encoder, JpegEncoder, SessionState},
    transcode::FrameClassification,
    CodecSession, Error, ErrorKind, Input, Output,
};
use rand::Rng;
use serial_test::serial;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn mock_platform() -> (Arc<MockEngine>, Arc<Platform>) {
    let mock = Arc::new(MockEngine::new());
    let platform = Platform::new(mock.clone());
    (mock, platform)
}

fn h264_dynamic(params: Option<&DynamicParams>) -> dmcodec::params::H264EncoderDynamicParams {
    match params {
        Some(DynamicParams::H264Encode(d)) => d.clone(),
        other => panic!("expected H.264 encoder parameters, got {:?}", other),
    }
}

#[test]
fn test_open_failure_releases_everything() {
    init_logging();
    let configs = [
        SessionConfig::new(CodecFamily::H264Decode, 720, 576),
        SessionConfig::new(CodecFamily::H264Encode, 1600, 1200),
        SessionConfig::new(CodecFamily::JpegEncode, 640, 480),
    ];

    for config in &configs {
        for point in FailPoint::ALL {
            // Second allocation as well, so the decoder fails with its input
            // region already held.
            for skip in 0..2 {
                let (mock, platform) = mock_platform();
                mock.fail_after(point, skip);

                match dmcodec::open(&platform, config) {
                    Ok(mut session) => {
                        assert_eq!(session.state(), SessionState::Ready);
                        session.close();
                        assert_eq!(session.state(), SessionState::Closed);
                    }
                    Err(err) => {
                        assert!(
                            !err.is_recoverable(),
                            "{} open failed at {:?} with recoverable {}",
                            config.family,
                            point,
                            err
                        );
                    }
                }

                assert!(
                    mock.counts().is_idle(),
                    "{} leaked {:?} after failure at {:?}/{}",
                    config.family,
                    mock.counts(),
                    point,
                    skip
                );
                assert!(platform.stats().is_idle());
            }
        }
    }
}

#[test]
fn test_open_failure_kinds() {
    let config = SessionConfig::new(CodecFamily::H264Decode, 720, 576);
    let expected = [
        (FailPoint::RuntimeInit, ErrorKind::EngineUnavailable),
        (FailPoint::EngineOpen, ErrorKind::EngineUnavailable),
        (FailPoint::InstanceCreate, ErrorKind::CodecCreationFailed),
        (FailPoint::SetParams, ErrorKind::CodecCreationFailed),
        (FailPoint::Alloc, ErrorKind::OutOfMemory),
    ];
    for (point, kind) in expected {
        let (mock, platform) = mock_platform();
        mock.fail_next(point);
        let err = H264Decoder::open(&platform, &config).unwrap_err();
        assert_eq!(err.kind(), kind, "failure at {:?}: {}", point, err);
        assert!(mock.counts().is_idle());
    }
}

#[test]
fn test_decode_standard_definition() {
    init_logging();
    let (mock, platform) = mock_platform();
    let config = SessionConfig::new(CodecFamily::H264Decode, 720, 576);
    let mut decoder = H264Decoder::open(&platform, &config).unwrap();
    mock.set_bytes_consumed(4096);

    let unit = vec![0x5au8; 4096];
    let decoded = decoder.decode(&unit).unwrap();
    assert_eq!(decoded.bytes_consumed, 4096);
    assert_ne!(decoded.classification, FrameClassification::Unknown);

    let frame = decoded.frame.as_ref().unwrap();
    assert_eq!((frame.width(), frame.height()), (720, 576));
    assert_eq!(frame.planes().len(), 2);
    for plane in frame.planes() {
        assert!(!plane.as_ptr().is_null());
        assert!(!plane.is_empty());
    }
    assert_eq!(
        frame.metadata().get("hw.frame_type").map(String::as_str),
        Some("3")
    );

    let process = mock
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Process { .. }))
        .count();
    assert_eq!(process, 1);
}

#[test]
fn test_encode_stride_change() {
    init_logging();
    let (mock, platform) = mock_platform();
    let config = SessionConfig::new(CodecFamily::H264Encode, 1600, 1200)
        .with_frame_rate(Rational::new(30, 1))
        .with_bitrate(4_000_000);
    let mut encoder = H264Encoder::open(&platform, &config).unwrap();
    assert_eq!(h264_dynamic(encoder.dynamic_params()).capture_width, 1600);

    let stride = 1664;
    let luma = vec![0x10u8; stride * 1200];
    let chroma = vec![0x80u8; stride * 600];
    let frame = Frame::nv12(1600, 1200, stride, &luma, &chroma);
    let mut packet = Packet::with_capacity(encoder.min_packet_size());

    mock.clear_calls();
    let unit = encoder.encode(&frame, &mut packet).unwrap();
    assert!(unit.reconfigured);
    assert!(unit.key_frame);
    assert!(packet.size() > 0);

    let calls = mock.calls();
    let process_at = calls
        .iter()
        .position(|c| matches!(c, Call::Process { .. }))
        .unwrap();
    let controls: Vec<_> = calls[..process_at]
        .iter()
        .filter(|c| matches!(c, Call::Control { .. }))
        .collect();
    assert_eq!(
        controls,
        vec![&Call::Control {
            family: CodecFamily::H264Encode,
            command: ControlCommand::SetParams,
            capture_width: Some(stride as u32),
        }]
    );

    let params = h264_dynamic(encoder.dynamic_params());
    assert_eq!(params.capture_width, stride as u32);
    assert_eq!(
        mock.accepted_params(CodecFamily::H264Encode),
        encoder.dynamic_params().cloned()
    );
}

#[test]
fn test_failed_reconfiguration_keeps_params() {
    let (mock, platform) = mock_platform();
    let config = SessionConfig::new(CodecFamily::H264Encode, 640, 480);
    let mut encoder = H264Encoder::open(&platform, &config).unwrap();
    let before = h264_dynamic(encoder.dynamic_params());

    let luma = vec![0u8; 704 * 480];
    let chroma = vec![0u8; 704 * 240];
    let frame = Frame::nv12(640, 480, 704, &luma, &chroma);
    let mut packet = Packet::with_capacity(encoder.min_packet_size());

    mock.fail_next(FailPoint::SetParams);
    let err = encoder.encode(&frame, &mut packet).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReconfigurationFailed);
    assert!(err.is_recoverable());
    assert_eq!(h264_dynamic(encoder.dynamic_params()), before);
    assert_eq!(
        mock.accepted_params(CodecFamily::H264Encode),
        Some(DynamicParams::H264Encode(before))
    );
    assert_eq!(encoder.state(), SessionState::Ready);
    assert_eq!(packet.size(), 0);
}

#[test]
fn test_recovery_after_processing_failure() {
    let (mock, platform) = mock_platform();
    let config = SessionConfig::new(CodecFamily::H264Decode, 320, 240);
    let mut session = dmcodec::open(&platform, &config).unwrap();

    mock.fail_next(FailPoint::Process);
    let err = match session.process_one(Input::AccessUnit(&[0u8; 64])) {
        Err(err) => err,
        Ok(_) => panic!("injected failure was not reported"),
    };
    assert_eq!(err.kind(), ErrorKind::ProcessingFailed);
    assert!(err.extended_error().is_some());
    assert_eq!(session.state(), SessionState::Ready);

    match session.process_one(Input::AccessUnit(&[0u8; 64])).unwrap() {
        Output::Decoded(decoded) => assert!(decoded.frame.is_some()),
        Output::Encoded(_) => panic!("decoder produced an encoded unit"),
    }
}

#[test]
fn test_oversized_decode_input() {
    let (mock, platform) = mock_platform();
    let config = SessionConfig::new(CodecFamily::H264Decode, 320, 240);
    let mut decoder = H264Decoder::open(&platform, &config).unwrap();
    let capacity = decoder.input_capacity();

    let err = decoder.decode(&vec![0u8; capacity + 1]).unwrap_err();
    match err {
        Error::InputTooLarge { len, capacity: c } => {
            assert_eq!(len, capacity + 1);
            assert_eq!(c, capacity);
        }
        other => panic!("unexpected error {}", other),
    }
    assert!(decoder.decode(&vec![0u8; capacity]).is_ok());
    drop(decoder);
    assert!(mock.counts().is_idle());
}

#[test]
fn test_random_access_units() {
    let (mock, platform) = mock_platform();
    let config = SessionConfig::new(CodecFamily::H264Decode, 352, 288);
    let mut decoder = H264Decoder::open(&platform, &config).unwrap();
    let capacity = decoder.input_capacity();

    let mut rng = rand::rng();
    for _ in 0..32 {
        let mut unit = vec![0u8; rng.random_range(1..=capacity)];
        rng.fill(&mut unit[..]);
        let decoded = decoder.decode(&unit).unwrap();
        assert_eq!(decoded.bytes_consumed, unit.len());
    }
    drop(decoder);
    assert!(mock.counts().is_idle());
}

#[test]
fn test_decode_and_encode_coexist() {
    let (mock, platform) = mock_platform();
    let decoder =
        H264Decoder::open(&platform, &SessionConfig::new(CodecFamily::H264Decode, 320, 240))
            .unwrap();
    let encoder = JpegEncoder::open(&platform, &SessionConfig::new(CodecFamily::JpegEncode, 320, 240))
        .unwrap();
    let stats = platform.stats();
    assert!(stats.decoder_active && stats.encoder_active);
    // The decoder's pool, input region and output backing each hold a
    // reference; the JPEG encoder only holds its pool's.
    assert_eq!(stats.allocator_refs, 4);
    assert_eq!(mock.counts().runtime_refs, 1);

    drop(decoder);
    assert_eq!(platform.stats().allocator_refs, 1);
    assert_eq!(mock.counts().runtime_refs, 1);
    drop(encoder);
    assert!(mock.counts().is_idle());
    assert!(platform.stats().is_idle());
}

#[test]
#[ignore = "test requires DM365 hardware"]
#[serial]
fn test_native_encode_decode() {
    init_logging();
    let platform = Platform::native().unwrap();

    let config = SessionConfig::new(CodecFamily::H264Encode, 640, 480);
    let mut encoder = H264Encoder::open(&platform, &config).unwrap();
    let luma = vec![0x10u8; 640 * 480];
    let chroma = vec![0x80u8; 640 * 240];
    let frame = Frame::nv12(640, 480, 640, &luma, &chroma);
    let mut packet = Packet::with_capacity(encoder.min_packet_size());
    let unit = encoder.encode(&frame, &mut packet).unwrap();
    assert!(unit.key_frame);
    assert!(packet.size() > 0);

    let config = SessionConfig::new(CodecFamily::H264Decode, 640, 480);
    let mut decoder = H264Decoder::open(&platform, &config).unwrap();
    let decoded = decoder.decode(packet.data()).unwrap();
    assert!(decoded.bytes_consumed > 0);
}
