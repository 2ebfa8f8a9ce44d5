// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

//! Codec session state machines.
//!
//! Every session moves through the same states:
//!
//! ```text
//! Unopened -> EngineOpen -> Configured -> Ready <-> Processing
//!                                           ^ \
//!                                           |  Reconfiguring (encoders)
//!                                           \_/
//! any state -> Closed
//! ```
//!
//! Opening claims the domain slot, acquires the allocator, opens the engine
//! domain, builds the parameter blocks, creates the codec instance, submits
//! the dynamic parameters, queries the buffer requirements and allocates the
//! session buffers. Every resource is held in [`Resources`] as it is
//! acquired; a failed open and a regular close run the same unwind, which
//! releases in reverse order: instance, output planes, input region, dynamic
//! then static parameters, engine, allocator, slot.
//!
//! A failed unit leaves the session `Ready`. A rejected reconfiguration
//! restores the previous dynamic parameters and also leaves it `Ready`.

use std::{fmt, sync::Arc};

use log::{debug, error, warn};

use crate::{
    buffer::{BufferPool, BufferRegion, PlaneSet},
    engine::{EngineHandle, Platform, SessionSlot},
    frame::{Frame, Packet},
    hw::{
        BufferDescriptor, BufferDescriptorSet, BufferInfo, CodecFamily, ControlCommand,
        ControlReport, ExtendedError, InstanceId, ProcessArgs, ProcessReport, STATUS_FAIL,
    },
    params::{self, DynamicParams, SessionConfig, StaticParams},
    transcode::{self, FrameClassification},
    Error,
};

mod decoder;
mod encoder;
mod jpeg;

pub use decoder::H264Decoder;
pub use encoder::H264Encoder;
pub use jpeg::JpegEncoder;

/// Input id handed to the hardware with every unit.
const INPUT_ID: i32 = 1;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Unopened,
    EngineOpen,
    Configured,
    Ready,
    Processing,
    Reconfiguring,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One unit handed to [`CodecSession::process_one`].
#[derive(Debug)]
pub enum Input<'a> {
    /// One compressed access unit, for decoders.
    AccessUnit(&'a [u8]),
    /// One raw picture and the packet receiving its encoded unit, for
    /// encoders.
    Picture {
        frame: &'a Frame<'a>,
        packet: &'a mut Packet,
    },
}

/// A decoded unit.
#[derive(Debug)]
pub struct Decoded<'s> {
    /// The picture released for display, viewing the session's output
    /// region. `None` while the decoder is still buffering.
    pub frame: Option<Frame<'s>>,
    pub bytes_consumed: usize,
    pub classification: FrameClassification,
    /// Non-fatal conditions the hardware reported, such as concealment.
    pub extended: ExtendedError,
}

/// An encoded unit; the bytes live in the caller's packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedUnit {
    pub bytes: usize,
    pub key_frame: bool,
    pub classification: FrameClassification,
    /// Whether the capture stride was resubmitted before this unit.
    pub reconfigured: bool,
}

/// Result of [`CodecSession::process_one`].
#[derive(Debug)]
pub enum Output<'s> {
    Decoded(Decoded<'s>),
    Encoded(EncodedUnit),
}

/// Operations common to every session family.
pub trait CodecSession {
    fn family(&self) -> CodecFamily;

    fn state(&self) -> SessionState;

    /// Algorithm name the instance was created with.
    fn codec_name(&self) -> &str;

    /// Process one unit. The session must be `Ready`.
    fn process_one<'s>(&'s mut self, input: Input<'_>) -> Result<Output<'s>, Error>;

    /// Release every resource. Calling it again has no effect.
    fn close(&mut self);
}

/// Open a session for the family named by `config`.
pub fn open(
    platform: &Arc<Platform>,
    config: &SessionConfig,
) -> Result<Box<dyn CodecSession + Send>, Error> {
    Ok(match config.family {
        CodecFamily::H264Decode => Box::new(H264Decoder::open(platform, config)?),
        CodecFamily::H264Encode => Box::new(H264Encoder::open(platform, config)?),
        CodecFamily::JpegEncode => Box::new(JpegEncoder::open(platform, config)?),
    })
}

/// A live codec instance, deleted when dropped.
pub(crate) struct Instance {
    platform: Arc<Platform>,
    id: InstanceId,
}

impl Instance {
    fn create(
        platform: &Arc<Platform>,
        engine: &EngineHandle,
        codec: &str,
        params: &StaticParams,
    ) -> Result<Instance, Error> {
        let id = platform
            .engine()
            .instance_create(engine.id(), codec, params)
            .ok_or_else(|| {
                error!("{}: cannot create codec '{}'", platform.engine_name(), codec);
                Error::CodecCreationFailed {
                    codec: codec.to_string(),
                    status: STATUS_FAIL,
                    extended: ExtendedError::NONE,
                }
            })?;
        debug!("{}: created codec '{}' ({:?})", platform.engine_name(), codec, id);
        Ok(Instance {
            platform: platform.clone(),
            id,
        })
    }

    fn control(&self, command: ControlCommand, params: &DynamicParams) -> ControlReport {
        self.platform.engine().control(self.id, command, params)
    }

    fn process(
        &self,
        inputs: &BufferDescriptorSet<'_>,
        outputs: &BufferDescriptorSet<'_>,
        args: &ProcessArgs,
    ) -> ProcessReport {
        self.platform.engine().process(self.id, inputs, outputs, args)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("id", &self.id).finish()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.platform.engine().instance_delete(self.id);
        debug!("{}: deleted codec ({:?})", self.platform.engine_name(), self.id);
    }
}

/// Everything a session owns, in release order.
#[derive(Debug, Default)]
pub(crate) struct Resources {
    instance: Option<Instance>,
    output: Option<PlaneSet>,
    input: Option<BufferRegion>,
    dynamic: Option<Box<DynamicParams>>,
    static_params: Option<Box<StaticParams>>,
    engine: Option<EngineHandle>,
    pool: Option<BufferPool>,
    slot: Option<SessionSlot>,
}

impl Resources {
    /// Release whatever has been acquired, in reverse acquisition order.
    fn unwind(&mut self) {
        drop(self.instance.take());
        drop(self.output.take());
        drop(self.input.take());
        drop(self.dynamic.take());
        drop(self.static_params.take());
        drop(self.engine.take());
        drop(self.pool.take());
        drop(self.slot.take());
    }
}

impl Drop for Resources {
    fn drop(&mut self) {
        self.unwind();
    }
}

/// State and resources shared by the three session families.
#[derive(Debug)]
pub(crate) struct SessionCore {
    platform: Arc<Platform>,
    family: CodecFamily,
    codec: String,
    width: u32,
    height: u32,
    state: SessionState,
    buffer_info: BufferInfo,
    resources: Resources,
}

impl SessionCore {
    /// Run the open sequence up to and including the buffer query.
    ///
    /// On error everything acquired so far is released when the partially
    /// built core is dropped.
    fn open(
        platform: &Arc<Platform>,
        config: &SessionConfig,
        family: CodecFamily,
    ) -> Result<SessionCore, Error> {
        if config.family != family {
            return Err(Error::InvalidConfiguration(format!(
                "configuration is for {}, not {}",
                config.family, family
            )));
        }

        let mut core = SessionCore {
            platform: platform.clone(),
            family,
            codec: config.codec_name().to_string(),
            width: config.width,
            height: config.height,
            state: SessionState::Unopened,
            buffer_info: BufferInfo::default(),
            resources: Resources::default(),
        };
        core.acquire(config).map_err(|err| {
            warn!(
                "{}: opening {} session failed in state {}: {}",
                platform.engine_name(),
                family,
                core.state,
                err
            );
            err
        })?;
        Ok(core)
    }

    fn acquire(&mut self, config: &SessionConfig) -> Result<(), Error> {
        let platform = self.platform.clone();
        let domain = self.family.domain();

        self.resources.slot = Some(platform.claim(domain)?);
        self.resources.pool = Some(BufferPool::new(platform.acquire_allocator()?));
        let engine = self.resources.engine.insert(platform.open_engine(domain)?);
        self.state = SessionState::EngineOpen;
        debug!("{}: {} session engine open", platform.engine_name(), self.family);

        let (static_params, dynamic) = params::build(config)?;
        let static_params = self.resources.static_params.insert(Box::new(static_params));
        let dynamic = self.resources.dynamic.insert(Box::new(dynamic));
        self.state = SessionState::Configured;

        let instance = Instance::create(&platform, engine, &self.codec, &**static_params)?;

        let report = instance.control(ControlCommand::SetParams, &**dynamic);
        if !report.is_ok() {
            error!(
                "{}: codec '{}' rejected its parameters (status {}, extended error {})",
                platform.engine_name(),
                self.codec,
                report.status,
                report.extended
            );
            drop(instance);
            return Err(Error::CodecCreationFailed {
                codec: self.codec.clone(),
                status: report.status,
                extended: report.extended,
            });
        }
        let instance = self.resources.instance.insert(instance);

        let report = instance.control(ControlCommand::GetBufInfo, &**dynamic);
        let ok = report.is_ok();
        self.buffer_info = match report.buffers {
            Some(info) if ok => info,
            _ => {
                error!(
                    "{}: codec '{}' did not report buffer requirements (status {}, extended error {})",
                    platform.engine_name(),
                    self.codec,
                    report.status,
                    report.extended
                );
                return Err(Error::CodecCreationFailed {
                    codec: self.codec.clone(),
                    status: if ok { STATUS_FAIL } else { report.status },
                    extended: report.extended,
                });
            }
        };
        debug!(
            "{}: codec '{}' requires inputs {:?}, outputs {:?}",
            platform.engine_name(),
            self.codec,
            self.buffer_info.min_in_sizes,
            self.buffer_info.min_out_sizes
        );
        Ok(())
    }

    fn pool(&self) -> Result<&BufferPool, Error> {
        self.resources.pool.as_ref().ok_or(Error::InvalidState {
            operation: "allocate buffers",
            state: self.state,
        })
    }

    /// Allocate the decode input region and output planes.
    fn allocate_decode_buffers(&mut self) -> Result<(), Error> {
        let input_size = self.first_size(&self.buffer_info.min_in_sizes, "input")?;
        let input = self.pool()?.allocate(input_size, crate::buffer::DEFAULT_ALIGNMENT)?;
        self.resources.input = Some(input);
        let output = self.pool()?.allocate_planes(&self.buffer_info.min_out_sizes)?;
        self.resources.output = Some(output);
        Ok(())
    }

    fn first_size(&self, sizes: &[usize], what: &str) -> Result<usize, Error> {
        match sizes.first() {
            Some(&size) if size > 0 => Ok(size),
            _ => Err(Error::CodecCreationFailed {
                codec: format!("{} (no {} buffer size reported)", self.codec, what),
                status: STATUS_FAIL,
                extended: ExtendedError::NONE,
            }),
        }
    }

    /// Minimum encoded output size reported by the hardware.
    fn min_output_size(&self) -> Result<usize, Error> {
        self.first_size(&self.buffer_info.min_out_sizes, "output")
    }

    fn finish_open(&mut self) {
        self.state = SessionState::Ready;
        debug!(
            "{}: {} session ready ({}x{}, codec '{}')",
            self.platform.engine_name(),
            self.family,
            self.width,
            self.height,
            self.codec
        );
    }

    fn ensure_ready(&self, operation: &'static str) -> Result<(), Error> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn static_params(&self) -> Option<&StaticParams> {
        self.resources.static_params.as_deref()
    }

    fn dynamic_params(&self) -> Option<&DynamicParams> {
        self.resources.dynamic.as_deref()
    }

    fn input_capacity(&self) -> usize {
        self.resources.input.as_ref().map_or(0, BufferRegion::capacity)
    }

    fn output_planes(&self) -> Vec<usize> {
        self.resources
            .output
            .as_ref()
            .map_or_else(Vec::new, PlaneSet::plane_sizes)
    }

    /// Apply `update` to the dynamic parameters and resubmit them.
    ///
    /// If the hardware rejects the update the previous parameters are
    /// restored field for field.
    fn reconfigure<F>(&mut self, what: &str, update: F) -> Result<(), Error>
    where
        F: FnOnce(&mut DynamicParams),
    {
        self.ensure_ready("reconfigure")?;
        let (Some(instance), Some(dynamic)) =
            (self.resources.instance.as_ref(), self.resources.dynamic.as_mut())
        else {
            return Err(Error::InvalidState {
                operation: "reconfigure",
                state: self.state,
            });
        };

        let previous = (**dynamic).clone();
        update(&mut **dynamic);
        self.state = SessionState::Reconfiguring;
        let report = instance.control(ControlCommand::SetParams, &**dynamic);
        self.state = SessionState::Ready;

        if !report.is_ok() {
            **dynamic = previous;
            warn!(
                "{}: {} update rejected by codec '{}' (status {}, extended error {})",
                self.platform.engine_name(),
                what,
                self.codec,
                report.status,
                report.extended
            );
            return Err(Error::ReconfigurationFailed {
                status: report.status,
                extended: report.extended,
            });
        }
        debug!(
            "{}: codec '{}' reconfigured ({})",
            self.platform.engine_name(),
            self.codec,
            what
        );
        Ok(())
    }

    /// Encode one picture into `packet`, resubmitting the capture stride
    /// first when it differs from the frame's.
    fn encode(
        &mut self,
        frame: &Frame<'_>,
        packet: &mut Packet,
        args: ProcessArgs,
        intra_only: bool,
    ) -> Result<EncodedUnit, Error> {
        self.ensure_ready("encode")?;
        let inputs = transcode::encode_descriptors(frame, self.width, self.height)?;

        let min_packet = self.min_output_size()?;
        if packet.capacity() < min_packet {
            return Err(Error::InvalidConfiguration(format!(
                "packet capacity {} is below the {} byte minimum",
                packet.capacity(),
                min_packet
            )));
        }

        let pitch = inputs.geometry().map_or(self.width, |g| g.pitch);
        let mut reconfigured = false;
        if self.dynamic_params().and_then(DynamicParams::capture_width) != Some(pitch) {
            self.reconfigure("capture width", |dynamic| {
                dynamic.set_capture_width(pitch);
            })?;
            reconfigured = true;
        }

        let Some(instance) = self.resources.instance.as_ref() else {
            return Err(Error::InvalidState {
                operation: "encode",
                state: self.state,
            });
        };
        self.state = SessionState::Processing;
        let report = {
            let outputs = BufferDescriptorSet::single(BufferDescriptor::output(packet.buffer_mut()));
            instance.process(&inputs, &outputs, &args)
        };
        self.state = SessionState::Ready;

        if !report.is_ok() {
            warn!(
                "{}: codec '{}' failed to encode (status {}, extended error {})",
                self.platform.engine_name(),
                self.codec,
                report.status,
                report.extended
            );
            return Err(Error::ProcessingFailed {
                status: report.status,
                extended: report.extended,
            });
        }

        let classification = if intra_only {
            FrameClassification::I
        } else {
            FrameClassification::from_hw(report.frame_type)
        };
        let bytes = transcode::finish_packet(packet, report.bytes_generated, classification)?;
        Ok(EncodedUnit {
            bytes,
            key_frame: classification.is_key_frame(),
            classification,
            reconfigured,
        })
    }

    /// Decode one access unit. The returned frame views the output region.
    fn decode(&mut self, data: &[u8]) -> Result<Decoded<'_>, Error> {
        self.ensure_ready("decode")?;
        let Resources {
            instance: Some(instance),
            input: Some(input),
            output: Some(output),
            ..
        } = &mut self.resources
        else {
            return Err(Error::InvalidState {
                operation: "decode",
                state: self.state,
            });
        };

        let staged = transcode::stage_access_unit(input, data)?;
        self.state = SessionState::Processing;
        let report = {
            let inputs = BufferDescriptorSet::single(BufferDescriptor::input(input.filled()));
            let outputs = output.descriptors();
            let args = ProcessArgs::Decode {
                num_bytes: staged,
                input_id: INPUT_ID,
            };
            instance.process(&inputs, &outputs, &args)
        };
        self.state = SessionState::Ready;

        if !report.is_ok() {
            warn!(
                "{}: codec '{}' failed to decode {} bytes (status {}, extended error {})",
                self.platform.engine_name(),
                self.codec,
                staged,
                report.status,
                report.extended
            );
            return Err(Error::ProcessingFailed {
                status: report.status,
                extended: report.extended,
            });
        }

        let output: &PlaneSet = output;
        let frame_type = report
            .picture
            .as_ref()
            .map_or(report.frame_type, |picture| picture.frame_type);
        let classification = FrameClassification::from_hw(frame_type);
        let frame = match &report.picture {
            Some(picture) => Some(transcode::decoded_frame(output, picture, classification)?),
            None => None,
        };
        Ok(Decoded {
            frame,
            bytes_consumed: report.bytes_consumed,
            classification,
            extended: report.extended,
        })
    }

    fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.resources.unwind();
        self.state = SessionState::Closed;
        debug!(
            "{}: {} session closed",
            self.platform.engine_name(),
            self.family
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        frame::Frame,
        mock::{Call, FailPoint, MockEngine},
        params::Rational,
    };

    fn platform() -> (Arc<MockEngine>, Arc<Platform>) {
        let mock = Arc::new(MockEngine::new());
        let platform = Platform::new(mock.clone());
        (mock, platform)
    }

    #[test]
    fn test_factory_dispatches_on_family() {
        let (_mock, platform) = platform();
        for family in [
            CodecFamily::H264Decode,
            CodecFamily::H264Encode,
            CodecFamily::JpegEncode,
        ] {
            let config = SessionConfig::new(family, 320, 240);
            let mut session = open(&platform, &config).unwrap();
            assert_eq!(session.family(), family);
            assert_eq!(session.state(), SessionState::Ready);
            assert_eq!(session.codec_name(), family.default_codec_name());
            session.close();
        }
        assert!(platform.stats().is_idle());
    }

    #[test]
    fn test_open_rejects_mismatched_family() {
        let (mock, platform) = platform();
        let config = SessionConfig::new(CodecFamily::H264Decode, 320, 240);
        assert!(matches!(
            H264Encoder::open(&platform, &config),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_teardown_order() {
        let (mock, platform) = platform();
        let config = SessionConfig::new(CodecFamily::H264Decode, 64, 64);
        let mut session = open(&platform, &config).unwrap();
        mock.clear_calls();
        session.close();
        assert_eq!(
            mock.calls(),
            vec![
                Call::InstanceDelete(CodecFamily::H264Decode),
                Call::Free { size: 64 * 64 * 3 / 2 },
                Call::Free { size: 64 * 64 / 2 },
                Call::EngineClose(crate::hw::Domain::Decode),
                Call::RuntimeExit,
            ]
        );
    }

    #[test]
    fn test_process_one_rejects_wrong_input_variant() {
        let (_mock, platform) = platform();
        let config = SessionConfig::new(CodecFamily::H264Encode, 64, 64);
        let mut session = open(&platform, &config).unwrap();
        let err = session.process_one(Input::AccessUnit(&[0, 0, 0, 1])).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_process_after_close_is_invalid_state() {
        let (_mock, platform) = platform();
        let config = SessionConfig::new(CodecFamily::H264Encode, 64, 64)
            .with_frame_rate(Rational::new(25, 1));
        let mut session = open(&platform, &config).unwrap();
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);

        let luma = vec![0u8; 64 * 64];
        let chroma = vec![0u8; 64 * 32];
        let frame = Frame::nv12(64, 64, 64, &luma, &chroma);
        let mut packet = Packet::with_capacity(4096);
        let err = session
            .process_one(Input::Picture {
                frame: &frame,
                packet: &mut packet,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                state: SessionState::Closed,
                ..
            }
        ));
    }

    #[test]
    fn test_set_params_rejection_deletes_instance() {
        let (mock, platform) = platform();
        mock.fail_next(FailPoint::SetParams);
        let config = SessionConfig::new(CodecFamily::H264Encode, 64, 64);
        let err = H264Encoder::open(&platform, &config).unwrap_err();
        match err {
            Error::CodecCreationFailed { codec, extended, .. } => {
                assert_eq!(codec, "h264enc");
                assert!(extended.is_unsupported_param());
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(mock.counts().is_idle());
        assert!(platform.stats().is_idle());
    }
}
