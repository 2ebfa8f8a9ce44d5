// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

//! In-memory hardware engine.
//!
//! [`MockEngine`] implements [`HardwareEngine`] without any hardware. It
//! hands out real heap memory for contiguous allocations, records every call,
//! keeps live counts of everything it hands out, and can be told to fail any
//! step. Releasing something it does not know about panics, which turns a
//! double free or double close into a test failure.
//!
//! Process calls behave like a well-mannered codec: decoders consume the
//! whole unit and emit one NV12 picture into the output planes, encoders
//! emit an Annex-B access unit whose first slice is IDR on every GOP
//! boundary.
//!
//! ```
//! use std::sync::Arc;
//! use dmcodec::engine::Platform;
//! use dmcodec::mock::{FailPoint, MockEngine};
//!
//! let mock = Arc::new(MockEngine::new());
//! let platform = Platform::new(mock.clone());
//! mock.fail_next(FailPoint::RuntimeInit);
//! assert!(platform.acquire_allocator().is_err());
//! assert_eq!(mock.counts().runtime_refs, 0);
//! ```

use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
};

use dmcodec_sys as ffi;

use crate::{
    hw::{
        BufferDescriptorSet, BufferInfo, CodecFamily, ContiguousBlock, ControlCommand,
        ControlReport, Domain, EngineId, ExtendedError, HardwareEngine, InstanceId,
        PictureReport, ProcessArgs, ProcessReport, STATUS_OK,
    },
    params::{DynamicParams, StaticParams},
};

/// A call observed by the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RuntimeInit,
    RuntimeExit,
    Alloc { size: usize },
    Free { size: usize },
    EngineOpen(Domain),
    EngineClose(Domain),
    InstanceCreate { family: CodecFamily, codec: String },
    Control {
        family: CodecFamily,
        command: ControlCommand,
        /// Capture width carried by the submitted parameters, for encoders.
        capture_width: Option<u32>,
    },
    Process { family: CodecFamily, input_bytes: usize },
    InstanceDelete(CodecFamily),
}

/// Steps at which a failure can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    RuntimeInit,
    Alloc,
    EngineOpen,
    InstanceCreate,
    SetParams,
    GetBufInfo,
    Process,
}

impl FailPoint {
    /// Every injectable step, in the order a session open reaches them.
    pub const ALL: [FailPoint; 7] = [
        FailPoint::RuntimeInit,
        FailPoint::EngineOpen,
        FailPoint::InstanceCreate,
        FailPoint::SetParams,
        FailPoint::GetBufInfo,
        FailPoint::Alloc,
        FailPoint::Process,
    ];

    fn default_error(&self) -> ExtendedError {
        match self {
            FailPoint::SetParams | FailPoint::InstanceCreate => {
                ExtendedError::with_bit(ffi::XDM_UNSUPPORTEDPARAM)
            }
            FailPoint::Process => ExtendedError::with_bit(ffi::XDM_CORRUPTEDDATA),
            _ => ExtendedError::with_bit(ffi::XDM_FATALERROR),
        }
    }
}

/// Live resource counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MockCounts {
    /// 1 while the runtime is initialised.
    pub runtime_refs: usize,
    pub live_allocations: usize,
    pub live_engines: usize,
    pub live_instances: usize,
}

impl MockCounts {
    pub fn is_idle(&self) -> bool {
        *self == MockCounts::default()
    }
}

#[derive(Debug)]
struct Injection {
    point: FailPoint,
    skip: usize,
    extended: ExtendedError,
}

#[derive(Debug)]
struct Allocation {
    // Kept only to own the memory; the block address points inside it.
    _storage: Box<[u8]>,
    size: usize,
}

#[derive(Debug)]
struct MockInstance {
    family: CodecFamily,
    params: StaticParams,
    dynamic: Option<DynamicParams>,
    frames: u64,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<Call>,
    runtime_refs: usize,
    allocations: HashMap<usize, Allocation>,
    next_phys: u64,
    engines: HashMap<usize, Domain>,
    instances: HashMap<usize, MockInstance>,
    next_handle: usize,
    injections: Vec<Injection>,
    frame_types: VecDeque<i32>,
    bytes_consumed: Option<usize>,
    bytes_generated: Option<usize>,
    buffer_info: Option<BufferInfo>,
    picture_planes: Option<Vec<(usize, usize)>>,
}

impl MockState {
    fn should_fail(&mut self, point: FailPoint) -> Option<ExtendedError> {
        let index = self.injections.iter().position(|i| i.point == point)?;
        let injection = &mut self.injections[index];
        if injection.skip > 0 {
            injection.skip -= 1;
            return None;
        }
        Some(self.injections.remove(index).extended)
    }

    fn handle(&mut self) -> usize {
        self.next_handle += 1;
        self.next_handle
    }
}

/// In-memory [`HardwareEngine`] for tests and dry runs.
#[derive(Debug, Default)]
pub struct MockEngine {
    state: Mutex<MockState>,
}

impl MockEngine {
    pub fn new() -> Self {
        MockEngine {
            state: Mutex::new(MockState {
                next_phys: 0x8000_0000,
                ..MockState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next call that reaches `point`.
    pub fn fail_next(&self, point: FailPoint) {
        self.fail_after(point, 0);
    }

    /// Let `skip` calls reaching `point` succeed, then fail the next one.
    pub fn fail_after(&self, point: FailPoint, skip: usize) {
        self.lock().injections.push(Injection {
            point,
            skip,
            extended: point.default_error(),
        });
    }

    /// Fail the next call reaching `point` with a specific extended error.
    pub fn fail_next_with(&self, point: FailPoint, extended: ExtendedError) {
        self.lock().injections.push(Injection {
            point,
            skip: 0,
            extended,
        });
    }

    /// Queue raw frame types reported by the next process calls.
    pub fn script_frame_types(&self, frame_types: &[i32]) {
        self.lock().frame_types.extend(frame_types.iter().copied());
    }

    /// Report this many consumed bytes from every decode call.
    pub fn set_bytes_consumed(&self, bytes: usize) {
        self.lock().bytes_consumed = Some(bytes);
    }

    /// Report this many generated bytes from every encode call.
    pub fn set_bytes_generated(&self, bytes: usize) {
        self.lock().bytes_generated = Some(bytes);
    }

    /// Override the buffer requirements reported by `GetBufInfo`.
    pub fn set_buffer_info(&self, info: BufferInfo) {
        self.lock().buffer_info = Some(info);
    }

    /// Override the plane addresses reported for decoded pictures.
    pub fn set_picture_planes(&self, planes: Vec<(usize, usize)>) {
        self.lock().picture_planes = Some(planes);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn counts(&self) -> MockCounts {
        let state = self.lock();
        MockCounts {
            runtime_refs: state.runtime_refs,
            live_allocations: state.allocations.len(),
            live_engines: state.engines.len(),
            live_instances: state.instances.len(),
        }
    }

    /// Dynamic parameters last accepted by the live instance of a family.
    pub fn accepted_params(&self, family: CodecFamily) -> Option<DynamicParams> {
        self.lock()
            .instances
            .values()
            .find(|instance| instance.family == family)
            .and_then(|instance| instance.dynamic.clone())
    }
}

fn buffer_info_for(params: &StaticParams) -> BufferInfo {
    let (width, height) = params.max_geometry();
    let luma = width as usize * height as usize;
    match params {
        StaticParams::H264Decode(_) => BufferInfo {
            min_in_sizes: vec![luma / 2],
            min_out_sizes: vec![luma, luma / 2],
        },
        StaticParams::H264Encode(_) => BufferInfo {
            min_in_sizes: vec![luma, luma / 2],
            min_out_sizes: vec![luma / 2],
        },
        StaticParams::JpegEncode(_) => BufferInfo {
            min_in_sizes: vec![luma, luma / 2],
            min_out_sizes: vec![luma],
        },
    }
}

fn default_frame_type(instance: &MockInstance) -> i32 {
    let gop = match &instance.dynamic {
        Some(DynamicParams::H264Encode(d)) => d.intra_frame_interval.max(1) as u64,
        _ => 30,
    };
    match instance.family {
        CodecFamily::JpegEncode => ffi::IVIDEO_NA_FRAME,
        _ if instance.frames % gop == 0 => ffi::IVIDEO_IDR_FRAME,
        _ => ffi::IVIDEO_P_FRAME,
    }
}

impl HardwareEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn runtime_init(&self) -> Result<(), String> {
        let mut state = self.lock();
        state.calls.push(Call::RuntimeInit);
        if let Some(extended) = state.should_fail(FailPoint::RuntimeInit) {
            return Err(format!("injected failure {}", extended));
        }
        state.runtime_refs += 1;
        Ok(())
    }

    fn runtime_exit(&self) {
        let mut state = self.lock();
        state.calls.push(Call::RuntimeExit);
        assert!(state.runtime_refs > 0, "runtime exit without init");
        state.runtime_refs -= 1;
    }

    fn alloc_contiguous(&self, size: usize, alignment: usize) -> Option<ContiguousBlock> {
        let mut state = self.lock();
        state.calls.push(Call::Alloc { size });
        if state.should_fail(FailPoint::Alloc).is_some() {
            return None;
        }
        assert!(state.runtime_refs > 0, "allocation before runtime init");

        let storage = vec![0u8; size + alignment].into_boxed_slice();
        let base = storage.as_ptr() as usize;
        let addr = (base + alignment - 1) & !(alignment - 1);
        let phys = state.next_phys;
        state.next_phys += (size as u64 + 0xfff) & !0xfff;
        state.allocations.insert(
            addr,
            Allocation {
                _storage: storage,
                size,
            },
        );
        Some(ContiguousBlock { addr, phys, size })
    }

    fn free_contiguous(&self, block: ContiguousBlock) {
        let mut state = self.lock();
        let allocation = state
            .allocations
            .remove(&block.addr)
            .unwrap_or_else(|| panic!("free of unknown block {:#x}", block.addr));
        assert_eq!(allocation.size, block.size, "free with wrong size");
        state.calls.push(Call::Free { size: block.size });
    }

    fn engine_open(&self, domain: Domain) -> Result<EngineId, i32> {
        let mut state = self.lock();
        state.calls.push(Call::EngineOpen(domain));
        if state.should_fail(FailPoint::EngineOpen).is_some() {
            return Err(-1);
        }
        let id = state.handle();
        state.engines.insert(id, domain);
        Ok(EngineId(id))
    }

    fn engine_close(&self, engine: EngineId) {
        let mut state = self.lock();
        let domain = state
            .engines
            .remove(&engine.0)
            .unwrap_or_else(|| panic!("close of unknown engine {:?}", engine));
        state.calls.push(Call::EngineClose(domain));
    }

    fn instance_create(
        &self,
        engine: EngineId,
        codec: &str,
        params: &StaticParams,
    ) -> Option<InstanceId> {
        let mut state = self.lock();
        let family = params.family();
        state.calls.push(Call::InstanceCreate {
            family,
            codec: codec.to_string(),
        });
        let domain = *state
            .engines
            .get(&engine.0)
            .unwrap_or_else(|| panic!("instance created on unknown engine {:?}", engine));
        assert_eq!(domain, family.domain(), "codec created on the wrong engine");
        if state.should_fail(FailPoint::InstanceCreate).is_some() {
            return None;
        }

        let raw = state.handle();
        state.instances.insert(
            raw,
            MockInstance {
                family,
                params: params.clone(),
                dynamic: None,
                frames: 0,
            },
        );
        Some(InstanceId { family, raw })
    }

    fn control(
        &self,
        instance: InstanceId,
        command: ControlCommand,
        params: &DynamicParams,
    ) -> ControlReport {
        let mut state = self.lock();
        state.calls.push(Call::Control {
            family: instance.family,
            command,
            capture_width: params.capture_width(),
        });
        assert_eq!(params.family(), instance.family, "parameters of another family");
        let point = match command {
            ControlCommand::SetParams => FailPoint::SetParams,
            ControlCommand::GetBufInfo => FailPoint::GetBufInfo,
        };
        if let Some(extended) = state.should_fail(point) {
            return ControlReport::failed(extended);
        }

        let override_info = state.buffer_info.clone();
        let live = state
            .instances
            .get_mut(&instance.raw)
            .unwrap_or_else(|| panic!("control on unknown instance {:?}", instance));
        match command {
            ControlCommand::SetParams => {
                live.dynamic = Some(params.clone());
                ControlReport::ok()
            }
            ControlCommand::GetBufInfo => ControlReport {
                buffers: Some(override_info.unwrap_or_else(|| buffer_info_for(&live.params))),
                ..ControlReport::ok()
            },
        }
    }

    fn process(
        &self,
        instance: InstanceId,
        inputs: &BufferDescriptorSet<'_>,
        outputs: &BufferDescriptorSet<'_>,
        args: &ProcessArgs,
    ) -> ProcessReport {
        let mut state = self.lock();
        state.calls.push(Call::Process {
            family: instance.family,
            input_bytes: inputs.total_len(),
        });
        if let Some(extended) = state.should_fail(FailPoint::Process) {
            return ProcessReport::failed(extended);
        }

        let scripted_type = state.frame_types.pop_front();
        let bytes_consumed = state.bytes_consumed;
        let bytes_generated = state.bytes_generated;
        let picture_planes = state.picture_planes.clone();
        let live = state
            .instances
            .get_mut(&instance.raw)
            .unwrap_or_else(|| panic!("process on unknown instance {:?}", instance));
        let Some(dynamic) = live.dynamic.clone() else {
            return ProcessReport::failed(ExtendedError::with_bit(ffi::XDM_FATALERROR));
        };
        let frame_type = scripted_type.unwrap_or_else(|| default_frame_type(live));
        live.frames += 1;

        match (args, &live.params) {
            (ProcessArgs::Decode { num_bytes, .. }, StaticParams::H264Decode(p)) => {
                if *num_bytes != inputs.total_len() || inputs.is_empty() {
                    return ProcessReport::failed(ExtendedError::with_bit(
                        ffi::XDM_INSUFFICIENTDATA,
                    ));
                }
                for (index, output) in outputs.descriptors().iter().enumerate() {
                    let value = if index == 0 { 0x10 } else { 0x80 };
                    // SAFETY: output descriptors are exclusive for this call.
                    unsafe { output.as_mut_slice() }.fill(value);
                }
                let planes = picture_planes.unwrap_or_else(|| {
                    outputs
                        .descriptors()
                        .iter()
                        .map(|d| (d.addr(), d.len()))
                        .collect()
                });
                let picture = (!outputs.is_empty()).then(|| PictureReport {
                    width: p.max_width,
                    height: p.max_height,
                    pitch: p.max_width,
                    planes,
                    frame_type,
                });
                ProcessReport {
                    status: STATUS_OK,
                    extended: ExtendedError::NONE,
                    bytes_consumed: bytes_consumed.unwrap_or(*num_bytes),
                    bytes_generated: 0,
                    frame_type,
                    picture,
                }
            }
            (ProcessArgs::H264Encode { .. }, StaticParams::H264Encode(_))
            | (ProcessArgs::JpegEncode, StaticParams::JpegEncode(_)) => {
                if let (Some(geometry), Some(capture)) = (inputs.geometry(), dynamic.capture_width())
                {
                    if geometry.pitch != capture {
                        return ProcessReport::failed(ExtendedError::with_bit(
                            ffi::XDM_UNSUPPORTEDINPUT,
                        ));
                    }
                }
                let Some(output) = outputs.descriptors().first() else {
                    return ProcessReport::failed(ExtendedError::with_bit(ffi::XDM_FATALERROR));
                };
                // SAFETY: the output descriptor is exclusive for this call.
                let out = unsafe { output.as_mut_slice() };
                let header: &[u8] = match (instance.family, frame_type) {
                    (CodecFamily::JpegEncode, _) => &[0xff, 0xd8, 0xff, 0xe0],
                    (_, ffi::IVIDEO_IDR_FRAME) => &[0, 0, 0, 1, 0x65],
                    _ => &[0, 0, 0, 1, 0x41],
                };
                let payload = (inputs.total_len() / 64).max(1);
                let written = (header.len() + payload).min(out.len());
                for (i, byte) in out[..written].iter_mut().enumerate() {
                    *byte = header.get(i).copied().unwrap_or((i % 251) as u8);
                }
                ProcessReport {
                    status: STATUS_OK,
                    extended: ExtendedError::NONE,
                    bytes_consumed: inputs.total_len(),
                    bytes_generated: bytes_generated.unwrap_or(written),
                    frame_type,
                    picture: None,
                }
            }
            _ => ProcessReport::failed(ExtendedError::with_bit(ffi::XDM_UNSUPPORTEDPARAM)),
        }
    }

    fn instance_delete(&self, instance: InstanceId) {
        let mut state = self.lock();
        state
            .instances
            .remove(&instance.raw)
            .unwrap_or_else(|| panic!("delete of unknown instance {:?}", instance));
        state.calls.push(Call::InstanceDelete(instance.family));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{self, SessionConfig};

    #[test]
    fn test_fail_after_skips() {
        let mock = MockEngine::new();
        mock.fail_after(FailPoint::EngineOpen, 1);
        assert!(mock.engine_open(Domain::Decode).is_ok());
        assert_eq!(mock.engine_open(Domain::Encode), Err(-1));
        assert!(mock.engine_open(Domain::Encode).is_ok());
        assert_eq!(mock.counts().live_engines, 2);
    }

    #[test]
    fn test_allocations_are_aligned_and_tracked() {
        let mock = MockEngine::new();
        mock.runtime_init().unwrap();
        let block = mock.alloc_contiguous(100, 128).unwrap();
        assert_eq!(block.addr % 128, 0);
        assert_eq!(block.size, 100);
        assert_eq!(mock.counts().live_allocations, 1);
        mock.free_contiguous(block);
        assert_eq!(mock.counts().live_allocations, 0);
        mock.runtime_exit();
        assert!(mock.counts().is_idle());
    }

    #[test]
    #[should_panic(expected = "free of unknown block")]
    fn test_double_free_panics() {
        let mock = MockEngine::new();
        mock.runtime_init().unwrap();
        let block = mock.alloc_contiguous(64, 32).unwrap();
        mock.free_contiguous(block);
        mock.free_contiguous(block);
    }

    #[test]
    fn test_control_records_capture_width() {
        let mock = MockEngine::new();
        let engine = mock.engine_open(Domain::Encode).unwrap();
        let config = SessionConfig::new(CodecFamily::H264Encode, 640, 480);
        let (static_params, dynamic) = params::build(&config).unwrap();
        let instance = mock.instance_create(engine, "h264enc", &static_params).unwrap();

        assert!(mock.control(instance, ControlCommand::SetParams, &dynamic).is_ok());
        let info = mock.control(instance, ControlCommand::GetBufInfo, &dynamic);
        assert_eq!(info.buffers.unwrap().min_out_sizes, vec![640 * 480 / 2]);
        assert_eq!(mock.accepted_params(CodecFamily::H264Encode), Some(dynamic));
        assert!(mock.calls().contains(&Call::Control {
            family: CodecFamily::H264Encode,
            command: ControlCommand::SetParams,
            capture_width: Some(640),
        }));

        mock.instance_delete(instance);
        mock.engine_close(engine);
        assert!(mock.counts().is_idle());
    }

    #[test]
    fn test_injected_extended_error() {
        let mock = MockEngine::new();
        let engine = mock.engine_open(Domain::Decode).unwrap();
        let (static_params, dynamic) =
            params::build(&SessionConfig::new(CodecFamily::H264Decode, 64, 64)).unwrap();
        let instance = mock.instance_create(engine, "h264dec", &static_params).unwrap();
        mock.fail_next_with(FailPoint::SetParams, ExtendedError(0x4001));
        let report = mock.control(instance, ControlCommand::SetParams, &dynamic);
        assert!(!report.is_ok());
        assert_eq!(report.extended, ExtendedError(0x4001));
        mock.instance_delete(instance);
        mock.engine_close(engine);
    }
}
