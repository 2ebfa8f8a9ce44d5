// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

//! Typed boundary to the hardware codec engine.
//!
//! The hardware engine is an external collaborator with a handle-based API:
//! open an engine domain, create a codec instance with static parameters,
//! submit dynamic parameters and query buffer requirements through control
//! calls, run one synchronous process call per unit, then delete the
//! instance and close the engine. [`HardwareEngine`] expresses that contract
//! with one typed request/response pair per operation, so callers never deal
//! with size fields or reused status structs.

use std::{fmt, marker::PhantomData, ptr::NonNull, slice};

use dmcodec_sys as ffi;

use crate::params::{DynamicParams, StaticParams};

/// Status value the hardware returns for a successful call.
pub const STATUS_OK: i32 = ffi::XDM_EOK;

/// Generic failure status.
pub const STATUS_FAIL: i32 = ffi::XDM_EFAIL;

/// Engine domain opened by name on the codec server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// The decode engine ("decode").
    Decode,
    /// The encode engine ("encode"), shared by video and still-image encoders.
    Encode,
}

impl Domain {
    /// Engine name as registered with the codec server.
    pub fn name(&self) -> &'static str {
        match self {
            Domain::Decode => "decode",
            Domain::Encode => "encode",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Codec families supported by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecFamily {
    /// H.264 video decode (VIDDEC2).
    H264Decode,
    /// H.264 video encode (VIDENC1 with the H.264 extensions).
    H264Encode,
    /// Baseline JPEG still-image encode (IMGENC1).
    JpegEncode,
}

impl CodecFamily {
    /// Engine domain hosting the family.
    pub fn domain(&self) -> Domain {
        match self {
            CodecFamily::H264Decode => Domain::Decode,
            CodecFamily::H264Encode | CodecFamily::JpegEncode => Domain::Encode,
        }
    }

    /// Algorithm name registered in the default engine configuration.
    pub fn default_codec_name(&self) -> &'static str {
        match self {
            CodecFamily::H264Decode => "h264dec",
            CodecFamily::H264Encode => "h264enc",
            CodecFamily::JpegEncode => "jpegenc",
        }
    }

    pub fn is_encoder(&self) -> bool {
        self.domain() == Domain::Encode
    }
}

impl fmt::Display for CodecFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CodecFamily::H264Decode => "H.264 decode",
            CodecFamily::H264Encode => "H.264 encode",
            CodecFamily::JpegEncode => "JPEG encode",
        };
        write!(f, "{}", name)
    }
}

/// Opaque engine handle produced by [`HardwareEngine::engine_open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineId(pub usize);

/// Opaque codec instance handle produced by
/// [`HardwareEngine::instance_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId {
    pub family: CodecFamily,
    pub raw: usize,
}

/// One block of physically contiguous memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContiguousBlock {
    /// Virtual address of the first byte.
    pub addr: usize,
    /// Physical address as seen by the hardware.
    pub phys: u64,
    /// Size in bytes.
    pub size: usize,
}

/// Control commands accepted by a live codec instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    /// Submit the dynamic parameters.
    SetParams,
    /// Report minimum input/output buffer sizes for the current parameters.
    GetBufInfo,
}

impl ControlCommand {
    pub fn raw(&self) -> i32 {
        match self {
            ControlCommand::SetParams => ffi::XDM_SETPARAMS,
            ControlCommand::GetBufInfo => ffi::XDM_GETBUFINFO,
        }
    }
}

/// Minimum buffer requirements reported by `GetBufInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BufferInfo {
    pub min_in_sizes: Vec<usize>,
    pub min_out_sizes: Vec<usize>,
}

/// Result of a control call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlReport {
    pub status: i32,
    pub extended: ExtendedError,
    /// Present for successful `GetBufInfo` calls.
    pub buffers: Option<BufferInfo>,
}

impl ControlReport {
    pub fn ok() -> Self {
        ControlReport {
            status: STATUS_OK,
            extended: ExtendedError::NONE,
            buffers: None,
        }
    }

    pub fn failed(extended: ExtendedError) -> Self {
        ControlReport {
            status: STATUS_FAIL,
            extended,
            buffers: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// The 32-bit extended error word reported by XDM codecs.
///
/// Bits 8-15 carry the standard XDM classification; the low byte is
/// codec-specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExtendedError(pub u32);

impl ExtendedError {
    pub const NONE: ExtendedError = ExtendedError(0);

    /// Build an extended error with a single XDM bit set.
    pub const fn with_bit(bit: u32) -> Self {
        ExtendedError(1 << bit)
    }

    fn bit(&self, bit: u32) -> bool {
        self.0 & (1 << bit) != 0
    }

    pub fn is_fatal(&self) -> bool {
        self.bit(ffi::XDM_FATALERROR)
    }

    pub fn is_unsupported_param(&self) -> bool {
        self.bit(ffi::XDM_UNSUPPORTEDPARAM)
    }

    pub fn is_unsupported_input(&self) -> bool {
        self.bit(ffi::XDM_UNSUPPORTEDINPUT)
    }

    pub fn is_corrupted_header(&self) -> bool {
        self.bit(ffi::XDM_CORRUPTEDHEADER)
    }

    pub fn is_corrupted_data(&self) -> bool {
        self.bit(ffi::XDM_CORRUPTEDDATA)
    }

    pub fn is_insufficient_data(&self) -> bool {
        self.bit(ffi::XDM_INSUFFICIENTDATA)
    }

    pub fn applied_concealment(&self) -> bool {
        self.bit(ffi::XDM_APPLIEDCONCEALMENT)
    }

    /// Codec-specific low byte.
    pub fn codec_specific(&self) -> u32 {
        self.0 & 0xff
    }

    fn flag_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.is_fatal() {
            names.push("fatal");
        }
        if self.is_unsupported_param() {
            names.push("unsupported-param");
        }
        if self.is_unsupported_input() {
            names.push("unsupported-input");
        }
        if self.is_corrupted_header() {
            names.push("corrupted-header");
        }
        if self.is_corrupted_data() {
            names.push("corrupted-data");
        }
        if self.is_insufficient_data() {
            names.push("insufficient-data");
        }
        if self.applied_concealment() {
            names.push("concealment");
        }
        names
    }
}

impl fmt::Display for ExtendedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.flag_names();
        if names.is_empty() {
            write!(f, "0x{:08x}", self.0)
        } else {
            write!(f, "0x{:08x} [{}]", self.0, names.join(", "))
        }
    }
}

/// A (pointer, size) pair describing memory handed to one process call.
///
/// The lifetime ties the descriptor to the memory it views, so a descriptor
/// can never outlive the frame, packet or region it was built from.
#[derive(Debug)]
pub struct BufferDescriptor<'a> {
    ptr: NonNull<u8>,
    len: usize,
    _marker: PhantomData<&'a mut [u8]>,
}

impl<'a> BufferDescriptor<'a> {
    /// Describe memory the hardware only reads.
    pub fn input(data: &'a [u8]) -> Self {
        BufferDescriptor {
            ptr: NonNull::new(data.as_ptr() as *mut u8).unwrap_or(NonNull::dangling()),
            len: data.len(),
            _marker: PhantomData,
        }
    }

    /// Describe memory the hardware writes.
    pub fn output(data: &'a mut [u8]) -> Self {
        BufferDescriptor {
            ptr: NonNull::new(data.as_mut_ptr()).unwrap_or(NonNull::dangling()),
            len: data.len(),
            _marker: PhantomData,
        }
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// View the described memory.
    ///
    /// # Safety
    /// Must only be called by an engine implementation while the process
    /// call that received the descriptor is running.
    pub unsafe fn as_slice(&self) -> &[u8] {
        // SAFETY: the descriptor was built from a live slice of `len` bytes
        // borrowed for 'a.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Mutable view of memory described with [`BufferDescriptor::output`].
    ///
    /// # Safety
    /// The descriptor must have been built with [`BufferDescriptor::output`],
    /// and the caller must not hold any other view of the memory.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn as_mut_slice(&self) -> &mut [u8] {
        // SAFETY: output descriptors come from an exclusive borrow held for
        // the duration of the call.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

/// Picture geometry attached to raw-picture descriptor sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    /// Width handed to the hardware, padded to a macroblock multiple.
    pub width: u32,
    /// Height handed to the hardware, padded to a macroblock multiple.
    pub height: u32,
    /// Line pitch in bytes shared by all planes.
    pub pitch: u32,
}

/// The ephemeral set of descriptors passed to one process call.
#[derive(Debug, Default)]
pub struct BufferDescriptorSet<'a> {
    descriptors: Vec<BufferDescriptor<'a>>,
    geometry: Option<FrameGeometry>,
}

impl<'a> BufferDescriptorSet<'a> {
    pub fn new() -> Self {
        BufferDescriptorSet {
            descriptors: Vec::new(),
            geometry: None,
        }
    }

    pub fn single(descriptor: BufferDescriptor<'a>) -> Self {
        BufferDescriptorSet {
            descriptors: vec![descriptor],
            geometry: None,
        }
    }

    pub fn with_geometry(mut self, geometry: FrameGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn push(&mut self, descriptor: BufferDescriptor<'a>) {
        self.descriptors.push(descriptor);
    }

    pub fn descriptors(&self) -> &[BufferDescriptor<'a>] {
        &self.descriptors
    }

    pub fn geometry(&self) -> Option<FrameGeometry> {
        self.geometry
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Total bytes described by the set.
    pub fn total_len(&self) -> usize {
        self.descriptors.iter().map(BufferDescriptor::len).sum()
    }
}

/// Per-family arguments of a process call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessArgs {
    Decode {
        num_bytes: usize,
        input_id: i32,
    },
    H264Encode {
        input_id: i32,
        top_field_first: bool,
        insert_user_data: bool,
    },
    JpegEncode,
}

/// A decoded picture as reported by the hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureReport {
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    /// (address, length) of each plane.
    pub planes: Vec<(usize, usize)>,
    pub frame_type: i32,
}

/// Result of a process call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    pub status: i32,
    pub extended: ExtendedError,
    pub bytes_consumed: usize,
    pub bytes_generated: usize,
    /// Raw hardware frame type of the encoded or decoded picture.
    pub frame_type: i32,
    /// Decoded picture released for display, if any.
    pub picture: Option<PictureReport>,
}

impl ProcessReport {
    pub fn failed(extended: ExtendedError) -> Self {
        ProcessReport {
            status: STATUS_FAIL,
            extended,
            bytes_consumed: 0,
            bytes_generated: 0,
            frame_type: ffi::IVIDEO_NA_FRAME,
            picture: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Operations consumed from the hardware codec engine.
///
/// All calls are blocking and synchronous. Implementations are shared
/// between sessions, so they must be `Send + Sync`; a single instance handle
/// is never used from two threads at once.
pub trait HardwareEngine: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Bring up the runtime and contiguous allocator. Called when the first
    /// allocator reference is acquired.
    fn runtime_init(&self) -> Result<(), String>;

    /// Tear down the runtime. Called when the last allocator reference is
    /// released.
    fn runtime_exit(&self);

    fn alloc_contiguous(&self, size: usize, alignment: usize) -> Option<ContiguousBlock>;

    fn free_contiguous(&self, block: ContiguousBlock);

    /// Open an engine domain. The error carries the engine error code.
    fn engine_open(&self, domain: Domain) -> Result<EngineId, i32>;

    fn engine_close(&self, engine: EngineId);

    fn instance_create(
        &self,
        engine: EngineId,
        codec: &str,
        params: &StaticParams,
    ) -> Option<InstanceId>;

    fn control(
        &self,
        instance: InstanceId,
        command: ControlCommand,
        params: &DynamicParams,
    ) -> ControlReport;

    fn process(
        &self,
        instance: InstanceId,
        inputs: &BufferDescriptorSet<'_>,
        outputs: &BufferDescriptorSet<'_>,
        args: &ProcessArgs,
    ) -> ProcessReport;

    fn instance_delete(&self, instance: InstanceId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_domains() {
        assert_eq!(CodecFamily::H264Decode.domain(), Domain::Decode);
        assert_eq!(CodecFamily::H264Encode.domain(), Domain::Encode);
        assert_eq!(CodecFamily::JpegEncode.domain(), Domain::Encode);
        assert!(CodecFamily::JpegEncode.is_encoder());
        assert!(!CodecFamily::H264Decode.is_encoder());
    }

    #[test]
    fn test_default_codec_names() {
        assert_eq!(CodecFamily::H264Decode.default_codec_name(), "h264dec");
        assert_eq!(CodecFamily::H264Encode.default_codec_name(), "h264enc");
        assert_eq!(CodecFamily::JpegEncode.default_codec_name(), "jpegenc");
        assert_eq!(Domain::Encode.to_string(), "encode");
    }

    #[test]
    fn test_extended_error_bits() {
        let err = ExtendedError((1 << 15) | (1 << 14) | 0x21);
        assert!(err.is_fatal());
        assert!(err.is_unsupported_param());
        assert!(!err.is_corrupted_data());
        assert_eq!(err.codec_specific(), 0x21);
        assert_eq!(err.to_string(), "0x0000c021 [fatal, unsupported-param]");
        assert_eq!(ExtendedError::NONE.to_string(), "0x00000000");
    }

    #[test]
    fn test_descriptor_views_source_memory() {
        let mut data = vec![1u8, 2, 3, 4];
        let addr = data.as_ptr() as usize;
        {
            let desc = BufferDescriptor::output(&mut data);
            assert_eq!(desc.addr(), addr);
            assert_eq!(desc.len(), 4);
            unsafe { desc.as_mut_slice()[0] = 9 };
        }
        assert_eq!(data[0], 9);
    }

    #[test]
    fn test_descriptor_set_totals() {
        let a = [0u8; 16];
        let b = [0u8; 8];
        let mut set = BufferDescriptorSet::new();
        set.push(BufferDescriptor::input(&a));
        set.push(BufferDescriptor::input(&b));
        assert_eq!(set.len(), 2);
        assert_eq!(set.total_len(), 24);
        assert!(set.geometry().is_none());
    }
}
