// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

//! Hardware engine backed by the runtime-loaded codec engine library.
//!
//! This is the only place that builds the C parameter, argument and buffer
//! descriptor structs, fills in their `size` fields and decodes the status
//! structs the codecs return.

use std::{
    ffi::{c_void, CString},
    mem, ptr,
    sync::atomic::{AtomicBool, Ordering},
};

use dmcodec_sys as ffi;
use log::{debug, error, warn};

use crate::{
    hw::{
        BufferDescriptorSet, BufferInfo, CodecFamily, ContiguousBlock, ControlCommand,
        ControlReport, Domain, EngineId, ExtendedError, HardwareEngine, InstanceId,
        PictureReport, ProcessArgs, ProcessReport, STATUS_FAIL,
    },
    params::{
        DecoderDynamicParams, DecoderParams, DynamicParams, H264EncoderDynamicParams,
        H264EncoderParams, JpegEncoderDynamicParams, JpegEncoderParams, StaticParams,
    },
    Error,
};

/// The codec engine runtime as a [`HardwareEngine`].
pub struct NativeEngine {
    lib: &'static ffi::CodecEngineLibrary,
    ce_initialised: AtomicBool,
}

impl std::fmt::Debug for NativeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeEngine")
            .field("ce_initialised", &self.ce_initialised.load(Ordering::Relaxed))
            .finish()
    }
}

fn size_of_i32<T>() -> i32 {
    mem::size_of::<T>() as i32
}

fn clamp_i32(value: usize) -> i32 {
    value.min(i32::MAX as usize) as i32
}

fn alloc_params(alignment: usize) -> ffi::CMEM_AllocParams {
    ffi::CMEM_AllocParams {
        type_: ffi::CMEM_HEAP,
        flags: ffi::CMEM_NONCACHED,
        alignment,
    }
}

impl NativeEngine {
    /// Load the runtime library and check the symbols every session needs.
    ///
    /// Codec-family symbols are checked when an instance is created, so a
    /// runtime without one family still serves the others.
    pub fn load() -> Result<NativeEngine, Error> {
        let lib = ffi::init()?;
        let required = [
            ("CERuntime_init", lib.CERuntime_init.is_ok()),
            ("CERuntime_exit", lib.CERuntime_exit.is_ok()),
            ("CMEM_init", lib.CMEM_init.is_ok()),
            ("CMEM_exit", lib.CMEM_exit.is_ok()),
            ("CMEM_alloc", lib.CMEM_alloc.is_ok()),
            ("CMEM_free", lib.CMEM_free.is_ok()),
            ("CMEM_getPhys", lib.CMEM_getPhys.is_ok()),
            ("Engine_open", lib.Engine_open.is_ok()),
            ("Engine_close", lib.Engine_close.is_ok()),
        ];
        if let Some((symbol, _)) = required.iter().find(|(_, present)| !present) {
            return Err(Error::SymbolNotFound(symbol));
        }
        Ok(NativeEngine {
            lib,
            ce_initialised: AtomicBool::new(false),
        })
    }

    /// Returns `true` when the runtime provides every entry point of `family`.
    pub fn supports(&self, family: CodecFamily) -> bool {
        let lib = self.lib;
        match family {
            CodecFamily::H264Decode => {
                lib.VIDDEC2_create.is_ok()
                    && lib.VIDDEC2_control.is_ok()
                    && lib.VIDDEC2_process.is_ok()
                    && lib.VIDDEC2_delete.is_ok()
            }
            CodecFamily::H264Encode => {
                lib.VIDENC1_create.is_ok()
                    && lib.VIDENC1_control.is_ok()
                    && lib.VIDENC1_process.is_ok()
                    && lib.VIDENC1_delete.is_ok()
            }
            CodecFamily::JpegEncode => {
                lib.IMGENC1_create.is_ok()
                    && lib.IMGENC1_control.is_ok()
                    && lib.IMGENC1_process.is_ok()
                    && lib.IMGENC1_delete.is_ok()
            }
        }
    }
}

fn decoder_params(p: &DecoderParams) -> ffi::VIDDEC2_Params {
    ffi::VIDDEC2_Params {
        size: size_of_i32::<ffi::VIDDEC2_Params>(),
        maxHeight: p.max_height as i32,
        maxWidth: p.max_width as i32,
        maxFrameRate: p.max_frame_rate as i32,
        maxBitRate: p.max_bit_rate as i32,
        dataEndianness: ffi::XDM_BYTE,
        forceChromaFormat: p.force_chroma.raw(),
    }
}

fn decoder_dynamic(d: &DecoderDynamicParams) -> ffi::VIDDEC2_DynamicParams {
    ffi::VIDDEC2_DynamicParams {
        size: size_of_i32::<ffi::VIDDEC2_DynamicParams>(),
        decodeHeader: d.decode_header.raw(),
        displayWidth: d.display_width as i32,
        frameSkipMode: if d.skip_frames { 1 } else { ffi::IVIDEO_NO_SKIP },
        frameOrder: if d.display_order { ffi::IVIDEO_DISPLAY_ORDER } else { 1 },
        newFrameFlag: 0,
        mbDataFlag: 0,
    }
}

fn h264_params(p: &H264EncoderParams) -> ffi::IH264VENC_Params {
    ffi::IH264VENC_Params {
        videncParams: ffi::VIDENC1_Params {
            size: size_of_i32::<ffi::IH264VENC_Params>(),
            encodingPreset: p.encoding_preset.raw(),
            rateControlPreset: p.rate_control.raw(),
            maxHeight: p.max_height as i32,
            maxWidth: p.max_width as i32,
            maxFrameRate: p.max_frame_rate as i32,
            maxBitRate: p.max_bit_rate as i32,
            dataEndianness: ffi::XDM_BYTE,
            maxInterFrameInterval: p.max_inter_frame_interval as i32,
            inputChromaFormat: p.input_chroma.raw(),
            inputContentType: ffi::IVIDEO_PROGRESSIVE,
            reconChromaFormat: p.recon_chroma.raw(),
        },
        profileIdc: p.profile_idc as i32,
        levelIdc: p.level_idc as i32,
        enableVUIparams: p.enable_vui as i32,
        ..Default::default()
    }
}

/// VUI block for the dynamic parameters. The sample aspect ratio itself
/// travels in `aspectRatioX`/`aspectRatioY`; the block only flags it.
fn h264_vui(d: &H264EncoderDynamicParams) -> ffi::IH264VENC_VUIDataStructure {
    let mut vui = ffi::IH264VENC_VUIDataStructure::default();
    if d.aspect_ratio.is_some() {
        vui.aspectRatioInfoPresentFlag = 1;
    }
    if let Some(timing) = d.timing {
        vui.timingInfoPresentFlag = 1;
        vui.numUnitsInTicks = timing.num_units_in_tick;
        vui.timeScale = timing.time_scale;
        vui.fixedFrameRateFlag = timing.fixed_frame_rate as u8;
    }
    vui
}

/// Fill the H.264 dynamic parameters. The VUI pointer refers to `vui`, which
/// must outlive the control call.
fn h264_dynamic(
    d: &H264EncoderDynamicParams,
    vui: &mut ffi::IH264VENC_VUIDataStructure,
) -> ffi::IH264VENC_DynamicParams {
    let (aspect_x, aspect_y) = d.aspect_ratio.map_or((0, 0), |r| (r.num as i32, r.den as i32));
    ffi::IH264VENC_DynamicParams {
        videncDynamicParams: ffi::VIDENC1_DynamicParams {
            size: size_of_i32::<ffi::IH264VENC_DynamicParams>(),
            inputHeight: d.input_height as i32,
            inputWidth: d.input_width as i32,
            refFrameRate: d.ref_frame_rate as i32,
            targetFrameRate: d.target_frame_rate as i32,
            targetBitRate: d.target_bit_rate as i32,
            intraFrameInterval: d.intra_frame_interval as i32,
            generateHeader: d.generate_header.raw(),
            captureWidth: d.capture_width as i32,
            forceFrame: if d.force_idr { ffi::IVIDEO_IDR_FRAME } else { ffi::IVIDEO_NA_FRAME },
            interFrameInterval: d.inter_frame_interval as i32,
            mbDataFlag: d.mb_data as i32,
        },
        initQ: d.qp_init as i32,
        rcQMax: d.qp_max as i32,
        rcQMin: d.qp_min as i32,
        rcQMaxI: d.qp_max as i32,
        rcQMinI: d.qp_min as i32,
        aspectRatioX: aspect_x,
        aspectRatioY: aspect_y,
        enablePicTimSEI: d.pic_timing_sei as i32,
        idrFrameInterval: d.intra_frame_interval as i32,
        VUI_Buffer: vui as *mut _,
        ..Default::default()
    }
}

fn jpeg_params(p: &JpegEncoderParams) -> ffi::IMGENC1_Params {
    ffi::IMGENC1_Params {
        size: size_of_i32::<ffi::IMGENC1_Params>(),
        maxHeight: p.max_height as i32,
        maxWidth: p.max_width as i32,
        maxScans: p.max_scans as i32,
        dataEndianness: ffi::XDM_BYTE,
        forceChromaFormat: p.force_chroma.raw(),
    }
}

fn jpeg_dynamic(d: &JpegEncoderDynamicParams) -> ffi::IMGENC1_DynamicParams {
    ffi::IMGENC1_DynamicParams {
        size: size_of_i32::<ffi::IMGENC1_DynamicParams>(),
        numAU: d.num_au as i32,
        inputChromaFormat: d.input_chroma.raw(),
        inputHeight: d.input_height as i32,
        inputWidth: d.input_width as i32,
        captureWidth: d.capture_width as i32,
        generateHeader: d.generate_header.raw(),
        qValue: d.quality as i32,
    }
}

fn buffer_info(info: &ffi::XDM_AlgBufInfo) -> BufferInfo {
    let sizes = |count: i32, sizes: &[i32]| -> Vec<usize> {
        let count = (count.max(0) as usize).min(sizes.len());
        sizes[..count].iter().map(|&s| s.max(0) as usize).collect()
    };
    BufferInfo {
        min_in_sizes: sizes(info.minNumInBufs, &info.minInBufSize),
        min_out_sizes: sizes(info.minNumOutBufs, &info.minOutBufSize),
    }
}

fn control_report(status: i32, extended: i32, info: Option<&ffi::XDM_AlgBufInfo>) -> ControlReport {
    ControlReport {
        status,
        extended: ExtendedError(extended as u32),
        buffers: if status == ffi::XDM_EOK {
            info.map(buffer_info)
        } else {
            None
        },
    }
}

/// Pointer and size arrays in the legacy `XDM_BufDesc` layout. The arrays
/// must stay in place while the descriptor built from them is in use.
struct LegacyBufs {
    ptrs: Vec<*mut i8>,
    sizes: Vec<i32>,
}

impl LegacyBufs {
    fn new(set: &BufferDescriptorSet<'_>) -> Self {
        LegacyBufs {
            ptrs: set.descriptors().iter().map(|d| d.as_ptr() as *mut i8).collect(),
            sizes: set.descriptors().iter().map(|d| clamp_i32(d.len())).collect(),
        }
    }

    fn desc(&mut self) -> ffi::XDM_BufDesc {
        ffi::XDM_BufDesc {
            bufs: self.ptrs.as_mut_ptr(),
            numBufs: self.ptrs.len() as i32,
            bufSizes: self.sizes.as_mut_ptr(),
        }
    }
}

fn xdm1_bufs(set: &BufferDescriptorSet<'_>) -> ffi::XDM1_BufDesc {
    let mut desc = ffi::XDM1_BufDesc::default();
    for (slot, d) in desc.descs.iter_mut().zip(set.descriptors()) {
        slot.buf = d.as_ptr() as *mut i8;
        slot.bufSize = clamp_i32(d.len());
    }
    desc.numBufs = set.len().min(ffi::XDM_MAX_IO_BUFFERS) as i32;
    desc
}

impl HardwareEngine for NativeEngine {
    fn name(&self) -> &str {
        "codec-engine"
    }

    fn runtime_init(&self) -> Result<(), String> {
        // SAFETY: symbols were checked in load(); the runtime tolerates
        // repeated CERuntime_init calls but only the first is issued.
        unsafe {
            if !self.ce_initialised.swap(true, Ordering::AcqRel) {
                self.lib.CERuntime_init();
            }
            let status = self.lib.CMEM_init();
            if status < 0 {
                return Err(format!("CMEM_init returned {}", status));
            }
        }
        Ok(())
    }

    fn runtime_exit(&self) {
        // SAFETY: called once for each successful runtime_init.
        unsafe {
            let status = self.lib.CMEM_exit();
            if status < 0 {
                warn!("CMEM_exit returned {}", status);
            }
            if self.ce_initialised.swap(false, Ordering::AcqRel) {
                self.lib.CERuntime_exit();
            }
        }
    }

    fn alloc_contiguous(&self, size: usize, alignment: usize) -> Option<ContiguousBlock> {
        let params = alloc_params(alignment);
        // SAFETY: CMEM is initialised while an allocator reference is held.
        let ptr = unsafe { self.lib.CMEM_alloc(size, &params) };
        if ptr.is_null() {
            return None;
        }
        // SAFETY: ptr was just returned by CMEM_alloc.
        let phys = unsafe { self.lib.CMEM_getPhys(ptr) } as u64;
        Some(ContiguousBlock {
            addr: ptr as usize,
            phys,
            size,
        })
    }

    fn free_contiguous(&self, block: ContiguousBlock) {
        let params = alloc_params(0);
        // SAFETY: the block came from alloc_contiguous and is freed once.
        let status = unsafe { self.lib.CMEM_free(block.addr as *mut c_void, &params) };
        if status < 0 {
            error!("CMEM_free of {:#x} returned {}", block.addr, status);
        }
    }

    fn engine_open(&self, domain: Domain) -> Result<EngineId, i32> {
        let name = CString::new(domain.name()).map_err(|_| STATUS_FAIL)?;
        let mut code: ffi::Engine_Error = ffi::Engine_EOK;
        // SAFETY: name is a valid C string; attrs may be null.
        let handle = unsafe { self.lib.Engine_open(name.as_ptr(), ptr::null_mut(), &mut code) };
        if handle.is_null() {
            return Err(if code == ffi::Engine_EOK { STATUS_FAIL } else { code });
        }
        Ok(EngineId(handle as usize))
    }

    fn engine_close(&self, engine: EngineId) {
        // SAFETY: the handle came from engine_open and is closed once.
        unsafe { self.lib.Engine_close(engine.0 as ffi::Engine_Handle) };
    }

    fn instance_create(
        &self,
        engine: EngineId,
        codec: &str,
        params: &StaticParams,
    ) -> Option<InstanceId> {
        let family = params.family();
        if !self.supports(family) {
            error!("runtime has no {} entry points", family);
            return None;
        }
        let name = match CString::new(codec) {
            Ok(name) => name,
            Err(err) => {
                error!("codec name {:?}: {}", codec, err);
                return None;
            }
        };
        let engine = engine.0 as ffi::Engine_Handle;

        // SAFETY: the parameter structs live on the stack for the duration
        // of the call and carry their own size; symbols were checked above.
        let handle = unsafe {
            match params {
                StaticParams::H264Decode(p) => {
                    let mut c = decoder_params(p);
                    self.lib.VIDDEC2_create(engine, name.as_ptr(), &mut c)
                }
                StaticParams::H264Encode(p) => {
                    let mut c = h264_params(p);
                    self.lib.VIDENC1_create(engine, name.as_ptr(), &mut c.videncParams)
                }
                StaticParams::JpegEncode(p) => {
                    let mut c = jpeg_params(p);
                    self.lib.IMGENC1_create(engine, name.as_ptr(), &mut c)
                }
            }
        };
        if handle.is_null() {
            return None;
        }
        Some(InstanceId {
            family,
            raw: handle as usize,
        })
    }

    fn control(
        &self,
        instance: InstanceId,
        command: ControlCommand,
        params: &DynamicParams,
    ) -> ControlReport {
        let handle = instance.raw as *mut c_void;
        let id = command.raw();
        // SAFETY: the handle is live; params and status are valid for the
        // call and the VUI block outlives it.
        unsafe {
            match params {
                DynamicParams::H264Decode(d) => {
                    let mut c = decoder_dynamic(d);
                    let mut status = ffi::VIDDEC2_Status {
                        size: size_of_i32::<ffi::VIDDEC2_Status>(),
                        ..Default::default()
                    };
                    let rc = self.lib.VIDDEC2_control(handle, id, &mut c, &mut status);
                    control_report(rc, status.extendedError, Some(&status.bufInfo))
                }
                DynamicParams::H264Encode(d) => {
                    let mut vui = h264_vui(d);
                    let mut c = h264_dynamic(d, &mut vui);
                    let mut status = ffi::VIDENC1_Status {
                        size: size_of_i32::<ffi::VIDENC1_Status>(),
                        ..Default::default()
                    };
                    let rc = self.lib.VIDENC1_control(
                        handle,
                        id,
                        &mut c.videncDynamicParams,
                        &mut status,
                    );
                    control_report(rc, status.extendedError, Some(&status.bufInfo))
                }
                DynamicParams::JpegEncode(d) => {
                    let mut c = jpeg_dynamic(d);
                    let mut status = ffi::IMGENC1_Status {
                        size: size_of_i32::<ffi::IMGENC1_Status>(),
                        ..Default::default()
                    };
                    let rc = self.lib.IMGENC1_control(handle, id, &mut c, &mut status);
                    control_report(rc, status.extendedError, Some(&status.bufInfo))
                }
            }
        }
    }

    fn process(
        &self,
        instance: InstanceId,
        inputs: &BufferDescriptorSet<'_>,
        outputs: &BufferDescriptorSet<'_>,
        args: &ProcessArgs,
    ) -> ProcessReport {
        let handle = instance.raw as *mut c_void;
        match *args {
            ProcessArgs::Decode {
                num_bytes,
                input_id,
            } => {
                let mut in_bufs = xdm1_bufs(inputs);
                let mut out = LegacyBufs::new(outputs);
                let mut out_bufs = out.desc();
                let mut in_args = ffi::VIDDEC2_InArgs {
                    size: size_of_i32::<ffi::VIDDEC2_InArgs>(),
                    numBytes: clamp_i32(num_bytes),
                    inputID: input_id,
                };
                let mut out_args = Box::new(ffi::VIDDEC2_OutArgs {
                    size: size_of_i32::<ffi::VIDDEC2_OutArgs>(),
                    ..Default::default()
                });
                // SAFETY: descriptors point at memory borrowed for this call.
                let rc = unsafe {
                    self.lib.VIDDEC2_process(
                        handle,
                        &mut in_bufs,
                        &mut out_bufs,
                        &mut in_args,
                        &mut *out_args,
                    )
                };
                let display = &out_args.displayBufs[0];
                let picture = (rc == ffi::XDM_EOK && out_args.outputID[0] != 0).then(|| {
                    let count = (display.numBufs.max(0) as usize).min(display.bufDesc.len());
                    PictureReport {
                        width: display.frameWidth.max(0) as u32,
                        height: display.frameHeight.max(0) as u32,
                        pitch: display.framePitch.max(0) as u32,
                        planes: display.bufDesc[..count]
                            .iter()
                            .map(|b| (b.buf as usize, b.bufSize.max(0) as usize))
                            .collect(),
                        frame_type: display.frameType,
                    }
                });
                debug!(
                    "VIDDEC2_process: status {} consumed {} extended {:#x}",
                    rc, out_args.bytesConsumed, out_args.decodedBufs.extendedError
                );
                ProcessReport {
                    status: rc,
                    extended: ExtendedError(out_args.decodedBufs.extendedError as u32),
                    bytes_consumed: out_args.bytesConsumed.max(0) as usize,
                    bytes_generated: 0,
                    frame_type: out_args.decodedBufs.frameType,
                    picture,
                }
            }
            ProcessArgs::H264Encode {
                input_id,
                top_field_first,
                insert_user_data,
            } => {
                let geometry = inputs.geometry().unwrap_or(crate::hw::FrameGeometry {
                    width: 0,
                    height: 0,
                    pitch: 0,
                });
                let mut in_bufs = ffi::IVIDEO1_BufDescIn {
                    numBufs: inputs.len().min(ffi::IVIDEO_MAX_YUV_BUFFERS) as i32,
                    frameWidth: geometry.width as i32,
                    frameHeight: geometry.height as i32,
                    framePitch: geometry.pitch as i32,
                    ..Default::default()
                };
                for (slot, d) in in_bufs.bufDesc.iter_mut().zip(inputs.descriptors()) {
                    slot.buf = d.as_ptr() as *mut i8;
                    slot.bufSize = clamp_i32(d.len());
                }
                let mut out = LegacyBufs::new(outputs);
                let mut out_bufs = out.desc();
                let mut in_args = ffi::IH264VENC_InArgs {
                    videncInArgs: ffi::VIDENC1_InArgs {
                        size: size_of_i32::<ffi::IH264VENC_InArgs>(),
                        inputID: input_id,
                        topFieldFirstFlag: top_field_first as i32,
                    },
                    insertUserData: insert_user_data as i32,
                    lengthUserData: 0,
                    numOutputDataUnits: 0,
                };
                let mut out_args = ffi::VIDENC1_OutArgs {
                    size: size_of_i32::<ffi::VIDENC1_OutArgs>(),
                    ..Default::default()
                };
                // SAFETY: descriptors point at memory borrowed for this call.
                let rc = unsafe {
                    self.lib.VIDENC1_process(
                        handle,
                        &mut in_bufs,
                        &mut out_bufs,
                        &mut in_args.videncInArgs,
                        &mut out_args,
                    )
                };
                ProcessReport {
                    status: rc,
                    extended: ExtendedError(out_args.extendedError as u32),
                    bytes_consumed: inputs.total_len(),
                    bytes_generated: out_args.bytesGenerated.max(0) as usize,
                    frame_type: out_args.encodedFrameType,
                    picture: None,
                }
            }
            ProcessArgs::JpegEncode => {
                let mut in_bufs = xdm1_bufs(inputs);
                let mut out_bufs = xdm1_bufs(outputs);
                let mut in_args = ffi::IMGENC1_InArgs {
                    size: size_of_i32::<ffi::IMGENC1_InArgs>(),
                };
                let mut out_args = ffi::IMGENC1_OutArgs {
                    size: size_of_i32::<ffi::IMGENC1_OutArgs>(),
                    ..Default::default()
                };
                // SAFETY: descriptors point at memory borrowed for this call.
                let rc = unsafe {
                    self.lib.IMGENC1_process(
                        handle,
                        &mut in_bufs,
                        &mut out_bufs,
                        &mut in_args,
                        &mut out_args,
                    )
                };
                ProcessReport {
                    status: rc,
                    extended: ExtendedError(out_args.extendedError as u32),
                    bytes_consumed: inputs.total_len(),
                    bytes_generated: out_args.bytesGenerated.max(0) as usize,
                    frame_type: ffi::IVIDEO_I_FRAME,
                    picture: None,
                }
            }
        }
    }

    fn instance_delete(&self, instance: InstanceId) {
        let handle = instance.raw as *mut c_void;
        // SAFETY: the handle came from instance_create and is deleted once.
        unsafe {
            match instance.family {
                CodecFamily::H264Decode => self.lib.VIDDEC2_delete(handle),
                CodecFamily::H264Encode => self.lib.VIDENC1_delete(handle),
                CodecFamily::JpegEncode => self.lib.IMGENC1_delete(handle),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{self, Rational, SessionConfig};
    use serial_test::serial;

    #[test]
    fn test_h264_dynamic_carries_vui_timing() {
        let config = SessionConfig::new(CodecFamily::H264Encode, 1600, 1200)
            .with_frame_rate(Rational::new(30000, 1001))
            .with_aspect_ratio(Rational::new(4, 3));
        let (static_params, dynamic) = params::build(&config).unwrap();
        let DynamicParams::H264Encode(d) = dynamic else {
            panic!("expected H.264 parameters");
        };
        let mut vui = h264_vui(&d);
        let c = h264_dynamic(&d, &mut vui);
        assert_eq!(
            c.videncDynamicParams.size as usize,
            mem::size_of::<ffi::IH264VENC_DynamicParams>()
        );
        assert_eq!(c.videncDynamicParams.targetFrameRate, 29970);
        assert_eq!(c.videncDynamicParams.captureWidth, 1600);
        assert_eq!(c.videncDynamicParams.interFrameInterval, 0);
        assert_eq!(c.enablePicTimSEI, 1);
        assert_eq!((c.aspectRatioX, c.aspectRatioY), (4, 3));
        assert_eq!(c.VUI_Buffer, &mut vui as *mut _);
        assert_eq!(vui.timingInfoPresentFlag, 1);
        assert_eq!(vui.numUnitsInTicks, 1001);
        assert_eq!(vui.timeScale, 30000);
        assert_eq!(vui.fixedFrameRateFlag, 1);
        assert_eq!(vui.aspectRatioInfoPresentFlag, 1);

        let plain = SessionConfig::new(CodecFamily::H264Encode, 640, 480);
        let (_, DynamicParams::H264Encode(plain)) = params::build(&plain).unwrap() else {
            panic!("expected H.264 parameters");
        };
        let mut plain_vui = h264_vui(&plain);
        let c_plain = h264_dynamic(&plain, &mut plain_vui);
        assert_eq!(plain_vui.aspectRatioInfoPresentFlag, 0);
        assert_eq!((c_plain.aspectRatioX, c_plain.aspectRatioY), (0, 0));

        let StaticParams::H264Encode(p) = static_params else {
            panic!("expected H.264 parameters");
        };
        let c = h264_params(&p);
        assert_eq!(c.videncParams.inputChromaFormat, ffi::XDM_YUV_420SP);
        assert_eq!(c.videncParams.encodingPreset, ffi::XDM_HIGH_SPEED);
        assert_eq!(c.enableVUIparams, 0x04);
    }

    #[test]
    fn test_buffer_info_is_clamped() {
        let mut info = ffi::XDM_AlgBufInfo::default();
        info.minNumInBufs = 1;
        info.minInBufSize[0] = 4096;
        info.minNumOutBufs = 64;
        info.minOutBufSize[0] = 100;
        info.minOutBufSize[1] = -5;
        let parsed = buffer_info(&info);
        assert_eq!(parsed.min_in_sizes, vec![4096]);
        assert_eq!(parsed.min_out_sizes.len(), ffi::XDM_MAX_IO_BUFFERS);
        assert_eq!(parsed.min_out_sizes[1], 0);
    }

    #[test]
    #[serial]
    fn test_load_without_runtime() {
        std::env::set_var(ffi::LIBRARY_ENV, "/nonexistent/libdmcodec.so");
        if ffi::try_library().is_none() {
            assert!(matches!(NativeEngine::load(), Err(Error::LibraryNotLoaded(_))));
        }
        std::env::remove_var(ffi::LIBRARY_ENV);
    }

    #[test]
    #[ignore = "test requires DM365 hardware"]
    #[serial]
    fn test_native_engine_opens_both_domains() {
        let engine = NativeEngine::load().unwrap();
        engine.runtime_init().unwrap();
        for domain in [Domain::Decode, Domain::Encode] {
            let id = engine.engine_open(domain).unwrap();
            engine.engine_close(id);
        }
        engine.runtime_exit();
    }
}
