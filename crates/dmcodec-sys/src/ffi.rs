// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors
//
// Hand-maintained from the codec engine, CMEM and XDM headers shipped with
// the DM365 DVSDK. Only the subset used by the session layer is declared.

use std::os::raw::{c_char, c_int, c_ulong, c_void};

pub type XDAS_Int8 = i8;
pub type XDAS_UInt8 = u8;
pub type XDAS_Int16 = i16;
pub type XDAS_UInt16 = u16;
pub type XDAS_Int32 = i32;
pub type XDAS_UInt32 = u32;
pub type XDAS_Bool = u8;

pub type Engine_Handle = *mut c_void;
pub type Engine_Attrs = c_void;
pub type Engine_Error = c_int;
pub type VIDDEC2_Handle = *mut c_void;
pub type VIDENC1_Handle = *mut c_void;
pub type IMGENC1_Handle = *mut c_void;

pub const Engine_EOK: Engine_Error = 0;

pub const XDM_MAX_IO_BUFFERS: usize = 16;
pub const IVIDEO_MAX_YUV_BUFFERS: usize = 3;
pub const IVIDEO2_MAX_IO_BUFFERS: usize = 20;

/* XDM_CmdId */
pub const XDM_GETSTATUS: XDAS_Int32 = 0;
pub const XDM_SETPARAMS: XDAS_Int32 = 1;
pub const XDM_RESET: XDAS_Int32 = 2;
pub const XDM_SETDEFAULT: XDAS_Int32 = 3;
pub const XDM_FLUSH: XDAS_Int32 = 4;
pub const XDM_GETBUFINFO: XDAS_Int32 = 5;
pub const XDM_GETVERSION: XDAS_Int32 = 6;

/* Return codes shared by VIDDEC2/VIDENC1/IMGENC1 */
pub const XDM_EOK: XDAS_Int32 = 0;
pub const XDM_EFAIL: XDAS_Int32 = -1;
pub const XDM_EUNSUPPORTED: XDAS_Int32 = -3;

/* XDM_DataFormat */
pub const XDM_BYTE: XDAS_Int32 = 1;

/* XDM_ChromaFormat */
pub const XDM_CHROMA_NA: XDAS_Int32 = -1;
pub const XDM_YUV_420P: XDAS_Int32 = 1;
pub const XDM_YUV_422ILE: XDAS_Int32 = 4;
pub const XDM_YUV_420SP: XDAS_Int32 = 9;

/* XDM_EncodingPreset */
pub const XDM_DEFAULT: XDAS_Int32 = 0;
pub const XDM_HIGH_QUALITY: XDAS_Int32 = 1;
pub const XDM_HIGH_SPEED: XDAS_Int32 = 2;

/* XDM_EncMode / XDM_DecMode */
pub const XDM_ENCODE_AU: XDAS_Int32 = 0;
pub const XDM_GENERATE_HEADER: XDAS_Int32 = 1;
pub const XDM_DECODE_AU: XDAS_Int32 = 0;
pub const XDM_PARSE_HEADER: XDAS_Int32 = 1;

/* IVIDEO_RateControlPreset */
pub const IVIDEO_LOW_DELAY: XDAS_Int32 = 1;
pub const IVIDEO_STORAGE: XDAS_Int32 = 2;
pub const IVIDEO_NONE: XDAS_Int32 = 4;

/* IVIDEO_ContentType */
pub const IVIDEO_PROGRESSIVE: XDAS_Int32 = 0;

/* IVIDEO_FrameSkip / IVIDEO_OutputFrameStatus */
pub const IVIDEO_NO_SKIP: XDAS_Int32 = 0;
pub const IVIDEO_DISPLAY_ORDER: XDAS_Int32 = 0;

/* IVIDEO_FrameType */
pub const IVIDEO_NA_FRAME: XDAS_Int32 = -1;
pub const IVIDEO_I_FRAME: XDAS_Int32 = 0;
pub const IVIDEO_P_FRAME: XDAS_Int32 = 1;
pub const IVIDEO_B_FRAME: XDAS_Int32 = 2;
pub const IVIDEO_IDR_FRAME: XDAS_Int32 = 3;
pub const IVIDEO_II_FRAME: XDAS_Int32 = 4;
pub const IVIDEO_IP_FRAME: XDAS_Int32 = 5;
pub const IVIDEO_IB_FRAME: XDAS_Int32 = 6;
pub const IVIDEO_PI_FRAME: XDAS_Int32 = 7;
pub const IVIDEO_PP_FRAME: XDAS_Int32 = 8;
pub const IVIDEO_PB_FRAME: XDAS_Int32 = 9;
pub const IVIDEO_BI_FRAME: XDAS_Int32 = 10;
pub const IVIDEO_BP_FRAME: XDAS_Int32 = 11;
pub const IVIDEO_BB_FRAME: XDAS_Int32 = 12;
pub const IVIDEO_MBAFF_I_FRAME: XDAS_Int32 = 13;
pub const IVIDEO_MBAFF_P_FRAME: XDAS_Int32 = 14;
pub const IVIDEO_MBAFF_B_FRAME: XDAS_Int32 = 15;
pub const IVIDEO_MBAFF_IDR_FRAME: XDAS_Int32 = 16;

/* XDM_ErrorBit */
pub const XDM_APPLIEDCONCEALMENT: u32 = 9;
pub const XDM_INSUFFICIENTDATA: u32 = 10;
pub const XDM_CORRUPTEDDATA: u32 = 11;
pub const XDM_CORRUPTEDHEADER: u32 = 12;
pub const XDM_UNSUPPORTEDINPUT: u32 = 13;
pub const XDM_UNSUPPORTEDPARAM: u32 = 14;
pub const XDM_FATALERROR: u32 = 15;

/* CMEM */
pub const CMEM_HEAP: c_int = 0;
pub const CMEM_POOL: c_int = 1;
pub const CMEM_NONCACHED: c_int = 0;
pub const CMEM_CACHED: c_int = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CMEM_AllocParams {
    pub type_: c_int,
    pub flags: c_int,
    pub alignment: usize,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct XDM_BufDesc {
    pub bufs: *mut *mut XDAS_Int8,
    pub numBufs: XDAS_Int32,
    pub bufSizes: *mut XDAS_Int32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct XDM1_SingleBufDesc {
    pub buf: *mut XDAS_Int8,
    pub bufSize: XDAS_Int32,
    pub accessMask: XDAS_Int32,
}

impl Default for XDM1_SingleBufDesc {
    fn default() -> Self {
        XDM1_SingleBufDesc {
            buf: std::ptr::null_mut(),
            bufSize: 0,
            accessMask: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct XDM1_BufDesc {
    pub numBufs: XDAS_Int32,
    pub descs: [XDM1_SingleBufDesc; XDM_MAX_IO_BUFFERS],
}

impl Default for XDM1_BufDesc {
    fn default() -> Self {
        XDM1_BufDesc {
            numBufs: 0,
            descs: [XDM1_SingleBufDesc::default(); XDM_MAX_IO_BUFFERS],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct XDM_AlgBufInfo {
    pub minNumInBufs: XDAS_Int32,
    pub minNumOutBufs: XDAS_Int32,
    pub minInBufSize: [XDAS_Int32; XDM_MAX_IO_BUFFERS],
    pub minOutBufSize: [XDAS_Int32; XDM_MAX_IO_BUFFERS],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IVIDEO1_BufDescIn {
    pub numBufs: XDAS_Int32,
    pub frameWidth: XDAS_Int32,
    pub frameHeight: XDAS_Int32,
    pub framePitch: XDAS_Int32,
    pub bufDesc: [XDM1_SingleBufDesc; IVIDEO_MAX_YUV_BUFFERS],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IVIDEO1_BufDesc {
    pub numBufs: XDAS_Int32,
    pub frameWidth: XDAS_Int32,
    pub frameHeight: XDAS_Int32,
    pub framePitch: XDAS_Int32,
    pub bufDesc: [XDM1_SingleBufDesc; IVIDEO_MAX_YUV_BUFFERS],
    pub extendedError: XDAS_Int32,
    pub frameType: XDAS_Int32,
    pub topFieldFirstFlag: XDAS_Int32,
    pub repeatFirstFieldFlag: XDAS_Int32,
    pub frameStatus: XDAS_Int32,
    pub repeatFrame: XDAS_Int32,
    pub contentType: XDAS_Int32,
    pub chromaFormat: XDAS_Int32,
}

/* VIDDEC2 */

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VIDDEC2_Params {
    pub size: XDAS_Int32,
    pub maxHeight: XDAS_Int32,
    pub maxWidth: XDAS_Int32,
    pub maxFrameRate: XDAS_Int32,
    pub maxBitRate: XDAS_Int32,
    pub dataEndianness: XDAS_Int32,
    pub forceChromaFormat: XDAS_Int32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VIDDEC2_DynamicParams {
    pub size: XDAS_Int32,
    pub decodeHeader: XDAS_Int32,
    pub displayWidth: XDAS_Int32,
    pub frameSkipMode: XDAS_Int32,
    pub frameOrder: XDAS_Int32,
    pub newFrameFlag: XDAS_Int32,
    pub mbDataFlag: XDAS_Int32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VIDDEC2_InArgs {
    pub size: XDAS_Int32,
    pub numBytes: XDAS_Int32,
    pub inputID: XDAS_Int32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VIDDEC2_OutArgs {
    pub size: XDAS_Int32,
    pub bytesConsumed: XDAS_Int32,
    pub outputID: [XDAS_Int32; IVIDEO2_MAX_IO_BUFFERS],
    pub decodedBufs: IVIDEO1_BufDesc,
    pub displayBufs: [IVIDEO1_BufDesc; IVIDEO2_MAX_IO_BUFFERS],
    pub outputMbDataID: XDAS_Int32,
    pub mbDataBuf: XDM1_SingleBufDesc,
    pub freeBufID: [XDAS_Int32; IVIDEO2_MAX_IO_BUFFERS],
    pub outBufsInUseFlag: XDAS_Int32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VIDDEC2_Status {
    pub size: XDAS_Int32,
    pub extendedError: XDAS_Int32,
    pub data: XDM1_SingleBufDesc,
    pub maxNumDisplayBufs: XDAS_Int32,
    pub outputHeight: XDAS_Int32,
    pub outputWidth: XDAS_Int32,
    pub frameRate: XDAS_Int32,
    pub bitRate: XDAS_Int32,
    pub contentType: XDAS_Int32,
    pub outputChromaFormat: XDAS_Int32,
    pub bufInfo: XDM_AlgBufInfo,
}

/* VIDENC1 */

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VIDENC1_Params {
    pub size: XDAS_Int32,
    pub encodingPreset: XDAS_Int32,
    pub rateControlPreset: XDAS_Int32,
    pub maxHeight: XDAS_Int32,
    pub maxWidth: XDAS_Int32,
    pub maxFrameRate: XDAS_Int32,
    pub maxBitRate: XDAS_Int32,
    pub dataEndianness: XDAS_Int32,
    pub maxInterFrameInterval: XDAS_Int32,
    pub inputChromaFormat: XDAS_Int32,
    pub inputContentType: XDAS_Int32,
    pub reconChromaFormat: XDAS_Int32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VIDENC1_DynamicParams {
    pub size: XDAS_Int32,
    pub inputHeight: XDAS_Int32,
    pub inputWidth: XDAS_Int32,
    pub refFrameRate: XDAS_Int32,
    pub targetFrameRate: XDAS_Int32,
    pub targetBitRate: XDAS_Int32,
    pub intraFrameInterval: XDAS_Int32,
    pub generateHeader: XDAS_Int32,
    pub captureWidth: XDAS_Int32,
    pub forceFrame: XDAS_Int32,
    pub interFrameInterval: XDAS_Int32,
    pub mbDataFlag: XDAS_Int32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VIDENC1_InArgs {
    pub size: XDAS_Int32,
    pub inputID: XDAS_Int32,
    pub topFieldFirstFlag: XDAS_Int32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VIDENC1_OutArgs {
    pub size: XDAS_Int32,
    pub extendedError: XDAS_Int32,
    pub bytesGenerated: XDAS_Int32,
    pub encodedFrameType: XDAS_Int32,
    pub inputFrameSkip: XDAS_Int32,
    pub outputID: XDAS_Int32,
    pub encodedBuf: XDM1_SingleBufDesc,
    pub reconBufs: IVIDEO1_BufDesc,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VIDENC1_Status {
    pub size: XDAS_Int32,
    pub extendedError: XDAS_Int32,
    pub data: XDM1_SingleBufDesc,
    pub bufInfo: XDM_AlgBufInfo,
}

/* IH264VENC extensions */

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IH264VENC_Params {
    pub videncParams: VIDENC1_Params,
    pub profileIdc: XDAS_Int32,
    pub levelIdc: XDAS_Int32,
    pub Log2MaxFrameNumMinus4: XDAS_Int32,
    pub ConstraintSetFlag: XDAS_Int32,
    pub entropyMode: XDAS_Int32,
    pub transform8x8FlagIntraFrame: XDAS_Int32,
    pub transform8x8FlagInterFrame: XDAS_Int32,
    pub enableVUIparams: XDAS_Int32,
    pub meAlgo: XDAS_Int32,
    pub seqScalingFlag: XDAS_Int32,
    pub encQuality: XDAS_Int32,
    pub enableARM926Tcm: XDAS_Int32,
    pub enableDDRbuff: XDAS_Int32,
    pub sliceMode: XDAS_Int32,
    pub numTemporalLayers: XDAS_Int32,
    pub svcSyntaxEnable: XDAS_Int32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IH264VENC_VUIDataStructure {
    pub aspectRatioInfoPresentFlag: XDAS_UInt8,
    pub overscanInfoPresentFlag: XDAS_UInt8,
    pub overscanAppropriateFlag: XDAS_UInt8,
    pub videoSignalTypePresentFlag: XDAS_UInt8,
    pub videoFormat: XDAS_UInt8,
    pub videoFullRangeFlag: XDAS_UInt8,
    pub colourDescriptionPresentFlag: XDAS_UInt8,
    pub colourPrimaries: XDAS_UInt8,
    pub transferCharacteristics: XDAS_UInt8,
    pub matrixCoefficients: XDAS_UInt8,
    pub timingInfoPresentFlag: XDAS_UInt8,
    pub numUnitsInTicks: XDAS_UInt32,
    pub timeScale: XDAS_UInt32,
    pub fixedFrameRateFlag: XDAS_UInt8,
    pub nalHrdParameterspresentFlag: XDAS_UInt8,
    pub picStructPresentFlag: XDAS_UInt8,
    pub bitstreamRestrictionFlag: XDAS_UInt8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IH264VENC_DynamicParams {
    pub videncDynamicParams: VIDENC1_DynamicParams,
    pub sliceSize: XDAS_Int32,
    pub airRate: XDAS_Int32,
    pub intraFrameQP: XDAS_Int32,
    pub interPFrameQP: XDAS_Int32,
    pub initQ: XDAS_Int32,
    pub rcQMax: XDAS_Int32,
    pub rcQMin: XDAS_Int32,
    pub rcQMaxI: XDAS_Int32,
    pub rcQMinI: XDAS_Int32,
    pub rcAlgo: XDAS_Int32,
    pub maxDelay: XDAS_Int32,
    pub aspectRatioX: XDAS_Int32,
    pub aspectRatioY: XDAS_Int32,
    pub lfDisableIdc: XDAS_Int32,
    pub enableBufSEI: XDAS_Int32,
    pub enablePicTimSEI: XDAS_Int32,
    pub perceptualRC: XDAS_Int32,
    pub idrFrameInterval: XDAS_Int32,
    pub VUI_Buffer: *mut IH264VENC_VUIDataStructure,
}

impl Default for IH264VENC_DynamicParams {
    fn default() -> Self {
        IH264VENC_DynamicParams {
            videncDynamicParams: VIDENC1_DynamicParams::default(),
            sliceSize: 0,
            airRate: 0,
            intraFrameQP: 0,
            interPFrameQP: 0,
            initQ: 0,
            rcQMax: 0,
            rcQMin: 0,
            rcQMaxI: 0,
            rcQMinI: 0,
            rcAlgo: 0,
            maxDelay: 0,
            aspectRatioX: 0,
            aspectRatioY: 0,
            lfDisableIdc: 0,
            enableBufSEI: 0,
            enablePicTimSEI: 0,
            perceptualRC: 0,
            idrFrameInterval: 0,
            VUI_Buffer: std::ptr::null_mut(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IH264VENC_InArgs {
    pub videncInArgs: VIDENC1_InArgs,
    pub insertUserData: XDAS_Int32,
    pub lengthUserData: XDAS_Int32,
    pub numOutputDataUnits: XDAS_Int32,
}

/* IMGENC1 */

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IMGENC1_Params {
    pub size: XDAS_Int32,
    pub maxHeight: XDAS_Int32,
    pub maxWidth: XDAS_Int32,
    pub maxScans: XDAS_Int32,
    pub dataEndianness: XDAS_Int32,
    pub forceChromaFormat: XDAS_Int32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IMGENC1_DynamicParams {
    pub size: XDAS_Int32,
    pub numAU: XDAS_Int32,
    pub inputChromaFormat: XDAS_Int32,
    pub inputHeight: XDAS_Int32,
    pub inputWidth: XDAS_Int32,
    pub captureWidth: XDAS_Int32,
    pub generateHeader: XDAS_Int32,
    pub qValue: XDAS_Int32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IMGENC1_InArgs {
    pub size: XDAS_Int32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IMGENC1_OutArgs {
    pub size: XDAS_Int32,
    pub extendedError: XDAS_Int32,
    pub bytesGenerated: XDAS_Int32,
    pub currentAU: XDAS_Int32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IMGENC1_Status {
    pub size: XDAS_Int32,
    pub extendedError: XDAS_Int32,
    pub data: XDM1_SingleBufDesc,
    pub totalAU: XDAS_Int32,
    pub bufInfo: XDM_AlgBufInfo,
}

pub struct CodecEngineLibrary {
    __library: ::libloading::Library,
    pub CERuntime_init: Result<unsafe extern "C" fn(), ::libloading::Error>,
    pub CERuntime_exit: Result<unsafe extern "C" fn(), ::libloading::Error>,
    pub CMEM_init: Result<unsafe extern "C" fn() -> c_int, ::libloading::Error>,
    pub CMEM_exit: Result<unsafe extern "C" fn() -> c_int, ::libloading::Error>,
    pub CMEM_alloc: Result<
        unsafe extern "C" fn(size: usize, params: *const CMEM_AllocParams) -> *mut c_void,
        ::libloading::Error,
    >,
    pub CMEM_free: Result<
        unsafe extern "C" fn(ptr: *mut c_void, params: *const CMEM_AllocParams) -> c_int,
        ::libloading::Error,
    >,
    pub CMEM_getPhys: Result<unsafe extern "C" fn(ptr: *mut c_void) -> c_ulong, ::libloading::Error>,
    pub Engine_open: Result<
        unsafe extern "C" fn(
            name: *const c_char,
            attrs: *mut Engine_Attrs,
            ec: *mut Engine_Error,
        ) -> Engine_Handle,
        ::libloading::Error,
    >,
    pub Engine_close: Result<unsafe extern "C" fn(engine: Engine_Handle), ::libloading::Error>,
    pub VIDDEC2_create: Result<
        unsafe extern "C" fn(
            engine: Engine_Handle,
            name: *const c_char,
            params: *mut VIDDEC2_Params,
        ) -> VIDDEC2_Handle,
        ::libloading::Error,
    >,
    pub VIDDEC2_control: Result<
        unsafe extern "C" fn(
            handle: VIDDEC2_Handle,
            id: XDAS_Int32,
            params: *mut VIDDEC2_DynamicParams,
            status: *mut VIDDEC2_Status,
        ) -> XDAS_Int32,
        ::libloading::Error,
    >,
    pub VIDDEC2_process: Result<
        unsafe extern "C" fn(
            handle: VIDDEC2_Handle,
            in_bufs: *mut XDM1_BufDesc,
            out_bufs: *mut XDM_BufDesc,
            in_args: *mut VIDDEC2_InArgs,
            out_args: *mut VIDDEC2_OutArgs,
        ) -> XDAS_Int32,
        ::libloading::Error,
    >,
    pub VIDDEC2_delete: Result<unsafe extern "C" fn(handle: VIDDEC2_Handle), ::libloading::Error>,
    pub VIDENC1_create: Result<
        unsafe extern "C" fn(
            engine: Engine_Handle,
            name: *const c_char,
            params: *mut VIDENC1_Params,
        ) -> VIDENC1_Handle,
        ::libloading::Error,
    >,
    pub VIDENC1_control: Result<
        unsafe extern "C" fn(
            handle: VIDENC1_Handle,
            id: XDAS_Int32,
            params: *mut VIDENC1_DynamicParams,
            status: *mut VIDENC1_Status,
        ) -> XDAS_Int32,
        ::libloading::Error,
    >,
    pub VIDENC1_process: Result<
        unsafe extern "C" fn(
            handle: VIDENC1_Handle,
            in_bufs: *mut IVIDEO1_BufDescIn,
            out_bufs: *mut XDM_BufDesc,
            in_args: *mut VIDENC1_InArgs,
            out_args: *mut VIDENC1_OutArgs,
        ) -> XDAS_Int32,
        ::libloading::Error,
    >,
    pub VIDENC1_delete: Result<unsafe extern "C" fn(handle: VIDENC1_Handle), ::libloading::Error>,
    pub IMGENC1_create: Result<
        unsafe extern "C" fn(
            engine: Engine_Handle,
            name: *const c_char,
            params: *mut IMGENC1_Params,
        ) -> IMGENC1_Handle,
        ::libloading::Error,
    >,
    pub IMGENC1_control: Result<
        unsafe extern "C" fn(
            handle: IMGENC1_Handle,
            id: XDAS_Int32,
            params: *mut IMGENC1_DynamicParams,
            status: *mut IMGENC1_Status,
        ) -> XDAS_Int32,
        ::libloading::Error,
    >,
    pub IMGENC1_process: Result<
        unsafe extern "C" fn(
            handle: IMGENC1_Handle,
            in_bufs: *mut XDM1_BufDesc,
            out_bufs: *mut XDM1_BufDesc,
            in_args: *mut IMGENC1_InArgs,
            out_args: *mut IMGENC1_OutArgs,
        ) -> XDAS_Int32,
        ::libloading::Error,
    >,
    pub IMGENC1_delete: Result<unsafe extern "C" fn(handle: IMGENC1_Handle), ::libloading::Error>,
}

impl CodecEngineLibrary {
    pub unsafe fn new<P>(path: P) -> Result<Self, ::libloading::Error>
    where
        P: ::libloading::AsFilename,
    {
        let library = ::libloading::Library::new(path)?;
        Self::from_library(library)
    }

    pub unsafe fn from_library<L>(library: L) -> Result<Self, ::libloading::Error>
    where
        L: Into<::libloading::Library>,
    {
        let __library = library.into();
        let CERuntime_init = __library.get(&b"CERuntime_init\0"[..]).map(|sym| *sym);
        let CERuntime_exit = __library.get(&b"CERuntime_exit\0"[..]).map(|sym| *sym);
        let CMEM_init = __library.get(&b"CMEM_init\0"[..]).map(|sym| *sym);
        let CMEM_exit = __library.get(&b"CMEM_exit\0"[..]).map(|sym| *sym);
        let CMEM_alloc = __library.get(&b"CMEM_alloc\0"[..]).map(|sym| *sym);
        let CMEM_free = __library.get(&b"CMEM_free\0"[..]).map(|sym| *sym);
        let CMEM_getPhys = __library.get(&b"CMEM_getPhys\0"[..]).map(|sym| *sym);
        let Engine_open = __library.get(&b"Engine_open\0"[..]).map(|sym| *sym);
        let Engine_close = __library.get(&b"Engine_close\0"[..]).map(|sym| *sym);
        let VIDDEC2_create = __library.get(&b"VIDDEC2_create\0"[..]).map(|sym| *sym);
        let VIDDEC2_control = __library.get(&b"VIDDEC2_control\0"[..]).map(|sym| *sym);
        let VIDDEC2_process = __library.get(&b"VIDDEC2_process\0"[..]).map(|sym| *sym);
        let VIDDEC2_delete = __library.get(&b"VIDDEC2_delete\0"[..]).map(|sym| *sym);
        let VIDENC1_create = __library.get(&b"VIDENC1_create\0"[..]).map(|sym| *sym);
        let VIDENC1_control = __library.get(&b"VIDENC1_control\0"[..]).map(|sym| *sym);
        let VIDENC1_process = __library.get(&b"VIDENC1_process\0"[..]).map(|sym| *sym);
        let VIDENC1_delete = __library.get(&b"VIDENC1_delete\0"[..]).map(|sym| *sym);
        let IMGENC1_create = __library.get(&b"IMGENC1_create\0"[..]).map(|sym| *sym);
        let IMGENC1_control = __library.get(&b"IMGENC1_control\0"[..]).map(|sym| *sym);
        let IMGENC1_process = __library.get(&b"IMGENC1_process\0"[..]).map(|sym| *sym);
        let IMGENC1_delete = __library.get(&b"IMGENC1_delete\0"[..]).map(|sym| *sym);
        Ok(CodecEngineLibrary {
            __library,
            CERuntime_init,
            CERuntime_exit,
            CMEM_init,
            CMEM_exit,
            CMEM_alloc,
            CMEM_free,
            CMEM_getPhys,
            Engine_open,
            Engine_close,
            VIDDEC2_create,
            VIDDEC2_control,
            VIDDEC2_process,
            VIDDEC2_delete,
            VIDENC1_create,
            VIDENC1_control,
            VIDENC1_process,
            VIDENC1_delete,
            IMGENC1_create,
            IMGENC1_control,
            IMGENC1_process,
            IMGENC1_delete,
        })
    }

    pub unsafe fn CERuntime_init(&self) {
        (self
            .CERuntime_init
            .as_ref()
            .expect("Expected function, got error."))()
    }

    pub unsafe fn CERuntime_exit(&self) {
        (self
            .CERuntime_exit
            .as_ref()
            .expect("Expected function, got error."))()
    }

    pub unsafe fn CMEM_init(&self) -> c_int {
        (self.CMEM_init.as_ref().expect("Expected function, got error."))()
    }

    pub unsafe fn CMEM_exit(&self) -> c_int {
        (self.CMEM_exit.as_ref().expect("Expected function, got error."))()
    }

    pub unsafe fn CMEM_alloc(&self, size: usize, params: *const CMEM_AllocParams) -> *mut c_void {
        (self.CMEM_alloc.as_ref().expect("Expected function, got error."))(size, params)
    }

    pub unsafe fn CMEM_free(&self, ptr: *mut c_void, params: *const CMEM_AllocParams) -> c_int {
        (self.CMEM_free.as_ref().expect("Expected function, got error."))(ptr, params)
    }

    pub unsafe fn CMEM_getPhys(&self, ptr: *mut c_void) -> c_ulong {
        (self
            .CMEM_getPhys
            .as_ref()
            .expect("Expected function, got error."))(ptr)
    }

    pub unsafe fn Engine_open(
        &self,
        name: *const c_char,
        attrs: *mut Engine_Attrs,
        ec: *mut Engine_Error,
    ) -> Engine_Handle {
        (self
            .Engine_open
            .as_ref()
            .expect("Expected function, got error."))(name, attrs, ec)
    }

    pub unsafe fn Engine_close(&self, engine: Engine_Handle) {
        (self
            .Engine_close
            .as_ref()
            .expect("Expected function, got error."))(engine)
    }

    pub unsafe fn VIDDEC2_create(
        &self,
        engine: Engine_Handle,
        name: *const c_char,
        params: *mut VIDDEC2_Params,
    ) -> VIDDEC2_Handle {
        (self
            .VIDDEC2_create
            .as_ref()
            .expect("Expected function, got error."))(engine, name, params)
    }

    pub unsafe fn VIDDEC2_control(
        &self,
        handle: VIDDEC2_Handle,
        id: XDAS_Int32,
        params: *mut VIDDEC2_DynamicParams,
        status: *mut VIDDEC2_Status,
    ) -> XDAS_Int32 {
        (self
            .VIDDEC2_control
            .as_ref()
            .expect("Expected function, got error."))(handle, id, params, status)
    }

    pub unsafe fn VIDDEC2_process(
        &self,
        handle: VIDDEC2_Handle,
        in_bufs: *mut XDM1_BufDesc,
        out_bufs: *mut XDM_BufDesc,
        in_args: *mut VIDDEC2_InArgs,
        out_args: *mut VIDDEC2_OutArgs,
    ) -> XDAS_Int32 {
        (self
            .VIDDEC2_process
            .as_ref()
            .expect("Expected function, got error."))(
            handle, in_bufs, out_bufs, in_args, out_args
        )
    }

    pub unsafe fn VIDDEC2_delete(&self, handle: VIDDEC2_Handle) {
        (self
            .VIDDEC2_delete
            .as_ref()
            .expect("Expected function, got error."))(handle)
    }

    pub unsafe fn VIDENC1_create(
        &self,
        engine: Engine_Handle,
        name: *const c_char,
        params: *mut VIDENC1_Params,
    ) -> VIDENC1_Handle {
        (self
            .VIDENC1_create
            .as_ref()
            .expect("Expected function, got error."))(engine, name, params)
    }

    pub unsafe fn VIDENC1_control(
        &self,
        handle: VIDENC1_Handle,
        id: XDAS_Int32,
        params: *mut VIDENC1_DynamicParams,
        status: *mut VIDENC1_Status,
    ) -> XDAS_Int32 {
        (self
            .VIDENC1_control
            .as_ref()
            .expect("Expected function, got error."))(handle, id, params, status)
    }

    pub unsafe fn VIDENC1_process(
        &self,
        handle: VIDENC1_Handle,
        in_bufs: *mut IVIDEO1_BufDescIn,
        out_bufs: *mut XDM_BufDesc,
        in_args: *mut VIDENC1_InArgs,
        out_args: *mut VIDENC1_OutArgs,
    ) -> XDAS_Int32 {
        (self
            .VIDENC1_process
            .as_ref()
            .expect("Expected function, got error."))(
            handle, in_bufs, out_bufs, in_args, out_args
        )
    }

    pub unsafe fn VIDENC1_delete(&self, handle: VIDENC1_Handle) {
        (self
            .VIDENC1_delete
            .as_ref()
            .expect("Expected function, got error."))(handle)
    }

    pub unsafe fn IMGENC1_create(
        &self,
        engine: Engine_Handle,
        name: *const c_char,
        params: *mut IMGENC1_Params,
    ) -> IMGENC1_Handle {
        (self
            .IMGENC1_create
            .as_ref()
            .expect("Expected function, got error."))(engine, name, params)
    }

    pub unsafe fn IMGENC1_control(
        &self,
        handle: IMGENC1_Handle,
        id: XDAS_Int32,
        params: *mut IMGENC1_DynamicParams,
        status: *mut IMGENC1_Status,
    ) -> XDAS_Int32 {
        (self
            .IMGENC1_control
            .as_ref()
            .expect("Expected function, got error."))(handle, id, params, status)
    }

    pub unsafe fn IMGENC1_process(
        &self,
        handle: IMGENC1_Handle,
        in_bufs: *mut XDM1_BufDesc,
        out_bufs: *mut XDM1_BufDesc,
        in_args: *mut IMGENC1_InArgs,
        out_args: *mut IMGENC1_OutArgs,
    ) -> XDAS_Int32 {
        (self
            .IMGENC1_process
            .as_ref()
            .expect("Expected function, got error."))(
            handle, in_bufs, out_bufs, in_args, out_args
        )
    }

    pub unsafe fn IMGENC1_delete(&self, handle: IMGENC1_Handle) {
        (self
            .IMGENC1_delete
            .as_ref()
            .expect("Expected function, got error."))(handle)
    }
}
