// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

//! dmcodec: hardware codec sessions for DaVinci-class codec engines
//!
//! Safe session layer over a fixed-function hardware codec engine exposed
//! through the handle-based Codec Engine API (Engine, CMEM, VIDDEC2,
//! VIDENC1, IMGENC1). The crate owns the full lifecycle of an encode or
//! decode session: engine and allocator acquisition, parameter negotiation,
//! contiguous buffer allocation, per-unit processing, stride-driven
//! reconfiguration, and ordered teardown.
//!
//! The compression itself happens inside the hardware engine. Everything
//! that touches it goes through the [`hw::HardwareEngine`] trait, implemented
//! by the runtime-loaded [`native`] engine and by the in-memory
//! [`mock::MockEngine`].
//!
//! # Quick Start
//!
//! ## Encoding NV12 pictures to H.264
//!
//! ```no_run
//! use dmcodec::engine::Platform;
//! use dmcodec::frame::{Frame, Packet};
//! use dmcodec::hw::CodecFamily;
//! use dmcodec::params::{Rational, SessionConfig};
//! use dmcodec::session::H264Encoder;
//!
//! let platform = Platform::native()?;
//! let config = SessionConfig::new(CodecFamily::H264Encode, 1280, 720)
//!     .with_frame_rate(Rational::new(30, 1))
//!     .with_bitrate(4_000_000);
//! let mut encoder = H264Encoder::open(&platform, &config)?;
//!
//! let luma = vec![0u8; 1280 * 720];
//! let chroma = vec![128u8; 1280 * 720 / 2];
//! let frame = Frame::nv12(1280, 720, 1280, &luma, &chroma);
//! let mut packet = Packet::with_capacity(encoder.min_packet_size());
//! let unit = encoder.encode(&frame, &mut packet)?;
//! println!("{} bytes, key frame: {}", unit.bytes, unit.key_frame);
//! # Ok::<(), dmcodec::Error>(())
//! ```
//!
//! ## Decoding H.264 access units
//!
//! ```no_run
//! use dmcodec::engine::Platform;
//! use dmcodec::hw::CodecFamily;
//! use dmcodec::params::SessionConfig;
//! use dmcodec::session::H264Decoder;
//!
//! let platform = Platform::native()?;
//! let config = SessionConfig::new(CodecFamily::H264Decode, 720, 576);
//! let mut decoder = H264Decoder::open(&platform, &config)?;
//!
//! let access_unit: &[u8] = &[/* Annex-B NAL units */];
//! let decoded = decoder.decode(access_unit)?;
//! if let Some(frame) = &decoded.frame {
//!     println!("{}x{} ({:?})", frame.width(), frame.height(), decoded.classification);
//! }
//! # Ok::<(), dmcodec::Error>(())
//! ```

use std::{error, ffi::NulError, fmt};

use dmcodec_sys as ffi;

pub use hw::ExtendedError;

/// Taxonomy of failures, independent of the variant carrying the details.
///
/// `ProcessingFailed` and `ReconfigurationFailed` leave the session usable;
/// every other kind is fatal to the open attempt or the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The runtime library, a symbol, or the session state was unusable.
    Runtime,
    /// The hardware engine domain could not be opened.
    EngineUnavailable,
    /// Contiguous memory could not be allocated.
    OutOfMemory,
    /// The configuration or input geometry is not supported.
    InvalidConfiguration,
    /// The hardware rejected the codec parameters.
    CodecCreationFailed,
    /// A single unit failed; the session remains usable.
    ProcessingFailed,
    /// A dynamic parameter update was rejected; the previous values remain.
    ReconfigurationFailed,
}

/// Error type for codec session operations
#[derive(Debug)]
pub enum Error {
    /// The codec runtime library could not be loaded
    LibraryNotLoaded(ffi::libloading::Error),

    /// A required symbol is missing from the loaded runtime
    SymbolNotFound(&'static str),

    /// Codec name with an interior null byte
    CString(NulError),

    /// The engine domain or its allocator could not be opened, or the
    /// process already has an active session for the domain
    EngineUnavailable(String),

    /// Contiguous memory allocation failed
    OutOfMemory { size: usize },

    /// Unsupported configuration, dimensions, or input geometry
    InvalidConfiguration(String),

    /// The requested pixel layout is not the one the codec family accepts
    InvalidPixelFormat {
        requested: params::PixelFormat,
        expected: params::PixelFormat,
    },

    /// The hardware refused to create the codec instance or rejected its
    /// initial parameters
    CodecCreationFailed {
        codec: String,
        status: i32,
        extended: ExtendedError,
    },

    /// The hardware process call failed for one unit
    ProcessingFailed { status: i32, extended: ExtendedError },

    /// A compressed unit does not fit the session's input region
    InputTooLarge { len: usize, capacity: usize },

    /// The hardware produced output outside the memory it was given
    InvalidOutput(String),

    /// A dynamic parameter update was rejected by the hardware
    ReconfigurationFailed { status: i32, extended: ExtendedError },

    /// The operation is not allowed in the session's current state
    InvalidState {
        operation: &'static str,
        state: session::SessionState,
    },
}

impl Error {
    /// Map the error onto the failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::LibraryNotLoaded(_)
            | Error::SymbolNotFound(_)
            | Error::InvalidState { .. } => ErrorKind::Runtime,
            Error::EngineUnavailable(_) => ErrorKind::EngineUnavailable,
            Error::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Error::InvalidConfiguration(_)
            | Error::InvalidPixelFormat { .. }
            | Error::CString(_) => ErrorKind::InvalidConfiguration,
            Error::CodecCreationFailed { .. } => ErrorKind::CodecCreationFailed,
            Error::ProcessingFailed { .. } | Error::InputTooLarge { .. } | Error::InvalidOutput(_) => {
                ErrorKind::ProcessingFailed
            }
            Error::ReconfigurationFailed { .. } => ErrorKind::ReconfigurationFailed,
        }
    }

    /// Returns `true` when the session that produced the error is still
    /// usable for the next unit.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ProcessingFailed | ErrorKind::ReconfigurationFailed
        )
    }

    /// Hardware extended error word, when the hardware reported one.
    pub fn extended_error(&self) -> Option<ExtendedError> {
        match self {
            Error::CodecCreationFailed { extended, .. }
            | Error::ProcessingFailed { extended, .. }
            | Error::ReconfigurationFailed { extended, .. } => Some(*extended),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::LibraryNotLoaded(err) => {
                write!(f, "codec runtime library could not be loaded: {}", err)
            }
            Error::SymbolNotFound(sym) => write!(f, "symbol not found in codec runtime: {}", sym),
            Error::CString(err) => write!(f, "CString creation error: {}", err),
            Error::EngineUnavailable(msg) => write!(f, "codec engine unavailable: {}", msg),
            Error::OutOfMemory { size } => {
                write!(f, "out of contiguous memory allocating {} bytes", size)
            }
            Error::InvalidConfiguration(msg) => write!(f, "invalid configuration: {}", msg),
            Error::InvalidPixelFormat {
                requested,
                expected,
            } => write!(
                f,
                "invalid pixel format {} (codec family accepts {})",
                requested, expected
            ),
            Error::CodecCreationFailed {
                codec,
                status,
                extended,
            } => write!(
                f,
                "failed to create codec {} (status {}, extended error {})",
                codec, status, extended
            ),
            Error::ProcessingFailed { status, extended } => write!(
                f,
                "hardware processing failed (status {}, extended error {})",
                status, extended
            ),
            Error::InputTooLarge { len, capacity } => write!(
                f,
                "input of {} bytes exceeds the {} byte input buffer",
                len, capacity
            ),
            Error::InvalidOutput(msg) => write!(f, "invalid hardware output: {}", msg),
            Error::ReconfigurationFailed { status, extended } => write!(
                f,
                "dynamic parameter update rejected (status {}, extended error {})",
                status, extended
            ),
            Error::InvalidState { operation, state } => {
                write!(f, "cannot {} while session is {:?}", operation, state)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::LibraryNotLoaded(err) => Some(err),
            Error::CString(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ffi::libloading::Error> for Error {
    fn from(err: ffi::libloading::Error) -> Self {
        Error::LibraryNotLoaded(err)
    }
}

impl From<NulError> for Error {
    fn from(err: NulError) -> Self {
        Error::CString(err)
    }
}

/// The hw module defines the typed boundary to the hardware codec engine.
pub mod hw;

/// The engine module manages engine handles, the allocator reference count
/// and the per-domain session slots.
pub mod engine;

/// The buffer module provides contiguous, aligned buffer regions.
pub mod buffer;

/// The params module builds static and dynamic codec parameters.
pub mod params;

/// The frame module provides the host frame and packet types.
pub mod frame;

/// The transcode module maps host frames to and from hardware descriptors.
pub mod transcode;

/// The session module provides the decode and encode session state machines.
pub mod session;

/// The native module drives the runtime-loaded codec engine library.
pub mod native;

/// The mock module provides an in-memory engine for tests and dry runs.
pub mod mock;

pub use engine::Platform;
pub use session::{open, CodecSession, Input, Output};

pub use ffi::{DEFAULT_LIBRARY, LIBRARY_ENV};

/// Returns `true` when the codec runtime library can be loaded.
pub fn is_available() -> bool {
    ffi::init().is_ok()
}
