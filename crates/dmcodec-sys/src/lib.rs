// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(clippy::type_complexity)]
#![allow(clippy::missing_safety_doc)]
#![allow(clippy::too_many_arguments)]

mod ffi;

pub use ffi::*;

// Re-export libloading for error handling
pub use libloading;

use std::sync::{Mutex, OnceLock};

/// Environment variable naming an explicit path to the codec runtime.
pub const LIBRARY_ENV: &str = "DMCODEC_LIBRARY";

/// Library name searched on the default loader path.
pub const DEFAULT_LIBRARY: &str = "libdmcodec.so";

static LIBRARY: OnceLock<CodecEngineLibrary> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Load the codec engine runtime on first use.
///
/// The runtime is a shared library bundling the Codec Engine, CMEM and the
/// codec server for the board. `DMCODEC_LIBRARY` overrides the path,
/// otherwise `libdmcodec.so` is resolved through the system loader.
///
/// Symbols are resolved one by one, so a runtime built without a codec
/// family still loads; callers check the individual symbol before use.
pub fn init() -> Result<&'static CodecEngineLibrary, libloading::Error> {
    if let Some(lib) = LIBRARY.get() {
        return Ok(lib);
    }

    let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    // Double-check after acquiring lock
    if let Some(lib) = LIBRARY.get() {
        return Ok(lib);
    }

    let lib_path = std::env::var(LIBRARY_ENV).unwrap_or_else(|_| DEFAULT_LIBRARY.to_string());
    let lib = unsafe { CodecEngineLibrary::new(lib_path.as_str())? };

    Ok(LIBRARY.get_or_init(|| lib))
}

/// Try to get a reference to the loaded library without loading it.
pub fn try_library() -> Option<&'static CodecEngineLibrary> {
    LIBRARY.get()
}
