// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

// The codec runtime is loaded with libloading at first use, so nothing is
// linked at build time.

fn main() {
    println!("cargo:rerun-if-changed=src/ffi.rs");
    println!("cargo:rerun-if-env-changed=DMCODEC_LIBRARY");
}
