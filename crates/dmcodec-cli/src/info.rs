// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

use crate::error::CliError;
use crate::{utils, Backend, Global};
use clap::Args as ClapArgs;
use dmcodec::engine::Platform;
use dmcodec::hw::CodecFamily;
use dmcodec::params::{self, SessionConfig};
use dmcodec::session::{H264Decoder, H264Encoder, JpegEncoder};
use serde::Serialize;
use std::sync::Arc;

const FAMILIES: [CodecFamily; 3] = [
    CodecFamily::H264Decode,
    CodecFamily::H264Encode,
    CodecFamily::JpegEncode,
];

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Resolution used to probe buffer requirements
    #[arg(short, long, default_value = "640x480")]
    resolution: String,

    /// Skip opening probe sessions
    #[arg(long)]
    no_probe: bool,
}

#[derive(Debug, Serialize)]
struct SystemInfo {
    version: String,
    backend: String,
    runtime: RuntimeInfo,
    families: Vec<FamilyInfo>,
}

#[derive(Debug, Serialize)]
struct RuntimeInfo {
    library: String,
    available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    engine: Option<String>,
}

#[derive(Debug, Serialize)]
struct FamilyInfo {
    family: String,
    codec_name: String,
    domain: String,
    pixel_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    probe: Option<ProbeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProbeInfo {
    width: u32,
    height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_capacity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_planes: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_packet_size: Option<usize>,
}

pub fn execute(args: Args, global: &Global) -> Result<(), CliError> {
    log::debug!("Executing info command: {:?}", args);

    let (width, height) = utils::parse_resolution(&args.resolution)?;

    let library = std::env::var(dmcodec::LIBRARY_ENV)
        .unwrap_or_else(|_| dmcodec::DEFAULT_LIBRARY.to_string());
    let available = dmcodec::is_available();

    // The native backend is only usable when the runtime library loads.
    let platform = match global.backend {
        Backend::Native if !available => None,
        backend => Some(utils::open_platform(backend)?),
    };

    let families = FAMILIES
        .iter()
        .map(|&family| query_family(platform.as_ref(), family, width, height, !args.no_probe))
        .collect();

    let info = SystemInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: format!("{:?}", global.backend).to_lowercase(),
        runtime: RuntimeInfo {
            library,
            available,
            engine: platform.as_ref().map(|p| p.engine_name().to_string()),
        },
        families,
    };

    if global.json {
        let json_str = serde_json::to_string_pretty(&info)
            .map_err(|e| CliError::General(format!("Failed to serialize JSON: {}", e)))?;
        println!("{}", json_str);
    } else {
        print_text_info(&info);
    }

    Ok(())
}

fn query_family(
    platform: Option<&Arc<Platform>>,
    family: CodecFamily,
    width: u32,
    height: u32,
    probe: bool,
) -> FamilyInfo {
    let mut info = FamilyInfo {
        family: family.to_string(),
        codec_name: family.default_codec_name().to_string(),
        domain: family.domain().to_string(),
        pixel_format: String::from_utf8_lossy(&params::accepted_format(family).fourcc())
            .into_owned(),
        probe: None,
        error: None,
    };

    let Some(platform) = platform.filter(|_| probe) else {
        return info;
    };

    match probe_family(platform, family, width, height) {
        Ok(result) => info.probe = Some(result),
        Err(err) => {
            log::debug!("{} probe failed: {}", family, err);
            info.error = Some(err.to_string());
        }
    }
    info
}

/// Open a short-lived session to read the hardware's buffer requirements.
fn probe_family(
    platform: &Arc<Platform>,
    family: CodecFamily,
    width: u32,
    height: u32,
) -> Result<ProbeInfo, dmcodec::Error> {
    let config = SessionConfig::new(family, width, height);
    let mut probe = ProbeInfo {
        width,
        height,
        input_capacity: None,
        output_planes: None,
        min_packet_size: None,
    };

    match family {
        CodecFamily::H264Decode => {
            let decoder = H264Decoder::open(platform, &config)?;
            probe.input_capacity = Some(decoder.input_capacity());
            probe.output_planes = Some(decoder.output_planes());
        }
        CodecFamily::H264Encode => {
            let encoder = H264Encoder::open(platform, &config)?;
            probe.min_packet_size = Some(encoder.min_packet_size());
        }
        CodecFamily::JpegEncode => {
            let encoder = JpegEncoder::open(platform, &config)?;
            probe.min_packet_size = Some(encoder.min_packet_size());
        }
    }
    Ok(probe)
}

fn print_text_info(info: &SystemInfo) {
    println!("dmcodec v{}", info.version);
    println!();

    println!("Runtime:");
    println!("  Library:   {}", info.runtime.library);
    println!(
        "  Available: {}",
        if info.runtime.available { "Yes" } else { "No" }
    );
    println!("  Backend:   {}", info.backend);
    if let Some(engine) = &info.runtime.engine {
        println!("  Engine:    {}", engine);
    }

    for family in &info.families {
        println!();
        println!("{}:", family.family);
        println!("  Codec:        {}", family.codec_name);
        println!("  Domain:       {}", family.domain);
        println!("  Pixel format: {}", family.pixel_format);
        if let Some(probe) = &family.probe {
            println!("  Probe:        {}x{}", probe.width, probe.height);
            if let Some(capacity) = probe.input_capacity {
                println!("    Input capacity:  {} bytes", capacity);
            }
            if let Some(planes) = &probe.output_planes {
                let sizes: Vec<String> = planes.iter().map(|size| size.to_string()).collect();
                println!("    Output planes:   {} bytes", sizes.join(" + "));
            }
            if let Some(size) = probe.min_packet_size {
                println!("    Min packet size: {} bytes", size);
            }
        }
        if let Some(error) = &family.error {
            println!("  Error:        {}", error);
        }
    }
}
