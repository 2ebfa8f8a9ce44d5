// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

use crate::config::FileConfig;
use crate::error::CliError;
use crate::metrics::MetricsCollector;
use crate::{utils, Global};
use clap::Args as ClapArgs;
use dmcodec::hw::CodecFamily;
use dmcodec::params::SessionConfig;
use dmcodec::{CodecSession, Input, Output};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Instant;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// H.264 Annex-B input stream
    input: PathBuf,

    /// Raw NV12 output file
    output: PathBuf,

    /// Maximum picture size in WxH format
    #[arg(short, long)]
    resolution: Option<String>,

    /// Algorithm name registered with the engine
    #[arg(long)]
    codec_name: Option<String>,

    /// Number of access units (0=all)
    #[arg(short, long, default_value = "0")]
    frames: u64,

    /// Consecutive failed access units tolerated before giving up
    #[arg(long, default_value = "8")]
    max_failures: u64,
}

pub fn execute(args: Args, global: &Global) -> Result<(), CliError> {
    log::debug!("Decode parameters: {:?}", args);

    let settings = FileConfig {
        resolution: args.resolution.clone(),
        codec_name: args.codec_name.clone(),
        ..FileConfig::default()
    }
    .or(FileConfig::load(global.config.as_deref())?);
    let (width, height) = settings.dimensions()?;
    let mut config = SessionConfig::new(CodecFamily::H264Decode, width, height);
    if let Some(name) = &settings.codec_name {
        config = config.with_codec_name(name.clone());
    }

    let stream = fs::read(&args.input)
        .map_err(|e| CliError::Io(format!("{}: {}", args.input.display(), e)))?;
    let units = utils::split_access_units(&stream);
    if units.is_empty() {
        return Err(CliError::InvalidArgs(format!(
            "{}: no H.264 start codes found",
            args.input.display()
        )));
    }
    log::info!("Found {} access units", units.len());

    let platform = utils::open_platform(global.backend)?;
    let mut session = dmcodec::open(&platform, &config)?;
    log::info!(
        "Opened {} session '{}' {}x{}",
        session.family(),
        session.codec_name(),
        width,
        height
    );

    let output = File::create(&args.output)
        .map_err(|e| CliError::Io(format!("{}: {}", args.output.display(), e)))?;
    let mut writer = BufWriter::new(output);

    let term = utils::install_signal_handler()?;
    let mut metrics = MetricsCollector::new(session.family().to_string());
    let limit = if args.frames == 0 {
        units.len()
    } else {
        units.len().min(args.frames as usize)
    };
    let mut consecutive_failures = 0u64;

    for (index, unit) in units.iter().take(limit).enumerate() {
        if term.load(Ordering::Relaxed) {
            log::info!("Interrupted, finishing up");
            break;
        }

        let started = Instant::now();
        match session.process_one(Input::AccessUnit(unit)) {
            Ok(Output::Decoded(decoded)) => {
                consecutive_failures = 0;
                if decoded.bytes_consumed < unit.len() {
                    log::debug!(
                        "Unit {}: {} of {} bytes consumed",
                        index,
                        decoded.bytes_consumed,
                        unit.len()
                    );
                }
                let (written, key_frame) = match &decoded.frame {
                    Some(frame) => {
                        let packed = frame.to_packed();
                        writer
                            .write_all(&packed)
                            .map_err(|e| CliError::Io(format!("Failed to write output: {}", e)))?;
                        (packed.len(), frame.key_frame())
                    }
                    None => (0, false),
                };
                metrics.record_unit(started.elapsed(), unit.len(), written, key_frame);
            }
            Ok(Output::Encoded(_)) => {
                return Err(CliError::General(
                    "decoder returned an encoded unit".to_string(),
                ))
            }
            Err(err) if err.is_recoverable() => {
                log::warn!("Access unit {} skipped: {}", index, err);
                metrics.record_failure();
                consecutive_failures += 1;
                if consecutive_failures >= args.max_failures.max(1) {
                    return Err(CliError::Processing(format!(
                        "{} consecutive access units failed, last: {}",
                        consecutive_failures, err
                    )));
                }
            }
            Err(err) => return Err(err.into()),
        }
    }

    writer
        .flush()
        .map_err(|e| CliError::Io(format!("Failed to write output: {}", e)))?;
    session.close();

    if metrics.units_processed() == 0 && metrics.units_failed() > 0 {
        return Err(CliError::Processing(
            "no access unit could be decoded".to_string(),
        ));
    }

    if global.json {
        metrics
            .print_json()
            .map_err(|e| CliError::General(format!("Failed to serialize JSON: {}", e)))?;
    } else if !global.quiet {
        metrics.print_text();
    }

    Ok(())
}
