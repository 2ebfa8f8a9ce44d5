// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

use crate::config::FileConfig;
use crate::error::CliError;
use crate::metrics::MetricsCollector;
use crate::{utils, Global};
use clap::{Args as ClapArgs, ValueEnum};
use dmcodec::engine::Platform;
use dmcodec::frame::{Frame, Packet};
use dmcodec::hw::CodecFamily;
use dmcodec::params::SessionConfig;
use dmcodec::session::{EncodedUnit, H264Encoder, JpegEncoder};
use dmcodec::transcode::align16;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Raw NV12 input file (luma plane followed by interleaved chroma)
    input: PathBuf,

    /// Output file (.h264 Annex-B stream, or .mjpeg for JPEG)
    output: PathBuf,

    /// Output codec
    #[arg(long, value_enum, default_value_t = Codec::H264)]
    codec: Codec,

    /// Resolution in WxH format
    #[arg(short, long)]
    resolution: Option<String>,

    /// Bytes per input row (defaults to the width)
    #[arg(long)]
    stride: Option<u32>,

    /// Frame rate as N or N/D
    #[arg(short = 'F', long)]
    fps: Option<String>,

    /// Target bitrate in kbps (accepts kbps/Mbps suffix)
    #[arg(short, long)]
    bitrate: Option<String>,

    /// Intra frame interval in frames
    #[arg(short, long)]
    gop: Option<u32>,

    /// QP bounds as MIN:MAX
    #[arg(long)]
    qp: Option<String>,

    /// Sample aspect ratio as W:H
    #[arg(long)]
    aspect_ratio: Option<String>,

    /// Rate control: low-delay|storage|none
    #[arg(long)]
    rate_control: Option<String>,

    /// JPEG quality (1-100)
    #[arg(long)]
    quality: Option<u8>,

    /// Algorithm name registered with the engine
    #[arg(long)]
    codec_name: Option<String>,

    /// Number of frames (0=all)
    #[arg(short, long, default_value = "0")]
    frames: u64,

    /// Consecutive failed frames tolerated before giving up
    #[arg(long, default_value = "8")]
    max_failures: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Codec {
    H264,
    Jpeg,
}

impl Args {
    fn settings(&self) -> FileConfig {
        FileConfig {
            resolution: self.resolution.clone(),
            stride: self.stride,
            fps: self.fps.clone(),
            bitrate: self.bitrate.clone(),
            gop: self.gop,
            qp: self.qp.clone(),
            aspect_ratio: self.aspect_ratio.clone(),
            rate_control: self.rate_control.clone(),
            quality: self.quality,
            codec_name: self.codec_name.clone(),
        }
    }
}

/// The two encode sessions behind one interface.
enum Encoder {
    H264(H264Encoder),
    Jpeg(JpegEncoder),
}

impl Encoder {
    fn open(platform: &Arc<Platform>, config: &SessionConfig) -> Result<Self, dmcodec::Error> {
        Ok(match config.family {
            CodecFamily::JpegEncode => Encoder::Jpeg(JpegEncoder::open(platform, config)?),
            _ => Encoder::H264(H264Encoder::open(platform, config)?),
        })
    }

    fn min_packet_size(&self) -> usize {
        match self {
            Encoder::H264(encoder) => encoder.min_packet_size(),
            Encoder::Jpeg(encoder) => encoder.min_packet_size(),
        }
    }

    fn encode(&mut self, frame: &Frame<'_>, packet: &mut Packet) -> Result<EncodedUnit, dmcodec::Error> {
        match self {
            Encoder::H264(encoder) => encoder.encode(frame, packet),
            Encoder::Jpeg(encoder) => encoder.encode(frame, packet),
        }
    }
}

/// Macroblock-padded copy of frames whose geometry is not a multiple of 16.
///
/// The hardware reads every padded row, so visible rows are copied into
/// planes of `pitch * align16(height)` and the last row is repeated below
/// them.
struct PaddedPlanes {
    pitch: usize,
    luma: Vec<u8>,
    chroma: Vec<u8>,
}

impl PaddedPlanes {
    /// `None` when frames of this geometry can be encoded in place.
    fn for_geometry(width: u32, height: u32, stride: usize) -> Option<Self> {
        let pitch = stride.max(align16(width) as usize);
        let rows = align16(height) as usize;
        if pitch == stride && rows == height as usize {
            return None;
        }
        log::debug!(
            "Padding {}x{} stride {} frames to pitch {} and {} rows",
            width,
            height,
            stride,
            pitch,
            rows
        );
        Some(PaddedPlanes {
            pitch,
            luma: vec![0u8; pitch * rows],
            chroma: vec![0x80u8; pitch * rows / 2],
        })
    }

    fn fill(&mut self, frame: &Frame<'_>) {
        let (width, height) = (frame.width() as usize, frame.height() as usize);
        for (index, dst) in [&mut self.luma, &mut self.chroma].into_iter().enumerate() {
            let Some(plane) = frame.plane(index) else {
                continue;
            };
            let rows = if index == 0 { height } else { height / 2 };
            let last_row = rows.saturating_sub(1);
            for (row, dst_row) in dst.chunks_mut(self.pitch).enumerate() {
                let start = row.min(last_row) * plane.stride();
                if let Some(src) = plane.data().get(start..start + width) {
                    dst_row[..width].copy_from_slice(src);
                }
            }
        }
    }

    fn frame(&self, width: u32, height: u32) -> Frame<'_> {
        Frame::nv12(width, height, self.pitch, &self.luma, &self.chroma)
    }
}

/// Fill `buf` with the next frame. Returns `false` at end of input.
fn read_frame(reader: &mut impl Read, buf: &mut [u8]) -> Result<bool, CliError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(CliError::Io(format!("Failed to read input: {}", e))),
        }
    }
    if filled > 0 && filled < buf.len() {
        log::warn!("Ignoring trailing {} bytes (partial frame)", filled);
    }
    Ok(filled == buf.len())
}

pub fn execute(args: Args, global: &Global) -> Result<(), CliError> {
    log::debug!("Encode parameters: {:?}", args);

    let settings = args
        .settings()
        .or(FileConfig::load(global.config.as_deref())?);
    let (width, height) = settings.dimensions()?;
    let stride = settings.stride.unwrap_or(width);
    if stride < width {
        return Err(CliError::InvalidArgs(format!(
            "Stride {} is smaller than the width {}",
            stride, width
        )));
    }

    let family = match args.codec {
        Codec::H264 => CodecFamily::H264Encode,
        Codec::Jpeg => CodecFamily::JpegEncode,
    };
    let config = settings.apply(SessionConfig::new(family, width, height))?;

    let platform = utils::open_platform(global.backend)?;
    log::info!("Opening {} session {}x{}", family, width, height);
    let mut encoder = Encoder::open(&platform, &config)?;

    let input = File::open(&args.input)
        .map_err(|e| CliError::Io(format!("{}: {}", args.input.display(), e)))?;
    let mut reader = BufReader::new(input);
    let output = File::create(&args.output)
        .map_err(|e| CliError::Io(format!("{}: {}", args.output.display(), e)))?;
    let mut writer = BufWriter::new(output);

    let term = utils::install_signal_handler()?;

    let luma = stride as usize * height as usize;
    let mut buf = vec![0u8; luma + luma / 2];
    let mut padded = PaddedPlanes::for_geometry(width, height, stride as usize);
    let mut packet = Packet::with_capacity(encoder.min_packet_size());
    let mut metrics = MetricsCollector::new(family.to_string());
    let max_frames = if args.frames == 0 {
        u64::MAX
    } else {
        args.frames
    };
    let mut frame_count = 0u64;
    let mut consecutive_failures = 0u64;

    while frame_count < max_frames {
        if term.load(Ordering::Relaxed) {
            log::info!("Interrupted, finishing up");
            break;
        }
        if !read_frame(&mut reader, &mut buf)? {
            break;
        }
        frame_count += 1;

        let mut frame = Frame::nv12_contiguous(width, height, stride as usize, &buf).ok_or_else(|| {
            CliError::InvalidArgs(format!("Frame buffer does not hold {}x{} NV12", width, height))
        })?;
        if let Some(padded) = padded.as_mut() {
            padded.fill(&frame);
            frame = padded.frame(width, height);
        }

        let started = Instant::now();
        match encoder.encode(&frame, &mut packet) {
            Ok(unit) => {
                consecutive_failures = 0;
                writer
                    .write_all(packet.data())
                    .map_err(|e| CliError::Io(format!("Failed to write output: {}", e)))?;
                metrics.record_unit(started.elapsed(), buf.len(), unit.bytes, unit.key_frame);
                if unit.reconfigured {
                    metrics.record_reconfiguration();
                }
                log::debug!(
                    "Frame {}: {} bytes ({:?})",
                    frame_count,
                    unit.bytes,
                    unit.classification
                );
            }
            Err(err) if err.is_recoverable() => {
                log::warn!("Frame {} skipped: {}", frame_count, err);
                metrics.record_failure();
                consecutive_failures += 1;
                if consecutive_failures >= args.max_failures.max(1) {
                    return Err(CliError::Processing(format!(
                        "{} consecutive frames failed, last: {}",
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
    log::info!(
        "Encoded {} frames to {}",
        metrics.units_processed(),
        args.output.display()
    );

    if global.json {
        metrics
            .print_json()
            .map_err(|e| CliError::General(format!("Failed to serialize JSON: {}", e)))?;
    } else if !global.quiet {
        metrics.print_text();
    }

    Ok(())
}
