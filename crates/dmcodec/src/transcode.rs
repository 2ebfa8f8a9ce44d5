// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

//! Mapping between host frames and hardware buffer descriptors.
//!
//! Encoding is zero-copy: descriptors point straight into the caller's
//! planes. Decoding copies each compressed unit once into the session's
//! contiguous input region, checking the length against the region capacity
//! before the copy. Decoded pictures are returned as frames whose planes
//! view the session's output region.

use dmcodec_sys as ffi;
use log::{trace, warn};

use crate::{
    buffer::{BufferRegion, PlaneSet},
    frame::{Frame, Packet, PictureType, Plane},
    hw::{
        BufferDescriptor, BufferDescriptorSet, ExtendedError, FrameGeometry, PictureReport,
        STATUS_FAIL,
    },
    params::PixelFormat,
    Error,
};

/// Classification of a coded picture, as far as key-frame signalling needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameClassification {
    /// Instantaneous decoder refresh.
    Idr,
    /// Intra picture that is not an IDR.
    I,
    /// Predicted picture.
    P,
    Unknown,
}

impl FrameClassification {
    /// Classify a raw hardware frame type.
    pub fn from_hw(frame_type: i32) -> Self {
        match frame_type {
            ffi::IVIDEO_IDR_FRAME | ffi::IVIDEO_MBAFF_IDR_FRAME => FrameClassification::Idr,
            ffi::IVIDEO_I_FRAME | ffi::IVIDEO_II_FRAME => FrameClassification::I,
            ffi::IVIDEO_P_FRAME
            | ffi::IVIDEO_PP_FRAME
            | ffi::IVIDEO_IP_FRAME
            | ffi::IVIDEO_PI_FRAME => FrameClassification::P,
            _ => FrameClassification::Unknown,
        }
    }

    pub fn is_key_frame(&self) -> bool {
        matches!(self, FrameClassification::Idr | FrameClassification::I)
    }

    pub fn picture_type(&self) -> Option<PictureType> {
        match self {
            FrameClassification::Idr | FrameClassification::I => Some(PictureType::I),
            FrameClassification::P => Some(PictureType::P),
            FrameClassification::Unknown => None,
        }
    }
}

/// Round up to the next multiple of 16 (one macroblock).
pub fn align16(value: u32) -> u32 {
    (value + 15) / 16 * 16
}

/// Build zero-copy input descriptors over an NV12 frame.
///
/// The frame must match the session geometry and carry two planes with a
/// shared stride. The reported frame geometry is padded to a macroblock
/// multiple and the hardware reads every padded row, so the stride must
/// cover the padded width and the descriptors span `stride * align16(height)`
/// luma bytes and half as many chroma bytes. Caller-visible dimensions are
/// left untouched.
pub fn encode_descriptors<'f>(
    frame: &Frame<'f>,
    width: u32,
    height: u32,
) -> Result<BufferDescriptorSet<'f>, Error> {
    if frame.format() != PixelFormat::Nv12 {
        return Err(Error::InvalidPixelFormat {
            requested: frame.format(),
            expected: PixelFormat::Nv12,
        });
    }
    if frame.width() != width || frame.height() != height {
        return Err(Error::InvalidConfiguration(format!(
            "frame is {}x{} but the session encodes {}x{}",
            frame.width(),
            frame.height(),
            width,
            height
        )));
    }
    let (luma, chroma) = match frame.planes() {
        [luma, chroma] => (luma, chroma),
        planes => {
            return Err(Error::InvalidConfiguration(format!(
                "NV12 frame has {} planes, expected {}",
                planes.len(),
                PixelFormat::Nv12.plane_count()
            )))
        }
    };
    if luma.stride() != chroma.stride() {
        return Err(Error::InvalidConfiguration(format!(
            "luma stride {} differs from chroma stride {}",
            luma.stride(),
            chroma.stride()
        )));
    }
    let (padded_width, padded_height) = (align16(width), align16(height));
    let stride = luma.stride();
    if stride < padded_width as usize || stride > u32::MAX as usize {
        return Err(Error::InvalidConfiguration(format!(
            "stride {} is invalid for width {} (padded to {})",
            stride, width, padded_width
        )));
    }

    let luma_len = stride * padded_height as usize;
    let chroma_len = luma_len / 2;
    let luma_data = plane_prefix(luma, luma_len, "luma")?;
    let chroma_data = plane_prefix(chroma, chroma_len, "chroma")?;

    let geometry = FrameGeometry {
        width: padded_width,
        height: padded_height,
        pitch: stride as u32,
    };
    if geometry.width != width || geometry.height != height {
        trace!(
            "padding encode geometry {}x{} to {}x{}",
            width,
            height,
            geometry.width,
            geometry.height
        );
    }

    let mut set = BufferDescriptorSet::new().with_geometry(geometry);
    set.push(BufferDescriptor::input(luma_data));
    set.push(BufferDescriptor::input(chroma_data));
    Ok(set)
}

fn plane_prefix<'f>(plane: &Plane<'f>, len: usize, name: &str) -> Result<&'f [u8], Error> {
    plane.data().get(..len).ok_or_else(|| {
        Error::InvalidConfiguration(format!(
            "{} plane holds {} bytes, expected at least {}",
            name,
            plane.len(),
            len
        ))
    })
}

/// Copy one compressed unit into the session's input region.
///
/// The length is checked against the region capacity before any byte is
/// written.
pub fn stage_access_unit(region: &mut BufferRegion, data: &[u8]) -> Result<usize, Error> {
    if data.is_empty() {
        return Err(Error::ProcessingFailed {
            status: STATUS_FAIL,
            extended: ExtendedError::with_bit(ffi::XDM_INSUFFICIENTDATA),
        });
    }
    region.fill(data).map_err(|err| {
        warn!("{}", err);
        err
    })
}

/// Build the host frame for a decoded picture.
///
/// Every plane the hardware reports must lie inside the output backing
/// region; anything else is rejected before a slice is formed.
pub fn decoded_frame<'p>(
    output: &'p PlaneSet,
    picture: &PictureReport,
    classification: FrameClassification,
) -> Result<Frame<'p>, Error> {
    let backing = output.backing();
    if picture.planes.len() != 2 {
        return Err(Error::InvalidOutput(format!(
            "decoded picture has {} planes, expected 2",
            picture.planes.len()
        )));
    }

    let mut planes = Vec::with_capacity(picture.planes.len());
    for &(addr, len) in &picture.planes {
        if !backing.contains(addr, len) {
            return Err(Error::InvalidOutput(format!(
                "plane {:#x}+{} lies outside the output region {:#x}+{}",
                addr,
                len,
                backing.addr(),
                backing.capacity()
            )));
        }
        let offset = addr - backing.addr();
        planes.push(Plane::new(
            &backing.as_slice()[offset..offset + len],
            picture.pitch as usize,
        ));
    }

    let mut frame = Frame::new(picture.width, picture.height, PixelFormat::Nv12, planes);
    frame.set_key_frame(classification.is_key_frame());
    frame.set_picture_type(classification.picture_type());
    frame.set_metadata("hw.frame_type", picture.frame_type.to_string());
    Ok(frame)
}

/// Record an encoded unit in the destination packet.
pub fn finish_packet(
    packet: &mut Packet,
    bytes_generated: usize,
    classification: FrameClassification,
) -> Result<usize, Error> {
    if bytes_generated > packet.capacity() {
        return Err(Error::InvalidOutput(format!(
            "hardware generated {} bytes into a {} byte packet",
            bytes_generated,
            packet.capacity()
        )));
    }
    packet.set_size(bytes_generated);
    packet.set_key_frame(classification.is_key_frame());
    packet.set_picture_type(classification.picture_type());
    Ok(bytes_generated)
}
