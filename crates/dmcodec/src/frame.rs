// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

//! Host frame and packet types.
//!
//! These are the minimal media-container types the session layer reads and
//! writes. A [`Frame`] borrows its plane memory and never owns it: frames
//! handed to an encoder view caller memory, frames returned by a decoder view
//! the decoder's output region. A [`Packet`] owns a byte buffer plus the
//! number of valid bytes in it.

use std::{collections::BTreeMap, fmt};

use crate::params::PixelFormat;

/// Picture coding type attached to frames and packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PictureType {
    I,
    P,
    B,
}

impl fmt::Display for PictureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PictureType::I => "I",
            PictureType::P => "P",
            PictureType::B => "B",
        };
        write!(f, "{}", name)
    }
}

/// One plane of a picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plane<'a> {
    data: &'a [u8],
    stride: usize,
}

impl<'a> Plane<'a> {
    pub fn new(data: &'a [u8], stride: usize) -> Self {
        Plane { data, stride }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Line pitch in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }
}

/// A raw picture whose planes are borrowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    width: u32,
    height: u32,
    format: PixelFormat,
    planes: Vec<Plane<'a>>,
    key_frame: bool,
    picture_type: Option<PictureType>,
    metadata: BTreeMap<String, String>,
}

impl<'a> Frame<'a> {
    pub fn new(width: u32, height: u32, format: PixelFormat, planes: Vec<Plane<'a>>) -> Self {
        Frame {
            width,
            height,
            format,
            planes,
            key_frame: false,
            picture_type: None,
            metadata: BTreeMap::new(),
        }
    }

    /// A two-plane NV12 frame with a shared luma and chroma stride.
    pub fn nv12(width: u32, height: u32, stride: usize, luma: &'a [u8], chroma: &'a [u8]) -> Self {
        Frame::new(
            width,
            height,
            PixelFormat::Nv12,
            vec![Plane::new(luma, stride), Plane::new(chroma, stride)],
        )
    }

    /// Split one contiguous NV12 buffer (luma immediately followed by
    /// chroma) into a frame. Returns `None` if the buffer is too short.
    pub fn nv12_contiguous(width: u32, height: u32, stride: usize, data: &'a [u8]) -> Option<Self> {
        let luma_len = stride.checked_mul(height as usize)?;
        let total = luma_len.checked_add(luma_len / 2)?;
        if data.len() < total || stride < width as usize {
            return None;
        }
        let (luma, rest) = data.split_at(luma_len);
        Some(Frame::nv12(width, height, stride, luma, &rest[..luma_len / 2]))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn planes(&self) -> &[Plane<'a>] {
        &self.planes
    }

    pub fn plane(&self, index: usize) -> Option<&Plane<'a>> {
        self.planes.get(index)
    }

    /// Stride of a plane, in bytes.
    pub fn stride(&self, index: usize) -> Option<usize> {
        self.planes.get(index).map(Plane::stride)
    }

    pub fn key_frame(&self) -> bool {
        self.key_frame
    }

    pub fn set_key_frame(&mut self, key_frame: bool) {
        self.key_frame = key_frame;
    }

    pub fn picture_type(&self) -> Option<PictureType> {
        self.picture_type
    }

    pub fn set_picture_type(&mut self, picture_type: Option<PictureType>) {
        self.picture_type = picture_type;
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Visible bytes per row and visible rows of a plane.
    fn visible_extent(&self, index: usize) -> (usize, usize) {
        let width = self.width as usize;
        let height = self.height as usize;
        match (self.format, index) {
            (PixelFormat::Nv12, 0) | (PixelFormat::I420, 0) => (width, height),
            (PixelFormat::Nv12, _) => (width, height / 2),
            (PixelFormat::I420, _) => (width / 2, height / 2),
            (PixelFormat::Yuyv, _) => (width * 2, height),
        }
    }

    /// Copy the visible part of every plane into one tightly packed buffer.
    ///
    /// Rows missing from a short plane are skipped rather than padded.
    pub fn to_packed(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (index, plane) in self.planes.iter().enumerate() {
            let (row_bytes, rows) = self.visible_extent(index);
            for row in 0..rows {
                let start = row * plane.stride;
                let end = start + row_bytes;
                match plane.data.get(start..end) {
                    Some(bytes) => out.extend_from_slice(bytes),
                    None => break,
                }
            }
        }
        out
    }
}

/// A compressed unit together with the buffer it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Packet {
    buffer: Vec<u8>,
    size: usize,
    key_frame: bool,
    picture_type: Option<PictureType>,
}

impl Packet {
    /// A packet whose buffer can hold `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Packet {
            buffer: vec![0; capacity],
            size: 0,
            key_frame: false,
            picture_type: None,
        }
    }

    /// A packet holding `data` in full.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let size = data.len();
        Packet {
            buffer: data,
            size,
            key_frame: false,
            picture_type: None,
        }
    }

    /// The valid bytes.
    pub fn data(&self) -> &[u8] {
        &self.buffer[..self.size]
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// The whole buffer, for a producer to write into.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Mark the first `size` bytes valid, clamped to the capacity.
    pub fn set_size(&mut self, size: usize) {
        self.size = size.min(self.buffer.len());
    }

    /// Grow the buffer to at least `capacity` bytes, keeping its content.
    pub fn reserve(&mut self, capacity: usize) {
        if self.buffer.len() < capacity {
            self.buffer.resize(capacity, 0);
        }
    }

    pub fn key_frame(&self) -> bool {
        self.key_frame
    }

    pub fn set_key_frame(&mut self, key_frame: bool) {
        self.key_frame = key_frame;
    }

    pub fn picture_type(&self) -> Option<PictureType> {
        self.picture_type
    }

    pub fn set_picture_type(&mut self, picture_type: Option<PictureType>) {
        self.picture_type = picture_type;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nv12_frame() {
        let luma = vec![16u8; 64 * 32];
        let chroma = vec![128u8; 64 * 16];
        let mut frame = Frame::nv12(64, 32, 64, &luma, &chroma);
        assert_eq!(frame.format(), PixelFormat::Nv12);
        assert_eq!(frame.planes().len(), 2);
        assert_eq!(frame.stride(1), Some(64));
        assert!(!frame.key_frame());

        frame.set_key_frame(true);
        frame.set_picture_type(Some(PictureType::I));
        frame.set_metadata("source", "test");
        assert!(frame.key_frame());
        assert_eq!(frame.picture_type(), Some(PictureType::I));
        assert_eq!(frame.metadata().get("source").map(String::as_str), Some("test"));
    }

    #[test]
    fn test_nv12_contiguous_split() {
        let data: Vec<u8> = (0..(16 * 8 * 3 / 2)).map(|i| i as u8).collect();
        let frame = Frame::nv12_contiguous(16, 8, 16, &data).unwrap();
        assert_eq!(frame.plane(0).unwrap().len(), 128);
        assert_eq!(frame.plane(1).unwrap().len(), 64);
        assert_eq!(frame.plane(1).unwrap().data()[0], 128);
        assert!(Frame::nv12_contiguous(16, 8, 16, &data[..100]).is_none());
    }

    #[test]
    fn test_packed_copy_drops_stride_padding() {
        // 4x2 picture stored with a stride of 8.
        let luma: Vec<u8> = (0..16).collect();
        let chroma: Vec<u8> = (100..108).collect();
        let frame = Frame::nv12(4, 2, 8, &luma, &chroma);
        assert_eq!(frame.to_packed(), vec![0, 1, 2, 3, 8, 9, 10, 11, 100, 101, 102, 103]);
    }

    #[test]
    fn test_packet_sizes() {
        let mut packet = Packet::with_capacity(16);
        assert_eq!(packet.capacity(), 16);
        assert!(packet.data().is_empty());
        packet.buffer_mut()[..3].copy_from_slice(&[0, 0, 1]);
        packet.set_size(3);
        assert_eq!(packet.data(), &[0, 0, 1]);
        packet.set_size(100);
        assert_eq!(packet.size(), 16);

        packet.reserve(32);
        assert_eq!(packet.capacity(), 32);
        assert_eq!(&packet.data()[..3], &[0, 0, 1]);

        let packet = Packet::from_vec(vec![1, 2, 3]);
        assert_eq!(packet.size(), 3);
    }
}
