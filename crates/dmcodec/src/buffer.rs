// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

//! Contiguous buffer regions for hardware input and output.
//!
//! Regions come from the runtime's contiguous allocator and are owned by
//! exactly one session. A region is returned to the allocator when it is
//! released or dropped; since [`BufferRegion::release`] consumes the region,
//! releasing twice cannot be expressed.
//!
//! Output planes are never allocated independently. The hardware expects
//! the planes of a picture to be concatenated in one contiguous block, so
//! [`BufferPool::allocate_planes`] makes a single allocation sized to the sum
//! of the reported plane sizes and carves the planes out of it as offset
//! slices.

use std::{fmt, ops::Range, slice};

use log::{debug, error};

use crate::{
    engine::AllocatorRef,
    hw::{BufferDescriptor, BufferDescriptorSet, ContiguousBlock},
    Error,
};

/// Alignment applied to every region unless the caller asks for more.
pub const DEFAULT_ALIGNMENT: usize = 32;

/// Upper bound on the number of output planes the hardware may report.
pub const MAX_OUTPUT_PLANES: usize = 4;

/// Allocates contiguous regions while holding the runtime allocator alive.
#[derive(Debug, Clone)]
pub struct BufferPool {
    allocator: AllocatorRef,
}

impl BufferPool {
    pub fn new(allocator: AllocatorRef) -> Self {
        BufferPool { allocator }
    }

    /// Allocate one contiguous region of `size` bytes aligned to
    /// `alignment`, which must be a power of two.
    pub fn allocate(&self, size: usize, alignment: usize) -> Result<BufferRegion, Error> {
        if size == 0 {
            return Err(Error::InvalidConfiguration(
                "cannot allocate an empty buffer region".to_string(),
            ));
        }
        if !alignment.is_power_of_two() {
            return Err(Error::InvalidConfiguration(format!(
                "buffer alignment {} is not a power of two",
                alignment
            )));
        }

        let engine = self.allocator.platform().engine();
        let block = engine.alloc_contiguous(size, alignment).ok_or_else(|| {
            error!("{}: contiguous allocation of {} bytes failed", engine.name(), size);
            Error::OutOfMemory { size }
        })?;

        if block.addr % alignment != 0 || block.size < size {
            error!(
                "{}: allocator returned unusable block {:#x}+{} for {} bytes aligned {}",
                engine.name(),
                block.addr,
                block.size,
                size,
                alignment
            );
            engine.free_contiguous(block);
            return Err(Error::OutOfMemory { size });
        }

        debug!(
            "allocated {} bytes at {:#x} (phys {:#x})",
            block.size, block.addr, block.phys
        );

        Ok(BufferRegion {
            block,
            used: 0,
            allocator: self.allocator.clone(),
        })
    }

    /// Allocate one backing region for all output planes and carve it into
    /// consecutive plane slices.
    pub fn allocate_planes(&self, sizes: &[usize]) -> Result<PlaneSet, Error> {
        if sizes.is_empty() || sizes.len() > MAX_OUTPUT_PLANES {
            return Err(Error::InvalidConfiguration(format!(
                "hardware reported {} output planes (expected 1 to {})",
                sizes.len(),
                MAX_OUTPUT_PLANES
            )));
        }
        if sizes.contains(&0) {
            return Err(Error::InvalidConfiguration(
                "hardware reported an empty output plane".to_string(),
            ));
        }

        let mut planes = Vec::with_capacity(sizes.len());
        let mut offset = 0usize;
        for &size in sizes {
            let end = offset.checked_add(size).ok_or_else(|| {
                Error::InvalidConfiguration("output plane sizes overflow".to_string())
            })?;
            planes.push(offset..end);
            offset = end;
        }

        let backing = self.allocate(offset, DEFAULT_ALIGNMENT)?;
        Ok(PlaneSet { backing, planes })
    }

    /// Return a region to the allocator.
    pub fn release(&self, region: BufferRegion) {
        region.release();
    }
}

/// A contiguous, aligned region owned by one session.
pub struct BufferRegion {
    block: ContiguousBlock,
    used: usize,
    allocator: AllocatorRef,
}

impl BufferRegion {
    pub fn capacity(&self) -> usize {
        self.block.size
    }

    /// Bytes written by the last fill.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn addr(&self) -> usize {
        self.block.addr
    }

    pub fn phys(&self) -> u64 {
        self.block.phys
    }

    /// Returns `true` when `[addr, addr + len)` lies inside the region.
    pub fn contains(&self, addr: usize, len: usize) -> bool {
        addr >= self.block.addr
            && addr
                .checked_add(len)
                .map_or(false, |end| end <= self.block.addr + self.block.size)
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the block is a live allocation of `size` bytes owned by
        // this region until drop.
        unsafe { slice::from_raw_parts(self.block.addr as *const u8, self.block.size) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusivity.
        unsafe { slice::from_raw_parts_mut(self.block.addr as *mut u8, self.block.size) }
    }

    /// Copy `data` to the start of the region.
    ///
    /// The length is checked against the capacity before anything is
    /// written; an oversized input leaves the region untouched.
    pub fn fill(&mut self, data: &[u8]) -> Result<usize, Error> {
        let capacity = self.capacity();
        if data.len() > capacity {
            return Err(Error::InputTooLarge {
                len: data.len(),
                capacity,
            });
        }
        self.as_mut_slice()[..data.len()].copy_from_slice(data);
        self.used = data.len();
        Ok(data.len())
    }

    /// Read-only view of the bytes written by the last fill.
    pub fn filled(&self) -> &[u8] {
        &self.as_slice()[..self.used]
    }

    /// Return the region to the allocator.
    pub fn release(self) {
        drop(self);
    }
}

impl fmt::Debug for BufferRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferRegion")
            .field("addr", &format_args!("{:#x}", self.block.addr))
            .field("phys", &format_args!("{:#x}", self.block.phys))
            .field("capacity", &self.block.size)
            .field("used", &self.used)
            .finish()
    }
}

impl Drop for BufferRegion {
    fn drop(&mut self) {
        debug!(
            "releasing {} bytes at {:#x}",
            self.block.size, self.block.addr
        );
        self.allocator
            .platform()
            .engine()
            .free_contiguous(self.block);
    }
}

/// Output planes carved from one contiguous backing region.
#[derive(Debug)]
pub struct PlaneSet {
    backing: BufferRegion,
    planes: Vec<Range<usize>>,
}

impl PlaneSet {
    pub fn backing(&self) -> &BufferRegion {
        &self.backing
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn plane_sizes(&self) -> Vec<usize> {
        self.planes.iter().map(|range| range.len()).collect()
    }

    /// Byte offset of each plane inside the backing region.
    pub fn plane_offsets(&self) -> Vec<usize> {
        self.planes.iter().map(|range| range.start).collect()
    }

    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        let range = self.planes.get(index)?.clone();
        Some(&self.backing.as_slice()[range])
    }

    /// Output descriptors covering every plane, in order.
    pub fn descriptors(&mut self) -> BufferDescriptorSet<'_> {
        let mut set = BufferDescriptorSet::new();
        let mut rest = self.backing.as_mut_slice();
        let mut consumed = 0;
        for range in &self.planes {
            let (_, tail) = std::mem::take(&mut rest).split_at_mut(range.start - consumed);
            let (plane, tail) = tail.split_at_mut(range.len());
            set.push(BufferDescriptor::output(plane));
            rest = tail;
            consumed = range.end;
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::Platform, mock::FailPoint, mock::MockEngine};
    use std::sync::Arc;

    fn pool() -> (Arc<MockEngine>, Arc<Platform>, BufferPool) {
        let mock = Arc::new(MockEngine::new());
        let platform = Platform::new(mock.clone());
        let pool = BufferPool::new(platform.acquire_allocator().unwrap());
        (mock, platform, pool)
    }

    #[test]
    fn test_regions_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<BufferRegion>();
        assert_send::<PlaneSet>();
    }

    #[test]
    fn test_allocate_aligned() {
        let (mock, _platform, pool) = pool();
        let region = pool.allocate(1000, DEFAULT_ALIGNMENT).unwrap();
        assert_eq!(region.capacity(), 1000);
        assert_eq!(region.addr() % DEFAULT_ALIGNMENT, 0);
        assert_eq!(region.used(), 0);
        assert_eq!(mock.counts().live_allocations, 1);
        pool.release(region);
        assert_eq!(mock.counts().live_allocations, 0);
    }

    #[test]
    fn test_allocate_rejects_bad_requests() {
        let (_mock, _platform, pool) = pool();
        assert!(matches!(
            pool.allocate(0, 32),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            pool.allocate(64, 24),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_allocation_failure_is_out_of_memory() {
        let (mock, _platform, pool) = pool();
        mock.fail_next(FailPoint::Alloc);
        assert!(matches!(
            pool.allocate(4096, 32),
            Err(Error::OutOfMemory { size: 4096 })
        ));
        assert_eq!(mock.counts().live_allocations, 0);
    }

    #[test]
    fn test_fill_checks_capacity_before_copy() {
        let (_mock, _platform, pool) = pool();
        let mut region = pool.allocate(8, 32).unwrap();
        region.fill(&[7u8; 8]).unwrap();
        assert_eq!(region.filled(), &[7u8; 8]);

        let err = region.fill(&[1u8; 9]).unwrap_err();
        assert!(matches!(
            err,
            Error::InputTooLarge {
                len: 9,
                capacity: 8
            }
        ));
        // Nothing was written by the rejected fill.
        assert_eq!(region.filled(), &[7u8; 8]);
    }

    #[test]
    fn test_planes_share_one_backing_region() {
        let (mock, _platform, pool) = pool();
        let mut planes = pool.allocate_planes(&[720 * 576, 720 * 576 / 2]).unwrap();
        assert_eq!(mock.counts().live_allocations, 1);
        assert_eq!(planes.len(), 2);
        assert_eq!(planes.backing().capacity(), 720 * 576 * 3 / 2);
        assert_eq!(planes.plane_offsets(), vec![0, 720 * 576]);

        let base = planes.backing().addr();
        let set = planes.descriptors();
        assert_eq!(set.len(), 2);
        assert_eq!(set.descriptors()[0].addr(), base);
        assert_eq!(set.descriptors()[1].addr(), base + 720 * 576);
        assert_eq!(set.descriptors()[1].len(), 720 * 576 / 2);
    }

    #[test]
    fn test_plane_count_is_bounded() {
        let (_mock, _platform, pool) = pool();
        assert!(pool.allocate_planes(&[]).is_err());
        assert!(pool.allocate_planes(&[16; 5]).is_err());
        assert!(pool.allocate_planes(&[16, 0]).is_err());
        assert!(pool.allocate_planes(&[16; 4]).is_ok());
    }

    #[test]
    fn test_region_contains() {
        let (_mock, _platform, pool) = pool();
        let region = pool.allocate(64, 32).unwrap();
        let base = region.addr();
        assert!(region.contains(base, 64));
        assert!(region.contains(base + 60, 4));
        assert!(!region.contains(base + 60, 5));
        assert!(!region.contains(base - 1, 1));
        assert!(!region.contains(usize::MAX, 2));
    }

    #[test]
    fn test_regions_keep_allocator_alive() {
        let (mock, _platform, pool) = pool();
        let region = pool.allocate(128, 32).unwrap();
        drop(pool);
        assert_eq!(mock.counts().runtime_refs, 1);
        drop(region);
        assert_eq!(mock.counts().runtime_refs, 0);
    }
}
