//! Region allocation mirroring native ownership lifetimes.
//!
//! Two disciplines, per the resource model:
//! - [`Region`]: one owned, zero-initialized buffer sized for a single
//!   [`StructLayout`], living as long as the managed object that holds it.
//! - [`Scope`]: a bump allocator for call-scoped temporaries (definition
//!   staging, bulk-query output arrays). Allocations borrow the scope, so
//!   nothing handed out can survive the call that created it; the backing
//!   storage is reclaimed deterministically when the scope drops or resets.

use std::cell::UnsafeCell;

use crate::layout::StructLayout;

/// Alignment every allocation is rounded to. Covers the largest alignment in
/// the ABI (8-byte pointers/u64) with headroom.
const REGION_ALIGN: usize = 16;

/// An owned, zeroed byte region for one native struct.
pub struct Region {
    buf: Box<[u8]>,
    layout: &'static StructLayout,
}

impl Region {
    pub fn for_layout(layout: &'static StructLayout) -> Self {
        // Box<[u8]> has no alignment guarantee beyond 1, but every access
        // goes through unaligned reads in `layout::Field`, so only the size
        // matters here.
        Region {
            buf: vec![0u8; layout.size].into_boxed_slice(),
            layout,
        }
    }

    pub fn layout(&self) -> &'static StructLayout {
        self.layout
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

/// Bump allocator for call-scoped temporaries.
///
/// Single-threaded by design (the managed layer is single-threaded per
/// world); `alloc` takes `&self` so several temporaries can be live at once,
/// which is why the chunk list lives in an `UnsafeCell`.
pub struct Scope {
    chunks: UnsafeCell<Vec<Chunk>>,
    chunk_size: usize,
}

/// Backing storage is `u64` words so every chunk base is at least 8-aligned;
/// with offsets advancing in multiples of [`REGION_ALIGN`], every handed-out
/// slice start is aligned for any ABI type (max align 8).
///
/// The words sit in `UnsafeCell`s and every allocation is carved from the
/// raw `base` pointer, never from a fresh reference over the whole buffer,
/// so handing out a new slice leaves earlier live slices undisturbed.
struct Chunk {
    buf: Box<[UnsafeCell<u64>]>,
    base: *mut u8,
    used: usize,
}

impl Chunk {
    fn with_capacity(bytes: usize) -> Self {
        let buf: Box<[UnsafeCell<u64>]> = (0..bytes.div_ceil(8))
            .map(|_| UnsafeCell::new(0))
            .collect();
        let base = buf.as_ptr() as *mut u8;
        Chunk { buf, base, used: 0 }
    }

    fn capacity(&self) -> usize {
        self.buf.len() * 8
    }
}

impl Scope {
    const DEFAULT_CHUNK: usize = 4096;

    pub fn new() -> Self {
        Scope::with_chunk_size(Self::DEFAULT_CHUNK)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Scope {
            chunks: UnsafeCell::new(Vec::new()),
            chunk_size: chunk_size.max(REGION_ALIGN),
        }
    }

    /// Allocates `len` zeroed bytes, aligned to [`REGION_ALIGN`], valid until
    /// the scope is dropped or reset. The returned slice borrows the scope,
    /// so it cannot be retained past the call frame that owns the scope.
    pub fn alloc(&self, len: usize) -> &mut [u8] {
        // Safety: chunks are only pushed, never removed or reallocated in
        // place (each Chunk's buf is a stable Box allocation, so `base`
        // survives Vec growth), and handed-out slices never overlap because
        // `used` only advances.
        let chunks = unsafe { &mut *self.chunks.get() };

        let aligned = len.max(1).next_multiple_of(REGION_ALIGN);
        let need_new = match chunks.last() {
            Some(chunk) => chunk.used + aligned > chunk.capacity(),
            None => true,
        };
        if need_new {
            chunks.push(Chunk::with_capacity(self.chunk_size.max(aligned)));
        }

        let chunk = chunks.last_mut().unwrap();
        let start = chunk.used;
        chunk.used += aligned;
        unsafe {
            let ptr = chunk.base.add(start);
            // Chunks are reused across resets; scrub before handing out.
            std::ptr::write_bytes(ptr, 0, len);
            std::slice::from_raw_parts_mut(ptr, len)
        }
    }

    /// Allocates a zeroed region for one struct layout.
    pub fn alloc_layout(&self, layout: &StructLayout) -> &mut [u8] {
        self.alloc(layout.size)
    }

    /// Releases every allocation but keeps the backing chunks for reuse.
    /// Requires `&mut self`, so no outstanding borrows can survive it.
    pub fn reset(&mut self) {
        for chunk in self.chunks.get_mut() {
            chunk.used = 0;
        }
    }

    /// Bytes currently handed out (diagnostics).
    pub fn used(&self) -> usize {
        let chunks = unsafe { &*self.chunks.get() };
        chunks.iter().map(|c| c.used).sum()
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tables;

    #[test]
    fn region_is_zeroed_and_sized() {
        let region = Region::for_layout(&tables::BODY_DEF);
        assert_eq!(region.bytes().len(), tables::BODY_DEF.size);
        assert!(region.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn scope_allocations_do_not_overlap() {
        let scope = Scope::new();
        let a = scope.alloc(24);
        let b = scope.alloc(24);
        a.fill(0xAA);
        b.fill(0xBB);
        assert!(a.iter().all(|&x| x == 0xAA));
        assert!(b.iter().all(|&x| x == 0xBB));
    }

    #[test]
    fn scope_reset_reuses_storage() {
        let mut scope = Scope::with_chunk_size(256);
        for _ in 0..8 {
            let s = scope.alloc(100);
            s.fill(0xFF);
        }
        let grown = scope.used();
        scope.reset();
        assert_eq!(scope.used(), 0);
        let s = scope.alloc(100);
        assert!(s.iter().all(|&x| x == 0), "reset must hand out zeroed memory");
        assert!(scope.used() <= grown);
    }

    #[test]
    fn scope_allocations_are_aligned_for_abi_types() {
        let scope = Scope::new();
        for len in [1, 12, 24, 100] {
            let s = scope.alloc(len);
            assert_eq!(s.as_ptr() as usize % 8, 0);
        }
    }

    #[test]
    fn later_allocations_leave_earlier_live_slices_intact() {
        // Holds every slice live across further allocs, including one that
        // forces a new chunk; each must still read back its own fill.
        let scope = Scope::with_chunk_size(64);
        let a = scope.alloc(24);
        a.fill(0x11);
        let b = scope.alloc(24);
        b.fill(0x22);
        let c = scope.alloc(64);
        c.fill(0x33);
        let d = scope.alloc(8);
        d.fill(0x44);
        assert!(a.iter().all(|&x| x == 0x11));
        assert!(b.iter().all(|&x| x == 0x22));
        assert!(c.iter().all(|&x| x == 0x33));
        assert!(d.iter().all(|&x| x == 0x44));
    }

    #[test]
    fn oversized_allocation_gets_its_own_chunk() {
        let scope = Scope::with_chunk_size(64);
        let big = scope.alloc(1000);
        assert_eq!(big.len(), 1000);
    }
}
