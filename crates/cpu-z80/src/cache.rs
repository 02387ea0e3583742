//! Per-line memory cache.
//!
//! Each 256-byte line of the address space may hold a handle into the bus's
//! memory arena, separately for reads and writes. A line the bus refused is
//! remembered as "tried" so later misses go straight to the slow path.

use emu_core::{CACHE_LINE_SIZE, CACHE_LINES, LineHandle};

#[derive(Debug, Clone)]
pub struct MemCache {
    read: [Option<LineHandle>; CACHE_LINES],
    write: [Option<LineHandle>; CACHE_LINES],
    read_tried: [bool; CACHE_LINES],
    write_tried: [bool; CACHE_LINES],
}

impl Default for MemCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Line number for `address`.
#[must_use]
pub const fn line_of(address: u16) -> usize {
    address as usize / CACHE_LINE_SIZE
}

impl MemCache {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            read: [None; CACHE_LINES],
            write: [None; CACHE_LINES],
            read_tried: [false; CACHE_LINES],
            write_tried: [false; CACHE_LINES],
        }
    }

    #[inline]
    #[must_use]
    pub fn read_line(&self, address: u16) -> Option<LineHandle> {
        self.read[line_of(address)]
    }

    #[inline]
    #[must_use]
    pub fn write_line(&self, address: u16) -> Option<LineHandle> {
        self.write[line_of(address)]
    }

    #[must_use]
    pub fn read_tried(&self, address: u16) -> bool {
        self.read_tried[line_of(address)]
    }

    #[must_use]
    pub fn write_tried(&self, address: u16) -> bool {
        self.write_tried[line_of(address)]
    }

    /// Store the bus's answer for the read line containing `address`.
    pub fn fill_read(&mut self, address: u16, handle: Option<LineHandle>) {
        let line = line_of(address);
        self.read[line] = handle;
        self.read_tried[line] = handle.is_none();
    }

    /// Store the bus's answer for the write line containing `address`.
    pub fn fill_write(&mut self, address: u16, handle: Option<LineHandle>) {
        let line = line_of(address);
        self.write[line] = handle;
        self.write_tried[line] = handle.is_none();
    }

    /// Forget every line intersecting `[start, start + size)`.
    ///
    /// Returns the number of lines cleared. Ranges running past the top of
    /// memory are clipped.
    pub fn invalidate(&mut self, start: u16, size: u32) -> usize {
        if size == 0 {
            return 0;
        }
        let first = line_of(start);
        let end = (u32::from(start) + size).min(0x1_0000);
        let last = (end as usize - 1) / CACHE_LINE_SIZE;
        for line in first..=last {
            self.read[line] = None;
            self.write[line] = None;
            self.read_tried[line] = false;
            self.write_tried[line] = false;
        }
        last - first + 1
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Lines currently holding a read or write handle.
    #[must_use]
    pub fn cached_lines(&self) -> usize {
        self.read
            .iter()
            .zip(&self.write)
            .filter(|(r, w)| r.is_some() || w.is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> MemCache {
        let mut cache = MemCache::new();
        for line in 0..CACHE_LINES {
            let addr = (line * CACHE_LINE_SIZE) as u16;
            cache.fill_read(addr, Some(LineHandle::new(u32::from(addr))));
            cache.fill_write(addr, None);
        }
        cache
    }

    #[test]
    fn refusal_marks_line_tried() {
        let mut cache = MemCache::new();
        cache.fill_write(0x4000, None);
        assert!(cache.write_tried(0x40FF));
        assert!(!cache.read_tried(0x4000));
    }

    #[test]
    fn invalidate_clears_intersecting_lines_only() {
        let mut cache = full();
        // 0x40FF..0x4101 touches lines 0x40 and 0x41.
        assert_eq!(cache.invalidate(0x40FF, 2), 2);
        assert!(cache.read_line(0x3FFF).is_some());
        assert!(cache.read_line(0x4000).is_none());
        assert!(cache.read_line(0x4100).is_none());
        assert!(!cache.write_tried(0x4100));
        assert!(cache.write_tried(0x4200));
        assert!(cache.read_line(0x4200).is_some());
    }

    #[test]
    fn invalidate_clips_at_top_of_memory() {
        let mut cache = full();
        assert_eq!(cache.invalidate(0xFF00, 0x1000), 1);
        assert_eq!(cache.invalidate(0x0000, 0x1_0000), CACHE_LINES);
        assert_eq!(cache.cached_lines(), 0);
    }

    #[test]
    fn empty_range_is_a_no_op() {
        let mut cache = full();
        assert_eq!(cache.invalidate(0x1234, 0), 0);
        assert_eq!(cache.cached_lines(), CACHE_LINES);
    }
}
