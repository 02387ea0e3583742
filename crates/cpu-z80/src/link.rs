//! The CPU state a device may touch during one of its bus accesses.
//!
//! Memory accesses go through the cache first; on a miss the bus is called
//! with this link, so a device can raise interrupts, invalidate cached
//! lines or stop the loop before the CPU's next access.

use emu_core::{Access, Bus, CpuLink, EmuTime};

use crate::cache::MemCache;
use crate::interrupt::InterruptState;

#[derive(Debug, Clone)]
pub struct BusLink {
    pub cache: MemCache,
    pub irq: InterruptState,
    /// Leave the loop at the next instruction boundary.
    pub exit_sync: bool,
    /// Instructions left before the next full boundary check.
    pub slow: i32,
    /// Earliest known sync point.
    pub limit: EmuTime,
}

impl Default for BusLink {
    fn default() -> Self {
        Self {
            cache: MemCache::new(),
            irq: InterruptState::default(),
            exit_sync: false,
            slow: 0,
            limit: EmuTime::INFINITY,
        }
    }
}

impl BusLink {
    /// Make the boundary check run within `count` instructions.
    #[inline]
    pub fn arm(&mut self, count: i32) {
        self.slow = self.slow.min(count);
    }

    /// Read a byte through the cache.
    #[inline]
    pub fn read<B: Bus>(&mut self, bus: &mut B, address: u16, time: EmuTime) -> u8 {
        if let Some(line) = self.cache.read_line(address) {
            if let Some(&byte) = bus.arena().get(line.index(address)) {
                return byte;
            }
        } else if !self.cache.read_tried(address) {
            let handle = bus.cache_line(address & 0xFF00, Access::Read);
            let byte = handle.and_then(|h| bus.arena().get(h.index(address)).copied());
            if let Some(byte) = byte {
                self.cache.fill_read(address, handle);
                return byte;
            }
            tracing::trace!(line = format_args!("{:#06X}", address & 0xFF00), "read line not cacheable");
            self.cache.fill_read(address, None);
        }
        bus.read(address, time, self)
    }

    /// Write a byte through the cache.
    #[inline]
    pub fn write<B: Bus>(&mut self, bus: &mut B, address: u16, value: u8, time: EmuTime) {
        if let Some(line) = self.cache.write_line(address) {
            if let Some(slot) = bus.arena_mut().get_mut(line.index(address)) {
                *slot = value;
                return;
            }
        } else if !self.cache.write_tried(address) {
            let handle = bus.cache_line(address & 0xFF00, Access::Write);
            if let Some(h) = handle {
                if let Some(slot) = bus.arena_mut().get_mut(h.index(address)) {
                    *slot = value;
                    self.cache.fill_write(address, handle);
                    return;
                }
            }
            tracing::trace!(line = format_args!("{:#06X}", address & 0xFF00), "write line not cacheable");
            self.cache.fill_write(address, None);
        }
        bus.write(address, value, time, self);
    }

    pub fn io_read<B: Bus>(&mut self, bus: &mut B, port: u16, time: EmuTime) -> u8 {
        bus.io_read(port, time, self)
    }

    pub fn io_write<B: Bus>(&mut self, bus: &mut B, port: u16, value: u8, time: EmuTime) {
        bus.io_write(port, value, time, self);
    }

    /// Drop cached lines in `[start, start + size)`.
    pub fn invalidate(&mut self, start: u16, size: u32) {
        let lines = self.cache.invalidate(start, size);
        if lines > 1 {
            tracing::debug!(start = format_args!("{start:#06X}"), size, lines, "memory cache invalidated");
        }
    }
}

impl CpuLink for BusLink {
    fn raise_irq(&mut self) {
        self.irq.raise_irq();
        self.arm(1);
    }

    fn lower_irq(&mut self) {
        self.irq.lower_irq();
    }

    fn raise_nmi(&mut self) {
        self.irq.raise_nmi();
        self.arm(1);
    }

    fn lower_nmi(&mut self) {
        self.irq.lower_nmi();
    }

    fn invalidate_mem_cache(&mut self, start: u16, size: u32) {
        self.invalidate(start, size);
    }

    fn exit_cpu_loop_sync(&mut self) {
        self.exit_sync = true;
        self.arm(1);
    }

    fn sync_point_scheduled(&mut self, time: EmuTime) {
        if time < self.limit {
            self.limit = time;
            self.arm(1);
        }
    }
}
