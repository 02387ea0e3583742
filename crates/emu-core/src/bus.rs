//! Memory and I/O bus interface.

use crate::time::EmuTime;

/// Bytes covered by one CPU cache line.
pub const CACHE_LINE_SIZE: usize = 256;

/// Cache lines covering the 64K address space.
pub const CACHE_LINES: usize = 0x1_0000 / CACHE_LINE_SIZE;

/// Direction of a cache-line request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Location of a cache line inside the bus's memory arena.
///
/// A handle names the first arena byte backing a 256-byte aligned block of
/// the address space. It stays meaningful only until the bus remaps that
/// block; the bus must invalidate the CPU's cache before then.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineHandle(u32);

impl LineHandle {
    #[must_use]
    pub const fn new(offset: u32) -> Self {
        Self(offset)
    }

    /// Arena offset of the line's first byte.
    #[must_use]
    pub const fn offset(self) -> u32 {
        self.0
    }

    /// Arena index of `address` within this line.
    #[must_use]
    pub const fn index(self, address: u16) -> usize {
        self.0 as usize + (address as usize & (CACHE_LINE_SIZE - 1))
    }
}

/// What a device may ask of the CPU while servicing one of its accesses.
///
/// Every slow-path bus call receives the CPU that issued it, so a device can
/// lower an interrupt when its status register is read, or invalidate cached
/// lines when a bank-switch register is written, before the CPU's next
/// memory access.
pub trait CpuLink {
    /// Assert the maskable interrupt line once more.
    fn raise_irq(&mut self);

    /// Release one earlier [`raise_irq`](Self::raise_irq).
    fn lower_irq(&mut self);

    /// Assert the non-maskable interrupt line once more.
    fn raise_nmi(&mut self);

    /// Release one earlier [`raise_nmi`](Self::raise_nmi).
    fn lower_nmi(&mut self);

    /// Forget cached lines intersecting `[start, start + size)`.
    fn invalidate_mem_cache(&mut self, start: u16, size: u32);

    /// Leave the execution loop at the next instruction boundary.
    fn exit_cpu_loop_sync(&mut self);

    /// A sync point was registered with the scheduler for `time`.
    fn sync_point_scheduled(&mut self, time: EmuTime);
}

/// Memory and I/O bus interface.
///
/// The bus owns the address space. `read`/`write` are the authoritative
/// (slow) path. Regions that cannot change identity without an explicit
/// invalidation may additionally be exposed as cache lines backed by the
/// bus's memory arena.
pub trait Bus {
    /// Read a byte from memory.
    fn read(&mut self, address: u16, time: EmuTime, cpu: &mut dyn CpuLink) -> u8;

    /// Write a byte to memory.
    fn write(&mut self, address: u16, value: u8, time: EmuTime, cpu: &mut dyn CpuLink);

    /// Read a byte from an I/O port. Never cached.
    fn io_read(&mut self, port: u16, time: EmuTime, cpu: &mut dyn CpuLink) -> u8;

    /// Write a byte to an I/O port. Never cached.
    fn io_write(&mut self, port: u16, value: u8, time: EmuTime, cpu: &mut dyn CpuLink);

    /// Read memory without side effects (debuggers, disassembly).
    fn peek(&self, address: u16) -> u8;

    /// Offer a cache line for the 256-byte block starting at `start`.
    ///
    /// Return `None` for any block whose contents or mapping can change
    /// without a matching [`CpuLink::invalidate_mem_cache`] call.
    fn cache_line(&mut self, start: u16, access: Access) -> Option<LineHandle> {
        let _ = (start, access);
        None
    }

    /// Backing store that [`LineHandle`]s point into.
    fn arena(&self) -> &[u8] {
        &[]
    }

    /// Mutable backing store that write [`LineHandle`]s point into.
    fn arena_mut(&mut self) -> &mut [u8] {
        &mut []
    }

    /// Byte placed on the data bus during an interrupt acknowledge cycle.
    ///
    /// Consulted once per acknowledged byte in mode 0 and once for the
    /// vector in mode 2. An idle MSX data bus reads `0xFF` (`RST 38h`).
    fn interrupt_ack(&mut self) -> u8 {
        0xFF
    }

    /// The CPU executed `RETI`.
    fn reti(&mut self, time: EmuTime) {
        let _ = time;
    }
}

/// Flat 64K RAM, fully cacheable, with a simple port model.
///
/// Port reads return the value last set with [`set_port`](Self::set_port)
/// (default `0xFF`); port writes are logged in order.
pub struct SimpleBus {
    ram: Box<[u8]>,
    ports: [u8; 256],
    /// Port writes seen so far, oldest first.
    pub port_writes: Vec<(u16, u8)>,
    /// Byte returned by interrupt acknowledge cycles.
    pub ack_byte: u8,
    /// Number of `RETI` notifications received.
    pub reti_count: u32,
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: vec![0; 0x1_0000].into_boxed_slice(),
            ports: [0xFF; 256],
            port_writes: Vec::new(),
            ack_byte: 0xFF,
            reti_count: 0,
        }
    }

    /// Copy `data` into RAM starting at `address`, wrapping at 64K.
    pub fn load(&mut self, address: u16, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            self.ram[usize::from(address.wrapping_add(i as u16))] = byte;
        }
    }

    /// Overwrite a single RAM byte.
    pub fn poke(&mut self, address: u16, value: u8) {
        self.ram[usize::from(address)] = value;
    }

    /// Value returned by reads of `port` (low byte decoded).
    pub fn set_port(&mut self, port: u8, value: u8) {
        self.ports[usize::from(port)] = value;
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u16, _time: EmuTime, _cpu: &mut dyn CpuLink) -> u8 {
        self.ram[usize::from(address)]
    }

    fn write(&mut self, address: u16, value: u8, _time: EmuTime, _cpu: &mut dyn CpuLink) {
        self.ram[usize::from(address)] = value;
    }

    fn io_read(&mut self, port: u16, _time: EmuTime, _cpu: &mut dyn CpuLink) -> u8 {
        self.ports[usize::from(port & 0xFF)]
    }

    fn io_write(&mut self, port: u16, value: u8, _time: EmuTime, _cpu: &mut dyn CpuLink) {
        self.port_writes.push((port, value));
    }

    fn peek(&self, address: u16) -> u8 {
        self.ram[usize::from(address)]
    }

    fn cache_line(&mut self, start: u16, _access: Access) -> Option<LineHandle> {
        Some(LineHandle::new(u32::from(start)))
    }

    fn arena(&self) -> &[u8] {
        &self.ram
    }

    fn arena_mut(&mut self) -> &mut [u8] {
        &mut self.ram
    }

    fn interrupt_ack(&mut self) -> u8 {
        self.ack_byte
    }

    fn reti(&mut self, _time: EmuTime) {
        self.reti_count += 1;
    }
}
