//! Memory interface
//!
//! The core consumes, but does not own, the data cache: MEM_WRITE emits a
//! write request over [`MemPort`] and stalls while the port reports
//! not-ready. Reads are pre-staged by the surrounding system and are not
//! part of this core. [`Sram`] is the always-ready behavioral model used by
//! the CLI and most tests; [`Throttled`] and [`Blocked`] model slow and
//! absent memories for the stall paths.

/// Width of one transfer. No partial writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSize {
    Bits8 = 0b00,
    Bits16 = 0b01,
    Bits32 = 0b10,
    Bits64 = 0b11,
}

impl DataSize {
    pub fn bytes(self) -> usize {
        match self {
            DataSize::Bits8 => 1,
            DataSize::Bits16 => 2,
            DataSize::Bits32 => 4,
            DataSize::Bits64 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReq {
    pub addr: u32,
    pub data: u64,
    pub size: DataSize,
}

/// Ready/valid write side of the memory hierarchy. Returning `false`
/// leaves the request unaccepted; the issuing instruction repeats.
pub trait MemPort {
    fn try_write(&mut self, req: &WriteReq) -> bool;
}

/// Flat little-endian memory, always ready. Size must be a power of two;
/// addresses wrap, so every request is structurally valid.
#[derive(Debug)]
pub struct Sram {
    mm: Vec<u8>,
}

impl Sram {
    pub fn new(size: usize) -> Sram {
        assert!(size.is_power_of_two(), "Sram size must be a power of two");
        Sram { mm: vec![0; size] }
    }

    fn pos(&self, addr: u32, offset: usize) -> usize {
        (addr as usize + offset) & (self.mm.len() - 1)
    }

    pub fn read(&self, addr: u32, size: DataSize) -> u64 {
        let mut value = 0u64;
        for i in (0..size.bytes()).rev() {
            value = (value << 8) | self.mm[self.pos(addr, i)] as u64;
        }
        value
    }

    pub fn write(&mut self, addr: u32, data: u64, size: DataSize) {
        for i in 0..size.bytes() {
            let pos = self.pos(addr, i);
            self.mm[pos] = (data >> (8 * i)) as u8;
        }
    }
}

impl MemPort for Sram {
    fn try_write(&mut self, req: &WriteReq) -> bool {
        self.write(req.addr, req.data, req.size);
        true
    }
}

/// Wraps a port so it accepts only every `period`-th attempt.
pub struct Throttled<M> {
    inner: M,
    period: u32,
    attempts: u32,
}

impl<M> Throttled<M> {
    pub fn new(inner: M, period: u32) -> Throttled<M> {
        assert!(period > 0);
        Throttled {
            inner,
            period,
            attempts: 0,
        }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: MemPort> MemPort for Throttled<M> {
    fn try_write(&mut self, req: &WriteReq) -> bool {
        self.attempts += 1;
        if self.attempts % self.period == 0 {
            self.inner.try_write(req)
        } else {
            false
        }
    }
}

/// A port that never becomes ready. Exists to exercise the bounded-wait
/// timeout the reference model imposes on protocol violations.
pub struct Blocked;

impl MemPort for Blocked {
    fn try_write(&mut self, _req: &WriteReq) -> bool {
        false
    }
}
