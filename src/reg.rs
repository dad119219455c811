//! Architectural state: rotating register file, saved-register bank,
//! program counter, condition flags.

use bitflags::bitflags;

/// Number of rotating slots; index 31 is the hard-wired zero register and
/// is not backed by storage.
pub const NUM_SLOTS: usize = 31;

/// Number of saved registers (S0..S7). Slot ids are taken mod 8 so every
/// 5-bit field value is structurally valid.
pub const SAVED_SLOTS: usize = 8;

bitflags! {
    /// Condition flags, committed only when an instruction's commit-flags
    /// bit is set and its condition holds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u8 {
        const Z = 1;
        const N = 2;
    }
}

impl Flags {
    /// Flags of a committed 32-bit result: Z when zero, N from bit 31.
    pub fn of(result: u32) -> Flags {
        let mut f = Flags::empty();
        if result == 0 {
            f |= Flags::Z;
        }
        if result & (1 << 31) != 0 {
            f |= Flags::N;
        }
        f
    }
}

/// Rotating register file: 31 general slots plus constant zero at index 31.
///
/// A committing result normally enters slot 0 while every older value moves
/// to the next-higher index, the oldest being discarded; with
/// rotate-suppress the result lands on the addressed slot instead. Reads
/// always see pre-commit values; the control unit reads all operands before
/// applying the commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    slots: [u32; NUM_SLOTS],
}

impl RegisterFile {
    pub fn empty() -> RegisterFile {
        RegisterFile {
            slots: [0; NUM_SLOTS],
        }
    }

    /// Read a slot. Index 31 always reads 0.
    #[inline]
    pub fn read(&self, idx: u8) -> u32 {
        let idx = (idx & 0x1F) as usize;
        if idx < NUM_SLOTS {
            self.slots[idx]
        } else {
            0
        }
    }

    /// Rotate-on-commit: the result enters slot 0, everything else shifts
    /// up one index, slot 30's old value falls off.
    #[inline]
    pub fn push(&mut self, value: u32) {
        self.slots.copy_within(0..NUM_SLOTS - 1, 1);
        self.slots[0] = value;
    }

    /// Addressed write (rotate-suppressed path). Writes to index 31 are
    /// silently discarded.
    #[inline]
    pub fn write(&mut self, idx: u8, value: u32) {
        let idx = (idx & 0x1F) as usize;
        if idx < NUM_SLOTS {
            self.slots[idx] = value;
        }
    }

    pub fn clear(&mut self) {
        self.slots = [0; NUM_SLOTS];
    }
}

/// Saved-register bank. Distinct lifecycle from the rotating file: survives
/// a soft reset, cleared only by a full system reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedBank {
    slots: [u32; SAVED_SLOTS],
}

impl SavedBank {
    pub fn empty() -> SavedBank {
        SavedBank {
            slots: [0; SAVED_SLOTS],
        }
    }

    #[inline]
    pub fn read(&self, slot: u8) -> u32 {
        self.slots[slot as usize % SAVED_SLOTS]
    }

    #[inline]
    pub fn write(&mut self, slot: u8, value: u32) {
        self.slots[slot as usize % SAVED_SLOTS] = value;
    }

    pub fn clear(&mut self) {
        self.slots = [0; SAVED_SLOTS];
    }
}

pub struct ProgramCounter {
    inner: u32,
}

impl ProgramCounter {
    pub fn new() -> ProgramCounter {
        ProgramCounter { inner: 0 }
    }

    pub fn read(&self) -> u32 {
        self.inner
    }

    pub fn write(&mut self, value: u32) {
        self.inner = value;
    }
}
