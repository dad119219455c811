//! Instruction word definition
//!
//! One instruction is an opaque 32-bit word. Bits 31-25 (rotate-suppress,
//! condition, opcode) are common to every family; the remaining bits are
//! family-specific. Decode is total: every pattern maps to some operation.

use std::fmt::Display;

use crate::reg::Flags;

pub const /*SUPPRESS */ SUPPRESS_MASK:   u32 = 0b1_00_0000_00000_00000_0_00000_0_0_0_000000;
pub const /*COND     */ COND_MASK:       u32 = 0b0_11_0000_00000_00000_0_00000_0_0_0_000000;
pub const /*OPCODE   */ OPCODE_MASK:     u32 = 0b0_00_1111_00000_00000_0_00000_0_0_0_000000;
pub const /*REG A    */ REG_A_MASK:      u32 = 0b0_00_0000_11111_00000_0_00000_0_0_0_000000;
pub const /*REG B    */ REG_B_MASK:      u32 = 0b0_00_0000_00000_11111_0_00000_0_0_0_000000;
pub const /*PRE DIR  */ PRE_DIR_MASK:    u32 = 0b0_00_0000_00000_00000_1_00000_0_0_0_000000;
pub const /*PRE AMT  */ PRE_AMT_MASK:    u32 = 0b0_00_0000_00000_00000_0_11111_0_0_0_000000;
pub const /*SETFLAGS */ SET_FLAGS_MASK:  u32 = 0b0_00_0000_00000_00000_0_00000_1_0_0_000000;
pub const /*B IS IMM */ B_IS_IMM_MASK:   u32 = 0b0_00_0000_00000_00000_0_00000_0_1_0_000000;
pub const /*POST DIR */ POST_DIR_MASK:   u32 = 0b0_00_0000_00000_00000_0_00000_0_0_1_000000;
pub const /*POST AMT */ POST_AMT_MASK:   u32 = 0b0_00_0000_00000_00000_0_00000_0_0_0_111111;

// CLAMP repurposes the pre-shift bits for the max bound and signedness.
pub const CLAMP_MAX_MASK: u32 = 0b11111 << 10;
pub const CLAMP_SIGNED_MASK: u32 = 1 << 9;

// Family-specific low bits.
pub const LOAD_IMM_MASK: u32 = (1 << 25) - 1;
pub const BRANCH_NEG_MASK: u32 = 1 << 24;
pub const BRANCH_OFFSET_MASK: u32 = (1 << 24) - 1;
pub const MEM_NEG_MASK: u32 = 1 << 14;
pub const MEM_OFFSET_MASK: u32 = (1 << 14) - 1;

pub const COND_SHIFT: usize = 29;
pub const OPCODE_SHIFT: usize = 25;
pub const REG_A_SHIFT: usize = 20;
pub const REG_B_SHIFT: usize = 15;
pub const PRE_AMT_SHIFT: usize = 9;
pub const CLAMP_MAX_SHIFT: usize = 10;

/// Index of the hard-wired zero register.
pub const ZERO: u8 = 31;

pub fn suppress(inst: u32) -> bool {
    inst & SUPPRESS_MASK != 0
}

pub fn cond_bits(inst: u32) -> u8 {
    ((inst & COND_MASK) >> COND_SHIFT) as u8
}

pub fn opcode(inst: u32) -> u8 {
    ((inst & OPCODE_MASK) >> OPCODE_SHIFT) as u8
}

pub fn reg_a(inst: u32) -> u8 {
    ((inst & REG_A_MASK) >> REG_A_SHIFT) as u8
}

pub fn reg_b(inst: u32) -> u8 {
    ((inst & REG_B_MASK) >> REG_B_SHIFT) as u8
}

pub fn pre_shift(inst: u32) -> Shift {
    Shift {
        right: inst & PRE_DIR_MASK != 0,
        bits: ((inst & PRE_AMT_MASK) >> PRE_AMT_SHIFT) as u8,
    }
}

pub fn post_shift(inst: u32) -> Shift {
    Shift {
        right: inst & POST_DIR_MASK != 0,
        bits: (inst & POST_AMT_MASK) as u8,
    }
}

pub fn set_flags(inst: u32) -> bool {
    inst & SET_FLAGS_MASK != 0
}

pub fn b_is_imm(inst: u32) -> bool {
    inst & B_IS_IMM_MASK != 0
}

pub fn clamp_max(inst: u32) -> u8 {
    ((inst & CLAMP_MAX_MASK) >> CLAMP_MAX_SHIFT) as u8
}

/// 4-bit opcode space. Patterns 13 and 14 decode to [`Op::Nop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Rcp,
    Clamp,
    Load,
    Branch,
    MemWrite,
    IAdd,
    ISub,
    IMul,
    Save,
    Restore,
    Interrupt,
    #[default]
    Nop,
}

impl Op {
    pub fn from_bits(bits: u8) -> Op {
        match bits & 0xF {
            0b0000 => Op::Add,
            0b0001 => Op::Sub,
            0b0010 => Op::Mul,
            0b0011 => Op::Rcp,
            0b0100 => Op::Clamp,
            0b0101 => Op::Load,
            0b0110 => Op::Branch,
            0b0111 => Op::MemWrite,
            0b1000 => Op::IAdd,
            0b1001 => Op::ISub,
            0b1010 => Op::IMul,
            0b1011 => Op::Save,
            0b1100 => Op::Restore,
            0b1111 => Op::Interrupt,
            _ => Op::Nop,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Op::Add => 0b0000,
            Op::Sub => 0b0001,
            Op::Mul => 0b0010,
            Op::Rcp => 0b0011,
            Op::Clamp => 0b0100,
            Op::Load => 0b0101,
            Op::Branch => 0b0110,
            Op::MemWrite => 0b0111,
            Op::IAdd => 0b1000,
            Op::ISub => 0b1001,
            Op::IMul => 0b1010,
            Op::Save => 0b1011,
            Op::Restore => 0b1100,
            Op::Interrupt => 0b1111,
            Op::Nop => 0b1101,
        }
    }
}

/// Condition code gating an instruction's side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cond {
    #[default]
    Always,
    Nez,
    Eqz,
    Neg,
}

impl Cond {
    pub fn from_bits(bits: u8) -> Cond {
        match bits & 0b11 {
            0 => Cond::Always,
            1 => Cond::Nez,
            2 => Cond::Eqz,
            _ => Cond::Neg,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Cond::Always => 0,
            Cond::Nez => 1,
            Cond::Eqz => 2,
            Cond::Neg => 3,
        }
    }

    pub fn holds(self, flags: Flags) -> bool {
        match self {
            Cond::Always => true,
            Cond::Nez => !flags.contains(Flags::Z),
            Cond::Eqz => flags.contains(Flags::Z),
            Cond::Neg => flags.contains(Flags::N),
        }
    }
}

/// Second operand of a dual-operand instruction: a register index or an
/// entry of the built-in immediate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(u8),
    Imm(u8),
}

impl Default for Operand {
    fn default() -> Self {
        Operand::Reg(ZERO)
    }
}

/// A logical shift: direction plus amount. Direction bit 0 = left, 1 = right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shift {
    pub right: bool,
    pub bits: u8,
}

impl Shift {
    pub fn left(bits: u8) -> Shift {
        Shift { right: false, bits }
    }

    pub fn right(bits: u8) -> Shift {
        Shift { right: true, bits }
    }
}

/// Built-in immediate table, Q2.30 fixed point. Read-only, never mutated.
pub mod imm {
    pub const ONE: u8 = 0;
    pub const NEG_ONE: u8 = 1;
    pub const SQRT_2: u8 = 2;
    pub const ONE_OVER_TWO_PI: u8 = 3;
    pub const PI: u8 = 4;

    const TABLE: [u32; 5] = [
        0x4000_0000, // 1.0
        0xC000_0000, // -1.0
        0x5A82_799A, // sqrt(2)
        0x0A2F_9837, // 1/(2*pi)
        0xC90F_DAA2, // pi
    ];

    /// Table lookup. Indices past the table read 0.
    pub fn value(idx: u8) -> u32 {
        TABLE.get(idx as usize).copied().unwrap_or(0)
    }
}

/// Decoded view of one instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Decoded {
    pub op: Op,
    pub cond: Cond,
    /// Rotate-on-commit this cycle (bit 31 clear).
    pub rotate: bool,
    pub set_flags: bool,
    /// Destination / value register; also the MEM_WRITE base address and
    /// the INTERRUPT / SAVE source.
    pub dest: u8,
    pub src_b: Operand,
    pub pre_shift: Shift,
    pub post_shift: Shift,
    /// CLAMP max bound register.
    pub clamp_max: u8,
    pub clamp_signed: bool,
    /// LOAD immediate (25 bits).
    pub imm: u32,
    /// BRANCH (24-bit) or MEM_WRITE (14-bit) offset magnitude.
    pub offset: u32,
    pub offset_neg: bool,
    /// MEM_WRITE source register.
    pub mem_src: u8,
    /// SAVE / RESTORE saved-register slot.
    pub slot: u8,
}

impl Display for Decoded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.op {
            Op::Load => write!(f, "load {}", self.imm)?,
            Op::Branch => write!(
                f,
                "branch {}{}",
                if self.offset_neg { "-" } else { "+" },
                self.offset
            )?,
            Op::MemWrite => write!(
                f,
                "write [r{}{}{}], r{}",
                self.dest,
                if self.offset_neg { "-" } else { "+" },
                self.offset,
                self.mem_src
            )?,
            Op::Interrupt => write!(f, "iupt r{}", self.dest)?,
            Op::Save => write!(f, "save s{}, r{}", self.slot, self.dest)?,
            Op::Restore => write!(f, "restore r{}, s{}", self.dest, self.slot)?,
            Op::Clamp => write!(
                f,
                "clamp r{}, {:?}, r{}",
                self.dest, self.src_b, self.clamp_max
            )?,
            Op::Nop => write!(f, "nop")?,
            op => write!(f, "{:?} r{}, {:?}", op, self.dest, self.src_b)?,
        }
        if self.cond != Cond::Always {
            write!(f, " ?{:?}", self.cond)?;
        }
        Ok(())
    }
}

/// Instruction word builder, mirroring the encoders the hardware tests use.
///
/// ```ignore
/// let word = Enc::dual(Op::Add, 0, Operand::Reg(1)).flags().word();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Enc(u32);

impl Enc {
    /// Dual-operand ALU instruction (ADD/SUB/MUL/IADD/ISUB/IMUL/RCP).
    pub fn dual(op: Op, a: u8, b: Operand) -> Enc {
        let (b_idx, b_imm) = match b {
            Operand::Reg(r) => (r, 0),
            Operand::Imm(i) => (i, B_IS_IMM_MASK),
        };
        Enc(((op.bits() as u32) << OPCODE_SHIFT)
            | ((a as u32 & 0x1F) << REG_A_SHIFT)
            | ((b_idx as u32 & 0x1F) << REG_B_SHIFT)
            | b_imm)
    }

    /// CLAMP: min comes from a register or the immediate table, max always
    /// from a register.
    pub fn clamp(value: u8, min: Operand, max: u8) -> Enc {
        let mut e = Enc::dual(Op::Clamp, value, min);
        e.0 |= (max as u32 & 0x1F) << CLAMP_MAX_SHIFT;
        e
    }

    pub fn load(imm: u32) -> Enc {
        Enc(((Op::Load.bits() as u32) << OPCODE_SHIFT) | (imm & LOAD_IMM_MASK))
    }

    pub fn branch(cond: Cond, offset: u32, negative: bool) -> Enc {
        Enc(((cond.bits() as u32) << COND_SHIFT)
            | ((Op::Branch.bits() as u32) << OPCODE_SHIFT)
            | if negative { BRANCH_NEG_MASK } else { 0 }
            | (offset & BRANCH_OFFSET_MASK))
    }

    pub fn write(base: u8, src: u8, offset: u32, negative: bool) -> Enc {
        Enc(((Op::MemWrite.bits() as u32) << OPCODE_SHIFT)
            | ((base as u32 & 0x1F) << REG_A_SHIFT)
            | ((src as u32 & 0x1F) << REG_B_SHIFT)
            | if negative { MEM_NEG_MASK } else { 0 }
            | (offset & MEM_OFFSET_MASK))
    }

    pub fn iupt(src: u8) -> Enc {
        Enc(((Op::Interrupt.bits() as u32) << OPCODE_SHIFT)
            | ((src as u32 & 0x1F) << REG_A_SHIFT))
    }

    pub fn save(slot: u8, src: u8) -> Enc {
        Enc(((Op::Save.bits() as u32) << OPCODE_SHIFT)
            | ((src as u32 & 0x1F) << REG_A_SHIFT)
            | ((slot as u32 & 0x1F) << REG_B_SHIFT))
    }

    pub fn restore(dest: u8, slot: u8) -> Enc {
        Enc(((Op::Restore.bits() as u32) << OPCODE_SHIFT)
            | ((dest as u32 & 0x1F) << REG_A_SHIFT)
            | ((slot as u32 & 0x1F) << REG_B_SHIFT))
    }

    /// Rotate-suppressed ADD of ZERO into ZERO: retires with no effect.
    pub fn nop() -> Enc {
        Enc::dual(Op::Add, ZERO, Operand::Reg(ZERO)).no_rotate()
    }

    pub fn cond(mut self, cond: Cond) -> Enc {
        self.0 = (self.0 & !COND_MASK) | ((cond.bits() as u32) << COND_SHIFT);
        self
    }

    /// Commit Z/N from the result this cycle.
    pub fn flags(mut self) -> Enc {
        self.0 |= SET_FLAGS_MASK;
        self
    }

    /// Pre-shift applied to operand B.
    pub fn pre(mut self, s: Shift) -> Enc {
        if s.right {
            self.0 |= PRE_DIR_MASK;
        }
        self.0 |= ((s.bits as u32) & 0x1F) << PRE_AMT_SHIFT;
        self
    }

    /// Post-shift applied to the raw result.
    pub fn post(mut self, s: Shift) -> Enc {
        if s.right {
            self.0 |= POST_DIR_MASK;
        }
        self.0 |= (s.bits as u32) & POST_AMT_MASK;
        self
    }

    /// CLAMP: compare bounds as signed values.
    pub fn signed(mut self) -> Enc {
        self.0 |= CLAMP_SIGNED_MASK;
        self
    }

    /// Suppress rotation: write the result to the addressed destination.
    pub fn no_rotate(mut self) -> Enc {
        self.0 |= SUPPRESS_MASK;
        self
    }

    pub fn word(self) -> u32 {
        self.0
    }
}
