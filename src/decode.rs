//! Decode phase
//!
//! Pure and total: every 32-bit pattern decodes to some descriptor. There
//! is no illegal-instruction trap; the two unused opcode patterns decode to
//! an inert NOP.

use crate::inst::{self, Cond, Decoded, Op, Operand};

pub fn decode(word: u32) -> Decoded {
    let mut d = Decoded {
        op: Op::from_bits(inst::opcode(word)),
        cond: Cond::from_bits(inst::cond_bits(word)),
        rotate: !inst::suppress(word),
        ..Decoded::default()
    };

    match d.op {
        Op::Add | Op::Sub | Op::Mul | Op::IAdd | Op::ISub | Op::IMul | Op::Rcp => {
            d.dest = inst::reg_a(word);
            d.src_b = operand_b(word);
            d.pre_shift = inst::pre_shift(word);
            d.post_shift = inst::post_shift(word);
            d.set_flags = inst::set_flags(word);
        }
        Op::Clamp => {
            d.dest = inst::reg_a(word);
            d.src_b = operand_b(word); // min bound
            d.clamp_max = inst::clamp_max(word);
            d.clamp_signed = word & inst::CLAMP_SIGNED_MASK != 0;
            d.post_shift = inst::post_shift(word);
            d.set_flags = inst::set_flags(word);
        }
        Op::Load => {
            d.imm = word & inst::LOAD_IMM_MASK;
        }
        Op::Branch => {
            d.offset_neg = word & inst::BRANCH_NEG_MASK != 0;
            d.offset = word & inst::BRANCH_OFFSET_MASK;
        }
        Op::MemWrite => {
            d.dest = inst::reg_a(word); // base address register
            d.mem_src = inst::reg_b(word);
            d.offset_neg = word & inst::MEM_NEG_MASK != 0;
            d.offset = word & inst::MEM_OFFSET_MASK;
        }
        Op::Interrupt => {
            d.dest = inst::reg_a(word); // source register
        }
        Op::Save => {
            d.dest = inst::reg_a(word); // source register
            d.slot = inst::reg_b(word);
            d.post_shift = inst::post_shift(word);
        }
        Op::Restore => {
            d.dest = inst::reg_a(word);
            d.slot = inst::reg_b(word);
            d.post_shift = inst::post_shift(word);
            d.set_flags = inst::set_flags(word);
        }
        Op::Nop => {}
    }

    d
}

fn operand_b(word: u32) -> Operand {
    if inst::b_is_imm(word) {
        Operand::Imm(inst::reg_b(word))
    } else {
        Operand::Reg(inst::reg_b(word))
    }
}
