//! Control unit
//!
//! Single-issue sequencer: fetch, decode, condition check, execute, then an
//! all-or-nothing commit. One instruction retires per cycle unless its port
//! (memory write or reciprocal) reports not-ready, in which case the cycle
//! stalls with the PC frozen and the instruction repeats. A raised
//! interrupt latches its argument and freezes the core until a reset.

use log::{info, trace};

use crate::alu;
use crate::decode::decode;
use crate::error::{Error, Result};
use crate::inst::{imm, Decoded, Op, Operand};
use crate::mem::{DataSize, MemPort, WriteReq};
use crate::rcp::RcpPort;
use crate::reg::{Flags, ProgramCounter, RegisterFile, SavedBank};

/// Consecutive not-ready cycles tolerated on one instruction before the
/// model declares the port dead.
pub const MAX_STALL_CYCLES: u32 = 64;

/// Outcome of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The instruction committed; the PC moved.
    Retired,
    /// A port was not ready; nothing committed, the PC is frozen.
    Stalled,
    /// The interrupt-exit unit fired (now or on an earlier cycle) with this
    /// argument. The core stays frozen until reset.
    Interrupted(u32),
}

/// Side effects of one instruction, gathered during execute and applied
/// atomically. A stalled instruction produces no record at all.
#[derive(Debug, Default)]
struct Commit {
    result: Option<u32>,
    flags: Option<Flags>,
    save: Option<(u8, u32)>,
    iupt: Option<u32>,
    next_pc: Option<u32>,
}

pub struct CtrlUnit<M, R> {
    prog: Vec<u32>,
    regs: RegisterFile,
    saved: SavedBank,
    flags: Flags,
    pc: ProgramCounter,
    iupt: Option<u32>,
    stall: u32,
    mem: M,
    rcp: R,
}

impl<M: MemPort, R: RcpPort> CtrlUnit<M, R> {
    pub fn new(mem: M, rcp: R) -> CtrlUnit<M, R> {
        CtrlUnit {
            prog: Vec::new(),
            regs: RegisterFile::empty(),
            saved: SavedBank::empty(),
            flags: Flags::empty(),
            pc: ProgramCounter::new(),
            iupt: None,
            stall: 0,
            mem,
            rcp,
        }
    }

    /// Replace the program store. The store itself is load-phase state and
    /// survives resets.
    pub fn load_program(&mut self, prog: &[u32]) {
        self.prog = prog.to_vec();
    }

    /// Full system reset: architectural state including the saved bank.
    pub fn reset(&mut self) {
        self.soft_reset();
        self.saved.clear();
    }

    /// Soft reset between kernel launches: everything except the saved
    /// bank, which is the only channel for carrying values across.
    pub fn soft_reset(&mut self) {
        self.regs.clear();
        self.flags = Flags::empty();
        self.pc.write(0);
        self.iupt = None;
        self.stall = 0;
    }

    pub fn pc(&self) -> u32 {
        self.pc.read()
    }

    pub fn reg(&self, idx: u8) -> u32 {
        self.regs.read(idx)
    }

    pub fn saved(&self, slot: u8) -> u32 {
        self.saved.read(slot)
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn interrupt(&self) -> Option<u32> {
        self.iupt
    }

    pub fn mem(&self) -> &M {
        &self.mem
    }

    /// Advance one cycle.
    pub fn step(&mut self) -> Result<Step> {
        if let Some(value) = self.iupt {
            return Ok(Step::Interrupted(value));
        }

        let pc = self.pc.read();
        let word = self
            .prog
            .get(pc as usize)
            .copied()
            .ok_or(Error::Fetch(pc))?;
        let d = decode(word);
        trace!("{:4}: {}", pc, d);

        if !d.cond.holds(self.flags) {
            // a failed condition suppresses every side effect, including
            // port requests
            self.stall = 0;
            self.pc.write(pc.wrapping_add(1));
            return Ok(Step::Retired);
        }

        match self.execute(&d) {
            Some(commit) => {
                self.stall = 0;
                Ok(self.apply(&d, commit))
            }
            None => {
                self.stall += 1;
                if self.stall > MAX_STALL_CYCLES {
                    return Err(Error::StallTimeout {
                        pc,
                        cycles: self.stall,
                    });
                }
                Ok(Step::Stalled)
            }
        }
    }

    /// Run until an interrupt retires, returning its argument.
    pub fn run(&mut self, max_cycles: u64) -> Result<u32> {
        for _ in 0..max_cycles {
            if let Step::Interrupted(value) = self.step()? {
                info!("interrupt raised with argument {:#x}", value);
                return Ok(value);
            }
        }
        Err(Error::Timeout(max_cycles))
    }

    /// Compute this instruction's side effects without touching state.
    /// `None` means a port was not ready and the cycle stalls.
    fn execute(&mut self, d: &Decoded) -> Option<Commit> {
        let mut c = Commit::default();
        let a = self.regs.read(d.dest);

        match d.op {
            Op::Add | Op::Sub | Op::Mul | Op::IAdd | Op::ISub | Op::IMul => {
                let b = alu::pre_shift(self.operand_b(d), d.pre_shift);
                let raw = match d.op {
                    Op::Add => alu::add(a, b),
                    Op::Sub => alu::sub(a, b),
                    Op::Mul => alu::mul(a, b),
                    Op::IAdd => alu::iadd(a, b),
                    Op::ISub => alu::isub(a, b),
                    _ => alu::imul(a, b),
                };
                c.result = Some(alu::post_shift(raw, d.post_shift));
            }
            Op::Rcp => {
                let raw = self.rcp.try_rcp(a)?;
                c.result = Some(alu::post_shift(raw as u64, d.post_shift));
            }
            Op::Clamp => {
                let min = self.operand_b(d);
                let max = self.regs.read(d.clamp_max);
                let raw = alu::clamp(a, min, max, d.clamp_signed);
                c.result = Some(alu::post_shift(raw, d.post_shift));
            }
            Op::Load => {
                c.result = Some(d.imm);
            }
            Op::Branch => {
                let fall = self.pc.read().wrapping_add(1);
                c.next_pc = Some(if d.offset_neg {
                    fall.wrapping_sub(d.offset)
                } else {
                    fall.wrapping_add(d.offset)
                });
            }
            Op::MemWrite => {
                let addr = if d.offset_neg {
                    a.wrapping_sub(d.offset)
                } else {
                    a.wrapping_add(d.offset)
                };
                let req = WriteReq {
                    addr,
                    data: self.regs.read(d.mem_src) as u64,
                    size: DataSize::Bits32,
                };
                if !self.mem.try_write(&req) {
                    return None;
                }
            }
            Op::Interrupt => {
                c.iupt = Some(a);
            }
            Op::Save => {
                c.save = Some((d.slot, alu::post_shift(a as u64, d.post_shift)));
            }
            Op::Restore => {
                let raw = self.saved.read(d.slot) as u64;
                c.result = Some(alu::post_shift(raw, d.post_shift));
            }
            Op::Nop => {}
        }

        if d.set_flags {
            if let Some(result) = c.result {
                c.flags = Some(Flags::of(result));
            }
        }
        Some(c)
    }

    /// Atomic commit: register write (rotating or addressed), flags, saved
    /// bank, PC, interrupt latch.
    fn apply(&mut self, d: &Decoded, c: Commit) -> Step {
        if let Some(result) = c.result {
            if d.rotate {
                self.regs.push(result);
            } else {
                self.regs.write(d.dest, result);
            }
        }
        if let Some(flags) = c.flags {
            self.flags = flags;
        }
        if let Some((slot, value)) = c.save {
            self.saved.write(slot, value);
        }
        let fall = self.pc.read().wrapping_add(1);
        self.pc.write(c.next_pc.unwrap_or(fall));
        match c.iupt {
            Some(value) => {
                self.iupt = Some(value);
                Step::Interrupted(value)
            }
            None => Step::Retired,
        }
    }

    fn operand_b(&self, d: &Decoded) -> u32 {
        match d.src_b {
            Operand::Reg(idx) => self.regs.read(idx),
            Operand::Imm(idx) => imm::value(idx),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::inst::{Cond, Enc, Shift, ZERO};
    use crate::mem::{Blocked, Sram, Throttled};
    use crate::rcp::{FixedRcp, SlowRcp};

    fn cpu() -> CtrlUnit<Sram, FixedRcp> {
        CtrlUnit::new(Sram::new(1 << 16), FixedRcp)
    }

    fn run(prog: &[Enc]) -> u32 {
        let mut cpu = cpu();
        load(&mut cpu, prog);
        cpu.run(1_000_000).unwrap()
    }

    fn load<M: MemPort, R: RcpPort>(cpu: &mut CtrlUnit<M, R>, prog: &[Enc]) {
        let words: Vec<u32> = prog.iter().map(|e| e.word()).collect();
        cpu.load_program(&words);
    }

    #[test]
    fn staged_loads_then_interrupt() {
        // six staged loads rotate the first one out to slot 5
        let out = run(&[
            Enc::load(294),
            Enc::load(406),
            Enc::load(738),
            Enc::load(2500),
            Enc::load(6024),
            Enc::load(406),
            Enc::iupt(5),
        ]);
        assert_eq!(out, 294);
    }

    #[test]
    fn add_two_loads() {
        let out = run(&[
            Enc::load(100),
            Enc::load(200),
            Enc::dual(Op::Add, 0, Operand::Reg(1)),
            Enc::iupt(0),
        ]);
        assert_eq!(out, 300);
    }

    #[test]
    fn fibonacci_loop() {
        // seed 1, run 11 iterations of (copy, add, decrement), exit with
        // the 12th Fibonacci number
        let out = run(&[
            Enc::load(1),
            Enc::load(11),
            Enc::dual(Op::Add, 1, Operand::Reg(ZERO)),
            Enc::dual(Op::Add, 2, Operand::Reg(3)),
            Enc::dual(Op::Sub, 2, Operand::Imm(imm::ONE))
                .pre(Shift::right(30))
                .flags(),
            Enc::branch(Cond::Nez, 4, true),
            Enc::iupt(1),
        ]);
        assert_eq!(out, 144);
    }

    #[test]
    fn countdown_with_suppressed_rotation() {
        // decrement in place: the rotate-suppressed SUB keeps the counter
        // pinned at slot 0
        let out = run(&[
            Enc::load(5),
            Enc::dual(Op::Sub, 0, Operand::Imm(imm::ONE))
                .pre(Shift::right(30))
                .flags()
                .no_rotate(),
            Enc::branch(Cond::Nez, 2, true),
            Enc::iupt(0),
        ]);
        assert_eq!(out, 0);
    }

    #[test]
    fn suppressed_rotation_writes_addressed_slot() {
        let mut cpu = cpu();
        load(
            &mut cpu,
            &[
                Enc::load(100),
                Enc::load(23),
                Enc::dual(Op::Add, 1, Operand::Reg(0)).no_rotate(),
                Enc::iupt(1),
            ],
        );
        assert_eq!(cpu.run(100).unwrap(), 123);
        // the other slots did not move
        assert_eq!(cpu.reg(0), 23);
    }

    #[test]
    fn branch_target_arithmetic() {
        let mut cpu = cpu();
        load(
            &mut cpu,
            &[
                // Z := 1
                Enc::dual(Op::Add, ZERO, Operand::Reg(ZERO))
                    .flags()
                    .no_rotate(),
                Enc::branch(Cond::Eqz, 2, false),
                Enc::nop(),
                Enc::nop(),
                Enc::branch(Cond::Nez, 10, false),
                Enc::branch(Cond::Eqz, 3, true),
            ],
        );
        assert_eq!(cpu.step().unwrap(), Step::Retired);
        assert_eq!(cpu.pc(), 1);
        // taken forward: next = 1 + 1 + 2
        cpu.step().unwrap();
        assert_eq!(cpu.pc(), 4);
        // not taken: fall through
        cpu.step().unwrap();
        assert_eq!(cpu.pc(), 5);
        // taken backward: next = 5 + 1 - 3
        cpu.step().unwrap();
        assert_eq!(cpu.pc(), 3);
    }

    #[test]
    fn failed_condition_suppresses_everything() {
        let mut cpu = cpu();
        load(
            &mut cpu,
            &[
                Enc::load(5),
                Enc::load(613).cond(Cond::Eqz),
                Enc::dual(Op::Add, 0, Operand::Reg(0))
                    .cond(Cond::Neg)
                    .flags(),
                Enc::iupt(0),
            ],
        );
        assert_eq!(cpu.run(100).unwrap(), 5);
        assert_eq!(cpu.flags(), Flags::empty());
    }

    #[test]
    fn failed_condition_skips_port_request() {
        // a condition-failed MEM_WRITE must not stall even on a dead port
        let mut cpu = CtrlUnit::new(Blocked, FixedRcp);
        load(
            &mut cpu,
            &[Enc::write(0, 0, 0, false).cond(Cond::Eqz), Enc::iupt(ZERO)],
        );
        assert_eq!(cpu.step().unwrap(), Step::Retired);
        assert_eq!(cpu.run(10).unwrap(), 0);
    }

    #[test]
    fn mem_write_effective_address() {
        let mut cpu = cpu();
        load(
            &mut cpu,
            &[
                Enc::load(0x40),
                Enc::load(77),
                Enc::write(1, 0, 4, false),
                Enc::write(1, 0, 4, true),
                Enc::iupt(0),
            ],
        );
        assert_eq!(cpu.run(100).unwrap(), 77);
        assert_eq!(cpu.mem().read(0x44, DataSize::Bits32), 77);
        assert_eq!(cpu.mem().read(0x3C, DataSize::Bits32), 77);
    }

    #[test]
    fn mem_write_stalls_until_port_ready() {
        let mut cpu = CtrlUnit::new(Throttled::new(Sram::new(256), 3), FixedRcp);
        load(
            &mut cpu,
            &[Enc::load(7), Enc::write(ZERO, 0, 16, false), Enc::iupt(0)],
        );
        assert_eq!(cpu.step().unwrap(), Step::Retired);
        assert_eq!(cpu.step().unwrap(), Step::Stalled);
        assert_eq!(cpu.pc(), 1);
        assert_eq!(cpu.step().unwrap(), Step::Stalled);
        assert_eq!(cpu.step().unwrap(), Step::Retired);
        assert_eq!(cpu.pc(), 2);
        assert_eq!(cpu.mem().inner().read(16, DataSize::Bits32), 7);
        assert_eq!(cpu.run(10).unwrap(), 7);
    }

    #[test]
    fn dead_port_times_out() {
        let mut cpu = CtrlUnit::new(Blocked, FixedRcp);
        load(&mut cpu, &[Enc::write(ZERO, ZERO, 0, false)]);
        match cpu.run(10_000) {
            Err(Error::StallTimeout { pc: 0, .. }) => {}
            other => panic!("expected stall timeout, got {:?}", other),
        }
    }

    #[test]
    fn runaway_program_times_out() {
        let mut cpu = cpu();
        load(&mut cpu, &[Enc::branch(Cond::Always, 1, true)]);
        match cpu.run(1000) {
            Err(Error::Timeout(1000)) => {}
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn fetch_past_end_fails() {
        let mut cpu = cpu();
        load(&mut cpu, &[Enc::nop()]);
        match cpu.run(100) {
            Err(Error::Fetch(1)) => {}
            other => panic!("expected fetch fault, got {:?}", other),
        }
    }

    #[test]
    fn interrupt_latches_until_reset() {
        let mut cpu = cpu();
        load(&mut cpu, &[Enc::load(9), Enc::iupt(0)]);
        assert_eq!(cpu.run(100).unwrap(), 9);
        let frozen_pc = cpu.pc();
        // latched: further cycles change nothing
        assert_eq!(cpu.step().unwrap(), Step::Interrupted(9));
        assert_eq!(cpu.step().unwrap(), Step::Interrupted(9));
        assert_eq!(cpu.pc(), frozen_pc);
        assert_eq!(cpu.interrupt(), Some(9));
        cpu.soft_reset();
        assert_eq!(cpu.interrupt(), None);
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.run(100).unwrap(), 9);
    }

    #[test]
    fn saved_bank_survives_soft_reset_only() {
        let mut cpu = cpu();
        load(&mut cpu, &[Enc::load(7), Enc::save(2, 0), Enc::iupt(0)]);
        assert_eq!(cpu.run(100).unwrap(), 7);
        assert_eq!(cpu.saved(2), 7);

        cpu.soft_reset();
        load(&mut cpu, &[Enc::restore(0, 2), Enc::iupt(0)]);
        assert_eq!(cpu.run(100).unwrap(), 7);

        cpu.reset();
        assert_eq!(cpu.saved(2), 0);
        assert_eq!(cpu.run(100).unwrap(), 0);
    }

    #[test]
    fn save_restore_apply_post_shift() {
        let out = run(&[
            Enc::load(8),
            Enc::save(1, 0).post(Shift::right(1)),
            Enc::restore(0, 1).post(Shift::right(1)),
            Enc::iupt(0),
        ]);
        assert_eq!(out, 2);
    }

    #[test]
    fn reciprocal_program() {
        let prog = [
            Enc::load(4),
            Enc::dual(Op::Rcp, 0, Operand::Reg(ZERO)),
            Enc::iupt(0),
        ];
        assert_eq!(run(&prog), crate::rcp::ONE_Q16 / 4);

        // a slow reciprocal unit stalls but converges to the same answer
        let mut cpu = CtrlUnit::new(Sram::new(256), SlowRcp::new(3));
        load(&mut cpu, &prog);
        assert_eq!(cpu.run(100).unwrap(), crate::rcp::ONE_Q16 / 4);
    }

    #[test]
    fn multiply_high_word() {
        let x: u32 = 0xEC6C09;
        let out = run(&[
            Enc::load(x),
            Enc::dual(Op::Mul, 0, Operand::Reg(0)).post(Shift::right(32)),
            Enc::iupt(0),
        ]);
        assert_eq!(out, ((x as u64 * x as u64) >> 32) as u32);
    }

    #[test]
    fn signed_multiply_sign_extends_raw() {
        let out = run(&[
            Enc::load(10),
            Enc::dual(Op::ISub, ZERO, Operand::Reg(0)),
            Enc::dual(Op::IMul, 0, Operand::Reg(1)).post(Shift::right(32)),
            Enc::iupt(0),
        ]);
        // (-10) * 10 = -100, high word of the sign-extended raw
        assert_eq!(out, ((-100i64 as u64) >> 32) as u32);
    }

    #[test]
    fn clamp_programs() {
        // in range
        let out = run(&[
            Enc::load(500),
            Enc::load(250),
            Enc::load(265),
            Enc::clamp(0, Operand::Reg(1), 2),
            Enc::iupt(0),
        ]);
        assert_eq!(out, 265);

        // inverted bounds pick the min bound
        let out = run(&[
            Enc::load(600),
            Enc::load(2000),
            Enc::load(0),
            Enc::clamp(0, Operand::Reg(1), 2),
            Enc::iupt(0),
        ]);
        assert_eq!(out, 2000);

        // signed comparison
        let out = run(&[
            Enc::load(20),
            Enc::load(999),
            Enc::dual(Op::Sub, ZERO, Operand::Reg(0)),
            Enc::load(20),
            Enc::dual(Op::Sub, ZERO, Operand::Reg(0)),
            Enc::clamp(0, Operand::Reg(2), 4).signed(),
            Enc::iupt(0),
        ]);
        assert_eq!(out, (-20i32) as u32);
    }

    #[test]
    fn immediate_table_operand() {
        let out = run(&[
            Enc::dual(Op::Add, ZERO, Operand::Imm(imm::PI)),
            Enc::iupt(0),
        ]);
        assert_eq!(out, imm::value(imm::PI));
    }

    #[test]
    fn zero_flag_drives_conditions() {
        let mut cpu = cpu();
        load(
            &mut cpu,
            &[
                Enc::load(10),
                Enc::load(10),
                Enc::dual(Op::Sub, 1, Operand::Reg(0)).flags(),
                // Z is set: the NEZ load is skipped, the EQZ one commits
                Enc::load(111).cond(Cond::Nez),
                Enc::load(222).cond(Cond::Eqz),
                Enc::iupt(0),
            ],
        );
        assert_eq!(cpu.run(100).unwrap(), 222);
        assert_eq!(cpu.flags(), Flags::Z);
    }

    #[test]
    fn negative_flag_from_committed_window() {
        let mut cpu = cpu();
        load(
            &mut cpu,
            &[
                Enc::load(10),
                Enc::dual(Op::Sub, ZERO, Operand::Reg(0)).flags(),
                Enc::iupt(ZERO),
            ],
        );
        cpu.run(100).unwrap();
        assert_eq!(cpu.flags(), Flags::N);

        // the flags come from the committed 32-bit window, not the raw
        // result: shifting the unsigned negation right 32 commits zero
        cpu.soft_reset();
        load(
            &mut cpu,
            &[
                Enc::load(10),
                Enc::dual(Op::Sub, ZERO, Operand::Reg(0))
                    .post(Shift::right(32))
                    .flags(),
                Enc::iupt(ZERO),
            ],
        );
        cpu.run(100).unwrap();
        assert_eq!(cpu.flags(), Flags::Z);
    }

    #[test]
    fn unused_opcode_patterns_retire_as_nop() {
        let mut cpu = cpu();
        cpu.load_program(&[13u32 << crate::inst::OPCODE_SHIFT, Enc::iupt(5).word()]);
        assert_eq!(cpu.run(100).unwrap(), 0);
        assert_eq!(cpu.reg(0), 0);
    }
}
