//! Reciprocal unit interface
//!
//! The hardware reciprocal unit is a latency-bounded black box; its
//! convergence algorithm is out of scope here. The core treats it as
//! synchronous: `None` means not-ready and stalls the issuing RCP
//! instruction for a cycle.

/// Q16.16 fixed-point one.
pub const ONE_Q16: u32 = 1 << 16;

pub trait RcpPort {
    fn try_rcp(&mut self, operand: u32) -> Option<u32>;
}

/// Single-cycle reference model: `ONE_Q16 / a`, saturating for 0.
pub struct FixedRcp;

impl RcpPort for FixedRcp {
    fn try_rcp(&mut self, operand: u32) -> Option<u32> {
        Some(if operand == 0 {
            u32::MAX
        } else {
            ONE_Q16 / operand
        })
    }
}

/// Becomes ready only on every `period`-th request, for the stall paths.
pub struct SlowRcp {
    period: u32,
    attempts: u32,
}

impl SlowRcp {
    pub fn new(period: u32) -> SlowRcp {
        assert!(period > 0);
        SlowRcp {
            period,
            attempts: 0,
        }
    }
}

impl RcpPort for SlowRcp {
    fn try_rcp(&mut self, operand: u32) -> Option<u32> {
        self.attempts += 1;
        if self.attempts % self.period == 0 {
            FixedRcp.try_rcp(operand)
        } else {
            None
        }
    }
}
