//! Completion synchronization between a blocking submitter thread and the
//! two interrupt sources that publish a chain's outcome: APBH (the chain's
//! own terminator fired) and BCH (ECC decode finished). One mutex guards a
//! pair of latches, one condvar per latch, grounded in the same
//! `std::sync::Mutex`-wrapped-hardware-state shape the corpus's USB driver
//! uses for its own hardware handle — generalized here to two independent
//! wait conditions instead of one.

use std::sync::{Condvar, Mutex};

use crate::platform::Csr;
use crate::regs::{apbh, bch};

#[derive(Default)]
struct Latches {
    /// The chain terminator's return code, published by [`dma_irq_handler`].
    /// `None` until a chain completes; consumed (and reset to `None`) by
    /// [`SyncCore::wait_for_dma`], so a spurious wakeup just re-checks it.
    dma_result: Option<i32>,
    /// `BCH_STATUS0`'s raw value, published by [`bch_irq_handler`].
    bch_status: Option<u32>,
}

/// Owns the two register windows the IRQ handlers need to read/acknowledge,
/// plus the latches and condvars a submitter blocks on. A driver registers
/// [`dma_irq_handler`]/[`bch_irq_handler`]/[`gpmi_irq_handler`] against this
/// value's address via [`crate::platform::Platform::claim_interrupt`].
pub struct SyncCore {
    state: Mutex<Latches>,
    dma_done: Condvar,
    bch_done: Condvar,
    apbh: Csr,
    bch: Csr,
}

impl SyncCore {
    pub fn new(apbh: Csr, bch: Csr) -> Self {
        SyncCore { state: Mutex::new(Latches::default()), dma_done: Condvar::new(), bch_done: Condvar::new(), apbh, bch }
    }

    /// Clear both latches before running a new chain, so a stale result from
    /// a previous submission can never be mistaken for this one's.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.dma_result = None;
        state.bch_status = None;
    }

    /// Block until the running chain's terminator fires, returning its
    /// driver-private return code.
    pub fn wait_for_dma(&self) -> i32 {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(result) = state.dma_result.take() {
                return result;
            }
            state = self.dma_done.wait(state).unwrap();
        }
    }

    /// Block until BCH reports decode status for the running chain.
    pub fn wait_for_bch(&self) -> u32 {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(status) = state.bch_status.take() {
                return status;
            }
            state = self.bch_done.wait(state).unwrap();
        }
    }

    fn publish_dma_result(&self, result: i32) {
        let mut state = self.state.lock().unwrap();
        state.dma_result = Some(result);
        self.dma_done.notify_one();
    }

    fn publish_bch_status(&self, status: u32) {
        let mut state = self.state.lock().unwrap();
        state.bch_status = Some(status);
        self.bch_done.notify_one();
    }
}

/// # Safety
/// `context` must point at a live [`SyncCore`] for the duration this handler
/// is claimed against its interrupt line.
pub fn dma_irq_handler(_irq: u32, context: *mut ()) {
    let core = unsafe { &*(context as *const SyncCore) };
    let result = core.apbh.r(apbh::CH0_BAR) as i32;
    core.apbh.wo(apbh::CTRL1_CLR, 1);
    core.publish_dma_result(result);
}

/// # Safety
/// `context` must point at a live [`SyncCore`] for the duration this handler
/// is claimed against its interrupt line.
pub fn bch_irq_handler(_irq: u32, context: *mut ()) {
    let core = unsafe { &*(context as *const SyncCore) };
    let status = core.bch.r(bch::STATUS0);
    core.bch.wo(bch::CTRL_CLR, 1);
    core.publish_bch_status(status);
}

/// GPMI never needs to latch anything for this driver; the handler exists so
/// the interrupt line has an owner, matching the original's empty
/// `gpmi_irqHandler`.
pub fn gpmi_irq_handler(_irq: u32, _context: *mut ()) {}
