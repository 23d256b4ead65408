//! The boundary between this driver and the surrounding system: MMIO
//! mapping, clock gating, address translation, interrupt claiming and
//! DMA-capable memory allocation. None of this is implemented here — only
//! the interface is specified, the way USB/GPIO/sensor drivers in the
//! corpus this crate was modeled on take their register windows and IRQ
//! registration from a platform-provided `CSR`/`claim_interrupt` pair rather
//! than mapping memory themselves.

use crate::dma_addr::DmaAddress;
use core::sync::atomic::{compiler_fence, Ordering};

/// One of the three hardware blocks this driver clock-gates independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockDevice {
    Gpmi,
    Bch,
    Apbh,
}

/// A DMA-capable scratch page: a chunk of physically-contiguous, uncached
/// memory the driver builds descriptor chains and transfer buffers in.
/// `virt` is what the driver reads/writes through; `phys` is what gets
/// written into descriptor fields.
#[derive(Debug, Clone, Copy)]
pub struct ScratchPage {
    pub virt: *mut u8,
    pub phys: DmaAddress,
    pub len: usize,
}

/// Signature a platform invokes a claimed interrupt handler with. The
/// `*mut ()` context pointer is whatever was passed to
/// [`Platform::claim_interrupt`]; handlers downcast it back to their own
/// state, mirroring `xous::claim_interrupt`'s `fn(usize, *mut usize)`
/// handlers in the corpus this pattern is drawn from.
pub type IrqHandler = fn(irq: u32, context: *mut ());

/// Everything this driver needs from the surrounding system. A real
/// implementation maps physical register windows into the process's
/// address space, gates clocks, translates virtual to physical addresses for
/// descriptor fields, and claims the three interrupt lines this driver uses.
pub trait Platform {
    /// Map `len` bytes of MMIO space at physical address `base` and return a
    /// pointer usable for volatile register access.
    ///
    /// # Safety
    /// `base`/`len` must describe a real, exclusively-owned device register
    /// window; the returned pointer is valid for the platform's lifetime.
    unsafe fn map_device_memory(&self, base: u32, len: usize) -> *mut u32;

    /// Translate a virtual address returned from [`Platform::alloc_scratch_page`]
    /// (or a sub-offset of one) into the physical address APBH must see.
    fn virt_to_phys(&self, virt: *const u8) -> DmaAddress;

    /// Enable or disable the clock feeding `device`.
    fn set_device_clock(&self, device: ClockDevice, enabled: bool);

    /// Register `handler` for `irq`, to be invoked with `context` on every
    /// occurrence until the platform is torn down.
    fn claim_interrupt(&self, irq: u32, handler: IrqHandler, context: *mut ());

    /// Allocate a pinned, uncached page suitable for descriptor chains and
    /// transfer buffers.
    fn alloc_scratch_page(&self) -> ScratchPage;
}

/// A shared, `&self`-based register window over a word-addressed MMIO block,
/// using set/clear/toggle alias registers instead of read-modify-write where
/// the hardware provides them. `&self` (rather than `&mut self`) is what lets
/// the same [`Csr`] be held by both the thread that submits chains and the
/// interrupt handler that observes completion.
#[derive(Debug, Clone, Copy)]
pub struct Csr {
    base: *mut u32,
}

/// Safe to share across the submitter thread and interrupt context: every
/// access is a single fenced volatile load or store, and the register
/// blocks this wraps are inherently shared mutable hardware state.
unsafe impl Send for Csr {}
unsafe impl Sync for Csr {}

impl Csr {
    /// # Safety
    /// `base` must be a valid, word-aligned pointer to the mapped register
    /// window this `Csr` will index into, for as long as this value lives.
    pub unsafe fn new(base: *mut u32) -> Self { Csr { base } }

    /// Read the word at `offset` (in words, not bytes).
    pub fn r(&self, offset: usize) -> u32 {
        compiler_fence(Ordering::SeqCst);
        let v = unsafe { self.base.add(offset).read_volatile() };
        compiler_fence(Ordering::SeqCst);
        v
    }

    /// Write `value` to the word at `offset`, unconditionally.
    pub fn wo(&self, offset: usize, value: u32) {
        compiler_fence(Ordering::SeqCst);
        unsafe { self.base.add(offset).write_volatile(value) };
        compiler_fence(Ordering::SeqCst);
    }

    /// Set `bits` in the register at `offset` via its `_SET` alias, one word
    /// past `offset` by this driver's register map convention.
    pub fn set(&self, offset: usize, bits: u32) { self.wo(offset + 1, bits) }

    /// Clear `bits` in the register at `offset` via its `_CLR` alias.
    pub fn clear(&self, offset: usize, bits: u32) { self.wo(offset + 2, bits) }

    /// Toggle `bits` in the register at `offset` via its `_TOG` alias.
    pub fn toggle(&self, offset: usize, bits: u32) { self.wo(offset + 3, bits) }
}
