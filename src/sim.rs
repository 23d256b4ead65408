//! A software model of the GPMI/BCH/APBH trio, used only by this crate's own
//! tests. [`HostedPlatform`] backs every mapped register window with plain
//! heap memory and runs a background thread that polls channel 0's
//! semaphore the way real APBH silicon would be driven by a clock: when the
//! driver writes `CH0_SEMA`, the thread walks the descriptor chain starting
//! at `CH0_NXTCMDAR`, interprets it against a small in-memory NAND medium,
//! and fires the claimed interrupt handlers exactly as `dma_irq_handler`/
//! `bch_irq_handler` expect. It is not a BCH implementation: each page keeps
//! a clean reference copy taken at ECC-write time, and "uncorrectable" is
//! simulated by comparing a sub-block's live bytes against that reference on
//! ECC read, not by decoding real parity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::dma_addr::DmaAddress;
use crate::platform::{ClockDevice, IrqHandler, Platform, ScratchPage};
use crate::regs::{apbh, bch, dma_flags, gpmi, irq};

const SUBBLOCK_SIZE: usize = 512;
const PAGE_PAYLOAD_SIZE: usize = 4096;
const SIM_PAGES_PER_BLOCK: u32 = 4;
const SIM_BLOCK_COUNT: u32 = 4;
const SIM_PAGE_COUNT: u32 = SIM_PAGES_PER_BLOCK * SIM_BLOCK_COUNT;
/// Command byte for `ReadId`, the one command this harness special-cases.
const CMD_READ_ID: u8 = 0x90;
/// Command byte for `EraseBlock`: the harness acts on it as soon as the
/// command+address phase decodes, since erase has no following data phase
/// to hang the medium update off of.
const CMD_ERASE_BLOCK: u8 = 0x60;

struct Region {
    phys_base: u32,
    virt_base: usize,
    len: usize,
}

struct NandMedium {
    /// The live page contents, as the NAND would read them back — this is
    /// what [`HostedPlatform::corrupt_page_byte`] mutates directly.
    pages: Vec<Vec<u8>>,
    meta: Vec<Vec<u8>>,
    /// A clean copy of each page's payload taken at ECC-write time, to
    /// compare `pages` against on ECC read. `None` until the page has been
    /// ECC-written at least once since its last erase.
    reference: Vec<Option<Vec<u8>>>,
}

impl NandMedium {
    fn new() -> Self {
        NandMedium {
            pages: (0..SIM_PAGE_COUNT).map(|_| vec![0xffu8; PAGE_PAYLOAD_SIZE]).collect(),
            meta: (0..SIM_PAGE_COUNT).map(|_| vec![0xffu8; 64]).collect(),
            reference: (0..SIM_PAGE_COUNT).map(|_| None).collect(),
        }
    }

    fn erase_block(&mut self, block: u32) {
        for p in 0..SIM_PAGES_PER_BLOCK {
            let idx = (block * SIM_PAGES_PER_BLOCK + p) as usize;
            self.pages[idx].iter_mut().for_each(|b| *b = 0xff);
            self.meta[idx].iter_mut().for_each(|b| *b = 0xff);
            self.reference[idx] = None;
        }
    }
}

/// What the currently-executing chain's most recent address-bearing
/// command+address phase was (as opposed to a cmd2-only follow-up, which
/// carries `addr_size == 0` and leaves this untouched).
#[derive(Default, Clone, Copy)]
struct PendingOp {
    cmd1: u8,
    page_addr: u32,
}

struct Interp {
    pending: Option<PendingOp>,
    last_compare_ok: bool,
}

struct Inner {
    regions: Vec<Region>,
    next_phys: u32,
    map_calls: usize,
    apbh: Vec<u32>,
    gpmi: Vec<u32>,
    bch: Vec<u32>,
    mux: Vec<u32>,
    handlers: HashMap<u32, (IrqHandler, usize)>,
    medium: NandMedium,
}

impl Inner {
    fn region_virt(&self, phys: DmaAddress) -> *mut u8 {
        let raw = phys.raw();
        for r in &self.regions {
            if raw >= r.phys_base && (raw - r.phys_base) < r.len as u32 {
                return (r.virt_base + (raw - r.phys_base) as usize) as *mut u8;
            }
        }
        panic!("sim: no region backs physical address {raw:#x}");
    }

    fn read_header(&self, virt: *const u8) -> (u32, u16, u32) {
        unsafe {
            let next = (virt as *const u32).read_unaligned();
            let flags = (virt.add(4) as *const u16).read_unaligned();
            let buffer = (virt.add(8) as *const u32).read_unaligned();
            (next, flags, buffer)
        }
    }

    fn read_u32(&self, virt: *const u8, field_offset: usize) -> u32 {
        unsafe { (virt.add(field_offset) as *const u32).read_unaligned() }
    }
}

/// A hosted stand-in for real iMX6ULL-class hardware, for tests only.
#[derive(Clone)]
pub struct HostedPlatform {
    inner: Arc<Mutex<Inner>>,
}

impl HostedPlatform {
    pub fn new() -> Self {
        let inner = Arc::new(Mutex::new(Inner {
            regions: Vec::new(),
            next_phys: 0x8000_0000,
            map_calls: 0,
            apbh: vec![0u32; 256],
            gpmi: vec![0u32; 256],
            bch: vec![0u32; 256],
            mux: vec![0u32; 256],
            handlers: HashMap::new(),
            medium: NandMedium::new(),
        }));

        let worker = inner.clone();
        thread::spawn(move || Self::run(worker));

        HostedPlatform { inner }
    }

    /// Register `len` host-allocated bytes as DMA-visible and return their
    /// virtual pointer and physical handle, for tests that need a data
    /// buffer distinct from the driver's own scratch page.
    pub fn alloc_buffer(&self, len: usize) -> (*mut u8, DmaAddress) {
        let mut inner = self.inner.lock().unwrap();
        let backing = vec![0u8; len].into_boxed_slice();
        let virt = Box::leak(backing).as_mut_ptr();
        let phys = inner.next_phys;
        inner.next_phys += len as u32 + 0x1000;
        inner.regions.push(Region { phys_base: phys, virt_base: virt as usize, len });
        (virt, DmaAddress::new(phys))
    }

    /// Flip a byte in a previously-written page, to exercise uncorrectable
    /// detection on a following ECC read.
    pub fn corrupt_page_byte(&self, page_addr: u32, byte_offset: usize) {
        let mut inner = self.inner.lock().unwrap();
        let idx = (page_addr % SIM_PAGE_COUNT) as usize;
        inner.medium.pages[idx][byte_offset] ^= 0xff;
    }

    fn run(inner: Arc<Mutex<Inner>>) {
        loop {
            thread::sleep(Duration::from_micros(200));
            let (first, handlers_snapshot) = {
                let mut guard = inner.lock().unwrap();
                if guard.apbh[apbh::CH0_SEMA] == 0 {
                    continue;
                }
                guard.apbh[apbh::CH0_SEMA] = 0;
                let first = guard.apbh[apbh::CH0_NXTCMDAR];
                (first, guard.handlers.clone())
            };
            Self::execute_chain(&inner, DmaAddress::new(first), &handlers_snapshot);
        }
    }

    fn execute_chain(inner: &Arc<Mutex<Inner>>, start: DmaAddress, handlers: &HashMap<u32, (IrqHandler, usize)>) {
        let mut cursor = start;
        let mut interp = Interp { pending: None, last_compare_ok: true };

        loop {
            let (next, flags, buffer, ctrl0) = {
                let guard = inner.lock().unwrap();
                let virt = guard.region_virt(cursor);
                let (next, flags, buffer) = guard.read_header(virt);
                let ctrl0 = guard.read_u32(virt, 12);
                (next, flags, buffer, ctrl0)
            };

            if flags & dma_flags::IRQ_COMPLETE != 0 {
                let result = buffer as i32;
                inner.lock().unwrap().apbh[apbh::CH0_BAR] = result as u32;
                if let Some((handler, ctx)) = handlers.get(&irq::DMA_CHANNEL0) {
                    handler(irq::DMA_CHANNEL0, *ctx as *mut ());
                }
                return;
            }

            let xfer = flags & dma_flags::XFER_MASK;
            let mode = ctrl0 & (0b11 << 24);
            let pio_words = dma_flags::pio_count(flags);

            if xfer == dma_flags::XFER_SENSE {
                cursor = if interp.last_compare_ok { DmaAddress::new(next) } else { DmaAddress::new(buffer) };
                continue;
            }

            if mode == gpmi::MODE_WRITE && ctrl0 & gpmi::XFER_COMMAND_BYTES != 0 {
                let bufsz = {
                    let guard = inner.lock().unwrap();
                    let virt = guard.region_virt(cursor);
                    u16::from_ne_bytes([unsafe { *virt.add(6) }, unsafe { *virt.add(7) }])
                };
                let mut guard = inner.lock().unwrap();
                let virt = guard.region_virt(DmaAddress::new(buffer));
                let bytes: Vec<u8> = (0..bufsz as usize).map(|i| unsafe { *virt.add(i) }).collect();
                if ctrl0 & gpmi::ADDRESS_INCREMENT != 0 && bytes.len() >= 4 {
                    let page_addr = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], 0]);
                    if bytes[0] == CMD_ERASE_BLOCK {
                        guard.medium.erase_block(page_addr / SIM_PAGES_PER_BLOCK);
                    }
                    interp.pending = Some(PendingOp { cmd1: bytes[0], page_addr });
                }
                drop(guard);
            } else if mode == gpmi::MODE_READ_COMPARE {
                let compare = {
                    let guard = inner.lock().unwrap();
                    let virt = guard.region_virt(cursor);
                    guard.read_u32(virt, 16)
                };
                let mask = (compare >> 16) as u16;
                let value = compare as u16;
                let status_byte: u16 = 0; // the sim NAND is always ready/successful
                interp.last_compare_ok = status_byte & mask == value & mask;
            } else if mode == gpmi::MODE_WRITE && pio_words == 3 {
                Self::do_transfer(inner, &interp, buffer, true);
            } else if mode == gpmi::MODE_READ && pio_words == 3 {
                Self::do_transfer(inner, &interp, buffer, false);
            } else if pio_words == 6 {
                let (eccctrl, ecccount, payload, auxiliary) = {
                    let guard = inner.lock().unwrap();
                    let virt = guard.region_virt(cursor);
                    (guard.read_u32(virt, 20), guard.read_u32(virt, 24), guard.read_u32(virt, 28), guard.read_u32(virt, 32))
                };
                let write_mode = eccctrl & gpmi::ECCCTRL_WRITE_MODE != 0;
                Self::do_ecc_transfer(inner, &interp, payload, auxiliary, ecccount as u16, write_mode);
            }

            if flags & dma_flags::CHAIN == 0 {
                return;
            }
            cursor = DmaAddress::new(next);
        }
    }

    fn do_transfer(inner: &Arc<Mutex<Inner>>, interp: &Interp, buffer_phys: u32, write_to_nand: bool) {
        let Some(op) = interp.pending else { return };
        let mut guard = inner.lock().unwrap();
        let idx = (op.page_addr % SIM_PAGE_COUNT) as usize;
        let virt = guard.region_virt(DmaAddress::new(buffer_phys));

        if op.cmd1 == CMD_READ_ID && !write_to_nand {
            let id = [0xadu8, 0xf1, 0x95, 0x15];
            for (i, b) in id.iter().enumerate() {
                unsafe { *virt.add(i) = *b };
            }
            return;
        }

        if write_to_nand {
            let len = guard.medium.pages[idx].len();
            let bytes: Vec<u8> = (0..len).map(|i| unsafe { *virt.add(i) }).collect();
            guard.medium.pages[idx].copy_from_slice(&bytes);
        } else {
            let src = guard.medium.pages[idx].clone();
            for (i, b) in src.iter().enumerate() {
                unsafe { *virt.add(i) = *b };
            }
        }
    }

    fn do_ecc_transfer(inner: &Arc<Mutex<Inner>>, interp: &Interp, payload: u32, auxiliary: u32, _len: u16, write_mode: bool) {
        let Some(op) = interp.pending else { return };
        let idx = (op.page_addr % SIM_PAGE_COUNT) as usize;
        let mut guard = inner.lock().unwrap();

        if write_mode {
            if payload != 0 {
                let virt = guard.region_virt(DmaAddress::new(payload));
                let n = PAGE_PAYLOAD_SIZE;
                let bytes: Vec<u8> = (0..n).map(|i| unsafe { *virt.add(i) }).collect();
                guard.medium.pages[idx].copy_from_slice(&bytes);
                guard.medium.reference[idx] = Some(bytes);
            }
            if auxiliary != 0 {
                let virt = guard.region_virt(DmaAddress::new(auxiliary));
                let n = guard.medium.meta[idx].len();
                let bytes: Vec<u8> = (0..n).map(|i| unsafe { *virt.add(i) }).collect();
                guard.medium.meta[idx].copy_from_slice(&bytes);
            }
            return;
        }

        let mut status0 = 0u32;
        if payload != 0 {
            let page = guard.medium.pages[idx].clone();
            let reference = guard.medium.reference[idx].clone();
            let virt = guard.region_virt(DmaAddress::new(payload));
            for (i, b) in page.iter().enumerate() {
                unsafe { *virt.add(i) = *b };
            }
            for sub in 0..crate::driver::STATUS_SUBBLOCKS_PER_WORD {
                let start = sub * SUBBLOCK_SIZE;
                let end = (start + SUBBLOCK_SIZE).min(page.len());
                let byte = match &reference {
                    // never ECC-written since the last erase: only a clean
                    // erased sub-block is a non-error read.
                    None if page[start..end].iter().all(|b| *b == 0xff) => crate::driver::STATUS_ERASED,
                    None => crate::driver::STATUS_UNCORRECTABLE,
                    Some(clean) if clean[start..end] == page[start..end] => crate::driver::STATUS_CLEAN,
                    Some(_) => crate::driver::STATUS_UNCORRECTABLE,
                };
                status0 |= (byte as u32) << (sub * 8);
            }
        }
        if auxiliary != 0 {
            let meta = guard.medium.meta[idx].clone();
            let virt = guard.region_virt(DmaAddress::new(auxiliary));
            for (i, b) in meta.iter().enumerate() {
                unsafe { *virt.add(i) = *b };
            }
        }
        guard.bch[bch::STATUS0] = status0;
        let ctx = guard.handlers.get(&irq::BCH).copied();
        drop(guard);

        if let Some((handler, raw)) = ctx {
            handler(irq::BCH, raw as *mut ());
        }
    }
}

impl Platform for HostedPlatform {
    unsafe fn map_device_memory(&self, _base: u32, _len: usize) -> *mut u32 {
        let mut inner = self.inner.lock().unwrap();
        let call = inner.map_calls;
        inner.map_calls += 1;
        match call {
            0 => inner.apbh.as_mut_ptr(),
            1 => inner.gpmi.as_mut_ptr(),
            2 => inner.bch.as_mut_ptr(),
            _ => inner.mux.as_mut_ptr(),
        }
    }

    fn virt_to_phys(&self, virt: *const u8) -> DmaAddress {
        let inner = self.inner.lock().unwrap();
        for r in &inner.regions {
            if (virt as usize) >= r.virt_base && (virt as usize - r.virt_base) < r.len {
                return DmaAddress::new(r.phys_base + (virt as usize - r.virt_base) as u32);
            }
        }
        panic!("sim: virt_to_phys of an address not allocated through this platform");
    }

    fn set_device_clock(&self, _device: ClockDevice, _enabled: bool) {}

    fn claim_interrupt(&self, irq: u32, handler: IrqHandler, context: *mut ()) {
        self.inner.lock().unwrap().handlers.insert(irq, (handler, context as usize));
    }

    fn alloc_scratch_page(&self) -> ScratchPage {
        let (virt, phys) = self.alloc_buffer(4096);
        ScratchPage { virt, phys, len: 4096 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MmioBases, NandController};
    use crate::regs;

    fn new_controller() -> (NandController<HostedPlatform>, HostedPlatform) {
        let platform = HostedPlatform::new();
        let scratch = platform.alloc_scratch_page();
        let bases = MmioBases { apbh: 0, gpmi: 0, bch: 0, mux: 0 };
        let ctl = NandController::new(platform.clone(), bases, regs::DEFAULT_PAGE_SIZE, regs::DEFAULT_META_SIZE, scratch);
        (ctl, platform)
    }

    #[test]
    fn reset_completes_successfully() {
        let (mut ctl, _platform) = new_controller();
        assert!(ctl.reset(0).is_ok());
    }

    #[test]
    fn program_then_read_round_trips() {
        let (mut ctl, platform) = new_controller();
        let (data_virt, data_phys) = platform.alloc_buffer(4096);
        let pattern: Vec<u8> = (0..4096usize).map(|i| (i % 251) as u8).collect();
        unsafe { std::ptr::copy_nonoverlapping(pattern.as_ptr(), data_virt, pattern.len()) };
        let (_avirt, aux) = platform.alloc_buffer(64);

        ctl.erase(0).unwrap();
        ctl.program(0, data_phys, Some(aux)).unwrap();

        let (readback_virt, readback_phys) = platform.alloc_buffer(4096);
        let (_ravirt, raux) = platform.alloc_buffer(64);
        let status = ctl.read(0, 0, readback_phys, Some(raux)).unwrap();
        assert!(status.is_some());
        let got = unsafe { std::slice::from_raw_parts(readback_virt, 4096) };
        assert_eq!(got, &pattern[..]);
    }

    #[test]
    fn erase_then_ecc_read_reports_erased_sentinel() {
        let (mut ctl, platform) = new_controller();
        ctl.erase(0).unwrap();
        let (_virt, payload) = platform.alloc_buffer(4096);
        let (_avirt, aux) = platform.alloc_buffer(64);
        let status = ctl.read(0, 0, payload, Some(aux)).unwrap().unwrap();
        for i in 0..crate::driver::STATUS_SUBBLOCKS_PER_WORD {
            assert_eq!(crate::driver::subblock_status(status, i), crate::driver::STATUS_ERASED);
        }
    }

    #[test]
    fn corrupted_page_is_reported_uncorrectable() {
        let (mut ctl, platform) = new_controller();
        let (data_virt, data_phys) = platform.alloc_buffer(4096);
        unsafe { std::ptr::write_bytes(data_virt, 0x42, 4096) };
        let (_avirt, aux) = platform.alloc_buffer(64);

        ctl.erase(0).unwrap();
        ctl.program(0, data_phys, Some(aux)).unwrap();
        platform.corrupt_page_byte(0, 10);

        let (_rvirt, readback) = platform.alloc_buffer(4096);
        let (_rauxvirt, raux) = platform.alloc_buffer(64);
        let result = ctl.read(0, 0, readback, Some(raux));
        assert!(matches!(result, Err(crate::error::Error::Uncorrectable)));
    }

    #[test]
    fn invalid_program_size_is_rejected_before_anything_runs() {
        let (mut ctl, platform) = new_controller();
        let (_virt, data) = platform.alloc_buffer(4);
        assert!(ctl.program_raw(0, data, 0).is_err());
    }
}
