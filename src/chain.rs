//! The append-only descriptor-chain builder (spec §4.3). A [`Chain`] owns no
//! hardware state; it is a cursor into a [`ScratchPage`] that knows how to
//! lay out and link descriptors the same way the original driver's local
//! `next`/`dma->last` pointer arithmetic does: the next free offset is
//! always derived from the last descriptor written, by reading its own
//! `flags` PIO-count field back out of memory, not from a separately tracked
//! cursor. That is also how a transient raw-byte region (the inline
//! command+address scratch [`Chain::issue`] writes before its descriptor)
//! can sit unlinked in the same arena without disturbing the bookkeeping.

use crate::commands::Command;
use crate::descriptor::{self, Descriptor, Dma0, Dma1, Dma3, DmaHeader};
use crate::dma_addr::DmaAddress;
use crate::error::Error;
use crate::platform::ScratchPage;

/// A data-write phase to attach to an issued command, and the ECC
/// destination to pair it with, if any.
#[derive(Debug, Clone, Copy)]
pub struct IssueData {
    pub buffer: DmaAddress,
    pub len: u16,
    pub aux: Option<DmaAddress>,
}

pub struct Chain {
    page: ScratchPage,
    first: Option<usize>,
    last: Option<usize>,
}

impl Chain {
    pub fn new(page: ScratchPage) -> Self { Chain { page, first: None, last: None } }

    /// Drop any previously built chain and start writing into `page` again
    /// from the top, mirroring every top-level driver operation's
    /// `dma->first = dma->last = NULL`.
    pub fn reset(&mut self) {
        self.first = None;
        self.last = None;
    }

    /// Physical address of the first descriptor, to hand to the APBH
    /// channel's `NXTCMDAR` register. `None` if nothing has been built yet.
    pub fn first_address(&self) -> Option<DmaAddress> { self.first.map(|off| self.phys_of(off)) }

    fn phys_of(&self, offset: usize) -> DmaAddress { self.page.phys.offset(offset as u32) }

    /// Read `[offset..offset+len]`'s worth of dynamically-sized descriptor
    /// back out of the header it was written with, mirroring `dma_size()`.
    fn descriptor_size_at(&self, offset: usize) -> usize {
        let flags = unsafe { (self.page.virt.add(offset + 4) as *const u16).read_unaligned() };
        DmaHeader::SIZE + 4 * ((flags >> 12) & 0xf) as usize
    }

    /// The next free byte offset in the arena: just past the last descriptor
    /// sequenced so far, or zero if the chain is empty.
    fn cursor(&self) -> usize {
        match self.last {
            Some(off) => off + self.descriptor_size_at(off),
            None => 0,
        }
    }

    /// Write `desc`'s bytes at `offset` without touching the chain's
    /// first/last bookkeeping or linking it to anything.
    fn store<D: Descriptor + Copy>(&mut self, offset: usize, desc: D) {
        unsafe { (self.page.virt.add(offset) as *mut D).write(desc) };
    }

    /// Write raw bytes at `offset`, outside of any descriptor's layout. Used
    /// for the inline command+address scratch that [`Chain::issue`] builds.
    fn store_raw(&mut self, offset: usize, bytes: &[u8]) {
        unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), self.page.virt.add(offset), bytes.len()) };
    }

    /// Link the previously-last descriptor to the one now sitting at
    /// `offset`, and make `offset` the new last (first, if the chain was
    /// empty). Mirrors `dma_sequence` plus `dma->last = next`.
    fn sequence(&mut self, offset: usize) {
        if let Some(last_off) = self.last {
            unsafe {
                let flags_ptr = self.page.virt.add(last_off + 4) as *mut u16;
                flags_ptr.write_unaligned(flags_ptr.read_unaligned() | crate::regs::dma_flags::CHAIN);
                (self.page.virt.add(last_off) as *mut u32).write_unaligned(self.phys_of(offset).raw());
            }
        }
        if self.first.is_none() {
            self.first = Some(offset);
        }
        self.last = Some(offset);
    }

    /// Wait for the NAND to report ready on `chip`. `on_timeout` is the
    /// driver-private code the chain aborts with if the device never comes
    /// ready; when `None`, the failure branch loops back onto this same
    /// wait-for-ready descriptor, polling until the device is ready rather
    /// than ever giving up. Mirrors `flashdrv_wait4ready`.
    pub fn wait_for_ready(&mut self, chip: u8, on_timeout: Option<i32>) {
        let terminator_offset = self.cursor();
        let mut wfr_offset = terminator_offset;
        if let Some(code) = on_timeout {
            self.store(terminator_offset, descriptor::terminate(code));
            wfr_offset += Dma0::byte_size();
        }
        self.store(wfr_offset, descriptor::wait_for_ready(chip));
        self.sequence(wfr_offset);

        let check_offset = wfr_offset + Dma1::byte_size();
        self.store(check_offset, descriptor::sense_check(self.phys_of(terminator_offset)));
        self.sequence(check_offset);
    }

    /// Compare `read_status`'s low byte against `value` (under `mask`),
    /// aborting with `on_mismatch` if it doesn't match. Mirrors
    /// `flashdrv_readcompare`.
    pub fn read_compare(&mut self, chip: u8, mask: u16, value: u16, on_mismatch: i32) {
        let terminator_offset = self.cursor();
        self.store(terminator_offset, descriptor::terminate(on_mismatch));

        let rc_offset = terminator_offset + Dma0::byte_size();
        self.store(rc_offset, descriptor::read_compare(chip, mask, value));
        self.sequence(rc_offset);

        let check_offset = rc_offset + Dma3::byte_size();
        self.store(check_offset, descriptor::sense_check(self.phys_of(terminator_offset)));
        self.sequence(check_offset);
    }

    /// Drop out of BCH-assisted mode, mirroring `flashdrv_disablebch`.
    pub fn disable_bch(&mut self, chip: u8) {
        let offset = self.cursor();
        self.store(offset, descriptor::disable_bch(chip));
        self.sequence(offset);
    }

    /// Append the chain's terminator: on success this reports `0`. Mirrors
    /// `flashdrv_finish`.
    pub fn finish(&mut self) {
        let offset = self.cursor();
        self.store(offset, descriptor::terminate(0));
        self.sequence(offset);
    }

    /// Pull `len` bytes into `buffer` (BCH-assisted if `aux` is given).
    /// Mirrors `flashdrv_readback`.
    pub fn readback(&mut self, chip: u8, len: u16, buffer: DmaAddress, aux: Option<DmaAddress>) {
        let offset = self.cursor();
        match aux {
            None => self.store(offset, descriptor::read_data(chip, buffer, len)),
            Some(aux) => self.store(offset, descriptor::ecc_read(chip, Some(buffer), aux, len)),
        }
        self.sequence(offset);
    }

    /// Issue a NAND command: a command byte, up to 7 address bytes and an
    /// optional second command byte, with an optional data-write phase in
    /// between. Mirrors `flashdrv_issue`, including its embedded
    /// command+address scratch living unlinked in the same arena as the
    /// descriptor that reads it back out.
    pub fn issue(&mut self, cmd: Command, chip: u8, addr: &[u8], data: Option<IssueData>) -> Result<(), Error> {
        let spec = cmd.spec();
        spec.validate(data.map_or(0, |d| d.len))?;

        let mut scratch = [0u8; 8];
        scratch[0] = spec.cmd1;
        let addr_size = spec.addr_size as usize;
        scratch[1..1 + addr_size].copy_from_slice(&addr[..addr_size]);
        scratch[7] = spec.cmd2;

        let cmdaddr_offset = self.cursor();
        self.store_raw(cmdaddr_offset, &scratch);
        let cmdaddr_phys = self.phys_of(cmdaddr_offset);

        let desc_offset = cmdaddr_offset + 8;
        self.store(desc_offset, descriptor::cmd_addr(chip, cmdaddr_phys, spec.addr_size));
        self.sequence(desc_offset);

        if let Some(d) = data {
            let offset = self.cursor();
            match d.aux {
                None => self.store(offset, descriptor::write_data(chip, d.buffer, d.len)),
                Some(aux) => self.store(offset, descriptor::ecc_write(chip, d.buffer, aux, d.len)),
            }
            self.sequence(offset);
        }

        if spec.cmd2 != 0 {
            let cmd2_phys = self.phys_of(cmdaddr_offset + 7);
            let offset = self.cursor();
            self.store(offset, descriptor::cmd_addr(chip, cmd2_phys, 0));
            self.sequence(offset);
        }

        Ok(())
    }
}
