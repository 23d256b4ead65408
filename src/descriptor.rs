//! APBH DMA descriptors (spec §4): a fixed header followed by a
//! command-specific run of PIO words that GPMI reads out as register values.
//! Every constructor here is pure with respect to hardware: it builds one
//! descriptor value and returns it, taking already-resolved [`DmaAddress`]es
//! for anything the descriptor needs to point at. Linking descriptors
//! together (`next`/chain bit) is [`crate::chain::Chain`]'s job, not this
//! module's, mirroring how the original builds every descriptor with
//! `memset` + field assignment and only wires `next` in a separate step.

use crate::dma_addr::DmaAddress;
use crate::regs::{dma_flags, gpmi};

/// The 12-byte header shared by every descriptor: APBH's own bookkeeping
/// (`next`, `flags`) plus the one transfer buffer that is plumbed straight to
/// GPMI (`buffer`/`bufsz`) for sub-block-sized moves. ECC-assisted transfers
/// leave `buffer`/`bufsz` zeroed and use the `payload`/`auxiliary` PIO words
/// in [`Dma6`] instead.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct DmaHeader {
    pub next: u32,
    pub flags: u16,
    pub bufsz: u16,
    pub buffer: u32,
}

impl DmaHeader {
    pub const SIZE: usize = core::mem::size_of::<DmaHeader>();
}

/// The `flags` transfer-type field (bits 0-1), named per spec §3/§4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    NoXfer = dma_flags::XFER_NOXFER as isize,
    Write = dma_flags::XFER_WRITE as isize,
    Read = dma_flags::XFER_READ as isize,
    Sense = dma_flags::XFER_SENSE as isize,
}

impl TransferType {
    pub fn bits(self) -> u16 { self as u16 }

    pub fn from_flags(flags: u16) -> Self {
        match flags & dma_flags::XFER_MASK {
            dma_flags::XFER_WRITE => TransferType::Write,
            dma_flags::XFER_READ => TransferType::Read,
            dma_flags::XFER_SENSE => TransferType::Sense,
            _ => TransferType::NoXfer,
        }
    }
}

/// A descriptor that [`crate::chain::Chain`] can size and link without
/// knowing its concrete PIO-word layout.
pub trait Descriptor {
    fn header_mut(&mut self) -> &mut DmaHeader;
    fn header(&self) -> &DmaHeader;
    /// Number of trailing 32-bit PIO words, i.e. `(flags >> 12) & 0xf`.
    fn pio_words() -> u8;

    /// Total on-wire size: matches the original's `dma_size()`.
    fn byte_size() -> usize { DmaHeader::SIZE + 4 * Self::pio_words() as usize }

    /// Point this descriptor's `next` at `addr` and set the chain bit,
    /// mirroring `dma_sequence`.
    fn link(&mut self, addr: DmaAddress) {
        let header = self.header_mut();
        header.next = addr.raw();
        header.flags |= dma_flags::CHAIN;
    }
}

macro_rules! descriptor {
    ($name:ident { $($field:ident),* $(,)? } pio = $pio:expr) => {
        #[derive(Debug, Clone, Copy, Default)]
        #[repr(C)]
        pub struct $name {
            pub header: DmaHeader,
            $(pub $field: u32),*
        }

        impl Descriptor for $name {
            fn header_mut(&mut self) -> &mut DmaHeader { &mut self.header }
            fn header(&self) -> &DmaHeader { &self.header }
            fn pio_words() -> u8 { $pio }
        }
    };
}

descriptor!(Dma0 {} pio = 0);
descriptor!(Dma1 { ctrl0 } pio = 1);
descriptor!(Dma3 { ctrl0, compare, eccctrl } pio = 3);
descriptor!(Dma6 { ctrl0, compare, eccctrl, ecccount, payload, auxiliary } pio = 6);

/// A terminator descriptor: carries the chain's driver-private return code
/// in `buffer` and fires the completion IRQ. Mirrors `dma_terminate`.
pub fn terminate(code: i32) -> Dma0 {
    log::trace!("descriptor: terminate({code})");
    Dma0 {
        header: DmaHeader {
            flags: dma_flags::IRQ_COMPLETE | dma_flags::DECREMENT_SEMAPHORE | dma_flags::XFER_NOXFER,
            buffer: code as u32,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A sense descriptor: branches to `on_failure` based on the previous
/// descriptor's written value. Mirrors `dma_check`.
pub fn sense_check(on_failure: DmaAddress) -> Dma0 {
    Dma0 {
        header: DmaHeader {
            flags: dma_flags::HOT | dma_flags::XFER_SENSE,
            buffer: on_failure.raw(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Drive the GPMI ready-wait state machine for `chip`. Mirrors `nand_w4ready`.
pub fn wait_for_ready(chip: u8) -> Dma1 {
    Dma1 {
        header: DmaHeader {
            flags: dma_flags::HOT | dma_flags::WAIT_END_COMMAND | dma_flags::WAIT_READY | dma_flags::XFER_NOXFER | dma_flags::pio(1),
            ..Default::default()
        },
        ctrl0: gpmi::chip_select(chip) | gpmi::MODE_WAIT_FOR_READY | gpmi::WORD_8BIT,
    }
}

/// Push a command-and-address byte run out to the NAND. `buffer` must point
/// at `addr_size + 1` already-assembled bytes (the command byte followed by
/// up to 7 address bytes). Mirrors `nand_cmdaddr`.
pub fn cmd_addr(chip: u8, buffer: DmaAddress, addr_size: u8) -> Dma3 {
    log::trace!("descriptor: cmd_addr(chip={chip}, addr_size={addr_size})");
    let bufsz = (addr_size & 0x7) as u32 + 1;
    let mut ctrl0 = gpmi::chip_select(chip) | gpmi::MODE_WRITE | gpmi::XFER_COMMAND_BYTES | gpmi::LOCK_CS | gpmi::WORD_8BIT | bufsz;
    if addr_size != 0 {
        ctrl0 |= gpmi::ADDRESS_INCREMENT;
    }
    Dma3 {
        header: DmaHeader {
            flags: dma_flags::HOT | dma_flags::WAIT_END_COMMAND | dma_flags::NAND_LOCK | dma_flags::XFER_READ | dma_flags::pio(3),
            bufsz: bufsz as u16,
            buffer: buffer.raw(),
            ..Default::default()
        },
        ctrl0,
        compare: 0,
        eccctrl: 0,
    }
}

/// Push `bufsz` bytes from `buffer` out to the NAND, unassisted by BCH.
/// Mirrors `nand_write`.
pub fn write_data(chip: u8, buffer: DmaAddress, bufsz: u16) -> Dma3 {
    Dma3 {
        header: DmaHeader {
            flags: dma_flags::HOT | dma_flags::NAND_LOCK | dma_flags::WAIT_END_COMMAND | dma_flags::XFER_READ | dma_flags::pio(3),
            bufsz,
            buffer: buffer.raw(),
            ..Default::default()
        },
        ctrl0: gpmi::chip_select(chip) | gpmi::MODE_WRITE | gpmi::LOCK_CS | gpmi::XFER_DATA_BYTES | gpmi::WORD_8BIT | bufsz as u32,
        compare: 0,
        eccctrl: 0,
    }
}

/// Pull `bufsz` bytes from the NAND into `buffer`, unassisted by BCH.
/// Mirrors `nand_read`.
pub fn read_data(chip: u8, buffer: DmaAddress, bufsz: u16) -> Dma3 {
    Dma3 {
        header: DmaHeader {
            flags: dma_flags::HOT | dma_flags::NAND_LOCK | dma_flags::WAIT_END_COMMAND | dma_flags::XFER_WRITE | dma_flags::pio(3),
            bufsz,
            buffer: buffer.raw(),
            ..Default::default()
        },
        ctrl0: gpmi::chip_select(chip) | gpmi::MODE_READ | gpmi::XFER_DATA_BYTES | gpmi::WORD_8BIT | bufsz as u32,
        compare: 0,
        eccctrl: 0,
    }
}

/// Compare the NAND's next output byte against `value` under `mask`; the
/// result lands where a following [`sense_check`] descriptor can branch on
/// it. Mirrors `nand_readcompare`.
pub fn read_compare(chip: u8, mask: u16, value: u16) -> Dma3 {
    Dma3 {
        header: DmaHeader {
            flags: dma_flags::HOT | dma_flags::NAND_LOCK | dma_flags::WAIT_END_COMMAND | dma_flags::XFER_NOXFER | dma_flags::pio(3),
            ..Default::default()
        },
        ctrl0: gpmi::chip_select(chip) | gpmi::MODE_READ_COMPARE | gpmi::XFER_DATA_BYTES | gpmi::WORD_8BIT | 1,
        compare: (mask as u32) << 16 | value as u32,
        eccctrl: 0,
    }
}

/// Drop out of BCH-assisted mode and wait for the NAND to go ready again.
/// Mirrors `nand_disablebch`.
pub fn disable_bch(chip: u8) -> Dma3 {
    Dma3 {
        header: DmaHeader {
            flags: dma_flags::HOT | dma_flags::WAIT_END_COMMAND | dma_flags::NAND_LOCK | dma_flags::XFER_NOXFER | dma_flags::pio(3),
            ..Default::default()
        },
        ctrl0: gpmi::chip_select(chip) | gpmi::MODE_WAIT_FOR_READY | gpmi::LOCK_CS | gpmi::XFER_DATA_BYTES | gpmi::WORD_8BIT,
        compare: 0,
        eccctrl: 0,
    }
}

/// Read a page through BCH: `payload` is the data sub-blocks (`None` reads
/// metadata only), `auxiliary` is the metadata/syndrome area. Mirrors
/// `nand_ecread`.
pub fn ecc_read(chip: u8, payload: Option<DmaAddress>, auxiliary: DmaAddress, bufsz: u16) -> Dma6 {
    log::trace!("descriptor: ecc_read(chip={chip}, bufsz={bufsz}, aux_only={})", payload.is_none());
    let ecc_mode = if payload.is_some() { gpmi::ECC_MODE_FULL } else { gpmi::ECC_MODE_AUX_ONLY };
    Dma6 {
        header: DmaHeader {
            flags: dma_flags::HOT | dma_flags::NAND_LOCK | dma_flags::WAIT_END_COMMAND | dma_flags::XFER_NOXFER | dma_flags::pio(6),
            ..Default::default()
        },
        ctrl0: gpmi::chip_select(chip) | gpmi::MODE_READ | gpmi::XFER_DATA_BYTES | gpmi::WORD_8BIT | bufsz as u32,
        compare: 0,
        eccctrl: gpmi::ECCCTRL_ENABLE | ecc_mode,
        ecccount: bufsz as u32,
        payload: payload.unwrap_or(DmaAddress::NULL).raw(),
        auxiliary: auxiliary.raw(),
    }
}

/// Write a page through BCH, generating ECC parity over `payload`/`auxiliary`.
/// Mirrors `nand_ecwrite`.
pub fn ecc_write(chip: u8, payload: DmaAddress, auxiliary: DmaAddress, bufsz: u16) -> Dma6 {
    Dma6 {
        header: DmaHeader {
            flags: dma_flags::HOT | dma_flags::NAND_LOCK | dma_flags::WAIT_END_COMMAND | dma_flags::XFER_NOXFER | dma_flags::pio(6),
            ..Default::default()
        },
        ctrl0: gpmi::chip_select(chip) | gpmi::MODE_WRITE | gpmi::LOCK_CS | gpmi::XFER_DATA_BYTES | gpmi::WORD_8BIT,
        compare: 0,
        eccctrl: gpmi::ECCCTRL_WRITE_MODE | gpmi::ECCCTRL_ENABLE | gpmi::ECC_MODE_FULL,
        ecccount: bufsz as u32,
        payload: payload.raw(),
        auxiliary: auxiliary.raw(),
    }
}
