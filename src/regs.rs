//! Named register offsets and bit layouts for the APBH DMA, GPMI and BCH
//! blocks, plus the default BCH ECC layout. All offsets are **word** (u32)
//! offsets, matching [`crate::platform::Csr`]'s addressing convention.
//!
//! Where the hardware exposes the set/clear/toggle alias triple, all three are
//! named here even when only one or two are used by this driver, so that
//! callers reaching for the raw register map never have to guess an offset.

/// APBH DMA controller.
pub mod apbh {
    pub const CTRL0: usize = 0;
    pub const CTRL0_SET: usize = 1;
    pub const CTRL0_CLR: usize = 2;
    pub const CTRL0_TOG: usize = 3;
    pub const CTRL1: usize = 4;
    pub const CTRL1_SET: usize = 5;
    pub const CTRL1_CLR: usize = 6;
    pub const CTRL1_TOG: usize = 7;
    pub const CTRL2: usize = 8;
    pub const CTRL2_SET: usize = 9;
    pub const CTRL2_CLR: usize = 10;
    pub const CTRL2_TOG: usize = 11;
    pub const CHANNEL_CTRL: usize = 12;
    pub const CHANNEL_CTRL_SET: usize = 13;
    pub const CHANNEL_CTRL_CLR: usize = 14;
    pub const CHANNEL_CTRL_TOG: usize = 15;
    pub const DEVSEL: usize = 16;

    /// Per-channel register block base for channel 0; add `channel *
    /// NEXT_CHANNEL` to reach channel N (this driver only ever uses channel 0).
    pub const CH0_CURCMDAR: usize = 64;
    pub const CH0_NXTCMDAR: usize = 68;
    pub const CH0_CMD: usize = 72;
    pub const CH0_BAR: usize = 76;
    pub const CH0_SEMA: usize = 80;
    pub const CH0_DEBUG1: usize = 84;
    pub const CH0_DEBUG2: usize = 88;
    pub const NEXT_CHANNEL: usize = 92;

    pub const VERSION: usize = 512;

    /// `CTRL1` bit 16: enable the channel-0 completion IRQ.
    pub const CTRL1_CH0_IRQ_EN: u32 = 1 << 16;
    /// Soft-reset bit shared by `CTRL0`.
    pub const CTRL0_SFTRST: u32 = 1 << 31;
    /// Clock-gate bit shared by `CTRL0`.
    pub const CTRL0_CLKGATE: u32 = 1 << 30;
}

/// GPMI (General-Purpose Media Interface).
pub mod gpmi {
    pub const CTRL0: usize = 0;
    pub const CTRL0_SET: usize = 1;
    pub const CTRL0_CLR: usize = 2;
    pub const CTRL0_TOG: usize = 3;
    pub const COMPARE: usize = 4;
    pub const ECCCTRL: usize = 8;
    pub const ECCCTRL_SET: usize = 9;
    pub const ECCCTRL_CLR: usize = 10;
    pub const ECCCTRL_TOG: usize = 11;
    pub const ECCCOUNT: usize = 12;
    pub const PAYLOAD: usize = 16;
    pub const AUXILIARY: usize = 20;
    pub const CTRL1: usize = 24;
    pub const CTRL1_SET: usize = 25;
    pub const CTRL1_CLR: usize = 26;
    pub const CTRL1_TOG: usize = 27;
    pub const TIMING0: usize = 28;
    pub const TIMING1: usize = 32;
    pub const TIMING2: usize = 36;
    pub const DATA: usize = 40;
    pub const STAT: usize = 44;

    pub const CTRL0_SFTRST: u32 = 1 << 31;
    pub const CTRL0_CLKGATE: u32 = 1 << 30;

    /// `CTRL1` bits 2/3/18: #R/B busy-low polarity plus write-protect.
    pub const CTRL1_BUSY_LOW: u32 = 1 << 2;
    pub const CTRL1_WP: u32 = 1 << 3;
    pub const CTRL1_DEV_RESET: u32 = 1 << 18;

    /// `TIMING1[31:16]`: wait-for-ready timeout, in GPMI clock cycles.
    pub const TIMING1_TIMEOUT_MAX: u32 = 0xffff << 16;

    // --- ctrl0 field builders -------------------------------------------
    pub const CHIP_SHIFT: u32 = 20;
    pub const ADDRESS_INCREMENT: u32 = 1 << 16;
    pub const XFER_COMMAND_BYTES: u32 = 1 << 17;
    pub const XFER_ADDRESS_BYTES: u32 = 2 << 17;
    pub const XFER_DATA_BYTES: u32 = 0;
    pub const WORD_8BIT: u32 = 1 << 23;
    pub const MODE_WRITE: u32 = 0;
    pub const MODE_READ: u32 = 1 << 24;
    pub const MODE_READ_COMPARE: u32 = 2 << 24;
    pub const MODE_WAIT_FOR_READY: u32 = 3 << 24;
    pub const LOCK_CS: u32 = 1 << 27;

    /// `chip * CHIP_SHIFT`-worth of the ctrl0 chip-select field.
    pub fn chip_select(chip: u8) -> u32 { (chip as u32) << CHIP_SHIFT }

    // --- eccctrl field builders -------------------------------------------
    pub const ECCCTRL_ENABLE: u32 = 1 << 12;
    pub const ECCCTRL_WRITE_MODE: u32 = 1 << 13;
    /// ECC mode value meaning "auxiliary (metadata) only".
    pub const ECC_MODE_AUX_ONLY: u32 = 0x100;
    /// ECC mode value meaning "full payload + auxiliary".
    pub const ECC_MODE_FULL: u32 = 0x1ff;
}

/// BCH (Bose-Chaudhuri-Hocquenghem) error-correction engine.
pub mod bch {
    pub const CTRL: usize = 0;
    pub const CTRL_SET: usize = 1;
    pub const CTRL_CLR: usize = 2;
    pub const CTRL_TOG: usize = 3;
    pub const STATUS0: usize = 4;
    pub const MODE: usize = 8;
    pub const ENCODEPTR: usize = 12;
    pub const DATAPTR: usize = 16;
    pub const METAPTR: usize = 20;
    pub const LAYOUTSELECT: usize = 28;
    pub const LAYOUTSELECT_SET: usize = 29;
    pub const LAYOUTSELECT_CLR: usize = 30;
    pub const LAYOUTSELECT_TOG: usize = 31;
    pub const FLASH0LAYOUT0: usize = 32;
    pub const FLASH0LAYOUT1: usize = 36;
    pub const VERSION: usize = 88;

    /// `CTRL` bit 8: enable the BCH block.
    pub const CTRL_ENABLE: u32 = 1 << 8;
    pub const CTRL_SFTRST: u32 = 1 << 31;
    pub const CTRL_CLKGATE: u32 = 1 << 30;
    /// `STATUS0`/`CTRL_CLR` bit 0: BCH-done IRQ pending/clear.
    pub const IRQ_PENDING: u32 = 1 << 0;

    /// Default single-chip layout: 8 blocks/page, 16-byte metadata, ECC16 on
    /// sub-block 0, GF13, zero-length data0 word count.
    ///
    /// Preserved verbatim (spec §9 open question): it is not documented
    /// whether the silicon can actually run an asymmetric ECC strength across
    /// sub-blocks on this NAND part, but the original driver programs it this
    /// way, so this driver does too.
    pub const DEFAULT_FLASH0LAYOUT0: u32 = 8 << 24 | 16 << 16 | 8 << 11 | 0 << 10 | 0;
    /// Default layout continuation: 4096+218 byte page, ECC14 on sub-blocks
    /// 1..7, GF13, 128-word (512-byte) sub-block size.
    pub fn default_flash0layout1(page_size: u32) -> u32 { page_size << 16 | 7 << 11 | 0 << 10 | 128 }
}

/// DMA descriptor `flags` bit layout (spec §3).
pub mod dma_flags {
    pub const XFER_MASK: u16 = 0b11;
    pub const XFER_NOXFER: u16 = 0;
    pub const XFER_WRITE: u16 = 1;
    pub const XFER_READ: u16 = 2;
    pub const XFER_SENSE: u16 = 3;

    pub const CHAIN: u16 = 1 << 2;
    pub const IRQ_COMPLETE: u16 = 1 << 3;
    pub const NAND_LOCK: u16 = 1 << 4;
    pub const WAIT_READY: u16 = 1 << 5;
    pub const DECREMENT_SEMAPHORE: u16 = 1 << 6;
    pub const WAIT_END_COMMAND: u16 = 1 << 7;
    pub const HOT: u16 = 1 << 8;

    /// Encode a PIO word count (0..=15) into bits 12..=15.
    pub fn pio(count: u8) -> u16 { ((count & 0xf) as u16) << 12 }
    /// Decode the PIO word count out of `flags`.
    pub fn pio_count(flags: u16) -> u8 { ((flags >> 12) & 0xf) as u8 }
}

/// Default page/metadata geometry matching [`bch::DEFAULT_FLASH0LAYOUT0`]/
/// [`bch::default_flash0layout1`].
pub const DEFAULT_PAGE_SIZE: u32 = 4096 + 224;
pub const DEFAULT_META_SIZE: u32 = 16 + 26;
/// Number of ECC sub-blocks per page in the default layout.
pub const DEFAULT_SUBBLOCK_COUNT: usize = 8;

/// GIC SPI interrupt numbers (base offset 32, per the platform's interrupt
/// controller) for the three sources this driver cares about.
pub mod irq {
    pub const DMA_CHANNEL0: u32 = 32 + 13;
    pub const BCH: u32 = 32 + 15;
    pub const GPMI: u32 = 32 + 16;
}

/// Real MMIO base addresses for an iMX6ULL target. Only used when the
/// `board-imx6ull` feature selects a concrete [`crate::platform::Platform`]
/// implementation; the `sim` test harness never reads these.
#[cfg(feature = "board-imx6ull")]
pub mod mmio {
    pub const APBH_BASE: u32 = 0x0180_4000;
    pub const GPMI_BASE: u32 = 0x0180_6000;
    pub const BCH_BASE: u32 = 0x0180_8000;
    pub const IOMUXC_GPR_BASE: u32 = 0x020e_0000;
}
