//! The top-level NAND operations (spec §5): `reset`, `erase`, `program`,
//! `read`, plus the raw (BCH-bypassing) and supplemented convenience
//! variants. Each builds a fresh chain, submits it to APBH channel 0, and
//! blocks on [`SyncCore`] for completion, mirroring `flashdrv_reset` /
//! `flashdrv_write` / `flashdrv_read` / `flashdrv_erase` /
//! `flashdrv_writeraw` / `flashdrv_readraw` one-for-one.

use crate::chain::{Chain, IssueData};
use crate::commands::Command;
use crate::dma_addr::DmaAddress;
use crate::error::Error;
use crate::platform::{ClockDevice, Csr, Platform, ScratchPage};
use crate::regs::{apbh, bch, gpmi};
use crate::sync::{self, SyncCore};

/// Physical base addresses for the four register windows this driver maps.
/// On a real iMX6ULL target these are [`crate::regs::mmio`]'s constants;
/// [`crate::sim`] and tests supply their own backing memory instead.
#[derive(Debug, Clone, Copy)]
pub struct MmioBases {
    pub apbh: u32,
    pub gpmi: u32,
    pub bch: u32,
    pub mux: u32,
}

/// Byte offset into the IOMUXC GPR window where the 17 NAND pin-mux
/// registers start; mirrors the original's literal `+ 94`.
const MUX_NAND_PINS_BASE: usize = 94;
const MUX_NAND_PIN_COUNT: usize = 17;

/// One status byte per sub-block read out of `BCH_STATUS0`.
pub const STATUS_CLEAN: u8 = 0x00;
pub const STATUS_ERASED: u8 = 0xFE;
pub const STATUS_UNCORRECTABLE: u8 = 0xFF;

/// Sub-blocks actually covered by a single `BCH_STATUS0` read, per the real
/// 32-bit register width (the page's eight ECC sub-blocks, from
/// [`crate::regs::DEFAULT_SUBBLOCK_COUNT`], map to more status bytes than
/// fit in one status word; this driver, like the original, only latches the
/// one register).
pub const STATUS_SUBBLOCKS_PER_WORD: usize = 4;

pub fn subblock_status(status0: u32, index: usize) -> u8 { ((status0 >> (8 * (index % STATUS_SUBBLOCKS_PER_WORD))) & 0xff) as u8 }

/// A GPMI/BCH/APBH NAND flash controller, bound to one platform and one
/// descriptor-chain scratch page.
pub struct NandController<P: Platform> {
    platform: P,
    apbh: Csr,
    gpmi: Csr,
    bch: Csr,
    mux: Csr,
    sync: SyncCore,
    chain: Chain,
    page_size: u32,
    meta_size: u32,
}

impl<P: Platform> NandController<P> {
    /// Map the four register windows, bring GPMI/BCH/APBH out of reset, and
    /// claim the three interrupt lines. `scratch` backs the descriptor
    /// chain; it is never reallocated.
    ///
    /// The returned value must not be moved after construction: the
    /// interrupt handlers are claimed against `&self.sync`'s address before
    /// `new` returns, the same assumption the corpus's own IRQ-registering
    /// constructors make about the value they're building.
    pub fn new(platform: P, bases: MmioBases, page_size: u32, meta_size: u32, scratch: ScratchPage) -> Self {
        let apbh = unsafe { Csr::new(platform.map_device_memory(bases.apbh, 4096) as *mut u32) };
        let gpmi = unsafe { Csr::new(platform.map_device_memory(bases.gpmi, 4096) as *mut u32) };
        let bch = unsafe { Csr::new(platform.map_device_memory(bases.bch, 4096) as *mut u32) };
        let mux = unsafe { Csr::new(platform.map_device_memory(bases.mux, 4096) as *mut u32) };

        let mut ctl = NandController {
            platform,
            apbh,
            gpmi,
            bch,
            mux,
            sync: SyncCore::new(apbh, bch),
            chain: Chain::new(scratch),
            page_size,
            meta_size,
        };
        ctl.init_hardware();
        ctl
    }

    fn init_hardware(&mut self) {
        self.platform.set_device_clock(ClockDevice::Apbh, true);
        self.platform.set_device_clock(ClockDevice::Gpmi, true);
        self.platform.set_device_clock(ClockDevice::Bch, true);

        self.apbh.wo(apbh::CTRL0, self.apbh.r(apbh::CTRL0) & !(apbh::CTRL0_SFTRST | apbh::CTRL0_CLKGATE));
        self.gpmi.wo(gpmi::CTRL0, self.gpmi.r(gpmi::CTRL0) & !(gpmi::CTRL0_SFTRST | gpmi::CTRL0_CLKGATE));

        self.bch.clear(bch::CTRL, bch::CTRL_SFTRST);
        self.bch.clear(bch::CTRL, bch::CTRL_CLKGATE);
        self.bch.set(bch::CTRL, bch::CTRL_SFTRST);
        while self.bch.r(bch::CTRL) & bch::CTRL_CLKGATE == 0 {}
        self.bch.clear(bch::CTRL, bch::CTRL_SFTRST);
        self.bch.clear(bch::CTRL, bch::CTRL_CLKGATE);

        self.gpmi.wo(gpmi::TIMING1, gpmi::TIMING1_TIMEOUT_MAX);
        self.apbh.wo(apbh::CTRL1, self.apbh.r(apbh::CTRL1) | apbh::CTRL1_CH0_IRQ_EN);

        for i in 0..MUX_NAND_PIN_COUNT {
            self.mux.wo(MUX_NAND_PINS_BASE + i, 0);
        }

        self.gpmi.set(gpmi::CTRL1, gpmi::CTRL1_BUSY_LOW | gpmi::CTRL1_WP | gpmi::CTRL1_DEV_RESET);

        self.bch.set(bch::CTRL, bch::CTRL_ENABLE);
        self.bch.wo(bch::LAYOUTSELECT, 0);
        self.bch.wo(bch::FLASH0LAYOUT0, bch::DEFAULT_FLASH0LAYOUT0);
        self.bch.wo(bch::FLASH0LAYOUT1, bch::default_flash0layout1(self.page_size));

        let sync_ctx = &self.sync as *const SyncCore as *mut ();
        self.platform.claim_interrupt(crate::regs::irq::DMA_CHANNEL0, sync::dma_irq_handler, sync_ctx);
        self.platform.claim_interrupt(crate::regs::irq::BCH, sync::bch_irq_handler, sync_ctx);
        self.platform.claim_interrupt(crate::regs::irq::GPMI, sync::gpmi_irq_handler, sync_ctx);
    }

    fn run_and_wait_dma(&mut self) -> Result<i32, Error> {
        self.sync.reset();
        let first = self.chain.first_address().expect("chain must not be empty");
        log::debug!("submitting chain at {:#x}", first.raw());
        self.apbh.wo(apbh::CH0_NXTCMDAR, first.raw());
        self.apbh.wo(apbh::CH0_SEMA, 1);
        let result = self.sync.wait_for_dma();
        if result == 0 {
            log::debug!("chain completed");
            Ok(result)
        } else {
            let err = Error::from_code(result);
            log::warn!("chain terminated with {result} ({err:?})");
            Err(err)
        }
    }

    /// `{0,0} ++ page_addr`'s low 3 bytes, the 5-byte row/column address
    /// every page-addressed command in this driver uses.
    fn page_address_bytes(page_addr: u32) -> [u8; 5] {
        let mut addr = [0u8; 5];
        addr[2..5].copy_from_slice(&page_addr.to_le_bytes()[..3]);
        addr
    }

    /// Reset the NAND on `chip`. Mirrors `flashdrv_reset`.
    pub fn reset(&mut self, chip: u8) -> Result<(), Error> {
        self.chain.reset();
        self.chain.issue(Command::Reset, chip, &[], None)?;
        self.chain.finish();
        self.run_and_wait_dma().map(|_| ())
    }

    /// Erase the block containing `page_addr` on chip 0. Mirrors
    /// `flashdrv_erase` (chip is always 0, exactly as the original hardcodes
    /// it).
    pub fn erase(&mut self, page_addr: u32) -> Result<(), Error> {
        let chip = 0;
        self.chain.reset();
        self.chain.wait_for_ready(chip, None);
        self.chain.issue(Command::EraseBlock, chip, &page_addr.to_le_bytes()[..3], None)?;
        self.chain.wait_for_ready(chip, None);
        self.chain.read_compare(chip, 0x3, 0, -1);
        self.chain.finish();
        self.run_and_wait_dma().map(|_| ())
    }

    /// Program a full page, BCH-encoding if `aux` is given. Mirrors
    /// `flashdrv_write`: chip is always 0, and `read_status` is issued
    /// against chip 0 even though the program/wait steps ran on `chip`
    /// (preserved from the original, which hardcodes 0 there too).
    pub fn program(&mut self, page_addr: u32, data: DmaAddress, aux: Option<DmaAddress>) -> Result<(), Error> {
        let chip = 0;
        self.chain.reset();
        self.chain.wait_for_ready(chip, None);
        self.chain.issue(
            Command::ProgramPage,
            chip,
            &Self::page_address_bytes(page_addr),
            Some(IssueData { buffer: data, len: self.page_size as u16, aux }),
        )?;
        self.chain.wait_for_ready(chip, None);
        self.chain.issue(Command::ReadStatus, 0, &[], None)?;
        self.chain.read_compare(chip, 0x3, 0, -1);
        self.chain.finish();
        self.run_and_wait_dma().map(|_| ())
    }

    /// Program raw bytes with no BCH assistance. Mirrors `flashdrv_writeraw`.
    pub fn program_raw(&mut self, page_addr: u32, data: DmaAddress, len: u16) -> Result<(), Error> {
        let chip = 0;
        self.chain.reset();
        self.chain.wait_for_ready(chip, None);
        self.chain.issue(
            Command::ProgramPage,
            chip,
            &Self::page_address_bytes(page_addr),
            Some(IssueData { buffer: data, len, aux: None }),
        )?;
        self.chain.wait_for_ready(chip, None);
        self.chain.issue(Command::ReadStatus, 0, &[], None)?;
        self.chain.read_compare(0, 0x3, 0, -1);
        self.chain.finish();
        self.run_and_wait_dma().map(|_| ())
    }

    /// Read a page. When `aux` is given, the read is BCH-assisted and the
    /// per-sub-block status word (see [`subblock_status`]) is returned;
    /// `Err(Error::Uncorrectable)` replaces it if any covered sub-block
    /// reports the uncorrectable sentinel. Without `aux`, only the metadata
    /// is read and no BCH wait takes place. Mirrors `flashdrv_read`.
    pub fn read(&mut self, chip: u8, page_addr: u32, data: DmaAddress, aux: Option<DmaAddress>) -> Result<Option<u32>, Error> {
        let len = if aux.is_some() { self.page_size } else { self.meta_size } as u16;

        self.chain.reset();
        self.chain.wait_for_ready(chip, None);
        self.chain.issue(Command::ReadPage, chip, &Self::page_address_bytes(page_addr), None)?;
        self.chain.wait_for_ready(chip, None);
        self.chain.readback(chip, len, data, aux);
        self.chain.disable_bch(chip);
        self.chain.finish();

        self.sync.reset();
        let first = self.chain.first_address().expect("chain must not be empty");
        log::debug!("submitting read chain at {:#x} for page {page_addr:#x}", first.raw());
        self.apbh.wo(apbh::CH0_NXTCMDAR, first.raw());
        self.apbh.wo(apbh::CH0_SEMA, 1);

        if aux.is_none() {
            let result = self.sync.wait_for_dma();
            return if result == 0 {
                log::debug!("read chain completed");
                Ok(None)
            } else {
                let err = Error::from_code(result);
                log::warn!("read chain terminated with {result} ({err:?})");
                Err(err)
            };
        }

        let status0 = self.sync.wait_for_bch();
        self.sync.wait_for_dma();
        log::debug!("read chain completed, bch status {status0:#010x}");

        for i in 0..STATUS_SUBBLOCKS_PER_WORD {
            if subblock_status(status0, i) == STATUS_UNCORRECTABLE {
                log::error!("uncorrectable ECC error at page {page_addr:#x}, sub-block {i}");
                return Err(Error::Uncorrectable);
            }
        }
        Ok(Some(status0))
    }

    /// Read raw bytes with no BCH assistance. Mirrors `flashdrv_readraw`,
    /// including its extra trailing `wait_for_ready` that the ECC read path
    /// does not have (preserved, not rationalized).
    pub fn read_raw(&mut self, chip: u8, page_addr: u32, data: DmaAddress, len: u16) -> Result<(), Error> {
        self.chain.reset();
        self.chain.wait_for_ready(chip, None);
        self.chain.issue(Command::ReadPage, chip, &Self::page_address_bytes(page_addr), None)?;
        self.chain.wait_for_ready(chip, None);
        self.chain.readback(chip, len, data, None);
        self.chain.disable_bch(chip);
        self.chain.wait_for_ready(chip, None);
        self.chain.finish();
        self.run_and_wait_dma().map(|_| ())
    }

    /// Read the NAND ID (spec §0.6 supplemented convenience). Builds a
    /// single `read_id` command and reads `len` bytes back with no BCH.
    pub fn read_id(&mut self, chip: u8, data: DmaAddress, len: u16) -> Result<(), Error> {
        self.chain.reset();
        self.chain.issue(Command::ReadId, chip, &[0], None)?;
        self.chain.readback(chip, len, data, None);
        self.chain.finish();
        self.run_and_wait_dma().map(|_| ())
    }

    /// Read a feature address's 4-byte value (spec §0.6 supplemented
    /// convenience).
    pub fn get_features(&mut self, chip: u8, feature_addr: u8, data: DmaAddress) -> Result<(), Error> {
        self.chain.reset();
        self.chain.issue(Command::GetFeatures, chip, &[feature_addr], None)?;
        self.chain.readback(chip, 4, data, None);
        self.chain.finish();
        self.run_and_wait_dma().map(|_| ())
    }

    /// Write a feature address's 4-byte value (spec §0.6 supplemented
    /// convenience).
    pub fn set_features(&mut self, chip: u8, feature_addr: u8, data: DmaAddress) -> Result<(), Error> {
        self.chain.reset();
        self.chain.issue(Command::SetFeatures, chip, &[feature_addr], Some(IssueData { buffer: data, len: 4, aux: None }))?;
        self.chain.wait_for_ready(chip, None);
        self.chain.finish();
        self.run_and_wait_dma().map(|_| ())
    }
}
