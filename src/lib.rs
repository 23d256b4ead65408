#![cfg_attr(not(feature = "std"), no_std)]

//! Driver for a GPMI/BCH/APBH NAND flash controller.
//!
//! The interesting part of this crate is the descriptor-chain programming
//! model in [`chain`] and [`descriptor`]: higher-level NAND operations in
//! [`driver`] are expressed as linked APBH DMA descriptor chains that
//! orchestrate GPMI PIO programming, command/address/data phases, BCH
//! engagement, ready-polling and status comparison, with completion
//! synchronized through [`sync`].

extern crate alloc;

pub mod chain;
pub mod commands;
pub mod descriptor;
pub mod dma_addr;
pub mod error;
pub mod platform;
pub mod regs;

// The synchronization core and the top-level controller both wait on
// `std::sync::Condvar`; a `no_std` build gets the chain builder and
// descriptor primitives but not the blocking submit path.
#[cfg(feature = "std")]
pub mod driver;
#[cfg(feature = "std")]
pub mod sync;

#[cfg(all(test, feature = "std"))]
pub mod sim;

pub use chain::{Chain, IssueData};
pub use commands::{Command, DataPolicy};
pub use descriptor::{Dma0, Dma1, Dma3, Dma6, DmaHeader, TransferType};
pub use dma_addr::DmaAddress;
pub use error::Error;
pub use platform::{ClockDevice, IrqHandler, Platform, ScratchPage};

#[cfg(feature = "std")]
pub use driver::NandController;
