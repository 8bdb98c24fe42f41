//! Driver core for the SD/MMC/SDIO host controller found in the Nintendo 3DS
//! ("CTR") family of consoles. The controller is a Toshiba-style MMIO block
//! with a separate 32-bit FIFO data port; commands complete asynchronously
//! through two interrupt lines (command/data and SDIO card interrupt).
//!
//! The platform glue that maps the register block, enables the source clock
//! and wires up the interrupt threads lives outside this crate; it hands the
//! mapped addresses to [`sdhc::SdhcHost::new`] and calls
//! [`sdhc::SdhcHost::handle_irq`] / [`sdhc::SdhcHost::handle_sdio_irq`] from
//! its threaded IRQ context.

#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[macro_use]
extern crate log;

mod error;
mod hal;
pub mod sdhc;

pub use error::{SdError, SdResult};
pub use sdhc::{
    BusParams, BusRequest, CardStack, Command, DataTransfer, Direction, PowerMode, RespType,
    SdhcHost, Segment,
};
