mod host;
mod regs;
mod request;

pub use host::SdhcHost;
pub use regs::{CardOption, ClkCtl, CmdFlags, Data32Ctl, DataCtl, FifoPort, IrqStat, SdhcRegs,
               StopInternal};
pub use request::{
    BusParams, BusRequest, CardStack, Command, DataTransfer, Direction, PowerMode, RespType,
    Segment,
};

/// Opcodes the dispatcher treats specially.
pub const MMC_STOP_TRANSMISSION: u32 = 12;
pub const MMC_APP_CMD: u32 = 55;
pub const SD_IO_RW_DIRECT: u32 = 52;
pub const SD_IO_RW_EXTENDED: u32 = 53;

pub const MAX_BLK_LEN: u32 = 0x200;
pub const MAX_BLK_COUNT: u32 = 0xFFFF;

/// Freeze the CLK pin when inactive if running at or above 5MHz.
pub const CLK_FREEZE_THRESHOLD: u32 = 5_000_000;

/// Hold time after reprogramming the clock divider.
pub(crate) const CLK_SETTLE_MS: u64 = 10;
