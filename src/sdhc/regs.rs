use crate::hal::{Reg16, Reg32};
use static_assertions::const_assert_eq;

/* #REF: https://www.3dbrew.org/wiki/EMMC_Registers */

#[repr(C)]
pub struct SdhcRegs {
    pub cmd: Reg16,
    pub portsel: Reg16,
    pub arg: Reg32,
    pub stop: Reg16,
    pub blkcount: Reg16,
    pub resp: [Reg32; 4],
    pub irq_stat: Reg32,
    pub irq_mask: Reg32,
    pub clk_ctl: Reg16,
    pub blklen: Reg16,
    pub option: Reg16,
    _pad0: Reg16,
    pub err_detail: Reg32,
    pub fifo16: Reg16,
    _pad1: Reg16,
    pub card_irq_ctl: Reg16,
    pub card_irq_stat: Reg16,
    pub card_irq_mask: Reg16,
    _pad2: [Reg16; 79],
    pub data_ctl: Reg16,
    _pad3: [Reg16; 3],
    pub soft_rst: Reg16,
    _pad4: [Reg16; 15],
    pub data32_ctl: Reg16,
    _pad5: Reg16,
    pub blklen32: Reg16,
    _pad6: Reg16,
    pub blkcount32: Reg16,
}

const_assert_eq!(core::mem::offset_of!(SdhcRegs, arg), 0x004);
const_assert_eq!(core::mem::offset_of!(SdhcRegs, resp), 0x00c);
const_assert_eq!(core::mem::offset_of!(SdhcRegs, irq_stat), 0x01c);
const_assert_eq!(core::mem::offset_of!(SdhcRegs, irq_mask), 0x020);
const_assert_eq!(core::mem::offset_of!(SdhcRegs, clk_ctl), 0x024);
const_assert_eq!(core::mem::offset_of!(SdhcRegs, err_detail), 0x02c);
const_assert_eq!(core::mem::offset_of!(SdhcRegs, card_irq_stat), 0x036);
const_assert_eq!(core::mem::offset_of!(SdhcRegs, data_ctl), 0x0d8);
const_assert_eq!(core::mem::offset_of!(SdhcRegs, soft_rst), 0x0e0);
const_assert_eq!(core::mem::offset_of!(SdhcRegs, data32_ctl), 0x100);
const_assert_eq!(core::mem::offset_of!(SdhcRegs, blkcount32), 0x108);
const_assert_eq!(core::mem::size_of::<SdhcRegs>(), 0x10c);

/// The 32-bit FIFO lives in its own mapping; every word of a block moves
/// through this one register by repeated access.
#[repr(C)]
pub struct FifoPort {
    pub data: Reg32,
}

bitflags::bitflags! {
    pub struct IrqStat: u32 {
        const CMD_RESP_END  = 1 << 0;
        const DATA_END      = 1 << 2;
        const CARD_REMOVE   = 1 << 3;
        const CARD_INSERT   = 1 << 4;
        const CARD_PRESENT  = 1 << 5;
        // active-low: bit clear means the slot lock is on
        const WRITE_PROT    = 1 << 7;

        const ERR_BAD_CMD      = 1 << 16;
        const ERR_CRC_FAIL     = 1 << 17;
        const ERR_STOP_BIT     = 1 << 18;
        const ERR_DATA_TIMEOUT = 1 << 19;
        const ERR_TX_OVERFLOW  = 1 << 20;
        const ERR_RX_UNDERRUN  = 1 << 21;
        const ERR_CMD_TIMEOUT  = 1 << 22;
        const ERR_ILLEGAL_ACC  = 1 << 31;

        const ERR_MASK =
            IrqStat::ERR_BAD_CMD.bits() | IrqStat::ERR_CRC_FAIL.bits() |
            IrqStat::ERR_STOP_BIT.bits() | IrqStat::ERR_DATA_TIMEOUT.bits() |
            IrqStat::ERR_TX_OVERFLOW.bits() | IrqStat::ERR_RX_UNDERRUN.bits() |
            IrqStat::ERR_CMD_TIMEOUT.bits() | IrqStat::ERR_ILLEGAL_ACC.bits();

        // every status bit this driver knows how to handle; everything else
        // is left untouched by the ack path
        const UNDERSTOOD =
            IrqStat::CMD_RESP_END.bits() | IrqStat::DATA_END.bits() |
            IrqStat::CARD_REMOVE.bits() | IrqStat::CARD_INSERT.bits() |
            IrqStat::ERR_MASK.bits();
    }

    pub struct CmdFlags: u16 {
        // 5:0 - command index
        const TYPE_APP   = 1 << 6;
        // 10:8 - response type
        const RSP_NONE = 0x0300;
        const RSP_R1   = 0x0400;
        const RSP_R1B  = 0x0500;
        const RSP_R2   = 0x0600;
        const RSP_R3   = 0x0700;
        const DATA_XFER  = 1 << 11;
        const DATA_READ  = 1 << 12;
        const DATA_MULTI = 1 << 13;
        const SECURE     = 1 << 14;
    }

    pub struct ClkCtl: u16 {
        // 7:0 - divider code
        const PIN_ENABLE = 1 << 8;
        // stop toggling the CLK pin while idle
        const PIN_FREEZE = 1 << 9;
    }

    pub struct CardOption: u16 {
        // 3:0 - retry count, 7:4 - timeout exponent
        const NOC2        = 1 << 14;
        const BUS_WIDTH_1 = 1 << 15;
        const BUS_WIDTH_4 = 0;

        const DEFAULT = CardOption::NOC2.bits() | (14 << 4) | 14;
    }

    pub struct StopInternal: u16 {
        // issue CMD12 right now
        const ISSUE = 1 << 0;
        // auto-issue CMD12 after the programmed block count
        const AUTO  = 1 << 8;
    }

    pub struct DataCtl: u16 {
        const WORD_FIFO_EN = 1 << 1;
    }

    pub struct Data32Ctl: u16 {
        const WORD_FIFO_EN  = 1 << 1;
        const RX_READY      = 1 << 8;
        // set while the TX FIFO has no room for another block
        const TX_FULL       = 1 << 9;
        const WORD_FIFO_CLR = 1 << 10;
    }
}
