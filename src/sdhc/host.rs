use alloc::sync::Arc;
use spin::Mutex;

use super::regs::{CardOption, ClkCtl, CmdFlags, Data32Ctl, DataCtl, FifoPort, IrqStat, SdhcRegs,
                  StopInternal};
use super::request::{BusParams, BusRequest, CardStack, DataTransfer, Direction, PowerMode,
                     RespType, ScatterCursor};
use super::{CLK_FREEZE_THRESHOLD, CLK_SETTLE_MS, MMC_APP_CMD, MMC_STOP_TRANSMISSION,
            SD_IO_RW_DIRECT, SD_IO_RW_EXTENDED};
use crate::error::SdError;
use crate::hal::{MmioAddr, RegWindow, Timer};

/// One SDHC controller instance. All entry points and both interrupt threads
/// serialize on the inner lock; nothing in here blocks indefinitely.
pub struct SdhcHost {
    inner: Mutex<SdhcInner>,
}

struct SdhcInner {
    regs: RegWindow<'static, SdhcRegs>,
    fifo: RegWindow<'static, FifoPort>,
    /// Source clock rate feeding the divider, in Hz.
    clk_rate: u32,
    /// The single in-flight request; occupied from dispatch to completion.
    mrq: Option<BusRequest>,
    cursor: ScatterCursor,
    stack: Arc<dyn CardStack>,
}

impl SdhcHost {
    /// Takes over a mapped register block and FIFO port. `clk_rate` is the
    /// rate of the source clock the platform enabled for the controller.
    /// Performs a full hardware reset before returning.
    pub fn new(
        regs_base: MmioAddr,
        fifo_base: MmioAddr,
        clk_rate: u32,
        stack: Arc<dyn CardStack>,
    ) -> Self {
        let mut inner = SdhcInner {
            regs: RegWindow::from_raw(regs_base),
            fifo: RegWindow::from_raw(fifo_base),
            clk_rate,
            mrq: None,
            cursor: ScatterCursor::new(),
            stack,
        };
        inner.reset();
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Accepts one request and arms the hardware; completion arrives later
    /// through [`CardStack::request_done`], exactly once.
    pub fn submit(&self, mut mrq: BusRequest) {
        let mut inner = self.inner.lock();

        if !inner.card_present() {
            // card not present, immediately return an error
            mrq.cmd.error = Some(SdError::NoMedium);
            inner.stack.request_done(mrq);
            return;
        }

        if inner.mrq.is_some() {
            // caller bug: the contract is one request in flight at a time
            error!(
                "submit of opcode {} while another request is in flight",
                mrq.cmd.opcode
            );
            mrq.cmd.error = Some(SdError::Busy);
            inner.stack.request_done(mrq);
            return;
        }

        inner.start_request(mrq);
    }

    /// Body of the primary threaded interrupt handler.
    pub fn handle_irq(&self) {
        self.inner.lock().irq_thread();
    }

    /// Body of the SDIO card-interrupt thread. Returns whether the line was
    /// actually asserted (the platform glue reports spurious wakeups).
    pub fn handle_sdio_irq(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.test_sdio_irq() {
            inner.stack.sdio_irq();
            true
        } else {
            false
        }
    }

    pub fn set_sdio_irq_enabled(&self, enable: bool) {
        self.inner.lock().set_sdio_irq(enable);
    }

    /// Reprograms clock divider and bus options from negotiated parameters,
    /// then holds for the hardware's settle time.
    pub fn apply_bus_params(&self, params: &BusParams) {
        self.inner.lock().set_bus_params(params);
    }

    pub fn card_present(&self) -> bool {
        self.inner.lock().card_present()
    }

    pub fn write_protected(&self) -> bool {
        // the hardware reports the slot switch active-low
        !self.inner.lock().irq_stat().contains(IrqStat::WRITE_PROT)
    }
}

impl SdhcInner {
    fn irq_stat(&self) -> IrqStat {
        IrqStat::from_bits_truncate(self.regs.irq_stat.read())
    }

    fn card_present(&self) -> bool {
        self.irq_stat().contains(IrqStat::CARD_PRESENT)
    }

    /// Full hardware reset: soft-reset toggle, clean register state, 32-bit
    /// FIFO mode, interrupt mask for the bits this driver handles.
    fn reset(&mut self) {
        self.regs.soft_rst.write(0);
        self.regs.soft_rst.write(1);

        self.regs.portsel.write(0);
        self.regs.clk_ctl.write(0);
        self.regs.err_detail.write(0);
        self.regs.stop.write(0);

        self.regs.blkcount.write(0);
        self.regs.blklen.write(0);
        self.regs.blkcount32.write(0);
        self.regs.blklen32.write(0);

        // use the 32-bit FIFO at all times
        self.regs.data_ctl.write(DataCtl::WORD_FIFO_EN.bits());
        self.regs
            .data32_ctl
            .write((Data32Ctl::WORD_FIFO_EN | Data32Ctl::WORD_FIFO_CLR).bits());

        self.regs.irq_mask.write(!IrqStat::UNDERSTOOD.bits());
        self.regs.irq_stat.write(!IrqStat::UNDERSTOOD.bits());

        self.regs.option.write(CardOption::DEFAULT.bits());
    }

    /// Builds the command word and arms the hardware state machine.
    fn start_request(&mut self, mut mrq: BusRequest) {
        if mrq.cmd.opcode == MMC_STOP_TRANSMISSION {
            // the hardware can issue a stop-transmission on its own; trigger
            // that and fake the response so it looks like a normal completion
            self.regs.stop.write(StopInternal::ISSUE.bits());

            mrq.cmd.resp = [mrq.cmd.opcode, 0, 0, 0];

            self.mrq = Some(mrq);
            self.finish_request(None);
            return;
        }

        let mut cmd = mrq.cmd.opcode as u16;
        cmd |= match mrq.cmd.resp_type {
            RespType::NONE => CmdFlags::RSP_NONE,
            RespType::R1 => CmdFlags::RSP_R1,
            RespType::R1B => CmdFlags::RSP_R1B,
            RespType::R2 => CmdFlags::RSP_R2,
            RespType::R3 => CmdFlags::RSP_R3,
            other => {
                error!("unknown response type {:?}", other);
                CmdFlags::empty()
            }
        }
        .bits();

        if mrq.cmd.opcode == SD_IO_RW_DIRECT || mrq.cmd.opcode == SD_IO_RW_EXTENDED {
            cmd |= CmdFlags::SECURE.bits();
        }
        if mrq.cmd.opcode == MMC_APP_CMD {
            cmd |= CmdFlags::TYPE_APP.bits();
        }

        if let Some(data) = mrq.data.as_ref() {
            cmd |= CmdFlags::DATA_XFER.bits();

            if data.blocks > 1 {
                self.regs.stop.write(StopInternal::AUTO.bits());
                cmd |= CmdFlags::DATA_MULTI.bits();
            }
            if data.direction == Direction::Read {
                cmd |= CmdFlags::DATA_READ.bits();
            }
            self.start_data(data);
        }

        let arg = mrq.cmd.arg;
        self.mrq = Some(mrq);

        // writing the command register starts execution
        self.regs.arg.write(arg);
        self.regs.cmd.write(cmd);
    }

    fn start_data(&mut self, data: &DataTransfer) {
        debug!(
            "setup data transfer: blk_len {} blocks {} segments {}",
            data.blk_len,
            data.blocks,
            data.segments.len()
        );

        self.cursor = ScatterCursor::new();

        // geometry goes to both the 16-bit and 32-bit path registers
        self.regs.blklen.write(data.blk_len as u16);
        self.regs.blkcount.write(data.blocks as u16);
        self.regs.blklen32.write(data.blk_len as u16);
        self.regs.blkcount32.write(data.blocks as u16);
    }

    fn irq_thread(&mut self) {
        let stat = IrqStat::from_bits_truncate(self.regs.irq_stat.read());
        debug!("IRQ status: {:08x}", stat.bits());

        // immediately acknowledge, clearing only the bits we understand
        self.ack_irqs(stat & IrqStat::UNDERSTOOD);

        if self.hotplug_irq(stat) {
            return;
        }

        // command/data events are meaningless with no active request
        if self.mrq.is_none() {
            return;
        }

        let mut err = None;
        if stat.contains(IrqStat::ERR_CMD_TIMEOUT) {
            err = Some(SdError::Timeout);
        } else if stat.contains(IrqStat::ERR_CRC_FAIL) {
            err = Some(SdError::DataIntegrity);
        } else if stat.intersects(IrqStat::ERR_MASK) {
            error!("bus error: {:08X}", (stat & IrqStat::ERR_MASK).bits());
            err = Some(SdError::IoError);
        }

        if let Some(e) = err {
            if let Some(mrq) = self.mrq.as_mut() {
                mrq.cmd.error = Some(e);
                if let Some(data) = mrq.data.as_mut() {
                    data.error = Some(e);
                }
            }
            if e != SdError::Timeout {
                // serious error; leave the request for a later drain
                return;
            }
        }

        self.pump_data();
        self.resp_end_irq(stat);
        self.data_end_irq(stat);
    }

    /// The status register is write-zero-to-clear; unrecognized bits stay
    /// untouched so a future condition is never silently dropped.
    fn ack_irqs(&mut self, ack: IrqStat) {
        self.regs.irq_stat.write(!ack.bits());
    }

    /// Insertion/removal handling. Returns true when a hotplug event was
    /// consumed, in which case the rest of the batch is skipped.
    fn hotplug_irq(&mut self, stat: IrqStat) -> bool {
        if !stat.intersects(IrqStat::CARD_REMOVE | IrqStat::CARD_INSERT) {
            return false;
        }

        // finish any pending request and bring the hardware back up clean
        self.reset();
        if !stat.contains(IrqStat::CARD_PRESENT) {
            self.finish_request(Some(SdError::NoMedium));
        }
        self.stack.card_change();
        true
    }

    /// Moves at most one block between the next scatter segment and the FIFO
    /// port. Not-ready and list-exhausted are both normal no-ops; the pump
    /// runs again on the next data-ready interrupt.
    fn pump_data(&mut self) {
        let SdhcInner {
            mrq, cursor, regs, fifo, ..
        } = self;

        let data = match mrq.as_mut().and_then(|m| m.data.as_mut()) {
            Some(data) => data,
            None => return,
        };

        let ctl = Data32Ctl::from_bits_truncate(regs.data32_ctl.read());
        match data.direction {
            Direction::Read => {
                if !ctl.contains(Data32Ctl::RX_READY) {
                    return;
                }
            }
            Direction::Write => {
                if ctl.contains(Data32Ctl::TX_FULL) {
                    return;
                }
            }
        }

        let dir = data.direction;
        let blk_len = data.blk_len as usize;

        // one block at a time at most, regardless of segment size
        let chunk = match cursor.next_chunk(data, blk_len) {
            Some(chunk) => chunk,
            None => return,
        };
        let count = chunk.len();

        match dir {
            Direction::Read => {
                for word in chunk.chunks_exact_mut(4) {
                    word.copy_from_slice(&fifo.data.read().to_le_bytes());
                }
            }
            Direction::Write => {
                for word in chunk.chunks_exact(4) {
                    fifo.data
                        .write(u32::from_le_bytes([word[0], word[1], word[2], word[3]]));
                }
            }
        }

        cursor.consume(count);
    }

    fn resp_end_irq(&mut self, stat: IrqStat) {
        if !stat.contains(IrqStat::CMD_RESP_END) {
            return;
        }

        let raw = [
            self.regs.resp[0].read(),
            self.regs.resp[1].read(),
            self.regs.resp[2].read(),
            self.regs.resp[3].read(),
        ];

        let mrq = match self.mrq.as_mut() {
            Some(mrq) => mrq,
            None => {
                error!("spurious command IRQ: end of response with no active command");
                return;
            }
        };

        if mrq.cmd.resp_type.contains(RespType::PRESENT) {
            if mrq.cmd.resp_type.contains(RespType::RESP_136) {
                mrq.cmd.resp = repack_resp136(raw);
            } else {
                mrq.cmd.resp[0] = raw[0];
            }
        }

        debug!(
            "command IRQ complete {} {:?}",
            mrq.cmd.opcode, mrq.cmd.error
        );

        // with data attached, the data-end handler finishes the request
        if mrq.data.is_some() {
            return;
        }
        self.finish_request(None);
    }

    fn data_end_irq(&mut self, stat: IrqStat) {
        if !stat.contains(IrqStat::DATA_END) {
            return;
        }

        let mrq = match self.mrq.as_mut() {
            Some(mrq) => mrq,
            None => return,
        };
        let data = match mrq.data.as_mut() {
            Some(data) => data,
            None => {
                warn!("spurious data end IRQ");
                return;
            }
        };

        data.bytes_xfered = if data.error.is_some() {
            0
        } else {
            data.blocks * data.blk_len
        };
        debug!("completed data request, xfr={}", data.bytes_xfered);
        let err = data.error;

        self.regs.stop.write(0);
        self.finish_request(err);
    }

    /// Retires the in-flight request and hands it back upstream. Tolerates
    /// racing invocations from multiple sub-handlers: only the first one
    /// after dispatch finds a request to finish.
    fn finish_request(&mut self, err: Option<SdError>) {
        let mut mrq = match self.mrq.take() {
            Some(mrq) => mrq,
            None => return,
        };

        if let Some(e) = err {
            mrq.cmd.error = Some(e);
        }

        self.cursor = ScatterCursor::new();
        self.stack.request_done(mrq);
    }

    fn set_bus_params(&mut self, params: &BusParams) {
        let mut clk_ctl = if params.clock_hz != 0 {
            let mut ctl =
                clk_divider_code(self.clk_rate, params.clock_hz) | ClkCtl::PIN_ENABLE.bits();
            if params.clock_hz >= CLK_FREEZE_THRESHOLD {
                ctl |= ClkCtl::PIN_FREEZE.bits();
            }
            ctl
        } else {
            0
        };

        let card_opt = match params.bus_width {
            1 => CardOption::DEFAULT | CardOption::BUS_WIDTH_1,
            4 => CardOption::DEFAULT | CardOption::BUS_WIDTH_4,
            width => {
                error!("invalid bus width {}", width);
                return;
            }
        };

        if params.power == PowerMode::Off {
            clk_ctl = 0; // force-disable clock
        }

        self.regs.clk_ctl.write(clk_ctl);
        self.regs.option.write(card_opt.bits());
        Timer.mdelay(CLK_SETTLE_MS);
    }

    /// Test-and-acknowledge the out-of-band SDIO card interrupt.
    fn test_sdio_irq(&mut self) -> bool {
        let state = self.regs.card_irq_stat.read();
        if state & 1 != 0 {
            self.regs.card_irq_stat.write(state & !1);
            return true;
        }
        false
    }

    fn set_sdio_irq(&mut self, enable: bool) {
        // always acknowledge pending card interrupts first
        self.regs.card_irq_stat.write(0);

        // either unmask only the card IRQ bit, or mask everything
        self.regs.card_irq_mask.write(if enable { !1 } else { !0 });
    }
}

/// The response registers lag the standard 128-bit layout by one byte; each
/// output word is rebuilt from parts of two adjacent hardware words.
fn repack_resp136(raw: [u32; 4]) -> [u32; 4] {
    [
        (raw[3] << 8) | (raw[2] >> 24),
        (raw[2] << 8) | (raw[1] >> 24),
        (raw[1] << 8) | (raw[0] >> 24),
        raw[0] << 8,
    ]
}

fn clk_divider_code(clk_rate: u32, clock_hz: u32) -> u16 {
    let div = clk_rate / clock_hz;
    if div <= 1 {
        0
    } else {
        (div.next_power_of_two() / 4) as u16
    }
}
