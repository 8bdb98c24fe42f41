use alloc::vec::Vec;

use crate::error::SdError;

bitflags::bitflags! {
    /// Expected response shape, in the same primitive terms the upstream
    /// stack describes them: present / 136-bit / CRC-checked / busy signal.
    pub struct RespType: u32 {
        const PRESENT  = 1 << 0;
        const RESP_136 = 1 << 1;
        const CRC      = 1 << 2;
        const BUSY     = 1 << 3;
        const OPCODE   = 1 << 4;

        const NONE = 0;
        const R1 =
            RespType::PRESENT.bits() |
            RespType::CRC.bits() |
            RespType::OPCODE.bits();
        const R1B =
            RespType::PRESENT.bits() |
            RespType::CRC.bits() |
            RespType::OPCODE.bits() |
            RespType::BUSY.bits();
        const R2 =
            RespType::PRESENT.bits() |
            RespType::RESP_136.bits() |
            RespType::CRC.bits();
        const R3 = RespType::PRESENT.bits();
    }
}

#[derive(Debug)]
pub struct Command {
    pub opcode: u32,
    pub arg: u32,
    pub resp_type: RespType,
    pub resp: [u32; 4],
    pub error: Option<SdError>,
}

impl Command {
    pub fn new(opcode: u32, arg: u32, resp_type: RespType) -> Self {
        Self {
            opcode,
            arg,
            resp_type,
            resp: [0; 4],
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// One region of an upstream scatter list. The transfer owns its buffers for
/// its whole lifetime; they travel back to the caller with the finished
/// request.
#[derive(Debug)]
pub struct Segment {
    buf: Vec<u8>,
    offset: usize,
    len: usize,
}

impl Segment {
    pub fn new(buf: Vec<u8>) -> Self {
        let len = buf.len();
        Self {
            buf,
            offset: 0,
            len,
        }
    }

    /// A window of `len` bytes starting `offset` bytes into `buf`.
    pub fn with_window(buf: Vec<u8>, offset: usize, len: usize) -> Self {
        assert!(offset + len <= buf.len());
        Self { buf, offset, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[self.offset..self.offset + self.len]
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf[self.offset..self.offset + self.len]
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug)]
pub struct DataTransfer {
    pub direction: Direction,
    pub blk_len: u32,
    pub blocks: u32,
    pub segments: Vec<Segment>,
    pub bytes_xfered: u32,
    pub error: Option<SdError>,
}

impl DataTransfer {
    pub fn new(direction: Direction, blk_len: u32, blocks: u32, segments: Vec<Segment>) -> Self {
        Self {
            direction,
            blk_len,
            blocks,
            segments,
            bytes_xfered: 0,
            error: None,
        }
    }
}

/// One command, optionally paired with a block data transfer, submitted as a
/// unit. At most one is in flight per controller at any time.
#[derive(Debug)]
pub struct BusRequest {
    pub cmd: Command,
    pub data: Option<DataTransfer>,
}

impl BusRequest {
    pub fn new(cmd: Command) -> Self {
        Self { cmd, data: None }
    }

    pub fn with_data(cmd: Command, data: DataTransfer) -> Self {
        Self {
            cmd,
            data: Some(data),
        }
    }
}

/// Walks a transfer's segment list one FIFO-sized chunk at a time. Rebuilt
/// whenever a data transfer starts; meaningless once the transfer retires.
#[derive(Debug)]
pub(crate) struct ScatterCursor {
    seg: usize,
    pos: usize,
}

impl ScatterCursor {
    pub(crate) const fn new() -> Self {
        Self { seg: 0, pos: 0 }
    }

    /// The next unconsumed run of the current segment, capped at `max` bytes.
    /// Returns `None` once every segment is drained.
    pub(crate) fn next_chunk<'a>(
        &mut self,
        data: &'a mut DataTransfer,
        max: usize,
    ) -> Option<&'a mut [u8]> {
        while self.seg < data.segments.len() {
            if self.pos < data.segments[self.seg].len() {
                break;
            }
            self.seg += 1;
            self.pos = 0;
        }
        let seg = data.segments.get_mut(self.seg)?;
        let slice = seg.as_mut_slice();
        let end = usize::min(slice.len(), self.pos + max);
        Some(&mut slice[self.pos..end])
    }

    pub(crate) fn consume(&mut self, count: usize) {
        self.pos += count;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    Off,
    On,
}

/// Negotiated bus parameters, as handed down by the upstream stack. Nothing
/// is retained after programming; the hardware keeps the state.
#[derive(Debug, Clone, Copy)]
pub struct BusParams {
    /// Desired card clock in Hz; 0 disables the clock pin.
    pub clock_hz: u32,
    /// 1 or 4 data lines; anything else is a configuration error.
    pub bus_width: u8,
    pub power: PowerMode,
}

/// Upstream notification sink. Calls arrive with the controller lock held,
/// so implementations must not reenter the host.
pub trait CardStack: Send + Sync {
    /// Exactly-once handoff of a finished request.
    fn request_done(&self, mrq: BusRequest);
    /// The card may have been inserted or removed; rescan.
    fn card_change(&self);
    /// Out-of-band SDIO card interrupt.
    fn sdio_irq(&self);
}
