use core::fmt;

pub type SdResult<T = ()> = Result<T, SdError>;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SdError {
    /// No card in the slot, or the card went away mid-transaction.
    NoMedium,
    /// The hardware never saw a command response within its own timeout.
    Timeout,
    /// CRC mismatch on the response or data phase.
    DataIntegrity,
    /// Any other bus-level failure: bad command, stop-bit violation, data
    /// timeout, FIFO overflow/underrun, illegal access.
    IoError,
    /// A request was submitted while another one was still in flight.
    Busy,
    /// Unrecognized response kind or bus width.
    ConfigError,
}

impl fmt::Display for SdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::SdError::*;
        let explain = match self {
            NoMedium => "no medium present",
            Timeout => "command timeout",
            DataIntegrity => "data integrity (CRC) failure",
            IoError => "bus I/O error",
            Busy => "another request is in flight",
            ConfigError => "invalid configuration",
        };
        write!(f, "{}", explain)
    }
}
