use thiserror::Error;

/// Errors that can occur during storage operations. Marked as non-exhaustive to allow for future
/// additions without breaking the API. Apart from the argument checks, a caller would likely only
/// need to handle `AcknowledgeTimeout` and `BusyTimeout` as those report a device that did not
/// finish in time.
#[derive(Error, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The internal error value is returned from the provided NVM implementation
    #[error("internal nvm error")]
    NvmError,

    /// The internal error value is returned from the provided I2C bus implementation
    #[error("internal bus error")]
    BusError,

    /// The NVM stayed busy longer than the configured busy timeout
    #[error("nvm busy timeout")]
    BusyTimeout,

    /// The EEPROM did not acknowledge its client address within the acknowledge-poll timeout.
    /// The operation was still carried out; the address is the first one that was not confirmed.
    ///
    /// A read also reports this if the device NACKs the read address after accepting the
    /// address pointer. That address is not polled, so no time passes before the NACK.
    #[error("acknowledge timeout at {address:#06x}")]
    AcknowledgeTimeout { address: u32 },

    /// More bytes than the buffer can hold were requested, or a cursor is outside the buffer
    #[error("buffer overflow")]
    Overflow,

    /// The number of bytes exceeds the page size
    #[error("invalid length")]
    InvalidLength,

    /// Address plus length exceeds the device size
    #[error("address out of range")]
    OutOfRange,

    /// The base address has to be aligned to the page size, and the page has to end inside the
    /// 32 bit address space
    #[error("invalid address")]
    InvalidAddress,

    /// Page, row and line sizes do not divide each other
    #[error("invalid geometry")]
    InvalidGeometry,

    /// The provided formatter rejected the diagnostic output
    #[error("format error")]
    Format,
}

impl From<core::fmt::Error> for Error {
    fn from(_: core::fmt::Error) -> Self {
        Error::Format
    }
}
