/// Errors surfaced by the modem engine and the layers built on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The command finished with `ERROR`.
    Error,
    /// The command finished with `NO CARRIER`.
    NoCarrier,
    /// The command finished with `+CME ERROR: <err>`.
    CmeError,
    /// Neither a final result code nor the expected prompt arrived in time.
    Timeout,
    /// A bounded buffer or collection is full.
    Overflow,
    /// The captured response of a typed command could not be parsed.
    InvalidResponse,
    /// The operation is not valid in the current state.
    NotReady,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Error => f.write_str("command failed with ERROR"),
            Error::NoCarrier => f.write_str("command failed with NO CARRIER"),
            Error::CmeError => f.write_str("command failed with CME ERROR"),
            Error::Timeout => f.write_str("timed out waiting for the modem"),
            Error::Overflow => f.write_str("buffer overflow"),
            Error::InvalidResponse => f.write_str("invalid response"),
            Error::NotReady => f.write_str("not ready"),
        }
    }
}
