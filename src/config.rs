use embassy_time::Duration;
use embedded_hal::digital::OutputPin;
use embedded_io::{Read, ReadReady, Write};

use crate::DEFAULT_BAUD_RATE;

/// Board level settings for a modem: which pins drive it and how fast the
/// serial link should run once it is up.
pub trait ModemConfig {
    type PowerPin: OutputPin;
    type ResetPin: OutputPin;

    // Transport settings
    const BAUD_RATE: u32 = DEFAULT_BAUD_RATE;

    /// How long `begin` keeps probing with `AT` before giving up.
    const AUTOSENSE_TIMEOUT: Duration = Duration::from_secs(10);
    /// Width of the hardware reset pulse.
    const RESET_PULSE: Duration = Duration::from_millis(100);

    fn power_pin(&mut self) -> &mut Self::PowerPin;

    fn reset_pin(&mut self) -> Option<&mut Self::ResetPin> {
        None
    }
}

/// Byte sink/source the modem is attached to.
///
/// `ReadReady` stands in for "bytes available"; the engine never calls
/// `read` unless `read_ready` reported data.
pub trait Transport: Read + Write + ReadReady {
    /// (Re)open the link at `baud_rate`.
    fn begin(&mut self, baud_rate: u32);
    fn end(&mut self);
}
