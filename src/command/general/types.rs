//! Argument and parameter types used by General Commands and Responses

use atat::atat_derive::AtatEnum;

#[derive(Debug, Clone, Copy, PartialEq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Functionality {
    /// Minimum functionality, radio off
    Minimum = 0,
    Full = 1,
    AirplaneMode = 4,
    /// Silent reset of the module, detaching from the network and resetting
    /// the SIM card
    SilentResetWithSimReset = 15,
    /// Silent reset of the module, detaching from the network
    SilentReset = 16,
}
