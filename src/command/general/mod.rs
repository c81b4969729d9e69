//! ### 5 - General operation
pub mod types;

use atat::atat_derive::AtatCmd;
use types::*;

use super::NoResponse;

/// 5.2 Set module functionality +CFUN
///
/// Selects the level of functionality of the module. `SilentResetWithSimReset`
/// reboots the module, which answers `OK` before going quiet for a moment.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CFUN", NoResponse, timeout_ms = 1000)]
pub struct SetModuleFunctionality {
    #[at_arg(position = 0)]
    pub fun: Functionality,
}

/// 11.5 UART data rate configuration +IPR
///
/// The module answers `OK` at the old rate and switches right after.
#[derive(Clone, AtatCmd)]
#[at_cmd("+IPR", NoResponse, timeout_ms = 200)]
pub struct SetDataRate {
    #[at_arg(position = 0)]
    pub rate: u32,
}

#[cfg(test)]
mod test {
    use super::*;
    use atat::AtatCmd;

    #[test]
    fn silent_reset() {
        let cmd = SetModuleFunctionality {
            fun: Functionality::SilentResetWithSimReset,
        };
        let mut buf = [0u8; <SetModuleFunctionality as AtatCmd>::MAX_LEN];
        let len = cmd.write(&mut buf);
        assert_eq!(&buf[..len], b"AT+CFUN=15\r\n");
    }

    #[test]
    fn data_rate() {
        let cmd = SetDataRate { rate: 921_600 };
        let mut buf = [0u8; <SetDataRate as AtatCmd>::MAX_LEN];
        let len = cmd.write(&mut buf);
        assert_eq!(&buf[..len], b"AT+IPR=921600\r\n");
    }
}
