//! AT commands for the u-blox SARA-R4 cellular module family\
//! Following the [SARA-R4 AT Commands Manual](https://www.u-blox.com/docs/UBX-17003787)

pub mod general;
pub mod security;
pub mod sms;

use atat::atat_derive::{AtatCmd, AtatResp};

#[derive(Debug, Clone, AtatResp, PartialEq)]
pub struct NoResponse;

#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("", NoResponse, timeout_ms = 200)]
pub struct AT;

#[cfg(test)]
mod test {
    use super::*;
    use atat::AtatCmd;

    #[test]
    fn at_renders_bare_attention() {
        let mut buf = [0u8; <AT as AtatCmd>::MAX_LEN];
        let len = AT.write(&mut buf);
        assert_eq!(&buf[..len], b"AT\r\n");
    }
}
