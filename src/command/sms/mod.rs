//! ### 11 - Short Messages Service
use atat::atat_derive::AtatCmd;

use super::NoResponse;

/// `<stat>` of messages received but not yet read, text mode.
pub const REC_UNREAD: &str = "REC UNREAD";

/// 11.10 List message +CMGL
///
/// Lists the messages with status `stat`. The listing is carried in the
/// information text of the response, one `+CMGL:` header line per message
/// followed by the message body.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CMGL", NoResponse, timeout_ms = 10000)]
pub struct ListMessages<'a> {
    #[at_arg(position = 0, len = 10)]
    pub stat: &'a str,
}

/// 11.13 Delete message +CMGD
#[derive(Clone, AtatCmd)]
#[at_cmd("+CMGD", NoResponse, timeout_ms = 55000)]
pub struct DeleteMessage {
    #[at_arg(position = 0)]
    pub index: u16,
}

/// 11.15 Send message +CMGS
///
/// The module answers with a `>` prompt; the body follows, terminated by
/// Ctrl-Z.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CMGS", NoResponse, timeout_ms = 180000)]
pub struct SendMessage<'a> {
    #[at_arg(position = 0, len = 32)]
    pub number: &'a str,
}
