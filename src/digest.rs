//! Byte classifier for the unframed AT text stream.
//!
//! The modem link carries three kinds of text on one channel: the echo of the
//! command we just sent, the response to that command terminated by a final
//! result code, and unsolicited result codes (URCs) that may show up at any
//! time. None of them are length prefixed, so the digester accumulates bytes
//! and decides what the buffer is by looking at how it starts and ends.
use heapless::String;

use crate::error::Error;

/// Line terminator used by the modem (S3 + S4).
pub const LINE_TERM: &str = "\r\n";
/// Prompt sent by the modem when it is ready to receive a data payload.
pub const PROMPT: char = '>';

const ECHO_PREFIX: &str = "AT";

/// Final result codes, in the order they are searched for.
const RESULT_CODES: [(&str, ResultCode); 4] = [
    ("OK\r\n", ResultCode::Ok),
    ("ERROR\r\n", ResultCode::Error),
    ("NO CARRIER\r\n", ResultCode::NoCarrier),
    ("CME ERROR", ResultCode::CmeError),
];

/// Outcome of the most recently sent command.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ResultCode {
    /// No final result code received yet.
    Pending = 0,
    Ok = 1,
    Error = 2,
    NoCarrier = 3,
    CmeError = 4,
}

impl ResultCode {
    pub fn is_pending(self) -> bool {
        self == ResultCode::Pending
    }

    /// `None` while the command is still running.
    pub fn into_result(self) -> Option<Result<(), Error>> {
        match self {
            ResultCode::Pending => None,
            ResultCode::Ok => Some(Ok(())),
            ResultCode::Error => Some(Err(Error::Error)),
            ResultCode::NoCarrier => Some(Err(Error::NoCarrier)),
            ResultCode::CmeError => Some(Err(Error::CmeError)),
        }
    }

    pub fn into_nb(self) -> nb::Result<(), Error> {
        match self.into_result() {
            None => Err(nb::Error::WouldBlock),
            Some(res) => res.map_err(nb::Error::Other),
        }
    }
}

/// State of the `AtDigester`, used to tell responses from URCs.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// The buffer holds an unclassified line fragment.
    #[default]
    Idle,
    /// A command echo was seen; the buffer holds the response so far.
    ReceivingResponse,
}

/// What digesting a single byte resulted in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DigestResult {
    None,
    /// The command echo was recognised.
    Echo,
    /// End of a response line without a final result code.
    Line,
    /// A URC line was handed to the URC callback.
    Urc,
    /// The pending command completed.
    Response(ResultCode),
}

/// Longest result code line still recognised once a response no longer fits
/// the buffer.
const MAX_RESULT_LINE_LEN: usize = 128;

/// Accumulates bytes from the modem and classifies them one at a time.
#[derive(Debug, Default)]
pub struct AtDigester<const N: usize> {
    /// Current processing state.
    state: State,
    buf: String<N>,
    /// Line being received after the response outgrew `buf`.
    line: String<MAX_RESULT_LINE_LEN>,
    overflowed: bool,
    truncated: bool,
}

impl<const N: usize> AtDigester<N> {
    pub const fn new() -> Self {
        Self {
            state: State::Idle,
            buf: String::new(),
            line: String::new(),
            overflowed: false,
            truncated: false,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn buffer(&self) -> &str {
        self.buf.as_str()
    }

    /// Whether the last completed response had to be cut short.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Drop any partial data, e.g. after a timeout.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.line.clear();
        self.overflowed = false;
    }

    /// `send` always starts over from `Idle`; the echo moves us on.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.truncated = false;
    }

    pub fn ends_with_prompt(&self) -> bool {
        self.buf.ends_with(PROMPT)
    }

    /// Feed one byte.
    ///
    /// URC lines are passed, trimmed, to `on_urc`. When a final result code
    /// completes the response and `capture` is set, the response text is
    /// written there: what came before the result code for `OK`, the result
    /// code line onwards for everything else.
    ///
    /// A response longer than the buffer keeps its first complete lines and
    /// is reported as `truncated` once it completes.
    pub fn digest<F>(&mut self, byte: u8, capture: Option<&mut String<N>>, on_urc: F) -> DigestResult
    where
        F: FnOnce(&str),
    {
        // Bytes are taken as Latin-1 so every byte survives into the text.
        let c = byte as char;
        if self.overflowed {
            if self.line.push(c).is_err() {
                // Payload, a result code line is never this long.
                self.line.clear();
            }
        } else if self.buf.push(c).is_err() {
            if self.state == State::Idle {
                warn!("Ingress buffer full, dropping {} bytes", self.buf.len());
                self.buf.clear();
                return DigestResult::None;
            }
            self.overflow(c);
        }

        match self.state {
            State::Idle => {
                if !self.buf.ends_with(LINE_TERM) {
                    return DigestResult::None;
                }

                if self.buf.starts_with(ECHO_PREFIX) {
                    self.state = State::ReceivingResponse;
                    self.buf.clear();
                    return DigestResult::Echo;
                }

                let line = trim(&self.buf);
                let res = if line.is_empty() {
                    DigestResult::None
                } else {
                    on_urc(line);
                    DigestResult::Urc
                };
                self.buf.clear();
                res
            }
            State::ReceivingResponse => {
                if byte != b'\n' {
                    return DigestResult::None;
                }

                // The whole response is searched on every line end and the
                // last occurrence of a code counts. A payload containing a
                // literal "OK\r\n" after an "ERROR\r\n" therefore reads as OK.
                let searched = if self.overflowed {
                    self.line.as_str()
                } else {
                    self.buf.as_str()
                };
                let found = RESULT_CODES
                    .iter()
                    .find_map(|(token, code)| searched.rfind(token).map(|idx| (idx, *code)));

                let Some((idx, code)) = found else {
                    if self.overflowed {
                        self.line.clear();
                    }
                    return DigestResult::Line;
                };

                if let Some(capture) = capture {
                    let text = match (code, self.overflowed) {
                        (ResultCode::Ok, true) => self.buf.as_str(),
                        (ResultCode::Ok, false) => &self.buf.as_str()[..idx],
                        (_, true) => &self.line.as_str()[idx..],
                        (_, false) => &self.buf.as_str()[idx..],
                    };
                    capture.clear();
                    // Never longer than the buffer it is cut from.
                    capture.push_str(trim(text)).ok();
                }

                self.truncated = self.overflowed;
                self.state = State::Idle;
                self.clear();
                DigestResult::Response(code)
            }
        }
    }

    /// Stop growing the response and keep its complete lines. The unfinished
    /// line moves on to `line`, where a result code can still be found.
    fn overflow(&mut self, c: char) {
        let keep = self.buf.rfind('\n').map_or(0, |idx| idx + 1);
        warn!(
            "Response does not fit the ingress buffer, keeping the first {} bytes",
            keep
        );

        self.line.clear();
        if self.line.push_str(&self.buf[keep..]).is_err() {
            self.line.clear();
        }
        self.line.push(c).ok();
        self.buf.truncate(keep);
        self.overflowed = true;
    }
}

pub(crate) fn trim(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_ascii_whitespace())
}
