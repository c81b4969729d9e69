//! Reading and sending text mode SMS.
use heapless::String;

use super::modem::{Modem, DEFAULT_PROMPT_TIMEOUT, INGRESS_BUF_SIZE};
use crate::{
    command::sms::{DeleteMessage, ListMessages, SendMessage, REC_UNREAD},
    config::{ModemConfig, Transport},
    error::Error,
};

/// Separates two messages in a `+CMGL` listing.
const MESSAGE_MARKER: &str = "\r\n+CMGL: ";
const HEADER_PREFIX: &str = "+CMGL: ";
const REMOTE_NUMBER_MARKER: &str = "\"REC UNREAD\",\"";
const CTRL_Z: u8 = 0x1A;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    RequestList,
    AwaitListResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outgoing {
    Idle,
    Writing,
    Sending,
}

/// SMS inbox and outbox on top of a `Modem`.
///
/// Unread messages are fetched with a single `AT+CMGL` listing that is kept
/// and handed out one message at a time by `available`. A new listing is only
/// requested once the previous one has been consumed.
pub struct Sms<const N: usize = INGRESS_BUF_SIZE> {
    phase: Phase,
    inbox: String<N>,
    body_start: usize,
    body_end: usize,
    cursor: usize,
    outgoing: Outgoing,
}

impl<const N: usize> Default for Sms<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Sms<N> {
    pub const fn new() -> Self {
        Self {
            phase: Phase::Idle,
            inbox: String::new(),
            body_start: 0,
            body_end: 0,
            cursor: 0,
            outgoing: Outgoing::Idle,
        }
    }

    /// Move on to the next unread message and return the length of its body.
    ///
    /// `Ok(0)` means there is nothing more to read in this cycle; the next
    /// call asks the modem for a fresh listing. A listing that did not fit is
    /// reported as `Error::Overflow` once; the messages kept from it are
    /// handed out by the following calls.
    pub fn available<T, C>(&mut self, modem: &mut Modem<'_, T, C, N>) -> nb::Result<usize, Error>
    where
        T: Transport,
        C: ModemConfig,
    {
        if self.is_selected() {
            match self.inbox.find(MESSAGE_MARKER) {
                Some(idx) => {
                    let mut rest = String::new();
                    rest.push_str(&self.inbox[idx + 2..]).ok();
                    self.inbox = rest;
                }
                None => self.inbox.clear(),
            }
            self.select_none();
        }

        if self.inbox.is_empty() {
            if self.phase == Phase::Idle {
                self.phase = Phase::RequestList;
            }
            self.ready(modem)?;
        }

        if !self.inbox.starts_with(HEADER_PREFIX) {
            self.inbox.clear();
            self.select_none();
            return Ok(0);
        }

        self.body_start = self.inbox.find('\n').map_or(self.inbox.len(), |idx| idx + 1);
        self.body_end = self
            .inbox
            .find(MESSAGE_MARKER)
            .unwrap_or(self.inbox.len())
            .max(self.body_start);
        self.cursor = self.body_start;

        Ok(self.message().chars().count())
    }

    /// Advance the listing by one step. Never sends while the modem has a
    /// command outstanding.
    pub fn ready<T, C>(&mut self, modem: &mut Modem<'_, T, C, N>) -> nb::Result<(), Error>
    where
        T: Transport,
        C: ModemConfig,
    {
        let ready = modem.ready();
        if ready.is_pending() {
            return Err(nb::Error::WouldBlock);
        }

        match self.phase {
            Phase::Idle => ready.into_nb(),
            Phase::RequestList => {
                modem.send_cmd(&ListMessages { stat: REC_UNREAD })?;
                modem.capture_response();
                self.phase = Phase::AwaitListResponse;
                Err(nb::Error::WouldBlock)
            }
            Phase::AwaitListResponse => {
                self.phase = Phase::Idle;
                let truncated = modem.response_truncated();
                let listing = modem.take_response();
                ready.into_nb()?;
                self.inbox = listing.unwrap_or_default();

                if truncated {
                    // The last message kept may be cut off.
                    match self.inbox.rfind(MESSAGE_MARKER) {
                        Some(idx) => self.inbox.truncate(idx),
                        None => self.inbox.clear(),
                    }
                    warn!("SMS listing did not fit the inbox, unread messages were lost");
                    return Err(nb::Error::Other(Error::Overflow));
                }
                Ok(())
            }
        }
    }

    fn is_selected(&self) -> bool {
        self.body_end > 0
    }

    fn select_none(&mut self) {
        self.body_start = 0;
        self.body_end = 0;
        self.cursor = 0;
    }

    /// Sender of the current message.
    pub fn remote_number(&self) -> Option<&str> {
        let start = self.inbox.find(REMOTE_NUMBER_MARKER)? + REMOTE_NUMBER_MARKER.len();
        let rest = &self.inbox[start..];
        Some(rest.find('"').map_or(rest, |end| &rest[..end]))
    }

    /// Body of the current message.
    pub fn message(&self) -> &str {
        &self.inbox[self.body_start..self.body_end]
    }

    /// Next byte of the current message body.
    pub fn read(&mut self) -> Option<u8> {
        let c = self.inbox[self.cursor..self.body_end].chars().next()?;
        self.cursor += c.len_utf8();
        Some(c as u32 as u8)
    }

    pub fn peek(&self) -> Option<u8> {
        self.inbox[self.cursor..self.body_end]
            .chars()
            .next()
            .map(|c| c as u32 as u8)
    }

    /// Storage index of the current message, taken from its `+CMGL:` header.
    fn current_index(&self) -> Option<&str> {
        let start = self.inbox.find(' ')? + 1;
        let end = self.inbox.find(',')?;
        self.inbox.get(start..end)
    }

    /// Delete the current message from the module's storage.
    pub fn delete_current<T, C>(&mut self, modem: &mut Modem<'_, T, C, N>) -> Result<(), Error>
    where
        T: Transport,
        C: ModemConfig,
    {
        let index = self.current_index().ok_or(Error::NotReady)?;
        let index = index.trim().parse().map_err(|_| Error::InvalidResponse)?;

        if modem.ready().is_pending() {
            return Err(Error::NotReady);
        }

        debug!("Deleting SMS {}", index);
        modem.send_at(&DeleteMessage { index })?;
        Ok(())
    }

    /// Start a new outgoing message to `to`. The body is written with
    /// `write` and sent with `end_sms`.
    pub fn begin_sms<T, C>(&mut self, modem: &mut Modem<'_, T, C, N>, to: &str) -> Result<(), Error>
    where
        T: Transport,
        C: ModemConfig,
    {
        if self.outgoing != Outgoing::Idle || modem.ready().is_pending() {
            return Err(Error::NotReady);
        }
        if to.len() > 32 {
            return Err(Error::Overflow);
        }

        modem.send_cmd(&SendMessage { number: to })?;
        modem.wait_for_prompt(DEFAULT_PROMPT_TIMEOUT)?;
        self.outgoing = Outgoing::Writing;
        Ok(())
    }

    /// Append to the body of the outgoing message. Returns 0 outside
    /// `begin_sms`/`end_sms`.
    pub fn write<T, C>(&mut self, modem: &mut Modem<'_, T, C, N>, body: &[u8]) -> usize
    where
        T: Transport,
        C: ModemConfig,
    {
        if self.outgoing != Outgoing::Writing {
            return 0;
        }
        modem.write(body)
    }

    /// Send the outgoing message. Call again until it stops returning
    /// `WouldBlock`.
    pub fn end_sms<T, C>(&mut self, modem: &mut Modem<'_, T, C, N>) -> nb::Result<(), Error>
    where
        T: Transport,
        C: ModemConfig,
    {
        match self.outgoing {
            Outgoing::Idle => Err(nb::Error::Other(Error::NotReady)),
            Outgoing::Writing => {
                modem.write_byte(CTRL_Z);
                self.outgoing = Outgoing::Sending;
                self.end_sms(modem)
            }
            Outgoing::Sending => {
                let res = modem.ready().into_nb();
                if !matches!(res, Err(nb::Error::WouldBlock)) {
                    self.outgoing = Outgoing::Idle;
                }
                res
            }
        }
    }
}
