use core::fmt::Arguments;

use atat::AtatCmd;
use embassy_time::{block_for, Duration};
use embedded_hal::digital::OutputPin;
use heapless::String;

use super::timer::{self, Cooldown, Timer};
use crate::{
    command::{
        general::{types::Functionality, SetDataRate, SetModuleFunctionality},
        AT,
    },
    config::{ModemConfig, Transport},
    digest::{trim, AtDigester, DigestResult, ResultCode, LINE_TERM},
    error::Error,
    urc::{UrcHandler, UrcHandlers},
    DEFAULT_BAUD_RATE,
};

/// Timeout used by `wait_for_result` callers that have nothing better.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(200);
/// How long a data-upload command may take to come back with `>`.
pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_millis(500);
/// Size of the buffer typed commands are rendered into.
pub const MAX_CMD_LEN: usize = 128;
/// Default size of the ingress buffer. Fits a `+CMGL` listing of several
/// full-length messages.
pub const INGRESS_BUF_SIZE: usize = 2048;

const AUTOSENSE_INTERVAL: Duration = Duration::from_millis(100);
const BAUD_SWITCH_DELAY: Duration = Duration::from_millis(100);
/// Silence after which the echo of a raw payload is given up on.
const ECHO_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
struct Capture<const N: usize> {
    armed: bool,
    filled: bool,
    truncated: bool,
    text: String<N>,
}

impl<const N: usize> Capture<N> {
    fn clear(&mut self) {
        self.armed = false;
        self.filled = false;
        self.truncated = false;
        self.text.clear();
    }

    fn arm(&mut self) {
        self.clear();
        self.armed = true;
    }

    fn slot(&mut self) -> Option<&mut String<N>> {
        self.armed.then_some(&mut self.text)
    }

    fn take(&mut self) -> Option<String<N>> {
        let text = self.filled.then(|| core::mem::take(&mut self.text));
        let truncated = self.truncated;
        self.clear();
        self.truncated = truncated;
        text
    }
}

/// The protocol engine: owns the serial link and everything needed to run a
/// single outstanding AT command over it while URCs keep flowing.
///
/// Nothing happens in the background. Bytes are only read, classified and
/// dispatched from within `poll`, `ready` and the blocking waits built on top
/// of them.
pub struct Modem<'d, T, C, const N: usize = INGRESS_BUF_SIZE>
where
    T: Transport,
    C: ModemConfig,
{
    transport: T,
    config: C,
    baud_rate: u32,
    digester: AtDigester<N>,
    result: ResultCode,
    capture: Capture<N>,
    cooldown: Cooldown,
    urc_handlers: UrcHandlers<'d>,
}

impl<'d, T, C, const N: usize> Modem<'d, T, C, N>
where
    T: Transport,
    C: ModemConfig,
{
    pub fn new(transport: T, config: C) -> Self {
        Self {
            transport,
            config,
            baud_rate: C::BAUD_RATE,
            digester: AtDigester::new(),
            // Nothing is outstanding on a fresh link.
            result: ResultCode::Ok,
            capture: Capture::default(),
            cooldown: Cooldown::default(),
            urc_handlers: UrcHandlers::new(),
        }
    }

    /// Power the module up and bring the link to the configured baud rate.
    ///
    /// With `restart` and a reset pin, the module is hard reset; otherwise it
    /// is probed and soft reset with `AT+CFUN=15`.
    pub fn begin(&mut self, restart: bool) -> Result<(), Error> {
        self.transport.begin(self.baud_rate.min(DEFAULT_BAUD_RATE));

        info!("Powering on modem");
        self.config.power_pin().set_high().ok();

        if restart && self.config.reset_pin().is_some() {
            self.hard_reset();
        } else {
            self.autosense(C::AUTOSENSE_TIMEOUT)?;
            self.reset()?;
        }

        self.autosense(C::AUTOSENSE_TIMEOUT)?;

        if self.baud_rate > DEFAULT_BAUD_RATE {
            info!("Switching baud rate to {}", self.baud_rate);
            self.send_at(&SetDataRate {
                rate: self.baud_rate,
            })?;

            self.transport.end();
            block_for(BAUD_SWITCH_DELAY);
            self.transport.begin(self.baud_rate);

            self.autosense(C::AUTOSENSE_TIMEOUT)?;
        }

        Ok(())
    }

    pub fn end(&mut self) {
        self.transport.end();
        if let Some(pin) = self.config.reset_pin() {
            pin.set_high().ok();
        }
        self.config.power_pin().set_low().ok();
    }

    fn hard_reset(&mut self) {
        warn!("Hard resetting SARA-R4");
        if let Some(pin) = self.config.reset_pin() {
            pin.set_high().ok();
            block_for(C::RESET_PULSE);
            pin.set_low().ok();
        }
    }

    /// Probe with `AT` every 100 ms until the module answers `OK`.
    pub fn autosense(&mut self, timeout: Duration) -> Result<(), Error> {
        let timer = Timer::after(timeout);
        loop {
            let next_probe = Timer::after(AUTOSENSE_INTERVAL);
            if self.noop().is_ok() {
                return Ok(());
            }
            if timer.is_expired() {
                error!("Modem did not respond within {} ms", timeout.as_millis());
                return Err(Error::Timeout);
            }
            next_probe.wait();
        }
    }

    pub fn noop(&mut self) -> Result<(), Error> {
        self.send_at(&AT)?;
        Ok(())
    }

    /// Silent reset, `AT+CFUN=15`.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.send_at(&SetModuleFunctionality {
            fun: Functionality::SilentResetWithSimReset,
        })?;
        Ok(())
    }

    /// Baud rate negotiated by the next `begin`.
    pub fn set_baud_rate(&mut self, baud_rate: u32) {
        self.baud_rate = baud_rate;
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Send a raw command line. `command` is given without the line
    /// terminator.
    ///
    /// Transport errors are only logged; the outcome is learnt through
    /// `ready` or `wait_for_result`.
    pub fn send(&mut self, command: &str) {
        if command.len() < 50 {
            trace!("Sending command: {:?}", command);
        } else {
            trace!("Sending command with long payload ({} bytes)", command.len());
        }
        self.transmit(&[command.as_bytes(), LINE_TERM.as_bytes()]);
    }

    pub fn send_fmt(&mut self, args: Arguments<'_>) -> Result<(), Error> {
        let mut command = String::<MAX_CMD_LEN>::new();
        core::fmt::Write::write_fmt(&mut command, args).map_err(|_| Error::Overflow)?;
        self.send(&command);
        Ok(())
    }

    /// Render a typed command and send it, without waiting for the result.
    pub fn send_cmd<Cmd: AtatCmd>(&mut self, cmd: &Cmd) -> Result<(), Error> {
        if Cmd::MAX_LEN > MAX_CMD_LEN {
            error!("Command does not fit the command buffer ({} bytes)", Cmd::MAX_LEN);
            return Err(Error::Overflow);
        }

        let mut buf = [0u8; MAX_CMD_LEN];
        let len = cmd.write(&mut buf);
        trace!("Sending command: {:?}", atat::helpers::LossyStr(&buf[..len]));
        self.transmit(&[&buf[..len]]);
        Ok(())
    }

    /// Send a typed command, wait for its final result code for up to
    /// `Cmd::MAX_TIMEOUT_MS` and parse the captured response.
    pub fn send_at<Cmd: AtatCmd>(&mut self, cmd: &Cmd) -> Result<Cmd::Response, Error> {
        self.send_cmd(cmd)?;

        if !Cmd::EXPECTS_RESPONSE_CODE {
            let empty: &[u8] = &[];
            return cmd.parse(Ok(empty)).map_err(|_| Error::InvalidResponse);
        }

        let mut response = String::<N>::new();
        self.wait_for_result(
            Duration::from_millis(Cmd::MAX_TIMEOUT_MS.into()),
            Some(&mut response),
        )?;

        // URCs arriving between the echo and the result code end up in front
        // of the information text. Drop them line by line until it parses.
        let mut text = response.as_str();
        loop {
            if let Ok(resp) = cmd.parse(Ok(text.as_bytes())) {
                return Ok(resp);
            }
            text = match text.find(LINE_TERM) {
                Some(idx) => trim(&text[idx..]),
                None if !text.is_empty() => "",
                None => break,
            };
        }

        error!("Failed to parse response: {:?}", response.as_str());
        Err(Error::InvalidResponse)
    }

    fn transmit(&mut self, chunks: &[&[u8]]) {
        self.cooldown.wait();

        for chunk in chunks {
            if self.transport.write_all(chunk).is_err() {
                warn!("Failed to write command to transport");
            }
        }
        if self.transport.flush().is_err() {
            warn!("Failed to flush transport");
        }

        self.digester.reset();
        self.result = ResultCode::Pending;
        self.capture.clear();
    }

    /// Write a raw payload and swallow its echo, so the payload never reaches
    /// the classifier. Returns the number of bytes written.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let written = match self.transport.write_all(data) {
            Ok(()) => data.len(),
            Err(_) => {
                warn!("Failed to write payload to transport");
                0
            }
        };
        self.transport.flush().ok();

        let mut discarded = 0;
        let mut timer = Timer::after(ECHO_TIMEOUT);
        while discarded < written {
            if self.read_byte().is_some() {
                discarded += 1;
                timer = Timer::after(ECHO_TIMEOUT);
            } else if timer.is_expired() {
                warn!("Echo stopped after {} of {} bytes", discarded, written);
                break;
            }
        }

        written
    }

    /// Write a single raw byte. Its echo, if any, goes through the
    /// classifier like any other modem output.
    pub fn write_byte(&mut self, byte: u8) -> usize {
        match self.transport.write(&[byte]) {
            Ok(n) => {
                self.transport.flush().ok();
                n
            }
            Err(_) => {
                warn!("Failed to write to transport");
                0
            }
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        match self.transport.read_ready() {
            Ok(true) => {}
            Ok(false) => return None,
            Err(_) => {
                warn!("Failed to query transport");
                return None;
            }
        }

        let mut byte = [0u8; 1];
        match self.transport.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            Ok(_) => None,
            Err(_) => {
                warn!("Failed to read from transport");
                None
            }
        }
    }

    fn digest(&mut self, byte: u8) -> DigestResult {
        let handlers = &self.urc_handlers;
        let res = self
            .digester
            .digest(byte, self.capture.slot(), |urc| handlers.dispatch(urc));

        match res {
            DigestResult::Line | DigestResult::Urc => self.cooldown.mark(),
            DigestResult::Response(code) => {
                trace!("Command completed with {:?}", code);
                self.cooldown.mark();
                self.result = code;
                if self.capture.armed {
                    self.capture.armed = false;
                    self.capture.filled = true;
                    self.capture.truncated = self.digester.truncated();
                }
            }
            DigestResult::None | DigestResult::Echo => {}
        }
        res
    }

    /// Run every byte currently available through the classifier. Stops
    /// right after a command completes; what is left is read on the next
    /// call.
    pub fn poll(&mut self) {
        while let Some(byte) = self.read_byte() {
            if let DigestResult::Response(_) = self.digest(byte) {
                break;
            }
        }
    }

    /// Poll, then report the outcome of the last command.
    pub fn ready(&mut self) -> ResultCode {
        self.poll();
        self.result
    }

    /// Block until the last command completes or `timeout` passes.
    ///
    /// With `response`, the text of the response is stored there: the
    /// information text for `OK`, the result code line otherwise. An `OK`
    /// response that did not fit is returned as far as it was kept, together
    /// with `Err(Error::Overflow)`.
    pub fn wait_for_result(
        &mut self,
        timeout: Duration,
        response: Option<&mut String<N>>,
    ) -> Result<(), Error> {
        if response.is_some() {
            self.capture.arm();
        }

        let res = Timer::with_timeout(timeout, || self.ready().into_result());

        let mut truncated = false;
        if let Some(out) = response {
            if let Some(text) = self.capture.take() {
                *out = text;
                truncated = self.capture.truncated;
            }
        }

        match res {
            Ok(()) if truncated => Err(Error::Overflow),
            Ok(()) => Ok(()),
            Err(timer::Error::Other(e)) => Err(e),
            Err(timer::Error::Timeout) => {
                warn!("Timed out after {} ms waiting for response", timeout.as_millis());
                self.capture.clear();
                self.digester.clear();
                Err(Error::Timeout)
            }
        }
    }

    /// Block until the modem prompts for a payload with `>`.
    ///
    /// A final result code instead of the prompt means the command was
    /// refused.
    pub fn wait_for_prompt(&mut self, timeout: Duration) -> Result<(), Error> {
        let res = Timer::with_timeout(timeout, || {
            while let Some(byte) = self.read_byte() {
                if let DigestResult::Response(code) = self.digest(byte) {
                    return Some(match code.into_result() {
                        Some(Err(e)) => Err(e),
                        _ => Err(Error::InvalidResponse),
                    });
                }
                if self.digester.ends_with_prompt() {
                    self.digester.clear();
                    return Some(Ok(()));
                }
            }
            None
        });

        match res {
            Ok(()) => Ok(()),
            Err(timer::Error::Other(e)) => {
                warn!("Expected prompt, got {:?}", e);
                Err(e)
            }
            Err(timer::Error::Timeout) => {
                warn!("Timed out after {} ms waiting for prompt", timeout.as_millis());
                self.digester.clear();
                Err(Error::Timeout)
            }
        }
    }

    /// Capture the response of the command just sent. Must be called after
    /// `send`, which drops any earlier capture.
    pub fn capture_response(&mut self) {
        self.capture.arm();
    }

    /// The captured response, once the command has completed.
    pub fn take_response(&mut self) -> Option<String<N>> {
        self.capture.take()
    }

    /// Whether the last captured response was cut short to fit the buffer.
    /// Stays set until the next command is sent.
    pub fn response_truncated(&self) -> bool {
        self.capture.truncated
    }

    /// Returns `Err(Error::Overflow)` if all handler slots are taken.
    pub fn add_urc_handler(&mut self, handler: &'d dyn UrcHandler) -> Result<(), Error> {
        self.urc_handlers.insert(handler)
    }

    pub fn remove_urc_handler(&mut self, handler: &dyn UrcHandler) -> bool {
        self.urc_handlers.remove(handler)
    }

    pub fn release(self) -> (T, C) {
        (self.transport, self.config)
    }
}
