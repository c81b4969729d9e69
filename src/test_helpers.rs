//! Doubles for the serial link and GPIO lines used by the unit tests.
use core::convert::Infallible;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::string::String;
use std::sync::Once;
use std::vec::Vec;

use embassy_time::Duration;

use crate::blocking::Modem;
use crate::config::{ModemConfig, Transport};

static INIT: Once = Once::new();

pub fn init_logger() {
    INIT.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace"))
            .is_test(true)
            .try_init()
            .ok();
    });
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkEvent {
    Begin(u32),
    End,
}

#[derive(Default)]
struct Link {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    echo: bool,
    pending: Vec<u8>,
    script: VecDeque<(Vec<u8>, Vec<u8>)>,
    events: Vec<LinkEvent>,
}

/// Scripted modem on the other end of a serial link.
///
/// Everything written is echoed back (like a module with `ATE1`). When the
/// bytes written since the last scripted reply end with the next trigger, the
/// matching reply is queued for reading. Clones share the same link, so a
/// test can keep a handle after moving one into the `Modem`.
#[derive(Clone)]
pub struct MockTransport {
    link: Rc<RefCell<Link>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            link: Rc::new(RefCell::new(Link {
                echo: true,
                ..Default::default()
            })),
        }
    }

    /// Turn the echo of written data on or off.
    pub fn set_echo(&self, echo: bool) {
        self.link.borrow_mut().echo = echo;
    }

    /// Bytes the modem sends unprompted.
    pub fn feed(&self, data: &[u8]) {
        self.link.borrow_mut().rx.extend(data);
    }

    /// Answer with `reply` once the written data ends with `trigger`.
    pub fn expect(&self, trigger: &[u8], reply: &[u8]) -> &Self {
        self.link
            .borrow_mut()
            .script
            .push_back((trigger.to_vec(), reply.to_vec()));
        self
    }

    pub fn tx(&self) -> String {
        String::from_utf8_lossy(&self.link.borrow().tx).into_owned()
    }

    pub fn rx_len(&self) -> usize {
        self.link.borrow().rx.len()
    }

    pub fn script_done(&self) -> bool {
        self.link.borrow().script.is_empty()
    }

    pub fn events(&self) -> Vec<LinkEvent> {
        self.link.borrow().events.clone()
    }
}

impl embedded_io::ErrorType for MockTransport {
    type Error = Infallible;
}

impl embedded_io::Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut link = self.link.borrow_mut();
        let mut n = 0;
        while n < buf.len() {
            match link.rx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl embedded_io::ReadReady for MockTransport {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.link.borrow().rx.is_empty())
    }
}

impl embedded_io::Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let link = &mut *self.link.borrow_mut();
        link.tx.extend_from_slice(buf);
        if link.echo {
            link.rx.extend(buf);
        }
        link.pending.extend_from_slice(buf);

        let triggered = matches!(link.script.front(), Some((trigger, _)) if link.pending.ends_with(trigger));
        if triggered {
            if let Some((_, reply)) = link.script.pop_front() {
                link.rx.extend(reply);
            }
            link.pending.clear();
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Transport for MockTransport {
    fn begin(&mut self, baud_rate: u32) {
        self.link.borrow_mut().events.push(LinkEvent::Begin(baud_rate));
    }

    fn end(&mut self) {
        self.link.borrow_mut().events.push(LinkEvent::End);
    }
}

/// Output pin recording every level it was driven to.
#[derive(Clone, Default)]
pub struct MockPin {
    levels: Rc<RefCell<Vec<bool>>>,
}

impl MockPin {
    pub fn levels(&self) -> Vec<bool> {
        self.levels.borrow().clone()
    }
}

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.borrow_mut().push(true);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct TestConfig {
    pub power: MockPin,
    pub reset: Option<MockPin>,
}

impl ModemConfig for TestConfig {
    type PowerPin = MockPin;
    type ResetPin = MockPin;

    const AUTOSENSE_TIMEOUT: Duration = Duration::from_millis(500);
    const RESET_PULSE: Duration = Duration::from_millis(1);

    fn power_pin(&mut self) -> &mut Self::PowerPin {
        &mut self.power
    }

    fn reset_pin(&mut self) -> Option<&mut Self::ResetPin> {
        self.reset.as_mut()
    }
}

pub type TestModem<'d> = Modem<'d, MockTransport, TestConfig>;

/// A modem wired to a fresh echoing link.
pub fn setup_modem<'d>() -> (TestModem<'d>, MockTransport) {
    init_logger();
    let link = MockTransport::new();
    (Modem::new(link.clone(), TestConfig::default()), link)
}
