//! Subscribers for unsolicited result codes.
use heapless::Vec;

use crate::error::Error;

/// Room for one handler per socket plus the packet data context.
pub const MAX_URC_HANDLERS: usize = 8;

/// Receives every URC line the modem emits.
///
/// Handlers are called synchronously from inside `Modem::poll`, so they must
/// not try to talk to the modem themselves; record what is needed (e.g. in a
/// `Cell`) and act on it after the poll returns.
pub trait UrcHandler {
    fn handle_urc(&self, urc: &str);
}

/// Ordered, bounded set of URC subscribers.
pub struct UrcHandlers<'d, const N: usize = MAX_URC_HANDLERS> {
    handlers: Vec<&'d dyn UrcHandler, N>,
}

impl<'d, const N: usize> Default for UrcHandlers<'d, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'d, const N: usize> UrcHandlers<'d, N> {
    pub const fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn insert(&mut self, handler: &'d dyn UrcHandler) -> Result<(), Error> {
        self.handlers.push(handler).map_err(|_| {
            warn!("[URC] No free handler slot");
            Error::Overflow
        })
    }

    /// Remove the first registration of `handler`. Returns `false` if it was
    /// not registered.
    pub fn remove(&mut self, handler: &dyn UrcHandler) -> bool {
        match self
            .handlers
            .iter()
            .position(|h| {
                core::ptr::addr_eq(*h as *const dyn UrcHandler, handler as *const dyn UrcHandler)
            })
        {
            Some(idx) => {
                // `remove` shifts, keeping registration order.
                self.handlers.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn dispatch(&self, urc: &str) {
        debug!("[URC] {:?}", urc);
        for handler in self.handlers.iter() {
            handler.handle_urc(urc);
        }
    }
}
