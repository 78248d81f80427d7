//! Virtual radio recording transmissions with their send times.

use std::cell::RefCell;
use std::rc::Rc;

use embermesh_core::{RadioDriver, RadioError};

use crate::env::SimClock;

/// One frame handed to the virtual radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmittedFrame {
    /// Raw frame bytes.
    pub bytes: Vec<u8>,
    /// Virtual time of the send hand-off.
    pub at_ms: u64,
}

#[derive(Debug, Default)]
struct RadioInner {
    sent: Vec<TransmittedFrame>,
    fail_next: u32,
    receive_armed: bool,
}

/// Scripted radio double.
#[derive(Debug, Clone)]
pub struct SimRadio {
    clock: SimClock,
    inner: Rc<RefCell<RadioInner>>,
}

impl SimRadio {
    /// Radio over the shared clock.
    #[must_use]
    pub fn new(clock: SimClock) -> Self {
        Self { clock, inner: Rc::default() }
    }

    /// Everything transmitted so far.
    #[must_use]
    pub fn sent(&self) -> Vec<TransmittedFrame> {
        self.inner.borrow().sent.clone()
    }

    /// Number of transmitted frames.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.inner.borrow().sent.len()
    }

    /// Script the next `n` sends to fail at the driver.
    pub fn fail_next_sends(&self, n: u32) {
        self.inner.borrow_mut().fail_next = n;
    }

    /// True after the last TX completion re-armed receive.
    #[must_use]
    pub fn receive_armed(&self) -> bool {
        self.inner.borrow().receive_armed
    }
}

impl RadioDriver for SimRadio {
    fn send(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(RadioError("scripted radio failure".to_owned()));
        }
        let at_ms = self.clock.now_ms();
        tracing::debug!(len = frame.len(), at_ms, "sim radio send");
        inner.sent.push(TransmittedFrame { bytes: frame.to_vec(), at_ms });
        inner.receive_armed = false;
        Ok(())
    }

    fn enter_receive(&mut self) {
        self.inner.borrow_mut().receive_armed = true;
    }
}
