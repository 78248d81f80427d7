//! UDP stand-in for the LoRa radio.

use std::io::ErrorKind;
use std::net::UdpSocket;

use embermesh_core::{RadioDriver, RadioError};

/// Sending half: implements [`RadioDriver`] over a UDP socket.
#[derive(Debug)]
pub struct UdpAir {
    socket: UdpSocket,
    peer: String,
}

impl UdpAir {
    /// Bind the air socket and aim it at `peer`.
    pub fn bind(bind: &str, peer: &str) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(bind)?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket, peer: peer.to_owned() })
    }

    /// Clone the receiving half for the main loop.
    pub fn receiver(&self) -> std::io::Result<UdpReceiver> {
        Ok(UdpReceiver { socket: self.socket.try_clone()? })
    }
}

impl RadioDriver for UdpAir {
    fn send(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        self.socket
            .send_to(frame, self.peer.as_str())
            .map(|_| ())
            .map_err(|err| RadioError(err.to_string()))
    }

    fn enter_receive(&mut self) {
        // The socket receives continuously; nothing to re-arm.
    }
}

/// Receiving half of the air socket.
#[derive(Debug)]
pub struct UdpReceiver {
    socket: UdpSocket,
}

impl UdpReceiver {
    /// Non-blocking receive into `buf`; `None` when nothing is pending.
    pub fn try_recv(&self, buf: &mut [u8]) -> std::io::Result<Option<usize>> {
        match self.socket.recv_from(buf) {
            Ok((len, _from)) => Ok(Some(len)),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }
}
