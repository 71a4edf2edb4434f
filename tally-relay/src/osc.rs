//! UDP transport for the OSC endpoint.
//!
//! One socket, bound on all IPv4 interfaces, is shared by the receiving and
//! the sending half. The sender only ever talks to the configured Ardour
//! address.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use tally_core::{IoError, MessageSender};
use tokio::net::UdpSocket;

use crate::endpoint::MessageReceiver;
use crate::error::TallyError;

/// The bound listen socket, not yet split into its two halves.
pub struct OscSocket {
    socket: UdpSocket,
    send_socket: std::net::UdpSocket,
}

/// Bind the OSC listen socket on `0.0.0.0:port`.
///
/// Address reuse is left off so a second instance fails loudly instead of
/// silently sharing the port.
pub fn bind(port: u16) -> Result<OscSocket, TallyError> {
    let bind_error = |source: io::Error| TallyError::Bind { port, source };

    let socket =
        Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(bind_error)?;
    socket.set_nonblocking(true).map_err(bind_error)?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket.bind(&bind_addr.into()).map_err(bind_error)?;

    // Sends bypass tokio: a freshly registered socket is not known writable yet
    let send_socket: std::net::UdpSocket = socket.try_clone().map_err(bind_error)?.into();
    let std_socket: std::net::UdpSocket = socket.into();
    let socket = UdpSocket::from_std(std_socket).map_err(bind_error)?;
    log::debug!("Listening for OSC on {}", bind_addr);

    Ok(OscSocket {
        socket,
        send_socket,
    })
}

impl OscSocket {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receiving half, plus a sending half that only talks to `peer`.
    pub fn split(self, peer: SocketAddr) -> (OscReceiver, OscSender) {
        (
            OscReceiver {
                socket: self.socket,
            },
            OscSender {
                socket: self.send_socket,
                peer,
            },
        )
    }
}

/// Sending half: datagrams to Ardour.
pub struct OscSender {
    socket: std::net::UdpSocket,
    peer: SocketAddr,
}

impl OscSender {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl MessageSender for OscSender {
    fn send_packet(&mut self, packet: &[u8]) -> Result<usize, IoError> {
        log::trace!("OSC out {} bytes to {}", packet.len(), self.peer);
        Ok(self.socket.send_to(packet, self.peer)?)
    }
}

/// Receiving half: datagrams from anyone.
pub struct OscReceiver {
    socket: UdpSocket,
}

#[async_trait]
impl MessageReceiver for OscReceiver {
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_and_receive() {
        let a = bind(0).unwrap();
        let a_port = a.local_addr().unwrap().port();
        let b = bind(0).unwrap();
        let b_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, b.local_addr().unwrap().port()));

        // First send happens before anything has been awaited on the socket
        let (_, mut sender) = a.split(b_addr);
        assert_eq!(sender.peer(), b_addr);
        assert_eq!(sender.send_packet(b"/heartbeat\0\0,\0\0\0").unwrap(), 16);

        let (mut receiver, _) = b.split(SocketAddr::from((Ipv4Addr::LOCALHOST, a_port)));
        let mut buf = [0u8; 64];
        let (len, from) = receiver.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"/heartbeat\0\0,\0\0\0");
        assert_eq!(from.port(), a_port);
    }

    #[tokio::test]
    async fn test_port_in_use() {
        let a = bind(0).unwrap();
        let port = a.local_addr().unwrap().port();
        match bind(port) {
            Err(TallyError::Bind { port: p, .. }) => assert_eq!(p, port),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("second bind succeeded"),
        }
    }
}
