use oscq_core::ProtocolRouter;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::watch;

/// Largest UDP payload. Reads are never sized from the socket option, so a
/// datagram always arrives whole.
pub const MAX_DATAGRAM: usize = 65_536;

/// Opens the OSC socket: broadcast enabled, receive buffer sized, non-blocking.
pub fn bind_udp(addr: SocketAddr, recv_buffer_size: usize) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_broadcast(true)?;
    if recv_buffer_size > 0 {
        socket.set_recv_buffer_size(recv_buffer_size)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(std::net::UdpSocket::from(socket))
}

/// The UDP receive loop. Every datagram is handed to the router; nothing a
/// peer sends can end the loop, only the shutdown signal can.
pub struct OscDispatcher {
    socket: UdpSocket,
    router: Arc<ProtocolRouter>,
    shutdown: watch::Receiver<bool>,
}

impl OscDispatcher {
    pub fn new(socket: UdpSocket, router: Arc<ProtocolRouter>, shutdown: watch::Receiver<bool>) -> Self {
        Self { socket, router, shutdown }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Runs until shutdown. The socket is closed when this returns.
    pub async fn run_loop(mut self) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        if *self.shutdown.borrow() {
            return;
        }

        loop {
            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, src)) => self.on_packet(&buf[..len], src),
                    Err(e) => tracing::error!("OscDispatcher: receive failed: {}", e),
                }
            }
        }
        tracing::info!("OscDispatcher: receive loop stopped");
    }

    fn on_packet(&self, data: &[u8], src: SocketAddr) {
        match self.router.handle_packet(data) {
            Ok(applied) => tracing::debug!("OscDispatcher: {} bytes from {}, {} applied", data.len(), src, applied),
            Err(e) => tracing::warn!("OscDispatcher: dropped packet from {}: {}", src, e),
        }
    }
}
