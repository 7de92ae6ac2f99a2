//! UDP tunnel face.
//!
//! One connected socket per neighbour. Sends are non-blocking and never
//! wait; a spawned task feeds received datagrams to the registered
//! callback.

use super::{Face, ReceiveHandler};
use bytes::Bytes;
use log::{debug, info, warn};
use rust_ndnfw_common::{ndn::MAX_NDN_PACKET_SIZE, types::LowerLayerHandle, Error, Result};
use std::{
    io,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};
use tokio::{net::UdpSocket, task::JoinHandle};

type SharedHandler = Arc<Mutex<Option<ReceiveHandler>>>;

pub struct UdpFace {
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
    up: Arc<AtomicBool>,
    handler: SharedHandler,
    recv_task: JoinHandle<()>,
}

impl UdpFace {
    /// Binds `local`, connects to `remote` and starts receiving.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn bind(local: SocketAddr, remote: SocketAddr) -> Result<Arc<Self>> {
        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote).await?;
        info!("UDP face {} -> {} ready", socket.local_addr()?, remote);
        Ok(Self::from_connected(socket, remote))
    }

    /// Wraps an already connected socket.
    pub fn from_connected(socket: UdpSocket, remote: SocketAddr) -> Arc<Self> {
        let socket = Arc::new(socket);
        let up = Arc::new(AtomicBool::new(true));
        let handler: SharedHandler = Arc::new(Mutex::new(None));

        let recv_task = tokio::spawn(receive_loop(
            Arc::clone(&socket),
            remote,
            Arc::clone(&up),
            Arc::clone(&handler),
        ));

        Arc::new(Self {
            socket,
            remote,
            up,
            handler,
            recv_task,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Stops receiving and marks the face down.
    pub fn close(&self) {
        self.up.store(false, Ordering::SeqCst);
        self.recv_task.abort();
    }
}

impl Drop for UdpFace {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

impl Face for UdpFace {
    fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    fn send(&self, packet: Bytes) -> Result<()> {
        if !self.is_up() {
            return Err(Error::Face(format!("udp:{} is down", self.remote)));
        }
        match self.socket.try_send(&packet) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(Error::Face(format!(
                "udp:{} send buffer full",
                self.remote
            ))),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn register_receive_callback(&self, handler: Option<ReceiveHandler>) {
        *self.handler.lock().unwrap_or_else(|e| e.into_inner()) = handler;
    }

    fn lower_layer_handle(&self) -> Option<LowerLayerHandle> {
        Some(LowerLayerHandle::Socket(self.remote))
    }

    fn description(&self) -> String {
        format!("udp:{}", self.remote)
    }
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
    up: Arc<AtomicBool>,
    handler: SharedHandler,
) {
    let mut buf = vec![0u8; MAX_NDN_PACKET_SIZE];
    loop {
        match socket.recv(&mut buf).await {
            Ok(len) => {
                let packet = Bytes::copy_from_slice(&buf[..len]);
                let handler = handler.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(handler) = handler.as_ref() {
                    handler(packet);
                }
            }
            // The peer is not listening yet; keep the tunnel open
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                debug!("[Face udp:{}] Peer refused datagram", remote);
            }
            Err(e) => {
                warn!("[Face udp:{}] Receive failed, marking face down: {}", remote, e);
                up.store(false, Ordering::SeqCst);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_udp_faces_exchange_packets() {
        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let (addr_a, addr_b) = (a.local_addr().unwrap(), b.local_addr().unwrap());
        a.connect(addr_b).await.unwrap();
        b.connect(addr_a).await.unwrap();

        let face_a = UdpFace::from_connected(a, addr_b);
        let face_b = UdpFace::from_connected(b, addr_a);

        let (tx, mut rx) = mpsc::unbounded_channel();
        face_b.register_receive_callback(Some(Box::new(move |packet| {
            let _ = tx.send(packet);
        })));

        face_a.send(Bytes::from_static(b"hello")).unwrap();
        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, Bytes::from_static(b"hello"));
        assert_eq!(
            face_a.lower_layer_handle(),
            Some(LowerLayerHandle::Socket(addr_b))
        );
    }

    #[tokio::test]
    async fn test_closed_face_is_down() {
        let face = UdpFace::bind("127.0.0.1:0".parse().unwrap(), "127.0.0.1:9".parse().unwrap())
            .await
            .unwrap();
        assert!(face.is_up());
        face.close();
        assert!(!face.is_up());
        assert!(face.send(Bytes::from_static(b"x")).is_err());
    }
}
