//! In-process face backed by a tokio channel.
//!
//! Outbound packets land on an unbounded channel the owner drains; inbound
//! packets are pushed with [`ChannelFace::inject`], which plays the role of
//! the lower layer delivering bytes.

use super::{Face, ReceiveHandler};
use bytes::Bytes;
use log::trace;
use rust_ndnfw_common::{types::LowerLayerHandle, Error, Result};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use tokio::sync::mpsc;

pub struct ChannelFace {
    name: String,
    up: AtomicBool,
    outbound: mpsc::UnboundedSender<Bytes>,
    handler: Mutex<Option<ReceiveHandler>>,
    handle: Mutex<Option<LowerLayerHandle>>,
}

impl ChannelFace {
    /// Creates an up face and the receiver for everything it sends.
    pub fn new(name: impl Into<String>) -> (Arc<Self>, mpsc::UnboundedReceiver<Bytes>) {
        let (outbound, receiver) = mpsc::unbounded_channel();
        let face = Arc::new(Self {
            name: name.into(),
            up: AtomicBool::new(true),
            outbound,
            handler: Mutex::new(None),
            handle: Mutex::new(None),
        });
        (face, receiver)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    pub fn set_lower_layer_handle(&self, handle: LowerLayerHandle) {
        *self.handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Delivers `packet` as if it had arrived from the lower layer.
    ///
    /// Returns false when no receive callback is registered.
    pub fn inject(&self, packet: Bytes) -> bool {
        let handler = self.handler.lock().unwrap_or_else(|e| e.into_inner());
        match handler.as_ref() {
            Some(handler) => {
                handler(packet);
                true
            }
            None => {
                trace!("[Face {}] No receive callback, dropping injected packet", self.name);
                false
            }
        }
    }

    pub fn has_receive_callback(&self) -> bool {
        self.handler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl Face for ChannelFace {
    fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    fn send(&self, packet: Bytes) -> Result<()> {
        if !self.is_up() {
            return Err(Error::Face(format!("{} is down", self.name)));
        }
        self.outbound
            .send(packet)
            .map_err(|_| Error::Face(format!("{} has no receiver", self.name)))
    }

    fn register_receive_callback(&self, handler: Option<ReceiveHandler>) {
        *self.handler.lock().unwrap_or_else(|e| e.into_inner()) = handler;
    }

    fn lower_layer_handle(&self) -> Option<LowerLayerHandle> {
        self.handle.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn description(&self) -> String {
        format!("chan:{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_and_inject() {
        let (face, mut outbound) = ChannelFace::new("app");
        face.send(Bytes::from_static(b"out")).unwrap();
        assert_eq!(outbound.try_recv().unwrap(), Bytes::from_static(b"out"));

        assert!(!face.inject(Bytes::from_static(b"in")));

        let (tx, mut rx) = mpsc::unbounded_channel();
        face.register_receive_callback(Some(Box::new(move |packet: Bytes| {
            let _ = tx.send(packet);
        })));
        assert!(face.inject(Bytes::from_static(b"in")));
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"in"));
    }

    #[test]
    fn test_down_face_refuses_to_send() {
        let (face, mut outbound) = ChannelFace::new("app");
        face.set_up(false);
        assert!(matches!(face.send(Bytes::new()), Err(Error::Face(_))));
        assert!(outbound.try_recv().is_err());
    }
}
