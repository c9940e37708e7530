//! One-shot UI events.
//!
//! Events are queued until an observer attaches, delivered in production
//! order, and each one is handed out at most once. Only one observer can be
//! attached at a time; events it did not take stay queued for the next one.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};

/// Producer side, owned by a controller.
#[derive(Debug)]
pub struct EventChannel<E> {
    tx: mpsc::UnboundedSender<E>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<E>>>,
}

impl<E> EventChannel<E> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    pub fn send(&self, event: E) {
        // The receiver lives as long as `self`, so this cannot fail.
        let _ = self.tx.send(event);
    }

    pub fn events(&self) -> Events<E> {
        Events {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<E> Default for EventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer handle; clone freely, attach to read.
#[derive(Debug)]
pub struct Events<E> {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<E>>>,
}

impl<E> Clone for Events<E> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<E> Events<E> {
    /// Waits until no other observer is attached, then attaches.
    pub async fn attach(&self) -> EventObserver<E> {
        EventObserver {
            rx: Arc::clone(&self.rx).lock_owned().await,
        }
    }

    /// Attaches unless another observer already holds the stream.
    pub fn try_attach(&self) -> Option<EventObserver<E>> {
        Arc::clone(&self.rx)
            .try_lock_owned()
            .ok()
            .map(|rx| EventObserver { rx })
    }
}

/// Exclusive reader of an event stream; detaches on drop.
#[derive(Debug)]
pub struct EventObserver<E> {
    rx: OwnedMutexGuard<mpsc::UnboundedReceiver<E>>,
}

impl<E> EventObserver<E> {
    /// Next event, or `None` once the owning controller is gone and the
    /// queue is drained. Cancel-safe.
    pub async fn next(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<E> {
        self.rx.try_recv().ok()
    }
}
