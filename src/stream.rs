use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::events::ClientEvent;

pub(crate) type Slot = Mutex<Option<UnboundedReceiver<ClientEvent>>>;

/// Notifications of a [`FramelinkClient`], in the order they were emitted.
///
/// Only one stream can be alive per client. Dropping it puts the receiver back, so events
/// emitted meanwhile are delivered to the next stream.
///
/// [`FramelinkClient`]: crate::FramelinkClient
pub struct EventStream<'a> {
    slot: &'a Slot,
    receiver: Option<UnboundedReceiver<ClientEvent>>
}

impl<'a> EventStream<'a> {
    pub(crate) fn new(slot: &'a Slot) -> Option<Self> {
        let receiver = slot.lock().take()?;

        Some(Self {
            slot,
            receiver: Some(receiver)
        })
    }

    /// Waits for the next event, `None` once the client is gone.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.receiver.as_mut()?.recv().await
    }
}

impl Stream for EventStream<'_> {
    type Item = ClientEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut().receiver.as_mut() {
            Some(receiver) => receiver.poll_recv(cx),
            None => Poll::Ready(None)
        }
    }
}

impl Drop for EventStream<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = self.receiver.take();
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use tokio::sync::mpsc::unbounded_channel;

    use super::*;

    #[tokio::test]
    async fn receiver_is_handed_back_on_drop() {
        let (sender, receiver) = unbounded_channel();
        let slot: Slot = Mutex::new(Some(receiver));
        let guild_id = NonZeroU64::new(1).unwrap();

        let mut stream = EventStream::new(&slot).unwrap();
        assert!(EventStream::new(&slot).is_none());

        sender.send(ClientEvent::QueueEnd { guild_id }).unwrap();
        assert!(matches!(stream.recv().await, Some(ClientEvent::QueueEnd { .. })));
        drop(stream);

        assert!(slot.lock().is_some());
        drop(sender);
        assert!(EventStream::new(&slot).unwrap().recv().await.is_none());
    }
}
