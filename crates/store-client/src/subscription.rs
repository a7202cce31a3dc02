use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Receiving end of an observe or notify subscription.
///
/// A background task feeds this handle. The channel closes when the store
/// ends the subscription or when the subscription is cancelled. Dropping
/// the handle cancels it, which also releases the upstream subscription.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
    cancel: CancellationToken,
}

impl<T> Subscription<T> {
    pub(crate) fn new(rx: mpsc::Receiver<T>, cancel: CancellationToken) -> Self {
        Self { rx, cancel }
    }

    /// Next record, or `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Stop the subscription. Records already buffered can still be received.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A clone of the token, for tying the subscription to a wider shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
