//! Consumer flow: one dequeue, one framed payload out, close.
//!
//! Once a payload is dequeued it belongs to this connection. If sending it
//! fails the payload is lost; it is not put back into the queue.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::error::{BufferdError, Result};
use crate::protocol::{FrameTag, FramedChannel};
use crate::queue::BoundedQueue;

/// Take the head payload from the queue and send it as `XML_DATA:<N>`.
///
/// Waits as long as the queue is empty. A consumer that disconnects while
/// waiting is noticed before anything is dequeued for it.
///
/// Returns the number of payload bytes sent.
///
/// # Errors
///
/// - `ConnectionClosed` if the peer left before an item was available
/// - I/O errors from the send (the dequeued payload is lost)
/// - `Cancelled` / `QueueClosed` on shutdown
pub async fn handle_consumer<S>(
    channel: &mut FramedChannel<S>,
    queue: &BoundedQueue,
    shutdown: &CancellationToken,
) -> Result<usize>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let payload = tokio::select! {
        biased;
        payload = queue.dequeue_cancellable(shutdown) => payload?,
        _ = channel.wait_for_close() => return Err(BufferdError::ConnectionClosed),
    };

    let bytes = payload.len();
    tracing::info!(bytes, depth = queue.len(), capacity = queue.capacity(), "payload dequeued");

    if let Err(e) = channel.send_framed(FrameTag::XmlData, &payload).await {
        tracing::warn!(bytes, error = %e, "send failed after dequeue, payload lost");
        return Err(e);
    }
    tracing::debug!(bytes, "payload sent");

    if let Err(e) = channel.shutdown().await {
        tracing::debug!(error = %e, "consumer already gone");
    }
    Ok(bytes)
}
