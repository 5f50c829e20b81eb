//! Producer flow: one framed payload in, one enqueue, close.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::error::{BufferdError, Result};
use crate::protocol::{FrameTag, FramedChannel};
use crate::queue::BoundedQueue;

/// Receive one `PRODUCER:<N>` frame and append its payload to the queue.
///
/// Waits as long as the queue is full. Nothing is enqueued unless the full
/// declared payload arrived under the right tag.
///
/// Returns the queue depth right after the enqueue.
///
/// # Errors
///
/// - any `recv_framed` error (malformed header, truncation, disconnect)
/// - `UnexpectedTag` if the header is not `PRODUCER`
/// - `Cancelled` / `QueueClosed` on shutdown
pub async fn handle_producer<S>(
    channel: &mut FramedChannel<S>,
    queue: &BoundedQueue,
    shutdown: &CancellationToken,
) -> Result<usize>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = tokio::select! {
        biased;
        _ = shutdown.cancelled() => return Err(BufferdError::Cancelled),
        frame = channel.recv_framed() => frame?,
    };

    if frame.tag() != FrameTag::Producer {
        return Err(BufferdError::UnexpectedTag {
            expected: FrameTag::Producer.as_str(),
            actual: frame.tag().as_str(),
        });
    }

    let bytes = frame.payload().len();
    tracing::debug!(bytes, "payload received");

    let depth = queue
        .enqueue_cancellable(frame.into_payload(), shutdown)
        .await?;
    tracing::info!(bytes, depth, capacity = queue.capacity(), "payload enqueued");

    if let Err(e) = channel.shutdown().await {
        tracing::debug!(error = %e, "producer already gone");
    }
    Ok(depth)
}
