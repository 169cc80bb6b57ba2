use core::pin::Pin;
use core::task::{Context, Poll};
use futures::{Stream, StreamExt};
use pin_project_lite::pin_project;
use tokio_stream::wrappers::WatchStream;
use tracing::info;

use crate::concurrency::cancel::CancelRx;

pin_project! {
    /// A stream adapter that ends as soon as the cancellation signal fires.
    ///
    /// The signal is checked before every poll of the inner stream, so items that are already
    /// buffered in the inner stream are not yielded after cancellation.
    #[must_use = "streams do nothing unless polled"]
    #[derive(Debug)]
    pub struct CancellableStream<S> {
        #[pin]
        stream: S,
        cancel: Option<WatchStream<bool>>,
        stream_stopped: bool,
    }
}

impl<S: Stream> CancellableStream<S> {
    /// Creates a new [`CancellableStream`] wrapping `stream`.
    pub fn wrap(stream: S, cancel_rx: CancelRx) -> Self {
        Self {
            stream,
            cancel: Some(WatchStream::new(cancel_rx.watch())),
            stream_stopped: false,
        }
    }

    /// Returns `true` if the stream ended because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.stream_stopped
    }
}

impl<S: Stream> Stream for CancellableStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        if *this.stream_stopped {
            return Poll::Ready(None);
        }

        // Drain every pending signal update so the waker stays registered on the channel.
        while let Some(cancel) = this.cancel.as_mut() {
            match cancel.poll_next_unpin(cx) {
                Poll::Ready(Some(true)) => {
                    info!("stream stopped due to cancellation");
                    *this.stream_stopped = true;

                    return Poll::Ready(None);
                }
                Poll::Ready(Some(false)) => {}
                Poll::Ready(None) => {
                    // Every transmitter is gone, the signal can no longer fire.
                    *this.cancel = None;
                }
                Poll::Pending => break,
            }
        }

        this.stream.poll_next(cx)
    }
}
