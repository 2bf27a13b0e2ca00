use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt, TryStreamExt};
use shoal_db::ObjectRecord;
use shoal_server::FindEvent;
use tokio::sync::mpsc;

use crate::client::ClientError;

/// Records from one `find_objects` call, in the order the server produced
/// them. A stream that closes without its end marker yields
/// `ClientError::Truncated` once, then ends.
pub struct FindObjects {
    rx: mpsc::Receiver<FindEvent>,
    done: bool,
    received: usize,
}

impl FindObjects {
    pub(crate) fn new(rx: mpsc::Receiver<FindEvent>) -> Self {
        Self {
            rx,
            done: false,
            received: 0,
        }
    }

    /// Records received so far.
    pub fn received(&self) -> usize {
        self.received
    }

    pub async fn next_record(&mut self) -> Option<Result<ObjectRecord, ClientError>> {
        self.next().await
    }

    pub async fn collect_all(self) -> Result<Vec<ObjectRecord>, ClientError> {
        self.try_collect().await
    }
}

impl Stream for FindObjects {
    type Item = Result<ObjectRecord, ClientError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(FindEvent::Record(record))) => {
                self.received += 1;
                Poll::Ready(Some(Ok(record)))
            }
            Poll::Ready(Some(FindEvent::End)) => {
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(Some(Err(ClientError::Truncated)))
            }
        }
    }
}
