//! Serialized access to one peer.
//!
//! The driver owns the peer connection inside a dedicated worker task and
//! feeds it operations through an unbounded FIFO channel:
//!
//! ```text
//! Caller 1 ─┐
//! Caller 2 ─┼─► mpsc::UnboundedSender<Job> ─► Worker ─► &mut peer
//! Caller N ─┘
//! ```
//!
//! Submission never blocks. The worker parks on the channel while idle, runs
//! exactly one job to completion at a time, and keeps draining after a job
//! fails.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::command::{self, PeerCommand};
use super::spec::TestSpec;
use crate::codec::{CodecOptions, JsonCodec};
use crate::error::{ConformanceError, Result};
use crate::transport::{Exchange, PeerConnection};

/// Boxed future borrowing the peer for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type Job<C> = Box<dyn for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, ()> + Send>;

// Pins the closure to the higher-ranked signature a job needs.
fn job<C, F>(f: F) -> Job<C>
where
    F: for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, ()> + Send + 'static,
{
    Box::new(f)
}

/// FIFO operation queue in front of a single peer connection.
pub struct ConformanceDriver<C> {
    queue: mpsc::UnboundedSender<Job<C>>,
    worker: JoinHandle<C>,
    submitted: AtomicU64,
}

impl<C: Exchange> ConformanceDriver<C> {
    /// Move `peer` into a worker task and start accepting operations.
    pub fn spawn(peer: C) -> Self {
        let (queue, jobs) = mpsc::unbounded_channel();
        let worker = tokio::spawn(drain(jobs, peer));
        Self {
            queue,
            worker,
            submitted: AtomicU64::new(0),
        }
    }

    /// Number of operations submitted so far.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Queue `op` and route its result to `on_complete`.
    ///
    /// `on_complete` runs on the worker once `op` finishes, before the next
    /// operation starts. A panic inside `op` reaches `on_complete` as
    /// [`ConformanceError::Panicked`] and the queue moves on. If the worker is
    /// gone the operation is dropped and `on_complete` never runs.
    pub fn submit<T, F, S>(&self, op: F, on_complete: S)
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, Result<T>> + Send + 'static,
        S: FnOnce(Result<T>) + Send + 'static,
    {
        let seq = self.submitted.fetch_add(1, Ordering::Relaxed) + 1;
        let job = job(move |peer| {
            Box::pin(async move {
                let result = match AssertUnwindSafe(async move { op(peer).await })
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(payload) => {
                        Err(ConformanceError::Panicked(panic_message(payload.as_ref())))
                    }
                };
                if let Err(e) = &result {
                    tracing::warn!(seq, error = %e, "Queued peer operation failed");
                }
                on_complete(result);
            })
        });
        if self.queue.send(job).is_err() {
            tracing::warn!(seq, "Driver worker is gone; dropping operation");
        }
    }

    /// Queue `op` and return a future for its result.
    ///
    /// The operation is enqueued before this returns, so submission order is
    /// call order even if the futures are awaited out of order.
    pub fn with_peer<T, F>(&self, op: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(op, move |result| {
            let _ = tx.send(result);
        });
        async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(ConformanceError::ConnectionClosed),
            }
        }
    }

    /// `get_spec_keys`: test keys the peer knows for `codec_id`.
    pub fn get_spec_keys(&self, codec_id: &str) -> impl Future<Output = Result<Vec<String>>> + Send + 'static {
        let request = command::request(PeerCommand::GetSpecKeys, Some(codec_id), None, Bytes::new());
        let response = self.with_peer(move |peer| Box::pin(command::send(peer, request)));
        async move { command::parse_spec_keys(&response.await?.body) }
    }

    /// `get_spec`: fetch and decode one test spec.
    pub fn get_spec(
        &self,
        spec_key: &str,
        codec_id: &str,
    ) -> impl Future<Output = Result<TestSpec>> + Send + 'static {
        let request = command::request(
            PeerCommand::GetSpec,
            Some(codec_id),
            Some(spec_key),
            Bytes::new(),
        );
        let response = self.with_peer(move |peer| Box::pin(command::send(peer, request)));
        async move {
            let response = response.await?;
            let codec = JsonCodec::new(CodecOptions::default())?;
            TestSpec::from_value(&codec.from_buffer(&response.body)?)
        }
    }

    /// `check_encode`: have the peer verify our encoding of a spec's value.
    pub fn check_encode(
        &self,
        spec_key: &str,
        codec_id: &str,
        body: Bytes,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        let request = command::request(PeerCommand::CheckEncode, Some(codec_id), Some(spec_key), body);
        let response = self.with_peer(move |peer| Box::pin(command::send(peer, request)));
        async move { response.await.map(|_| ()) }
    }

    /// `close`: ask the peer to shut down gracefully.
    pub fn close(&self) -> impl Future<Output = Result<()>> + Send + 'static {
        let request = command::request(PeerCommand::Close, None, None, Bytes::new());
        let response = self.with_peer(move |peer| Box::pin(command::send(peer, request)));
        async move { response.await.map(|_| ()) }
    }

    /// Send `close` (best effort), drain the queue and hand the peer back.
    pub async fn finish(self) -> Result<C> {
        if let Err(e) = self.close().await {
            tracing::debug!(error = %e, "Close command failed");
        }
        let Self { queue, worker, .. } = self;
        drop(queue);
        Ok(worker.await?)
    }
}

impl ConformanceDriver<PeerConnection> {
    /// Close the peer and wait for its process to exit.
    pub async fn shutdown(self, expect_success: bool) -> Result<()> {
        let mut peer = self.finish().await?;
        peer.await_exit(expect_success).await
    }
}

async fn drain<C>(mut jobs: mpsc::UnboundedReceiver<Job<C>>, mut peer: C) -> C {
    while let Some(job) = jobs.recv().await {
        // Operation panics are already routed to their sinks; this catches a
        // panicking sink.
        if AssertUnwindSafe(job(&mut peer)).catch_unwind().await.is_err() {
            tracing::error!("Completion handler panicked");
        }
    }
    tracing::debug!("Driver queue closed");
    peer
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
