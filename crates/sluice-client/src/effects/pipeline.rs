//! Pipeline orchestration: one run merges a cache branch and a live branch
//! into a single ordered, deduplicating sequence of payloads.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use sluice_store::CacheStore;

use crate::core::{self, ErrorMapper};
use crate::data::{Hooks, LogFlags, Outcome, Payload, Request, Shape};
use crate::effects::transport::Transport;
use crate::error::ClientError;

/// Composes a [`Transport`], a [`CacheStore`] and the response classifier
/// into a producer of payload sequences.
///
/// A run with caching enabled emits the stored payload first (if any), then
/// the live payload unless it equals what was already emitted. The live
/// branch is authoritative: its error terminates the run, while the cache
/// branch degrades silently on any failure.
pub struct Pipeline<T, S> {
    transport: Arc<T>,
    store: Arc<S>,
    hooks: Hooks,
    log: LogFlags,
    mapper: Option<Arc<ErrorMapper>>,
}

impl<T, S> Pipeline<T, S>
where
    T: Transport + 'static,
    S: CacheStore + 'static,
{
    pub fn new(transport: T, store: S) -> Self {
        Self {
            transport: Arc::new(transport),
            store: Arc::new(store),
            hooks: Hooks::default(),
            log: LogFlags::NONE,
            mapper: None,
        }
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_log_flags(mut self, log: LogFlags) -> Self {
        self.log = log;
        self
    }

    pub fn with_error_mapper(mut self, mapper: Arc<ErrorMapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    /// Start one run. The `fallback` payload doubles as the expected shape
    /// and as the result of an empty 2xx body.
    ///
    /// Dropping the returned [`Emissions`] cancels the in-flight transport
    /// call; a pending cache write is detached and may still complete.
    pub fn run<P>(&self, request: Request, fallback: Payload<P>) -> Emissions<P>
    where
        P: DeserializeOwned + Serialize + PartialEq + Clone + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::clone(&self.transport);
        let store = Arc::clone(&self.store);
        let hooks = self.hooks.clone();
        let log = self.log;
        let mapper = self.mapper.clone();

        let task = tokio::spawn(async move {
            orchestrate(transport, store, hooks, log, mapper, request, fallback, tx).await;
        });

        Emissions { rx, task }
    }
}

/// Ordered emissions of one pipeline run.
///
/// Each `Ok` item is a decoded payload (cache first, then live). An `Err`
/// item is the terminal signal; the channel closing without one means the
/// run completed successfully.
pub struct Emissions<P> {
    rx: mpsc::UnboundedReceiver<Result<Payload<P>, ClientError>>,
    task: JoinHandle<()>,
}

impl<P> Emissions<P> {
    /// Next emission, or `None` once the run has completed.
    pub async fn next(&mut self) -> Option<Result<Payload<P>, ClientError>> {
        self.rx.recv().await
    }

    /// Drain the run, separating payload emissions from the terminal
    /// outcome.
    pub async fn collect(mut self) -> (Vec<Payload<P>>, Result<(), ClientError>) {
        let mut emitted = Vec::new();
        while let Some(item) = self.rx.recv().await {
            match item {
                Ok(payload) => emitted.push(payload),
                Err(err) => return (emitted, Err(err)),
            }
        }
        (emitted, Ok(()))
    }
}

impl<P> Stream for Emissions<P> {
    type Item = Result<Payload<P>, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<P> Drop for Emissions<P> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[allow(clippy::too_many_arguments)]
async fn orchestrate<T, S, P>(
    transport: Arc<T>,
    store: Arc<S>,
    hooks: Hooks,
    log: LogFlags,
    mapper: Option<Arc<ErrorMapper>>,
    request: Request,
    fallback: Payload<P>,
    tx: mpsc::UnboundedSender<Result<Payload<P>, ClientError>>,
) where
    T: Transport + 'static,
    S: CacheStore + 'static,
    P: DeserializeOwned + Serialize + PartialEq + Clone + Send + 'static,
{
    let key = request.cache_key();
    let use_cache = request.use_cache();
    let shape = fallback.shape();

    if log.request {
        debug!(target: "sluice", "{}", request.log_line(!log.request_parameters));
    }
    if log.raw_request {
        debug!(target: "sluice", request = ?request, "raw request");
    }

    let read_store = Arc::clone(&store);
    let read_key = key.clone();
    let cache_fut = async move {
        if use_cache {
            read_cached::<S, P>(&read_store, &read_key, shape, log).await
        } else {
            None
        }
    };

    let live_fut = async {
        hooks.notify_before(&request);
        let result = live_call(&*transport, &request, fallback, mapper.as_deref(), log).await;
        hooks.notify_after(match result {
            Ok(_) => Outcome::Success,
            Err(_) => Outcome::Error,
        });
        result
    };

    tokio::pin!(cache_fut);
    tokio::pin!(live_fut);

    // Both branches are polled concurrently, but the cache emission always
    // goes out first: when the live branch wins the race its result is
    // buffered until the cache read resolves.
    let mut last: Option<Payload<P>> = None;
    let live_result = tokio::select! {
        cached = &mut cache_fut => {
            last = forward_cached(&tx, cached, &key, log);
            live_fut.await
        }
        live = &mut live_fut => {
            last = forward_cached(&tx, cache_fut.await, &key, log);
            live
        }
    };

    match live_result {
        Ok(payload) => {
            if use_cache {
                spawn_write(store, key, &payload, log);
            }
            if last.as_ref() != Some(&payload) {
                let _ = tx.send(Ok(payload));
            }
        }
        Err(err) => {
            if log.error {
                warn!(target: "sluice", error = %err, "pipeline run failed");
            }
            let _ = tx.send(Err(err));
        }
    }
}

async fn live_call<T, P>(
    transport: &T,
    request: &Request,
    fallback: Payload<P>,
    mapper: Option<&ErrorMapper>,
    log: LogFlags,
) -> Result<Payload<P>, ClientError>
where
    T: Transport,
    P: DeserializeOwned,
{
    let raw = transport
        .execute(request)
        .await
        .map_err(|e| ClientError::Transport(e.to_string()))?;
    if log.response_status {
        debug!(target: "sluice", status = raw.status, "live response status");
    }
    if log.url_response {
        debug!(target: "sluice", headers = ?raw.headers, "live response headers");
    }
    if log.response_data {
        debug!(target: "sluice", body = %String::from_utf8_lossy(&raw.body), "live response body");
    }
    core::classify(&raw, fallback, mapper)
}

fn forward_cached<P: Clone>(
    tx: &mpsc::UnboundedSender<Result<Payload<P>, ClientError>>,
    cached: Option<Payload<P>>,
    key: &str,
    log: LogFlags,
) -> Option<Payload<P>> {
    let cached = cached?;
    if log.cache {
        debug!(target: "sluice", key = %key, "cache hit");
    }
    tx.send(Ok(cached.clone())).ok()?;
    Some(cached)
}

/// Cache misses come in three kinds, all silent: no entry, unreadable
/// bytes, and an entry whose shape no longer matches the caller's.
async fn read_cached<S, P>(store: &S, key: &str, shape: Shape, log: LogFlags) -> Option<Payload<P>>
where
    S: CacheStore,
    P: DeserializeOwned,
{
    let bytes = match store.read(key).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return None,
        Err(err) => {
            if log.cache {
                debug!(target: "sluice", error = %err, "cache read failed");
            }
            return None;
        }
    };
    let payload: Payload<P> = serde_json::from_slice(&bytes).ok()?;
    (payload.shape() == shape).then_some(payload)
}

/// Write-through of a successful live payload, detached on purpose: the run
/// never waits on the write and cancelling the run never cancels it.
fn spawn_write<S, P>(store: Arc<S>, key: String, payload: &Payload<P>, log: LogFlags)
where
    S: CacheStore + 'static,
    P: Serialize,
{
    let bytes = match serde_json::to_vec(payload) {
        Ok(bytes) => Bytes::from(bytes),
        Err(err) => {
            if log.cache {
                warn!(target: "sluice", error = %err, "cache serialization failed");
            }
            return;
        }
    };
    tokio::spawn(async move {
        match store.write(&key, bytes).await {
            Ok(()) => {
                if log.cache {
                    debug!(target: "sluice", key = %key, "cache updated");
                }
            }
            Err(err) => {
                if log.cache {
                    warn!(target: "sluice", error = %err, "cache write failed");
                }
            }
        }
    });
}
