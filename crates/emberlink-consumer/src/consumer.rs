use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use emberlink_s101::{Message, S101Codec};
use emberlink_schema::Schema;
use emberlink_tree::{
    Change, ElementId, InvocationResult, Progress, SyncError, Synchronizer, Tree, TreeError,
    Value,
};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, trace, warn};

use crate::config::ConsumerConfig;
use crate::error::{ConsumerError, Result};

/// Callback receiving the changes of one unit of work, together with the tree they apply to.
pub type Subscriber = Box<dyn FnMut(&Tree, &[Change]) + Send>;

type Inspector = Box<dyn FnOnce(&Tree) + Send>;

#[derive(Debug, Clone, PartialEq)]
enum Readiness {
    Pending,
    Ready,
    Failed(SyncError),
    Lost(String),
}

impl Readiness {
    fn outcome(&self) -> Option<Result<()>> {
        match self {
            Readiness::Pending => None,
            Readiness::Ready => Some(Ok(())),
            Readiness::Failed(err) => Some(Err(err.clone().into())),
            Readiness::Lost(reason) => Some(Err(ConsumerError::ConnectionLost(reason.clone()))),
        }
    }
}

/// Work queued for the connection task.
enum Request {
    Invoke {
        path: String,
        arguments: Vec<Value>,
        reply: oneshot::Sender<Result<InvocationResult>>,
    },
    SetValue {
        path: String,
        value: Value,
        reply: oneshot::Sender<Result<()>>,
    },
    Subscribe {
        subscriber: Subscriber,
        reply: oneshot::Sender<()>,
    },
    Inspect(Inspector),
}

/// Handle to one provider connection.
///
/// All tree state lives on a single connection task. Incoming messages and
/// the requests made through this handle are processed there one at a time,
/// each to completion (including the writes it triggers) before the next.
///
/// Dropping the handle closes the connection.
pub struct Consumer {
    commands: mpsc::Sender<Request>,
    readiness: watch::Receiver<Readiness>,
    task: JoinHandle<()>,
}

impl Consumer {
    /// Start mirroring the provider on the other end of `transport`.
    ///
    /// Must be called from within a tokio runtime. The root getDirectory
    /// request is sent right away.
    pub fn open<T>(transport: T, schema: Arc<dyn Schema>, config: ConsumerConfig) -> Self
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(transport);
        let stream = FramedRead::new(reader, S101Codec::with_config(config.s101.clone()));
        let sink = FramedWrite::new(writer, S101Codec::with_config(config.s101.clone()));

        let (commands, queue) = mpsc::channel(config.command_capacity.max(1));
        let (readiness_tx, readiness) = watch::channel(Readiness::Pending);

        let connection = Connection {
            sync: Synchronizer::new(schema, config.length_form),
            sink,
            config,
            pending: HashMap::new(),
            next_invocation_id: 1,
            subscribers: Vec::new(),
            readiness: readiness_tx,
        };
        let task = tokio::spawn(connection.run(stream, queue));

        Self {
            commands,
            readiness,
            task,
        }
    }

    /// Wait until every element the schema cares about is verified.
    ///
    /// Fails with [`ConsumerError::Sync`] if the provider's tree is complete
    /// but lacks a required element, and with [`ConsumerError::ConnectionLost`]
    /// if the transport goes away first. There is no built-in timeout.
    pub async fn await_ready(&self) -> Result<()> {
        let mut readiness = self.readiness.clone();
        loop {
            if let Some(outcome) = readiness.borrow_and_update().outcome() {
                return outcome;
            }
            if readiness.changed().await.is_err() {
                return readiness
                    .borrow()
                    .outcome()
                    .unwrap_or(Err(ConsumerError::Closed));
            }
        }
    }

    /// Whether the tree is currently verified.
    pub fn is_ready(&self) -> bool {
        *self.readiness.borrow() == Readiness::Ready
    }

    /// Invoke the function at the `/`-separated identifier `path`.
    ///
    /// Resolves when the provider reports the matching result.
    pub async fn invoke(&self, path: &str, arguments: Vec<Value>) -> Result<InvocationResult> {
        let (reply, response) = oneshot::channel();
        self.submit(Request::Invoke {
            path: path.to_string(),
            arguments,
            reply,
        })
        .await?;
        self.response(response).await?
    }

    /// Ask the provider to change the value of the parameter at `path`.
    ///
    /// Resolves once the request is written. The mirrored value changes when
    /// the provider reports it back.
    pub async fn set_value(&self, path: &str, value: Value) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.submit(Request::SetValue {
            path: path.to_string(),
            value,
            reply,
        })
        .await?;
        self.response(response).await?
    }

    /// Register a callback for tree changes.
    ///
    /// The callback runs on the connection task after every unit of work that
    /// changed something; it must not block.
    pub async fn subscribe<F>(&self, subscriber: F) -> Result<()>
    where
        F: FnMut(&Tree, &[Change]) + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        self.submit(Request::Subscribe {
            subscriber: Box::new(subscriber),
            reply,
        })
        .await?;
        self.response(response).await
    }

    /// Run `inspect` against the mirrored tree on the connection task.
    pub async fn with_tree<F, R>(&self, inspect: F) -> Result<R>
    where
        F: FnOnce(&Tree) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        self.submit(Request::Inspect(Box::new(move |tree| {
            let _ = reply.send(inspect(tree));
        })))
        .await?;
        self.response(response).await
    }

    /// Stop the connection task and shut down the transport.
    ///
    /// Pending invocations fail with [`ConsumerError::Closed`].
    pub async fn close(self) {
        let Consumer { commands, task, .. } = self;
        drop(commands);
        if let Err(err) = task.await {
            warn!(%err, "connection task ended abnormally");
        }
    }

    async fn submit(&self, request: Request) -> Result<()> {
        self.commands
            .send(request)
            .await
            .map_err(|_| self.closed())
    }

    async fn response<R>(&self, response: oneshot::Receiver<R>) -> Result<R> {
        response.await.map_err(|_| self.closed())
    }

    fn closed(&self) -> ConsumerError {
        match &*self.readiness.borrow() {
            Readiness::Lost(reason) => ConsumerError::ConnectionLost(reason.clone()),
            _ => ConsumerError::Closed,
        }
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("readiness", &*self.readiness.borrow())
            .finish_non_exhaustive()
    }
}

/// State owned by the connection task.
struct Connection<W> {
    sync: Synchronizer,
    sink: FramedWrite<W, S101Codec>,
    config: ConsumerConfig,
    pending: HashMap<i32, oneshot::Sender<Result<InvocationResult>>>,
    next_invocation_id: i32,
    subscribers: Vec<Subscriber>,
    readiness: watch::Sender<Readiness>,
}

impl<W> Connection<W>
where
    W: AsyncWrite + Unpin,
{
    async fn run<R>(mut self, mut stream: FramedRead<R, S101Codec>, mut queue: mpsc::Receiver<Request>)
    where
        R: AsyncRead + Unpin,
    {
        match self.serve(&mut stream, &mut queue).await {
            Ok(()) => {
                debug!(pending = self.pending.len(), "consumer closed");
                for (_, reply) in self.pending.drain() {
                    let _ = reply.send(Err(ConsumerError::Closed));
                }
                if let Err(err) = self.sink.close().await {
                    debug!(%err, "transport shutdown failed");
                }
            }
            Err(ConsumerError::ConnectionLost(reason)) => self.lose(reason),
            Err(err) => self.lose(err.to_string()),
        }
    }

    /// Process queued work until the handle goes away or the transport fails.
    async fn serve<R>(
        &mut self,
        stream: &mut FramedRead<R, S101Codec>,
        queue: &mut mpsc::Receiver<Request>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        self.synchronize().await?;
        loop {
            tokio::select! {
                message = stream.next() => match message {
                    Some(Ok(message)) => self.on_message(message).await?,
                    Some(Err(err)) => return Err(err.into()),
                    None => return Err(ConsumerError::ConnectionLost("end of stream".to_string())),
                },
                request = queue.recv() => match request {
                    Some(request) => self.on_request(request).await?,
                    None => return Ok(()),
                },
            }
        }
    }

    async fn on_message(&mut self, message: Message) -> Result<()> {
        match message {
            Message::Ember { slot, payload } => {
                trace!(slot, len = payload.len(), "EmBER message");
                match self.sync.apply(&payload) {
                    Ok(applied) => {
                        for result in applied.invocation_results {
                            self.resolve(result);
                        }
                    }
                    Err(err) => warn!(%err, "discarding rest of undecodable message"),
                }
                self.synchronize().await
            }
            Message::KeepAliveRequest { slot } => {
                if self.config.answer_keep_alive {
                    trace!(slot, "answering keep-alive");
                    self.sink.send(Message::KeepAliveResponse { slot }).await?;
                }
                Ok(())
            }
            Message::KeepAliveResponse { slot } => {
                trace!(slot, "keep-alive response");
                Ok(())
            }
        }
    }

    async fn on_request(&mut self, request: Request) -> Result<()> {
        match request {
            Request::Invoke {
                path,
                arguments,
                reply,
            } => {
                let invocation_id = self.next_invocation_id;
                let payload = self.lookup(&path).and_then(|id| {
                    Ok(self.sync.invocation_request(id, invocation_id, &arguments)?)
                });
                match payload {
                    Ok(payload) => {
                        self.next_invocation_id = invocation_id.wrapping_add(1).max(1);
                        self.pending.insert(invocation_id, reply);
                        debug!(invocation_id, %path, "invoking");
                        self.send(payload).await?;
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                }
            }
            Request::SetValue { path, value, reply } => {
                let payload = self
                    .lookup(&path)
                    .and_then(|id| Ok(self.sync.set_value_request(id, &value)?));
                match payload {
                    Ok(payload) => {
                        debug!(%path, %value, "setting value");
                        if let Err(err) = self.send(payload).await {
                            let _ = reply.send(Err(ConsumerError::ConnectionLost(err.to_string())));
                            return Err(err);
                        }
                        let _ = reply.send(Ok(()));
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                }
            }
            Request::Subscribe { subscriber, reply } => {
                self.subscribers.push(subscriber);
                let _ = reply.send(());
            }
            Request::Inspect(inspect) => inspect(self.sync.tree()),
        }
        Ok(())
    }

    /// Recompute states, publish changes and readiness, then send any requests.
    async fn synchronize(&mut self) -> Result<()> {
        let progress = match self.sync.poll() {
            Ok(progress) => progress,
            Err(err) => {
                warn!(%err, "synchronization pass failed");
                return Ok(());
            }
        };
        self.notify();

        match progress {
            Progress::Ready => self.set_readiness(Readiness::Ready),
            Progress::Failed(err) => {
                warn!(%err, "provider tree does not satisfy the schema");
                self.set_readiness(Readiness::Failed(err));
            }
            Progress::Pending(requests) => {
                self.set_readiness(Readiness::Pending);
                if let Some(payload) = requests {
                    debug!(len = payload.len(), "requesting directories");
                    self.send(payload).await?;
                }
            }
        }
        Ok(())
    }

    fn notify(&mut self) {
        let changes = self.sync.tree_mut().drain_changes();
        if changes.is_empty() || self.subscribers.is_empty() {
            return;
        }
        trace!(count = changes.len(), "delivering changes");
        let tree = self.sync.tree();
        for subscriber in &mut self.subscribers {
            subscriber(tree, &changes);
        }
    }

    fn resolve(&mut self, result: InvocationResult) {
        let Some(reply) = self.pending.remove(&result.invocation_id) else {
            warn!(
                invocation_id = result.invocation_id,
                "result for unknown invocation"
            );
            return;
        };
        debug!(
            invocation_id = result.invocation_id,
            success = result.success,
            "invocation completed"
        );
        let outcome = if result.success {
            Ok(result)
        } else {
            Err(ConsumerError::InvocationFailed {
                invocation_id: result.invocation_id,
                result: result.result,
            })
        };
        let _ = reply.send(outcome);
    }

    fn set_readiness(&self, next: Readiness) {
        self.readiness.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if next == Readiness::Ready {
                info!(elements = self.sync.tree().len(), "tree ready");
            }
            *current = next;
            true
        });
    }

    fn lose(&mut self, reason: String) {
        info!(%reason, pending = self.pending.len(), "connection lost");
        self.readiness.send_replace(Readiness::Lost(reason.clone()));
        for (_, reply) in self.pending.drain() {
            let _ = reply.send(Err(ConsumerError::ConnectionLost(reason.clone())));
        }
    }

    fn lookup(&self, path: &str) -> Result<ElementId> {
        self.sync
            .tree()
            .find(path)
            .ok_or_else(|| TreeError::UnknownElement(path.to_string()).into())
    }

    async fn send(&mut self, payload: Bytes) -> Result<()> {
        let slot = self.config.slot;
        self.sink.send(Message::Ember { slot, payload }).await?;
        Ok(())
    }
}
