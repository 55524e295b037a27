//! TCP group: one process per worker
//!
//! The coordinator process is rank 0 and acts as a hub: it listens, accepts one
//! connection per worker process, and assigns ranks `1..n` in arrival order.
//! Worker processes connect to the hub and never talk to each other.
//!
//! Collectives go through the hub:
//!
//! - **broadcast**: a hub root writes the directive to every worker. A worker
//!   root first sends it to the hub, which forwards it to the other workers.
//! - **reduce_product**: every worker sends its partial product to the hub, which
//!   combines its own value and the workers' in rank order. A worker root gets
//!   the combined product back from the hub.
//!
//! The communicator is blocking: it owns a single-threaded tokio runtime and
//! drives every socket operation to completion before returning.

use super::protocol::*;
use crate::error::{GeomeanError, GroupResult};
use crate::group::{check_root, root_directive, Communicator, Directive, Rank, COORDINATOR};
use crate::reduce::combine;
use anyhow::Context;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// Delay between connection attempts while the coordinator is not listening yet
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(200);

enum Link {
    /// Coordinator side: stream `i` is the worker with rank `i + 1`
    Hub { workers: Vec<TcpStream> },
    /// Worker side
    Spoke { hub: TcpStream },
}

/// One worker's endpoint in a TCP group
pub struct TcpComm {
    rank: Rank,
    size: usize,
    /// Declared before `runtime` so sockets are dropped while it is alive
    link: Link,
    runtime: Runtime,
    seq: u64,
}

impl TcpComm {
    /// Bind `listen` and wait until `size - 1` workers have joined
    pub fn coordinator(listen: &str, size: usize) -> anyhow::Result<Self> {
        let listener = std::net::TcpListener::bind(listen)
            .with_context(|| format!("Failed to bind coordinator on {}", listen))?;
        Self::coordinator_from_listener(listener, size)
    }

    /// Wait on an already bound listener until `size - 1` workers have joined
    pub fn coordinator_from_listener(listener: std::net::TcpListener, size: usize) -> anyhow::Result<Self> {
        anyhow::ensure!(size > 0, "group must have at least one worker");

        let runtime = new_runtime()?;
        listener
            .set_nonblocking(true)
            .context("Failed to make listener non-blocking")?;

        let workers = runtime.block_on(accept_from_std(listener, size))?;

        Ok(Self {
            rank: COORDINATOR,
            size,
            runtime,
            link: Link::Hub { workers },
            seq: 0,
        })
    }

    /// Connect to the coordinator at `addr` and receive a rank
    ///
    /// Retries up to `retries` times while the coordinator is not reachable.
    pub fn worker(addr: &str, retries: u32) -> anyhow::Result<Self> {
        let runtime = new_runtime()?;

        let (rank, size, hub) = runtime.block_on(join_group(addr, retries))?;

        Ok(Self {
            rank,
            size,
            runtime,
            link: Link::Spoke { hub },
            seq: 0,
        })
    }
}

impl Communicator for TcpComm {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast(&mut self, directive: Option<Directive>, root: Rank) -> GroupResult<Directive> {
        check_root(root, self.size)?;
        self.seq += 1;
        let seq = self.seq;
        match &mut self.link {
            Link::Hub { workers } => self.runtime.block_on(hub_broadcast(workers, directive, root, seq)),
            Link::Spoke { hub } => self
                .runtime
                .block_on(spoke_broadcast(hub, self.rank, directive, root, seq)),
        }
    }

    fn reduce_product(&mut self, local: f64, root: Rank) -> GroupResult<Option<f64>> {
        check_root(root, self.size)?;
        self.seq += 1;
        let seq = self.seq;
        match &mut self.link {
            Link::Hub { workers } => self.runtime.block_on(hub_reduce(workers, local, root, seq)),
            Link::Spoke { hub } => self.runtime.block_on(spoke_reduce(hub, self.rank, local, root, seq)),
        }
    }
}

fn new_runtime() -> anyhow::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")
}

/// Host name used to identify a worker process
fn node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn hub_broadcast(
    workers: &mut [TcpStream],
    directive: Option<Directive>,
    root: Rank,
    seq: u64,
) -> GroupResult<Directive> {
    let directive = if root == COORDINATOR {
        root_directive(directive)?
    } else {
        expect_directive(&mut workers[root - 1], root, seq).await?
    };

    let msg = Message::Directive(DirectiveMessage {
        seq,
        directive: directive.clone(),
    });
    for (i, stream) in workers.iter_mut().enumerate() {
        let rank = i + 1;
        if rank != root {
            send(stream, rank, &msg).await?;
        }
    }

    Ok(directive)
}

async fn spoke_broadcast(
    hub: &mut TcpStream,
    rank: Rank,
    directive: Option<Directive>,
    root: Rank,
    seq: u64,
) -> GroupResult<Directive> {
    if rank != root {
        return expect_directive(hub, COORDINATOR, seq).await;
    }

    let directive = root_directive(directive)?;
    let msg = Message::Directive(DirectiveMessage {
        seq,
        directive: directive.clone(),
    });
    send(hub, COORDINATOR, &msg).await?;

    Ok(directive)
}

/// Combine the hub's value with every worker's, in rank order
async fn hub_reduce(workers: &mut [TcpStream], local: f64, root: Rank, seq: u64) -> GroupResult<Option<f64>> {
    let mut acc = local;
    for (i, stream) in workers.iter_mut().enumerate() {
        let partial = expect_value(stream, i + 1, seq, "reduce").await?;
        acc = combine(acc, partial);
    }

    if root == COORDINATOR {
        return Ok(Some(acc));
    }

    let msg = Message::Reduced(ValueMessage { seq, value: acc });
    send(&mut workers[root - 1], root, &msg).await?;
    Ok(None)
}

async fn spoke_reduce(hub: &mut TcpStream, rank: Rank, local: f64, root: Rank, seq: u64) -> GroupResult<Option<f64>> {
    let msg = Message::Partial(ValueMessage { seq, value: local });
    send(hub, COORDINATOR, &msg).await?;

    if rank == root {
        expect_value(hub, COORDINATOR, seq, "reduce").await.map(Some)
    } else {
        Ok(None)
    }
}

async fn accept_from_std(listener: std::net::TcpListener, size: usize) -> anyhow::Result<Vec<TcpStream>> {
    let listener = TcpListener::from_std(listener).context("Failed to register listener")?;
    accept_workers(&listener, size).await
}

/// Accept workers until the group is complete
///
/// Connections speaking another protocol version are rejected and do not
/// count towards the group.
async fn accept_workers(listener: &TcpListener, size: usize) -> anyhow::Result<Vec<TcpStream>> {
    let mut workers = Vec::with_capacity(size - 1);

    if size > 1 {
        info!(expected = size - 1, "waiting for workers to join");
    }

    while workers.len() + 1 < size {
        let (mut stream, addr) = listener.accept().await.context("Failed to accept connection")?;
        stream.set_nodelay(true).context("Failed to set TCP_NODELAY")?;

        let hello = match read_message(&mut stream).await {
            Ok(Message::Hello(hello)) => hello,
            Ok(other) => {
                warn!(%addr, ?other, "expected HELLO, dropping connection");
                continue;
            }
            Err(e) => {
                warn!(%addr, error = %format!("{:#}", e), "failed to read HELLO, dropping connection");
                continue;
            }
        };

        if hello.protocol_version != PROTOCOL_VERSION {
            warn!(
                %addr,
                local = PROTOCOL_VERSION,
                remote = hello.protocol_version,
                "protocol version mismatch, rejecting worker"
            );
            let reject = Message::Error(ErrorMessage {
                error: GeomeanError::ProtocolMismatch {
                    local: PROTOCOL_VERSION,
                    remote: hello.protocol_version,
                }
                .to_string(),
            });
            if let Err(e) = write_message(&mut stream, &reject).await {
                debug!(%addr, error = %format!("{:#}", e), "failed to send rejection");
            }
            continue;
        }

        let rank = workers.len() + 1;
        let welcome = Message::Welcome(WelcomeMessage {
            protocol_version: PROTOCOL_VERSION,
            rank,
            size,
        });
        write_message(&mut stream, &welcome)
            .await
            .with_context(|| format!("Failed to send WELCOME to {}", addr))?;

        info!(rank, node = %hello.node_id, %addr, "worker joined");
        workers.push(stream);
    }

    Ok(workers)
}

/// Connect to the hub and perform the HELLO/WELCOME handshake
async fn join_group(addr: &str, retries: u32) -> anyhow::Result<(Rank, usize, TcpStream)> {
    let mut attempt = 0;
    let mut stream = loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => break stream,
            Err(e) if attempt < retries => {
                attempt += 1;
                debug!(%addr, attempt, error = %e, "coordinator not reachable yet, retrying");
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to connect to coordinator at {}", addr));
            }
        }
    };
    stream.set_nodelay(true).context("Failed to set TCP_NODELAY")?;

    let hello = Message::Hello(HelloMessage {
        protocol_version: PROTOCOL_VERSION,
        node_id: node_id(),
    });
    write_message(&mut stream, &hello).await.context("Failed to send HELLO")?;

    match read_message(&mut stream).await.context("Failed to read WELCOME")? {
        Message::Welcome(welcome) => {
            if welcome.protocol_version != PROTOCOL_VERSION {
                return Err(GeomeanError::ProtocolMismatch {
                    local: PROTOCOL_VERSION,
                    remote: welcome.protocol_version,
                }
                .into());
            }
            info!(rank = welcome.rank, size = welcome.size, "joined group");
            Ok((welcome.rank, welcome.size, stream))
        }
        Message::Error(err) => anyhow::bail!("Coordinator rejected worker: {}", err.error),
        other => anyhow::bail!("Expected WELCOME, got {:?}", other),
    }
}

/// Map a framing failure on the link to `peer` into a group error
fn link_error(peer: Rank, err: anyhow::Error) -> GeomeanError {
    match err.downcast_ref::<std::io::Error>() {
        Some(io) if is_disconnect(io) => GeomeanError::PeerDisconnected { rank: peer },
        _ => GeomeanError::Transport(format!("{:#}", err)),
    }
}

fn is_disconnect(err: &std::io::Error) -> bool {
    use std::io::ErrorKind::*;
    matches!(
        err.kind(),
        UnexpectedEof | ConnectionReset | ConnectionAborted | BrokenPipe
    )
}

async fn send(stream: &mut TcpStream, peer: Rank, msg: &Message) -> GroupResult<()> {
    write_message(stream, msg).await.map_err(|e| link_error(peer, e))
}

async fn recv(stream: &mut TcpStream, peer: Rank) -> GroupResult<Message> {
    read_message(stream).await.map_err(|e| link_error(peer, e))
}

async fn expect_directive(stream: &mut TcpStream, peer: Rank, seq: u64) -> GroupResult<Directive> {
    match recv(stream, peer).await? {
        Message::Directive(msg) if msg.seq == seq => Ok(msg.directive),
        Message::Error(err) => Err(GeomeanError::Transport(err.error)),
        other => Err(GeomeanError::UnexpectedMessage {
            operation: "broadcast",
            got: format!("{:?}", other),
        }),
    }
}

async fn expect_value(stream: &mut TcpStream, peer: Rank, seq: u64, operation: &'static str) -> GroupResult<f64> {
    match recv(stream, peer).await? {
        Message::Partial(msg) | Message::Reduced(msg) if msg.seq == seq => Ok(msg.value),
        Message::Error(err) => Err(GeomeanError::Transport(err.error)),
        other => Err(GeomeanError::UnexpectedMessage {
            operation,
            got: format!("{:?}", other),
        }),
    }
}
