//! The event loop, grounded on the original `WebServer` (`Start`,
//! `InitSocket_`, `DealListen_`, `DealRead_`/`DealWrite_`,
//! `OnRead_`/`OnWrite_`/`OnProcess`, `ExtentTime_`, `AddClient_`,
//! `CloseConn_`). `epoll_wait` becomes `Poll::poll`; the thread pool
//! tasks that used to mutate a `HttpConn*` shared with the reactor now
//! take ownership of the `HttpConn` for the duration of the task and
//! hand it back over a channel, since mio's `Poll` requires the table
//! entry to be either registered or owned, never both at once.

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use socket2::{Domain, Protocol, Socket, Type};

use crate::config::AppConfig;
use crate::error::Result;
use crate::http::connection::{send_busy, USER_COUNT};
use crate::http::{HttpConn, ProcessOutcome, ReadStatus, SharedAuth};
use crate::thread_pool::ThreadPool;
use crate::timer::MinHeapTimer;
use crate::{info, warn};

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_CONN_TOKEN: usize = 2;

/// `listen(fd, 6)` in the original.
const LISTEN_BACKLOG: i32 = 6;

/// Ceiling on live connections, mirroring `MAX_FD`.
const MAX_CONN: usize = 65_536;

enum Completion {
    Done {
        token: Token,
        conn: HttpConn,
        want: Interest,
    },
    Closed {
        token: Token,
    },
}

pub struct Reactor {
    poll: Poll,
    waker: Arc<Waker>,
    listener: TcpListener,
    connections: HashMap<Token, Option<HttpConn>>,
    pending_close: HashSet<Token>,
    timer: MinHeapTimer,
    pool: ThreadPool,
    completion_tx: Sender<Completion>,
    completion_rx: Receiver<Completion>,
    timer_tx: Sender<Token>,
    timer_rx: Receiver<Token>,
    next_token: usize,
    src_dir: String,
    auth: SharedAuth,
    timeout: Option<Duration>,
    listener_et: bool,
}

impl Reactor {
    pub fn new(config: &AppConfig, auth: SharedAuth) -> Result<Self> {
        let listener = bind_listener(config.port, config.opt_linger)?;
        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);
        let pool = ThreadPool::new(config.thread_num);
        let (completion_tx, completion_rx) = mpsc::channel();
        let (timer_tx, timer_rx) = mpsc::channel();
        let timeout = if config.timeout_ms > 0 {
            Some(Duration::from_millis(config.timeout_ms))
        } else {
            None
        };

        Ok(Self {
            poll,
            waker,
            listener,
            connections: HashMap::new(),
            pending_close: HashSet::new(),
            timer: MinHeapTimer::new(),
            pool,
            completion_tx,
            completion_rx,
            timer_tx,
            timer_rx,
            next_token: FIRST_CONN_TOKEN,
            src_dir: config.src_dir.clone(),
            auth,
            timeout,
            listener_et: config.listener_edge_triggered(),
        })
    }

    pub fn run(mut self) -> Result<()> {
        self.poll
            .registry()
            .register(&mut self.listener, LISTENER, Interest::READABLE)?;
        info!("========== Server start ==========");

        let mut events = Events::with_capacity(1024);
        loop {
            let next_ms = self.timer.next_tick_ms();
            self.drain_timer_expirations();

            let timeout = next_ms.map(|ms| Duration::from_millis(ms.max(0) as u64));
            match self.poll.poll(&mut events, timeout) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            self.drain_completions();

            for event in events.iter() {
                let token = event.token();
                if token == WAKER {
                    continue;
                }
                if token == LISTENER {
                    self.accept_all();
                    continue;
                }
                if event.is_read_closed() || event.is_write_closed() || event.is_error() {
                    self.close_connection(token);
                } else if event.is_readable() {
                    self.extend_timeout(token);
                    self.dispatch_read(token);
                } else if event.is_writable() {
                    self.extend_timeout(token);
                    self.dispatch_write(token);
                } else {
                    warn!("unexpected event for {:?}", token);
                }
            }
        }
    }

    fn alloc_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    fn extend_timeout(&mut self, token: Token) {
        if let Some(timeout) = self.timeout {
            self.timer.adjust(token.0, timeout);
        }
    }

    fn accept_all(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => self.accept_one(stream, addr),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("accept error: {e}");
                    break;
                }
            }
            if !self.listener_et {
                break;
            }
        }
    }

    fn accept_one(&mut self, mut stream: mio::net::TcpStream, addr: SocketAddr) {
        if USER_COUNT.load(Ordering::SeqCst) >= MAX_CONN {
            warn!("Clients is full!");
            send_busy(&mut stream, "Server busy!\r\n");
            return;
        }

        let token = self.alloc_token();
        let mut conn = HttpConn::new(stream, addr);
        if let Err(e) = self
            .poll
            .registry()
            .register(&mut conn.stream, token, Interest::READABLE)
        {
            warn!("register error for {addr}: {e}");
            return;
        }

        if let Some(timeout) = self.timeout {
            let tx = self.timer_tx.clone();
            self.timer.add(token.0, timeout, move || {
                let _ = tx.send(token);
            });
        }

        info!("Client[{addr}] in!");
        self.connections.insert(token, Some(conn));
    }

    fn dispatch_read(&mut self, token: Token) {
        if let Some(conn) = self.connections.get_mut(&token).and_then(Option::take) {
            self.spawn_read(token, conn);
        }
    }

    fn dispatch_write(&mut self, token: Token) {
        if let Some(conn) = self.connections.get_mut(&token).and_then(Option::take) {
            self.spawn_write(token, conn);
        }
    }

    fn spawn_read(&self, token: Token, mut conn: HttpConn) {
        let tx = self.completion_tx.clone();
        let waker = Arc::clone(&self.waker);
        let src_dir = self.src_dir.clone();
        let auth = Arc::clone(&self.auth);
        self.pool.submit(move || {
            let msg = match conn.read() {
                Ok(ReadStatus::Hungup) => Completion::Closed { token },
                Ok(ReadStatus::Drained) => match conn.process(&src_dir, auth.as_ref()) {
                    ProcessOutcome::NeedMoreData => Completion::Done {
                        token,
                        conn,
                        want: Interest::READABLE,
                    },
                    ProcessOutcome::ReadyToWrite => Completion::Done {
                        token,
                        conn,
                        want: Interest::WRITABLE,
                    },
                },
                Err(_) => Completion::Closed { token },
            };
            let _ = tx.send(msg);
            let _ = waker.wake();
        });
    }

    fn spawn_write(&self, token: Token, mut conn: HttpConn) {
        let tx = self.completion_tx.clone();
        let waker = Arc::clone(&self.waker);
        let src_dir = self.src_dir.clone();
        let auth = Arc::clone(&self.auth);
        self.pool.submit(move || {
            let msg = match conn.write() {
                Err(_) => Completion::Closed { token },
                Ok(_) if !conn.fully_written() => Completion::Done {
                    token,
                    conn,
                    want: Interest::WRITABLE,
                },
                Ok(_) if conn.should_close() => Completion::Closed { token },
                Ok(_) => {
                    conn.reset_for_next_request();
                    match conn.process(&src_dir, auth.as_ref()) {
                        ProcessOutcome::NeedMoreData => Completion::Done {
                            token,
                            conn,
                            want: Interest::READABLE,
                        },
                        ProcessOutcome::ReadyToWrite => Completion::Done {
                            token,
                            conn,
                            want: Interest::WRITABLE,
                        },
                    }
                }
            };
            let _ = tx.send(msg);
            let _ = waker.wake();
        });
    }

    fn drain_completions(&mut self) {
        while let Ok(msg) = self.completion_rx.try_recv() {
            self.handle_completion(msg);
        }
    }

    fn handle_completion(&mut self, msg: Completion) {
        match msg {
            Completion::Closed { token } => {
                self.pending_close.remove(&token);
                self.connections.remove(&token);
                self.timer.remove(token.0);
            }
            Completion::Done {
                token,
                mut conn,
                want,
            } => {
                if self.pending_close.remove(&token) {
                    self.timer.remove(token.0);
                    self.connections.remove(&token);
                    return;
                }
                if let Err(e) = self.poll.registry().reregister(&mut conn.stream, token, want) {
                    warn!("reregister error for {}: {e}", conn.addr);
                    self.timer.remove(token.0);
                    self.connections.remove(&token);
                    return;
                }
                self.connections.insert(token, Some(conn));
            }
        }
    }

    /// A connection timed out, hung up, or errored while not checked out
    /// to a worker. If it's currently checked out, defer the close until
    /// the worker hands it back instead of tearing down state the worker
    /// still owns.
    fn close_connection(&mut self, token: Token) {
        match self.connections.get_mut(&token) {
            Some(slot @ Some(_)) => {
                if let Some(mut conn) = slot.take() {
                    let _ = self.poll.registry().deregister(&mut conn.stream);
                    self.timer.remove(token.0);
                    info!("Client[{}] quit!", conn.addr);
                }
                self.connections.remove(&token);
            }
            Some(None) => {
                self.pending_close.insert(token);
            }
            None => {}
        }
    }

    fn drain_timer_expirations(&mut self) {
        while let Ok(token) = self.timer_rx.try_recv() {
            self.close_connection(token);
        }
    }
}

/// Build the listening socket the way `InitSocket_` does: address reuse,
/// an optional `SO_LINGER`, a backlog of 6, non-blocking before the
/// first `accept`.
fn bind_listener(port: u16, opt_linger: bool) -> Result<TcpListener> {
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    if opt_linger {
        socket.set_linger(Some(Duration::from_secs(1)))?;
    }
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;
    let std_listener = std::net::TcpListener::from(socket);
    Ok(TcpListener::from_std(std_listener))
}
