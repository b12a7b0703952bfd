#![allow(dead_code)]
//! Scripted loopback name servers.
//!
//! Each mock runs on its own threads and records what it receives. A
//! handler closure decides the reply for every query.

use socket2::SockRef;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One datagram sent back, after an optional pause.
pub struct Datagram {
    pub delay: Duration,
    pub bytes: Vec<u8>,
}

impl Datagram {
    pub fn now(bytes: Vec<u8>) -> Self {
        Self {
            delay: Duration::ZERO,
            bytes,
        }
    }

    pub fn after(delay: Duration, bytes: Vec<u8>) -> Self {
        Self { delay, bytes }
    }
}

pub struct MockUdpServer {
    addr: SocketAddr,
    queries: Arc<Mutex<Vec<(SocketAddr, Vec<u8>)>>>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MockUdpServer {
    pub fn start<H>(handler: H) -> Self
    where
        H: FnMut(&[u8]) -> Vec<Datagram> + Send + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("bind mock UDP server");
        Self::start_on(socket, handler)
    }

    /// Never answers.
    pub fn silent() -> Self {
        Self::start(|_| Vec::new())
    }

    pub fn start_on<H>(socket: UdpSocket, mut handler: H) -> Self
    where
        H: FnMut(&[u8]) -> Vec<Datagram> + Send + 'static,
    {
        socket
            .set_read_timeout(Some(POLL_INTERVAL))
            .expect("set read timeout");
        let addr = socket.local_addr().expect("local addr");
        let queries = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = {
            let queries = Arc::clone(&queries);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                let mut buf = vec![0u8; 65535];
                while !shutdown.load(Ordering::SeqCst) {
                    let (len, peer) = match socket.recv_from(&mut buf) {
                        Ok(received) => received,
                        Err(_) => continue,
                    };
                    let query = buf[..len].to_vec();
                    queries.lock().unwrap().push((peer, query.clone()));

                    for datagram in handler(&query) {
                        thread::sleep(datagram.delay);
                        let _ = socket.send_to(&datagram.bytes, peer);
                    }
                }
            })
        };

        Self {
            addr,
            queries,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    /// Source addresses of the received queries, in order.
    pub fn peers(&self) -> Vec<SocketAddr> {
        self.queries.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    pub fn queries(&self) -> Vec<Vec<u8>> {
        self.queries.lock().unwrap().iter().map(|(_, q)| q.clone()).collect()
    }
}

impl Drop for MockUdpServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// What the TCP mock does with one framed query.
pub enum StreamReply {
    /// Send the message with a correct length prefix.
    Frame(Vec<u8>),
    /// Abort the connection with an RST.
    Reset,
    /// Close the connection normally.
    Close,
}

#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    pub connection: usize,
    pub declared: usize,
    pub message: Vec<u8>,
}

type SharedStreamHandler = Arc<Mutex<dyn FnMut(usize, &[u8]) -> StreamReply + Send>>;

pub struct MockTcpServer {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    frames: Arc<Mutex<Vec<ReceivedFrame>>>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MockTcpServer {
    pub fn start<H>(handler: H) -> Self
    where
        H: FnMut(usize, &[u8]) -> StreamReply + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock TCP server");
        Self::start_on(listener, handler)
    }

    /// Answers every query with a reply of `len` bytes.
    pub fn answering(len: usize) -> Self {
        Self::start(move |_, query| StreamReply::Frame(super::ReplyBuilder::for_query(query, len)))
    }

    pub fn start_on<H>(listener: TcpListener, handler: H) -> Self
    where
        H: FnMut(usize, &[u8]) -> StreamReply + Send + 'static,
    {
        listener.set_nonblocking(true).expect("nonblocking listener");
        let addr = listener.local_addr().expect("local addr");
        let connections = Arc::new(AtomicUsize::new(0));
        let frames = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let handler: SharedStreamHandler = Arc::new(Mutex::new(handler));

        let handle = {
            let connections = Arc::clone(&connections);
            let frames = Arc::clone(&frames);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                while !shutdown.load(Ordering::SeqCst) {
                    match listener.accept() {
                        Ok((stream, _)) => {
                            let connection = connections.fetch_add(1, Ordering::SeqCst);
                            let frames = Arc::clone(&frames);
                            let shutdown = Arc::clone(&shutdown);
                            let handler = Arc::clone(&handler);
                            thread::spawn(move || {
                                serve_connection(stream, connection, frames, shutdown, handler)
                            });
                        }
                        Err(_) => thread::sleep(POLL_INTERVAL),
                    }
                }
            })
        };

        Self {
            addr,
            connections,
            frames,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> Vec<ReceivedFrame> {
        self.frames.lock().unwrap().clone()
    }
}

impl Drop for MockTcpServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve_connection(
    mut stream: TcpStream,
    connection: usize,
    frames: Arc<Mutex<Vec<ReceivedFrame>>>,
    shutdown: Arc<AtomicBool>,
    handler: SharedStreamHandler,
) {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(POLL_INTERVAL));

    loop {
        let mut prefix = [0u8; 2];
        if !read_exact_polling(&mut stream, &mut prefix, &shutdown) {
            return;
        }
        let declared = u16::from_be_bytes(prefix) as usize;
        let mut message = vec![0u8; declared];
        if !read_exact_polling(&mut stream, &mut message, &shutdown) {
            return;
        }

        frames.lock().unwrap().push(ReceivedFrame {
            connection,
            declared,
            message: message.clone(),
        });

        let reply = {
            let mut handler = handler.lock().unwrap();
            (*handler)(connection, &message)
        };
        match reply {
            StreamReply::Frame(bytes) => {
                let mut out = (bytes.len() as u16).to_be_bytes().to_vec();
                out.extend_from_slice(&bytes);
                if stream.write_all(&out).is_err() {
                    return;
                }
            }
            StreamReply::Reset => {
                let _ = SockRef::from(&stream).set_linger(Some(Duration::ZERO));
                return;
            }
            StreamReply::Close => return,
        }
    }
}

/// Fills `buf`, polling the shutdown flag while idle. False on EOF, error or
/// shutdown.
fn read_exact_polling(stream: &mut TcpStream, buf: &mut [u8], shutdown: &AtomicBool) -> bool {
    let mut read = 0;
    while read < buf.len() {
        if shutdown.load(Ordering::SeqCst) {
            return false;
        }
        match stream.read(&mut buf[read..]) {
            Ok(0) => return false,
            Ok(n) => read += n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                continue
            }
            Err(_) => return false,
        }
    }
    true
}

/// A UDP socket and TCP listener sharing one loopback port, so one address
/// serves both transports.
pub fn bind_udp_tcp_pair() -> (UdpSocket, TcpListener) {
    for _ in 0..64 {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind TCP");
        let port = listener.local_addr().expect("local addr").port();
        if let Ok(udp) = UdpSocket::bind(("127.0.0.1", port)) {
            return (udp, listener);
        }
    }
    panic!("no loopback port free for both UDP and TCP");
}

/// An address with nothing listening on either transport.
pub fn unused_addr() -> SocketAddr {
    let (udp, listener) = bind_udp_tcp_pair();
    let addr = listener.local_addr().expect("local addr");
    drop(udp);
    drop(listener);
    addr
}
