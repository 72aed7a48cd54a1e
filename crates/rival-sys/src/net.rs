// net.rs -- framed TCP relay
//
// Two blocking reader threads (client side, server side) push frames into
// a bounded queue; the game thread owns both write halves and everything
// else. A full queue drops the frame and counts it, the producer never
// blocks.
//
// Frame layout on both legs: u16 LE payload length, u16 LE opcode, body.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};

use rival_common::packets::Direction;

/// One frame pulled off a socket, stamped on arrival.
#[derive(Debug, Clone)]
pub struct RelayFrame {
    /// Leg the frame must be forwarded to (the opposite of where it was
    /// read).
    pub dir: Direction,
    pub opcode: u16,
    pub body: Vec<u8>,
    pub received_at: i64,
}

pub fn read_frame(stream: &mut TcpStream) -> std::io::Result<(u16, Vec<u8>)> {
    let mut head = [0u8; 4];
    stream.read_exact(&mut head)?;
    let len = u16::from_le_bytes([head[0], head[1]]) as usize;
    let opcode = u16::from_le_bytes([head[2], head[3]]);
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body)?;
    Ok((opcode, body))
}

pub fn write_frame(stream: &mut TcpStream, opcode: u16, body: &[u8]) -> std::io::Result<()> {
    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(&opcode.to_le_bytes());
    out.extend_from_slice(body);
    stream.write_all(&out)
}

/// Bounded frame queue between the reader threads and the game thread.
pub struct FrameQueue {
    sender: Sender<RelayFrame>,
    receiver: Receiver<RelayFrame>,
    dropped: Arc<AtomicUsize>,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            dropped: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn receiver(&self) -> &Receiver<RelayFrame> {
        &self.receiver
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Spawn a reader thread for one leg. Frames read from `stream` are
    /// queued for forwarding to `forward_to`.
    pub fn spawn_reader(&self, mut stream: TcpStream, forward_to: Direction, epoch: Instant) {
        let sender = self.sender.clone();
        let dropped = Arc::clone(&self.dropped);
        let leg = match forward_to {
            Direction::ToServer => "client",
            Direction::ToClient => "server",
        };
        std::thread::Builder::new()
            .name(format!("rival-read-{}", leg))
            .spawn(move || loop {
                let (opcode, body) = match read_frame(&mut stream) {
                    Ok(frame) => frame,
                    Err(e) => {
                        log::info!("{} leg closed: {}", leg, e);
                        return;
                    }
                };
                let frame = RelayFrame {
                    dir: forward_to,
                    opcode,
                    body,
                    received_at: epoch.elapsed().as_millis() as i64,
                };
                match sender.try_send(frame) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        let n = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        if n.is_power_of_two() {
                            log::warn!("frame queue full, {} frames dropped so far", n);
                        }
                    }
                    Err(TrySendError::Disconnected(_)) => return,
                }
            })
            .expect("reader thread spawn");
    }
}
