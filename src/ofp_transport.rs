//! Byte-stream transport to the controller.

use std::cmp;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, error, warn};

use crate::ofp_event::{EventSource, Events};
use crate::ofp_header::OFP_HEADER_LEN;

/// A connected, reliable, ordered stream to the controller.
pub trait Transport {
    /// Write all of `buf` to the controller.
    fn send(&mut self, buf: &[u8]) -> io::Result<()>;
    /// Copy one pending controller message into `buf`, returning its byte count.
    ///
    /// Returns `ErrorKind::WouldBlock` when no message is pending. A message larger
    /// than `buf` is truncated.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// TCP connection to the controller.
///
/// A reader thread splits the incoming stream into messages using the header
/// length field and raises `CONTROLLER_READABLE` for each one it queues.
pub struct TcpTransport {
    stream: TcpStream,
    inbound: Receiver<Vec<u8>>,
}

impl TcpTransport {
    pub fn connect(addr: SocketAddr, events: Arc<EventSource>) -> io::Result<TcpTransport> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let reader = stream.try_clone()?;
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("ofp-rx".to_owned())
            .spawn(move || read_frames(reader, tx, events))?;
        debug!(%addr, "connected to controller");
        Ok(TcpTransport {
            stream: stream,
            inbound: rx,
        })
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf)
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inbound.try_recv() {
            Ok(frame) => {
                let n = cmp::min(frame.len(), buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                Ok(n)
            }
            Err(TryRecvError::Empty) => Err(io::ErrorKind::WouldBlock.into()),
            Err(TryRecvError::Disconnected) => {
                Err(io::Error::new(io::ErrorKind::ConnectionAborted,
                                   "controller connection closed"))
            }
        }
    }
}

fn read_frames(mut stream: TcpStream, inbound: Sender<Vec<u8>>, events: Arc<EventSource>) {
    loop {
        match read_frame(&mut stream) {
            Ok(Some(frame)) => {
                if inbound.send(frame).is_err() {
                    return;
                }
                events.send(Events::CONTROLLER_READABLE);
            }
            Ok(None) => {
                // no reconnection; the session keeps running without a controller
                warn!("controller closed the connection");
                return;
            }
            Err(e) => {
                error!(error = %e, "controller read failed");
                return;
            }
        }
    }
}

/// Read one message: the header, then `length - OFP_HEADER_LEN` body bytes.
///
/// A header whose length is below the header size is passed on as-is so the
/// session can reject it. Returns `None` on a clean end of stream.
pub fn read_frame<R: Read>(stream: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut header = [0u8; OFP_HEADER_LEN];
    match stream.read_exact(&mut header) {
        Ok(()) => (),
        Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let length = BigEndian::read_u16(&header[2..4]) as usize;
    let mut frame = header.to_vec();
    if length > OFP_HEADER_LEN {
        frame.resize(length, 0);
        stream.read_exact(&mut frame[OFP_HEADER_LEN..])?;
    }
    Ok(Some(frame))
}
