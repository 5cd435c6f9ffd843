use std::io;
use std::mem;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::AgentConfig;
use crate::error::{OfpError, Result};
use crate::ofp_bridge::PathBridge;
use crate::ofp_event::{EventSource, Events};
use crate::ofp_header::{OfpHeader, OFP_HEADER_LEN};
use crate::ofp_message::OfpMessage;
use crate::ofp_queue::QueueEntry;
use crate::ofp_transport::Transport;
use crate::openflow0x04::message::Message;
use crate::openflow0x04::{self, MsgCode};
use crate::resolve::InterfaceResolver;
use crate::trace::TraceSink;

/// Where the session is in its bring-up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// Our HELLO is out; waiting for the controller's first message.
    AwaitingHello,
    Established,
}

/// What the session did with one controller message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    HelloReplied,
    FeaturesReplied,
    /// Received and understood as a type this agent does not handle.
    Unsupported(MsgCode),
    /// Dropped before the handshake completed (strict handshake only).
    Ignored(MsgCode),
}

/// OpenFlow switch-side control channel.
///
/// Owns the controller transport and services two kinds of work: controller
/// messages and entries queued by the data path. Everything here runs on the
/// control-channel thread; only the bridge is shared.
pub struct Session<T, R, S> {
    config: AgentConfig,
    transport: T,
    resolver: R,
    trace: S,
    bridge: Arc<PathBridge>,
    state: SessionState,
    datapath_id: Option<u64>,
    rx_buf: Vec<u8>,
}

impl<T, R, S> Session<T, R, S>
    where T: Transport,
          R: InterfaceResolver,
          S: TraceSink
{
    /// Bind the transport and send the opening HELLO.
    ///
    /// `connect` builds the transport; it is handed the event source to raise
    /// `CONTROLLER_READABLE` on. Any failure here is a `SetupFailure` and nothing
    /// is retried.
    pub fn setup<F>(config: AgentConfig,
                    bridge: Arc<PathBridge>,
                    connect: F,
                    resolver: R,
                    trace: S)
                    -> Result<Session<T, R, S>>
        where F: FnOnce(&AgentConfig, &Arc<EventSource>) -> io::Result<T>
    {
        let transport = connect(&config, bridge.control_events()).map_err(|e| {
                error!(error = %e, controller = %config.controller_addr(),
                       "failed to bind controller transport");
                OfpError::setup(e.into())
            })?;
        let rx_buf = openflow0x04::alloc_message(config.mtu).map_err(OfpError::setup)?;
        let mut session = Session {
            config: config,
            transport: transport,
            resolver: resolver,
            trace: trace,
            bridge: bridge,
            state: SessionState::Uninitialized,
            datapath_id: None,
            rx_buf: rx_buf,
        };
        let xid = session.config.initial_xid;
        session.send_message(xid, Message::Hello).map_err(|e| {
                error!(error = %e, "failed to send HELLO");
                OfpError::setup(e)
            })?;
        session.state = SessionState::AwaitingHello;
        info!(controller = %session.config.controller_addr(), xid, "HELLO sent");
        Ok(session)
    }

    /// Current bring-up state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Datapath id announced in the first FEATURES_REPLY, if one was sent.
    pub fn datapath_id(&self) -> Option<u64> {
        self.datapath_id
    }

    /// Configuration the session was set up with.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The connection to the controller.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Service events until `SHUTDOWN` is raised.
    pub fn run(&mut self) {
        let events = self.bridge.control_events().clone();
        let interest = Events::CONTROLLER_READABLE | Events::DATAPATH_PENDING | Events::SHUTDOWN;
        loop {
            let raised = events.wait(interest);
            self.service(raised);
            if raised.contains(Events::SHUTDOWN) {
                info!("control channel shutting down");
                return;
            }
        }
    }

    /// Handle every condition in `raised`.
    pub fn service(&mut self, raised: Events) {
        if raised.contains(Events::CONTROLLER_READABLE) {
            self.on_controller_readable();
        }
        if raised.contains(Events::DATAPATH_PENDING) {
            self.on_datapath_pending();
        }
    }

    /// Receive and dispatch controller messages until none are pending.
    ///
    /// Readability is coalesced, so one wake may stand for several messages.
    fn on_controller_readable(&mut self) {
        loop {
            match self.receive_one() {
                Ok(Some(outcome)) => debug!(?outcome, "controller message handled"),
                Ok(None) => return,
                Err(OfpError::Transport(e)) => {
                    error!(error = %e, "controller receive failed");
                    return;
                }
                Err(e) => warn!(error = %e, "controller message dropped"),
            }
        }
    }

    /// Receive one controller message into the MTU-sized buffer and dispatch it.
    ///
    /// `Ok(None)` means nothing was pending.
    pub fn receive_one(&mut self) -> Result<Option<Dispatch>> {
        let n = match self.transport.receive(&mut self.rx_buf) {
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if n > self.rx_buf.len() {
            return Err(OfpError::malformed("receive overran buffer", n));
        }
        let buf = mem::take(&mut self.rx_buf);
        let outcome = self.dispatch(&buf[..n]);
        self.rx_buf = buf;
        outcome.map(Some)
    }

    /// Act on one complete controller message.
    pub fn dispatch(&mut self, bytes: &[u8]) -> Result<Dispatch> {
        self.trace.record(bytes);

        let header = openflow0x04::decode_header(bytes)?;
        header.check_length(bytes.len())?;
        let (xid, msg) = Message::parse(&header, &bytes[OFP_HEADER_LEN..])?;

        if self.state != SessionState::Established {
            if self.config.strict_handshake && msg != Message::Hello {
                warn!(msg_type = ?header.type_code(), xid, "expected HELLO, dropping");
                return Ok(Dispatch::Ignored(header.type_code()));
            }
            self.state = SessionState::Established;
            info!(peer_version = header.version(), "session established");
        }

        match msg {
            Message::Hello => {
                self.reply_hello(bytes)?;
                Ok(Dispatch::HelloReplied)
            }
            Message::FeaturesReq => {
                self.reply_features(xid)?;
                Ok(Dispatch::FeaturesReplied)
            }
            other => {
                debug!(msg_type = ?other.msg_code(), xid, "unsupported message type");
                Ok(Dispatch::Unsupported(other.msg_code()))
            }
        }
    }

    /// Echo the request header back with our version.
    fn reply_hello(&mut self, request: &[u8]) -> Result<()> {
        let reply = openflow0x04::encode_hello_reply(request)?;
        self.send_raw(&reply)
    }

    fn reply_features(&mut self, xid: u32) -> Result<()> {
        let ip = self.config.controller_ip;
        let iface = match self.resolver.resolve_interface_by_ip(ip) {
            Some(iface) => iface,
            None => {
                error!(controller = %ip, "failed to resolve interface for controller address");
                return Err(OfpError::ResolutionFailure(ip));
            }
        };
        let derived = openflow0x04::datapath_id_of_mac(iface.hw_addr);
        let dpid = match self.datapath_id {
            Some(pinned) => {
                if pinned != derived {
                    warn!(pinned = format_args!("{:016x}", pinned),
                          derived = format_args!("{:016x}", derived),
                          iface = %iface.name,
                          "interface address changed, keeping datapath id");
                }
                pinned
            }
            None => derived,
        };
        let reply = openflow0x04::encode_features_reply(xid,
                                                        dpid,
                                                        self.config.max_buffers,
                                                        self.config.max_tables,
                                                        self.config.capabilities)?;
        self.send_raw(&reply)?;
        if self.datapath_id.is_none() {
            info!(datapath_id = format_args!("{:016x}", dpid), iface = %iface.name,
                  "datapath id announced");
            self.datapath_id = Some(dpid);
        }
        Ok(())
    }

    /// Drain the data-path queue. Each payload goes to the trace sink and the
    /// entry is released.
    fn on_datapath_pending(&mut self) {
        let entries = self.bridge.recv_from_datapath();
        debug!(count = entries.len(), "draining data path queue");
        for entry in entries {
            debug!(len = entry.len(), flow = entry.flow_entry.is_some(),
                   "message from data path");
            self.trace.record(&entry.payload);
        }
    }

    /// Queue `entry` for the data path and wake it.
    pub fn send_to_datapath(&self, entry: QueueEntry) -> Result<()> {
        self.bridge.send_to_datapath(entry)
    }

    /// Marshal and send `msg` with transaction id `xid`.
    pub fn send_message(&mut self, xid: u32, msg: Message) -> Result<()> {
        let bytes = <Message as OfpMessage>::marshal(xid, msg)?;
        self.send_raw(&bytes)
    }

    fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        if let Ok(hdr) = OfpHeader::parse(bytes) {
            debug!(msg_type = ?hdr.type_code(), xid = hdr.xid(), len = bytes.len(),
                   "sending to controller");
        }
        self.transport.send(bytes).map_err(|e| {
            error!(error = %e, "controller send failed");
            OfpError::Transport(e)
        })
    }
}
