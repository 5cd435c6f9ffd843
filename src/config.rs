use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use crate::openflow0x04::Capabilities;

/// IANA-assigned OpenFlow port.
pub const DEFAULT_CONTROLLER_PORT: u16 = 6653;
/// Transaction id of the HELLO sent at session start.
pub const DEFAULT_INITIAL_XID: u32 = 1;
/// Size of the receive buffer for one controller message.
pub const DEFAULT_MTU: usize = 1500;
pub const DEFAULT_MAX_BUFFERS: u32 = 256;
pub const DEFAULT_MAX_TABLES: u32 = 1;

/// Control-channel agent settings.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub controller_ip: Ipv4Addr,
    pub controller_port: u16,
    pub initial_xid: u32,
    pub mtu: usize,
    /// Advertised in FEATURES_REPLY.
    pub max_buffers: u32,
    /// Advertised in FEATURES_REPLY.
    pub max_tables: u32,
    pub capabilities: Capabilities,
    /// Bound on each cross-path queue; `None` leaves them unbounded.
    pub queue_capacity: Option<usize>,
    /// Only a HELLO may establish the session.
    pub strict_handshake: bool,
}

impl AgentConfig {
    pub fn controller_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.controller_ip, self.controller_port))
    }
}

impl Default for AgentConfig {
    fn default() -> AgentConfig {
        AgentConfig {
            controller_ip: Ipv4Addr::LOCALHOST,
            controller_port: DEFAULT_CONTROLLER_PORT,
            initial_xid: DEFAULT_INITIAL_XID,
            mtu: DEFAULT_MTU,
            max_buffers: DEFAULT_MAX_BUFFERS,
            max_tables: DEFAULT_MAX_TABLES,
            capabilities: Capabilities::FLOW_STATS | Capabilities::TABLE_STATS,
            queue_capacity: None,
            strict_handshake: false,
        }
    }
}
