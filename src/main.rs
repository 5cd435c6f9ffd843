use std::net::Ipv4Addr;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use ofp_agent::config::{self, AgentConfig};
use ofp_agent::ofp_transport::TcpTransport;
use ofp_agent::resolve::SysResolver;
use ofp_agent::trace::LogTrace;
use ofp_agent::{PathBridge, Session};

#[derive(Parser, Debug)]
#[command(name = "ofp_agent")]
#[command(about = "OpenFlow 1.3 switch-side control channel agent")]
struct Args {
    /// Controller IPv4 address
    #[arg(long, default_value = "127.0.0.1")]
    controller: Ipv4Addr,

    /// Controller TCP port
    #[arg(long, default_value_t = config::DEFAULT_CONTROLLER_PORT)]
    port: u16,

    /// Transaction id of the opening HELLO
    #[arg(long, default_value_t = config::DEFAULT_INITIAL_XID)]
    initial_xid: u32,

    /// Receive buffer size for one controller message
    #[arg(long, default_value_t = config::DEFAULT_MTU)]
    mtu: usize,

    /// Packet buffers advertised to the controller
    #[arg(long, default_value_t = config::DEFAULT_MAX_BUFFERS)]
    max_buffers: u32,

    /// Flow tables advertised to the controller
    #[arg(long, default_value_t = config::DEFAULT_MAX_TABLES)]
    max_tables: u32,

    /// Bound each cross-path queue to this many entries (default: unbounded)
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Require the controller's first message to be a HELLO
    #[arg(long)]
    strict_handshake: bool,
}

impl Args {
    fn into_config(self) -> AgentConfig {
        AgentConfig {
            controller_ip: self.controller,
            controller_port: self.port,
            initial_xid: self.initial_xid,
            mtu: self.mtu,
            max_buffers: self.max_buffers,
            max_tables: self.max_tables,
            queue_capacity: self.queue_capacity,
            strict_handshake: self.strict_handshake,
            ..AgentConfig::default()
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Args::parse().into_config();
    let bridge = Arc::new(PathBridge::new(config.queue_capacity));
    let session = Session::setup(config,
                                 bridge,
                                 |cfg, events| TcpTransport::connect(cfg.controller_addr(), events.clone()),
                                 SysResolver,
                                 LogTrace);
    match session {
        Ok(mut session) => session.run(),
        Err(e) => {
            error!(error = %e, "control channel initialization failed");
            process::exit(1);
        }
    }
}
