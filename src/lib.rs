#![crate_name = "ofp_agent"]
#![crate_type = "lib"]

//! Switch-side OpenFlow control channel.
//!
//! Brings up a session with an SDN controller (HELLO, FEATURES_REQUEST/REPLY)
//! and relays messages handed over by the packet-forwarding data path through a
//! pair of cross-path queues.

pub mod config;
pub mod error;
pub mod flow;
pub mod ofp_bridge;
pub mod ofp_event;
pub mod ofp_header;
pub mod ofp_message;
pub mod ofp_queue;
pub mod ofp_session;
pub mod ofp_transport;
pub mod openflow0x04;
pub mod resolve;
pub mod trace;

pub use crate::config::AgentConfig;
pub use crate::error::{OfpError, Result};
pub use crate::ofp_bridge::PathBridge;
pub use crate::ofp_event::{EventSource, Events};
pub use crate::ofp_queue::{CrossPathQueue, QueueEntry};
pub use crate::ofp_session::{Dispatch, Session, SessionState};
