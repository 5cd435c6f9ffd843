//! Flow-table declarations shared with the data path.
//!
//! The control channel never looks inside these; a queue entry may point at the
//! flow entry its payload concerns, and the data path owns the tables.

use std::net::Ipv4Addr;
use std::sync::Arc;

/// Header fields a flow entry matches on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MatchFields {
    pub dst_mac: [u8; 6],
    pub src_mac: [u8; 6],
    pub vlan_id: u16,
    pub ether_type: u16,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub protocol: u8,
    pub src_port: u16,
    pub dst_port: u16,
    pub in_port: u8,
}

impl Default for MatchFields {
    fn default() -> MatchFields {
        MatchFields {
            dst_mac: [0; 6],
            src_mac: [0; 6],
            vlan_id: 0,
            ether_type: 0,
            src_ip: Ipv4Addr::UNSPECIFIED,
            dst_ip: Ipv4Addr::UNSPECIFIED,
            protocol: 0,
            src_port: 0,
            dst_port: 0,
            in_port: 0,
        }
    }
}

/// A single flow-table entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowEntry {
    pub hard_timeout: u32,
    pub idle_timeout: u32,
    pub cookie: u64,
    pub cookie_mask: u64,
    pub flags: u16,
    pub priority: u16,
    pub buffer_id: u32,
    pub out_port: u32,
    pub out_group: u32,
    pub table_id: u32,
    pub match_count: u32,
    pub match_fields: MatchFields,
}

/// A flow table and its lookup counters.
#[derive(Debug)]
pub struct FlowTable {
    pub table_id: u32,
    pub name: String,
    pub max_entries: u32,
    pub lookup_count: u32,
    pub matched_count: u32,
    entries: Vec<Arc<FlowEntry>>,
}

impl FlowTable {
    pub fn new(table_id: u32, name: &str, max_entries: u32) -> FlowTable {
        FlowTable {
            table_id: table_id,
            name: name.to_owned(),
            max_entries: max_entries,
            lookup_count: 0,
            matched_count: 0,
            entries: Vec::new(),
        }
    }

    /// Adds `entry`, returning the shared handle, or `None` if the table is full.
    pub fn add_entry(&mut self, mut entry: FlowEntry) -> Option<Arc<FlowEntry>> {
        if self.active_count() >= self.max_entries {
            return None;
        }
        entry.table_id = self.table_id;
        let entry = Arc::new(entry);
        self.entries.push(entry.clone());
        Some(entry)
    }

    pub fn active_count(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn entries(&self) -> &[Arc<FlowEntry>] {
        &self.entries
    }
}
