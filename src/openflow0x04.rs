use byteorder::{BigEndian, ByteOrder};
use bitflags::bitflags;

use crate::error::{OfpError, Result};
use crate::ofp_header::{OfpHeader, OFP_HEADER_LEN};

/// Protocol version spoken by this agent (OpenFlow 1.3).
pub const OFP_VERSION: u8 = 0x04;

/// Byte-size of a features reply body, header excluded.
pub const FEATURES_BODY_LEN: usize = 24;

/// Byte-size of a whole features reply message.
pub const FEATURES_REPLY_LEN: usize = OFP_HEADER_LEN + FEATURES_BODY_LEN;

/// `auxiliary_id` of the main controller connection.
pub const MAIN_CONNECTION: u32 = 0;

/// OpenFlow 1.3 message type codes, used by headers to identify meaning of the rest of a message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MsgCode {
    Hello,
    Error,
    EchoReq,
    EchoResp,
    Experimenter,
    FeaturesReq,
    FeaturesResp,
    GetConfigReq,
    GetConfigResp,
    SetConfig,
    PacketIn,
    FlowRemoved,
    PortStatus,
    PacketOut,
    FlowMod,
    GroupMod,
    PortMod,
    TableMod,
    MultipartReq,
    MultipartResp,
    BarrierReq,
    BarrierResp,
    QueueGetConfigReq,
    QueueGetConfigResp,
    RoleReq,
    RoleResp,
    GetAsyncReq,
    GetAsyncResp,
    SetAsync,
    MeterMod,
    /// A type code outside the OpenFlow 1.3 table.
    Unknown(u8),
}

const KNOWN_CODES: [MsgCode; 30] = [MsgCode::Hello,
                                    MsgCode::Error,
                                    MsgCode::EchoReq,
                                    MsgCode::EchoResp,
                                    MsgCode::Experimenter,
                                    MsgCode::FeaturesReq,
                                    MsgCode::FeaturesResp,
                                    MsgCode::GetConfigReq,
                                    MsgCode::GetConfigResp,
                                    MsgCode::SetConfig,
                                    MsgCode::PacketIn,
                                    MsgCode::FlowRemoved,
                                    MsgCode::PortStatus,
                                    MsgCode::PacketOut,
                                    MsgCode::FlowMod,
                                    MsgCode::GroupMod,
                                    MsgCode::PortMod,
                                    MsgCode::TableMod,
                                    MsgCode::MultipartReq,
                                    MsgCode::MultipartResp,
                                    MsgCode::BarrierReq,
                                    MsgCode::BarrierResp,
                                    MsgCode::QueueGetConfigReq,
                                    MsgCode::QueueGetConfigResp,
                                    MsgCode::RoleReq,
                                    MsgCode::RoleResp,
                                    MsgCode::GetAsyncReq,
                                    MsgCode::GetAsyncResp,
                                    MsgCode::SetAsync,
                                    MsgCode::MeterMod];

impl From<u8> for MsgCode {
    fn from(code: u8) -> MsgCode {
        match KNOWN_CODES.get(code as usize) {
            Some(known) => *known,
            None => MsgCode::Unknown(code),
        }
    }
}

impl MsgCode {
    /// Return the wire value of this type code.
    pub fn code(self) -> u8 {
        match self {
            MsgCode::Unknown(c) => c,
            known => {
                KNOWN_CODES.iter().position(|k| *k == known).map(|p| p as u8).unwrap_or(0xff)
            }
        }
    }
}

bitflags! {
    /// Capabilities supported by the datapath.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        const FLOW_STATS = 1 << 0;
        const TABLE_STATS = 1 << 1;
        const PORT_STATS = 1 << 2;
        const GROUP_STATS = 1 << 3;
        const IP_REASM = 1 << 5;
        const QUEUE_STATS = 1 << 6;
        const PORT_BLOCKED = 1 << 8;
    }
}

/// Common API for message types implementing OpenFlow Message Codes (see `MsgCode` enum).
pub trait MessageType: Sized {
    /// Return the byte-size of a message body.
    fn size_of(&self) -> usize;
    /// Parse a buffer into a message.
    fn parse(buf: &[u8]) -> Result<Self>;
    /// Marshal a message into a body buffer of exactly `size_of` bytes.
    fn marshal(&self, buf: &mut [u8]);
}

/// Pack a 6-byte hardware address into the low 48 bits of a datapath id.
pub fn datapath_id_of_mac(addr: [u8; 6]) -> u64 {
    addr.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
}

/// Recover the hardware address held in the low 48 bits of a datapath id.
pub fn mac_of_datapath_id(dpid: u64) -> [u8; 6] {
    let mut arr = [0; 6];
    for (i, b) in arr.iter_mut().enumerate() {
        *b = (dpid >> (8 * (5 - i))) as u8;
    }
    arr
}

/// Switch features.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SwitchFeatures {
    pub datapath_id: u64,
    pub num_buffers: u32,
    pub num_tables: u32,
    pub auxiliary_id: u32,
    pub capabilities: Capabilities,
}

impl MessageType for SwitchFeatures {
    fn size_of(&self) -> usize {
        FEATURES_BODY_LEN
    }

    fn parse(buf: &[u8]) -> Result<SwitchFeatures> {
        if buf.len() < FEATURES_BODY_LEN {
            return Err(OfpError::malformed("features reply body too short", buf.len()));
        }
        Ok(SwitchFeatures {
            datapath_id: BigEndian::read_u64(&buf[0..8]),
            num_buffers: BigEndian::read_u32(&buf[8..12]),
            num_tables: BigEndian::read_u32(&buf[12..16]),
            auxiliary_id: BigEndian::read_u32(&buf[16..20]),
            capabilities: Capabilities::from_bits_retain(BigEndian::read_u32(&buf[20..24])),
        })
    }

    fn marshal(&self, buf: &mut [u8]) {
        BigEndian::write_u64(&mut buf[0..8], self.datapath_id);
        BigEndian::write_u32(&mut buf[8..12], self.num_buffers);
        BigEndian::write_u32(&mut buf[12..16], self.num_tables);
        BigEndian::write_u32(&mut buf[16..20], self.auxiliary_id);
        BigEndian::write_u32(&mut buf[20..24], self.capabilities.bits());
    }
}

/// Obtain a zeroed buffer of `len` bytes, reporting allocation failure instead of aborting.
pub fn alloc_message(len: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    bytes.try_reserve_exact(len)?;
    bytes.resize(len, 0);
    Ok(bytes)
}

/// Encode a header-only HELLO carrying `xid`.
pub fn encode_hello(xid: u32) -> Result<Vec<u8>> {
    message::Message::Hello.marshal(xid)
}

/// Decode the header at the start of `bytes`.
pub fn decode_header(bytes: &[u8]) -> Result<OfpHeader> {
    OfpHeader::parse(bytes)
}

/// Encode a FEATURES_REPLY answering the request with transaction id `xid`.
pub fn encode_features_reply(xid: u32,
                             datapath_id: u64,
                             max_buffers: u32,
                             max_tables: u32,
                             capabilities: Capabilities)
                             -> Result<Vec<u8>> {
    let features = SwitchFeatures {
        datapath_id: datapath_id,
        num_buffers: max_buffers,
        num_tables: max_tables,
        auxiliary_id: MAIN_CONNECTION,
        capabilities: capabilities,
    };
    message::Message::FeaturesReply(features).marshal(xid)
}

/// Build the reply to a received HELLO by copying its header.
///
/// Type and transaction id are kept byte-for-byte; the version is replaced with
/// `OFP_VERSION` and the length with the header size, since the reply carries
/// no hello elements.
pub fn encode_hello_reply(request: &[u8]) -> Result<Vec<u8>> {
    OfpHeader::parse(request)?;
    let mut bytes = alloc_message(OFP_HEADER_LEN)?;
    bytes.copy_from_slice(&request[..OFP_HEADER_LEN]);
    bytes[0] = OFP_VERSION;
    BigEndian::write_u16(&mut bytes[2..4], OFP_HEADER_LEN as u16);
    Ok(bytes)
}

/// Encapsulates handling of messages implementing `MessageType` trait.
pub mod message {
    use super::*;
    use std::convert::TryFrom;

    use crate::ofp_message::OfpMessage;

    /// Abstractions of OpenFlow messages mapping to message codes.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Message {
        Hello,
        FeaturesReq,
        FeaturesReply(SwitchFeatures),
        /// Any message this agent does not interpret; the body is kept raw.
        Unsupported(MsgCode, Vec<u8>),
    }

    impl Message {
        /// Map `Message` to associated OpenFlow message type code `MsgCode`.
        pub fn msg_code(&self) -> MsgCode {
            match *self {
                Message::Hello => MsgCode::Hello,
                Message::FeaturesReq => MsgCode::FeaturesReq,
                Message::FeaturesReply(_) => MsgCode::FeaturesResp,
                Message::Unsupported(code, _) => code,
            }
        }

        /// Returns a buffer containing a marshaled OpenFlow header and this message.
        pub fn marshal(self, xid: u32) -> Result<Vec<u8>> {
            <Message as OfpMessage>::marshal(xid, self)
        }
    }

    impl OfpMessage for Message {
        fn size_of(msg: &Message) -> usize {
            match *msg {
                Message::Hello => OfpHeader::size(),
                Message::FeaturesReq => OfpHeader::size(),
                Message::FeaturesReply(ref sf) => OfpHeader::size() + sf.size_of(),
                Message::Unsupported(_, ref body) => OfpHeader::size() + body.len(),
            }
        }

        fn header_of(xid: u32, msg: &Message) -> OfpHeader {
            OfpHeader::new(OFP_VERSION,
                           msg.msg_code().code(),
                           Self::size_of(msg) as u16,
                           xid)
        }

        fn marshal(xid: u32, msg: Message) -> Result<Vec<u8>> {
            let len = Self::size_of(&msg);
            // the header's length field is 16 bits wide
            if u16::try_from(len).is_err() {
                return Err(OfpError::MessageTooLarge(len));
            }
            let mut bytes = alloc_message(len)?;
            Self::header_of(xid, &msg).marshal(&mut bytes);
            let body = &mut bytes[OFP_HEADER_LEN..];
            match msg {
                Message::Hello | Message::FeaturesReq => (),
                Message::FeaturesReply(sf) => sf.marshal(body),
                Message::Unsupported(_, raw) => body.copy_from_slice(&raw),
            }
            Ok(bytes)
        }

        fn parse(header: &OfpHeader, buf: &[u8]) -> Result<(u32, Message)> {
            let msg = match header.type_code() {
                MsgCode::Hello => Message::Hello,
                MsgCode::FeaturesReq => Message::FeaturesReq,
                MsgCode::FeaturesResp => Message::FeaturesReply(SwitchFeatures::parse(buf)?),
                t => Message::Unsupported(t, buf.to_vec()),
            };
            Ok((header.xid(), msg))
        }
    }
}
