use byteorder::{BigEndian, ByteOrder};

use crate::error::{OfpError, Result};
use crate::openflow0x04::MsgCode;

/// Byte-size of an encoded `OfpHeader`.
pub const OFP_HEADER_LEN: usize = 8;

/// OpenFlow Header
///
/// The first fields of every OpenFlow message, no matter the protocol version.
/// This is parsed to determine version and length of the remaining message, so that
/// it can be properly handled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OfpHeader {
    version: u8,
    typ: u8,
    length: u16,
    xid: u32,
}

impl OfpHeader {
    /// Create an `OfpHeader` out of the arguments.
    pub fn new(version: u8, typ: u8, length: u16, xid: u32) -> OfpHeader {
        OfpHeader {
            version: version,
            typ: typ,
            length: length,
            xid: xid,
        }
    }

    /// Return the byte-size of an `OfpHeader`.
    pub fn size() -> usize {
        OFP_HEADER_LEN
    }

    /// Writes the header fields into the first `OFP_HEADER_LEN` bytes of `buf`.
    ///
    /// `buf` must be at least `OFP_HEADER_LEN` bytes long.
    pub fn marshal(&self, buf: &mut [u8]) {
        buf[0] = self.version;
        buf[1] = self.typ;
        BigEndian::write_u16(&mut buf[2..4], self.length);
        BigEndian::write_u32(&mut buf[4..8], self.xid);
    }

    /// Parses the header at the start of `buf`.
    ///
    /// Fails with `MalformedMessage` when fewer than `OFP_HEADER_LEN` bytes are
    /// available. Only the header itself is checked here; see `check_length`.
    pub fn parse(buf: &[u8]) -> Result<OfpHeader> {
        if buf.len() < OFP_HEADER_LEN {
            return Err(OfpError::malformed("shorter than header", buf.len()));
        }
        Ok(OfpHeader {
            version: buf[0],
            typ: buf[1],
            length: BigEndian::read_u16(&buf[2..4]),
            xid: BigEndian::read_u32(&buf[4..8]),
        })
    }

    /// Checks that the `length` field agrees with the `received` byte count.
    pub fn check_length(&self, received: usize) -> Result<()> {
        if self.length() < OFP_HEADER_LEN {
            return Err(OfpError::malformed("length field below header size", received));
        }
        if self.length() != received {
            return Err(OfpError::malformed("length field disagrees with message size",
                                           received));
        }
        Ok(())
    }

    /// Return the `version` field of a header.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Return the OpenFlow message type code of a header.
    pub fn type_code(&self) -> MsgCode {
        MsgCode::from(self.typ)
    }

    /// Return the `length` field of a header. Includes the length of the header itself.
    pub fn length(&self) -> usize {
        self.length as usize
    }

    /// Return the `xid` field of a header, the transaction id associated with this packet.
    ///  Replies use the same id to facilitate pairing.
    pub fn xid(&self) -> u32 {
        self.xid
    }
}
