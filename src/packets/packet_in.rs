//! Packet in payloads.
//!
//! 1.0 layout:
//!
//! ```no_rust
//!  0      7        15       23       31
//! +--------+--------+--------+--------+
//! |             buffer id             |
//! +--------+--------+--------+--------+
//! |    total len    |     in port     |
//! +--------+--------+--------+--------+
//! | reason |  pad   |   data ...      |
//! +--------+--------+--------+--------+
//! ```
//!
//! The 1.3 variant replaces the in-port field with an OXM match carrying
//! the pipeline fields and adds the table id and cookie of the flow that
//! punted the packet.

use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};
use oxm::FlowMatch;

enum_with_unknown! {
    /// Why the packet was sent to the controller (1.0)
    pub doc enum Reason(u8) {
        /// No matching flow.
        NoMatch = 0,
        /// Action explicitly output to controller.
        Action = 1
    }
}

enum_with_unknown! {
    /// Why the packet was sent to the controller (1.3)
    pub doc enum Reason13(u8) {
        /// No matching flow (table-miss flow entry).
        TableMiss = 0,
        /// Output to controller in apply-actions.
        ApplyAction = 1,
        /// Packet has invalid TTL.
        InvalidTtl = 2
    }
}

mod field {
    use field::*;
    pub const BUFFER_ID: Field = 0..4;
    pub const TOTAL_LEN: Field = 4..6;
    pub const IN_PORT: Field = 6..8;
    pub const REASON: usize = 8;
    // one pad byte
    pub const DATA: Rest = 10..;
}

/// High-level representation of a 1.0 packet in.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketRepr {
    /// Id assigned to the buffered copy on the switch, or `0xffff_ffff`
    /// when the packet is carried whole in `data`.
    pub buffer_id: u32,
    /// Full length of the punted frame, which `data` may truncate.
    pub total_len: u16,
    pub in_port: u16,
    pub reason: Reason,
    pub data: Vec<u8>,
}

impl Repr for PacketRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field::DATA.start {
            return Err(Error::Truncated);
        }
        Ok(PacketRepr {
            buffer_id: NetworkEndian::read_u32(&buffer[field::BUFFER_ID]),
            total_len: NetworkEndian::read_u16(&buffer[field::TOTAL_LEN]),
            in_port: NetworkEndian::read_u16(&buffer[field::IN_PORT]),
            reason: Reason::from(buffer[field::REASON]),
            data: buffer[field::DATA].to_vec(),
        })
    }

    fn buffer_len(&self) -> usize {
        field::DATA.start + self.data.len()
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        NetworkEndian::write_u32(&mut buffer[field::BUFFER_ID], self.buffer_id);
        NetworkEndian::write_u16(&mut buffer[field::TOTAL_LEN], self.total_len);
        NetworkEndian::write_u16(&mut buffer[field::IN_PORT], self.in_port);
        buffer[field::REASON] = self.reason.into();
        buffer[field::REASON + 1] = 0;
        buffer[field::DATA].copy_from_slice(&self.data);
        Ok(())
    }
}

mod field13 {
    use field::*;
    pub const BUFFER_ID: Field = 0..4;
    pub const TOTAL_LEN: Field = 4..6;
    pub const REASON: usize = 6;
    pub const TABLE_ID: usize = 7;
    pub const COOKIE: Field = 8..16;
    pub const FLOW_MATCH: Rest = 16..;
}

/// High-level representation of a 1.3 packet in.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketRepr13 {
    pub buffer_id: u32,
    pub total_len: u16,
    pub reason: Reason13,
    /// Table of the flow that punted the packet.
    pub table_id: u8,
    /// Cookie of the flow that punted the packet, all-ones when none.
    pub cookie: u64,
    /// Pipeline fields, at least the ingress port.
    pub flow_match: FlowMatch,
    pub data: Vec<u8>,
}

impl Repr for PacketRepr13 {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field13::FLOW_MATCH.start {
            return Err(Error::Truncated);
        }
        let rest = &buffer[field13::FLOW_MATCH];
        let flow_match = FlowMatch::parse(rest)?;
        let after_match = &rest[flow_match.buffer_len()..];
        // two pad bytes separate the match from the frame
        if after_match.len() < 2 {
            return Err(Error::Truncated);
        }
        Ok(PacketRepr13 {
            buffer_id: NetworkEndian::read_u32(&buffer[field13::BUFFER_ID]),
            total_len: NetworkEndian::read_u16(&buffer[field13::TOTAL_LEN]),
            reason: Reason13::from(buffer[field13::REASON]),
            table_id: buffer[field13::TABLE_ID],
            cookie: NetworkEndian::read_u64(&buffer[field13::COOKIE]),
            flow_match,
            data: after_match[2..].to_vec(),
        })
    }

    fn buffer_len(&self) -> usize {
        field13::FLOW_MATCH.start + self.flow_match.buffer_len() + 2 + self.data.len()
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        NetworkEndian::write_u32(&mut buffer[field13::BUFFER_ID], self.buffer_id);
        NetworkEndian::write_u16(&mut buffer[field13::TOTAL_LEN], self.total_len);
        buffer[field13::REASON] = self.reason.into();
        buffer[field13::TABLE_ID] = self.table_id;
        NetworkEndian::write_u64(&mut buffer[field13::COOKIE], self.cookie);
        let rest = &mut buffer[field13::FLOW_MATCH];
        self.flow_match.emit(rest)?;
        let match_len = self.flow_match.buffer_len();
        rest[match_len] = 0;
        rest[match_len + 1] = 0;
        rest[match_len + 2..match_len + 2 + self.data.len()].copy_from_slice(&self.data);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Repr;
    use oxm::OxmField;

    #[test]
    fn v10_roundtrip() {
        let repr = PacketRepr {
            buffer_id: 200,
            total_len: 64,
            in_port: 1,
            reason: Reason::NoMatch,
            data: vec![0xde, 0xad, 0xbe, 0xef],
        };
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketRepr::parse(&buf).unwrap(), repr);
    }

    #[test]
    fn v13_roundtrip() {
        let repr = PacketRepr13 {
            buffer_id: 200,
            total_len: 1000,
            reason: Reason13::TableMiss,
            table_id: 100,
            cookie: 0,
            flow_match: FlowMatch::new(vec![
                OxmField::InPort(43_981),
                OxmField::TunnelId(50_000, None),
            ]),
            data: vec![0x68, 0x6f, 0x67, 0x65],
        };
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketRepr13::parse(&buf).unwrap(), repr);
    }
}
