//! Flow removed payloads, sent to the controller whenever a flow is
//! evicted by a timer.

use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};
use flow_match::Match;
use oxm::FlowMatch;

enum_with_unknown! {
    /// Why the flow was removed
    pub doc enum Reason(u8) {
        /// Flow idle time exceeded idle_timeout.
        IdleTimeout = 0,
        /// Time exceeded hard_timeout.
        HardTimeout = 1,
        /// Evicted by a delete flow mod.
        Delete = 2
    }
}

mod field {
    use field::*;
    use flow_match::MATCH_LEN;

    pub const FLOW_MATCH: Field = 0..MATCH_LEN;
    pub const COOKIE: Field = MATCH_LEN..MATCH_LEN + 8;
    pub const PRIORITY: Field = MATCH_LEN + 8..MATCH_LEN + 10;
    pub const REASON: usize = MATCH_LEN + 10;
    // one pad byte
    pub const DURATION_SEC: Field = MATCH_LEN + 12..MATCH_LEN + 16;
    pub const DURATION_NSEC: Field = MATCH_LEN + 16..MATCH_LEN + 20;
    pub const IDLE_TIMEOUT: Field = MATCH_LEN + 20..MATCH_LEN + 22;
    // two pad bytes
    pub const PACKET_COUNT: Field = MATCH_LEN + 24..MATCH_LEN + 32;
    pub const BYTE_COUNT: Field = MATCH_LEN + 32..MATCH_LEN + 40;
    pub const END: usize = MATCH_LEN + 40;
}

/// High-level representation of a 1.0 flow removed.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketRepr {
    pub flow_match: Match,
    pub cookie: u64,
    pub priority: u16,
    pub reason: Reason,
    /// Seconds the flow was alive.
    pub duration_sec: u32,
    /// Nanoseconds beyond `duration_sec`.
    pub duration_nsec: u32,
    pub idle_timeout: u16,
    pub packet_count: u64,
    pub byte_count: u64,
}

impl Repr for PacketRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field::END {
            return Err(Error::Truncated);
        }
        Ok(PacketRepr {
            flow_match: Match::parse(&buffer[field::FLOW_MATCH])?,
            cookie: NetworkEndian::read_u64(&buffer[field::COOKIE]),
            priority: NetworkEndian::read_u16(&buffer[field::PRIORITY]),
            reason: Reason::from(buffer[field::REASON]),
            duration_sec: NetworkEndian::read_u32(&buffer[field::DURATION_SEC]),
            duration_nsec: NetworkEndian::read_u32(&buffer[field::DURATION_NSEC]),
            idle_timeout: NetworkEndian::read_u16(&buffer[field::IDLE_TIMEOUT]),
            packet_count: NetworkEndian::read_u64(&buffer[field::PACKET_COUNT]),
            byte_count: NetworkEndian::read_u64(&buffer[field::BYTE_COUNT]),
        })
    }

    fn buffer_len(&self) -> usize {
        field::END
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..field::END].iter_mut() {
            *byte = 0;
        }
        self.flow_match.emit(&mut buffer[field::FLOW_MATCH])?;
        NetworkEndian::write_u64(&mut buffer[field::COOKIE], self.cookie);
        NetworkEndian::write_u16(&mut buffer[field::PRIORITY], self.priority);
        buffer[field::REASON] = self.reason.into();
        NetworkEndian::write_u32(&mut buffer[field::DURATION_SEC], self.duration_sec);
        NetworkEndian::write_u32(&mut buffer[field::DURATION_NSEC], self.duration_nsec);
        NetworkEndian::write_u16(&mut buffer[field::IDLE_TIMEOUT], self.idle_timeout);
        NetworkEndian::write_u64(&mut buffer[field::PACKET_COUNT], self.packet_count);
        NetworkEndian::write_u64(&mut buffer[field::BYTE_COUNT], self.byte_count);
        Ok(())
    }
}

mod field13 {
    use field::*;
    pub const COOKIE: Field = 0..8;
    pub const PRIORITY: Field = 8..10;
    pub const REASON: usize = 10;
    pub const TABLE_ID: usize = 11;
    pub const DURATION_SEC: Field = 12..16;
    pub const DURATION_NSEC: Field = 16..20;
    pub const IDLE_TIMEOUT: Field = 20..22;
    pub const HARD_TIMEOUT: Field = 22..24;
    pub const PACKET_COUNT: Field = 24..32;
    pub const BYTE_COUNT: Field = 32..40;
    pub const FLOW_MATCH: Rest = 40..;
}

/// High-level representation of a 1.3 flow removed.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketRepr13 {
    pub cookie: u64,
    pub priority: u16,
    pub reason: Reason,
    pub table_id: u8,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub packet_count: u64,
    pub byte_count: u64,
    pub flow_match: FlowMatch,
}

impl Repr for PacketRepr13 {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field13::FLOW_MATCH.start {
            return Err(Error::Truncated);
        }
        Ok(PacketRepr13 {
            cookie: NetworkEndian::read_u64(&buffer[field13::COOKIE]),
            priority: NetworkEndian::read_u16(&buffer[field13::PRIORITY]),
            reason: Reason::from(buffer[field13::REASON]),
            table_id: buffer[field13::TABLE_ID],
            duration_sec: NetworkEndian::read_u32(&buffer[field13::DURATION_SEC]),
            duration_nsec: NetworkEndian::read_u32(&buffer[field13::DURATION_NSEC]),
            idle_timeout: NetworkEndian::read_u16(&buffer[field13::IDLE_TIMEOUT]),
            hard_timeout: NetworkEndian::read_u16(&buffer[field13::HARD_TIMEOUT]),
            packet_count: NetworkEndian::read_u64(&buffer[field13::PACKET_COUNT]),
            byte_count: NetworkEndian::read_u64(&buffer[field13::BYTE_COUNT]),
            flow_match: FlowMatch::parse(&buffer[field13::FLOW_MATCH])?,
        })
    }

    fn buffer_len(&self) -> usize {
        field13::FLOW_MATCH.start + self.flow_match.buffer_len()
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        NetworkEndian::write_u64(&mut buffer[field13::COOKIE], self.cookie);
        NetworkEndian::write_u16(&mut buffer[field13::PRIORITY], self.priority);
        buffer[field13::REASON] = self.reason.into();
        buffer[field13::TABLE_ID] = self.table_id;
        NetworkEndian::write_u32(&mut buffer[field13::DURATION_SEC], self.duration_sec);
        NetworkEndian::write_u32(&mut buffer[field13::DURATION_NSEC], self.duration_nsec);
        NetworkEndian::write_u16(&mut buffer[field13::IDLE_TIMEOUT], self.idle_timeout);
        NetworkEndian::write_u16(&mut buffer[field13::HARD_TIMEOUT], self.hard_timeout);
        NetworkEndian::write_u64(&mut buffer[field13::PACKET_COUNT], self.packet_count);
        NetworkEndian::write_u64(&mut buffer[field13::BYTE_COUNT], self.byte_count);
        self.flow_match.emit(&mut buffer[field13::FLOW_MATCH])?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Repr;

    #[test]
    fn v10_roundtrip() {
        let repr = PacketRepr {
            flow_match: Match::default(),
            cookie: 1,
            priority: 100,
            reason: Reason::IdleTimeout,
            duration_sec: 5,
            duration_nsec: 0,
            idle_timeout: 5,
            packet_count: 1,
            byte_count: 64,
        };
        assert_eq!(repr.buffer_len(), 80);
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketRepr::parse(&buf).unwrap(), repr);
    }

    #[test]
    fn v13_roundtrip() {
        let repr = PacketRepr13 {
            cookie: 1,
            priority: 100,
            reason: Reason::HardTimeout,
            table_id: 0,
            duration_sec: 3,
            duration_nsec: 500,
            idle_timeout: 0,
            hard_timeout: 3,
            packet_count: 12,
            byte_count: 768,
            flow_match: FlowMatch::default(),
        };
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketRepr13::parse(&buf).unwrap(), repr);
    }
}
