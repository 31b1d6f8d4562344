//! Packet out payloads.
//!
//! 1.0 layout:
//!
//! ```no_rust
//!  0      7        15       23       31
//! +--------+--------+--------+--------+
//! |             buffer id             |
//! +--------+--------+--------+--------+
//! |     in port     |   actions len   |
//! +--------+--------+--------+--------+
//! |   actions ...   |    data ...     |
//! +--------+--------+--------+--------+
//! ```
//!
//! When `buffer_id` is all-ones the frame is carried in `data`; otherwise
//! it refers to a packet buffered on the switch by an earlier packet in.

use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};
use super::actions::{self, Action, Action13};

mod field {
    use field::*;
    pub const BUFFER_ID: Field = 0..4;
    pub const IN_PORT: Field = 4..6;
    pub const ACTIONS_LEN: Field = 6..8;
    pub const ACTIONS: Rest = 8..;
}

/// High-level representation of a 1.0 packet out.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketRepr {
    pub buffer_id: u32,
    pub in_port: u16,
    pub actions: Vec<Action>,
    pub data: Vec<u8>,
}

impl Repr for PacketRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field::ACTIONS.start {
            return Err(Error::Truncated);
        }
        let actions_len = NetworkEndian::read_u16(&buffer[field::ACTIONS_LEN]) as usize;
        let rest = &buffer[field::ACTIONS];
        if rest.len() < actions_len {
            return Err(Error::Malformed);
        }
        Ok(PacketRepr {
            buffer_id: NetworkEndian::read_u32(&buffer[field::BUFFER_ID]),
            in_port: NetworkEndian::read_u16(&buffer[field::IN_PORT]),
            actions: actions::parse_list(&rest[..actions_len])?,
            data: rest[actions_len..].to_vec(),
        })
    }

    fn buffer_len(&self) -> usize {
        field::ACTIONS.start + actions::list_len(&self.actions) + self.data.len()
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        let actions_len = actions::list_len(&self.actions);
        NetworkEndian::write_u32(&mut buffer[field::BUFFER_ID], self.buffer_id);
        NetworkEndian::write_u16(&mut buffer[field::IN_PORT], self.in_port);
        NetworkEndian::write_u16(&mut buffer[field::ACTIONS_LEN], actions_len as u16);
        let rest = &mut buffer[field::ACTIONS];
        actions::emit_list(&self.actions, &mut rest[..actions_len])?;
        rest[actions_len..actions_len + self.data.len()].copy_from_slice(&self.data);
        Ok(())
    }
}

mod field13 {
    use field::*;
    pub const BUFFER_ID: Field = 0..4;
    pub const IN_PORT: Field = 4..8;
    pub const ACTIONS_LEN: Field = 8..10;
    // six pad bytes
    pub const ACTIONS: Rest = 16..;
}

/// High-level representation of a 1.3 packet out.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketRepr13 {
    pub buffer_id: u32,
    pub in_port: u32,
    pub actions: Vec<Action13>,
    pub data: Vec<u8>,
}

impl Repr for PacketRepr13 {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field13::ACTIONS.start {
            return Err(Error::Truncated);
        }
        let actions_len = NetworkEndian::read_u16(&buffer[field13::ACTIONS_LEN]) as usize;
        let rest = &buffer[field13::ACTIONS];
        if rest.len() < actions_len {
            return Err(Error::Malformed);
        }
        Ok(PacketRepr13 {
            buffer_id: NetworkEndian::read_u32(&buffer[field13::BUFFER_ID]),
            in_port: NetworkEndian::read_u32(&buffer[field13::IN_PORT]),
            actions: actions::parse_list13(&rest[..actions_len])?,
            data: rest[actions_len..].to_vec(),
        })
    }

    fn buffer_len(&self) -> usize {
        field13::ACTIONS.start + actions::list_len13(&self.actions) + self.data.len()
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..field13::ACTIONS.start].iter_mut() {
            *byte = 0;
        }
        let actions_len = actions::list_len13(&self.actions);
        NetworkEndian::write_u32(&mut buffer[field13::BUFFER_ID], self.buffer_id);
        NetworkEndian::write_u32(&mut buffer[field13::IN_PORT], self.in_port);
        NetworkEndian::write_u16(&mut buffer[field13::ACTIONS_LEN], actions_len as u16);
        let rest = &mut buffer[field13::ACTIONS];
        actions::emit_list13(&self.actions, &mut rest[..actions_len])?;
        rest[actions_len..actions_len + self.data.len()].copy_from_slice(&self.data);
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
            buffer_id: 0xffff_ffff,
            in_port: 1,
            actions: vec![Action::Output { port: 0xfffb, max_len: 0xffff }],
            data: vec![1, 2, 3],
        };
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketRepr::parse(&buf).unwrap(), repr);
    }

    #[test]
    fn v13_roundtrip() {
        let repr = PacketRepr13 {
            buffer_id: 77,
            in_port: 1,
            actions: vec![Action13::Output { port: 2, max_len: 0xffff }],
            data: vec![],
        };
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketRepr13::parse(&buf).unwrap(), repr);
    }
}
