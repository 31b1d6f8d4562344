//! Flow mod payloads.
//!
//! 1.0 layout:
//!
//! ```no_rust
//! +-----------------------------------+
//! |            match (40)             |
//! +--------+--------+--------+--------+
//! |              cookie               |
//! |                                   |
//! +--------+--------+--------+--------+
//! |     command     |  idle timeout   |
//! +--------+--------+--------+--------+
//! |  hard timeout   |    priority     |
//! +--------+--------+--------+--------+
//! |             buffer id             |
//! +--------+--------+--------+--------+
//! |    out port     |      flags      |
//! +--------+--------+--------+--------+
//! |            actions ...            |
//! +--------+--------+--------+--------+
//! ```

use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};
use flow_match::Match;
use oxm::FlowMatch;
use super::actions::{self, Action};
use super::instructions::{self, InstructionSet};

/// The buffer id value meaning "no buffered packet".
pub const NO_BUFFER: u32 = 0xffff_ffff;

enum_with_unknown! {
    /// What a flow mod does to the table
    pub doc enum Command(u16) {
        /// New flow.
        Add = 0,
        /// Modify all matching flows.
        Modify = 1,
        /// Modify entry strictly matching wildcards and priority.
        ModifyStrict = 2,
        /// Delete all matching flows.
        Delete = 3,
        /// Delete entry strictly matching wildcards and priority.
        DeleteStrict = 4
    }
}

/// Send a flow removed message when the flow expires or is deleted.
pub const OFPFF_SEND_FLOW_REM: u16 = 1 << 0;
/// Check for overlapping entries first.
pub const OFPFF_CHECK_OVERLAP: u16 = 1 << 1;

mod field {
    use field::*;
    use flow_match::MATCH_LEN;

    pub const FLOW_MATCH: Field = 0..MATCH_LEN;
    pub const COOKIE: Field = MATCH_LEN..MATCH_LEN + 8;
    pub const COMMAND: Field = MATCH_LEN + 8..MATCH_LEN + 10;
    pub const IDLE_TIMEOUT: Field = MATCH_LEN + 10..MATCH_LEN + 12;
    pub const HARD_TIMEOUT: Field = MATCH_LEN + 12..MATCH_LEN + 14;
    pub const PRIORITY: Field = MATCH_LEN + 14..MATCH_LEN + 16;
    pub const BUFFER_ID: Field = MATCH_LEN + 16..MATCH_LEN + 20;
    pub const OUT_PORT: Field = MATCH_LEN + 20..MATCH_LEN + 22;
    pub const FLAGS: Field = MATCH_LEN + 22..MATCH_LEN + 24;
    pub const ACTIONS: Rest = MATCH_LEN + 24..;
}

/// High-level representation of a 1.0 flow mod.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketRepr {
    pub flow_match: Match,
    pub cookie: u64,
    pub command: Command,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    /// Buffered packet to apply to, or [`NO_BUFFER`](constant.NO_BUFFER.html).
    pub buffer_id: u32,
    /// For delete commands, require matching entries to include this as an
    /// output port.
    pub out_port: u16,
    pub flags: u16,
    pub actions: Vec<Action>,
}

impl Repr for PacketRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field::ACTIONS.start {
            return Err(Error::Truncated);
        }
        Ok(PacketRepr {
            flow_match: Match::parse(&buffer[field::FLOW_MATCH])?,
            cookie: NetworkEndian::read_u64(&buffer[field::COOKIE]),
            command: NetworkEndian::read_u16(&buffer[field::COMMAND]).into(),
            idle_timeout: NetworkEndian::read_u16(&buffer[field::IDLE_TIMEOUT]),
            hard_timeout: NetworkEndian::read_u16(&buffer[field::HARD_TIMEOUT]),
            priority: NetworkEndian::read_u16(&buffer[field::PRIORITY]),
            buffer_id: NetworkEndian::read_u32(&buffer[field::BUFFER_ID]),
            out_port: NetworkEndian::read_u16(&buffer[field::OUT_PORT]),
            flags: NetworkEndian::read_u16(&buffer[field::FLAGS]),
            actions: actions::parse_list(&buffer[field::ACTIONS])?,
        })
    }

    fn buffer_len(&self) -> usize {
        field::ACTIONS.start + actions::list_len(&self.actions)
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        self.flow_match.emit(&mut buffer[field::FLOW_MATCH])?;
        NetworkEndian::write_u64(&mut buffer[field::COOKIE], self.cookie);
        NetworkEndian::write_u16(&mut buffer[field::COMMAND], self.command.into());
        NetworkEndian::write_u16(&mut buffer[field::IDLE_TIMEOUT], self.idle_timeout);
        NetworkEndian::write_u16(&mut buffer[field::HARD_TIMEOUT], self.hard_timeout);
        NetworkEndian::write_u16(&mut buffer[field::PRIORITY], self.priority);
        NetworkEndian::write_u32(&mut buffer[field::BUFFER_ID], self.buffer_id);
        NetworkEndian::write_u16(&mut buffer[field::OUT_PORT], self.out_port);
        NetworkEndian::write_u16(&mut buffer[field::FLAGS], self.flags);
        actions::emit_list(&self.actions, &mut buffer[field::ACTIONS])?;
        Ok(())
    }
}

mod field13 {
    use field::*;
    pub const COOKIE: Field = 0..8;
    pub const COOKIE_MASK: Field = 8..16;
    pub const TABLE_ID: usize = 16;
    pub const COMMAND: usize = 17;
    pub const IDLE_TIMEOUT: Field = 18..20;
    pub const HARD_TIMEOUT: Field = 20..22;
    pub const PRIORITY: Field = 22..24;
    pub const BUFFER_ID: Field = 24..28;
    pub const OUT_PORT: Field = 28..32;
    pub const OUT_GROUP: Field = 32..36;
    pub const FLAGS: Field = 36..38;
    // two pad bytes
    pub const FLOW_MATCH: Rest = 40..;
}

/// High-level representation of a 1.3 flow mod: OXM match, instruction set,
/// and a target table.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketRepr13 {
    pub cookie: u64,
    pub cookie_mask: u64,
    pub table_id: u8,
    pub command: Command,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    pub buffer_id: u32,
    pub out_port: u32,
    pub out_group: u32,
    pub flags: u16,
    pub flow_match: FlowMatch,
    pub instructions: InstructionSet,
}

impl Repr for PacketRepr13 {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field13::FLOW_MATCH.start {
            return Err(Error::Truncated);
        }
        let match_buf = &buffer[field13::FLOW_MATCH];
        let flow_match = FlowMatch::parse(match_buf)?;
        let instructions = instructions::parse_set(&match_buf[flow_match.buffer_len()..])?;
        Ok(PacketRepr13 {
            cookie: NetworkEndian::read_u64(&buffer[field13::COOKIE]),
            cookie_mask: NetworkEndian::read_u64(&buffer[field13::COOKIE_MASK]),
            table_id: buffer[field13::TABLE_ID],
            command: (buffer[field13::COMMAND] as u16).into(),
            idle_timeout: NetworkEndian::read_u16(&buffer[field13::IDLE_TIMEOUT]),
            hard_timeout: NetworkEndian::read_u16(&buffer[field13::HARD_TIMEOUT]),
            priority: NetworkEndian::read_u16(&buffer[field13::PRIORITY]),
            buffer_id: NetworkEndian::read_u32(&buffer[field13::BUFFER_ID]),
            out_port: NetworkEndian::read_u32(&buffer[field13::OUT_PORT]),
            out_group: NetworkEndian::read_u32(&buffer[field13::OUT_GROUP]),
            flags: NetworkEndian::read_u16(&buffer[field13::FLAGS]),
            flow_match,
            instructions,
        })
    }

    fn buffer_len(&self) -> usize {
        field13::FLOW_MATCH.start + self.flow_match.buffer_len()
            + instructions::set_len(&self.instructions)
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..field13::FLOW_MATCH.start].iter_mut() {
            *byte = 0;
        }
        NetworkEndian::write_u64(&mut buffer[field13::COOKIE], self.cookie);
        NetworkEndian::write_u64(&mut buffer[field13::COOKIE_MASK], self.cookie_mask);
        buffer[field13::TABLE_ID] = self.table_id;
        buffer[field13::COMMAND] = u16::from(self.command) as u8;
        NetworkEndian::write_u16(&mut buffer[field13::IDLE_TIMEOUT], self.idle_timeout);
        NetworkEndian::write_u16(&mut buffer[field13::HARD_TIMEOUT], self.hard_timeout);
        NetworkEndian::write_u16(&mut buffer[field13::PRIORITY], self.priority);
        NetworkEndian::write_u32(&mut buffer[field13::BUFFER_ID], self.buffer_id);
        NetworkEndian::write_u32(&mut buffer[field13::OUT_PORT], self.out_port);
        NetworkEndian::write_u32(&mut buffer[field13::OUT_GROUP], self.out_group);
        NetworkEndian::write_u16(&mut buffer[field13::FLAGS], self.flags);
        let match_buf = &mut buffer[field13::FLOW_MATCH];
        self.flow_match.emit(match_buf)?;
        instructions::emit_set(&self.instructions, &mut match_buf[self.flow_match.buffer_len()..])?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Repr;
    use flow_match::OFPFW_DL_DST;
    use oxm::OxmField;
    use packets::actions::Action13;
    use packets::instructions::Instruction;
    use smoltcp::wire::EthernetAddress;

    #[test]
    fn v10_roundtrip() {
        let mut flow_match = Match::default();
        flow_match.exact(OFPFW_DL_DST);
        flow_match.dl_dst = EthernetAddress([0, 1, 2, 3, 4, 5]);
        let repr = PacketRepr {
            flow_match,
            cookie: 42,
            command: Command::Add,
            idle_timeout: 5,
            hard_timeout: 0,
            priority: 100,
            buffer_id: NO_BUFFER,
            out_port: 0xffff,
            flags: OFPFF_CHECK_OVERLAP,
            actions: vec![Action::Output { port: 2, max_len: 0xffff }],
        };
        assert_eq!(repr.buffer_len(), 64 + 8);
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketRepr::parse(&buf).unwrap(), repr);
    }

    #[test]
    fn v13_roundtrip() {
        let repr = PacketRepr13 {
            cookie: 7,
            cookie_mask: 0,
            table_id: 0,
            command: Command::Add,
            idle_timeout: 0,
            hard_timeout: 30,
            priority: 10,
            buffer_id: NO_BUFFER,
            out_port: 0xffff_ffff,
            out_group: 0xffff_ffff,
            flags: 0,
            flow_match: FlowMatch::new(vec![OxmField::InPort(1)]),
            instructions: InstructionSet::new(vec![
                Instruction::WriteActions(vec![Action13::Output { port: 2, max_len: 0xffff }]),
            ]),
        };
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketRepr13::parse(&buf).unwrap(), repr);
    }
}
