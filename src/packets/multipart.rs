//! OpenFlow 1.3 multipart request/reply payloads: an 8 byte header (type,
//! flags, pad) followed by a type-specific body. Only the sub-types the
//! simulated switch answers are recognized.

use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};
use oxm::FlowMatch;
use super::instructions::{self, InstructionSet};
use super::phy_port::{Port13Repr, PORT13_LEN};
use super::stats::DescStats;

const OFPMP_DESC: u16 = 0;
const OFPMP_FLOW: u16 = 1;
const OFPMP_AGGREGATE: u16 = 2;
const OFPMP_TABLE: u16 = 3;
const OFPMP_PORT_STATS: u16 = 4;
const OFPMP_PORT_DESC: u16 = 13;

const HEADER_LEN: usize = 8;

/// Request body for flow and aggregate multipart reads.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct FlowStatsRequest13 {
    /// Table to read, or 0xff for all tables.
    pub table_id: u8,
    pub out_port: u32,
    pub out_group: u32,
    pub cookie: u64,
    pub cookie_mask: u64,
    pub flow_match: FlowMatch,
}

impl FlowStatsRequest13 {
    const FIXED_LEN: usize = 32;

    fn buffer_len(&self) -> usize {
        Self::FIXED_LEN + self.flow_match.buffer_len()
    }

    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < Self::FIXED_LEN {
            return Err(Error::Truncated);
        }
        Ok(FlowStatsRequest13 {
            table_id: buffer[0],
            out_port: NetworkEndian::read_u32(&buffer[4..8]),
            out_group: NetworkEndian::read_u32(&buffer[8..12]),
            cookie: NetworkEndian::read_u64(&buffer[16..24]),
            cookie_mask: NetworkEndian::read_u64(&buffer[24..32]),
            flow_match: FlowMatch::parse(&buffer[Self::FIXED_LEN..])?,
        })
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..Self::FIXED_LEN].iter_mut() {
            *byte = 0;
        }
        buffer[0] = self.table_id;
        NetworkEndian::write_u32(&mut buffer[4..8], self.out_port);
        NetworkEndian::write_u32(&mut buffer[8..12], self.out_group);
        NetworkEndian::write_u64(&mut buffer[16..24], self.cookie);
        NetworkEndian::write_u64(&mut buffer[24..32], self.cookie_mask);
        self.flow_match.emit(&mut buffer[Self::FIXED_LEN..])
    }
}

/// Multipart request payload.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum RequestRepr {
    Desc,
    Flow(FlowStatsRequest13),
    Aggregate(FlowStatsRequest13),
    Table,
    PortStats { port_no: u32 },
    PortDesc,
}

impl Repr for RequestRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }
        let kind = NetworkEndian::read_u16(&buffer[0..2]);
        let body = &buffer[HEADER_LEN..];
        Ok(match kind {
            OFPMP_DESC => RequestRepr::Desc,
            OFPMP_FLOW => RequestRepr::Flow(FlowStatsRequest13::parse(body)?),
            OFPMP_AGGREGATE => RequestRepr::Aggregate(FlowStatsRequest13::parse(body)?),
            OFPMP_TABLE => RequestRepr::Table,
            OFPMP_PORT_STATS => {
                if body.len() < 8 {
                    return Err(Error::Truncated);
                }
                RequestRepr::PortStats {
                    port_no: NetworkEndian::read_u32(&body[0..4]),
                }
            }
            OFPMP_PORT_DESC => RequestRepr::PortDesc,
            _ => return Err(Error::Unrecognized),
        })
    }

    fn buffer_len(&self) -> usize {
        HEADER_LEN + match *self {
            RequestRepr::Desc | RequestRepr::Table | RequestRepr::PortDesc => 0,
            RequestRepr::Flow(ref req) | RequestRepr::Aggregate(ref req) => req.buffer_len(),
            RequestRepr::PortStats { .. } => 8,
        }
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..HEADER_LEN].iter_mut() {
            *byte = 0;
        }
        let kind = match *self {
            RequestRepr::Desc => OFPMP_DESC,
            RequestRepr::Flow(_) => OFPMP_FLOW,
            RequestRepr::Aggregate(_) => OFPMP_AGGREGATE,
            RequestRepr::Table => OFPMP_TABLE,
            RequestRepr::PortStats { .. } => OFPMP_PORT_STATS,
            RequestRepr::PortDesc => OFPMP_PORT_DESC,
        };
        NetworkEndian::write_u16(&mut buffer[0..2], kind);
        let body = &mut buffer[HEADER_LEN..];
        match *self {
            RequestRepr::Desc | RequestRepr::Table | RequestRepr::PortDesc => {}
            RequestRepr::Flow(ref req) | RequestRepr::Aggregate(ref req) => req.emit(body)?,
            RequestRepr::PortStats { port_no } => {
                for byte in body[..8].iter_mut() {
                    *byte = 0;
                }
                NetworkEndian::write_u32(&mut body[0..4], port_no);
            }
        }
        Ok(())
    }
}

/// One flow entry in a 1.3 flow stats reply.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct FlowStats13 {
    pub table_id: u8,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub priority: u16,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub flags: u16,
    pub cookie: u64,
    pub packet_count: u64,
    pub byte_count: u64,
    pub flow_match: FlowMatch,
    pub instructions: InstructionSet,
}

impl FlowStats13 {
    const FIXED_LEN: usize = 48;

    fn buffer_len(&self) -> usize {
        Self::FIXED_LEN + self.flow_match.buffer_len() + instructions::set_len(&self.instructions)
    }

    fn parse(buffer: &[u8]) -> Result<(FlowStats13, usize)> {
        if buffer.len() < Self::FIXED_LEN {
            return Err(Error::Truncated);
        }
        let len = NetworkEndian::read_u16(&buffer[0..2]) as usize;
        if len < Self::FIXED_LEN || buffer.len() < len {
            return Err(Error::Malformed);
        }
        let rest = &buffer[Self::FIXED_LEN..len];
        let flow_match = FlowMatch::parse(rest)?;
        let instructions = instructions::parse_set(&rest[flow_match.buffer_len()..])?;
        Ok((
            FlowStats13 {
                table_id: buffer[2],
                duration_sec: NetworkEndian::read_u32(&buffer[4..8]),
                duration_nsec: NetworkEndian::read_u32(&buffer[8..12]),
                priority: NetworkEndian::read_u16(&buffer[12..14]),
                idle_timeout: NetworkEndian::read_u16(&buffer[14..16]),
                hard_timeout: NetworkEndian::read_u16(&buffer[16..18]),
                flags: NetworkEndian::read_u16(&buffer[18..20]),
                cookie: NetworkEndian::read_u64(&buffer[24..32]),
                packet_count: NetworkEndian::read_u64(&buffer[32..40]),
                byte_count: NetworkEndian::read_u64(&buffer[40..48]),
                flow_match,
                instructions,
            },
            len,
        ))
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        let len = self.buffer_len();
        if buffer.len() < len {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..Self::FIXED_LEN].iter_mut() {
            *byte = 0;
        }
        NetworkEndian::write_u16(&mut buffer[0..2], len as u16);
        buffer[2] = self.table_id;
        NetworkEndian::write_u32(&mut buffer[4..8], self.duration_sec);
        NetworkEndian::write_u32(&mut buffer[8..12], self.duration_nsec);
        NetworkEndian::write_u16(&mut buffer[12..14], self.priority);
        NetworkEndian::write_u16(&mut buffer[14..16], self.idle_timeout);
        NetworkEndian::write_u16(&mut buffer[16..18], self.hard_timeout);
        NetworkEndian::write_u16(&mut buffer[18..20], self.flags);
        NetworkEndian::write_u64(&mut buffer[24..32], self.cookie);
        NetworkEndian::write_u64(&mut buffer[32..40], self.packet_count);
        NetworkEndian::write_u64(&mut buffer[40..48], self.byte_count);
        let rest = &mut buffer[Self::FIXED_LEN..len];
        self.flow_match.emit(rest)?;
        instructions::emit_set(&self.instructions, &mut rest[self.flow_match.buffer_len()..])
    }
}

/// One table entry in a 1.3 table stats reply.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TableStats13 {
    pub table_id: u8,
    pub active_count: u32,
    pub lookup_count: u64,
    pub matched_count: u64,
}

impl TableStats13 {
    const LEN: usize = 24;

    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < Self::LEN {
            return Err(Error::Truncated);
        }
        Ok(TableStats13 {
            table_id: buffer[0],
            active_count: NetworkEndian::read_u32(&buffer[4..8]),
            lookup_count: NetworkEndian::read_u64(&buffer[8..16]),
            matched_count: NetworkEndian::read_u64(&buffer[16..24]),
        })
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < Self::LEN {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..Self::LEN].iter_mut() {
            *byte = 0;
        }
        buffer[0] = self.table_id;
        NetworkEndian::write_u32(&mut buffer[4..8], self.active_count);
        NetworkEndian::write_u64(&mut buffer[8..16], self.lookup_count);
        NetworkEndian::write_u64(&mut buffer[16..24], self.matched_count);
        Ok(())
    }
}

/// One port entry in a 1.3 port stats reply.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct PortStats13 {
    pub port_no: u32,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub duration_sec: u32,
    pub duration_nsec: u32,
}

impl PortStats13 {
    const LEN: usize = 112;

    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < Self::LEN {
            return Err(Error::Truncated);
        }
        Ok(PortStats13 {
            port_no: NetworkEndian::read_u32(&buffer[0..4]),
            rx_packets: NetworkEndian::read_u64(&buffer[8..16]),
            tx_packets: NetworkEndian::read_u64(&buffer[16..24]),
            rx_bytes: NetworkEndian::read_u64(&buffer[24..32]),
            tx_bytes: NetworkEndian::read_u64(&buffer[32..40]),
            rx_dropped: NetworkEndian::read_u64(&buffer[40..48]),
            tx_dropped: NetworkEndian::read_u64(&buffer[48..56]),
            rx_errors: NetworkEndian::read_u64(&buffer[56..64]),
            tx_errors: NetworkEndian::read_u64(&buffer[64..72]),
            duration_sec: NetworkEndian::read_u32(&buffer[104..108]),
            duration_nsec: NetworkEndian::read_u32(&buffer[108..112]),
        })
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < Self::LEN {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..Self::LEN].iter_mut() {
            *byte = 0;
        }
        NetworkEndian::write_u32(&mut buffer[0..4], self.port_no);
        NetworkEndian::write_u64(&mut buffer[8..16], self.rx_packets);
        NetworkEndian::write_u64(&mut buffer[16..24], self.tx_packets);
        NetworkEndian::write_u64(&mut buffer[24..32], self.rx_bytes);
        NetworkEndian::write_u64(&mut buffer[32..40], self.tx_bytes);
        NetworkEndian::write_u64(&mut buffer[40..48], self.rx_dropped);
        NetworkEndian::write_u64(&mut buffer[48..56], self.tx_dropped);
        NetworkEndian::write_u64(&mut buffer[56..64], self.rx_errors);
        NetworkEndian::write_u64(&mut buffer[64..72], self.tx_errors);
        NetworkEndian::write_u32(&mut buffer[104..108], self.duration_sec);
        NetworkEndian::write_u32(&mut buffer[108..112], self.duration_nsec);
        Ok(())
    }
}

/// Multipart reply payload.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ReplyRepr {
    Desc(DescStats),
    Flow(Vec<FlowStats13>),
    Aggregate {
        packet_count: u64,
        byte_count: u64,
        flow_count: u32,
    },
    Table(Vec<TableStats13>),
    PortStats(Vec<PortStats13>),
    PortDesc(Vec<Port13Repr>),
}

impl Repr for ReplyRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }
        let kind = NetworkEndian::read_u16(&buffer[0..2]);
        let body = &buffer[HEADER_LEN..];
        Ok(match kind {
            OFPMP_DESC => ReplyRepr::Desc(DescStats::parse(body)?),
            OFPMP_FLOW => {
                let mut entries = Vec::new();
                let mut offset = 0;
                while offset < body.len() {
                    let (entry, len) = FlowStats13::parse(&body[offset..])?;
                    entries.push(entry);
                    offset += len;
                }
                ReplyRepr::Flow(entries)
            }
            OFPMP_AGGREGATE => {
                if body.len() < 24 {
                    return Err(Error::Truncated);
                }
                ReplyRepr::Aggregate {
                    packet_count: NetworkEndian::read_u64(&body[0..8]),
                    byte_count: NetworkEndian::read_u64(&body[8..16]),
                    flow_count: NetworkEndian::read_u32(&body[16..20]),
                }
            }
            OFPMP_TABLE => {
                if body.len() % TableStats13::LEN != 0 {
                    return Err(Error::Malformed);
                }
                let mut entries = Vec::new();
                for chunk in body.chunks(TableStats13::LEN) {
                    entries.push(TableStats13::parse(chunk)?);
                }
                ReplyRepr::Table(entries)
            }
            OFPMP_PORT_STATS => {
                if body.len() % PortStats13::LEN != 0 {
                    return Err(Error::Malformed);
                }
                let mut entries = Vec::new();
                for chunk in body.chunks(PortStats13::LEN) {
                    entries.push(PortStats13::parse(chunk)?);
                }
                ReplyRepr::PortStats(entries)
            }
            OFPMP_PORT_DESC => {
                if body.len() % PORT13_LEN != 0 {
                    return Err(Error::Malformed);
                }
                let mut entries = Vec::new();
                for chunk in body.chunks(PORT13_LEN) {
                    entries.push(Port13Repr::parse(chunk)?);
                }
                ReplyRepr::PortDesc(entries)
            }
            _ => return Err(Error::Unrecognized),
        })
    }

    fn buffer_len(&self) -> usize {
        HEADER_LEN + match *self {
            ReplyRepr::Desc(_) => DescStats::LEN,
            ReplyRepr::Flow(ref entries) => entries.iter().fold(0, |acc, e| acc + e.buffer_len()),
            ReplyRepr::Aggregate { .. } => 24,
            ReplyRepr::Table(ref entries) => entries.len() * TableStats13::LEN,
            ReplyRepr::PortStats(ref entries) => entries.len() * PortStats13::LEN,
            ReplyRepr::PortDesc(ref entries) => entries.len() * PORT13_LEN,
        }
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..HEADER_LEN].iter_mut() {
            *byte = 0;
        }
        let kind = match *self {
            ReplyRepr::Desc(_) => OFPMP_DESC,
            ReplyRepr::Flow(_) => OFPMP_FLOW,
            ReplyRepr::Aggregate { .. } => OFPMP_AGGREGATE,
            ReplyRepr::Table(_) => OFPMP_TABLE,
            ReplyRepr::PortStats(_) => OFPMP_PORT_STATS,
            ReplyRepr::PortDesc(_) => OFPMP_PORT_DESC,
        };
        NetworkEndian::write_u16(&mut buffer[0..2], kind);
        let body = &mut buffer[HEADER_LEN..];
        match *self {
            ReplyRepr::Desc(ref desc) => desc.emit(body)?,
            ReplyRepr::Flow(ref entries) => {
                let mut offset = 0;
                for entry in entries {
                    entry.emit(&mut body[offset..])?;
                    offset += entry.buffer_len();
                }
            }
            ReplyRepr::Aggregate {
                packet_count,
                byte_count,
                flow_count,
            } => {
                for byte in body[..24].iter_mut() {
                    *byte = 0;
                }
                NetworkEndian::write_u64(&mut body[0..8], packet_count);
                NetworkEndian::write_u64(&mut body[8..16], byte_count);
                NetworkEndian::write_u32(&mut body[16..20], flow_count);
            }
            ReplyRepr::Table(ref entries) => {
                let mut offset = 0;
                for entry in entries {
                    entry.emit(&mut body[offset..])?;
                    offset += TableStats13::LEN;
                }
            }
            ReplyRepr::PortStats(ref entries) => {
                let mut offset = 0;
                for entry in entries {
                    entry.emit(&mut body[offset..])?;
                    offset += PortStats13::LEN;
                }
            }
            ReplyRepr::PortDesc(ref entries) => {
                let mut offset = 0;
                for entry in entries {
                    entry.emit(&mut body[offset..offset + PORT13_LEN])?;
                    offset += PORT13_LEN;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Repr;
    use oxm::OxmField;
    use packets::actions::Action13;
    use packets::instructions::Instruction;

    #[test]
    fn flow_roundtrip() {
        let repr = ReplyRepr::Flow(vec![FlowStats13 {
            table_id: 0,
            duration_sec: 1,
            duration_nsec: 2,
            priority: 100,
            idle_timeout: 0,
            hard_timeout: 0,
            flags: 0,
            cookie: 9,
            packet_count: 4,
            byte_count: 256,
            flow_match: FlowMatch::new(vec![OxmField::InPort(1)]),
            instructions: InstructionSet::new(vec![Instruction::WriteActions(vec![
                Action13::Output { port: 2, max_len: 0xffff },
            ])]),
        }]);
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(ReplyRepr::parse(&buf).unwrap(), repr);
    }

    #[test]
    fn port_desc_roundtrip() {
        use smoltcp::wire::EthernetAddress;
        let repr = ReplyRepr::PortDesc(vec![Port13Repr {
            port_no: 1,
            hw_addr: EthernetAddress([2, 0, 0, 0, 0, 1]),
            name: "p1".to_string(),
            config: 0,
            state: 0,
            curr: 0,
            advertised: 0,
            supported: 0,
            peer: 0,
            curr_speed: 0,
            max_speed: 0,
        }]);
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(ReplyRepr::parse(&buf).unwrap(), repr);
    }

    #[test]
    fn request_roundtrip() {
        let repr = RequestRepr::Flow(FlowStatsRequest13 {
            table_id: 0xff,
            out_port: 0xffff_ffff,
            out_group: 0xffff_ffff,
            cookie: 0,
            cookie_mask: 0,
            flow_match: FlowMatch::default(),
        });
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(RequestRepr::parse(&buf).unwrap(), repr);
    }
}
