//! OpenFlow 1.0 statistics request/reply payloads. Both start with a
//! 4 byte header (stats type + flags) followed by a type-specific body.

use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};
use flow_match::{Match, MATCH_LEN};
use super::actions::{self, Action};

const OFPST_DESC: u16 = 0;
const OFPST_FLOW: u16 = 1;
const OFPST_AGGREGATE: u16 = 2;
const OFPST_TABLE: u16 = 3;
const OFPST_PORT: u16 = 4;
const OFPST_QUEUE: u16 = 5;
const OFPST_VENDOR: u16 = 0xffff;

const HEADER_LEN: usize = 4;

const DESC_STR_LEN: usize = 256;
const SERIAL_NUM_LEN: usize = 32;
const TABLE_NAME_LEN: usize = 32;

fn emit_str(value: &str, buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        *byte = 0;
    }
    let bytes = value.as_bytes();
    let n = bytes.len().min(buf.len() - 1);
    buf[..n].copy_from_slice(&bytes[..n]);
}

fn parse_str(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Request body for flow and aggregate stats.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct FlowStatsRequest {
    pub flow_match: Match,
    /// Table to read, or 0xff for all tables.
    pub table_id: u8,
    /// Require this output port, or `OFPP_NONE` to not filter.
    pub out_port: u16,
}

impl FlowStatsRequest {
    const LEN: usize = MATCH_LEN + 4;

    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < Self::LEN {
            return Err(Error::Truncated);
        }
        Ok(FlowStatsRequest {
            flow_match: Match::parse(&buffer[..MATCH_LEN])?,
            table_id: buffer[MATCH_LEN],
            out_port: NetworkEndian::read_u16(&buffer[MATCH_LEN + 2..MATCH_LEN + 4]),
        })
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < Self::LEN {
            return Err(Error::Exhausted);
        }
        self.flow_match.emit(&mut buffer[..MATCH_LEN])?;
        buffer[MATCH_LEN] = self.table_id;
        buffer[MATCH_LEN + 1] = 0;
        NetworkEndian::write_u16(&mut buffer[MATCH_LEN + 2..MATCH_LEN + 4], self.out_port);
        Ok(())
    }
}

/// Statistics request payload.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum RequestRepr {
    Desc,
    Flow(FlowStatsRequest),
    Aggregate(FlowStatsRequest),
    Table,
    Port { port_no: u16 },
    Queue { port_no: u16, queue_id: u32 },
    Vendor { vendor: u32, data: Vec<u8> },
}

impl Repr for RequestRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }
        let kind = NetworkEndian::read_u16(&buffer[0..2]);
        let body = &buffer[HEADER_LEN..];
        Ok(match kind {
            OFPST_DESC => RequestRepr::Desc,
            OFPST_FLOW => RequestRepr::Flow(FlowStatsRequest::parse(body)?),
            OFPST_AGGREGATE => RequestRepr::Aggregate(FlowStatsRequest::parse(body)?),
            OFPST_TABLE => RequestRepr::Table,
            OFPST_PORT => {
                if body.len() < 8 {
                    return Err(Error::Truncated);
                }
                RequestRepr::Port {
                    port_no: NetworkEndian::read_u16(&body[0..2]),
                }
            }
            OFPST_QUEUE => {
                if body.len() < 8 {
                    return Err(Error::Truncated);
                }
                RequestRepr::Queue {
                    port_no: NetworkEndian::read_u16(&body[0..2]),
                    queue_id: NetworkEndian::read_u32(&body[4..8]),
                }
            }
            OFPST_VENDOR => {
                if body.len() < 4 {
                    return Err(Error::Truncated);
                }
                RequestRepr::Vendor {
                    vendor: NetworkEndian::read_u32(&body[0..4]),
                    data: body[4..].to_vec(),
                }
            }
            _ => return Err(Error::Unrecognized),
        })
    }

    fn buffer_len(&self) -> usize {
        HEADER_LEN + match *self {
            RequestRepr::Desc | RequestRepr::Table => 0,
            RequestRepr::Flow(_) | RequestRepr::Aggregate(_) => FlowStatsRequest::LEN,
            RequestRepr::Port { .. } | RequestRepr::Queue { .. } => 8,
            RequestRepr::Vendor { ref data, .. } => 4 + data.len(),
        }
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..self.buffer_len()].iter_mut() {
            *byte = 0;
        }
        let kind = match *self {
            RequestRepr::Desc => OFPST_DESC,
            RequestRepr::Flow(_) => OFPST_FLOW,
            RequestRepr::Aggregate(_) => OFPST_AGGREGATE,
            RequestRepr::Table => OFPST_TABLE,
            RequestRepr::Port { .. } => OFPST_PORT,
            RequestRepr::Queue { .. } => OFPST_QUEUE,
            RequestRepr::Vendor { .. } => OFPST_VENDOR,
        };
        NetworkEndian::write_u16(&mut buffer[0..2], kind);
        let body = &mut buffer[HEADER_LEN..];
        match *self {
            RequestRepr::Desc | RequestRepr::Table => {}
            RequestRepr::Flow(ref req) | RequestRepr::Aggregate(ref req) => req.emit(body)?,
            RequestRepr::Port { port_no } => {
                NetworkEndian::write_u16(&mut body[0..2], port_no);
            }
            RequestRepr::Queue { port_no, queue_id } => {
                NetworkEndian::write_u16(&mut body[0..2], port_no);
                NetworkEndian::write_u32(&mut body[4..8], queue_id);
            }
            RequestRepr::Vendor { vendor, ref data } => {
                NetworkEndian::write_u32(&mut body[0..4], vendor);
                body[4..4 + data.len()].copy_from_slice(data);
            }
        }
        Ok(())
    }
}

/// Body of a desc stats reply: five fixed-width description strings.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct DescStats {
    pub manufacturer: String,
    pub hardware: String,
    pub software: String,
    pub serial_num: String,
    pub datapath: String,
}

impl DescStats {
    pub(crate) const LEN: usize = DESC_STR_LEN * 4 + SERIAL_NUM_LEN;

    pub(crate) fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < Self::LEN {
            return Err(Error::Truncated);
        }
        let serial_end = DESC_STR_LEN * 3 + SERIAL_NUM_LEN;
        Ok(DescStats {
            manufacturer: parse_str(&buffer[0..DESC_STR_LEN]),
            hardware: parse_str(&buffer[DESC_STR_LEN..DESC_STR_LEN * 2]),
            software: parse_str(&buffer[DESC_STR_LEN * 2..DESC_STR_LEN * 3]),
            serial_num: parse_str(&buffer[DESC_STR_LEN * 3..serial_end]),
            datapath: parse_str(&buffer[serial_end..serial_end + DESC_STR_LEN]),
        })
    }

    pub(crate) fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < Self::LEN {
            return Err(Error::Exhausted);
        }
        let serial_end = DESC_STR_LEN * 3 + SERIAL_NUM_LEN;
        emit_str(&self.manufacturer, &mut buffer[0..DESC_STR_LEN]);
        emit_str(&self.hardware, &mut buffer[DESC_STR_LEN..DESC_STR_LEN * 2]);
        emit_str(&self.software, &mut buffer[DESC_STR_LEN * 2..DESC_STR_LEN * 3]);
        emit_str(&self.serial_num, &mut buffer[DESC_STR_LEN * 3..serial_end]);
        emit_str(&self.datapath, &mut buffer[serial_end..serial_end + DESC_STR_LEN]);
        Ok(())
    }
}

/// One flow entry in a flow stats reply.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct FlowStats {
    pub table_id: u8,
    pub flow_match: Match,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub priority: u16,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub cookie: u64,
    pub packet_count: u64,
    pub byte_count: u64,
    pub actions: Vec<Action>,
}

impl FlowStats {
    const FIXED_LEN: usize = 88;

    fn buffer_len(&self) -> usize {
        Self::FIXED_LEN + actions::list_len(&self.actions)
    }

    fn parse(buffer: &[u8]) -> Result<(FlowStats, usize)> {
        if buffer.len() < Self::FIXED_LEN {
            return Err(Error::Truncated);
        }
        let len = NetworkEndian::read_u16(&buffer[0..2]) as usize;
        if len < Self::FIXED_LEN || buffer.len() < len {
            return Err(Error::Malformed);
        }
        Ok((
            FlowStats {
                table_id: buffer[2],
                flow_match: Match::parse(&buffer[4..4 + MATCH_LEN])?,
                duration_sec: NetworkEndian::read_u32(&buffer[44..48]),
                duration_nsec: NetworkEndian::read_u32(&buffer[48..52]),
                priority: NetworkEndian::read_u16(&buffer[52..54]),
                idle_timeout: NetworkEndian::read_u16(&buffer[54..56]),
                hard_timeout: NetworkEndian::read_u16(&buffer[56..58]),
                cookie: NetworkEndian::read_u64(&buffer[64..72]),
                packet_count: NetworkEndian::read_u64(&buffer[72..80]),
                byte_count: NetworkEndian::read_u64(&buffer[80..88]),
                actions: actions::parse_list(&buffer[Self::FIXED_LEN..len])?,
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
        self.flow_match.emit(&mut buffer[4..4 + MATCH_LEN])?;
        NetworkEndian::write_u32(&mut buffer[44..48], self.duration_sec);
        NetworkEndian::write_u32(&mut buffer[48..52], self.duration_nsec);
        NetworkEndian::write_u16(&mut buffer[52..54], self.priority);
        NetworkEndian::write_u16(&mut buffer[54..56], self.idle_timeout);
        NetworkEndian::write_u16(&mut buffer[56..58], self.hard_timeout);
        NetworkEndian::write_u64(&mut buffer[64..72], self.cookie);
        NetworkEndian::write_u64(&mut buffer[72..80], self.packet_count);
        NetworkEndian::write_u64(&mut buffer[80..88], self.byte_count);
        actions::emit_list(&self.actions, &mut buffer[Self::FIXED_LEN..len])
    }
}

/// One table entry in a table stats reply.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TableStats {
    pub table_id: u8,
    pub name: String,
    pub wildcards: u32,
    pub max_entries: u32,
    pub active_count: u32,
    pub lookup_count: u64,
    pub matched_count: u64,
}

impl TableStats {
    const LEN: usize = 64;

    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < Self::LEN {
            return Err(Error::Truncated);
        }
        Ok(TableStats {
            table_id: buffer[0],
            name: parse_str(&buffer[4..4 + TABLE_NAME_LEN]),
            wildcards: NetworkEndian::read_u32(&buffer[36..40]),
            max_entries: NetworkEndian::read_u32(&buffer[40..44]),
            active_count: NetworkEndian::read_u32(&buffer[44..48]),
            lookup_count: NetworkEndian::read_u64(&buffer[48..56]),
            matched_count: NetworkEndian::read_u64(&buffer[56..64]),
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
        emit_str(&self.name, &mut buffer[4..4 + TABLE_NAME_LEN]);
        NetworkEndian::write_u32(&mut buffer[36..40], self.wildcards);
        NetworkEndian::write_u32(&mut buffer[40..44], self.max_entries);
        NetworkEndian::write_u32(&mut buffer[44..48], self.active_count);
        NetworkEndian::write_u64(&mut buffer[48..56], self.lookup_count);
        NetworkEndian::write_u64(&mut buffer[56..64], self.matched_count);
        Ok(())
    }
}

/// One port entry in a port stats reply.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct PortStats {
    pub port_no: u16,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_frame_err: u64,
    pub rx_over_err: u64,
    pub rx_crc_err: u64,
    pub collisions: u64,
}

impl PortStats {
    const LEN: usize = 104;

    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < Self::LEN {
            return Err(Error::Truncated);
        }
        let mut counters = [0u64; 12];
        for (i, counter) in counters.iter_mut().enumerate() {
            *counter = NetworkEndian::read_u64(&buffer[8 + i * 8..16 + i * 8]);
        }
        Ok(PortStats {
            port_no: NetworkEndian::read_u16(&buffer[0..2]),
            rx_packets: counters[0],
            tx_packets: counters[1],
            rx_bytes: counters[2],
            tx_bytes: counters[3],
            rx_dropped: counters[4],
            tx_dropped: counters[5],
            rx_errors: counters[6],
            tx_errors: counters[7],
            rx_frame_err: counters[8],
            rx_over_err: counters[9],
            rx_crc_err: counters[10],
            collisions: counters[11],
        })
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < Self::LEN {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..Self::LEN].iter_mut() {
            *byte = 0;
        }
        NetworkEndian::write_u16(&mut buffer[0..2], self.port_no);
        let counters = [
            self.rx_packets,
            self.tx_packets,
            self.rx_bytes,
            self.tx_bytes,
            self.rx_dropped,
            self.tx_dropped,
            self.rx_errors,
            self.tx_errors,
            self.rx_frame_err,
            self.rx_over_err,
            self.rx_crc_err,
            self.collisions,
        ];
        for (i, counter) in counters.iter().enumerate() {
            NetworkEndian::write_u64(&mut buffer[8 + i * 8..16 + i * 8], *counter);
        }
        Ok(())
    }
}

/// One queue entry in a queue stats reply.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct QueueStats {
    pub port_no: u16,
    pub queue_id: u32,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
}

impl QueueStats {
    const LEN: usize = 32;

    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < Self::LEN {
            return Err(Error::Truncated);
        }
        Ok(QueueStats {
            port_no: NetworkEndian::read_u16(&buffer[0..2]),
            queue_id: NetworkEndian::read_u32(&buffer[4..8]),
            tx_bytes: NetworkEndian::read_u64(&buffer[8..16]),
            tx_packets: NetworkEndian::read_u64(&buffer[16..24]),
            tx_errors: NetworkEndian::read_u64(&buffer[24..32]),
        })
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < Self::LEN {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..Self::LEN].iter_mut() {
            *byte = 0;
        }
        NetworkEndian::write_u16(&mut buffer[0..2], self.port_no);
        NetworkEndian::write_u32(&mut buffer[4..8], self.queue_id);
        NetworkEndian::write_u64(&mut buffer[8..16], self.tx_bytes);
        NetworkEndian::write_u64(&mut buffer[16..24], self.tx_packets);
        NetworkEndian::write_u64(&mut buffer[24..32], self.tx_errors);
        Ok(())
    }
}

/// Statistics reply payload.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ReplyRepr {
    Desc(DescStats),
    Flow(Vec<FlowStats>),
    Aggregate {
        packet_count: u64,
        byte_count: u64,
        flow_count: u32,
    },
    Table(Vec<TableStats>),
    Port(Vec<PortStats>),
    Queue(Vec<QueueStats>),
    Vendor { vendor: u32, data: Vec<u8> },
}

impl Repr for ReplyRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }
        let kind = NetworkEndian::read_u16(&buffer[0..2]);
        let body = &buffer[HEADER_LEN..];
        Ok(match kind {
            OFPST_DESC => ReplyRepr::Desc(DescStats::parse(body)?),
            OFPST_FLOW => {
                let mut entries = Vec::new();
                let mut offset = 0;
                while offset < body.len() {
                    let (entry, len) = FlowStats::parse(&body[offset..])?;
                    entries.push(entry);
                    offset += len;
                }
                ReplyRepr::Flow(entries)
            }
            OFPST_AGGREGATE => {
                if body.len() < 24 {
                    return Err(Error::Truncated);
                }
                ReplyRepr::Aggregate {
                    packet_count: NetworkEndian::read_u64(&body[0..8]),
                    byte_count: NetworkEndian::read_u64(&body[8..16]),
                    flow_count: NetworkEndian::read_u32(&body[16..20]),
                }
            }
            OFPST_TABLE => {
                if body.len() % TableStats::LEN != 0 {
                    return Err(Error::Malformed);
                }
                let mut entries = Vec::new();
                for chunk in body.chunks(TableStats::LEN) {
                    entries.push(TableStats::parse(chunk)?);
                }
                ReplyRepr::Table(entries)
            }
            OFPST_PORT => {
                if body.len() % PortStats::LEN != 0 {
                    return Err(Error::Malformed);
                }
                let mut entries = Vec::new();
                for chunk in body.chunks(PortStats::LEN) {
                    entries.push(PortStats::parse(chunk)?);
                }
                ReplyRepr::Port(entries)
            }
            OFPST_QUEUE => {
                if body.len() % QueueStats::LEN != 0 {
                    return Err(Error::Malformed);
                }
                let mut entries = Vec::new();
                for chunk in body.chunks(QueueStats::LEN) {
                    entries.push(QueueStats::parse(chunk)?);
                }
                ReplyRepr::Queue(entries)
            }
            OFPST_VENDOR => {
                if body.len() < 4 {
                    return Err(Error::Truncated);
                }
                ReplyRepr::Vendor {
                    vendor: NetworkEndian::read_u32(&body[0..4]),
                    data: body[4..].to_vec(),
                }
            }
            _ => return Err(Error::Unrecognized),
        })
    }

    fn buffer_len(&self) -> usize {
        HEADER_LEN + match *self {
            ReplyRepr::Desc(_) => DescStats::LEN,
            ReplyRepr::Flow(ref entries) => {
                entries.iter().fold(0, |acc, e| acc + e.buffer_len())
            }
            ReplyRepr::Aggregate { .. } => 24,
            ReplyRepr::Table(ref entries) => entries.len() * TableStats::LEN,
            ReplyRepr::Port(ref entries) => entries.len() * PortStats::LEN,
            ReplyRepr::Queue(ref entries) => entries.len() * QueueStats::LEN,
            ReplyRepr::Vendor { ref data, .. } => 4 + data.len(),
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
            ReplyRepr::Desc(_) => OFPST_DESC,
            ReplyRepr::Flow(_) => OFPST_FLOW,
            ReplyRepr::Aggregate { .. } => OFPST_AGGREGATE,
            ReplyRepr::Table(_) => OFPST_TABLE,
            ReplyRepr::Port(_) => OFPST_PORT,
            ReplyRepr::Queue(_) => OFPST_QUEUE,
            ReplyRepr::Vendor { .. } => OFPST_VENDOR,
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
                    offset += TableStats::LEN;
                }
            }
            ReplyRepr::Port(ref entries) => {
                let mut offset = 0;
                for entry in entries {
                    entry.emit(&mut body[offset..])?;
                    offset += PortStats::LEN;
                }
            }
            ReplyRepr::Queue(ref entries) => {
                let mut offset = 0;
                for entry in entries {
                    entry.emit(&mut body[offset..])?;
                    offset += QueueStats::LEN;
                }
            }
            ReplyRepr::Vendor { vendor, ref data } => {
                NetworkEndian::write_u32(&mut body[0..4], vendor);
                body[4..4 + data.len()].copy_from_slice(data);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Repr;

    #[test]
    fn desc_roundtrip() {
        let repr = ReplyRepr::Desc(DescStats {
            manufacturer: "ofsim".to_string(),
            hardware: "simulated switch".to_string(),
            software: "0.0.1".to_string(),
            serial_num: "0000001".to_string(),
            datapath: "single table".to_string(),
        });
        assert_eq!(repr.buffer_len(), 4 + 1056);
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(ReplyRepr::parse(&buf).unwrap(), repr);
    }

    #[test]
    fn flow_roundtrip() {
        let repr = ReplyRepr::Flow(vec![FlowStats {
            table_id: 0,
            flow_match: Match::default(),
            duration_sec: 10,
            duration_nsec: 5,
            priority: 100,
            idle_timeout: 0,
            hard_timeout: 0,
            cookie: 3,
            packet_count: 10,
            byte_count: 640,
            actions: vec![Action::Output { port: 2, max_len: 0xffff }],
        }]);
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(ReplyRepr::parse(&buf).unwrap(), repr);
    }

    #[test]
    fn table_roundtrip() {
        let repr = ReplyRepr::Table(vec![TableStats {
            table_id: 0,
            name: "0".to_string(),
            wildcards: 0x3fffff,
            max_entries: 0,
            active_count: 2,
            lookup_count: 17,
            matched_count: 9,
        }]);
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(ReplyRepr::parse(&buf).unwrap(), repr);
    }

    #[test]
    fn request_roundtrip() {
        let repr = RequestRepr::Flow(FlowStatsRequest {
            flow_match: Match::default(),
            table_id: 0xff,
            out_port: 0xffff,
        });
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(RequestRepr::parse(&buf).unwrap(), repr);
    }
}
