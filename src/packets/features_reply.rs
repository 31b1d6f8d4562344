//! Features reply payloads. The 1.0 body carries capability and action
//! bitmaps plus the list of physical ports; the 1.3 body carries an
//! auxiliary connection id and no ports (those moved to port-desc
//! multipart replies).

use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};
use super::phy_port::{PhyPortRepr, PHY_PORT_LEN};

/// Flow statistics capability
pub const CAP_FLOW_STATS: u32 = 1;
/// Table statistics capability.
pub const CAP_TABLE_STATS: u32 = 1 << 1;
/// Port statistics capability.
pub const CAP_PORT_STATS: u32 = 1 << 2;
/// 802.1D spanning tree (1.0) / group statistics (1.3).
pub const CAP_STP: u32 = 1 << 3;
/// Can reassemble IP fragments.
pub const CAP_IP_REASSEMBLY: u32 = 1 << 5;
/// Queue statistics capability.
pub const CAP_QUEUE_STATS: u32 = 1 << 6;
/// Match IP addresses in ARP packets (1.0 only).
pub const CAP_ARP_MATCH_IP: u32 = 1 << 7;

/// High-level representation of a 1.0 features reply.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketRepr {
    /// Datapath unique ID. The lower 48 bits are a MAC address, the upper 16 bits are
    /// implementer-defined.
    pub datapath_id: u64,
    /// Max packets buffered at once.
    pub n_buffers: u32,
    /// Number of tables supported by the datapath.
    pub n_tables: u8,
    /// Bitmap of supported capabilities.
    pub capabilities: u32,
    /// Bitmap of supported actions.
    pub actions: u32,
    /// One entry per data plane port.
    pub ports: Vec<PhyPortRepr>,
}

mod field {
    use field::*;
    pub const DATAPATH_ID: Field = 0..8;
    pub const N_BUFFERS: Field = 8..12;
    pub const N_TABLES: usize = 12;
    // three pad bytes
    pub const CAPABILITIES: Field = 16..20;
    pub const ACTIONS: Field = 20..24;
    pub const PORTS: Rest = 24..;
}

impl Repr for PacketRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field::PORTS.start {
            return Err(Error::Truncated);
        }
        let ports_buf = &buffer[field::PORTS];
        if ports_buf.len() % PHY_PORT_LEN != 0 {
            return Err(Error::Malformed);
        }
        let mut ports = Vec::with_capacity(ports_buf.len() / PHY_PORT_LEN);
        for chunk in ports_buf.chunks(PHY_PORT_LEN) {
            ports.push(PhyPortRepr::parse(chunk)?);
        }
        Ok(PacketRepr {
            datapath_id: NetworkEndian::read_u64(&buffer[field::DATAPATH_ID]),
            n_buffers: NetworkEndian::read_u32(&buffer[field::N_BUFFERS]),
            n_tables: buffer[field::N_TABLES],
            capabilities: NetworkEndian::read_u32(&buffer[field::CAPABILITIES]),
            actions: NetworkEndian::read_u32(&buffer[field::ACTIONS]),
            ports,
        })
    }

    fn buffer_len(&self) -> usize {
        field::PORTS.start + self.ports.len() * PHY_PORT_LEN
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..field::PORTS.start].iter_mut() {
            *byte = 0;
        }
        NetworkEndian::write_u64(&mut buffer[field::DATAPATH_ID], self.datapath_id);
        NetworkEndian::write_u32(&mut buffer[field::N_BUFFERS], self.n_buffers);
        buffer[field::N_TABLES] = self.n_tables;
        NetworkEndian::write_u32(&mut buffer[field::CAPABILITIES], self.capabilities);
        NetworkEndian::write_u32(&mut buffer[field::ACTIONS], self.actions);
        let mut offset = field::PORTS.start;
        for port in &self.ports {
            port.emit(&mut buffer[offset..offset + PHY_PORT_LEN])?;
            offset += PHY_PORT_LEN;
        }
        Ok(())
    }
}

/// High-level representation of a 1.3 features reply.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PacketRepr13 {
    pub datapath_id: u64,
    pub n_buffers: u32,
    pub n_tables: u8,
    /// Identifies auxiliary connections.
    pub auxiliary_id: u8,
    pub capabilities: u32,
    /// Reserved bytes
    pub reserved: u32,
}

mod field13 {
    use field::*;
    pub const DATAPATH_ID: Field = 0..8;
    pub const N_BUFFERS: Field = 8..12;
    pub const N_TABLES: usize = 12;
    pub const AUX_ID: usize = 13;
    // two pad bytes
    pub const CAPABILITIES: Field = 16..20;
    pub const RESERVED: Field = 20..24;
}

impl Repr for PacketRepr13 {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field13::RESERVED.end {
            return Err(Error::Truncated);
        }
        Ok(PacketRepr13 {
            datapath_id: NetworkEndian::read_u64(&buffer[field13::DATAPATH_ID]),
            n_buffers: NetworkEndian::read_u32(&buffer[field13::N_BUFFERS]),
            n_tables: buffer[field13::N_TABLES],
            auxiliary_id: buffer[field13::AUX_ID],
            capabilities: NetworkEndian::read_u32(&buffer[field13::CAPABILITIES]),
            reserved: NetworkEndian::read_u32(&buffer[field13::RESERVED]),
        })
    }

    fn buffer_len(&self) -> usize {
        field13::RESERVED.end
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..self.buffer_len()].iter_mut() {
            *byte = 0;
        }
        NetworkEndian::write_u64(&mut buffer[field13::DATAPATH_ID], self.datapath_id);
        NetworkEndian::write_u32(&mut buffer[field13::N_BUFFERS], self.n_buffers);
        buffer[field13::N_TABLES] = self.n_tables;
        buffer[field13::AUX_ID] = self.auxiliary_id;
        NetworkEndian::write_u32(&mut buffer[field13::CAPABILITIES], self.capabilities);
        NetworkEndian::write_u32(&mut buffer[field13::RESERVED], self.reserved);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Repr;
    use smoltcp::wire::EthernetAddress;

    #[test]
    fn v10_roundtrip() {
        let repr = PacketRepr {
            datapath_id: 0x0000_0200_0000_0001,
            n_buffers: 1_000_000_000,
            n_tables: 1,
            capabilities: CAP_FLOW_STATS | CAP_TABLE_STATS | CAP_PORT_STATS,
            actions: 0x7ff,
            ports: vec![PhyPortRepr {
                port_no: 1,
                hw_addr: EthernetAddress([2, 0, 0, 0, 0, 1]),
                name: "p1".to_string(),
                config: 0,
                state: 0,
                curr: 0,
                advertised: 0,
                supported: 0,
                peer: 0,
            }],
        };
        assert_eq!(repr.buffer_len(), 24 + 48);
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketRepr::parse(&buf).unwrap(), repr);
    }

    #[test]
    fn v13_roundtrip() {
        let repr = PacketRepr13 {
            datapath_id: 1,
            n_buffers: 255,
            n_tables: 64,
            auxiliary_id: 0,
            capabilities: 79,
            reserved: 0,
        };
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketRepr13::parse(&buf).unwrap(), repr);
    }
}
