//! Port description structures: the 48 byte 1.0 `ofp_phy_port` carried in
//! features replies and port status messages, and the 64 byte 1.3
//! `ofp_port` carried in port-desc multipart replies.

use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};
use smoltcp::wire::EthernetAddress;

/// Port is administratively down.
pub const OFPPC_PORT_DOWN: u32 = 1 << 0;
/// Disable 802.1D spanning tree on this port.
pub const OFPPC_NO_STP: u32 = 1 << 1;
/// Drop all packets received by this port.
pub const OFPPC_NO_RECV: u32 = 1 << 2;
/// Drop received 802.1D STP packets.
pub const OFPPC_NO_RECV_STP: u32 = 1 << 3;
/// Do not include this port when flooding.
pub const OFPPC_NO_FLOOD: u32 = 1 << 4;
/// Drop packets forwarded to this port.
pub const OFPPC_NO_FWD: u32 = 1 << 5;
/// Do not send packet-in messages for this port.
pub const OFPPC_NO_PACKET_IN: u32 = 1 << 6;

/// No physical link present.
pub const OFPPS_LINK_DOWN: u32 = 1 << 0;

/// 10 Mb full-duplex rate support.
pub const OFPPF_10MB_FD: u32 = 1 << 1;
/// 100 Mb full-duplex rate support.
pub const OFPPF_100MB_FD: u32 = 1 << 3;
/// 1 Gb full-duplex rate support.
pub const OFPPF_1GB_FD: u32 = 1 << 5;
/// 10 Gb full-duplex rate support.
pub const OFPPF_10GB_FD: u32 = 1 << 6;

pub const PHY_PORT_LEN: usize = 48;
pub const PORT13_LEN: usize = 64;

const NAME_LEN: usize = 16;

fn emit_name(name: &str, buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        *byte = 0;
    }
    let bytes = name.as_bytes();
    let n = bytes.len().min(NAME_LEN - 1);
    buf[..n].copy_from_slice(&bytes[..n]);
}

fn parse_name(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// High-level representation of a 1.0 `ofp_phy_port`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PhyPortRepr {
    pub port_no: u16,
    pub hw_addr: EthernetAddress,
    pub name: String,
    pub config: u32,
    pub state: u32,
    pub curr: u32,
    pub advertised: u32,
    pub supported: u32,
    pub peer: u32,
}

mod field {
    use field::*;
    pub const PORT_NO: Field = 0..2;
    pub const HW_ADDR: Field = 2..8;
    pub const NAME: Field = 8..24;
    pub const CONFIG: Field = 24..28;
    pub const STATE: Field = 28..32;
    pub const CURR: Field = 32..36;
    pub const ADVERTISED: Field = 36..40;
    pub const SUPPORTED: Field = 40..44;
    pub const PEER: Field = 44..48;
}

impl Repr for PhyPortRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < PHY_PORT_LEN {
            return Err(Error::Truncated);
        }
        Ok(PhyPortRepr {
            port_no: NetworkEndian::read_u16(&buffer[field::PORT_NO]),
            hw_addr: EthernetAddress::from_bytes(&buffer[field::HW_ADDR]),
            name: parse_name(&buffer[field::NAME]),
            config: NetworkEndian::read_u32(&buffer[field::CONFIG]),
            state: NetworkEndian::read_u32(&buffer[field::STATE]),
            curr: NetworkEndian::read_u32(&buffer[field::CURR]),
            advertised: NetworkEndian::read_u32(&buffer[field::ADVERTISED]),
            supported: NetworkEndian::read_u32(&buffer[field::SUPPORTED]),
            peer: NetworkEndian::read_u32(&buffer[field::PEER]),
        })
    }

    fn buffer_len(&self) -> usize {
        PHY_PORT_LEN
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < PHY_PORT_LEN {
            return Err(Error::Exhausted);
        }
        NetworkEndian::write_u16(&mut buffer[field::PORT_NO], self.port_no);
        buffer[field::HW_ADDR].copy_from_slice(self.hw_addr.as_bytes());
        emit_name(&self.name, &mut buffer[field::NAME]);
        NetworkEndian::write_u32(&mut buffer[field::CONFIG], self.config);
        NetworkEndian::write_u32(&mut buffer[field::STATE], self.state);
        NetworkEndian::write_u32(&mut buffer[field::CURR], self.curr);
        NetworkEndian::write_u32(&mut buffer[field::ADVERTISED], self.advertised);
        NetworkEndian::write_u32(&mut buffer[field::SUPPORTED], self.supported);
        NetworkEndian::write_u32(&mut buffer[field::PEER], self.peer);
        Ok(())
    }
}

/// High-level representation of a 1.3 `ofp_port`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Port13Repr {
    pub port_no: u32,
    pub hw_addr: EthernetAddress,
    pub name: String,
    pub config: u32,
    pub state: u32,
    pub curr: u32,
    pub advertised: u32,
    pub supported: u32,
    pub peer: u32,
    pub curr_speed: u32,
    pub max_speed: u32,
}

mod field13 {
    use field::*;
    pub const PORT_NO: Field = 0..4;
    // four pad bytes
    pub const HW_ADDR: Field = 8..14;
    // two pad bytes
    pub const NAME: Field = 16..32;
    pub const CONFIG: Field = 32..36;
    pub const STATE: Field = 36..40;
    pub const CURR: Field = 40..44;
    pub const ADVERTISED: Field = 44..48;
    pub const SUPPORTED: Field = 48..52;
    pub const PEER: Field = 52..56;
    pub const CURR_SPEED: Field = 56..60;
    pub const MAX_SPEED: Field = 60..64;
}

impl Repr for Port13Repr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < PORT13_LEN {
            return Err(Error::Truncated);
        }
        Ok(Port13Repr {
            port_no: NetworkEndian::read_u32(&buffer[field13::PORT_NO]),
            hw_addr: EthernetAddress::from_bytes(&buffer[field13::HW_ADDR]),
            name: parse_name(&buffer[field13::NAME]),
            config: NetworkEndian::read_u32(&buffer[field13::CONFIG]),
            state: NetworkEndian::read_u32(&buffer[field13::STATE]),
            curr: NetworkEndian::read_u32(&buffer[field13::CURR]),
            advertised: NetworkEndian::read_u32(&buffer[field13::ADVERTISED]),
            supported: NetworkEndian::read_u32(&buffer[field13::SUPPORTED]),
            peer: NetworkEndian::read_u32(&buffer[field13::PEER]),
            curr_speed: NetworkEndian::read_u32(&buffer[field13::CURR_SPEED]),
            max_speed: NetworkEndian::read_u32(&buffer[field13::MAX_SPEED]),
        })
    }

    fn buffer_len(&self) -> usize {
        PORT13_LEN
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < PORT13_LEN {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..PORT13_LEN].iter_mut() {
            *byte = 0;
        }
        NetworkEndian::write_u32(&mut buffer[field13::PORT_NO], self.port_no);
        buffer[field13::HW_ADDR].copy_from_slice(self.hw_addr.as_bytes());
        emit_name(&self.name, &mut buffer[field13::NAME]);
        NetworkEndian::write_u32(&mut buffer[field13::CONFIG], self.config);
        NetworkEndian::write_u32(&mut buffer[field13::STATE], self.state);
        NetworkEndian::write_u32(&mut buffer[field13::CURR], self.curr);
        NetworkEndian::write_u32(&mut buffer[field13::ADVERTISED], self.advertised);
        NetworkEndian::write_u32(&mut buffer[field13::SUPPORTED], self.supported);
        NetworkEndian::write_u32(&mut buffer[field13::PEER], self.peer);
        NetworkEndian::write_u32(&mut buffer[field13::CURR_SPEED], self.curr_speed);
        NetworkEndian::write_u32(&mut buffer[field13::MAX_SPEED], self.max_speed);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Repr;

    #[test]
    fn phy_port_roundtrip() {
        let port = PhyPortRepr {
            port_no: 1,
            hw_addr: EthernetAddress([2, 0, 0, 0, 0, 1]),
            name: "sw0-p1".to_string(),
            config: OFPPC_NO_FLOOD,
            state: 0,
            curr: OFPPF_100MB_FD,
            advertised: OFPPF_100MB_FD,
            supported: OFPPF_100MB_FD,
            peer: OFPPF_100MB_FD,
        };
        let mut buf = vec![0xff; port.buffer_len()];
        port.emit(&mut buf).unwrap();
        assert_eq!(PhyPortRepr::parse(&buf).unwrap(), port);
    }

    #[test]
    fn port13_roundtrip() {
        let port = Port13Repr {
            port_no: 42,
            hw_addr: EthernetAddress([2, 0, 0, 0, 0, 7]),
            name: "sw1-p42".to_string(),
            config: 0,
            state: OFPPS_LINK_DOWN,
            curr: OFPPF_1GB_FD,
            advertised: OFPPF_1GB_FD,
            supported: OFPPF_1GB_FD,
            peer: 0,
            curr_speed: 1_000_000,
            max_speed: 1_000_000,
        };
        let mut buf = vec![0xff; port.buffer_len()];
        port.emit(&mut buf).unwrap();
        assert_eq!(Port13Repr::parse(&buf).unwrap(), port);
    }
}
