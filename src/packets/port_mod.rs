//! Port mod payload (1.0): the controller rewrites the config bits the
//! mask selects and leaves the rest alone.

use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};
use smoltcp::wire::EthernetAddress;

mod field {
    use field::*;
    pub const PORT_NO: Field = 0..2;
    pub const HW_ADDR: Field = 2..8;
    pub const CONFIG: Field = 8..12;
    pub const MASK: Field = 12..16;
    pub const ADVERTISE: Field = 16..20;
    // four pad bytes
    pub const END: usize = 24;
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketRepr {
    pub port_no: u16,
    /// Must match the port's hardware address; a stale value means the
    /// request raced a port change.
    pub hw_addr: EthernetAddress,
    pub config: u32,
    /// Bits of `config` the switch applies; zero bits keep their old value.
    pub mask: u32,
    pub advertise: u32,
}

impl Repr for PacketRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field::END {
            return Err(Error::Truncated);
        }
        Ok(PacketRepr {
            port_no: NetworkEndian::read_u16(&buffer[field::PORT_NO]),
            hw_addr: EthernetAddress::from_bytes(&buffer[field::HW_ADDR]),
            config: NetworkEndian::read_u32(&buffer[field::CONFIG]),
            mask: NetworkEndian::read_u32(&buffer[field::MASK]),
            advertise: NetworkEndian::read_u32(&buffer[field::ADVERTISE]),
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
        NetworkEndian::write_u16(&mut buffer[field::PORT_NO], self.port_no);
        buffer[field::HW_ADDR].copy_from_slice(self.hw_addr.as_bytes());
        NetworkEndian::write_u32(&mut buffer[field::CONFIG], self.config);
        NetworkEndian::write_u32(&mut buffer[field::MASK], self.mask);
        NetworkEndian::write_u32(&mut buffer[field::ADVERTISE], self.advertise);
        Ok(())
    }
}

mod field13 {
    use field::*;
    pub const PORT_NO: Field = 0..4;
    // four pad bytes
    pub const HW_ADDR: Field = 8..14;
    // two pad bytes
    pub const CONFIG: Field = 16..20;
    pub const MASK: Field = 20..24;
    pub const ADVERTISE: Field = 24..28;
    // four pad bytes
    pub const END: usize = 32;
}

/// The 1.3 layout widens the port number to 32 bits.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketRepr13 {
    pub port_no: u32,
    pub hw_addr: EthernetAddress,
    pub config: u32,
    pub mask: u32,
    pub advertise: u32,
}

impl Repr for PacketRepr13 {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field13::END {
            return Err(Error::Truncated);
        }
        Ok(PacketRepr13 {
            port_no: NetworkEndian::read_u32(&buffer[field13::PORT_NO]),
            hw_addr: EthernetAddress::from_bytes(&buffer[field13::HW_ADDR]),
            config: NetworkEndian::read_u32(&buffer[field13::CONFIG]),
            mask: NetworkEndian::read_u32(&buffer[field13::MASK]),
            advertise: NetworkEndian::read_u32(&buffer[field13::ADVERTISE]),
        })
    }

    fn buffer_len(&self) -> usize {
        field13::END
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..field13::END].iter_mut() {
            *byte = 0;
        }
        NetworkEndian::write_u32(&mut buffer[field13::PORT_NO], self.port_no);
        buffer[field13::HW_ADDR].copy_from_slice(self.hw_addr.as_bytes());
        NetworkEndian::write_u32(&mut buffer[field13::CONFIG], self.config);
        NetworkEndian::write_u32(&mut buffer[field13::MASK], self.mask);
        NetworkEndian::write_u32(&mut buffer[field13::ADVERTISE], self.advertise);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Repr;
    use packets::phy_port::OFPPC_NO_FLOOD;

    #[test]
    fn roundtrip() {
        let repr = PacketRepr {
            port_no: 1,
            hw_addr: EthernetAddress([2, 0, 0, 0, 0, 1]),
            config: OFPPC_NO_FLOOD,
            mask: OFPPC_NO_FLOOD,
            advertise: 0,
        };
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketRepr::parse(&buf).unwrap(), repr);
    }

    #[test]
    fn roundtrip13() {
        let repr = PacketRepr13 {
            port_no: 3,
            hw_addr: EthernetAddress([2, 0, 0, 0, 0, 3]),
            config: OFPPC_NO_FLOOD,
            mask: OFPPC_NO_FLOOD,
            advertise: 0,
        };
        assert_eq!(repr.buffer_len(), 32);
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketRepr13::parse(&buf).unwrap(), repr);
    }
}
