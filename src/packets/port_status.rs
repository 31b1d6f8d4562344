//! Port status payload: a reason and the full description of the port that
//! changed.

use {Error, Repr, Result};
use super::phy_port::{PhyPortRepr, PHY_PORT_LEN};

enum_with_unknown! {
    /// What happened to the port
    pub doc enum Reason(u8) {
        /// The port was added.
        Add = 0,
        /// The port was removed.
        Delete = 1,
        /// Some attribute of the port changed.
        Modify = 2
    }
}

const PAD_LEN: usize = 7;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketRepr {
    pub reason: Reason,
    pub port: PhyPortRepr,
}

impl Repr for PacketRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < 1 + PAD_LEN + PHY_PORT_LEN {
            return Err(Error::Truncated);
        }
        Ok(PacketRepr {
            reason: Reason::from(buffer[0]),
            port: PhyPortRepr::parse(&buffer[1 + PAD_LEN..])?,
        })
    }

    fn buffer_len(&self) -> usize {
        1 + PAD_LEN + PHY_PORT_LEN
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        buffer[0] = self.reason.into();
        for byte in buffer[1..1 + PAD_LEN].iter_mut() {
            *byte = 0;
        }
        self.port.emit(&mut buffer[1 + PAD_LEN..])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Repr;
    use smoltcp::wire::EthernetAddress;

    #[test]
    fn roundtrip() {
        let repr = PacketRepr {
            reason: Reason::Modify,
            port: PhyPortRepr {
                port_no: 2,
                hw_addr: EthernetAddress([2, 0, 0, 0, 0, 2]),
                name: "p2".to_string(),
                config: 0,
                state: 0,
                curr: 0,
                advertised: 0,
                supported: 0,
                peer: 0,
            },
        };
        assert_eq!(repr.buffer_len(), 56);
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketRepr::parse(&buf).unwrap(), repr);
    }
}
