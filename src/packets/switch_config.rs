//! Switch configuration payload, shared by `GetConfigReply` and
//! `SetConfig`:
//!
//! ```no_rust
//! +--------+--------+--------+--------+
//! |      flags      |  miss send len  |
//! +--------+--------+--------+--------+
//! ```

use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};

enum_with_unknown! {
    /// Handling of IP fragments
    pub doc enum Flags(u16) {
        /// No special handling for fragments.
        FragmentNormal = 0,
        /// Drop fragments.
        FragmentDrop = 1,
        /// Reassemble (only if OFPC_IP_REASM supported).
        FragmentReassemble = 2
    }
}

mod field {
    use field::*;
    pub const FLAGS: Field = 0..2;
    pub const MISS_SEND_LEN: Field = 2..4;
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PacketRepr {
    pub flags: Flags,
    /// How many bytes of a packet the switch sends to the controller in a
    /// packet-in for a buffered packet.
    pub miss_send_len: u16,
}

impl Repr for PacketRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field::MISS_SEND_LEN.end {
            return Err(Error::Truncated);
        }
        Ok(PacketRepr {
            flags: NetworkEndian::read_u16(&buffer[field::FLAGS]).into(),
            miss_send_len: NetworkEndian::read_u16(&buffer[field::MISS_SEND_LEN]),
        })
    }

    fn buffer_len(&self) -> usize {
        field::MISS_SEND_LEN.end
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        NetworkEndian::write_u16(&mut buffer[field::FLAGS], self.flags.into());
        NetworkEndian::write_u16(&mut buffer[field::MISS_SEND_LEN], self.miss_send_len);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Repr;

    #[test]
    fn roundtrip() {
        let repr = PacketRepr {
            flags: Flags::FragmentNormal,
            miss_send_len: 128,
        };
        let mut buf = [0xff; 4];
        repr.emit(&mut buf).unwrap();
        assert_eq!(&buf, &[0x00, 0x00, 0x00, 0x80]);
        assert_eq!(PacketRepr::parse(&buf).unwrap(), repr);
    }
}
