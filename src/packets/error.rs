//! Types representing OpenFlow Error messages.
//!
//! ```no_rust
//! +--------+--------+--------+--------+
//! |      type       |      code       |
//! +--------+--------+--------+--------+
//! |            data ...               |
//! +--------+--------+--------+--------+
//! ```
//!
//! The numeric error types differ between protocol versions, so the
//! representation keeps them raw and version-specific constants give them
//! names.

use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};
use packets::openflow::Version;

/// OpenFlow 1.0 error types and codes.
pub mod v10 {
    /// Hello protocol failed
    pub const HELLO_FAILED: u16 = 0;
    /// Request was not understood
    pub const BAD_REQUEST: u16 = 1;
    /// Error in action description
    pub const BAD_ACTION: u16 = 2;
    /// Problem modifying flow entry
    pub const FLOW_MOD_FAILED: u16 = 3;
    /// Port mod request failed
    pub const PORT_MOD_FAILED: u16 = 4;
    /// Queue operation failed
    pub const QUEUE_OP_FAILED: u16 = 5;

    /// No compatible version
    pub const HELLO_FAILED_INCOMPATIBLE: u16 = 0;
    /// Flow not added because of an overlapping entry
    pub const FLOW_MOD_FAILED_OVERLAP: u16 = 1;
}

/// OpenFlow 1.3 error types and codes.
pub mod v13 {
    /// Hello protocol failed
    pub const HELLO_FAILED: u16 = 0;
    /// Request was not understood
    pub const BAD_REQUEST: u16 = 1;
    /// Error in action description
    pub const BAD_ACTION: u16 = 2;
    /// Error in instruction list
    pub const BAD_INSTRUCTION: u16 = 3;
    /// Error in match
    pub const BAD_MATCH: u16 = 4;
    /// Problem modifying flow entry
    pub const FLOW_MOD_FAILED: u16 = 5;
    /// Problem modifying group entry
    pub const GROUP_MOD_FAILED: u16 = 6;
    /// Port mod request failed
    pub const PORT_MOD_FAILED: u16 = 7;

    /// No compatible version
    pub const HELLO_FAILED_INCOMPATIBLE: u16 = 0;
    /// Flow not added because of an overlapping entry
    pub const FLOW_MOD_FAILED_OVERLAP: u16 = 3;
    /// Group not added because a group with that id already exists
    pub const GROUP_MOD_FAILED_GROUP_EXISTS: u16 = 0;
}

mod field {
    use field::*;
    pub const KIND: Field = 0..2;
    pub const CODE: Field = 2..4;
    pub const DATA: Rest = 4..;
}

/// An error message payload: a type, a type-specific code, and at least 64
/// bytes of the offending request.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketRepr {
    pub kind: u16,
    pub code: u16,
    pub data: Vec<u8>,
}

impl PacketRepr {
    /// `Error(HELLO_FAILED, INCOMPATIBLE)` for the given version.
    pub fn hello_failed_incompatible(version: Version) -> Self {
        let (kind, code) = match version {
            Version::OpenFlow1Dot3 => (v13::HELLO_FAILED, v13::HELLO_FAILED_INCOMPATIBLE),
            _ => (v10::HELLO_FAILED, v10::HELLO_FAILED_INCOMPATIBLE),
        };
        PacketRepr { kind, code, data: Vec::new() }
    }

    /// `Error(FLOW_MOD_FAILED, OVERLAP)` for the given version.
    pub fn flow_mod_failed_overlap(version: Version) -> Self {
        let (kind, code) = match version {
            Version::OpenFlow1Dot3 => (v13::FLOW_MOD_FAILED, v13::FLOW_MOD_FAILED_OVERLAP),
            _ => (v10::FLOW_MOD_FAILED, v10::FLOW_MOD_FAILED_OVERLAP),
        };
        PacketRepr { kind, code, data: Vec::new() }
    }

    /// `Error(GROUP_MOD_FAILED, GROUP_EXISTS)`, which only exists in 1.3.
    pub fn group_mod_failed_exists() -> Self {
        PacketRepr {
            kind: v13::GROUP_MOD_FAILED,
            code: v13::GROUP_MOD_FAILED_GROUP_EXISTS,
            data: Vec::new(),
        }
    }
}

impl Repr for PacketRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field::DATA.start {
            return Err(Error::Truncated);
        }
        Ok(PacketRepr {
            kind: NetworkEndian::read_u16(&buffer[field::KIND]),
            code: NetworkEndian::read_u16(&buffer[field::CODE]),
            data: buffer[field::DATA].to_vec(),
        })
    }

    fn buffer_len(&self) -> usize {
        field::DATA.start + self.data.len()
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        NetworkEndian::write_u16(&mut buffer[field::KIND], self.kind);
        NetworkEndian::write_u16(&mut buffer[field::CODE], self.code);
        buffer[field::DATA].copy_from_slice(&self.data);
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
            kind: v10::FLOW_MOD_FAILED,
            code: v10::FLOW_MOD_FAILED_OVERLAP,
            data: vec![1, 2, 3, 4],
        };
        let mut buf = vec![0; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketRepr::parse(&buf).unwrap(), repr);
    }

    #[test]
    fn version_specific_codes() {
        let e10 = PacketRepr::flow_mod_failed_overlap(Version::OpenFlow1Dot0);
        assert_eq!((e10.kind, e10.code), (3, 1));
        let e13 = PacketRepr::flow_mod_failed_overlap(Version::OpenFlow1Dot3);
        assert_eq!((e13.kind, e13.code), (5, 3));
    }
}
