//! Hello messages. An OpenFlow 1.0 hello carries no payload; a 1.3 hello
//! may carry a list of elements, of which only the version bitmap is
//! defined:
//!
//! ```no_rust
//! +--------+--------+--------+--------+
//! |  element type   |  element length |
//! +--------+--------+--------+--------+
//! |          version bitmap(s)        |
//! +--------+--------+--------+--------+
//! ```

use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};

const OFPHET_VERSIONBITMAP: u16 = 1;

/// A hello element: only the version bitmap is recognized. The bitmap has
/// bit `n` set when the version with wire id `n` is supported; a single
/// 32 bit word covers every published version.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Element {
    VersionBitmap(u32),
}

impl Element {
    fn buffer_len(&self) -> usize {
        match *self {
            // 4 byte header + one bitmap word + 4 bytes padding to 8
            Element::VersionBitmap(_) => 8,
        }
    }

    fn parse(buffer: &[u8]) -> Result<(Element, usize)> {
        if buffer.len() < 4 {
            return Err(Error::Truncated);
        }
        let kind = NetworkEndian::read_u16(&buffer[0..2]);
        let len = NetworkEndian::read_u16(&buffer[2..4]) as usize;
        if len < 4 || buffer.len() < len {
            return Err(Error::Malformed);
        }
        match kind {
            OFPHET_VERSIONBITMAP => {
                if len < 8 {
                    return Err(Error::Malformed);
                }
                let bitmap = NetworkEndian::read_u32(&buffer[4..8]);
                // elements are padded to 8 byte multiples
                let padded = (len + 7) / 8 * 8;
                Ok((Element::VersionBitmap(bitmap), padded.min(buffer.len())))
            }
            _ => Err(Error::Unrecognized),
        }
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        match *self {
            Element::VersionBitmap(bitmap) => {
                NetworkEndian::write_u16(&mut buffer[0..2], OFPHET_VERSIONBITMAP);
                NetworkEndian::write_u16(&mut buffer[2..4], 8);
                NetworkEndian::write_u32(&mut buffer[4..8], bitmap);
            }
        }
        Ok(())
    }
}

/// A hello payload: zero or more elements.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct PacketRepr {
    pub elements: Vec<Element>,
}

impl PacketRepr {
    pub fn new(elements: Vec<Element>) -> Self {
        PacketRepr { elements }
    }

    /// The advertised version bitmap, if one was sent.
    pub fn version_bitmap(&self) -> Option<u32> {
        self.elements.iter().map(|&Element::VersionBitmap(b)| b).next()
    }
}

impl Repr for PacketRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        let mut elements = Vec::new();
        let mut offset = 0;
        while offset < buffer.len() {
            let (element, len) = Element::parse(&buffer[offset..])?;
            elements.push(element);
            offset += len;
        }
        Ok(PacketRepr { elements })
    }

    fn buffer_len(&self) -> usize {
        self.elements.iter().fold(0, |acc, e| acc + e.buffer_len())
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        let mut offset = 0;
        for element in &self.elements {
            element.emit(&mut buffer[offset..])?;
            offset += element.buffer_len();
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Repr;

    #[test]
    fn empty_hello() {
        let repr = PacketRepr::default();
        assert_eq!(repr.buffer_len(), 0);
        assert_eq!(PacketRepr::parse(&[]).unwrap(), repr);
    }

    #[test]
    fn bitmap_roundtrip() {
        let repr = PacketRepr::new(vec![Element::VersionBitmap(1 << 4)]);
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x00, 0x01, 0x00, 0x08, 0x00, 0x00, 0x00, 0x10]);
        let parsed = PacketRepr::parse(&buf).unwrap();
        assert_eq!(parsed, repr);
        assert_eq!(parsed.version_bitmap(), Some(0x10));
    }
}
