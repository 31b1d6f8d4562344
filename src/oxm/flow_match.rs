use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};
use super::OxmField;

mod field {
    #![allow(non_snake_case)]

    use field::*;

    pub const MATCH_TYPE: Field = 0..2;
    pub const LENGTH: Field = 2..4;

    pub fn OXM_FIELDS(length: usize) -> Field {
        LENGTH.end..length
    }

    pub fn PADDING(length: usize) -> Field {
        length..(((length + 7) / 8) * 8)
    }
}

enum_with_unknown! {
    /// Type of the match structure
    pub doc enum MatchType(u16) {
        /// Deprecated
        Standard = 0,
        /// OpenFlow eXtensible Match
        Oxm = 1
    }
}

/// A wrapper to read and write a buffer representing a flow match structure.
#[derive(Debug, PartialEq, Eq, Clone)]
struct Packet<T> {
    inner: T,
}

impl<T: AsRef<[u8]>> Packet<T> {
    fn new(buf: T) -> Self {
        Packet { inner: buf }
    }

    fn new_checked(buf: T) -> Result<Self> {
        let packet = Packet { inner: buf };
        packet.check_len()?;
        Ok(packet)
    }

    fn check_len(&self) -> Result<()> {
        if self.inner.as_ref().len() < field::LENGTH.end {
            return Err(Error::Truncated);
        }
        if self.inner.as_ref().len() < field::PADDING(self.length() as usize).end {
            return Err(Error::Truncated);
        }
        Ok(())
    }

    /// Return the `match_type` field
    fn match_type(&self) -> MatchType {
        NetworkEndian::read_u16(&self.inner.as_ref()[field::MATCH_TYPE]).into()
    }

    /// Return the `length` field
    fn length(&self) -> u16 {
        NetworkEndian::read_u16(&self.inner.as_ref()[field::LENGTH])
    }

    /// Parse and return the OXM fields
    fn oxm_fields(&self) -> Result<Vec<OxmField>> {
        let length = self.length() as usize;
        let bytes = &self.inner.as_ref()[field::OXM_FIELDS(length)];
        let mut oxm_fields = Vec::new();
        let mut offset = 0;
        while offset < bytes.len() {
            let repr = <OxmField as Repr>::parse(&bytes[offset..])?;
            offset += repr.buffer_len();
            oxm_fields.push(repr);
        }
        Ok(oxm_fields)
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    fn set_match_type(&mut self, value: MatchType) {
        NetworkEndian::write_u16(&mut self.inner.as_mut()[field::MATCH_TYPE], value.into());
    }

    /// Setter for the `length` field. Covers the header and the OXM fields, not the padding.
    fn set_length(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.inner.as_mut()[field::LENGTH], value);
    }

    /// Set the `oxm_fields` field. The length field must be set already, otherwise this
    /// will panic.
    fn set_oxm_fields(&mut self, value: &[OxmField]) -> Result<()> {
        let oxm_fields_len = self.length() as usize;
        let buf = &mut self.inner.as_mut()[field::OXM_FIELDS(oxm_fields_len)];
        let mut offset = 0;
        for field in value {
            field.emit(&mut buf[offset..offset + field.buffer_len()])?;
            offset += field.buffer_len();
        }
        Ok(())
    }

    /// Add the necessary padding to ensure 8 byte alignment. The length field must be set
    /// already when setting the padding.
    fn set_padding(&mut self) {
        let len = self.length() as usize;
        let buf = &mut self.inner.as_mut()[field::PADDING(len)];
        for byte in buf {
            *byte = 0;
        }
    }
}

/// An OpenFlow 1.3 match: a heterogeneous ordered list of OXM TLVs, carried in flow mod, flow
/// removed, and packet in messages.
///
/// ```no_rust
/// +---------------+---------------+
/// |   match type  |     length    |
/// +---------------+---------------+
/// |          oxm fields           |
/// |   (variable       +-----------+
/// |     length)       |  padding  |
/// +-------------------+-----------+
/// ```
///
/// - The `match type` is `1` (OXM)
/// - The `length` covers the header and the OXM fields but not the padding
/// - The `padding` aligns the structure to 8 bytes
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct FlowMatch(pub Vec<OxmField>);

impl FlowMatch {
    pub fn new(fields: Vec<OxmField>) -> Self {
        FlowMatch(fields)
    }

    fn fields_len(&self) -> usize {
        self.0.iter().fold(0, |acc, field| acc + field.buffer_len())
    }

    /// Return the first TLV carrying the given `oxm_field` code.
    pub fn get(&self, code: u8) -> Option<&OxmField> {
        self.0.iter().find(|field| field.code() == code)
    }

    /// The ingress port, if this match constrains it.
    pub fn in_port(&self) -> Option<u32> {
        match self.get(super::consts::IN_PORT) {
            Some(&OxmField::InPort(port)) => Some(port),
            _ => None,
        }
    }

    pub fn push(&mut self, field: OxmField) {
        self.0.push(field);
    }
}

impl Repr for FlowMatch {
    fn parse(buffer: &[u8]) -> Result<Self> {
        let packet = Packet::new_checked(buffer)?;
        match packet.match_type() {
            MatchType::Oxm => Ok(FlowMatch(packet.oxm_fields()?)),
            _ => Err(Error::BadMatchType),
        }
    }

    fn buffer_len(&self) -> usize {
        field::PADDING(field::LENGTH.end + self.fields_len()).end
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        let mut packet = Packet::new(buffer);
        packet.set_match_type(MatchType::Oxm);
        packet.set_length((field::LENGTH.end + self.fields_len()) as u16);
        packet.set_oxm_fields(&self.0)?;
        packet.set_padding();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use oxm::OxmField;

    #[cfg_attr(rustfmt, rustfmt_skip)]
    static BYTES: [u8; 32] = [
        // header
        0x00, 0x01,             // match type (1 = oxm)
        0x00, 0x1e,             // length = 30

        // first oxm tlv (len = 8)
        0x80, 0x00,             // class = 0x8000 = openflow basic
        0x00,                   // field (0 = in_port), no mask
        0x04,                   // value length = 4
        0x00, 0x00, 0xab, 0xcd, // value = 43981

        // second oxm tlv (len = 12)
        0x80, 0x00,             // class = 0x8000 = openflow basic
        38 << 1,                // field = 38 = tunnel id, no mask
        0x08,                   // value length = 8
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xc3, 0x50, // value = 50000

        // third oxm tlv (len = 6)
        0x80, 0x00,             // class = 0x8000 = openflow basic
        6 << 1,                 // field = 6 = vlan id, no mask
        0x02,                   // value length = 2
        0x07, 0x77,             // value = 0x0777

        // padding for 8 byte alignment
        0x00, 0x00
    ];

    #[test]
    fn test_deconstruct() {
        let packet = Packet::new(&BYTES[..]);
        assert_eq!(packet.match_type(), MatchType::Oxm);
        assert_eq!(packet.length(), 30);

        assert_eq!(field::OXM_FIELDS(30), 4..30);
        assert_eq!(field::PADDING(30), 30..32);
    }

    #[test]
    fn test_padding_field() {
        assert_eq!(field::PADDING(4), 4..8);
        assert_eq!(field::PADDING(8), 8..8);
        assert_eq!(field::PADDING(15), 15..16);
        assert_eq!(field::PADDING(24), 24..24);
        assert_eq!(field::PADDING(25), 25..32);
    }

    #[test]
    fn test_parse() {
        let parsed = <FlowMatch as Repr>::parse(&BYTES).unwrap();
        let expected = FlowMatch(vec![
            OxmField::InPort(0xabcd),
            OxmField::TunnelId(50_000, None),
            OxmField::VlanId(0x0777, None),
        ]);
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_emit() {
        let repr = FlowMatch(vec![
            OxmField::InPort(0xabcd),
            OxmField::TunnelId(50_000, None),
            OxmField::VlanId(0x0777, None),
        ]);
        assert_eq!(repr.buffer_len(), 32);

        let mut bytes = [0xff; 32];
        repr.emit(&mut bytes).unwrap();
        assert_eq!(&bytes[..], &BYTES[..]);
    }
}
