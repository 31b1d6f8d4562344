//! Implementation of OXM (OpenFlow eXtensible Match)
//!
//! An OXM TLV (Type-Length-Value) packet is made of a 4 byte header and a variable size value.
//!
//! # Message structure
//!
//! ```no_rust
//! 0                       16             23  24             32
//! +------------------------+-------------+----+-------------+
//! |       oxm_class        |  oxm_field  | HM |  oxm_length |
//! +------------------------+-------------+----+-------------+
//! |                     value and/or mask                   |
//! |                      (variable size)                    |
//! +---------------------------------------------------------+
//! ```
//!
//! Only the `OFPXMC_OPENFLOW_BASIC` class is handled: each TLV is decoded into one variant of
//! [`OxmField`](enum.OxmField.html), which carries the field value and, for maskable fields, an
//! optional mask. The `HM` bit says whether the second half of the payload is a mask.

use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};
use smoltcp::wire::{EthernetAddress, Ipv4Address};

mod packet;
pub use self::packet::Packet;

mod consts;

mod flow_match;
pub use self::flow_match::FlowMatch;

/// Backward compatibility with NXM
pub const CLASS_NXM0: u16 = 0x0000;
/// Backward compatibility with NXM
pub const CLASS_NXM1: u16 = 0x0001;
/// Basic class for OpenFlow
pub const CLASS_OPEN_FLOW_BASIC: u16 = 0x8000;
/// Experimenter class
pub const CLASS_EXPERIMENTER: u16 = 0xFFFF;

const OXM_HEADER_LEN: usize = 4;

/// A single match field of the OpenFlow 1.3.0 base set, decoded from (or encoded into) an OXM
/// TLV of class `OFPXMC_OPENFLOW_BASIC`. Maskable fields carry an optional mask whose bits are
/// set on the positions that take part in the comparison.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum OxmField {
    InPort(u32),
    InPhysicalPort(u32),
    Metadata(u64, Option<u64>),
    EthernetDestination(EthernetAddress, Option<EthernetAddress>),
    EthernetSource(EthernetAddress, Option<EthernetAddress>),
    EthernetType(u16),
    VlanId(u16, Option<u16>),
    VlanPriority(u8),
    IpDscp(u8),
    IpEcn(u8),
    IpProtocol(u8),
    Ipv4Source(Ipv4Address, Option<Ipv4Address>),
    Ipv4Destination(Ipv4Address, Option<Ipv4Address>),
    TcpSource(u16),
    TcpDestination(u16),
    UdpSource(u16),
    UdpDestination(u16),
    SctpSource(u16),
    SctpDestination(u16),
    IcmpType(u8),
    IcmpCode(u8),
    ArpOpCode(u16),
    ArpSpa(Ipv4Address, Option<Ipv4Address>),
    ArpTpa(Ipv4Address, Option<Ipv4Address>),
    ArpSha(EthernetAddress, Option<EthernetAddress>),
    ArpTha(EthernetAddress, Option<EthernetAddress>),
    Ipv6Source([u8; 16], Option<[u8; 16]>),
    Ipv6Destination([u8; 16], Option<[u8; 16]>),
    Ipv6FlowLabel(u32, Option<u32>),
    Icmpv6Type(u8),
    Icmpv6Code(u8),
    Ipv6NdTarget([u8; 16]),
    Ipv6NdSll(EthernetAddress),
    Ipv6NdTll(EthernetAddress),
    MplsLabel(u32),
    MplsTc(u8),
    MplsBos(u8),
    PbbIsid(u32, Option<u32>),
    TunnelId(u64, Option<u64>),
    Ipv6ExtensionHeader(u16, Option<u16>),
}

fn read_eth(buf: &[u8]) -> EthernetAddress {
    EthernetAddress::from_bytes(&buf[0..6])
}

fn read_ipv4(buf: &[u8]) -> Ipv4Address {
    Ipv4Address::from_bytes(&buf[0..4])
}

fn read_ipv6(buf: &[u8]) -> [u8; 16] {
    let mut out = [0; 16];
    out.copy_from_slice(&buf[0..16]);
    out
}

fn read_u24(buf: &[u8]) -> u32 {
    (buf[0] as u32) << 16 | (buf[1] as u32) << 8 | buf[2] as u32
}

fn write_u24(buf: &mut [u8], value: u32) {
    buf[0] = (value >> 16) as u8;
    buf[1] = (value >> 8) as u8;
    buf[2] = value as u8;
}

impl OxmField {
    /// The `oxm_field` code of this field.
    pub fn code(&self) -> u8 {
        match *self {
            OxmField::InPort(..) => consts::IN_PORT,
            OxmField::InPhysicalPort(..) => consts::IN_PHYSICAL_PORT,
            OxmField::Metadata(..) => consts::METADATA,
            OxmField::EthernetDestination(..) => consts::ETHERNET_DESTINATION,
            OxmField::EthernetSource(..) => consts::ETHERNET_SOURCE,
            OxmField::EthernetType(..) => consts::ETHERNET_TYPE,
            OxmField::VlanId(..) => consts::VLAN_ID,
            OxmField::VlanPriority(..) => consts::VLAN_PRIORITY,
            OxmField::IpDscp(..) => consts::IP_DSCP,
            OxmField::IpEcn(..) => consts::IP_ECN,
            OxmField::IpProtocol(..) => consts::IP_PROTOCOL,
            OxmField::Ipv4Source(..) => consts::IPV4_SOURCE,
            OxmField::Ipv4Destination(..) => consts::IPV4_DESTINATION,
            OxmField::TcpSource(..) => consts::TCP_SOURCE,
            OxmField::TcpDestination(..) => consts::TCP_DESTINATION,
            OxmField::UdpSource(..) => consts::UDP_SOURCE,
            OxmField::UdpDestination(..) => consts::UDP_DESTINATION,
            OxmField::SctpSource(..) => consts::SCTP_SOURCE,
            OxmField::SctpDestination(..) => consts::SCTP_DESTINATION,
            OxmField::IcmpType(..) => consts::ICMP_TYPE,
            OxmField::IcmpCode(..) => consts::ICMP_CODE,
            OxmField::ArpOpCode(..) => consts::ARP_OP_CODE,
            OxmField::ArpSpa(..) => consts::ARP_SPA,
            OxmField::ArpTpa(..) => consts::ARP_TPA,
            OxmField::ArpSha(..) => consts::ARP_SHA,
            OxmField::ArpTha(..) => consts::ARP_THA,
            OxmField::Ipv6Source(..) => consts::IPV6_SOURCE,
            OxmField::Ipv6Destination(..) => consts::IPV6_DESTINATION,
            OxmField::Ipv6FlowLabel(..) => consts::IPV6_FLOW_LABEL,
            OxmField::Icmpv6Type(..) => consts::ICMPV6_TYPE,
            OxmField::Icmpv6Code(..) => consts::ICMPV6_CODE,
            OxmField::Ipv6NdTarget(..) => consts::IPV6_ND_TARGET,
            OxmField::Ipv6NdSll(..) => consts::IPV6_ND_SLL,
            OxmField::Ipv6NdTll(..) => consts::IPV6_ND_TLL,
            OxmField::MplsLabel(..) => consts::MPLS_LABEL,
            OxmField::MplsTc(..) => consts::MPLS_TC,
            OxmField::MplsBos(..) => consts::MPLS_BOS,
            OxmField::PbbIsid(..) => consts::PBB_ISID,
            OxmField::TunnelId(..) => consts::TUNNEL_ID,
            OxmField::Ipv6ExtensionHeader(..) => consts::IPV6_EXTENSION_HEADER,
        }
    }

    /// The value bytes, in network order. For maskable fields this is the first half of the
    /// payload.
    pub fn value_bytes(&self) -> Vec<u8> {
        use self::OxmField::*;
        match *self {
            VlanPriority(v) | IpDscp(v) | IpEcn(v) | IpProtocol(v) | IcmpType(v) | IcmpCode(v)
            | Icmpv6Type(v) | Icmpv6Code(v) | MplsTc(v) | MplsBos(v) => vec![v],
            EthernetType(v) | TcpSource(v) | TcpDestination(v) | UdpSource(v)
            | UdpDestination(v) | SctpSource(v) | SctpDestination(v) | ArpOpCode(v)
            | VlanId(v, _) | Ipv6ExtensionHeader(v, _) => {
                let mut buf = vec![0; 2];
                NetworkEndian::write_u16(&mut buf, v);
                buf
            }
            InPort(v) | InPhysicalPort(v) | MplsLabel(v) | Ipv6FlowLabel(v, _) => {
                let mut buf = vec![0; 4];
                NetworkEndian::write_u32(&mut buf, v);
                buf
            }
            PbbIsid(v, _) => {
                let mut buf = vec![0; 3];
                write_u24(&mut buf, v);
                buf
            }
            Metadata(v, _) | TunnelId(v, _) => {
                let mut buf = vec![0; 8];
                NetworkEndian::write_u64(&mut buf, v);
                buf
            }
            EthernetDestination(v, _) | EthernetSource(v, _) | ArpSha(v, _) | ArpTha(v, _)
            | Ipv6NdSll(v) | Ipv6NdTll(v) => v.as_bytes().to_vec(),
            Ipv4Source(v, _) | Ipv4Destination(v, _) | ArpSpa(v, _) | ArpTpa(v, _) => {
                v.as_bytes().to_vec()
            }
            Ipv6Source(v, _) | Ipv6Destination(v, _) | Ipv6NdTarget(v) => v.to_vec(),
        }
    }

    /// The mask bytes in network order, if a mask is present.
    pub fn mask_bytes(&self) -> Option<Vec<u8>> {
        use self::OxmField::*;
        match *self {
            VlanId(_, Some(m)) | Ipv6ExtensionHeader(_, Some(m)) => {
                let mut buf = vec![0; 2];
                NetworkEndian::write_u16(&mut buf, m);
                Some(buf)
            }
            Ipv6FlowLabel(_, Some(m)) => {
                let mut buf = vec![0; 4];
                NetworkEndian::write_u32(&mut buf, m);
                Some(buf)
            }
            PbbIsid(_, Some(m)) => {
                let mut buf = vec![0; 3];
                write_u24(&mut buf, m);
                Some(buf)
            }
            Metadata(_, Some(m)) | TunnelId(_, Some(m)) => {
                let mut buf = vec![0; 8];
                NetworkEndian::write_u64(&mut buf, m);
                Some(buf)
            }
            EthernetDestination(_, Some(m)) | EthernetSource(_, Some(m)) | ArpSha(_, Some(m))
            | ArpTha(_, Some(m)) => Some(m.as_bytes().to_vec()),
            Ipv4Source(_, Some(m)) | Ipv4Destination(_, Some(m)) | ArpSpa(_, Some(m))
            | ArpTpa(_, Some(m)) => Some(m.as_bytes().to_vec()),
            Ipv6Source(_, Some(m)) | Ipv6Destination(_, Some(m)) => Some(m.to_vec()),
            _ => None,
        }
    }

    /// Whether this field carries a mask.
    pub fn has_mask(&self) -> bool {
        self.mask_bytes().is_some()
    }

    fn value_len(&self) -> usize {
        let base = self.value_bytes().len();
        if self.has_mask() {
            base * 2
        } else {
            base
        }
    }

    /// Parse a single `OFPXMC_OPENFLOW_BASIC` TLV.
    pub fn parse<'a, T: AsRef<[u8]> + ?Sized>(packet: &Packet<&'a T>) -> Result<Self> {
        let buf = packet.value();
        let masked = packet.has_mask();
        let len = packet.length() as usize;

        // lengths are fixed per field; a mask doubles the payload
        let check = |base: usize| -> Result<()> {
            let expected = if masked { base * 2 } else { base };
            if len == expected && buf.len() >= expected {
                Ok(())
            } else {
                Err(Error::Malformed)
            }
        };

        macro_rules! plain {
            ($base:expr, $read:expr, $variant:path) => {{
                check($base)?;
                if masked {
                    return Err(Error::Malformed);
                }
                $variant($read(&buf[0..$base]))
            }};
        }
        macro_rules! masked {
            ($base:expr, $read:expr, $variant:path) => {{
                check($base)?;
                let value = $read(&buf[0..$base]);
                let mask = if masked {
                    Some($read(&buf[$base..2 * $base]))
                } else {
                    None
                };
                $variant(value, mask)
            }};
        }

        fn u8_at(buf: &[u8]) -> u8 {
            buf[0]
        }

        let field = match packet.field() {
            consts::IN_PORT => plain!(4, NetworkEndian::read_u32, OxmField::InPort),
            consts::IN_PHYSICAL_PORT => plain!(4, NetworkEndian::read_u32, OxmField::InPhysicalPort),
            consts::METADATA => masked!(8, NetworkEndian::read_u64, OxmField::Metadata),
            consts::ETHERNET_DESTINATION => masked!(6, read_eth, OxmField::EthernetDestination),
            consts::ETHERNET_SOURCE => masked!(6, read_eth, OxmField::EthernetSource),
            consts::ETHERNET_TYPE => plain!(2, NetworkEndian::read_u16, OxmField::EthernetType),
            consts::VLAN_ID => masked!(2, NetworkEndian::read_u16, OxmField::VlanId),
            consts::VLAN_PRIORITY => plain!(1, u8_at, OxmField::VlanPriority),
            consts::IP_DSCP => plain!(1, u8_at, OxmField::IpDscp),
            consts::IP_ECN => plain!(1, u8_at, OxmField::IpEcn),
            consts::IP_PROTOCOL => plain!(1, u8_at, OxmField::IpProtocol),
            consts::IPV4_SOURCE => masked!(4, read_ipv4, OxmField::Ipv4Source),
            consts::IPV4_DESTINATION => masked!(4, read_ipv4, OxmField::Ipv4Destination),
            consts::TCP_SOURCE => plain!(2, NetworkEndian::read_u16, OxmField::TcpSource),
            consts::TCP_DESTINATION => plain!(2, NetworkEndian::read_u16, OxmField::TcpDestination),
            consts::UDP_SOURCE => plain!(2, NetworkEndian::read_u16, OxmField::UdpSource),
            consts::UDP_DESTINATION => plain!(2, NetworkEndian::read_u16, OxmField::UdpDestination),
            consts::SCTP_SOURCE => plain!(2, NetworkEndian::read_u16, OxmField::SctpSource),
            consts::SCTP_DESTINATION => {
                plain!(2, NetworkEndian::read_u16, OxmField::SctpDestination)
            }
            consts::ICMP_TYPE => plain!(1, u8_at, OxmField::IcmpType),
            consts::ICMP_CODE => plain!(1, u8_at, OxmField::IcmpCode),
            consts::ARP_OP_CODE => plain!(2, NetworkEndian::read_u16, OxmField::ArpOpCode),
            consts::ARP_SPA => masked!(4, read_ipv4, OxmField::ArpSpa),
            consts::ARP_TPA => masked!(4, read_ipv4, OxmField::ArpTpa),
            consts::ARP_SHA => masked!(6, read_eth, OxmField::ArpSha),
            consts::ARP_THA => masked!(6, read_eth, OxmField::ArpTha),
            consts::IPV6_SOURCE => masked!(16, read_ipv6, OxmField::Ipv6Source),
            consts::IPV6_DESTINATION => masked!(16, read_ipv6, OxmField::Ipv6Destination),
            consts::IPV6_FLOW_LABEL => masked!(4, NetworkEndian::read_u32, OxmField::Ipv6FlowLabel),
            consts::ICMPV6_TYPE => plain!(1, u8_at, OxmField::Icmpv6Type),
            consts::ICMPV6_CODE => plain!(1, u8_at, OxmField::Icmpv6Code),
            consts::IPV6_ND_TARGET => plain!(16, read_ipv6, OxmField::Ipv6NdTarget),
            consts::IPV6_ND_SLL => plain!(6, read_eth, OxmField::Ipv6NdSll),
            consts::IPV6_ND_TLL => plain!(6, read_eth, OxmField::Ipv6NdTll),
            consts::MPLS_LABEL => plain!(4, NetworkEndian::read_u32, OxmField::MplsLabel),
            consts::MPLS_TC => plain!(1, u8_at, OxmField::MplsTc),
            consts::MPLS_BOS => plain!(1, u8_at, OxmField::MplsBos),
            consts::PBB_ISID => masked!(3, read_u24, OxmField::PbbIsid),
            consts::TUNNEL_ID => masked!(8, NetworkEndian::read_u64, OxmField::TunnelId),
            consts::IPV6_EXTENSION_HEADER => {
                masked!(2, NetworkEndian::read_u16, OxmField::Ipv6ExtensionHeader)
            }
            _ => return Err(Error::BadOxmField),
        };
        Ok(field)
    }

    /// Length of the TLV that [`emit`](#method.emit) writes.
    pub fn buffer_len(&self) -> usize {
        OXM_HEADER_LEN + self.value_len()
    }

    /// Write this field as an OXM TLV.
    pub fn emit(&self, buf: &mut [u8]) -> Result<()> {
        if self.buffer_len() > buf.len() {
            return Err(Error::Exhausted);
        }
        let mut packet = Packet::new(buf);
        packet.set_class(CLASS_OPEN_FLOW_BASIC);
        packet.set_field(self.code());
        packet.set_length(self.value_len() as u8);
        let value = self.value_bytes();
        if let Some(mask) = self.mask_bytes() {
            packet.set_mask();
            let out = packet.value_mut();
            out[..value.len()].copy_from_slice(&value);
            out[value.len()..value.len() + mask.len()].copy_from_slice(&mask);
        } else {
            packet.unset_mask();
            packet.value_mut()[..value.len()].copy_from_slice(&value);
        }
        Ok(())
    }
}

impl Repr for OxmField {
    fn parse(buffer: &[u8]) -> Result<Self> {
        let packet = Packet::new_checked(buffer)?;
        match packet.class() {
            CLASS_OPEN_FLOW_BASIC => OxmField::parse(&packet),
            CLASS_NXM0 | CLASS_NXM1 | CLASS_EXPERIMENTER => Err(Error::UnsupportedOxmClass),
            _ => Err(Error::BadOxmClass),
        }
    }

    fn buffer_len(&self) -> usize {
        OxmField::buffer_len(self)
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        OxmField::emit(self, buffer)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Repr;

    #[cfg_attr(rustfmt, rustfmt_skip)]
    static BYTES: [u8; 8] = [
        0x80, 0x00,             // class = 0x8000 = openflow basic
        0x00,                   // field (0 = in_port), no mask
        0x04,                   // value length = 4
        0x00, 0x00, 0xab, 0xcd, // value = 43981
    ];

    #[test]
    fn test_parse() {
        let parsed = <OxmField as Repr>::parse(&BYTES[..]).unwrap();
        assert_eq!(parsed, OxmField::InPort(0xabcd));
    }

    #[test]
    fn test_emit() {
        let field = OxmField::InPort(0xabcd);
        assert_eq!(field.buffer_len(), 8);
        let mut buf = [0xff; 8];
        field.emit(&mut buf).unwrap();
        assert_eq!(&buf[..], &BYTES[..]);
    }

    #[test]
    fn test_masked_roundtrip() {
        let field = OxmField::EthernetDestination(
            EthernetAddress([0, 1, 2, 3, 4, 5]),
            Some(EthernetAddress([0xff, 0xff, 0xff, 0, 0, 0])),
        );
        assert_eq!(field.buffer_len(), 16);
        let mut buf = vec![0; field.buffer_len()];
        field.emit(&mut buf).unwrap();
        assert_eq!(<OxmField as Repr>::parse(&buf).unwrap(), field);
    }

    #[test]
    fn test_bad_class() {
        let mut bytes = BYTES;
        bytes[0] = 0x12;
        assert_eq!(<OxmField as Repr>::parse(&bytes[..]), Err(::Error::BadOxmClass));
        bytes[0] = 0x00;
        bytes[1] = 0x01;
        assert_eq!(
            <OxmField as Repr>::parse(&bytes[..]),
            Err(::Error::UnsupportedOxmClass)
        );
    }
}
