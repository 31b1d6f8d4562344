//! A read/write wrapper around an OpenFlow packet buffer.
//!
//! ```no_rust
//! +--------+--------+--------+--------+
//! |version |  type  |     length      |
//! +--------+--------+--------+--------+
//! |                xid                |
//! +--------+--------+--------+--------+
//! |              payload              |
//! +--------+--------+--------+--------+
//! ```
//!
//! - The version field indicates the version of OpenFlow which this message belongs
//! - The length field gives the message length, including the header itself.
//! - The xid, or transaction identifier, is a unique value used to match requests to responses.
//!
//! The type codes are version specific (1.0 and 1.3 number their messages
//! differently past `FlowMod`), so the payload enum is parsed and emitted
//! against the version in the header.

use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};
use packets::{error, features_reply, flow_mod, flow_removed, group_mod, hello, multipart,
              packet_in, packet_out, port_mod, port_status, stats, switch_config};

enum_with_unknown! {
    /// OpenFlow version
    pub doc enum Version(u8) {
        /// OpenFlow 1.0
        OpenFlow1Dot0 = 1,
        /// OpenFlow 1.1
        OpenFlow1Dot1 = 2,
        /// OpenFlow 1.2
        OpenFlow1Dot2 = 3,
        /// OpenFlow 1.3
        OpenFlow1Dot3 = 4,
        /// OpenFlow 1.4
        OpenFlow1Dot4 = 5,
        /// OpenFlow 1.5
        OpenFlow1Dot5 = 6
    }
}

/// A wrapper around a buffer that represents an OpenFlow packet. `Packet` provides getters and
/// setters for each of the OpenFlow header fields.
#[derive(Debug)]
pub struct Packet<T: AsRef<[u8]>> {
    buffer: T,
}

mod field {
    use field::*;

    pub const VERSION: usize = 0;
    pub const KIND: usize = 1;
    pub const LENGTH: Field = 2..4;
    pub const XID: Field = 4..8;
}

/// Length of the fixed OpenFlow header.
pub const HEADER_LEN: usize = field::XID.end;

impl<T: AsRef<[u8]>> Packet<T> {
    /// Imbue a raw octet buffer with OpenFlow packet structure.
    pub fn new(buffer: T) -> Packet<T> {
        Packet { buffer }
    }

    /// Shorthand for a combination of [new] and [check_len].
    ///
    /// [new]: #method.new
    /// [check_len]: #method.check_len
    pub fn new_checked(buffer: T) -> Result<Packet<T>> {
        let packet = Self::new(buffer);
        packet.check_len()?;
        Ok(packet)
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error::Truncated)` if the buffer is too short.
    pub fn check_len(&self) -> Result<()> {
        let len = self.buffer.as_ref().len();
        if len < HEADER_LEN || len < self.length() as usize {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Consume the packet, returning the underlying buffer.
    pub fn into_inner(self) -> T {
        self.buffer
    }

    /// Return the version field.
    #[inline]
    pub fn version(&self) -> Version {
        let data = self.buffer.as_ref();
        Version::from(data[field::VERSION])
    }

    /// Return the type field. The type field indicates what type of message is present and how
    /// to interpret the payload; its numbering depends on the version.
    #[inline]
    pub fn kind(&self) -> u8 {
        let data = self.buffer.as_ref();
        data[field::KIND]
    }

    /// Return the length field. The length covers the header and the payload.
    #[inline]
    pub fn length(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::LENGTH])
    }

    /// Return the xid field. The xid, or transaction identifier, is a unique value used to match
    /// requests to responses.
    #[inline]
    pub fn xid(&self) -> u32 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u32(&data[field::XID])
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    /// Set the version field.
    #[inline]
    pub fn set_version(&mut self, value: Version) {
        let data = self.buffer.as_mut();
        data[field::VERSION] = value.into()
    }

    /// Set the type field.
    #[inline]
    pub fn set_kind(&mut self, value: u8) {
        let data = self.buffer.as_mut();
        data[field::KIND] = value
    }

    /// Set the length.
    #[inline]
    pub fn set_length(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::LENGTH], value)
    }

    /// Set the xid field.
    #[inline]
    pub fn set_xid(&mut self, value: u32) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u32(&mut data[field::XID], value)
    }
}

impl<'a, T: AsRef<[u8]> + ?Sized> Packet<&'a T> {
    /// Return a pointer to the payload.
    #[inline]
    pub fn payload(&self) -> &'a [u8] {
        let range = HEADER_LEN..self.length() as usize;
        let data = self.buffer.as_ref();
        &data[range]
    }
}

impl<'a, T: AsRef<[u8]> + AsMut<[u8]> + ?Sized> Packet<&'a mut T> {
    /// Return a mutable pointer to the payload.
    #[inline]
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let range = HEADER_LEN..self.length() as usize;
        let data = self.buffer.as_mut();
        &mut data[range]
    }
}

mod kind10 {
    pub const HELLO: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const ECHO_REQUEST: u8 = 2;
    pub const ECHO_REPLY: u8 = 3;
    pub const FEATURES_REQUEST: u8 = 5;
    pub const FEATURES_REPLY: u8 = 6;
    pub const GET_CONFIG_REQUEST: u8 = 7;
    pub const GET_CONFIG_REPLY: u8 = 8;
    pub const SET_CONFIG: u8 = 9;
    pub const PACKET_IN: u8 = 10;
    pub const FLOW_REMOVED: u8 = 11;
    pub const PORT_STATUS: u8 = 12;
    pub const PACKET_OUT: u8 = 13;
    pub const FLOW_MOD: u8 = 14;
    pub const PORT_MOD: u8 = 15;
    pub const STATS_REQUEST: u8 = 16;
    pub const STATS_REPLY: u8 = 17;
    pub const BARRIER_REQUEST: u8 = 18;
    pub const BARRIER_REPLY: u8 = 19;
}

mod kind13 {
    pub const HELLO: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const ECHO_REQUEST: u8 = 2;
    pub const ECHO_REPLY: u8 = 3;
    pub const FEATURES_REQUEST: u8 = 5;
    pub const FEATURES_REPLY: u8 = 6;
    pub const GET_CONFIG_REQUEST: u8 = 7;
    pub const GET_CONFIG_REPLY: u8 = 8;
    pub const SET_CONFIG: u8 = 9;
    pub const PACKET_IN: u8 = 10;
    pub const FLOW_REMOVED: u8 = 11;
    pub const PORT_STATUS: u8 = 12;
    pub const PACKET_OUT: u8 = 13;
    pub const FLOW_MOD: u8 = 14;
    pub const GROUP_MOD: u8 = 15;
    pub const PORT_MOD: u8 = 16;
    pub const MULTIPART_REQUEST: u8 = 18;
    pub const MULTIPART_REPLY: u8 = 19;
    pub const BARRIER_REQUEST: u8 = 20;
    pub const BARRIER_REPLY: u8 = 21;
}

/// A high-level representation of an OpenFlow message payload. Variants
/// with a `13` suffix exist where the 1.3 wire layout differs from the 1.0
/// one; version-only messages (stats, multipart, group mod) appear once.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PayloadRepr {
    Hello(hello::PacketRepr),
    Error(error::PacketRepr),
    EchoRequest(Vec<u8>),
    EchoReply(Vec<u8>),
    FeaturesRequest,
    FeaturesReply(features_reply::PacketRepr),
    FeaturesReply13(features_reply::PacketRepr13),
    GetConfigRequest,
    GetConfigReply(switch_config::PacketRepr),
    SetConfig(switch_config::PacketRepr),
    PacketIn(packet_in::PacketRepr),
    PacketIn13(packet_in::PacketRepr13),
    FlowRemoved(flow_removed::PacketRepr),
    FlowRemoved13(flow_removed::PacketRepr13),
    PortStatus(port_status::PacketRepr),
    PacketOut(packet_out::PacketRepr),
    PacketOut13(packet_out::PacketRepr13),
    FlowMod(flow_mod::PacketRepr),
    FlowMod13(flow_mod::PacketRepr13),
    GroupMod(group_mod::PacketRepr),
    PortMod(port_mod::PacketRepr),
    PortMod13(port_mod::PacketRepr13),
    StatsRequest(stats::RequestRepr),
    StatsReply(stats::ReplyRepr),
    MultipartRequest(multipart::RequestRepr),
    MultipartReply(multipart::ReplyRepr),
    BarrierRequest,
    BarrierReply,
}

impl PayloadRepr {
    fn parse(version: Version, kind: u8, buffer: &[u8]) -> Result<Self> {
        use self::PayloadRepr::*;
        Ok(match version {
            Version::OpenFlow1Dot0 => match kind {
                kind10::HELLO => Hello(hello::PacketRepr::parse(buffer)?),
                kind10::ERROR => Error(error::PacketRepr::parse(buffer)?),
                kind10::ECHO_REQUEST => EchoRequest(buffer.to_vec()),
                kind10::ECHO_REPLY => EchoReply(buffer.to_vec()),
                kind10::FEATURES_REQUEST => FeaturesRequest,
                kind10::FEATURES_REPLY => FeaturesReply(features_reply::PacketRepr::parse(buffer)?),
                kind10::GET_CONFIG_REQUEST => GetConfigRequest,
                kind10::GET_CONFIG_REPLY => {
                    GetConfigReply(switch_config::PacketRepr::parse(buffer)?)
                }
                kind10::SET_CONFIG => SetConfig(switch_config::PacketRepr::parse(buffer)?),
                kind10::PACKET_IN => PacketIn(packet_in::PacketRepr::parse(buffer)?),
                kind10::FLOW_REMOVED => FlowRemoved(flow_removed::PacketRepr::parse(buffer)?),
                kind10::PORT_STATUS => PortStatus(port_status::PacketRepr::parse(buffer)?),
                kind10::PACKET_OUT => PacketOut(packet_out::PacketRepr::parse(buffer)?),
                kind10::FLOW_MOD => FlowMod(flow_mod::PacketRepr::parse(buffer)?),
                kind10::PORT_MOD => PortMod(port_mod::PacketRepr::parse(buffer)?),
                kind10::STATS_REQUEST => StatsRequest(stats::RequestRepr::parse(buffer)?),
                kind10::STATS_REPLY => StatsReply(stats::ReplyRepr::parse(buffer)?),
                kind10::BARRIER_REQUEST => BarrierRequest,
                kind10::BARRIER_REPLY => BarrierReply,
                _ => return Err(self::Error::Unrecognized),
            },
            Version::OpenFlow1Dot3 => match kind {
                kind13::HELLO => Hello(hello::PacketRepr::parse(buffer)?),
                kind13::ERROR => Error(error::PacketRepr::parse(buffer)?),
                kind13::ECHO_REQUEST => EchoRequest(buffer.to_vec()),
                kind13::ECHO_REPLY => EchoReply(buffer.to_vec()),
                kind13::FEATURES_REQUEST => FeaturesRequest,
                kind13::FEATURES_REPLY => {
                    FeaturesReply13(features_reply::PacketRepr13::parse(buffer)?)
                }
                kind13::GET_CONFIG_REQUEST => GetConfigRequest,
                kind13::GET_CONFIG_REPLY => {
                    GetConfigReply(switch_config::PacketRepr::parse(buffer)?)
                }
                kind13::SET_CONFIG => SetConfig(switch_config::PacketRepr::parse(buffer)?),
                kind13::PACKET_IN => PacketIn13(packet_in::PacketRepr13::parse(buffer)?),
                kind13::FLOW_REMOVED => FlowRemoved13(flow_removed::PacketRepr13::parse(buffer)?),
                kind13::PACKET_OUT => PacketOut13(packet_out::PacketRepr13::parse(buffer)?),
                kind13::FLOW_MOD => FlowMod13(flow_mod::PacketRepr13::parse(buffer)?),
                kind13::GROUP_MOD => GroupMod(group_mod::PacketRepr::parse(buffer)?),
                kind13::PORT_MOD => PortMod13(port_mod::PacketRepr13::parse(buffer)?),
                kind13::MULTIPART_REQUEST => {
                    MultipartRequest(multipart::RequestRepr::parse(buffer)?)
                }
                kind13::MULTIPART_REPLY => MultipartReply(multipart::ReplyRepr::parse(buffer)?),
                kind13::BARRIER_REQUEST => BarrierRequest,
                kind13::BARRIER_REPLY => BarrierReply,
                _ => return Err(self::Error::Unrecognized),
            },
            _ => return Err(self::Error::Unrecognized),
        })
    }

    /// The version specific type code of this payload.
    pub fn kind(&self, version: Version) -> Result<u8> {
        use self::PayloadRepr::*;
        let code = match (version, self) {
            (Version::OpenFlow1Dot0, &Hello(_)) => kind10::HELLO,
            (Version::OpenFlow1Dot0, &Error(_)) => kind10::ERROR,
            (Version::OpenFlow1Dot0, &EchoRequest(_)) => kind10::ECHO_REQUEST,
            (Version::OpenFlow1Dot0, &EchoReply(_)) => kind10::ECHO_REPLY,
            (Version::OpenFlow1Dot0, &FeaturesRequest) => kind10::FEATURES_REQUEST,
            (Version::OpenFlow1Dot0, &FeaturesReply(_)) => kind10::FEATURES_REPLY,
            (Version::OpenFlow1Dot0, &GetConfigRequest) => kind10::GET_CONFIG_REQUEST,
            (Version::OpenFlow1Dot0, &GetConfigReply(_)) => kind10::GET_CONFIG_REPLY,
            (Version::OpenFlow1Dot0, &SetConfig(_)) => kind10::SET_CONFIG,
            (Version::OpenFlow1Dot0, &PacketIn(_)) => kind10::PACKET_IN,
            (Version::OpenFlow1Dot0, &FlowRemoved(_)) => kind10::FLOW_REMOVED,
            (Version::OpenFlow1Dot0, &PortStatus(_)) => kind10::PORT_STATUS,
            (Version::OpenFlow1Dot0, &PacketOut(_)) => kind10::PACKET_OUT,
            (Version::OpenFlow1Dot0, &FlowMod(_)) => kind10::FLOW_MOD,
            (Version::OpenFlow1Dot0, &PortMod(_)) => kind10::PORT_MOD,
            (Version::OpenFlow1Dot0, &StatsRequest(_)) => kind10::STATS_REQUEST,
            (Version::OpenFlow1Dot0, &StatsReply(_)) => kind10::STATS_REPLY,
            (Version::OpenFlow1Dot0, &BarrierRequest) => kind10::BARRIER_REQUEST,
            (Version::OpenFlow1Dot0, &BarrierReply) => kind10::BARRIER_REPLY,
            (Version::OpenFlow1Dot3, &Hello(_)) => kind13::HELLO,
            (Version::OpenFlow1Dot3, &Error(_)) => kind13::ERROR,
            (Version::OpenFlow1Dot3, &EchoRequest(_)) => kind13::ECHO_REQUEST,
            (Version::OpenFlow1Dot3, &EchoReply(_)) => kind13::ECHO_REPLY,
            (Version::OpenFlow1Dot3, &FeaturesRequest) => kind13::FEATURES_REQUEST,
            (Version::OpenFlow1Dot3, &FeaturesReply13(_)) => kind13::FEATURES_REPLY,
            (Version::OpenFlow1Dot3, &GetConfigRequest) => kind13::GET_CONFIG_REQUEST,
            (Version::OpenFlow1Dot3, &GetConfigReply(_)) => kind13::GET_CONFIG_REPLY,
            (Version::OpenFlow1Dot3, &SetConfig(_)) => kind13::SET_CONFIG,
            (Version::OpenFlow1Dot3, &PacketIn13(_)) => kind13::PACKET_IN,
            (Version::OpenFlow1Dot3, &FlowRemoved13(_)) => kind13::FLOW_REMOVED,
            (Version::OpenFlow1Dot3, &PacketOut13(_)) => kind13::PACKET_OUT,
            (Version::OpenFlow1Dot3, &FlowMod13(_)) => kind13::FLOW_MOD,
            (Version::OpenFlow1Dot3, &GroupMod(_)) => kind13::GROUP_MOD,
            (Version::OpenFlow1Dot3, &PortMod13(_)) => kind13::PORT_MOD,
            (Version::OpenFlow1Dot3, &MultipartRequest(_)) => kind13::MULTIPART_REQUEST,
            (Version::OpenFlow1Dot3, &MultipartReply(_)) => kind13::MULTIPART_REPLY,
            (Version::OpenFlow1Dot3, &BarrierRequest) => kind13::BARRIER_REQUEST,
            (Version::OpenFlow1Dot3, &BarrierReply) => kind13::BARRIER_REPLY,
            _ => return Err(self::Error::Malformed),
        };
        Ok(code)
    }

    fn buffer_len(&self) -> usize {
        use self::PayloadRepr::*;
        match *self {
            Hello(ref repr) => repr.buffer_len(),
            Error(ref repr) => repr.buffer_len(),
            EchoRequest(ref data) | EchoReply(ref data) => data.len(),
            FeaturesRequest | GetConfigRequest | BarrierRequest | BarrierReply => 0,
            FeaturesReply(ref repr) => repr.buffer_len(),
            FeaturesReply13(ref repr) => repr.buffer_len(),
            GetConfigReply(ref repr) | SetConfig(ref repr) => repr.buffer_len(),
            PacketIn(ref repr) => repr.buffer_len(),
            PacketIn13(ref repr) => repr.buffer_len(),
            FlowRemoved(ref repr) => repr.buffer_len(),
            FlowRemoved13(ref repr) => repr.buffer_len(),
            PortStatus(ref repr) => repr.buffer_len(),
            PacketOut(ref repr) => repr.buffer_len(),
            PacketOut13(ref repr) => repr.buffer_len(),
            FlowMod(ref repr) => repr.buffer_len(),
            FlowMod13(ref repr) => repr.buffer_len(),
            GroupMod(ref repr) => repr.buffer_len(),
            PortMod(ref repr) => repr.buffer_len(),
            PortMod13(ref repr) => repr.buffer_len(),
            StatsRequest(ref repr) => repr.buffer_len(),
            StatsReply(ref repr) => repr.buffer_len(),
            MultipartRequest(ref repr) => repr.buffer_len(),
            MultipartReply(ref repr) => repr.buffer_len(),
        }
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        use self::PayloadRepr::*;
        match *self {
            Hello(ref repr) => repr.emit(buffer),
            Error(ref repr) => repr.emit(buffer),
            EchoRequest(ref data) | EchoReply(ref data) => {
                if buffer.len() < data.len() {
                    Err(self::Error::Exhausted)
                } else {
                    Ok(buffer[..data.len()].copy_from_slice(data))
                }
            }
            FeaturesRequest | GetConfigRequest | BarrierRequest | BarrierReply => Ok(()),
            FeaturesReply(ref repr) => repr.emit(buffer),
            FeaturesReply13(ref repr) => repr.emit(buffer),
            GetConfigReply(ref repr) | SetConfig(ref repr) => repr.emit(buffer),
            PacketIn(ref repr) => repr.emit(buffer),
            PacketIn13(ref repr) => repr.emit(buffer),
            FlowRemoved(ref repr) => repr.emit(buffer),
            FlowRemoved13(ref repr) => repr.emit(buffer),
            PortStatus(ref repr) => repr.emit(buffer),
            PacketOut(ref repr) => repr.emit(buffer),
            PacketOut13(ref repr) => repr.emit(buffer),
            FlowMod(ref repr) => repr.emit(buffer),
            FlowMod13(ref repr) => repr.emit(buffer),
            GroupMod(ref repr) => repr.emit(buffer),
            PortMod(ref repr) => repr.emit(buffer),
            PortMod13(ref repr) => repr.emit(buffer),
            StatsRequest(ref repr) => repr.emit(buffer),
            StatsReply(ref repr) => repr.emit(buffer),
            MultipartRequest(ref repr) => repr.emit(buffer),
            MultipartReply(ref repr) => repr.emit(buffer),
        }
    }
}

/// A high-level representation of a whole OpenFlow message.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketRepr {
    pub version: Version,
    pub xid: u32,
    pub payload: PayloadRepr,
}

impl PacketRepr {
    pub fn new(version: Version, xid: u32, payload: PayloadRepr) -> Self {
        PacketRepr {
            version,
            xid,
            payload,
        }
    }

    /// Serialize into a fresh buffer of exactly the right size.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = vec![0; self.buffer_len()];
        self.emit(&mut buffer)?;
        Ok(buffer)
    }
}

impl Repr for PacketRepr {
    /// Parse an OpenFlow message and return a high-level representation.
    fn parse(buffer: &[u8]) -> Result<Self> {
        let packet = Packet::new_checked(buffer)?;
        Ok(PacketRepr {
            version: packet.version(),
            xid: packet.xid(),
            payload: PayloadRepr::parse(packet.version(), packet.kind(), packet.payload())?,
        })
    }

    fn buffer_len(&self) -> usize {
        HEADER_LEN + self.payload.buffer_len()
    }

    /// Emit a high-level representation into an OpenFlow message buffer.
    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        let len = self.buffer_len();
        if buffer.len() < len {
            return Err(Error::Exhausted);
        }
        let mut packet = Packet::new(buffer);
        packet.set_version(self.version);
        packet.set_kind(self.payload.kind(self.version)?);
        packet.set_length(len as u16);
        packet.set_xid(self.xid);
        self.payload.emit(packet.payload_mut())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Repr;

    #[test]
    fn hello_roundtrip() {
        let repr = PacketRepr::new(
            Version::OpenFlow1Dot0,
            7,
            PayloadRepr::Hello(hello::PacketRepr::default()),
        );
        let bytes = repr.to_bytes().unwrap();
        assert_eq!(&bytes[..], &[0x01, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x07]);
        assert_eq!(PacketRepr::parse(&bytes).unwrap(), repr);
    }

    #[test]
    fn version_specific_kinds() {
        // barrier request is 18 in 1.0 and 20 in 1.3
        let repr = PacketRepr::new(Version::OpenFlow1Dot0, 0, PayloadRepr::BarrierRequest);
        assert_eq!(repr.to_bytes().unwrap()[1], 18);
        let repr = PacketRepr::new(Version::OpenFlow1Dot3, 0, PayloadRepr::BarrierRequest);
        assert_eq!(repr.to_bytes().unwrap()[1], 20);
    }

    #[test]
    fn version_payload_mismatch() {
        let repr = PacketRepr::new(
            Version::OpenFlow1Dot0,
            0,
            PayloadRepr::MultipartRequest(::packets::multipart::RequestRepr::Desc),
        );
        assert_eq!(repr.to_bytes(), Err(::Error::Malformed));
    }

    #[test]
    fn echo_roundtrip() {
        let repr = PacketRepr::new(
            Version::OpenFlow1Dot0,
            3,
            PayloadRepr::EchoRequest(vec![1, 2, 3]),
        );
        let bytes = repr.to_bytes().unwrap();
        assert_eq!(PacketRepr::parse(&bytes).unwrap(), repr);
    }
}
