//! Typed header slots over a raw Ethernet frame.
//!
//! `HeaderStack::parse` deconstructs a frame into per-protocol slots
//! (presence plus the fields the flow tables care about), match synthesis
//! reads the slots, and the set-field actions mutate the frame in place
//! through the slot offsets so later actions observe earlier rewrites.
//! The stack is a plain value local to each `handle_packet` call, which
//! keeps packet handling re-entrant for pipeline recursion.

use byteorder::{ByteOrder, NetworkEndian};
use smoltcp::wire::{EthernetAddress, IpAddress, Ipv4Address, Ipv4Packet, TcpPacket, UdpPacket};

use flow_match::Match;
use link::{self, ETHERNET_HEADER_LEN};
use oxm::{FlowMatch, OxmField};

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_IPV6: u16 = 0x86dd;

pub const IP_PROTO_ICMP: u8 = 1;
pub const IP_PROTO_TCP: u8 = 6;
pub const IP_PROTO_UDP: u8 = 17;
pub const IP_PROTO_ICMPV6: u8 = 58;

#[derive(Debug, Clone, Copy)]
pub struct EthSlot {
    pub src: EthernetAddress,
    pub dst: EthernetAddress,
    pub length_type: u16,
    /// EtherType after resolving a length interpretation through LLC.
    pub protocol: u16,
    /// Offset of the layer-3 payload.
    pub payload_offset: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ArpSlot {
    pub offset: usize,
    pub op: u16,
    pub sha: EthernetAddress,
    pub spa: Ipv4Address,
    pub tha: EthernetAddress,
    pub tpa: Ipv4Address,
}

#[derive(Debug, Clone, Copy)]
pub struct Ipv4Slot {
    pub offset: usize,
    pub header_len: usize,
    pub total_len: usize,
    pub tos: u8,
    pub protocol: u8,
    pub src: Ipv4Address,
    pub dst: Ipv4Address,
}

#[derive(Debug, Clone, Copy)]
pub struct Ipv6Slot {
    pub offset: usize,
    pub next_header: u8,
    pub flow_label: u32,
    pub src: [u8; 16],
    pub dst: [u8; 16],
}

#[derive(Debug, Clone, Copy)]
pub struct L4Slot {
    pub offset: usize,
    /// One past the last payload byte, bounded by the IP total length.
    pub end: usize,
    pub src_port: u16,
    pub dst_port: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct IcmpSlot {
    pub offset: usize,
    pub msg_type: u8,
    pub msg_code: u8,
}

/// The deconstructed view of one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderStack {
    pub eth: Option<EthSlot>,
    pub arp: Option<ArpSlot>,
    pub ipv4: Option<Ipv4Slot>,
    pub ipv6: Option<Ipv6Slot>,
    pub icmpv4: Option<IcmpSlot>,
    pub icmpv6: Option<IcmpSlot>,
    pub tcp: Option<L4Slot>,
    pub udp: Option<L4Slot>,
}

impl HeaderStack {
    /// Deconstruct a frame. Only a missing or truncated Ethernet header is
    /// an error; anything unrecognized above it simply leaves slots empty.
    pub fn parse(frame: &[u8]) -> ::Result<HeaderStack> {
        if frame.len() < ETHERNET_HEADER_LEN {
            return Err(::Error::Truncated);
        }
        let mut stack = HeaderStack::default();
        let dst = EthernetAddress::from_bytes(&frame[0..6]);
        let src = EthernetAddress::from_bytes(&frame[6..12]);
        let length_type = NetworkEndian::read_u16(&frame[12..14]);

        let (protocol, payload_offset, payload_end) =
            if length_type <= link::MAX_LENGTH_INTERPRETATION {
                let span = length_type as usize;
                if frame.len() < ETHERNET_HEADER_LEN + span || span < link::llc::HEADER_LEN {
                    return Err(::Error::Truncated);
                }
                match link::llc::parse(&frame[ETHERNET_HEADER_LEN..ETHERNET_HEADER_LEN + span]) {
                    Ok(protocol) => (
                        protocol,
                        ETHERNET_HEADER_LEN + link::llc::HEADER_LEN,
                        ETHERNET_HEADER_LEN + span,
                    ),
                    Err(_) => (0, ETHERNET_HEADER_LEN, frame.len()),
                }
            } else {
                (length_type, ETHERNET_HEADER_LEN, frame.len())
            };

        stack.eth = Some(EthSlot {
            src,
            dst,
            length_type,
            protocol,
            payload_offset,
        });

        let l3 = &frame[payload_offset..payload_end];
        match protocol {
            ETHERTYPE_ARP => stack.parse_arp(payload_offset, l3),
            ETHERTYPE_IPV4 => stack.parse_ipv4(payload_offset, l3),
            ETHERTYPE_IPV6 => stack.parse_ipv6(payload_offset, l3),
            _ => {}
        }
        Ok(stack)
    }

    fn parse_arp(&mut self, offset: usize, buffer: &[u8]) {
        // htype(2) ptype(2) hlen(1) plen(1) oper(2) sha(6) spa(4) tha(6) tpa(4)
        if buffer.len() < 28 {
            return;
        }
        self.arp = Some(ArpSlot {
            offset,
            op: NetworkEndian::read_u16(&buffer[6..8]),
            sha: EthernetAddress::from_bytes(&buffer[8..14]),
            spa: Ipv4Address::from_bytes(&buffer[14..18]),
            tha: EthernetAddress::from_bytes(&buffer[18..24]),
            tpa: Ipv4Address::from_bytes(&buffer[24..28]),
        });
    }

    fn parse_ipv4(&mut self, offset: usize, buffer: &[u8]) {
        if buffer.len() < 20 {
            return;
        }
        let header_len = ((buffer[0] & 0x0f) as usize) * 4;
        let total_len = NetworkEndian::read_u16(&buffer[2..4]) as usize;
        if header_len < 20 || buffer.len() < header_len || total_len < header_len {
            return;
        }
        let total_len = total_len.min(buffer.len());
        let slot = Ipv4Slot {
            offset,
            header_len,
            total_len,
            tos: buffer[1],
            protocol: buffer[9],
            src: Ipv4Address::from_bytes(&buffer[12..16]),
            dst: Ipv4Address::from_bytes(&buffer[16..20]),
        };
        self.ipv4 = Some(slot);
        self.parse_l4(
            slot.protocol,
            offset + header_len,
            &buffer[header_len..total_len],
        );
    }

    fn parse_ipv6(&mut self, offset: usize, buffer: &[u8]) {
        if buffer.len() < 40 {
            return;
        }
        let next_header = buffer[6];
        let flow_label = NetworkEndian::read_u32(&buffer[0..4]) & 0x000f_ffff;
        let mut src = [0; 16];
        src.copy_from_slice(&buffer[8..24]);
        let mut dst = [0; 16];
        dst.copy_from_slice(&buffer[24..40]);
        self.ipv6 = Some(Ipv6Slot {
            offset,
            next_header,
            flow_label,
            src,
            dst,
        });
        self.parse_l4(next_header, offset + 40, &buffer[40..]);
    }

    fn parse_l4(&mut self, protocol: u8, offset: usize, buffer: &[u8]) {
        match protocol {
            IP_PROTO_TCP if buffer.len() >= 20 => {
                self.tcp = Some(L4Slot {
                    offset,
                    end: offset + buffer.len(),
                    src_port: NetworkEndian::read_u16(&buffer[0..2]),
                    dst_port: NetworkEndian::read_u16(&buffer[2..4]),
                });
            }
            IP_PROTO_UDP if buffer.len() >= 8 => {
                self.udp = Some(L4Slot {
                    offset,
                    end: offset + buffer.len(),
                    src_port: NetworkEndian::read_u16(&buffer[0..2]),
                    dst_port: NetworkEndian::read_u16(&buffer[2..4]),
                });
            }
            IP_PROTO_ICMP if buffer.len() >= 4 => {
                self.icmpv4 = Some(IcmpSlot {
                    offset,
                    msg_type: buffer[0],
                    msg_code: buffer[1],
                });
            }
            IP_PROTO_ICMPV6 if buffer.len() >= 4 => {
                self.icmpv6 = Some(IcmpSlot {
                    offset,
                    msg_type: buffer[0],
                    msg_code: buffer[1],
                });
            }
            _ => {}
        }
    }

    /// Synthesize the packet-side 1.0 match: present fields carry their
    /// values, absent ones stay zero, and no wildcard bits are set since a
    /// packet wildcards nothing.
    pub fn to_match(&self, in_port: u16) -> Match {
        let mut m = Match::default();
        m.wildcards = 0;
        m.in_port = in_port;
        if let Some(ref tcp) = self.tcp {
            m.tp_src = tcp.src_port;
            m.tp_dst = tcp.dst_port;
        }
        if let Some(ref udp) = self.udp {
            m.tp_src = udp.src_port;
            m.tp_dst = udp.dst_port;
        }
        if let Some(ref ipv4) = self.ipv4 {
            m.nw_tos = ipv4.tos;
            m.nw_proto = ipv4.protocol;
            m.nw_src = ipv4.src;
            m.nw_dst = ipv4.dst;
            if ipv4.protocol == IP_PROTO_ICMP {
                if let Some(ref icmp) = self.icmpv4 {
                    m.tp_src = icmp.msg_type as u16;
                    m.tp_dst = icmp.msg_code as u16;
                }
            }
        }
        if let Some(ref arp) = self.arp {
            m.nw_proto = arp.op as u8;
            m.nw_src = arp.spa;
            m.nw_dst = arp.tpa;
        }
        if let Some(ref eth) = self.eth {
            m.dl_src = eth.src;
            m.dl_dst = eth.dst;
            m.dl_type = eth.protocol;
            // VLAN tags are not modelled
            m.dl_vlan = 0;
        }
        m
    }

    /// Synthesize the packet-side 1.3 OXM match from the present slots.
    pub fn to_oxm_match(&self, in_port: u32) -> FlowMatch {
        let mut m = FlowMatch::default();
        m.push(OxmField::InPort(in_port));
        if let Some(ref eth) = self.eth {
            m.push(OxmField::EthernetSource(eth.src, None));
            m.push(OxmField::EthernetDestination(eth.dst, None));
            m.push(OxmField::EthernetType(eth.protocol));
            m.push(OxmField::VlanId(0, None));
        }
        if let Some(ref tcp) = self.tcp {
            m.push(OxmField::TcpSource(tcp.src_port));
            m.push(OxmField::TcpDestination(tcp.dst_port));
        }
        if let Some(ref udp) = self.udp {
            m.push(OxmField::UdpSource(udp.src_port));
            m.push(OxmField::UdpDestination(udp.dst_port));
        }
        if let Some(ref ipv4) = self.ipv4 {
            m.push(OxmField::IpDscp(ipv4.tos >> 2));
            m.push(OxmField::IpEcn(ipv4.tos & 0x03));
            m.push(OxmField::IpProtocol(ipv4.protocol));
            m.push(OxmField::Ipv4Source(ipv4.src, None));
            m.push(OxmField::Ipv4Destination(ipv4.dst, None));
            if let Some(ref icmp) = self.icmpv4 {
                m.push(OxmField::IcmpType(icmp.msg_type));
                m.push(OxmField::IcmpCode(icmp.msg_code));
            }
        }
        if let Some(ref ipv6) = self.ipv6 {
            m.push(OxmField::Ipv6Source(ipv6.src, None));
            m.push(OxmField::Ipv6Destination(ipv6.dst, None));
            m.push(OxmField::Ipv6FlowLabel(ipv6.flow_label, None));
            if let Some(ref icmp) = self.icmpv6 {
                m.push(OxmField::Icmpv6Type(icmp.msg_type));
                m.push(OxmField::Icmpv6Code(icmp.msg_code));
            }
        }
        if let Some(ref arp) = self.arp {
            m.push(OxmField::ArpOpCode(arp.op));
            m.push(OxmField::ArpSpa(arp.spa, None));
            m.push(OxmField::ArpTpa(arp.tpa, None));
            m.push(OxmField::ArpSha(arp.sha, None));
            m.push(OxmField::ArpTha(arp.tha, None));
        }
        m
    }

    /// Rewrite the Ethernet source address.
    pub fn set_dl_src(&mut self, frame: &mut [u8], addr: EthernetAddress) {
        if let Some(ref mut eth) = self.eth {
            frame[6..12].copy_from_slice(addr.as_bytes());
            eth.src = addr;
        }
    }

    /// Rewrite the Ethernet destination address.
    pub fn set_dl_dst(&mut self, frame: &mut [u8], addr: EthernetAddress) {
        if let Some(ref mut eth) = self.eth {
            frame[0..6].copy_from_slice(addr.as_bytes());
            eth.dst = addr;
        }
    }

    /// Rewrite the network source address on whichever IP header is
    /// present. An IPv6 header takes the 4 byte value into its low bytes.
    pub fn set_nw_src(&mut self, frame: &mut [u8], addr: Ipv4Address) {
        if let Some(ref mut slot) = self.ipv4 {
            frame[slot.offset + 12..slot.offset + 16].copy_from_slice(addr.as_bytes());
            slot.src = addr;
        } else if let Some(ref mut slot) = self.ipv6 {
            frame[slot.offset + 20..slot.offset + 24].copy_from_slice(addr.as_bytes());
            slot.src[12..16].copy_from_slice(addr.as_bytes());
        }
        self.refresh_ipv4_checksums(frame);
    }

    /// Rewrite the network destination address.
    pub fn set_nw_dst(&mut self, frame: &mut [u8], addr: Ipv4Address) {
        if let Some(ref mut slot) = self.ipv4 {
            frame[slot.offset + 16..slot.offset + 20].copy_from_slice(addr.as_bytes());
            slot.dst = addr;
        } else if let Some(ref mut slot) = self.ipv6 {
            frame[slot.offset + 36..slot.offset + 40].copy_from_slice(addr.as_bytes());
            slot.dst[12..16].copy_from_slice(addr.as_bytes());
        }
        self.refresh_ipv4_checksums(frame);
    }

    /// Rewrite the IPv4 ToS byte.
    pub fn set_nw_tos(&mut self, frame: &mut [u8], tos: u8) {
        if let Some(ref mut slot) = self.ipv4 {
            frame[slot.offset + 1] = tos;
            slot.tos = tos;
        } else {
            return;
        }
        self.refresh_ipv4_checksums(frame);
    }

    /// Rewrite the transport source port on TCP or UDP, whichever is
    /// present.
    pub fn set_tp_src(&mut self, frame: &mut [u8], port: u16) {
        if let Some(ref mut slot) = self.tcp {
            NetworkEndian::write_u16(&mut frame[slot.offset..slot.offset + 2], port);
            slot.src_port = port;
        } else if let Some(ref mut slot) = self.udp {
            NetworkEndian::write_u16(&mut frame[slot.offset..slot.offset + 2], port);
            slot.src_port = port;
        } else {
            return;
        }
        self.refresh_ipv4_checksums(frame);
    }

    /// Rewrite the transport destination port.
    pub fn set_tp_dst(&mut self, frame: &mut [u8], port: u16) {
        if let Some(ref mut slot) = self.tcp {
            NetworkEndian::write_u16(&mut frame[slot.offset + 2..slot.offset + 4], port);
            slot.dst_port = port;
        } else if let Some(ref mut slot) = self.udp {
            NetworkEndian::write_u16(&mut frame[slot.offset + 2..slot.offset + 4], port);
            slot.dst_port = port;
        } else {
            return;
        }
        self.refresh_ipv4_checksums(frame);
    }

    /// Recompute the IPv4 header checksum and, for TCP/UDP over IPv4, the
    /// transport pseudo-header checksum. IPv6 carries no header checksum.
    fn refresh_ipv4_checksums(&self, frame: &mut [u8]) {
        let ipv4 = match self.ipv4 {
            Some(ipv4) => ipv4,
            None => return,
        };
        {
            let header = &mut frame[ipv4.offset..ipv4.offset + ipv4.header_len];
            let mut packet = Ipv4Packet::new(header);
            packet.fill_checksum();
        }
        let src = IpAddress::Ipv4(ipv4.src);
        let dst = IpAddress::Ipv4(ipv4.dst);
        if let Some(slot) = self.tcp {
            let mut packet = TcpPacket::new(&mut frame[slot.offset..slot.end]);
            packet.fill_checksum(&src, &dst);
        }
        if let Some(slot) = self.udp {
            let mut packet = UdpPacket::new(&mut frame[slot.offset..slot.end]);
            packet.fill_checksum(&src, &dst);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use link::build_frame;

    fn udp_packet(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let mut l4 = vec![0u8; 8 + payload.len()];
        NetworkEndian::write_u16(&mut l4[0..2], src_port);
        NetworkEndian::write_u16(&mut l4[2..4], dst_port);
        let l4_len = l4.len() as u16;
        NetworkEndian::write_u16(&mut l4[4..6], l4_len);
        l4[8..].copy_from_slice(payload);
        l4
    }

    fn ipv4_packet(src: [u8; 4], dst: [u8; 4], protocol: u8, payload: &[u8]) -> Vec<u8> {
        let mut ip = vec![0u8; 20 + payload.len()];
        ip[0] = 0x45;
        let ip_len = ip.len() as u16;
        NetworkEndian::write_u16(&mut ip[2..4], ip_len);
        ip[8] = 64;
        ip[9] = protocol;
        ip[12..16].copy_from_slice(&src);
        ip[16..20].copy_from_slice(&dst);
        ip[20..].copy_from_slice(payload);
        {
            let mut packet = Ipv4Packet::new(&mut ip[..]);
            packet.fill_checksum();
        }
        ip
    }

    fn sample_frame() -> Vec<u8> {
        let udp = udp_packet(5000, 53, b"query");
        let ip = ipv4_packet([10, 0, 0, 1], [10, 0, 0, 2], IP_PROTO_UDP, &udp);
        build_frame(
            EthernetAddress([2, 0, 0, 0, 0, 1]),
            EthernetAddress([2, 0, 0, 0, 0, 2]),
            ETHERTYPE_IPV4,
            &ip,
        )
    }

    #[test]
    fn parse_udp_over_ipv4() {
        let frame = sample_frame();
        let stack = HeaderStack::parse(&frame).unwrap();
        let eth = stack.eth.unwrap();
        assert_eq!(eth.protocol, ETHERTYPE_IPV4);
        let ipv4 = stack.ipv4.unwrap();
        assert_eq!(ipv4.src, Ipv4Address([10, 0, 0, 1]));
        assert_eq!(ipv4.protocol, IP_PROTO_UDP);
        let udp = stack.udp.unwrap();
        assert_eq!((udp.src_port, udp.dst_port), (5000, 53));
        assert!(stack.tcp.is_none());
        assert!(stack.arp.is_none());
    }

    #[test]
    fn match_synthesis() {
        let frame = sample_frame();
        let stack = HeaderStack::parse(&frame).unwrap();
        let m = stack.to_match(3);
        assert_eq!(m.in_port, 3);
        assert_eq!(m.wildcards, 0);
        assert_eq!(m.dl_type, ETHERTYPE_IPV4);
        assert_eq!(m.nw_src, Ipv4Address([10, 0, 0, 1]));
        assert_eq!(m.tp_dst, 53);
    }

    #[test]
    fn rewrite_observed_by_later_reads() {
        let mut frame = sample_frame();
        let mut stack = HeaderStack::parse(&frame).unwrap();
        stack.set_nw_dst(&mut frame, Ipv4Address([192, 168, 1, 1]));
        stack.set_tp_dst(&mut frame, 8053);

        // the mutated frame reparses to the new values
        let reparsed = HeaderStack::parse(&frame).unwrap();
        assert_eq!(reparsed.ipv4.unwrap().dst, Ipv4Address([192, 168, 1, 1]));
        assert_eq!(reparsed.udp.unwrap().dst_port, 8053);
        // and the in-memory view followed along
        assert_eq!(stack.ipv4.unwrap().dst, Ipv4Address([192, 168, 1, 1]));
    }

    #[test]
    fn ipv4_checksum_stays_valid() {
        let mut frame = sample_frame();
        let mut stack = HeaderStack::parse(&frame).unwrap();
        stack.set_nw_src(&mut frame, Ipv4Address([172, 16, 0, 9]));
        let off = stack.ipv4.unwrap().offset;
        let len = stack.ipv4.unwrap().header_len;
        let packet = Ipv4Packet::new(&frame[off..off + len]);
        assert!(packet.verify_checksum());
    }

    #[test]
    fn arp_fields() {
        let mut arp = vec![0u8; 28];
        NetworkEndian::write_u16(&mut arp[0..2], 1);
        NetworkEndian::write_u16(&mut arp[2..4], ETHERTYPE_IPV4);
        arp[4] = 6;
        arp[5] = 4;
        NetworkEndian::write_u16(&mut arp[6..8], 1); // request
        arp[8..14].copy_from_slice(&[2, 0, 0, 0, 0, 1]);
        arp[14..18].copy_from_slice(&[10, 0, 0, 1]);
        arp[24..28].copy_from_slice(&[10, 0, 0, 2]);
        let frame = build_frame(
            EthernetAddress([2, 0, 0, 0, 0, 1]),
            EthernetAddress([0xff; 6]),
            ETHERTYPE_ARP,
            &arp,
        );
        let stack = HeaderStack::parse(&frame).unwrap();
        let slot = stack.arp.unwrap();
        assert_eq!(slot.op, 1);
        assert_eq!(slot.spa, Ipv4Address([10, 0, 0, 1]));
        let m = stack.to_match(1);
        assert_eq!(m.nw_proto, 1);
        assert_eq!(m.nw_dst, Ipv4Address([10, 0, 0, 2]));
    }
}
