//! OpenFlow 1.0 flow match: a fixed tuple of twelve fields, a wildcard
//! bitmap, and CIDR-style masks for the two IPv4 fields.
//!
//! ```no_rust
//!  0      7        15       23       31
//! +--------+--------+--------+--------+
//! |             wildcards             |
//! +--------+--------+--------+--------+
//! |     in port     |     dl src      |
//! +--------+--------+--------+--------+
//! |              dl src               |
//! +--------+--------+--------+--------+
//! |              dl dst               |
//! +--------+--------+--------+--------+
//! |     dl dst      |     dl vlan     |
//! +--------+--------+--------+--------+
//! |vlan pcp|  pad   |     dl type     |
//! +--------+--------+--------+--------+
//! | nw tos |nw proto|       pad       |
//! +--------+--------+--------+--------+
//! |              nw src               |
//! +--------+--------+--------+--------+
//! |              nw dst               |
//! +--------+--------+--------+--------+
//! |     tp src      |     tp dst      |
//! +--------+--------+--------+--------+
//! ```

use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};
use smoltcp::wire::{EthernetAddress, Ipv4Address};

/// Ignore the ingress port.
pub const OFPFW_IN_PORT: u32 = 1 << 0;
/// Ignore the VLAN id.
pub const OFPFW_DL_VLAN: u32 = 1 << 1;
/// Ignore the Ethernet source address.
pub const OFPFW_DL_SRC: u32 = 1 << 2;
/// Ignore the Ethernet destination address.
pub const OFPFW_DL_DST: u32 = 1 << 3;
/// Ignore the Ethernet frame type.
pub const OFPFW_DL_TYPE: u32 = 1 << 4;
/// Ignore the IP protocol (or the ARP opcode).
pub const OFPFW_NW_PROTO: u32 = 1 << 5;
/// Ignore the TCP/UDP source port.
pub const OFPFW_TP_SRC: u32 = 1 << 6;
/// Ignore the TCP/UDP destination port.
pub const OFPFW_TP_DST: u32 = 1 << 7;
/// Offset of the IPv4 source prefix length, 6 bits wide. A value `n` widens
/// the comparison to ignore the `n` least significant address bits; 32 or
/// more wildcards the whole field.
pub const OFPFW_NW_SRC_SHIFT: u32 = 8;
/// Bits of the IPv4 source prefix length.
pub const OFPFW_NW_SRC_MASK: u32 = 0x3f << OFPFW_NW_SRC_SHIFT;
/// Offset of the IPv4 destination prefix length.
pub const OFPFW_NW_DST_SHIFT: u32 = 14;
/// Bits of the IPv4 destination prefix length.
pub const OFPFW_NW_DST_MASK: u32 = 0x3f << OFPFW_NW_DST_SHIFT;
/// Ignore the VLAN priority.
pub const OFPFW_DL_VLAN_PCP: u32 = 1 << 20;
/// Ignore the IP ToS byte.
pub const OFPFW_NW_TOS: u32 = 1 << 21;
/// Every field wildcarded.
pub const OFPFW_ALL: u32 = 0x003f_ffff;

mod field {
    use field::*;

    pub const WILDCARDS: Field = 0..4;
    pub const IN_PORT: Field = 4..6;
    pub const DL_SRC: Field = 6..12;
    pub const DL_DST: Field = 12..18;
    pub const DL_VLAN: Field = 18..20;
    pub const DL_VLAN_PCP: usize = 20;
    // one pad byte
    pub const DL_TYPE: Field = 22..24;
    pub const NW_TOS: usize = 24;
    pub const NW_PROTO: usize = 25;
    // two pad bytes
    pub const NW_SRC: Field = 28..32;
    pub const NW_DST: Field = 32..36;
    pub const TP_SRC: Field = 36..38;
    pub const TP_DST: Field = 38..40;
}

/// Length of the wire form, constant for OpenFlow 1.0.
pub const MATCH_LEN: usize = 40;

/// An OpenFlow 1.0 match. A field whose wildcard bit is set is "any"; the
/// IPv4 fields use a prefix length encoded in the wildcard bitmap instead
/// of a single bit.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Match {
    pub wildcards: u32,
    pub in_port: u16,
    pub dl_src: EthernetAddress,
    pub dl_dst: EthernetAddress,
    pub dl_vlan: u16,
    pub dl_vlan_pcp: u8,
    pub dl_type: u16,
    pub nw_tos: u8,
    pub nw_proto: u8,
    pub nw_src: Ipv4Address,
    pub nw_dst: Ipv4Address,
    pub tp_src: u16,
    pub tp_dst: u16,
}

impl Default for Match {
    /// A match with every field wildcarded.
    fn default() -> Match {
        Match {
            wildcards: OFPFW_ALL,
            in_port: 0,
            dl_src: EthernetAddress([0; 6]),
            dl_dst: EthernetAddress([0; 6]),
            dl_vlan: 0,
            dl_vlan_pcp: 0,
            dl_type: 0,
            nw_tos: 0,
            nw_proto: 0,
            nw_src: Ipv4Address([0; 4]),
            nw_dst: Ipv4Address([0; 4]),
            tp_src: 0,
            tp_dst: 0,
        }
    }
}

fn wc(wildcards: u32, bit: u32) -> bool {
    wildcards & bit != 0
}

/// Turn a prefix-length wildcard count into an "ignore" mask with ones on
/// the address bits that do not take part in the comparison.
fn nw_ignore_mask(wildcards: u32, shift: u32) -> u32 {
    let count = (wildcards >> shift) & 0x3f;
    if count >= 32 {
        !0
    } else {
        (1u32 << count) - 1
    }
}

fn ipv4_u32(addr: &Ipv4Address) -> u32 {
    NetworkEndian::read_u32(addr.as_bytes())
}

impl Match {
    /// Mark a field as exact. The IPv4 fields take their prefix length from
    /// the dedicated setters instead.
    pub fn exact(&mut self, bit: u32) -> &mut Self {
        self.wildcards &= !bit;
        self
    }

    /// Ignore mask for the IPv4 source comparison: ones on ignored bits.
    pub fn nw_src_mask(&self) -> u32 {
        nw_ignore_mask(self.wildcards, OFPFW_NW_SRC_SHIFT)
    }

    /// Ignore mask for the IPv4 destination comparison.
    pub fn nw_dst_mask(&self) -> u32 {
        nw_ignore_mask(self.wildcards, OFPFW_NW_DST_SHIFT)
    }

    /// Set the IPv4 source prefix length: the number of trailing address
    /// bits left out of the comparison (0 = exact, >= 32 = any).
    pub fn set_nw_src_wildcard(&mut self, ignored_bits: u32) -> &mut Self {
        self.wildcards =
            (self.wildcards & !OFPFW_NW_SRC_MASK) | ((ignored_bits & 0x3f) << OFPFW_NW_SRC_SHIFT);
        self
    }

    /// Set the IPv4 destination prefix length.
    pub fn set_nw_dst_wildcard(&mut self, ignored_bits: u32) -> &mut Self {
        self.wildcards =
            (self.wildcards & !OFPFW_NW_DST_MASK) | ((ignored_bits & 0x3f) << OFPFW_NW_DST_SHIFT);
        self
    }
}

fn strict_wild(a_eq_b: bool, aw: bool, bw: bool) -> bool {
    (aw && bw) || (!aw && !bw && a_eq_b)
}

fn strict_nw(a: u32, b: u32, am: u32, bm: u32) -> bool {
    am == bm && ((a ^ b) & !am) == 0
}

fn nonstrict_wild(a_eq_b: bool, aw: bool, bw: bool) -> bool {
    (aw && bw) || (!bw && (aw || a_eq_b))
}

fn nonstrict_nw(a: u32, b: u32, am: u32, bm: u32) -> bool {
    // every bit masked by b is masked by a, and bits visible in both agree
    (bm & !am) == 0 && ((a ^ b) & !am) == 0
}

fn pkt_wild(a_eq_b: bool, aw: bool) -> bool {
    aw || a_eq_b
}

fn pkt_nw(a: u32, b: u32, am: u32) -> bool {
    ((a ^ b) & !am) == 0
}

/// True iff for every field the wildcard bits of `a` and `b` are equal and
/// the values are equal whenever the field is not wildcarded. The IPv4
/// fields compare for equal masks and equal values on the unmasked bits.
pub fn strict_match(a: &Match, b: &Match) -> bool {
    let (aw, bw) = (a.wildcards, b.wildcards);
    strict_wild(a.in_port == b.in_port, wc(aw, OFPFW_IN_PORT), wc(bw, OFPFW_IN_PORT))
        && strict_wild(a.dl_src == b.dl_src, wc(aw, OFPFW_DL_SRC), wc(bw, OFPFW_DL_SRC))
        && strict_wild(a.dl_dst == b.dl_dst, wc(aw, OFPFW_DL_DST), wc(bw, OFPFW_DL_DST))
        && strict_wild(a.dl_vlan == b.dl_vlan, wc(aw, OFPFW_DL_VLAN), wc(bw, OFPFW_DL_VLAN))
        && strict_wild(
            a.dl_vlan_pcp == b.dl_vlan_pcp,
            wc(aw, OFPFW_DL_VLAN_PCP),
            wc(bw, OFPFW_DL_VLAN_PCP),
        )
        && strict_wild(a.dl_type == b.dl_type, wc(aw, OFPFW_DL_TYPE), wc(bw, OFPFW_DL_TYPE))
        && strict_wild(a.nw_tos == b.nw_tos, wc(aw, OFPFW_NW_TOS), wc(bw, OFPFW_NW_TOS))
        && strict_wild(a.nw_proto == b.nw_proto, wc(aw, OFPFW_NW_PROTO), wc(bw, OFPFW_NW_PROTO))
        && strict_nw(ipv4_u32(&a.nw_src), ipv4_u32(&b.nw_src), a.nw_src_mask(), b.nw_src_mask())
        && strict_nw(ipv4_u32(&a.nw_dst), ipv4_u32(&b.nw_dst), a.nw_dst_mask(), b.nw_dst_mask())
        && strict_wild(a.tp_src == b.tp_src, wc(aw, OFPFW_TP_SRC), wc(bw, OFPFW_TP_SRC))
        && strict_wild(a.tp_dst == b.tp_dst, wc(aw, OFPFW_TP_DST), wc(bw, OFPFW_TP_DST))
}

/// True iff `a` is at least as general as `b`: for every field either both
/// are wildcarded, or `a` is wildcarded, or neither is and the values are
/// equal. On the IPv4 fields every bit `b` masks must also be masked in
/// `a`, and bits `b` leaves visible must be masked in `a` or agree.
pub fn nonstrict_match(a: &Match, b: &Match) -> bool {
    let (aw, bw) = (a.wildcards, b.wildcards);
    nonstrict_wild(a.in_port == b.in_port, wc(aw, OFPFW_IN_PORT), wc(bw, OFPFW_IN_PORT))
        && nonstrict_wild(a.dl_src == b.dl_src, wc(aw, OFPFW_DL_SRC), wc(bw, OFPFW_DL_SRC))
        && nonstrict_wild(a.dl_dst == b.dl_dst, wc(aw, OFPFW_DL_DST), wc(bw, OFPFW_DL_DST))
        && nonstrict_wild(a.dl_vlan == b.dl_vlan, wc(aw, OFPFW_DL_VLAN), wc(bw, OFPFW_DL_VLAN))
        && nonstrict_wild(
            a.dl_vlan_pcp == b.dl_vlan_pcp,
            wc(aw, OFPFW_DL_VLAN_PCP),
            wc(bw, OFPFW_DL_VLAN_PCP),
        )
        && nonstrict_wild(a.dl_type == b.dl_type, wc(aw, OFPFW_DL_TYPE), wc(bw, OFPFW_DL_TYPE))
        && nonstrict_wild(a.nw_tos == b.nw_tos, wc(aw, OFPFW_NW_TOS), wc(bw, OFPFW_NW_TOS))
        && nonstrict_wild(a.nw_proto == b.nw_proto, wc(aw, OFPFW_NW_PROTO), wc(bw, OFPFW_NW_PROTO))
        && nonstrict_nw(ipv4_u32(&a.nw_src), ipv4_u32(&b.nw_src), a.nw_src_mask(), b.nw_src_mask())
        && nonstrict_nw(ipv4_u32(&a.nw_dst), ipv4_u32(&b.nw_dst), a.nw_dst_mask(), b.nw_dst_mask())
        && nonstrict_wild(a.tp_src == b.tp_src, wc(aw, OFPFW_TP_SRC), wc(bw, OFPFW_TP_SRC))
        && nonstrict_wild(a.tp_dst == b.tp_dst, wc(aw, OFPFW_TP_DST), wc(bw, OFPFW_TP_DST))
}

/// One-sided variant for matching an on-the-wire packet against an
/// installed flow: `pkt` carries no wildcards, a field matches if the flow
/// wildcards it or the values agree.
pub fn pkt_match(flow: &Match, pkt: &Match) -> bool {
    let aw = flow.wildcards;
    pkt_wild(flow.in_port == pkt.in_port, wc(aw, OFPFW_IN_PORT))
        && pkt_wild(flow.dl_src == pkt.dl_src, wc(aw, OFPFW_DL_SRC))
        && pkt_wild(flow.dl_dst == pkt.dl_dst, wc(aw, OFPFW_DL_DST))
        && pkt_wild(flow.dl_vlan == pkt.dl_vlan, wc(aw, OFPFW_DL_VLAN))
        && pkt_wild(flow.dl_vlan_pcp == pkt.dl_vlan_pcp, wc(aw, OFPFW_DL_VLAN_PCP))
        && pkt_wild(flow.dl_type == pkt.dl_type, wc(aw, OFPFW_DL_TYPE))
        && pkt_wild(flow.tp_src == pkt.tp_src, wc(aw, OFPFW_TP_SRC))
        && pkt_wild(flow.tp_dst == pkt.tp_dst, wc(aw, OFPFW_TP_DST))
        && pkt_wild(flow.nw_tos == pkt.nw_tos, wc(aw, OFPFW_NW_TOS))
        && pkt_wild(flow.nw_proto == pkt.nw_proto, wc(aw, OFPFW_NW_PROTO))
        && pkt_nw(ipv4_u32(&flow.nw_src), ipv4_u32(&pkt.nw_src), flow.nw_src_mask())
        && pkt_nw(ipv4_u32(&flow.nw_dst), ipv4_u32(&pkt.nw_dst), flow.nw_dst_mask())
}

impl Repr for Match {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < MATCH_LEN {
            return Err(Error::Truncated);
        }
        Ok(Match {
            wildcards: NetworkEndian::read_u32(&buffer[field::WILDCARDS]),
            in_port: NetworkEndian::read_u16(&buffer[field::IN_PORT]),
            dl_src: EthernetAddress::from_bytes(&buffer[field::DL_SRC]),
            dl_dst: EthernetAddress::from_bytes(&buffer[field::DL_DST]),
            dl_vlan: NetworkEndian::read_u16(&buffer[field::DL_VLAN]),
            dl_vlan_pcp: buffer[field::DL_VLAN_PCP],
            dl_type: NetworkEndian::read_u16(&buffer[field::DL_TYPE]),
            nw_tos: buffer[field::NW_TOS],
            nw_proto: buffer[field::NW_PROTO],
            nw_src: Ipv4Address::from_bytes(&buffer[field::NW_SRC]),
            nw_dst: Ipv4Address::from_bytes(&buffer[field::NW_DST]),
            tp_src: NetworkEndian::read_u16(&buffer[field::TP_SRC]),
            tp_dst: NetworkEndian::read_u16(&buffer[field::TP_DST]),
        })
    }

    fn buffer_len(&self) -> usize {
        MATCH_LEN
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < MATCH_LEN {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..MATCH_LEN].iter_mut() {
            *byte = 0;
        }
        NetworkEndian::write_u32(&mut buffer[field::WILDCARDS], self.wildcards);
        NetworkEndian::write_u16(&mut buffer[field::IN_PORT], self.in_port);
        buffer[field::DL_SRC].copy_from_slice(self.dl_src.as_bytes());
        buffer[field::DL_DST].copy_from_slice(self.dl_dst.as_bytes());
        NetworkEndian::write_u16(&mut buffer[field::DL_VLAN], self.dl_vlan);
        buffer[field::DL_VLAN_PCP] = self.dl_vlan_pcp;
        NetworkEndian::write_u16(&mut buffer[field::DL_TYPE], self.dl_type);
        buffer[field::NW_TOS] = self.nw_tos;
        buffer[field::NW_PROTO] = self.nw_proto;
        buffer[field::NW_SRC].copy_from_slice(self.nw_src.as_bytes());
        buffer[field::NW_DST].copy_from_slice(self.nw_dst.as_bytes());
        NetworkEndian::write_u16(&mut buffer[field::TP_SRC], self.tp_src);
        NetworkEndian::write_u16(&mut buffer[field::TP_DST], self.tp_dst);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn exact_dl_dst(addr: [u8; 6]) -> Match {
        let mut m = Match::default();
        m.exact(OFPFW_DL_DST);
        m.dl_dst = EthernetAddress(addr);
        m
    }

    #[test]
    fn reflexivity() {
        let any = Match::default();
        assert!(strict_match(&any, &any));
        assert!(nonstrict_match(&any, &any));

        let m = exact_dl_dst([0, 1, 2, 3, 4, 5]);
        assert!(strict_match(&m, &m));
        assert!(nonstrict_match(&m, &m));
    }

    #[test]
    fn strict_implies_nonstrict() {
        let a = exact_dl_dst([0, 1, 2, 3, 4, 5]);
        let b = exact_dl_dst([0, 1, 2, 3, 4, 5]);
        assert!(strict_match(&a, &b));
        assert!(nonstrict_match(&a, &b));
    }

    #[test]
    fn nonstrict_is_one_sided() {
        let any = Match::default();
        let m = exact_dl_dst([0, 1, 2, 3, 4, 5]);
        // "any" is at least as general as m, not the other way around
        assert!(nonstrict_match(&any, &m));
        assert!(!nonstrict_match(&m, &any));
        assert!(!strict_match(&any, &m));
    }

    #[test]
    fn nw_prefix() {
        let mut flow = Match::default();
        flow.set_nw_dst_wildcard(8);
        flow.nw_dst = Ipv4Address([10, 0, 0, 0]);

        let mut pkt = Match::default();
        pkt.wildcards = 0;
        pkt.nw_dst = Ipv4Address([10, 0, 0, 42]);
        assert!(pkt_match(&flow, &pkt));

        pkt.nw_dst = Ipv4Address([10, 0, 1, 42]);
        assert!(!pkt_match(&flow, &pkt));
    }

    #[test]
    fn prefix_mask_bounds() {
        let mut m = Match::default();
        m.set_nw_src_wildcard(0);
        assert_eq!(m.nw_src_mask(), 0);
        m.set_nw_src_wildcard(32);
        assert_eq!(m.nw_src_mask(), !0);
        m.set_nw_src_wildcard(1);
        assert_eq!(m.nw_src_mask(), 1);
    }

    #[test]
    fn emit_parse() {
        let mut m = exact_dl_dst([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        m.exact(OFPFW_IN_PORT);
        m.in_port = 3;
        let mut buf = [0xff; MATCH_LEN];
        m.emit(&mut buf).unwrap();
        assert_eq!(Match::parse(&buf).unwrap(), m);
    }
}
