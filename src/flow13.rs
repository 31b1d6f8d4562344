//! An installed OpenFlow 1.3 flow and the three match predicates over OXM
//! TLV lists. A field absent from a match is fully wildcarded; a field
//! mask has one bits on the positions that take part in the comparison.

use oxm::{FlowMatch, OxmField};
use packets::flow_removed;
use packets::instructions::InstructionSet;
use packets::multipart;
use sim::{EventId, Nanos, NANOS_PER_SEC};

#[derive(Debug, Clone)]
pub struct Flow13 {
    /// Unique per-table install id, used by timer events to check the flow
    /// still lives in the table when they fire.
    pub id: u64,
    pub table_id: u8,
    pub priority: u16,
    pub install_time: Nanos,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub cookie: u64,
    pub flow_match: FlowMatch,
    pub instructions: InstructionSet,
    pub packet_count: u64,
    pub byte_count: u64,
    pub idle_event: Option<EventId>,
    pub hard_event: Option<EventId>,
}

/// The value and participation mask of a TLV, as byte strings of equal
/// length. A field without an explicit mask participates with every bit.
fn field_bits(field: &OxmField) -> (Vec<u8>, Vec<u8>) {
    let value = field.value_bytes();
    let mask = match field.mask_bytes() {
        Some(mask) => mask,
        None => vec![0xff; value.len()],
    };
    (value, mask)
}

/// Strict comparison of two OXM matches: the same set of fields, and for
/// each field equality of value and of mask (including mask presence).
pub fn strict_match13(a: &FlowMatch, b: &FlowMatch) -> bool {
    if a.0.len() != b.0.len() {
        return false;
    }
    a.0.iter().all(|field_a| match b.get(field_a.code()) {
        Some(field_b) => field_a == field_b,
        None => false,
    })
}

/// `a` is at least as general as `b`: every bit `b` leaves out of the
/// comparison is also left out by `a`, and on the bits `b` compares either
/// `a` leaves them out or the values agree.
pub fn nonstrict_match13(a: &FlowMatch, b: &FlowMatch) -> bool {
    a.0.iter().all(|field_a| {
        let (value_a, mask_a) = field_bits(field_a);
        match b.get(field_a.code()) {
            Some(field_b) => {
                let (value_b, mask_b) = field_bits(field_b);
                if value_a.len() != value_b.len() {
                    return false;
                }
                for i in 0..value_a.len() {
                    // a may not compare bits that b leaves out
                    if mask_a[i] & !mask_b[i] != 0 {
                        return false;
                    }
                    if (value_a[i] ^ value_b[i]) & mask_a[i] != 0 {
                        return false;
                    }
                }
                true
            }
            // b is fully wildcarded here, so a must be too
            None => mask_a.iter().all(|&byte| byte == 0),
        }
    })
}

/// One-sided variant matching a packet's synthesized fields against an
/// installed flow: the packet carries no masks, a flow field matches when
/// the packet has it and the values agree on the flow's visible bits.
pub fn pkt_match13(flow: &FlowMatch, pkt: &FlowMatch) -> bool {
    flow.0.iter().all(|field_f| {
        let (value_f, mask_f) = field_bits(field_f);
        match pkt.get(field_f.code()) {
            Some(field_p) => {
                let value_p = field_p.value_bytes();
                if value_f.len() != value_p.len() {
                    return false;
                }
                (0..value_f.len()).all(|i| (value_f[i] ^ value_p[i]) & mask_f[i] == 0)
            }
            None => false,
        }
    })
}

impl Flow13 {
    pub fn strict_match(a: &Flow13, b: &Flow13) -> bool {
        a.priority == b.priority && strict_match13(&a.flow_match, &b.flow_match)
    }

    pub fn pkt_match(flow: &Flow13, pkt: &FlowMatch) -> bool {
        pkt_match13(&flow.flow_match, pkt)
    }

    /// Time alive, split into whole seconds and leftover nanoseconds.
    pub fn duration(&self, now: Nanos) -> (u32, u32) {
        let alive = now.saturating_sub(self.install_time);
        ((alive / NANOS_PER_SEC) as u32, (alive % NANOS_PER_SEC) as u32)
    }

    pub fn to_flow_stats(&self, now: Nanos) -> multipart::FlowStats13 {
        let (duration_sec, duration_nsec) = self.duration(now);
        multipart::FlowStats13 {
            table_id: self.table_id,
            duration_sec,
            duration_nsec,
            priority: self.priority,
            idle_timeout: self.idle_timeout,
            hard_timeout: self.hard_timeout,
            flags: 0,
            cookie: self.cookie,
            packet_count: self.packet_count,
            byte_count: self.byte_count,
            flow_match: self.flow_match.clone(),
            instructions: self.instructions.clone(),
        }
    }

    pub fn to_flow_removed(&self, now: Nanos, reason: flow_removed::Reason)
        -> flow_removed::PacketRepr13
    {
        let (duration_sec, duration_nsec) = self.duration(now);
        flow_removed::PacketRepr13 {
            cookie: self.cookie,
            priority: self.priority,
            reason,
            table_id: self.table_id,
            duration_sec,
            duration_nsec,
            idle_timeout: self.idle_timeout,
            hard_timeout: self.hard_timeout,
            packet_count: self.packet_count,
            byte_count: self.byte_count,
            flow_match: self.flow_match.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use smoltcp::wire::Ipv4Address;

    fn exact(fields: Vec<OxmField>) -> FlowMatch {
        FlowMatch::new(fields)
    }

    #[test]
    fn reflexivity() {
        let m = exact(vec![
            OxmField::InPort(1),
            OxmField::Ipv4Source(Ipv4Address([10, 0, 0, 1]), None),
        ]);
        assert!(strict_match13(&m, &m));
        assert!(nonstrict_match13(&m, &m));
    }

    #[test]
    fn strict_compares_masks() {
        let a = exact(vec![OxmField::Ipv4Source(
            Ipv4Address([10, 0, 0, 0]),
            Some(Ipv4Address([255, 255, 255, 0])),
        )]);
        let b = exact(vec![OxmField::Ipv4Source(
            Ipv4Address([10, 0, 0, 0]),
            Some(Ipv4Address([255, 255, 0, 0])),
        )]);
        assert!(!strict_match13(&a, &b));
        assert!(strict_match13(&a, &a));
    }

    #[test]
    fn nonstrict_mask_containment() {
        // a compares the /16, b compares the /24: a is more general
        let a = exact(vec![OxmField::Ipv4Source(
            Ipv4Address([10, 0, 0, 0]),
            Some(Ipv4Address([255, 255, 0, 0])),
        )]);
        let b = exact(vec![OxmField::Ipv4Source(
            Ipv4Address([10, 0, 1, 0]),
            Some(Ipv4Address([255, 255, 255, 0])),
        )]);
        assert!(nonstrict_match13(&a, &b));
        assert!(!nonstrict_match13(&b, &a));
    }

    #[test]
    fn absent_field_is_wildcard() {
        let a = exact(vec![]);
        let b = exact(vec![OxmField::InPort(1)]);
        // a constrains nothing, so it is as general as anything
        assert!(nonstrict_match13(&a, &b));
        assert!(!nonstrict_match13(&b, &a));
    }

    #[test]
    fn packet_matching() {
        let flow = exact(vec![OxmField::Ipv4Destination(
            Ipv4Address([10, 0, 0, 0]),
            Some(Ipv4Address([255, 255, 255, 0])),
        )]);
        let pkt = exact(vec![
            OxmField::InPort(1),
            OxmField::Ipv4Destination(Ipv4Address([10, 0, 0, 77]), None),
        ]);
        assert!(pkt_match13(&flow, &pkt));

        let other = exact(vec![
            OxmField::InPort(1),
            OxmField::Ipv4Destination(Ipv4Address([10, 0, 9, 77]), None),
        ]);
        assert!(!pkt_match13(&flow, &other));

        // the packet does not carry the field the flow constrains
        let arp_like = exact(vec![OxmField::InPort(1)]);
        assert!(!pkt_match13(&flow, &arp_like));
    }
}
