//! An installed OpenFlow 1.0 flow: match, priority, actions, timeouts and
//! counters. Immutable once installed except through flow mods and the
//! per-packet counter/timer bookkeeping.

use flow_match::{self, Match};
use packets::actions::Action;
use packets::flow_removed;
use packets::stats;
use sim::{EventId, Nanos, NANOS_PER_SEC};

#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    /// Unique per-table install id, used by timer events to check the flow
    /// still lives in the table when they fire.
    pub id: u64,
    pub table_id: u8,
    pub priority: u16,
    pub install_time: Nanos,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub cookie: u64,
    pub flow_match: Match,
    pub actions: Vec<Action>,
    pub packet_count: u64,
    pub byte_count: u64,
    pub idle_event: Option<EventId>,
    pub hard_event: Option<EventId>,
}

impl Flow {
    /// Two flows strictly match when their priorities are equal and their
    /// matches agree on wildcards, masks and values.
    pub fn strict_match(a: &Flow, b: &Flow) -> bool {
        a.priority == b.priority && flow_match::strict_match(&a.flow_match, &b.flow_match)
    }

    /// One flow is at least as general as the other.
    pub fn nonstrict_match(a: &Flow, b: &Flow) -> bool {
        flow_match::nonstrict_match(&a.flow_match, &b.flow_match)
    }

    /// Does a packet-side match hit this flow.
    pub fn pkt_match(flow: &Flow, pkt: &Match) -> bool {
        flow_match::pkt_match(&flow.flow_match, pkt)
    }

    /// Time alive, split into whole seconds and leftover nanoseconds.
    pub fn duration(&self, now: Nanos) -> (u32, u32) {
        let alive = now.saturating_sub(self.install_time);
        ((alive / NANOS_PER_SEC) as u32, (alive % NANOS_PER_SEC) as u32)
    }

    pub fn to_flow_stats(&self, now: Nanos) -> stats::FlowStats {
        let (duration_sec, duration_nsec) = self.duration(now);
        stats::FlowStats {
            table_id: self.table_id,
            flow_match: self.flow_match.clone(),
            duration_sec,
            duration_nsec,
            priority: self.priority,
            idle_timeout: self.idle_timeout,
            hard_timeout: self.hard_timeout,
            cookie: self.cookie,
            packet_count: self.packet_count,
            byte_count: self.byte_count,
            actions: self.actions.clone(),
        }
    }

    pub fn to_flow_removed(&self, now: Nanos, reason: flow_removed::Reason)
        -> flow_removed::PacketRepr
    {
        let (duration_sec, duration_nsec) = self.duration(now);
        flow_removed::PacketRepr {
            flow_match: self.flow_match.clone(),
            cookie: self.cookie,
            priority: self.priority,
            reason,
            duration_sec,
            duration_nsec,
            idle_timeout: self.idle_timeout,
            packet_count: self.packet_count,
            byte_count: self.byte_count,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use flow_match::OFPFW_IN_PORT;

    fn flow(priority: u16, in_port: Option<u16>) -> Flow {
        let mut flow_match = Match::default();
        if let Some(port) = in_port {
            flow_match.exact(OFPFW_IN_PORT);
            flow_match.in_port = port;
        }
        Flow {
            id: 0,
            table_id: 0,
            priority,
            install_time: 0,
            idle_timeout: 0,
            hard_timeout: 0,
            cookie: 0,
            flow_match,
            actions: vec![],
            packet_count: 0,
            byte_count: 0,
            idle_event: None,
            hard_event: None,
        }
    }

    #[test]
    fn strict_needs_equal_priority() {
        let a = flow(100, Some(1));
        let b = flow(200, Some(1));
        assert!(!Flow::strict_match(&a, &b));
        let c = flow(100, Some(1));
        assert!(Flow::strict_match(&a, &c));
    }

    #[test]
    fn duration_split() {
        let mut f = flow(1, None);
        f.install_time = 500;
        let (sec, nsec) = f.duration(2 * NANOS_PER_SEC + 700);
        assert_eq!(sec, 2);
        assert_eq!(nsec, 200);
    }
}
