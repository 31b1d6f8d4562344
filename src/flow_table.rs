//! The OpenFlow 1.0 flow table: an ordered set of flows, packet ingestion
//! with action execution, timer driven eviction, and the flow mod
//! operations.

use flow::Flow;
use flow_match::Match;
use headers::HeaderStack;
use packets::actions::Action;
use packets::flow_mod::{self, OFPFF_CHECK_OVERLAP};
use packets::flow_removed::Reason;
use packets::stats;
use sim::{seconds, AppId, Event, Scheduler};

/// An add refused because `CHECK_OVERLAP` found a strict match of equal
/// priority already installed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct OverlapError;

/// One output decision produced by action execution.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PortDecision {
    pub port: u16,
    /// Emitted copies longer than this are truncated.
    pub max_len: u16,
}

/// What packet ingestion concluded.
#[derive(Debug, Default)]
pub struct PacketVerdict {
    /// Whether any flow matched at all. No match means the switch punts
    /// the packet to the controller.
    pub matched: bool,
    /// Output decisions of every matching flow, in priority order.
    pub outputs: Vec<PortDecision>,
}

/// Flows ordered by priority, higher first, ties in insertion order.
pub struct FlowTable {
    app: AppId,
    pub table_id: u8,
    rules: Vec<Flow>,
    next_flow_id: u64,
    pub max_entries: u32,
    pub active_count: u32,
    pub lookup_count: u64,
    pub matched_count: u64,
}

impl FlowTable {
    pub fn new(app: AppId, table_id: u8) -> FlowTable {
        FlowTable {
            app,
            table_id,
            rules: Vec::new(),
            next_flow_id: 0,
            max_entries: 0,
            active_count: 0,
            lookup_count: 0,
            matched_count: 0,
        }
    }

    /// The installed flows in lookup order.
    pub fn flows(&self) -> &[Flow] {
        &self.rules
    }

    /// Steer one frame through the table: count a lookup against every
    /// flow, and for each match bump its counters, run its actions against
    /// the headers, and push back its idle timer.
    pub fn handle_packet(
        &mut self,
        sched: &mut Scheduler,
        frame: &mut Vec<u8>,
        in_port: u16,
    ) -> PacketVerdict {
        let mut stack = match HeaderStack::parse(frame) {
            Ok(stack) => stack,
            Err(_) => {
                trace!("table {}: unparseable frame", self.table_id);
                return PacketVerdict::default();
            }
        };
        let pkt_fields = stack.to_match(in_port);
        let frame_len = frame.len() as u64;
        let mut verdict = PacketVerdict::default();
        let (app, table_id) = (self.app, self.table_id);

        for i in 0..self.rules.len() {
            self.lookup_count += 1;
            if !Flow::pkt_match(&self.rules[i], &pkt_fields) {
                continue;
            }
            self.matched_count += 1;
            verdict.matched = true;
            let flow = &mut self.rules[i];
            flow.packet_count += 1;
            flow.byte_count += frame_len;
            for action in &flow.actions {
                apply_action(action, &mut stack, frame, &mut verdict.outputs);
            }
            if flow.idle_timeout != 0 {
                if let Some(event) = flow.idle_event.take() {
                    sched.cancel(event);
                }
                flow.idle_event = Some(sched.schedule_after(
                    seconds(flow.idle_timeout as u64),
                    Event::FlowExpire {
                        app,
                        table_id,
                        flow_id: flow.id,
                        reason: Reason::IdleTimeout,
                    },
                ));
            }
        }
        verdict
    }

    /// Every installed flow that a packet with these fields would hit.
    pub fn matching_flows(&self, fields: &Match) -> Vec<&Flow> {
        self.rules
            .iter()
            .filter(|flow| Flow::pkt_match(flow, fields))
            .collect()
    }

    /// Whether a flow strictly matches an installed entry.
    fn conflicting_entry(&self, candidate: &Flow) -> bool {
        self.rules
            .iter()
            .any(|flow| Flow::strict_match(candidate, flow))
    }

    /// Install a new flow. Fails when `CHECK_OVERLAP` is set and a strict
    /// match of equal priority exists; otherwise an exact duplicate is
    /// replaced so at most one flow per (priority, match) remains.
    pub fn add_flow(
        &mut self,
        sched: &mut Scheduler,
        message: &flow_mod::PacketRepr,
    ) -> Result<&Flow, OverlapError> {
        debug!(
            "table {}: adding flow priority={} at t={}",
            self.table_id,
            message.priority,
            sched.now()
        );
        let mut flow = Flow {
            id: self.next_flow_id,
            table_id: self.table_id,
            priority: message.priority,
            install_time: sched.now(),
            idle_timeout: message.idle_timeout,
            hard_timeout: message.hard_timeout,
            cookie: message.cookie,
            flow_match: message.flow_match.clone(),
            actions: message.actions.clone(),
            packet_count: 0,
            byte_count: 0,
            idle_event: None,
            hard_event: None,
        };
        // VLAN tagging is not modelled
        flow.flow_match.dl_vlan = 0;

        if message.flags & OFPFF_CHECK_OVERLAP != 0 && self.conflicting_entry(&flow) {
            return Err(OverlapError);
        }
        self.next_flow_id += 1;

        // drop a previous entry with the same (priority, match) key
        let table_id = self.table_id;
        let mut replaced = Vec::new();
        let mut kept = Vec::with_capacity(self.rules.len());
        for rule in self.rules.drain(..) {
            if Flow::strict_match(&flow, &rule) {
                replaced.push(rule);
            } else {
                kept.push(rule);
            }
        }
        self.rules = kept;
        for rule in replaced {
            debug!("table {}: replacing flow id={}", table_id, rule.id);
            cancel_timers(sched, &rule);
            self.active_count -= 1;
        }

        if flow.idle_timeout != 0 {
            flow.idle_event = Some(sched.schedule_after(
                seconds(flow.idle_timeout as u64),
                Event::FlowExpire {
                    app: self.app,
                    table_id: self.table_id,
                    flow_id: flow.id,
                    reason: Reason::IdleTimeout,
                },
            ));
        }
        if flow.hard_timeout != 0 {
            flow.hard_event = Some(sched.schedule_after(
                seconds(flow.hard_timeout as u64),
                Event::FlowExpire {
                    app: self.app,
                    table_id: self.table_id,
                    flow_id: flow.id,
                    reason: Reason::HardTimeout,
                },
            ));
        }
        let position = self
            .rules
            .iter()
            .position(|rule| rule.priority < flow.priority)
            .unwrap_or(self.rules.len());
        self.rules.insert(position, flow);
        self.active_count += 1;
        Ok(&self.rules[position])
    }

    /// Overwrite actions and cookie on every hit, resetting both timers.
    pub fn modify_flow(&mut self, sched: &mut Scheduler, message: &flow_mod::PacketRepr) {
        debug!(
            "table {}: modifying flows priority={} at t={}",
            self.table_id,
            message.priority,
            sched.now()
        );
        let (app, table_id) = (self.app, self.table_id);
        for flow in self.rules.iter_mut() {
            if flow.priority != message.priority
                || !Flow::pkt_match(flow, &message.flow_match)
            {
                continue;
            }
            flow.actions = message.actions.clone();
            flow.cookie = message.cookie;
            if flow.idle_timeout != 0 {
                if let Some(event) = flow.idle_event.take() {
                    sched.cancel(event);
                }
                flow.idle_event = Some(sched.schedule_after(
                    seconds(flow.idle_timeout as u64),
                    Event::FlowExpire {
                        app,
                        table_id,
                        flow_id: flow.id,
                        reason: Reason::IdleTimeout,
                    },
                ));
            }
            if flow.hard_timeout != 0 {
                if let Some(event) = flow.hard_event.take() {
                    sched.cancel(event);
                }
                flow.hard_event = Some(sched.schedule_after(
                    seconds(flow.hard_timeout as u64),
                    Event::FlowExpire {
                        app,
                        table_id,
                        flow_id: flow.id,
                        reason: Reason::HardTimeout,
                    },
                ));
            }
        }
    }

    /// Remove every hit, canceling its timers. Returns the removed flows.
    pub fn delete_flow(
        &mut self,
        sched: &mut Scheduler,
        message: &flow_mod::PacketRepr,
    ) -> Vec<Flow> {
        debug!(
            "table {}: deleting flows priority={} at t={}",
            self.table_id,
            message.priority,
            sched.now()
        );
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.rules.len());
        for flow in self.rules.drain(..) {
            if flow.priority == message.priority && Flow::pkt_match(&flow, &message.flow_match) {
                removed.push(flow);
            } else {
                kept.push(flow);
            }
        }
        self.rules = kept;
        for flow in &removed {
            cancel_timers(sched, flow);
            self.active_count -= 1;
        }
        removed
    }

    /// Take a flow out after its timer fired. Returns `None` when the flow
    /// was already gone, in which case the timer was stale.
    pub fn expire(&mut self, sched: &mut Scheduler, flow_id: u64) -> Option<Flow> {
        let position = self.rules.iter().position(|flow| flow.id == flow_id)?;
        let flow = self.rules.remove(position);
        cancel_timers(sched, &flow);
        self.active_count -= 1;
        Some(flow)
    }

    /// Cancel every pending timer, for table teardown.
    pub fn clear(&mut self, sched: &mut Scheduler) {
        for flow in self.rules.drain(..) {
            cancel_timers(sched, &flow);
        }
        self.active_count = 0;
    }

    pub fn table_stats(&self) -> stats::TableStats {
        stats::TableStats {
            table_id: self.table_id,
            name: format!("table{}", self.table_id),
            wildcards: ::flow_match::OFPFW_ALL,
            max_entries: self.max_entries,
            active_count: self.active_count,
            lookup_count: self.lookup_count,
            matched_count: self.matched_count,
        }
    }
}

fn cancel_timers(sched: &mut Scheduler, flow: &Flow) {
    if let Some(event) = flow.idle_event {
        sched.cancel(event);
    }
    if let Some(event) = flow.hard_event {
        sched.cancel(event);
    }
}

/// Apply one action: set-field actions mutate the header slots in place so
/// later actions observe the rewrite, output actions record a decision.
/// The VLAN actions are accepted but are no-ops since VLAN is not
/// modelled.
pub fn apply_action(
    action: &Action,
    stack: &mut HeaderStack,
    frame: &mut [u8],
    outputs: &mut Vec<PortDecision>,
) {
    match *action {
        Action::Output { port, max_len } => outputs.push(PortDecision { port, max_len }),
        Action::SetDlSrc(addr) => stack.set_dl_src(frame, addr),
        Action::SetDlDst(addr) => stack.set_dl_dst(frame, addr),
        Action::SetNwSrc(addr) => stack.set_nw_src(frame, addr),
        Action::SetNwDst(addr) => stack.set_nw_dst(frame, addr),
        Action::SetNwTos(tos) => stack.set_nw_tos(frame, tos),
        Action::SetTpSrc(port) => stack.set_tp_src(frame, port),
        Action::SetTpDst(port) => stack.set_tp_dst(frame, port),
        Action::SetVlanVid(_) | Action::SetVlanPcp(_) | Action::StripVlan => {}
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use flow_match::{OFPFW_DL_DST, OFPFW_IN_PORT};
    use link::build_frame;
    use packets::flow_mod::Command;
    use sim::{AppId, Scheduler};
    use smoltcp::wire::EthernetAddress;

    fn table() -> FlowTable {
        FlowTable::new(AppId::Switch(0), 0)
    }

    fn flow_mod(priority: u16, dl_dst: Option<EthernetAddress>) -> flow_mod::PacketRepr {
        let mut flow_match = Match::default();
        if let Some(addr) = dl_dst {
            flow_match.exact(OFPFW_DL_DST);
            flow_match.dl_dst = addr;
        }
        flow_mod::PacketRepr {
            flow_match,
            cookie: 0,
            command: Command::Add,
            idle_timeout: 0,
            hard_timeout: 0,
            priority,
            buffer_id: ::packets::flow_mod::NO_BUFFER,
            out_port: 0xffff,
            flags: 0,
            actions: vec![Action::Output { port: 2, max_len: 0xffff }],
        }
    }

    fn frame_to(dst: EthernetAddress) -> Vec<u8> {
        build_frame(EthernetAddress([2, 0, 0, 0, 0, 9]), dst, 0x0800, &[0; 20])
    }

    #[test]
    fn priority_order_wins() {
        let mut sched = Scheduler::new();
        let mut table = table();
        let dst = EthernetAddress([2, 0, 0, 0, 0, 1]);

        let mut low = flow_mod(10, Some(dst));
        low.actions = vec![Action::Output { port: 7, max_len: 0xffff }];
        table.add_flow(&mut sched, &low).unwrap();

        let high = flow_mod(100, Some(dst));
        table.add_flow(&mut sched, &high).unwrap();

        let mut frame = frame_to(dst);
        let verdict = table.handle_packet(&mut sched, &mut frame, 1);
        assert!(verdict.matched);
        // both flows matched; the higher priority one ran first
        assert_eq!(
            verdict.outputs,
            vec![
                PortDecision { port: 2, max_len: 0xffff },
                PortDecision { port: 7, max_len: 0xffff },
            ]
        );
        assert_eq!(table.lookup_count, 2);
        assert_eq!(table.matched_count, 2);
        // the higher priority flow's counters were bumped
        assert_eq!(table.flows()[0].priority, 100);
        assert_eq!(table.flows()[0].packet_count, 1);
    }

    #[test]
    fn check_overlap_refuses_duplicate() {
        let mut sched = Scheduler::new();
        let mut table = table();
        let dst = EthernetAddress([2, 0, 0, 0, 0, 1]);
        table.add_flow(&mut sched, &flow_mod(100, Some(dst))).unwrap();

        let mut dup = flow_mod(100, Some(dst));
        dup.flags = OFPFF_CHECK_OVERLAP;
        assert_eq!(table.add_flow(&mut sched, &dup), Err(OverlapError));
        assert_eq!(table.active_count, 1);
    }

    #[test]
    fn add_replaces_exact_duplicate() {
        let mut sched = Scheduler::new();
        let mut table = table();
        let dst = EthernetAddress([2, 0, 0, 0, 0, 1]);
        table.add_flow(&mut sched, &flow_mod(100, Some(dst))).unwrap();
        let mut second = flow_mod(100, Some(dst));
        second.actions = vec![Action::Output { port: 9, max_len: 0xffff }];
        table.add_flow(&mut sched, &second).unwrap();
        assert_eq!(table.active_count, 1);
        assert_eq!(table.flows().len(), 1);
        assert_eq!(
            table.flows()[0].actions,
            vec![Action::Output { port: 9, max_len: 0xffff }]
        );
    }

    #[test]
    fn modify_overwrites_actions_and_cookie() {
        let mut sched = Scheduler::new();
        let mut table = table();
        let dst = EthernetAddress([2, 0, 0, 0, 0, 1]);
        table.add_flow(&mut sched, &flow_mod(100, Some(dst))).unwrap();

        let mut modify = flow_mod(100, Some(dst));
        modify.command = Command::Modify;
        modify.cookie = 42;
        modify.actions = vec![Action::Output { port: 5, max_len: 0xffff }];
        table.modify_flow(&mut sched, &modify);
        assert_eq!(table.flows()[0].cookie, 42);
        assert_eq!(
            table.flows()[0].actions,
            vec![Action::Output { port: 5, max_len: 0xffff }]
        );
    }

    #[test]
    fn delete_cancels_and_removes() {
        let mut sched = Scheduler::new();
        let mut table = table();
        let dst = EthernetAddress([2, 0, 0, 0, 0, 1]);
        let mut message = flow_mod(100, Some(dst));
        message.idle_timeout = 5;
        table.add_flow(&mut sched, &message).unwrap();

        let mut delete = flow_mod(100, Some(dst));
        delete.command = Command::Delete;
        let removed = table.delete_flow(&mut sched, &delete);
        assert_eq!(removed.len(), 1);
        assert_eq!(table.active_count, 0);
        // the canceled idle timer never fires
        assert!(sched.pop().is_none());
    }

    #[test]
    fn unmatched_packet_reports_no_match() {
        let mut sched = Scheduler::new();
        let mut table = table();
        let dst = EthernetAddress([2, 0, 0, 0, 0, 1]);
        table.add_flow(&mut sched, &flow_mod(100, Some(dst))).unwrap();

        let mut frame = frame_to(EthernetAddress([2, 0, 0, 0, 0, 6]));
        let verdict = table.handle_packet(&mut sched, &mut frame, 1);
        assert!(!verdict.matched);
        assert!(verdict.outputs.is_empty());
        assert_eq!(table.lookup_count, 1);
        assert_eq!(table.matched_count, 0);
    }

    #[test]
    fn in_port_match() {
        let mut sched = Scheduler::new();
        let mut table = table();
        let mut message = flow_mod(1, None);
        message.flow_match.exact(OFPFW_IN_PORT);
        message.flow_match.in_port = 3;
        table.add_flow(&mut sched, &message).unwrap();

        let mut frame = frame_to(EthernetAddress([2, 0, 0, 0, 0, 1]));
        assert!(table.handle_packet(&mut sched, &mut frame, 3).matched);
        let mut frame = frame_to(EthernetAddress([2, 0, 0, 0, 0, 1]));
        assert!(!table.handle_packet(&mut sched, &mut frame, 4).matched);
    }
}
