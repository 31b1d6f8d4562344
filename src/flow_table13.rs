//! The OpenFlow 1.3 pipeline: 64 flow tables per switch, instruction
//! execution during traversal, and the action set applied once on exit.

use flow13::Flow13;
use headers::HeaderStack;
use oxm::FlowMatch;
use packets::actions::Action13;
use packets::flow_mod::{self, OFPFF_CHECK_OVERLAP};
use packets::flow_removed::Reason;
use packets::instructions::Instruction;
use packets::multipart;
use sim::{seconds, AppId, Event, Scheduler};

/// Number of tables a 1.3 switch owns; table 0 is the pipeline entry.
pub const TABLE_COUNT: usize = 64;

/// An add refused because `CHECK_OVERLAP` found a strict match of equal
/// priority already installed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct OverlapError;

/// The pipeline action set: at most one action per kind, accumulated by
/// `WriteActions` and executed once when traversal ends, output last.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActionSet {
    pub group: Option<u32>,
    pub output: Option<(u32, u16)>,
}

impl ActionSet {
    /// Union actions into the set; a later write of the same kind wins.
    pub fn write(&mut self, actions: &[Action13]) {
        for action in actions {
            match *action {
                Action13::Output { port, max_len } => self.output = Some((port, max_len)),
                Action13::Group(group_id) => self.group = Some(group_id),
            }
        }
    }

    pub fn clear(&mut self) {
        *self = ActionSet::default();
    }

    pub fn is_empty(&self) -> bool {
        self.group.is_none() && self.output.is_none()
    }
}

/// What pipeline traversal concluded.
#[derive(Debug, Default)]
pub struct PipelineVerdict {
    pub matched: bool,
    pub action_set: ActionSet,
}

/// One numbered flow table.
pub struct FlowTable13 {
    app: AppId,
    pub table_id: u8,
    rules: Vec<Flow13>,
    next_flow_id: u64,
    pub max_entries: u32,
    pub active_count: u32,
    pub lookup_count: u64,
    pub matched_count: u64,
}

impl FlowTable13 {
    pub fn new(app: AppId, table_id: u8) -> FlowTable13 {
        FlowTable13 {
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

    /// Create the full bank of tables for one switch.
    pub fn tables_for_switch(app: AppId) -> Vec<FlowTable13> {
        (0..TABLE_COUNT as u8)
            .map(|table_id| FlowTable13::new(app, table_id))
            .collect()
    }

    pub fn flows(&self) -> &[Flow13] {
        &self.rules
    }

    pub fn matching_flows(&self, fields: &FlowMatch) -> Vec<&Flow13> {
        self.rules
            .iter()
            .filter(|flow| Flow13::pkt_match(flow, fields))
            .collect()
    }

    fn conflicting_entry(&self, candidate: &Flow13) -> bool {
        self.rules
            .iter()
            .any(|flow| Flow13::strict_match(candidate, flow))
    }

    /// Install a new flow, as the 1.0 table does: `CHECK_OVERLAP` refuses
    /// strict duplicates, an unchecked exact duplicate is replaced.
    pub fn add_flow(
        &mut self,
        sched: &mut Scheduler,
        message: &flow_mod::PacketRepr13,
    ) -> Result<&Flow13, OverlapError> {
        debug!(
            "table {}: adding flow priority={} at t={}",
            self.table_id,
            message.priority,
            sched.now()
        );
        let mut flow = Flow13 {
            id: self.next_flow_id,
            table_id: self.table_id,
            priority: message.priority,
            install_time: sched.now(),
            idle_timeout: message.idle_timeout,
            hard_timeout: message.hard_timeout,
            cookie: message.cookie,
            flow_match: message.flow_match.clone(),
            instructions: message.instructions.clone(),
            packet_count: 0,
            byte_count: 0,
            idle_event: None,
            hard_event: None,
        };

        if message.flags & OFPFF_CHECK_OVERLAP != 0 && self.conflicting_entry(&flow) {
            return Err(OverlapError);
        }
        self.next_flow_id += 1;

        let mut kept = Vec::with_capacity(self.rules.len());
        for rule in self.rules.drain(..) {
            if Flow13::strict_match(&flow, &rule) {
                cancel_timers(sched, &rule);
                self.active_count -= 1;
            } else {
                kept.push(rule);
            }
        }
        self.rules = kept;

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

    /// Overwrite instructions and cookie on every hit, resetting timers.
    pub fn modify_flow(&mut self, sched: &mut Scheduler, message: &flow_mod::PacketRepr13) {
        let (app, table_id) = (self.app, self.table_id);
        for flow in self.rules.iter_mut() {
            if flow.priority != message.priority
                || !Flow13::pkt_match(flow, &message.flow_match)
            {
                continue;
            }
            flow.instructions = message.instructions.clone();
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
        message: &flow_mod::PacketRepr13,
    ) -> Vec<Flow13> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.rules.len());
        for flow in self.rules.drain(..) {
            if flow.priority == message.priority && Flow13::pkt_match(&flow, &message.flow_match) {
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

    /// Take a flow out after its timer fired.
    pub fn expire(&mut self, sched: &mut Scheduler, flow_id: u64) -> Option<Flow13> {
        let position = self.rules.iter().position(|flow| flow.id == flow_id)?;
        let flow = self.rules.remove(position);
        cancel_timers(sched, &flow);
        self.active_count -= 1;
        Some(flow)
    }

    pub fn clear(&mut self, sched: &mut Scheduler) {
        for flow in self.rules.drain(..) {
            cancel_timers(sched, &flow);
        }
        self.active_count = 0;
    }

    pub fn table_stats(&self) -> multipart::TableStats13 {
        multipart::TableStats13 {
            table_id: self.table_id,
            active_count: self.active_count,
            lookup_count: self.lookup_count,
            matched_count: self.matched_count,
        }
    }
}

fn cancel_timers(sched: &mut Scheduler, flow: &Flow13) {
    if let Some(event) = flow.idle_event {
        sched.cancel(event);
    }
    if let Some(event) = flow.hard_event {
        sched.cancel(event);
    }
}

/// Steer one frame through the pipeline starting at `entry`. Every flow of
/// the current table is visited in priority order; `WriteActions` unions
/// into the action set, and the first `GoToTable` re-enters the named
/// table with the set accumulated so far. The caller executes the returned
/// action set exactly once.
pub fn run_pipeline(
    tables: &mut [FlowTable13],
    sched: &mut Scheduler,
    frame: &[u8],
    in_port: u32,
    entry: usize,
) -> PipelineVerdict {
    let mut verdict = PipelineVerdict::default();
    let stack = match HeaderStack::parse(frame) {
        Ok(stack) => stack,
        Err(_) => return verdict,
    };
    let pkt_fields = stack.to_oxm_match(in_port);
    let frame_len = frame.len() as u64;
    let mut current = entry;

    loop {
        let mut next_table = None;
        {
            let table = &mut tables[current];
            let (app, table_id) = (table.app, table.table_id);
            'flows: for i in 0..table.rules.len() {
                table.lookup_count += 1;
                if !Flow13::pkt_match(&table.rules[i], &pkt_fields) {
                    continue;
                }
                table.matched_count += 1;
                verdict.matched = true;
                let flow = &mut table.rules[i];
                flow.packet_count += 1;
                flow.byte_count += frame_len;
                for instruction in flow.instructions.iter() {
                    match *instruction {
                        Instruction::GoToTable(target) => {
                            let target = target as usize;
                            if target > current && target < tables.len() {
                                next_table = Some(target);
                            } else {
                                warn!(
                                    "table {}: goto-table {} ignored, must name a later table",
                                    current, target
                                );
                            }
                            break 'flows;
                        }
                        Instruction::WriteActions(ref actions) => {
                            verdict.action_set.write(actions);
                        }
                        // parsed but not executed by this data path
                        Instruction::WriteMetadata { .. }
                        | Instruction::ApplyActions(_)
                        | Instruction::ClearActions
                        | Instruction::Meter(_) => {}
                    }
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
        }
        match next_table {
            Some(target) => current = target,
            None => break,
        }
    }
    verdict
}

#[cfg(test)]
mod test {
    use super::*;
    use link::build_frame;
    use oxm::OxmField;
    use packets::flow_mod::Command;
    use packets::instructions::InstructionSet;
    use smoltcp::wire::EthernetAddress;

    fn flow_mod13(
        table_id: u8,
        priority: u16,
        instructions: Vec<Instruction>,
    ) -> flow_mod::PacketRepr13 {
        flow_mod::PacketRepr13 {
            cookie: 0,
            cookie_mask: 0,
            table_id,
            command: Command::Add,
            idle_timeout: 0,
            hard_timeout: 0,
            priority,
            buffer_id: flow_mod::NO_BUFFER,
            out_port: 0xffff_ffff,
            out_group: 0xffff_ffff,
            flags: 0,
            flow_match: FlowMatch::new(vec![OxmField::InPort(1)]),
            instructions: InstructionSet::new(instructions),
        }
    }

    fn frame() -> Vec<u8> {
        build_frame(
            EthernetAddress([2, 0, 0, 0, 0, 1]),
            EthernetAddress([2, 0, 0, 0, 0, 2]),
            0x0800,
            &[0; 20],
        )
    }

    #[test]
    fn goto_accumulates_action_set() {
        let mut sched = Scheduler::new();
        let mut tables = FlowTable13::tables_for_switch(AppId::Switch13(0));
        // the higher priority flow contributes to the action set, then the
        // lower priority one transfers to table 3
        tables[0]
            .add_flow(
                &mut sched,
                &flow_mod13(
                    0,
                    20,
                    vec![Instruction::WriteActions(vec![Action13::Group(5)])],
                ),
            )
            .unwrap();
        tables[0]
            .add_flow(&mut sched, &flow_mod13(0, 10, vec![Instruction::GoToTable(3)]))
            .unwrap();
        tables[3]
            .add_flow(
                &mut sched,
                &flow_mod13(
                    3,
                    10,
                    vec![Instruction::WriteActions(vec![Action13::Output {
                        port: 2,
                        max_len: 0xffff,
                    }])],
                ),
            )
            .unwrap();

        let frame = frame();
        let verdict = run_pipeline(&mut tables, &mut sched, &frame, 1, 0);
        assert!(verdict.matched);
        assert_eq!(verdict.action_set.group, Some(5));
        assert_eq!(verdict.action_set.output, Some((2, 0xffff)));
        assert_eq!(tables[0].matched_count, 2);
        assert_eq!(tables[3].matched_count, 1);
    }

    #[test]
    fn goto_backwards_is_ignored() {
        let mut sched = Scheduler::new();
        let mut tables = FlowTable13::tables_for_switch(AppId::Switch13(0));
        tables[5]
            .add_flow(&mut sched, &flow_mod13(5, 10, vec![Instruction::GoToTable(2)]))
            .unwrap();
        let frame = frame();
        let verdict = run_pipeline(&mut tables, &mut sched, &frame, 1, 5);
        assert!(verdict.matched);
        assert!(verdict.action_set.is_empty());
    }

    #[test]
    fn later_write_wins_in_action_set() {
        let mut set = ActionSet::default();
        set.write(&[Action13::Output { port: 1, max_len: 0xffff }]);
        set.write(&[Action13::Output { port: 2, max_len: 0xffff }]);
        assert_eq!(set.output, Some((2, 0xffff)));
    }
}
