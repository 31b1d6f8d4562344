//! The discrete event engine: virtual time, a cancelable event queue, the
//! per-simulation id context, and the `Simulation` world that owns every
//! application and dispatches events to them.
//!
//! Everything runs on one logical thread. The dispatcher takes the next
//! event off a time-ordered queue, runs its handler to completion, and
//! advances virtual time; handlers never block, they only schedule more
//! events.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smoltcp::wire::EthernetAddress;

use controller::{Controller, Listener};
use link::{self, Host, LinkConfig, NetState};
use packets::flow_removed;
use packets::openflow::Version;
use switch::Switch;
use switch13::Switch13;

/// Virtual time in nanoseconds.
pub type Nanos = u64;

/// The smallest representable tick, used to stagger same-instant sends.
pub const TICK: Nanos = 1;

pub const NANOS_PER_SEC: Nanos = 1_000_000_000;

pub fn seconds(s: u64) -> Nanos {
    s * NANOS_PER_SEC
}

pub fn milliseconds(ms: u64) -> Nanos {
    ms * 1_000_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostId(pub usize);

/// Which end of a control stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn peer(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// Identity of an application in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppId {
    Host(usize),
    Switch(usize),
    Switch13(usize),
    Controller(usize),
}

/// A handle to a scheduled event that can be canceled. Cancellation is
/// idempotent; a handle for an event that already fired is simply stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

/// One schedulable occurrence.
#[derive(Debug, Clone)]
pub enum Event {
    /// Application startup (device enumeration for switches).
    Start(AppId),
    /// A host emits one frame towards its peer.
    HostSend {
        host: HostId,
        dst: EthernetAddress,
        protocol: u16,
        payload: Vec<u8>,
    },
    /// A frame finished propagating and lands on a device.
    DeviceReceive { device: DeviceId, frame: Vec<u8> },
    /// The transmitter is free again and may dequeue the next frame.
    TxComplete { device: DeviceId },
    /// The passive side of a control stream learns of the new connection.
    StreamOpened { stream: StreamId },
    /// The active side of a control stream learns the connect succeeded.
    StreamConnected { stream: StreamId },
    /// Control bytes finished propagating to `to`.
    StreamDeliver {
        stream: StreamId,
        to: Side,
        bytes: Vec<u8>,
    },
    /// A send deferred by the stagger rule retries from `from`.
    StreamStagger {
        stream: StreamId,
        from: Side,
        bytes: Vec<u8>,
    },
    /// A flow idle or hard timer fired.
    FlowExpire {
        app: AppId,
        table_id: u8,
        flow_id: u64,
        reason: flow_removed::Reason,
    },
}

struct Entry {
    time: Nanos,
    seq: u64,
    event: Event,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Entry) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Entry) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // BinaryHeap is a max-heap, so compare reversed: the earliest time (and
    // within a time, the earliest insertion) is the greatest entry.
    fn cmp(&self, other: &Entry) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then(other.seq.cmp(&self.seq))
    }
}

/// Time-ordered event queue. Ties fire in insertion order.
pub struct Scheduler {
    now: Nanos,
    queue: BinaryHeap<Entry>,
    cancelled: HashSet<u64>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Scheduler {
        Scheduler {
            now: 0,
            queue: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_seq: 0,
        }
    }

    /// The current virtual time.
    pub fn now(&self) -> Nanos {
        self.now
    }

    pub fn schedule_at(&mut self, time: Nanos, event: Event) -> EventId {
        debug_assert!(time >= self.now);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Entry { time, seq, event });
        EventId(seq)
    }

    pub fn schedule_after(&mut self, delay: Nanos, event: Event) -> EventId {
        let at = self.now + delay;
        self.schedule_at(at, event)
    }

    /// Cancel a pending event. Idempotent; stale handles are ignored.
    pub fn cancel(&mut self, id: EventId) {
        self.cancelled.insert(id.0);
    }

    /// Pop the next live event, advancing virtual time to it.
    pub fn pop(&mut self) -> Option<Event> {
        while let Some(entry) = self.queue.pop() {
            if self.cancelled.remove(&entry.seq) {
                continue;
            }
            self.now = entry.time;
            return Some(entry.event);
        }
        None
    }

    /// Time of the next live event, if any.
    pub fn peek_time(&mut self) -> Option<Nanos> {
        loop {
            let (time, seq) = match self.queue.peek() {
                Some(entry) => (entry.time, entry.seq),
                None => return None,
            };
            if self.cancelled.contains(&seq) {
                self.queue.pop();
                self.cancelled.remove(&seq);
                continue;
            }
            return Some(time);
        }
    }
}

/// Per-simulation id generators and the seeded random stream. Everything a
/// process-wide global would hold in a real switch stack lives here so that
/// concurrent simulations stay independent and runs stay reproducible.
pub struct Context {
    next_xid: u32,
    next_datapath_id: u64,
    next_serial: u32,
    next_conn_id: u32,
    next_mac: u64,
    rng: StdRng,
}

impl Context {
    pub fn new(seed: u64) -> Context {
        Context {
            next_xid: 0,
            next_datapath_id: 0,
            next_serial: 0,
            next_conn_id: 0,
            next_mac: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Next message transaction id, monotonically increasing.
    pub fn next_xid(&mut self) -> u32 {
        self.next_xid += 1;
        self.next_xid
    }

    /// Next switch datapath ordinal, monotonically increasing.
    pub fn next_datapath_id(&mut self) -> u64 {
        self.next_datapath_id += 1;
        self.next_datapath_id
    }

    /// Next switch serial number string.
    pub fn next_serial(&mut self) -> String {
        self.next_serial += 1;
        format!("{:07}", self.next_serial)
    }

    /// Next connection id.
    pub fn next_conn_id(&mut self) -> u32 {
        let id = self.next_conn_id;
        self.next_conn_id += 1;
        id
    }

    /// Allocate a locally administered MAC address.
    pub fn next_mac(&mut self) -> EthernetAddress {
        self.next_mac += 1;
        let n = self.next_mac;
        EthernetAddress([
            0x02,
            0x00,
            (n >> 24) as u8,
            (n >> 16) as u8,
            (n >> 8) as u8,
            n as u8,
        ])
    }

    /// Draw a candidate packet buffer id.
    pub fn random_buffer_id(&mut self, max: u32) -> u32 {
        self.rng.gen_range(0, max)
    }
}

/// The whole simulated world: scheduler, id context, network state, and
/// every application, addressed by the ids handed out at build time.
pub struct Simulation {
    pub sched: Scheduler,
    pub ctx: Context,
    pub net: NetState,
    pub hosts: Vec<Host>,
    pub switches: Vec<Switch>,
    pub switches13: Vec<Switch13>,
    pub controllers: Vec<Controller>,
}

impl Simulation {
    pub fn new(seed: u64) -> Simulation {
        Simulation {
            sched: Scheduler::new(),
            ctx: Context::new(seed),
            net: NetState::new(),
            hosts: Vec::new(),
            switches: Vec::new(),
            switches13: Vec::new(),
            controllers: Vec::new(),
        }
    }

    pub fn add_host(&mut self) -> HostId {
        let id = HostId(self.hosts.len());
        self.hosts.push(Host::new(id));
        id
    }

    pub fn add_switch(&mut self) -> AppId {
        let id = self.switches.len();
        let switch = Switch::new(id, &mut self.ctx);
        self.switches.push(switch);
        AppId::Switch(id)
    }

    pub fn add_switch13(&mut self) -> AppId {
        let id = self.switches13.len();
        let switch = Switch13::new(id, &mut self.ctx);
        self.switches13.push(switch);
        AppId::Switch13(id)
    }

    pub fn add_controller(&mut self, version: Version, listener: Box<Listener>) -> AppId {
        let id = self.controllers.len();
        self.controllers.push(Controller::new(id, version, listener));
        AppId::Controller(id)
    }

    /// Wire two applications together with a point-to-point link, creating
    /// a device on each side. A link with a controller endpoint becomes the
    /// control channel; anything else is a data link.
    pub fn connect(&mut self, a: AppId, b: AppId, config: LinkConfig) -> ChannelId {
        let mac_a = self.ctx.next_mac();
        let mac_b = self.ctx.next_mac();
        let channel = self.net.connect(a, mac_a, b, mac_b, config);
        for &(app, device) in &[
            (a, self.net.channels[channel.0].a),
            (b, self.net.channels[channel.0].b),
        ] {
            if let AppId::Host(i) = app {
                self.hosts[i].devices.push(device);
            }
        }
        channel
    }

    /// Schedule application startup at the given time.
    pub fn start_at(&mut self, time: Nanos, app: AppId) {
        self.sched.schedule_at(time, Event::Start(app));
    }

    /// Schedule every switch application to start at t=0.
    pub fn start(&mut self) {
        for i in 0..self.switches.len() {
            self.sched.schedule_at(0, Event::Start(AppId::Switch(i)));
        }
        for i in 0..self.switches13.len() {
            self.sched.schedule_at(0, Event::Start(AppId::Switch13(i)));
        }
    }

    /// Schedule a frame transmission from a host.
    pub fn host_send_at(
        &mut self,
        time: Nanos,
        host: HostId,
        dst: EthernetAddress,
        protocol: u16,
        payload: Vec<u8>,
    ) {
        self.sched.schedule_at(
            time,
            Event::HostSend {
                host,
                dst,
                protocol,
                payload,
            },
        );
    }

    /// Run until the event queue drains.
    pub fn run(&mut self) {
        while let Some(event) = self.sched.pop() {
            self.dispatch(event);
        }
    }

    /// Run every event scheduled up to and including `deadline`.
    pub fn run_until(&mut self, deadline: Nanos) {
        loop {
            match self.sched.peek_time() {
                Some(time) if time <= deadline => {
                    if let Some(event) = self.sched.pop() {
                        self.dispatch(event);
                    }
                }
                _ => break,
            }
        }
        if self.sched.now < deadline {
            self.sched.now = deadline;
        }
    }

    fn dispatch(&mut self, event: Event) {
        match event {
            Event::Start(AppId::Switch(i)) => {
                self.switches[i].start(&mut self.sched, &mut self.ctx, &mut self.net);
            }
            Event::Start(AppId::Switch13(i)) => {
                self.switches13[i].start(&mut self.sched, &mut self.ctx, &mut self.net);
            }
            Event::Start(_) => {}
            Event::HostSend {
                host,
                dst,
                protocol,
                payload,
            } => {
                let device = match self.hosts[host.0].devices.first() {
                    Some(&device) => device,
                    None => {
                        warn!("host {} has no device to send on", host.0);
                        return;
                    }
                };
                let frame = {
                    let dev = &self.net.devices[device.0];
                    link::build_frame_with_mode(dev.address, dst, protocol, &payload, dev.encapsulation)
                };
                self.net.transmit(&mut self.sched, device, frame);
            }
            Event::DeviceReceive { device, frame } => self.device_receive(device, frame),
            Event::TxComplete { device } => self.net.tx_complete(&mut self.sched, device),
            Event::StreamOpened { stream } => {
                let app = self.net.streams[stream.0].app(Side::B);
                if let AppId::Controller(i) = app {
                    self.controllers[i].handle_accept(
                        &mut self.sched,
                        &mut self.ctx,
                        &self.net,
                        stream,
                    );
                }
            }
            Event::StreamConnected { stream } => {
                let app = self.net.streams[stream.0].app(Side::A);
                match app {
                    AppId::Switch(i) => self.switches[i].handle_connected(
                        &mut self.sched,
                        &mut self.ctx,
                        &self.net,
                        stream,
                    ),
                    AppId::Switch13(i) => self.switches13[i].handle_connected(
                        &mut self.sched,
                        &mut self.ctx,
                        &self.net,
                        stream,
                    ),
                    _ => {}
                }
            }
            Event::StreamDeliver { stream, to, bytes } => {
                match self.net.streams[stream.0].app(to) {
                    AppId::Switch(i) => {
                        self.switches[i].handle_control_bytes(
                            &mut self.sched,
                            &mut self.ctx,
                            &mut self.net,
                            &bytes,
                        );
                    }
                    AppId::Switch13(i) => {
                        self.switches13[i].handle_control_bytes(
                            &mut self.sched,
                            &mut self.ctx,
                            &mut self.net,
                            &bytes,
                        );
                    }
                    AppId::Controller(i) => {
                        self.controllers[i].handle_read(
                            &mut self.sched,
                            &mut self.ctx,
                            &self.net,
                            stream,
                            &bytes,
                        );
                    }
                    AppId::Host(_) => {}
                }
            }
            Event::StreamStagger {
                stream,
                from,
                bytes,
            } => {
                // re-enter the connection that deferred this send
                match self.net.streams[stream.0].app(from) {
                    AppId::Switch(i) => {
                        let conn = &mut self.switches[i].controller;
                        conn.send_bytes(&mut self.sched, &self.net, bytes);
                    }
                    AppId::Switch13(i) => {
                        let conn = &mut self.switches13[i].controller;
                        conn.send_bytes(&mut self.sched, &self.net, bytes);
                    }
                    AppId::Controller(i) => {
                        if let Some(conn) = self.controllers[i].connection_mut(stream) {
                            conn.send_bytes(&mut self.sched, &self.net, bytes);
                        }
                    }
                    AppId::Host(_) => {}
                }
            }
            Event::FlowExpire {
                app,
                table_id,
                flow_id,
                reason,
            } => match app {
                AppId::Switch(i) => self.switches[i].flow_expired(
                    &mut self.sched,
                    &mut self.ctx,
                    &self.net,
                    table_id,
                    flow_id,
                    reason,
                ),
                AppId::Switch13(i) => self.switches13[i].flow_expired(
                    &mut self.sched,
                    &mut self.ctx,
                    &self.net,
                    table_id,
                    flow_id,
                    reason,
                ),
                _ => {}
            },
        }
    }

    fn device_receive(&mut self, device: DeviceId, frame: Vec<u8>) {
        {
            let dev = &mut self.net.devices[device.0];
            dev.rx_packets += 1;
            dev.rx_bytes += frame.len() as u64;
        }
        if frame.len() < link::ETHERNET_HEADER_LEN {
            self.net.devices[device.0].rx_dropped += 1;
            return;
        }
        let (dst, sdn_enabled, owner) = {
            let dev = &self.net.devices[device.0];
            (
                EthernetAddress::from_bytes(&frame[0..6]),
                dev.sdn_enabled,
                dev.owner,
            )
        };

        if sdn_enabled {
            match owner {
                AppId::Switch(i) => {
                    self.switches[i].handle_frame(
                        &mut self.sched,
                        &mut self.ctx,
                        &mut self.net,
                        device,
                        frame,
                    );
                }
                AppId::Switch13(i) => {
                    self.switches13[i].handle_frame(
                        &mut self.sched,
                        &mut self.ctx,
                        &mut self.net,
                        device,
                        frame,
                    );
                }
                _ => {
                    self.net.devices[device.0].rx_dropped += 1;
                }
            }
            return;
        }

        // STP BPDUs stop at a non-participating port
        if dst == link::BPDU_STP_ADDRESS_1 || dst == link::BPDU_STP_ADDRESS_2 {
            trace!("dropping BPDU at non-SDN device {}", device.0);
            self.net.devices[device.0].rx_dropped += 1;
            return;
        }
        // LLDP discovery frames are for the SDN callback only
        if dst == link::LLDP_DISCOVERY_ADDRESS {
            trace!("dropping LLDP frame at non-SDN device {}", device.0);
            self.net.devices[device.0].rx_dropped += 1;
            return;
        }

        if let AppId::Host(i) = owner {
            self.hosts[i].received.push(frame);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fires_in_time_order() {
        let mut sched = Scheduler::new();
        sched.schedule_at(20, Event::Start(AppId::Host(2)));
        sched.schedule_at(10, Event::Start(AppId::Host(1)));
        sched.schedule_at(30, Event::Start(AppId::Host(3)));
        let mut order = Vec::new();
        while let Some(event) = sched.pop() {
            if let Event::Start(AppId::Host(i)) = event {
                order.push((sched.now(), i));
            }
        }
        assert_eq!(order, vec![(10, 1), (20, 2), (30, 3)]);
    }

    #[test]
    fn same_instant_fifo() {
        let mut sched = Scheduler::new();
        for i in 0..4 {
            sched.schedule_at(5, Event::Start(AppId::Host(i)));
        }
        let mut order = Vec::new();
        while let Some(event) = sched.pop() {
            if let Event::Start(AppId::Host(i)) = event {
                order.push(i);
            }
        }
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut sched = Scheduler::new();
        let keep = sched.schedule_at(1, Event::Start(AppId::Host(0)));
        let gone = sched.schedule_at(2, Event::Start(AppId::Host(1)));
        sched.cancel(gone);
        sched.cancel(gone);
        let mut fired = Vec::new();
        while let Some(event) = sched.pop() {
            if let Event::Start(AppId::Host(i)) = event {
                fired.push(i);
            }
        }
        assert_eq!(fired, vec![0]);
        let _ = keep;
    }

    #[test]
    fn xids_increase() {
        let mut ctx = Context::new(1);
        let a = ctx.next_xid();
        let b = ctx.next_xid();
        assert!(b > a);
    }

    #[test]
    fn buffer_ids_reproducible() {
        let mut a = Context::new(42);
        let mut b = Context::new(42);
        for _ in 0..8 {
            assert_eq!(a.random_buffer_id(1000), b.random_buffer_id(1000));
        }
    }
}
