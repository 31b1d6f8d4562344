extern crate ofsim;
extern crate smoltcp;

use std::cell::RefCell;
use std::rc::Rc;

use smoltcp::wire::EthernetAddress;

use ofsim::actions::Action;
use ofsim::controller::{BaseLearningSwitch, ControllerEvent, ControllerIo, EventKind, Listener};
use ofsim::flow_match::{Match, OFPFW_DL_DST};
use ofsim::flow_mod::{self, Command, NO_BUFFER};
use ofsim::link::LinkConfig;
use ofsim::openflow::{PacketRepr, PayloadRepr, Version};
use ofsim::sim::{AppId, HostId, Nanos, Simulation};
use ofsim::{flow_removed, hello, packet_in, packet_out};
use ofsim::Repr;

mod wire {
    use super::*;

    #[test]
    fn hello_bytes() {
        let repr = PacketRepr::new(
            Version::OpenFlow1Dot0,
            1,
            PayloadRepr::Hello(hello::PacketRepr::default()),
        );
        let bytes = repr.to_bytes().unwrap();
        assert_eq!(&bytes[..], &[0x01, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(PacketRepr::parse(&bytes).unwrap(), repr);
    }

    #[test]
    fn packet_in_bytes() {
        let repr = PacketRepr::new(
            Version::OpenFlow1Dot0,
            2,
            PayloadRepr::PacketIn(packet_in::PacketRepr {
                buffer_id: 0x11223344,
                total_len: 4,
                in_port: 1,
                reason: packet_in::Reason::NoMatch,
                data: vec![0xde, 0xad, 0xbe, 0xef],
            }),
        );
        let bytes = repr.to_bytes().unwrap();
        #[cfg_attr(rustfmt, rustfmt_skip)]
        assert_eq!(&bytes[..], &[
            0x01, 0x0a, 0x00, 0x16,                         // version 1.0, packet in, length 22
            0x00, 0x00, 0x00, 0x02,                         // xid
            0x11, 0x22, 0x33, 0x44,                         // buffer id
            0x00, 0x04,                                     // total len
            0x00, 0x01,                                     // in port
            0x00, 0x00,                                     // reason no-match, pad
            0xde, 0xad, 0xbe, 0xef,                         // frame
        ]);
        assert_eq!(PacketRepr::parse(&bytes).unwrap(), repr);
    }

    #[test]
    fn flow_mod_roundtrip_through_header() {
        let mut flow_match = Match::default();
        flow_match.exact(OFPFW_DL_DST);
        flow_match.dl_dst = EthernetAddress([2, 0, 0, 0, 0, 4]);
        let repr = PacketRepr::new(
            Version::OpenFlow1Dot0,
            9,
            PayloadRepr::FlowMod(flow_mod::PacketRepr {
                flow_match,
                cookie: 7,
                command: Command::Add,
                idle_timeout: 5,
                hard_timeout: 0,
                priority: 100,
                buffer_id: NO_BUFFER,
                out_port: 0xffff,
                flags: 0,
                actions: vec![Action::Output { port: 2, max_len: 0xffff }],
            }),
        );
        let bytes = repr.to_bytes().unwrap();
        assert_eq!(bytes.len(), 8 + 64 + 8);
        assert_eq!(bytes[1], 14); // v1.0 flow mod type code
        assert_eq!(PacketRepr::parse(&bytes).unwrap(), repr);
    }
}

/// A controller behavior for the scenarios: records every event with its
/// arrival time, optionally installs flows when a switch comes up, and
/// optionally answers packet-ins with a flooding packet-out.
struct TestListener {
    base: BaseLearningSwitch,
    events: Rc<RefCell<Vec<(Nanos, ControllerEvent)>>>,
    install: Rc<RefCell<Vec<flow_mod::PacketRepr>>>,
    flood_on_packet_in: bool,
}

impl Listener for TestListener {
    fn on_event(&mut self, io: &mut ControllerIo, event: ControllerEvent) {
        self.base.on_event(io, event.clone());
        self.events.borrow_mut().push((io.now(), event.clone()));
        match event.kind {
            EventKind::SwitchUp(_) => {
                for flow_mod in self.install.borrow().iter() {
                    io.send(event.conn, PayloadRepr::FlowMod(flow_mod.clone()))
                        .unwrap();
                }
            }
            EventKind::PacketIn(ref message) => {
                if !self.flood_on_packet_in {
                    return;
                }
                if let PayloadRepr::PacketIn(ref packet_in) = message.payload {
                    let reply = packet_out::PacketRepr {
                        buffer_id: packet_in.buffer_id,
                        in_port: packet_in.in_port,
                        actions: vec![Action::Output {
                            port: u16::from(ofsim::PortNumber::Flood),
                            max_len: 0xffff,
                        }],
                        data: if packet_in.buffer_id == NO_BUFFER {
                            packet_in.data.clone()
                        } else {
                            Vec::new()
                        },
                    };
                    io.send(event.conn, PayloadRepr::PacketOut(reply)).unwrap();
                }
            }
            _ => {}
        }
    }
}

struct Scenario {
    sim: Simulation,
    hosts: Vec<HostId>,
    events: Rc<RefCell<Vec<(Nanos, ControllerEvent)>>>,
    install: Rc<RefCell<Vec<flow_mod::PacketRepr>>>,
}

/// One switch with a controller and `host_count` hosts in a star.
fn star(host_count: usize, flood_on_packet_in: bool) -> Scenario {
    let events = Rc::new(RefCell::new(Vec::new()));
    let install = Rc::new(RefCell::new(Vec::new()));
    let listener = TestListener {
        base: BaseLearningSwitch::new(),
        events: events.clone(),
        install: install.clone(),
        flood_on_packet_in,
    };
    let mut sim = Simulation::new(7);
    let controller = sim.add_controller(Version::OpenFlow1Dot0, Box::new(listener));
    let switch = sim.add_switch();
    sim.connect(switch, controller, LinkConfig::default());
    let hosts = (0..host_count)
        .map(|_| {
            let host = sim.add_host();
            sim.connect(AppId::Host(host.0), switch, LinkConfig::default());
            host
        })
        .collect();
    sim.start();
    Scenario {
        sim,
        hosts,
        events,
        install,
    }
}

fn host_mac(scenario: &Scenario, index: usize) -> EthernetAddress {
    let host = &scenario.sim.hosts[scenario.hosts[index].0];
    host.address(&scenario.sim.net)
}

fn packet_ins(events: &[(Nanos, ControllerEvent)]) -> Vec<(Nanos, packet_in::PacketRepr)> {
    events
        .iter()
        .filter_map(|&(time, ref event)| match event.kind {
            EventKind::PacketIn(ref message) => match message.payload {
                PayloadRepr::PacketIn(ref repr) => Some((time, repr.clone())),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

fn flow_removals(events: &[(Nanos, ControllerEvent)]) -> Vec<(Nanos, flow_removed::PacketRepr)> {
    events
        .iter()
        .filter_map(|&(time, ref event)| match event.kind {
            EventKind::FlowRemoved(ref message) => match message.payload {
                PayloadRepr::FlowRemoved(ref repr) => Some((time, repr.clone())),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

fn unicast_flow(dst: EthernetAddress, out_port: u16) -> flow_mod::PacketRepr {
    let mut flow_match = Match::default();
    flow_match.exact(OFPFW_DL_DST);
    flow_match.dl_dst = dst;
    flow_mod::PacketRepr {
        flow_match,
        cookie: 0,
        command: Command::Add,
        idle_timeout: 0,
        hard_timeout: 0,
        priority: 100,
        buffer_id: NO_BUFFER,
        out_port: 0xffff,
        flags: 0,
        actions: vec![Action::Output { port: out_port, max_len: 0xffff }],
    }
}

const SECOND: Nanos = 1_000_000_000;
const BROADCAST: EthernetAddress = EthernetAddress([0xff; 6]);

#[test]
fn handshake_reaches_running_and_reports_switch_up() {
    let mut scenario = star(0, false);
    scenario.sim.run();

    let switch = &scenario.sim.switches[0];
    assert!(switch.controller.is_running());

    let events = scenario.events.borrow();
    let switch_ups = events
        .iter()
        .filter(|&&(_, ref event)| match event.kind {
            EventKind::SwitchUp(_) => true,
            _ => false,
        })
        .count();
    assert_eq!(switch_ups, 1);
}

#[test]
fn broadcast_without_flows_punts_to_controller() {
    // H1 -- S1 -- H2 with a silent controller: one broadcast frame ends up
    // as a no-match packet in, and nothing reaches H2
    let mut scenario = star(2, false);
    scenario
        .sim
        .host_send_at(SECOND, scenario.hosts[0], BROADCAST, 0x0800, vec![0; 32]);
    scenario.sim.run();

    let events = scenario.events.borrow();
    let punted = packet_ins(&events);
    assert_eq!(punted.len(), 1);
    assert_eq!(punted[0].1.reason, packet_in::Reason::NoMatch);
    assert_eq!(punted[0].1.in_port, 1);
    assert!(scenario.sim.hosts[scenario.hosts[1].0].received.is_empty());
    // the frame was buffered under the advertised id
    let buffer_id = punted[0].1.buffer_id;
    assert!(scenario.sim.switches[0].buffers.contains_key(&buffer_id));
}

#[test]
fn installed_flow_forwards_and_counts() {
    // default deny with an explicit unicast install: all ten frames arrive
    // and the flow counters account for every byte
    let mut scenario = star(2, false);
    let h2 = host_mac(&scenario, 1);
    scenario.install.borrow_mut().push(unicast_flow(h2, 2));

    for i in 0..10 {
        scenario.sim.host_send_at(
            SECOND + i * 1_000_000,
            scenario.hosts[0],
            h2,
            0x0800,
            vec![i as u8; 32],
        );
    }
    scenario.sim.run();

    assert_eq!(scenario.sim.hosts[scenario.hosts[1].0].received.len(), 10);
    assert!(packet_ins(&scenario.events.borrow()).is_empty());

    let flows = scenario.sim.switches[0].table.flows();
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].packet_count, 10);
    // every frame is 14 bytes of Ethernet header plus the 46 byte minimum
    // payload
    assert_eq!(flows[0].byte_count, 10 * 60);
}

#[test]
fn idle_timeout_evicts_after_quiet_period() {
    let mut scenario = star(2, false);
    let h2 = host_mac(&scenario, 1);
    let mut install = unicast_flow(h2, 2);
    install.idle_timeout = 5;
    scenario.install.borrow_mut().push(install);

    scenario
        .sim
        .host_send_at(SECOND, scenario.hosts[0], h2, 0x0800, vec![0; 32]);
    scenario.sim.run();

    let events = scenario.events.borrow();
    let removals = flow_removals(&events);
    assert_eq!(removals.len(), 1);
    let (seen_at, ref removal) = removals[0];
    assert_eq!(removal.reason, flow_removed::Reason::IdleTimeout);
    assert_eq!(removal.packet_count, 1);

    // the frame leaves H1 at t=1s, spends 60 * 8 / 100Mb/s = 4.8us on the
    // wire plus 2ms of propagation, and resets the idle timer on the hit;
    // eviction lands exactly five seconds later and the notification takes
    // one more control-link delay to reach the controller
    let hit_at = SECOND + 4_800 + 2_000_000;
    assert_eq!(seen_at, hit_at + 5 * SECOND + 2_000_000);
    assert!(scenario.sim.switches[0].table.flows().is_empty());
}

#[test]
fn hard_timeout_preempts_live_traffic() {
    let mut scenario = star(2, false);
    let h2 = host_mac(&scenario, 1);
    let mut install = unicast_flow(h2, 2);
    install.hard_timeout = 3;
    scenario.install.borrow_mut().push(install);

    // traffic every 100ms from t=0.5s onwards, far past the hard timeout
    for i in 0..60 {
        scenario.sim.host_send_at(
            500_000_000 + i * 100_000_000,
            scenario.hosts[0],
            h2,
            0x0800,
            vec![0; 32],
        );
    }
    scenario.sim.run();

    let events = scenario.events.borrow();
    let removals = flow_removals(&events);
    assert_eq!(removals.len(), 1);
    let (_, ref removal) = removals[0];
    assert_eq!(removal.reason, flow_removed::Reason::HardTimeout);
    // the hard timer runs from installation, unaffected by the hits
    assert_eq!(removal.duration_sec, 3);
    assert_eq!(removal.duration_nsec, 0);
    assert!(removal.packet_count > 0);
    // frames sent after the eviction went back to being punted
    assert!(!packet_ins(&events).is_empty());
}

#[test]
fn buffered_packet_out_floods_original_bytes() {
    // a miss is buffered, the controller answers with a flood packet out
    // referencing the buffer id, and every host but the sender sees the
    // original frame byte for byte
    let mut scenario = star(3, true);
    scenario
        .sim
        .host_send_at(SECOND, scenario.hosts[0], BROADCAST, 0x0800, vec![7; 20]);
    scenario.sim.run();

    let expected = ofsim::link::build_frame(
        host_mac(&scenario, 0),
        BROADCAST,
        0x0800,
        &[7; 20],
    );
    for &receiver in &scenario.hosts[1..] {
        let received = &scenario.sim.hosts[receiver.0].received;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0], expected);
    }
    assert!(scenario.sim.hosts[scenario.hosts[0].0].received.is_empty());
}

#[test]
fn same_instant_packet_ins_arrive_distinct_and_ordered() {
    // two frames hit the switch at the same virtual instant; the stagger
    // rule spaces the resulting packet ins one tick apart in submit order
    let mut scenario = star(2, false);
    let unknown = EthernetAddress([2, 0xff, 0, 0, 0, 0x99]);
    scenario
        .sim
        .host_send_at(SECOND, scenario.hosts[0], unknown, 0x0800, vec![1; 32]);
    scenario
        .sim
        .host_send_at(SECOND, scenario.hosts[1], unknown, 0x0800, vec![2; 32]);
    scenario.sim.run();

    let events = scenario.events.borrow();
    let punted = packet_ins(&events);
    assert_eq!(punted.len(), 2);
    let (first_at, ref first) = punted[0];
    let (second_at, ref second) = punted[1];
    assert_eq!(first.in_port, 1);
    assert_eq!(second.in_port, 2);
    assert_eq!(second_at, first_at + 1);
}

#[test]
fn flood_skips_ingress_port() {
    // no duplicate flood: with three hosts the flooded copy shows up once
    // per non-ingress port and never loops back
    let mut scenario = star(3, true);
    scenario
        .sim
        .host_send_at(SECOND, scenario.hosts[2], BROADCAST, 0x0800, vec![9; 10]);
    scenario.sim.run();

    assert_eq!(scenario.sim.hosts[scenario.hosts[0].0].received.len(), 1);
    assert_eq!(scenario.sim.hosts[scenario.hosts[1].0].received.len(), 1);
    assert!(scenario.sim.hosts[scenario.hosts[2].0].received.is_empty());
}

#[test]
fn stream_of_misses_keeps_buffer_ids_unique() {
    let mut scenario = star(2, false);
    for i in 0..5 {
        scenario.sim.host_send_at(
            SECOND + i * 10_000_000,
            scenario.hosts[0],
            EthernetAddress([2, 0xee, 0, 0, 0, i as u8]),
            0x0800,
            vec![0; 16],
        );
    }
    scenario.sim.run();

    let events = scenario.events.borrow();
    let punted = packet_ins(&events);
    assert_eq!(punted.len(), 5);
    let mut ids: Vec<u32> = punted.iter().map(|&(_, ref p)| p.buffer_id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 5);
}
