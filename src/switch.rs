//! The OpenFlow 1.0 switch application: terminates the controller session,
//! owns the data plane ports, and steers every received frame through its
//! flow table.

use std::collections::HashMap;

use smoltcp::wire::EthernetAddress;

use connection::{ConnState, Connection};
use flow_table::{FlowTable, PacketVerdict};
use headers::HeaderStack;
use link::{self, NetState};
use packets::flow_mod::{self, Command, NO_BUFFER};
use packets::flow_removed::Reason as RemovedReason;
use packets::openflow::{PacketRepr, PayloadRepr, Version};
use packets::packet_in::Reason as PacketInReason;
use packets::phy_port::{self, PhyPortRepr};
use packets::{error, features_reply, packet_out, port_status, stats, switch_config};
use port::{PortNumber, OFP_CONTROLLER_PORT};
use sim::{AppId, Context, DeviceId, Scheduler, StreamId};
use Repr;

/// Logical capacity of the packet buffer map.
pub const MAX_BUFFERS: u32 = 1_000_000_000;

/// A data plane port: the owning net device plus the OpenFlow-visible
/// config, state, features and counters.
pub struct Port {
    pub port_no: u16,
    pub device: DeviceId,
    pub config: u32,
    pub state: u32,
    pub features: u32,
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub tx_errors: u64,
}

impl Port {
    /// A port forwards only when none of the disabling config bits is set.
    pub fn enabled(&self) -> bool {
        self.config
            & (phy_port::OFPPC_PORT_DOWN | phy_port::OFPPC_NO_RECV | phy_port::OFPPC_NO_FWD)
            == 0
    }

    pub fn no_flood(&self) -> bool {
        self.config & phy_port::OFPPC_NO_FLOOD != 0
    }

    pub fn to_phy_port(&self, switch_id: usize, net: &NetState) -> PhyPortRepr {
        PhyPortRepr {
            port_no: self.port_no,
            hw_addr: net.devices[self.device.0].address,
            name: format!("sw{}-p{}", switch_id, self.port_no),
            config: self.config,
            state: self.state,
            curr: self.features,
            advertised: self.features,
            supported: self.features,
            peer: self.features,
        }
    }

    pub fn to_port_stats(&self, net: &NetState) -> stats::PortStats {
        let device = &net.devices[self.device.0];
        stats::PortStats {
            port_no: self.port_no,
            rx_packets: device.rx_packets,
            tx_packets: self.tx_packets,
            rx_bytes: device.rx_bytes,
            tx_bytes: self.tx_bytes,
            rx_dropped: device.rx_dropped,
            tx_dropped: device.tx_dropped,
            tx_errors: self.tx_errors,
            ..Default::default()
        }
    }
}

fn mac_to_u64(addr: EthernetAddress) -> u64 {
    let bytes = addr.as_bytes();
    let mut word = 0u64;
    for &byte in bytes {
        word = word << 8 | byte as u64;
    }
    word
}

pub struct Switch {
    pub id: usize,
    /// Ordinal identity; the wire datapath id is derived from the
    /// controller-facing MAC.
    pub datapath_id: u64,
    pub serial: String,
    pub miss_send_len: u16,
    pub controller: Connection,
    pub ports: Vec<Port>,
    pub table: FlowTable,
    pub buffers: HashMap<u32, Vec<u8>>,
    /// Frames steered to the unimplemented NORMAL/LOCAL reserved ports.
    pub dropped_reserved: u64,
    total_ports: u16,
}

impl Switch {
    pub fn new(id: usize, ctx: &mut Context) -> Switch {
        Switch {
            id,
            datapath_id: ctx.next_datapath_id(),
            serial: ctx.next_serial(),
            miss_send_len: u16::max_value(),
            controller: Connection::unconnected(ctx.next_conn_id()),
            ports: Vec::new(),
            table: FlowTable::new(AppId::Switch(id), 0),
            buffers: HashMap::new(),
            dropped_reserved: 0,
            total_ports: 0,
        }
    }

    /// Enumerate the local devices: the point-to-point one carries the
    /// controller session, every layer-2 one becomes a data plane port.
    pub fn start(&mut self, sched: &mut Scheduler, ctx: &mut Context, net: &mut NetState) {
        info!("switch {} starting at t={}", self.id, sched.now());
        for device in net.devices_of(AppId::Switch(self.id)) {
            match net.devices[device.0].kind {
                link::DeviceKind::PointToPoint => {
                    self.establish_controller_connection(sched, ctx, net, device)
                }
                link::DeviceKind::Layer2 => self.establish_port_connection(net, device),
            }
        }
    }

    fn establish_controller_connection(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &mut NetState,
        device: DeviceId,
    ) {
        let controller = match net.remote_app(device) {
            Some(app @ AppId::Controller(_)) => app,
            _ => {
                warn!(
                    "switch {}: point-to-point device {} has no controller peer",
                    self.id, device.0
                );
                return;
            }
        };
        info!(
            "switch {} dialing controller on port {}",
            self.id, OFP_CONTROLLER_PORT
        );
        let channel = match net.devices[device.0].channel {
            Some(channel) => channel,
            None => return,
        };
        let stream = net.open_stream(sched, channel, AppId::Switch(self.id), controller);
        self.controller = Connection::new(ctx.next_conn_id(), stream, ::sim::Side::A);
    }

    fn establish_port_connection(&mut self, net: &mut NetState, device: DeviceId) {
        net.devices[device.0].sdn_enabled = true;
        let port_no = self.next_port_number();
        let features = link::port_features(net.devices[device.0].data_rate);
        info!(
            "switch {}: device {} registered as port {}",
            self.id, device.0, port_no
        );
        self.ports.push(Port {
            port_no,
            device,
            config: 0,
            state: 0,
            features,
            tx_packets: 0,
            tx_bytes: 0,
            tx_errors: 0,
        });
    }

    /// Port numbers count up from one and are never reused; the well-known
    /// controller port number is skipped so it stays unambiguous.
    fn next_port_number(&mut self) -> u16 {
        self.total_ports += 1;
        if self.total_ports == OFP_CONTROLLER_PORT {
            self.total_ports += 1;
        }
        self.total_ports
    }

    fn port_index(&self, port_no: u16) -> Option<usize> {
        self.ports.iter().position(|port| port.port_no == port_no)
    }

    fn port_index_by_device(&self, device: DeviceId) -> Option<usize> {
        self.ports.iter().position(|port| port.device == device)
    }

    /// The controller stream connected: drive the handshake with a Hello.
    pub fn handle_connected(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        _stream: StreamId,
    ) {
        debug!("switch {}: controller connection succeeded", self.id);
        let hello = PacketRepr::new(
            Version::OpenFlow1Dot0,
            ctx.next_xid(),
            PayloadRepr::Hello(Default::default()),
        );
        let _ = self.controller.send(sched, net, &hello);
    }

    fn send_to_controller(
        &mut self,
        sched: &mut Scheduler,
        net: &NetState,
        xid: u32,
        payload: PayloadRepr,
    ) {
        let message = PacketRepr::new(Version::OpenFlow1Dot0, xid, payload);
        if let Err(err) = self.controller.send(sched, net, &message) {
            warn!("switch {}: failed to serialize message: {}", self.id, err);
        }
    }

    /// Inbound dispatch for the controller stream.
    pub fn handle_control_bytes(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &mut NetState,
        bytes: &[u8],
    ) {
        let message = match PacketRepr::parse(bytes) {
            Ok(message) => message,
            Err(err) => {
                warn!("switch {}: dropping unparseable message: {}", self.id, err);
                return;
            }
        };
        self.controller.recv += 1;

        if self.controller.state == ConnState::Handshake {
            match message.payload {
                PayloadRepr::Hello(_) => {
                    if message.version == Version::OpenFlow1Dot0 {
                        self.controller.version = Version::OpenFlow1Dot0.into();
                        self.controller.state = ConnState::Running;
                        debug!("switch {}: handshake complete", self.id);
                    } else {
                        self.controller.state = ConnState::Failed;
                        let payload = PayloadRepr::Error(
                            error::PacketRepr::hello_failed_incompatible(Version::OpenFlow1Dot0),
                        );
                        let xid = ctx.next_xid();
                        self.send_to_controller(sched, net, xid, payload);
                    }
                }
                PayloadRepr::Error(_) => self.controller.state = ConnState::Failed,
                _ => {
                    self.controller.state = ConnState::Failed;
                    let payload = PayloadRepr::Error(error::PacketRepr::hello_failed_incompatible(
                        Version::OpenFlow1Dot0,
                    ));
                    let xid = ctx.next_xid();
                    self.send_to_controller(sched, net, xid, payload);
                }
            }
            return;
        }
        if self.controller.state != ConnState::Running {
            return;
        }

        match message.payload {
            PayloadRepr::Hello(_) => {}
            PayloadRepr::EchoRequest(data) => {
                self.send_to_controller(sched, net, message.xid, PayloadRepr::EchoReply(data));
            }
            PayloadRepr::FeaturesRequest => {
                self.handle_features_request(sched, net, message.xid)
            }
            PayloadRepr::GetConfigRequest => {
                let payload = PayloadRepr::GetConfigReply(switch_config::PacketRepr {
                    flags: switch_config::Flags::FragmentNormal,
                    miss_send_len: self.miss_send_len,
                });
                let xid = ctx.next_xid();
                self.send_to_controller(sched, net, xid, payload);
            }
            PayloadRepr::SetConfig(config) => {
                self.miss_send_len = config.miss_send_len;
            }
            PayloadRepr::FlowMod(flow_mod) => {
                self.handle_flow_mod(sched, ctx, net, &flow_mod)
            }
            PayloadRepr::PortMod(port_mod) => {
                if let Some(index) = self.port_index(port_mod.port_no) {
                    let port = &mut self.ports[index];
                    port.config =
                        (port_mod.config & port_mod.mask) | (port.config & !port_mod.mask);
                }
            }
            PayloadRepr::PacketOut(packet_out) => {
                self.handle_packet_out(sched, ctx, net, packet_out)
            }
            PayloadRepr::StatsRequest(request) => {
                self.handle_stats_request(sched, ctx, net, &request)
            }
            PayloadRepr::BarrierRequest => {
                // handlers run to completion, so there is no in-flight work
                // left to drain by the time the barrier is processed
                self.send_to_controller(sched, net, message.xid, PayloadRepr::BarrierReply);
            }
            other => {
                trace!("switch {}: ignoring message {:?}", self.id, other);
            }
        }
    }

    fn handle_features_request(&mut self, sched: &mut Scheduler, net: &NetState, xid: u32) {
        // the datapath id is the MAC of the controller-facing device with
        // 16 bits of zero padding
        let controller_mac = net
            .devices_of(AppId::Switch(self.id))
            .into_iter()
            .find(|&device| net.devices[device.0].kind == link::DeviceKind::PointToPoint)
            .map(|device| net.devices[device.0].address)
            .unwrap_or(EthernetAddress([0; 6]));
        let ports = self
            .ports
            .iter()
            .map(|port| port.to_phy_port(self.id, net))
            .collect();
        let payload = PayloadRepr::FeaturesReply(features_reply::PacketRepr {
            datapath_id: mac_to_u64(controller_mac),
            n_buffers: MAX_BUFFERS,
            n_tables: 1,
            capabilities: features_reply::CAP_FLOW_STATS
                | features_reply::CAP_TABLE_STATS
                | features_reply::CAP_PORT_STATS,
            actions: 0x7ff,
            ports,
        });
        self.send_to_controller(sched, net, xid, payload);
    }

    fn handle_flow_mod(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &mut NetState,
        message: &flow_mod::PacketRepr,
    ) {
        match message.command {
            Command::Add => {
                if self.table.add_flow(sched, message).is_err() {
                    let payload = PayloadRepr::Error(error::PacketRepr::flow_mod_failed_overlap(
                        Version::OpenFlow1Dot0,
                    ));
                    let xid = ctx.next_xid();
                    self.send_to_controller(sched, net, xid, payload);
                    return;
                }
            }
            Command::Modify | Command::ModifyStrict => self.table.modify_flow(sched, message),
            Command::Delete | Command::DeleteStrict => {
                self.table.delete_flow(sched, message);
            }
            Command::Unknown(command) => {
                warn!("switch {}: unknown flow mod command {}", self.id, command);
                return;
            }
        }

        let deleting = message.command == Command::Delete
            || message.command == Command::DeleteStrict;
        if !deleting && message.buffer_id != NO_BUFFER {
            match self.buffers.get(&message.buffer_id).cloned() {
                Some(frame) => {
                    self.handle_packet(sched, ctx, net, frame, message.flow_match.in_port);
                }
                None => {
                    warn!(
                        "switch {}: flow mod references unknown buffer id {}",
                        self.id, message.buffer_id
                    );
                }
            }
        }
    }

    fn handle_packet_out(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &mut NetState,
        message: packet_out::PacketRepr,
    ) {
        let mut frame = if message.buffer_id == NO_BUFFER {
            message.data.clone()
        } else {
            match self.buffers.get(&message.buffer_id).cloned() {
                Some(frame) => frame,
                None => {
                    warn!(
                        "switch {}: packet out references unknown buffer id {}",
                        self.id, message.buffer_id
                    );
                    return;
                }
            }
        };

        let mut stack = match HeaderStack::parse(&frame) {
            Ok(stack) => stack,
            Err(_) => {
                warn!("switch {}: packet out carries unparseable frame", self.id);
                return;
            }
        };
        let mut outputs = Vec::new();
        for action in &message.actions {
            ::flow_table::apply_action(action, &mut stack, &mut frame, &mut outputs);
        }
        for decision in outputs {
            match PortNumber::from(decision.port) {
                PortNumber::Flood => {
                    self.flood(sched, net, &frame, message.in_port, false);
                    return;
                }
                PortNumber::All => {
                    self.flood(sched, net, &frame, message.in_port, true);
                    return;
                }
                PortNumber::Table => {
                    self.handle_packet(sched, ctx, net, frame.clone(), message.in_port);
                    return;
                }
                PortNumber::Regular(port_no) => {
                    if let Some(index) = self.port_index(port_no) {
                        self.send_on_port(sched, net, index, &frame, decision.max_len);
                    }
                }
                _ => {}
            }
        }
    }

    fn handle_stats_request(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        request: &stats::RequestRepr,
    ) {
        let now = sched.now();
        let reply = match *request {
            stats::RequestRepr::Desc => stats::ReplyRepr::Desc(self.description()),
            stats::RequestRepr::Flow(ref request) => {
                let entries = self
                    .table
                    .matching_flows(&request.flow_match)
                    .into_iter()
                    .map(|flow| flow.to_flow_stats(now))
                    .collect();
                stats::ReplyRepr::Flow(entries)
            }
            stats::RequestRepr::Aggregate(ref request) => {
                let hits = self.table.matching_flows(&request.flow_match);
                stats::ReplyRepr::Aggregate {
                    packet_count: hits.iter().map(|flow| flow.packet_count).sum(),
                    byte_count: hits.iter().map(|flow| flow.byte_count).sum(),
                    flow_count: hits.len() as u32,
                }
            }
            stats::RequestRepr::Table => {
                stats::ReplyRepr::Table(vec![self.table.table_stats()])
            }
            stats::RequestRepr::Port { port_no } => {
                let entries = if PortNumber::from(port_no) == PortNumber::Any {
                    self.ports.iter().map(|port| port.to_port_stats(net)).collect()
                } else {
                    self.port_index(port_no)
                        .map(|index| vec![self.ports[index].to_port_stats(net)])
                        .unwrap_or_default()
                };
                stats::ReplyRepr::Port(entries)
            }
            stats::RequestRepr::Queue { .. } => stats::ReplyRepr::Queue(Vec::new()),
            stats::RequestRepr::Vendor { vendor, .. } => stats::ReplyRepr::Vendor {
                vendor,
                data: Vec::new(),
            },
        };
        let xid = ctx.next_xid();
        self.send_to_controller(sched, net, xid, PayloadRepr::StatsReply(reply));
    }

    fn description(&self) -> stats::DescStats {
        stats::DescStats {
            manufacturer: "ofsim".to_string(),
            hardware: "simulated layer2 p2p switch".to_string(),
            software: env!("CARGO_PKG_VERSION").to_string(),
            serial_num: self.serial.clone(),
            datapath: format!("datapath {}", self.datapath_id),
        }
    }

    /// Inbound dispatch for the data plane: map the device to its port and
    /// run the packet through the flow table.
    pub fn handle_frame(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &mut NetState,
        device: DeviceId,
        frame: Vec<u8>,
    ) {
        if !self.controller.is_running() {
            warn!(
                "switch {}: not in running state yet, dropping frame",
                self.id
            );
            net.devices[device.0].rx_dropped += 1;
            return;
        }
        let in_port = match self.port_index_by_device(device) {
            Some(index) => self.ports[index].port_no,
            None => {
                net.devices[device.0].rx_dropped += 1;
                return;
            }
        };
        self.handle_packet(sched, ctx, net, frame, in_port);
    }

    /// Steer one frame through the flow table and interpret the output
    /// decisions.
    pub fn handle_packet(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &mut NetState,
        mut frame: Vec<u8>,
        in_port: u16,
    ) {
        let PacketVerdict { matched, outputs } =
            self.table.handle_packet(sched, &mut frame, in_port);

        if !matched {
            self.send_packet_in(sched, ctx, net, &frame, in_port, PacketInReason::NoMatch);
            return;
        }
        for decision in outputs {
            match PortNumber::from(decision.port) {
                PortNumber::Controller => {
                    self.send_packet_in(sched, ctx, net, &frame, in_port, PacketInReason::Action);
                    return;
                }
                PortNumber::Flood => {
                    self.flood(sched, net, &frame, in_port, false);
                    return;
                }
                PortNumber::All => {
                    self.flood(sched, net, &frame, in_port, true);
                    return;
                }
                PortNumber::InPort => {
                    if let Some(index) = self.port_index(in_port) {
                        self.send_on_port(sched, net, index, &frame, decision.max_len);
                    }
                }
                PortNumber::Normal | PortNumber::Local => {
                    trace!(
                        "switch {}: dropping frame for unimplemented reserved port",
                        self.id
                    );
                    self.dropped_reserved += 1;
                }
                PortNumber::Table | PortNumber::Max | PortNumber::Any => {}
                PortNumber::Regular(port_no) => {
                    if let Some(index) = self.port_index(port_no) {
                        if self.ports[index].enabled() {
                            self.send_on_port(sched, net, index, &frame, decision.max_len);
                        }
                    }
                }
            }
        }
    }

    fn send_on_port(
        &mut self,
        sched: &mut Scheduler,
        net: &mut NetState,
        index: usize,
        frame: &[u8],
        max_len: u16,
    ) {
        let copy = if (max_len as usize) < frame.len() {
            frame[..max_len as usize].to_vec()
        } else {
            frame.to_vec()
        };
        let port = &mut self.ports[index];
        port.tx_packets += 1;
        port.tx_bytes += copy.len() as u64;
        net.transmit(sched, port.device, copy);
    }

    /// Send one copy out every enabled port except the ingress one.
    /// `FLOOD` honors `NO_FLOOD`; `ALL` ignores it.
    fn flood(
        &mut self,
        sched: &mut Scheduler,
        net: &mut NetState,
        frame: &[u8],
        in_port: u16,
        include_no_flood: bool,
    ) {
        for index in 0..self.ports.len() {
            {
                let port = &self.ports[index];
                if port.port_no == in_port || !port.enabled() {
                    continue;
                }
                if !include_no_flood && port.no_flood() {
                    continue;
                }
            }
            self.send_on_port(sched, net, index, frame, u16::max_value());
        }
    }

    /// Punt a packet to the controller, buffering a copy under a fresh
    /// random id. When the buffer map is saturated the packet rides the
    /// message whole with the no-buffer id.
    fn send_packet_in(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        frame: &[u8],
        in_port: u16,
        reason: PacketInReason,
    ) {
        let (buffer_id, data) = if self.buffers.len() < MAX_BUFFERS as usize {
            let mut id = ctx.random_buffer_id(MAX_BUFFERS);
            while self.buffers.contains_key(&id) {
                id = ctx.random_buffer_id(MAX_BUFFERS);
            }
            self.buffers.insert(id, frame.to_vec());
            let keep = (self.miss_send_len as usize).min(frame.len());
            (id, frame[..keep].to_vec())
        } else {
            (NO_BUFFER, frame.to_vec())
        };
        debug!(
            "switch {}: packet in, reason {:?}, buffer id {:#x}",
            self.id, reason, buffer_id
        );
        let payload = PayloadRepr::PacketIn(::packets::packet_in::PacketRepr {
            buffer_id,
            total_len: frame.len() as u16,
            in_port,
            reason,
            data,
        });
        let xid = ctx.next_xid();
        self.send_to_controller(sched, net, xid, payload);
    }

    /// A flow timer fired: evict the flow if it still lives and notify the
    /// controller.
    pub fn flow_expired(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        _table_id: u8,
        flow_id: u64,
        reason: RemovedReason,
    ) {
        let now = sched.now();
        if let Some(flow) = self.table.expire(sched, flow_id) {
            debug!(
                "switch {}: flow id={} expired ({:?}) at t={}",
                self.id, flow_id, reason, now
            );
            let payload = PayloadRepr::FlowRemoved(flow.to_flow_removed(now, reason));
            let xid = ctx.next_xid();
            self.send_to_controller(sched, net, xid, payload);
        }
    }

    /// Report a port change to the controller.
    pub fn send_port_status(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        port_no: u16,
        reason: port_status::Reason,
    ) {
        if let Some(index) = self.port_index(port_no) {
            let port = self.ports[index].to_phy_port(self.id, net);
            let payload = PayloadRepr::PortStatus(port_status::PacketRepr { reason, port });
            let xid = ctx.next_xid();
            self.send_to_controller(sched, net, xid, payload);
        }
    }

    /// Tear the switch down, canceling every pending flow timer.
    pub fn stop(&mut self, sched: &mut Scheduler) {
        self.table.clear(sched);
        self.controller.close();
    }
}
