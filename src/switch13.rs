//! The OpenFlow 1.3 switch application: the 64 table pipeline, the group
//! table, and the multipart statistics surface over the same port and
//! session plumbing as the 1.0 switch.

use std::collections::HashMap;

use smoltcp::wire::EthernetAddress;

use connection::{ConnState, Connection};
use flow_table13::{run_pipeline, ActionSet, FlowTable13, PipelineVerdict, TABLE_COUNT};
use group13::GroupTable13;
use link::{self, NetState};
use oxm::{FlowMatch, OxmField};
use packets::actions::Action13;
use packets::flow_mod::{self, Command, NO_BUFFER};
use packets::flow_removed::Reason as RemovedReason;
use packets::group_mod;
use packets::multipart;
use packets::openflow::{PacketRepr, PayloadRepr, Version};
use packets::packet_in::Reason13 as PacketInReason;
use packets::phy_port::{self, Port13Repr};
use packets::{error, features_reply, packet_out, stats, switch_config};
use port::{PortNumber13, OFP_CONTROLLER_PORT};
use sim::{AppId, Context, DeviceId, Scheduler, StreamId};
use Repr;

pub use switch::MAX_BUFFERS;

/// Delete-from-every-table wildcard in a 1.3 flow mod.
pub const OFPTT_ALL: u8 = 0xff;

/// A 1.3 data plane port, numbered in the 32 bit space.
pub struct Port {
    pub port_no: u32,
    pub device: DeviceId,
    pub config: u32,
    pub state: u32,
    pub features: u32,
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub tx_errors: u64,
}

impl Port {
    pub fn enabled(&self) -> bool {
        self.config
            & (phy_port::OFPPC_PORT_DOWN | phy_port::OFPPC_NO_RECV | phy_port::OFPPC_NO_FWD)
            == 0
    }

    pub fn no_flood(&self) -> bool {
        self.config & phy_port::OFPPC_NO_FLOOD != 0
    }

    pub fn to_port_desc(&self, switch_id: usize, net: &NetState) -> Port13Repr {
        let curr_speed = (net.devices[self.device.0].data_rate / 1000) as u32;
        Port13Repr {
            port_no: self.port_no,
            hw_addr: net.devices[self.device.0].address,
            name: format!("sw{}-p{}", switch_id, self.port_no),
            config: self.config,
            state: self.state,
            curr: self.features,
            advertised: self.features,
            supported: self.features,
            peer: self.features,
            curr_speed,
            max_speed: curr_speed,
        }
    }

    pub fn to_port_stats(&self, net: &NetState) -> multipart::PortStats13 {
        let device = &net.devices[self.device.0];
        multipart::PortStats13 {
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
    let mut word = 0u64;
    for &byte in addr.as_bytes() {
        word = word << 8 | byte as u64;
    }
    word
}

pub struct Switch13 {
    pub id: usize,
    pub datapath_id: u64,
    pub serial: String,
    pub miss_send_len: u16,
    pub controller: Connection,
    pub ports: Vec<Port>,
    pub tables: Vec<FlowTable13>,
    pub groups: GroupTable13,
    pub buffers: HashMap<u32, Vec<u8>>,
    /// Frames steered to the unimplemented NORMAL/LOCAL reserved ports.
    pub dropped_reserved: u64,
    total_ports: u32,
}

impl Switch13 {
    pub fn new(id: usize, ctx: &mut Context) -> Switch13 {
        Switch13 {
            id,
            datapath_id: ctx.next_datapath_id(),
            serial: ctx.next_serial(),
            miss_send_len: u16::max_value(),
            controller: Connection::unconnected(ctx.next_conn_id()),
            ports: Vec::new(),
            tables: FlowTable13::tables_for_switch(AppId::Switch13(id)),
            groups: GroupTable13::new(),
            buffers: HashMap::new(),
            dropped_reserved: 0,
            total_ports: 0,
        }
    }

    pub fn start(&mut self, sched: &mut Scheduler, ctx: &mut Context, net: &mut NetState) {
        info!("switch13 {} starting at t={}", self.id, sched.now());
        for device in net.devices_of(AppId::Switch13(self.id)) {
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
                    "switch13 {}: point-to-point device {} has no controller peer",
                    self.id, device.0
                );
                return;
            }
        };
        info!(
            "switch13 {} dialing controller on port {}",
            self.id, OFP_CONTROLLER_PORT
        );
        let channel = match net.devices[device.0].channel {
            Some(channel) => channel,
            None => return,
        };
        let stream = net.open_stream(sched, channel, AppId::Switch13(self.id), controller);
        self.controller = Connection::new(ctx.next_conn_id(), stream, ::sim::Side::A);
    }

    fn establish_port_connection(&mut self, net: &mut NetState, device: DeviceId) {
        net.devices[device.0].sdn_enabled = true;
        let port_no = self.next_port_number();
        let features = link::port_features(net.devices[device.0].data_rate);
        info!(
            "switch13 {}: device {} registered as port {}",
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

    fn next_port_number(&mut self) -> u32 {
        self.total_ports += 1;
        if self.total_ports == OFP_CONTROLLER_PORT as u32 {
            self.total_ports += 1;
        }
        self.total_ports
    }

    fn port_index(&self, port_no: u32) -> Option<usize> {
        self.ports.iter().position(|port| port.port_no == port_no)
    }

    fn port_index_by_device(&self, device: DeviceId) -> Option<usize> {
        self.ports.iter().position(|port| port.device == device)
    }

    /// The controller stream connected: drive the handshake with a Hello
    /// advertising 1.3 in the version bitmap.
    pub fn handle_connected(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        _stream: StreamId,
    ) {
        debug!("switch13 {}: controller connection succeeded", self.id);
        let bitmap = 1u32 << u8::from(Version::OpenFlow1Dot3);
        let hello = PacketRepr::new(
            Version::OpenFlow1Dot3,
            ctx.next_xid(),
            PayloadRepr::Hello(::packets::hello::PacketRepr::new(vec![
                ::packets::hello::Element::VersionBitmap(bitmap),
            ])),
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
        let message = PacketRepr::new(Version::OpenFlow1Dot3, xid, payload);
        if let Err(err) = self.controller.send(sched, net, &message) {
            warn!("switch13 {}: failed to serialize message: {}", self.id, err);
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
                warn!(
                    "switch13 {}: dropping unparseable message: {}",
                    self.id, err
                );
                return;
            }
        };
        self.controller.recv += 1;

        if self.controller.state == ConnState::Handshake {
            match message.payload {
                PayloadRepr::Hello(_) => {
                    if message.version == Version::OpenFlow1Dot3 {
                        self.controller.version = Version::OpenFlow1Dot3.into();
                        self.controller.state = ConnState::Running;
                        debug!("switch13 {}: handshake complete", self.id);
                    } else {
                        self.controller.state = ConnState::Failed;
                        let payload = PayloadRepr::Error(
                            error::PacketRepr::hello_failed_incompatible(Version::OpenFlow1Dot3),
                        );
                        let xid = ctx.next_xid();
                        self.send_to_controller(sched, net, xid, payload);
                    }
                }
                PayloadRepr::Error(_) => self.controller.state = ConnState::Failed,
                _ => {
                    self.controller.state = ConnState::Failed;
                    let payload = PayloadRepr::Error(error::PacketRepr::hello_failed_incompatible(
                        Version::OpenFlow1Dot3,
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
            PayloadRepr::FlowMod13(flow_mod) => {
                self.handle_flow_mod(sched, ctx, net, &flow_mod)
            }
            PayloadRepr::GroupMod(group_mod) => {
                self.handle_group_mod(sched, ctx, net, &group_mod)
            }
            PayloadRepr::PortMod13(port_mod) => {
                if let Some(index) = self.port_index(port_mod.port_no) {
                    let port = &mut self.ports[index];
                    port.config =
                        (port_mod.config & port_mod.mask) | (port.config & !port_mod.mask);
                }
            }
            PayloadRepr::PacketOut13(packet_out) => {
                self.handle_packet_out(sched, ctx, net, packet_out)
            }
            PayloadRepr::MultipartRequest(request) => {
                self.handle_multipart_request(sched, ctx, net, &request)
            }
            PayloadRepr::BarrierRequest => {
                self.send_to_controller(sched, net, message.xid, PayloadRepr::BarrierReply);
            }
            other => {
                trace!("switch13 {}: ignoring message {:?}", self.id, other);
            }
        }
    }

    fn handle_features_request(&mut self, sched: &mut Scheduler, net: &NetState, xid: u32) {
        let controller_mac = net
            .devices_of(AppId::Switch13(self.id))
            .into_iter()
            .find(|&device| net.devices[device.0].kind == link::DeviceKind::PointToPoint)
            .map(|device| net.devices[device.0].address)
            .unwrap_or(EthernetAddress([0; 6]));
        let payload = PayloadRepr::FeaturesReply13(features_reply::PacketRepr13 {
            datapath_id: mac_to_u64(controller_mac),
            n_buffers: MAX_BUFFERS,
            n_tables: TABLE_COUNT as u8,
            auxiliary_id: 0,
            capabilities: features_reply::CAP_FLOW_STATS
                | features_reply::CAP_TABLE_STATS
                | features_reply::CAP_PORT_STATS,
            reserved: 0,
        });
        self.send_to_controller(sched, net, xid, payload);
    }

    fn handle_flow_mod(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &mut NetState,
        message: &flow_mod::PacketRepr13,
    ) {
        match message.command {
            Command::Add => {
                let table = match self.table_mut(message.table_id) {
                    Some(table) => table,
                    None => {
                        warn!(
                            "switch13 {}: flow mod names invalid table {}",
                            self.id, message.table_id
                        );
                        return;
                    }
                };
                if table.add_flow(sched, message).is_err() {
                    let payload = PayloadRepr::Error(error::PacketRepr::flow_mod_failed_overlap(
                        Version::OpenFlow1Dot3,
                    ));
                    let xid = ctx.next_xid();
                    self.send_to_controller(sched, net, xid, payload);
                    return;
                }
            }
            Command::Modify | Command::ModifyStrict => {
                if let Some(table) = self.table_mut(message.table_id) {
                    table.modify_flow(sched, message);
                }
            }
            Command::Delete | Command::DeleteStrict => {
                if message.table_id == OFPTT_ALL {
                    for table in self.tables.iter_mut() {
                        table.delete_flow(sched, message);
                    }
                } else if let Some(table) = self.table_mut(message.table_id) {
                    table.delete_flow(sched, message);
                }
            }
            Command::Unknown(command) => {
                warn!("switch13 {}: unknown flow mod command {}", self.id, command);
                return;
            }
        }

        let deleting = message.command == Command::Delete
            || message.command == Command::DeleteStrict;
        if !deleting && message.buffer_id != NO_BUFFER {
            match self.buffers.get(&message.buffer_id).cloned() {
                Some(frame) => {
                    let in_port = message.flow_match.in_port().unwrap_or(0);
                    self.handle_packet(sched, ctx, net, frame, in_port);
                }
                None => {
                    warn!(
                        "switch13 {}: flow mod references unknown buffer id {}",
                        self.id, message.buffer_id
                    );
                }
            }
        }
    }

    fn table_mut(&mut self, table_id: u8) -> Option<&mut FlowTable13> {
        self.tables.get_mut(table_id as usize)
    }

    fn handle_group_mod(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        message: &group_mod::PacketRepr,
    ) {
        match message.command {
            group_mod::Command::Add => {
                if self.groups.add_group(sched.now(), message).is_err() {
                    let payload =
                        PayloadRepr::Error(error::PacketRepr::group_mod_failed_exists());
                    let xid = ctx.next_xid();
                    self.send_to_controller(sched, net, xid, payload);
                }
            }
            group_mod::Command::Modify => self.groups.modify_group(message),
            group_mod::Command::Delete => self.groups.delete_group(message),
            group_mod::Command::Unknown(command) => {
                warn!(
                    "switch13 {}: unknown group mod command {}",
                    self.id, command
                );
            }
        }
    }

    fn handle_packet_out(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &mut NetState,
        message: packet_out::PacketRepr13,
    ) {
        let frame = if message.buffer_id == NO_BUFFER {
            message.data.clone()
        } else {
            match self.buffers.get(&message.buffer_id).cloned() {
                Some(frame) => frame,
                None => {
                    warn!(
                        "switch13 {}: packet out references unknown buffer id {}",
                        self.id, message.buffer_id
                    );
                    return;
                }
            }
        };
        let mut action_set = ActionSet::default();
        action_set.write(&message.actions);
        self.execute_action_set(sched, ctx, net, action_set, &frame, message.in_port, true);
    }

    fn handle_multipart_request(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        request: &multipart::RequestRepr,
    ) {
        let now = sched.now();
        let reply = match *request {
            multipart::RequestRepr::Desc => multipart::ReplyRepr::Desc(self.description()),
            multipart::RequestRepr::Flow(ref request) => {
                let entries = self
                    .select_flows(request)
                    .into_iter()
                    .map(|flow| flow.to_flow_stats(now))
                    .collect();
                multipart::ReplyRepr::Flow(entries)
            }
            multipart::RequestRepr::Aggregate(ref request) => {
                let hits = self.select_flows(request);
                multipart::ReplyRepr::Aggregate {
                    packet_count: hits.iter().map(|flow| flow.packet_count).sum(),
                    byte_count: hits.iter().map(|flow| flow.byte_count).sum(),
                    flow_count: hits.len() as u32,
                }
            }
            multipart::RequestRepr::Table => multipart::ReplyRepr::Table(
                self.tables.iter().map(|table| table.table_stats()).collect(),
            ),
            multipart::RequestRepr::PortStats { port_no } => {
                let entries = if PortNumber13::from(port_no) == PortNumber13::Any {
                    self.ports.iter().map(|port| port.to_port_stats(net)).collect()
                } else {
                    self.port_index(port_no)
                        .map(|index| vec![self.ports[index].to_port_stats(net)])
                        .unwrap_or_default()
                };
                multipart::ReplyRepr::PortStats(entries)
            }
            multipart::RequestRepr::PortDesc => multipart::ReplyRepr::PortDesc(
                self.ports
                    .iter()
                    .map(|port| port.to_port_desc(self.id, net))
                    .collect(),
            ),
        };
        let xid = ctx.next_xid();
        self.send_to_controller(sched, net, xid, PayloadRepr::MultipartReply(reply));
    }

    fn select_flows(&self, request: &multipart::FlowStatsRequest13) -> Vec<&::flow13::Flow13> {
        let tables: Vec<&FlowTable13> = if request.table_id == OFPTT_ALL {
            self.tables.iter().collect()
        } else {
            self.tables.get(request.table_id as usize).into_iter().collect()
        };
        tables
            .into_iter()
            .flat_map(|table| table.matching_flows(&request.flow_match))
            .collect()
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

    /// Inbound dispatch for the data plane.
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
                "switch13 {}: not in running state yet, dropping frame",
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

    /// Run one frame through the pipeline from table 0 and execute the
    /// resulting action set once.
    pub fn handle_packet(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &mut NetState,
        frame: Vec<u8>,
        in_port: u32,
    ) {
        let PipelineVerdict { matched, action_set } =
            run_pipeline(&mut self.tables, sched, &frame, in_port, 0);

        if !matched {
            self.send_packet_in(
                sched,
                ctx,
                net,
                &frame,
                in_port,
                PacketInReason::TableMiss,
            );
            return;
        }
        self.execute_action_set(sched, ctx, net, action_set, &frame, in_port, false);
    }

    /// Drain an action set: a group action dereferences the group table
    /// and runs that group's buckets, then the output (always last) steers
    /// the frame.
    fn execute_action_set(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &mut NetState,
        action_set: ActionSet,
        frame: &[u8],
        in_port: u32,
        from_packet_out: bool,
    ) {
        let mut outputs: Vec<(u32, u16)> = Vec::new();
        if let Some(group_id) = action_set.group {
            match self.groups.get_mut(group_id) {
                Some(group) => {
                    group.packet_count += 1;
                    group.byte_count += frame.len() as u64;
                    for bucket in &group.buckets {
                        for action in &bucket.actions {
                            match *action {
                                Action13::Output { port, max_len } => {
                                    outputs.push((port, max_len))
                                }
                                Action13::Group(nested) => {
                                    warn!(
                                        "switch13 {}: nested group {} not executed",
                                        self.id, nested
                                    );
                                }
                            }
                        }
                    }
                }
                None => {
                    warn!(
                        "switch13 {}: group action references unknown group {}",
                        self.id, group_id
                    );
                }
            }
        }
        if let Some(output) = action_set.output {
            outputs.push(output);
        }

        for (port, max_len) in outputs {
            match PortNumber13::from(port) {
                PortNumber13::Controller => {
                    self.send_packet_in(
                        sched,
                        ctx,
                        net,
                        frame,
                        in_port,
                        PacketInReason::ApplyAction,
                    );
                    return;
                }
                PortNumber13::Flood => {
                    self.flood(sched, net, frame, in_port, false);
                    return;
                }
                PortNumber13::All => {
                    self.flood(sched, net, frame, in_port, true);
                    return;
                }
                PortNumber13::InPort => {
                    if let Some(index) = self.port_index(in_port) {
                        self.send_on_port(sched, net, index, frame, max_len);
                    }
                }
                PortNumber13::Table => {
                    // only meaningful for packet out messages
                    if from_packet_out {
                        self.handle_packet(sched, ctx, net, frame.to_vec(), in_port);
                        return;
                    }
                }
                PortNumber13::Normal | PortNumber13::Local => {
                    trace!(
                        "switch13 {}: dropping frame for unimplemented reserved port",
                        self.id
                    );
                    self.dropped_reserved += 1;
                }
                PortNumber13::Max | PortNumber13::Any => {}
                PortNumber13::Regular(port_no) => {
                    if let Some(index) = self.port_index(port_no) {
                        if self.ports[index].enabled() {
                            self.send_on_port(sched, net, index, frame, max_len);
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

    fn flood(
        &mut self,
        sched: &mut Scheduler,
        net: &mut NetState,
        frame: &[u8],
        in_port: u32,
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

    fn send_packet_in(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        frame: &[u8],
        in_port: u32,
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
            "switch13 {}: packet in, reason {:?}, buffer id {:#x}",
            self.id, reason, buffer_id
        );
        let payload = PayloadRepr::PacketIn13(::packets::packet_in::PacketRepr13 {
            buffer_id,
            total_len: frame.len() as u16,
            reason,
            table_id: 0,
            cookie: u64::max_value(),
            flow_match: FlowMatch::new(vec![OxmField::InPort(in_port)]),
            data,
        });
        let xid = ctx.next_xid();
        self.send_to_controller(sched, net, xid, payload);
    }

    /// A flow timer fired: evict the flow from its table if it still lives
    /// and notify the controller.
    pub fn flow_expired(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        table_id: u8,
        flow_id: u64,
        reason: RemovedReason,
    ) {
        let now = sched.now();
        let expired = match self.tables.get_mut(table_id as usize) {
            Some(table) => table.expire(sched, flow_id),
            None => None,
        };
        if let Some(flow) = expired {
            debug!(
                "switch13 {}: flow id={} expired ({:?}) at t={}",
                self.id, flow_id, reason, now
            );
            let payload = PayloadRepr::FlowRemoved13(flow.to_flow_removed(now, reason));
            let xid = ctx.next_xid();
            self.send_to_controller(sched, net, xid, payload);
        }
    }

    /// Tear the switch down, canceling every pending flow timer.
    pub fn stop(&mut self, sched: &mut Scheduler) {
        for table in self.tables.iter_mut() {
            table.clear(sched);
        }
        self.controller.close();
    }
}
