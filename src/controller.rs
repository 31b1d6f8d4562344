//! The controller application: accepts switch connections, drives the
//! handshake, and hands every inbound event to a pluggable listener. The
//! default listener keeps a per-switch L2 learning table; concrete
//! forwarding policies build on top of it.

use std::collections::HashMap;

use smoltcp::wire::EthernetAddress;

use connection::{ConnState, Connection};
use link::NetState;
use packets::error;
use packets::openflow::{PacketRepr, PayloadRepr, Version};
use sim::{Context, Nanos, Scheduler, Side, StreamId};
use {Repr, Result};

/// An event handed to the listener, carrying the originating connection
/// and the full message that produced it.
#[derive(Debug, Clone)]
pub struct ControllerEvent {
    pub conn: StreamId,
    pub kind: EventKind,
}

#[derive(Debug, Clone)]
pub enum EventKind {
    /// The handshake with a switch completed; carries the features reply.
    SwitchUp(PacketRepr),
    /// The connection to a switch closed.
    SwitchDown,
    PacketIn(PacketRepr),
    FlowRemoved(PacketRepr),
    PortStatus(PacketRepr),
    /// A statistics (1.0) or multipart (1.3) reply.
    StatsReply(PacketRepr),
}

/// What a listener may do while handling an event: inspect time and send
/// messages down any switch connection.
pub struct ControllerIo<'a> {
    pub sched: &'a mut Scheduler,
    pub ctx: &'a mut Context,
    net: &'a NetState,
    conns: &'a mut HashMap<usize, Connection>,
    version: Version,
}

impl<'a> ControllerIo<'a> {
    pub fn now(&self) -> Nanos {
        self.sched.now()
    }

    /// Send a payload on a connection, stamping a fresh xid.
    pub fn send(&mut self, conn: StreamId, payload: PayloadRepr) -> Result<()> {
        let message = PacketRepr::new(self.version, self.ctx.next_xid(), payload);
        self.send_message(conn, &message)
    }

    pub fn send_message(&mut self, conn: StreamId, message: &PacketRepr) -> Result<()> {
        match self.conns.get_mut(&conn.0) {
            Some(connection) => connection.send(self.sched, self.net, message),
            None => {
                warn!("no connection for stream {}", conn.0);
                Ok(())
            }
        }
    }
}

/// The capability a controller behavior implements: one callback per
/// event, with the io handle for replies.
pub trait Listener {
    fn on_event(&mut self, io: &mut ControllerIo, event: ControllerEvent);
}

pub struct Controller {
    pub id: usize,
    pub version: Version,
    conns: HashMap<usize, Connection>,
    pub listener: Box<Listener>,
}

impl Controller {
    pub fn new(id: usize, version: Version, listener: Box<Listener>) -> Controller {
        Controller {
            id,
            version,
            conns: HashMap::new(),
            listener,
        }
    }

    pub fn connection(&self, stream: StreamId) -> Option<&Connection> {
        self.conns.get(&stream.0)
    }

    pub fn connection_mut(&mut self, stream: StreamId) -> Option<&mut Connection> {
        self.conns.get_mut(&stream.0)
    }

    /// A switch dialed in: allocate the connection and wait for its Hello.
    pub fn handle_accept(
        &mut self,
        _sched: &mut Scheduler,
        ctx: &mut Context,
        _net: &NetState,
        stream: StreamId,
    ) {
        info!("controller {}: connection accepted", self.id);
        self.conns
            .insert(stream.0, Connection::new(ctx.next_conn_id(), stream, Side::B));
    }

    /// The switch side of a stream went away.
    pub fn handle_close(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        stream: StreamId,
    ) {
        let was_running = match self.conns.get_mut(&stream.0) {
            Some(conn) => {
                let was_running = conn.is_running();
                conn.close();
                was_running
            }
            None => return,
        };
        if was_running {
            self.emit_event(
                sched,
                ctx,
                net,
                ControllerEvent {
                    conn: stream,
                    kind: EventKind::SwitchDown,
                },
            );
        }
    }

    /// Inbound dispatch for one switch stream.
    pub fn handle_read(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        stream: StreamId,
        bytes: &[u8],
    ) {
        let message = match PacketRepr::parse(bytes) {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    "controller {}: dropping unparseable message: {}",
                    self.id, err
                );
                return;
            }
        };
        debug!(
            "controller {}: received {} bytes on stream {}",
            self.id,
            bytes.len(),
            stream.0
        );

        let state = match self.conns.get_mut(&stream.0) {
            Some(conn) => {
                conn.recv += 1;
                conn.state
            }
            None => {
                warn!("controller {}: bytes on unknown stream", self.id);
                return;
            }
        };

        match state {
            ConnState::Handshake => self.handshake_dispatch(sched, ctx, net, stream, message),
            ConnState::Running => self.running_dispatch(sched, ctx, net, stream, message),
            _ => {
                if let Some(conn) = self.conns.get_mut(&stream.0) {
                    conn.state = ConnState::Down;
                }
            }
        }
    }

    fn handshake_dispatch(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        stream: StreamId,
        message: PacketRepr,
    ) {
        match message.payload {
            PayloadRepr::Hello(_) => {
                if message.version == self.version {
                    info!("controller {}: sending Hello reply", self.id);
                    self.send_on(sched, ctx, net, stream, PayloadRepr::Hello(Default::default()));
                    self.send_on(sched, ctx, net, stream, PayloadRepr::FeaturesRequest);
                } else {
                    self.hello_failed(sched, ctx, net, stream);
                }
            }
            PayloadRepr::FeaturesReply(_) | PayloadRepr::FeaturesReply13(_) => {
                {
                    let conn = match self.conns.get_mut(&stream.0) {
                        Some(conn) => conn,
                        None => return,
                    };
                    conn.version = message.version.into();
                    conn.state = ConnState::Running;
                    debug!(
                        "controller {}: connection id={} established",
                        self.id, conn.id
                    );
                }
                self.emit_event(
                    sched,
                    ctx,
                    net,
                    ControllerEvent {
                        conn: stream,
                        kind: EventKind::SwitchUp(message),
                    },
                );
            }
            _ => self.hello_failed(sched, ctx, net, stream),
        }
    }

    fn running_dispatch(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        stream: StreamId,
        message: PacketRepr,
    ) {
        let kind = match message.payload {
            PayloadRepr::EchoRequest(ref data) => {
                let reply = PacketRepr::new(
                    message.version,
                    message.xid,
                    PayloadRepr::EchoReply(data.clone()),
                );
                if let Some(conn) = self.conns.get_mut(&stream.0) {
                    let _ = conn.send(sched, net, &reply);
                }
                return;
            }
            PayloadRepr::PacketIn(_) | PayloadRepr::PacketIn13(_) => EventKind::PacketIn(message),
            PayloadRepr::FlowRemoved(_) | PayloadRepr::FlowRemoved13(_) => {
                EventKind::FlowRemoved(message)
            }
            PayloadRepr::PortStatus(_) => EventKind::PortStatus(message),
            PayloadRepr::StatsReply(_) | PayloadRepr::MultipartReply(_) => {
                EventKind::StatsReply(message)
            }
            // anything else is silently ignored in the running state
            _ => return,
        };
        self.emit_event(
            sched,
            ctx,
            net,
            ControllerEvent { conn: stream, kind },
        );
    }

    fn hello_failed(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        stream: StreamId,
    ) {
        warn!("controller {}: handshake failed on stream {}", self.id, stream.0);
        if let Some(conn) = self.conns.get_mut(&stream.0) {
            conn.state = ConnState::Failed;
        }
        let payload =
            PayloadRepr::Error(error::PacketRepr::hello_failed_incompatible(self.version));
        self.send_on(sched, ctx, net, stream, payload);
    }

    fn send_on(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        stream: StreamId,
        payload: PayloadRepr,
    ) {
        let message = PacketRepr::new(self.version, ctx.next_xid(), payload);
        if let Some(conn) = self.conns.get_mut(&stream.0) {
            if let Err(err) = conn.send(sched, net, &message) {
                warn!(
                    "controller {}: failed to serialize message: {}",
                    self.id, err
                );
            }
        }
    }

    fn emit_event(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut Context,
        net: &NetState,
        event: ControllerEvent,
    ) {
        let Controller {
            ref mut conns,
            ref mut listener,
            version,
            ..
        } = *self;
        let mut io = ControllerIo {
            sched,
            ctx,
            net,
            conns,
            version,
        };
        listener.on_event(&mut io, event);
    }
}

/// MAC addresses as L2 table keys.
pub fn mac_key(addr: EthernetAddress) -> u64 {
    let mut word = 0u64;
    for &byte in addr.as_bytes() {
        word = word << 8 | byte as u64;
    }
    word
}

/// A per-switch MAC to port learning table.
pub type L2Table = HashMap<u64, u16>;

/// The default listener base: attach a fresh L2 table to each switch that
/// comes up, drop it when the switch goes down. Forwarding policies
/// (learn, forward, flood on miss, install flows) layer on top.
pub struct BaseLearningSwitch {
    tables: HashMap<usize, L2Table>,
}

impl BaseLearningSwitch {
    pub fn new() -> BaseLearningSwitch {
        BaseLearningSwitch {
            tables: HashMap::new(),
        }
    }

    /// The learning table attached to a connection, if the switch is up.
    pub fn l2_table(&mut self, conn: StreamId) -> Option<&mut L2Table> {
        let table = self.tables.get_mut(&conn.0);
        if table.is_none() {
            debug!(
                "l2 table for stream {} not initialized; listen for SwitchUp",
                conn.0
            );
        }
        table
    }
}

impl Listener for BaseLearningSwitch {
    fn on_event(&mut self, _io: &mut ControllerIo, event: ControllerEvent) {
        match event.kind {
            EventKind::SwitchUp(_) => {
                info!("adding L2 entries for stream {}", event.conn.0);
                self.tables.insert(event.conn.0, L2Table::new());
            }
            EventKind::SwitchDown => {
                info!("deleting L2 entries for stream {}", event.conn.0);
                if let Some(table) = self.tables.get_mut(&event.conn.0) {
                    table.clear();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn learning_base_tracks_switch_lifecycle() {
        let mut listener = BaseLearningSwitch::new();
        let conn = StreamId(0);
        assert!(listener.l2_table(conn).is_none());

        listener.tables.insert(conn.0, L2Table::new());
        listener
            .l2_table(conn)
            .unwrap()
            .insert(mac_key(EthernetAddress([2, 0, 0, 0, 0, 1])), 1);
        assert_eq!(listener.l2_table(conn).unwrap().len(), 1);
    }

    #[test]
    fn mac_key_is_48_bits() {
        let key = mac_key(EthernetAddress([0x02, 0, 0, 0, 0, 0x07]));
        assert_eq!(key, 0x0200_0000_0007);
    }
}
