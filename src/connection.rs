//! A control-channel connection: one end of the reliable byte stream
//! between a switch and its controller, with the stagger-send rule that
//! keeps same-instant emissions temporally distinct.

use link::NetState;
use packets::openflow::PacketRepr;
use sim::{Event, Nanos, Scheduler, Side, StreamId, TICK};
use Result;

/// Life cycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Version negotiation in progress.
    Handshake,
    /// Handshake complete, full message dispatch.
    Running,
    /// Version negotiation failed; the connection is dead.
    Failed,
    /// Closed.
    Down,
}

/// One endpoint of a control stream.
pub struct Connection {
    pub id: u32,
    pub stream: Option<StreamId>,
    pub side: Side,
    pub state: ConnState,
    /// Negotiated wire version, 0 until the handshake settles.
    pub version: u8,
    pub sent: u64,
    pub recv: u64,
    last_send_time: Nanos,
    consecutive_pause: u32,
}

impl Connection {
    pub fn new(id: u32, stream: StreamId, side: Side) -> Connection {
        Connection {
            id,
            stream: Some(stream),
            side,
            state: ConnState::Handshake,
            version: 0,
            sent: 0,
            recv: 0,
            last_send_time: 0,
            consecutive_pause: 0,
        }
    }

    /// A connection not yet attached to a stream.
    pub fn unconnected(id: u32) -> Connection {
        Connection {
            id,
            stream: None,
            side: Side::A,
            state: ConnState::Handshake,
            version: 0,
            sent: 0,
            recv: 0,
            last_send_time: 0,
            consecutive_pause: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == ConnState::Running
    }

    pub fn close(&mut self) {
        self.state = ConnState::Down;
    }

    /// Serialize and send an OpenFlow message to the peer.
    pub fn send(&mut self, sched: &mut Scheduler, net: &NetState, repr: &PacketRepr) -> Result<()> {
        let bytes = repr.to_bytes()?;
        self.send_bytes(sched, net, bytes);
        Ok(())
    }

    /// Send raw bytes to the peer. When this endpoint already emitted at
    /// the current instant, the k-th consecutive same-instant call is
    /// re-issued k ticks later so the stream sees distinct arrival times.
    pub fn send_bytes(&mut self, sched: &mut Scheduler, net: &NetState, bytes: Vec<u8>) {
        let stream = match self.stream {
            Some(stream) => stream,
            None => {
                warn!("connection id={} has no stream, dropping send", self.id);
                return;
            }
        };
        let now = sched.now();
        if now == self.last_send_time {
            self.consecutive_pause += 1;
            let delay = self.consecutive_pause as Nanos * TICK;
            sched.schedule_after(
                delay,
                Event::StreamStagger {
                    stream,
                    from: self.side,
                    bytes,
                },
            );
            return;
        }
        self.last_send_time = now;
        self.consecutive_pause = 0;
        self.sent += 1;
        debug!(
            "connection id={} sending {} bytes",
            self.id,
            bytes.len()
        );
        let delay = net.stream_delay(stream);
        sched.schedule_after(
            delay,
            Event::StreamDeliver {
                stream,
                to: self.side.peer(),
                bytes,
            },
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use link::{LinkConfig, NetState};
    use sim::{AppId, Scheduler};

    fn setup() -> (Scheduler, NetState, Connection) {
        let mut sched = Scheduler::new();
        let mut net = NetState::new();
        use smoltcp::wire::EthernetAddress;
        let channel = net.connect(
            AppId::Switch(0),
            EthernetAddress([2, 0, 0, 0, 0, 1]),
            AppId::Controller(0),
            EthernetAddress([2, 0, 0, 0, 0, 2]),
            LinkConfig::default(),
        );
        let stream = net.open_stream(&mut sched, channel, AppId::Switch(0), AppId::Controller(0));
        (sched, net, Connection::new(0, stream, Side::A))
    }

    #[test]
    fn same_instant_sends_are_staggered() {
        let (mut sched, net, mut conn) = setup();
        // first send at t=0 collides with last_send_time's initial value,
        // so move time forward first
        sched.schedule_at(5, ::sim::Event::Start(AppId::Host(0)));
        sched.pop();
        assert_eq!(sched.now(), 5);

        conn.send_bytes(&mut sched, &net, vec![1]);
        assert_eq!(conn.sent, 1);
        conn.send_bytes(&mut sched, &net, vec![2]);
        conn.send_bytes(&mut sched, &net, vec![3]);
        // the second and third were deferred, not sent
        assert_eq!(conn.sent, 1);

        // deferred sends come back as stagger events at t+1 and t+2
        let mut stagger_times = Vec::new();
        while let Some(event) = sched.pop() {
            match event {
                Event::StreamStagger { bytes, .. } => {
                    stagger_times.push((sched.now(), bytes));
                }
                _ => {}
            }
        }
        assert_eq!(stagger_times, vec![(6, vec![2]), (7, vec![3])]);
    }

    #[test]
    fn distinct_instants_send_directly() {
        let (mut sched, net, mut conn) = setup();
        sched.schedule_at(5, ::sim::Event::Start(AppId::Host(0)));
        sched.pop();
        conn.send_bytes(&mut sched, &net, vec![1]);
        sched.schedule_at(10, ::sim::Event::Start(AppId::Host(0)));
        while sched.now() < 10 {
            if sched.pop().is_none() {
                break;
            }
        }
        conn.send_bytes(&mut sched, &net, vec![2]);
        assert_eq!(conn.sent, 2);
    }
}
