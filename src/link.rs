//! The layer-2 point-to-point plumbing: channels, net devices, Ethernet
//! framing quirks, the remote-channel seam, and the minimal host endpoint
//! used as the non-SDN upper layer.
//!
//! A channel joins exactly two devices. Per transmission the sender is
//! busy for `tx_time = bits / rate` plus the interframe gap, and the
//! opposite device sees the frame at `now + tx_time + delay`. One
//! propagation delay and one queue per direction make each direction a
//! FIFO.

use byteorder::{ByteOrder, NetworkEndian};
use smoltcp::wire::EthernetAddress;
use std::collections::VecDeque;

use sim::{AppId, ChannelId, DeviceId, Event, HostId, Nanos, Scheduler, Side, StreamId};
use packets::phy_port;

/// STP bridge group address; such frames never cross a non-SDN port.
pub const BPDU_STP_ADDRESS_1: EthernetAddress =
    EthernetAddress([0x01, 0x80, 0xc2, 0x00, 0x00, 0x00]);
/// Provider bridge group address, also dropped at non-SDN ports.
pub const BPDU_STP_ADDRESS_2: EthernetAddress =
    EthernetAddress([0x01, 0x00, 0xc2, 0xcc, 0xcc, 0xcd]);
/// LLDP discovery address, delivered to the SDN callback only.
pub const LLDP_DISCOVERY_ADDRESS: EthernetAddress =
    EthernetAddress([0x01, 0x80, 0xc2, 0x00, 0x00, 0x0e]);

pub const ETHERNET_HEADER_LEN: usize = 14;
/// Minimum Ethernet payload; shorter payloads are zero padded on transmit.
pub const MIN_PAYLOAD_LEN: usize = 46;
/// Largest length/type value carrying a length interpretation.
pub const MAX_LENGTH_INTERPRETATION: u16 = 1500;

/// 802.2 LLC + SNAP header carried by length-interpretation frames.
pub mod llc {
    use super::*;
    use {Error, Result};

    pub const HEADER_LEN: usize = 8;

    /// Parse an LLC/SNAP header, returning the encapsulated EtherType.
    pub fn parse(buffer: &[u8]) -> Result<u16> {
        if buffer.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }
        // DSAP/SSAP 0xaa, control 0x03, zero OUI
        if buffer[0] != 0xaa || buffer[1] != 0xaa || buffer[2] != 0x03 {
            return Err(Error::Unrecognized);
        }
        Ok(NetworkEndian::read_u16(&buffer[6..8]))
    }

    pub fn emit(protocol: u16, buffer: &mut [u8]) {
        buffer[0] = 0xaa;
        buffer[1] = 0xaa;
        buffer[2] = 0x03;
        buffer[3] = 0;
        buffer[4] = 0;
        buffer[5] = 0;
        NetworkEndian::write_u16(&mut buffer[6..8], protocol);
    }
}

/// How the device fills the length/type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncapsulationMode {
    /// Type interpretation (DIX): the field carries the EtherType.
    Dix,
    /// Length interpretation: the field carries the payload length and the
    /// payload starts with an 802.2 LLC/SNAP header.
    Llc,
}

/// Build an Ethernet frame, padding the payload to the 46 byte minimum.
pub fn build_frame(
    src: EthernetAddress,
    dst: EthernetAddress,
    protocol: u16,
    payload: &[u8],
) -> Vec<u8> {
    build_frame_with_mode(src, dst, protocol, payload, EncapsulationMode::Dix)
}

pub fn build_frame_with_mode(
    src: EthernetAddress,
    dst: EthernetAddress,
    protocol: u16,
    payload: &[u8],
    mode: EncapsulationMode,
) -> Vec<u8> {
    let body_len = match mode {
        EncapsulationMode::Dix => payload.len(),
        EncapsulationMode::Llc => payload.len() + llc::HEADER_LEN,
    };
    let padded = body_len.max(MIN_PAYLOAD_LEN);
    let mut frame = vec![0u8; ETHERNET_HEADER_LEN + padded];
    frame[0..6].copy_from_slice(dst.as_bytes());
    frame[6..12].copy_from_slice(src.as_bytes());
    match mode {
        EncapsulationMode::Dix => {
            NetworkEndian::write_u16(&mut frame[12..14], protocol);
            frame[ETHERNET_HEADER_LEN..ETHERNET_HEADER_LEN + payload.len()]
                .copy_from_slice(payload);
        }
        EncapsulationMode::Llc => {
            NetworkEndian::write_u16(&mut frame[12..14], body_len as u16);
            llc::emit(
                protocol,
                &mut frame[ETHERNET_HEADER_LEN..ETHERNET_HEADER_LEN + llc::HEADER_LEN],
            );
            let start = ETHERNET_HEADER_LEN + llc::HEADER_LEN;
            frame[start..start + payload.len()].copy_from_slice(payload);
        }
    }
    frame
}

/// A parsed view of a received frame, padding stripped and the LLC header
/// (when present) resolved to the effective protocol.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ParsedFrame {
    pub src: EthernetAddress,
    pub dst: EthernetAddress,
    pub protocol: u16,
    pub payload: Vec<u8>,
}

impl ParsedFrame {
    pub fn parse(frame: &[u8]) -> ::Result<ParsedFrame> {
        if frame.len() < ETHERNET_HEADER_LEN {
            return Err(::Error::Truncated);
        }
        let dst = EthernetAddress::from_bytes(&frame[0..6]);
        let src = EthernetAddress::from_bytes(&frame[6..12]);
        let length_type = NetworkEndian::read_u16(&frame[12..14]);
        let body = &frame[ETHERNET_HEADER_LEN..];
        if length_type <= MAX_LENGTH_INTERPRETATION {
            let len = length_type as usize;
            if body.len() < len {
                return Err(::Error::Truncated);
            }
            let protocol = llc::parse(&body[..len])?;
            Ok(ParsedFrame {
                src,
                dst,
                protocol,
                payload: body[llc::HEADER_LEN..len].to_vec(),
            })
        } else {
            Ok(ParsedFrame {
                src,
                dst,
                protocol: length_type,
                payload: body.to_vec(),
            })
        }
    }
}

/// Map a link bit rate to the 1.0 port feature bits it advertises.
pub fn port_features(bit_rate: u64) -> u32 {
    if bit_rate >= 10_000_000_000 {
        phy_port::OFPPF_10GB_FD
    } else if bit_rate >= 1_000_000_000 {
        phy_port::OFPPF_1GB_FD
    } else if bit_rate >= 100_000_000 {
        phy_port::OFPPF_100MB_FD
    } else if bit_rate >= 10_000_000 {
        phy_port::OFPPF_10MB_FD
    } else {
        0
    }
}

/// Parameters of a point-to-point link, symmetric for both directions.
#[derive(Debug, Clone, Copy)]
pub struct LinkConfig {
    /// Data rate in bits per second.
    pub data_rate: u64,
    /// Propagation delay in nanoseconds.
    pub delay: Nanos,
    /// Idle time the transmitter inserts after each frame.
    pub interframe_gap: Nanos,
    /// Transmit queue depth before tail drop.
    pub queue_limit: usize,
}

impl Default for LinkConfig {
    fn default() -> LinkConfig {
        LinkConfig {
            data_rate: 100_000_000,
            delay: 2_000_000,
            interframe_gap: 0,
            queue_limit: 100,
        }
    }
}

/// Distinguishes the control link from data links when a switch classifies
/// its devices at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// A plain point-to-point device: the controller channel.
    PointToPoint,
    /// A layer-2 device: a data plane port candidate.
    Layer2,
}

/// One side of a channel.
pub struct NetDevice {
    pub kind: DeviceKind,
    pub address: EthernetAddress,
    pub owner: AppId,
    pub channel: Option<ChannelId>,
    pub data_rate: u64,
    pub interframe_gap: Nanos,
    pub encapsulation: EncapsulationMode,
    /// When set, every received frame goes to the owner's SDN callback
    /// instead of the normal layer-2 path.
    pub sdn_enabled: bool,
    tx_busy: bool,
    queue: VecDeque<Vec<u8>>,
    queue_limit: usize,
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub tx_dropped: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub rx_dropped: u64,
}

impl NetDevice {
    fn new(kind: DeviceKind, address: EthernetAddress, owner: AppId, config: &LinkConfig) -> Self {
        NetDevice {
            kind,
            address,
            owner,
            channel: None,
            data_rate: config.data_rate,
            interframe_gap: config.interframe_gap,
            encapsulation: EncapsulationMode::Dix,
            sdn_enabled: false,
            tx_busy: false,
            queue: VecDeque::new(),
            queue_limit: config.queue_limit,
            tx_packets: 0,
            tx_bytes: 0,
            tx_dropped: 0,
            rx_packets: 0,
            rx_bytes: 0,
            rx_dropped: 0,
        }
    }

    fn tx_time(&self, frame_len: usize) -> Nanos {
        (frame_len as u64 * 8).saturating_mul(::sim::NANOS_PER_SEC) / self.data_rate
    }
}

/// Delivery seam for a channel: local channels schedule the receive event
/// in this process, remote ones hand the frame to an external transport
/// with the same receive time.
pub enum Transport {
    Local,
    Remote(Box<RemoteTransport>),
}

/// The external transport behind a remote channel. The implementation must
/// arrange for the frame to hit the destination device at `rx_time`.
pub trait RemoteTransport {
    fn deliver(&mut self, dst: DeviceId, frame: Vec<u8>, rx_time: Nanos);
}

/// A point-to-point channel joining two devices.
pub struct Channel {
    pub a: DeviceId,
    pub b: DeviceId,
    pub delay: Nanos,
    pub transport: Transport,
}

impl Channel {
    pub fn peer_of(&self, device: DeviceId) -> DeviceId {
        if device == self.a {
            self.b
        } else {
            self.a
        }
    }
}

/// A reliable control byte-stream riding a channel. Side A is the opener
/// (the switch), side B the acceptor (the controller).
pub struct Stream {
    pub channel: ChannelId,
    pub opener: AppId,
    pub acceptor: AppId,
}

impl Stream {
    pub fn app(&self, side: Side) -> AppId {
        match side {
            Side::A => self.opener,
            Side::B => self.acceptor,
        }
    }
}

/// All devices, channels and streams of a simulation.
pub struct NetState {
    pub devices: Vec<NetDevice>,
    pub channels: Vec<Channel>,
    pub streams: Vec<Stream>,
}

impl NetState {
    pub fn new() -> NetState {
        NetState {
            devices: Vec::new(),
            channels: Vec::new(),
            streams: Vec::new(),
        }
    }

    /// Create the two devices and the channel joining `a` and `b`. A link
    /// ending at a controller is a point-to-point (control) link; any other
    /// link is a layer-2 data link.
    pub fn connect(
        &mut self,
        a: AppId,
        mac_a: EthernetAddress,
        b: AppId,
        mac_b: EthernetAddress,
        config: LinkConfig,
    ) -> ChannelId {
        let control = match (a, b) {
            (AppId::Controller(_), _) | (_, AppId::Controller(_)) => true,
            _ => false,
        };
        let kind = if control {
            DeviceKind::PointToPoint
        } else {
            DeviceKind::Layer2
        };
        let dev_a = DeviceId(self.devices.len());
        self.devices.push(NetDevice::new(kind, mac_a, a, &config));
        let dev_b = DeviceId(self.devices.len());
        self.devices.push(NetDevice::new(kind, mac_b, b, &config));
        let channel = ChannelId(self.channels.len());
        self.channels.push(Channel {
            a: dev_a,
            b: dev_b,
            delay: config.delay,
            transport: Transport::Local,
        });
        self.devices[dev_a.0].channel = Some(channel);
        self.devices[dev_b.0].channel = Some(channel);
        channel
    }

    /// Swap a channel's delivery onto an external transport.
    pub fn make_remote(&mut self, channel: ChannelId, transport: Box<RemoteTransport>) {
        self.channels[channel.0].transport = Transport::Remote(transport);
    }

    /// The devices owned by an application, in creation order.
    pub fn devices_of(&self, app: AppId) -> Vec<DeviceId> {
        self.devices
            .iter()
            .enumerate()
            .filter(|&(_, dev)| dev.owner == app)
            .map(|(i, _)| DeviceId(i))
            .collect()
    }

    /// The application on the far side of a device's channel.
    pub fn remote_app(&self, device: DeviceId) -> Option<AppId> {
        let channel = self.devices[device.0].channel?;
        let peer = self.channels[channel.0].peer_of(device);
        Some(self.devices[peer.0].owner)
    }

    /// Propagation delay of the channel a stream rides on.
    pub fn stream_delay(&self, stream: StreamId) -> Nanos {
        self.channels[self.streams[stream.0].channel.0].delay
    }

    /// Open a control stream from `opener` over its point-to-point device.
    /// Both ends learn about the stream one propagation delay later.
    pub fn open_stream(
        &mut self,
        sched: &mut Scheduler,
        channel: ChannelId,
        opener: AppId,
        acceptor: AppId,
    ) -> StreamId {
        let stream = StreamId(self.streams.len());
        self.streams.push(Stream {
            channel,
            opener,
            acceptor,
        });
        let delay = self.channels[channel.0].delay;
        sched.schedule_after(delay, Event::StreamOpened { stream });
        sched.schedule_after(delay, Event::StreamConnected { stream });
        stream
    }

    /// Queue a frame for transmission on a device.
    pub fn transmit(&mut self, sched: &mut Scheduler, device: DeviceId, frame: Vec<u8>) {
        if self.devices[device.0].tx_busy {
            let dev = &mut self.devices[device.0];
            if dev.queue.len() >= dev.queue_limit {
                trace!("tx queue full on device {}, dropping frame", device.0);
                dev.tx_dropped += 1;
            } else {
                dev.queue.push_back(frame);
            }
        } else {
            self.transmit_start(sched, device, frame);
        }
    }

    fn transmit_start(&mut self, sched: &mut Scheduler, device: DeviceId, frame: Vec<u8>) {
        let (tx_time, gap, channel) = {
            let dev = &mut self.devices[device.0];
            let channel = match dev.channel {
                Some(channel) => channel,
                None => {
                    dev.tx_dropped += 1;
                    return;
                }
            };
            dev.tx_busy = true;
            dev.tx_packets += 1;
            dev.tx_bytes += frame.len() as u64;
            (dev.tx_time(frame.len()), dev.interframe_gap, channel)
        };
        sched.schedule_after(tx_time + gap, Event::TxComplete { device });
        let ch = &mut self.channels[channel.0];
        let dst = ch.peer_of(device);
        match ch.transport {
            Transport::Local => {
                sched.schedule_after(tx_time + ch.delay, Event::DeviceReceive { device: dst, frame });
            }
            Transport::Remote(ref mut transport) => {
                let rx_time = sched.now() + tx_time + ch.delay;
                transport.deliver(dst, frame, rx_time);
            }
        }
    }

    /// The transmitter went idle; start on the next queued frame if any.
    pub fn tx_complete(&mut self, sched: &mut Scheduler, device: DeviceId) {
        let next = {
            let dev = &mut self.devices[device.0];
            dev.tx_busy = false;
            dev.queue.pop_front()
        };
        if let Some(frame) = next {
            self.transmit_start(sched, device, frame);
        }
    }
}

/// A minimal non-SDN endpoint standing in for the normal layer-2 stack:
/// records what it receives, transmits what the simulation asks it to.
pub struct Host {
    pub id: HostId,
    pub devices: Vec<DeviceId>,
    pub received: Vec<Vec<u8>>,
}

impl Host {
    pub fn new(id: HostId) -> Host {
        Host {
            id,
            devices: Vec::new(),
            received: Vec::new(),
        }
    }

    /// MAC address of the host's first device.
    pub fn address(&self, net: &NetState) -> EthernetAddress {
        net.devices[self.devices[0].0].address
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_payload_is_padded() {
        let frame = build_frame(
            EthernetAddress([2, 0, 0, 0, 0, 1]),
            EthernetAddress([2, 0, 0, 0, 0, 2]),
            0x0800,
            &[1, 2, 3],
        );
        assert_eq!(frame.len(), ETHERNET_HEADER_LEN + MIN_PAYLOAD_LEN);
        assert_eq!(&frame[14..17], &[1, 2, 3]);
        assert!(frame[17..].iter().all(|&b| b == 0));
    }

    #[test]
    fn llc_roundtrip() {
        let src = EthernetAddress([2, 0, 0, 0, 0, 1]);
        let dst = EthernetAddress([2, 0, 0, 0, 0, 2]);
        let frame = build_frame_with_mode(src, dst, 0x0800, &[9; 20], EncapsulationMode::Llc);
        // length interpretation: the field carries payload + llc length
        assert_eq!(NetworkEndian::read_u16(&frame[12..14]), 28);
        let parsed = ParsedFrame::parse(&frame).unwrap();
        assert_eq!(parsed.protocol, 0x0800);
        assert_eq!(parsed.payload, vec![9; 20]);
        assert_eq!(parsed.src, src);
        assert_eq!(parsed.dst, dst);
    }

    #[test]
    fn feature_bits_by_rate() {
        assert_eq!(port_features(10_000_000_000), phy_port::OFPPF_10GB_FD);
        assert_eq!(port_features(1_000_000_000), phy_port::OFPPF_1GB_FD);
        assert_eq!(port_features(100_000_000), phy_port::OFPPF_100MB_FD);
        assert_eq!(port_features(10_000_000), phy_port::OFPPF_10MB_FD);
        assert_eq!(port_features(1_000_000), 0);
    }
}
