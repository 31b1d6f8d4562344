//! Action codecs. OpenFlow 1.0 actions are carried as a list and applied in
//! list order; OpenFlow 1.3 actions appear in instructions, action sets and
//! group buckets.
//!
//! Every action starts with the same 4 byte header:
//!
//! ```no_rust
//! +--------+--------+--------+--------+
//! |      type       |     length      |
//! +--------+--------+--------+--------+
//! |      type specific payload...     |
//! ```

use {Error, Result};
use byteorder::{ByteOrder, NetworkEndian};
use smoltcp::wire::{EthernetAddress, Ipv4Address};

const OFPAT10_OUTPUT: u16 = 0;
const OFPAT10_SET_VLAN_VID: u16 = 1;
const OFPAT10_SET_VLAN_PCP: u16 = 2;
const OFPAT10_STRIP_VLAN: u16 = 3;
const OFPAT10_SET_DL_SRC: u16 = 4;
const OFPAT10_SET_DL_DST: u16 = 5;
const OFPAT10_SET_NW_SRC: u16 = 6;
const OFPAT10_SET_NW_DST: u16 = 7;
const OFPAT10_SET_NW_TOS: u16 = 8;
const OFPAT10_SET_TP_SRC: u16 = 9;
const OFPAT10_SET_TP_DST: u16 = 10;

const OFPAT13_OUTPUT: u16 = 0;
const OFPAT13_GROUP: u16 = 22;

const ACTION_HEADER_LEN: usize = 4;

/// An OpenFlow 1.0 action.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Action {
    /// Send the packet out a port, truncated to `max_len` bytes when the
    /// packet is bigger.
    Output { port: u16, max_len: u16 },
    SetVlanVid(u16),
    SetVlanPcp(u8),
    StripVlan,
    SetDlSrc(EthernetAddress),
    SetDlDst(EthernetAddress),
    SetNwSrc(Ipv4Address),
    SetNwDst(Ipv4Address),
    SetNwTos(u8),
    SetTpSrc(u16),
    SetTpDst(u16),
}

impl Action {
    pub fn buffer_len(&self) -> usize {
        match *self {
            Action::SetDlSrc(_) | Action::SetDlDst(_) => 16,
            _ => 8,
        }
    }

    fn kind(&self) -> u16 {
        match *self {
            Action::Output { .. } => OFPAT10_OUTPUT,
            Action::SetVlanVid(_) => OFPAT10_SET_VLAN_VID,
            Action::SetVlanPcp(_) => OFPAT10_SET_VLAN_PCP,
            Action::StripVlan => OFPAT10_STRIP_VLAN,
            Action::SetDlSrc(_) => OFPAT10_SET_DL_SRC,
            Action::SetDlDst(_) => OFPAT10_SET_DL_DST,
            Action::SetNwSrc(_) => OFPAT10_SET_NW_SRC,
            Action::SetNwDst(_) => OFPAT10_SET_NW_DST,
            Action::SetNwTos(_) => OFPAT10_SET_NW_TOS,
            Action::SetTpSrc(_) => OFPAT10_SET_TP_SRC,
            Action::SetTpDst(_) => OFPAT10_SET_TP_DST,
        }
    }

    fn parse(buffer: &[u8]) -> Result<(Action, usize)> {
        if buffer.len() < ACTION_HEADER_LEN {
            return Err(Error::Truncated);
        }
        let kind = NetworkEndian::read_u16(&buffer[0..2]);
        let len = NetworkEndian::read_u16(&buffer[2..4]) as usize;
        if len < ACTION_HEADER_LEN || len % 8 != 0 || buffer.len() < len {
            return Err(Error::Malformed);
        }
        let payload = &buffer[4..len];
        let action = match kind {
            OFPAT10_OUTPUT => Action::Output {
                port: NetworkEndian::read_u16(&payload[0..2]),
                max_len: NetworkEndian::read_u16(&payload[2..4]),
            },
            OFPAT10_SET_VLAN_VID => Action::SetVlanVid(NetworkEndian::read_u16(&payload[0..2])),
            OFPAT10_SET_VLAN_PCP => Action::SetVlanPcp(payload[0]),
            OFPAT10_STRIP_VLAN => Action::StripVlan,
            OFPAT10_SET_DL_SRC => Action::SetDlSrc(EthernetAddress::from_bytes(&payload[0..6])),
            OFPAT10_SET_DL_DST => Action::SetDlDst(EthernetAddress::from_bytes(&payload[0..6])),
            OFPAT10_SET_NW_SRC => Action::SetNwSrc(Ipv4Address::from_bytes(&payload[0..4])),
            OFPAT10_SET_NW_DST => Action::SetNwDst(Ipv4Address::from_bytes(&payload[0..4])),
            OFPAT10_SET_NW_TOS => Action::SetNwTos(payload[0]),
            OFPAT10_SET_TP_SRC => Action::SetTpSrc(NetworkEndian::read_u16(&payload[0..2])),
            OFPAT10_SET_TP_DST => Action::SetTpDst(NetworkEndian::read_u16(&payload[0..2])),
            _ => return Err(Error::Unrecognized),
        };
        Ok((action, len))
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        let len = self.buffer_len();
        if buffer.len() < len {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..len].iter_mut() {
            *byte = 0;
        }
        NetworkEndian::write_u16(&mut buffer[0..2], self.kind());
        NetworkEndian::write_u16(&mut buffer[2..4], len as u16);
        {
            let payload = &mut buffer[4..len];
            match *self {
                Action::Output { port, max_len } => {
                    NetworkEndian::write_u16(&mut payload[0..2], port);
                    NetworkEndian::write_u16(&mut payload[2..4], max_len);
                }
                Action::SetVlanVid(vid) => NetworkEndian::write_u16(&mut payload[0..2], vid),
                Action::SetVlanPcp(pcp) => payload[0] = pcp,
                Action::StripVlan => {}
                Action::SetDlSrc(addr) | Action::SetDlDst(addr) => {
                    payload[0..6].copy_from_slice(addr.as_bytes())
                }
                Action::SetNwSrc(addr) | Action::SetNwDst(addr) => {
                    payload[0..4].copy_from_slice(addr.as_bytes())
                }
                Action::SetNwTos(tos) => payload[0] = tos,
                Action::SetTpSrc(port) | Action::SetTpDst(port) => {
                    NetworkEndian::write_u16(&mut payload[0..2], port)
                }
            }
        }
        Ok(())
    }
}

/// Parse a back to back sequence of 1.0 actions filling the whole buffer.
pub fn parse_list(buffer: &[u8]) -> Result<Vec<Action>> {
    let mut actions = Vec::new();
    let mut offset = 0;
    while offset < buffer.len() {
        let (action, len) = Action::parse(&buffer[offset..])?;
        actions.push(action);
        offset += len;
    }
    Ok(actions)
}

/// Wire length of a 1.0 action list.
pub fn list_len(actions: &[Action]) -> usize {
    actions.iter().fold(0, |acc, action| acc + action.buffer_len())
}

/// Emit a 1.0 action list back to back.
pub fn emit_list(actions: &[Action], buffer: &mut [u8]) -> Result<()> {
    let mut offset = 0;
    for action in actions {
        action.emit(&mut buffer[offset..])?;
        offset += action.buffer_len();
    }
    Ok(())
}

/// An OpenFlow 1.3 action. Only the actions the simulated data path
/// executes are recognized.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Action13 {
    /// Send the packet out a port.
    Output { port: u32, max_len: u16 },
    /// Process the packet through the group with the given id.
    Group(u32),
}

impl Action13 {
    pub fn buffer_len(&self) -> usize {
        match *self {
            Action13::Output { .. } => 16,
            Action13::Group(_) => 8,
        }
    }

    fn parse(buffer: &[u8]) -> Result<(Action13, usize)> {
        if buffer.len() < ACTION_HEADER_LEN {
            return Err(Error::Truncated);
        }
        let kind = NetworkEndian::read_u16(&buffer[0..2]);
        let len = NetworkEndian::read_u16(&buffer[2..4]) as usize;
        if len < ACTION_HEADER_LEN || len % 8 != 0 || buffer.len() < len {
            return Err(Error::Malformed);
        }
        let payload = &buffer[4..len];
        let action = match kind {
            OFPAT13_OUTPUT => Action13::Output {
                port: NetworkEndian::read_u32(&payload[0..4]),
                max_len: NetworkEndian::read_u16(&payload[4..6]),
            },
            OFPAT13_GROUP => Action13::Group(NetworkEndian::read_u32(&payload[0..4])),
            _ => return Err(Error::Unrecognized),
        };
        Ok((action, len))
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        let len = self.buffer_len();
        if buffer.len() < len {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..len].iter_mut() {
            *byte = 0;
        }
        match *self {
            Action13::Output { port, max_len } => {
                NetworkEndian::write_u16(&mut buffer[0..2], OFPAT13_OUTPUT);
                NetworkEndian::write_u16(&mut buffer[2..4], len as u16);
                NetworkEndian::write_u32(&mut buffer[4..8], port);
                NetworkEndian::write_u16(&mut buffer[8..10], max_len);
            }
            Action13::Group(group_id) => {
                NetworkEndian::write_u16(&mut buffer[0..2], OFPAT13_GROUP);
                NetworkEndian::write_u16(&mut buffer[2..4], len as u16);
                NetworkEndian::write_u32(&mut buffer[4..8], group_id);
            }
        }
        Ok(())
    }
}

/// Parse a back to back sequence of 1.3 actions filling the whole buffer.
pub fn parse_list13(buffer: &[u8]) -> Result<Vec<Action13>> {
    let mut actions = Vec::new();
    let mut offset = 0;
    while offset < buffer.len() {
        let (action, len) = Action13::parse(&buffer[offset..])?;
        actions.push(action);
        offset += len;
    }
    Ok(actions)
}

/// Wire length of a 1.3 action list.
pub fn list_len13(actions: &[Action13]) -> usize {
    actions.iter().fold(0, |acc, action| acc + action.buffer_len())
}

/// Emit a 1.3 action list back to back.
pub fn emit_list13(actions: &[Action13], buffer: &mut [u8]) -> Result<()> {
    let mut offset = 0;
    for action in actions {
        action.emit(&mut buffer[offset..])?;
        offset += action.buffer_len();
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn list_roundtrip() {
        let actions = vec![
            Action::SetDlDst(EthernetAddress([0, 1, 2, 3, 4, 5])),
            Action::SetNwTos(0x10),
            Action::Output { port: 3, max_len: 0xffff },
        ];
        let mut buf = vec![0xff; list_len(&actions)];
        assert_eq!(buf.len(), 16 + 8 + 8);
        emit_list(&actions, &mut buf).unwrap();
        assert_eq!(parse_list(&buf).unwrap(), actions);
    }

    #[test]
    fn output13_roundtrip() {
        let actions = vec![
            Action13::Output { port: 0xfffffffb, max_len: 0xffff },
            Action13::Group(7),
        ];
        let mut buf = vec![0xff; list_len13(&actions)];
        emit_list13(&actions, &mut buf).unwrap();
        assert_eq!(parse_list13(&buf).unwrap(), actions);
    }

    #[test]
    fn truncated_list() {
        let actions = vec![Action::StripVlan];
        let mut buf = vec![0; 8];
        emit_list(&actions, &mut buf).unwrap();
        assert_eq!(parse_list(&buf[..6]), Err(Error::Malformed));
    }
}
