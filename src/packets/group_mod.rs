//! Group mod payload (1.3): group table mutations, each group carrying a
//! list of action buckets.
//!
//! ```no_rust
//!  0      7        15       23       31
//! +--------+--------+--------+--------+
//! |     command     |  type  |  pad   |
//! +--------+--------+--------+--------+
//! |             group id              |
//! +--------+--------+--------+--------+
//! |            buckets ...            |
//! +--------+--------+--------+--------+
//! ```

use {Error, Repr, Result};
use byteorder::{ByteOrder, NetworkEndian};
use super::actions::{self, Action13};

enum_with_unknown! {
    /// What a group mod does to the group table
    pub doc enum Command(u16) {
        /// New group.
        Add = 0,
        /// Modify all matching groups.
        Modify = 1,
        /// Delete all matching groups.
        Delete = 2
    }
}

enum_with_unknown! {
    /// How the group picks buckets
    pub doc enum GroupType(u8) {
        /// Execute all buckets.
        All = 0,
        /// Execute one bucket (switch determined).
        Select = 1,
        /// Execute the first live bucket.
        Indirect = 2,
        /// Execute the first live bucket as fast failover.
        FastFailover = 3
    }
}

const BUCKET_HEADER_LEN: usize = 16;

/// One action bucket of a group.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Bucket {
    /// Relative share for select groups.
    pub weight: u16,
    /// Port whose liveness gates this bucket, or all-ones.
    pub watch_port: u32,
    /// Group whose liveness gates this bucket, or all-ones.
    pub watch_group: u32,
    pub actions: Vec<Action13>,
}

impl Bucket {
    fn buffer_len(&self) -> usize {
        BUCKET_HEADER_LEN + actions::list_len13(&self.actions)
    }

    fn parse(buffer: &[u8]) -> Result<(Bucket, usize)> {
        if buffer.len() < BUCKET_HEADER_LEN {
            return Err(Error::Truncated);
        }
        let len = NetworkEndian::read_u16(&buffer[0..2]) as usize;
        if len < BUCKET_HEADER_LEN || buffer.len() < len {
            return Err(Error::Malformed);
        }
        Ok((
            Bucket {
                weight: NetworkEndian::read_u16(&buffer[2..4]),
                watch_port: NetworkEndian::read_u32(&buffer[4..8]),
                watch_group: NetworkEndian::read_u32(&buffer[8..12]),
                actions: actions::parse_list13(&buffer[BUCKET_HEADER_LEN..len])?,
            },
            len,
        ))
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        let len = self.buffer_len();
        if buffer.len() < len {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..BUCKET_HEADER_LEN].iter_mut() {
            *byte = 0;
        }
        NetworkEndian::write_u16(&mut buffer[0..2], len as u16);
        NetworkEndian::write_u16(&mut buffer[2..4], self.weight);
        NetworkEndian::write_u32(&mut buffer[4..8], self.watch_port);
        NetworkEndian::write_u32(&mut buffer[8..12], self.watch_group);
        actions::emit_list13(&self.actions, &mut buffer[BUCKET_HEADER_LEN..len])
    }
}

mod field {
    use field::*;
    pub const COMMAND: Field = 0..2;
    pub const GROUP_TYPE: usize = 2;
    // one pad byte
    pub const GROUP_ID: Field = 4..8;
    pub const BUCKETS: Rest = 8..;
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketRepr {
    pub command: Command,
    pub group_type: GroupType,
    pub group_id: u32,
    pub buckets: Vec<Bucket>,
}

impl Repr for PacketRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field::BUCKETS.start {
            return Err(Error::Truncated);
        }
        let mut buckets = Vec::new();
        let bucket_buf = &buffer[field::BUCKETS];
        let mut offset = 0;
        while offset < bucket_buf.len() {
            let (bucket, len) = Bucket::parse(&bucket_buf[offset..])?;
            buckets.push(bucket);
            offset += len;
        }
        Ok(PacketRepr {
            command: NetworkEndian::read_u16(&buffer[field::COMMAND]).into(),
            group_type: GroupType::from(buffer[field::GROUP_TYPE]),
            group_id: NetworkEndian::read_u32(&buffer[field::GROUP_ID]),
            buckets,
        })
    }

    fn buffer_len(&self) -> usize {
        field::BUCKETS.start + self.buckets.iter().fold(0, |acc, b| acc + b.buffer_len())
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        NetworkEndian::write_u16(&mut buffer[field::COMMAND], self.command.into());
        buffer[field::GROUP_TYPE] = self.group_type.into();
        buffer[field::GROUP_TYPE + 1] = 0;
        NetworkEndian::write_u32(&mut buffer[field::GROUP_ID], self.group_id);
        let bucket_buf = &mut buffer[field::BUCKETS];
        let mut offset = 0;
        for bucket in &self.buckets {
            bucket.emit(&mut bucket_buf[offset..])?;
            offset += bucket.buffer_len();
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Repr;

    #[test]
    fn roundtrip() {
        let repr = PacketRepr {
            command: Command::Add,
            group_type: GroupType::All,
            group_id: 7,
            buckets: vec![
                Bucket {
                    weight: 0,
                    watch_port: 0xffff_ffff,
                    watch_group: 0xffff_ffff,
                    actions: vec![Action13::Output { port: 2, max_len: 0xffff }],
                },
                Bucket {
                    weight: 0,
                    watch_port: 0xffff_ffff,
                    watch_group: 0xffff_ffff,
                    actions: vec![Action13::Output { port: 3, max_len: 0xffff }],
                },
            ],
        };
        let mut buf = vec![0xff; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketRepr::parse(&buf).unwrap(), repr);
    }
}
