//! The OpenFlow 1.3 group table: groups keyed by id, each carrying action
//! buckets that group actions dereference during action set execution.

use std::collections::HashMap;

use packets::group_mod::{self, Bucket, GroupType};
use sim::{Nanos, NANOS_PER_SEC};

/// Delete-all wildcard group id.
pub const OFPG_ALL: u32 = 0xffff_fffc;

/// An add refused because a group with that id already exists.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct GroupExistsError;

pub struct Group13 {
    pub group_id: u32,
    pub group_type: GroupType,
    pub buckets: Vec<Bucket>,
    pub ref_count: u32,
    pub packet_count: u64,
    pub byte_count: u64,
    pub install_time: Nanos,
}

impl Group13 {
    pub fn duration(&self, now: Nanos) -> (u32, u32) {
        let alive = now.saturating_sub(self.install_time);
        ((alive / NANOS_PER_SEC) as u32, (alive % NANOS_PER_SEC) as u32)
    }
}

#[derive(Default)]
pub struct GroupTable13 {
    groups: HashMap<u32, Group13>,
}

impl GroupTable13 {
    pub fn new() -> GroupTable13 {
        GroupTable13 {
            groups: HashMap::new(),
        }
    }

    pub fn get(&self, group_id: u32) -> Option<&Group13> {
        self.groups.get(&group_id)
    }

    pub fn get_mut(&mut self, group_id: u32) -> Option<&mut Group13> {
        self.groups.get_mut(&group_id)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Install a new group; a duplicate id is an error.
    pub fn add_group(
        &mut self,
        now: Nanos,
        message: &group_mod::PacketRepr,
    ) -> Result<(), GroupExistsError> {
        if self.groups.contains_key(&message.group_id) {
            return Err(GroupExistsError);
        }
        debug!("adding group id={}", message.group_id);
        self.groups.insert(
            message.group_id,
            Group13 {
                group_id: message.group_id,
                group_type: message.group_type,
                buckets: message.buckets.clone(),
                ref_count: 0,
                packet_count: 0,
                byte_count: 0,
                install_time: now,
            },
        );
        Ok(())
    }

    /// Replace the description and buckets of an existing group. An
    /// unknown id is ignored.
    pub fn modify_group(&mut self, message: &group_mod::PacketRepr) {
        if let Some(group) = self.groups.get_mut(&message.group_id) {
            debug!("modifying group id={}", message.group_id);
            group.group_type = message.group_type;
            group.buckets = message.buckets.clone();
        }
    }

    /// Delete the group, or every group for `OFPG_ALL`.
    pub fn delete_group(&mut self, message: &group_mod::PacketRepr) {
        if message.group_id == OFPG_ALL {
            self.groups.clear();
        } else {
            self.groups.remove(&message.group_id);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use packets::actions::Action13;
    use packets::group_mod::Command;

    fn group_mod(group_id: u32) -> group_mod::PacketRepr {
        group_mod::PacketRepr {
            command: Command::Add,
            group_type: GroupType::All,
            group_id,
            buckets: vec![Bucket {
                weight: 0,
                watch_port: 0xffff_ffff,
                watch_group: 0xffff_ffff,
                actions: vec![Action13::Output { port: 1, max_len: 0xffff }],
            }],
        }
    }

    #[test]
    fn duplicate_add_is_refused() {
        let mut table = GroupTable13::new();
        assert!(table.add_group(0, &group_mod(7)).is_ok());
        assert_eq!(table.add_group(0, &group_mod(7)), Err(GroupExistsError));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn delete_all() {
        let mut table = GroupTable13::new();
        table.add_group(0, &group_mod(1)).unwrap();
        table.add_group(0, &group_mod(2)).unwrap();
        let mut delete = group_mod(OFPG_ALL);
        delete.command = Command::Delete;
        table.delete_group(&delete);
        assert_eq!(table.len(), 0);
    }
}
