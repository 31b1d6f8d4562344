//! OpenFlow 1.3 instruction codec. A flow entry carries an instruction set;
//! during table traversal the instructions run in the canonical order
//! `GoToTable < WriteActions < WriteMetadata < ApplyActions < ClearActions
//! < Meter`.

use {Error, Result};
use byteorder::{ByteOrder, NetworkEndian};
use super::actions::{self, Action13};

const OFPIT_GOTO_TABLE: u16 = 1;
const OFPIT_WRITE_METADATA: u16 = 2;
const OFPIT_WRITE_ACTIONS: u16 = 3;
const OFPIT_APPLY_ACTIONS: u16 = 4;
const OFPIT_CLEAR_ACTIONS: u16 = 5;
const OFPIT_METER: u16 = 6;

const INSTRUCTION_HEADER_LEN: usize = 4;

/// A pipeline directive attached to a 1.3 flow.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Instruction {
    /// Continue matching in the given table, which must be strictly greater
    /// than the current one.
    GoToTable(u8),
    WriteMetadata { metadata: u64, mask: u64 },
    /// Union the actions into the pipeline action set.
    WriteActions(Vec<Action13>),
    ApplyActions(Vec<Action13>),
    ClearActions,
    Meter(u32),
}

impl Instruction {
    /// Rank in the canonical execution order.
    pub fn execution_order(&self) -> u8 {
        match *self {
            Instruction::GoToTable(_) => 0,
            Instruction::WriteActions(_) => 1,
            Instruction::WriteMetadata { .. } => 2,
            Instruction::ApplyActions(_) => 3,
            Instruction::ClearActions => 4,
            Instruction::Meter(_) => 5,
        }
    }

    pub fn buffer_len(&self) -> usize {
        match *self {
            Instruction::GoToTable(_) => 8,
            Instruction::WriteMetadata { .. } => 24,
            Instruction::WriteActions(ref list) | Instruction::ApplyActions(ref list) => {
                8 + actions::list_len13(list)
            }
            Instruction::ClearActions => 8,
            Instruction::Meter(_) => 8,
        }
    }

    fn parse(buffer: &[u8]) -> Result<(Instruction, usize)> {
        if buffer.len() < INSTRUCTION_HEADER_LEN {
            return Err(Error::Truncated);
        }
        let kind = NetworkEndian::read_u16(&buffer[0..2]);
        let len = NetworkEndian::read_u16(&buffer[2..4]) as usize;
        if len < INSTRUCTION_HEADER_LEN || buffer.len() < len {
            return Err(Error::Malformed);
        }
        let instruction = match kind {
            OFPIT_GOTO_TABLE => Instruction::GoToTable(buffer[4]),
            OFPIT_WRITE_METADATA => {
                if len < 24 {
                    return Err(Error::Malformed);
                }
                Instruction::WriteMetadata {
                    metadata: NetworkEndian::read_u64(&buffer[8..16]),
                    mask: NetworkEndian::read_u64(&buffer[16..24]),
                }
            }
            OFPIT_WRITE_ACTIONS => Instruction::WriteActions(actions::parse_list13(&buffer[8..len])?),
            OFPIT_APPLY_ACTIONS => Instruction::ApplyActions(actions::parse_list13(&buffer[8..len])?),
            OFPIT_CLEAR_ACTIONS => Instruction::ClearActions,
            OFPIT_METER => Instruction::Meter(NetworkEndian::read_u32(&buffer[4..8])),
            _ => return Err(Error::Unrecognized),
        };
        Ok((instruction, len))
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        let len = self.buffer_len();
        if buffer.len() < len {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..len].iter_mut() {
            *byte = 0;
        }
        NetworkEndian::write_u16(&mut buffer[2..4], len as u16);
        match *self {
            Instruction::GoToTable(table_id) => {
                NetworkEndian::write_u16(&mut buffer[0..2], OFPIT_GOTO_TABLE);
                buffer[4] = table_id;
            }
            Instruction::WriteMetadata { metadata, mask } => {
                NetworkEndian::write_u16(&mut buffer[0..2], OFPIT_WRITE_METADATA);
                NetworkEndian::write_u64(&mut buffer[8..16], metadata);
                NetworkEndian::write_u64(&mut buffer[16..24], mask);
            }
            Instruction::WriteActions(ref list) => {
                NetworkEndian::write_u16(&mut buffer[0..2], OFPIT_WRITE_ACTIONS);
                actions::emit_list13(list, &mut buffer[8..len])?;
            }
            Instruction::ApplyActions(ref list) => {
                NetworkEndian::write_u16(&mut buffer[0..2], OFPIT_APPLY_ACTIONS);
                actions::emit_list13(list, &mut buffer[8..len])?;
            }
            Instruction::ClearActions => {
                NetworkEndian::write_u16(&mut buffer[0..2], OFPIT_CLEAR_ACTIONS);
            }
            Instruction::Meter(meter_id) => {
                NetworkEndian::write_u16(&mut buffer[0..2], OFPIT_METER);
                NetworkEndian::write_u32(&mut buffer[4..8], meter_id);
            }
        }
        Ok(())
    }
}

/// An instruction set, kept sorted in the canonical execution order.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct InstructionSet(Vec<Instruction>);

impl InstructionSet {
    pub fn new(mut instructions: Vec<Instruction>) -> Self {
        instructions.sort_by_key(Instruction::execution_order);
        InstructionSet(instructions)
    }

    pub fn iter(&self) -> ::core::slice::Iter<Instruction> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parse a back to back sequence of instructions filling the whole buffer.
pub fn parse_set(buffer: &[u8]) -> Result<InstructionSet> {
    let mut instructions = Vec::new();
    let mut offset = 0;
    while offset < buffer.len() {
        let (instruction, len) = Instruction::parse(&buffer[offset..])?;
        instructions.push(instruction);
        offset += len;
    }
    Ok(InstructionSet::new(instructions))
}

/// Wire length of an instruction set.
pub fn set_len(set: &InstructionSet) -> usize {
    set.iter().fold(0, |acc, inst| acc + inst.buffer_len())
}

/// Emit an instruction set back to back.
pub fn emit_set(set: &InstructionSet, buffer: &mut [u8]) -> Result<()> {
    let mut offset = 0;
    for instruction in set.iter() {
        instruction.emit(&mut buffer[offset..])?;
        offset += instruction.buffer_len();
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn canonical_order() {
        let set = InstructionSet::new(vec![
            Instruction::ClearActions,
            Instruction::GoToTable(4),
            Instruction::WriteActions(vec![]),
        ]);
        let order: Vec<u8> = set.iter().map(Instruction::execution_order).collect();
        assert_eq!(order, vec![0, 1, 4]);
    }

    #[test]
    fn set_roundtrip() {
        let set = InstructionSet::new(vec![
            Instruction::WriteActions(vec![Action13::Output { port: 2, max_len: 0xffff }]),
            Instruction::GoToTable(1),
            Instruction::Meter(9),
        ]);
        let mut buf = vec![0xff; set_len(&set)];
        emit_set(&set, &mut buf).unwrap();
        assert_eq!(parse_set(&buf).unwrap(), set);
    }
}
