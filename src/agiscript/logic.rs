use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};

use crate::agires::{bytes, crypt};
use crate::agiscript::opcode::{self, OperandType, OperationSpec, OperationTable};

/// Actions start after the length prefix; addresses are offsets into the resource
const CODE_START: usize = 2;

#[derive(Clone,Debug,PartialEq)]
pub enum Operand {
    Var(u8),
    Num(u8),
    Flag(u8),
    Object(u8),
    View(u8),
    MsgNum(u8),
    WordList(Vec<u16>),
    Test(Box<Instruction>),
    TestList(Vec<Instruction>),
    Address(usize),
}

impl Operand {
    fn new(otype: OperandType, value: u8) -> Result<Operand> {
        match otype {
            OperandType::Var => Ok(Operand::Var(value)),
            OperandType::Num => Ok(Operand::Num(value)),
            OperandType::Flag => Ok(Operand::Flag(value)),
            OperandType::Object => Ok(Operand::Object(value)),
            OperandType::View => Ok(Operand::View(value)),
            OperandType::MsgNum => Ok(Operand::MsgNum(value)),
            _ => Err(anyhow!("operand type {} cannot be read as a byte", otype))
        }
    }

    /// Value of a single byte operand
    pub fn as_byte(&self) -> Option<u8> {
        match self {
            Operand::Var(n) | Operand::Num(n) | Operand::Flag(n) |
            Operand::Object(n) | Operand::View(n) | Operand::MsgNum(n) => Some(*n),
            _ => None
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Var(n) => { write!(f, "v{}", n) },
            Operand::Num(n) => { write!(f, "{}", n) },
            Operand::Flag(n) => { write!(f, "f{}", n) },
            Operand::Object(n) => { write!(f, "o{}", n) },
            Operand::View(n) => { write!(f, "{}", n) },
            Operand::MsgNum(n) => { write!(f, "m{}", n) },
            Operand::WordList(words) => {
                let words: Vec<String> = words.iter().map(|w| w.to_string()).collect();
                write!(f, "{}", words.join(", "))
            },
            Operand::Test(cond) => { write!(f, "{}", cond) },
            Operand::TestList(conds) => {
                let conds: Vec<String> = conds.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", conds.join(" && "))
            },
            Operand::Address(a) => { write!(f, "{}", a) },
        }
    }
}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum InstructionKind {
    Action,
    Goto { destination: usize },
    If { destination: usize },
    Condition,
}

#[derive(Clone,Debug,PartialEq)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub opcode: u8,
    pub name: &'static str,
    pub operands: Vec<Operand>,
    pub address: usize,
    pub logic: u16,
}

impl Instruction {
    fn new(kind: InstructionKind, op: &OperationSpec, operands: Vec<Operand>, address: usize, logic: u16) -> Self {
        Instruction{ kind, opcode: op.opcode, name: op.name, operands, address, logic }
    }

    pub fn is_action(&self) -> bool {
        !matches!(self.kind, InstructionKind::Condition)
    }

    /// Jump destination of a goto or if, as a byte address
    pub fn destination(&self) -> Option<usize> {
        match self.kind {
            InstructionKind::Goto{ destination } | InstructionKind::If{ destination } => Some(destination),
            _ => None
        }
    }

    /// Nested conditions of an if, or or not
    pub fn conditions(&self) -> &[Instruction] {
        match self.operands.first() {
            Some(Operand::TestList(conds)) => conds,
            Some(Operand::Test(cond)) => std::slice::from_ref(cond.as_ref()),
            _ => &[]
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.kind, self.opcode) {
            (InstructionKind::If{ destination }, _) => {
                write!(f, "if ({}) else goto({})", self.operands[0], destination)
            },
            (InstructionKind::Goto{ destination }, _) => { write!(f, "goto({})", destination) },
            (InstructionKind::Condition, opcode::NOT_OPCODE) => { write!(f, "!{}", self.operands[0]) },
            (InstructionKind::Condition, opcode::OR_OPCODE) => {
                let conds: Vec<String> = self.conditions().iter().map(|c| c.to_string()).collect();
                write!(f, "({})", conds.join(" || "))
            },
            _ => {
                let args: Vec<String> = self.operands.iter().map(|o| o.to_string()).collect();
                write!(f, "{}({})", self.name, args.join(", "))
            }
        }
    }
}

/// A decoded LOGIC resource
pub struct Script {
    pub number: u16,
    pub actions: Vec<Instruction>,
    /// 1-based; slot 0 is always empty
    pub messages: Vec<String>,
    address_to_index: HashMap<usize, usize>,
    game_id_message: Option<u8>,
}

struct Decoder<'a> {
    rdr: Cursor<&'a [u8]>,
    table: &'a OperationTable,
    logic: u16,
    game_id_message: Option<u8>,
}

impl<'a> Decoder<'a> {
    fn address(&self) -> usize {
        CODE_START + self.rdr.position() as usize
    }

    fn read_u8(&mut self) -> Result<u8> {
        let address = self.address();
        self.rdr.read_u8().map_err(|_| anyhow!("logic.{:03}: truncated at {}", self.logic, address))
    }

    fn read_destination(&mut self) -> Result<usize> {
        let address = self.address();
        let offset = self.rdr.read_i16::<LittleEndian>()
            .map_err(|_| anyhow!("logic.{:03}: truncated jump at {}", self.logic, address))?;
        let destination = self.address() as i64 + offset as i64;
        usize::try_from(destination)
            .map_err(|_| anyhow!("logic.{:03}: jump at {} to negative address {}", self.logic, address, destination))
    }

    fn read_operands(&mut self, op: &OperationSpec) -> Result<Vec<Operand>> {
        let mut operands = Vec::with_capacity(op.operands.len());
        for otype in &op.operands {
            let value = self.read_u8()?;
            operands.push(Operand::new(*otype, value)?);
        }
        Ok(operands)
    }

    fn structural(&self, opcode: u8) -> Result<&'a OperationSpec> {
        self.table.structural(opcode).ok_or_else(|| anyhow!("no operation for {:#x}", opcode))
    }

    /// Next action, or None once the code section is exhausted
    fn read_action(&mut self) -> Result<Option<Instruction>> {
        let address = self.address();
        let opcode = match self.rdr.read_u8() {
            Ok(b) => b,
            Err(_) => return Ok(None)
        };

        let action = match opcode {
            opcode::IF_OPCODE => {
                let mut conditions = Vec::new();
                while let Some(cond) = self.read_condition(opcode::IF_OPCODE)? {
                    conditions.push(cond);
                }
                let destination = self.read_destination()?;
                let operands = vec![ Operand::TestList(conditions), Operand::Address(destination) ];
                Instruction::new(InstructionKind::If{ destination }, self.structural(opcode)?, operands, address, self.logic)
            },
            opcode::GOTO_OPCODE => {
                let destination = self.read_destination()?;
                let operands = vec![ Operand::Address(destination) ];
                Instruction::new(InstructionKind::Goto{ destination }, self.structural(opcode)?, operands, address, self.logic)
            },
            _ => {
                let table = self.table;
                let op = table.action(opcode)
                    .ok_or_else(|| anyhow!("logic.{:03}: unknown action {} at {}", self.logic, opcode, address))?;
                let operands = self.read_operands(op)?;
                if opcode == opcode::SET_GAME_ID_OPCODE {
                    self.game_id_message = operands.first().and_then(|o| o.as_byte());
                }
                Instruction::new(InstructionKind::Action, op, operands, address, self.logic)
            }
        };
        Ok(Some(action))
    }

    /// Next condition, or None when `end_code` is read
    fn read_condition(&mut self, end_code: u8) -> Result<Option<Instruction>> {
        let address = self.address();
        let opcode = self.read_u8()?;
        if opcode == end_code {
            return Ok(None);
        }

        let table = self.table;
        let op = match opcode {
            opcode::OR_OPCODE | opcode::NOT_OPCODE => self.structural(opcode)?,
            _ => table.test(opcode)
                .ok_or_else(|| anyhow!("logic.{:03}: unknown test {} at {}", self.logic, opcode, address))?,
        };

        let operands = match opcode {
            opcode::OR_OPCODE => {
                let mut conditions = Vec::new();
                while let Some(cond) = self.read_condition(opcode::OR_OPCODE)? {
                    conditions.push(cond);
                }
                vec![ Operand::TestList(conditions) ]
            },
            opcode::NOT_OPCODE => {
                let cond = self.read_condition(opcode::IF_OPCODE)?
                    .ok_or_else(|| anyhow!("logic.{:03}: not without condition at {}", self.logic, address))?;
                vec![ Operand::Test(Box::new(cond)) ]
            },
            opcode::SAID_OPCODE => {
                let count = self.read_u8()?;
                let mut words = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let lo = self.read_u8()? as u16;
                    let hi = self.read_u8()? as u16;
                    words.push(lo | (hi << 8));
                }
                vec![ Operand::WordList(words) ]
            },
            _ => self.read_operands(op)?
        };
        Ok(Some(Instruction::new(InstructionKind::Condition, op, operands, address, self.logic)))
    }
}

impl Script {
    /// Decodes a LOGIC whose message text is already plain
    pub fn new(number: u16, data: &[u8], table: &OperationTable) -> Result<Script> {
        let length = bytes::read_lohi(data, 0)
            .with_context(|| format!("logic.{:03}: missing length", number))? as usize;
        let code = bytes::segment(data, CODE_START, length)
            .with_context(|| format!("logic.{:03}: code section truncated", number))?;

        let mut decoder = Decoder{ rdr: Cursor::new(code), table, logic: number, game_id_message: None };
        let mut actions: Vec<Instruction> = Vec::new();
        let mut address_to_index = HashMap::new();
        while let Some(action) = decoder.read_action()? {
            address_to_index.insert(action.address, actions.len());
            actions.push(action);
        }

        // some scripts lack a final return
        if actions.last().map_or(true, |a| a.opcode != opcode::RETURN_OPCODE) {
            let op = table.action(opcode::RETURN_OPCODE).ok_or_else(|| anyhow!("no return operation"))?;
            let address = CODE_START + length;
            log::debug!("logic.{:03}: appending return at {}", number, address);
            address_to_index.insert(address, actions.len());
            actions.push(Instruction::new(InstructionKind::Action, op, Vec::new(), address, number));
        }

        let messages = read_messages(number, data, CODE_START + length)?;
        let game_id_message = decoder.game_id_message;
        Ok(Script{ number, actions, messages, address_to_index, game_id_message })
    }

    /// Decodes a LOGIC whose message text is still encrypted with `key`
    pub fn new_crypted(number: u16, data: &[u8], table: &OperationTable, key: &[u8]) -> Result<Script> {
        let mut data = data.to_vec();
        crypt::decrypt_logic_messages(&mut data, key)?;
        Script::new(number, &data, table)
    }

    pub fn index_of(&self, address: usize) -> Option<usize> {
        self.address_to_index.get(&address).copied()
    }

    /// Index of the action a goto or if jumps to
    pub fn target_index(&self, action: &Instruction) -> Option<usize> {
        action.destination().and_then(|d| self.index_of(d))
    }

    pub fn message(&self, num: usize) -> Option<&str> {
        self.messages.get(num).map(|m| m.as_str())
    }

    /// Message passed to set.game.id, if the script has one
    pub fn game_id(&self) -> Option<&str> {
        self.game_id_message.and_then(|n| self.message(n as usize))
    }
}

fn read_messages(number: u16, data: &[u8], messages_offset: usize) -> Result<Vec<String>> {
    let mut messages = vec![ String::new() ];
    let count = match data.get(messages_offset) {
        Some(n) => *n as usize,
        None => {
            log::warn!("logic.{:03}: no message section", number);
            return Ok(messages);
        }
    };

    // offsets are relative to the byte after the count
    let text_base = messages_offset + 1;
    for n in 0..count {
        let marker = messages_offset + 3 + n * 2;
        let offset = bytes::read_lohi(data, marker)
            .with_context(|| format!("logic.{:03}: message table truncated", number))? as usize;
        if offset == 0 {
            messages.push(String::new());
            continue;
        }
        let text = bytes::read_cstring(data, text_base + offset)
            .with_context(|| format!("logic.{:03}: message {} out of range", number, n + 1))?;
        messages.push(text);
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn table() -> OperationTable {
        OperationTable::new("2.936").unwrap()
    }

    fn logic(code: &[u8], messages: &[u8]) -> Vec<u8> {
        let mut data = vec![ code.len() as u8, (code.len() >> 8) as u8 ];
        data.extend_from_slice(code);
        data.extend_from_slice(messages);
        data
    }

    // if (isset(5)) { set(3) } goto(end)
    const IF_SET_GOTO: [u8; 11] = [
        0xff, 0x07, 0x05, 0xff, 0x02, 0x00,
        0x0c, 0x03,
        0xfe, 0x00, 0x00,
    ];

    fn assert_bijection(script: &Script) {
        let mut indices: Vec<usize> = script.actions.iter().map(|a| script.index_of(a.address).unwrap()).collect();
        indices.sort();
        assert_eq!(indices, (0..script.actions.len()).collect::<Vec<_>>());
        for a in &script.actions {
            if a.destination().is_some() {
                assert!(script.target_index(a).is_some(), "{} does not resolve", a);
            }
        }
    }

    #[test]
    fn if_set_goto() {
        let script = Script::new(7, &logic(&IF_SET_GOTO, &[ 0x00, 0x00, 0x00 ]), &table()).unwrap();
        assert_eq!(script.actions.len(), 4);

        let a = &script.actions[0];
        assert_eq!(a.kind, InstructionKind::If{ destination: 10 });
        assert_eq!(a.conditions().len(), 1);
        assert_eq!(a.conditions()[0].name, "isset");
        assert_eq!(a.conditions()[0].operands, vec![ Operand::Flag(5) ]);
        assert_eq!(script.target_index(a), Some(2));

        let a = &script.actions[1];
        assert_eq!(a.name, "set");
        assert_eq!(a.operands, vec![ Operand::Flag(3) ]);

        let a = &script.actions[2];
        assert_eq!(a.kind, InstructionKind::Goto{ destination: 13 });
        assert_eq!(script.target_index(a), Some(3));
        assert_eq!(a.to_string(), "goto(13)");

        let end = &script.actions[3];
        assert_eq!(end.name, "return");
        assert_eq!(end.address, 13);
        assert_eq!(end.logic, 7);
        assert_bijection(&script);
    }

    #[test]
    fn nested_conditions() {
        // if ((has(1) || !isset(2)) && said(1, 300)) { return }
        let code = [
            0xff,
            0xfc, 0x09, 0x01, 0xfd, 0x07, 0x02, 0xfc,
            0x0e, 0x02, 0x01, 0x00, 0x2c, 0x01,
            0xff, 0x01, 0x00,
            0x00,
        ];
        let script = Script::new(0, &logic(&code, &[ 0x00 ]), &table()).unwrap();
        assert_eq!(script.actions.len(), 2);
        let conds = script.actions[0].conditions();
        assert_eq!(conds.len(), 2);
        assert_eq!(conds[0].opcode, opcode::OR_OPCODE);
        assert_eq!(conds[0].conditions().len(), 2);
        assert_eq!(conds[0].conditions()[1].conditions()[0].name, "isset");
        assert_eq!(conds[1].operands, vec![ Operand::WordList(vec![ 1, 300 ]) ]);
        assert_eq!(script.actions[0].to_string(), "if ((has(o1) || !isset(f2)) && said(1, 300)) else goto(20)");
        assert_eq!(script.target_index(&script.actions[0]), None);
        assert_eq!(script.actions[1].address, 19);
    }

    #[test]
    fn messages_and_game_id() {
        // set.game.id(m1); return
        let code = [ 0x8f, 0x01, 0x00 ];
        let messages = [ 0x02, 0x0c, 0x00, 0x06, 0x00, 0x00, 0x00, b'K', b'Q', b'1', 0x00 ];
        let script = Script::new(0, &logic(&code, &messages), &table()).unwrap();
        assert_eq!(script.messages, vec![ "".to_string(), "KQ1".to_string(), "".to_string() ]);
        assert_eq!(script.game_id(), Some("KQ1"));
        assert_eq!(script.actions.len(), 2);
        assert_eq!(script.actions[0].to_string(), "set.game.id(m1)");
    }

    #[test]
    fn crypted_messages() {
        let code = [ 0x65, 0x01, 0x00 ];
        let mut messages = vec![ 0x01, 0x08, 0x00, 0x04, 0x00, b'h', b'i', 0x00 ];
        crypt::crypt(&mut messages, b"Avis Durgan", 5);
        let script = Script::new_crypted(3, &logic(&code, &messages), &table(), b"Avis Durgan").unwrap();
        assert_eq!(script.message(1), Some("hi"));
        assert_eq!(script.game_id(), None);
    }

    #[test]
    fn missing_message_section() {
        let script = Script::new(0, &logic(&[ 0x00 ], &[]), &table()).unwrap();
        assert_eq!(script.messages, vec![ String::new() ]);
        assert_eq!(script.actions.len(), 1);
    }

    #[test]
    fn version_changes_operands() {
        // quit(1) on 2.936 is quit() followed by increment(v0) on 2.089
        let code = [ 0x86, 0x01, 0x00 ];
        let data = logic(&code, &[ 0x00 ]);
        let script = Script::new(0, &data, &table()).unwrap();
        assert_eq!(script.actions.len(), 2);
        assert_eq!(script.actions[0].to_string(), "quit(1)");
        let script = Script::new(0, &data, &OperationTable::new("2.089").unwrap()).unwrap();
        assert_eq!(script.actions.len(), 3);
        assert_eq!(script.actions[0].to_string(), "quit()");
        assert_eq!(script.actions[1].to_string(), "increment(v0)");
        assert_bijection(&script);
    }

    #[test]
    fn decode_errors() {
        // unknown action
        assert!(Script::new(0, &logic(&[ 0xc8 ], &[ 0x00 ]), &table()).is_err());
        // unknown test
        assert!(Script::new(0, &logic(&[ 0xff, 0x30, 0xff, 0x00, 0x00 ], &[ 0x00 ]), &table()).is_err());
        // operand past the end of code
        assert!(Script::new(0, &logic(&[ 0x03, 0x01 ], &[ 0x00 ]), &table()).is_err());
        // length beyond data
        assert!(Script::new(0, &[ 0x10, 0x00, 0x00 ], &table()).is_err());
        // message table truncated
        assert!(Script::new(0, &logic(&[ 0x00 ], &[ 0x02, 0x00, 0x00, 0x01 ]), &table()).is_err());
    }
}
