use std::collections::HashMap;
use std::fmt;

use anyhow::{anyhow, Result};
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "agiscript/signature.pest"]
struct SignatureParser;

pub const OR_OPCODE: u8 = 0xfc;
pub const NOT_OPCODE: u8 = 0xfd;
pub const GOTO_OPCODE: u8 = 0xfe;
pub const IF_OPCODE: u8 = 0xff;
pub const SAID_OPCODE: u8 = 0x0e;
pub const RETURN_OPCODE: u8 = 0x00;
pub const SET_GAME_ID_OPCODE: u8 = 143;

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum OperandType {
    Var,
    Num,
    Flag,
    Object,
    WordList,
    View,
    MsgNum,
    Test,
    TestList,
    Address,
}

impl OperandType {
    fn from_keyword(keyword: &str) -> Option<OperandType> {
        match keyword {
            "VAR" => Some(OperandType::Var),
            "NUM" => Some(OperandType::Num),
            "FLAG" => Some(OperandType::Flag),
            "OBJECT" => Some(OperandType::Object),
            "WORDLIST" => Some(OperandType::WordList),
            "VIEW" => Some(OperandType::View),
            "MSGNUM" => Some(OperandType::MsgNum),
            "TEST" => Some(OperandType::Test),
            "TESTLIST" => Some(OperandType::TestList),
            "ADDRESS" => Some(OperandType::Address),
            _ => None
        }
    }
}

impl fmt::Display for OperandType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OperandType::Var => { write!(f, "VAR") },
            OperandType::Num => { write!(f, "NUM") },
            OperandType::Flag => { write!(f, "FLAG") },
            OperandType::Object => { write!(f, "OBJECT") },
            OperandType::WordList => { write!(f, "WORDLIST") },
            OperandType::View => { write!(f, "VIEW") },
            OperandType::MsgNum => { write!(f, "MSGNUM") },
            OperandType::Test => { write!(f, "TEST") },
            OperandType::TestList => { write!(f, "TESTLIST") },
            OperandType::Address => { write!(f, "ADDRESS") },
        }
    }
}

#[derive(Clone,Debug,PartialEq)]
pub struct OperationSpec {
    pub opcode: u8,
    pub signature: &'static str,
    pub name: &'static str,
    pub operands: Vec<OperandType>,
}

impl OperationSpec {
    pub fn new(opcode: u8, signature: &'static str) -> Result<OperationSpec> {
        let mut pairs = SignatureParser::parse(Rule::signature, signature)?;
        let pair = pairs.next().ok_or_else(|| anyhow!("empty signature for opcode {}", opcode))?;

        let mut name = "";
        let mut operands = Vec::new();
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::name => { name = p.as_str(); },
                Rule::operands => {
                    for t in p.into_inner() {
                        let otype = OperandType::from_keyword(t.as_str())
                            .ok_or_else(|| anyhow!("unknown operand type {} in {}", t.as_str(), signature))?;
                        operands.push(otype);
                    }
                },
                Rule::EOI => { },
                _ => unreachable!()
            }
        }
        Ok(OperationSpec{ opcode, signature, name, operands })
    }
}

pub const TEST_SIGNATURES: [&str; 19] = [
    "",
    "equaln(VAR,NUM)",
    "equalv(VAR,VAR)",
    "lessn(VAR,NUM)",
    "lessv(VAR,VAR)",
    "greatern(VAR,NUM)",
    "greaterv(VAR,VAR)",
    "isset(FLAG)",
    "isset.v(VAR)",
    "has(OBJECT)",
    "obj.in.room(OBJECT,VAR)",
    "posn(OBJECT,NUM,NUM,NUM,NUM)",
    "controller(NUM)",
    "have.key()",
    "said(WORDLIST)",
    "compare.strings(NUM,NUM)",
    "obj.in.box(OBJECT,NUM,NUM,NUM,NUM)",
    "center.posn(OBJECT,NUM,NUM,NUM,NUM)",
    "right.posn(OBJECT,NUM,NUM,NUM,NUM)",
];

pub const ACTION_SIGNATURES: [&str; 183] = [
    "return()",
    "increment(VAR)",
    "decrement(VAR)",
    "assignn(VAR,NUM)",
    "assignv(VAR,VAR)",
    "addn(VAR,NUM)",
    "addv(VAR,VAR)",
    "subn(VAR,NUM)",
    "subv(VAR,VAR)",
    "lindirectv(VAR,VAR)",
    "rindirect(VAR,VAR)",
    "lindirectn(VAR,NUM)",
    "set(FLAG)",
    "reset(FLAG)",
    "toggle(FLAG)",
    "set.v(VAR)",
    "reset.v(VAR)",
    "toggle.v(VAR)",
    "new.room(NUM)",
    "new.room.f(VAR)",
    "load.logics(NUM)",
    "load.logics.f(VAR)",
    "call(NUM)",
    "call.f(VAR)",
    "load.pic(VAR)",
    "draw.pic(VAR)",
    "show.pic()",
    "discard.pic(VAR)",
    "overlay.pic(VAR)",
    "show.pri.screen()",
    "load.view(VIEW)",
    "load.view.f(VAR)",
    "discard.view(VIEW)",
    "animate.obj(OBJECT)",
    "unanimate.all()",
    "draw(OBJECT)",
    "erase(OBJECT)",
    "position(OBJECT,NUM,NUM)",
    "position.f(OBJECT,VAR,VAR)",
    "get.posn(OBJECT,VAR,VAR)",
    "reposition(OBJECT,VAR,VAR)",
    "set.view(OBJECT,VIEW)",
    "set.view.f(OBJECT,VAR)",
    "set.loop(OBJECT,NUM)",
    "set.loop.f(OBJECT,VAR)",
    "fix.loop(OBJECT)",
    "release.loop(OBJECT)",
    "set.cel(OBJECT,NUM)",
    "set.cel.f(OBJECT,VAR)",
    "last.cel(OBJECT,VAR)",
    "current.cel(OBJECT,VAR)",
    "current.loop(OBJECT,VAR)",
    "current.view(OBJECT,VAR)",
    "number.of.loops(OBJECT,VAR)",
    "set.priority(OBJECT,NUM)",
    "set.priority.f(OBJECT,VAR)",
    "release.priority(OBJECT)",
    "get.priority(OBJECT,VAR)",
    "stop.update(OBJECT)",
    "start.update(OBJECT)",
    "force.update(OBJECT)",
    "ignore.horizon(OBJECT)",
    "observe.horizon(OBJECT)",
    "set.horizon(NUM)",
    "object.on.water(OBJECT)",
    "object.on.land(OBJECT)",
    "object.on.anything(OBJECT)",
    "ignore.objs(OBJECT)",
    "observe.objs(OBJECT)",
    "distance(OBJECT,OBJECT,VAR)",
    "stop.cycling(OBJECT)",
    "start.cycling(OBJECT)",
    "normal.cycle(OBJECT)",
    "end.of.loop(OBJECT,FLAG)",
    "reverse.cycle(OBJECT)",
    "reverse.loop(OBJECT,FLAG)",
    "cycle.time(OBJECT,VAR)",
    "stop.motion(OBJECT)",
    "start.motion(OBJECT)",
    "step.size(OBJECT,VAR)",
    "step.time(OBJECT,VAR)",
    "move.obj(OBJECT,NUM,NUM,NUM,FLAG)",
    "move.obj.f(OBJECT,VAR,VAR,VAR,FLAG)",
    "follow.ego(OBJECT,NUM,FLAG)",
    "wander(OBJECT)",
    "normal.motion(OBJECT)",
    "set.dir(OBJECT,VAR)",
    "get.dir(OBJECT,VAR)",
    "ignore.blocks(OBJECT)",
    "observe.blocks(OBJECT)",
    "block(NUM,NUM,NUM,NUM)",
    "unblock()",
    "get(OBJECT)",
    "get.f(VAR)",
    "drop(OBJECT)",
    "put(OBJECT,VAR)",
    "put.f(VAR,VAR)",
    "get.room.f(VAR,VAR)",
    "load.sound(NUM)",
    "sound(NUM,FLAG)",
    "stop.sound()",
    "print(MSGNUM)",
    "print.f(VAR)",
    "display(NUM,NUM,MSGNUM)",
    "display.f(VAR,VAR,VAR)",
    "clear.lines(NUM,NUM,NUM)",
    "text.screen()",
    "graphics()",
    "set.cursor.char(MSGNUM)",
    "set.text.attribute(NUM,NUM)",
    "shake.screen(NUM)",
    "configure.screen(NUM,NUM,NUM)",
    "status.line.on()",
    "status.line.off()",
    "set.string(NUM,MSGNUM)",
    "get.string(NUM,MSGNUM,NUM,NUM,NUM)",
    "word.to.string(NUM,NUM)",
    "parse(NUM)",
    "get.num(MSGNUM,VAR)",
    "prevent.input()",
    "accept.input()",
    "set.key(NUM,NUM,NUM)",
    "add.to.pic(VIEW,NUM,NUM,NUM,NUM,NUM,NUM)",
    "add.to.pic.f(VAR,VAR,VAR,VAR,VAR,VAR,VAR)",
    "status()",
    "save.game()",
    "restore.game()",
    "init.disk()",
    "restart.game()",
    "show.obj(VIEW)",
    "random(NUM,NUM,VAR)",
    "program.control()",
    "player.control()",
    "obj.status.f(VAR)",
    "quit(NUM)",
    "show.mem()",
    "pause()",
    "echo.line()",
    "cancel.line()",
    "init.joy()",
    "toggle.monitor()",
    "version()",
    "script.size(NUM)",
    "set.game.id(MSGNUM)",
    "log(MSGNUM)",
    "set.scan.start()",
    "reset.scan.start()",
    "reposition.to(OBJECT,NUM,NUM)",
    "reposition.to.f(OBJECT,VAR,VAR)",
    "trace.on()",
    "trace.info(NUM,NUM,NUM)",
    "print.at(MSGNUM,NUM,NUM,NUM)",
    "print.at.v(VAR,NUM,NUM,NUM)",
    "discard.view.v(VAR)",
    "clear.text.rect(NUM,NUM,NUM,NUM,NUM)",
    "set.upper.left(NUM,NUM)",
    "set.menu(MSGNUM)",
    "set.menu.item(MSGNUM,NUM)",
    "submit.menu()",
    "enable.item(NUM)",
    "disable.item(NUM)",
    "menu.input()",
    "show.obj.v(VAR)",
    "open.dialogue()",
    "close.dialogue()",
    "mul.n(VAR,NUM)",
    "mul.v(VAR,VAR)",
    "div.n(VAR,NUM)",
    "div.v(VAR,VAR)",
    "close.window()",
    "set.simple(NUM)",
    "push.script()",
    "pop.script()",
    "hold.key()",
    "set.pri.base(NUM)",
    "discard.sound(NUM)",
    "hide.mouse()",
    "allow.menu(NUM)",
    "show.mouse()",
    "fence.mouse(NUM,NUM,NUM,NUM)",
    "mouse.posn(VAR,VAR)",
    "release.key()",
    "adj.ego.move.to.x.y(NUM,NUM)",
];

pub const STRUCTURAL_SIGNATURES: [(u8, &str); 4] = [
    (OR_OPCODE, "or(TESTLIST)"),
    (NOT_OPCODE, "not(TEST)"),
    (GOTO_OPCODE, "goto(ADDRESS)"),
    (IF_OPCODE, "if(TESTLIST,ADDRESS)"),
];

/// Interpreter versions whose action table differs from the base one
const VERSION_OVERRIDES: [(&str, u8, &str); 1] = [
    // 2.089 takes no argument for quit
    ("2.089", 134, "quit()"),
];

/// Test and action operations for one interpreter version
pub struct OperationTable {
    version: String,
    tests: Vec<Option<OperationSpec>>,
    actions: Vec<OperationSpec>,
    structural: HashMap<u8, OperationSpec>,
}

impl OperationTable {
    pub fn new(version: &str) -> Result<OperationTable> {
        let mut tests = Vec::with_capacity(TEST_SIGNATURES.len());
        for (opcode, signature) in TEST_SIGNATURES.iter().enumerate() {
            if signature.is_empty() {
                tests.push(None);
                continue;
            }
            tests.push(Some(OperationSpec::new(opcode as u8, signature)?));
        }

        let mut actions = Vec::with_capacity(ACTION_SIGNATURES.len());
        for (opcode, signature) in ACTION_SIGNATURES.iter().enumerate() {
            actions.push(OperationSpec::new(opcode as u8, signature)?);
        }
        for (v, opcode, signature) in VERSION_OVERRIDES {
            if v == version {
                log::debug!("version {}: action {} is {}", version, opcode, signature);
                actions[opcode as usize] = OperationSpec::new(opcode, signature)?;
            }
        }

        let mut structural = HashMap::new();
        for (opcode, signature) in STRUCTURAL_SIGNATURES {
            structural.insert(opcode, OperationSpec::new(opcode, signature)?);
        }
        Ok(OperationTable{ version: version.to_string(), tests, actions, structural })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn test(&self, opcode: u8) -> Option<&OperationSpec> {
        self.tests.get(opcode as usize).and_then(|t| t.as_ref())
    }

    pub fn action(&self, opcode: u8) -> Option<&OperationSpec> {
        self.actions.get(opcode as usize)
    }

    /// The or/not/goto/if pseudo operations
    pub fn structural(&self, opcode: u8) -> Option<&OperationSpec> {
        self.structural.get(&opcode)
    }

    pub fn actions(&self) -> &[OperationSpec] {
        &self.actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn signature_parsing() {
        let op = OperationSpec::new(81, "move.obj(OBJECT,NUM,NUM,NUM,FLAG)").unwrap();
        assert_eq!(op.name, "move.obj");
        assert_eq!(op.operands, vec![ OperandType::Object, OperandType::Num, OperandType::Num,
            OperandType::Num, OperandType::Flag ]);
        let op = OperationSpec::new(0, "return()").unwrap();
        assert_eq!(op.name, "return");
        assert!(op.operands.is_empty());
        let op = OperationSpec::new(IF_OPCODE, "if(TESTLIST,ADDRESS)").unwrap();
        assert_eq!(op.operands, vec![ OperandType::TestList, OperandType::Address ]);
    }

    #[test]
    fn bad_signatures() {
        assert!(OperationSpec::new(1, "noparens").is_err());
        assert!(OperationSpec::new(1, "x(FOO)").is_err());
        assert!(OperationSpec::new(1, "x(VAR,)").is_err());
    }

    #[test]
    fn table_sizes() {
        let table = OperationTable::new("2.936").unwrap();
        assert_eq!(table.actions().len(), 183);
        assert!(table.test(0).is_none());
        assert_eq!(table.test(14).unwrap().name, "said");
        assert_eq!(table.test(18).unwrap().name, "right.posn");
        assert!(table.test(19).is_none());
        assert_eq!(table.action(182).unwrap().name, "adj.ego.move.to.x.y");
        assert!(table.action(183).is_none());
        assert_eq!(table.structural(GOTO_OPCODE).unwrap().name, "goto");
    }

    #[test]
    fn quit_override() {
        let base = OperationTable::new("2.936").unwrap();
        assert_eq!(base.action(134).unwrap().operands, vec![ OperandType::Num ]);
        let old = OperationTable::new("2.089").unwrap();
        assert_eq!(old.action(134).unwrap().name, "quit");
        assert!(old.action(134).unwrap().operands.is_empty());
        assert_eq!(old.version(), "2.089");
    }
}
