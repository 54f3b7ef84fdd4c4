pub mod opcode;
pub mod logic;
pub mod words;
pub mod objects;
pub mod print;
