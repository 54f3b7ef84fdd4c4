use anyhow::Result;

use crate::agiscript::logic::{Instruction, Script};
use crate::agiscript::objects::InventoryTable;
use crate::agiscript::words::WordIndex;

fn print_jump(script: &Script, action: &Instruction) -> String {
    match action.destination() {
        Some(dest) => match script.target_index(action) {
            Some(index) => format!("  ; -> [{}]", index),
            None => format!("  ; -> {} unresolved", dest),
        },
        None => String::new(),
    }
}

pub fn print_logic(script: &Script) -> Result<()> {
    println!("logic.{:03}: {} actions", script.number, script.actions.len());
    for (n, action) in script.actions.iter().enumerate() {
        println!("[{:4}] {:5}  {}{}", n, action.address, action, print_jump(script, action));
    }
    if script.messages.len() > 1 {
        println!();
        for (n, message) in script.messages.iter().enumerate().skip(1) {
            println!("m{}: {:?}", n, message);
        }
    }
    Ok(())
}

pub fn print_words(index: &WordIndex) -> Result<()> {
    let mut current = None;
    for word in index.words() {
        if current != Some(word.number) {
            print!("{}{:5}:", if current.is_some() { "\n" } else { "" }, word.number);
            current = Some(word.number);
        }
        print!(" {}", word.text);
    }
    if current.is_some() {
        println!();
    }
    Ok(())
}

pub fn print_objects(table: &InventoryTable) -> Result<()> {
    println!("{} objects, {} animated", table.len(), table.max_animated);
    for (n, obj) in table.objects.iter().enumerate() {
        println!("{:3} room {:3} {}", n, obj.room, obj.name);
    }
    Ok(())
}
