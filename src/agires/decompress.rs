use anyhow::{anyhow, Result};

use crate::agires::bitstream;

const LZW_TOKEN_RESET: u32 = 0x100;
const LZW_TOKEN_END_OF_STREAM: u32 = 0x101;
const LZW_TOKEN_INITIAL: u32 = 0x102;
const LZW_BITS_INITIAL: u32 = 9;
const LZW_BITS_MAX: u32 = 12;
const LZW_TABLE_SIZE: usize = 18041;
const LZW_MAX_EXPANSION: usize = 4000;

fn lzw_max_codes(num_bits: u32) -> u32 {
    (1 << num_bits) - 2
}

struct Table {
    prefix: Vec<u32>,
    append: Vec<u8>,
}

impl Table {
    fn new() -> Self {
        Table{ prefix: vec![ 0; LZW_TABLE_SIZE ], append: vec![ 0; LZW_TABLE_SIZE ] }
    }

    // Pushes the expansion of `token` in reverse order
    fn expand(&self, mut token: u32, stack: &mut Vec<u8>) -> Result<()> {
        let mut steps = 0;
        while token > 0xff {
            if token == LZW_TOKEN_RESET || token == LZW_TOKEN_END_OF_STREAM {
                return Err(anyhow!("lzw: control code {:#x} inside a code chain", token));
            }
            stack.push(self.append[token as usize]);
            token = self.prefix[token as usize];
            steps += 1;
            if steps > LZW_MAX_EXPANSION {
                return Err(anyhow!("lzw: error in code expansion"));
            }
        }
        stack.push(token as u8);
        Ok(())
    }
}

/// Decompresses an AGI V3 LZW stream. The first code of the stream is consumed
/// without output, as the original interpreters expect a leading reset code.
/// A code beyond the next free table slot is rejected as malformed rather
/// than treated as a repeat of the previous string.
pub fn decompress_lzw(input: &[u8], output: &mut Vec<u8>) -> Result<()> {
    let mut stream = bitstream::Streamer::new(input);
    let mut table = Table::new();
    let mut stack: Vec<u8> = Vec::new();

    let mut num_bits = LZW_BITS_INITIAL;
    let mut next_token = LZW_TOKEN_END_OF_STREAM;
    let mut old_token = match stream.get_bits_lsb(num_bits) {
        Some(LZW_TOKEN_END_OF_STREAM) | None => return Ok(()),
        Some(token) => token,
    };
    let mut last_char = old_token as u8;

    loop {
        let token = match stream.get_bits_lsb(num_bits) {
            Some(token) => token,
            None => {
                log::warn!("lzw: input exhausted without end-of-stream code");
                break
            }
        };
        match token {
            LZW_TOKEN_END_OF_STREAM => {
                break
            },
            LZW_TOKEN_RESET => {
                next_token = LZW_TOKEN_INITIAL;
                num_bits = LZW_BITS_INITIAL;
                old_token = match stream.get_bits_lsb(num_bits) {
                    Some(token) => token,
                    None => break,
                };
                if old_token > 0xff {
                    return Err(anyhow!("lzw: code {:#x} follows a reset", old_token));
                }
                last_char = old_token as u8;
                output.push(last_char);
            },
            _ => {
                stack.clear();
                if token > next_token {
                    return Err(anyhow!("lzw: code {:#x} not yet defined (next is {:#x})", token, next_token));
                } else if token == next_token {
                    stack.push(last_char);
                    table.expand(old_token, &mut stack)?;
                } else {
                    table.expand(token, &mut stack)?;
                }
                last_char = *stack.last().unwrap_or(&0);
                output.extend(stack.iter().rev());

                // A request for 12 bits leaves the width unchanged
                if next_token > lzw_max_codes(num_bits) && num_bits + 1 < LZW_BITS_MAX {
                    num_bits += 1;
                }

                if next_token as usize >= LZW_TABLE_SIZE {
                    return Err(anyhow!("lzw: code table overflow"));
                }
                table.prefix[next_token as usize] = old_token;
                table.append[next_token as usize] = last_char;
                next_token += 1;
                old_token = token;
            }
        }
    }
    Ok(())
}

/// Compressor producing streams that `decompress_lzw` accepts, for fixtures
#[cfg(test)]
pub fn compress_lzw(input: &[u8]) -> Vec<u8> {
    use std::collections::HashMap;

    struct Writer { out: Vec<u8>, acc: u64, count: u32 }
    impl Writer {
        fn put(&mut self, code: u32, num_bits: u32) {
            self.acc |= (code as u64) << self.count;
            self.count += num_bits;
            while self.count >= 8 {
                self.out.push(self.acc as u8);
                self.acc >>= 8;
                self.count -= 8;
            }
        }
        fn finish(mut self) -> Vec<u8> {
            if self.count > 0 { self.out.push(self.acc as u8); }
            self.out
        }
    }

    // Tracks the decoder's code counter so widths change in lockstep
    struct Encoder { w: Writer, num_bits: u32, dec_next: u32, after_reset: bool }
    impl Encoder {
        fn emit(&mut self, code: u32) {
            self.w.put(code, self.num_bits);
            if self.after_reset {
                self.after_reset = false;
                return;
            }
            if self.dec_next > lzw_max_codes(self.num_bits) && self.num_bits + 1 < LZW_BITS_MAX {
                self.num_bits += 1;
            }
            self.dec_next += 1;
        }
    }

    let mut enc = Encoder{ w: Writer{ out: Vec::new(), acc: 0, count: 0 }, num_bits: LZW_BITS_INITIAL,
        dec_next: LZW_TOKEN_END_OF_STREAM, after_reset: false };
    enc.w.put(LZW_TOKEN_RESET, LZW_BITS_INITIAL);

    let mut dict: HashMap<(u32, u8), u32> = HashMap::new();
    let mut next = LZW_TOKEN_INITIAL;
    let mut current: Option<u32> = None;
    for &c in input {
        let prefix = match current {
            None => { current = Some(c as u32); continue; },
            Some(p) => p,
        };
        if let Some(&code) = dict.get(&(prefix, c)) {
            current = Some(code);
            continue;
        }
        enc.emit(prefix);
        dict.insert((prefix, c), next);
        next += 1;
        current = Some(c as u32);
        if next >= 1 << (LZW_BITS_MAX - 1) {
            enc.w.put(LZW_TOKEN_RESET, enc.num_bits);
            enc.num_bits = LZW_BITS_INITIAL;
            enc.dec_next = LZW_TOKEN_INITIAL;
            enc.after_reset = true;
            dict.clear();
            next = LZW_TOKEN_INITIAL;
        }
    }
    if let Some(p) = current {
        enc.emit(p);
    }
    let num_bits = enc.num_bits;
    enc.w.put(LZW_TOKEN_END_OF_STREAM, num_bits);
    enc.w.finish()
}
