/// LSB-first bit reader with a 32-bit refill window
pub struct Streamer<'a> {
    data: &'a [u8],
    pos: usize,
    buffer: u64,
    count: u32,
}

impl<'a> Streamer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Streamer{ data, pos: 0, buffer: 0, count: 0 }
    }

    fn refill(&mut self) {
        while self.count <= 24 && self.pos < self.data.len() {
            self.buffer |= (self.data[self.pos] as u64) << self.count;
            self.pos += 1;
            self.count += 8;
        }
    }

    /// Returns `None` only once every input bit has been consumed; a partial
    /// final code is zero-padded.
    pub fn get_bits_lsb(&mut self, num_bits: u32) -> Option<u32> {
        self.refill();
        if self.count == 0 {
            return None;
        }
        let value = (self.buffer & ((1 << num_bits) - 1)) as u32;
        self.buffer >>= num_bits;
        self.count = self.count.saturating_sub(num_bits);
        Some(value)
    }

    pub fn end_of_stream(&self) -> bool {
        self.count == 0 && self.pos >= self.data.len()
    }
}
