/// Read position in an LSB-first bitstream.
///
/// The cursor doesn't own its input; the inflator hands it the same growing
/// buffer on every call. It is `Copy` so a multi-field read can checkpoint it
/// and roll back when the input runs out partway through.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BitCursor {
    /// Next input byte not yet loaded into `buffer`.
    pub(crate) position: usize,
    buffer: u64,
    count: u32,
}

impl BitCursor {
    fn load(&mut self, input: &[u8], wanted: u32) {
        while self.count < wanted {
            let Some(&byte) = input.get(self.position) else {
                return;
            };
            self.buffer |= (byte as u64) << self.count;
            self.count += 8;
            self.position += 1;
        }
    }

    /// Takes `n` bits (at most 32), or `None` without moving if the input is
    /// too short.
    pub(crate) fn bits(&mut self, input: &[u8], n: u32) -> Option<u32> {
        self.load(input, n);
        if self.count < n {
            return None;
        }
        let value = (self.buffer & ((1u64 << n) - 1)) as u32;
        self.buffer >>= n;
        self.count -= n;
        Some(value)
    }

    /// Up to `n` upcoming bits, zero-padded, plus how many of them are real.
    pub(crate) fn peek(&mut self, input: &[u8], n: u32) -> (u32, u32) {
        self.load(input, n);
        let value = (self.buffer & ((1u64 << n) - 1)) as u32;
        (value, self.count.min(n))
    }

    pub(crate) fn consume(&mut self, n: u32) {
        debug_assert!(n <= self.count);
        self.buffer >>= n;
        self.count -= n;
    }

    /// Drops the bits left in a partially read byte.
    pub(crate) fn align(&mut self) {
        self.consume(self.count % 8);
    }

    /// Whole bytes loaded into the bit buffer but not yet read.
    pub(crate) fn buffered_bytes(&self) -> u32 {
        self.count / 8
    }

    /// Byte-aligned bulk read straight from the input. Only valid when no
    /// bits are buffered.
    pub(crate) fn take_aligned<'a>(&mut self, input: &'a [u8], max: usize) -> &'a [u8] {
        debug_assert_eq!(self.count, 0);
        let start = self.position.min(input.len());
        let end = start + max.min(input.len() - start);
        self.position = end;
        &input[start..end]
    }
}

/// Packs bits into bytes LSB first, as DEFLATE wants them.
#[derive(Debug, Default)]
pub(crate) struct BitWriter {
    out: Vec<u8>,
    buffer: u64,
    count: u32,
}

impl BitWriter {
    pub(crate) fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32);
        self.buffer |= ((value as u64) & ((1u64 << n) - 1)) << self.count;
        self.count += n;
        while self.count >= 8 {
            self.out.push(self.buffer as u8);
            self.buffer >>= 8;
            self.count -= 8;
        }
    }

    /// Pads the current byte with zero bits.
    pub(crate) fn align(&mut self) {
        if self.count > 0 {
            self.out.push(self.buffer as u8);
            self.buffer = 0;
            self.count = 0;
        }
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) {
        self.align();
        self.out.extend_from_slice(bytes);
    }

    /// Complete bytes ready to hand out.
    pub(crate) fn available(&self) -> usize {
        self.out.len()
    }

    pub(crate) fn take(&mut self, max: usize) -> Vec<u8> {
        let count = max.min(self.out.len());
        self.out.drain(..count).collect()
    }
}

/// Reverses the low `length` bits of `code`. Huffman codes are defined
/// MSB-first but packed LSB-first.
pub(crate) fn reverse_bits(code: u16, length: u8) -> u16 {
    if length == 0 {
        return 0;
    }
    code.reverse_bits() >> (16 - length as u32)
}
