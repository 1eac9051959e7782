use super::{MAX_MATCH, MIN_MATCH, WINDOW_SIZE};

const HASH_BITS: u32 = 15;
const HASH_SIZE: usize = 1 << HASH_BITS;

/// Zero marks an empty chain slot; real positions are stored plus one.
const NIL: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token {
    Literal(u8),
    Match { length: u16, distance: u16 },
}

/// How hard the match finder looks at one compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Effort {
    /// Candidates examined per position.
    pub(crate) max_chain: usize,
    /// A match this long ends the search early.
    pub(crate) nice_length: usize,
    /// Defer a match by one byte when the next position matches longer.
    pub(crate) lazy: bool,
}

impl Effort {
    /// Search effort for levels 1 to 9; level 0 doesn't search.
    pub(crate) fn for_level(level: u8) -> Option<Self> {
        let (max_chain, nice_length, lazy) = match level {
            0 => return None,
            1 => (4, 8, false),
            2 => (8, 16, false),
            3 => (16, 32, false),
            4 => (16, 32, true),
            5 => (32, 64, true),
            6 => (128, 128, true),
            7 => (256, 128, true),
            8 => (1024, MAX_MATCH, true),
            _ => (4096, MAX_MATCH, true),
        };
        Some(Self {
            max_chain,
            nice_length,
            lazy,
        })
    }
}

/// Hash chains over a buffer that only ever grows at the end and is trimmed
/// at the front by [`Matcher::slide`].
#[derive(Debug)]
pub(crate) struct Matcher {
    head: Vec<u32>,
    prev: Vec<u32>,
    /// Every position before this one is in the chains.
    inserted: usize,
}

impl Matcher {
    pub(crate) fn new() -> Self {
        Self {
            head: vec![NIL; HASH_SIZE],
            prev: Vec::new(),
            inserted: 0,
        }
    }

    fn hash(data: &[u8], position: usize) -> usize {
        let key = (data[position] as u32) << 16
            | (data[position + 1] as u32) << 8
            | data[position + 2] as u32;
        (key.wrapping_mul(0x9e37_79b1) >> (32 - HASH_BITS)) as usize
    }

    fn insert_until(&mut self, data: &[u8], end: usize) {
        while self.inserted < end && self.inserted + MIN_MATCH <= data.len() {
            let position = self.inserted;
            let hash = Self::hash(data, position);
            if self.prev.len() <= position {
                self.prev.resize(position + 1, NIL);
            }
            self.prev[position] = self.head[hash];
            self.head[hash] = position as u32 + 1;
            self.inserted += 1;
        }
    }

    /// Longest earlier match for `position`, not reaching past `end`.
    fn longest_match(
        &self,
        data: &[u8],
        position: usize,
        end: usize,
        effort: Effort,
    ) -> Option<(usize, usize)> {
        let max_length = MAX_MATCH.min(end - position);
        if max_length < MIN_MATCH {
            return None;
        }
        let target = &data[position..position + max_length];
        let mut best = (MIN_MATCH - 1, 0);
        let mut candidate = self.head[Self::hash(data, position)];
        let mut chain = effort.max_chain;
        while candidate != NIL && chain > 0 {
            let start = candidate as usize - 1;
            let distance = position - start;
            if distance > WINDOW_SIZE {
                break;
            }
            // Only candidates that beat the best so far are worth comparing.
            if data[start + best.0] == target[best.0.min(max_length - 1)] {
                let length = data[start..]
                    .iter()
                    .zip(target)
                    .take_while(|(a, b)| a == b)
                    .count();
                if length > best.0 {
                    best = (length, distance);
                    if length >= effort.nice_length || length == max_length {
                        break;
                    }
                }
            }
            candidate = self.prev[start];
            chain -= 1;
        }
        (best.0 >= MIN_MATCH).then_some(best)
    }

    /// Splits `data[start..end]` into literals and back-references into
    /// anything before it that is still within the window.
    pub(crate) fn tokenize(
        &mut self,
        data: &[u8],
        start: usize,
        end: usize,
        effort: Effort,
    ) -> Vec<Token> {
        let mut tokens = Vec::with_capacity((end - start) / 2);
        let mut position = start;
        while position < end {
            self.insert_until(data, position);
            let Some((mut length, mut distance)) = self.longest_match(data, position, end, effort)
            else {
                tokens.push(Token::Literal(data[position]));
                position += 1;
                continue;
            };
            if effort.lazy && length < effort.nice_length && position + 1 < end {
                self.insert_until(data, position + 1);
                if let Some(next) = self.longest_match(data, position + 1, end, effort) {
                    if next.0 > length {
                        tokens.push(Token::Literal(data[position]));
                        position += 1;
                        (length, distance) = next;
                    }
                }
            }
            tokens.push(Token::Match {
                length: length as u16,
                distance: distance as u16,
            });
            position += length;
        }
        self.insert_until(data, end);
        tokens
    }

    /// Forgets the first `shift` bytes of the buffer; every stored position
    /// moves down with it.
    pub(crate) fn slide(&mut self, shift: usize) {
        let rebase = |slot: &mut u32| {
            *slot = if *slot as usize > shift {
                *slot - shift as u32
            } else {
                NIL
            };
        };
        self.head.iter_mut().for_each(rebase);
        self.prev.drain(..shift.min(self.prev.len()));
        self.prev.iter_mut().for_each(rebase);
        self.inserted = self.inserted.saturating_sub(shift);
    }
}
