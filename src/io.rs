/// Somewhere raw PNG bytes come from.
///
/// `read` either hands back exactly `count` bytes or returns `None` without
/// consuming anything, signalling that the data hasn't arrived yet. The
/// decoder treats `None` as "try again later", never as corruption.
pub trait ByteSource {
    fn read(&mut self, count: usize) -> Option<Vec<u8>>;
}

/// Somewhere encoded bytes go.
pub trait ByteSink {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()>;
}

impl<W: std::io::Write> ByteSink for W {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.write_all(bytes)
    }
}

/// A source over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemorySource<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> MemorySource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }
}

impl ByteSource for MemorySource<'_> {
    fn read(&mut self, count: usize) -> Option<Vec<u8>> {
        let end = self.position.checked_add(count)?;
        let bytes = self.data.get(self.position..end)?.to_vec();
        self.position = end;
        Some(bytes)
    }
}
