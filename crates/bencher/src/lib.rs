#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    filters: usize,
    payload: Payload,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, filters: usize, payload: Payload) -> Self {
        Self { name, group, filters, payload }
    }

    pub fn small(name: &'static str, filters: usize, payload: Payload) -> Self {
        Self::new(name, TestGroup::Small, filters, payload)
    }

    pub fn normal(name: &'static str, filters: usize, payload: Payload) -> Self {
        Self::new(name, TestGroup::Normal, filters, payload)
    }

    pub fn large(name: &'static str, filters: usize, payload: Payload) -> Self {
        Self::new(name, TestGroup::Large, filters, payload)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    /// Number of filters in the chain under test
    pub fn filters(&self) -> usize {
        self.filters
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// A request body sent as `chunks` equally sized data frames.
#[derive(Debug, Copy, Clone)]
pub struct Payload {
    chunk_size: usize,
    chunks: usize,
}

impl Payload {
    pub const fn new(chunk_size: usize, chunks: usize) -> Self {
        Self { chunk_size, chunks }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Total body length in bytes
    pub fn len(&self) -> usize {
        self.chunk_size * self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn chunk(&self) -> Vec<u8> {
        vec![b'x'; self.chunk_size]
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}
