// src/io/serial/ring.rs
//
// Fixed-capacity circular byte store. Writing into a full buffer evicts the
// oldest byte, so the buffer always holds the most recent `capacity` bytes.

/// Circular byte buffer with drop-oldest overflow.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Box<[u8]>,
    head: usize,
    tail: usize,
    count: usize,
}

impl RingBuffer {
    /// Create an empty buffer. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            data: vec![0u8; capacity.max(1)].into_boxed_slice(),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn size(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bytes that can be written before the oldest byte is evicted.
    pub fn free(&self) -> usize {
        self.capacity() - self.count
    }

    /// Append bytes, evicting the oldest byte for each byte written while full.
    pub fn write(&mut self, bytes: &[u8]) {
        let cap = self.capacity();
        for &byte in bytes {
            self.data[self.tail] = byte;
            self.tail = (self.tail + 1) % cap;
            if self.count == cap {
                self.head = (self.head + 1) % cap;
            } else {
                self.count += 1;
            }
        }
    }

    /// Copy up to `length` bytes from the head without consuming them.
    pub fn peek(&self, length: usize) -> Vec<u8> {
        let n = length.min(self.count);
        (0..n).map(|i| self.byte_at(i)).collect()
    }

    /// Discard up to `length` bytes from the head.
    pub fn consume(&mut self, length: usize) {
        let n = length.min(self.count);
        self.head = (self.head + n) % self.capacity();
        self.count -= n;
    }

    /// Offset from the head of the first occurrence of `byte`.
    pub fn index_of(&self, byte: u8) -> Option<usize> {
        (0..self.count).find(|&i| self.byte_at(i) == byte)
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }

    fn byte_at(&self, offset: usize) -> u8 {
        self.data[(self.head + offset) % self.capacity()]
    }
}
