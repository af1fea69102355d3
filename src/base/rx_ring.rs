use std::cmp::min;

/// Fixed ring buffer the background receiver writes into.
///
/// The writer advances `head`, the parser advances `tail`. Storage is
/// allocated once on construction, writing and reading never allocate.
///
/// # Example
///
/// ```rust
/// # use rplidar_mapper::RxRing;
/// let mut ring = RxRing::with_capacity(8);
/// let head = ring.write(&[0, 1, 2, 3, 4, 5]);
/// ring.consume_to(head);
/// let head = ring.write(&[6, 7, 8, 9]);
/// assert_eq!(ring.pending(head), (&[6u8, 7][..], &[8u8, 9][..]));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RxRing {
    buf: Vec<u8>,
    head: usize,
    tail: usize,
}

impl RxRing {
    /// Creates a new `RxRing` holding `capacity` bytes. A zero capacity is raised to one.
    pub fn with_capacity(capacity: usize) -> RxRing {
        RxRing {
            buf: vec![0; capacity.max(1)],
            head: 0,
            tail: 0,
        }
    }

    /// Returns the total capacity of the buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Position of the oldest byte not yet handed to the parser.
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Copies at most `capacity` bytes of `data` at the write position,
    /// wrapping at the end of storage. Returns the new write position.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let data = &data[..min(data.len(), self.buf.len())];

        let first = min(self.buf.len() - self.head, data.len());
        self.buf[self.head..self.head + first].copy_from_slice(&data[..first]);
        let rest = data.len() - first;
        self.buf[..rest].copy_from_slice(&data[first..]);

        self.head = (self.head + data.len()) % self.buf.len();
        self.head
    }

    /// Bytes between the parse position and `head`, as the segment up to the end of
    /// storage followed by the segment from its start. `head == tail` is read as a
    /// write that filled the whole ring.
    pub fn pending(&self, head: usize) -> (&[u8], &[u8]) {
        let head = head % self.buf.len();
        if head > self.tail {
            (&self.buf[self.tail..head], &[])
        } else {
            (&self.buf[self.tail..], &self.buf[..head])
        }
    }

    /// Marks everything up to `head` as parsed.
    pub fn consume_to(&mut self, head: usize) {
        self.tail = head % self.buf.len();
    }

    /// Drops unparsed bytes.
    pub fn discard(&mut self) {
        self.tail = self.head;
    }
}
