/// Fixed-capacity circular storage.
///
/// Performs no locking and no blocking. Callers hold the monitor mutex and a slot permit;
/// inserting into a full buffer or removing from an empty one is an invariant breach and
/// panics.
#[derive(Debug)]
pub struct BoundedBuffer<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<T> BoundedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must be positive");
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    pub fn insert(&mut self, item: T) {
        assert!(!self.is_full(), "insert into a full buffer");
        let slot = &mut self.slots[self.head];
        debug_assert!(slot.is_none());
        *slot = Some(item);
        self.head = (self.head + 1) % self.capacity();
        self.len += 1;
    }

    pub fn remove(&mut self) -> T {
        let item = self.slots[self.tail]
            .take()
            .expect("remove from an empty buffer");
        self.tail = (self.tail + 1) % self.capacity();
        self.len -= 1;
        item
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Occupied cells.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }
}

#[cfg(test)]
mod test {
    use super::BoundedBuffer;

    #[test]
    fn wraps_around() {
        let mut buffer = BoundedBuffer::new(3);
        for round in 0..4 {
            buffer.insert(round * 10);
            buffer.insert(round * 10 + 1);
            assert_eq!(buffer.len(), 2);
            assert_eq!(buffer.remove(), round * 10);
            assert_eq!(buffer.remove(), round * 10 + 1);
            assert!(buffer.is_empty());
        }
        // 8 inserts and 8 removes on 3 cells
        assert_eq!(buffer.head(), 8 % 3);
        assert_eq!(buffer.tail(), 8 % 3);
    }

    #[test]
    fn occupancy_matches_head_and_tail() {
        let mut buffer = BoundedBuffer::new(5);
        for i in 0..4 {
            buffer.insert(i);
        }
        buffer.remove();
        let cap = buffer.capacity();
        assert_eq!((buffer.head() + cap - buffer.tail()) % cap, buffer.len());
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn full_and_empty_are_distinct_at_same_position() {
        let mut buffer = BoundedBuffer::new(2);
        buffer.insert('a');
        buffer.insert('b');
        assert_eq!(buffer.head(), buffer.tail());
        assert!(buffer.is_full());
        buffer.remove();
        buffer.remove();
        assert_eq!(buffer.head(), buffer.tail());
        assert!(buffer.is_empty());
    }

    #[test]
    #[should_panic(expected = "insert into a full buffer")]
    fn insert_into_full_panics() {
        let mut buffer = BoundedBuffer::new(1);
        buffer.insert(1);
        buffer.insert(2);
    }

    #[test]
    #[should_panic(expected = "remove from an empty buffer")]
    fn remove_from_empty_panics() {
        let mut buffer: BoundedBuffer<u8> = BoundedBuffer::new(1);
        buffer.remove();
    }
}
