use std::fmt;

/// FIFO ring of point indices for region growing. An index is accepted at
/// most once over the queue's lifetime, so `n` slots never overflow.
pub struct Queue {
    data: Box<[usize]>,
    seen: Vec<bool>,
    start: usize,
    size: usize,
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("head", &self.start)
            .field("size", &self.size)
            .field("seen", &self.seen.iter().filter(|&&s| s).count())
            .finish()
    }
}

impl Queue {
    /// Queue over the indices `0..n`.
    pub fn new(n: usize) -> Self {
        Self {
            data: vec![0; n].into_boxed_slice(),
            seen: vec![false; n],
            start: 0,
            size: 0,
        }
    }

    /// Records `index` as handled without queueing it. Returns `false` if it
    /// was already seen.
    pub fn mark(&mut self, index: usize) -> bool {
        !std::mem::replace(&mut self.seen[index], true)
    }

    /// Queues `index` unless it was seen before.
    pub fn push(&mut self, index: usize) {
        if !self.mark(index) {
            return;
        }
        let capacity = self.data.len();
        self.data[(self.start + self.size) % capacity] = index;
        self.size += 1;
    }

    pub fn pop(&mut self) -> Option<usize> {
        (self.size > 0).then(|| {
            let value = self.data[self.start];
            self.start += 1;
            if self.start == self.data.len() {
                self.start = 0;
            }
            self.size -= 1;
            value
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Queue;

    #[test]
    fn test_queue() {
        let mut queue = Queue::new(4);
        queue.push(1);
        queue.push(2);
        queue.push(1);
        assert_eq!(queue.pop(), Some(1));
        queue.push(3);
        queue.push(2);
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), None);
        queue.push(0);
        assert_eq!(queue.pop(), Some(0));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_queue_mark() {
        let mut queue = Queue::new(3);
        assert!(queue.mark(2));
        assert!(!queue.mark(2));
        queue.push(2);
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_queue_wraps_every_index_once() {
        let mut queue = Queue::new(3);
        for i in [0, 1, 2] {
            queue.push(i);
            assert_eq!(queue.pop(), Some(i));
        }
        for i in [2, 1, 0] {
            queue.push(i);
        }
        assert_eq!(queue.pop(), None);
    }
}
