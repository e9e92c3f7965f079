use heapless::Deque;

/// Fixed-capacity FIFO with oldest-first eviction.
///
/// Storage is inline; nothing allocates after construction.
#[derive(Clone)]
pub struct Ring<T: Copy, const N: usize> {
    slots: Deque<T, N>,
}

impl<T: Copy, const N: usize> Ring<T, N> {
    pub fn new() -> Self {
        Self {
            slots: Deque::new(),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.is_full()
    }

    /// Append at the tail, evicting and returning the oldest item when full.
    pub fn push_back(&mut self, value: T) -> Option<T> {
        let evicted = if self.slots.is_full() {
            self.slots.pop_front()
        } else {
            None
        };
        // Room was made above, so the push cannot be refused.
        let _ = self.slots.push_back(value);
        evicted
    }

    /// Append at the tail unless full, handing the value back on refusal.
    pub fn try_push_back(&mut self, value: T) -> Result<(), T> {
        self.slots.push_back(value)
    }

    pub fn pop_front(&mut self) -> Option<T> {
        self.slots.pop_front()
    }

    pub fn front(&self) -> Option<&T> {
        self.slots.front()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Items oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots.iter()
    }

    /// Move every item, oldest first, into `dst`; leaves the ring empty.
    ///
    /// Returns the number of items moved, bounded by `dst.len()`. Items that
    /// do not fit are discarded.
    pub fn drain_into(&mut self, dst: &mut [T]) -> usize {
        let mut moved = 0;
        while let Some(value) = self.slots.pop_front() {
            if moved < dst.len() {
                dst[moved] = value;
                moved += 1;
            }
        }
        moved
    }
}

impl<T: Copy, const N: usize> Default for Ring<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + std::fmt::Debug, const N: usize> std::fmt::Debug for Ring<T, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
