/// Fixed-capacity FIFO window over the most recent values.
///
/// Backed by a ring buffer: once full, every push overwrites the oldest slot
/// and hands the evicted value back to the caller.
#[derive(Debug, Clone)]
pub struct Window {
    data: Vec<f64>,
    head: usize,
    capacity: usize,
}

impl Window {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.data.len() == self.capacity
    }

    /// Append a value, returning the evicted one if the window was full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        if self.capacity == 0 {
            return Some(value);
        }
        if self.data.len() < self.capacity {
            self.data.push(value);
            None
        } else {
            let evicted = std::mem::replace(&mut self.data[self.head], value);
            self.head = (self.head + 1) % self.capacity;
            Some(evicted)
        }
    }

    pub fn latest(&self) -> Option<f64> {
        if self.data.is_empty() {
            return None;
        }
        let idx = if self.data.len() < self.capacity {
            self.data.len() - 1
        } else {
            (self.head + self.capacity - 1) % self.capacity
        };
        Some(self.data[idx])
    }

    /// Value at a window-relative position, 0 being the oldest.
    pub fn get(&self, index: usize) -> Option<f64> {
        if index >= self.data.len() {
            return None;
        }
        let start = if self.data.len() < self.capacity { 0 } else { self.head };
        Some(self.data[(start + index) % self.data.len()])
    }

    /// Values in chronological order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + Clone + '_ {
        let (newer, older) = self.data.split_at(self.head);
        older.iter().chain(newer.iter()).copied()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.head = 0;
    }
}
