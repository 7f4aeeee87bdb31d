//! Pool - bounded collection with stable slot indices
//!
//! Removing an item leaves its slot empty; no other item moves. Adjacency
//! is cyclic over the occupied slots in index order.

/// Cyclic direction through occupied slots
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Towards higher indices
    Next,
    /// Towards lower indices
    Previous,
}

#[derive(Debug)]
pub struct Pool<T> {
    slots: Vec<Option<T>>,
    capacity: usize,
    len: usize,
}

impl<T> Pool<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    /// Append `item`, reusing the lowest empty slot once the slot table is
    /// at capacity. Gives the item back when the pool is full.
    pub fn push(&mut self, item: T) -> Result<usize, T> {
        if self.is_full() {
            return Err(item);
        }
        let index = if self.slots.len() < self.capacity {
            self.slots.push(None);
            self.slots.len() - 1
        } else {
            match self.slots.iter().position(Option::is_none) {
                Some(index) => index,
                None => return Err(item),
            }
        };
        self.slots[index] = Some(item);
        self.len += 1;
        Ok(index)
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        let item = self.slots.get_mut(index)?.take()?;
        self.len -= 1;
        Some(item)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Occupied slots in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|item| (i, item)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|item| (i, item)))
    }

    pub fn indices(&self) -> Vec<usize> {
        self.iter().map(|(i, _)| i).collect()
    }

    /// The occupied slot next to `index` in `direction`, wrapping around.
    ///
    /// `index` itself need not be occupied. Returns `index` when it is the
    /// only occupied slot and `None` when the pool is empty.
    pub fn adjacent(&self, index: usize, direction: Direction) -> Option<usize> {
        let occupied = self.indices();
        match direction {
            Direction::Next => occupied
                .iter()
                .copied()
                .find(|&i| i > index)
                .or_else(|| occupied.first().copied()),
            Direction::Previous => occupied
                .iter()
                .rev()
                .copied()
                .find(|&i| i < index)
                .or_else(|| occupied.last().copied()),
        }
    }
}
