//! History stacks.
//!
//! A [`WalkableStack`] is never empty and its cursor always points at a valid
//! entry. Pushing drops everything after the cursor before appending, so a
//! new entry after stepping back discards the redo history.

/// An action together with the state it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange<A, S> {
    pub action: A,
    pub result: S,
}

impl<A, S> StateChange<A, S> {
    pub fn new(action: A, result: S) -> Self {
        Self { action, result }
    }
}

#[derive(Debug, Clone)]
pub struct WalkableStack<T> {
    storage: Vec<T>,
    index: usize,
}

impl<T> WalkableStack<T> {
    pub fn new(initial: T) -> Self {
        Self {
            storage: vec![initial],
            index: 0,
        }
    }
    pub fn current(&self) -> &T {
        &self.storage[self.index]
    }
    pub fn push(&mut self, item: T) {
        self.storage.truncate(self.index + 1);
        self.storage.push(item);
        self.index = self.storage.len() - 1;
    }
    /// Steps towards the start. Returns false at the first entry.
    pub fn back(&mut self) -> bool {
        if self.is_at_start() {
            return false;
        }
        self.index -= 1;
        true
    }
    /// Steps towards the end. Returns false at the last entry.
    pub fn forward(&mut self) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.index += 1;
        true
    }
    pub fn is_at_start(&self) -> bool {
        self.index == 0
    }
    pub fn is_at_end(&self) -> bool {
        self.index + 1 == self.storage.len()
    }
    /// Drops everything but the first entry.
    pub fn clear(&mut self) {
        self.storage.truncate(1);
        self.index = 0;
    }
    /// Replaces the whole history with a single entry.
    pub fn reset(&mut self, initial: T) {
        self.storage.clear();
        self.storage.push(initial);
        self.index = 0;
    }
    pub fn index(&self) -> usize {
        self.index
    }
    pub fn len(&self) -> usize {
        self.storage.len()
    }
    pub fn is_empty(&self) -> bool {
        false
    }
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.storage.iter()
    }
}

/// Undo/redo history of state changes.
pub type UndoStack<S, A> = WalkableStack<StateChange<A, S>>;
