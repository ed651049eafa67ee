use std::collections::{HashSet, VecDeque};

/// Insertion-ordered id queue with O(1) membership, optionally bounded.
///
/// A bounded queue evicts its oldest id when a push exceeds capacity.
/// Pushing an id already present moves it to the back.
#[derive(Debug, Clone, Default)]
pub struct IdQueue {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: Option<usize>,
}

impl IdQueue {
    pub fn bounded(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
            capacity: Some(capacity),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Append `id`, returning the id evicted to stay within capacity.
    pub fn push(&mut self, id: String) -> Option<String> {
        if self.members.contains(&id) {
            self.order.retain(|existing| existing != &id);
        } else {
            self.members.insert(id.clone());
        }
        self.order.push_back(id);

        match self.capacity {
            Some(capacity) if self.order.len() > capacity => {
                let evicted = self.order.pop_front()?;
                self.members.remove(&evicted);
                Some(evicted)
            }
            _ => None,
        }
    }

    pub fn pop_front(&mut self) -> Option<String> {
        let id = self.order.pop_front()?;
        self.members.remove(&id);
        Some(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn members(&self) -> &HashSet<String> {
        &self.members
    }

    /// Ids oldest first
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}
