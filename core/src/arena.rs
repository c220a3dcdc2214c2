//! Generational slot storage for rendered nodes.
//!
//! Parent links are plain indices, so the tree can hold cycles (parent ↔ child,
//! controller ↔ context) without reference counting.

/// Identifier for a rendered node.
///
/// A small, copyable handle made of a slot index and a generation counter.
/// Freed slots are reused with a bumped generation, so a stale `NodeId` never
/// aliases a different live node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32, u32);

impl NodeId {
    const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Slot storage keyed by [`NodeId`].
#[derive(Debug)]
pub(crate) struct Arena<T> {
    slots: Vec<Option<T>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.slots[idx] = Some(value);
            (idx, generation)
        } else {
            self.slots.push(Some(value));
            self.generations.push(1);
            (self.slots.len() - 1, 1)
        };
        let idx = u32::try_from(idx).expect("arena exceeded u32::MAX slots");
        NodeId(idx, generation)
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&T> {
        if self.generations.get(id.idx()) != Some(&id.1) {
            return None;
        }
        self.slots.get(id.idx()).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        if self.generations.get(id.idx()) != Some(&id.1) {
            return None;
        }
        self.slots.get_mut(id.idx()).and_then(Option::as_mut)
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Option<T> {
        if !self.contains(id) {
            return None;
        }
        let value = self.slots[id.idx()].take();
        self.free_list.push(id.idx());
        value
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_ids_do_not_alias_reused_slots() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        assert_eq!(arena.remove(a), Some("a"));
        let b = arena.insert("b");
        assert_eq!(a.idx(), b.idx(), "slot should be reused");
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.remove(a), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut arena = Arena::new();
        let id = arena.insert(1);
        *arena.get_mut(id).unwrap() += 1;
        assert_eq!(arena.get(id), Some(&2));
    }
}
