//! Index-based intrusive doubly-linked list
//!
//! Nodes live in a [`Slab`] and carry their own [`Links`]; a [`List`] only
//! stores head, tail and length. One node may be linked into at most one
//! list at a time. Both the engine's alive/blocked sets and the LRU recency
//! order are built on the same `push_front`/`remove` pair, so head and tail
//! updates follow a single code path for every list.

use crate::slot::Slab;

/// Intrusive links stored inside each node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Links {
    prev: Option<u32>,
    next: Option<u32>,
}

impl Links {
    #[inline]
    pub fn prev(&self) -> Option<u32> {
        self.prev
    }

    #[inline]
    pub fn next(&self) -> Option<u32> {
        self.next
    }
}

/// Implemented by slab values that can be linked into a [`List`]
pub trait Linked {
    fn links(&self) -> &Links;
    fn links_mut(&mut self) -> &mut Links;
}

/// Head/tail bookkeeping for one list
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct List {
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

#[inline]
fn links_of<T: Linked>(slab: &mut Slab<T>, index: u32) -> Option<&mut Links> {
    slab.get_mut(index).map(Linked::links_mut)
}

impl List {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub fn head(&self) -> Option<u32> {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> Option<u32> {
        self.tail
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Link `index` in front of the current head
    ///
    /// The node's previous links are overwritten; it must not be a member of
    /// any list. Returns false if `index` is not occupied.
    pub fn push_front<T: Linked>(&mut self, slab: &mut Slab<T>, index: u32) -> bool {
        let old_head = self.head;
        match links_of(slab, index) {
            Some(links) => {
                links.prev = None;
                links.next = old_head;
            }
            None => return false,
        }

        match old_head.and_then(|h| links_of(slab, h)) {
            Some(links) => links.prev = Some(index),
            None => self.tail = Some(index),
        }
        self.head = Some(index);
        self.len += 1;
        true
    }

    /// Unlink `index` from this list
    ///
    /// Returns false (and changes nothing) if the node is missing or is
    /// clearly not a member. The caller is responsible for never removing a
    /// node through a list it is not linked into.
    pub fn remove<T: Linked>(&mut self, slab: &mut Slab<T>, index: u32) -> bool {
        let links = match slab.get(index) {
            Some(node) => *node.links(),
            None => return false,
        };
        if links.prev.is_none() && self.head != Some(index) {
            return false;
        }

        match links.prev.and_then(|p| links_of(slab, p)) {
            Some(prev) => prev.next = links.next,
            None => self.head = links.next,
        }
        match links.next.and_then(|n| links_of(slab, n)) {
            Some(next) => next.prev = links.prev,
            None => self.tail = links.prev,
        }

        if let Some(node) = links_of(slab, index) {
            *node = Links::default();
        }
        self.len -= 1;
        true
    }

    /// Unlink and return the tail node
    pub fn pop_back<T: Linked>(&mut self, slab: &mut Slab<T>) -> Option<u32> {
        let tail = self.tail?;
        self.remove(slab, tail);
        Some(tail)
    }

    /// Move an already-linked node to the head
    pub fn move_to_front<T: Linked>(&mut self, slab: &mut Slab<T>, index: u32) {
        if self.head == Some(index) {
            return;
        }
        if self.remove(slab, index) {
            self.push_front(slab, index);
        }
    }

    /// Node before `index` (towards the head)
    #[inline]
    pub fn prev_of<T: Linked>(&self, slab: &Slab<T>, index: u32) -> Option<u32> {
        slab.get(index).and_then(|n| n.links().prev)
    }

    /// Walk from head to tail
    pub fn iter<'a, T: Linked>(&self, slab: &'a Slab<T>) -> Iter<'a, T> {
        Iter {
            slab,
            cursor: self.head,
            remaining: self.len,
        }
    }
}

/// Head-to-tail iterator over node indices
pub struct Iter<'a, T> {
    slab: &'a Slab<T>,
    cursor: Option<u32>,
    remaining: usize,
}

impl<'a, T: Linked> Iterator for Iter<'a, T> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        // `remaining` bounds the walk even if links were ever corrupted
        if self.remaining == 0 {
            return None;
        }
        let index = self.cursor?;
        self.cursor = self.slab.get(index).and_then(|n| n.links().next);
        self.remaining -= 1;
        Some(index)
    }
}
