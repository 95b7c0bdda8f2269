//! Second-chance page replacement.
//!
//! Resident pages sit in a ring stored as an arena of nodes linked by index.
//! The hand remembers the node it points at and the node before it, so new
//! pages can be linked in right behind the hand: a freshly loaded page is
//! the last one the hand reaches and survives at least one full sweep.

use log::debug;

use crate::constants::Pid;

/// Identifies one resident page: the owning address space and the page number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResidentPage {
    pub space: Pid,
    pub page: usize,
}

/// Access to the referenced bits the clock sweeps over
pub trait ReferenceBits {
    /// Return the page's referenced bit and clear it
    fn take_referenced(&mut self, page: &ResidentPage) -> bool;
}

#[derive(Debug, Clone)]
struct Node {
    page: ResidentPage,
    next: usize,
}

#[derive(Debug, Clone, Copy)]
struct Hand {
    prev: usize,
    current: usize,
}

#[derive(Debug, Default)]
pub struct Clock {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    hand: Option<Hand>,
    len: usize,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Link a page in right behind the hand
    pub fn insert(&mut self, page: ResidentPage) {
        let index = self.alloc(page);
        match self.hand {
            Some(hand) => {
                self.node_mut(hand.prev).next = index;
                self.node_mut(index).next = hand.current;
                self.hand = Some(Hand { prev: index, current: hand.current });
            }
            None => {
                self.node_mut(index).next = index;
                self.hand = Some(Hand { prev: index, current: index });
            }
        }
        self.len += 1;
    }

    /// Sweep from the hand, clearing referenced bits, and unlink the first
    /// page found unreferenced. The hand moves on to its successor.
    pub fn select_victim<B: ReferenceBits>(&mut self, bits: &mut B) -> Option<ResidentPage> {
        let mut hand = self.hand?;

        while bits.take_referenced(&self.node(hand.current).page) {
            hand.prev = hand.current;
            hand.current = self.node(hand.current).next;
        }

        let victim = hand.current;
        let page = self.node(victim).page;

        if hand.current == hand.prev {
            self.hand = None;
        } else {
            let next = self.node(victim).next;
            self.node_mut(hand.prev).next = next;
            hand.current = next;
            self.hand = Some(hand);
        }
        self.release(victim);
        self.len -= 1;

        debug!("clock: evicting page {} of process {}", page.page, page.space);
        Some(page)
    }

    /// Pages in the order the hand will visit them
    pub fn pages(&self) -> Vec<ResidentPage> {
        let mut pages = Vec::with_capacity(self.len);
        if let Some(hand) = self.hand {
            let mut index = hand.current;
            for _ in 0..self.len {
                let node = self.node(index);
                pages.push(node.page);
                index = node.next;
            }
        }
        pages
    }

    /// Keep only the pages matching `keep`, preserving ring order and the
    /// hand position. Used when an address space goes away.
    pub fn retain(&mut self, keep: impl Fn(&ResidentPage) -> bool) {
        let kept: Vec<ResidentPage> = self.pages().into_iter().filter(|p| keep(p)).collect();
        if kept.len() == self.len {
            return;
        }

        self.nodes.clear();
        self.free.clear();
        self.hand = None;
        self.len = 0;

        // inserting behind the hand in visit order rebuilds the same ring
        for page in kept {
            self.insert(page);
        }
    }

    fn alloc(&mut self, page: ResidentPage) -> usize {
        let node = Some(Node { page, next: 0 });
        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = node;
                index
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, index: usize) {
        self.nodes[index] = None;
        self.free.push(index);
    }

    fn node(&self, index: usize) -> &Node {
        self.nodes[index].as_ref().expect("clock ring links a freed node")
    }

    fn node_mut(&mut self, index: usize) -> &mut Node {
        self.nodes[index].as_mut().expect("clock ring links a freed node")
    }
}
