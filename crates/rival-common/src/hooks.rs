// hooks.rs -- ordered packet-hook registry
//
// Every component subscribes to packets by name with an order value and a
// fake filter. Execution is stable-sorted by (order, registration order);
// the stage constants below are conventions only, the runtime looks at
// nothing but the order value.

use std::collections::HashMap;
use std::hash::Hash;

pub const ORDER_READ_REAL: i32 = -100;
pub const ORDER_READ_ALL: i32 = -100;
pub const ORDER_MODIFY_INTERNAL: i32 = -10;
pub const ORDER_MODIFY: i32 = -5;
pub const ORDER_READ_DEST_CLASS: i32 = 95;
pub const ORDER_READ_DEST: i32 = 100;

/// Which packets a subscriber sees: real wire traffic (the default), only
/// locally synthesized packets, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FakeFilter {
    #[default]
    Real,
    Fake,
    Both,
}

impl FakeFilter {
    pub fn accepts(&self, fake: bool) -> bool {
        match self {
            FakeFilter::Real => !fake,
            FakeFilter::Fake => fake,
            FakeFilter::Both => true,
        }
    }
}

/// What a handler wants done with the packet after it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookFlow {
    Continue,
    /// Drop the packet: later subscribers still run per their filter, but
    /// the packet is not delivered downstream.
    Suppress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle {
    id: u64,
}

#[derive(Debug, Clone)]
struct Entry<H> {
    id: u64,
    order: i32,
    seq: u64,
    fake: FakeFilter,
    owner: u32,
    handler: H,
}

/// Hook registry, generic over the packet-name key and the handler token.
/// The proxy instantiates `H` with plain function pointers so a dispatch
/// snapshot is a cheap copy.
#[derive(Debug)]
pub struct HookList<N, H> {
    by_name: HashMap<N, Vec<Entry<H>>>,
    next_id: u64,
    next_seq: u64,
}

impl<N: Eq + Hash + Copy, H: Clone> Default for HookList<N, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Eq + Hash + Copy, H: Clone> HookList<N, H> {
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            next_id: 0,
            next_seq: 0,
        }
    }

    /// Register `handler` for `name`. `owner` tags the registration so a
    /// component teardown can drop every hook it installed at once.
    pub fn hook(&mut self, name: N, order: i32, fake: FakeFilter, owner: u32, handler: H) -> HookHandle {
        let id = self.next_id;
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;

        let entry = Entry { id, order, seq, fake, owner, handler };
        let list = self.by_name.entry(name).or_default();
        // keep each list sorted by (order, seq) so dispatch is a filter
        let pos = list
            .iter()
            .position(|e| (e.order, e.seq) > (order, seq))
            .unwrap_or(list.len());
        list.insert(pos, entry);
        HookHandle { id }
    }

    pub fn unhook(&mut self, handle: HookHandle) {
        for list in self.by_name.values_mut() {
            list.retain(|e| e.id != handle.id);
        }
    }

    /// Remove every hook registered under `owner`.
    pub fn unhook_owner(&mut self, owner: u32) {
        for list in self.by_name.values_mut() {
            list.retain(|e| e.owner != owner);
        }
    }

    /// Snapshot the handlers that should run for a packet of `name` with the
    /// given fake flag, in execution order.
    pub fn matching(&self, name: N, fake: bool) -> Vec<H> {
        match self.by_name.get(&name) {
            Some(list) => list
                .iter()
                .filter(|e| e.fake.accepts(fake))
                .map(|e| e.handler.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn count(&self, name: N) -> usize {
        self.by_name.get(&name).map_or(0, |l| l.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_sorts_execution() {
        let mut hooks: HookList<&str, u32> = HookList::new();
        hooks.hook("S_ACTION_STAGE", ORDER_READ_DEST, FakeFilter::Real, 0, 3);
        hooks.hook("S_ACTION_STAGE", ORDER_READ_REAL, FakeFilter::Real, 0, 1);
        hooks.hook("S_ACTION_STAGE", ORDER_MODIFY, FakeFilter::Real, 0, 2);
        assert_eq!(hooks.matching("S_ACTION_STAGE", false), vec![1, 2, 3]);
    }

    #[test]
    fn test_equal_order_keeps_registration_order() {
        let mut hooks: HookList<&str, u32> = HookList::new();
        hooks.hook("X", 0, FakeFilter::Both, 0, 1);
        hooks.hook("X", 0, FakeFilter::Both, 0, 2);
        hooks.hook("X", 0, FakeFilter::Both, 0, 3);
        assert_eq!(hooks.matching("X", true), vec![1, 2, 3]);
    }

    #[test]
    fn test_fake_filter() {
        let mut hooks: HookList<&str, u32> = HookList::new();
        hooks.hook("X", 0, FakeFilter::Real, 0, 1);
        hooks.hook("X", 0, FakeFilter::Fake, 0, 2);
        hooks.hook("X", 0, FakeFilter::Both, 0, 3);
        assert_eq!(hooks.matching("X", false), vec![1, 3]);
        assert_eq!(hooks.matching("X", true), vec![2, 3]);
    }

    #[test]
    fn test_unhook() {
        let mut hooks: HookList<&str, u32> = HookList::new();
        let h = hooks.hook("X", 0, FakeFilter::Both, 0, 1);
        hooks.hook("X", 0, FakeFilter::Both, 0, 2);
        hooks.unhook(h);
        assert_eq!(hooks.matching("X", false), vec![2]);
    }

    #[test]
    fn test_unhook_owner_drops_all() {
        let mut hooks: HookList<&str, u32> = HookList::new();
        hooks.hook("X", 0, FakeFilter::Both, 7, 1);
        hooks.hook("Y", 0, FakeFilter::Both, 7, 2);
        hooks.hook("X", 0, FakeFilter::Both, 8, 3);
        hooks.unhook_owner(7);
        assert_eq!(hooks.matching("X", false), vec![3]);
        assert_eq!(hooks.matching("Y", false), Vec::<u32>::new());
    }
}
