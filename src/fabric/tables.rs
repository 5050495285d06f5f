// src/fabric/tables.rs

/// Typed forwarding-table containers. Route tables (LPRT/MPRT/SSDT/MSDT) map
/// a CID or SID to a set of route entries; VCAT tables map a VC to up to
/// eight per-action cells.

use std::collections::{BTreeMap, BTreeSet};

/// One route: the VC action selector, the deroute hop flag and the egress
/// port identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RouteEntry {
    pub vc_action: u8,
    pub hop_count: u8,
    pub egress: u32,
}

/// The routes for a single CID/SID key. Entries are a set: writing the same
/// route twice collapses, and the minimum hop count is kept across writes.
#[derive(Debug, Clone)]
pub struct RouteSet {
    pub mhc: u8,
    pub entries: BTreeSet<RouteEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    pub sets: BTreeMap<u16, RouteSet>,
}

impl RouteTable {
    pub fn insert(&mut self, key: u16, mhc: u8, entry: RouteEntry) {
        let set = self.sets.entry(key).or_insert_with(|| RouteSet {
            mhc,
            entries: BTreeSet::new(),
        });
        set.mhc = set.mhc.min(mhc);
        set.entries.insert(entry);
    }

    pub fn get(&self, key: u16) -> Option<&RouteSet> {
        self.sets.get(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// One VCAT cell: which VCs an action may move the packet onto, and the
/// credit threshold at which the entry becomes active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VcatCell {
    pub mask: u16,
    pub threshold: u8,
}

/// VC -> action -> cell. Rows are sparse here; the serializer densifies them
/// to the eight hardware slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VcatTable {
    pub rows: BTreeMap<u8, BTreeMap<u8, VcatCell>>,
}

impl VcatTable {
    /// Set a cell, or report the previously assigned cell if it disagrees.
    pub fn try_set(&mut self, vc: u8, action: u8, cell: VcatCell) -> Result<(), VcatCell> {
        let row = self.rows.entry(vc).or_default();
        match row.get(&action) {
            Some(existing) if *existing != cell => Err(*existing),
            _ => {
                row.insert(action, cell);
                Ok(())
            }
        }
    }

    pub fn cell(&self, vc: u8, action: u8) -> Option<&VcatCell> {
        self.rows.get(&vc).and_then(|row| row.get(&action))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
