use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use tracing::{debug, warn};

use super::{
    error::{ConfigError, KernelError},
    state::{PageId, Pid, ProcessTable},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eviction {
    pub page: PageId,
    pub victim: Pid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub granted: Vec<PageId>,
    pub evicted: Vec<Eviction>,
}

/// Fixed pool of page slots with strict FIFO replacement.
#[derive(Debug)]
pub struct PageStore {
    capacity: usize,
    free: VecDeque<PageId>,
    owners: FxHashMap<PageId, Pid>,
    // Every owned page, oldest allocation first
    eviction_order: VecDeque<PageId>,
}

impl PageStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            free: (0..capacity).collect(),
            owners: FxHashMap::default(),
            eviction_order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn with_memory(total_memory: usize, page_size: usize) -> Result<Self, ConfigError> {
        if page_size == 0 || page_size > total_memory {
            return Err(ConfigError::PageSize {
                total_memory,
                page_size,
            });
        }
        Ok(Self::new(total_memory / page_size))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn owned_count(&self) -> usize {
        self.owners.len()
    }

    pub fn is_free(&self, page: PageId) -> bool {
        self.free.contains(&page)
    }

    pub fn owner_of(&self, page: PageId) -> Option<Pid> {
        self.owners.get(&page).copied()
    }

    pub fn eviction_order(&self) -> impl Iterator<Item = (PageId, Pid)> + '_ {
        self.eviction_order
            .iter()
            .filter_map(|page| self.owners.get(page).map(|pid| (*page, *pid)))
    }

    // All or nothing: a failed request evicts no page
    pub fn allocate(
        &mut self,
        table: &mut ProcessTable,
        pid: Pid,
        count: usize,
    ) -> Result<Allocation, KernelError> {
        if count > self.capacity {
            return Err(ConfigError::PageCount {
                requested: i64::try_from(count).unwrap_or(i64::MAX),
                capacity: self.capacity,
            }
            .into());
        }

        let shortfall = count.saturating_sub(self.free.len());
        let evictable = self
            .eviction_order
            .iter()
            .filter(|page| self.owners.get(page) != Some(&pid))
            .count();
        if evictable < shortfall {
            return Err(KernelError::InsufficientMemory {
                requested: count,
                available: self.free.len() + evictable,
            });
        }

        let mut evicted = Vec::with_capacity(shortfall);
        while self.free.len() < count {
            let Some(eviction) = self.evict_oldest(table, pid) else {
                break;
            };
            evicted.push(eviction);
        }
        debug_assert!(self.free.len() >= count, "Eviction source exhausted early");

        let mut granted = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(page) = self.free.pop_front() else {
                break;
            };
            self.owners.insert(page, pid);
            self.eviction_order.push_back(page);
            granted.push(page);
        }

        if let Some(record) = table.record_mut(pid) {
            record.pages_held.extend(granted.iter().copied());
        }

        debug!(pid, pages = ?granted, evicted = evicted.len(), "Pages allocated");
        Ok(Allocation { granted, evicted })
    }

    // Oldest page not owned by `requester`
    fn evict_oldest(&mut self, table: &mut ProcessTable, requester: Pid) -> Option<Eviction> {
        let pos = self
            .eviction_order
            .iter()
            .position(|page| self.owners.get(page) != Some(&requester))?;
        let page = self.eviction_order.remove(pos)?;
        let victim = self.owners.remove(&page)?;

        if let Some(record) = table.record_mut(victim) {
            record.pages_held.remove(&page);
            if record.memory_starved() {
                warn!(
                    pid = victim,
                    held = record.pages_held.len(),
                    requested = record.pages_requested,
                    "Process is memory-starved"
                );
            }
        }

        self.free.push_back(page);
        warn!(page, victim, requester, "Page reclaimed");
        Some(Eviction { page, victim })
    }

    pub fn release(&mut self, table: &mut ProcessTable, pid: Pid) -> usize {
        let mut pages: Vec<PageId> = self
            .owners
            .iter()
            .filter(|&(_, owner)| *owner == pid)
            .map(|(page, _)| *page)
            .collect();
        pages.sort_unstable();

        for page in &pages {
            self.owners.remove(page);
            self.free.push_back(*page);
        }
        self.eviction_order
            .retain(|page| self.owners.contains_key(page));

        if let Some(record) = table.record_mut(pid) {
            record.pages_held.clear();
        }

        if !pages.is_empty() {
            debug!(pid, released = pages.len(), "Pages released");
        }
        pages.len()
    }
}
