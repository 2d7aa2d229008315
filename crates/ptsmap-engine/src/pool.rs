//! Fixed-capacity record arena.
//!
//! All records live in one contiguous `Vec` reserved at table start. Each
//! slot carries `prev`/`next` indices and the list it currently belongs to,
//! so the free and valid lists are intrusive doubly-linked lists over the
//! same storage. Moving a record between lists is an O(1) splice and never
//! allocates.

use std::collections::TryReserveError;

use ptsmap_common::Timestamp;

/// Index of a record inside its pool.
pub type RecordId = usize;

const NIL: usize = usize::MAX;

/// One offset/timestamp correspondence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Record {
    pub offset: u32,
    pub ts: Timestamp,
}

/// The two lists a record can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Free,
    Valid,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    record: Record,
    prev: usize,
    next: usize,
    list: ListKind,
}

#[derive(Debug, Clone, Copy)]
struct ListHead {
    head: usize,
    tail: usize,
    len: usize,
}

impl ListHead {
    const EMPTY: ListHead = ListHead {
        head: NIL,
        tail: NIL,
        len: 0,
    };
}

/// Arena of records threaded onto a free list and a valid list.
#[derive(Debug)]
pub struct RecordPool {
    slots: Vec<Slot>,
    free: ListHead,
    valid: ListHead,
    moves: u64,
}

impl RecordPool {
    /// A pool holding no storage.
    pub fn empty() -> Self {
        Self {
            slots: Vec::new(),
            free: ListHead::EMPTY,
            valid: ListHead::EMPTY,
            moves: 0,
        }
    }

    /// Reserve storage for `capacity` records and thread them all onto the
    /// free list.
    pub fn with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity)?;

        for i in 0..capacity {
            slots.push(Slot {
                record: Record::default(),
                prev: if i == 0 { NIL } else { i - 1 },
                next: if i + 1 == capacity { NIL } else { i + 1 },
                list: ListKind::Free,
            });
        }

        let free = if capacity == 0 {
            ListHead::EMPTY
        } else {
            ListHead {
                head: 0,
                tail: capacity - 1,
                len: capacity,
            }
        };

        Ok(Self {
            slots,
            free,
            valid: ListHead::EMPTY,
            moves: 0,
        })
    }

    /// Drop the backing storage and both lists.
    pub fn release(&mut self) {
        self.slots = Vec::new();
        self.free = ListHead::EMPTY;
        self.valid = ListHead::EMPTY;
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn free_len(&self) -> usize {
        self.free.len
    }

    pub fn valid_len(&self) -> usize {
        self.valid.len
    }

    /// Number of list splices performed since the pool was created.
    pub fn moves(&self) -> u64 {
        self.moves
    }

    pub fn record(&self, id: RecordId) -> &Record {
        &self.slots[id].record
    }

    pub fn record_mut(&mut self, id: RecordId) -> &mut Record {
        &mut self.slots[id].record
    }

    /// Which list currently owns `id`.
    pub fn list_of(&self, id: RecordId) -> ListKind {
        self.slots[id].list
    }

    /// Oldest valid record.
    pub fn valid_head(&self) -> Option<RecordId> {
        link(self.valid.head)
    }

    /// Newest valid record.
    pub fn valid_tail(&self) -> Option<RecordId> {
        link(self.valid.tail)
    }

    /// Most recently freed record.
    pub fn free_tail(&self) -> Option<RecordId> {
        link(self.free.tail)
    }

    pub fn next(&self, id: RecordId) -> Option<RecordId> {
        link(self.slots[id].next)
    }

    pub fn prev(&self, id: RecordId) -> Option<RecordId> {
        link(self.slots[id].prev)
    }

    /// Move `id` to the tail of `target`, unlinking it from wherever it is.
    pub fn move_to_tail(&mut self, id: RecordId, target: ListKind) {
        self.unlink(id);

        let list = self.list_mut(target);
        let old_tail = list.tail;
        list.tail = id;
        if old_tail == NIL {
            list.head = id;
        }
        list.len += 1;

        if old_tail != NIL {
            self.slots[old_tail].next = id;
        }
        let slot = &mut self.slots[id];
        slot.prev = old_tail;
        slot.next = NIL;
        slot.list = target;

        self.moves += 1;
    }

    /// Iterate valid records from oldest to newest.
    pub fn iter_valid(&self) -> ValidIter<'_> {
        ValidIter {
            pool: self,
            cursor: self.valid.head,
        }
    }

    fn unlink(&mut self, id: RecordId) {
        let Slot {
            prev, next, list, ..
        } = self.slots[id];

        if prev != NIL {
            self.slots[prev].next = next;
        }
        if next != NIL {
            self.slots[next].prev = prev;
        }

        let head = self.list_mut(list);
        if head.head == id {
            head.head = next;
        }
        if head.tail == id {
            head.tail = prev;
        }
        head.len -= 1;
    }

    fn list_mut(&mut self, kind: ListKind) -> &mut ListHead {
        match kind {
            ListKind::Free => &mut self.free,
            ListKind::Valid => &mut self.valid,
        }
    }
}

fn link(raw: usize) -> Option<RecordId> {
    (raw != NIL).then_some(raw)
}

/// Iterator over the valid list, oldest first.
pub struct ValidIter<'a> {
    pool: &'a RecordPool,
    cursor: usize,
}

impl<'a> Iterator for ValidIter<'a> {
    type Item = (RecordId, &'a Record);

    fn next(&mut self) -> Option<Self::Item> {
        let id = link(self.cursor)?;
        let slot = &self.pool.slots[id];
        self.cursor = slot.next;
        Some((id, &slot.record))
    }
}
