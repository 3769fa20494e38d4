use parking_lot::RwLock;
use std::sync::Arc;

use super::error::{RecordError, RecordResult};
use super::schema::TupleDesc;
use super::tuple::{RecordId, Tuple};
use crate::file::PageId;
use crate::lock::TransactionId;

/// A page shared between the buffer pool cache and its callers
pub type PageRef = Arc<RwLock<HeapPage>>;

/// Slotted heap page.
///
/// Layout: `[occupancy bitmap][slot 0][slot 1]...[zero padding]`. Slot `i` is
/// occupied when bit `i % 8` of bitmap byte `i / 8` is set.
#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: PageId,
    desc: Arc<TupleDesc>,
    data: Vec<u8>,
    num_slots: usize,
    header_size: usize,
    dirty: Option<TransactionId>,
    before_image: Arc<[u8]>,
}

impl HeapPage {
    /// Number of tuple slots that fit on a page: each slot costs its bytes
    /// plus one header bit.
    pub fn slots_per_page(page_size: usize, tuple_size: usize) -> usize {
        if tuple_size == 0 {
            return 0;
        }
        (page_size * 8) / (tuple_size * 8 + 1)
    }

    /// Bitmap bytes needed for `num_slots` slots
    pub fn header_size(num_slots: usize) -> usize {
        num_slots.div_ceil(8)
    }

    /// Parse a page from its on-disk bytes. The page size is `data.len()`.
    pub fn new(pid: PageId, data: Vec<u8>, desc: Arc<TupleDesc>) -> RecordResult<Self> {
        let page_size = data.len();
        let num_slots = Self::slots_per_page(page_size, desc.tuple_size());
        if num_slots == 0 {
            return Err(RecordError::TupleTooLarge {
                tuple_size: desc.tuple_size(),
                page_size,
            });
        }

        let before_image: Arc<[u8]> = data.clone().into();
        Ok(Self {
            pid,
            desc,
            data,
            num_slots,
            header_size: Self::header_size(num_slots),
            dirty: None,
            before_image,
        })
    }

    /// A page with every slot free
    pub fn empty(pid: PageId, desc: Arc<TupleDesc>, page_size: usize) -> RecordResult<Self> {
        Self::new(pid, vec![0u8; page_size], desc)
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn page_size(&self) -> usize {
        self.data.len()
    }

    /// Raw page bytes, exactly as they are written to disk
    pub fn page_data(&self) -> &[u8] {
        &self.data
    }

    /// Get the number of slots in this page
    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Check if a slot is used
    pub fn is_slot_used(&self, slot: usize) -> bool {
        if slot >= self.num_slots {
            return false;
        }
        (self.data[slot / 8] & (1 << (slot % 8))) != 0
    }

    fn set_slot_used(&mut self, slot: usize, used: bool) {
        if used {
            self.data[slot / 8] |= 1 << (slot % 8);
        } else {
            self.data[slot / 8] &= !(1 << (slot % 8));
        }
    }

    /// Get the number of free slots
    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots)
            .filter(|&slot| !self.is_slot_used(slot))
            .count()
    }

    /// First free slot scanning the bitmap, None if the page is full
    pub fn first_free_slot(&self) -> Option<usize> {
        (0..self.num_slots).find(|&slot| !self.is_slot_used(slot))
    }

    fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        let tuple_size = self.desc.tuple_size();
        let start = self.header_size + slot * tuple_size;
        start..start + tuple_size
    }

    /// Place `tuple` into the first free slot on behalf of `tid`.
    /// On success the tuple carries its new record id.
    pub fn insert_tuple(&mut self, tid: TransactionId, tuple: &mut Tuple) -> RecordResult<RecordId> {
        if tuple.tuple_desc().as_ref() != self.desc.as_ref() {
            return Err(RecordError::SchemaMismatch(format!(
                "Tuple schema does not match page {}",
                self.pid
            )));
        }
        let slot = self.first_free_slot().ok_or(RecordError::PageFull(self.pid))?;
        let bytes = tuple.serialize()?;

        // Become dirty before touching the bytes so the before-image is the
        // pre-modification content
        self.mark_dirty(true, tid);
        let range = self.slot_range(slot);
        self.data[range].copy_from_slice(&bytes);
        self.set_slot_used(slot, true);

        let rid = RecordId::new(self.pid, slot);
        tuple.set_record_id(Some(rid));
        Ok(rid)
    }

    /// Free the slot `tuple` occupies on this page.
    pub fn delete_tuple(&mut self, tid: TransactionId, tuple: &mut Tuple) -> RecordResult<()> {
        let rid = tuple.record_id().ok_or(RecordError::MissingRecordId)?;
        if rid.page_id != self.pid || rid.slot >= self.num_slots {
            return Err(RecordError::InvalidSlot(rid.page_id, rid.slot));
        }
        if !self.is_slot_used(rid.slot) {
            return Err(RecordError::SlotNotOccupied(rid.page_id, rid.slot));
        }

        self.mark_dirty(true, tid);
        self.set_slot_used(rid.slot, false);
        tuple.set_record_id(None);
        Ok(())
    }

    /// Decode the tuple in `slot`
    pub fn tuple(&self, slot: usize) -> RecordResult<Tuple> {
        if slot >= self.num_slots {
            return Err(RecordError::InvalidSlot(self.pid, slot));
        }
        if !self.is_slot_used(slot) {
            return Err(RecordError::SlotNotOccupied(self.pid, slot));
        }

        let mut tuple = Tuple::deserialize(&self.data[self.slot_range(slot)], self.desc.clone())?;
        tuple.set_record_id(Some(RecordId::new(self.pid, slot)));
        Ok(tuple)
    }

    /// Decode every occupied slot in slot order
    pub fn tuples(&self) -> RecordResult<Vec<Tuple>> {
        (0..self.num_slots)
            .filter(|&slot| self.is_slot_used(slot))
            .map(|slot| self.tuple(slot))
            .collect()
    }

    /// Record (or clear) the transaction that last dirtied this page.
    /// The clean-to-dirty transition snapshots the current bytes.
    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        if dirty {
            if self.dirty.is_none() {
                self.before_image = self.data.clone().into();
            }
            self.dirty = Some(tid);
        } else {
            self.dirty = None;
        }
    }

    /// The transaction that dirtied the page, None when clean
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirty
    }

    /// Page bytes as of the last clean state
    pub fn before_image(&self) -> Arc<[u8]> {
        self.before_image.clone()
    }

    /// The before-image decoded as a page
    pub fn before_image_page(&self) -> RecordResult<HeapPage> {
        HeapPage::new(self.pid, self.before_image.to_vec(), self.desc.clone())
    }

    /// Take a fresh snapshot of the current bytes
    pub fn set_before_image(&mut self) {
        self.before_image = self.data.clone().into();
    }
}
