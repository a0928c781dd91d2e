//! Logical page — one column-group of physical pages.
//!
//! A logical page groups `5 + M` [`PhysicalPage`]s (five metadata columns
//! plus `M` user columns) that together hold one page's worth of records
//! for either the base space or the tail space of a table. Base and tail
//! logical pages share this same physical shape; only the meaning callers
//! give the metadata columns differs (§3).

use crate::common::config::{
    BASE_RID_COLUMN, INDIRECTION_COLUMN, NONE_RID, RID_COLUMN, SCHEMA_ENCODING_COLUMN,
    TIMESTAMP_COLUMN, USER_COLUMN_START,
};
use crate::common::error::Result;

use super::physical_page::PhysicalPage;

/// A full record projection: every metadata column plus the user columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordView {
    pub indirection: i64,
    pub rid: i64,
    pub timestamp: i64,
    pub schema_encoding: i64,
    pub base_rid: i64,
    pub columns: Vec<i64>,
}

/// Column-group of physical pages. `num_columns` is `M`, the user column
/// count; `physical_pages.len()` is always `USER_COLUMN_START + num_columns`.
pub struct LogicalPage {
    num_columns: usize,
    physical_pages: Vec<PhysicalPage>,
}

impl LogicalPage {
    pub fn new(num_columns: usize) -> Self {
        let total = USER_COLUMN_START + num_columns;
        Self {
            num_columns,
            physical_pages: (0..total).map(|_| PhysicalPage::new()).collect(),
        }
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    #[inline]
    pub fn total_columns(&self) -> usize {
        self.physical_pages.len()
    }

    #[inline]
    pub fn has_capacity(&self) -> bool {
        self.physical_pages[0].has_capacity()
    }

    #[inline]
    pub fn num_records(&self) -> usize {
        self.physical_pages[0].num_items()
    }

    pub fn physical_page(&self, column: usize) -> &PhysicalPage {
        &self.physical_pages[column]
    }

    /// Replace the physical page backing `column` wholesale. Used by merge
    /// to swap in a deep-copied, updated base column image (§4.8).
    pub fn replace_physical_page(&mut self, column: usize, page: PhysicalPage) {
        self.physical_pages[column] = page;
    }

    /// Append a base record: `(INDIRECTION = -1, RID = rid, TIMESTAMP = ts,
    /// SCHEMA = 0, BASE_RID = -1, user cols...)`.
    pub fn insert_base_record(&mut self, rid: i64, timestamp: i64, columns: &[i64]) -> Result<usize> {
        self.physical_pages[INDIRECTION_COLUMN].write(NONE_RID)?;
        self.physical_pages[RID_COLUMN].write(rid)?;
        self.physical_pages[TIMESTAMP_COLUMN].write(timestamp)?;
        self.physical_pages[SCHEMA_ENCODING_COLUMN].write(0)?;
        self.physical_pages[BASE_RID_COLUMN].write(NONE_RID)?;
        for (i, &value) in columns.iter().enumerate() {
            self.physical_pages[USER_COLUMN_START + i].write(value)?;
        }
        Ok(self.num_records() - 1)
    }

    /// Append a tail record. `columns` entries of `None` are stored as `0`
    /// (§4.3 — "null user column values are stored as 0").
    pub fn append_tail_record(
        &mut self,
        rid: i64,
        indirection: i64,
        timestamp: i64,
        schema_encoding: i64,
        base_rid: i64,
        columns: &[Option<i64>],
    ) -> Result<usize> {
        self.physical_pages[INDIRECTION_COLUMN].write(indirection)?;
        self.physical_pages[RID_COLUMN].write(rid)?;
        self.physical_pages[TIMESTAMP_COLUMN].write(timestamp)?;
        self.physical_pages[SCHEMA_ENCODING_COLUMN].write(schema_encoding)?;
        self.physical_pages[BASE_RID_COLUMN].write(base_rid)?;
        for (i, value) in columns.iter().enumerate() {
            self.physical_pages[USER_COLUMN_START + i].write(value.unwrap_or(0))?;
        }
        Ok(self.num_records() - 1)
    }

    /// Read a full record projection at `slot`.
    pub fn read_record(&self, slot: usize) -> Result<RecordView> {
        let columns = (0..self.num_columns)
            .map(|i| self.physical_pages[USER_COLUMN_START + i].read(slot))
            .collect::<Result<Vec<_>>>()?;
        Ok(RecordView {
            indirection: self.physical_pages[INDIRECTION_COLUMN].read(slot)?,
            rid: self.physical_pages[RID_COLUMN].read(slot)?,
            timestamp: self.physical_pages[TIMESTAMP_COLUMN].read(slot)?,
            schema_encoding: self.physical_pages[SCHEMA_ENCODING_COLUMN].read(slot)?,
            base_rid: self.physical_pages[BASE_RID_COLUMN].read(slot)?,
            columns,
        })
    }

    /// In-place update of one column at `slot`; never extends `num_items`.
    pub fn set_value(&mut self, slot: usize, column: usize, value: i64) -> Result<()> {
        self.physical_pages[column].update(slot, value)
    }

    pub fn update_indirection(&mut self, slot: usize, value: i64) -> Result<()> {
        self.set_value(slot, INDIRECTION_COLUMN, value)
    }
}
