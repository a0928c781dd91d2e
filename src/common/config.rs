//! Layout constants for the storage engine.
//!
//! These mirror the fixed column layout every table uses: five metadata
//! columns followed by the table's user columns, all packed as 8-byte
//! signed integers inside 4 KiB physical pages.

use std::time::Duration;

/// Size of a physical page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Size of one stored value (a little-endian signed 64-bit integer).
pub const CELL: usize = 8;

/// Number of value slots in one physical page.
pub const PAGE_CAPACITY: usize = PAGE_SIZE / CELL;

/// RID of newest tail version for a base record, or of the next-older tail
/// for a tail record; `-1` terminates the chain.
pub const INDIRECTION_COLUMN: usize = 0;

/// Identity of the record slot; `-1` marks the slot invalidated.
pub const RID_COLUMN: usize = 1;

/// Seconds-since-epoch timestamp recorded at write time.
pub const TIMESTAMP_COLUMN: usize = 2;

/// Bitmask over user columns: which ones this record carries a value for.
pub const SCHEMA_ENCODING_COLUMN: usize = 3;

/// Base record: RID of the newest tail consolidated into it by merge (the
/// "merge cursor"). Tail record: the base RID this tail targets.
pub const BASE_RID_COLUMN: usize = 4;

/// Index of the first user column; there are 5 metadata columns before it.
pub const USER_COLUMN_START: usize = 5;

/// Sentinel stored in INDIRECTION, RID, and BASE_RID to mean "none" /
/// "invalidated".
pub const NONE_RID: i64 = -1;

/// How often the background merge thread wakes to check for pending tail
/// records.
pub const MERGE_PERIOD: Duration = Duration::from_secs(1);

/// Upper bound on how many tail pages one merge pass consolidates, so a
/// single cycle can't stall query threads behind an unbounded scan.
pub const MERGE_TAIL_PAGE_BUDGET: usize = 15;
