//! Secondary indexes over table columns.
//!
//! [`Index`] owns one optional [`column_index::ColumnIndex`] per column,
//! with the primary key always indexed (§4.4).

mod column_index;
#[allow(clippy::module_inception)]
mod index;

pub use column_index::ColumnIndex;
pub use index::Index;
