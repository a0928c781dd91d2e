//! Per-table on-disk layout (§6).
//!
//! ```text
//! <db_root>/<table>/<column>/{Base,Tail}/<page_index>
//! ```
//!
//! Each page file is the raw byte image of one [`PhysicalPage`]: base pages
//! are always written in full (4096 bytes); tail pages are truncated to
//! `num_items * CELL` bytes so a partially-filled page doesn't pretend to
//! hold more records than it does.

use std::fs;
use std::path::{Path, PathBuf};

use crate::common::error::Result;
use crate::common::rid::PageKind;

use super::physical_page::PhysicalPage;

pub struct TableDisk {
    root: PathBuf,
}

impl TableDisk {
    /// `root` is the table's own directory (`<db_root>/<table>`); it and
    /// every column/kind subdirectory are created lazily as pages are
    /// written.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, column: usize, kind: PageKind) -> PathBuf {
        self.root.join(column.to_string()).join(kind.to_string())
    }

    fn page_path(&self, column: usize, kind: PageKind, page_index: usize) -> PathBuf {
        self.kind_dir(column, kind).join(page_index.to_string())
    }

    pub fn save_page(
        &self,
        column: usize,
        kind: PageKind,
        page_index: usize,
        page: &PhysicalPage,
    ) -> Result<()> {
        let dir = self.kind_dir(column, kind);
        fs::create_dir_all(&dir)?;
        let bytes = match kind {
            PageKind::Base => page.full_bytes(),
            PageKind::Tail => page.live_bytes(),
        };
        fs::write(self.page_path(column, kind, page_index), bytes)?;
        Ok(())
    }

    pub fn load_page(
        &self,
        column: usize,
        kind: PageKind,
        page_index: usize,
        num_items: usize,
    ) -> Result<PhysicalPage> {
        let bytes = fs::read(self.page_path(column, kind, page_index))?;
        Ok(PhysicalPage::from_bytes(&bytes, num_items))
    }

    pub fn page_exists(&self, column: usize, kind: PageKind, page_index: usize) -> bool {
        self.page_path(column, kind, page_index).exists()
    }

    /// Remove the whole table directory tree (used by `drop_table`).
    pub fn remove_all(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }
}
