//! Shared in-memory storage backend.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use embermesh_core::{NvStorage, Region, StorageError};

/// In-memory [`NvStorage`]; clones share the backing map, so a "reboot"
/// (building a second engine over the same storage) sees persisted state.
#[derive(Debug, Clone, Default)]
pub struct MemStorage {
    regions: Rc<RefCell<HashMap<Region, Vec<u8>>>>,
}

impl MemStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NvStorage for MemStorage {
    fn read(&mut self, region: Region) -> Option<Vec<u8>> {
        self.regions.borrow().get(&region).cloned()
    }

    fn write(&mut self, region: Region, data: &[u8]) -> Result<(), StorageError> {
        self.regions.borrow_mut().insert(region, data.to_vec());
        Ok(())
    }
}
