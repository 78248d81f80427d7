//! Non-volatile storage boundary.
//!
//! Two magic-guarded regions: the identity keypair and the node location.
//! The trait reads whole regions; callers interpret the bytes and treat a
//! bad magic as absence. Implementations are free to relocate the regions as
//! long as the contents round-trip.

use crate::errors::StorageError;

/// A persisted region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Identity keypair: `0xC5 || public(32) || private(64)`.
    Identity,
    /// Location: `0x4C4F (BE) || lat i32 (BE) || lon i32 (BE)`.
    Location,
}

/// Key-value style persistent storage (the EEPROM of the firmware).
pub trait NvStorage {
    /// Read a region's bytes, `None` when never written.
    fn read(&mut self, region: Region) -> Option<Vec<u8>>;

    /// Persist a region.
    ///
    /// # Errors
    ///
    /// [`StorageError::Write`] when the backing store fails. Callers log and
    /// continue; a node that cannot persist still repeats.
    fn write(&mut self, region: Region, data: &[u8]) -> Result<(), StorageError>;
}
