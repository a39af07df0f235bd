//! Compile time configuration of the storage medium

use static_assertions::const_assert_eq;

/// Smallest sector size the medium may use
pub const SECTOR_SIZE_MIN: usize = 512;
/// Largest sector size the medium may use
pub const SECTOR_SIZE_MAX: usize = 512;

// Capacity queries multiply cluster counts by a single sector size,
// so variable sector sizes are not supported.
const_assert_eq!(SECTOR_SIZE_MIN, SECTOR_SIZE_MAX);

pub const SECTOR_SIZE: usize = SECTOR_SIZE_MIN;

/// Sectors kept by the sector cache of a mounted volume
pub const SECTOR_CACHE_SIZE: usize = 8;
