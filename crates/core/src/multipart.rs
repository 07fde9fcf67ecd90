//! Multipart upload planning
//!
//! Decides when an upload is split and how the parts are laid out. The
//! transfer engine does the actual part I/O.

use crate::provider::ProviderKind;

/// Minimum part size: 5 MiB (S3 requirement)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size: 5 GiB
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts: 10,000 (S3 limit)
pub const MAX_PARTS: usize = 10_000;

/// Multipart upload configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartConfig {
    /// Files of at least this many bytes are uploaded in parts
    pub threshold: u64,

    /// Part size in bytes
    pub part_size: u64,

    /// Number of parts in flight at once
    pub concurrency: usize,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self::for_provider(ProviderKind::Custom)
    }
}

impl MultipartConfig {
    /// Tuning from the provider table
    pub fn for_provider(kind: ProviderKind) -> Self {
        let defaults = kind.defaults();
        Self {
            threshold: defaults.multipart_threshold,
            part_size: defaults.part_size,
            concurrency: 4,
        }
    }

    pub fn threshold(mut self, bytes: u64) -> Self {
        self.threshold = bytes.max(MIN_PART_SIZE);
        self
    }

    pub fn part_size(mut self, size: u64) -> Self {
        self.part_size = size.clamp(MIN_PART_SIZE, MAX_PART_SIZE);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn is_multipart(&self, file_size: u64) -> bool {
        file_size >= self.threshold
    }

    /// Part size for a file, grown when the configured size would exceed
    /// [`MAX_PARTS`]
    pub fn calculate_part_size(&self, file_size: u64) -> u64 {
        let part_size = self.part_size.max(1);
        if file_size.div_ceil(part_size) <= MAX_PARTS as u64 {
            part_size
        } else {
            file_size
                .div_ceil(MAX_PARTS as u64)
                .clamp(MIN_PART_SIZE, MAX_PART_SIZE)
        }
    }
}

/// Calculate number of parts for a file
pub fn calculate_parts(file_size: u64, part_size: u64) -> usize {
    file_size.div_ceil(part_size) as usize
}

/// Byte range `[start, end)` of a 1-based part
pub fn part_byte_range(part_number: i32, part_size: u64, total_size: u64) -> (u64, u64) {
    let start = (part_number as u64 - 1) * part_size;
    let end = (start + part_size).min(total_size);
    (start, end)
}
