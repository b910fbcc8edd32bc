//! Shared guardrails for traversal depths and collection sizes.

// Resolution guards
pub const MAX_REEXPORT_DEPTH: usize = 32;
pub const MAX_ANCESTOR_DEPTH: usize = 64;
pub const MAX_LINK_WAVES: usize = 16;

// Parser guards
pub const MAX_PARSE_ERRORS: usize = 50;
pub const MAX_SOURCE_BYTES: u64 = 2 * 1024 * 1024;

// Scan guards
pub const MIN_PACKAGE_FILES: i64 = 0;
pub const MAX_PACKAGE_FILES: i64 = 50_000;
pub const MAX_SCAN_WORKERS: i64 = 64;

pub fn clamp_int(value: i64, minimum: i64, maximum: i64) -> i64 {
    value.max(minimum).min(maximum)
}

pub fn clamp_workers(value: i64) -> usize {
    clamp_int(value, 1, MAX_SCAN_WORKERS) as usize
}

pub fn clamp_package_files(value: i64) -> usize {
    clamp_int(value, MIN_PACKAGE_FILES, MAX_PACKAGE_FILES) as usize
}
