//! Prefix-based retention: keep at most N files sharing a name prefix.

use pftoolkit_common::FileRecord;

/// Retention rule for one family of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Name prefix that defines the family.
    pub prefix: String,
    /// Maximum number of files kept.
    pub max_files: usize,
}

impl RetentionPolicy {
    /// Create a new policy.
    pub fn new(prefix: impl Into<String>, max_files: usize) -> Self {
        Self {
            prefix: prefix.into(),
            max_files,
        }
    }

    /// Whether `file` belongs to the family.
    pub fn matches(&self, file: &FileRecord) -> bool {
        file.has_prefix(&self.prefix)
    }

    /// The records this policy would evict from `files`.
    ///
    /// Records outside the prefix are ignored.
    pub fn evictions(&self, files: &[FileRecord]) -> Vec<FileRecord> {
        let family: Vec<FileRecord> = files
            .iter()
            .filter(|f| self.matches(f))
            .cloned()
            .collect();
        select_evictions(family, self.max_files)
    }
}

/// Pick the oldest `files.len() - max_files` records by last-modified time.
///
/// Returns nothing when `files.len() <= max_files`. The sort is stable, so
/// records with equal timestamps keep their input order.
pub fn select_evictions(mut files: Vec<FileRecord>, max_files: usize) -> Vec<FileRecord> {
    if files.len() <= max_files {
        return Vec::new();
    }
    let excess = files.len() - max_files;
    files.sort_by(|a, b| a.last_modified.cmp(&b.last_modified));
    files.truncate(excess);
    files
}
