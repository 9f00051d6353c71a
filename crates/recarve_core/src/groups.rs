//! Bounded-size output groups.
//!
//! Recovered files are spread over sub-directories of the output base so no
//! single directory collects more than `files_per_group` of them.

use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const DEFAULT_FILES_PER_GROUP: usize = 4;

/// How new group ids are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupNaming {
    /// Random UUID v4 in 32-digit hex form.
    #[default]
    Random,
    /// `group-0001`, `group-0002`, ... for reproducible output trees.
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryGroup {
    id: String,
    location: PathBuf,
    file_count: usize,
}

impl RecoveryGroup {
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn location(&self) -> &Path {
        &self.location
    }

    #[inline]
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.file_count
    }
}

/// Result of one allocation: the group the next file goes to, and whether it
/// was opened by this call.
#[derive(Debug)]
pub struct Allocation<'g> {
    pub group: &'g RecoveryGroup,
    pub created: bool,
}

#[derive(Debug)]
pub struct GroupAllocator {
    base: PathBuf,
    files_per_group: usize,
    naming: GroupNaming,
    current: Option<RecoveryGroup>,
    files_allocated: u64,
    groups_created: u64,
}

impl GroupAllocator {
    /// `files_per_group` of zero is treated as one.
    pub fn new(base: impl Into<PathBuf>, files_per_group: usize, naming: GroupNaming) -> Self {
        Self {
            base: base.into(),
            files_per_group: files_per_group.max(1),
            naming,
            current: None,
            files_allocated: 0,
            groups_created: 0,
        }
    }

    /// Assigns the next recovered file to a group.
    ///
    /// A new group is opened whenever the number of files allocated so far
    /// is a multiple of `files_per_group`, including the very first call.
    pub fn allocate(&mut self) -> Allocation<'_> {
        let created =
            self.current.is_none() || self.files_allocated % self.files_per_group as u64 == 0;
        let mut group = match self.current.take() {
            Some(group) if !created => group,
            _ => {
                self.groups_created += 1;
                let id = self.next_id();
                RecoveryGroup {
                    location: self.base.join(&id),
                    id,
                    file_count: 0,
                }
            }
        };
        self.files_allocated += 1;
        group.file_count += 1;

        let group = self.current.insert(group);
        Allocation {
            group: &*group,
            created,
        }
    }

    fn next_id(&self) -> String {
        match self.naming {
            GroupNaming::Random => Uuid::new_v4().simple().to_string(),
            GroupNaming::Sequential => format!("group-{:04}", self.groups_created),
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<&RecoveryGroup> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn groups_created(&self) -> u64 {
        self.groups_created
    }
}
