//! Task type tag

use core::fmt;

/// Algorithm family of an offloaded request.
///
/// Each family has its own hardware completion queue and therefore its own
/// drain function in the completion registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum TaskType {
    Cipher = 0,
    Digest = 1,
    Rsa = 2,
    Dh = 3,
    Ecc = 4,
}

impl TaskType {
    /// Number of task types
    pub const COUNT: usize = 5;

    /// Get task type as table index
    #[inline]
    pub const fn as_index(&self) -> usize {
        *self as usize
    }

    /// Get task type from table index
    #[inline]
    pub const fn from_index(idx: usize) -> Option<TaskType> {
        match idx {
            0 => Some(TaskType::Cipher),
            1 => Some(TaskType::Digest),
            2 => Some(TaskType::Rsa),
            3 => Some(TaskType::Dh),
            4 => Some(TaskType::Ecc),
            _ => None,
        }
    }

    /// Iterator over all task types in table order
    pub fn iter() -> impl Iterator<Item = TaskType> {
        [
            TaskType::Cipher,
            TaskType::Digest,
            TaskType::Rsa,
            TaskType::Dh,
            TaskType::Ecc,
        ]
        .into_iter()
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Cipher => write!(f, "cipher"),
            TaskType::Digest => write!(f, "digest"),
            TaskType::Rsa => write!(f, "rsa"),
            TaskType::Dh => write!(f, "dh"),
            TaskType::Ecc => write!(f, "ecc"),
        }
    }
}
