use std::fmt;

/// Marker: a shared grant. Any number may be outstanding on a key at once.
#[derive(Debug)]
pub struct ReadLocked;

/// Marker: an exclusive grant. Waits for, and is waited on by, every other
/// grant outstanding on the key when it is admitted.
#[derive(Debug)]
pub struct WriteLocked;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockModeKind {
    Read,
    Write,
}

impl LockModeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for LockModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait LockMode: Send + Sync + 'static {
    const MODE: LockModeKind;
}

impl LockMode for ReadLocked {
    const MODE: LockModeKind = LockModeKind::Read;
}

impl LockMode for WriteLocked {
    const MODE: LockModeKind = LockModeKind::Write;
}
