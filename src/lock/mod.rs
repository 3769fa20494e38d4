//! Page-level two-phase locking.

mod lock_manager;
mod transaction;

pub use lock_manager::LockManager;
pub use transaction::TransactionId;

/// Lock strength held on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Access level requested with every page fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    /// The lock needed to access a page with this permission
    pub fn lock_mode(self) -> LockMode {
        match self {
            Permission::ReadOnly => LockMode::Shared,
            Permission::ReadWrite => LockMode::Exclusive,
        }
    }
}
