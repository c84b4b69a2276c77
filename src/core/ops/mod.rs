//! core::ops
//!
//! Run bookkeeping: the repository lock and the recovery record.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive repository lock
//! - [`recovery`] - Record of a failed run for `mirage recover`
//!
//! # Lifecycle
//!
//! A run:
//! 1. Acquires the exclusive repo lock
//! 2. Executes the transaction
//! 3. On failure: writes a recovery record naming the disposable branch
//! 4. Releases the lock on drop

pub mod lock;
pub mod recovery;

pub use lock::{LockError, RepoLock};
pub use recovery::{RecoveryError, RecoveryRecord};
