mod concurrency;
pub use concurrency::{ConcurrencyMgr, LockKind, LockTable};

mod record;
pub use record::LogRecord;

mod recovery;
pub use recovery::RecoveryMgr;

mod transaction;
pub use transaction::Transaction;
