mod log_mgr;
pub use log_mgr::Log;

mod iterator;
pub use iterator::LogIterator;
