mod frame;
pub use frame::Buffer;

mod pool;
pub use pool::{BufferPool, BufferRef};
