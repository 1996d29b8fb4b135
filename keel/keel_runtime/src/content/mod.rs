//! Content repository implementations.
//!
//! - `InMemoryContentRepository`: for tests and short-lived processes
//! - `FileSystemContentRepository`: durable, integrity-checked storage
//! - `NoopContentRepository`: for processes that never deploy content

pub mod filesystem;
pub mod memory;
pub mod noop;

pub use filesystem::FileSystemContentRepository;
pub use memory::InMemoryContentRepository;
pub use noop::NoopContentRepository;
