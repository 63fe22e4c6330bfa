pub mod allocator;
pub mod expiry;
pub mod lifecycle;

pub use allocator::AllocatorService;
pub use expiry::ExpirySweeper;
pub use lifecycle::LifecycleService;
