pub mod availability;
pub mod conflict;
pub mod index;

pub use availability::AvailabilityService;
pub use conflict::ConflictDetector;
pub use index::CalendarIndex;
