pub mod notifier;
pub mod queue;

pub use notifier::QueuePositionNotifier;
pub use queue::QueueService;
