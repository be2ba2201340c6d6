/// CSV export of persisted simulation steps.
pub mod export;
