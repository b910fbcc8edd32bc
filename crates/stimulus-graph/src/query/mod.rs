pub mod guards;
pub mod snapshot;

pub use snapshot::Snapshot;
