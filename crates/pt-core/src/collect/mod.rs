//! Process collection: the platform probe boundary, the snapshot data
//! model, and the scan loop that diffs successive probe results.

pub mod probe;
pub mod scanner;
pub mod snapshot;

pub use probe::{MockProbe, PlatformProbe};
pub use scanner::{CancelToken, ChangeSet, Scanner};
pub use snapshot::{ProcessSnapshot, ProcessState};
