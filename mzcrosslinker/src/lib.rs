mod args;
mod driver;
mod progress;
mod types;
mod write;

pub use args::*;
pub use driver::{MZCrossLinker, MZCrossLinkerError};
pub use progress::ProgressRecord;
pub use write::PsmRecord;
