mod runtime;
mod scheduler;
mod sequence;

pub use runtime::{Runtime, SystemRuntime, Task, TaskHandle, TaskQueue, VirtualRuntime};
pub use scheduler::{OnEnd, PlaybackState, Player};
pub use sequence::Sequence;
