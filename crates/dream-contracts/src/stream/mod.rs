mod events;
mod framer;
mod reducer;

pub use events::StreamEvent;
pub use framer::LineFramer;
pub use reducer::{reduce_chunks, StreamPhase, StreamReducer, TerminalState};
