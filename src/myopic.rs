//! Rolling-horizon ("myopic") runs.
//!
//! Rather than optimising the whole horizon at once, we solve a chain of overlapping windows.
//! Decisions for the first few periods of each window are committed to the store, and become the
//! existing capacity for the next window.
pub mod efficiency;
pub mod index;
pub mod sequencer;

pub use efficiency::IntroducedIn;
pub use index::{MyopicIndex, build_windows};
pub use sequencer::MyopicSequencer;
