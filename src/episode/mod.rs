//! Episode planning, assembly and output.

pub mod assembler;
pub mod collector;
pub mod script;
pub mod segment;
pub mod writer;

pub use assembler::{AssembledEpisode, Assembler, SegmentSpan};
pub use collector::{EpisodeInputs, ResponseInput, SegmentCollector};
pub use segment::{DialogueTurn, EpisodePlan, Segment, SegmentKind, SegmentSource};
pub use writer::{EpisodeWriter, RenderedEpisode};
