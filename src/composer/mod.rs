pub mod composer;
pub mod document;
pub mod mention;

pub use composer::{DroppedFile, KeyInput, KeyOutcome, MentionComposer, Submission};
pub use document::{Cursor, Document, Segment};
pub use mention::MentionQuery;
