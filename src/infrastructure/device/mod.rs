//! Device session implementations

mod replay;

pub use replay::{
    ReplayResponse, ReplayScript, ReplaySession, ReplaySessionProvider, TranscriptEntry,
};
