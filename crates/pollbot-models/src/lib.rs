pub mod message;
pub mod poll;

pub use message::{ChatEvent, IncomingMessage};
pub use poll::{Poll, PollMode, PollRef, Tally, Vote};
