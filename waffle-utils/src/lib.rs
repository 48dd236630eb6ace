/// One-shot delayed callbacks.
pub mod delay;
/// Nickname and duration formatting.
pub mod formatting;
/// Pure parser helpers.
pub mod parse;
/// Permission helper utilities.
pub mod permissions;
/// Shared time helpers.
pub mod time;

/// Single source of truth for the message-command prefix.
pub const COMMAND_PREFIX: char = '!';
