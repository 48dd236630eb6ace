pub mod ban;
pub mod config;
pub mod kick;
pub mod mute;
pub(crate) mod shared;
pub mod unban;
pub mod unmute;
pub mod warn;
