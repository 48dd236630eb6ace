pub mod modlog;
pub mod muterole;
pub(crate) mod setting;
pub mod staffroles;
