pub mod reactionrole;
