pub mod member_join;
pub mod reaction_roles;
