pub mod profiles;
pub mod rewrite;
