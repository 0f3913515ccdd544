pub mod api;
pub mod dead_letters;
pub mod public;
