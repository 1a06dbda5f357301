pub mod poll;
pub mod profile;
