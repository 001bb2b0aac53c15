pub mod assignments;
pub mod parse;
pub mod status;
