pub mod extract;
pub mod generate;
pub mod parse_output;
pub mod validate;
