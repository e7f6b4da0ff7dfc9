pub mod descent;
pub mod errors;
pub mod index;

pub const CRATE_NAME: &str = "fmdescent";
