pub mod text;

pub use text::{single_line, truncate_chars};
