//! Outline model: markdown outline → ordered slide specs + global style

mod parser;
mod types;

pub use parser::parse_outline;
pub use types::{GlobalStyle, Outline, SlideSpec};
