//! Acquisition engines implemented in the core
//!
//! The static engine needs an HTTP client and an HTML parser and lives in
//! `pagewatch-fetch-http`. The rendered engine only needs the abstract
//! [`Renderer`](crate::traits::Renderer), so its algorithm lives here.

pub mod rendered;
pub mod sleeper;

pub use rendered::{DOCUMENT_ROOT, RenderedAcquirer};
pub use sleeper::{Sleeper, TokioSleeper};

/// Collapse runs of whitespace to single spaces and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a\n\n b\t c  "), "a b c");
        assert_eq!(collapse_whitespace(" \n "), "");
    }
}
