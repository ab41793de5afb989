//! Page retrieval and text extraction for manifest URLs.
//!
//! [`ContentFetcher`] downloads every manifest entry on a bounded pool and
//! turns each response into either readable text or a normalized failure
//! reason. Nothing here returns an error for a bad page.

mod engine;
mod extract;

pub use engine::{ContentFetcher, FetchBatch, FetchStats};
pub use extract::{html_to_text, normalize_whitespace};
