//! Built-in crawling collaborators
//!
//! This module contains the default HTTP and crawling layer used when a scan
//! is built from configuration alone:
//! - `HttpClient`: reqwest-backed fetcher and concurrent request runner
//! - `HtmlSpider`: breadth-first link walker over the scan target
//! - HTML parsing and link extraction

mod fetcher;
mod parser;
mod spider;

pub use fetcher::{build_http_client, HttpClient};
pub use parser::{parse_html, ParsedPage};
pub use spider::HtmlSpider;
