//! Unused CSS removal.
//!
//! Selector tokens are extracted from content (HTML bodies, scripts, CSS
//! reference text), then every stylesheet rule whose selectors are not
//! evidenced by those tokens is removed. Retained rules are emitted from
//! their original text, so purging never reorders or rewrites what it keeps
//! and purging twice gives the same result as purging once.
//!
//! # Example
//!
//! ```
//! use purge_engine::{ContentSource, CssSource, Extractor, Purger};
//!
//! let purger = Purger::default();
//! let output = purger
//!     .purge(
//!         &[ContentSource::Raw {
//!             text: r#"<body><p class="used">hi</p></body>"#.to_string(),
//!             extractor: Extractor::HtmlBody,
//!         }],
//!         &[CssSource::Raw(".used{color:red}.unused{color:blue}".to_string())],
//!     )
//!     .unwrap();
//!
//! assert_eq!(output.results[0].css, ".used{color:red}");
//! ```

mod error;
mod extractor;
mod markup;
mod purge;
mod purger;
mod safelist;
mod selector;

pub use error::PurgeError;
pub use extractor::{extract_words, ExtractError, Extractor, ExtractorTable, TokenSet};
pub use markup::{MarkupError, MarkupEvent, MarkupScanner, Tag};
pub use purge::{PurgeStats, PurgedCss};
pub use purger::{
    ContentScan, ContentSource, CssSource, PurgeOptions, PurgeOutput, PurgeResult, Purger,
    SkippedContent,
};
pub use safelist::Safelist;
pub use selector::{parse_selector_list, AttributeOp, Requirement, Selector};
