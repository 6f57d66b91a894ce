//! Raw alarm text → [`Operation`].
//!
//! Flow:
//! 1. Read source text (with retries when it comes from a file)
//! 2. Extract `PREFIX: VALUE` fields, fixing values via the replace dictionary
//! 3. Build the operation, defaulting whatever is missing

pub mod builder;
pub mod fields;
pub mod replace;
pub mod source;
pub mod street;

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

pub use builder::OperationBuilder;
pub use fields::{ExtractedFields, Field, FieldExtractor};
pub use replace::ReplaceDictionary;
pub use street::{StreetLine, analyze_street_line};

use crate::clock::Clock;
use crate::config::ReadRetryPolicy;
use crate::error::ParseError;
use crate::operation::Operation;

/// Extractor and builder bundled for alarm sources.
#[derive(Clone)]
pub struct AlarmParser {
    extractor: FieldExtractor,
    builder: OperationBuilder,
}

impl AlarmParser {
    pub fn new(replacements: ReplaceDictionary, clock: Arc<dyn Clock>) -> Self {
        Self {
            extractor: FieldExtractor::new(replacements),
            builder: OperationBuilder::new(clock),
        }
    }

    pub fn parse_lines<'a>(&self, lines: impl IntoIterator<Item = &'a str>) -> Operation {
        let fields = self.extractor.extract(lines);
        debug!(fields = fields.len(), "Extracted alarm fields");
        self.builder.build(&fields)
    }

    pub fn parse_text(&self, text: &str) -> Operation {
        self.parse_lines(text.lines())
    }

    /// Read `path` on the blocking pool (with retries) and parse it.
    pub async fn parse_file(&self, path: &Path, retry: &ReadRetryPolicy) -> Result<Operation, ParseError> {
        let lines = source::read_source_lines_blocking(path.to_path_buf(), retry.clone()).await?;
        Ok(self.parse_lines(lines.iter().map(String::as_str)))
    }
}
