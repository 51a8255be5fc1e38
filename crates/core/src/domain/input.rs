// Input line parsing

use crate::domain::error::{DomainError, Result};
use crate::domain::job::JobType;

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInput {
    pub keyword: String,
    /// Present for source-batch lines only
    pub source_url: Option<String>,
}

impl ItemInput {
    /// Parse a raw line according to the job type.
    ///
    /// Keywords-batch: the trimmed line is the keyword.
    /// Source-batch: `keyword|url`, or a bare http(s) url which doubles as keyword.
    pub fn parse(job_type: JobType, raw: &str) -> Result<Self> {
        let line = raw.trim();
        if line.is_empty() {
            return Err(DomainError::EmptyInputLine);
        }

        match job_type {
            JobType::KeywordsBatch => Ok(Self {
                keyword: line.to_string(),
                source_url: None,
            }),
            JobType::SourceBatch => {
                let (keyword, url) = match line.split_once('|') {
                    Some((keyword, url)) => (keyword.trim(), url.trim()),
                    None => (line, line),
                };
                if !is_http_url(url) {
                    return Err(DomainError::MalformedSourceLine(line.to_string()));
                }
                let keyword = if keyword.is_empty() { url } else { keyword };
                Ok(Self {
                    keyword: keyword.to_string(),
                    source_url: Some(url.to_string()),
                })
            }
        }
    }
}

fn is_http_url(s: &str) -> bool {
    let rest = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.contains(char::is_whitespace))
}
