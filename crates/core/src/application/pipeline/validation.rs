// Validation gate: a draft is published only when every check passes
use crate::application::worker::constants::MIN_TITLE_CHARS;
use crate::domain::ContentRecord;

/// Check a fully generated draft.
///
/// Returns every failed check, not just the first.
pub fn validate_record(record: &ContentRecord) -> Result<(), Vec<String>> {
    let mut reasons = Vec::new();

    let title_chars = record.title.trim().chars().count();
    if title_chars < MIN_TITLE_CHARS {
        reasons.push(format!(
            "title too short ({} chars, minimum {})",
            title_chars, MIN_TITLE_CHARS
        ));
    }
    if record.seo_title.trim().is_empty() {
        reasons.push("SEO title missing".to_string());
    }
    if record.meta_description.trim().is_empty() {
        reasons.push("meta description missing".to_string());
    }
    if record.body.trim().is_empty() {
        reasons.push("body missing".to_string());
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(reasons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_record() -> ContentRecord {
        let mut record = ContentRecord::stub("c-1", 0, "user-1", None, "rust", None);
        record.title = "A Thorough Introduction to Rust for Busy Developers".to_string();
        record.seo_title = "Rust Introduction".to_string();
        record.meta_description = "Learn Rust quickly.".to_string();
        record.body = "Body text".to_string();
        record
    }

    #[test]
    fn test_complete_record_passes() {
        assert!(validate_record(&complete_record()).is_ok());
    }

    #[test]
    fn test_short_title_fails() {
        let mut record = complete_record();
        record.title = "Short title".to_string();

        let reasons = validate_record(&record).unwrap_err();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("title too short"));
    }

    #[test]
    fn test_title_length_counts_characters_not_bytes() {
        let mut record = complete_record();
        // 39 two-byte characters: 78 bytes but still too short
        record.title = "é".repeat(MIN_TITLE_CHARS - 1);
        assert!(validate_record(&record).is_err());

        record.title = "é".repeat(MIN_TITLE_CHARS);
        assert!(validate_record(&record).is_ok());
    }

    #[test]
    fn test_all_failures_reported() {
        let mut record = complete_record();
        record.seo_title = "  ".to_string();
        record.meta_description.clear();
        record.body.clear();

        let reasons = validate_record(&record).unwrap_err();
        assert_eq!(reasons.len(), 3);
    }

    #[test]
    fn test_stub_title_never_passes() {
        let record = ContentRecord::stub("c-1", 0, "user-1", None, "rust", None);
        assert!(validate_record(&record).is_err());
    }
}
