use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

use super::error::DomainError;

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[day padding:none] [month repr:long] [year]");
pub const ISO_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// Number of characters shown when a post is referenced by its text.
pub const EXCERPT_CHARS: usize = 15;

/// Trim user-supplied post text and reject blank bodies.
pub fn normalize_text(field: &'static str, raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "This field is required."));
    }
    Ok(trimmed.to_string())
}

/// Leading characters of a post, used as the detail page title.
pub fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

pub fn format_human_date(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(HUMAN_DATE_FORMAT)
        .unwrap_or_else(|_| timestamp.date().to_string())
}

pub fn format_iso_date(timestamp: OffsetDateTime) -> String {
    timestamp
        .to_offset(time::UtcOffset::UTC)
        .format(ISO_DATE_FORMAT)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn normalize_text_trims_and_rejects_blank() {
        assert_eq!(normalize_text("text", "  hello \n").unwrap(), "hello");
        let err = normalize_text("text", " \t ").expect_err("blank rejected");
        assert_eq!(err.field(), "text");
    }

    #[test]
    fn excerpt_counts_characters_not_bytes() {
        assert_eq!(excerpt("Тестовый пост для проверки"), "Тестовый пост д");
        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn human_date_uses_long_month() {
        let ts = datetime!(2022-11-05 10:30 UTC);
        assert_eq!(format_human_date(ts), "5 November 2022");
        assert_eq!(format_iso_date(ts), "2022-11-05T10:30:00Z");
    }
}
