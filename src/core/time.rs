use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub(crate) fn format_offset(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

pub(crate) fn format_optional(value: Option<OffsetDateTime>) -> Option<String> {
    value.map(format_offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn format_offset_preserves_offset() {
        let shifted = datetime!(2025-03-01 10:20:30 UTC).to_offset(time::macros::offset!(-3));
        assert_eq!(format_offset(shifted), "2025-03-01T07:20:30-03:00");
    }

    #[test]
    fn missing_dates_stay_missing() {
        assert_eq!(format_optional(None), None);
        assert_eq!(
            format_optional(Some(datetime!(2025-03-01 00:00 UTC))),
            Some("2025-03-01T00:00:00Z".to_string())
        );
    }
}
