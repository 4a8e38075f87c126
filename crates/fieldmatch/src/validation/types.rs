//! Typed interpretation of field values.

use chrono::{DateTime, NaiveDate};

use crate::template::model::FieldType;
use crate::value::FieldValue;

/// Accepted calendar date layouts, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%d %b %Y"];

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

pub fn parse_bool(value: &FieldValue) -> Option<bool> {
    match value {
        FieldValue::Number(n) if *n == 0.0 => Some(false),
        FieldValue::Number(n) if *n == 1.0 => Some(true),
        FieldValue::Number(_) => None,
        FieldValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
    }
}

/// Checks that `value` parses as `field_type`, returning a message otherwise.
pub fn check_type(field_type: FieldType, value: &FieldValue) -> Result<(), String> {
    let ok = match field_type {
        FieldType::Text => true,
        FieldType::Number => value.as_number().is_some(),
        FieldType::Date => match value {
            FieldValue::Text(s) => parse_date(s).is_some(),
            FieldValue::Number(_) => false,
        },
        FieldType::Boolean => parse_bool(value).is_some(),
    };

    if ok {
        Ok(())
    } else {
        let expected = match field_type {
            FieldType::Text => "text",
            FieldType::Number => "a number",
            FieldType::Date => "a date",
            FieldType::Boolean => "a boolean",
        };
        Err(format!("expected {}, got '{}'", expected, value.as_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_layouts() {
        for text in [
            "2026-03-01",
            "2026/03/01",
            "03/01/2026",
            "01.03.2026",
            "01 Mar 2026",
            "2026-03-01T08:30:00Z",
        ] {
            assert_eq!(
                parse_date(text),
                NaiveDate::from_ymd_opt(2026, 3, 1),
                "failed on {text}"
            );
        }
        assert!(parse_date("yesterday").is_none());
        assert!(parse_date("2026-13-01").is_none());
    }

    #[test]
    fn test_bool_values() {
        assert_eq!(parse_bool(&"Yes".into()), Some(true));
        assert_eq!(parse_bool(&"n".into()), Some(false));
        assert_eq!(parse_bool(&FieldValue::Number(1.0)), Some(true));
        assert_eq!(parse_bool(&FieldValue::Number(2.0)), None);
        assert_eq!(parse_bool(&"maybe".into()), None);
    }

    #[test]
    fn test_check_type() {
        assert!(check_type(FieldType::Number, &"1,234.50".into()).is_ok());
        assert!(check_type(FieldType::Number, &"heavy".into()).is_err());
        assert!(check_type(FieldType::Date, &FieldValue::Number(20260301.0)).is_err());
        assert!(check_type(FieldType::Text, &FieldValue::Number(1.0)).is_ok());
    }
}
