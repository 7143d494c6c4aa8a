//! Text codec for persisted usage records.
//!
//! A record is stored as a small HTML report that a person can open in a
//! browser. Every value sits right after a `data-field="<name>">` marker and
//! runs to the next `<`, so decoding is a scan for each known marker. A
//! missing or unreadable field falls back to its default; decoding never
//! fails as a whole.

use crate::ledger::record::UsageRecord;
use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

const FIELD_DEVICE: &str = "device";
const FIELD_SWITCH_BRAND: &str = "switch-brand";
const FIELD_SWITCH_MODEL: &str = "switch-model";
const FIELD_DAILY_CLICKS: &str = "daily-clicks";
const FIELD_TOTAL_CLICKS: &str = "total-clicks";
const FIELD_CREATED_AT: &str = "created-at";
const FIELD_LAST_CLICK_DATE: &str = "last-click-date";
const FIELD_IMAGE_PATH: &str = "image-path";
const FIELD_UPDATED_AT: &str = "updated-at";

/// Fields that carry record data, in report order.
const RECORD_FIELDS: [&str; 8] = [
    FIELD_DEVICE,
    FIELD_SWITCH_BRAND,
    FIELD_SWITCH_MODEL,
    FIELD_DAILY_CLICKS,
    FIELD_TOTAL_CLICKS,
    FIELD_CREATED_AT,
    FIELD_LAST_CLICK_DATE,
    FIELD_IMAGE_PATH,
];

/// Render `record` as a report. `rendered_at` only feeds the "last updated"
/// line, which is never read back.
pub fn encode(record: &UsageRecord, rendered_at: NaiveDateTime) -> String {
    let created_at = record
        .created_at
        .map(|t| t.format(DATETIME_FORMAT).to_string())
        .unwrap_or_default();

    let rows = [
        ("Mouse model", FIELD_DEVICE, escape(&record.device_identity)),
        ("Switch brand", FIELD_SWITCH_BRAND, escape(&record.switch_brand)),
        ("Switch model", FIELD_SWITCH_MODEL, escape(&record.switch_model)),
        ("Clicks today", FIELD_DAILY_CLICKS, record.daily_clicks.to_string()),
        ("Total clicks", FIELD_TOTAL_CLICKS, record.total_clicks.to_string()),
        ("Created", FIELD_CREATED_AT, created_at),
        (
            "Last click date",
            FIELD_LAST_CLICK_DATE,
            record.last_click_date.format(DATE_FORMAT).to_string(),
        ),
        ("Switch image", FIELD_IMAGE_PATH, escape(&record.image_path)),
    ];

    let mut table = String::new();
    for (label, field, value) in rows {
        table.push_str(&format!(
            "        <tr><td>{label}</td><td data-field=\"{field}\">{value}</td></tr>\n"
        ));
    }

    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         \x20   <meta charset=\"UTF-8\">\n\
         \x20   <title>Mouse click report - {title}</title>\n\
         \x20   <style>\n\
         \x20       body {{ font-family: Arial, sans-serif; margin: 20px; }}\n\
         \x20       .info-table {{ border-collapse: collapse; width: 100%; }}\n\
         \x20       .info-table th, .info-table td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}\n\
         \x20       .info-table th {{ background-color: #f2f2f2; }}\n\
         \x20       .image-container {{ text-align: center; margin: 20px 0; }}\n\
         \x20   </style>\n\
         </head>\n\
         <body>\n\
         \x20   <h1>Mouse click report</h1>\n\
         \x20   <table class=\"info-table\">\n\
         \x20       <tr><th>Item</th><th>Value</th></tr>\n\
         {table}\
         \x20   </table>\n\
         \x20   <div class=\"image-container\">\n\
         {image}\
         \x20   </div>\n\
         \x20   <p><small>Last updated: <span data-field=\"{updated_field}\">{updated}</span></small></p>\n\
         </body>\n\
         </html>\n",
        title = escape(&record.device_identity),
        table = table,
        image = render_image(&record.image_path),
        updated_field = FIELD_UPDATED_AT,
        updated = rendered_at.format(DATETIME_FORMAT),
    )
}

/// Parse a report back into a record.
///
/// `today` is used for the last-click date when the report lacks one.
pub fn decode(text: &str, today: NaiveDate) -> UsageRecord {
    let mut record = UsageRecord {
        last_click_date: today,
        ..UsageRecord::default()
    };

    if let Some(value) = field_value(text, FIELD_DEVICE) {
        record.device_identity = value;
    }
    if let Some(value) = field_value(text, FIELD_SWITCH_BRAND) {
        record.switch_brand = value;
    }
    if let Some(value) = field_value(text, FIELD_SWITCH_MODEL) {
        record.switch_model = value;
    }
    if let Some(value) = field_value(text, FIELD_IMAGE_PATH) {
        record.image_path = value;
    }
    if let Some(clicks) = field_value(text, FIELD_DAILY_CLICKS).and_then(|v| v.trim().parse().ok())
    {
        record.daily_clicks = clicks;
    }
    if let Some(clicks) = field_value(text, FIELD_TOTAL_CLICKS).and_then(|v| v.trim().parse().ok())
    {
        record.total_clicks = clicks;
    }
    record.created_at = field_value(text, FIELD_CREATED_AT)
        .and_then(|v| NaiveDateTime::parse_from_str(v.trim(), DATETIME_FORMAT).ok());
    if let Some(date) = field_value(text, FIELD_LAST_CLICK_DATE)
        .and_then(|v| NaiveDate::parse_from_str(v.trim(), DATE_FORMAT).ok())
    {
        record.last_click_date = date;
    }

    record
}

/// Number of record fields present in `text`.
///
/// Zero means the text is not a report at all.
pub fn recognized_fields(text: &str) -> usize {
    RECORD_FIELDS
        .iter()
        .filter(|field| text.contains(&marker(field)))
        .count()
}

fn marker(field: &str) -> String {
    format!("data-field=\"{field}\">")
}

/// Raw text of `field`, unescaped. String fields keep their whitespace.
fn field_value(text: &str, field: &str) -> Option<String> {
    let marker = marker(field);
    let start = text.find(&marker)? + marker.len();
    let rest = &text[start..];
    let end = rest.find('<').unwrap_or(rest.len());
    Some(unescape(&rest[..end]))
}

fn render_image(image_path: &str) -> String {
    if image_path.is_empty() || !Path::new(image_path).exists() {
        return String::new();
    }
    format!(
        "        <img src=\"{}\" alt=\"Switch image\" style=\"max-width: 200px; max-height: 150px;\" />\n",
        escape(image_path)
    )
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UsageRecord {
        let created = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(8, 30, 15)
            .unwrap();
        UsageRecord {
            device_identity: "Logitech - G Pro <Wireless>".to_string(),
            switch_brand: "Omron".to_string(),
            switch_model: "D2FC-F-7N (20M)".to_string(),
            image_path: String::new(),
            daily_clicks: 42,
            total_clicks: 123_456,
            created_at: Some(created),
            last_click_date: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
        }
    }

    fn sample_text() -> String {
        encode(&sample(), rendered_at())
    }

    fn rendered_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 3)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_roundtrip_preserves_fields() {
        let record = sample();
        let text = encode(&record, rendered_at());
        assert_eq!(decode(&text, record.last_click_date), record);
    }

    #[test]
    fn test_roundtrip_keeps_surrounding_whitespace() {
        let mut record = sample();
        record.switch_brand = "Omron ".to_string();
        record.switch_model = "  D2FC ".to_string();
        record.image_path = " C:\\pics\\sw.png".to_string();
        let text = encode(&record, rendered_at());
        assert_eq!(decode(&text, record.last_click_date), record);
    }

    #[test]
    fn test_padded_numbers_and_dates_still_parse() {
        let text = sample_text()
            .replace(">123456<", "> 123456\n<")
            .replace(">2025-06-03<", ">\t2025-06-03 <");
        let decoded = decode(&text, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        assert_eq!(decoded.total_clicks, 123_456);
        assert_eq!(decoded.last_click_date, sample().last_click_date);
    }

    #[test]
    fn test_stored_last_click_date_wins_over_today() {
        let record = sample();
        let text = encode(&record, rendered_at());
        let later = NaiveDate::from_ymd_opt(2025, 9, 9).unwrap();
        assert_eq!(decode(&text, later).last_click_date, record.last_click_date);
    }

    #[test]
    fn test_missing_switch_model_defaults_to_empty() {
        let text = encode(&sample(), rendered_at());
        let line = text
            .lines()
            .find(|l| l.contains("data-field=\"switch-model\""))
            .unwrap()
            .to_string();
        let damaged = text.replace(&line, "");

        let decoded = decode(&damaged, sample().last_click_date);
        assert_eq!(decoded.switch_model, "");
        assert_eq!(decoded.switch_brand, "Omron");
        assert_eq!(decoded.total_clicks, 123_456);
        assert_eq!(decoded.daily_clicks, 42);
        assert_eq!(decoded.created_at, sample().created_at);
    }

    #[test]
    fn test_unparsable_numbers_fall_back_to_zero() {
        let text = encode(&sample(), rendered_at()).replace(">123456<", ">lots<");
        let decoded = decode(&text, sample().last_click_date);
        assert_eq!(decoded.total_clicks, 0);
        assert_eq!(decoded.daily_clicks, 42);
    }

    #[test]
    fn test_garbage_decodes_to_defaults() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let decoded = decode("not a report", today);
        assert_eq!(decoded.device_identity, "");
        assert_eq!(decoded.total_clicks, 0);
        assert_eq!(decoded.created_at, None);
        assert_eq!(decoded.last_click_date, today);
        assert_eq!(recognized_fields("not a report"), 0);
    }

    #[test]
    fn test_image_rendered_only_when_file_exists() {
        let mut record = sample();
        record.image_path = "/definitely/not/here.png".to_string();
        let text = encode(&record, rendered_at());
        assert!(!text.contains("<img"));
        assert_eq!(
            decode(&text, record.last_click_date).image_path,
            "/definitely/not/here.png"
        );

        let image = tempfile::NamedTempFile::new().unwrap();
        record.image_path = image.path().display().to_string();
        assert!(encode(&record, rendered_at()).contains("<img"));
    }

    #[test]
    fn test_escaping_survives_markup_in_values() {
        let mut record = sample();
        record.switch_brand = "Kailh \"Box\" & <Co>".to_string();
        let text = encode(&record, rendered_at());
        assert!(!text.contains("<Co>"));
        assert_eq!(
            decode(&text, record.last_click_date).switch_brand,
            "Kailh \"Box\" & <Co>"
        );
    }
}
