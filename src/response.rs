//! Parsing for the service's small XML payloads.
//!
//! The services answer with single scalar elements (`<string>`, `<int>`,
//! `<long>`) or, for job listings, one record element per job whose
//! children are the record fields. Faults arrive as markup-wrapped text in
//! the error body.

use std::collections::HashMap;
use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;

use crate::prelude::*;

/// Text content of the response's root element.
pub fn element_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut text = String::new();
    let mut in_root = false;
    loop {
        match reader.read_event()? {
            Event::Start(_) => in_root = true,
            Event::Text(t) if in_root => text.push_str(&t.unescape()?),
            // ASMX serializes an empty string result as a self-closing
            // element.
            Event::Empty(_) => {
                in_root = true;
                break;
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    if !in_root {
        return Err(Error::MalformedResponse(
            "expected a single XML element".to_string(),
        ));
    }
    Ok(text)
}

/// Root-element text parsed as an integer.
pub fn element_int(xml: &str) -> Result<i64> {
    let text = element_text(xml)?;
    text.trim()
        .parse()
        .map_err(|_| Error::MalformedResponse(format!("expected an integer, got '{text}'")))
}

/// Job records from a `GetJobs` listing: one field map per job element.
pub fn job_records(xml: &str) -> Result<Vec<HashMap<String, String>>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut records: Vec<HashMap<String, String>> = Vec::new();
    let mut field: Option<String> = None;
    let mut depth = 0usize;
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                match depth {
                    2 => records.push(HashMap::new()),
                    3 => {
                        let name = e.local_name();
                        field = Some(String::from_utf8_lossy(name.as_ref()).into_owned());
                    }
                    _ => {}
                }
            }
            Event::End(_) => {
                if depth == 3 {
                    field = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(t) => {
                if let (3, Some(name), Some(record)) = (depth, field.as_ref(), records.last_mut())
                {
                    record.insert(name.clone(), t.unescape()?.into_owned());
                }
            }
            Event::Empty(_) => {
                if depth == 1 {
                    records.push(HashMap::new());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(records)
}

static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Human-readable fault text from an error body: markup stripped,
/// whitespace collapsed, truncated.
pub fn fault_message(body: &str) -> String {
    let stripped = TAGS.replace_all(body, " ");
    let mut message = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if message.len() > 500 {
        let mut cut = 500;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
        message.push_str("...");
    }
    if message.is_empty() {
        message.push_str("(empty response body)");
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_string_element() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<string xmlns="http://Services.Cas.jhu.edu">[id]:int,[ra]:float
1,2.5
</string>"#;
        let text = element_text(xml).unwrap();
        assert!(text.starts_with("[id]:int,[ra]:float"));
        assert!(text.contains("1,2.5"));
    }

    #[test]
    fn scalar_int_element() {
        let xml = r#"<?xml version="1.0"?><long xmlns="http://x">331385</long>"#;
        assert_eq!(element_int(xml).unwrap(), 331385);
    }

    #[test]
    fn non_numeric_scalar_is_malformed() {
        let xml = r#"<string>not a number</string>"#;
        assert!(matches!(
            element_int(xml),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn self_closing_element_is_an_empty_payload() {
        let xml = r#"<?xml version="1.0"?><string xmlns="http://Services.Cas.jhu.edu" />"#;
        assert_eq!(element_text(xml).unwrap(), "");
    }

    #[test]
    fn empty_body_is_malformed() {
        assert!(element_text("").is_err());
    }

    #[test]
    fn job_listing_records() {
        let xml = r#"<?xml version="1.0"?>
<ArrayOfCJJob xmlns="http://Services.Cas.jhu.edu">
  <CJJob>
    <JobID>123</JobID>
    <Status>5</Status>
    <TaskName>mytable_output</TaskName>
    <OutputLoc>http://example.org/out.csv</OutputLoc>
  </CJJob>
  <CJJob>
    <JobID>124</JobID>
    <Status>1</Status>
  </CJJob>
</ArrayOfCJJob>"#;
        let records = job_records(xml).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["JobID"], "123");
        assert_eq!(records[0]["OutputLoc"], "http://example.org/out.csv");
        assert_eq!(records[1]["Status"], "1");
        assert!(!records[1].contains_key("OutputLoc"));
    }

    #[test]
    fn fault_text_is_stripped_and_collapsed() {
        let body = "<html><body>\n  System.Exception: Query results exceed memory limit\n</body></html>";
        assert_eq!(
            fault_message(body),
            "System.Exception: Query results exceed memory limit"
        );
    }

    #[test]
    fn long_fault_text_truncates_at_a_char_boundary() {
        // A two-byte character straddling the truncation offset must not
        // split mid-character.
        let body = format!("{}é tail that goes on well past the limit", "a".repeat(499));
        let message = fault_message(&body);
        assert!(message.ends_with("..."));
        assert!(message.len() <= 503);
        assert!(message.starts_with(&"a".repeat(499)));
    }

    #[test]
    fn long_ascii_fault_text_is_truncated() {
        let message = fault_message(&"x".repeat(600));
        assert_eq!(message.len(), 503);
        assert!(message.ends_with("..."));
    }
}
