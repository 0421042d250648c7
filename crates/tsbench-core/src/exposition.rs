//! Exposition-format line parser
//!
//! Format: metric_name{label="value",...} value [timestamp_ms]
//!
//! Example: cpu_usage_user{hostname="host_0"} 58 1451606400000

use crate::error::{CoreError, Result};
use crate::prompb::{Label, Sample, TimeSeries, METRIC_NAME_LABEL};

/// Exposition line parser
pub struct ExpositionParser;

impl ExpositionParser {
    /// Parse a single line into a one-sample series
    pub fn parse_line(line: &str) -> Result<TimeSeries> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Err(CoreError::InvalidLine("Empty or comment line".to_string()));
        }

        let name_end = line
            .find(|c: char| c == '{' || c.is_ascii_whitespace())
            .unwrap_or(line.len());
        let name = &line[..name_end];
        if name.is_empty() {
            return Err(CoreError::InvalidLine(format!("Missing metric name: {}", line)));
        }

        let mut labels = vec![Label::new(METRIC_NAME_LABEL, name)];
        let mut rest = &line[name_end..];
        if rest.starts_with('{') {
            rest = Self::parse_labels(&rest[1..], &mut labels)
                .map_err(|e| CoreError::InvalidLine(format!("{}: {}", e, line)))?;
        }

        let mut parts = rest.split_ascii_whitespace();
        let value = parts
            .next()
            .ok_or_else(|| CoreError::InvalidLine(format!("Missing value: {}", line)))?;
        let value = value
            .parse::<f64>()
            .map_err(|e| CoreError::InvalidLine(format!("Invalid value {:?}: {}", value, e)))?;

        let timestamp = match parts.next() {
            Some(ts) => ts
                .parse::<i64>()
                .map_err(|e| CoreError::InvalidLine(format!("Invalid timestamp {:?}: {}", ts, e)))?,
            None => chrono::Utc::now().timestamp_millis(),
        };

        if parts.next().is_some() {
            return Err(CoreError::InvalidLine(format!("Trailing data: {}", line)));
        }

        Ok(TimeSeries {
            labels,
            samples: vec![Sample { value, timestamp }],
        })
    }

    /// Metric name prefix of a raw line, without parsing the rest
    pub fn metric_name(line: &[u8]) -> &[u8] {
        let end = line
            .iter()
            .position(|b| *b == b'{' || b.is_ascii_whitespace())
            .unwrap_or(line.len());
        &line[..end]
    }

    /// Parse `k="v",...}` and return what follows the closing brace
    fn parse_labels<'a>(mut s: &'a str, labels: &mut Vec<Label>) -> std::result::Result<&'a str, String> {
        loop {
            s = s.trim_start();
            if let Some(after) = s.strip_prefix('}') {
                return Ok(after);
            }

            let eq = s.find('=').ok_or("Label without '='")?;
            let key = s[..eq].trim();
            if key.is_empty() {
                return Err("Empty label name".to_string());
            }

            s = s[eq + 1..].trim_start();
            s = s.strip_prefix('"').ok_or("Label value must be quoted")?;

            let (value, after) = Self::parse_quoted(s)?;
            labels.push(Label::new(key, value));

            s = after.trim_start();
            if let Some(after) = s.strip_prefix(',') {
                s = after;
            } else if !s.starts_with('}') {
                return Err("Expected ',' or '}' after label".to_string());
            }
        }
    }

    /// Read a quoted value up to its closing quote, handling escapes
    fn parse_quoted(s: &str) -> std::result::Result<(String, &str), String> {
        let mut value = String::new();
        let mut chars = s.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => return Ok((value, &s[i + 1..])),
                '\\' => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, other)) => value.push(other),
                    None => break,
                },
                c => value.push(c),
            }
        }
        Err("Unterminated label value".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_with_labels() {
        let ts = ExpositionParser::parse_line(
            "cpu_usage_guest_nice{hostname=\"host_0\",region=\"eu-west-1\",datacenter=\"eu-west-1b\"} 38.24311829 1451606400",
        )
        .unwrap();

        assert_eq!(ts.metric_name(), Some("cpu_usage_guest_nice"));
        assert_eq!(ts.labels.len(), 4);
        assert_eq!(ts.labels[3], Label::new("datacenter", "eu-west-1b"));
        assert_eq!(ts.samples[0].value, 38.24311829);
        assert_eq!(ts.samples[0].timestamp, 1451606400);
    }

    #[test]
    fn test_parse_line_without_labels() {
        let ts = ExpositionParser::parse_line("cpu_usage_guest_nice 38.24311829 1451606400").unwrap();
        assert_eq!(ts.labels, vec![Label::new(METRIC_NAME_LABEL, "cpu_usage_guest_nice")]);
        assert_eq!(ts.samples[0].timestamp, 1451606400);
    }

    #[test]
    fn test_parse_escaped_label_value() {
        let ts = ExpositionParser::parse_line(r#"m{path="a \"b\" \\c"} 1 2"#).unwrap();
        assert_eq!(ts.labels[1].value, r#"a "b" \c"#);
    }

    #[test]
    fn test_parse_special_values() {
        let ts = ExpositionParser::parse_line("m +Inf 1").unwrap();
        assert!(ts.samples[0].value.is_infinite());
        let ts = ExpositionParser::parse_line("m NaN 1").unwrap();
        assert!(ts.samples[0].value.is_nan());
    }

    #[test]
    fn test_missing_timestamp_uses_now() {
        let ts = ExpositionParser::parse_line("m{a=\"b\"} 1").unwrap();
        assert!(ts.samples[0].timestamp > 1_451_606_400_000);
    }

    #[test]
    fn test_parse_errors() {
        assert!(ExpositionParser::parse_line("").is_err());
        assert!(ExpositionParser::parse_line("# HELP m help").is_err());
        assert!(ExpositionParser::parse_line("m{a=\"b\" 1 2").is_err());
        assert!(ExpositionParser::parse_line("m{a=b} 1 2").is_err());
        assert!(ExpositionParser::parse_line("m").is_err());
        assert!(ExpositionParser::parse_line("m abc 1").is_err());
        assert!(ExpositionParser::parse_line("m 1 2 3").is_err());
    }

    #[test]
    fn test_metric_name_prefix() {
        assert_eq!(ExpositionParser::metric_name(b"cpu_usage{a=\"b\"} 1 2"), b"cpu_usage");
        assert_eq!(ExpositionParser::metric_name(b"mem_used 1 2"), b"mem_used");
        assert_eq!(ExpositionParser::metric_name(b"bare"), b"bare");
    }
}
