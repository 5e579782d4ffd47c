//! Protocol-level parsing helpers shared by several control commands.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// One `key=value` pair per line (`STATUS`, `MIB`, `BSS`, `DUMP`, the tail of
/// `STA`/`P2P_PEER`).
pub fn parse_dict(data: &str) -> Result<HashMap<String, String>> {
    let mut rv = HashMap::new();
    for line in data.lines() {
        match line.find('=') {
            None => return Err(Error::ParseError(format!("invalid status line: {}", line))),
            Some(sep) => {
                rv.insert(line[..sep].to_string(), line[sep + 1..].trim().to_string());
            }
        }
    }
    Ok(rv)
}

/// `heading1 / heading2 / ...\n<tab-separated rows>` (`LIST_NETWORKS`,
/// `SCAN_RESULTS`). Short rows are padded with empty cells.
pub fn parse_table(data: &str) -> (Vec<Vec<String>>, Vec<String>) {
    let mut lines = data.lines();
    let headings: Vec<String> = match lines.next() {
        Some(first) => first.split('/').map(|h| h.trim().to_string()).collect(),
        None => return (Vec::new(), Vec::new()),
    };

    let mut rows = Vec::new();
    for line in lines {
        let mut cells: Vec<String> = line.split('\t').map(|c| c.trim().to_string()).collect();
        while cells.len() < headings.len() {
            cells.push(String::new());
        }
        rows.push(cells);
    }
    (rows, headings)
}

/// Space-delimited `key=value` pairs, such as those found in asynchronous
/// event notifications. Unlike [`parse_dict`], also supports single-quoted
/// values, which may themselves contain spaces.
///
/// The quotes are stripped from the returned value. An unterminated quoted
/// value is a [`Error::MalformedQuotedValue`] rather than a run-away slice.
pub fn parse_kv_line(data: &str) -> Result<HashMap<String, Option<String>>> {
    let mut rv = HashMap::new();
    let mut rest = data;

    while !rest.is_empty() {
        let sep = match rest.find('=') {
            None => {
                rv.insert(rest.to_string(), None);
                break;
            }
            Some(sep) => sep,
        };

        let name = rest[..sep].trim().to_string();
        let tail = &rest[sep + 1..];

        if let Some(quoted) = tail.strip_prefix('\'') {
            match quoted.find('\'') {
                None => return Err(Error::MalformedQuotedValue),
                Some(end) => {
                    rv.insert(name, Some(quoted[..end].to_string()));
                    rest = quoted[end + 1..].trim_start();
                }
            }
        } else {
            match tail.find(' ') {
                None => {
                    rv.insert(name, Some(tail.to_string()));
                    rest = "";
                }
                Some(end) => {
                    rv.insert(name, Some(tail[..end].trim().to_string()));
                    rest = tail[end + 1..].trim_start();
                }
            }
        }
    }

    Ok(rv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_dict_basic() {
        let d = parse_dict("uuid=abc\naddress=11:22:33:44:55:66").unwrap();
        assert_eq!(d.get("uuid").map(String::as_str), Some("abc"));
        assert_eq!(d.get("address").map(String::as_str), Some("11:22:33:44:55:66"));
    }

    #[test]
    fn parse_dict_missing_equals_is_error() {
        assert!(parse_dict("not-a-kv-line").is_err());
    }

    #[test]
    fn parse_table_pads_short_rows() {
        let (rows, headings) = parse_table("a / b / c\n1\t2");
        assert_eq!(headings, vec!["a", "b", "c"]);
        assert_eq!(rows, vec![vec!["1".to_string(), "2".to_string(), String::new()]]);
    }

    #[test]
    fn parse_kv_line_plain_and_quoted() {
        let rv = parse_kv_line("a=1 b='hello world' c=3").unwrap();
        assert_eq!(rv.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(rv.get("b").unwrap().as_deref(), Some("hello world"));
        assert_eq!(rv.get("c").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn parse_kv_line_unterminated_quote_errors() {
        assert!(parse_kv_line("a='unterminated").is_err());
    }

    #[test]
    fn parse_kv_line_bare_flag() {
        let rv = parse_kv_line("some_flag").unwrap();
        assert_eq!(rv.get("some_flag").unwrap(), &None);
    }
}
