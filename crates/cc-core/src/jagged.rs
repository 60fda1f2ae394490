//! Jagged-array grammar used by `-t`, `-x`, `-A`:
//!
//! ```text
//! array  := '[' row (',' row)* ']'
//!        |  '[' item (',' item)* ']'
//! row    := '[' item (',' item)* ']'
//! item   := INT | INT '...' INT      # inclusive range
//! ```

use crate::error::{CcError, CcResult};

/// A parsed jagged array. `Flat` is a single row with no nested brackets;
/// `Rows` is the per-group form. Which variant parsed preserves which
/// grammar alternative matched, so serialization round-trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JaggedArray {
    Flat(Vec<i64>),
    Rows(Vec<Vec<i64>>),
}

impl JaggedArray {
    /// View as rows regardless of which alternative parsed: `Flat` becomes
    /// a single row.
    pub fn as_rows(&self) -> Vec<&[i64]> {
        match self {
            JaggedArray::Flat(items) => vec![items.as_slice()],
            JaggedArray::Rows(rows) => rows.iter().map(|r| r.as_slice()).collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        match self {
            JaggedArray::Flat(_) => 1,
            JaggedArray::Rows(rows) => rows.len(),
        }
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(s: &'a str) -> Self {
        Parser { bytes: s.as_bytes(), pos: 0 }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, c: u8) -> CcResult<()> {
        self.skip_ws();
        if self.bytes.get(self.pos) == Some(&c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(CcError::config(format!(
                "expected '{}' at position {}",
                c as char, self.pos
            )))
        }
    }

    fn parse_int(&mut self) -> CcResult<i64> {
        self.skip_ws();
        let start = self.pos;
        if self.bytes.get(self.pos) == Some(&b'-') {
            self.pos += 1;
        }
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(CcError::config(format!("expected integer at position {start}")));
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .unwrap()
            .parse::<i64>()
            .map_err(|e| CcError::config(format!("invalid integer: {e}")))
    }

    fn looking_at_ellipsis(&mut self) -> bool {
        self.skip_ws();
        self.bytes[self.pos..].starts_with(b"...")
    }

    fn parse_item(&mut self) -> CcResult<Vec<i64>> {
        let first = self.parse_int()?;
        if self.looking_at_ellipsis() {
            self.pos += 3;
            let last = self.parse_int()?;
            let range = if first <= last {
                (first..=last).collect()
            } else {
                (last..=first).rev().collect()
            };
            Ok(range)
        } else {
            Ok(vec![first])
        }
    }

    fn parse_item_list(&mut self) -> CcResult<Vec<i64>> {
        let mut out = Vec::new();
        out.extend(self.parse_item()?);
        while self.peek() == Some(b',') {
            self.pos += 1;
            out.extend(self.parse_item()?);
        }
        Ok(out)
    }

    fn parse(&mut self) -> CcResult<JaggedArray> {
        self.expect(b'[')?;
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(JaggedArray::Flat(Vec::new()));
        }
        if self.peek() == Some(b'[') {
            let mut rows = Vec::new();
            loop {
                self.expect(b'[')?;
                let items = if self.peek() == Some(b']') {
                    Vec::new()
                } else {
                    self.parse_item_list()?
                };
                self.expect(b']')?;
                rows.push(items);
                if self.peek() == Some(b',') {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            self.expect(b']')?;
            Ok(JaggedArray::Rows(rows))
        } else {
            let items = self.parse_item_list()?;
            self.expect(b']')?;
            Ok(JaggedArray::Flat(items))
        }
    }
}

/// Parse a jagged-array literal.
pub fn parse(s: &str) -> CcResult<JaggedArray> {
    let mut p = Parser::new(s);
    let result = p.parse()?;
    p.skip_ws();
    if p.pos != p.bytes.len() {
        return Err(CcError::config(format!(
            "trailing input after array at position {}",
            p.pos
        )));
    }
    Ok(result)
}

/// Serialize a parsed array back to its canonical textual form (ranges are
/// always expanded; this is the form re-parsing into the same structure).
pub fn serialize(arr: &JaggedArray) -> String {
    fn items(xs: &[i64]) -> String {
        xs.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(",")
    }
    match arr {
        JaggedArray::Flat(xs) => format!("[{}]", items(xs)),
        JaggedArray::Rows(rows) => {
            let body = rows
                .iter()
                .map(|r| format!("[{}]", items(r)))
                .collect::<Vec<_>>()
                .join(",");
            format!("[{body}]")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_array() {
        assert_eq!(parse("[12]").unwrap(), JaggedArray::Flat(vec![12]));
        assert_eq!(parse("[0,1,2]").unwrap(), JaggedArray::Flat(vec![0, 1, 2]));
    }

    #[test]
    fn parses_rows() {
        assert_eq!(
            parse("[[12],[13]]").unwrap(),
            JaggedArray::Rows(vec![vec![12], vec![13]])
        );
        assert_eq!(
            parse("[[0,1],[2,3]]").unwrap(),
            JaggedArray::Rows(vec![vec![0, 1], vec![2, 3]])
        );
    }

    #[test]
    fn parses_ascending_range() {
        assert_eq!(parse("[0...3]").unwrap(), JaggedArray::Flat(vec![0, 1, 2, 3]));
    }

    #[test]
    fn parses_descending_range() {
        assert_eq!(parse("[3...0]").unwrap(), JaggedArray::Flat(vec![3, 2, 1, 0]));
    }

    #[test]
    fn mismatched_brackets_are_config_errors() {
        assert!(parse("[0,1").is_err());
        assert!(parse("[[0,1]").is_err());
    }

    #[test]
    fn round_trips_through_serialize() {
        for src in ["[12]", "[0,1,2]", "[[12],[13]]", "[[0,1],[2,3]]", "[]"] {
            let parsed = parse(src).unwrap();
            let reparsed = parse(&serialize(&parsed)).unwrap();
            assert_eq!(parsed, reparsed);
        }
    }

    #[test]
    fn range_expansion_also_round_trips() {
        let parsed = parse("[0...3]").unwrap();
        let reparsed = parse(&serialize(&parsed)).unwrap();
        assert_eq!(parsed, reparsed);
    }
}
