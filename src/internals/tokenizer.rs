//! Tokenizer (C3).
//!
//! Splits one logical input line into whitespace-delimited tokens, uppercased
//! and truncated to 15 bytes. Handles line comments (`\`) and parenthesis
//! comments (`( ... )`) itself; the `."` string-literal body is read on
//! demand by the compiler via `read_string_literal`, since its contents must
//! not be uppercased or token-split.

use crate::error::CoreError;
use crate::kernel::NAME_MAX;

pub struct Tokenizer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

/// Strip a trailing line comment: a `\` that is either at the very start of
/// the line or preceded by whitespace, through end of line (§4.2.1).
fn strip_line_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for i in 0..bytes.len() {
        if bytes[i] == b'\\' && (i == 0 || bytes[i - 1].is_ascii_whitespace()) {
            return &line[..i];
        }
    }
    line
}

impl<'a> Tokenizer<'a> {
    pub fn new(line: &'a str) -> Tokenizer<'a> {
        let stripped = strip_line_comment(line);
        Tokenizer {
            bytes: stripped.as_bytes(),
            pos: 0,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    /// Skip a `( ... )` comment starting at the current `(`. An unterminated
    /// comment silently consumes to end of line (§4.2.3).
    fn skip_paren_comment(&mut self) {
        self.pos += 1; // the '('
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b')' {
            self.pos += 1;
        }
        if self.pos < self.bytes.len() {
            self.pos += 1; // the ')'
        }
    }

    /// Returns the next token, uppercased and truncated to `NAME_MAX` bytes.
    /// A token longer than `NAME_MAX` bytes has the remainder of that run
    /// discarded without producing a second token (§4.2.2).
    pub fn next_token(&mut self) -> Option<String> {
        loop {
            self.skip_whitespace();
            if self.pos >= self.bytes.len() {
                return None;
            }
            if self.bytes[self.pos] == b'(' {
                self.skip_paren_comment();
                continue;
            }
            let start = self.pos;
            while self.pos < self.bytes.len() && !self.bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            let run = &self.bytes[start..self.pos];
            let take = run.len().min(NAME_MAX);
            let token: String = run[..take].iter().map(|b| b.to_ascii_uppercase() as char).collect();
            return Some(token);
        }
    }

    /// Read a `."` string-literal body: consume exactly one leading space,
    /// then everything up to (and including) the next `"`. Returns the body
    /// without the delimiters. An unterminated literal is a compile error.
    pub fn read_string_literal(&mut self) -> Result<String, CoreError> {
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b' ' {
            self.pos += 1;
        }
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'"' {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            self.pos = self.bytes.len();
            return Err(CoreError::UnterminatedString);
        }
        let body = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        self.pos += 1; // the closing quote
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(line: &str) -> Vec<String> {
        let mut t = Tokenizer::new(line);
        let mut out = Vec::new();
        while let Some(tok) = t.next_token() {
            out.push(tok);
        }
        out
    }

    #[test]
    fn splits_and_uppercases() {
        assert_eq!(tokens("dup swap  drop"), vec!["DUP", "SWAP", "DROP"]);
    }

    #[test]
    fn truncates_long_tokens_without_extra_token() {
        let long = "a".repeat(20);
        let toks = tokens(&long);
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].len(), NAME_MAX);
    }

    #[test]
    fn strips_line_comment_at_start() {
        assert_eq!(tokens("\\ entire line is a comment"), Vec::<String>::new());
    }

    #[test]
    fn strips_line_comment_after_whitespace() {
        assert_eq!(tokens("1 2 + \\ add them"), vec!["1", "2", "+"]);
    }

    #[test]
    fn backslash_without_preceding_whitespace_is_not_a_comment() {
        assert_eq!(tokens("a\\b c"), vec!["A\\B", "C"]);
    }

    #[test]
    fn skips_paren_comments() {
        assert_eq!(tokens("1 ( this is ignored ) 2 +"), vec!["1", "2", "+"]);
    }

    #[test]
    fn unterminated_paren_comment_consumes_to_eol() {
        assert_eq!(tokens("1 ( never closes"), vec!["1"]);
    }

    #[test]
    fn reads_string_literal_body() {
        let mut t = Tokenizer::new(" hello world\" DUP");
        let body = t.read_string_literal().unwrap();
        assert_eq!(body, "hello world");
        assert_eq!(t.next_token(), Some("DUP".to_string()));
    }

    #[test]
    fn unterminated_string_literal_is_an_error() {
        let mut t = Tokenizer::new(" hello");
        assert_eq!(t.read_string_literal(), Err(CoreError::UnterminatedString));
    }
}
