use serde::{Deserialize, Serialize};

use crate::model::FileId;

/// One lexical token plus the source text (whitespace) between it and the
/// previous token. Comments are ordinary tokens, so concatenating
/// `leading + text` over the whole stream reproduces the file byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub leading: String,
    pub start_byte: usize,
    pub end_byte: usize,
}

/// The ordered token stream of one source file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenStream {
    tokens: Vec<Token>,
    /// Source text after the last token (trailing whitespace at EOF).
    trailing: String,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>, trailing: String) -> Self {
        TokenStream { tokens, trailing }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn token(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn trailing(&self) -> &str {
        &self.trailing
    }

    /// Reconstruct the original file content.
    pub fn original_text(&self) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            out.push_str(&token.leading);
            out.push_str(&token.text);
        }
        out.push_str(&self.trailing);
        out
    }

    /// Map a byte range (as reported by a parse-tree node) to the span of
    /// tokens it covers. Tokens are sorted by `start_byte` and do not
    /// overlap, so both bounds are found by binary search.
    pub fn span_for_byte_range(&self, file: FileId, start_byte: usize, end_byte: usize) -> TokenSpan {
        let start = self
            .tokens
            .partition_point(|t| t.end_byte <= start_byte);
        let after_stop = self.tokens.partition_point(|t| t.start_byte < end_byte);
        TokenSpan {
            file,
            start,
            stop: after_stop.saturating_sub(1),
        }
    }
}

/// An addressable range of token indices within one file's stream.
///
/// `stop` is inclusive; `stop < start` denotes a zero-width span, i.e. an
/// insertion point. Fields are public and mutable so callers can do span
/// surgery (extend a span over a neighboring separator, collapse it onto a
/// single anchor token) before handing it to the rewriter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpan {
    pub file: FileId,
    pub start: usize,
    pub stop: usize,
}

impl TokenSpan {
    pub fn new(file: FileId, start: usize, stop: usize) -> Self {
        TokenSpan { file, start, stop }
    }

    /// True when the span covers no tokens.
    pub fn is_zero_width(&self) -> bool {
        self.stop < self.start
    }

    /// A copy of this span collapsed onto its first token. Used to anchor
    /// insertions at the opening token of a larger region (e.g. the `{` of
    /// a class body).
    pub fn collapsed_to_start(&self) -> TokenSpan {
        TokenSpan {
            file: self.file,
            start: self.start,
            stop: self.start,
        }
    }

    /// True when the two spans share at least one token index.
    ///
    /// Spans from different files never overlap; zero-width spans cover no
    /// tokens and never overlap anything.
    pub fn overlaps(&self, other: &TokenSpan) -> bool {
        self.file == other.file
            && !self.is_zero_width()
            && !other.is_zero_width()
            && self.start <= other.stop
            && other.start <= self.stop
    }
}
