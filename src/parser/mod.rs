//! Java parse boundary.
//!
//! Wraps tree-sitter: parses one file into a CST and flattens the CST's
//! leaves into a [`TokenStream`]. Leaves arrive in document order and carry
//! byte ranges; the gap between consecutive leaves is pure whitespace
//! (comments are leaves themselves, as tree-sitter extras), attached to the
//! following token as leading trivia so the stream reproduces the file
//! byte-for-byte.

use anyhow::{anyhow, Context, Result};
use tree_sitter::{Node, Parser, Tree};

use crate::tokens::{Token, TokenStream};

/// Parse Java source into a CST.
///
/// A tree whose root contains ERROR or missing nodes is rejected: the model
/// builder treats the whole file as unparseable rather than working from a
/// partially recovered tree.
pub fn parse_source(source: &str) -> Result<Tree> {
    let mut parser = create_parser()?;
    let tree = parser
        .parse(source, None)
        .context("tree-sitter failed to parse Java")?;
    if tree.root_node().has_error() {
        return Err(anyhow!("Java syntax error"));
    }
    Ok(tree)
}

fn create_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .context("failed to set Java parser language")?;
    Ok(parser)
}

/// Flatten a CST into the file's token stream.
pub fn tokenize(tree: &Tree, source: &str) -> TokenStream {
    let mut ranges = Vec::new();
    collect_leaf_ranges(tree.root_node(), &mut ranges);

    let mut tokens = Vec::with_capacity(ranges.len());
    let mut prev_end = 0;
    for (start, end) in ranges {
        tokens.push(Token {
            text: source[start..end].to_string(),
            leading: source[prev_end..start].to_string(),
            start_byte: start,
            end_byte: end,
        });
        prev_end = end;
    }
    TokenStream::new(tokens, source[prev_end..].to_string())
}

fn collect_leaf_ranges(node: Node, out: &mut Vec<(usize, usize)>) {
    if node.child_count() == 0 {
        // Zero-length leaves (missing nodes) carry no text.
        if node.end_byte() > node.start_byte() {
            out.push((node.start_byte(), node.end_byte()));
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_leaf_ranges(child, out);
    }
}
