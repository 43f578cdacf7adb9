//! Rewrite engine: accumulates token-span edits against a [`Program`] and
//! materializes patched file contents.
//!
//! Edit registration is pure bookkeeping; nothing touches the filesystem
//! until [`Rewriter::apply`], and apply validates and materializes every
//! affected file before writing any of them, so a conflict leaves the
//! source tree untouched.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::model::{FileId, Program};
use crate::tokens::TokenSpan;

#[derive(Debug, Error)]
pub enum RewriteError {
    /// Two replace/delete spans in the same file cover a common token. The
    /// engine refuses to pick one; the caller registered incompatible edits.
    #[error(
        "conflicting edits in {}: tokens [{first_start}..={first_stop}] overlap [{second_start}..={second_stop}]",
        path.display()
    )]
    Conflict {
        path: PathBuf,
        first_start: usize,
        first_stop: usize,
        second_start: usize,
        second_stop: usize,
    },

    #[error("token span [{start}..={stop}] out of bounds for {} ({len} tokens)", path.display())]
    SpanOutOfBounds {
        path: PathBuf,
        start: usize,
        stop: usize,
        len: usize,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
enum EditKind {
    /// Replace the covered tokens with the given text (empty = delete).
    Replace(String),
    /// Insert text immediately after the anchor span's last token.
    InsertAfter(String),
}

/// Edits are kept in registration order; insertions at a shared anchor rely
/// on that order when they are rendered.
#[derive(Debug, Clone)]
struct Edit {
    span: TokenSpan,
    kind: EditKind,
}

/// Accumulates edits against one program and applies them in a batch.
///
/// The rewriter borrows the program: edits are only meaningful against the
/// token streams the model was built from, and both are discarded together
/// when the refactoring invocation ends.
pub struct Rewriter<'p> {
    program: &'p Program,
    filename_mapping: Box<dyn Fn(&Path) -> PathBuf + 'p>,
    edits: Vec<Edit>,
}

impl<'p> Rewriter<'p> {
    /// A rewriter that overwrites modified files in place.
    pub fn new(program: &'p Program) -> Self {
        Self::with_filename_mapping(program, |path: &Path| path.to_path_buf())
    }

    /// A rewriter that writes each modified file to `mapping(original_path)`.
    pub fn with_filename_mapping(
        program: &'p Program,
        mapping: impl Fn(&Path) -> PathBuf + 'p,
    ) -> Self {
        Rewriter {
            program,
            filename_mapping: Box::new(mapping),
            edits: Vec::new(),
        }
    }

    /// Replace the tokens covered by `span` with `text`.
    pub fn replace(&mut self, span: TokenSpan, text: impl Into<String>) {
        self.edits.push(Edit {
            span,
            kind: EditKind::Replace(text.into()),
        });
    }

    /// Insert `text` immediately after the last token of `anchor`. Multiple
    /// insertions at the same anchor come out in registration order.
    pub fn insert_after(&mut self, anchor: TokenSpan, text: impl Into<String>) {
        self.edits.push(Edit {
            span: anchor,
            kind: EditKind::InsertAfter(text.into()),
        });
    }

    /// Delete the tokens covered by `span`.
    pub fn delete(&mut self, span: TokenSpan) {
        self.replace(span, "");
    }

    pub fn has_edits(&self) -> bool {
        !self.edits.is_empty()
    }

    /// Files with at least one registered edit, in id order.
    pub fn touched_files(&self) -> Vec<FileId> {
        let mut files: Vec<FileId> = self.edits.iter().map(|e| e.span.file).collect();
        files.sort();
        files.dedup();
        files
    }

    /// Materialize the patched content of one file without writing it.
    pub fn rewritten_text(&self, file: FileId) -> Result<String, RewriteError> {
        let unit = self.program.file(file);
        let stream = &unit.tokens;
        let len = stream.len();

        let mut replaces: Vec<(&TokenSpan, &str)> = Vec::new();
        // Zero-width replace spans cover no tokens: their text lands before
        // the token at `start`, ahead of any insert-after anchored there.
        let mut pre_inserts: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
        let mut inserts: BTreeMap<usize, Vec<&str>> = BTreeMap::new();

        // Edits are iterated in registration order, so insertion lists at a
        // shared anchor are already ordered.
        for edit in self.edits.iter().filter(|e| e.span.file == file) {
            let span = &edit.span;
            let bound = if span.is_zero_width() { span.start } else { span.stop };
            if span.start >= len || bound >= len {
                return Err(RewriteError::SpanOutOfBounds {
                    path: unit.path.clone(),
                    start: span.start,
                    stop: span.stop,
                    len,
                });
            }
            match &edit.kind {
                EditKind::Replace(text) if span.is_zero_width() => {
                    pre_inserts.entry(span.start).or_default().push(text);
                }
                EditKind::Replace(text) => replaces.push((span, text)),
                EditKind::InsertAfter(text) => {
                    let anchor = if span.is_zero_width() {
                        span.start
                    } else {
                        span.stop
                    };
                    inserts.entry(anchor).or_default().push(text);
                }
            }
        }

        replaces.sort_by_key(|(span, _)| (span.start, span.stop));
        for pair in replaces.windows(2) {
            let (a, _) = pair[0];
            let (b, _) = pair[1];
            if a.overlaps(b) {
                return Err(RewriteError::Conflict {
                    path: unit.path.clone(),
                    first_start: a.start,
                    first_stop: a.stop,
                    second_start: b.start,
                    second_stop: b.stop,
                });
            }
        }

        // Single pass over the token stream. A token that starts a replace
        // span emits its leading trivia plus the replacement, then skips
        // through the span's stop; every other token is reproduced verbatim.
        // Insertions anchored at a token are emitted right after it (or after
        // the replacement text that swallowed it).
        let tokens = stream.tokens();
        let mut out = String::new();
        let mut next_replace = replaces.iter().peekable();
        let mut i = 0;
        while i < len {
            out.push_str(&tokens[i].leading);
            if let Some(texts) = pre_inserts.get(&i) {
                for t in texts {
                    out.push_str(t);
                }
            }
            if let Some((span, text)) = next_replace.peek().filter(|(s, _)| s.start == i) {
                out.push_str(text);
                // Insertion points inside the covered range survive the
                // replacement: their text comes out after it, still in
                // position order. A pre-insert at the span's own start was
                // already emitted above.
                for anchor in i..=span.stop {
                    if anchor > i {
                        if let Some(texts) = pre_inserts.get(&anchor) {
                            for t in texts {
                                out.push_str(t);
                            }
                        }
                    }
                    if let Some(texts) = inserts.get(&anchor) {
                        for t in texts {
                            out.push_str(t);
                        }
                    }
                }
                let stop = span.stop;
                next_replace.next();
                i = stop + 1;
                continue;
            }
            out.push_str(&tokens[i].text);
            if let Some(texts) = inserts.get(&i) {
                for t in texts {
                    out.push_str(t);
                }
            }
            i += 1;
        }
        out.push_str(stream.trailing());
        Ok(out)
    }

    /// Materialize and write every file with at least one edit.
    ///
    /// All files are validated and rendered before the first write, and each
    /// write goes through a temp file in the destination directory renamed
    /// into place, so a failure never leaves a half-written file behind.
    /// Returns the paths written.
    pub fn apply(&self) -> Result<Vec<PathBuf>, RewriteError> {
        let mut outputs = Vec::new();
        for file in self.touched_files() {
            let text = self.rewritten_text(file)?;
            let source_path = &self.program.file(file).path;
            outputs.push(((self.filename_mapping)(source_path), text));
        }

        let mut written = Vec::with_capacity(outputs.len());
        for (path, text) in outputs {
            write_atomic(&path, &text).map_err(|source| RewriteError::Write {
                path: path.clone(),
                source,
            })?;
            written.push(path);
        }
        Ok(written)
    }
}

fn write_atomic(path: &Path, text: &str) -> std::io::Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => NamedTempFile::new_in(dir)?,
        None => NamedTempFile::new_in(".")?,
    };
    tmp.write_all(text.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
