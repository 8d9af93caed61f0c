use crate::error::{ConfigError, Diagnostic};
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

const DEFAULT_MAX_TOKEN_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LexerOptions {
    pub quotes_in_brackets: bool,
    pub max_token_len: usize,
    pub extra_bytes: String,
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self {
            quotes_in_brackets: false,
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
            extra_bytes: String::new(),
        }
    }
}

/// Byte classes used by the tolerant class-name lexer.
///
/// Outside brackets a token is made of alphanumerics, `-`, `_`, `.`, `/`,
/// `!`, `@`, `*`, `%`, `#` and the variant separator. Inside `[...]` almost any printable ASCII
/// byte is accepted so arbitrary values and selectors survive intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerAlphabet {
    separator: u8,
    max_token_len: usize,
    quotes_in_brackets: bool,
    word: [bool; 256],
    start: [bool; 256],
    bracket: [bool; 256],
}

impl LexerAlphabet {
    pub fn new(separator: char) -> Result<Self, ConfigError> {
        if !separator.is_ascii_punctuation()
            || matches!(
                separator,
                '[' | ']' | '(' | ')' | '{' | '}' | '-' | '/' | '!' | '\\' | '"' | '\'' | '`' | '.'
            )
        {
            return Err(ConfigError::InvalidSeparator(separator));
        }
        Ok(Self::with_separator_byte(separator as u8))
    }

    pub fn with_options(separator: char, options: &LexerOptions) -> Result<Self, ConfigError> {
        if options.max_token_len == 0 {
            return Err(ConfigError::InvalidLexer(
                "max_token_len must be at least 1".to_string(),
            ));
        }
        let mut alphabet = Self::new(separator)?
            .with_max_token_len(options.max_token_len)
            .with_quotes_in_brackets(options.quotes_in_brackets);
        for ch in options.extra_bytes.chars() {
            if !ch.is_ascii_graphic() || matches!(ch, '"' | '\'' | '`' | '\\') {
                return Err(ConfigError::InvalidLexer(format!(
                    "'{}' cannot be part of a class name",
                    ch
                )));
            }
            alphabet = alphabet.allow(ch as u8);
        }
        Ok(alphabet)
    }

    fn with_separator_byte(separator: u8) -> Self {
        let mut word = [false; 256];
        let mut start = [false; 256];
        let mut bracket = [false; 256];

        for byte in 0u8..=127 {
            let alnum = byte.is_ascii_alphanumeric();
            word[byte as usize] =
                alnum
                    || matches!(byte, b'-' | b'_' | b'.' | b'/' | b'!' | b'@' | b'*' | b'%' | b'#')
                    || byte == separator;
            start[byte as usize] = alnum || matches!(byte, b'-' | b'!' | b'[' | b'@' | b'*');
            bracket[byte as usize] = byte.is_ascii_graphic()
                && !matches!(byte, b'"' | b'\'' | b'`' | b'<' | b'{' | b'}' | b'\\');
        }

        Self {
            separator,
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
            quotes_in_brackets: false,
            word,
            start,
            bracket,
        }
    }

    pub fn separator(&self) -> char {
        self.separator as char
    }

    pub fn max_token_len(&self) -> usize {
        self.max_token_len
    }

    pub fn with_max_token_len(mut self, len: usize) -> Self {
        self.max_token_len = len;
        self
    }

    pub fn with_quotes_in_brackets(mut self, allow: bool) -> Self {
        self.quotes_in_brackets = allow;
        self
    }

    pub fn allow(mut self, byte: u8) -> Self {
        if byte.is_ascii_graphic() && !matches!(byte, b'"' | b'\'' | b'`' | b'\\') {
            self.word[byte as usize] = true;
        }
        self
    }

    fn is_word(&self, byte: u8) -> bool {
        self.word[byte as usize]
    }

    fn is_start(&self, byte: u8) -> bool {
        self.start[byte as usize]
    }

    fn is_bracket(&self, byte: u8) -> bool {
        self.bracket[byte as usize]
            || (self.quotes_in_brackets && matches!(byte, b'"' | b'\''))
    }
}

impl Default for LexerAlphabet {
    fn default() -> Self {
        Self::with_separator_byte(b':')
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub raw: String,
    pub ordinal: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: Vec<u8>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn read(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            content: fs::read(path)?,
        })
    }

    pub fn tokens<'a>(&'a self, alphabet: &'a LexerAlphabet) -> Tokens<'a> {
        scan(&self.content, alphabet)
    }
}

pub fn scan<'a>(bytes: &'a [u8], alphabet: &'a LexerAlphabet) -> Tokens<'a> {
    Tokens {
        bytes,
        pos: 0,
        alphabet,
    }
}

#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    bytes: &'a [u8],
    pos: usize,
    alphabet: &'a LexerAlphabet,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            let (start, escaped_start) = self.seek_token_start()?;
            let (end, tainted) = self.consume_token(escaped_start);

            if tainted || end - start > self.alphabet.max_token_len {
                trace!(len = end - start, "dropped tainted or oversized token");
                continue;
            }
            if let Some(token) = self.finish_token(start, end) {
                return Some(token);
            }
        }
    }
}

impl<'a> Tokens<'a> {
    fn seek_token_start(&mut self) -> Option<(usize, bool)> {
        let bytes = self.bytes;
        while self.pos < bytes.len() {
            let byte = bytes[self.pos];
            if byte == b'\\' {
                match bytes.get(self.pos + 1).copied() {
                    Some(next) if next.is_ascii_alphanumeric() => self.pos += 2,
                    Some(next) if self.alphabet.is_word(next) || next == b'[' => {
                        let start = self.pos;
                        self.pos += 2;
                        return Some((start, true));
                    }
                    _ => self.pos += 1,
                }
                continue;
            }
            if self.alphabet.is_start(byte) {
                return Some((self.pos, false));
            }
            self.pos += 1;
        }
        None
    }

    fn consume_token(&mut self, tainted: bool) -> (usize, bool) {
        let bytes = self.bytes;
        let mut depth = 0usize;
        let mut tainted = tainted;

        while self.pos < bytes.len() {
            let byte = bytes[self.pos];

            if depth > 0 {
                match byte {
                    b'\\' if self.pos + 1 < bytes.len() => self.pos += 2,
                    b'[' => {
                        depth += 1;
                        self.pos += 1;
                    }
                    b']' => {
                        depth -= 1;
                        self.pos += 1;
                    }
                    _ if self.alphabet.is_bracket(byte) => self.pos += 1,
                    _ => break,
                }
                continue;
            }

            match byte {
                b'[' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'\\' => match bytes.get(self.pos + 1).copied() {
                    Some(next) if self.alphabet.is_word(next) && !next.is_ascii_alphanumeric() => {
                        tainted = true;
                        self.pos += 2;
                    }
                    Some(b'[') | Some(b']') => {
                        tainted = true;
                        self.pos += 2;
                    }
                    // String escapes such as `\n` or `\"` end the token here.
                    _ => break,
                },
                _ if self.alphabet.is_word(byte) => self.pos += 1,
                _ => break,
            }
        }

        (self.pos, tainted)
    }

    fn finish_token(&self, start: usize, end: usize) -> Option<&'a str> {
        let mut raw = &self.bytes[start..end];
        while let [rest @ .., b'.'] = raw {
            raw = rest;
        }
        if !raw.iter().any(u8::is_ascii_alphabetic) {
            return None;
        }
        std::str::from_utf8(raw).ok()
    }
}

/// Reads every path on the worker pool. Unreadable files become diagnostics;
/// the returned files keep the input order.
pub fn read_sources(paths: &[PathBuf]) -> (Vec<SourceFile>, Vec<Diagnostic>) {
    let results = paths
        .par_iter()
        .map(|path| SourceFile::read(path).map_err(|err| (path.clone(), err.to_string())))
        .collect::<Vec<_>>();

    let mut files = Vec::with_capacity(results.len());
    let mut diagnostics = Vec::new();
    for result in results {
        match result {
            Ok(file) => files.push(file),
            Err((path, message)) => {
                let diagnostic = Diagnostic::UnreadableFile { path, message };
                warn!("{}", diagnostic);
                diagnostics.push(diagnostic);
            }
        }
    }
    (files, diagnostics)
}

/// Scans every source on the worker pool and merges the per-file token lists
/// in path order, numbering each distinct token by first appearance.
pub fn scan_sources(sources: &[SourceFile], alphabet: &LexerAlphabet) -> Vec<Token> {
    let mut order = (0..sources.len()).collect::<Vec<_>>();
    order.sort_by(|a, b| sources[*a].path.cmp(&sources[*b].path));

    let per_file = order
        .par_iter()
        .map(|idx| unique_tokens(&sources[*idx], alphabet))
        .collect::<Vec<_>>();

    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    for file_tokens in per_file {
        for raw in file_tokens {
            if seen.contains(raw.as_str()) {
                continue;
            }
            seen.insert(raw.clone());
            tokens.push(Token {
                raw,
                ordinal: tokens.len(),
            });
        }
    }
    tokens
}

fn unique_tokens(source: &SourceFile, alphabet: &LexerAlphabet) -> Vec<String> {
    let mut seen = HashSet::new();
    source
        .tokens(alphabet)
        .filter(|token| seen.insert(*token))
        .map(str::to_string)
        .collect()
}
