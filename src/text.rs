//! Minimal line-oriented reader/writer for the flat text form.
//!
//! One `key=value` pair per line, `#` or `;` comment lines attaching to the
//! next pair. This is deliberately small: no quoting or escape dialects, no
//! I/O. Lines without an assigner surface as [`Token::Error`] so the
//! composer aborts with a position.

use crate::composer::{Property, Token};

/// Tokenize text into the stream the composers consume.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#').or_else(|| line.strip_prefix(';')) {
            tokens.push(Token::Comment(comment.trim().to_string()));
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) => {
                tokens.push(Token::Key(key.trim().to_string()));
                tokens.push(Token::Assigner);
                let value = value.trim();
                tokens.push(Token::Value(if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }));
            }
            None => {
                tokens.push(Token::Error(format!(
                    "line {}: missing '=' in '{line}'",
                    idx + 1
                )));
            }
        }
    }
    tokens
}

/// Render flat entries back to text, comment lines first.
pub fn render(properties: &[Property]) -> String {
    let mut out = String::new();
    for property in properties {
        for comment in &property.comments {
            out.push_str("# ");
            out.push_str(comment);
            out.push('\n');
        }
        out.push_str(&property.key);
        out.push('=');
        if let Some(value) = &property.value {
            out.push_str(value);
        }
        out.push('\n');
    }
    out
}
