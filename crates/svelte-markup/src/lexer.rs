//! Token-level scanning of JavaScript expressions embedded in markup.
//!
//! The markup parser never interprets expressions. It only needs to know
//! where one ends, where top-level keywords such as `as` or `then` sit, and
//! which identifiers occur. Strings, template literals and comments are
//! lexed as single tokens so braces and keywords inside them are ignored.

use logos::{Lexer, Logos};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Logos)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum ExprToken {
    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*")]
    Ident,

    #[regex(r"[0-9][0-9A-Za-z_.]*")]
    Number,

    #[token("\"", |lex| quoted(lex, '"'))]
    #[token("'", |lex| quoted(lex, '\''))]
    String,

    #[token("`", template)]
    Template,

    #[token("//", line_comment)]
    #[token("/*", block_comment)]
    Comment,

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,

    #[regex(r"[-=<>!+*/%&|^~?:;.@#]")]
    Punct,
}

impl ExprToken {
    fn is_open(self) -> bool {
        matches!(
            self,
            ExprToken::LBrace | ExprToken::LParen | ExprToken::LBracket
        )
    }

    fn is_close(self) -> bool {
        matches!(
            self,
            ExprToken::RBrace | ExprToken::RParen | ExprToken::RBracket
        )
    }
}

fn quoted(lex: &mut Lexer<ExprToken>, quote: char) -> bool {
    let rest = lex.remainder();
    let mut chars = rest.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '\n' => {
                lex.bump(idx);
                return false;
            }
            c if c == quote => {
                lex.bump(idx + 1);
                return true;
            }
            _ => {}
        }
    }
    lex.bump(rest.len());
    false
}

fn template(lex: &mut Lexer<ExprToken>) -> bool {
    let rest = lex.remainder();
    let bytes = rest.as_bytes();
    let mut depth = 0usize;
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 1,
            b'`' if depth == 0 => {
                lex.bump(idx + 1);
                return true;
            }
            b'$' if bytes.get(idx + 1) == Some(&b'{') => {
                depth += 1;
                idx += 1;
            }
            b'{' if depth > 0 => depth += 1,
            b'}' if depth > 0 => depth -= 1,
            _ => {}
        }
        idx += 1;
    }
    lex.bump(rest.len());
    false
}

fn line_comment(lex: &mut Lexer<ExprToken>) -> bool {
    let rest = lex.remainder();
    lex.bump(rest.find('\n').unwrap_or(rest.len()));
    true
}

fn block_comment(lex: &mut Lexer<ExprToken>) -> bool {
    let rest = lex.remainder();
    match rest.find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            true
        }
        None => {
            lex.bump(rest.len());
            false
        }
    }
}

/// All well-formed tokens of `text` with their byte ranges.
pub fn tokens(text: &str) -> impl Iterator<Item = (ExprToken, Range<usize>)> + '_ {
    ExprToken::lexer(text)
        .spanned()
        .filter_map(|(token, range)| token.ok().map(|token| (token, range)))
}

/// Tokens outside of any bracket pair.
///
/// The brackets delimiting a top-level group are included, their contents
/// are not.
pub fn top_level_tokens(text: &str) -> impl Iterator<Item = (ExprToken, Range<usize>)> + '_ {
    let mut depth = 0usize;
    tokens(text).filter(move |(token, _)| {
        if token.is_open() {
            depth += 1;
            depth == 1
        } else if token.is_close() {
            depth = depth.saturating_sub(1);
            depth == 0
        } else {
            depth == 0
        }
    })
}

/// Finds the `}` that closes an expression starting at the beginning of
/// `text`, skipping nested braces, strings and comments.
pub fn closing_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (token, range) in tokens(text) {
        match token {
            ExprToken::LBrace => depth += 1,
            ExprToken::RBrace if depth == 0 => return Some(range.start),
            ExprToken::RBrace => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Finds the first top-level identifier equal to `keyword`.
pub fn find_keyword(text: &str, keyword: &str) -> Option<Range<usize>> {
    top_level_tokens(text)
        .find(|(token, range)| *token == ExprToken::Ident && &text[range.clone()] == keyword)
        .map(|(_, range)| range)
}

/// Finds the first top-level comma.
pub fn find_comma(text: &str) -> Option<usize> {
    top_level_tokens(text)
        .find(|(token, _)| *token == ExprToken::Comma)
        .map(|(_, range)| range.start)
}

/// Splits a trailing top-level parenthesized group off `text`.
///
/// Returns the range of the group including its parentheses.
pub fn trailing_group(text: &str) -> Option<Range<usize>> {
    let top: Vec<_> = top_level_tokens(text).collect();
    let (last, close) = top.last()?;
    if *last != ExprToken::RParen || close.end != text.trim_end().len() {
        return None;
    }
    let (_, open) = top
        .iter()
        .rev()
        .find(|(token, _)| *token == ExprToken::LParen)?;
    Some(open.start..close.end)
}

/// Iterates over every identifier in `text`, ignoring strings and comments.
pub fn identifiers(text: &str) -> impl Iterator<Item = &str> + '_ {
    tokens(text)
        .filter(|(token, _)| *token == ExprToken::Ident)
        .map(move |(_, range)| &text[range])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_closing_brace_skips_nested_and_strings() {
        let text = "{ a: '}' } + `${ {b} }` }</div>";
        assert_eq!(closing_brace(text), Some(24));
        assert_eq!(closing_brace("count /* } */ }"), Some(14));
        assert_eq!(closing_brace("unterminated"), None);
    }

    #[test]
    fn test_find_keyword_ignores_nested() {
        let text = "items.filter((as) => as) as item";
        let range = find_keyword(text, "as").unwrap();
        assert_eq!(&text[range.end..], " item");
        assert!(find_keyword("'as' + x", "as").is_none());
    }

    #[test]
    fn test_trailing_group() {
        let text = "item, i (item.id)";
        assert_eq!(trailing_group(text).map(|r| &text[r]), Some("(item.id)"));
        assert_eq!(trailing_group("{ a, b }"), None);
        assert_eq!(find_comma(text), Some(4));
        assert_eq!(find_comma("{ a, b }"), None);
    }

    #[test]
    fn test_identifiers_skip_strings_and_comments() {
        let ids: Vec<_> = identifiers("$$props.a + '$$props' // $$props").collect();
        assert_eq!(ids, vec!["$$props", "a"]);
    }
}
