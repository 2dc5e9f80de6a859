#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use pretty_assertions::assert_eq;

fn kinds(source: &str) -> Vec<TokenKind> {
    lex(source).unwrap().into_iter().map(|t| t.kind).collect()
}

fn ident(s: &str) -> TokenKind {
    TokenKind::Ident(Name::intern(s))
}

#[test]
fn test_assignment() {
    assert_eq!(
        kinds("a = 1"),
        vec![
            ident("a"),
            TokenKind::Assign,
            TokenKind::Int(1),
            TokenKind::Newline,
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_keywords_and_operators() {
    assert_eq!(
        kinds("def f(x) { return x // 2 }"),
        vec![
            TokenKind::Def,
            ident("f"),
            TokenKind::LParen,
            ident("x"),
            TokenKind::RParen,
            TokenKind::LBrace,
            TokenKind::Return,
            ident("x"),
            TokenKind::DoubleSlash,
            TokenKind::Int(2),
            TokenKind::RBrace,
            TokenKind::Newline,
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_newlines_collapse_and_vanish_in_parens() {
    assert_eq!(
        kinds("a\n\n\nb(1,\n 2)\n"),
        vec![
            ident("a"),
            TokenKind::Newline,
            ident("b"),
            TokenKind::LParen,
            TokenKind::Int(1),
            TokenKind::Comma,
            TokenKind::Int(2),
            TokenKind::RParen,
            TokenKind::Newline,
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_comments_are_skipped() {
    assert_eq!(
        kinds("x = 1  # one\n"),
        vec![
            ident("x"),
            TokenKind::Assign,
            TokenKind::Int(1),
            TokenKind::Newline,
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_numbers() {
    assert_eq!(
        kinds("1_000 2.5 3e2"),
        vec![
            TokenKind::Int(1000),
            TokenKind::Float(2.5),
            TokenKind::Float(300.0),
            TokenKind::Newline,
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_string_escapes() {
    assert_eq!(
        kinds(r#"'a\n' "b\"c""#),
        vec![
            TokenKind::Str("a\n".to_owned()),
            TokenKind::Str("b\"c".to_owned()),
            TokenKind::Newline,
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_ellipsis_and_dot() {
    assert_eq!(
        kinds("... a.b"),
        vec![
            TokenKind::Ellipsis,
            ident("a"),
            TokenKind::Dot,
            ident("b"),
            TokenKind::Newline,
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_augmented_assignment() {
    assert_eq!(
        kinds("x //= 2"),
        vec![
            ident("x"),
            TokenKind::DoubleSlashAssign,
            TokenKind::Int(2),
            TokenKind::Newline,
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_unterminated_string() {
    let err = lex("'abc").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::UnterminatedString);
}

#[test]
fn test_invalid_char() {
    let err = lex("a = $").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::InvalidChar('$'));
    assert_eq!(err.span, Span::new(4, 5));
}

#[test]
fn test_unbalanced_close() {
    let err = lex("a)").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::Unbalanced(')'));
}

#[test]
fn test_malformed_number() {
    let err = lex("12ab").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::MalformedNumber("12ab".to_owned()));
}
