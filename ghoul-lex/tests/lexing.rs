use ghoul_lex::{Lexer, TokenKind};

fn kinds(src: &str) -> Vec<TokenKind> {
    let mut lexer = Lexer::new(src);
    let mut result = Vec::new();
    loop {
        let token = lexer.next_token().expect("lex");
        if token.kind == TokenKind::EndOfFile {
            break;
        }
        result.push(token.kind);
    }
    result
}

#[test]
fn right_shift_combines_by_default() {
    assert_eq!(
        kinds("a >> b"),
        vec![TokenKind::Symbol, TokenKind::RightShift, TokenKind::Symbol]
    );
}

#[test]
fn right_shift_splits_when_disabled() {
    let mut lexer = Lexer::new(">>");
    lexer.set_right_shift_state(false);
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::TemplateEnd);
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::TemplateEnd);
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::EndOfFile);
}

#[test]
fn toggling_rescans_the_cached_token() {
    let mut lexer = Lexer::new(">> after");
    // Peek pulls `>>` into the cache under the enabled state.
    assert_eq!(lexer.peek_kind().unwrap(), TokenKind::RightShift);
    // Disabling must rescan: the same source position now yields two `>`.
    lexer.set_right_shift_state(false);
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::TemplateEnd);
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::TemplateEnd);
    lexer.set_right_shift_state(true);
    let after = lexer.next_token().unwrap();
    assert_eq!(after.kind, TokenKind::Symbol);
    assert!(after.leading_whitespace);
}

#[test]
fn checkpoint_restores_position_and_peek() {
    let mut lexer = Lexer::new("foo bar baz");
    assert_eq!(lexer.next_token().unwrap().text, "foo");
    let checkpoint = lexer.create_checkpoint();
    assert_eq!(lexer.next_token().unwrap().text, "bar");
    assert_eq!(lexer.next_token().unwrap().text, "baz");
    lexer.return_to_checkpoint(checkpoint);
    assert_eq!(lexer.next_token().unwrap().text, "bar");
}

#[test]
fn leading_whitespace_is_tracked() {
    let mut lexer = Lexer::new("1 .0");
    let number = lexer.next_token().unwrap();
    assert_eq!(number.kind, TokenKind::Number);
    assert!(!number.leading_whitespace);
    let period = lexer.next_token().unwrap();
    assert_eq!(period.kind, TokenKind::Period);
    assert!(period.leading_whitespace);
}

#[test]
fn number_with_suffix_is_one_token() {
    let mut lexer = Lexer::new("123foo 0xFF");
    let first = lexer.next_token().unwrap();
    assert_eq!(first.kind, TokenKind::Number);
    assert_eq!(first.text, "123foo");
    let second = lexer.next_token().unwrap();
    assert_eq!(second.kind, TokenKind::Number);
    assert_eq!(second.text, "0xFF");
}

#[test]
fn string_escapes() {
    let mut lexer = Lexer::new(r#""a\tb\n\"c\"""#);
    let token = lexer.next_token().unwrap();
    assert_eq!(token.kind, TokenKind::StringLit);
    assert_eq!(token.text, "a\tb\n\"c\"");
}

#[test]
fn newline_in_string_is_rejected() {
    let mut lexer = Lexer::new("\"first\nsecond\"");
    let err = lexer.next_token().expect_err("newline must be rejected");
    assert!(err.message.contains("cannot span multiple lines"));
}

#[test]
fn unknown_escape_is_rejected() {
    let mut lexer = Lexer::new(r#""\q""#);
    let err = lexer.next_token().expect_err("unknown escape");
    assert!(err.message.contains("unknown escape character"));
}

#[test]
fn character_literals() {
    let mut lexer = Lexer::new(r"'x' '\n' '\''");
    assert_eq!(lexer.next_token().unwrap().text, "x");
    assert_eq!(lexer.next_token().unwrap().text, "\n");
    assert_eq!(lexer.next_token().unwrap().text, "'");
}

#[test]
fn empty_character_literal_is_rejected() {
    let mut lexer = Lexer::new("''");
    let err = lexer.next_token().expect_err("empty char");
    assert!(err.message.contains("cannot be empty"));
}

#[test]
fn comments_are_skipped() {
    assert_eq!(
        kinds("a // line comment\n/* block */ b"),
        vec![TokenKind::Symbol, TokenKind::Symbol]
    );
}

#[test]
fn compound_operators() {
    assert_eq!(
        kinds("<<= >>= ^^= ?-> ?. ?? ?["),
        vec![
            TokenKind::LeftShiftEquals,
            TokenKind::RightShiftEquals,
            TokenKind::CaretCaretEquals,
            TokenKind::QuestionArrow,
            TokenKind::QuestionPeriod,
            TokenKind::QuestionQuestion,
            TokenKind::QuestionLSquare,
        ]
    );
}

#[test]
fn keywords_and_modifiers_classify() {
    use ghoul_lex::TokenCategory;
    let mut lexer = Lexer::new("func mut example");
    assert_eq!(lexer.next_token().unwrap().kind.category(), TokenCategory::Keyword);
    assert_eq!(lexer.next_token().unwrap().kind.category(), TokenCategory::Modifier);
    assert_eq!(lexer.next_token().unwrap().kind.category(), TokenCategory::Value);
}

#[test]
fn line_numbers_advance() {
    let mut lexer = Lexer::new("a\nb\n\nc");
    assert_eq!(lexer.next_token().unwrap().line, 1);
    assert_eq!(lexer.next_token().unwrap().line, 2);
    assert_eq!(lexer.next_token().unwrap().line, 4);
}
