#[cfg(test)]
mod scanner_tests {
    use sprig::diagnostics::{CollectingReporter, Severity};
    use sprig::error::SprigError;
    use sprig::scanner::*;
    use sprig::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source);
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "({*,+-;/})",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::MINUS, "-"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::SLASH, "/"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn two_character_operators_win_over_one_character_ones() {
        assert_token_sequence(
            "== != <= >= += -= *= /= = < >",
            &[
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::PLUS_EQUAL, "+="),
                (TokenType::MINUS_EQUAL, "-="),
                (TokenType::STAR_EQUAL, "*="),
                (TokenType::SLASH_EQUAL, "/="),
                (TokenType::EQUAL, "="),
                (TokenType::LESS, "<"),
                (TokenType::GREATER, ">"),
                (TokenType::EOF, ""),
            ],
        );

        // No whitespace needed between operators: `===` is `==` then `=`.
        assert_token_sequence(
            "===",
            &[
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::EQUAL, "="),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn keywords_are_exact_matches() {
        assert_token_sequence(
            "let func letter _x x1 not nil notify return print",
            &[
                (TokenType::LET, "let"),
                (TokenType::FUNC, "func"),
                (TokenType::IDENTIFIER, "letter"),
                (TokenType::IDENTIFIER, "_x"),
                (TokenType::IDENTIFIER, "x1"),
                (TokenType::NOT, "not"),
                (TokenType::NIL, "nil"),
                (TokenType::IDENTIFIER, "notify"),
                (TokenType::RETURN, "return"),
                (TokenType::PRINT, "print"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_token_sequence(
            "a // b c d\nb // trailing",
            &[
                (TokenType::IDENTIFIER, "a"),
                (TokenType::IDENTIFIER, "b"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let source = "let a = 1;\n  print a;\n\t// note\nx";
        let tokens: Vec<Token<'_>> = Scanner::new(source).filter_map(Result::ok).collect();

        let print = tokens
            .iter()
            .find(|t| t.token_type == TokenType::PRINT)
            .unwrap();
        assert_eq!((print.line, print.column), (2, 3));

        let last = &tokens[tokens.len() - 2];
        assert_eq!(last.lexeme, "x");
        assert_eq!((last.line, last.column), (4, 1));
    }

    #[test]
    fn lexemes_are_exact_source_substrings() {
        let source = "let total = 12.5 + count;\nprint 'hi there' == \"x\";\nfunc f(a, b) { return a >= b; }";
        let lines: Vec<&str> = source.lines().collect();

        for token in Scanner::new(source).filter_map(Result::ok) {
            if token.token_type == TokenType::EOF {
                continue;
            }
            let line: &str = lines[token.line - 1];
            let start: usize = token.column - 1;
            assert_eq!(&line[start..start + token.lexeme.len()], token.lexeme);
        }
    }

    #[test]
    fn strings_are_verbatim_with_either_delimiter() {
        let tokens: Vec<Token<'_>> = Scanner::new(r#""a\nb" 'it"s'"#)
            .filter_map(Result::ok)
            .collect();

        match &tokens[0].token_type {
            TokenType::STRING(s) => assert_eq!(s, r"a\nb"),
            other => panic!("expected string, got {:?}", other),
        }
        match &tokens[1].token_type {
            TokenType::STRING(s) => assert_eq!(s, r#"it"s"#),
            other => panic!("expected string, got {:?}", other),
        }
        assert_eq!(tokens[1].lexeme, r#"'it"s'"#);
    }

    #[test]
    fn multi_line_string_advances_the_line_counter() {
        let tokens: Vec<Token<'_>> = Scanner::new("\"one\ntwo\" x")
            .filter_map(Result::ok)
            .collect();

        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].lexeme, "x");
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn unterminated_string_is_fatal() {
        let results: Vec<_> = Scanner::new("print \"open").collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        match &results[1] {
            Err(e @ SprigError::Lex { .. }) => {
                assert!(e.to_string().contains("Unterminated string."));
                assert!(e.is_fatal());
            }
            other => panic!("expected lex error, got {:?}", other),
        }

        let mut reporter = CollectingReporter::new();
        assert!(scan("print \"open", &mut reporter).is_err());
    }

    #[test]
    fn numbers_allow_one_fraction() {
        let tokens: Vec<Token<'_>> = Scanner::new("12 3.25 0.5")
            .filter_map(Result::ok)
            .collect();

        let values: Vec<f64> = tokens
            .iter()
            .filter_map(|t| match t.token_type {
                TokenType::NUMBER(n) => Some(n),
                _ => None,
            })
            .collect();

        assert_eq!(values, vec![12.0, 3.25, 0.5]);
        assert_eq!(tokens[1].lexeme, "3.25");
    }

    #[test]
    fn second_dot_is_a_malformed_number() {
        let mut reporter = CollectingReporter::new();

        let err = scan("1.2.3", &mut reporter).unwrap_err();
        assert!(err.to_string().contains("Malformed number."));

        let err = scan("7.", &mut reporter).unwrap_err();
        assert!(err.to_string().contains("Malformed number."));
    }

    #[test]
    fn test_unexpected_chars_token_sequence() {
        let source = ",;$(#";
        let scanner = Scanner::new(source);

        let results: Vec<_> = scanner.collect();

        // 0: COMMA ','
        // 1: SEMICOLON ';'
        // 2: Error for '$'
        // 3: LEFT_PAREN '('
        // 4: Error for '#'
        // 5: EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenType::COMMA, ",");
        assert_token_matches(&results[1], TokenType::SEMICOLON, ";");
        assert_token_matches(&results[3], TokenType::LEFT_PAREN, "(");
        assert_token_matches(&results[5], TokenType::EOF, "");

        let error_count = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(error_count, 2, "Expected 2 error messages");

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                err.to_string().contains("Unexpected character"),
                "Error message should contain 'Unexpected character', got: {}",
                err
            );
            assert!(!err.is_fatal());
        }

        fn assert_token_matches(
            result: &Result<Token, SprigError>,
            expected_type: TokenType,
            expected_lexeme: &str,
        ) {
            match result {
                Ok(token) => {
                    assert_eq!(
                        token.token_type, expected_type,
                        "Expected token type {:?}, got {:?}",
                        expected_type, token.token_type
                    );
                    assert_eq!(
                        token.lexeme, expected_lexeme,
                        "Expected lexeme '{}', got '{}'",
                        expected_lexeme, token.lexeme
                    );
                }
                Err(e) => panic!("Expected token but got error: {}", e),
            }
        }
    }

    #[test]
    fn scan_reports_unknown_characters_and_keeps_going() {
        let mut reporter = CollectingReporter::new();

        let tokens = scan("a @ b é !", &mut reporter).unwrap();

        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme).collect();
        assert_eq!(lexemes, vec!["a", "b", ""]);

        assert_eq!(reporter.diagnostics.len(), 3);
        assert!(reporter
            .diagnostics
            .iter()
            .all(|d| d.severity == Severity::Warning));
        assert_eq!(
            reporter.messages(),
            vec![
                "Unexpected character: @",
                "Unexpected character: é",
                "Unexpected character: !",
            ]
        );
        assert_eq!(
            reporter.diagnostics[0].position,
            Some(Position::new(1, 3))
        );
    }

    #[test]
    fn token_display_matches_tokenize_output() {
        let tokens: Vec<Token<'_>> = Scanner::new("x 42 \"s\"")
            .filter_map(Result::ok)
            .collect();

        assert_eq!(tokens[0].to_string(), "IDENTIFIER x null");
        assert_eq!(tokens[1].to_string(), "NUMBER 42 42.0");
        assert_eq!(tokens[2].to_string(), "STRING \"s\" s");
        assert_eq!(tokens[3].to_string(), "EOF  null");
    }
}
