//! S-expression reader.
//!
//! Reading happens in two passes. The tokenizer, built from `nom` combinators,
//! splits the text into `(`, `)` and atoms (maximal runs of characters that are
//! neither whitespace nor parentheses), recording each token's byte offset. The
//! parser then walks the tokens with an explicit `TokenCursor`, one token of
//! lookahead, assembling right-nested pair lists.
//!
//! An atom that parses completely as an `f64` becomes a number; every other atom
//! is a symbol. The float parse is Rust's `str::parse`, which is locale
//! independent and also accepts `inf` and `NaN`.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_till, take_while, take_while1},
    character::complete::char,
    combinator::{map, recognize, value},
    multi::many0_count,
    sequence::pair,
};

use crate::ast::{NumberType, Value};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Reader options
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParseConfig {
    /// Treat `;` as the start of a comment running to end of line
    pub handle_comments: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TokenKind<'a> {
    Open,
    Close,
    Atom(&'a str),
}

impl TokenKind<'_> {
    fn text(&self) -> &str {
        match self {
            TokenKind::Open => "(",
            TokenKind::Close => ")",
            TokenKind::Atom(text) => text,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: TokenKind<'a>,
    /// Byte offset of the token in the source text
    offset: usize,
}

fn is_atom_char(c: char, config: ParseConfig) -> bool {
    !c.is_whitespace() && c != '(' && c != ')' && !(config.handle_comments && c == ';')
}

/// Parse a `;` comment up to (not including) the newline
fn comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(char(';'), take_till(|c: char| c == '\n'))).parse(input)
}

/// Skip whitespace and, if enabled, comments. Never fails.
fn trivia(input: &str, config: ParseConfig) -> IResult<&str, ()> {
    if config.handle_comments {
        value((), many0_count(alt((take_while1(char::is_whitespace), comment)))).parse(input)
    } else {
        value((), take_while(char::is_whitespace)).parse(input)
    }
}

/// Parse a single token
fn token(input: &str, config: ParseConfig) -> IResult<&str, TokenKind<'_>> {
    alt((
        value(TokenKind::Open, char('(')),
        value(TokenKind::Close, char(')')),
        map(
            take_while1(move |c: char| is_atom_char(c, config)),
            TokenKind::Atom,
        ),
    ))
    .parse(input)
}

/// Split the whole input into tokens
fn tokenize(input: &str, config: ParseConfig) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = input;
    loop {
        if let Ok((after, ())) = trivia(rest, config) {
            rest = after;
        }
        // After trivia, only the end of input can fail to start a token
        match token(rest, config) {
            Ok((after, kind)) => {
                tokens.push(Token {
                    kind,
                    offset: input.len() - rest.len(),
                });
                rest = after;
            }
            Err(_) => break,
        }
    }
    tokens
}

/// Explicit cursor over the token stream, threaded through the recursive parse
struct TokenCursor<'a> {
    input: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    fn new(input: &'a str, config: ParseConfig) -> Self {
        TokenCursor {
            input,
            tokens: tokenize(input, config),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).copied();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn error_at(
        &self,
        kind: ParseErrorKind,
        message: &str,
        offset: usize,
        found: Option<String>,
    ) -> Error {
        Error::SyntaxError(ParseError::with_context(
            kind, message, self.input, offset, found,
        ))
    }
}

/// Turn an atom into a number if the whole token is a float, else a symbol
fn atom(text: &str) -> Value {
    match text.parse::<NumberType>() {
        Ok(n) => Value::Number(n),
        Err(_) => Value::Symbol(text.to_owned()),
    }
}

/// Read one complete expression starting at the cursor, `depth` lists deep
fn read_expr(cursor: &mut TokenCursor<'_>, depth: usize) -> Result<Value, Error> {
    let Some(token) = cursor.advance() else {
        return Err(cursor.error_at(
            ParseErrorKind::Incomplete,
            "Unexpected end of input",
            cursor.input.len(),
            None,
        ));
    };

    match token.kind {
        TokenKind::Open if depth >= MAX_PARSE_DEPTH => Err(cursor.error_at(
            ParseErrorKind::TooDeeplyNested,
            &format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
            token.offset,
            Some("(".to_owned()),
        )),
        TokenKind::Open => {
            let mut elements = Vec::new();
            loop {
                match cursor.peek() {
                    None => {
                        return Err(cursor.error_at(
                            ParseErrorKind::Incomplete,
                            "Expected ')' before end of input",
                            token.offset,
                            None,
                        ));
                    }
                    Some(Token {
                        kind: TokenKind::Close,
                        ..
                    }) => {
                        cursor.advance();
                        return Ok(Value::list(elements));
                    }
                    Some(_) => elements.push(read_expr(cursor, depth + 1)?),
                }
            }
        }
        TokenKind::Close => Err(cursor.error_at(
            ParseErrorKind::UnexpectedClose,
            "Unexpected ')'",
            token.offset,
            Some(")".to_owned()),
        )),
        TokenKind::Atom(text) => Ok(atom(text)),
    }
}

/// Parse exactly one expression.
///
/// Empty input is an `Incomplete` syntax error; anything left over after the
/// first expression is a `TrailingContent` syntax error.
pub fn parse(input: &str) -> Result<Value, Error> {
    parse_with_config(input, ParseConfig::default())
}

/// Parse exactly one expression with reader options
pub fn parse_with_config(input: &str, config: ParseConfig) -> Result<Value, Error> {
    let mut cursor = TokenCursor::new(input, config);
    let value = read_expr(&mut cursor, 0)?;

    if let Some(extra) = cursor.peek() {
        return Err(cursor.error_at(
            ParseErrorKind::TrailingContent,
            "Unexpected remaining input",
            extra.offset,
            Some(extra.kind.text().to_owned()),
        ));
    }

    Ok(value)
}

/// Parse every expression in a document, in order. Empty input yields an empty vector.
pub fn parse_all(input: &str) -> Result<Vec<Value>, Error> {
    parse_all_with_config(input, ParseConfig::default())
}

/// Parse every expression in a document with reader options
pub fn parse_all_with_config(input: &str, config: ParseConfig) -> Result<Vec<Value>, Error> {
    let mut cursor = TokenCursor::new(input, config);
    let mut values = Vec::new();
    while !cursor.is_at_end() {
        values.push(read_expr(&mut cursor, 0)?);
    }
    Ok(values)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sym, val};

    /// Test result variants for comprehensive parsing tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Value),                           // Parsing should succeed with this value
        SpecificError(ParseErrorKind, &'static str), // Should fail with this kind and message fragment
        AnyError,                                 // Parsing should fail (any error)
    }
    use ParseTestResult::*;

    fn success<T: Into<Value>>(value: T) -> ParseTestResult {
        Success(value.into())
    }

    /// Run parse tests with round-trip validation of successful cases
    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Parse test #{}", i + 1);
            let result = parse(input);

            match (result, expected) {
                (Ok(actual), Success(expected_val)) => {
                    assert_eq!(actual, *expected_val, "{test_id}: value mismatch");

                    // display -> parse -> display should be identical
                    let displayed = format!("{actual}");
                    let reparsed = parse(&displayed).unwrap_or_else(|e| {
                        panic!("{test_id}: round-trip parse failed for '{displayed}': {e:?}")
                    });
                    assert_eq!(
                        displayed,
                        format!("{reparsed}"),
                        "{test_id}: round-trip display mismatch for '{input}'"
                    );
                }
                (Err(_), AnyError) => {}
                (Err(crate::Error::SyntaxError(err)), SpecificError(kind, text)) => {
                    assert_eq!(err.kind, *kind, "{test_id}: wrong error kind");
                    assert!(
                        err.message.contains(*text),
                        "{test_id}: error should contain '{text}', got '{}'",
                        err.message
                    );
                }
                (Err(err), SpecificError(..)) => {
                    panic!("{test_id}: expected SyntaxError, got {err:?}");
                }
                (Ok(actual), AnyError | SpecificError(..)) => {
                    panic!("{test_id}: expected error, got {actual:?}");
                }
                (Err(err), Success(_)) => {
                    panic!("{test_id}: expected success, got error {err:?}");
                }
            }
        }
    }

    #[test]
    fn test_parser_comprehensive() {
        let test_cases = vec![
            // ===== NUMBER PARSING =====
            ("42", success(42)),
            ("-5", success(-5)),
            ("0", success(0)),
            ("2.75", success(2.75)),
            ("-0.5", success(-0.5)),
            (".5", success(0.5)),
            ("1e3", success(1000)),
            ("+7", success(7)),
            ("inf", success(f64::INFINITY)),
            ("-inf", success(f64::NEG_INFINITY)),
            // ===== SYMBOL PARSING =====
            // Anything that is not a complete float is a symbol
            ("foo", success(sym("foo"))),
            ("+", success(sym("+"))),
            ("-", success(sym("-"))),
            ("null?", success(sym("null?"))),
            ("123abc", success(sym("123abc"))),
            ("1.2.3", success(sym("1.2.3"))),
            ("'x", success(sym("'x"))),
            ("#t", success(sym("#t"))),
            ("a;b", success(sym("a;b"))), // comments are off by default
            // ===== LIST PARSING =====
            ("()", success(nil())),
            ("(   )", success(nil())),
            ("(42)", success([42])),
            ("(1 2 3)", success([1, 2, 3])),
            ("(+ 1 2)", success(vec![sym("+"), val(1), val(2)])),
            (
                "(define x 5)",
                success(vec![sym("define"), sym("x"), val(5)]),
            ),
            ("((1 2) (3 4))", success([[1, 2], [3, 4]])),
            ("(((1)))", success([val([val([val(1)])])])),
            (
                "(quote (a b))",
                success(vec![sym("quote"), val(vec![sym("a"), sym("b")])]),
            ),
            // Parentheses need no surrounding whitespace
            ("(+(* 2 3)4)", success(vec![sym("+"), val(vec![sym("*"), val(2), val(3)]), val(4)])),
            // ===== WHITESPACE HANDLING =====
            ("  42  ", success(42)),
            ("\r\n  foo  \t", success(sym("foo"))),
            ("( 1   2\t\n3 )", success([1, 2, 3])),
            ("(1\u{00a0}2)", success([1, 2])), // non-ASCII whitespace also separates
            // ===== ERROR CASES =====
            ("(+ 1 2", SpecificError(ParseErrorKind::Incomplete, "Expected ')'")),
            ("((1 2)", SpecificError(ParseErrorKind::Incomplete, "Expected ')'")),
            ("(", SpecificError(ParseErrorKind::Incomplete, "Expected ')'")),
            (")", SpecificError(ParseErrorKind::UnexpectedClose, "Unexpected ')'")),
            ("", SpecificError(ParseErrorKind::Incomplete, "end of input")),
            ("   ", SpecificError(ParseErrorKind::Incomplete, "end of input")),
            ("(1 2))", SpecificError(ParseErrorKind::TrailingContent, "remaining")),
            ("1 2", SpecificError(ParseErrorKind::TrailingContent, "remaining")),
            ("(+ 1 2) (+ 3 4)", AnyError),
        ];

        run_parse_tests(test_cases);
    }

    #[test]
    fn test_parse_all() {
        assert_eq!(parse_all("").unwrap(), vec![]);
        assert_eq!(parse_all(" \n\t ").unwrap(), vec![]);
        assert_eq!(
            parse_all("(define x 5) (+ x 1) y").unwrap(),
            vec![
                val(vec![sym("define"), sym("x"), val(5)]),
                val(vec![sym("+"), sym("x"), val(1)]),
                sym("y"),
            ]
        );
        assert!(matches!(
            parse_all("1 (2"),
            Err(crate::Error::SyntaxError(ParseError {
                kind: ParseErrorKind::Incomplete,
                ..
            }))
        ));
        assert!(matches!(
            parse_all("1 )"),
            Err(crate::Error::SyntaxError(ParseError {
                kind: ParseErrorKind::UnexpectedClose,
                ..
            }))
        ));
    }

    #[test]
    fn test_comments_when_enabled() {
        let config = ParseConfig {
            handle_comments: true,
        };
        assert_eq!(
            parse_with_config("(+ 1 ; one\n 2) ; trailing", config).unwrap(),
            val(vec![sym("+"), val(1), val(2)])
        );
        assert_eq!(parse_with_config("a;b", config).unwrap(), sym("a"));
        assert_eq!(
            parse_all_with_config("; only a comment\n", config).unwrap(),
            vec![]
        );
        assert_eq!(
            parse_all_with_config("1 ;x\n2", config).unwrap(),
            vec![val(1), val(2)]
        );
    }

    #[test]
    fn test_error_context_points_at_problem() {
        let Err(crate::Error::SyntaxError(err)) = parse("(foo bar) )") else {
            panic!("expected syntax error");
        };
        assert_eq!(err.kind, ParseErrorKind::TrailingContent);
        assert_eq!(err.found.as_deref(), Some(")"));
        assert_eq!(err.context.as_deref(), Some("(foo bar) )"));
    }

    #[test]
    fn test_deep_nesting_reads() {
        let depth = 500;
        let text = format!("{}x{}", "(".repeat(depth), ")".repeat(depth));
        let mut value = parse(&text).unwrap();
        for _ in 0..depth {
            let items = value.to_vec().unwrap();
            assert_eq!(items.len(), 1);
            value = items[0].clone();
        }
        assert_eq!(value, sym("x"));
    }

    #[test]
    fn test_parser_depth_limits() {
        let nested = |depth: usize| format!("{}x{}", "(".repeat(depth), ")".repeat(depth));

        assert!(parse(&nested(MAX_PARSE_DEPTH)).is_ok());
        assert!(parse_all(&nested(MAX_PARSE_DEPTH)).is_ok());

        let too_deep = |text: &str| {
            matches!(
                parse_all(text),
                Err(crate::Error::SyntaxError(ParseError {
                    kind: ParseErrorKind::TooDeeplyNested,
                    ..
                }))
            )
        };
        assert!(too_deep(&nested(MAX_PARSE_DEPTH + 1)));
        // Unclosed runs of '(' fail at the limit instead of exhausting the stack
        assert!(too_deep(&"(".repeat(20_000)));
        assert!(too_deep(&"(".repeat(200_000)));

        let Err(crate::Error::SyntaxError(err)) = parse(&"(".repeat(20_000)) else {
            panic!("expected syntax error");
        };
        assert!(err.message.contains("too deeply nested"));
        assert_eq!(err.found.as_deref(), Some("("));
    }
}
