//! Tokenizer and reader for Nucleus source. One top-level expression per
//! call; anything after it is a parse error.

use crate::error::{EngineError, EngineResult};

use super::ast::{Expr, ExprKind, Span};

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    LParen,
    RParen,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Symbol(String),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    span: Span,
}

/// Parse a single top-level expression.
pub fn parse(source: &str) -> EngineResult<Expr> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(parse_error("empty input", Span::new(1, 1, 0)));
    }
    let mut pos = 0;
    let expr = parse_expr(&tokens, &mut pos)?;
    if pos < tokens.len() {
        return Err(parse_error(
            "expected end of input after the first expression",
            tokens[pos].span,
        ));
    }
    Ok(expr)
}

fn parse_error(message: impl Into<String>, span: Span) -> EngineError {
    EngineError::Parse {
        message: message.into(),
        span,
    }
}

fn parse_expr(tokens: &[Token], pos: &mut usize) -> EngineResult<Expr> {
    let token = tokens
        .get(*pos)
        .ok_or_else(|| parse_error("unexpected end of input", end_span(tokens)))?;
    *pos += 1;

    match &token.kind {
        TokenKind::Int(v) => Ok(Expr::new(ExprKind::Int(*v), token.span)),
        TokenKind::Float(v) => Ok(Expr::new(ExprKind::Float(*v), token.span)),
        TokenKind::Str(s) => Ok(Expr::new(ExprKind::Str(s.clone()), token.span)),
        TokenKind::Bool(b) => Ok(Expr::new(ExprKind::Bool(*b), token.span)),
        TokenKind::Symbol(name) => Ok(Expr::new(ExprKind::Symbol(name.clone()), token.span)),
        TokenKind::RParen => Err(parse_error("unexpected )", token.span)),
        TokenKind::LParen => {
            let open = token.span;
            let head_token = tokens
                .get(*pos)
                .ok_or_else(|| parse_error("unclosed (", open))?;
            let (head, head_span) = match &head_token.kind {
                TokenKind::Symbol(name) => (name.clone(), head_token.span),
                TokenKind::RParen => {
                    return Err(parse_error("empty form: expected a symbol head", head_token.span))
                }
                _ => {
                    return Err(parse_error(
                        "form head must be a symbol",
                        head_token.span,
                    ))
                }
            };
            *pos += 1;

            let mut args = Vec::new();
            loop {
                let next = tokens
                    .get(*pos)
                    .ok_or_else(|| parse_error("unclosed (", open))?;
                if next.kind == TokenKind::RParen {
                    let close = next.span;
                    *pos += 1;
                    let len = if close.line == open.line {
                        close.col + close.len - open.col
                    } else {
                        1
                    };
                    return Ok(Expr::new(
                        ExprKind::Call {
                            head,
                            head_span,
                            args,
                        },
                        Span::new(open.line, open.col, len),
                    ));
                }
                args.push(parse_expr(tokens, pos)?);
            }
        }
    }
}

fn end_span(tokens: &[Token]) -> Span {
    tokens
        .last()
        .map(|t| Span::new(t.span.line, t.span.col + t.span.len, 0))
        .unwrap_or(Span::new(1, 1, 0))
}

fn is_symbol_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_symbol_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '?' | '!')
}

fn tokenize(source: &str) -> EngineResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line: u32 = 1;
    let mut col: u32 = 1;

    macro_rules! bump {
        () => {{
            let c = chars.next();
            if let Some(ch) = c {
                if ch == '\n' {
                    line += 1;
                    col = 1;
                } else {
                    col += 1;
                }
            }
            c
        }};
    }

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            bump!();
            continue;
        }
        if c == ';' {
            while let Some(&ch) = chars.peek() {
                if ch == '\n' {
                    break;
                }
                bump!();
            }
            continue;
        }

        let start_line = line;
        let start_col = col;

        match c {
            '(' => {
                bump!();
                tokens.push(Token {
                    kind: TokenKind::LParen,
                    span: Span::new(start_line, start_col, 1),
                });
            }
            ')' => {
                bump!();
                tokens.push(Token {
                    kind: TokenKind::RParen,
                    span: Span::new(start_line, start_col, 1),
                });
            }
            '"' => {
                bump!();
                let mut value = String::new();
                let mut len: u32 = 1;
                let mut closed = false;
                while let Some(&ch) = chars.peek() {
                    bump!();
                    len += 1;
                    match ch {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => {
                            let esc = chars.peek().copied().ok_or_else(|| {
                                parse_error(
                                    "unterminated string",
                                    Span::new(start_line, start_col, len),
                                )
                            })?;
                            bump!();
                            len += 1;
                            match esc {
                                '"' => value.push('"'),
                                '\\' => value.push('\\'),
                                'n' => value.push('\n'),
                                't' => value.push('\t'),
                                'r' => value.push('\r'),
                                other => {
                                    return Err(parse_error(
                                        format!("unknown escape \\{other}"),
                                        Span::new(start_line, start_col, len),
                                    ))
                                }
                            }
                        }
                        other => value.push(other),
                    }
                }
                if !closed {
                    return Err(parse_error(
                        "unterminated string",
                        Span::new(start_line, start_col, len),
                    ));
                }
                tokens.push(Token {
                    kind: TokenKind::Str(value),
                    span: Span::new(start_line, start_col, len),
                });
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut text = String::new();
                if c == '-' {
                    bump!();
                    text.push('-');
                    match chars.peek() {
                        Some(d) if d.is_ascii_digit() => {}
                        _ => {
                            return Err(parse_error(
                                "expected digits after -",
                                Span::new(start_line, start_col, 1),
                            ))
                        }
                    }
                }
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        bump!();
                        text.push(d);
                    } else {
                        break;
                    }
                }
                let mut is_float = false;
                if chars.peek() == Some(&'.') {
                    bump!();
                    text.push('.');
                    is_float = true;
                    let mut any = false;
                    while let Some(&d) = chars.peek() {
                        if d.is_ascii_digit() {
                            bump!();
                            text.push(d);
                            any = true;
                        } else {
                            break;
                        }
                    }
                    if !any {
                        return Err(parse_error(
                            "expected digits after decimal point",
                            Span::new(start_line, start_col, text.len() as u32),
                        ));
                    }
                }
                // A number must end at a delimiter, not run into a symbol.
                if let Some(&next) = chars.peek() {
                    if is_symbol_continue(next) || next == '.' {
                        return Err(parse_error(
                            format!("invalid number literal {text}{next}"),
                            Span::new(start_line, start_col, text.len() as u32 + 1),
                        ));
                    }
                }
                let span = Span::new(start_line, start_col, text.len() as u32);
                let kind = if is_float {
                    let v: f64 = text.parse().map_err(|_| {
                        parse_error(format!("invalid number literal {text}"), span)
                    })?;
                    TokenKind::Float(v)
                } else {
                    match text.parse::<i64>() {
                        Ok(v) => TokenKind::Int(v),
                        // Magnitude beyond i64 falls back to float.
                        Err(_) => TokenKind::Float(text.parse::<f64>().map_err(|_| {
                            parse_error(format!("invalid number literal {text}"), span)
                        })?),
                    }
                };
                tokens.push(Token { kind, span });
            }
            c if is_symbol_start(c) => {
                let mut name = String::new();
                while let Some(&ch) = chars.peek() {
                    if is_symbol_continue(ch) {
                        bump!();
                        name.push(ch);
                    } else {
                        break;
                    }
                }
                let span = Span::new(start_line, start_col, name.len() as u32);
                let kind = match name.as_str() {
                    "true" => TokenKind::Bool(true),
                    "false" => TokenKind::Bool(false),
                    _ => TokenKind::Symbol(name),
                };
                tokens.push(Token { kind, span });
            }
            other => {
                return Err(parse_error(
                    format!("unexpected character {other:?}"),
                    Span::new(start_line, start_col, 1),
                ));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nucleus::ast::{call, int_lit, str_lit, sym};

    #[test]
    fn parse_atoms() {
        assert_eq!(parse("42").unwrap(), int_lit(42));
        assert_eq!(parse("-17").unwrap(), int_lit(-17));
        assert_eq!(parse("hello").unwrap(), sym("hello"));
        assert_eq!(parse(r#""text""#).unwrap(), str_lit("text"));
        assert!(matches!(parse("true").unwrap().kind, ExprKind::Bool(true)));
        assert!(matches!(parse("3.5").unwrap().kind, ExprKind::Float(v) if v == 3.5));
    }

    #[test]
    fn parse_nested_call() {
        let e = parse(r#"(count (grep "ERROR"))"#).unwrap();
        assert_eq!(e, call("count", vec![call("grep", vec![str_lit("ERROR")])]));
    }

    #[test]
    fn parse_symbol_charset() {
        assert_eq!(parse("fuzzy-search").unwrap(), sym("fuzzy-search"));
        assert_eq!(parse("eq?").unwrap(), sym("eq?"));
        assert_eq!(parse("_1").unwrap(), sym("_1"));
    }

    #[test]
    fn parse_string_escapes() {
        assert_eq!(
            parse(r#""a\"b\\c\nd\te\rf""#).unwrap(),
            str_lit("a\"b\\c\nd\te\rf")
        );
    }

    #[test]
    fn parse_comments_and_whitespace() {
        let e = parse("; leading comment\n  (count x) ; trailing\n").unwrap();
        assert_eq!(e, call("count", vec![sym("x")]));
    }

    #[test]
    fn parse_rejects_second_top_level_form() {
        let err = parse("(count x) (count y)").unwrap_err();
        assert_eq!(err.kind(), "ParseError");
        assert!(err.to_string().contains("end of input"));
    }

    #[test]
    fn parse_rejects_unclosed_paren() {
        let err = parse("(bogus").unwrap_err();
        assert!(err.to_string().contains("unclosed"));
    }

    #[test]
    fn parse_rejects_unexpected_close() {
        assert!(parse(")").is_err());
    }

    #[test]
    fn parse_rejects_non_symbol_head() {
        assert!(parse("(1 2 3)").is_err());
        assert!(parse("()").is_err());
    }

    #[test]
    fn parse_rejects_unterminated_string() {
        let err = parse(r#""abc"#).unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn parse_rejects_bad_numbers() {
        assert!(parse("1.").is_err());
        assert!(parse("1.2.3").is_err());
        assert!(parse("12abc").is_err());
        assert!(parse("-").is_err());
    }

    #[test]
    fn parse_error_carries_span() {
        let err = parse("(count\n  @)").unwrap_err();
        let span = err.span().unwrap();
        assert_eq!(span.line, 2);
        assert_eq!(span.col, 3);
    }

    #[test]
    fn print_parse_round_trip() {
        let sources = [
            "42",
            "-3.5",
            r#"(grep "SALES_")"#,
            r#"(map RESULTS (lambda x (parseCurrency (match x "\\$([\\d,]+)" 0))))"#,
            "(if (eq? a b) 1 2)",
            r#"(let note "line\nbreak")"#,
        ];
        for src in sources {
            let once = parse(src).unwrap();
            let twice = parse(&once.to_source()).unwrap();
            assert_eq!(once, twice, "round-trip failed for {src}");
        }
    }
}
