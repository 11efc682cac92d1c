//! Tokenizer for the textual DSL spec format.
//!
//! The format is line-oriented only in its comments (`#` to end of line);
//! declarations may span lines freely. Tokens carry [`Span`]s so the parser
//! can point at the offending text.

use weaver_base::{Result, Span, SpannedError};

/// One token of spec source.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    /// The `@ret` return-slot reference.
    AtRet,
    /// An `@argN` argument-slot reference.
    AtArg(usize),

    KwEnum,
    KwValue,
    KwProgram,
    KwFunc,
    KwPredicate,
    KwIf,
    KwThen,
    KwElse,
    KwTrue,
    KwFalse,
    KwBool,
    KwInt,

    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Semi,
    Colon,
    Arrow,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    BangEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Implies,
    Bang,
}

/// A token with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub span: Span,
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.pos += 1;
                }
                b'#' => {
                    while let Some(c) = self.peek() {
                        self.pos += 1;
                        if c == b'\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn ident(&mut self) -> (String, Span) {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos])
            .expect("identifier bytes are ascii")
            .to_string();
        (text, Span::new(start, self.pos))
    }

    fn number(&mut self) -> Result<Lexeme> {
        let start = self.pos;
        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') && self.peek2().map_or(false, |c| c.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let span = Span::new(start, self.pos);
        let text = std::str::from_utf8(&self.src[start..self.pos]).expect("digits are ascii");
        let token = if is_float {
            Token::Float(
                text.parse()
                    .map_err(|_| SpannedError::new(format!("invalid number '{}'", text), span))?,
            )
        } else {
            Token::Int(
                text.parse()
                    .map_err(|_| SpannedError::new(format!("invalid number '{}'", text), span))?,
            )
        };
        Ok(Lexeme { token, span })
    }

    fn string(&mut self) -> Result<Lexeme> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut text = String::new();
        loop {
            match self.bump() {
                None | Some(b'\n') => {
                    return Err(SpannedError::new(
                        "unterminated string literal",
                        Span::new(start, self.pos),
                    ));
                }
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'"') => text.push('"'),
                    Some(b'\\') => text.push('\\'),
                    Some(b'n') => text.push('\n'),
                    Some(b't') => text.push('\t'),
                    other => {
                        return Err(SpannedError::new(
                            format!(
                                "unknown escape '\\{}'",
                                other.map(|c| c as char).unwrap_or(' ')
                            ),
                            Span::new(self.pos.saturating_sub(2), self.pos),
                        ));
                    }
                },
                Some(c) => text.push(c as char),
            }
        }
        Ok(Lexeme {
            token: Token::Str(text),
            span: Span::new(start, self.pos),
        })
    }

    fn at_reference(&mut self) -> Result<Lexeme> {
        let start = self.pos;
        self.pos += 1; // '@'
        let (name, _) = self.ident();
        let span = Span::new(start, self.pos);
        if name == "ret" {
            return Ok(Lexeme {
                token: Token::AtRet,
                span,
            });
        }
        if let Some(digits) = name.strip_prefix("arg") {
            if let Ok(index) = digits.parse::<usize>() {
                return Ok(Lexeme {
                    token: Token::AtArg(index),
                    span,
                });
            }
        }
        Err(SpannedError::new(
            format!("unknown parameter reference '@{}'", name),
            span,
        ))
    }

    fn punct(&mut self, first: u8) -> Result<Lexeme> {
        let start = self.pos;
        let single = |lexer: &mut Lexer, token| {
            lexer.pos += 1;
            Ok(Lexeme {
                token,
                span: Span::new(start, start + 1),
            })
        };
        let double = |lexer: &mut Lexer, token| {
            lexer.pos += 2;
            Ok(Lexeme {
                token,
                span: Span::new(start, start + 2),
            })
        };
        match (first, self.peek2()) {
            (b'=', Some(b'=')) => {
                if self.src.get(self.pos + 2) == Some(&b'>') {
                    self.pos += 3;
                    Ok(Lexeme {
                        token: Token::Implies,
                        span: Span::new(start, start + 3),
                    })
                } else {
                    double(self, Token::EqEq)
                }
            }
            (b'!', Some(b'=')) => double(self, Token::BangEq),
            (b'<', Some(b'=')) => double(self, Token::Le),
            (b'>', Some(b'=')) => double(self, Token::Ge),
            (b'&', Some(b'&')) => double(self, Token::AndAnd),
            (b'|', Some(b'|')) => double(self, Token::OrOr),
            (b'-', Some(b'>')) => double(self, Token::Arrow),
            (b'{', _) => single(self, Token::LBrace),
            (b'}', _) => single(self, Token::RBrace),
            (b'(', _) => single(self, Token::LParen),
            (b')', _) => single(self, Token::RParen),
            (b',', _) => single(self, Token::Comma),
            (b';', _) => single(self, Token::Semi),
            (b':', _) => single(self, Token::Colon),
            (b'+', _) => single(self, Token::Plus),
            (b'-', _) => single(self, Token::Minus),
            (b'*', _) => single(self, Token::Star),
            (b'/', _) => single(self, Token::Slash),
            (b'%', _) => single(self, Token::Percent),
            (b'<', _) => single(self, Token::Lt),
            (b'>', _) => single(self, Token::Gt),
            (b'!', _) => single(self, Token::Bang),
            (c, _) => Err(SpannedError::new(
                format!("unexpected character '{}'", c as char),
                Span::new(start, start + 1),
            )),
        }
    }
}

fn keyword(name: &str) -> Option<Token> {
    match name {
        "enum" => Some(Token::KwEnum),
        "value" => Some(Token::KwValue),
        "program" => Some(Token::KwProgram),
        "func" => Some(Token::KwFunc),
        "predicate" => Some(Token::KwPredicate),
        "if" => Some(Token::KwIf),
        "then" => Some(Token::KwThen),
        "else" => Some(Token::KwElse),
        "true" => Some(Token::KwTrue),
        "false" => Some(Token::KwFalse),
        "bool" => Some(Token::KwBool),
        "int" => Some(Token::KwInt),
        _ => None,
    }
}

/// Tokenizes spec source text.
pub fn tokenize(src: &str) -> Result<Vec<Lexeme>> {
    let mut lexer = Lexer::new(src);
    let mut out = Vec::new();
    loop {
        lexer.skip_trivia();
        let Some(c) = lexer.peek() else { break };
        let lexeme = if c.is_ascii_alphabetic() || c == b'_' {
            let (name, span) = lexer.ident();
            let token = keyword(&name).unwrap_or(Token::Ident(name));
            Lexeme { token, span }
        } else if c.is_ascii_digit() {
            lexer.number()?
        } else if c == b'"' {
            lexer.string()?
        } else if c == b'@' {
            lexer.at_reference()?
        } else {
            lexer.punct(c)?
        };
        out.push(lexeme);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|l| l.token).collect()
    }

    #[test]
    fn lexes_enum_declaration() {
        assert_eq!(
            tokens(r#"enum SmallInt { "0", "-1" }"#),
            vec![
                Token::KwEnum,
                Token::Ident("SmallInt".into()),
                Token::LBrace,
                Token::Str("0".into()),
                Token::Comma,
                Token::Str("-1".into()),
                Token::RBrace,
            ]
        );
    }

    #[test]
    fn lexes_operators_longest_first() {
        assert_eq!(
            tokens("==> == < <= ! != && ||"),
            vec![
                Token::Implies,
                Token::EqEq,
                Token::Lt,
                Token::Le,
                Token::Bang,
                Token::BangEq,
                Token::AndAnd,
                Token::OrOr,
            ]
        );
    }

    #[test]
    fn bare_equals_is_an_error() {
        assert!(tokenize("=").is_err());
    }

    #[test]
    fn lexes_arrow_vs_minus() {
        assert_eq!(
            tokens("a -> b - c"),
            vec![
                Token::Ident("a".into()),
                Token::Arrow,
                Token::Ident("b".into()),
                Token::Minus,
                Token::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn lexes_param_references() {
        assert_eq!(tokens("@ret @arg0 @arg12"), vec![
            Token::AtRet,
            Token::AtArg(0),
            Token::AtArg(12),
        ]);
        assert!(tokenize("@bogus").is_err());
    }

    #[test]
    fn skips_line_comments() {
        assert_eq!(
            tokens("a # the rest is ignored\nb"),
            vec![Token::Ident("a".into()), Token::Ident("b".into())]
        );
    }

    #[test]
    fn lexes_numbers() {
        assert_eq!(tokens("100 2.5"), vec![Token::Int(100), Token::Float(2.5)]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("\"abc").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            tokens(r#""a\"b\\c""#),
            vec![Token::Str("a\"b\\c".into())]
        );
    }
}
