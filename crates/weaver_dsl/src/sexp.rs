//! Minimal s-expression support, used by tests and debugging tools.
//!
//! The printed forms are:
//!
//! - atoms: `(TypeName "literal")`
//! - params: `(@param i)`
//! - applies: `(name child...)`

use crate::error::{DslError, DslResult};
use crate::node::{Ast, NodeRef};

/// A parsed s-expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Sexp {
    /// A bare symbol, e.g. `plus` or `@param`.
    Sym(String),
    /// A double-quoted string.
    Str(String),
    /// An unsigned decimal integer.
    Num(usize),
    /// A parenthesized list.
    List(Vec<Sexp>),
}

/// Prints a node in s-expression form.
pub fn print_sexp(node: &NodeRef) -> String {
    match node.as_ref() {
        Ast::Atom { .. } => format!(
            "({} \"{}\")",
            node.ty().name(),
            node.data().unwrap_or_default()
        ),
        Ast::Param { .. } => format!("(@param {})", node.index().unwrap_or_default()),
        Ast::Apply { args, .. } => {
            let mut out = format!("({}", node.name().unwrap_or_default());
            for arg in args {
                out.push(' ');
                out.push_str(&print_sexp(arg));
            }
            out.push(')');
            out
        }
    }
}

/// Parses one s-expression, requiring the whole input to be consumed.
pub fn parse_sexp(src: &str) -> DslResult<Sexp> {
    let mut parser = SexpParser {
        src: src.as_bytes(),
        pos: 0,
    };
    parser.skip_ws();
    let sexp = parser.parse()?;
    parser.skip_ws();
    if parser.pos != parser.src.len() {
        return Err(DslError::Sexp(format!(
            "trailing input at byte {}",
            parser.pos
        )));
    }
    Ok(sexp)
}

struct SexpParser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> SexpParser<'a> {
    fn skip_ws(&mut self) {
        while self
            .src
            .get(self.pos)
            .map_or(false, |c| c.is_ascii_whitespace())
        {
            self.pos += 1;
        }
    }

    fn parse(&mut self) -> DslResult<Sexp> {
        match self.src.get(self.pos) {
            None => Err(DslError::Sexp("unexpected end of input".into())),
            Some(b'(') => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_ws();
                    match self.src.get(self.pos) {
                        None => {
                            return Err(DslError::Sexp("unclosed '('".into()));
                        }
                        Some(b')') => {
                            self.pos += 1;
                            return Ok(Sexp::List(items));
                        }
                        _ => items.push(self.parse()?),
                    }
                }
            }
            Some(b')') => Err(DslError::Sexp("unexpected ')'".into())),
            Some(b'"') => {
                self.pos += 1;
                let start = self.pos;
                while let Some(&c) = self.src.get(self.pos) {
                    if c == b'"' {
                        let text = std::str::from_utf8(&self.src[start..self.pos])
                            .map_err(|_| DslError::Sexp("non-utf8 string".into()))?;
                        self.pos += 1;
                        return Ok(Sexp::Str(text.to_string()));
                    }
                    self.pos += 1;
                }
                Err(DslError::Sexp("unterminated string".into()))
            }
            Some(_) => {
                let start = self.pos;
                while let Some(&c) = self.src.get(self.pos) {
                    if c.is_ascii_whitespace() || c == b'(' || c == b')' || c == b'"' {
                        break;
                    }
                    self.pos += 1;
                }
                let text = std::str::from_utf8(&self.src[start..self.pos])
                    .map_err(|_| DslError::Sexp("non-utf8 symbol".into()))?;
                if let Ok(n) = text.parse::<usize>() {
                    Ok(Sexp::Num(n))
                } else {
                    Ok(Sexp::Sym(text.to_string()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_lists() {
        let sexp = parse_sexp("(plus (@param 0) (SmallInt \"1\"))").unwrap();
        assert_eq!(
            sexp,
            Sexp::List(vec![
                Sexp::Sym("plus".into()),
                Sexp::List(vec![Sexp::Sym("@param".into()), Sexp::Num(0)]),
                Sexp::List(vec![Sexp::Sym("SmallInt".into()), Sexp::Str("1".into())]),
            ])
        );
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_sexp("(a) b").is_err());
        assert!(parse_sexp("(a").is_err());
        assert!(parse_sexp(")").is_err());
    }
}
