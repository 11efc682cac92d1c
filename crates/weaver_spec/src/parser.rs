//! Recursive-descent parser for the textual DSL spec format.
//!
//! The accepted grammar, one declaration per form:
//!
//! ```text
//! enum Name { "v0", "v1", ... }
//! value Name;                      value Name { prop: bool; n: int; }
//! program Name(T1, T2, ...) -> T;
//! func fname: LhsType r -> ArgType1 a, ArgType2 b { <expr>; <expr>; }
//! predicate pname(arg1, arg2, ...);
//! # line comments run to end of line
//! ```
//!
//! Types must be declared before they are referenced. Constraint expressions
//! follow C-style precedence: unary binds tightest, then `* / %`, `+ -`,
//! comparisons, `&&`, `||`, and right-associative `==>`;
//! `if c then t else f` is a primary form. Parameter slots are reachable
//! both positionally (`@ret`, `@argN`) and through the optional bindings
//! (`r`, `a`, `b` above).
//!
//! All name resolution and sort checking happens here; the returned
//! [`Spec`] is fully validated.

use weaver_base::{Span, SpannedError};

use crate::error::{SpecError, SpecResult};
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::lexer::{tokenize, Lexeme, Token};
use crate::predicate::PredArg;
use crate::spec::{Spec, SpecBuilder};
use crate::types::{Sort, TypeRef};

/// Parses spec source text into an immutable [`Spec`].
pub fn parse(src: &str) -> SpecResult<Spec> {
    let lexemes = tokenize(src)?;
    let parser = Parser {
        end: src.len(),
        lexemes,
        pos: 0,
        builder: SpecBuilder::new(),
    };
    let spec = parser.run()?;
    log::debug!(
        "parsed spec '{}': {} types, {} productions, {} predicates",
        spec.name(),
        spec.num_types(),
        spec.num_productions(),
        spec.num_predicates()
    );
    Ok(spec)
}

struct Parser {
    end: usize,
    lexemes: Vec<Lexeme>,
    pos: usize,
    builder: SpecBuilder,
}

/// Parameter bindings in scope while parsing one function's constraints.
struct FuncScope {
    /// Optional variable name per slot; slot 0 is the return.
    names: Vec<Option<String>>,
    /// The type of each slot.
    types: Vec<TypeRef>,
}

impl FuncScope {
    fn slot_of(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|n| n.as_deref() == Some(name))
    }
}

impl Parser {
    fn run(mut self) -> SpecResult<Spec> {
        while let Some(lexeme) = self.peek().cloned() {
            match lexeme.token {
                Token::KwEnum => self.enum_decl()?,
                Token::KwValue => self.value_decl()?,
                Token::KwProgram => self.program_decl()?,
                Token::KwFunc => self.func_decl()?,
                Token::KwPredicate => self.predicate_decl()?,
                _ => {
                    return Err(self.err_at(
                        "expected 'enum', 'value', 'program', 'func', or 'predicate'",
                        lexeme.span,
                    ));
                }
            }
        }
        self.builder.build()
    }

    // ---- Declarations ----

    fn enum_decl(&mut self) -> SpecResult<()> {
        self.bump(); // enum
        let name = self.expect_ident("enum type name")?;
        self.expect(&Token::LBrace, "'{'")?;
        let mut domain = Vec::new();
        loop {
            domain.push(self.expect_string("enum domain literal")?);
            if self.eat(&Token::Comma) {
                continue;
            }
            break;
        }
        self.expect(&Token::RBrace, "'}'")?;
        self.builder.define_enum(name, domain)?;
        Ok(())
    }

    fn value_decl(&mut self) -> SpecResult<()> {
        self.bump(); // value
        let name = self.expect_ident("value type name")?;
        let mut properties = Vec::new();
        if self.eat(&Token::LBrace) {
            while !self.eat(&Token::RBrace) {
                let pname = self.expect_ident("property name")?;
                self.expect(&Token::Colon, "':'")?;
                let sort = match self.bump() {
                    Some(Lexeme {
                        token: Token::KwBool,
                        ..
                    }) => Sort::Bool,
                    Some(Lexeme {
                        token: Token::KwInt,
                        ..
                    }) => Sort::Int,
                    other => return Err(self.unexpected("'bool' or 'int'", other)),
                };
                self.expect(&Token::Semi, "';'")?;
                properties.push((pname, sort));
            }
        } else {
            self.expect(&Token::Semi, "';' or '{'")?;
        }
        self.builder.define_value(name, properties)?;
        Ok(())
    }

    fn program_decl(&mut self) -> SpecResult<()> {
        self.bump(); // program
        let name = self.expect_ident("program name")?;
        self.expect(&Token::LParen, "'('")?;
        let mut inputs = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                inputs.push(self.type_ref()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                break;
            }
        }
        self.expect(&Token::RParen, "')'")?;
        self.expect(&Token::Arrow, "'->'")?;
        let output = self.type_ref()?;
        self.expect(&Token::Semi, "';'")?;
        self.builder.set_program(name, inputs, output)?;
        Ok(())
    }

    fn func_decl(&mut self) -> SpecResult<()> {
        self.bump(); // func
        let name = self.expect_ident("function name")?;
        self.expect(&Token::Colon, "':'")?;
        let (lhs, lhs_binding) = self.type_binding()?;
        self.expect(&Token::Arrow, "'->'")?;
        let mut rhs = Vec::new();
        let mut names = vec![lhs_binding];
        let mut slot_types = vec![lhs.clone()];
        loop {
            let (ty, binding) = self.type_binding()?;
            rhs.push(ty.clone());
            names.push(binding);
            slot_types.push(ty);
            if self.eat(&Token::Comma) {
                continue;
            }
            break;
        }
        let scope = FuncScope {
            names,
            types: slot_types,
        };
        let mut constraints = Vec::new();
        if self.eat(&Token::LBrace) {
            while !self.eat(&Token::RBrace) {
                let expr = self.imply_expr(&scope)?;
                self.expect(&Token::Semi, "';'")?;
                constraints.push(expr);
            }
        } else {
            self.expect(&Token::Semi, "';' or '{'")?;
        }
        self.builder.add_function(name, lhs, rhs, constraints)?;
        Ok(())
    }

    fn predicate_decl(&mut self) -> SpecResult<()> {
        self.bump(); // predicate
        let name = self.expect_ident("predicate name")?;
        self.expect(&Token::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                args.push(self.predicate_arg()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                break;
            }
        }
        self.expect(&Token::RParen, "')'")?;
        self.expect(&Token::Semi, "';'")?;
        self.builder.add_predicate(name, args);
        Ok(())
    }

    fn predicate_arg(&mut self) -> SpecResult<PredArg> {
        let negate = self.eat(&Token::Minus);
        match self.bump() {
            Some(Lexeme {
                token: Token::Str(s),
                ..
            }) if !negate => Ok(PredArg::Str(s)),
            Some(Lexeme {
                token: Token::Ident(s),
                ..
            }) if !negate => Ok(PredArg::Str(s)),
            Some(Lexeme {
                token: Token::KwTrue,
                ..
            }) if !negate => Ok(PredArg::Bool(true)),
            Some(Lexeme {
                token: Token::KwFalse,
                ..
            }) if !negate => Ok(PredArg::Bool(false)),
            Some(Lexeme {
                token: Token::Int(n),
                ..
            }) => Ok(PredArg::Int(if negate { -n } else { n })),
            Some(Lexeme {
                token: Token::Float(x),
                ..
            }) => Ok(PredArg::Float(if negate { -x } else { x })),
            other => Err(self.unexpected("a predicate argument", other)),
        }
    }

    // ---- Types ----

    fn type_ref(&mut self) -> SpecResult<TypeRef> {
        let name = self.expect_ident("type name")?;
        self.builder
            .lookup_type(&name)
            .ok_or(SpecError::UnknownType { name })
    }

    /// `TypeName [binding]` in a func signature.
    fn type_binding(&mut self) -> SpecResult<(TypeRef, Option<String>)> {
        let ty = self.type_ref()?;
        let binding = match self.peek() {
            Some(Lexeme {
                token: Token::Ident(_),
                ..
            }) => Some(self.expect_ident("binding name")?),
            _ => None,
        };
        Ok((ty, binding))
    }

    // ---- Constraint expressions, lowest precedence first ----

    fn imply_expr(&mut self, scope: &FuncScope) -> SpecResult<Expr> {
        let lhs = self.or_expr(scope)?;
        if self.eat(&Token::Implies) {
            let rhs = self.imply_expr(scope)?; // right-assoc
            return Expr::binary(BinaryOp::Imply, lhs, rhs);
        }
        Ok(lhs)
    }

    fn or_expr(&mut self, scope: &FuncScope) -> SpecResult<Expr> {
        let mut lhs = self.and_expr(scope)?;
        while self.eat(&Token::OrOr) {
            let rhs = self.and_expr(scope)?;
            lhs = Expr::binary(BinaryOp::Or, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn and_expr(&mut self, scope: &FuncScope) -> SpecResult<Expr> {
        let mut lhs = self.cmp_expr(scope)?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.cmp_expr(scope)?;
            lhs = Expr::binary(BinaryOp::And, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn cmp_expr(&mut self, scope: &FuncScope) -> SpecResult<Expr> {
        let lhs = self.add_expr(scope)?;
        let op = match self.peek().map(|l| &l.token) {
            Some(Token::EqEq) => BinaryOp::Eq,
            Some(Token::BangEq) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.add_expr(scope)?;
        Expr::binary(op, lhs, rhs)
    }

    fn add_expr(&mut self, scope: &FuncScope) -> SpecResult<Expr> {
        let mut lhs = self.mul_expr(scope)?;
        loop {
            let op = match self.peek().map(|l| &l.token) {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.mul_expr(scope)?;
            lhs = Expr::binary(op, lhs, rhs)?;
        }
    }

    fn mul_expr(&mut self, scope: &FuncScope) -> SpecResult<Expr> {
        let mut lhs = self.unary_expr(scope)?;
        loop {
            let op = match self.peek().map(|l| &l.token) {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.unary_expr(scope)?;
            lhs = Expr::binary(op, lhs, rhs)?;
        }
    }

    fn unary_expr(&mut self, scope: &FuncScope) -> SpecResult<Expr> {
        if self.eat(&Token::Minus) {
            let operand = self.unary_expr(scope)?;
            return Expr::unary(UnaryOp::Neg, operand);
        }
        if self.eat(&Token::Bang) {
            let operand = self.unary_expr(scope)?;
            return Expr::unary(UnaryOp::Not, operand);
        }
        self.primary_expr(scope)
    }

    fn primary_expr(&mut self, scope: &FuncScope) -> SpecResult<Expr> {
        match self.bump() {
            Some(Lexeme {
                token: Token::LParen,
                ..
            }) => {
                let inner = self.imply_expr(scope)?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Lexeme {
                token: Token::KwIf, ..
            }) => {
                let cond = self.imply_expr(scope)?;
                self.expect(&Token::KwThen, "'then'")?;
                let then_val = self.imply_expr(scope)?;
                self.expect(&Token::KwElse, "'else'")?;
                let else_val = self.imply_expr(scope)?;
                Expr::cond(cond, then_val, else_val)
            }
            Some(Lexeme {
                token: Token::KwTrue,
                ..
            }) => Ok(Expr::boolean(true)),
            Some(Lexeme {
                token: Token::KwFalse,
                ..
            }) => Ok(Expr::boolean(false)),
            Some(Lexeme {
                token: Token::Int(n),
                ..
            }) => Ok(Expr::int(n)),
            Some(Lexeme {
                token: Token::AtRet,
                ..
            }) => Ok(Expr::ret()),
            Some(Lexeme {
                token: Token::AtArg(index),
                span,
            }) => {
                if index + 1 >= scope.types.len() {
                    return Err(
                        self.err_at(format!("@arg{} is out of range", index), span)
                    );
                }
                Ok(Expr::arg(index))
            }
            Some(Lexeme {
                token: Token::Ident(name),
                span,
            }) => {
                if self.eat(&Token::LParen) {
                    let operand = self.imply_expr(scope)?;
                    self.expect(&Token::RParen, "')'")?;
                    return self.property_expr(scope, &name, operand, span);
                }
                match scope.slot_of(&name) {
                    Some(slot) => Ok(Expr::Param(slot)),
                    None => Err(self.err_at(
                        format!("no parameter binding named '{}'", name),
                        span,
                    )),
                }
            }
            other => Err(self.unexpected("an expression", other)),
        }
    }

    fn property_expr(
        &self,
        scope: &FuncScope,
        name: &str,
        operand: Expr,
        span: Span,
    ) -> SpecResult<Expr> {
        let Expr::Param(slot) = operand else {
            return Err(self.err_at(
                format!("property '{}' must be applied to a parameter", name),
                span,
            ));
        };
        let ty = &scope.types[slot];
        let sort = ty.property_sort_or_raise(name)?;
        Expr::property(name, sort, Expr::Param(slot))
    }

    // ---- Token plumbing ----

    fn peek(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn bump(&mut self) -> Option<Lexeme> {
        let lexeme = self.lexemes.get(self.pos).cloned();
        if lexeme.is_some() {
            self.pos += 1;
        }
        lexeme
    }

    fn check(&self, token: &Token) -> bool {
        self.peek().map_or(false, |l| l.token == *token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> SpecResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            let next = self.peek().cloned();
            Err(self.unexpected(what, next))
        }
    }

    fn expect_ident(&mut self, what: &str) -> SpecResult<String> {
        match self.bump() {
            Some(Lexeme {
                token: Token::Ident(name),
                ..
            }) => Ok(name),
            other => Err(self.unexpected(what, other)),
        }
    }

    fn expect_string(&mut self, what: &str) -> SpecResult<String> {
        match self.bump() {
            Some(Lexeme {
                token: Token::Str(text),
                ..
            }) => Ok(text),
            other => Err(self.unexpected(what, other)),
        }
    }

    fn err_at(&self, message: impl Into<String>, span: Span) -> SpecError {
        SpecError::Syntax(SpannedError::new(message, span))
    }

    fn unexpected(&self, what: &str, found: Option<Lexeme>) -> SpecError {
        match found {
            Some(lexeme) => self.err_at(
                format!("expected {}, found {:?}", what, lexeme.token),
                lexeme.span,
            ),
            None => self.err_at(
                format!("expected {}, found end of input", what),
                Span::point(self.end),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{BinaryOp, Expr};

    const TOY: &str = r#"
        # toy arithmetic grammar
        enum SmallInt { "0", "1", "2", "3" }
        value Int {
            pos: bool;
            neg: bool;
        }
        value Empty;

        program Toy(Int, Int) -> Int;
        func const: Int -> SmallInt;
        func plus: Int -> Int, Int;
        func minus: Int -> Int, Int;
        func mult: Int r -> Int a, Int b {
            pos(a) && neg(b) ==> neg(r);
        }
        func empty: Empty -> Empty;

        predicate occurs("plus", 100);
        predicate is_parent("mult", "plus", 2);
    "#;

    #[test]
    fn parses_toy_grammar() {
        let spec = parse(TOY).unwrap();
        assert_eq!(spec.name(), "Toy");
        assert_eq!(spec.num_inputs(), 2);
        assert_eq!(spec.output().name(), "Int");
        // 5 functions + 4 enum choices + 2 params
        assert_eq!(spec.num_productions(), 11);
        assert_eq!(spec.num_predicates(), 2);
        assert_eq!(spec.max_arity(), 2);

        let mult = spec.function_production_or_raise("mult").unwrap();
        assert_eq!(mult.constraints().len(), 1);
        assert_eq!(
            mult.constraints()[0].to_string(),
            "((pos(@arg0) && neg(@arg1)) ==> neg(@ret))"
        );
    }

    #[test]
    fn positional_and_named_references_agree() {
        let named = parse(
            r#"
            value Int { pos: bool; }
            program P(Int) -> Int;
            func f: Int r -> Int a { pos(a) ==> pos(r); }
            "#,
        )
        .unwrap();
        let positional = parse(
            r#"
            value Int { pos: bool; }
            program P(Int) -> Int;
            func f: Int -> Int { pos(@arg0) ==> pos(@ret); }
            "#,
        )
        .unwrap();
        let c0 = &named.function_production("f").unwrap().constraints()[0];
        let c1 = &positional.function_production("f").unwrap().constraints()[0];
        assert_eq!(c0, c1);
    }

    #[test]
    fn precedence_binds_imply_loosest() {
        let spec = parse(
            r#"
            value Int { rows: int; sorted: bool; }
            program P(Int) -> Int;
            func f: Int r -> Int a {
                rows(a) + 1 * 2 < 3 && sorted(a) ==> sorted(r);
            }
            "#,
        )
        .unwrap();
        let c = &spec.function_production("f").unwrap().constraints()[0];
        // ((rows(a) + (1 * 2)) < 3) && sorted(a), then ==> at the top
        let Expr::Binary { op, lhs, .. } = c else {
            panic!("expected implication at the root, got {}", c)
        };
        assert_eq!(*op, BinaryOp::Imply);
        let Expr::Binary { op: lop, .. } = lhs.as_ref() else {
            panic!("expected conjunction on the left")
        };
        assert_eq!(*lop, BinaryOp::And);
        assert_eq!(
            c.to_string(),
            "((((rows(@arg0) + (1 * 2)) < 3) && sorted(@arg0)) ==> sorted(@ret))"
        );
    }

    #[test]
    fn imply_is_right_associative() {
        let spec = parse(
            r#"
            value Int { pos: bool; }
            program P(Int) -> Int;
            func f: Int r -> Int a { pos(a) ==> pos(a) ==> pos(r); }
            "#,
        )
        .unwrap();
        let c = &spec.function_production("f").unwrap().constraints()[0];
        assert_eq!(
            c.to_string(),
            "(pos(@arg0) ==> (pos(@arg0) ==> pos(@ret)))"
        );
    }

    #[test]
    fn if_then_else_is_a_primary() {
        let spec = parse(
            r#"
            value Int { rows: int; }
            program P(Int) -> Int;
            func f: Int r -> Int a {
                rows(r) == (if rows(a) > 0 then rows(a) else 0);
            }
            "#,
        )
        .unwrap();
        let c = &spec.function_production("f").unwrap().constraints()[0];
        assert_eq!(
            c.to_string(),
            "(rows(@ret) == (if (rows(@arg0) > 0) then rows(@arg0) else 0))"
        );
    }

    #[test]
    fn unknown_type_is_reported() {
        let res = parse("program P(Mystery) -> Mystery;");
        assert!(matches!(res, Err(SpecError::UnknownType { .. })));
    }

    #[test]
    fn unknown_property_is_reported() {
        let res = parse(
            r#"
            value Int;
            program P(Int) -> Int;
            func f: Int r -> Int a { pos(a) ==> pos(r); }
            "#,
        );
        assert!(matches!(res, Err(SpecError::UnknownProperty { .. })));
    }

    #[test]
    fn unbound_variable_is_reported() {
        let res = parse(
            r#"
            value Int { pos: bool; }
            program P(Int) -> Int;
            func f: Int -> Int { pos(b) ==> pos(@ret); }
            "#,
        );
        assert!(matches!(res, Err(SpecError::Syntax(_))));
    }

    #[test]
    fn arg_reference_out_of_range_is_reported() {
        let res = parse(
            r#"
            value Int { pos: bool; }
            program P(Int) -> Int;
            func f: Int -> Int { pos(@arg1) ==> pos(@ret); }
            "#,
        );
        assert!(matches!(res, Err(SpecError::Syntax(_))));
    }

    #[test]
    fn nullary_function_is_reported() {
        // `func g: Int -> ;` is a syntax error before the builder ever sees it
        let res = parse(
            r#"
            value Int;
            program P(Int) -> Int;
            func g: Int -> ;
            "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn bare_identifier_predicate_args_become_strings() {
        let spec = parse(
            r#"
            value Int;
            program P(Int) -> Int;
            func f: Int -> Int;
            predicate occurs(f, 100);
            predicate distinct_filters(f, 0, 1);
            "#,
        )
        .unwrap();
        let pred = spec.predicates_with_name("occurs").next().unwrap();
        assert_eq!(pred.args()[0].as_str(), Some("f"));
        assert_eq!(pred.args()[1].as_int(), Some(100));
    }

    #[test]
    fn comments_are_ignored_anywhere() {
        let spec = parse(
            "# leading\nvalue Int; # trailing\nprogram P(Int) -> Int; # end\n",
        )
        .unwrap();
        assert_eq!(spec.name(), "P");
    }
}
