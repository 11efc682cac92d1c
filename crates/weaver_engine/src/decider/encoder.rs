//! Symbolic encoding of constraint expressions into the solver theory.
//!
//! Structure maps one-to-one onto the Z3 term language; only property
//! accesses need help, so the encoder is parameterized by a callback that
//! produces the solver variable standing for `property(param)`. The two
//! consumers differ exactly there: the example aligner names variables per
//! candidate node, the implication checker per parameter slot.

use z3::ast::{Ast, Bool, Dynamic, Int};
use z3::Context;

use weaver_spec::{BinaryOp, ConstValue, Expr, Sort, UnaryOp};

use crate::error::{EngineError, EngineResult};

/// Encodes sort-checked expressions into Z3 terms.
pub struct ConstraintEncoder<'ctx, F> {
    ctx: &'ctx Context,
    encode_property: F,
}

impl<'ctx, F> ConstraintEncoder<'ctx, F>
where
    F: FnMut(&str, Sort, usize) -> Dynamic<'ctx>,
{
    /// `encode_property(name, sort, slot)` must return the solver variable
    /// standing for the property `name` of parameter `slot`.
    pub fn new(ctx: &'ctx Context, encode_property: F) -> Self {
        ConstraintEncoder {
            ctx,
            encode_property,
        }
    }

    /// Encodes a boolean expression; constraints are always boolean.
    pub fn encode_bool(&mut self, expr: &Expr) -> EngineResult<Bool<'ctx>> {
        as_bool(self.encode(expr)?)
    }

    fn encode(&mut self, expr: &Expr) -> EngineResult<Dynamic<'ctx>> {
        match expr {
            Expr::Const(ConstValue::Bool(b)) => {
                Ok(Dynamic::from_ast(&Bool::from_bool(self.ctx, *b)))
            }
            Expr::Const(ConstValue::Int(n)) => {
                Ok(Dynamic::from_ast(&Int::from_i64(self.ctx, *n)))
            }

            Expr::Param(_) => Err(EngineError::Encoding(
                "bare parameter reference outside property access".into(),
            )),

            Expr::Property {
                name,
                sort,
                operand,
            } => {
                let Expr::Param(slot) = operand.as_ref() else {
                    return Err(EngineError::Encoding(format!(
                        "property '{}' applied to a non-parameter",
                        name
                    )));
                };
                Ok((self.encode_property)(name, *sort, *slot))
            }

            Expr::Unary { op, operand } => {
                let inner = self.encode(operand)?;
                match op {
                    UnaryOp::Neg => Ok(Dynamic::from_ast(&-as_int(inner)?)),
                    UnaryOp::Not => Ok(Dynamic::from_ast(&as_bool(inner)?.not())),
                }
            }

            Expr::Binary { op, lhs, rhs } => {
                let l = self.encode(lhs)?;
                let r = self.encode(rhs)?;
                self.encode_binary(*op, l, r)
            }

            Expr::Cond {
                cond,
                then_val,
                else_val,
            } => {
                let c = as_bool(self.encode(cond)?)?;
                let t = self.encode(then_val)?;
                let e = self.encode(else_val)?;
                Ok(c.ite(&t, &e))
            }
        }
    }

    fn encode_binary(
        &mut self,
        op: BinaryOp,
        l: Dynamic<'ctx>,
        r: Dynamic<'ctx>,
    ) -> EngineResult<Dynamic<'ctx>> {
        let out = match op {
            BinaryOp::Add => Dynamic::from_ast(&(as_int(l)? + as_int(r)?)),
            BinaryOp::Sub => Dynamic::from_ast(&(as_int(l)? - as_int(r)?)),
            BinaryOp::Mul => Dynamic::from_ast(&(as_int(l)? * as_int(r)?)),
            BinaryOp::Div => Dynamic::from_ast(&(as_int(l)? / as_int(r)?)),
            BinaryOp::Mod => Dynamic::from_ast(&as_int(l)?.modulo(&as_int(r)?)),

            BinaryOp::Eq => Dynamic::from_ast(&l._eq(&r)),
            BinaryOp::Ne => Dynamic::from_ast(&l._eq(&r).not()),
            BinaryOp::Lt => Dynamic::from_ast(&as_int(l)?.lt(&as_int(r)?)),
            BinaryOp::Le => Dynamic::from_ast(&as_int(l)?.le(&as_int(r)?)),
            BinaryOp::Gt => Dynamic::from_ast(&as_int(l)?.gt(&as_int(r)?)),
            BinaryOp::Ge => Dynamic::from_ast(&as_int(l)?.ge(&as_int(r)?)),

            BinaryOp::And => {
                Dynamic::from_ast(&Bool::and(self.ctx, &[&as_bool(l)?, &as_bool(r)?]))
            }
            BinaryOp::Or => {
                Dynamic::from_ast(&Bool::or(self.ctx, &[&as_bool(l)?, &as_bool(r)?]))
            }
            BinaryOp::Imply => Dynamic::from_ast(&as_bool(l)?.implies(&as_bool(r)?)),
        };
        Ok(out)
    }
}

fn as_int(d: Dynamic) -> EngineResult<Int> {
    d.as_int()
        .ok_or_else(|| EngineError::Encoding("expected an integer term".into()))
}

fn as_bool(d: Dynamic) -> EngineResult<Bool> {
    d.as_bool()
        .ok_or_else(|| EngineError::Encoding("expected a boolean term".into()))
}
