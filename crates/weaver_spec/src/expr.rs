//! Typed constraint expressions attached to function productions.
//!
//! An [`Expr`] describes abstract semantics: `pos(a) && neg(b) ==> neg(r)`
//! says "whenever argument `a` is positive and argument `b` negative, the
//! result is negative". Parameters are slots (`@ret` is slot 0, `@arg_i` is
//! slot `i + 1`), and property access is the only way to observe them.
//!
//! Every node's sort is fixed at construction: the smart constructors return
//! a [`SpecError`] on a mismatch, so a stored expression is always well
//! sorted. Equality (`==`/`!=`) is polymorphic but requires both sides to
//! share a sort.

use std::fmt;

use crate::error::{SpecError, SpecResult};
use crate::types::Sort;

/// A boolean or integer literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
}

impl ConstValue {
    pub fn sort(&self) -> Sort {
        match self {
            ConstValue::Bool(_) => Sort::Bool,
            ConstValue::Int(_) => Sort::Int,
        }
    }
}

/// Unary operators: integer negation and boolean not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    /// The sort required of the operand, which is also the result sort.
    pub fn operand_sort(&self) -> Sort {
        match self {
            UnaryOp::Neg => Sort::Int,
            UnaryOp::Not => Sort::Bool,
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
        }
    }
}

/// Binary operators with C-style groups: arithmetic, comparison, logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Imply,
}

impl BinaryOp {
    /// The sort both operands must have, or `None` for the polymorphic
    /// equality operators (which only require matching sorts).
    pub fn operand_sort(&self) -> Option<Sort> {
        match self {
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Mod
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => Some(Sort::Int),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Imply => Some(Sort::Bool),
            BinaryOp::Eq | BinaryOp::Ne => None,
        }
    }

    /// The result sort of the operator.
    pub fn result_sort(&self) -> Sort {
        match self {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                Sort::Int
            }
            _ => Sort::Bool,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Imply => "==>",
        };
        write!(f, "{}", s)
    }
}

/// A sort-checked constraint expression tree.
///
/// Build with the smart constructors; the variants are public for matching.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal constant.
    Const(ConstValue),
    /// A parameter slot: 0 is `@ret`, `i + 1` is `@arg_i`.
    Param(usize),
    /// Property access on a parameter, with the property's declared sort.
    Property {
        name: String,
        sort: Sort,
        operand: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `if cond then then_val else else_val`.
    Cond {
        cond: Box<Expr>,
        then_val: Box<Expr>,
        else_val: Box<Expr>,
    },
}

impl Expr {
    /// The statically inferred sort of this expression.
    pub fn sort(&self) -> Sort {
        match self {
            Expr::Const(c) => c.sort(),
            Expr::Param(_) => Sort::Value,
            Expr::Property { sort, .. } => *sort,
            Expr::Unary { op, .. } => op.operand_sort(),
            Expr::Binary { op, .. } => op.result_sort(),
            Expr::Cond { then_val, .. } => then_val.sort(),
        }
    }

    pub fn int(value: i64) -> Expr {
        Expr::Const(ConstValue::Int(value))
    }

    pub fn boolean(value: bool) -> Expr {
        Expr::Const(ConstValue::Bool(value))
    }

    /// The `@ret` slot.
    pub fn ret() -> Expr {
        Expr::Param(0)
    }

    /// The `@arg_i` slot.
    pub fn arg(index: usize) -> Expr {
        Expr::Param(index + 1)
    }

    /// Property access `name(param)` with the declared result sort.
    ///
    /// The operand must have sort `Value`, i.e. be a parameter reference.
    pub fn property(name: impl Into<String>, sort: Sort, operand: Expr) -> SpecResult<Expr> {
        let name = name.into();
        if operand.sort() != Sort::Value {
            return Err(SpecError::SortMismatch {
                expected: Sort::Value,
                found: operand.sort(),
                context: format!("operand of property '{}'", name),
            });
        }
        Ok(Expr::Property {
            name,
            sort,
            operand: Box::new(operand),
        })
    }

    /// A unary application, checked against the operator's operand sort.
    pub fn unary(op: UnaryOp, operand: Expr) -> SpecResult<Expr> {
        if operand.sort() != op.operand_sort() {
            return Err(SpecError::SortMismatch {
                expected: op.operand_sort(),
                found: operand.sort(),
                context: format!("operand of '{}'", op),
            });
        }
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// A binary application.
    ///
    /// `==`/`!=` only require the two sides to share a sort; every other
    /// operator fixes the operand sort.
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> SpecResult<Expr> {
        match op.operand_sort() {
            None => {
                if lhs.sort() != rhs.sort() {
                    return Err(SpecError::SortMismatch {
                        expected: lhs.sort(),
                        found: rhs.sort(),
                        context: format!("right operand of '{}'", op),
                    });
                }
            }
            Some(expected) => {
                if lhs.sort() != expected {
                    return Err(SpecError::SortMismatch {
                        expected,
                        found: lhs.sort(),
                        context: format!("left operand of '{}'", op),
                    });
                }
                if rhs.sort() != expected {
                    return Err(SpecError::SortMismatch {
                        expected,
                        found: rhs.sort(),
                        context: format!("right operand of '{}'", op),
                    });
                }
            }
        }
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// A conditional `if cond then a else b`; the branches must share a sort.
    pub fn cond(cond: Expr, then_val: Expr, else_val: Expr) -> SpecResult<Expr> {
        if cond.sort() != Sort::Bool {
            return Err(SpecError::SortMismatch {
                expected: Sort::Bool,
                found: cond.sort(),
                context: "condition of 'if'".to_string(),
            });
        }
        if then_val.sort() != else_val.sort() {
            return Err(SpecError::SortMismatch {
                expected: then_val.sort(),
                found: else_val.sort(),
                context: "'else' branch".to_string(),
            });
        }
        Ok(Expr::Cond {
            cond: Box::new(cond),
            then_val: Box::new(then_val),
            else_val: Box::new(else_val),
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(ConstValue::Bool(b)) => {
                write!(f, "{}", if *b { "true" } else { "false" })
            }
            Expr::Const(ConstValue::Int(n)) => write!(f, "{}", n),
            Expr::Param(0) => write!(f, "@ret"),
            Expr::Param(i) => write!(f, "@arg{}", i - 1),
            Expr::Property { name, operand, .. } => write!(f, "{}({})", name, operand),
            Expr::Unary { op, operand } => write!(f, "({} {})", op, operand),
            Expr::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op, rhs),
            Expr::Cond {
                cond,
                then_val,
                else_val,
            } => write!(f, "(if {} then {} else {})", cond, then_val, else_val),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_sorts() {
        assert_eq!(Expr::int(3).sort(), Sort::Int);
        assert_eq!(Expr::boolean(true).sort(), Sort::Bool);
        assert_eq!(Expr::ret().sort(), Sort::Value);
    }

    #[test]
    fn property_requires_value_operand() {
        let ok = Expr::property("pos", Sort::Bool, Expr::arg(0));
        assert!(ok.is_ok());
        assert_eq!(ok.unwrap().sort(), Sort::Bool);

        let bad = Expr::property("pos", Sort::Bool, Expr::int(1));
        assert!(matches!(bad, Err(SpecError::SortMismatch { .. })));
    }

    #[test]
    fn arithmetic_requires_int_operands() {
        let ok = Expr::binary(BinaryOp::Add, Expr::int(1), Expr::int(2)).unwrap();
        assert_eq!(ok.sort(), Sort::Int);

        let bad = Expr::binary(BinaryOp::Add, Expr::int(1), Expr::boolean(true));
        assert!(bad.is_err());
    }

    #[test]
    fn equality_is_polymorphic_with_matching_sorts() {
        assert!(Expr::binary(BinaryOp::Eq, Expr::int(1), Expr::int(1)).is_ok());
        assert!(Expr::binary(BinaryOp::Eq, Expr::boolean(true), Expr::boolean(false)).is_ok());
        assert!(Expr::binary(BinaryOp::Eq, Expr::int(1), Expr::boolean(true)).is_err());
    }

    #[test]
    fn cond_branches_must_agree() {
        let ok = Expr::cond(Expr::boolean(true), Expr::int(1), Expr::int(2)).unwrap();
        assert_eq!(ok.sort(), Sort::Int);

        assert!(Expr::cond(Expr::int(1), Expr::int(1), Expr::int(2)).is_err());
        assert!(Expr::cond(Expr::boolean(true), Expr::int(1), Expr::boolean(false)).is_err());
    }

    #[test]
    fn display_matches_source_notation() {
        let prop = Expr::property("pos", Sort::Bool, Expr::arg(0)).unwrap();
        let neg = Expr::property("neg", Sort::Bool, Expr::ret()).unwrap();
        let imply = Expr::binary(BinaryOp::Imply, prop, neg).unwrap();
        assert_eq!(imply.to_string(), "(pos(@arg0) ==> neg(@ret))");
    }
}
