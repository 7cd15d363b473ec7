//! Free-standing graph builders
//!
//! Casts, random values, storage addressing and optimizer annotations.
//! None of these validate their operands against the storage tree; that
//! happens during type checking.

use crate::expr::Expr;
use crate::expression::{
    GlobalVariableExpression, IdExpression, LoopUniqueExpression, RandExpression,
    RangeAssumptionExpression, SNodeOpExpression, SNodeOpType, UnaryOpExpression, UnaryOpType,
};
use crate::group::ExprGroup;
use crate::identifier::Identifier;
use crate::snode::SNodeRef;
use crate::types::DataType;

/// Converts the value of `input` to `dt`
pub fn cast(input: &Expr, dt: DataType) -> Expr {
    Expr::make(UnaryOpExpression::cast(UnaryOpType::CastValue, input.clone(), dt))
}

/// Reinterprets the bits of `input` as `dt`
pub fn bit_cast(input: &Expr, dt: DataType) -> Expr {
    Expr::make(UnaryOpExpression::cast(UnaryOpType::CastBits, input.clone(), dt))
}

pub fn rand(dt: DataType) -> Expr {
    Expr::make(RandExpression::new(dt))
}

pub fn append(snode: impl Into<SNodeRef>, indices: impl Into<ExprGroup>, value: &Expr) -> Expr {
    Expr::make(SNodeOpExpression::with_value(
        snode.into(),
        SNodeOpType::Append,
        indices.into(),
        value.clone(),
    ))
}

/// `append` on the storage node behind a global variable
pub fn append_to(var: &Expr, indices: impl Into<ExprGroup>, value: &Expr) -> Expr {
    append(var.snode(), indices, value)
}

pub fn is_active(snode: impl Into<SNodeRef>, indices: impl Into<ExprGroup>) -> Expr {
    Expr::make(SNodeOpExpression::new(
        snode.into(),
        SNodeOpType::IsActive,
        indices.into(),
    ))
}

pub fn length(snode: impl Into<SNodeRef>, indices: impl Into<ExprGroup>) -> Expr {
    Expr::make(SNodeOpExpression::new(
        snode.into(),
        SNodeOpType::Length,
        indices.into(),
    ))
}

/// `length` on the storage node behind a global variable
pub fn length_of(var: &Expr, indices: impl Into<ExprGroup>) -> Expr {
    length(var.snode(), indices)
}

pub fn get_addr(snode: impl Into<SNodeRef>, indices: impl Into<ExprGroup>) -> Expr {
    Expr::make(SNodeOpExpression::new(
        snode.into(),
        SNodeOpType::GetAddr,
        indices.into(),
    ))
}

/// Hints that `base + low <= expr < base + high`
pub fn assume_range(expr: &Expr, base: &Expr, low: i32, high: i32) -> Expr {
    Expr::make(RangeAssumptionExpression::new(
        expr.clone(),
        base.clone(),
        low,
        high,
    ))
}

/// Hints that `input` is unique across loop iterations for accesses to
/// `covers`
pub fn loop_unique(input: &Expr, covers: impl IntoIterator<Item = SNodeRef>) -> Expr {
    Expr::make(LoopUniqueExpression::new(
        input.clone(),
        covers.into_iter().collect(),
    ))
}

/// Promotes an identifier to a global variable of type `dt`, keeping the
/// identifier
pub fn global_new(id_expr: &Expr, dt: DataType) -> Expr {
    assert!(
        id_expr.is::<IdExpression>(),
        "global_new expects an identifier, found a {} expression",
        id_expr.kind()
    );
    let ident = id_expr.cast::<IdExpression>().id().clone();
    Expr::make(GlobalVariableExpression::new(dt, ident))
}

pub fn global_new_named(dt: DataType, name: impl Into<String>) -> Expr {
    Expr::make(GlobalVariableExpression::new(dt, Identifier::named(name)))
}
