//! Type inference
//!
//! Every node kind implements [`TypeInference`]; [`Expression`] dispatches to
//! them exhaustively. Operands are checked through [`Expr::type_check`] so
//! their resolved types are recorded on the way.
//!
//! Structural checks deferred at construction time (index counts against the
//! storage tree, `append` on non-dynamic nodes) are done here.

use crate::config::CompileConfig;
use crate::expr::Expr;
use crate::expression::{
    ConstExpression, Expression, ExternalTensorExpression, GlobalPtrExpression,
    GlobalVariableExpression, IdExpression, LoopUniqueExpression, RandExpression,
    RangeAssumptionExpression, SNodeOpExpression, SNodeOpType, UnaryOpExpression, UnaryOpType,
};
use crate::group::ExprGroup;
use crate::types::DataType;
use tir_error::{Diagnostic, Diagnostics, ErrorCode, Result};

/// Per-kind result type computation
pub trait TypeInference {
    fn infer(&self, config: &CompileConfig) -> Result<DataType>;
}

impl TypeInference for Expression {
    fn infer(&self, config: &CompileConfig) -> Result<DataType> {
        match self {
            Expression::Const(e) => e.infer(config),
            Expression::Id(e) => e.infer(config),
            Expression::UnaryOp(e) => e.infer(config),
            Expression::GlobalVariable(e) => e.infer(config),
            Expression::GlobalPtr(e) => e.infer(config),
            Expression::ExternalTensor(e) => e.infer(config),
            Expression::SNodeOp(e) => e.infer(config),
            Expression::RangeAssumption(e) => e.infer(config),
            Expression::LoopUnique(e) => e.infer(config),
            Expression::Rand(e) => e.infer(config),
        }
    }
}

impl TypeInference for ConstExpression {
    fn infer(&self, _config: &CompileConfig) -> Result<DataType> {
        Ok(self.value().dt())
    }
}

impl TypeInference for IdExpression {
    fn infer(&self, _config: &CompileConfig) -> Result<DataType> {
        Err(
            Diagnostic::error(format!("identifier `{}` is used before it is declared", self.id()))
                .with_code(ErrorCode::UNDECLARED_IDENTIFIER)
                .with_help("declare it with `global_new` or `Expr::declare`"),
        )
    }
}

impl TypeInference for UnaryOpExpression {
    fn infer(&self, config: &CompileConfig) -> Result<DataType> {
        let operand = self.operand().type_check(config)?;
        match self.op() {
            UnaryOpType::CastValue => Ok(self.cast_type().unwrap_or(operand)),
            UnaryOpType::CastBits => {
                let target = self.cast_type().unwrap_or(operand);
                if target.bits() != operand.bits() {
                    return Err(Diagnostic::error(format!(
                        "bit_cast from {} to {} changes the width",
                        operand, target
                    ))
                    .with_code(ErrorCode::BIT_CAST_SIZE_MISMATCH)
                    .with_note(format!(
                        "source is {} bits, target is {} bits",
                        operand.bits(),
                        target.bits()
                    ))
                    .with_help("use `cast` to convert the value instead"));
                }
                Ok(target)
            }
            UnaryOpType::LogicNot | UnaryOpType::BitNot if operand.is_real() => {
                Err(invalid_operand(self.op(), operand, "an integer"))
            }
            UnaryOpType::Sqrt if !operand.is_real() => {
                Err(invalid_operand(self.op(), operand, "a floating point value"))
            }
            _ => Ok(operand),
        }
    }
}

fn invalid_operand(op: UnaryOpType, operand: DataType, expected: &str) -> Diagnostic {
    Diagnostic::error(format!("{} expects {}, found {}", op, expected, operand))
        .with_code(ErrorCode::INVALID_OPERAND)
}

impl TypeInference for GlobalVariableExpression {
    fn infer(&self, _config: &CompileConfig) -> Result<DataType> {
        self.dt().ok_or_else(|| {
            let name = match self.snode() {
                Some(snode) => snode.to_string(),
                None => self.ident().to_string(),
            };
            Diagnostic::error(format!("{} is a container and holds no values", name))
                .with_code(ErrorCode::INVALID_OPERAND)
        })
    }
}

/// Checks that every index is an integer and, when known, that there are as
/// many indices as the addressed object has dimensions.
fn check_indices(
    indices: &ExprGroup,
    expected: Option<usize>,
    target: &str,
    config: &CompileConfig,
) -> Result<()> {
    for (axis, index) in indices.iter().enumerate() {
        let dt = index.type_check(config)?;
        if !dt.is_integral() {
            return Err(Diagnostic::error(format!(
                "index {} of {} must be an integer, found {}",
                axis, target, dt
            ))
            .with_code(ErrorCode::INVALID_OPERAND));
        }
    }
    match expected {
        Some(expected) if expected != indices.len() => Err(Diagnostic::error(format!(
            "{} is accessed with {} indices but has {} dimensions",
            target,
            indices.len(),
            expected
        ))
        .with_code(ErrorCode::INDEX_COUNT_MISMATCH)),
        _ => Ok(()),
    }
}

fn dangling(snode: &crate::snode::SNodeRef) -> Diagnostic {
    Diagnostic::error(format!("storage node {} no longer exists", snode))
        .with_code(ErrorCode::DANGLING_STORAGE)
        .with_note("the storage tree was dropped while the graph was still in use")
}

impl TypeInference for GlobalPtrExpression {
    fn infer(&self, config: &CompileConfig) -> Result<DataType> {
        let var = self.var();
        let element = var.type_check(config)?;
        let expected = if let Some(tensor) = var.try_cast::<ExternalTensorExpression>() {
            Some(tensor.dim())
        } else {
            match var.cast::<GlobalVariableExpression>().snode() {
                Some(snode) => Some(
                    snode
                        .upgrade()
                        .ok_or_else(|| dangling(snode))?
                        .num_active_indices(),
                ),
                // Not placed yet; the layout decides later
                None => None,
            }
        };
        check_indices(self.indices(), expected, &var.to_string(), config)?;
        Ok(element)
    }
}

impl TypeInference for ExternalTensorExpression {
    fn infer(&self, _config: &CompileConfig) -> Result<DataType> {
        Ok(self.dt())
    }
}

impl TypeInference for SNodeOpExpression {
    fn infer(&self, config: &CompileConfig) -> Result<DataType> {
        let snode = self.snode();
        let node = snode.upgrade().ok_or_else(|| dangling(snode))?;
        if self.requires_dynamic() {
            return Err(Diagnostic::error(format!(
                "{} only works on dynamic nodes, {} is {}",
                self.op(),
                snode,
                node.node_type()
            ))
            .with_code(ErrorCode::INVALID_OPERAND));
        }
        check_indices(
            self.indices(),
            Some(node.num_active_indices()),
            &snode.to_string(),
            config,
        )?;
        if let Some(value) = self.value() {
            value.type_check(config)?;
        }
        Ok(match self.op() {
            SNodeOpType::GetAddr => DataType::U64,
            SNodeOpType::Append | SNodeOpType::IsActive | SNodeOpType::Length => DataType::I32,
        })
    }
}

impl TypeInference for RangeAssumptionExpression {
    fn infer(&self, config: &CompileConfig) -> Result<DataType> {
        let input = self.input().type_check(config)?;
        let base = self.base().type_check(config)?;
        if input != base || !input.is_integral() {
            return Err(Diagnostic::error(format!(
                "range assumption needs matching integer types, found {} and base {}",
                input, base
            ))
            .with_code(ErrorCode::TYPE_MISMATCH));
        }
        Ok(input)
    }
}

impl TypeInference for LoopUniqueExpression {
    fn infer(&self, config: &CompileConfig) -> Result<DataType> {
        self.input().type_check(config)
    }
}

impl TypeInference for RandExpression {
    fn infer(&self, _config: &CompileConfig) -> Result<DataType> {
        Ok(self.dt())
    }
}

/// Type checks a set of roots and collects every failure
pub struct TypeCheckPass<'a> {
    config: &'a CompileConfig,
    diagnostics: Diagnostics,
}

impl<'a> TypeCheckPass<'a> {
    pub fn new(config: &'a CompileConfig) -> Self {
        Self {
            config,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Returns the resolved type, or `None` after recording a diagnostic
    pub fn check(&mut self, expr: &Expr) -> Option<DataType> {
        match expr.type_check(self.config) {
            Ok(dt) => Some(dt),
            Err(diagnostic) => {
                tracing::warn!(expr = %expr, "{}", diagnostic);
                self.diagnostics.push(diagnostic);
                None
            }
        }
    }

    pub fn check_all<'e>(&mut self, exprs: impl IntoIterator<Item = &'e Expr>) {
        for expr in exprs {
            self.check(expr);
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }
}
