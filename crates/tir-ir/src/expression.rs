//! Expression nodes
//!
//! One payload struct per node kind, gathered in the closed [`Expression`]
//! enum. Serialization is the `Display` impl of each payload; type inference
//! lives in [`crate::typeck`].

use crate::expr::Expr;
use crate::group::ExprGroup;
use crate::identifier::Identifier;
use crate::snode::{SNode, SNodeRef, SNodeType};
use crate::types::DataType;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Node kind discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Const,
    Id,
    UnaryOp,
    GlobalVariable,
    GlobalPtr,
    ExternalTensor,
    SNodeOp,
    RangeAssumption,
    LoopUnique,
    Rand,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Const => "const",
            Kind::Id => "id",
            Kind::UnaryOp => "unary_op",
            Kind::GlobalVariable => "global_variable",
            Kind::GlobalPtr => "global_ptr",
            Kind::ExternalTensor => "external_tensor",
            Kind::SNodeOp => "snode_op",
            Kind::RangeAssumption => "range_assumption",
            Kind::LoopUnique => "loop_unique",
            Kind::Rand => "rand",
        };
        f.write_str(name)
    }
}

/// Literal value of a constant, tagged with its exact width
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Literal {
    pub fn dt(&self) -> DataType {
        match self {
            Literal::I16(_) => DataType::I16,
            Literal::I32(_) => DataType::I32,
            Literal::I64(_) => DataType::I64,
            Literal::F32(_) => DataType::F32,
            Literal::F64(_) => DataType::F64,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::I16(v) => write!(f, "{}", v),
            Literal::I32(v) => write!(f, "{}", v),
            Literal::I64(v) => write!(f, "{}", v),
            // Debug keeps the trailing `.0` on whole floats
            Literal::F32(v) => write!(f, "{:?}", v),
            Literal::F64(v) => write!(f, "{:?}", v),
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOpType {
    Neg,
    Sqrt,
    Abs,
    BitNot,
    LogicNot,
    /// Converts the value, e.g. `3 -> 3.0`
    CastValue,
    /// Reinterprets the bit pattern
    CastBits,
}

impl UnaryOpType {
    pub fn is_cast(&self) -> bool {
        matches!(self, UnaryOpType::CastValue | UnaryOpType::CastBits)
    }
}

impl fmt::Display for UnaryOpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnaryOpType::Neg => "neg",
            UnaryOpType::Sqrt => "sqrt",
            UnaryOpType::Abs => "abs",
            UnaryOpType::BitNot => "bit_not",
            UnaryOpType::LogicNot => "logic_not",
            UnaryOpType::CastValue => "cast_value",
            UnaryOpType::CastBits => "cast_bits",
        };
        f.write_str(name)
    }
}

/// Storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SNodeOpType {
    Append,
    IsActive,
    Length,
    GetAddr,
}

impl fmt::Display for SNodeOpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SNodeOpType::Append => "append",
            SNodeOpType::IsActive => "is_active",
            SNodeOpType::Length => "length",
            SNodeOpType::GetAddr => "get_addr",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct ConstExpression {
    value: Literal,
}

impl ConstExpression {
    pub fn new(value: Literal) -> Self {
        Self { value }
    }

    pub fn value(&self) -> Literal {
        self.value
    }
}

impl fmt::Display for ConstExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "const<{}>({})", self.value.dt(), self.value)
    }
}

fn required(operand: Expr, role: &str) -> Expr {
    assert!(!operand.is_empty(), "{} operand is uninitialized", role);
    operand
}

fn required_all(group: ExprGroup, role: &str) -> ExprGroup {
    for (axis, operand) in group.iter().enumerate() {
        assert!(!operand.is_empty(), "{} operand {} is uninitialized", role, axis);
    }
    group
}

/// A slot that has not been declared yet
#[derive(Debug)]
pub struct IdExpression {
    id: Identifier,
}

impl IdExpression {
    pub fn new(id: Identifier) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }
}

impl fmt::Display for IdExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

#[derive(Debug)]
pub struct UnaryOpExpression {
    op: UnaryOpType,
    operand: Expr,
    cast_type: Option<DataType>,
}

impl UnaryOpExpression {
    pub fn new(op: UnaryOpType, operand: Expr) -> Self {
        assert!(!op.is_cast(), "{} requires a target type", op);
        Self {
            op,
            operand: required(operand, "unary"),
            cast_type: None,
        }
    }

    pub fn cast(op: UnaryOpType, operand: Expr, dt: DataType) -> Self {
        assert!(op.is_cast(), "{} is not a cast", op);
        Self {
            op,
            operand: required(operand, "cast"),
            cast_type: Some(dt),
        }
    }

    pub fn op(&self) -> UnaryOpType {
        self.op
    }

    pub fn operand(&self) -> &Expr {
        &self.operand
    }

    pub fn cast_type(&self) -> Option<DataType> {
        self.cast_type
    }
}

impl fmt::Display for UnaryOpExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cast_type {
            Some(dt) => write!(f, "{}<{}> {}", self.op, dt, self.operand),
            None => write!(f, "({} {})", self.op, self.operand),
        }
    }
}

/// A global slot, optionally backed by a storage node
#[derive(Debug)]
pub struct GlobalVariableExpression {
    ident: Identifier,
    dt: Option<DataType>,
    snode: Option<SNodeRef>,
    adjoint: RefCell<Expr>,
}

impl GlobalVariableExpression {
    pub fn new(dt: DataType, ident: Identifier) -> Self {
        Self {
            ident,
            dt: Some(dt),
            snode: None,
            adjoint: RefCell::new(Expr::default()),
        }
    }

    /// Variable bound to `snode`. Containers carry no element type.
    pub fn from_snode(snode: &Rc<SNode>) -> Self {
        Self {
            ident: Identifier::anonymous(),
            dt: snode.dt(),
            snode: Some(SNodeRef::from(snode)),
            adjoint: RefCell::new(Expr::default()),
        }
    }

    pub fn ident(&self) -> &Identifier {
        &self.ident
    }

    pub fn dt(&self) -> Option<DataType> {
        self.dt
    }

    pub fn snode(&self) -> Option<&SNodeRef> {
        self.snode.as_ref()
    }

    /// Gradient companion; empty until `Expr::set_grad`
    pub fn adjoint(&self) -> Expr {
        self.adjoint.borrow().clone()
    }

    pub(crate) fn set_adjoint(&self, adjoint: &Expr) {
        self.adjoint.borrow_mut().set(adjoint);
    }
}

impl fmt::Display for GlobalVariableExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.snode {
            Some(snode) => write!(f, "#{}", snode),
            None => write!(f, "#{}", self.ident),
        }
    }
}

#[derive(Debug)]
pub struct GlobalPtrExpression {
    var: Expr,
    indices: ExprGroup,
}

impl GlobalPtrExpression {
    pub fn new(var: Expr, indices: ExprGroup) -> Self {
        Self {
            var: required(var, "indexed"),
            indices: required_all(indices, "index"),
        }
    }

    pub fn var(&self) -> &Expr {
        &self.var
    }

    pub fn indices(&self) -> &ExprGroup {
        &self.indices
    }
}

impl fmt::Display for GlobalPtrExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.var, self.indices)
    }
}

/// Tensor argument supplied by the host at launch
#[derive(Debug)]
pub struct ExternalTensorExpression {
    dt: DataType,
    dim: usize,
    arg_id: usize,
}

impl ExternalTensorExpression {
    pub fn new(dt: DataType, dim: usize, arg_id: usize) -> Self {
        Self { dt, dim, arg_id }
    }

    pub fn dt(&self) -> DataType {
        self.dt
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn arg_id(&self) -> usize {
        self.arg_id
    }
}

impl fmt::Display for ExternalTensorExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d_ext_arr<{}>@arg{}", self.dim, self.dt, self.arg_id)
    }
}

#[derive(Debug)]
pub struct SNodeOpExpression {
    snode: SNodeRef,
    op: SNodeOpType,
    indices: ExprGroup,
    value: Option<Expr>,
}

impl SNodeOpExpression {
    pub fn new(snode: SNodeRef, op: SNodeOpType, indices: ExprGroup) -> Self {
        Self {
            snode,
            op,
            indices: required_all(indices, "index"),
            value: None,
        }
    }

    pub fn with_value(snode: SNodeRef, op: SNodeOpType, indices: ExprGroup, value: Expr) -> Self {
        Self {
            snode,
            op,
            indices: required_all(indices, "index"),
            value: Some(required(value, "value")),
        }
    }

    pub fn snode(&self) -> &SNodeRef {
        &self.snode
    }

    pub fn op(&self) -> SNodeOpType {
        self.op
    }

    pub fn indices(&self) -> &ExprGroup {
        &self.indices
    }

    pub fn value(&self) -> Option<&Expr> {
        self.value.as_ref()
    }

    /// `append` and `length` only make sense on dynamic nodes
    pub fn requires_dynamic(&self) -> bool {
        matches!(self.op, SNodeOpType::Append | SNodeOpType::Length)
            && self.snode.node_type() != SNodeType::Dynamic
    }
}

impl fmt::Display for SNodeOpExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, [{}]", self.op, self.snode, self.indices)?;
        if let Some(value) = &self.value {
            write!(f, ", {}", value)?;
        }
        write!(f, ")")
    }
}

/// Optimizer hint: `base + low <= input < base + high`
#[derive(Debug)]
pub struct RangeAssumptionExpression {
    input: Expr,
    base: Expr,
    low: i32,
    high: i32,
}

impl RangeAssumptionExpression {
    pub fn new(input: Expr, base: Expr, low: i32, high: i32) -> Self {
        Self {
            input: required(input, "input"),
            base: required(base, "base"),
            low,
            high,
        }
    }

    pub fn input(&self) -> &Expr {
        &self.input
    }

    pub fn base(&self) -> &Expr {
        &self.base
    }

    pub fn low(&self) -> i32 {
        self.low
    }

    pub fn high(&self) -> i32 {
        self.high
    }
}

impl fmt::Display for RangeAssumptionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "assume_in_range({}{:+} <= ({}) < {}{:+})",
            self.base, self.low, self.input, self.base, self.high
        )
    }
}

/// Optimizer hint: `input` takes a distinct value in every loop iteration
/// for accesses to `covers`
#[derive(Debug)]
pub struct LoopUniqueExpression {
    input: Expr,
    covers: Vec<SNodeRef>,
}

impl LoopUniqueExpression {
    pub fn new(input: Expr, covers: Vec<SNodeRef>) -> Self {
        Self {
            input: required(input, "input"),
            covers,
        }
    }

    pub fn input(&self) -> &Expr {
        &self.input
    }

    pub fn covers(&self) -> &[SNodeRef] {
        &self.covers
    }
}

impl fmt::Display for LoopUniqueExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loop_unique({}", self.input)?;
        for snode in &self.covers {
            write!(f, ", {}", snode)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug)]
pub struct RandExpression {
    dt: DataType,
}

impl RandExpression {
    pub fn new(dt: DataType) -> Self {
        Self { dt }
    }

    pub fn dt(&self) -> DataType {
        self.dt
    }
}

impl fmt::Display for RandExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rand<{}>()", self.dt)
    }
}

/// Closed set of node payloads
#[derive(Debug)]
pub enum Expression {
    Const(ConstExpression),
    Id(IdExpression),
    UnaryOp(UnaryOpExpression),
    GlobalVariable(GlobalVariableExpression),
    GlobalPtr(GlobalPtrExpression),
    ExternalTensor(ExternalTensorExpression),
    SNodeOp(SNodeOpExpression),
    RangeAssumption(RangeAssumptionExpression),
    LoopUnique(LoopUniqueExpression),
    Rand(RandExpression),
}

impl Expression {
    pub fn kind(&self) -> Kind {
        match self {
            Expression::Const(_) => Kind::Const,
            Expression::Id(_) => Kind::Id,
            Expression::UnaryOp(_) => Kind::UnaryOp,
            Expression::GlobalVariable(_) => Kind::GlobalVariable,
            Expression::GlobalPtr(_) => Kind::GlobalPtr,
            Expression::ExternalTensor(_) => Kind::ExternalTensor,
            Expression::SNodeOp(_) => Kind::SNodeOp,
            Expression::RangeAssumption(_) => Kind::RangeAssumption,
            Expression::LoopUnique(_) => Kind::LoopUnique,
            Expression::Rand(_) => Kind::Rand,
        }
    }

    /// Type known at construction, without a type-check pass
    pub fn intrinsic_type(&self) -> Option<DataType> {
        match self {
            Expression::Const(c) => Some(c.value.dt()),
            _ => None,
        }
    }

    /// Child expressions in evaluation order.
    ///
    /// The gradient companion of a global variable is not an operand.
    pub fn operands(&self) -> Vec<Expr> {
        match self {
            Expression::Const(_)
            | Expression::Id(_)
            | Expression::GlobalVariable(_)
            | Expression::ExternalTensor(_)
            | Expression::Rand(_) => Vec::new(),
            Expression::UnaryOp(e) => vec![e.operand.clone()],
            Expression::GlobalPtr(e) => std::iter::once(e.var.clone())
                .chain(e.indices.iter().cloned())
                .collect(),
            Expression::SNodeOp(e) => e
                .indices
                .iter()
                .cloned()
                .chain(e.value.iter().cloned())
                .collect(),
            Expression::RangeAssumption(e) => vec![e.input.clone(), e.base.clone()],
            Expression::LoopUnique(e) => vec![e.input.clone()],
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Const(e) => fmt::Display::fmt(e, f),
            Expression::Id(e) => fmt::Display::fmt(e, f),
            Expression::UnaryOp(e) => fmt::Display::fmt(e, f),
            Expression::GlobalVariable(e) => fmt::Display::fmt(e, f),
            Expression::GlobalPtr(e) => fmt::Display::fmt(e, f),
            Expression::ExternalTensor(e) => fmt::Display::fmt(e, f),
            Expression::SNodeOp(e) => fmt::Display::fmt(e, f),
            Expression::RangeAssumption(e) => fmt::Display::fmt(e, f),
            Expression::LoopUnique(e) => fmt::Display::fmt(e, f),
            Expression::Rand(e) => fmt::Display::fmt(e, f),
        }
    }
}

/// Payload types that `Expr::is` / `Expr::cast` can test for
pub trait ExprKind: Sized + 'static {
    const KIND: Kind;

    fn downcast(expression: &Expression) -> Option<&Self>;
}

macro_rules! expr_kind {
    ($ty:ident, $variant:ident) => {
        impl ExprKind for $ty {
            const KIND: Kind = Kind::$variant;

            fn downcast(expression: &Expression) -> Option<&Self> {
                match expression {
                    Expression::$variant(e) => Some(e),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Expression {
            fn from(e: $ty) -> Self {
                Expression::$variant(e)
            }
        }
    };
}

expr_kind!(ConstExpression, Const);
expr_kind!(IdExpression, Id);
expr_kind!(UnaryOpExpression, UnaryOp);
expr_kind!(GlobalVariableExpression, GlobalVariable);
expr_kind!(GlobalPtrExpression, GlobalPtr);
expr_kind!(ExternalTensorExpression, ExternalTensor);
expr_kind!(SNodeOpExpression, SNodeOp);
expr_kind!(RangeAssumptionExpression, RangeAssumption);
expr_kind!(LoopUniqueExpression, LoopUnique);
expr_kind!(RandExpression, Rand);
