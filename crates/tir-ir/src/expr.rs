//! Expression handles
//!
//! An [`Expr`] is a cheap, clonable handle to a shared, immutable [`Node`].
//! Cloning a handle aliases the node; [`Expr::set`] rebinds a handle to
//! another node. Nothing reachable from a handle mutates the structure of a
//! node after construction; only the resolved type, the gradient companion
//! of a global variable, the source tag and the attributes can change.
//!
//! Calling an operation on a node of the wrong kind is a bug in the builder
//! and panics. Type errors are reported by [`Expr::type_check`] as
//! diagnostics.

use crate::config::CompileConfig;
use crate::expression::{
    ConstExpression, ExprKind, Expression, ExternalTensorExpression, GlobalPtrExpression,
    GlobalVariableExpression, IdExpression, Kind, Literal, UnaryOpExpression, UnaryOpType,
};
use crate::group::ExprGroup;
use crate::identifier::Identifier;
use crate::snode::SNodeRef;
use crate::typeck::TypeInference;
use crate::types::DataType;
use std::cell::{OnceCell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::ops::Not;
use std::rc::Rc;
use tir_error::Result;

/// A node of the expression graph
#[derive(Debug)]
pub struct Node {
    expression: Expression,
    ret_type: OnceCell<DataType>,
    source_tag: RefCell<String>,
    attributes: RefCell<BTreeMap<String, String>>,
}

impl Node {
    fn new(expression: Expression) -> Self {
        let ret_type = OnceCell::new();
        if let Some(dt) = expression.intrinsic_type() {
            let _ = ret_type.set(dt);
        }
        Self {
            expression,
            ret_type,
            source_tag: RefCell::new(String::new()),
            attributes: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn kind(&self) -> Kind {
        self.expression.kind()
    }

    pub fn resolved_type(&self) -> Option<DataType> {
        self.ret_type.get().copied()
    }

    pub fn source_tag(&self) -> String {
        self.source_tag.borrow().clone()
    }
}

/// Handle to a shared expression node, or empty
#[derive(Clone, Default)]
pub struct Expr {
    node: Option<Rc<Node>>,
}

impl Expr {
    /// Wraps a freshly built payload in a new node
    pub fn make(expression: impl Into<Expression>) -> Self {
        let expression = expression.into();
        tracing::trace!(kind = %expression.kind(), "new expression node");
        Self {
            node: Some(Rc::new(Node::new(expression))),
        }
    }

    pub fn from_identifier(id: Identifier) -> Self {
        Self::make(IdExpression::new(id))
    }

    /// Tensor argument `arg_id` of element type `dt` with `dim` dimensions
    pub fn external_tensor(dt: DataType, dim: usize, arg_id: usize) -> Self {
        Self::make(ExternalTensorExpression::new(dt, dim, arg_id))
    }

    pub fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    /// The node behind this handle. Panics on an empty handle.
    pub fn node(&self) -> &Rc<Node> {
        match &self.node {
            Some(node) => node,
            None => panic!("expression handle is uninitialized"),
        }
    }

    pub fn expression(&self) -> &Expression {
        self.node().expression()
    }

    pub fn kind(&self) -> Kind {
        self.node().kind()
    }

    /// Whether both handles point at the same node
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        match (&self.node, &other.node) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Whether the node is of kind `K`. False on an empty handle.
    pub fn is<K: ExprKind>(&self) -> bool {
        self.node
            .as_ref()
            .is_some_and(|node| node.kind() == K::KIND)
    }

    pub fn try_cast<K: ExprKind>(&self) -> Option<&K> {
        self.node
            .as_ref()
            .and_then(|node| K::downcast(node.expression()))
    }

    /// Downcasts to the payload of kind `K`. Panics if `is::<K>()` is false.
    pub fn cast<K: ExprKind>(&self) -> &K {
        match K::downcast(self.expression()) {
            Some(e) => e,
            None => panic!(
                "cannot cast {} expression to {}",
                self.kind(),
                K::KIND
            ),
        }
    }

    /// Rebinds this handle to the node of `other`
    pub fn set(&mut self, other: &Expr) {
        self.node = other.node.clone();
    }

    /// `self[indices]`; only global variables and external tensors can be
    /// indexed. The index count is checked by type checking.
    pub fn index(&self, indices: impl Into<ExprGroup>) -> Expr {
        assert!(
            self.is::<GlobalVariableExpression>() || self.is::<ExternalTensorExpression>(),
            "cannot index a {} expression",
            self.kind()
        );
        Expr::make(GlobalPtrExpression::new(self.clone(), indices.into()))
    }

    /// Global variable of the parent storage node
    pub fn parent(&self) -> Expr {
        assert!(
            self.is::<GlobalVariableExpression>(),
            "Cannot get snode parent of non-global variables."
        );
        let snode = self.snode();
        let Some(node) = snode.upgrade() else {
            panic!("storage node {} has been dropped", snode);
        };
        let Some(parent) = node.parent() else {
            panic!("storage node {} has no parent", snode);
        };
        Expr::make(GlobalVariableExpression::from_snode(&parent))
    }

    /// Storage node backing this global variable
    pub fn snode(&self) -> SNodeRef {
        assert!(
            self.is::<GlobalVariableExpression>(),
            "Cannot get snode of non-global variables."
        );
        let var = self.cast::<GlobalVariableExpression>();
        match var.snode() {
            Some(snode) => snode.clone(),
            None => panic!("global variable {} is not placed in a storage tree", var.ident()),
        }
    }

    /// Rebinds this handle to a fresh anonymous global variable of type `dt`
    pub fn declare(&mut self, dt: DataType) {
        let var = GlobalVariableExpression::new(dt, Identifier::anonymous());
        tracing::debug!(ident = %var.ident(), %dt, "declared global variable");
        self.set(&Expr::make(var));
    }

    /// Rebinds the gradient companion of this global variable. Visible
    /// through every handle aliasing the variable.
    pub fn set_grad(&self, grad: &Expr) {
        assert!(
            self.is::<GlobalVariableExpression>(),
            "cannot set the gradient of a {} expression",
            self.kind()
        );
        assert!(
            !grad.reaches(self.node()),
            "the gradient of {} cannot depend on the variable itself",
            self
        );
        self.cast::<GlobalVariableExpression>().set_adjoint(grad);
    }

    /// Whether `target` is reachable from this handle through operands or
    /// gradient companions
    fn reaches(&self, target: &Rc<Node>) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![self.clone()];
        while let Some(expr) = stack.pop() {
            let Some(node) = &expr.node else {
                continue;
            };
            if Rc::ptr_eq(node, target) {
                return true;
            }
            if !seen.insert(Rc::as_ptr(node)) {
                continue;
            }
            if let Some(var) = expr.try_cast::<GlobalVariableExpression>() {
                stack.push(var.adjoint());
            }
            stack.extend(expr.operands());
        }
        false
    }

    pub fn resolved_type(&self) -> Option<DataType> {
        self.node().resolved_type()
    }

    /// Resolves the type of this node, checking its operands first.
    ///
    /// A node is inferred at most once. Later calls return the recorded type
    /// without revisiting operands, so a shared subgraph costs one visit no
    /// matter how many paths reach it, and a resolved node stays resolved
    /// even after its storage tree is dropped.
    pub fn type_check(&self, config: &CompileConfig) -> Result<DataType> {
        let node = self.node();
        if let Some(dt) = node.resolved_type() {
            return Ok(dt);
        }

        let inferred = node.expression().infer(config).map_err(|diag| {
            if diag.source_tag.is_none() {
                diag.with_source_tag(node.source_tag())
            } else {
                diag
            }
        })?;
        let _ = node.ret_type.set(inferred);
        if config.debug {
            tracing::debug!(expr = %self, dt = %inferred, "resolved type");
        }
        Ok(inferred)
    }

    /// Deterministic text form of the node and everything below it
    pub fn serialize(&self) -> String {
        self.node().expression().to_string()
    }

    pub fn set_source_tag(&self, tag: impl Into<String>) {
        *self.node().source_tag.borrow_mut() = tag.into();
    }

    pub fn source_tag(&self) -> String {
        self.node().source_tag()
    }

    /// Inserts or overwrites a metadata entry
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<String>) {
        self.node()
            .attributes
            .borrow_mut()
            .insert(key.into(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<String> {
        self.node().attributes.borrow().get(key).cloned()
    }

    pub fn attributes(&self) -> BTreeMap<String, String> {
        self.node().attributes.borrow().clone()
    }

    pub fn operands(&self) -> Vec<Expr> {
        self.expression().operands()
    }

    /// Visits every node reachable from this one once, operands before the
    /// nodes that use them.
    pub fn walk_post_order(&self, visit: &mut impl FnMut(&Expr)) {
        let mut seen = HashSet::new();
        self.walk_inner(&mut seen, visit);
    }

    fn walk_inner(&self, seen: &mut HashSet<*const Node>, visit: &mut impl FnMut(&Expr)) {
        if !seen.insert(Rc::as_ptr(self.node())) {
            return;
        }
        for operand in self.operands() {
            operand.walk_inner(seen, visit);
        }
        visit(self);
    }
}

impl PartialEq for Expr {
    /// Handles are equal when they alias the same node
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => write!(f, "{}", node.expression()),
            None => write!(f, "<uninitialized>"),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({})", self)
    }
}

macro_rules! literal_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Expr {
                fn from(value: $ty) -> Self {
                    Expr::make(ConstExpression::new(Literal::$variant(value)))
                }
            }
        )*
    };
}

literal_from!(i16 => I16, i32 => I32, i64 => I64, f32 => F32, f64 => F64);

impl From<Identifier> for Expr {
    fn from(id: Identifier) -> Self {
        Expr::from_identifier(id)
    }
}

impl Not for &Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::make(UnaryOpExpression::new(UnaryOpType::LogicNot, self.clone()))
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        !&self
    }
}
