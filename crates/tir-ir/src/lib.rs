//! tir-ir - Expression handles over a shared trace-time IR graph
//!
//! Host code builds a deferred computation by calling constructors on
//! [`Expr`] handles. Each call appends immutable nodes to a shared graph;
//! a type-check pass and a serializer walk it afterwards.
//!
//! # Architecture
//!
//! ```text
//!   host statements (trace time)
//!         ↓
//!   Expr handles ──Rc──> Node { Expression, resolved type, tag, attributes }
//!         │                    │
//!         │                    └── SNodeRef ──Weak──> SNodeTree (owned by host)
//!         ↓
//!   [TypeCheckPass]  ->  Diagnostics (tir-error)
//!         ↓
//!   serialize() / walk_post_order()  ->  downstream passes
//! ```
//!
//! # Example
//!
//! ```rust
//! use tir_ir::{ops, CompileConfig, DataType, Expr, SNodeTree};
//! use tir_ir::expression::GlobalVariableExpression;
//!
//! let tree = SNodeTree::new();
//! let cell = tree.place(&tree.dense(&tree.root(), 1), DataType::F32);
//!
//! let x = Expr::make(GlobalVariableExpression::from_snode(&cell));
//! let load = x.index(Expr::from(0i32));
//! let as_int = ops::cast(&load, DataType::I32);
//!
//! assert_eq!(as_int.serialize(), "cast_value<i32> #S2place[const<i32>(0)]");
//! assert_eq!(as_int.type_check(&CompileConfig::default()), Ok(DataType::I32));
//! ```

pub mod config;
pub mod expr;
pub mod expression;
pub mod group;
pub mod identifier;
pub mod ops;
pub mod snode;
pub mod typeck;
pub mod types;

pub use config::{CompileConfig, ConfigError};
pub use expr::{Expr, Node};
pub use expression::{Expression, ExprKind, Kind};
pub use group::ExprGroup;
pub use identifier::Identifier;
pub use snode::{SNode, SNodeRef, SNodeTree, SNodeType};
pub use typeck::{TypeCheckPass, TypeInference};
pub use types::DataType;
