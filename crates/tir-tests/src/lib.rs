//! Integration tests for the trace-time expression IR
//!
//! Exercises the graph the way a host program does: build with handles and
//! free functions, then type check and serialize the result.

use tir_error::{Diagnostic, ErrorCode};
use tir_ir::{CompileConfig, DataType, Expr};

/// Type checks `expr` with the default configuration
pub fn type_check(expr: &Expr) -> tir_error::Result<DataType> {
    expr.type_check(&CompileConfig::default())
}

/// Asserts that `expr` type checks to `expected`
pub fn assert_type_checks(expr: &Expr, expected: DataType) {
    match type_check(expr) {
        Ok(dt) if dt == expected => {}
        Ok(dt) => panic!(
            "Expected `{}` to have type {}, but it resolved to {}",
            expr, expected, dt
        ),
        Err(diagnostic) => panic!(
            "Expected `{}` to type check, but got:\n{}",
            expr, diagnostic
        ),
    }
}

/// Asserts that type checking `expr` fails with `code` and returns the
/// diagnostic
pub fn assert_type_error(expr: &Expr, code: ErrorCode) -> Diagnostic {
    match type_check(expr) {
        Ok(dt) => panic!(
            "Expected `{}` to fail type checking with {}, but it resolved to {}",
            expr, code, dt
        ),
        Err(diagnostic) => {
            assert_eq!(
                diagnostic.code,
                Some(code),
                "unexpected diagnostic for `{}`: {}",
                expr,
                diagnostic
            );
            diagnostic
        }
    }
}

/// Asserts that `expr` serializes to exactly `expected`
pub fn assert_serializes(expr: &Expr, expected: &str) {
    let actual = expr.serialize();
    if actual != expected {
        panic!(
            "Expected serialization:\n  {}\nbut got:\n  {}",
            expected, actual
        );
    }
}

#[cfg(test)]
mod graph_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tir_ir::expression::{
        ConstExpression, ExternalTensorExpression, GlobalPtrExpression, GlobalVariableExpression,
        IdExpression, LoopUniqueExpression, RandExpression, RangeAssumptionExpression,
        SNodeOpExpression, UnaryOpExpression,
    };
    use tir_ir::expression::{Literal, UnaryOpType};
    use tir_ir::ops::{
        append, append_to, assume_range, bit_cast, cast, get_addr, global_new, global_new_named,
        is_active, length, length_of, loop_unique, rand,
    };
    use tir_ir::{ExprGroup, ExprKind, Identifier, SNodeRef, SNodeTree, TypeCheckPass};

    /// Kind test results for every node kind, in a fixed order
    fn kinds(expr: &Expr) -> [bool; 10] {
        [
            expr.is::<ConstExpression>(),
            expr.is::<IdExpression>(),
            expr.is::<UnaryOpExpression>(),
            expr.is::<GlobalVariableExpression>(),
            expr.is::<GlobalPtrExpression>(),
            expr.is::<ExternalTensorExpression>(),
            expr.is::<SNodeOpExpression>(),
            expr.is::<RangeAssumptionExpression>(),
            expr.is::<LoopUniqueExpression>(),
            expr.is::<RandExpression>(),
        ]
    }

    // =========================================
    // Literals and identifiers
    // =========================================

    #[test]
    fn test_literals_are_typed_at_construction() {
        let cases = [
            (Expr::from(5i16), DataType::I16),
            (Expr::from(5i32), DataType::I32),
            (Expr::from(5i64), DataType::I64),
            (Expr::from(0.5f32), DataType::F32),
            (Expr::from(0.5f64), DataType::F64),
        ];
        for (expr, dt) in cases {
            assert!(expr.is::<ConstExpression>());
            assert_eq!(expr.resolved_type(), Some(dt));
        }
    }

    #[test]
    fn test_literal_payload() {
        let expr = Expr::from(-12i64);
        assert_eq!(expr.cast::<ConstExpression>().value(), Literal::I64(-12));
        assert_serializes(&expr, "const<i64>(-12)");
    }

    #[test]
    fn test_identifier_is_undeclared_slot() {
        let expr = Expr::from(Identifier::named("acc"));
        assert_serializes(&expr, "@acc");
        assert_eq!(expr.resolved_type(), None);
        assert_type_error(&expr, ErrorCode::UNDECLARED_IDENTIFIER);
    }

    // =========================================
    // Indexing
    // =========================================

    #[test]
    fn test_index_global_variable() {
        let tree = SNodeTree::new();
        let cell = tree.place(&tree.dense(&tree.root(), 2), DataType::F32);
        let x = Expr::make(GlobalVariableExpression::from_snode(&cell));
        let i = Expr::from(1i32);
        let j = Expr::from(2i32);

        let ptr = x.index([i.clone(), j.clone()]);
        let payload = ptr.cast::<GlobalPtrExpression>();
        assert!(payload.var().ptr_eq(&x));
        assert_eq!(payload.indices(), &ExprGroup::from([i, j]));
        assert_serializes(&ptr, "#S2place[const<i32>(1), const<i32>(2)]");
        assert_type_checks(&ptr, DataType::F32);
    }

    #[test]
    fn test_index_external_tensor() {
        let tensor = Expr::external_tensor(DataType::F64, 2, 1);
        let ptr = tensor.index([Expr::from(0i32), Expr::from(3i32)]);
        assert_serializes(&ptr, "2d_ext_arr<f64>@arg1[const<i32>(0), const<i32>(3)]");
        assert_type_checks(&ptr, DataType::F64);

        let short = tensor.index(Expr::from(0i32));
        assert_type_error(&short, ErrorCode::INDEX_COUNT_MISMATCH);
    }

    #[test]
    #[should_panic(expected = "cannot index a unary_op expression")]
    fn test_index_unary_op_panics() {
        let x = Expr::from(1i32);
        (!&x).index(Expr::from(0i32));
    }

    #[test]
    #[should_panic(expected = "cannot index a id expression")]
    fn test_index_identifier_panics() {
        Expr::from(Identifier::named("a")).index(Expr::from(0i32));
    }

    // =========================================
    // Rebinding and aliasing
    // =========================================

    #[test]
    fn test_assignment_aliases() {
        let tree = SNodeTree::new();
        let cell = tree.place(&tree.dense(&tree.root(), 1), DataType::F32);
        let b = Expr::make(GlobalVariableExpression::from_snode(&cell));
        let mut a = Expr::from(3i32);

        a.set(&b);
        assert_eq!(a.serialize(), b.serialize());
        assert_eq!(kinds(&a), kinds(&b));

        a.set_attribute("name", "x");
        a.set_source_tag("fields.py:1");
        assert_eq!(b.attribute("name").as_deref(), Some("x"));
        assert_eq!(b.source_tag(), "fields.py:1");

        let grad = global_new_named(DataType::F32, "x_grad");
        a.set_grad(&grad);
        assert!(b.cast::<GlobalVariableExpression>().adjoint().ptr_eq(&grad));
    }

    #[test]
    fn test_rebinding_leaves_old_node() {
        let mut a = global_new_named(DataType::I32, "a");
        let before = a.clone();
        a.declare(DataType::F32);

        assert!(!a.ptr_eq(&before));
        assert_serializes(&before, "#@a");
        assert_eq!(before.cast::<GlobalVariableExpression>().dt(), Some(DataType::I32));
    }

    #[test]
    fn test_set_grad_rebinds() {
        let x = global_new_named(DataType::F32, "x");
        let first = global_new_named(DataType::F32, "g1");
        let second = global_new_named(DataType::F32, "g2");

        x.set_grad(&first);
        x.set_grad(&second);
        assert!(x.cast::<GlobalVariableExpression>().adjoint().ptr_eq(&second));
        // The gradient is not part of the node's text form
        assert_serializes(&x, "#@x");
    }

    #[test]
    #[should_panic(expected = "cannot set the gradient of a rand expression")]
    fn test_set_grad_on_rand_panics() {
        rand(DataType::F32).set_grad(&Expr::from(0.0f32));
    }

    // =========================================
    // Storage tree accessors
    // =========================================

    #[test]
    fn test_snode_and_parent() {
        let tree = SNodeTree::new();
        let block = tree.dense(&tree.root(), 1);
        let list = tree.dynamic(&block, 1);
        let cell = tree.place(&list, DataType::I32);
        let x = Expr::make(GlobalVariableExpression::from_snode(&cell));

        assert_eq!(x.snode(), SNodeRef::from(&cell));
        assert_eq!(x.parent().snode(), SNodeRef::from(&list));
        assert_eq!(x.parent().parent().snode(), SNodeRef::from(&block));
        assert_serializes(&x.parent(), "#S2dynamic");
    }

    #[test]
    #[should_panic(expected = "Cannot get snode parent of non-global variables.")]
    fn test_parent_of_constant_fails() {
        Expr::from(3i32).parent();
    }

    #[test]
    #[should_panic(expected = "Cannot get snode of non-global variables.")]
    fn test_snode_of_constant_fails() {
        Expr::from(3i32).snode();
    }

    #[test]
    #[should_panic(expected = "has no parent")]
    fn test_parent_of_root_fails() {
        let tree = SNodeTree::new();
        let root = Expr::make(GlobalVariableExpression::from_snode(&tree.root()));
        root.parent();
    }

    #[test]
    #[should_panic(expected = "is not placed in a storage tree")]
    fn test_snode_of_unplaced_variable_fails() {
        global_new_named(DataType::F32, "x").snode();
    }

    // =========================================
    // Negation and casts
    // =========================================

    #[test]
    fn test_negation_of_global_leaves_it_unchanged() {
        let a = Expr::from(5i32);
        assert_serializes(&a, "const<i32>(5)");

        let g = global_new_named(DataType::U1, "flag");
        let before = g.serialize();
        let b = !&g;

        let not = b.cast::<UnaryOpExpression>();
        assert_eq!(not.op(), UnaryOpType::LogicNot);
        assert_eq!(not.operand().serialize(), before);
        assert_eq!(g.serialize(), before);
        assert_serializes(&b, "(logic_not #@flag)");
        assert_type_checks(&b, DataType::U1);
    }

    #[test]
    fn test_cast_vs_bit_cast() {
        let x = Expr::from(1i32);
        let value = cast(&x, DataType::F32);
        let bits = bit_cast(&x, DataType::F32);

        assert_ne!(
            value.cast::<UnaryOpExpression>().op(),
            bits.cast::<UnaryOpExpression>().op()
        );
        assert_ne!(value.serialize(), bits.serialize());

        // The tags survive type checking
        assert_type_checks(&value, DataType::F32);
        assert_type_checks(&bits, DataType::F32);
        assert_eq!(value.cast::<UnaryOpExpression>().op(), UnaryOpType::CastValue);
        assert_eq!(bits.cast::<UnaryOpExpression>().op(), UnaryOpType::CastBits);
    }

    #[test]
    fn test_bit_cast_width_checked_late() {
        let bits = bit_cast(&Expr::from(1i64), DataType::F32);
        bits.set_source_tag("kernel.py:9 in body");
        let diagnostic = assert_type_error(&bits, ErrorCode::BIT_CAST_SIZE_MISMATCH);
        assert_eq!(diagnostic.source_tag.as_deref(), Some("kernel.py:9 in body"));
    }

    // =========================================
    // Global declaration helpers
    // =========================================

    #[test]
    fn test_global_new_from_identifier() {
        let id = Expr::from(Identifier::named("foo"));
        let var = global_new(&id, DataType::F32);
        let payload = var.cast::<GlobalVariableExpression>();

        assert_eq!(payload.ident().raw_name(), Some("foo"));
        assert_eq!(payload.ident(), id.cast::<IdExpression>().id());
        assert_eq!(payload.dt(), Some(DataType::F32));
        assert!(payload.adjoint().is_empty());
        assert_eq!(var.resolved_type(), None);
        assert_type_checks(&var, DataType::F32);
    }

    #[test]
    fn test_declare_materializes_anonymous_global() {
        let mut slot = Expr::default();
        slot.declare(DataType::I64);
        let ident = slot.cast::<GlobalVariableExpression>().ident().clone();
        assert!(ident.is_anonymous());
        assert_serializes(&slot, &format!("#@tmp{}", ident.id()));
    }

    // =========================================
    // Storage operations
    // =========================================

    #[test]
    fn test_storage_ops() {
        let tree = SNodeTree::new();
        let list = tree.dynamic(&tree.root(), 1);
        let cell = tree.place(&list, DataType::I32);
        let x = Expr::make(GlobalVariableExpression::from_snode(&cell));
        let i = Expr::from(0i32);
        let value = Expr::from(42i32);

        let pushed = append_to(&x.parent(), &i, &value);
        assert_serializes(&pushed, "append(S1dynamic, [const<i32>(0)], const<i32>(42))");
        assert!(pushed.cast::<SNodeOpExpression>().value().unwrap().ptr_eq(&value));
        assert_type_checks(&pushed, DataType::I32);

        assert_type_checks(&is_active(&list, &i), DataType::I32);
        assert_type_checks(&length_of(&x.parent(), &i), DataType::I32);
        assert_type_checks(&get_addr(&list, &i), DataType::U64);
    }

    #[test]
    fn test_storage_op_index_count_deferred() {
        let tree = SNodeTree::new();
        let list = tree.dynamic(&tree.root(), 1);

        // Built without complaint; rejected by type checking
        let op = length(&list, ExprGroup::default());
        op.set_source_tag("lists.py:20");
        let diagnostic = assert_type_error(&op, ErrorCode::INDEX_COUNT_MISMATCH);
        assert_eq!(diagnostic.source_tag.as_deref(), Some("lists.py:20"));
        assert_eq!(op.resolved_type(), None);
    }

    #[test]
    fn test_append_value_errors_keep_inner_tag() {
        let tree = SNodeTree::new();
        let list = tree.dynamic(&tree.root(), 1);
        let value = Expr::from(Identifier::named("missing"));
        value.set_source_tag("lists.py:3");
        let op = append(&list, Expr::from(0i32), &value);
        op.set_source_tag("lists.py:4");

        let diagnostic = assert_type_error(&op, ErrorCode::UNDECLARED_IDENTIFIER);
        assert_eq!(diagnostic.source_tag.as_deref(), Some("lists.py:3"));
    }

    // =========================================
    // Annotations
    // =========================================

    #[test]
    fn test_assume_range_preserved() {
        let i = global_new_named(DataType::I32, "i");
        let base = global_new_named(DataType::I32, "block");
        let hint = assume_range(&i, &base, 0, 10);

        let payload = hint.cast::<RangeAssumptionExpression>();
        assert_eq!((payload.low(), payload.high()), (0, 10));
        assert!(payload.base().ptr_eq(&base));
        assert!(payload.input().ptr_eq(&i));

        let copy = hint.clone();
        assert_eq!(copy.serialize(), hint.serialize());
        assert_serializes(&copy, "assume_in_range(#@block+0 <= (#@i) < #@block+10)");
        assert_type_checks(&copy, DataType::I32);
    }

    #[test]
    fn test_loop_unique_preserved() {
        let tree = SNodeTree::new();
        let a = tree.place(&tree.dense(&tree.root(), 1), DataType::F32);
        let b = tree.place(&tree.dense(&tree.root(), 1), DataType::F32);
        let i = global_new_named(DataType::I32, "i");

        let hint = loop_unique(&i, [SNodeRef::from(&a), SNodeRef::from(&b)]);
        let covers = hint.cast::<LoopUniqueExpression>().covers();
        assert_eq!(covers, &[SNodeRef::from(&a), SNodeRef::from(&b)]);
        assert_serializes(&hint, "loop_unique(#@i, S2place, S4place)");
        assert_type_checks(&hint, DataType::I32);
    }

    // =========================================
    // Type checking
    // =========================================

    #[test]
    fn test_type_check_is_idempotent() {
        let tree = SNodeTree::new();
        let cell = tree.place(&tree.dense(&tree.root(), 1), DataType::F32);
        let x = Expr::make(GlobalVariableExpression::from_snode(&cell));
        let expr = cast(&x.index(Expr::from(0i32)), DataType::F64);

        assert_type_checks(&expr, DataType::F64);
        let serialized = expr.serialize();
        assert_type_checks(&expr, DataType::F64);
        assert_eq!(expr.resolved_type(), Some(DataType::F64));
        assert_eq!(expr.serialize(), serialized);
    }

    #[test]
    fn test_pass_over_shared_graph() {
        let config = CompileConfig::default();
        let x = global_new_named(DataType::F32, "x");
        let shared = cast(&x, DataType::I32);
        let roots = [
            !&shared,
            assume_range(&shared, &Expr::from(0i32), 0, 4),
            Expr::from(Identifier::named("y")),
        ];

        let mut pass = TypeCheckPass::new(&config);
        pass.check_all(&roots);
        assert_eq!(pass.diagnostics().len(), 1);
        assert_eq!(shared.resolved_type(), Some(DataType::I32));
        assert_eq!(x.resolved_type(), Some(DataType::F32));
    }

    #[test]
    fn test_pass_over_deep_shared_graph() {
        let config = CompileConfig::default();
        let mut x = global_new_named(DataType::I32, "i");
        let mut layers = Vec::new();
        for _ in 0..48 {
            x = assume_range(&x, &x, 0, 1);
            layers.push(x.clone());
        }

        let mut pass = TypeCheckPass::new(&config);
        let mut visited = 0;
        x.walk_post_order(&mut |e: &Expr| {
            visited += 1;
            pass.check(e);
        });
        assert_eq!(visited, 49);
        assert!(pass.diagnostics().is_empty());
        assert!(layers.iter().all(|e| e.resolved_type() == Some(DataType::I32)));
    }

    #[test]
    fn test_walk_reaches_every_operand() {
        let tree = SNodeTree::new();
        let list = tree.dynamic(&tree.root(), 1);
        let i = Expr::from(0i32);
        let op = append(&list, &i, &rand(DataType::I32));

        let mut kinds = Vec::new();
        op.walk_post_order(&mut |e| kinds.push(e.kind()));
        assert_eq!(
            kinds,
            vec![ConstExpression::KIND, RandExpression::KIND, SNodeOpExpression::KIND]
        );
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "default_ip": "i64", "debug": true }}"#).unwrap();

        let config = CompileConfig::load(file.path()).unwrap();
        assert_eq!(config.default_ip, DataType::I64);
        assert!(config.debug);

        // Debug logging does not change results
        assert_type_checks(&cast(&Expr::from(1i32), DataType::I16), DataType::I16);
        assert_eq!(
            cast(&Expr::from(1i32), DataType::I16).type_check(&config),
            Ok(DataType::I16)
        );
    }
}
