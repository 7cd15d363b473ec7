//! Built-in traced kernels

use tir_ir::expression::{GlobalPtrExpression, GlobalVariableExpression};
use tir_ir::ops::{
    append, assume_range, bit_cast, cast, global_new_named, is_active, length, loop_unique, rand,
};
use tir_ir::{DataType, Expr, Identifier, SNodeRef, SNodeTree};

/// A traced kernel: the storage tree it addresses and its root expressions
pub struct Kernel {
    /// Kept alive for as long as the graph is inspected
    _tree: SNodeTree,
    pub roots: Vec<(&'static str, Expr)>,
}

fn tagged(expr: Expr, tag: &str) -> Expr {
    expr.set_source_tag(tag);
    expr
}

/// Particle update over a dense field plus a dynamic id list
pub fn particles() -> Kernel {
    let tree = SNodeTree::new();
    let particles = tree.dense(&tree.root(), 1);
    let pos_cell = tree.place(&particles, DataType::F32);
    let vel_cell = tree.place(&particles, DataType::F32);
    let ids = tree.dynamic(&tree.root(), 1);
    tree.place(&ids, DataType::I32);

    let pos = Expr::make(GlobalVariableExpression::from_snode(&pos_cell));
    let vel = Expr::make(GlobalVariableExpression::from_snode(&vel_cell));
    pos.set_grad(&global_new_named(DataType::F32, "pos_grad"));

    let i = global_new_named(DataType::I32, "i");
    let pos_i = tagged(pos.index(&i), "particles.py:12 in step");
    let vel_i = tagged(vel.index(&i), "particles.py:12 in step");

    let roots = vec![
        ("pos[i]", pos_i.clone()),
        ("vel[i]", vel_i),
        ("i in [0, 64)", assume_range(&i, &Expr::from(0i32), 0, 64)),
        ("unique i", loop_unique(&i, [SNodeRef::from(&pos_cell)])),
        ("active", !is_active(pos.parent().snode(), &i)),
        ("ids.length", length(&ids, Expr::from(0i32))),
        ("ids.append", append(&ids, Expr::from(0i32), &cast(&pos_i, DataType::I32))),
        ("pos bits", bit_cast(&pos_i, DataType::U32)),
        ("jitter", rand(DataType::F32)),
    ];

    Kernel { _tree: tree, roots }
}

/// `particles` plus nodes that fail type checking
pub fn faulty() -> Kernel {
    let mut kernel = particles();
    let pos = kernel.roots[0].1.cast::<GlobalPtrExpression>().var().clone();
    let i = Expr::from(0i32);

    kernel.roots.push((
        "narrowing bit_cast",
        tagged(bit_cast(&Expr::from(1.0f64), DataType::I32), "faulty.py:3 in main"),
    ));
    kernel.roots.push((
        "undeclared",
        tagged(Expr::from(Identifier::named("ghost")), "faulty.py:5 in main"),
    ));
    kernel.roots.push((
        "pos[i, i]",
        tagged(pos.index([i.clone(), i]), "faulty.py:7 in main"),
    ));
    kernel
}
