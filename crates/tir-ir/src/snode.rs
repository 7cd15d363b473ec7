//! Storage tree
//!
//! A hierarchical sparse storage layout. The tree owns its nodes; expressions
//! only ever hold an [`SNodeRef`], which does not keep the tree alive.
//!
//! ```text
//! S0root
//! └── S1dense      (1 axis)
//!     ├── S2place  f32
//!     └── S3dynamic (2 axes)
//!         └── S4place  i32
//! ```

use crate::types::DataType;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Storage node layout kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SNodeType {
    Root,
    Dense,
    Pointer,
    Bitmasked,
    Dynamic,
    /// Leaf holding one scalar per cell
    Place,
}

impl SNodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SNodeType::Root => "root",
            SNodeType::Dense => "dense",
            SNodeType::Pointer => "pointer",
            SNodeType::Bitmasked => "bitmasked",
            SNodeType::Dynamic => "dynamic",
            SNodeType::Place => "place",
        }
    }
}

impl fmt::Display for SNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the storage tree
#[derive(Debug)]
pub struct SNode {
    id: u32,
    node_type: SNodeType,
    /// Number of indices needed to address one cell of this node
    num_active_indices: usize,
    /// Element type, only for `place` nodes
    dt: Option<DataType>,
    parent: Weak<SNode>,
    children: RefCell<Vec<Rc<SNode>>>,
}

impl SNode {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn node_type(&self) -> SNodeType {
        self.node_type
    }

    pub fn num_active_indices(&self) -> usize {
        self.num_active_indices
    }

    pub fn dt(&self) -> Option<DataType> {
        self.dt
    }

    pub fn parent(&self) -> Option<Rc<SNode>> {
        self.parent.upgrade()
    }

    pub fn children(&self) -> Vec<Rc<SNode>> {
        self.children.borrow().clone()
    }

    /// `S<id><type>`, e.g. `S3dynamic`
    pub fn name_hinted(&self) -> String {
        format!("S{}{}", self.id, self.node_type)
    }
}

/// Owner of a storage tree
#[derive(Debug)]
pub struct SNodeTree {
    root: Rc<SNode>,
    next_id: Cell<u32>,
}

impl Default for SNodeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SNodeTree {
    pub fn new() -> Self {
        Self {
            root: Rc::new(SNode {
                id: 0,
                node_type: SNodeType::Root,
                num_active_indices: 0,
                dt: None,
                parent: Weak::new(),
                children: RefCell::new(Vec::new()),
            }),
            next_id: Cell::new(1),
        }
    }

    pub fn root(&self) -> Rc<SNode> {
        Rc::clone(&self.root)
    }

    fn attach(
        &self,
        parent: &Rc<SNode>,
        node_type: SNodeType,
        num_active_indices: usize,
        dt: Option<DataType>,
    ) -> Rc<SNode> {
        assert_ne!(
            parent.node_type,
            SNodeType::Place,
            "place nodes cannot have children"
        );
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let node = Rc::new(SNode {
            id,
            node_type,
            num_active_indices,
            dt,
            parent: Rc::downgrade(parent),
            children: RefCell::new(Vec::new()),
        });
        parent.children.borrow_mut().push(Rc::clone(&node));
        node
    }

    /// Adds a container below `parent` that introduces `axes` new indices
    pub fn container(&self, parent: &Rc<SNode>, node_type: SNodeType, axes: usize) -> Rc<SNode> {
        assert!(
            !matches!(node_type, SNodeType::Root | SNodeType::Place),
            "{} is not a container type",
            node_type
        );
        self.attach(parent, node_type, parent.num_active_indices + axes, None)
    }

    pub fn dense(&self, parent: &Rc<SNode>, axes: usize) -> Rc<SNode> {
        self.container(parent, SNodeType::Dense, axes)
    }

    pub fn dynamic(&self, parent: &Rc<SNode>, axes: usize) -> Rc<SNode> {
        self.container(parent, SNodeType::Dynamic, axes)
    }

    /// Places a scalar of type `dt` in every cell of `parent`
    pub fn place(&self, parent: &Rc<SNode>, dt: DataType) -> Rc<SNode> {
        self.attach(parent, SNodeType::Place, parent.num_active_indices, Some(dt))
    }
}

/// Non-owning reference to a storage node.
///
/// Identity and type name stay available after the tree is dropped, so a
/// graph that outlives its tree can still be serialized.
#[derive(Debug, Clone)]
pub struct SNodeRef {
    id: u32,
    node_type: SNodeType,
    node: Weak<SNode>,
}

impl SNodeRef {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn node_type(&self) -> SNodeType {
        self.node_type
    }

    pub fn upgrade(&self) -> Option<Rc<SNode>> {
        self.node.upgrade()
    }

    pub fn name_hinted(&self) -> String {
        format!("S{}{}", self.id, self.node_type)
    }
}

impl From<&Rc<SNode>> for SNodeRef {
    fn from(node: &Rc<SNode>) -> Self {
        Self {
            id: node.id,
            node_type: node.node_type,
            node: Rc::downgrade(node),
        }
    }
}

impl PartialEq for SNodeRef {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.node, &other.node)
    }
}

impl Eq for SNodeRef {}

impl fmt::Display for SNodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}{}", self.id, self.node_type)
    }
}
