//! Index groups

use crate::expr::Expr;
use std::fmt;

/// Ordered indices addressing one element, outermost dimension first.
///
/// Fixed at construction; elements are never reordered or deduplicated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExprGroup {
    exprs: Vec<Expr>,
}

impl ExprGroup {
    pub fn new(exprs: Vec<Expr>) -> Self {
        Self { exprs }
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Expr> {
        self.exprs.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Expr> {
        self.exprs.iter()
    }

    pub fn as_slice(&self) -> &[Expr] {
        &self.exprs
    }
}

impl From<Vec<Expr>> for ExprGroup {
    fn from(exprs: Vec<Expr>) -> Self {
        Self::new(exprs)
    }
}

impl From<Expr> for ExprGroup {
    fn from(expr: Expr) -> Self {
        Self::new(vec![expr])
    }
}

impl From<&Expr> for ExprGroup {
    fn from(expr: &Expr) -> Self {
        Self::new(vec![expr.clone()])
    }
}

impl From<&[Expr]> for ExprGroup {
    fn from(exprs: &[Expr]) -> Self {
        Self::new(exprs.to_vec())
    }
}

impl<const N: usize> From<[Expr; N]> for ExprGroup {
    fn from(exprs: [Expr; N]) -> Self {
        Self::new(exprs.into())
    }
}

impl FromIterator<Expr> for ExprGroup {
    fn from_iter<I: IntoIterator<Item = Expr>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ExprGroup {
    type Item = &'a Expr;
    type IntoIter = std::slice::Iter<'a, Expr>;

    fn into_iter(self) -> Self::IntoIter {
        self.exprs.iter()
    }
}

impl fmt::Display for ExprGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, expr) in self.exprs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", expr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_preserved() {
        let i = Expr::from(1i32);
        let j = Expr::from(2i32);
        let group = ExprGroup::from([j.clone(), i.clone(), j.clone()]);

        assert_eq!(group.len(), 3);
        assert!(group.get(0).unwrap().ptr_eq(&j));
        assert!(group.get(1).unwrap().ptr_eq(&i));
        assert!(group.get(2).unwrap().ptr_eq(&j));
        assert_eq!(group.to_string(), "const<i32>(2), const<i32>(1), const<i32>(2)");
    }

    #[test]
    fn test_equality_is_ordered() {
        let i = Expr::from(1i32);
        let j = Expr::from(2i32);
        let ij = ExprGroup::from([i.clone(), j.clone()]);
        let ji = ExprGroup::from([j.clone(), i.clone()]);

        assert_eq!(ij, ExprGroup::from(vec![i, j]));
        assert_ne!(ij, ji);
    }

    #[test]
    fn test_empty_group() {
        let group = ExprGroup::default();
        assert!(group.is_empty());
        assert_eq!(group.to_string(), "");
    }
}
