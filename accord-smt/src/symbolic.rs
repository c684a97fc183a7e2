//! SSA symbolic variables.
//!
//! Each program variable (and each translated expression node) is backed by
//! one `SymbolicVar`. The variable exposes a monotonically increasing index;
//! the solver-side name of version `i` is `base_i`. Control-flow handling
//! snapshots and restores the current index, so a second counter tracks the
//! highest index ever allocated: bumping after a restore must yield a fresh
//! name, never rebind an old one.

use accord_ast::TypeDesc;

use crate::expr::{SmtExpr, SmtSort};
use crate::types::smt_sort_of;

#[derive(Clone, Debug)]
pub struct SymbolicVar {
    base: String,
    ty: TypeDesc,
    sort: SmtSort,
    unsupported: bool,
    index: u32,
    next_free: u32,
}

impl SymbolicVar {
    pub fn new(base: impl Into<String>, ty: TypeDesc) -> Self {
        let (unsupported, sort) = smt_sort_of(&ty);
        Self {
            base: base.into(),
            ty,
            sort,
            unsupported,
            index: 0,
            next_free: 0,
        }
    }

    pub fn ty(&self) -> &TypeDesc {
        &self.ty
    }

    pub fn sort(&self) -> &SmtSort {
        &self.sort
    }

    /// Whether the variable's type could not be modelled; its terms are
    /// unconstrained placeholders in that case.
    pub fn is_unsupported(&self) -> bool {
        self.unsupported
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn name_at(&self, index: u32) -> String {
        format!("{}_{}", self.base, index)
    }

    pub fn current_name(&self) -> String {
        self.name_at(self.index)
    }

    pub fn current(&self) -> SmtExpr {
        self.at(self.index)
    }

    pub fn at(&self, index: u32) -> SmtExpr {
        assert!(
            index <= self.next_free,
            "symbolic variable {} has no version {index}",
            self.base
        );
        SmtExpr::var(self.name_at(index), self.sort.clone())
    }

    /// Allocate a fresh version and make it current.
    pub fn bump(&mut self) -> SmtExpr {
        self.next_free += 1;
        self.index = self.next_free;
        self.current()
    }

    /// Rewind the current version to a snapshot. The snapshot must refer to
    /// a previously allocated version.
    pub fn set_index(&mut self, index: u32) {
        assert!(
            index <= self.next_free,
            "symbolic variable {} cannot rewind to unallocated version {index}",
            self.base
        );
        self.index = index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_start_at_zero_and_bump() {
        let mut v = SymbolicVar::new("x_1", TypeDesc::uint(256));
        assert_eq!(v.index(), 0);
        assert_eq!(v.current().to_string(), "x_1_0");
        v.bump();
        assert_eq!(v.index(), 1);
        assert_eq!(v.current().to_string(), "x_1_1");
        assert_eq!(v.at(0).to_string(), "x_1_0");
    }

    #[test]
    fn bump_after_rewind_never_reuses_a_version() {
        let mut v = SymbolicVar::new("x_1", TypeDesc::uint(256));
        v.bump();
        v.bump();
        let snapshot = 1;
        v.set_index(snapshot);
        assert_eq!(v.index(), 1);
        v.bump();
        // Version 2 was allocated before the rewind; the new bump must not
        // shadow it.
        assert_eq!(v.index(), 3);
    }

    #[test]
    fn indices_never_decrease_on_bump() {
        let mut v = SymbolicVar::new("s", TypeDesc::Bool);
        let mut last = v.index();
        for _ in 0..10 {
            v.bump();
            assert!(v.index() > last);
            last = v.index();
        }
    }

    #[test]
    #[should_panic]
    fn rewinding_to_an_unallocated_version_panics() {
        let mut v = SymbolicVar::new("x", TypeDesc::uint(8));
        v.set_index(5);
    }

    #[test]
    fn unsupported_types_are_flagged() {
        let v = SymbolicVar::new("b", TypeDesc::Unsupported("bytes".into()));
        assert!(v.is_unsupported());
        assert_eq!(v.sort(), &SmtSort::Int);
    }
}
