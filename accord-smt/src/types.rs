//! Lowering from semantic types to solver sorts, default values, and range
//! constraints.

use accord_ast::TypeDesc;

use crate::expr::{SmtExpr, SmtSort};

/// The sort modelling a semantic type. The flag is set when the type cannot
/// be modelled faithfully; callers then fall back to an unconstrained `Int`
/// and report the construct.
pub fn smt_sort_of(ty: &TypeDesc) -> (bool, SmtSort) {
    match ty {
        TypeDesc::Bool => (false, SmtSort::Bool),
        TypeDesc::Integer { .. } | TypeDesc::Address => (false, SmtSort::Int),
        TypeDesc::Mapping { key, value } => {
            let (key_bad, key_sort) = smt_sort_of(key);
            let (value_bad, value_sort) = smt_sort_of(value);
            (
                key_bad || value_bad,
                SmtSort::Array(Box::new(key_sort), Box::new(value_sort)),
            )
        }
        TypeDesc::Function { params, returns } => {
            let mut unsupported = false;
            let mut domain = Vec::with_capacity(params.len());
            for p in params {
                let (bad, sort) = smt_sort_of(p);
                unsupported |= bad;
                domain.push(sort);
            }
            // Zero- and multi-return functions keep an Int codomain; call
            // handling reports the arity separately.
            let codomain = match returns.first() {
                Some(r) => {
                    let (bad, sort) = smt_sort_of(r);
                    unsupported |= bad;
                    sort
                }
                None => SmtSort::Int,
            };
            (
                unsupported,
                SmtSort::Function { domain, codomain: Box::new(codomain) },
            )
        }
        TypeDesc::Unit | TypeDesc::Magic | TypeDesc::Unsupported(_) => (true, SmtSort::Int),
    }
}

/// The language-level default value of a type, or `None` when it has no
/// single-term default.
pub fn zero_value(ty: &TypeDesc) -> Option<SmtExpr> {
    match ty {
        TypeDesc::Bool => Some(SmtExpr::False),
        TypeDesc::Integer { .. } | TypeDesc::Address => Some(SmtExpr::from(0)),
        TypeDesc::Mapping { value, .. } => {
            let element = zero_value(value)?;
            let (unsupported, sort) = smt_sort_of(ty);
            if unsupported {
                return None;
            }
            Some(SmtExpr::ConstArray { sort, element: Box::new(element) })
        }
        _ => None,
    }
}

/// Constraints restricting `term` to the type's value range. Bounded
/// integers get both ends; other types need none.
pub fn range_constraints(ty: &TypeDesc, term: &SmtExpr) -> Vec<SmtExpr> {
    match ty.integer_range() {
        Some((lo, hi)) => vec![
            term.clone().ge(SmtExpr::from(lo)),
            term.clone().le(SmtExpr::from(hi)),
        ],
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use num_traits::One;

    #[test]
    fn value_types_lower_cleanly() {
        assert_eq!(smt_sort_of(&TypeDesc::Bool), (false, SmtSort::Bool));
        assert_eq!(smt_sort_of(&TypeDesc::uint(256)), (false, SmtSort::Int));
        assert_eq!(smt_sort_of(&TypeDesc::Address), (false, SmtSort::Int));
    }

    #[test]
    fn mappings_lower_to_arrays() {
        let ty = TypeDesc::Mapping {
            key: Box::new(TypeDesc::uint(256)),
            value: Box::new(TypeDesc::Bool),
        };
        let (unsupported, sort) = smt_sort_of(&ty);
        assert!(!unsupported);
        assert_eq!(
            sort,
            SmtSort::Array(Box::new(SmtSort::Int), Box::new(SmtSort::Bool))
        );
    }

    #[test]
    fn unsupported_types_flag_and_fall_back() {
        let (unsupported, sort) = smt_sort_of(&TypeDesc::Unsupported("bytes".into()));
        assert!(unsupported);
        assert_eq!(sort, SmtSort::Int);
    }

    #[test]
    fn zero_values() {
        assert_eq!(zero_value(&TypeDesc::Bool), Some(SmtExpr::False));
        assert_eq!(zero_value(&TypeDesc::int(8)), Some(SmtExpr::from(0)));
        let m = TypeDesc::Mapping {
            key: Box::new(TypeDesc::uint(256)),
            value: Box::new(TypeDesc::uint(256)),
        };
        assert_eq!(
            zero_value(&m).unwrap().to_string(),
            "((as const (Array Int Int)) 0)"
        );
        assert_eq!(zero_value(&TypeDesc::Magic), None);
    }

    #[test]
    fn range_constraints_cover_both_ends() {
        let term = SmtExpr::var("x_0", SmtSort::Int);
        let cs = range_constraints(&TypeDesc::uint(8), &term);
        assert_eq!(cs.len(), 2);
        assert_eq!(cs[0].to_string(), "(>= x_0 0)");
        assert_eq!(cs[1].to_string(), "(<= x_0 255)");

        let cs = range_constraints(&TypeDesc::uint(256), &term);
        let max: BigInt = (BigInt::one() << 256usize) - 1;
        assert_eq!(cs[1].to_string(), format!("(<= x_0 {max})"));

        assert!(range_constraints(&TypeDesc::Bool, &term).is_empty());
    }
}
