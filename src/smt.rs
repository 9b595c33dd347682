//! This module contains the translation layer between the IR's world of
//! typed values and the solver's world of sorted expressions.
//!
//! # Booleans and 1-bit Integers
//!
//! The IR represents booleans as 1-bit integers, while the solver keeps
//! booleans and bitvectors as distinct sorts. Comparison results and branch
//! conditions therefore cross the boundary in both directions, and the
//! [`to_bool`]/[`to_bv1`] normalizers exist to be applied at every such
//! crossing. Both are idempotent, and they are mutually inverse up to
//! equisatisfiability.

use z3::{
    ast::{Ast, Bool, Dynamic, BV},
    Context,
    Sort,
};

use crate::{
    error::execution::{Error, Result},
    ir::{Constant, Type},
};

/// Gets the solver sort corresponding to the IR type `ty`.
///
/// Only integer types have a sort; an integer of width `w` is represented as
/// a bitvector of width `w`, including `w = 1`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedType`] for any non-integer type.
pub fn sort_for_type<'ctx>(ctx: &'ctx Context, ty: Type) -> Result<Sort<'ctx>> {
    match ty {
        Type::Int { bits } => Ok(Sort::bitvector(ctx, bits)),
        other => Err(Error::UnsupportedType { ty: other }),
    }
}

/// Builds a solver expression with the same value as the IR constant
/// `constant`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedConstant`] for any non-integer constant.
pub fn evaluate_constant<'ctx>(ctx: &'ctx Context, constant: &Constant) -> Result<Dynamic<'ctx>> {
    match constant {
        Constant::Int { bits, value } => Ok(BV::from_u64(ctx, *value, *bits).into()),
        other => Err(Error::UnsupportedConstant { constant: *other }),
    }
}

/// Normalizes `expr` to represent 1-bit bitvectors as booleans.
///
/// A 1-bit bitvector `e` becomes `e == 1`; any other expression is returned
/// unchanged.
#[must_use]
pub fn to_bool<'ctx>(expr: &Dynamic<'ctx>) -> Dynamic<'ctx> {
    if let Some(bv) = expr.as_bv() {
        if bv.get_size() == 1 {
            let one = BV::from_u64(bv.get_ctx(), 1, 1);
            return Dynamic::from_ast(&bv._eq(&one));
        }
    }
    expr.clone()
}

/// Normalizes `expr` to represent booleans as 1-bit bitvectors.
///
/// A boolean `e` becomes `ite(e, 1, 0)` over 1-bit bitvectors; any other
/// expression is returned unchanged.
#[must_use]
pub fn to_bv1<'ctx>(expr: &Dynamic<'ctx>) -> Dynamic<'ctx> {
    if let Some(b) = expr.as_bool() {
        let ctx = b.get_ctx();
        let one = BV::from_u64(ctx, 1, 1);
        let zero = BV::from_u64(ctx, 0, 1);
        return Dynamic::from_ast(&b.ite(&one, &zero));
    }
    expr.clone()
}

/// Normalizes `expr` with [`to_bool`] and requires the result to be a
/// boolean.
///
/// This is the conversion used everywhere the IR semantics demand a truth
/// value: branch conditions, select conditions, and the arguments of the
/// assumption and assertion intrinsics.
///
/// # Errors
///
/// Returns [`Error::TypeMismatch`] if `expr` is neither a boolean nor a
/// 1-bit bitvector.
pub fn require_bool<'ctx>(expr: &Dynamic<'ctx>) -> Result<Bool<'ctx>> {
    to_bool(expr).as_bool().ok_or_else(|| Error::TypeMismatch {
        found: describe(expr),
    })
}

/// Describes the sort of `expr` for use in error messages.
fn describe(expr: &Dynamic) -> String {
    if let Some(bv) = expr.as_bv() {
        format!("a {}-bit bitvector", bv.get_size())
    } else if expr.as_bool().is_some() {
        "a boolean".to_owned()
    } else {
        "an expression of unsupported sort".to_owned()
    }
}

#[cfg(test)]
mod test {
    use z3::{
        ast::{Ast, Bool, Dynamic, BV},
        Config,
        Context,
        SatResult,
        Solver,
        Sort,
    };

    use crate::{
        error::execution::Error,
        ir::{Constant, Type},
        smt::{evaluate_constant, require_bool, sort_for_type, to_bool, to_bv1},
    };

    fn ctx() -> Context {
        Context::new(&Config::new())
    }

    /// Checks that `lhs` and `rhs` cannot disagree, i.e. that they are
    /// equivalent under the empty path condition.
    fn assert_equivalent(ctx: &Context, lhs: &Dynamic, rhs: &Dynamic) {
        let solver = Solver::new(ctx);
        solver.assert(&lhs._eq(rhs).not());
        assert_eq!(solver.check(), SatResult::Unsat);
    }

    #[test]
    fn maps_integer_types_to_bitvector_sorts() {
        let ctx = ctx();
        let sort = sort_for_type(&ctx, Type::Int { bits: 32 }).expect("i32 has a sort");
        assert_eq!(sort, Sort::bitvector(&ctx, 32));
        let sort = sort_for_type(&ctx, Type::bool()).expect("i1 has a sort");
        assert_eq!(sort, Sort::bitvector(&ctx, 1));
    }

    #[test]
    fn rejects_non_integer_types() {
        let ctx = ctx();
        for ty in [Type::Void, Type::Pointer, Type::Float] {
            let error = sort_for_type(&ctx, ty).expect_err("type must be rejected");
            assert_eq!(error, Error::UnsupportedType { ty });
        }
    }

    #[test]
    fn evaluates_integer_constants() {
        let ctx = ctx();
        let expr = evaluate_constant(&ctx, &Constant::int(16, 0xbeef))
            .expect("integer constants evaluate");
        let bv = expr.as_bv().expect("the result is a bitvector");
        assert_eq!(bv.get_size(), 16);
        assert_eq!(bv.as_u64(), Some(0xbeef));
    }

    #[test]
    fn rejects_float_constants() {
        let ctx = ctx();
        let error =
            evaluate_constant(&ctx, &Constant::Float(1.5)).expect_err("floats must be rejected");
        assert!(matches!(error, Error::UnsupportedConstant { .. }));
    }

    #[test]
    fn normalizers_are_idempotent() {
        let ctx = ctx();
        let bit = Dynamic::from_ast(&BV::new_const(&ctx, "bit", 1));
        let flag = Dynamic::from_ast(&Bool::new_const(&ctx, "flag"));

        let once = to_bool(&bit);
        assert_equivalent(&ctx, &to_bool(&once), &once);

        let once = to_bv1(&flag);
        assert_equivalent(&ctx, &to_bv1(&once), &once);
    }

    #[test]
    fn normalizers_invert_each_other() {
        let ctx = ctx();

        // For a 1-bit bitvector, converting to a boolean and back yields an
        // equivalent bitvector.
        let bit = Dynamic::from_ast(&BV::new_const(&ctx, "bit", 1));
        assert_equivalent(&ctx, &to_bv1(&to_bool(&bit)), &bit);

        // For a boolean, converting to a 1-bit bitvector and back yields an
        // equivalent boolean.
        let flag = Dynamic::from_ast(&Bool::new_const(&ctx, "flag"));
        assert_equivalent(&ctx, &to_bool(&to_bv1(&flag)), &flag);
    }

    #[test]
    fn wide_bitvectors_pass_through_unchanged() {
        let ctx = ctx();
        let word = Dynamic::from_ast(&BV::new_const(&ctx, "word", 32));
        assert_eq!(to_bool(&word), word);
        assert_eq!(to_bv1(&word), word);
    }

    #[test]
    fn require_bool_accepts_bits_and_rejects_words() {
        let ctx = ctx();
        let bit = Dynamic::from_ast(&BV::new_const(&ctx, "bit", 1));
        assert!(require_bool(&bit).is_ok());

        let flag = Dynamic::from_ast(&Bool::new_const(&ctx, "flag"));
        assert!(require_bool(&flag).is_ok());

        let word = Dynamic::from_ast(&BV::new_const(&ctx, "word", 32));
        let error = require_bool(&word).expect_err("wide bitvectors are not booleans");
        assert!(matches!(error, Error::TypeMismatch { .. }));
    }
}
