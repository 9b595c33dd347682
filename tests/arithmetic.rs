//! Tests that arithmetic follows two's-complement semantics, making
//! wrap-around and rounding bugs discoverable.

mod common;

use decaf::ir::{builder::FunctionBuilder, BinaryOp, Function, Predicate, Type};

/// Builds `fn f(i32 a, i32 b) { c = a + b; decaf_assert(c >= a); ret }`,
/// the classic wrap-around-blind overflow check.
fn addition_is_monotone() -> Function {
    let mut builder = FunctionBuilder::new("f");
    let a = builder.param("a", Type::Int { bits: 32 });
    let b = builder.param("b", Type::Int { bits: 32 });
    builder.block("entry");
    let c = builder.binary(BinaryOp::Add, a, b);
    let ge = builder.icmp(Predicate::Sge, c, a);
    builder.call("decaf_assert", &[ge], None);
    builder.ret(None);
    builder.build()
}

/// Builds `fn f(i32 x) { y = sdiv(x, 2); decaf_assert(2 * y == x); ret }`,
/// which holds only for even inputs because division truncates.
fn halving_is_lossless() -> Function {
    let mut builder = FunctionBuilder::new("f");
    let x = builder.param("x", Type::Int { bits: 32 });
    builder.block("entry");
    let two = builder.iconst(32, 2);
    let y = builder.binary(BinaryOp::SDiv, x, two);
    let doubled = builder.binary(BinaryOp::Mul, two, y);
    let eq = builder.icmp(Predicate::Eq, doubled, x);
    builder.call("decaf_assert", &[eq], None);
    builder.ret(None);
    builder.build()
}

#[test]
fn addition_can_wrap_past_the_assertion() {
    let function = addition_is_monotone();
    let (summary, failures) = common::run(&function);

    common::assert_full_coverage(&summary);
    assert_eq!(failures.len(), 1);

    // The reported inputs really do make `a + b < a` in two's complement.
    let a = failures[0].input("a").expect("the model binds a") as u32 as i32;
    let b = failures[0].input("b").expect("the model binds b") as u32 as i32;
    let c = a.wrapping_add(b);
    assert!(c < a);
}

#[test]
fn signed_division_truncates_odd_inputs() {
    let function = halving_is_lossless();
    let (summary, failures) = common::run(&function);

    common::assert_full_coverage(&summary);
    assert_eq!(failures.len(), 1);

    // Any counterexample to `2 * (x / 2) == x` is odd.
    let x = failures[0].input("x").expect("the model binds x") as u32 as i32;
    assert_eq!(x.rem_euclid(2), 1);
    assert_ne!(x.wrapping_div(2).wrapping_mul(2), x);
}

#[test]
fn unsigned_and_signed_division_disagree_on_negatives() {
    // udiv treats the sign bit as magnitude: for x = -2 (0xfffffffe),
    // udiv(x, 2) is 0x7fffffff while sdiv(x, 2) is -1. Asserting that the
    // two agree must produce a counterexample.
    let mut builder = FunctionBuilder::new("f");
    let x = builder.param("x", Type::Int { bits: 32 });
    builder.block("entry");
    let two = builder.iconst(32, 2);
    let unsigned = builder.binary(BinaryOp::UDiv, x, two);
    let signed = builder.binary(BinaryOp::SDiv, x, two);
    let agree = builder.icmp(Predicate::Eq, unsigned, signed);
    builder.call("decaf_assert", &[agree], None);
    builder.ret(None);
    let function = builder.build();

    let (summary, failures) = common::run(&function);
    common::assert_full_coverage(&summary);
    assert_eq!(failures.len(), 1);

    let x = failures[0].input("x").expect("the model binds x") as u32;
    let unsigned = x / 2;
    let signed = (x as i32).wrapping_div(2) as u32;
    assert_ne!(unsigned, signed);
}

#[test]
fn subtraction_of_one_only_misses_zero() {
    // `x - 1 < x` holds unsigned except when x is zero and the subtraction
    // wraps. The only possible witness is therefore x = 0.
    let mut builder = FunctionBuilder::new("f");
    let x = builder.param("x", Type::Int { bits: 16 });
    builder.block("entry");
    let one = builder.iconst(16, 1);
    let less = builder.binary(BinaryOp::Sub, x, one);
    let lt = builder.icmp(Predicate::Ult, less, x);
    builder.call("decaf_assert", &[lt], None);
    builder.ret(None);
    let function = builder.build();

    let (summary, failures) = common::run(&function);
    common::assert_full_coverage(&summary);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].input("x"), Some(0));
}
