//! Tests for control flow: conditional branches, forked exploration, phi
//! resolution, and select.

mod common;

use decaf::ir::{builder::FunctionBuilder, BinaryOp, Function, Predicate, Type};

/// Builds `fn f(i32 x) { if (x < 10) { decaf_assert(x != 5); } ret }`.
fn assertion_behind_a_branch() -> Function {
    let mut builder = FunctionBuilder::new("f");
    let x = builder.param("x", Type::Int { bits: 32 });
    let entry = builder.block("entry");
    let small = builder.block("small");
    let done = builder.block("done");

    builder.switch_to_block(entry);
    let ten = builder.iconst(32, 10);
    let is_small = builder.icmp(Predicate::Slt, x, ten);
    builder.cond_branch(is_small, small, done);

    builder.switch_to_block(small);
    let five = builder.iconst(32, 5);
    let not_five = builder.icmp(Predicate::Ne, x, five);
    builder.call("decaf_assert", &[not_five], None);
    builder.branch(done);

    builder.switch_to_block(done);
    builder.ret(None);
    builder.build()
}

/// Builds a bounded counting loop asserting that the counter has caught up
/// with the bound once the loop exits:
///
/// ```text
/// fn count(i32 n) {
///   decaf_assume(n < 4);
///   for (i = 0; i < n; i++) {}
///   decaf_assert(i == n);
/// }
/// ```
fn counting_loop() -> Function {
    let mut builder = FunctionBuilder::new("count");
    let n = builder.param("n", Type::Int { bits: 32 });
    let entry = builder.block("entry");
    let head = builder.block("head");
    let body = builder.block("body");
    let done = builder.block("done");

    let zero = builder.iconst(32, 0);
    let one = builder.iconst(32, 1);
    let four = builder.iconst(32, 4);

    builder.switch_to_block(entry);
    let bounded = builder.icmp(Predicate::Ult, n, four);
    builder.call("decaf_assume", &[bounded], None);
    builder.branch(head);

    builder.switch_to_block(head);
    let i = builder.phi(&[(entry, zero)]);
    let keep_going = builder.icmp(Predicate::Ult, i, n);
    builder.cond_branch(keep_going, body, done);

    builder.switch_to_block(body);
    let next = builder.binary(BinaryOp::Add, i, one);
    builder.branch(head);
    builder.add_phi_incoming(i, body, next);

    builder.switch_to_block(done);
    let caught_up = builder.icmp(Predicate::Eq, i, n);
    builder.call("decaf_assert", &[caught_up], None);
    builder.ret(None);
    builder.build()
}

#[test]
fn a_guarded_assertion_fails_only_inside_the_guard() {
    let function = assertion_behind_a_branch();
    let (summary, failures) = common::run(&function);

    common::assert_full_coverage(&summary);
    // One path forks into two; both run to completion.
    assert_eq!(summary.contexts_explored, 2);
    assert_eq!(failures.len(), 1);

    // The only input reaching the assertion with a false condition is 5.
    assert_eq!(failures[0].input("x"), Some(5));
}

#[test]
fn a_bounded_loop_is_explored_once_per_trip_count() {
    let function = counting_loop();
    let (summary, failures) = common::run(&function);

    common::assert_full_coverage(&summary);
    // The assumption admits n in 0..=3, and each trip count is its own
    // path. On every one of them the exit invariant i == n holds.
    assert_eq!(summary.contexts_explored, 4);
    assert_eq!(summary.contexts_completed, 4);
    assert!(failures.is_empty());
}

#[test]
fn consecutive_phis_exchange_values_in_parallel() {
    // One trip around the loop swaps the two phi-carried values. Phis at a
    // block head act simultaneously, so after the trip x holds b and y
    // holds a; a sequential reading would clobber one of them and trip the
    // assertions.
    let mut builder = FunctionBuilder::new("swap");
    let a = builder.param("a", Type::Int { bits: 32 });
    let b = builder.param("b", Type::Int { bits: 32 });
    let entry = builder.block("entry");
    let head = builder.block("head");
    let step = builder.block("step");
    let exit = builder.block("exit");

    let first_trip = builder.iconst(1, 0);
    let second_trip = builder.iconst(1, 1);

    builder.switch_to_block(entry);
    builder.branch(head);

    builder.switch_to_block(head);
    let x = builder.phi(&[(entry, a)]);
    let y = builder.phi(&[(entry, b)]);
    let swapped = builder.phi(&[(entry, first_trip)]);
    builder.cond_branch(swapped, exit, step);

    builder.switch_to_block(step);
    builder.branch(head);
    builder.add_phi_incoming(x, step, y);
    builder.add_phi_incoming(y, step, x);
    builder.add_phi_incoming(swapped, step, second_trip);

    builder.switch_to_block(exit);
    let x_holds_b = builder.icmp(Predicate::Eq, x, b);
    builder.call("decaf_assert", &[x_holds_b], None);
    let y_holds_a = builder.icmp(Predicate::Eq, y, a);
    builder.call("decaf_assert", &[y_holds_a], None);
    builder.ret(None);
    let function = builder.build();

    let (summary, failures) = common::run(&function);
    common::assert_full_coverage(&summary);
    assert!(failures.is_empty());
}

#[test]
fn select_discovers_the_absolute_value_edge_case() {
    // y = select(x < 0, 0 - x, x); decaf_assert(y >= 0). The sole
    // counterexample is INT_MIN, whose negation is itself.
    let mut builder = FunctionBuilder::new("abs");
    let x = builder.param("x", Type::Int { bits: 32 });
    builder.block("entry");
    let zero = builder.iconst(32, 0);
    let negative = builder.icmp(Predicate::Slt, x, zero);
    let negated = builder.binary(BinaryOp::Sub, zero, x);
    let y = builder.select(negative, negated, x);
    let non_negative = builder.icmp(Predicate::Sge, y, zero);
    builder.call("decaf_assert", &[non_negative], None);
    builder.ret(None);
    let function = builder.build();

    let (summary, failures) = common::run(&function);
    common::assert_full_coverage(&summary);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].input("x"), Some(u64::from(0x8000_0000u32)));
}
