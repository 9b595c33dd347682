//! End-to-end tests that go through the textual front-end: parse a function
//! and symbolically execute it.

mod common;

#[test]
fn a_parsed_guarded_assertion_reports_its_witness() -> anyhow::Result<()> {
    let (summary, failures) = common::run_text(
        r"
        fn @f(i32 %x) {
        entry:
          %is_small = icmp slt %x, i32 10
          br %is_small, label %small, label %done
        small:
          %not_five = icmp ne %x, i32 5
          call @decaf_assert(%not_five)
          br label %done
        done:
          ret
        }
        ",
        "f",
    )?;

    common::assert_full_coverage(&summary);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].input("x"), Some(5));
    Ok(())
}

#[test]
fn a_parsed_loop_uses_phis_across_the_back_edge() -> anyhow::Result<()> {
    // Sums the constant 1 for each of n in 0..3 loop trips, then asserts
    // the accumulator caught up with the counter.
    let (summary, failures) = common::run_text(
        r"
        fn @sum(i32 %n) {
        entry:
          %bounded = icmp ult %n, i32 3
          call @decaf_assume(%bounded)
          br label %head
        head:
          %i = phi [ i32 0, entry ], [ %i_next, body ]
          %acc = phi [ i32 0, entry ], [ %acc_next, body ]
          %keep_going = icmp ult %i, %n
          br %keep_going, label %body, label %done
        body:
          %i_next = add %i, i32 1
          %acc_next = add %acc, i32 1
          br label %head
        done:
          %equal = icmp eq %acc, %i
          call @decaf_assert(%equal)
          ret
        }
        ",
        "sum",
    )?;

    common::assert_full_coverage(&summary);
    assert_eq!(summary.contexts_explored, 3);
    assert!(failures.is_empty());
    Ok(())
}

#[test]
fn a_parsed_select_feeds_the_assertion() -> anyhow::Result<()> {
    let (summary, failures) = common::run_text(
        r"
        fn @clamp(i8 %x) {
        entry:
          %over = icmp ugt %x, i8 100
          %clamped = select %over, i8 100, %x
          %in_range = icmp ule %clamped, i8 100
          call @decaf_assert(%in_range)
          ret
        }
        ",
        "clamp",
    )?;

    common::assert_full_coverage(&summary);
    assert!(failures.is_empty());
    Ok(())
}

#[test]
fn unknown_externals_abandon_only_the_offending_path() -> anyhow::Result<()> {
    // The helper call sits behind a branch, so the other path still
    // executes its assertion and reports a witness.
    let (summary, failures) = common::run_text(
        r"
        fn @f(i32 %x, i1 %use_helper) {
        entry:
          br %use_helper, label %helper, label %plain
        helper:
          %r = call i32 @mystery(%x)
          ret
        plain:
          %is_zero = icmp eq %x, i32 0
          call @decaf_assert(%is_zero)
          ret
        }
        ",
        "f",
    )?;

    assert_eq!(summary.contexts_explored, 2);
    assert_eq!(summary.contexts_completed, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(failures.len(), 1);
    assert_ne!(failures[0].input("x"), Some(0));
    Ok(())
}
