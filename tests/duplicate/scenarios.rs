//! BDD scenarios for the duplication workflows.

use rstest_bdd_macros::scenario;

use super::test_helpers::{DuplicateContext, duplicate_context};

#[scenario(
    path = "tests/features/duplicate.feature",
    name = "Reproduce the source launch parameters"
)]
fn scenario_reproduce_source(duplicate_context: DuplicateContext) {
    drop(duplicate_context);
}

#[scenario(
    path = "tests/features/duplicate.feature",
    name = "Fall back to the configured key"
)]
fn scenario_default_key(duplicate_context: DuplicateContext) {
    drop(duplicate_context);
}

#[scenario(
    path = "tests/features/duplicate.feature",
    name = "Duplicate attached volumes through snapshots"
)]
fn scenario_duplicate_volumes(duplicate_context: DuplicateContext) {
    drop(duplicate_context);
}

#[scenario(
    path = "tests/features/duplicate.feature",
    name = "Abort when a snapshot fails"
)]
fn scenario_snapshot_failure(duplicate_context: DuplicateContext) {
    drop(duplicate_context);
}
