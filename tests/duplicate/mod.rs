//! Step definitions, fixtures, and scenarios for duplication workflows.

mod bdd_steps;
mod scenarios;
mod test_helpers;
