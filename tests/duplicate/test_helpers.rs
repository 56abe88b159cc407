//! Shared fixtures for duplication BDD scenarios.

use flotilla::FleetConfig;
use flotilla::test_support::FakeProvider;
use rstest::fixture;

/// Instance every scenario duplicates.
pub const SOURCE_ID: &str = "i-source";

#[derive(Clone, Debug)]
pub enum DuplicateResult {
    Launched(Vec<String>),
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct DuplicateContext {
    pub provider: FakeProvider,
    pub config: FleetConfig,
    pub outcome: Option<DuplicateResult>,
}

#[fixture]
pub fn duplicate_context() -> DuplicateContext {
    DuplicateContext {
        provider: FakeProvider::new(),
        config: FleetConfig {
            access_key_id: Some(String::from("SCWACCESSKEY")),
            secret_access_key: String::from("secret"),
            default_key: String::from("fallback-key"),
            default_security_group: String::from("sg-default"),
            default_zone: String::from("fr-par-1"),
        },
        outcome: None,
    }
}
