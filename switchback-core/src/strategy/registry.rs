//! Process-wide strategy registry.
//!
//! The table is built exactly once, on first use, and is read-only
//! thereafter; concurrent readers are safe. Strategies register at build
//! time only, so a duplicate shortcode is a startup defect.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::{adm, StrategyDescriptor, StrategyError, StrategyInfo};

static REGISTRY: OnceLock<BTreeMap<String, StrategyDescriptor>> = OnceLock::new();

fn register(
    table: &mut BTreeMap<String, StrategyDescriptor>,
    descriptor: StrategyDescriptor,
) -> Result<(), StrategyError> {
    let shortcode = descriptor.info.shortcode.clone();
    if table.insert(shortcode.clone(), descriptor).is_some() {
        return Err(StrategyError::Duplicate(shortcode));
    }
    Ok(())
}

fn build() -> Result<BTreeMap<String, StrategyDescriptor>, StrategyError> {
    let mut table = BTreeMap::new();
    register(&mut table, adm::descriptor())?;
    Ok(table)
}

fn registry() -> &'static BTreeMap<String, StrategyDescriptor> {
    REGISTRY.get_or_init(|| build().expect("builtin strategy shortcodes are unique"))
}

/// Look up a strategy descriptor by shortcode.
pub fn get_strategy(shortcode: &str) -> Result<&'static StrategyDescriptor, StrategyError> {
    registry()
        .get(shortcode)
        .ok_or_else(|| StrategyError::NotFound(shortcode.to_string()))
}

/// All registered strategies, ordered by shortcode.
pub fn list_strategies() -> Vec<&'static StrategyInfo> {
    registry().values().map(|d| &d.info).collect()
}
