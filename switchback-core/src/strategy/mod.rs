//! Strategy engine — descriptor types, the process-wide registry, and the
//! strategies themselves.
//!
//! A strategy is described by an immutable [`StrategyInfo`] and built by a
//! first-class factory function that parses its JSON parameters once;
//! instances own strongly-typed fields thereafter.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::data::{Manager, ProviderError};
use crate::frame::FrameError;
use crate::portfolio::{Portfolio, PortfolioError};

pub mod adm;
pub mod registry;

pub use registry::{get_strategy, list_strategies};

/// Raw JSON parameter values keyed by argument name.
pub type Params = serde_json::Map<String, Value>;

/// Structured error types for strategy construction and execution.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("strategy '{0}' is not registered")]
    NotFound(String),

    #[error("duplicate strategy shortcode '{0}'")]
    Duplicate(String),

    #[error("insufficient history: {0}")]
    InsufficientHistory(String),

    #[error("no overlapping dates across requested symbols")]
    NoOverlap,

    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Data(#[from] ProviderError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Portfolio(#[from] PortfolioError),
}

/// One declared strategy argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argument {
    pub name: String,
    pub description: String,
    /// Parse shape of the raw JSON value, e.g. `string` or `[]string`.
    pub typecode: String,
    pub default_val: Value,
}

/// Process-lifetime-immutable description of a strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyInfo {
    pub shortcode: String,
    pub name: String,
    pub description: String,
    pub source: String,
    pub version: String,
    pub arguments: BTreeMap<String, Argument>,
    pub suggested_parameters: BTreeMap<String, BTreeMap<String, Value>>,
}

/// Builds a strategy instance from raw JSON parameters.
pub type StrategyFactory = fn(&Params) -> Result<Box<dyn Strategy>, StrategyError>;

/// A registry entry: the descriptor plus its factory.
#[derive(Clone)]
pub struct StrategyDescriptor {
    pub info: StrategyInfo,
    pub factory: StrategyFactory,
}

/// A constructed strategy instance.
pub trait Strategy: Send {
    fn info(&self) -> &StrategyInfo;

    /// The target symbol of the most recent computed period, once
    /// [`Strategy::compute`] has run.
    fn current_symbol(&self) -> Option<&str>;

    /// Fetch data through `manager`, produce the signal, and replay it into
    /// a simulated portfolio.
    fn compute(&mut self, manager: &mut Manager) -> Result<Portfolio, StrategyError>;
}

/// Resolve an argument: the caller's raw value if present, otherwise the
/// descriptor default.
pub(crate) fn argument_value<'a>(
    params: &'a Params,
    info: &'a StrategyInfo,
    name: &str,
) -> Result<&'a Value, StrategyError> {
    if let Some(value) = params.get(name) {
        return Ok(value);
    }
    info.arguments
        .get(name)
        .map(|a| &a.default_val)
        .ok_or_else(|| StrategyError::InvalidArgument {
            name: name.to_string(),
            reason: "argument is not declared and no value was supplied".to_string(),
        })
}

/// Parse an argument into its concrete type per the descriptor's typecode.
pub(crate) fn parse_argument<T: serde::de::DeserializeOwned>(
    params: &Params,
    info: &StrategyInfo,
    name: &str,
) -> Result<T, StrategyError> {
    let value = argument_value(params, info, name)?;
    serde_json::from_value(value.clone()).map_err(|e| StrategyError::InvalidArgument {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
