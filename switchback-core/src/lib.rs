//! Switchback Core Engine
//!
//! Provides time-series frame primitives, market data access, strategy
//! signal generation, portfolio simulation, and performance analytics.

pub mod data;
pub mod frame;
pub mod portfolio;
pub mod strategy;
