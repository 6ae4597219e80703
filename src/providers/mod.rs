//! Data-extraction clients for the supported market-data providers.

pub mod alpha_vantage;
pub mod util;
pub mod yahoo_finance;
