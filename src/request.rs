//! Request descriptors handed to the admission manager by outbound-call sites.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Venues with built-in limiter wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Binance,
    Okx,
}

impl Exchange {
    /// Key prefix used for every rule, counter and weight key of this venue.
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Binance => "binance",
            Exchange::Okx => "okx",
        }
    }
}

/// What kind of outbound call is about to be made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    /// Order placement.
    #[serde(rename = "createorder")]
    Order,
    /// Any informational call (market data, account queries, ...).
    #[serde(rename = "request")]
    Normal,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Order => "createorder",
            RequestType::Normal => "request",
        }
    }
}

/// Literal market a request targets; venues bucket these into a coarser market class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    Spot,
    Margin,
    FuturesUsdMargined,
    FuturesCoinMargined,
    PerpetualUsdMargined,
    PerpetualCoinMargined,
    Options,
}

impl MarketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Spot => "spot",
            MarketType::Margin => "margin",
            MarketType::FuturesUsdMargined => "futures_usd_margined",
            MarketType::FuturesCoinMargined => "futures_coin_margined",
            MarketType::PerpetualUsdMargined => "perpetual_usd_margined",
            MarketType::PerpetualCoinMargined => "perpetual_coin_margined",
            MarketType::Options => "options",
        }
    }

    /// True for every dated-futures and perpetual flavour.
    pub fn is_derivative(&self) -> bool {
        matches!(
            self,
            MarketType::FuturesUsdMargined
                | MarketType::FuturesCoinMargined
                | MarketType::PerpetualUsdMargined
                | MarketType::PerpetualCoinMargined
        )
    }
}

/// Error returned when parsing an unknown exchange, request type or market name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseNameError {
    kind: &'static str,
    value: String,
}

impl FromStr for Exchange {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binance" => Ok(Exchange::Binance),
            "okx" => Ok(Exchange::Okx),
            _ => Err(ParseNameError { kind: "exchange", value: s.to_string() }),
        }
    }
}

impl FromStr for RequestType {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "createorder" => Ok(RequestType::Order),
            "request" => Ok(RequestType::Normal),
            _ => Err(ParseNameError { kind: "request type", value: s.to_string() }),
        }
    }
}

impl FromStr for MarketType {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let market = match s.to_ascii_lowercase().as_str() {
            "spot" => MarketType::Spot,
            "margin" => MarketType::Margin,
            "futures_usd_margined" => MarketType::FuturesUsdMargined,
            "futures_coin_margined" => MarketType::FuturesCoinMargined,
            "perpetual_usd_margined" => MarketType::PerpetualUsdMargined,
            "perpetual_coin_margined" => MarketType::PerpetualCoinMargined,
            "options" => MarketType::Options,
            _ => return Err(ParseNameError { kind: "market type", value: s.to_string() }),
        };
        Ok(market)
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the admission manager needs to know about one outbound call.
///
/// Built fresh for every call. `account_id` scopes order counting, `ip` scopes
/// weight accounting; an empty `ip` falls back to the configured host scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestDescriptor {
    pub exchange: Exchange,
    pub request_type: RequestType,
    pub market_type: MarketType,
    pub account_id: String,
    pub ip: String,
}

impl RequestDescriptor {
    pub fn new(exchange: Exchange, request_type: RequestType, market_type: MarketType) -> Self {
        Self { exchange, request_type, market_type, account_id: String::new(), ip: String::new() }
    }

    /// Shorthand for an order placement request.
    pub fn order(exchange: Exchange, market_type: MarketType, account_id: impl Into<String>) -> Self {
        Self::new(exchange, RequestType::Order, market_type).with_account(account_id)
    }

    /// Shorthand for an informational request.
    pub fn normal(exchange: Exchange, market_type: MarketType) -> Self {
        Self::new(exchange, RequestType::Normal, market_type)
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = ip.into();
        self
    }
}
