//! Ready-made stream configurations for common public feeds.
//!
//! Each preset only builds a [`StreamConfig`]; register it like any other.

use crate::streaming::StreamConfig;

/// Finnhub trade feed for one stock symbol
pub fn stock_trades(symbol: &str, api_key: &str) -> StreamConfig {
    StreamConfig::socket(
        format!("stock_{}", symbol),
        format!("wss://ws.finnhub.io?token={}", api_key),
    )
    .with_update_interval(1)
    .with_tag("symbol", symbol)
}

/// Binance 24h ticker for one trading pair, e.g. `BTCUSDT`
pub fn crypto_ticker(symbol: &str) -> StreamConfig {
    StreamConfig::socket(
        format!("crypto_{}", symbol),
        format!(
            "wss://stream.binance.com:9443/ws/{}@ticker",
            symbol.to_lowercase()
        ),
    )
    .with_update_interval(1)
    .with_tag("symbol", symbol)
}

/// Sensor readings polled from an HTTP gateway every 10 seconds
pub fn sensor(sensor_id: &str, gateway_host: &str) -> StreamConfig {
    StreamConfig::polling(
        format!("sensor_{}", sensor_id),
        format!("http://{}/api/sensors/{}", gateway_host, sensor_id),
    )
    .with_update_interval(10)
    .with_tag("sensor_id", sensor_id)
}

/// Recent-search feed for a set of keywords, polled every 30 seconds
///
/// The keywords are kept as a `keywords` tag on every record.
pub fn keyword_search(bearer_token: &str, keywords: &[&str]) -> StreamConfig {
    let query = keywords.join(" OR ");
    StreamConfig::polling(
        format!("keywords_{}", keywords.join("_")),
        format!(
            "https://api.twitter.com/2/tweets/search/recent?query={}",
            query.replace(' ', "%20")
        ),
    )
    .with_update_interval(30)
    .with_bearer_token(bearer_token)
    .with_tag("keywords", keywords.to_vec())
}
