//! Login flow counters
//!
//! Emitted through the `metrics` facade. Nothing is recorded unless the
//! embedding binary installs a recorder.
//!
//! - `hisame_callback_requests_total` (counter): label `route`
//! - `hisame_token_posts_total` (counter): label `result`
//! - `hisame_wait_outcomes_total` (counter): label `outcome`

/// Record a request hitting one of the callback server routes.
pub fn record_callback_request(route: &'static str) {
    metrics::counter!("hisame_callback_requests_total", "route" => route).increment(1);
}

/// Record how a POST to the token route was handled:
/// `accepted`, `duplicate` or `rejected`.
pub fn record_token_post(result: &'static str) {
    metrics::counter!("hisame_token_posts_total", "result" => result).increment(1);
}

/// Record how a wait ended: `token`, `cancelled` or `failed`.
pub fn record_wait_outcome(outcome: &'static str) {
    metrics::counter!("hisame_wait_outcomes_total", "outcome" => outcome).increment(1);
}
