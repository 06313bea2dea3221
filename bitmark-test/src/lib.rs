//! Shared test infrastructure: tracing setup and reference vectors.

pub mod vectors;

use std::sync::Once;

use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install the test tracing subscriber and error report hooks, exactly once.
///
/// Call at the top of any test that logs; repeated calls are no-ops so tests
/// never fight over the global subscriber.
pub fn init() {
    INIT.call_once(|| {
        let _ = color_eyre::install();

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .finish()
            .with(ErrorLayer::default());
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
