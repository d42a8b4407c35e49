//! Tracing subscriber setup.

use tracing_subscriber::filter::Directive;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive applied on top of `RUST_LOG`.
pub const DEFAULT_DIRECTIVE: &str = "patient_records_core=info";

/// Install a global fmt subscriber filtered by `RUST_LOG` plus `directive`.
///
/// Returns false if a subscriber was already installed or the directive does
/// not parse; neither is fatal.
pub fn init_logging(directive: &str) -> bool {
    let directive = match directive.parse::<Directive>() {
        Ok(directive) => directive,
        Err(_) => return false,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(directive))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
