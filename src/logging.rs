//! Diagnostics on stderr through `log` and `env_logger`.

use env_logger::Env;

/// Install the global logger. `RUST_LOG` wins over the debug switch.
pub fn init(debug_mode: bool) {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default_filter(debug_mode)))
        .format_timestamp(None)
        .try_init();
}

/// Debug mode adds this crate's detail on top of everyone's warnings.
fn default_filter(debug_mode: bool) -> &'static str {
    if debug_mode {
        "warn,loghue=debug"
    } else {
        "warn"
    }
}
