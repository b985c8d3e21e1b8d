use crate::config::Environment;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
fn default_directives(env: &Environment) -> &'static str {
    match env {
        Environment::Dev => "genchou_backend=debug,tower_http=debug,info",
        Environment::Staging => "genchou_backend=debug,tower_http=info,info",
        Environment::Prod => "genchou_backend=info,tower_http=warn,warn",
    }
}

pub fn init_logging(env: &Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(env)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(env.is_dev())
        .with_line_number(env.is_dev());

    // Log collectors in production expect JSON lines
    match env {
        Environment::Prod => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json().flatten_event(true))
            .init(),
        Environment::Staging => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.compact())
            .init(),
        Environment::Dev => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.pretty())
            .init(),
    }

    tracing::info!(directives = default_directives(env), "Logging initialized for {:?} environment", env);
}
