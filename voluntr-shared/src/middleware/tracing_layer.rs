use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// `VOLUNTR_LOG_FORMAT` wins; otherwise production deployments log JSON.
    pub fn resolve(explicit: Option<&str>, environment: Option<&str>) -> Self {
        match explicit.map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("json") => Self::Json,
            Some(f) if f.eq_ignore_ascii_case("pretty") => Self::Pretty,
            _ if environment == Some("production") => Self::Json,
            _ => Self::Pretty,
        }
    }

    fn from_env() -> Self {
        let explicit = std::env::var("VOLUNTR_LOG_FORMAT").ok();
        let environment = std::env::var("VOLUNTR_ENV").ok();
        Self::resolve(explicit.as_deref(), environment.as_deref())
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let own = service_name.replace('-', "_");
        EnvFilter::new(format!("info,{own}=debug,voluntr_shared=debug,tower_http=info"))
    });
    let format = LogFormat::from_env();

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true).with_current_span(false))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_file(true).with_line_number(true))
            .init(),
    }

    tracing::info!(service = service_name, ?format, "tracing initialized");
}
