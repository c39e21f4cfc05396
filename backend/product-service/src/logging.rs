/// Tracing subscriber setup shared by both binaries
///
/// `RUST_LOG` overrides the default directives. `LOG_FORMAT=json` switches
/// to one JSON object per line.
use tracing_subscriber::EnvFilter;

pub fn init(binary_target: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("product_service=info,{binary_target}=info")));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
