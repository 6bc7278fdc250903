use std::error::Error;
use std::io;

use subquery_resolver_lib::engine::http::HttpEngine;
use subquery_resolver_lib::metrics::prometheus_install;
use subquery_resolver_lib::request::{RequestPayload, query_qualifies};
use subquery_resolver_lib::rewrite::SubqueryResolver;
use subquery_resolver_lib::settings::Settings;
use subquery_resolver_lib::tracing_utils::QueryFormatter;

use tracing::{Level, info, warn};

fn main() -> Result<(), Box<dyn Error>> {
    let settings = Settings::from_args()?;

    // stdout carries the result rows
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_writer(io::stderr)
        .event_format(QueryFormatter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(socket) = settings.metrics_socket {
        prometheus_install(socket).map_err(|report| report.to_string())?;
        info!("serving metrics on {socket}");
    }

    let input = match &settings.query {
        Some(query) => query.clone(),
        None => io::read_to_string(io::stdin())?,
    };
    let payload = RequestPayload::parse(&input);
    let query = payload.query();
    if query.is_empty() {
        return Err("no query given".into());
    }

    if !query_qualifies(query) {
        warn!("query has no IN (SELECT ...) sub-selects, resolving anyway");
    }

    let engine = HttpEngine::new(&settings.engine)?;
    info!("engine endpoint {}", engine.endpoint());
    let resolver = SubqueryResolver::new(engine).with_max_passes(settings.max_passes);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let resolution = runtime
        .block_on(resolver.resolve(query))
        .map_err(|report| report.to_string())?;

    if resolution.rewrite.exhausted {
        warn!(
            "returned result of a partially resolved query after {} passes",
            resolution.rewrite.passes
        );
    }

    println!("{}", serde_json::to_string_pretty(&resolution.result)?);

    Ok(())
}
