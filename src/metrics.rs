use std::net::SocketAddr;
use std::sync::mpsc;

use error_set::error_set;
use metrics_exporter_prometheus::PrometheusBuilder;
use rootcause::Report;

error_set! {
    MetricsError := {
        #[display("metrics thread failed to start")]
        ThreadStart,
        #[display("{message}")]
        Build { message: String },
        #[display("global metrics recorder already installed")]
        RecorderInstall,
    }
}

pub type MetricsResult<T> = Result<T, Report<MetricsError>>;

pub mod names {
    pub const REWRITES_TOTAL: &str = "subquery_resolver.rewrites.total";
    pub const REWRITE_PASSES: &str = "subquery_resolver.rewrite.passes";
    pub const REWRITE_PASSES_EXHAUSTED: &str = "subquery_resolver.rewrite.passes_exhausted";

    pub const SUBQUERIES_EXECUTED: &str = "subquery_resolver.subqueries.executed";
    pub const SUBQUERIES_FAILED: &str = "subquery_resolver.subqueries.failed";
    pub const FINAL_QUERIES_FAILED: &str = "subquery_resolver.final_queries.failed";

    // histograms
    pub const SUBQUERY_VALUES: &str = "subquery_resolver.subquery.values";
    pub const REWRITE_LATENCY_SECONDS: &str = "subquery_resolver.rewrite.latency_seconds";
}

/// Install the Prometheus recorder serving `/metrics` on `metrics_socket`.
///
/// Without an installed recorder the counters in this crate are no-ops.
pub fn prometheus_install(metrics_socket: SocketAddr) -> MetricsResult<()> {
    let builder = PrometheusBuilder::new()
        .set_quantiles(&[0.5, 0.95, 0.99])
        .map_err(|e| Report::new(MetricsError::Build {
            message: e.to_string(),
        }))?
        .with_http_listener(metrics_socket);

    // build() needs a tokio runtime for the listener; the exporter keeps that
    // runtime on its own thread for the life of the process
    let (tx, rx) = mpsc::sync_channel(1);

    std::thread::Builder::new()
        .name("metrics".to_owned())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = tx.send(Err(format!("tokio runtime creation failed: {e}")));
                    return;
                }
            };

            let _guard = rt.enter();

            let (prometheus, exporter_future) = match builder.build() {
                Ok(result) => result,
                Err(e) => {
                    let _ = tx.send(Err(format!("prometheus build failed: {e}")));
                    return;
                }
            };

            let _ = tx.send(Ok(prometheus));

            if let Err(e) = rt.block_on(exporter_future) {
                tracing::error!("prometheus exporter failed: {e:?}");
            }
        })
        .map_err(|_| Report::new(MetricsError::ThreadStart))?;

    let prometheus = rx
        .recv()
        .map_err(|_| Report::new(MetricsError::ThreadStart))?
        .map_err(|message| Report::new(MetricsError::Build { message }))?;

    metrics::set_global_recorder(prometheus)
        .map_err(|_| Report::new(MetricsError::RecorderInstall))?;

    Ok(())
}
