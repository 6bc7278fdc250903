use std::{ffi::OsString, net::SocketAddr, time::Duration};

use error_set::error_set;
use lexopt::prelude::*;
use serde::Deserialize;

use crate::rewrite::DEFAULT_MAX_PASSES;

error_set! {
    ConfigError := {
        #[display("Argument error: {message}")]
        ArgumentError { message: String },
        #[display("Missing argument: {name}")]
        ArgumentMissing { name: &'static str },
        #[display("Invalid value for {name}: {value}")]
        ArgumentInvalid { name: &'static str, value: String },
    }
}

impl From<lexopt::Error> for ConfigError {
    fn from(error: lexopt::Error) -> Self {
        Self::ArgumentError {
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct EngineSettings {
    /// Base URL of the daemon's HTTP listener, e.g. `http://127.0.0.1:9308`.
    pub url: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct Settings {
    pub engine: EngineSettings,
    pub max_passes: usize,
    pub metrics_socket: Option<SocketAddr>,
    /// Query text; read from stdin when absent.
    pub query: Option<String>,
}

impl Settings {
    pub fn from_args() -> Result<Settings, ConfigError> {
        Self::parse(lexopt::Parser::from_env())
    }

    pub fn from_arg_list<I>(args: I) -> Result<Settings, ConfigError>
    where
        I: IntoIterator,
        I::Item: Into<OsString>,
    {
        Self::parse(lexopt::Parser::from_iter(args))
    }

    fn parse(mut parser: lexopt::Parser) -> Result<Settings, ConfigError> {
        let mut engine_url: Option<String> = None;
        let mut timeout_ms: Option<u64> = None;
        let mut max_passes: Option<usize> = None;
        let mut metrics_socket: Option<SocketAddr> = None;
        let mut query: Option<String> = None;

        while let Some(arg) = parser.next()? {
            match arg {
                Long("engine_url") => engine_url = Some(parser.value()?.string()?),
                Long("timeout_ms") => timeout_ms = Some(parser.value()?.parse()?),
                Long("max_passes") => max_passes = Some(parser.value()?.parse()?),
                Long("metrics_socket") => metrics_socket = Some(parser.value()?.parse()?),
                Long("query") => query = Some(parser.value()?.string()?),
                Long("help") => {
                    println!(
                        "Usage: {} --engine_url URL [--max_passes N] [--timeout_ms MS] \
                         [--metrics_socket ADDR] [--query SQL]",
                        parser.bin_name().unwrap_or_default()
                    );
                    std::process::exit(1);
                }
                _ => return Err(arg.unexpected().into()),
            }
        }

        let max_passes = max_passes.unwrap_or(DEFAULT_MAX_PASSES);
        if max_passes == 0 {
            return Err(ConfigError::ArgumentInvalid {
                name: "max_passes",
                value: max_passes.to_string(),
            });
        }

        let settings = Settings {
            engine: EngineSettings {
                url: engine_url.ok_or(ConfigError::ArgumentMissing { name: "engine_url" })?,
                timeout: timeout_ms.map(Duration::from_millis),
            },
            max_passes,
            metrics_socket,
            query,
        };

        Ok(settings)
    }
}
