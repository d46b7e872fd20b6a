// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{process::ExitCode, time::Duration};

use clap::Parser;
use tracing_subscriber::EnvFilter;
use wsrelay_sub_server::{Listener, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "wsrelay", version, about = "WebSocket chat relay")]
struct Args {
	/// Interface to listen on
	#[arg(long, env = "WSRELAY_HOST", default_value = "0.0.0.0")]
	host: String,

	/// TCP port to listen on
	#[arg(long, env = "WSRELAY_PORT", default_value_t = 8080)]
	port: u16,

	/// Upper bound on one readiness wait, in seconds
	#[arg(long, default_value_t = 10)]
	poll_timeout: u64,
}

impl Args {
	fn bind_addr(&self) -> String {
		if self.host.contains(':') {
			format!("[{}]:{}", self.host, self.port)
		} else {
			format!("{}:{}", self.host, self.port)
		}
	}
}

fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let args = Args::parse();
	let config = ServerConfig::default()
		.with_bind_addr(args.bind_addr())
		.with_poll_timeout(Duration::from_secs(args.poll_timeout));

	match Listener::start(config).and_then(Listener::wait) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!("{}", e);
			ExitCode::FAILURE
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let args = Args::parse_from(["wsrelay"]);
		assert_eq!(args.bind_addr(), "0.0.0.0:8080");
	}

	#[test]
	fn test_ipv6_host() {
		let args = Args::parse_from(["wsrelay", "--host", "::1", "--port", "9000"]);
		assert_eq!(args.bind_addr(), "[::1]:9000");
	}
}
