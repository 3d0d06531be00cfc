use anyhow::Context;
use atvlogger::{
	config::{interval_from_micros, DEFAULT_MQTT_HOST},
	parse_qos, Filter, Options, PayloadKind, PayloadSource, Session, Topic, Watch,
};
use clap::Parser;
use rumqttc::QoS;
use std::{io, path::PathBuf, time::Duration};
use tokio::signal;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let arguments = Arguments::parse();
	setup_tracing(arguments.verbose)?;

	let options = Options::try_from(arguments)?;
	tracing::debug!(?options);

	let payload = PayloadSource::open(&options.payload)
		.await
		.with_context(|| format!("failed to open payload source {:?}", options.payload))?;

	let session = Session::new(options)?;
	let summary = session.run(payload, shutdown_signal()).await?;
	tracing::debug!(?summary, "exiting");

	Ok(())
}

fn setup_tracing(verbose: bool) -> Result<(), SetGlobalDefaultError> {
	let default_level = if verbose {
		LevelFilter::DEBUG
	} else {
		LevelFilter::INFO
	};

	let filter = EnvFilter::builder()
		.with_default_directive(default_level.into())
		.with_env_var("MQTT_LOG")
		.from_env_lossy();

	// Messages are reported on stdout, keep diagnostics apart.
	let subscriber = tracing_subscriber::fmt()
		.with_file(true)
		.with_target(false)
		.with_writer(io::stderr)
		.with_env_filter(filter)
		.finish();

	tracing::subscriber::set_global_default(subscriber)
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{signal as unix_signal, SignalKind};
		match unix_signal(SignalKind::terminate()) {
			Ok(mut terminate) => {
				tokio::select! {
					result = signal::ctrl_c() => log_signal_error(result),
					_ = terminate.recv() => {}
				}
			}
			Err(error) => {
				tracing::warn!(%error, "unable to listen for SIGTERM");
				log_signal_error(signal::ctrl_c().await);
			}
		}
	}

	#[cfg(not(unix))]
	log_signal_error(signal::ctrl_c().await);
}

fn log_signal_error(result: io::Result<()>) {
	if let Err(error) = result {
		tracing::error!(%error, "unable to listen for interrupt signal");
	}
}

impl TryFrom<Arguments> for Options {
	type Error = atvlogger::Error;

	fn try_from(value: Arguments) -> Result<Self, Self::Error> {
		let Arguments {
			stdin,
			filename,
			delay,
			address,
			port,
			keepalive,
			qos,
			id,
			disable_clean_session,
			subscribe,
			topic,
			message,
			counter,
			watches,
			retry_delay,
			max_retry_delay,
			..
		} = value;

		let mut options = Options::default();
		options.set_address(&address)?;

		if let Some(port) = port {
			options.port = port;
		}
		if let Some(keep_alive) = keepalive {
			options.keep_alive = keep_alive;
		}
		if let Some(id) = id {
			options.client_id = id;
		}
		if disable_clean_session {
			options.clean_session = false;
		}
		if !watches.is_empty() {
			options.watches = watches;
		}

		let retry_delay = Duration::from_secs(retry_delay);
		let max_retry_delay = max_retry_delay.map_or(retry_delay, Duration::from_secs);

		options.payload = match (stdin, filename, counter) {
			(true, _, _) => PayloadKind::Stdin,
			(false, Some(path), _) => PayloadKind::File(path),
			(false, None, Some(start)) => PayloadKind::Counter { start },
			(false, None, None) => PayloadKind::Text(message),
		};

		Ok(Options {
			qos,
			subscription: subscribe,
			topic,
			interval: interval_from_micros(delay),
			retry: retry_delay..max_retry_delay,
			..options
		})
	}
}

/// Subscribe to a topic, log what arrives and publish on a fixed interval.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Arguments {
	/// Show verbose output.
	#[arg(short, long)]
	verbose: bool,

	/// Read payloads from stdin, one line per publish.
	#[arg(short = 'i', long, conflicts_with_all = ["filename", "counter", "message"])]
	stdin: bool,

	/// Read payloads from a file, one line per publish.
	#[arg(short, long, conflicts_with_all = ["counter", "message"])]
	filename: Option<PathBuf>,

	/// Delay between two publishes, in microseconds. 0 publishes once a
	/// second.
	#[arg(short = 'D', long, default_value = "0")]
	delay: u64,

	/// MQTT broker to connect to, a host name or an mqtt:// url.
	#[arg(short, long, default_value = DEFAULT_MQTT_HOST, env = "MQTT_HOST")]
	address: String,

	/// MQTT broker port.
	#[arg(short, long, env = "MQTT_PORT")]
	port: Option<u16>,

	/// Keep-alive timeout, in seconds.
	#[arg(short, long)]
	keepalive: Option<u16>,

	/// Quality of service, 0, 1 or 2, for the subscription and every publish.
	#[arg(short, long, default_value = "2", value_parser = parse_qos)]
	qos: QoS,

	/// ID to use for this client.
	#[arg(long, env = "MQTT_ID")]
	id: Option<String>,

	/// Disable clean session to enable persistent sessions.
	#[arg(short = 'c')]
	disable_clean_session: bool,

	/// Topic filter to subscribe to.
	#[arg(short, long, default_value = "/hello")]
	subscribe: Filter,

	/// Topic to publish to.
	#[arg(short, long, default_value = "/hello")]
	topic: Topic,

	/// Payload to publish.
	#[arg(short, long, default_value = "banana")]
	message: String,

	/// Publish an incrementing integer, starting at START.
	#[arg(
		long,
		value_name = "START",
		num_args = 0..=1,
		default_missing_value = "0",
		conflicts_with = "message"
	)]
	counter: Option<u64>,

	/// Report messages matching FILTER with an extra line naming LABEL.
	/// Defaults to ADC=/devices/wb-adc/controls/+.
	#[arg(short, long = "watch", value_name = "LABEL=FILTER")]
	watches: Vec<Watch>,

	/// Seconds to wait before reconnecting after a connection error.
	#[arg(long, default_value = "10")]
	retry_delay: u64,

	/// Upper bound when doubling the reconnect delay. Defaults to
	/// --retry-delay, which keeps the delay fixed.
	#[arg(long)]
	max_retry_delay: Option<u64>,
}

#[cfg(test)]
mod tests {
	use super::Arguments;
	use atvlogger::{Options, PayloadKind};
	use clap::{CommandFactory, Parser};
	use rumqttc::QoS;
	use std::time::Duration;

	fn parse(args: &[&str]) -> Options {
		let arguments = Arguments::try_parse_from(args).unwrap();
		Options::try_from(arguments).unwrap()
	}

	#[test]
	fn verify_cli() {
		Arguments::command().debug_assert();
	}

	#[test]
	fn short_flags() {
		let options = parse(&[
			"atvlogger", "-a", "broker", "-p", "1884", "-k", "30", "-q", "1", "-D", "500000",
		]);
		assert_eq!(options.host, "broker");
		assert_eq!(options.port, 1884);
		assert_eq!(options.keep_alive, 30);
		assert_eq!(options.qos, QoS::AtLeastOnce);
		assert_eq!(options.interval, Duration::from_millis(500));
		assert_eq!(options.payload, PayloadKind::Text("banana".into()));
	}

	#[test]
	fn payload_sources() {
		assert_eq!(
			parse(&["atvlogger", "-i"]).payload,
			PayloadKind::Stdin
		);
		assert_eq!(
			parse(&["atvlogger", "-f", "lines.txt"]).payload,
			PayloadKind::File("lines.txt".into())
		);
		assert_eq!(
			parse(&["atvlogger", "--counter"]).payload,
			PayloadKind::Counter { start: 0 }
		);
		assert_eq!(
			parse(&["atvlogger", "--counter", "7"]).payload,
			PayloadKind::Counter { start: 7 }
		);
		assert!(Arguments::try_parse_from(["atvlogger", "-i", "-f", "lines.txt"]).is_err());
	}

	#[test]
	fn rejects_invalid_values() {
		assert!(Arguments::try_parse_from(["atvlogger", "-q", "3"]).is_err());
		assert!(Arguments::try_parse_from(["atvlogger", "-t", "a/+"]).is_err());
		assert!(Arguments::try_parse_from(["atvlogger", "-s", "a/#/b"]).is_err());
	}

	#[test]
	fn url_address_keeps_explicit_port() {
		let options = parse(&["atvlogger", "-a", "mqtt://broker:1999", "-p", "2000"]);
		assert_eq!(options.host, "broker");
		assert_eq!(options.port, 2000);

		let options = parse(&["atvlogger", "-a", "mqtt://broker:1999?keep_alive=5"]);
		assert_eq!(options.port, 1999);
		assert_eq!(options.keep_alive, 5);
	}

	#[test]
	fn retry_delays() {
		let options = parse(&["atvlogger"]);
		assert_eq!(
			options.retry,
			Duration::from_secs(10)..Duration::from_secs(10)
		);

		let options = parse(&["atvlogger", "--retry-delay", "1", "--max-retry-delay", "60"]);
		assert_eq!(
			options.retry,
			Duration::from_secs(1)..Duration::from_secs(60)
		);
	}
}
