use crate::{
	holdoff::HoldOff,
	message::{self, Message},
	payload::PayloadSource,
	Error, Options, Result,
};
use bytes::Bytes;
use rumqttc::{
	AsyncClient, ClientError, ConnAck, ConnectReturnCode, ConnectionError, Event, EventLoop,
	Incoming, Outgoing,
};
use std::{
	future::Future,
	io::{self, Write},
	time::Duration,
};
use tokio::time::{self, MissedTickBehavior};

/// Upper bound on the time spent flushing the disconnect on exit.
const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Counters reported when a session ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
	pub published: u64,
	pub received: u64,
	pub publish_errors: u64,
	pub reconnects: u64,
}

/// What to do after the connection to the broker failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
	/// Wait the given delay, then reconnect.
	Retry(Duration),
	/// Give up, the broker was never reachable.
	Terminate,
}

/// Connection state of a session.
#[derive(Debug)]
pub struct Link {
	holdoff: HoldOff,
	connected: bool,
	ever_connected: bool,
	reconnects: u64,
}

impl Link {
	pub fn new(holdoff: HoldOff) -> Self {
		Self {
			holdoff,
			connected: false,
			ever_connected: false,
			reconnects: 0,
		}
	}

	#[inline]
	pub fn is_connected(&self) -> bool {
		self.connected
	}

	/// Number of accepted connections after the first one.
	#[inline]
	pub fn reconnects(&self) -> u64 {
		self.reconnects
	}

	/// Records an accepted connection.
	pub fn connected(&mut self) {
		if self.ever_connected {
			self.reconnects += 1;
		}
		self.connected = true;
		self.ever_connected = true;
		self.holdoff.reset();
	}

	/// Records a failed or lost connection.
	pub fn failed(&mut self) -> Decision {
		self.connected = false;
		if self.ever_connected {
			Decision::Retry(self.holdoff.increase())
		} else {
			Decision::Terminate
		}
	}

	#[inline]
	pub async fn hold_off(&self) {
		self.holdoff.wait().await
	}
}

/// Human-readable description of a CONNACK return code.
pub fn describe_connack(code: &ConnectReturnCode) -> &'static str {
	match code {
		ConnectReturnCode::Success => "Connection Accepted.",
		ConnectReturnCode::RefusedProtocolVersion => {
			"Connection Refused: unacceptable protocol version."
		}
		ConnectReturnCode::BadClientId => "Connection Refused: identifier rejected.",
		ConnectReturnCode::ServiceUnavailable => "Connection Refused: broker unavailable.",
		ConnectReturnCode::BadUserNamePassword => "Connection Refused: bad user name or password.",
		ConnectReturnCode::NotAuthorized => "Connection Refused: not authorised.",
	}
}

/// A connection to the broker which subscribes to one filter, reports every
/// received message and publishes a payload on a fixed interval.
pub struct Session {
	client: AsyncClient,
	eventloop: EventLoop,
	options: Options,
	link: Link,
	summary: Summary,
	output: Box<dyn Write + Send>,
}

impl Session {
	/// Creates the broker client. No connection is made until [`run`] is
	/// awaited.
	///
	/// [`run`]: Session::run
	pub fn new(options: Options) -> Result<Self> {
		let mqtt_options = options.to_mqtt_options()?;
		let (client, eventloop) = AsyncClient::new(mqtt_options, options.capacity);
		let link = Link::new(HoldOff::new(options.retry.clone()));

		Ok(Self {
			client,
			eventloop,
			options,
			link,
			summary: Summary::default(),
			output: Box::new(io::stdout()),
		})
	}

	/// Writes message reports to `output` instead of standard output.
	pub fn report_to(self, output: impl Write + Send + 'static) -> Self {
		Self {
			output: Box::new(output),
			..self
		}
	}

	/// Drives the session until `shutdown` completes or `payload` is
	/// exhausted.
	///
	/// Fails if the first connection attempt fails, or on an error reading
	/// `payload` or writing a report. Once connected, connection and publish
	/// errors are logged and the session reconnects after the hold-off delay.
	/// The broker is sent a DISCONNECT whichever way the session ends.
	pub async fn run<F>(mut self, mut payload: PayloadSource, shutdown: F) -> Result<Summary>
	where
		F: Future<Output = ()>,
	{
		tokio::pin!(shutdown);

		let mut ticker = time::interval(self.options.interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		// Set by a tick, cleared once the payload for that tick is taken.
		let mut due = false;
		let mut failure: Option<Error> = None;

		tracing::info!(
			host = %self.options.host,
			port = self.options.port,
			client_id = %self.options.client_id,
			"connecting"
		);

		loop {
			let error = tokio::select! {
				biased;
				_ = &mut shutdown => {
					tracing::info!("shutdown requested");
					break;
				}
				event = self.eventloop.poll() => match event {
					Ok(event) => {
						if let Err(error) = self.handle_event(event) {
							failure = Some(error);
							break;
						}
						continue;
					}
					Err(ConnectionError::ConnectionRefused(code)) => Error::ConnectionRefused(code),
					Err(error) => Error::Connection(error),
				},
				_ = ticker.tick(), if self.link.is_connected() && !due => {
					due = true;
					continue;
				}
				next = payload.next(), if self.link.is_connected() && due => {
					due = false;
					match next {
						Ok(Some(bytes)) => match self.publish(bytes) {
							Ok(()) => continue,
							Err(error) => {
								// Start over on a fresh connection.
								self.eventloop.clean();
								Error::Client(error)
							}
						},
						Ok(None) => {
							tracing::info!("payload source exhausted");
							break;
						}
						Err(error) => {
							failure = Some(error.into());
							break;
						}
					}
				}
			};

			let Decision::Retry(delay) = self.link.failed() else {
				failure = Some(error);
				break;
			};

			tracing::error!(%error, ?delay, "connection error, retrying ...");
			tokio::select! {
				biased;
				_ = &mut shutdown => {
					tracing::info!("shutdown requested");
					break;
				}
				_ = self.link.hold_off() => {}
			}
		}

		self.disconnect().await;

		let summary = Summary {
			reconnects: self.link.reconnects(),
			..self.summary
		};
		tracing::info!(?summary, "session finished");

		match failure {
			Some(error) => Err(error),
			None => Ok(summary),
		}
	}

	fn handle_event(&mut self, event: Event) -> Result<()> {
		match event {
			Event::Incoming(Incoming::ConnAck(ConnAck {
				session_present,
				code,
			})) => {
				tracing::info!(session_present, "on_connect: {}", describe_connack(&code));
				if code != ConnectReturnCode::Success {
					return Ok(());
				}

				self.link.connected();
				let filter = &self.options.subscription;
				if let Err(error) = self.client.try_subscribe(filter.as_str(), self.options.qos) {
					tracing::error!(%error, %filter, "failed to subscribe");
				}
			}
			Event::Incoming(Incoming::SubAck(suback)) => {
				tracing::debug!(pkid = suback.pkid, codes = ?suback.return_codes, "subscribed");
			}
			Event::Incoming(Incoming::Publish(publish)) => {
				self.summary.received += 1;
				let message = Message::from(publish);
				message::report(&mut self.output, &message, &self.options.watches)?;
			}
			Event::Incoming(packet) => tracing::trace!(?packet, "incoming"),
			Event::Outgoing(outgoing) => tracing::trace!(?outgoing, "outgoing"),
		}
		Ok(())
	}

	fn publish(&mut self, payload: Bytes) -> std::result::Result<(), ClientError> {
		let topic = &self.options.topic;
		let len = payload.len();
		match self
			.client
			.try_publish(topic.as_str(), self.options.qos, false, payload.to_vec())
		{
			Ok(()) => {
				self.summary.published += 1;
				tracing::debug!(%topic, len, "published");
				Ok(())
			}
			Err(error) => {
				self.summary.publish_errors += 1;
				Err(error)
			}
		}
	}

	/// Sends DISCONNECT and polls the event loop until the broker closes the
	/// connection.
	async fn disconnect(&mut self) {
		if !self.link.is_connected() {
			return;
		}

		if let Err(error) = self.client.try_disconnect() {
			tracing::warn!(%error, "failed to request disconnect");
			return;
		}

		let eventloop = &mut self.eventloop;
		let flushed = time::timeout(EXIT_TIMEOUT, async move {
			loop {
				match eventloop.poll().await {
					Ok(Event::Outgoing(Outgoing::Disconnect)) => tracing::debug!("disconnect sent"),
					Ok(event) => tracing::trace!(?event, "draining"),
					Err(error) => {
						tracing::debug!(%error, "connection closed");
						break;
					}
				}
			}
		})
		.await;

		if flushed.is_err() {
			tracing::warn!("disconnect timed-out, exiting");
		}
	}
}
