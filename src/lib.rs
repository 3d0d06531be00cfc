//! # atvlogger
//!
//! Connects to an MQTT broker, reports every message received on a
//! subscription and publishes a payload on a fixed interval.
//!
//! The MQTT session itself (framing, keep-alive, QoS delivery and the
//! reconnect mechanics) is handled by [`rumqttc`]; this crate drives it.
//!
//! ```no_run
//! # tokio_test::block_on(async {
//! use atvlogger::{Options, PayloadSource, Session};
//!
//! let options = Options::from_url("mqtt://localhost:1883").unwrap();
//! let payload = PayloadSource::open(&options.payload).await.unwrap();
//! let session = Session::new(options).unwrap();
//!
//! let summary = session
//! 	.run(payload, async {
//! 		tokio::signal::ctrl_c().await.ok();
//! 	})
//! 	.await
//! 	.unwrap();
//! println!("published {} messages", summary.published);
//! # })
//! ```
pub mod config;
mod error;
mod filter;
mod holdoff;
pub mod message;
pub mod payload;
mod qos;
pub mod session;

pub use self::{
	config::{Credentials, Options, Watch},
	error::{Error, Result},
	filter::{Filter, InvalidFilter, InvalidTopic, Topic},
	holdoff::HoldOff,
	message::Message,
	payload::{PayloadKind, PayloadSource},
	qos::{parse_qos, qos_from_u8, InvalidQoS},
	session::{describe_connack, Session, Summary},
};
