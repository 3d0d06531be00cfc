use crate::{InvalidFilter, InvalidQoS, InvalidTopic};
use rumqttc::{ClientError, ConnectReturnCode, ConnectionError};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("invalid filter: {0}")]
	InvalidFilter(#[from] InvalidFilter),
	#[error("invalid topic: {0}")]
	InvalidTopic(#[from] InvalidTopic),
	#[error(transparent)]
	InvalidQoS(#[from] InvalidQoS),
	#[error("invalid client id {0:?}")]
	InvalidClientId(String),
	#[error("invalid broker url: {0}")]
	InvalidUrl(#[from] url::ParseError),
	#[error("invalid value {value:?} for url parameter '{key}'")]
	InvalidUrlParameter { key: String, value: String },
	#[error("the url scheme '{0}' is not supported")]
	UnsupportedScheme(String),
	#[error("connection refused: {}", crate::session::describe_connack(.0))]
	ConnectionRefused(ConnectReturnCode),
	#[error("connection error: {0}")]
	Connection(#[from] ConnectionError),
	#[error("client error: {0}")]
	Client(#[from] ClientError),
	#[error(transparent)]
	Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
