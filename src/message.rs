use crate::Watch;
use bytes::Bytes;
use std::{
	fmt,
	io::{self, Write},
};

/// A message received from the broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
	pub topic: String,
	pub payload: Bytes,
}

impl From<rumqttc::Publish> for Message {
	#[inline]
	fn from(value: rumqttc::Publish) -> Self {
		Self {
			topic: value.topic,
			payload: value.payload,
		}
	}
}

impl fmt::Display for Message {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"got message '{}' for topic '{}'",
			String::from_utf8_lossy(&self.payload),
			self.topic
		)
	}
}

/// Writes the report for `message`: one line for the message itself, and
/// one line for every watch whose filter matches the topic.
///
/// Returns the number of matching watches.
pub fn report<W: Write>(out: &mut W, message: &Message, watches: &[Watch]) -> io::Result<usize> {
	writeln!(out, "{message}")?;

	let mut matched = 0;
	for watch in watches.iter().filter(|w| w.filter.matches(&message.topic)) {
		writeln!(out, "got message for {} topic", watch.label)?;
		matched += 1;
	}

	Ok(matched)
}
