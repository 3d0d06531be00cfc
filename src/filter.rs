use std::{fmt, str::FromStr};

const LEVEL_SEPARATOR: char = '/';
const SINGLE_LEVEL_WILDCARD: char = '+';
const SINGLE_LEVEL_WILDCARD_STR: &str = "+";
const MULTI_LEVEL_WILDCARD: char = '#';
const MULTI_LEVEL_WILDCARD_STR: &str = "#";
const WILDCARDS: [char; 2] = [SINGLE_LEVEL_WILDCARD, MULTI_LEVEL_WILDCARD];

/// Maximum length of an MQTT UTF-8 string.
const MAX_LEN: usize = u16::MAX as usize;

/// An MQTT topic filter, as used for subscriptions and for watching incoming
/// topics.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Filter(String);

/// An MQTT topic name. Unlike a [`Filter`] a topic cannot contain wildcards.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Topic(String);

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidFilter {
	#[error("filter cannot be empty")]
	Empty,
	#[error("filter cannot exceed maximum length for an MQTT string (65,535 bytes)")]
	TooLong,
	#[error("filter levels cannot contain both wildcard and non-wildcard characters")]
	InvalidLevel,
	#[error("filter cannot contain multiple multi-level wildcards")]
	MultipleMultiLevelWildcards,
	#[error("multi-level wildcard can only appear in final filter level")]
	NonTerminalMultiLevelWildcard,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTopic {
	#[error("topic cannot be empty")]
	Empty,
	#[error("topic cannot exceed maximum length for an MQTT string (65,535 bytes)")]
	TooLong,
	#[error("topic cannot contain wildcard '{1}' (at position {0})")]
	Wildcard(usize, char),
}

impl Filter {
	pub fn new(filter: impl Into<String>) -> Result<Self, InvalidFilter> {
		let filter = filter.into();
		validate_filter(&filter)?;
		Ok(Self(filter))
	}

	/// Checks whether `topic` would be matched by the filter.
	///
	/// `+` consumes exactly one topic level, which may be empty. `#` consumes
	/// all remaining levels, but at least one.
	///
	/// # Example
	/// ```
	/// # use atvlogger::Filter;
	/// let filter = Filter::new("/devices/wb-adc/controls/+").unwrap();
	/// assert!(filter.matches("/devices/wb-adc/controls/A1"));
	/// assert!(!filter.matches("/devices/wb-adc/controls/A1/meta"));
	/// ```
	pub fn matches(&self, topic: &str) -> bool {
		let mut topic_levels = topic.split(LEVEL_SEPARATOR);

		for filter_level in self.levels() {
			match filter_level {
				MULTI_LEVEL_WILDCARD_STR => return topic_levels.next().is_some(),
				SINGLE_LEVEL_WILDCARD_STR => {
					if topic_levels.next().is_none() {
						return false;
					}
				}
				exact => {
					if topic_levels.next() != Some(exact) {
						return false;
					}
				}
			}
		}

		topic_levels.next().is_none()
	}

	/// Creates a Filter from an `&'static str`. The validity of the filter is
	/// *not* checked.
	#[inline]
	pub fn from_static(filter: &'static str) -> Self {
		Self(filter.into())
	}

	#[inline]
	pub fn as_str(&self) -> &str {
		&self.0
	}

	#[inline]
	pub fn levels(&self) -> impl Iterator<Item = &str> {
		self.0.split(LEVEL_SEPARATOR)
	}

	#[inline]
	pub fn into_inner(self) -> String {
		self.0
	}
}

fn validate_filter(filter: &str) -> Result<(), InvalidFilter> {
	if filter.is_empty() {
		return Err(InvalidFilter::Empty);
	}

	if filter.len() > MAX_LEN {
		return Err(InvalidFilter::TooLong);
	}

	let mut multi_wildcard_position = None;
	let mut last_level = 0;
	for (position, level) in filter.split(LEVEL_SEPARATOR).enumerate() {
		last_level = position;

		if level.len() > 1 && level.contains(&WILDCARDS[..]) {
			return Err(InvalidFilter::InvalidLevel);
		}

		if level == MULTI_LEVEL_WILDCARD_STR && multi_wildcard_position.replace(position).is_some()
		{
			return Err(InvalidFilter::MultipleMultiLevelWildcards);
		}
	}

	match multi_wildcard_position {
		Some(position) if position != last_level => {
			Err(InvalidFilter::NonTerminalMultiLevelWildcard)
		}
		_ => Ok(()),
	}
}

impl Topic {
	pub fn new(topic: impl Into<String>) -> Result<Self, InvalidTopic> {
		let topic = topic.into();

		if topic.is_empty() {
			return Err(InvalidTopic::Empty);
		}

		if topic.len() > MAX_LEN {
			return Err(InvalidTopic::TooLong);
		}

		if let Some((position, character)) = topic.char_indices().find(|(_, c)| WILDCARDS.contains(c))
		{
			return Err(InvalidTopic::Wildcard(position, character));
		}

		Ok(Self(topic))
	}

	/// Creates a Topic from an `&'static str` without validation.
	#[inline]
	pub fn from_static(topic: &'static str) -> Self {
		Self(topic.into())
	}

	#[inline]
	pub fn as_str(&self) -> &str {
		&self.0
	}

	#[inline]
	pub fn levels(&self) -> impl Iterator<Item = &str> {
		self.0.split(LEVEL_SEPARATOR)
	}
}

// Any valid topic is also a valid filter.
impl From<Topic> for Filter {
	#[inline]
	fn from(value: Topic) -> Self {
		Self(value.0)
	}
}

impl FromStr for Filter {
	type Err = InvalidFilter;
	#[inline]
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

impl FromStr for Topic {
	type Err = InvalidTopic;
	#[inline]
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

impl AsRef<str> for Filter {
	#[inline]
	fn as_ref(&self) -> &str {
		self.as_str()
	}
}

impl AsRef<str> for Topic {
	#[inline]
	fn as_ref(&self) -> &str {
		self.as_str()
	}
}

impl fmt::Display for Filter {
	#[inline]
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl fmt::Display for Topic {
	#[inline]
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}
