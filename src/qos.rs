use rumqttc::QoS;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid quality of service {0}, expected 0, 1 or 2")]
pub struct InvalidQoS(pub u8);

/// Converts the integer form of a quality of service into the broker client's
/// [`QoS`].
///
/// # Example
/// ```
/// # use atvlogger::qos_from_u8;
/// use rumqttc::QoS;
/// assert_eq!(qos_from_u8(1), Ok(QoS::AtLeastOnce));
/// assert!(qos_from_u8(3).is_err());
/// ```
#[inline]
pub fn qos_from_u8(value: u8) -> Result<QoS, InvalidQoS> {
	match value {
		0 => Ok(QoS::AtMostOnce),
		1 => Ok(QoS::AtLeastOnce),
		2 => Ok(QoS::ExactlyOnce),
		other => Err(InvalidQoS(other)),
	}
}

/// Parses a quality of service given as text, e.g. on the command line.
pub fn parse_qos(value: &str) -> Result<QoS, String> {
	let value: u8 = value
		.trim()
		.parse()
		.map_err(|_| format!("'{value}' is not an integer"))?;
	qos_from_u8(value).map_err(|error| error.to_string())
}
