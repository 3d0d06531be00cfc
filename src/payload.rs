use bytes::Bytes;
use std::{fmt, io, path::PathBuf};
use tokio::{
	fs::File,
	io::{AsyncBufReadExt, AsyncRead, BufReader, Split},
};

/// Where published payloads come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PayloadKind {
	/// The same text on every publish.
	Text(String),
	/// A decimal integer, incremented after every publish.
	Counter { start: u64 },
	/// One line of standard input per publish.
	Stdin,
	/// One line of the file per publish.
	File(PathBuf),
}

type LineReader = Split<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;

/// An opened [`PayloadKind`].
pub enum PayloadSource {
	Text(Bytes),
	Counter(u64),
	Lines(LineReader),
}

impl PayloadSource {
	pub async fn open(kind: &PayloadKind) -> io::Result<Self> {
		Ok(match kind {
			PayloadKind::Text(text) => Self::Text(Bytes::copy_from_slice(text.as_bytes())),
			PayloadKind::Counter { start } => Self::Counter(*start),
			PayloadKind::Stdin => Self::from_reader(tokio::io::stdin()),
			PayloadKind::File(path) => Self::from_reader(File::open(path).await?),
		})
	}

	/// Reads payloads line by line from `reader`. Lines are raw bytes, they
	/// need not be valid UTF-8.
	pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
		let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
		Self::Lines(BufReader::new(reader).split(b'\n'))
	}

	/// Returns the next payload, or `None` once a line based source is
	/// exhausted.
	///
	/// Cancel safe: dropping the future before it completes loses no line.
	pub async fn next(&mut self) -> io::Result<Option<Bytes>> {
		match self {
			Self::Text(text) => Ok(Some(text.clone())),
			Self::Counter(value) => {
				let payload = Bytes::from(value.to_string());
				*value = value.wrapping_add(1);
				Ok(Some(payload))
			}
			Self::Lines(lines) => Ok(lines.next_segment().await?.map(|mut line| {
				if line.last() == Some(&b'\r') {
					line.pop();
				}
				Bytes::from(line)
			})),
		}
	}
}

impl fmt::Debug for PayloadSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
			Self::Counter(value) => f.debug_tuple("Counter").field(value).finish(),
			Self::Lines(_) => f.write_str("Lines"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::{PayloadKind, PayloadSource};
	use bytes::Bytes;

	#[tokio::test]
	async fn text_repeats() {
		let mut source = PayloadSource::open(&PayloadKind::Text("banana".into()))
			.await
			.unwrap();
		for _ in 0..3 {
			assert_eq!(source.next().await.unwrap(), Some(Bytes::from("banana")));
		}
	}

	#[tokio::test]
	async fn counter_increments() {
		let mut source = PayloadSource::open(&PayloadKind::Counter { start: 41 })
			.await
			.unwrap();
		assert_eq!(source.next().await.unwrap(), Some(Bytes::from("41")));
		assert_eq!(source.next().await.unwrap(), Some(Bytes::from("42")));

		let mut source = PayloadSource::Counter(u64::MAX);
		assert_eq!(
			source.next().await.unwrap(),
			Some(Bytes::from(u64::MAX.to_string()))
		);
		assert_eq!(source.next().await.unwrap(), Some(Bytes::from("0")));
	}

	#[tokio::test]
	async fn lines_until_exhausted() {
		let reader = tokio_test::io::Builder::new()
			.read(b"first\r\nsec")
			.read(b"ond\nthird")
			.build();
		let mut source = PayloadSource::from_reader(reader);

		assert_eq!(source.next().await.unwrap(), Some(Bytes::from("first")));
		assert_eq!(source.next().await.unwrap(), Some(Bytes::from("second")));
		assert_eq!(source.next().await.unwrap(), Some(Bytes::from("third")));
		assert_eq!(source.next().await.unwrap(), None);
	}

	#[tokio::test]
	async fn lines_are_bytes() {
		let mut source = PayloadSource::from_reader(&b"one\n\xff\xfe\nthree\r\n"[..]);

		assert_eq!(source.next().await.unwrap(), Some(Bytes::from("one")));
		assert_eq!(
			source.next().await.unwrap(),
			Some(Bytes::from_static(b"\xff\xfe"))
		);
		assert_eq!(source.next().await.unwrap(), Some(Bytes::from("three")));
		assert_eq!(source.next().await.unwrap(), None);
	}

	#[tokio::test]
	async fn missing_file_fails_to_open() {
		let kind = PayloadKind::File("/nonexistent/atvlogger/payloads.txt".into());
		assert!(PayloadSource::open(&kind).await.is_err());
	}
}
