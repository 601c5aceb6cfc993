pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid keyword rule {label}: {message}")]
	InvalidRule { label: String, message: String },
	#[error("Unknown {kind} value {value:?}.")]
	UnknownValue { kind: &'static str, value: String },
}
