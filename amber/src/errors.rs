use std::fmt::{Display, Formatter};

pub type Result<T> = std::result::Result<T, SerializationError>;

#[derive(Debug)]
pub enum SerializationError {
	CyclicDependency(String),
	TruncatedInput,
	UnknownToken(u8),
	TypeNotFound(String),
	AssemblyNotFound(String),
	NoSerializerFor(String),
	VersionNotSupported {
		type_name: String,
		version: u32,
		max_version: u32,
	},
	Overflow,
	MalformedTypeName(String),
	InvalidArchiveState(&'static str),
	IoError(std::io::Error),
}

impl From<std::io::Error> for SerializationError {
	fn from(value: std::io::Error) -> Self {
		match value.kind() {
			std::io::ErrorKind::UnexpectedEof => Self::TruncatedInput,
			_ => Self::IoError(value),
		}
	}
}

impl Display for SerializationError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::CyclicDependency(ty) => write!(f, "Cyclic dependency through custom-serialized object of type `{ty}`"),
			Self::TruncatedInput => write!(f, "The stream ended before an expected token or payload"),
			Self::UnknownToken(byte) => write!(f, "Unknown token discriminator {byte:#04X}"),
			Self::TypeNotFound(ty) => write!(f, "No registered type matches `{ty}`"),
			Self::AssemblyNotFound(name) => write!(f, "No registered assembly matches `{name}`"),
			Self::NoSerializerFor(ty) => write!(f, "No serializer is registered for type `{ty}`"),
			Self::VersionNotSupported { type_name, version, max_version } => {
				write!(f, "Version {version} of type `{type_name}` is not supported (max supported version: {max_version})")
			},
			Self::Overflow => write!(f, "A decoded value exceeds its domain"),
			Self::MalformedTypeName(name) => write!(f, "Malformed type name `{name}`"),
			Self::InvalidArchiveState(message) => write!(f, "Invalid archive state: {message}"),
			Self::IoError(err) => Display::fmt(err, f),
		}
	}
}

impl std::error::Error for SerializationError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::IoError(err) => Some(err),
			_ => None,
		}
	}
}
