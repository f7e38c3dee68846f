use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bitflags::bitflags;
use derivative::Derivative;

bitflags! {
	#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
	pub struct AssemblyNameFlags: u32 {
		/// The assembly opts into version-insensitive matching: a persisted
		/// retargetable identity binds to any registered assembly with the
		/// same simple name, strict mode included.
		const RETARGETABLE = 0x1;
	}
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct AssemblyVersion {
	pub major: u16,
	pub minor: u16,
	pub build: u16,
	pub revision: u16,
}

impl AssemblyVersion {
	pub const ZERO: AssemblyVersion = AssemblyVersion::new(0, 0, 0, 0);

	pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> AssemblyVersion {
		AssemblyVersion { major, minor, build, revision }
	}

	pub fn is_compatible_with(&self, requested: &AssemblyVersion) -> bool {
		requested == &AssemblyVersion::ZERO || self >= requested
	}
}

impl Display for AssemblyVersion {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}.{}.{}.{}", self.major, self.minor, self.build, self.revision)
	}
}

/// The persisted identity of a unit of code: simple name, version quadruple,
/// culture and public-key token. Equality and hashing ignore the flags; two
/// identities naming the same assembly compare equal whether or not one of
/// them is marked retargetable.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct AssemblyName {
	pub name: Arc<str>,
	pub version: AssemblyVersion,
	pub culture: Arc<str>,
	#[derivative(Debug(format_with = "crate::utilities::display_as_hex"))]
	pub public_key_token: Arc<[u8]>,
	pub flags: AssemblyNameFlags,
}

impl AssemblyName {
	pub fn new(name: &str, version: AssemblyVersion) -> AssemblyName {
		AssemblyName {
			name: Arc::from(name),
			version,
			culture: Arc::from(""),
			public_key_token: Arc::from([].as_slice()),
			flags: AssemblyNameFlags::empty(),
		}
	}

	pub fn with_culture(mut self, culture: &str) -> AssemblyName {
		self.culture = Arc::from(culture);
		self
	}

	pub fn with_public_key_token(mut self, token: &[u8]) -> AssemblyName {
		self.public_key_token = Arc::from(token);
		self
	}

	pub fn retargetable(mut self) -> AssemblyName {
		self.flags |= AssemblyNameFlags::RETARGETABLE;
		self
	}

	#[inline]
	pub fn is_retargetable(&self) -> bool {
		self.flags.contains(AssemblyNameFlags::RETARGETABLE)
	}
}

impl Eq for AssemblyName {}

impl PartialEq<Self> for AssemblyName {
	fn eq(&self, other: &Self) -> bool {
		self.name == other.name
			&& self.version == other.version
			&& self.culture == other.culture
			&& self.public_key_token == other.public_key_token
	}
}

impl Hash for AssemblyName {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.name.hash(state);
		self.version.hash(state);
		self.culture.hash(state);
		self.public_key_token.hash(state);
	}
}

impl Display for AssemblyName {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}, Version={}", self.name, self.version)?;
		match self.culture.is_empty() {
			true => f.write_str(", Culture=neutral")?,
			false => write!(f, ", Culture={}", self.culture)?,
		}
		f.write_str(", PublicKeyToken=")?;
		crate::utilities::display_as_hex(&self.public_key_token, f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identity_ignores_flags() {
		let plain = AssemblyName::new("demo", AssemblyVersion::new(1, 2, 3, 4));
		let retargetable = plain.clone().retargetable();
		assert_eq!(plain, retargetable);
	}

	#[test]
	fn display_format() {
		let name = AssemblyName::new("demo", AssemblyVersion::new(1, 0, 0, 0))
			.with_public_key_token(&[0xB0, 0x3F]);
		assert_eq!(name.to_string(), "demo, Version=1.0.0.0, Culture=neutral, PublicKeyToken=b03f");
	}

	#[test]
	fn version_compatibility() {
		let v2 = AssemblyVersion::new(2, 0, 0, 0);
		assert!(v2.is_compatible_with(&AssemblyVersion::ZERO));
		assert!(v2.is_compatible_with(&AssemblyVersion::new(1, 9, 0, 0)));
		assert!(!AssemblyVersion::new(1, 0, 0, 0).is_compatible_with(&v2));
	}
}
