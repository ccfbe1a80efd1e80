use std::fmt;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// Longest login the backend accepts.
pub const MAX_IDENTIFIER_CHARS: usize = 39;

/// Opaque key naming one account. Equality is case-sensitive; the backend's own case folding is
/// not assumed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);
impl Identifier {
	pub fn new(raw: impl Into<String>) -> Self {
		Self(raw.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_inner(self) -> String {
		self.0
	}
}
impl fmt::Display for Identifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}
impl AsRef<str> for Identifier {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<&str> for Identifier {
	fn from(raw: &str) -> Self {
		Self(raw.to_string())
	}
}
impl From<String> for Identifier {
	fn from(raw: String) -> Self {
		Self(raw)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectCode {
	Empty,
	TooLong,
	InvalidCharacter,
	LeadingHyphen,
}
impl RejectCode {
	pub fn describe(self) -> &'static str {
		match self {
			Self::Empty => "identifier is empty",
			Self::TooLong => "identifier exceeds 39 characters",
			Self::InvalidCharacter => "identifier contains characters other than ASCII letters, digits, or hyphens",
			Self::LeadingHyphen => "identifier starts with a hyphen",
		}
	}
}
impl fmt::Display for RejectCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.describe())
	}
}

/// Checks an identifier against the login grammar before it is embedded in a request.
pub fn validate_identifier(identifier: &Identifier) -> Result<(), RejectCode> {
	let raw = identifier.as_str();

	if raw.is_empty() {
		return Err(RejectCode::Empty);
	}
	if raw.chars().count() > MAX_IDENTIFIER_CHARS {
		return Err(RejectCode::TooLong);
	}
	if !raw.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-') {
		return Err(RejectCode::InvalidCharacter);
	}
	if raw.starts_with('-') {
		return Err(RejectCode::LeadingHyphen);
	}

	Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Deduplicated {
	pub identifiers: Vec<Identifier>,
	pub duplicates_removed: usize,
}

/// Drops repeats, keeping each identifier at its first-seen position.
pub fn dedup_preserving_order<I>(identifiers: I) -> Deduplicated
where
	I: IntoIterator<Item = Identifier>,
{
	let mut seen = AHashSet::new();
	let mut out = Deduplicated::default();

	for identifier in identifiers {
		if seen.contains(&identifier) {
			out.duplicates_removed += 1;

			continue;
		}

		seen.insert(identifier.clone());
		out.identifiers.push(identifier);
	}

	out
}
