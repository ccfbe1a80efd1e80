use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Identifier, RejectCode};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMember {
	pub alias: String,
	pub identifier: Identifier,
}

/// Identifiers submitted together in one enrichment request. Aliases are unique within a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
	/// 1-based position within its enrichment pass.
	pub ordinal: usize,
	pub members: Vec<BatchMember>,
}
impl Batch {
	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}

	pub fn identifiers(&self) -> impl Iterator<Item = &Identifier> {
		self.members.iter().map(|member| &member.identifier)
	}
}

pub fn batch_count(identifiers: usize, batch_size: usize) -> usize {
	identifiers.div_ceil(batch_size.max(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
	RetryableNetwork,
	RetryableGateway,
	RateOrComplexityExceeded,
	Fatal,
	InvalidIdentifier,
	MalformedRecord,
}
impl FailureKind {
	/// Worth another physical attempt at the same request shape.
	pub fn is_retryable(self) -> bool {
		matches!(self, Self::RetryableNetwork | Self::RetryableGateway)
	}

	/// Worth another pass at a smaller batch size.
	pub fn is_recoverable(self) -> bool {
		matches!(
			self,
			Self::RetryableNetwork
				| Self::RetryableGateway
				| Self::RateOrComplexityExceeded
				| Self::MalformedRecord
		)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::RetryableNetwork => "retryable_network",
			Self::RetryableGateway => "retryable_gateway",
			Self::RateOrComplexityExceeded => "rate_or_complexity_exceeded",
			Self::Fatal => "fatal",
			Self::InvalidIdentifier => "invalid_identifier",
			Self::MalformedRecord => "malformed_record",
		}
	}
}
impl fmt::Display for FailureKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
	pub kind: FailureKind,
	pub message: String,
	/// Physical attempts spent before giving up.
	pub attempts: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
	pub batch: Batch,
	pub cause: FailureCause,
	/// Recovery passes already spent on this batch.
	pub retry_count: u32,
}
impl FailureRecord {
	pub fn into_permanent(self) -> Vec<PermanentFailure> {
		let Self { batch, cause, retry_count } = self;

		batch
			.members
			.into_iter()
			.map(|member| PermanentFailure {
				identifier: member.identifier,
				kind: cause.kind,
				message: cause.message.clone(),
				attempts: cause.attempts,
				retry_count,
			})
			.collect()
	}
}

/// An identifier excluded from a batch at build time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedIdentifier {
	pub identifier: Identifier,
	pub reason: RejectCode,
}
impl RejectedIdentifier {
	pub fn into_permanent(self) -> PermanentFailure {
		PermanentFailure {
			identifier: self.identifier,
			kind: FailureKind::InvalidIdentifier,
			message: self.reason.describe().to_string(),
			attempts: 0,
			retry_count: 0,
		}
	}
}

/// Pipeline output entry for an identifier that could not be enriched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermanentFailure {
	pub identifier: Identifier,
	pub kind: FailureKind,
	pub message: String,
	pub attempts: u32,
	pub retry_count: u32,
}
