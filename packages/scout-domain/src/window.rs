use serde::{Deserialize, Serialize};
use time::{
	Date, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset, error::Format,
	format_description::well_known::Rfc3339, macros::time,
};

/// Inclusive day range for the activity series. `from` starts at 00:00:00Z and `to` ends at
/// 23:59:59Z.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
	#[serde(with = "crate::time_serde::date")]
	pub from: Date,
	#[serde(with = "crate::time_serde::date")]
	pub to: Date,
}
impl TimeWindow {
	pub fn trailing_days(now: OffsetDateTime, days: u32) -> Self {
		let now = now.to_offset(UtcOffset::UTC);
		let from = (now - Duration::days(i64::from(days))).date();

		Self { from, to: now.date() }
	}

	pub fn start(&self) -> OffsetDateTime {
		self.from.midnight().assume_utc()
	}

	pub fn end(&self) -> OffsetDateTime {
		PrimitiveDateTime::new(self.to, time!(23:59:59)).assume_utc()
	}

	pub fn from_iso(&self) -> Result<String, Format> {
		self.start().format(&Rfc3339)
	}

	pub fn to_iso(&self) -> Result<String, Format> {
		self.end().format(&Rfc3339)
	}

	pub fn contains(&self, date: Date) -> bool {
		self.from <= date && date <= self.to
	}
}
