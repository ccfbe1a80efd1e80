use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Duration, OffsetDateTime};

/// Rate figures reported by the backend for a single attempt. Any field may be missing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
	pub cost: Option<u32>,
	pub remaining: Option<u32>,
	pub limit: Option<u32>,
	#[serde(default, with = "crate::time_serde::option")]
	pub reset_at: Option<OffsetDateTime>,
}
impl RateLimitSnapshot {
	/// Reads the `rateLimit { cost remaining limit resetAt }` selection from a response `data`
	/// object.
	pub fn from_graphql_data(data: &Value) -> Option<Self> {
		let rate = data.get("rateLimit")?;
		let wire: WireRateLimit = serde_json::from_value(rate.clone()).ok()?;

		Some(Self {
			cost: wire.cost,
			remaining: wire.remaining,
			limit: wire.limit,
			reset_at: wire.reset_at,
		})
	}

	pub fn is_empty(&self) -> bool {
		self.cost.is_none()
			&& self.remaining.is_none()
			&& self.limit.is_none()
			&& self.reset_at.is_none()
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRateLimit {
	cost: Option<u32>,
	remaining: Option<u32>,
	limit: Option<u32>,
	#[serde(default, with = "crate::time_serde::option")]
	reset_at: Option<OffsetDateTime>,
}

/// Backend-reported allowance. Only ever overwritten with reported figures, never decremented
/// from a local estimate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBudget {
	pub remaining: Option<u32>,
	pub limit: Option<u32>,
	#[serde(default, with = "crate::time_serde::option")]
	pub reset_at: Option<OffsetDateTime>,
	pub last_cost: Option<u32>,
	pub total_cost: u64,
	pub attempts: u64,
}
impl RateBudget {
	/// Records one physical attempt and whatever the backend reported for it.
	pub fn absorb(&mut self, snapshot: Option<&RateLimitSnapshot>) {
		self.attempts += 1;

		let Some(snapshot) = snapshot else {
			return;
		};

		if let Some(remaining) = snapshot.remaining {
			self.remaining = Some(remaining);
		}
		if let Some(limit) = snapshot.limit {
			self.limit = Some(limit);
		}
		if let Some(reset_at) = snapshot.reset_at {
			self.reset_at = Some(reset_at);
		}
		if let Some(cost) = snapshot.cost {
			self.last_cost = Some(cost);
			self.total_cost += u64::from(cost);
		}
	}

	/// Time to wait before the next request when the remaining points are below `floor` and the
	/// reset lies in the future.
	pub fn pause_needed(&self, floor: u32, now: OffsetDateTime) -> Option<Duration> {
		let remaining = self.remaining?;
		let reset_at = self.reset_at?;

		if remaining >= floor || reset_at <= now {
			return None;
		}

		Some(reset_at - now)
	}
}
