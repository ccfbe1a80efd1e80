use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, Duration, OffsetDateTime};

use crate::Identifier;

/// Enriched data for one identifier, as handed to the ranking collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
	/// The identifier that was requested.
	pub identifier: Identifier,
	/// The login as the backend spells it, which may differ in case.
	pub login: String,
	pub profile: Profile,
	pub repositories: Vec<Repository>,
	pub activity: ActivitySeries,
}
impl CandidateRecord {
	/// Decodes one aliased user node from a batch response.
	pub fn decode(identifier: Identifier, node: &Value) -> serde_json::Result<Self> {
		let wire = WireUser::deserialize(node)?;
		let mut days: Vec<ActivityDay> = wire
			.contributions_collection
			.contribution_calendar
			.weeks
			.into_iter()
			.flat_map(|week| week.contribution_days)
			.map(|day| ActivityDay { date: day.date, count: day.contribution_count })
			.collect();

		days.sort_by_key(|day| day.date);

		Ok(Self {
			identifier,
			login: wire.login,
			profile: Profile {
				name: non_blank(wire.name),
				bio: non_blank(wire.bio),
				company: non_blank(wire.company),
				location: non_blank(wire.location),
				email: non_blank(wire.email),
				website_url: non_blank(wire.website_url),
				twitter_username: non_blank(wire.twitter_username),
				followers: wire.followers.total_count,
				following: wire.following.total_count,
				repository_count: wire.repositories.total_count,
			},
			repositories: wire
				.repositories
				.nodes
				.into_iter()
				.map(|repo| Repository {
					name: repo.name,
					description: non_blank(repo.description),
					stargazer_count: repo.stargazer_count,
					fork_count: repo.fork_count,
					primary_language: repo.primary_language.map(|language| language.name),
					url: repo.url,
					pushed_at: repo.pushed_at,
				})
				.collect(),
			activity: ActivitySeries {
				total: wire.contributions_collection.contribution_calendar.total_contributions,
				days,
			},
		})
	}

	pub fn total_stars(&self) -> u64 {
		self.repositories.iter().map(|repo| u64::from(repo.stargazer_count)).sum()
	}

	pub fn last_pushed_at(&self) -> Option<OffsetDateTime> {
		self.repositories.iter().filter_map(|repo| repo.pushed_at).max()
	}
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
	pub name: Option<String>,
	pub bio: Option<String>,
	pub company: Option<String>,
	pub location: Option<String>,
	pub email: Option<String>,
	pub website_url: Option<String>,
	pub twitter_username: Option<String>,
	pub followers: u32,
	pub following: u32,
	pub repository_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
	pub name: String,
	pub description: Option<String>,
	pub stargazer_count: u32,
	pub fork_count: u32,
	pub primary_language: Option<String>,
	pub url: String,
	#[serde(default, with = "crate::time_serde::option")]
	pub pushed_at: Option<OffsetDateTime>,
}

/// Per-day counts over the requested window, ordered by date.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySeries {
	pub total: u32,
	pub days: Vec<ActivityDay>,
}
impl ActivitySeries {
	/// Sum over the trailing `days` ending at `as_of`, inclusive.
	pub fn total_in_last(&self, days: u32, as_of: Date) -> u32 {
		let start = as_of - Duration::days(i64::from(days.saturating_sub(1)));

		self.days
			.iter()
			.filter(|day| start <= day.date && day.date <= as_of)
			.map(|day| day.count)
			.sum()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDay {
	#[serde(with = "crate::time_serde::date")]
	pub date: Date,
	pub count: u32,
}

fn non_blank(value: Option<String>) -> Option<String> {
	value.filter(|value| !value.trim().is_empty())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUser {
	login: String,
	name: Option<String>,
	bio: Option<String>,
	company: Option<String>,
	location: Option<String>,
	email: Option<String>,
	website_url: Option<String>,
	twitter_username: Option<String>,
	followers: WireCount,
	following: WireCount,
	repositories: WireRepositories,
	contributions_collection: WireContributions,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCount {
	total_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRepositories {
	total_count: u32,
	#[serde(default)]
	nodes: Vec<WireRepository>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRepository {
	name: String,
	description: Option<String>,
	stargazer_count: u32,
	fork_count: u32,
	#[serde(default, with = "crate::time_serde::option")]
	pushed_at: Option<OffsetDateTime>,
	primary_language: Option<WireLanguage>,
	url: String,
}

#[derive(Deserialize)]
struct WireLanguage {
	name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireContributions {
	contribution_calendar: WireCalendar,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCalendar {
	total_contributions: u32,
	#[serde(default)]
	weeks: Vec<WireWeek>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireWeek {
	#[serde(default)]
	contribution_days: Vec<WireDay>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDay {
	contribution_count: u32,
	#[serde(with = "crate::time_serde::date")]
	date: Date,
}
