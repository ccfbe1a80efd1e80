//! Request construction for the search and enrichment endpoints.
//!
//! Everything here is pure. Identifiers travel as typed GraphQL variables and are validated
//! before a batch is assembled, so no caller-supplied text is ever spliced into query source.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::error::Format;

use crate::{
	Batch, BatchMember, Identifier, RateLimitSnapshot, RejectedIdentifier, TimeWindow,
	validate_identifier,
};

pub const MAX_SEARCH_PAGE_SIZE: u32 = 100;
/// The search endpoint never returns more than this many results for one filter.
pub const SEARCH_RESULT_CEILING: u64 = 1_000;

const RATE_LIMIT_SELECTION: &str = "rateLimit { cost remaining limit resetAt }";

const SEARCH_QUERY: &str = "\
query SearchUsers($query: String!, $first: Int!, $after: String) {
	rateLimit { cost remaining limit resetAt }
	search(query: $query, type: USER, first: $first, after: $after) {
		userCount
		pageInfo { endCursor hasNextPage }
		nodes { ... on User { login } }
	}
}";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphqlRequest {
	pub query: String,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub variables: Map<String, Value>,
}

/// Sub-selection knobs for the per-identifier enrichment fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchShape {
	pub repositories_per_identifier: u32,
	pub exclude_forks: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchQuery {
	pub request: GraphqlRequest,
	pub batch: Batch,
	pub rejected: Vec<RejectedIdentifier>,
}

/// One decoded page of search results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
	pub identifiers: Vec<Identifier>,
	pub next_cursor: Option<String>,
	pub has_more: bool,
	pub total_count: u64,
	pub cost: Option<u32>,
}
impl Page {
	/// Decodes a search response `data` object. Nodes without a login (organisations) are
	/// skipped.
	pub fn from_search_data(data: &Value) -> serde_json::Result<Self> {
		let search = data.get("search").unwrap_or(&Value::Null);
		let wire = WireSearch::deserialize(search)?;
		let identifiers = wire
			.nodes
			.into_iter()
			.flatten()
			.filter_map(|node| node.login)
			.map(Identifier::from)
			.collect();
		let cost = RateLimitSnapshot::from_graphql_data(data).and_then(|rate| rate.cost);

		Ok(Self {
			identifiers,
			next_cursor: wire.page_info.end_cursor,
			has_more: wire.page_info.has_next_page,
			total_count: wire.user_count,
			cost,
		})
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSearch {
	user_count: u64,
	page_info: WirePageInfo,
	#[serde(default)]
	nodes: Vec<Option<WireNode>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePageInfo {
	end_cursor: Option<String>,
	has_next_page: bool,
}

#[derive(Deserialize)]
struct WireNode {
	login: Option<String>,
}

pub fn build_search_query(filter: &str, page_size: u32, cursor: Option<&str>) -> GraphqlRequest {
	let mut variables = Map::new();

	variables.insert("query".to_string(), Value::String(filter.to_string()));
	variables.insert("first".to_string(), Value::from(page_size.clamp(1, MAX_SEARCH_PAGE_SIZE)));
	variables.insert(
		"after".to_string(),
		cursor.map(|cursor| Value::String(cursor.to_string())).unwrap_or(Value::Null),
	);

	GraphqlRequest { query: SEARCH_QUERY.to_string(), variables }
}

/// Builds one aliased enrichment request. Aliases are positional (`u0`, `u1`, ...) over the
/// identifiers that pass validation; the rest are returned in `rejected`.
pub fn build_batch_query(
	ordinal: usize,
	identifiers: &[Identifier],
	window: &TimeWindow,
	shape: BatchShape,
) -> Result<BatchQuery, Format> {
	let mut members = Vec::with_capacity(identifiers.len());
	let mut rejected = Vec::new();

	for identifier in identifiers {
		match validate_identifier(identifier) {
			Ok(()) => members.push(BatchMember {
				alias: format!("u{}", members.len()),
				identifier: identifier.clone(),
			}),
			Err(reason) => rejected.push(RejectedIdentifier { identifier: identifier.clone(), reason }),
		}
	}

	let mut variables = Map::new();
	let mut params = String::from("$from: DateTime!, $to: DateTime!");
	let mut selections = String::new();

	variables.insert("from".to_string(), Value::String(window.from_iso()?));
	variables.insert("to".to_string(), Value::String(window.to_iso()?));

	for (index, member) in members.iter().enumerate() {
		let var = format!("l{index}");

		params.push_str(&format!(", ${var}: String!"));
		selections
			.push_str(&format!("\t{}: user(login: ${var}) {{ ...CandidateFields }}\n", member.alias));

		variables.insert(var, Value::String(member.identifier.as_str().to_string()));
	}

	let query = format!(
		"query EnrichBatch({params}) {{\n\t{RATE_LIMIT_SELECTION}\n{selections}}}\n{}",
		candidate_fragment(shape)
	);

	Ok(BatchQuery {
		request: GraphqlRequest { query, variables },
		batch: Batch { ordinal, members },
		rejected,
	})
}

/// Joins location keywords into an OR filter, quoting multi-word places.
pub fn build_location_filter<S>(keywords: &[S]) -> String
where
	S: AsRef<str>,
{
	keywords
		.iter()
		.map(|keyword| keyword.as_ref().trim())
		.filter(|keyword| !keyword.is_empty())
		.map(|keyword| {
			let keyword = keyword.replace('"', "");

			if keyword.contains(' ') {
				format!("location:\"{keyword}\"")
			} else {
				format!("location:{keyword}")
			}
		})
		.collect::<Vec<_>>()
		.join(" OR ")
}

fn candidate_fragment(shape: BatchShape) -> String {
	let fork_filter = if shape.exclude_forks { ", isFork: false" } else { "" };

	format!(
		"\
fragment CandidateFields on User {{
	login
	name
	bio
	company
	location
	email
	websiteUrl
	twitterUsername
	followers {{ totalCount }}
	following {{ totalCount }}
	repositories(first: {first}, orderBy: {{field: STARGAZERS, direction: DESC}}, privacy: PUBLIC, ownerAffiliations: OWNER{fork_filter}) {{
		totalCount
		nodes {{
			name
			description
			stargazerCount
			forkCount
			pushedAt
			primaryLanguage {{ name }}
			url
		}}
	}}
	contributionsCollection(from: $from, to: $to) {{
		contributionCalendar {{
			totalContributions
			weeks {{ contributionDays {{ contributionCount date }} }}
		}}
	}}
}}",
		first = shape.repositories_per_identifier,
	)
}
