//! JSON builders shaped like the GitHub GraphQL API.

use serde_json::{Map, Value};

pub const RESET_AT: &str = "2025-10-19T15:00:00Z";

pub fn rate_limit(cost: u32, remaining: u32) -> Value {
	serde_json::json!({ "cost": cost, "remaining": remaining, "limit": 5_000, "resetAt": RESET_AT })
}

/// A complete enrichment node for `login` with one repository and two active days.
pub fn user_node(login: &str) -> Value {
	serde_json::json!({
		"login": login,
		"name": format!("{login} name"),
		"bio": null,
		"company": null,
		"location": "Prague",
		"email": "",
		"websiteUrl": null,
		"twitterUsername": null,
		"followers": { "totalCount": 10 },
		"following": { "totalCount": 1 },
		"repositories": {
			"totalCount": 1,
			"nodes": [ {
				"name": format!("{login}-tool"),
				"description": null,
				"stargazerCount": 7,
				"forkCount": 1,
				"pushedAt": "2025-09-30T08:00:00Z",
				"primaryLanguage": { "name": "Rust" },
				"url": format!("https://github.com/{login}/{login}-tool")
			} ]
		},
		"contributionsCollection": {
			"contributionCalendar": {
				"totalContributions": 3,
				"weeks": [ { "contributionDays": [
					{ "contributionCount": 1, "date": "2025-10-01" },
					{ "contributionCount": 2, "date": "2025-10-02" }
				] } ]
			}
		}
	})
}

/// A search response body listing `logins`.
pub fn search_body(logins: &[&str], end_cursor: Option<&str>, has_next_page: bool, total: u64) -> Value {
	let nodes: Vec<Value> =
		logins.iter().map(|login| serde_json::json!({ "login": login })).collect();

	serde_json::json!({
		"data": {
			"rateLimit": rate_limit(1, 4_900),
			"search": {
				"userCount": total,
				"pageInfo": { "endCursor": end_cursor, "hasNextPage": has_next_page },
				"nodes": nodes
			}
		}
	})
}

/// A batch response body. `None` entries come back as `null` with a `NOT_FOUND` error.
pub fn batch_body(members: &[(&str, Option<&str>)]) -> Value {
	let mut data = Map::new();
	let mut errors = Vec::new();

	data.insert("rateLimit".to_string(), rate_limit(1, 4_800));

	for (alias, login) in members {
		match login {
			Some(login) => {
				data.insert((*alias).to_string(), user_node(login));
			},
			None => {
				data.insert((*alias).to_string(), Value::Null);
				errors.push(serde_json::json!({
					"type": "NOT_FOUND",
					"path": [alias],
					"message": "Could not resolve to a User with the login."
				}));
			},
		}
	}

	let mut body = serde_json::json!({ "data": data });

	if !errors.is_empty() {
		body["errors"] = Value::Array(errors);
	}

	body
}
