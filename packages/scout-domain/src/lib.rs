pub mod batch;
pub mod budget;
pub mod identifier;
pub mod query;
pub mod record;
pub mod time_serde;
pub mod window;

pub use batch::{
	Batch, BatchMember, FailureCause, FailureKind, FailureRecord, PermanentFailure,
	RejectedIdentifier, batch_count,
};
pub use budget::{RateBudget, RateLimitSnapshot};
pub use identifier::{
	Deduplicated, Identifier, MAX_IDENTIFIER_CHARS, RejectCode, dedup_preserving_order,
	validate_identifier,
};
pub use query::{
	BatchQuery, BatchShape, GraphqlRequest, MAX_SEARCH_PAGE_SIZE, Page, SEARCH_RESULT_CEILING,
	build_batch_query, build_location_filter, build_search_query,
};
pub use record::{ActivityDay, ActivitySeries, CandidateRecord, Profile, Repository};
pub use window::TimeWindow;
