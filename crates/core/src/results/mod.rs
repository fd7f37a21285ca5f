mod aggregate;
mod date;
mod normalize;

pub use aggregate::{
    ResultStatistics, SortConfig, SortDirection, SortKey, UnknownSortKey, compute_statistics,
    sort_results,
};
pub use date::{AttemptDate, format_attempt_date, normalize_time_separators, parse_attempt_date};
pub use normalize::{RawResult, ResultNormalizer};
