//! Query-string parameters and pagination

use crate::config::PaginationConfig;
use crate::core::error::RequestError;
use serde::Serialize;

/// Parameters the list operations reserve for themselves
pub const RESERVED_PARAMS: [&str; 3] = ["page", "limit", "search"];

/// Query parameters of a list request
///
/// Built from the raw key/value pairs of the query string so that repeated
/// keys survive. `key[]` is accepted as an alias of `key`.
///
/// ```
/// use m3allem::config::PaginationConfig;
/// use m3allem::core::query::QueryParams;
///
/// let pairs = vec![
///     ("page".to_string(), "2".to_string()),
///     ("status[]".to_string(), "accepted".to_string()),
///     ("status[]".to_string(), "canceled".to_string()),
/// ];
/// let params = QueryParams::from_pairs(pairs, &PaginationConfig::default()).unwrap();
/// assert_eq!(params.page, 2);
/// assert_eq!(params.limit, 100);
/// assert_eq!(params.filters.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    /// Page number (starts at 1)
    pub page: usize,

    /// Number of items per page
    pub limit: usize,

    /// Free-text search term, `None` when absent or blank
    pub search: Option<String>,

    /// Every other parameter, in query-string order
    pub filters: Vec<(String, String)>,
}

impl QueryParams {
    /// Defaults with no filters
    pub fn new(pagination: &PaginationConfig) -> Self {
        Self {
            page: 1,
            limit: pagination.clamp_limit(pagination.default_limit),
            search: None,
            filters: Vec::new(),
        }
    }

    /// Interpret raw query pairs
    ///
    /// `page` and `limit` must be integers; they are clamped to at least 1 and
    /// `limit` to the configured maximum.
    pub fn from_pairs<I>(pairs: I, pagination: &PaginationConfig) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = Self::new(pagination);

        for (key, value) in pairs {
            let key = key.strip_suffix("[]").unwrap_or(&key).to_string();
            match key.as_str() {
                "page" => params.page = parse_number("page", &value)?.max(1),
                "limit" => params.limit = pagination.clamp_limit(parse_number("limit", &value)?),
                "search" => {
                    let term = value.trim();
                    params.search = (!term.is_empty()).then(|| term.to_string());
                }
                _ => params.filters.push((key, value)),
            }
        }

        Ok(params)
    }

    /// Number of documents to skip for the current page
    ///
    /// Saturates, so a page past any possible result is simply empty.
    pub fn skip(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    /// Add a filter pair (builder style)
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }
}

fn parse_number(name: &str, value: &str) -> Result<usize, RequestError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| RequestError::InvalidQuery {
            message: format!("'{}' must be a positive integer, got '{}'", name, value),
        })
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    /// Total number of pages
    pub total_pages: usize,

    /// Total number of items (after filters)
    pub total_records: usize,

    /// Current page number (starts at 1)
    pub current_page: usize,

    /// Number of items per page
    pub per_page: usize,
}

impl PaginationMeta {
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        let limit = limit.max(1);
        Self {
            total_pages: total.div_ceil(limit),
            total_records: total,
            current_page: page,
            per_page: limit,
        }
    }
}
