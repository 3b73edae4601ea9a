use serde::{Deserialize, Serialize};

pub const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 { 1 }
fn default_per_page() -> u64 { 20 }

impl PaginationParams {
    /// Saturates at `i64::MAX`; a page past the end is simply empty.
    pub fn offset(&self) -> i64 {
        let rows = (self.page.max(1) - 1).saturating_mul(self.limit() as u64);
        i64::try_from(rows).unwrap_or(i64::MAX)
    }

    pub fn limit(&self) -> i64 {
        self.per_page.clamp(1, MAX_PER_PAGE) as i64
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 20 }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, params: &PaginationParams) -> Self {
        let per_page = params.limit() as u64;
        Self {
            items,
            total,
            page: params.page.max(1),
            per_page,
            total_pages: total.div_ceil(per_page),
        }
    }
}
