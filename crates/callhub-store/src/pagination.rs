//! Offset/limit pagination with a returned total count (§4.1).

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest { page: 1, limit: 20 }
    }
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.limit.max(1) as i64
    }

    pub fn limit(&self) -> i64 {
        self.limit.max(1) as i64
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}
