use async_trait::async_trait;

use crate::{domain::Row, Result};

/// Port for the watched worksheet.
///
/// Implementations must report HTTP 429 as [`crate::Error::RateLimited`] so the
/// backoff executor can retry it.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// First row of the worksheet (column names).
    async fn fetch_header_row(&self) -> Result<Vec<String>>;

    /// Every row of the worksheet, header row included at index 0.
    async fn fetch_all_rows(&self) -> Result<Vec<Row>>;
}
