//! Typed client for the daily news endpoints.

use super::types::{DailyList, NewsDetail, SectionList, SectionStories};
use crate::client::{Call, NetWorker};

/// Thin typed layer over a [`NetWorker`] bound to the daily news base URL.
#[derive(Debug, Clone)]
pub struct DailyApi {
    worker: NetWorker,
}

impl DailyApi {
    pub fn new(worker: NetWorker) -> Self {
        Self { worker }
    }

    pub fn worker(&self) -> &NetWorker {
        &self.worker
    }

    /// Today's stories.
    pub fn latest(&self) -> Call<DailyList> {
        self.worker.get_json("news/latest", &[])
    }

    pub fn sections(&self) -> Call<SectionList> {
        self.worker.get_json("sections", &[])
    }

    pub fn section(&self, id: u64) -> Call<SectionStories> {
        self.worker.get_json(&format!("section/{}", id), &[])
    }

    pub fn news(&self, id: u64) -> Call<NewsDetail> {
        self.worker.get_json(&format!("news/{}", id), &[])
    }
}
