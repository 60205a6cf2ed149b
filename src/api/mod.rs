//! Typed endpoint clients built on [`crate::NetWorker`].

mod daily;
mod types;

pub use daily::DailyApi;
pub use types::{DailyList, NewsDetail, Section, SectionList, SectionStories, Story};
