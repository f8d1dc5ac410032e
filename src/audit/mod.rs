//! Scan orchestration
//!
//! # Components
//!
//! - `Page`: immutable fetched-resource snapshot, the unit of auditing
//! - `QueuePipeline`: URL and page FIFOs, sitemap, feedback inbox
//! - `RetryController`: bounded retries for URLs that get no response
//! - `ModuleScheduler`: observers, modules and timing verification per page
//! - `Framework`: the state machine driving all of the above

mod collaborators;
mod framework;
mod page;
mod queue;
mod retry;
mod scheduler;

pub use collaborators::{
    Fetcher, HttpRunner, HttpStatistics, NoSession, NullSpider, ResponseCallback, Session, Spider,
};
pub use framework::{Collaborators, Framework, FrameworkHandle};
pub use page::{fingerprint, Page, Platform, NO_RESPONSE};
pub use queue::{QueueHandle, QueuePipeline};
pub use retry::{RetryController, RetryVerdict, AUDIT_PAGE_MAX_TRIES};
pub use scheduler::{AuditMap, AuditObserver, ModuleScheduler};
