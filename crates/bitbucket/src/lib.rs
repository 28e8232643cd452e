pub mod payload;
pub mod webhook;

pub use payload::{ConstructionError, parse_pull_request};
pub use webhook::{BitbucketEvent, EventKey};
