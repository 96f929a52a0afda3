//! Mock implementations of the media extractor
//!
//! Lets tests drive downloads through scripted progress without network or
//! filesystem access.

pub mod mock_extractor;

#[allow(unused_imports)]
pub use mock_extractor::{sample_media_info, MockExtractor, MockExtractorConfig};
