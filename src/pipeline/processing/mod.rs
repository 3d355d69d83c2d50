// Pipeline processing: normalization, classification, mapping, and deduplication

pub mod dates;
pub mod dedupe;
pub mod filters;
pub mod geo;
pub mod industry;
pub mod mapper;

pub use dates::{parse_date, parse_date_with, split_range};
pub use dedupe::{collapse_sub_zones, dedupe};
pub use industry::{classify, consolidate, Industry};
pub use mapper::RecordMapper;
