pub mod pacer;
pub mod segment;

pub use pacer::StreamPacer;
pub use segment::{BOUNDARY, CONTENT_TYPE};
