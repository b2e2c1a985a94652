pub mod dump;
pub mod index;
pub mod query;
pub mod stats;
pub mod utils;

pub use dump::handle_dump;
pub use index::handle_index;
pub use query::handle_query;
pub use stats::handle_stats;
