pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod pipeline;
pub mod resolver;
pub mod store;

pub use extract::{extract_records, records_from_entries, Extraction};
pub use fetch::{default_chain, ContentCheck, FetchChain, FetchFailure, FetchOutcome, FetchStrategy};
pub use pipeline::{run, run_source, RunReport, SourceReport};
pub use resolver::TickerCatalog;
pub use store::{merge_records, FlowStore, MergeStats};
