mod flow_record;
mod series;

pub use flow_record::FlowRecord;
pub use series::{FundInfo, SeriesMetadata, SourceSeries};
