pub mod exec;
pub mod output;

pub use exec::exec;
pub use output::{output_json, output_ndjson, output_table};
