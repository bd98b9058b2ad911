pub mod json_file;

pub use json_file::{load_or_default, write_pretty, StoreError};
