// Corpus loading: the flat CV record store and its row codec.

pub mod csv;
pub mod store;

pub use store::{CsvRecordStore, RecordStore};
