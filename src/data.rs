//! # Data
//!
//! $$
//! r_t = \ln P_t - \ln P_{t-1}
//! $$
//!
//! Return series, aligned return tables and the adapters that load them.

pub mod matrix;
pub mod series;
pub mod source;

pub use matrix::Alignment;
pub use matrix::ReturnMatrix;
pub use series::ReturnSeries;
pub use series::TimeSeries;
pub use series::inner_join;
pub use source::CsvReturnSource;
pub use source::InMemoryReturnSource;
pub use source::ReturnSource;
