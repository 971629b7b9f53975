pub mod analyzers;
pub mod config;
pub mod dates;
pub mod error;
pub mod fetch;
pub mod geocode;
pub mod output;
pub mod parser;
pub mod records;
pub mod workbook;
