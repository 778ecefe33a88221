pub mod universe;
pub mod yahoo;

pub use universe::CsvUniverse;
pub use yahoo::YahooClient;
