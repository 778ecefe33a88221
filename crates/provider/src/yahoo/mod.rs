mod chart;
mod rest;

pub use rest::YahooClient;
