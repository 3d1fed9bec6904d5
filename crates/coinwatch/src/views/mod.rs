pub mod browse;
pub mod display;

pub use browse::{BrowsePage, BrowseRow, CoinBrowser};
