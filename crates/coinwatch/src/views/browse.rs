use std::fmt;

use crate::config::DEFAULT_PAGE_SIZE;
use crate::models::{Coin, CoinId};

/// Search and pagination state for the coin list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinBrowser {
    query: String,
    page: usize,
    page_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowseRow<'a> {
    /// 1-based position in the filtered list.
    pub rank: usize,
    pub coin: &'a Coin,
    pub watched: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowsePage<'a> {
    pub rows: Vec<BrowseRow<'a>>,
    pub page: usize,
    pub page_count: usize,
    pub matches: usize,
}

impl fmt::Display for BrowsePage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page {} of {}", self.page, self.page_count)
    }
}

impl Default for CoinBrowser {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl CoinBrowser {
    pub fn new(page_size: usize) -> Self {
        Self {
            query: String::new(),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn current_page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Changing the search always goes back to the first page.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.page = 1;
    }

    /// Case-insensitive substring match on name or symbol, order kept.
    pub fn filter<'a>(&self, coins: &'a [Coin]) -> Vec<&'a Coin> {
        let needle = self.query.trim().to_lowercase();
        coins
            .iter()
            .filter(|coin| {
                needle.is_empty()
                    || coin.name.to_lowercase().contains(&needle)
                    || coin.symbol.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// `ceil(matches / page_size)`, never below one so an empty list still
    /// has a page to show.
    pub fn page_count(&self, matches: usize) -> usize {
        matches.div_ceil(self.page_size).max(1)
    }

    pub fn next_page(&mut self, matches: usize) {
        self.page = (self.page + 1).min(self.page_count(matches));
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }

    pub fn go_to(&mut self, page: usize, matches: usize) {
        self.page = page.clamp(1, self.page_count(matches));
    }

    /// Rows for the current page. The page is pulled back in range first in
    /// case the catalog shrank since it was set.
    pub fn page<'a, F>(&mut self, coins: &'a [Coin], is_watched: F) -> BrowsePage<'a>
    where
        F: Fn(CoinId) -> bool,
    {
        let filtered = self.filter(coins);
        let matches = filtered.len();
        let page_count = self.page_count(matches);
        self.page = self.page.clamp(1, page_count);

        let offset = (self.page - 1) * self.page_size;
        let rows = filtered
            .into_iter()
            .enumerate()
            .skip(offset)
            .take(self.page_size)
            .map(|(i, coin)| BrowseRow {
                rank: i + 1,
                coin,
                watched: is_watched(coin.id),
            })
            .collect();

        BrowsePage {
            rows,
            page: self.page,
            page_count,
            matches,
        }
    }
}
