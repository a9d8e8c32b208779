pub mod roster;
pub mod scraping;
pub mod tracker;

pub use roster::RosterStore;
pub use scraping::BatchScraper;
pub use tracker::TrackerService;
