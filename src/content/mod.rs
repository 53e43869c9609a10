//! Read side of posts: feeds, search and display formatting.

pub mod feed;
pub mod search;
pub mod timefmt;

pub use feed::{fetch_posts, FeedMode, PostView};
pub use search::{typeahead, SearchHit};
pub use timefmt::time_label;
