mod ids;
mod message;

pub use ids::{owning_library, BookId, BorrowerId, Cost, LibraryId, Rank};
pub use message::{Message, PopularBookReport, Tag};
