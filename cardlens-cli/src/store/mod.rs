//! Local persistence for the card index: a SQLite database of card rows plus
//! a directory of reference image files. The two are kept consistent by the
//! atomic insert path in [`SqliteCardIndex`].

mod sqlite;

pub use sqlite::SqliteCardIndex;
