//! Book-level types: the loaded book folder and its metadata

mod book;
mod metadata;
mod page_size;

pub use book::{find_book_file, Book};
pub use metadata::{parse_copyright, BookMetadata, Copyright, Subject, META_FILE_NAME};
pub use page_size::PageSize;
