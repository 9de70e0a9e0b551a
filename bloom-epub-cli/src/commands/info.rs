//! Info command implementation

use anyhow::{Context, Result};
use bloom_epub_core::Book;
use serde::Serialize;
use std::path::Path;

/// Book info output
#[derive(Serialize)]
struct BookInfo {
    id: String,
    title: String,
    language: String,
    author: Option<String>,
    summary: Option<String>,
    isbn: Option<String>,
    page_size: String,
    right_to_left: bool,
    pages: Vec<String>,
}

/// Display information about a book folder
pub fn info(book: &str, json: bool) -> Result<()> {
    let loaded = Book::load(Path::new(book))
        .with_context(|| format!("Failed to load book folder: {}", book))?;

    let info = BookInfo {
        id: loaded.id.clone(),
        title: loaded.title().to_string(),
        language: loaded.language().to_string(),
        author: loaded.metadata.author.clone(),
        summary: loaded.metadata.summary.clone(),
        isbn: loaded.isbn(),
        page_size: loaded.page_size().to_string(),
        right_to_left: loaded.is_rtl(),
        pages: loaded
            .pages()
            .into_iter()
            .map(|page| loaded.page_label(page))
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("Title:     {}", info.title);
        println!("Id:        {}", info.id);
        println!("Language:  {}", info.language);
        if let Some(author) = &info.author {
            println!("Author:    {}", author);
        }
        if let Some(summary) = &info.summary {
            println!("Summary:   {}", summary);
        }
        if let Some(isbn) = &info.isbn {
            println!("ISBN:      {}", isbn);
        }
        println!("Page size: {}", info.page_size);
        if info.right_to_left {
            println!("Direction: right to left");
        }
        println!("Pages:     {}", info.pages.len());
    }

    Ok(())
}
