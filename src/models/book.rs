//! Book model and request types.

use serde::{Deserialize, Serialize};

use super::{Attribute, AttributeName};

/// Category classification for a book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Category {
    Drama,
    Novel,
    #[serde(rename = "Non-fiction")]
    NonFiction,
    Science,
    Essay,
    Reportage,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Drama => "Drama",
            Category::Novel => "Novel",
            Category::NonFiction => "Non-fiction",
            Category::Science => "Science",
            Category::Essay => "Essay",
            Category::Reportage => "Reportage",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Drama" => Some(Category::Drama),
            "Novel" => Some(Category::Novel),
            "Non-fiction" => Some(Category::NonFiction),
            "Science" => Some(Category::Science),
            "Essay" => Some(Category::Essay),
            "Reportage" => Some(Category::Reportage),
            _ => None,
        }
    }
}

/// A book record with its linked attributes. This is the detail response
/// shape; the owner id is never serialized.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub description: String,
    pub category: Category,
    pub number_of_pages: i64,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    pub link: String,
    pub image: Option<String>,
    pub tags: Vec<Attribute>,
    pub reviews: Vec<Attribute>,
}

/// List response shape: everything the detail shape has except `description`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub category: Category,
    pub number_of_pages: i64,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    pub link: String,
    pub image: Option<String>,
    pub tags: Vec<Attribute>,
    pub reviews: Vec<Attribute>,
}

impl From<Book> for BookSummary {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            category: book.category,
            number_of_pages: book.number_of_pages,
            language: book.language,
            cost: book.cost,
            link: book.link,
            image: book.image,
            tags: book.tags,
            reviews: book.reviews,
        }
    }
}

/// Request body for creating a new book. The owner is always the
/// authenticated requester; any owner field in the payload is dropped by
/// deserialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookRequest {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub number_of_pages: i64,
    pub language: String,
    #[serde(default)]
    pub cost: Option<String>,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub tags: Option<Vec<AttributeName>>,
    #[serde(default)]
    pub reviews: Option<Vec<AttributeName>>,
}

/// Request body for updating a book, both partial (PATCH) and full (PUT).
/// Absent fields stay untouched; a present `tags`/`reviews` key (even an
/// empty list) replaces the whole link set for that kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub number_of_pages: Option<i64>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub cost: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<AttributeName>>,
    #[serde(default)]
    pub reviews: Option<Vec<AttributeName>>,
}
