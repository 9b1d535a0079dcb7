//! Named attributes attached to books.
//!
//! Tags and reviews are structurally identical owner-scoped name rows; one
//! component handles both, parameterized by [`AttributeKind`].

use serde::{Deserialize, Serialize};

/// Discriminator for the two attribute kinds. Selects the backing table and
/// the many-to-many link table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Tag,
    Review,
}

impl AttributeKind {
    pub fn table(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Review => "reviews",
        }
    }

    pub fn link_table(self) -> &'static str {
        match self {
            AttributeKind::Tag => "book_tags",
            AttributeKind::Review => "book_reviews",
        }
    }

    pub fn link_column(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tag_id",
            AttributeKind::Review => "review_id",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttributeKind::Tag => "Tag",
            AttributeKind::Review => "Review",
        }
    }
}

/// An owner-scoped named attribute (a tag or a review).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Attribute {
    pub id: i64,
    pub name: String,
}

/// Nested attribute entry in book payloads. Clients send names only; ids are
/// resolved server-side against the owner's existing rows.
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeName {
    pub name: String,
}

/// Request body for renaming an attribute.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAttributeRequest {
    pub name: String,
}
