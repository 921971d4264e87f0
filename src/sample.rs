//! Sample library schema used by the demo server and the tests.
//!
//! ```text
//! library.Person   ordered by name
//! library.Book     ordered by -rank, title
//!     author   -> Person   (one-to-many, reverse accessor `book_set`)
//!     editors  <-> Person  (many-to-many, reverse accessor `edited`)
//! library.Volume
//!     book     -> Book     (one-to-one, reverse accessor `volume`)
//! ```

use crate::error::ConfigurationError;
use crate::model::{EntityName, EntityType, RelationDecl};
use crate::registry::Registry;

pub struct Library {
    pub registry: Registry,
    pub person: EntityName,
    pub book: EntityName,
    pub volume: EntityName,
}

impl Library {
    /// Registers the schema. Types are registered before the types they
    /// point at, so every relation goes through the pending table first.
    pub fn build() -> Result<Self, ConfigurationError> {
        let mut builder = Registry::builder();

        let volume = builder.register(
            EntityType::new("library.Volume")
                .with_relation(RelationDecl::one_to_one("book", "Book").nullable()),
        )?;

        let book = builder.register(
            EntityType::new("library.Book")
                .with_ordering(["-rank", "title"])
                .with_relation(RelationDecl::foreign_key("author", "Person").nullable())
                .with_relation(
                    RelationDecl::many_to_many("editors", "Person").related_name("edited"),
                ),
        )?;

        let person = builder.register(EntityType::new("library.Person").with_ordering(["name"]))?;

        Ok(Self {
            registry: builder.build()?,
            person,
            book,
            volume,
        })
    }
}
