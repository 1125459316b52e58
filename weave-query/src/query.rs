//! Compiling request parameters into a query.

use tracing::debug;

use crate::error::{QueryError, QueryResult};
use crate::filter::Filter;
use crate::include::IncludeTree;
use crate::model::ModelDescriptor;
use crate::pagination::PageRequest;
use crate::params::{ParamReader, QueryParams};
use crate::server::Server;
use crate::types::OrderBy;
use crate::value::Value;

/// What to load: explicit ids, or filtered and ordered rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// These ids, returned in this order.
    Ids(Vec<String>),
    /// Rows matching every filter.
    Criteria {
        /// Conjoined filters.
        filters: Vec<Filter>,
        /// Requested order; empty means the model default.
        order: OrderBy,
    },
}

impl Selector {
    /// Select ids.
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Ids(ids.into_iter().map(Into::into).collect())
    }

    /// Select every row.
    pub fn all() -> Self {
        Self::Criteria {
            filters: Vec::new(),
            order: OrderBy::none(),
        }
    }
}

/// A compiled collection request.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Conjoined filters.
    pub filters: Vec<Filter>,
    /// Requested order.
    pub order: OrderBy,
    /// Requested page.
    pub page: PageRequest,
    /// Relationships to include.
    pub include: IncludeTree,
}

impl Query {
    /// Compile `params` against `model`. Performs no I/O.
    pub fn compile(
        server: &Server,
        model: &ModelDescriptor,
        params: &QueryParams,
    ) -> QueryResult<Self> {
        let registry = server.registry();
        let mut reader = ParamReader::new(params);
        let mut filters = Vec::new();

        if let Some(ids) = reader.multi("id") {
            filters.push(Filter::In {
                column: model.id_ref(),
                values: ids.into_iter().map(Value::from).collect(),
            });
        }
        for attribute in model.attributes() {
            filters.extend(attribute.compile_filters(model.table(), &mut reader)?);
        }
        for relationship in model.relationships() {
            filters.extend(relationship.compile_filters(model, registry, &mut reader)?);
        }

        let order = match reader.single("sort")? {
            Some(raw) => {
                let order = OrderBy::parse(raw);
                for term in order.iter() {
                    if term.field != "id" && model.attribute(&term.field).is_none() {
                        return Err(QueryError::invalid_sort(
                            &term.field,
                            format!("{} has no attribute named {}", model.type_name(), term.field),
                        ));
                    }
                }
                order
            }
            None => OrderBy::none(),
        };

        let page = PageRequest::from_params(
            &mut reader,
            server.collection_page_size(model),
            server.max_page_size(),
        )?;

        let include = match reader.single("include")? {
            Some(raw) => {
                let tree = IncludeTree::parse(raw)?;
                tree.validate(model, registry)?;
                tree
            }
            None => IncludeTree::new(),
        };

        reader.finish(model.type_name())?;

        debug!(
            model = model.type_name(),
            filters = filters.len(),
            page = page.page,
            size = page.size,
            "Compiled query"
        );
        Ok(Self {
            filters,
            order,
            page,
            include,
        })
    }

    /// The unfiltered first page.
    pub fn all(server: &Server, model: &ModelDescriptor) -> Self {
        Self {
            filters: Vec::new(),
            order: OrderBy::none(),
            page: PageRequest::first(server.collection_page_size(model)),
            include: IncludeTree::new(),
        }
    }

    /// Replace the include tree.
    pub fn with_include(mut self, include: IncludeTree) -> Self {
        self.include = include;
        self
    }

    /// Replace the page.
    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }

    /// The criteria selector for this query.
    pub fn selector(&self) -> Selector {
        Selector::Criteria {
            filters: self.filters.clone(),
            order: self.order.clone(),
        }
    }

    /// Render the WHERE clause of this query for diagnostics.
    pub fn where_sql(&self) -> (String, Vec<Value>) {
        Filter::And(self.filters.clone()).to_sql(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::fields::{DateField, IntegerField, TextField};
    use crate::model::Registry;
    use crate::relations::{DirectRelation, ManyToManyRelation, ReverseRelation};
    use pretty_assertions::assert_eq;

    fn server() -> Server {
        let registry = Registry::builder()
            .model(
                ModelDescriptor::builder("authors", "authors")
                    .attribute(TextField::new("name"))
                    .relationship(ReverseRelation::new("books", "books", "author_id")),
            )
            .model(
                ModelDescriptor::builder("books", "books")
                    .attribute(TextField::new("title"))
                    .attribute(IntegerField::new("pages").nullable())
                    .attribute(DateField::new("published").nullable())
                    .relationship(DirectRelation::new("author", "authors", "author_id"))
                    .relationship(ManyToManyRelation::new(
                        "tags",
                        "tags",
                        "book_tags",
                        "book_id",
                        "tag_id",
                    )),
            )
            .model(ModelDescriptor::builder("tags", "tags").attribute(TextField::new("name")))
            .build()
            .unwrap();
        Server::new(registry, EngineConfig::default())
    }

    fn compile(query: &str) -> QueryResult<Query> {
        let server = server();
        let books = server.model("books").unwrap().clone();
        Query::compile(&server, &books, &QueryParams::parse(query))
    }

    #[test]
    fn test_compile_mixed_filters() {
        let query = compile("pages__gt=100&author=7&tags__contains=t1&sort=-published,title").unwrap();
        let (sql, args) = query.where_sql();
        assert_eq!(
            sql,
            concat!(
                r#"("books"."pages" > $1 AND "books"."author_id" = $2 AND "#,
                r#""books"."id" IN (SELECT "book_tags"."book_id" FROM "book_tags" WHERE "book_tags"."tag_id" = $3))"#
            )
        );
        assert_eq!(args, vec![Value::Int(100), Value::from("7"), Value::from("t1")]);
        assert_eq!(query.order, OrderBy::parse("-published,title"));
    }

    #[test]
    fn test_id_list_is_any_of() {
        let query = compile("id=1,2,3").unwrap();
        assert_eq!(
            query.filters,
            vec![Filter::In {
                column: r#""books"."id""#.to_string(),
                values: vec!["1".into(), "2".into(), "3".into()],
            }]
        );
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let err = compile("colour=red").unwrap_err();
        assert_eq!(err.context.field.as_deref(), Some("colour"));
    }

    #[test]
    fn test_unknown_sort_key_rejected() {
        let err = compile("sort=-colour").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidSort);
    }

    #[test]
    fn test_page_and_include() {
        let query = compile("page[size]=3&page[offset]=2&include=author.books,tags").unwrap();
        assert_eq!(query.page, PageRequest::new(2, 3));
        assert!(query.include.child("author").unwrap().child("books").is_some());

        assert!(compile("include=publisher").unwrap_err().is_validation());
        assert!(compile("page[size]=1000").unwrap_err().is_validation());
    }

    #[test]
    fn test_collection_exact_match() {
        let query = compile("tags=t1,t2").unwrap();
        let (sql, args) = query.where_sql();
        assert!(sql.ends_with(
            r#"(SELECT COUNT(*) FROM "book_tags" WHERE "book_tags"."book_id" = "books"."id") = $3)"#
        ));
        assert_eq!(args.last(), Some(&Value::Int(2)));
    }

    #[test]
    fn test_count_range_rejected() {
        assert!(compile("tags__count__lt=1&tags__count__gt=4").is_err());
        assert!(compile("tags__count__lt=4&tags__count__gt=1").is_ok());
    }
}
