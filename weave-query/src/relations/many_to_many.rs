//! To-many relationship through a join table.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::collection::{self, CollectionLink};
use super::{
    ExistenceCheck, OwnerRows, RelationBatch, RelationInput, RelationKind, Relationship,
    ResolveContext, Targets, WritePlan, arity_mismatch, decode_many,
};
use crate::error::QueryResult;
use crate::filter::{Filter, quote_ident};
use crate::model::{ModelDescriptor, Registry};
use crate::params::ParamReader;
use crate::store::Statement;
use crate::value::Value;

/// `books.tags` via `book_tags(book_id, tag_id)`
#[derive(Debug, Clone)]
pub struct ManyToManyRelation {
    key: String,
    target: String,
    join_table: String,
    owner_column: String,
    target_column: String,
    page_size: Option<u64>,
}

impl ManyToManyRelation {
    /// Create a relationship over `join_table(owner_column, target_column)`.
    pub fn new(
        key: impl Into<String>,
        target: impl Into<String>,
        join_table: impl Into<String>,
        owner_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            target: target.into(),
            join_table: join_table.into(),
            owner_column: owner_column.into(),
            target_column: target_column.into(),
            page_size: None,
        }
    }

    /// Override the page size of this relationship's values.
    pub fn with_page_size(mut self, size: u64) -> Self {
        self.page_size = Some(size);
        self
    }

    fn link(&self, registry: &Registry) -> QueryResult<CollectionLink> {
        Ok(CollectionLink {
            table: self.join_table.clone(),
            owner_column: self.owner_column.clone(),
            target_column: self.target_column.clone(),
            scope: None,
            target: registry.model(&self.target)?.clone(),
            join_target: true,
        })
    }

    fn clear(&self, owner_id: &str) -> Statement {
        Statement::new(
            format!(
                "DELETE FROM {} WHERE {} = $1",
                quote_ident(&self.join_table),
                quote_ident(&self.owner_column)
            ),
            vec![Value::from(owner_id)],
        )
    }
}

#[async_trait]
impl Relationship for ManyToManyRelation {
    fn key(&self) -> &str {
        &self.key
    }

    fn kind(&self) -> RelationKind {
        RelationKind::ManyToMany
    }

    fn targets(&self) -> Targets<'_> {
        Targets::One(&self.target)
    }

    fn page_size(&self) -> Option<u64> {
        self.page_size
    }

    fn compile_filters(
        &self,
        owner: &ModelDescriptor,
        registry: &Registry,
        reader: &mut ParamReader<'_>,
    ) -> QueryResult<Vec<Filter>> {
        collection::compile_filters(&self.key, &self.link(registry)?, owner, reader)
    }

    async fn resolve(
        &self,
        ctx: &ResolveContext<'_>,
        owners: &OwnerRows,
    ) -> QueryResult<RelationBatch> {
        let link = self.link(ctx.server.registry())?;
        collection::resolve(ctx, &self.key, &link, self.page_size, &owners.ids()).await
    }

    fn decode_input(&self, _registry: &Registry, json: &JsonValue) -> QueryResult<RelationInput> {
        decode_many(&self.key, &self.target, json)
    }

    fn plan_write(
        &self,
        _registry: &Registry,
        _owner: &ModelDescriptor,
        owner_id: &str,
        input: RelationInput,
    ) -> QueryResult<WritePlan> {
        let RelationInput::Many(targets) = input else {
            return Err(arity_mismatch(&self.key));
        };

        let mut plan = WritePlan::default();
        plan.statements.push(self.clear(owner_id));

        let mut ids: Vec<String> = Vec::with_capacity(targets.len());
        for target in targets {
            if !ids.contains(&target.id) {
                ids.push(target.id);
            }
        }
        if !ids.is_empty() {
            let mut args = Vec::with_capacity(ids.len() * 2);
            let mut rows = Vec::with_capacity(ids.len());
            for id in &ids {
                args.push(Value::from(owner_id));
                args.push(Value::from(id.as_str()));
                rows.push(format!("(${}, ${})", args.len() - 1, args.len()));
            }
            plan.statements.push(Statement::new(
                format!(
                    "INSERT INTO {} ({}, {}) VALUES {}",
                    quote_ident(&self.join_table),
                    quote_ident(&self.owner_column),
                    quote_ident(&self.target_column),
                    rows.join(", ")
                ),
                args,
            ));
            plan.checks.push(ExistenceCheck {
                key: self.key.clone(),
                type_name: self.target.clone(),
                ids,
            });
        }
        Ok(plan)
    }

    fn plan_delete(
        &self,
        _registry: &Registry,
        _owner: &ModelDescriptor,
        owner_id: &str,
    ) -> QueryResult<Vec<Statement>> {
        Ok(vec![self.clear(owner_id)])
    }
}
