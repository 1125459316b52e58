//! To-many relationship through a foreign key on the target table.

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

/// `authors.books <- books.author_id`
#[derive(Debug, Clone)]
pub struct ReverseRelation {
    key: String,
    target: String,
    column: String,
    page_size: Option<u64>,
}

impl ReverseRelation {
    /// Create a relationship over `target` rows whose `column` holds the owner id.
    pub fn new(key: impl Into<String>, target: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            target: target.into(),
            column: column.into(),
            page_size: None,
        }
    }

    /// Override the page size of this relationship's values.
    pub fn with_page_size(mut self, size: u64) -> Self {
        self.page_size = Some(size);
        self
    }

    fn link(&self, registry: &Registry) -> QueryResult<CollectionLink> {
        let target = registry.model(&self.target)?;
        Ok(CollectionLink {
            table: target.table().to_string(),
            owner_column: self.column.clone(),
            target_column: target.id_column().to_string(),
            scope: None,
            target: target.clone(),
            join_target: false,
        })
    }
}

#[async_trait]
impl Relationship for ReverseRelation {
    fn key(&self) -> &str {
        &self.key
    }

    fn kind(&self) -> RelationKind {
        RelationKind::Reverse
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
        registry: &Registry,
        _owner: &ModelDescriptor,
        owner_id: &str,
        input: RelationInput,
    ) -> QueryResult<WritePlan> {
        let RelationInput::Many(targets) = input else {
            return Err(arity_mismatch(&self.key));
        };
        let target = registry.model(&self.target)?;
        let table = quote_ident(target.table());
        let fk = quote_ident(&self.column);

        let mut plan = WritePlan::default();
        plan.statements.push(Statement::new(
            format!("UPDATE {} SET {} = NULL WHERE {} = $1", table, fk, fk),
            vec![Value::from(owner_id)],
        ));
        if !targets.is_empty() {
            let ids: Vec<String> = targets.into_iter().map(|t| t.id).collect();
            let mut args = vec![Value::from(owner_id)];
            args.extend(ids.iter().map(|id| Value::from(id.as_str())));
            let placeholders: Vec<String> = (2..=args.len()).map(|i| format!("${}", i)).collect();
            plan.statements.push(Statement::new(
                format!(
                    "UPDATE {} SET {} = $1 WHERE {} IN ({})",
                    table,
                    fk,
                    quote_ident(target.id_column()),
                    placeholders.join(", ")
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
}
