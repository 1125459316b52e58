//! To-many relationship through a polymorphic reference on the target table.

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

/// `books.comments <- comments.(subject_type = 'books', subject_id)`
///
/// Only target rows whose type column holds the owner's type name belong to
/// the owner.
#[derive(Debug, Clone)]
pub struct PolymorphicReverseRelation {
    key: String,
    target: String,
    type_column: String,
    id_column: String,
    page_size: Option<u64>,
}

impl PolymorphicReverseRelation {
    /// Create a relationship over `target.(type_column, id_column)`.
    pub fn new(
        key: impl Into<String>,
        target: impl Into<String>,
        type_column: impl Into<String>,
        id_column: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            target: target.into(),
            type_column: type_column.into(),
            id_column: id_column.into(),
            page_size: None,
        }
    }

    /// Override the page size of this relationship's values.
    pub fn with_page_size(mut self, size: u64) -> Self {
        self.page_size = Some(size);
        self
    }

    fn link(&self, registry: &Registry, owner: &ModelDescriptor) -> QueryResult<CollectionLink> {
        let target = registry.model(&self.target)?;
        Ok(CollectionLink {
            table: target.table().to_string(),
            owner_column: self.id_column.clone(),
            target_column: target.id_column().to_string(),
            scope: Some((self.type_column.clone(), Value::from(owner.type_name()))),
            target: target.clone(),
            join_target: false,
        })
    }
}

#[async_trait]
impl Relationship for PolymorphicReverseRelation {
    fn key(&self) -> &str {
        &self.key
    }

    fn kind(&self) -> RelationKind {
        RelationKind::PolymorphicReverse
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
        collection::compile_filters(&self.key, &self.link(registry, owner)?, owner, reader)
    }

    async fn resolve(
        &self,
        ctx: &ResolveContext<'_>,
        owners: &OwnerRows,
    ) -> QueryResult<RelationBatch> {
        let link = self.link(ctx.server.registry(), ctx.owner)?;
        collection::resolve(ctx, &self.key, &link, self.page_size, &owners.ids()).await
    }

    fn decode_input(&self, _registry: &Registry, json: &JsonValue) -> QueryResult<RelationInput> {
        decode_many(&self.key, &self.target, json)
    }

    fn plan_write(
        &self,
        registry: &Registry,
        owner: &ModelDescriptor,
        owner_id: &str,
        input: RelationInput,
    ) -> QueryResult<WritePlan> {
        let RelationInput::Many(targets) = input else {
            return Err(arity_mismatch(&self.key));
        };
        let target = registry.model(&self.target)?;
        let table = quote_ident(target.table());
        let type_col = quote_ident(&self.type_column);
        let id_col = quote_ident(&self.id_column);
        let owner_type = Value::from(owner.type_name());

        let mut plan = WritePlan::default();
        plan.statements.push(Statement::new(
            format!(
                "UPDATE {} SET {} = NULL, {} = NULL WHERE {} = $1 AND {} = $2",
                table, type_col, id_col, type_col, id_col
            ),
            vec![owner_type.clone(), Value::from(owner_id)],
        ));
        if !targets.is_empty() {
            let ids: Vec<String> = targets.into_iter().map(|t| t.id).collect();
            let mut args = vec![owner_type, Value::from(owner_id)];
            args.extend(ids.iter().map(|id| Value::from(id.as_str())));
            let placeholders: Vec<String> = (3..=args.len()).map(|i| format!("${}", i)).collect();
            plan.statements.push(Statement::new(
                format!(
                    "UPDATE {} SET {} = $1, {} = $2 WHERE {} IN ({})",
                    table,
                    type_col,
                    id_col,
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
