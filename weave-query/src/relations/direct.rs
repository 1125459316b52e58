//! To-one relationship through a foreign key on the owner table.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::{
    ExistenceCheck, OwnerRows, RelationBatch, RelationInput, RelationKind, Relationship,
    ResolveContext, Targets, WritePlan, arity_mismatch, decode_one,
};
use crate::error::{QueryError, QueryResult};
use crate::filter::{CompareOp, Filter, qualified};
use crate::instance::FieldValue;
use crate::model::{ModelDescriptor, Registry};
use crate::params::ParamReader;
use crate::pointer::{Pointer, ResourceIdentifier};
use crate::value::Value;

/// `books.author_id -> authors.id`
#[derive(Debug, Clone)]
pub struct DirectRelation {
    key: String,
    target: String,
    column: String,
}

impl DirectRelation {
    /// Create a relationship stored in `column` and pointing at `target`.
    pub fn new(key: impl Into<String>, target: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            target: target.into(),
            column: column.into(),
        }
    }

    /// The FK column.
    pub fn column(&self) -> &str {
        &self.column
    }
}

#[async_trait]
impl Relationship for DirectRelation {
    fn key(&self) -> &str {
        &self.key
    }

    fn kind(&self) -> RelationKind {
        RelationKind::Direct
    }

    fn targets(&self) -> Targets<'_> {
        Targets::One(&self.target)
    }

    fn extra_columns(&self) -> Vec<&str> {
        vec![&self.column]
    }

    fn compile_filters(
        &self,
        owner: &ModelDescriptor,
        _registry: &Registry,
        reader: &mut ParamReader<'_>,
    ) -> QueryResult<Vec<Filter>> {
        let column = qualified(owner.table(), &self.column);
        let is_null_param = format!("{}__is_null", self.key);
        let is_null = reader.flag(&is_null_param)?;
        let exact = reader.single(&self.key)?;

        if is_null == Some(true) && exact.is_some() {
            return Err(QueryError::invalid_filter(
                is_null_param,
                "is_null=true cannot be combined with a match on the same relationship",
            ));
        }

        let mut filters = Vec::new();
        if let Some(is_null) = is_null {
            filters.push(Filter::IsNull {
                column: column.clone(),
                is_null,
            });
        }
        if let Some(id) = exact {
            filters.push(Filter::Compare {
                column,
                op: CompareOp::Eq,
                value: Value::from(id),
            });
        }
        Ok(filters)
    }

    async fn resolve(
        &self,
        ctx: &ResolveContext<'_>,
        owners: &OwnerRows,
    ) -> QueryResult<RelationBatch> {
        let mut batch = RelationBatch::default();
        for row in owners.rows() {
            let data = row
                .extra(&self.column)
                .id_string()
                .map(|id| ResourceIdentifier::new(&self.target, id));

            if let Some(FieldValue::Pointer(existing)) = batch.values.get(&row.id) {
                if existing.data != data {
                    return Err(QueryError::contradictory_relation(
                        ctx.owner.type_name(),
                        &self.key,
                        &row.id,
                    ));
                }
                continue;
            }

            if let Some(ident) = &data {
                batch.relations.add(&row.id, &self.target, ident.id.clone());
            }
            let link = ctx.server.relationship_link(ctx.owner, &row.id, &self.key);
            batch
                .values
                .insert(row.id.clone(), FieldValue::Pointer(Pointer::new(link, data)));
        }
        Ok(batch)
    }

    fn decode_input(&self, registry: &Registry, json: &JsonValue) -> QueryResult<RelationInput> {
        decode_one(&self.key, self.targets(), registry, json)
    }

    fn plan_write(
        &self,
        _registry: &Registry,
        _owner: &ModelDescriptor,
        _owner_id: &str,
        input: RelationInput,
    ) -> QueryResult<WritePlan> {
        let RelationInput::One(target) = input else {
            return Err(arity_mismatch(&self.key));
        };
        let mut plan = WritePlan::default();
        match target {
            Some(ident) => {
                plan.columns
                    .push((self.column.clone(), Value::from(ident.id.as_str())));
                plan.checks.push(ExistenceCheck {
                    key: self.key.clone(),
                    type_name: ident.type_name,
                    ids: vec![ident.id],
                });
            }
            None => plan.columns.push((self.column.clone(), Value::Null)),
        }
        Ok(plan)
    }
}
