//! To-one relationship whose target type is stored next to the id.

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

/// `comments.(subject_type, subject_id) -> books | authors`
#[derive(Debug, Clone)]
pub struct PolymorphicRelation {
    key: String,
    type_column: String,
    id_column: String,
    valid_types: Option<Vec<String>>,
}

impl PolymorphicRelation {
    /// Create a relationship stored in `type_column` and `id_column`.
    pub fn new(
        key: impl Into<String>,
        type_column: impl Into<String>,
        id_column: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            type_column: type_column.into(),
            id_column: id_column.into(),
            valid_types: None,
        }
    }

    /// Only accept these target types.
    pub fn restrict_to<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// The type column.
    pub fn type_column(&self) -> &str {
        &self.type_column
    }

    /// The id column.
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    fn is_target(&self, registry: &Registry, type_name: &str) -> bool {
        self.targets().allows(type_name) && registry.get(type_name).is_some()
    }

    fn parse_pair<'p>(&self, param: &str, raw: &'p str) -> QueryResult<(&'p str, &'p str)> {
        raw.split_once(':')
            .filter(|(t, id)| !t.is_empty() && !id.is_empty())
            .ok_or_else(|| {
                QueryError::invalid_filter(param, format!("'{}' is not of the form type:id", raw))
            })
    }
}

#[async_trait]
impl Relationship for PolymorphicRelation {
    fn key(&self) -> &str {
        &self.key
    }

    fn kind(&self) -> RelationKind {
        RelationKind::Polymorphic
    }

    fn targets(&self) -> Targets<'_> {
        match &self.valid_types {
            Some(types) => Targets::Restricted(types),
            None => Targets::Any,
        }
    }

    fn extra_columns(&self) -> Vec<&str> {
        vec![&self.type_column, &self.id_column]
    }

    fn compile_filters(
        &self,
        owner: &ModelDescriptor,
        registry: &Registry,
        reader: &mut ParamReader<'_>,
    ) -> QueryResult<Vec<Filter>> {
        let type_ref = qualified(owner.table(), &self.type_column);
        let id_ref = qualified(owner.table(), &self.id_column);
        let param = |suffix: &str| format!("{}__{}", self.key, suffix);

        let is_null = reader.flag(&param("is_null"))?;
        let exact = reader.single(&self.key)?;
        let type_only = reader.single(&param("type"))?;
        let id_only = reader.single(&param("id"))?;

        if is_null == Some(true) && (exact.is_some() || type_only.is_some() || id_only.is_some()) {
            return Err(QueryError::invalid_filter(
                param("is_null"),
                "is_null=true cannot be combined with a match on the same relationship",
            ));
        }

        let check_type = |p: &str, type_name: &str| {
            if self.is_target(registry, type_name) {
                Ok(())
            } else {
                Err(QueryError::invalid_filter(
                    p,
                    format!("{} is not a valid target type", type_name),
                ))
            }
        };
        let eq = |column: &str, value: &str| Filter::Compare {
            column: column.to_string(),
            op: CompareOp::Eq,
            value: Value::from(value),
        };

        let mut filters = Vec::new();
        if let Some(is_null) = is_null {
            filters.push(Filter::IsNull {
                column: id_ref.clone(),
                is_null,
            });
        }
        if let Some(raw) = exact {
            let (type_name, id) = self.parse_pair(&self.key, raw)?;
            check_type(&self.key, type_name)?;
            filters.push(eq(&type_ref, type_name));
            filters.push(eq(&id_ref, id));
        }
        if let Some(type_name) = type_only {
            check_type(&param("type"), type_name)?;
            filters.push(eq(&type_ref, type_name));
        }
        if let Some(id) = id_only {
            filters.push(eq(&id_ref, id));
        }
        Ok(filters)
    }

    async fn resolve(
        &self,
        ctx: &ResolveContext<'_>,
        owners: &OwnerRows,
    ) -> QueryResult<RelationBatch> {
        let registry = ctx.server.registry();
        let mut batch = RelationBatch::default();
        for row in owners.rows() {
            let type_value = row.extra(&self.type_column);
            let id_value = row.extra(&self.id_column);
            let data = match (type_value, id_value.id_string()) {
                (Value::Null, _) | (_, None) => None,
                (Value::Text(type_name), Some(id)) => {
                    if !self.is_target(registry, type_name) {
                        return Err(QueryError::unknown_target(&self.key, type_name)
                            .with_model(ctx.owner.type_name()));
                    }
                    Some(ResourceIdentifier::new(type_name.as_str(), id))
                }
                (other, Some(_)) => {
                    return Err(QueryError::decode(
                        &self.key,
                        format!("type column holds {}, expected text", other.kind_name()),
                    ));
                }
            };

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
                batch
                    .relations
                    .add(&row.id, &ident.type_name, ident.id.clone());
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
                plan.columns.push((
                    self.type_column.clone(),
                    Value::from(ident.type_name.as_str()),
                ));
                plan.columns
                    .push((self.id_column.clone(), Value::from(ident.id.as_str())));
                plan.checks.push(ExistenceCheck {
                    key: self.key.clone(),
                    type_name: ident.type_name,
                    ids: vec![ident.id],
                });
            }
            None => {
                plan.columns.push((self.type_column.clone(), Value::Null));
                plan.columns.push((self.id_column.clone(), Value::Null));
            }
        }
        Ok(plan)
    }
}
