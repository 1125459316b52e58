//! Create, update and delete.
//!
//! Payloads are validated completely before storage is touched. Each write
//! then runs in one transaction: reference checks, the owner row, and the
//! follow-up statements planned by relationships. Results are read back
//! through a fresh resolver so the request cache is never overwritten.

use std::collections::HashSet;

use indexmap::IndexSet;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, instrument, warn};

use crate::document::Document;
use crate::error::{QueryError, QueryResult};
use crate::filter::{qualified, quote_ident};
use crate::include::IncludeTree;
use crate::model::ModelDescriptor;
use crate::relations::{ExistenceCheck, WritePlan};
use crate::resolver::Resolver;
use crate::store::{Statement, Transaction};
use crate::value::{Input, Value};

const RESOURCE_MEMBERS: [&str; 4] = ["type", "id", "attributes", "relationships"];

/// A resource object taken apart.
struct Payload<'j> {
    id: Option<String>,
    attributes: Option<&'j Map<String, JsonValue>>,
    relationships: Option<&'j Map<String, JsonValue>>,
}

impl<'j> Payload<'j> {
    fn parse(model: &ModelDescriptor, payload: &'j JsonValue) -> QueryResult<Self> {
        let resource = match payload.get("data") {
            Some(data) => data,
            None => payload,
        };
        let object = resource
            .as_object()
            .ok_or_else(|| QueryError::invalid_value("data", "expected a resource object"))?;

        if let Some(member) = object.keys().find(|k| !RESOURCE_MEMBERS.contains(&k.as_str())) {
            return Err(QueryError::invalid_value(
                member.as_str(),
                "unknown resource member",
            ));
        }

        match object.get("type") {
            None => {}
            Some(JsonValue::String(t)) if t == model.type_name() => {}
            Some(other) => {
                return Err(QueryError::invalid_value(
                    "type",
                    format!("expected {:?}, got {}", model.type_name(), other),
                ));
            }
        }

        let id = match object.get("id") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(JsonValue::Number(n)) => Some(n.to_string()),
            Some(other) => {
                return Err(QueryError::invalid_value(
                    "id",
                    format!("expected a non-empty string, got {}", other),
                ));
            }
        };

        let attributes = member_object(object, "attributes")?;
        if let Some(attributes) = attributes {
            if let Some(key) = attributes.keys().find(|k| model.attribute(k).is_none()) {
                return Err(QueryError::unknown_field(model.type_name(), key.as_str()));
            }
        }
        let relationships = member_object(object, "relationships")?;
        if let Some(relationships) = relationships {
            if let Some(key) = relationships
                .keys()
                .find(|k| model.relationship(k).is_none())
            {
                return Err(QueryError::unknown_field(model.type_name(), key.as_str()));
            }
        }

        Ok(Self {
            id,
            attributes,
            relationships,
        })
    }

    /// Decoded attribute input; `Unset` when the member is absent.
    fn attribute(
        &self,
        attribute: &dyn crate::fields::Attribute,
    ) -> QueryResult<Input<Value>> {
        let member = self.attributes.and_then(|a| a.get(attribute.key()));
        match Input::from_json(member) {
            Input::Unset => Ok(Input::Unset),
            Input::Null => Ok(Input::Null),
            Input::Value(json) => attribute.decode_input(json).map(Input::Value),
        }
    }

    fn relationship(&self, key: &str) -> Option<&'j JsonValue> {
        self.relationships.and_then(|r| r.get(key))
    }
}

fn member_object<'j>(
    object: &'j Map<String, JsonValue>,
    member: &str,
) -> QueryResult<Option<&'j Map<String, JsonValue>>> {
    match object.get(member) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Object(map)) => Ok(Some(map)),
        Some(_) => Err(QueryError::invalid_value(member, "expected an object")),
    }
}

/// Everything a write will change, merged across relationships.
#[derive(Debug, Default)]
struct Changes {
    columns: Vec<(String, Value)>,
    statements: Vec<Statement>,
    checks: Vec<ExistenceCheck>,
}

impl Changes {
    fn absorb(&mut self, plan: WritePlan) {
        self.columns.extend(plan.columns);
        self.statements.extend(plan.statements);
        self.checks.extend(plan.checks);
    }
}

impl Resolver {
    /// Create a resource from a resource object.
    ///
    /// The client may choose the id; otherwise a UUID v4 is assigned.
    #[instrument(skip_all, fields(model = %type_name))]
    pub async fn create(&self, type_name: &str, payload: &JsonValue) -> QueryResult<Document> {
        let model = self.server.model(type_name)?;
        let payload = Payload::parse(model, payload)?;
        let id = payload
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut partial = model.instantiate(id.as_str());
        let mut changes = Changes::default();
        changes
            .columns
            .push((model.id_column().to_string(), Value::from(id.as_str())));
        for attribute in model.attributes() {
            let input = payload.attribute(attribute.as_ref())?;
            let value = attribute.validate_create(input, &partial)?;
            partial.set(
                attribute.key(),
                crate::instance::FieldValue::Attribute(value.clone()),
            );
            changes.columns.push((attribute.column().to_string(), value));
        }
        self.plan_relationships(model, &id, &payload, &mut changes)?;

        let Changes {
            columns,
            statements,
            checks,
        } = changes;
        let mut tx = self.store.begin().await?;
        let outcome = async {
            self.check_references(tx.as_mut(), &checks).await?;
            let (columns, args): (Vec<_>, Vec<_>) = columns
                .into_iter()
                .map(|(c, v)| (quote_ident(&c), v))
                .unzip();
            let placeholders: Vec<String> = (1..=args.len()).map(|i| format!("${}", i)).collect();
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(model.table()),
                columns.join(", "),
                placeholders.join(", ")
            );
            run(tx.as_mut(), &Statement::new(sql, args)).await?;
            for statement in &statements {
                run(tx.as_mut(), statement).await?;
            }
            Ok::<_, QueryError>(())
        }
        .await;
        finish(tx, outcome).await?;
        debug!(model = type_name, id = %id, "Created resource");

        self.read_back(type_name, &id).await?.ok_or_else(|| {
            QueryError::internal(format!("created {} {} could not be read back", type_name, id))
        })
    }

    /// Apply a partial update. Returns `None` when the resource does not exist.
    #[instrument(skip_all, fields(model = %type_name, id = %id))]
    pub async fn update(
        &self,
        type_name: &str,
        id: &str,
        payload: &JsonValue,
    ) -> QueryResult<Option<Document>> {
        let model = self.server.model(type_name)?;
        let payload = Payload::parse(model, payload)?;
        if let Some(payload_id) = &payload.id {
            if payload_id != id {
                return Err(QueryError::invalid_value(
                    "id",
                    format!("payload id {} does not match {}", payload_id, id),
                ));
            }
        }
        let mut inputs = Vec::with_capacity(model.attributes().len());
        for attribute in model.attributes() {
            inputs.push(payload.attribute(attribute.as_ref())?);
        }
        let mut changes = Changes::default();
        self.plan_relationships(model, id, &payload, &mut changes)?;
        let Changes {
            columns: planned,
            statements,
            checks,
        } = changes;

        let mut tx = self.store.begin().await?;
        let outcome = async {
            let Some(old) = load_attributes(tx.as_mut(), model, id).await? else {
                return Ok::<_, QueryError>(false);
            };
            let mut columns = Vec::new();
            for ((attribute, input), old) in model.attributes().iter().zip(inputs).zip(&old) {
                if let Some(value) = attribute.validate_update(old, input)?.into_value() {
                    columns.push((attribute.column().to_string(), value));
                }
            }
            columns.extend(planned);

            self.check_references(tx.as_mut(), &checks).await?;
            if !columns.is_empty() {
                let mut args = Vec::with_capacity(columns.len() + 1);
                let assignments: Vec<String> = columns
                    .into_iter()
                    .map(|(column, value)| {
                        args.push(value);
                        format!("{} = ${}", quote_ident(&column), args.len())
                    })
                    .collect();
                args.push(Value::from(id));
                let sql = format!(
                    "UPDATE {} SET {} WHERE {} = ${}",
                    quote_ident(model.table()),
                    assignments.join(", "),
                    quote_ident(model.id_column()),
                    args.len()
                );
                run(tx.as_mut(), &Statement::new(sql, args)).await?;
            }
            for statement in &statements {
                run(tx.as_mut(), statement).await?;
            }
            Ok(true)
        }
        .await;
        if !finish(tx, outcome).await? {
            return Ok(None);
        }
        debug!(model = type_name, id = %id, "Updated resource");
        let document = self.read_back(type_name, id).await?.ok_or_else(|| {
            QueryError::internal(format!("updated {} {} could not be read back", type_name, id))
        })?;
        Ok(Some(document))
    }

    /// Delete a resource. Returns `false` when it does not exist.
    #[instrument(skip_all, fields(model = %type_name, id = %id))]
    pub async fn delete(&self, type_name: &str, id: &str) -> QueryResult<bool> {
        let model = self.server.model(type_name)?;
        let registry = self.server.registry();
        let mut cleanup = Vec::new();
        for relationship in model.relationships() {
            cleanup.extend(relationship.plan_delete(registry, model, id)?);
        }

        let mut tx = self.store.begin().await?;
        let outcome = async {
            let sql = format!(
                "SELECT {} FROM {} WHERE {} = $1",
                quote_ident(model.id_column()),
                quote_ident(model.table()),
                quote_ident(model.id_column())
            );
            if tx.query(&sql, &[Value::from(id)]).await?.is_empty() {
                return Ok::<_, QueryError>(false);
            }
            for statement in &cleanup {
                run(tx.as_mut(), statement).await?;
            }
            let sql = format!(
                "DELETE FROM {} WHERE {} = $1",
                quote_ident(model.table()),
                quote_ident(model.id_column())
            );
            run(tx.as_mut(), &Statement::new(sql, vec![Value::from(id)])).await?;
            Ok(true)
        }
        .await;
        let deleted = finish(tx, outcome).await?;
        debug!(model = type_name, id = %id, deleted, "Delete finished");
        Ok(deleted)
    }

    fn plan_relationships(
        &self,
        model: &ModelDescriptor,
        id: &str,
        payload: &Payload<'_>,
        changes: &mut Changes,
    ) -> QueryResult<()> {
        let registry = self.server.registry();
        for relationship in model.relationships() {
            if let Some(json) = payload.relationship(relationship.key()) {
                let input = relationship.decode_input(registry, json)?;
                changes.absorb(relationship.plan_write(registry, model, id, input)?);
            }
        }
        Ok(())
    }

    async fn check_references(
        &self,
        tx: &mut dyn Transaction,
        checks: &[ExistenceCheck],
    ) -> QueryResult<()> {
        for check in checks {
            let ids: IndexSet<&str> = check.ids.iter().map(String::as_str).collect();
            if ids.is_empty() {
                continue;
            }
            let target = self.server.model(&check.type_name)?;
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("${}", i)).collect();
            let sql = format!(
                "SELECT {} FROM {} WHERE {} IN ({})",
                target.id_ref(),
                quote_ident(target.table()),
                target.id_ref(),
                placeholders.join(", ")
            );
            let args: Vec<Value> = ids.iter().map(|id| Value::from(*id)).collect();
            debug!(relationship = %check.key, sql = %sql, "Checking references");

            let found: HashSet<String> = tx
                .query(&sql, &args)
                .await
                .map_err(|e| e.with_sql(&sql))?
                .iter()
                .filter_map(|row| row.get(0).and_then(Value::id_string))
                .collect();
            if let Some(missing) = ids.iter().find(|id| !found.contains(**id)) {
                return Err(QueryError::missing_reference(
                    &check.key,
                    &check.type_name,
                    missing,
                ));
            }
        }
        Ok(())
    }

    async fn read_back(&self, type_name: &str, id: &str) -> QueryResult<Option<Document>> {
        self.fresh().find(type_name, id, &IncludeTree::new()).await
    }
}

/// Current attribute values of one row, in declared order.
async fn load_attributes(
    tx: &mut dyn Transaction,
    model: &ModelDescriptor,
    id: &str,
) -> QueryResult<Option<Vec<Value>>> {
    let mut columns = vec![model.id_ref()];
    columns.extend(
        model
            .attributes()
            .iter()
            .map(|a| qualified(model.table(), a.column())),
    );
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = $1",
        columns.join(", "),
        quote_ident(model.table()),
        model.id_ref()
    );
    let rows = tx
        .query(&sql, &[Value::from(id)])
        .await
        .map_err(|e| e.with_sql(&sql))?;
    let Some(row) = rows.into_iter().next() else {
        return Ok(None);
    };
    model
        .attributes()
        .iter()
        .enumerate()
        .map(|(i, attribute)| attribute.decode(row.value(i + 1)?))
        .collect::<QueryResult<Vec<_>>>()
        .map(Some)
}

async fn run(tx: &mut dyn Transaction, statement: &Statement) -> QueryResult<u64> {
    debug!(sql = %statement.sql, args = statement.args.len(), "Executing write");
    tx.exec(&statement.sql, &statement.args)
        .await
        .map_err(|e| e.with_sql(&statement.sql))
}

/// Commit on success, roll back on failure.
async fn finish<T>(tx: Box<dyn Transaction>, outcome: QueryResult<T>) -> QueryResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::EngineConfig;
    use crate::fields::{IntegerField, TextField};
    use crate::model::Registry;
    use crate::relations::DirectRelation;
    use crate::server::Server;
    use crate::store::{Persistence, Row};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Records every statement; the single "books" row has id 1.
    #[derive(Default)]
    struct RecordingStore {
        log: Arc<Mutex<Vec<String>>>,
        fail_exec: bool,
    }

    struct RecordingTx {
        log: Arc<Mutex<Vec<String>>>,
        fail_exec: bool,
    }

    #[async_trait]
    impl Persistence for RecordingStore {
        async fn query(&self, sql: &str, _args: &[Value]) -> QueryResult<Vec<Row>> {
            self.log.lock().push(sql.to_string());
            Ok(Vec::new())
        }

        async fn exec(&self, sql: &str, _args: &[Value]) -> QueryResult<u64> {
            self.log.lock().push(sql.to_string());
            Ok(1)
        }

        async fn begin(&self) -> QueryResult<Box<dyn Transaction>> {
            self.log.lock().push("BEGIN".to_string());
            Ok(Box::new(RecordingTx {
                log: Arc::clone(&self.log),
                fail_exec: self.fail_exec,
            }))
        }
    }

    #[async_trait]
    impl Transaction for RecordingTx {
        async fn query(&mut self, sql: &str, args: &[Value]) -> QueryResult<Vec<Row>> {
            self.log.lock().push(sql.to_string());
            if args.first() == Some(&Value::from("1")) {
                Ok(vec![Row::new(vec![
                    Value::from("1"),
                    Value::from("Dune"),
                    Value::Int(412),
                ])])
            } else {
                Ok(Vec::new())
            }
        }

        async fn exec(&mut self, sql: &str, _args: &[Value]) -> QueryResult<u64> {
            self.log.lock().push(sql.to_string());
            if self.fail_exec {
                Err(QueryError::database("disk full"))
            } else {
                Ok(1)
            }
        }

        async fn commit(self: Box<Self>) -> QueryResult<()> {
            self.log.lock().push("COMMIT".to_string());
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> QueryResult<()> {
            self.log.lock().push("ROLLBACK".to_string());
            Ok(())
        }
    }

    fn resolver(store: RecordingStore) -> Resolver {
        let registry = Registry::builder()
            .model(
                ModelDescriptor::builder("books", "books")
                    .attribute(TextField::new("title").min_len(1))
                    .attribute(IntegerField::new("pages").nullable())
                    .relationship(DirectRelation::new("author", "authors", "author_id")),
            )
            .model(ModelDescriptor::builder("authors", "authors"))
            .build()
            .unwrap();
        Resolver::new(
            Arc::new(Server::new(registry, EngineConfig::default())),
            Arc::new(store),
        )
    }

    #[tokio::test]
    async fn test_invalid_payload_touches_no_storage() {
        let store = RecordingStore::default();
        let log = Arc::clone(&store.log);
        let resolver = resolver(store);

        let cases = [
            json!({"type": "authors", "attributes": {"title": "Dune"}}),
            json!({"attributes": {"colour": "red"}}),
            json!({"attributes": {"title": ""}}),
            json!({"attributes": {"title": null}}),
            json!({"attributes": {"title": "Dune"}, "meta": {}}),
            json!({"attributes": {"title": "Dune"}, "relationships": {"author": {"data": {"type": "books", "id": "1"}}}}),
        ];
        for payload in cases {
            let err = resolver.create("books", &payload).await.unwrap_err();
            assert!(err.is_validation(), "{:?} -> {}", payload, err);
        }
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_update_of_absent_row() {
        let store = RecordingStore::default();
        let log = Arc::clone(&store.log);
        let resolver = resolver(store);

        let result = resolver
            .update("books", "missing", &json!({"attributes": {"pages": 10}}))
            .await
            .unwrap();
        assert!(result.is_none());
        let log = log.lock();
        assert_eq!(log.first().map(String::as_str), Some("BEGIN"));
        assert!(!log.iter().any(|sql| sql.starts_with("UPDATE")));
    }

    #[tokio::test]
    async fn test_update_sets_only_supplied_columns() {
        let store = RecordingStore::default();
        let log = Arc::clone(&store.log);
        let resolver = resolver(store);

        // Read-back goes through the non-transactional path, which finds nothing,
        // so the committed update surfaces as an internal error rather than a miss.
        let err = resolver
            .update("books", "1", &json!({"data": {"type": "books", "id": "1", "attributes": {"pages": null}}}))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Internal);
        let log = log.lock();
        assert!(log.contains(&r#"UPDATE "books" SET "pages" = $1 WHERE "id" = $2"#.to_string()));
        assert!(log.contains(&"COMMIT".to_string()));
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back() {
        let store = RecordingStore {
            fail_exec: true,
            ..Default::default()
        };
        let log = Arc::clone(&store.log);
        let resolver = resolver(store);

        let err = resolver
            .create("books", &json!({"attributes": {"title": "Dune"}}))
            .await
            .unwrap_err();
        assert!(err.is_storage());
        let log = log.lock();
        assert_eq!(log.last().map(String::as_str), Some("ROLLBACK"));
        assert!(!log.contains(&"COMMIT".to_string()));
    }
}
