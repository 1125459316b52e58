//! The resolution engine.
//!
//! A resolve call loads a batch of instances of one model and expands the
//! requested includes:
//!
//! 1. Ids already in the request cache are taken from it.
//! 2. The remaining ids (or the criteria) are loaded with one base query
//!    carrying every attribute column and every relationship's extra columns.
//! 3. Each relationship resolves the whole batch concurrently.
//! 4. Finished instances are stored in the cache.
//! 5. Included relationships are resolved recursively, one branch per
//!    `(relationship, target type)` pair, all branches concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use indexmap::{IndexMap, IndexSet};
use tracing::{Instrument, debug, debug_span, instrument};

use crate::cache::{CacheEntry, RequestCache};
use crate::document::Document;
use crate::error::{QueryError, QueryResult};
use crate::filter::{qualified, quote_ident, render_where};
use crate::include::IncludeTree;
use crate::instance::{FieldValue, Instance};
use crate::model::ModelDescriptor;
use crate::pagination::{PageLinks, PageMeta, PageRequest};
use crate::query::{Query, Selector};
use crate::relation_map::{InstanceRelations, NeededMap};
use crate::relations::{OwnerRow, OwnerRows, ResolveContext};
use crate::server::Server;
use crate::store::Persistence;
use crate::task_group::{LimitedStore, gather};
use crate::types::OrderBy;
use crate::value::Value;

/// Primary instances plus everything reached through includes.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Requested instances, in request order for ids and query order for criteria.
    pub instances: Vec<Arc<Instance>>,
    /// Included instances; may repeat, see [`crate::document::dedup_included`].
    pub included: Vec<Arc<Instance>>,
}

/// One decoded base row.
#[derive(Debug)]
struct BaseRow {
    id: String,
    attributes: Vec<Value>,
    extras: HashMap<String, Value>,
}

/// Resolves instances for one external request.
///
/// Cloning shares the request cache; [`fresh`](Self::fresh) starts a new one.
#[derive(Clone)]
pub struct Resolver {
    pub(crate) server: Arc<Server>,
    pub(crate) store: Arc<dyn Persistence>,
    cache: Arc<RequestCache>,
}

impl Resolver {
    /// Create a resolver with an empty cache.
    ///
    /// Storage calls are capped at `resolver.max_concurrency` in flight.
    pub fn new(server: Arc<Server>, store: Arc<dyn Persistence>) -> Self {
        let capacity = server.config().resolver.max_concurrency;
        Self {
            store: Arc::new(LimitedStore::new(store, capacity)),
            server,
            cache: Arc::new(RequestCache::new()),
        }
    }

    /// A resolver over the same server and storage with an empty cache.
    pub fn fresh(&self) -> Self {
        Self {
            server: Arc::clone(&self.server),
            store: Arc::clone(&self.store),
            cache: Arc::new(RequestCache::new()),
        }
    }

    /// Engine context.
    pub fn server(&self) -> &Server {
        &self.server
    }

    /// This request's cache.
    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    /// Resolve instances of `model` and expand `include`.
    ///
    /// `page` applies to criteria selectors only.
    pub fn resolve<'a>(
        &'a self,
        model: &'a ModelDescriptor,
        selector: Selector,
        page: Option<PageRequest>,
        include: IncludeTree,
    ) -> BoxFuture<'a, QueryResult<Resolution>> {
        let span = debug_span!("resolve", model = model.type_name());
        async move {
            let primary = self.load_primary(model, selector, page).await?;
            let included = self.expand(&primary, &include).await?;
            Ok(Resolution {
                instances: primary.into_iter().map(|e| e.instance).collect(),
                included,
            })
        }
        .instrument(span)
        .boxed()
    }

    async fn load_primary(
        &self,
        model: &ModelDescriptor,
        selector: Selector,
        page: Option<PageRequest>,
    ) -> QueryResult<Vec<CacheEntry>> {
        match selector {
            Selector::Ids(ids) => {
                let requested: IndexSet<String> = ids.into_iter().collect();
                let mut hits = HashMap::new();
                let mut misses = Vec::new();
                for id in &requested {
                    match self.cache.get(model.type_name(), id) {
                        Some(entry) => {
                            hits.insert(id.clone(), entry);
                        }
                        None => misses.push(id.clone()),
                    }
                }
                crate::weave_debug!(
                    model = model.type_name(),
                    hits = hits.len(),
                    misses = misses.len(),
                    "Cache lookup"
                );

                let mut loaded: HashMap<String, CacheEntry> = if misses.is_empty() {
                    HashMap::new()
                } else {
                    let rows = self.load_by_ids(model, &misses).await?;
                    self.build(model, rows)
                        .await?
                        .into_iter()
                        .map(|e| (e.instance.id().to_string(), e))
                        .collect()
                };

                Ok(requested
                    .iter()
                    .filter_map(|id| hits.remove(id).or_else(|| loaded.remove(id)))
                    .collect())
            }
            Selector::Criteria { filters, order } => {
                let mut args = Vec::new();
                let where_sql = render_where(&filters, &mut args);
                let order = if order.is_empty() {
                    model.default_order().clone()
                } else {
                    order
                };
                let rows = self
                    .load_base(model, where_sql, args, Some(&order), page)
                    .await?;
                self.build(model, rows).await
            }
        }
    }

    async fn expand(
        &self,
        primary: &[CacheEntry],
        include: &IncludeTree,
    ) -> QueryResult<Vec<Arc<Instance>>> {
        if include.is_empty() || primary.is_empty() {
            return Ok(Vec::new());
        }

        let mut needed = NeededMap::new();
        for entry in primary {
            needed.merge(&entry.relations);
        }

        let mut branches = Vec::new();
        for key in include.keys() {
            let Some(subtree) = include.child(key) else {
                continue;
            };
            for (target_type, ids) in needed.targets_for(key) {
                let target = self.server.model(target_type)?;
                debug!(relationship = key, target = target_type, ids = ids.len(), "Expanding include");
                branches.push(self.resolve(
                    target,
                    Selector::Ids(ids),
                    None,
                    subtree.prune_for(target),
                ));
            }
        }

        let mut included = Vec::new();
        for resolution in gather(branches).await? {
            included.extend(resolution.instances);
            included.extend(resolution.included);
        }
        Ok(included)
    }

    async fn load_by_ids(&self, model: &ModelDescriptor, ids: &[String]) -> QueryResult<Vec<BaseRow>> {
        let args: Vec<Value> = ids.iter().map(|id| Value::from(id.as_str())).collect();
        let placeholders: Vec<String> = (1..=args.len()).map(|i| format!("${}", i)).collect();
        let where_sql = format!("{} IN ({})", model.id_ref(), placeholders.join(", "));
        self.load_base(model, Some(where_sql), args, None, None).await
    }

    async fn load_base(
        &self,
        model: &ModelDescriptor,
        where_sql: Option<String>,
        args: Vec<Value>,
        order: Option<&OrderBy>,
        page: Option<PageRequest>,
    ) -> QueryResult<Vec<BaseRow>> {
        let mut columns: IndexSet<&str> = IndexSet::new();
        columns.insert(model.id_column());
        let attribute_slots: Vec<usize> = model
            .attributes()
            .iter()
            .map(|a| columns.insert_full(a.column()).0)
            .collect();
        let extra_slots: Vec<(&str, usize)> = model
            .relationships()
            .iter()
            .flat_map(|r| r.extra_columns())
            .map(|c| (c, columns.insert_full(c).0))
            .collect();

        let select: Vec<String> = columns
            .iter()
            .map(|c| qualified(model.table(), c))
            .collect();
        let mut sql = format!(
            "SELECT {} FROM {}",
            select.join(", "),
            quote_ident(model.table())
        );
        if let Some(where_sql) = where_sql {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        if let Some(order) = order {
            sql.push_str(" ORDER BY ");
            sql.push_str(&model.order_terms(order)?.join(", "));
        }
        if let Some(page) = page {
            sql.push(' ');
            sql.push_str(&page.to_sql());
        }
        debug!(model = model.type_name(), sql = %sql, "Loading base rows");

        let rows = self
            .store
            .query(&sql, &args)
            .await
            .map_err(|e| e.with_sql(&sql))?;

        rows.into_iter()
            .map(|row| {
                let id = row.value(0)?.id_string().ok_or_else(|| {
                    QueryError::decode(model.id_column(), "null primary key")
                        .with_model(model.type_name())
                })?;
                let attributes = model
                    .attributes()
                    .iter()
                    .zip(&attribute_slots)
                    .map(|(attr, slot)| {
                        attr.decode(row.value(*slot)?)
                            .map_err(|e| e.with_model(model.type_name()))
                    })
                    .collect::<QueryResult<Vec<_>>>()?;
                let extras = extra_slots
                    .iter()
                    .map(|(column, slot)| Ok((column.to_string(), row.value(*slot)?.clone())))
                    .collect::<QueryResult<HashMap<_, _>>>()?;
                Ok(BaseRow {
                    id,
                    attributes,
                    extras,
                })
            })
            .collect()
    }

    /// Attach relationship values to loaded rows and fill the cache.
    async fn build(&self, model: &ModelDescriptor, rows: Vec<BaseRow>) -> QueryResult<Vec<CacheEntry>> {
        let mut unique: IndexMap<String, Vec<Value>> = IndexMap::new();
        let mut owners = Vec::with_capacity(rows.len());
        for row in rows {
            match unique.get(&row.id) {
                Some(existing) if *existing != row.attributes => {
                    return Err(QueryError::duplicate_row(model.type_name(), &row.id));
                }
                Some(_) => {}
                None => {
                    unique.insert(row.id.clone(), row.attributes);
                }
            }
            owners.push(OwnerRow {
                id: row.id,
                extras: row.extras,
            });
        }
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let owners = OwnerRows::new(owners);
        let ctx = ResolveContext {
            server: &self.server,
            store: self.store.as_ref(),
            owner: model,
            page: None,
        };
        let mut batches = gather(
            model
                .relationships()
                .iter()
                .map(|rel| rel.resolve(&ctx, &owners)),
        )
        .await?;

        let mut entries = Vec::with_capacity(unique.len());
        for (id, attributes) in unique {
            let mut instance = model.instantiate(id.as_str());
            for (attr, value) in model.attributes().iter().zip(attributes) {
                instance.set(attr.key(), FieldValue::Attribute(value));
            }
            let mut relations = InstanceRelations::new();
            for (rel, batch) in model.relationships().iter().zip(batches.iter_mut()) {
                let value = batch
                    .values
                    .remove(&id)
                    .unwrap_or_else(|| rel.default_value(&self.server, model, &id));
                instance.set(rel.key(), value);
                if let Some(targets) = batch.relations.get(&id) {
                    relations.extend(rel.key(), targets);
                }
            }
            entries.push(self.cache.store(instance, relations));
        }
        Ok(entries)
    }

    /// Load one resource with its includes; `None` when it does not exist.
    #[instrument(skip_all, fields(model = %type_name, id = %id))]
    pub async fn find(
        &self,
        type_name: &str,
        id: &str,
        include: &IncludeTree,
    ) -> QueryResult<Option<Document>> {
        let model = self.server.model(type_name)?;
        let resolution = self
            .resolve(model, Selector::ids([id]), None, include.clone())
            .await?;
        let Some(instance) = resolution.instances.into_iter().next() else {
            return Ok(None);
        };

        self.server
            .check_access(type_name, std::slice::from_ref(&instance))?;
        self.server.check_access(type_name, &resolution.included)?;
        Ok(Some(Document::one(instance, resolution.included)))
    }

    /// Load one page of a filtered collection.
    #[instrument(skip_all, fields(model = %type_name))]
    pub async fn list(&self, type_name: &str, query: &Query) -> QueryResult<Document> {
        let model = self.server.model(type_name)?;
        let total = self.count(model, query).await?;
        let resolution = self
            .resolve(
                model,
                query.selector(),
                Some(query.page),
                query.include.clone(),
            )
            .await?;

        self.server.check_access(type_name, &resolution.instances)?;
        self.server.check_access(type_name, &resolution.included)?;

        let links = PageLinks::build(
            &self.server.collection_link(model),
            query.page.page,
            query.page.size,
            self.server.collection_page_size(model),
            total,
        );
        let meta = PageMeta {
            total,
            count: resolution.instances.len() as u64,
        };
        Ok(Document::many(
            resolution.instances,
            resolution.included,
            links,
            meta,
        ))
    }

    async fn count(&self, model: &ModelDescriptor, query: &Query) -> QueryResult<u64> {
        let mut args = Vec::new();
        let mut sql = format!("SELECT COUNT(*) FROM {}", quote_ident(model.table()));
        if let Some(where_sql) = render_where(&query.filters, &mut args) {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        debug!(model = model.type_name(), sql = %sql, "Counting rows");

        let row = self
            .store
            .query_row(&sql, &args)
            .await?
            .ok_or_else(|| QueryError::internal("COUNT returned no row").with_sql(&sql))?;
        let total = row
            .value(0)?
            .as_int()
            .ok_or_else(|| QueryError::internal("COUNT returned a non-integer").with_sql(&sql))?;
        Ok(total.max(0) as u64)
    }

    /// The value of one relationship of one owner.
    ///
    /// For collections, `page` selects the page; `None` returns the first.
    /// Returns `None` when the owner does not exist.
    #[instrument(skip_all, fields(model = %type_name, id = %id, relationship = %key))]
    pub async fn relationship(
        &self,
        type_name: &str,
        id: &str,
        key: &str,
        page: Option<PageRequest>,
    ) -> QueryResult<Option<FieldValue>> {
        let model = self.server.model(type_name)?;
        let rel = model
            .relationship(key)
            .ok_or_else(|| QueryError::unknown_field(type_name, key))?;

        let resolution = self
            .resolve(model, Selector::ids([id]), None, IncludeTree::new())
            .await?;
        let Some(owner) = resolution.instances.into_iter().next() else {
            return Ok(None);
        };
        self.server
            .check_access(type_name, std::slice::from_ref(&owner))?;

        let Some(page) = page.filter(|_| rel.kind().is_collection()) else {
            return Ok(owner.get(key).cloned());
        };

        let ctx = ResolveContext {
            server: &self.server,
            store: self.store.as_ref(),
            owner: model,
            page: Some(page),
        };
        let owners = OwnerRows::new(vec![OwnerRow::new(id)]);
        let mut batch = rel.resolve(&ctx, &owners).await?;
        Ok(Some(
            batch
                .values
                .remove(id)
                .unwrap_or_else(|| rel.default_value(&self.server, model, id)),
        ))
    }
}
