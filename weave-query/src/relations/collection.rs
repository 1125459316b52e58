//! Filters and windowed loading shared by the collection variants.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::debug;

use super::{RelationBatch, ResolveContext};
use crate::error::{QueryError, QueryResult};
use crate::filter::{CompareOp, Filter, SubCondition, Subquery, qualified, quote_ident};
use crate::instance::FieldValue;
use crate::model::ModelDescriptor;
use crate::pagination::{PAGE_OFFSET_PARAM, PageLinks, PageRequest};
use crate::params::ParamReader;
use crate::pointer::{Page, ResourceIdentifier};
use crate::relation_map::OwnerRelations;
use crate::value::Value;

/// Where the link rows of a collection live.
#[derive(Debug, Clone)]
pub(crate) struct CollectionLink {
    /// Table holding one row per link.
    pub table: String,
    /// Column referencing the owner.
    pub owner_column: String,
    /// Column referencing the target.
    pub target_column: String,
    /// Extra equality restricting link rows, e.g. a polymorphic type column.
    pub scope: Option<(String, Value)>,
    /// The target model.
    pub target: Arc<ModelDescriptor>,
    /// Whether the target table must be joined in for ordering.
    pub join_target: bool,
}

impl CollectionLink {
    fn owner_ref(&self) -> String {
        qualified(&self.table, &self.owner_column)
    }

    fn target_ref(&self) -> String {
        qualified(&self.table, &self.target_column)
    }

    fn subquery(&self) -> Subquery {
        let sub = Subquery::new(self.owner_ref(), quote_ident(&self.table));
        match &self.scope {
            Some((column, value)) => sub.condition(SubCondition::Equals(
                qualified(&self.table, column),
                value.clone(),
            )),
            None => sub,
        }
    }

    fn window_from(&self) -> String {
        if self.join_target {
            format!(
                "{} JOIN {} ON {} = {}",
                quote_ident(&self.table),
                quote_ident(self.target.table()),
                self.target.id_ref(),
                self.target_ref()
            )
        } else {
            quote_ident(&self.table)
        }
    }
}

/// Compile `key`, `key__contains`, `key__excludes` and `key__count*`.
pub(crate) fn compile_filters(
    key: &str,
    link: &CollectionLink,
    owner: &ModelDescriptor,
    reader: &mut ParamReader<'_>,
) -> QueryResult<Vec<Filter>> {
    let owner_id = owner.id_ref();
    let param = |suffix: &str| format!("{}__{}", key, suffix);

    let exact = reader.multi(key);
    let contains = reader.multi(&param("contains"));
    let excludes = reader.multi(&param("excludes"));
    let count = reader.count(&param("count"))?;
    let count_lt = reader.count(&param("count__lt"))?;
    let count_gt = reader.count(&param("count__gt"))?;

    if let (Some(lt), Some(gt)) = (count_lt, count_gt) {
        if lt < gt {
            return Err(QueryError::invalid_filter(
                param("count__lt"),
                format!("upper bound {} is below {}={}", lt, param("count__gt"), gt),
            ));
        }
    }

    let member = |id: &str| Filter::Member {
        column: owner_id.clone(),
        subquery: link.subquery().condition(SubCondition::Equals(
            link.target_ref(),
            Value::from(id),
        )),
        negate: false,
    };
    let counted = |op, value| Filter::Count {
        subquery: link
            .subquery()
            .condition(SubCondition::Correlated(link.owner_ref(), owner_id.clone())),
        op,
        value,
    };

    let mut filters = Vec::new();
    if let Some(ids) = exact {
        let ids: IndexSet<&str> = ids.into_iter().collect();
        filters.extend(ids.iter().map(|id| member(*id)));
        filters.push(counted(CompareOp::Eq, ids.len() as i64));
    }
    if let Some(ids) = contains {
        let ids: IndexSet<&str> = ids.into_iter().collect();
        filters.extend(ids.iter().map(|id| member(*id)));
    }
    if let Some(ids) = excludes {
        if !ids.is_empty() {
            filters.push(Filter::Member {
                column: owner_id.clone(),
                subquery: link
                    .subquery()
                    .condition(SubCondition::InList(
                        link.target_ref(),
                        ids.into_iter().map(Value::from).collect(),
                    ))
                    .condition(SubCondition::NotNull(link.owner_ref())),
                negate: true,
            });
        }
    }
    for (op, value) in [
        (CompareOp::Eq, count),
        (CompareOp::Lt, count_lt),
        (CompareOp::Gt, count_gt),
    ] {
        if let Some(value) = value {
            filters.push(counted(op, value));
        }
    }

    Ok(filters)
}

/// Load one page of targets for every owner with a single windowed query.
pub(crate) async fn resolve(
    ctx: &ResolveContext<'_>,
    key: &str,
    link: &CollectionLink,
    page_size: Option<u64>,
    owner_ids: &[String],
) -> QueryResult<RelationBatch> {
    let mut batch = RelationBatch::default();
    if owner_ids.is_empty() {
        return Ok(batch);
    }

    let default_size = page_size.unwrap_or_else(|| ctx.server.indirect_page_size());
    let page = ctx
        .page
        .unwrap_or_else(|| PageRequest::first(default_size));
    let out_of_range = |_| {
        QueryError::invalid_pagination(
            PAGE_OFFSET_PARAM,
            format!("page {} of size {} is out of range", page.page, page.size),
        )
    };
    let skip = i64::try_from(page.skip()).map_err(out_of_range)?;
    let end = i64::try_from(page.skip().saturating_add(page.size)).map_err(out_of_range)?;

    let mut args: Vec<Value> = owner_ids.iter().map(|id| Value::from(id.as_str())).collect();
    let placeholders: Vec<String> = (1..=args.len()).map(|i| format!("${}", i)).collect();
    let mut scope_sql = String::new();
    if let Some((column, value)) = &link.scope {
        args.push(value.clone());
        scope_sql = format!(" AND {} = ${}", qualified(&link.table, column), args.len());
    }
    args.push(Value::Int(skip));
    let skip_param = args.len();
    args.push(Value::Int(end));
    let end_param = args.len();

    let order = link.target.order_terms(link.target.default_order())?;

    let sql = format!(
        "SELECT owner_id, target_id, total, rn FROM (\
         SELECT {owner} AS owner_id, {target} AS target_id, \
         ROW_NUMBER() OVER (PARTITION BY {owner} ORDER BY {order}) AS rn, \
         COUNT(*) OVER (PARTITION BY {owner}) AS total \
         FROM {from} WHERE {owner} IN ({placeholders}){scope}\
         ) w WHERE rn = 1 OR (rn > ${skip} AND rn <= ${end}) ORDER BY owner_id, rn",
        owner = link.owner_ref(),
        target = link.target_ref(),
        order = order.join(", "),
        from = link.window_from(),
        placeholders = placeholders.join(", "),
        scope = scope_sql,
        skip = skip_param,
        end = end_param,
    );
    debug!(relationship = key, owners = owner_ids.len(), sql = %sql, "Loading collection window");

    let rows = ctx.store.query(&sql, &args).await?;

    let target_type = link.target.type_name();
    let mut totals: HashMap<String, u64> = HashMap::new();
    let mut data: HashMap<String, Vec<ResourceIdentifier>> = HashMap::new();
    let mut relations = OwnerRelations::new();
    for row in rows {
        let owner = row
            .value(0)?
            .id_string()
            .ok_or_else(|| QueryError::decode(key, "null owner id in collection window"))?;
        let target = row
            .value(1)?
            .id_string()
            .ok_or_else(|| QueryError::decode(key, "null target id in collection window"))?;
        let total = row
            .value(2)?
            .as_int()
            .ok_or_else(|| QueryError::decode(key, "non-integer window total"))?;
        let rn = row
            .value(3)?
            .as_int()
            .ok_or_else(|| QueryError::decode(key, "non-integer row number"))?;

        totals.insert(owner.clone(), total.max(0) as u64);
        let rn = rn.max(0) as u64;
        if rn > skip as u64 && rn <= end as u64 {
            relations.add(&owner, target_type, target.clone());
            data.entry(owner)
                .or_default()
                .push(ResourceIdentifier::new(target_type, target));
        }
    }

    for owner_id in owner_ids {
        let total = totals.get(owner_id).copied().unwrap_or(0);
        let link_url = ctx.server.relationship_link(ctx.owner, owner_id, key);
        let links = PageLinks::build(&link_url, page.page, page.size, default_size, total);
        let items = data.remove(owner_id).unwrap_or_default();
        batch
            .values
            .insert(owner_id.clone(), FieldValue::Page(Page::new(links, total, items)));
    }
    batch.relations = relations;
    Ok(batch)
}
