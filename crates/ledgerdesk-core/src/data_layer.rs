// ── Data-layer factory ──
//
// One `DataLayer<T, R>` per entity: the raw CRUD calls of its `Resource`
// plus cache-aware query and mutation handles keyed under `base_key`.

use std::fmt;
use std::sync::Arc;

use ledgerdesk_api::{ApiClient, PageQuery, Paginated, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CoreError;
use crate::key::QueryKey;
use crate::model::{EntityId, Record};
use crate::mutation::{Mutation, MutationOptions, invalidate_lists};
use crate::notify::Notifier;
use crate::query::{Query, QueryOptions};
use crate::query_client::QueryClient;

/// `{ url, base_key }` plus the label used in toasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayerConfig {
    /// Resource path under `/api/v1/`, e.g. `"holiday"`.
    pub url: String,
    /// First segment of every query key for this entity.
    pub base_key: String,
    /// Human name, e.g. `"Holiday"`.
    pub label: String,
}

impl DataLayerConfig {
    /// Label defaults to the capitalized base key.
    pub fn new(url: impl Into<String>, base_key: impl Into<String>) -> Self {
        let base_key = base_key.into();
        let label = capitalize(&base_key);
        Self {
            url: url.into(),
            base_key,
            label,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct DataLayer<T, R> {
    resource: Resource<T, R>,
    client: QueryClient,
    notifier: Arc<dyn Notifier>,
    config: DataLayerConfig,
}

impl<T, R> Clone for DataLayer<T, R> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
            client: self.client.clone(),
            notifier: Arc::clone(&self.notifier),
            config: self.config.clone(),
        }
    }
}

impl<T, R> fmt::Debug for DataLayer<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLayer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T, R> DataLayer<T, R>
where
    T: Record + DeserializeOwned + Clone + Send + Sync + 'static,
    R: Serialize + Clone + Send + Sync + 'static,
{
    pub fn new(
        api: ApiClient,
        client: QueryClient,
        notifier: Arc<dyn Notifier>,
        config: DataLayerConfig,
    ) -> Self {
        Self {
            resource: Resource::new(api, config.url.clone()),
            client,
            notifier,
            config,
        }
    }

    /// The shared HTTP client, scoped through this entity's resource.
    pub fn api(&self) -> &ApiClient {
        self.resource.api()
    }

    pub fn resource(&self) -> &Resource<T, R> {
        &self.resource
    }

    pub fn query_client(&self) -> &QueryClient {
        &self.client
    }

    pub fn config(&self) -> &DataLayerConfig {
        &self.config
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    // ── Keys ─────────────────────────────────────────────────────────

    pub fn base_key(&self) -> QueryKey {
        QueryKey::new(&self.config.base_key)
    }

    pub fn all_key(&self) -> QueryKey {
        self.base_key().with("all")
    }

    /// The family key; one entry per page query lives under it.
    pub fn paginated_family(&self) -> QueryKey {
        self.base_key().with("paginated")
    }

    pub fn paginated_key(&self, query: &PageQuery) -> QueryKey {
        self.paginated_family().with_param(query)
    }

    pub fn detail_key(&self, id: &EntityId) -> QueryKey {
        self.base_key().with("detail").with_param(id)
    }

    // ── Raw CRUD ─────────────────────────────────────────────────────

    pub async fn create(&self, payload: &R) -> Result<T, CoreError> {
        Ok(self.resource.create(payload).await?)
    }

    pub async fn get_by_id(&self, id: &EntityId) -> Result<T, CoreError> {
        Ok(self.resource.get_by_id(id).await?)
    }

    pub async fn get_all(&self) -> Result<Vec<T>, CoreError> {
        Ok(self.resource.get_all().await?)
    }

    pub async fn get_paginated(&self, query: &PageQuery) -> Result<Paginated<T>, CoreError> {
        let page = self.resource.get_paginated(query).await?;
        Ok(normalize_page(page, query))
    }

    pub async fn update_by_id(&self, id: &EntityId, payload: &R) -> Result<T, CoreError> {
        Ok(self.resource.update_by_id(id, payload).await?)
    }

    pub async fn delete_by_id(&self, id: &EntityId) -> Result<(), CoreError> {
        Ok(self.resource.delete_by_id(id).await?)
    }

    pub async fn delete_many(&self, ids: &[EntityId]) -> Result<(), CoreError> {
        Ok(self.resource.delete_many(ids).await?)
    }

    // ── Query handles ────────────────────────────────────────────────

    pub fn query_all(&self, options: QueryOptions) -> Query<Vec<T>> {
        let resource = self.resource.clone();
        Query::new(
            self.client.clone(),
            Arc::clone(&self.notifier),
            self.all_key(),
            Vec::new(),
            options,
            move || {
                let resource = resource.clone();
                async move { Ok(resource.get_all().await?) }
            },
        )
    }

    /// Detail query. Data stays `None` until the record arrives.
    pub fn query_by_id(&self, id: &EntityId, options: QueryOptions) -> Query<Option<T>> {
        let resource = self.resource.clone();
        let id = id.clone();
        Query::new(
            self.client.clone(),
            Arc::clone(&self.notifier),
            self.detail_key(&id),
            None,
            options,
            move || {
                let resource = resource.clone();
                let id = id.clone();
                async move { Ok(Some(resource.get_by_id(&id).await?)) }
            },
        )
    }

    /// Paginated query. Data starts as an empty envelope for `query`'s page.
    pub fn query_paginated(&self, query: &PageQuery, options: QueryOptions) -> Query<Paginated<T>> {
        let resource = self.resource.clone();
        let page_query = query.clone();
        Query::new(
            self.client.clone(),
            Arc::clone(&self.notifier),
            self.paginated_key(query),
            Paginated::empty(query.page_index, query.page_size),
            options,
            move || {
                let resource = resource.clone();
                let page_query = page_query.clone();
                async move {
                    let page = resource.get_paginated(&page_query).await?;
                    Ok(normalize_page(page, &page_query))
                }
            },
        )
    }

    // ── Mutation handles ─────────────────────────────────────────────

    pub fn create_mutation(&self, options: MutationOptions<R, T>) -> Mutation<R, T> {
        let resource = self.resource.clone();
        let label = self.config.label.clone();
        let detail = self.base_key().with("detail");

        Mutation::new(
            self.client.clone(),
            Arc::clone(&self.notifier),
            self.config.base_key.clone(),
            move |payload: R| {
                let resource = resource.clone();
                async move { Ok(resource.create(&payload).await?) }
            },
        )
        .with_invalidation(invalidate_lists::<R, T>(&self.config.base_key))
        .with_cache_write(move |client, _, record| {
            client.set_query_data(
                &detail.clone().with_param(record.record_id()),
                Some(record.clone()),
            );
        })
        .with_success_message(move |_, _| format!("{label} created"))
        .with_options(options)
    }

    pub fn update_mutation(
        &self,
        options: MutationOptions<(EntityId, R), T>,
    ) -> Mutation<(EntityId, R), T> {
        let resource = self.resource.clone();
        let label = self.config.label.clone();
        let detail = self.base_key().with("detail");
        let base = self.config.base_key.clone();

        Mutation::new(
            self.client.clone(),
            Arc::clone(&self.notifier),
            self.config.base_key.clone(),
            move |(id, payload): (EntityId, R)| {
                let resource = resource.clone();
                async move { Ok(resource.update_by_id(&id, &payload).await?) }
            },
        )
        .with_ticket_scope(move |(id, _)| format!("{base}:{id}"))
        .with_invalidation(invalidate_lists::<(EntityId, R), T>(&self.config.base_key))
        .with_cache_write(move |client, (id, _), record| {
            client.set_query_data(&detail.clone().with_param(id), Some(record.clone()));
        })
        .with_success_message(move |_, _| format!("{label} updated"))
        .with_options(options)
    }

    /// Eviction of the deleted record is not ticket-gated: overlapping
    /// deletes each remove their own detail entry.
    pub fn delete_mutation(&self, options: MutationOptions<EntityId, ()>) -> Mutation<EntityId, ()> {
        let resource = self.resource.clone();
        let label = self.config.label.clone();
        let detail = self.base_key().with("detail");
        let lists = invalidate_lists::<EntityId, ()>(&self.config.base_key);

        Mutation::new(
            self.client.clone(),
            Arc::clone(&self.notifier),
            self.config.base_key.clone(),
            move |id: EntityId| {
                let resource = resource.clone();
                async move { Ok(resource.delete_by_id(&id).await?) }
            },
        )
        .with_invalidation(move |client, id, result| {
            client.remove_queries(&detail.clone().with_param(id));
            lists(client, id, result);
        })
        .with_success_message(move |_, _| format!("{label} deleted"))
        .with_options(options)
    }

    /// One batched request for all ids, one invalidation on success. Like
    /// single deletes, eviction runs whatever the ticket.
    pub fn delete_many_mutation(
        &self,
        options: MutationOptions<Vec<EntityId>, ()>,
    ) -> Mutation<Vec<EntityId>, ()> {
        let resource = self.resource.clone();
        let label = self.config.label.clone();
        let detail = self.base_key().with("detail");
        let lists = invalidate_lists::<Vec<EntityId>, ()>(&self.config.base_key);

        Mutation::new(
            self.client.clone(),
            Arc::clone(&self.notifier),
            self.config.base_key.clone(),
            move |ids: Vec<EntityId>| {
                let resource = resource.clone();
                async move { Ok(resource.delete_many(&ids).await?) }
            },
        )
        .with_invalidation(move |client, ids, result| {
            for id in ids {
                client.remove_queries(&detail.clone().with_param(id));
            }
            lists(client, ids, result);
        })
        .with_success_message(move |ids, _| format!("{} {label} records deleted", ids.len()))
        .with_options(options)
    }
}

/// Fill in paging fields a sparse response left out, so an empty result
/// matches `Paginated::empty` for the same query.
fn normalize_page<T>(mut page: Paginated<T>, query: &PageQuery) -> Paginated<T> {
    if page.page_size == 0 {
        page.page_index = query.page_index;
        page.page_size = query.page_size;
        page.total_page = Paginated::<T>::page_count(page.total_size, page.page_size);
    }
    page
}
