// Generic CRUD functions for one REST resource.
//
// A `Resource<T, R>` is the raw half of the data-layer factory: given a
// resource path (e.g. "holiday") it exposes create/get/update/delete/list
// calls against the shared `ApiClient`. Cache-aware handles are built on
// top of it in `ledgerdesk-core`.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use crate::client::ApiClient;
use crate::error::Error;
use crate::query::{PageQuery, Paginated};

/// Body of the bulk-delete request.
#[derive(Debug, Serialize)]
struct BulkDeleteBody<'a, I: Serialize> {
    ids: &'a [I],
}

/// CRUD endpoints for a single entity type.
///
/// - `POST   {url}`           create
/// - `GET    {url}`           list all
/// - `GET    {url}/search`    paginated list with filter/sort
/// - `GET    {url}/{id}`      get by id
/// - `PUT    {url}/{id}`      update by id
/// - `DELETE {url}/{id}`      delete by id
/// - `DELETE {url}/bulk`      delete many, body `{"ids": [...]}`
pub struct Resource<T, R> {
    api: ApiClient,
    url: String,
    _marker: PhantomData<fn() -> (T, R)>,
}

impl<T, R> Clone for Resource<T, R> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            url: self.url.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, R> fmt::Debug for Resource<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource").field("url", &self.url).finish_non_exhaustive()
    }
}

impl<T, R> Resource<T, R>
where
    T: DeserializeOwned,
    R: Serialize + Sync,
{
    /// Scope the shared client to `url` (relative to `/api/v1/`).
    pub fn new(api: ApiClient, url: impl Into<String>) -> Self {
        let url = url.into().trim_matches('/').to_owned();
        Self {
            api,
            url,
            _marker: PhantomData,
        }
    }

    /// The shared HTTP client this resource calls through.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn item_url(&self, id: &impl fmt::Display) -> Result<Url, Error> {
        self.api.item_url(&self.url, &id.to_string())
    }

    #[instrument(skip_all, fields(resource = %self.url))]
    pub async fn create(&self, payload: &R) -> Result<T, Error> {
        self.api.post(&self.url, payload).await
    }

    #[instrument(skip_all, fields(resource = %self.url, %id))]
    pub async fn get_by_id(&self, id: &(impl fmt::Display + Sync)) -> Result<T, Error> {
        self.api.get_at(self.item_url(id)?).await
    }

    #[instrument(skip_all, fields(resource = %self.url))]
    pub async fn get_all(&self) -> Result<Vec<T>, Error> {
        self.api.get(&self.url).await
    }

    #[instrument(skip_all, fields(resource = %self.url, page = query.page_index))]
    pub async fn get_paginated(&self, query: &PageQuery) -> Result<Paginated<T>, Error> {
        let params = query.to_params()?;
        self.api
            .get_with_params(&format!("{}/search", self.url), &params)
            .await
    }

    #[instrument(skip_all, fields(resource = %self.url, %id))]
    pub async fn update_by_id(
        &self,
        id: &(impl fmt::Display + Sync),
        payload: &R,
    ) -> Result<T, Error> {
        self.api.put_at(self.item_url(id)?, payload).await
    }

    #[instrument(skip_all, fields(resource = %self.url, %id))]
    pub async fn delete_by_id(&self, id: &(impl fmt::Display + Sync)) -> Result<(), Error> {
        self.api.delete_at(self.item_url(id)?).await
    }

    /// One request for the whole batch.
    #[instrument(skip_all, fields(resource = %self.url, count = ids.len()))]
    pub async fn delete_many<I: Serialize + Sync>(&self, ids: &[I]) -> Result<(), Error> {
        self.api
            .delete_with_body(&format!("{}/bulk", self.url), &BulkDeleteBody { ids })
            .await
    }
}
