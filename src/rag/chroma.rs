//! ChromaDB-backed course store, spoken to over its v2 REST API.
//!
//! Two collections are used: `course_content` for chunks and
//! `course_catalog` for one entry per course (id = title). Both use cosine
//! distance, so similarity is reported as `1 - distance`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;

use super::chunker::CourseChunk;
use super::document::{Course, Lesson};
use super::error::RagError;
use super::store::{ChunkFilter, RagStore, SearchResult};

const CONTENT_COLLECTION: &str = "course_content";
const CATALOG_COLLECTION: &str = "course_catalog";
const TENANT: &str = "default_tenant";
const DATABASE: &str = "default_database";

#[derive(Debug, Clone)]
struct CollectionIds {
    content: String,
    catalog: String,
}

pub struct ChromaRagStore {
    base_url: String,
    client: Client,
    collections: RwLock<CollectionIds>,
}

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Vec<Vec<Option<Map<String, Value>>>>,
    #[serde(default)]
    distances: Vec<Vec<Option<f32>>>,
}

#[derive(Deserialize, Default)]
struct GetResponse {
    #[serde(default)]
    metadatas: Vec<Option<Map<String, Value>>>,
}

impl ChromaRagStore {
    /// Connects and creates the collections if they do not exist yet.
    pub async fn connect(base_url: &str) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(RagError::store)?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let content = ensure_collection(&client, &base_url, CONTENT_COLLECTION).await?;
        let catalog = ensure_collection(&client, &base_url, CATALOG_COLLECTION).await?;
        tracing::info!("Connected to ChromaDB at {}", base_url);

        Ok(Self {
            base_url,
            client,
            collections: RwLock::new(CollectionIds { content, catalog }),
        })
    }

    fn collection_url(&self, id: &str, op: &str) -> String {
        format!("{}/{}/{}", collections_url(&self.base_url), id, op)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response, RagError> {
        let res = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(RagError::store)?;
        check_status(res).await
    }

    async fn get_metadatas(&self, body: Value) -> Result<Vec<Map<String, Value>>, RagError> {
        let catalog = self.collections.read().await.catalog.clone();
        let res = self.post(&self.collection_url(&catalog, "get"), &body).await?;
        let payload: GetResponse = res.json().await.map_err(RagError::store)?;
        Ok(payload.metadatas.into_iter().flatten().collect())
    }
}

fn collections_url(base_url: &str) -> String {
    format!(
        "{}/api/v2/tenants/{}/databases/{}/collections",
        base_url, TENANT, DATABASE
    )
}

async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, RagError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    Err(RagError::StoreUnavailable(format!("ChromaDB {}: {}", status, text)))
}

async fn ensure_collection(
    client: &Client,
    base_url: &str,
    name: &str,
) -> Result<String, RagError> {
    let body = json!({
        "name": name,
        "metadata": { "hnsw:space": "cosine" },
        "get_or_create": true,
    });
    let res = client
        .post(collections_url(base_url))
        .json(&body)
        .send()
        .await
        .map_err(RagError::store)?;
    let collection: CollectionResponse = check_status(res)
        .await?
        .json()
        .await
        .map_err(RagError::store)?;
    Ok(collection.id)
}

/// Chroma `where` clause for a filter; `None` when unrestricted.
fn where_clause(filter: &ChunkFilter) -> Option<Value> {
    let mut conditions = Vec::new();
    if let Some(title) = &filter.course_title {
        conditions.push(json!({ "course_title": title }));
    }
    if let Some(number) = filter.lesson_number {
        conditions.push(json!({ "lesson_number": number }));
    }
    match conditions.len() {
        0 => None,
        1 => conditions.pop(),
        _ => Some(json!({ "$and": conditions })),
    }
}

// Chroma rejects null metadata values, so absent fields are omitted.
fn chunk_metadata(chunk: &CourseChunk) -> Value {
    let mut meta = Map::new();
    meta.insert("course_title".into(), json!(chunk.course_title));
    meta.insert("chunk_index".into(), json!(chunk.chunk_index));
    if let Some(number) = chunk.lesson_number {
        meta.insert("lesson_number".into(), json!(number));
    }
    if let Some(link) = &chunk.lesson_link {
        meta.insert("lesson_link".into(), json!(link));
    }
    Value::Object(meta)
}

fn course_metadata(course: &Course) -> Result<Value, RagError> {
    let lessons = serde_json::to_string(&course.lessons).map_err(RagError::store)?;
    let mut meta = Map::new();
    meta.insert("title".into(), json!(course.title));
    meta.insert("lessons_json".into(), json!(lessons));
    if let Some(link) = &course.link {
        meta.insert("course_link".into(), json!(link));
    }
    if let Some(instructor) = &course.instructor {
        meta.insert("instructor".into(), json!(instructor));
    }
    Ok(Value::Object(meta))
}

fn str_field(meta: &Map<String, Value>, key: &str) -> Option<String> {
    meta.get(key).and_then(Value::as_str).map(str::to_string)
}

fn course_from_metadata(meta: &Map<String, Value>) -> Option<Course> {
    let title = str_field(meta, "title")?;
    let lessons = str_field(meta, "lessons_json")
        .and_then(|raw| serde_json::from_str::<Vec<Lesson>>(&raw).ok())
        .unwrap_or_default();
    Some(Course {
        title,
        link: str_field(meta, "course_link"),
        instructor: str_field(meta, "instructor"),
        lessons,
    })
}

#[async_trait]
impl RagStore for ChromaRagStore {
    fn name(&self) -> &str {
        "chroma"
    }

    async fn upsert(&self, items: Vec<(CourseChunk, Vec<f32>)>) -> Result<(), RagError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut ids = Vec::with_capacity(items.len());
        let mut embeddings = Vec::with_capacity(items.len());
        let mut documents = Vec::with_capacity(items.len());
        let mut metadatas = Vec::with_capacity(items.len());
        for (chunk, embedding) in items {
            ids.push(chunk.key());
            metadatas.push(chunk_metadata(&chunk));
            documents.push(chunk.content);
            embeddings.push(embedding);
        }

        let content = self.collections.read().await.content.clone();
        let body = json!({
            "ids": ids,
            "embeddings": embeddings,
            "documents": documents,
            "metadatas": metadatas,
        });
        self.post(&self.collection_url(&content, "upsert"), &body).await?;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<SearchResult>, RagError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut body = json!({
            "query_embeddings": [query_embedding],
            "n_results": limit,
            "include": ["documents", "metadatas", "distances"],
        });
        if let Some(clause) = where_clause(filter) {
            body["where"] = clause;
        }

        let content = self.collections.read().await.content.clone();
        let res = self.post(&self.collection_url(&content, "query"), &body).await?;
        let payload: QueryResponse = res.json().await.map_err(RagError::store)?;

        let documents = payload.documents.into_iter().next().unwrap_or_default();
        let metadatas = payload.metadatas.into_iter().next().unwrap_or_default();
        let distances = payload.distances.into_iter().next().unwrap_or_default();

        let results = documents
            .into_iter()
            .zip(metadatas)
            .zip(distances)
            .filter_map(|((document, meta), distance)| {
                let meta = meta?;
                Some(SearchResult {
                    content: document?,
                    course_title: str_field(&meta, "course_title")?,
                    lesson_number: meta
                        .get("lesson_number")
                        .and_then(Value::as_u64)
                        .and_then(|n| u32::try_from(n).ok()),
                    lesson_link: str_field(&meta, "lesson_link"),
                    score: 1.0 - distance.unwrap_or(1.0),
                })
            })
            .collect();
        Ok(results)
    }

    async fn upsert_course(
        &self,
        course: &Course,
        title_embedding: Vec<f32>,
    ) -> Result<(), RagError> {
        let catalog = self.collections.read().await.catalog.clone();
        let body = json!({
            "ids": [course.title],
            "embeddings": [title_embedding],
            "documents": [course.title],
            "metadatas": [course_metadata(course)?],
        });
        self.post(&self.collection_url(&catalog, "upsert"), &body).await?;
        Ok(())
    }

    async fn get_course(&self, title: &str) -> Result<Option<Course>, RagError> {
        let metadatas = self
            .get_metadatas(json!({ "ids": [title], "include": ["metadatas"] }))
            .await?;
        Ok(metadatas.iter().find_map(course_from_metadata))
    }

    async fn courses(&self) -> Result<Vec<Course>, RagError> {
        let metadatas = self.get_metadatas(json!({ "include": ["metadatas"] })).await?;
        let mut courses: Vec<Course> = metadatas.iter().filter_map(course_from_metadata).collect();
        courses.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(courses)
    }

    async fn nearest_course(&self, embedding: &[f32]) -> Result<Option<(String, f32)>, RagError> {
        let catalog = self.collections.read().await.catalog.clone();
        let body = json!({
            "query_embeddings": [embedding],
            "n_results": 1,
            "include": ["metadatas", "distances"],
        });
        let res = self.post(&self.collection_url(&catalog, "query"), &body).await?;
        let payload: QueryResponse = res.json().await.map_err(RagError::store)?;

        let meta = payload.metadatas.into_iter().next().and_then(|m| m.into_iter().next());
        let distance = payload.distances.into_iter().next().and_then(|d| d.into_iter().next());
        Ok(meta
            .flatten()
            .and_then(|meta| str_field(&meta, "title"))
            .map(|title| (title, 1.0 - distance.flatten().unwrap_or(1.0))))
    }

    async fn chunk_count(&self) -> Result<usize, RagError> {
        let content = self.collections.read().await.content.clone();
        let res = self
            .client
            .get(self.collection_url(&content, "count"))
            .send()
            .await
            .map_err(RagError::store)?;
        let count: u64 = check_status(res).await?.json().await.map_err(RagError::store)?;
        Ok(count as usize)
    }

    async fn clear(&self) -> Result<(), RagError> {
        let mut ids = self.collections.write().await;
        for name in [CONTENT_COLLECTION, CATALOG_COLLECTION] {
            let res = self
                .client
                .delete(format!("{}/{}", collections_url(&self.base_url), name))
                .send()
                .await
                .map_err(RagError::store)?;
            if res.status() != reqwest::StatusCode::NOT_FOUND {
                check_status(res).await?;
            }
        }
        ids.content = ensure_collection(&self.client, &self.base_url, CONTENT_COLLECTION).await?;
        ids.catalog = ensure_collection(&self.client, &self.base_url, CATALOG_COLLECTION).await?;
        tracing::info!("Cleared ChromaDB collections");
        Ok(())
    }
}
