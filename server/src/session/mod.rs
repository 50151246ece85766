//! Editing sessions.
//!
//! A session is one quiz open in the admin panel: its workspace, the save
//! scheduler driving autosave, and the status reporter observers subscribe
//! to. Every mutation goes through [`Session::mutate`], which triggers a save
//! once the workspace lock is released.

mod registry;

pub use registry::SessionRegistry;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use quizdraft_engine::{
    CollectionName, CollectionSchema, EntityTree, Identity, Record, RecordId, Schema,
    StatusReport, Workspace,
};
use serde_json::Value;
use tokio::sync::watch;

use crate::autosave::{CycleSummary, Executor, SaveScheduler, StatusReporter};
use crate::config::AutosaveConfig;
use crate::lock;
use crate::remote::{Filter, RemoteError, RemoteStore};

/// Errors from session lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Engine(#[from] quizdraft_engine::Error),

    #[error("Quiz not found: {0}")]
    QuizNotFound(String),

    #[error("Quiz already published: {0}")]
    AlreadyPublished(RecordId),
}

/// One quiz being edited.
pub struct Session {
    id: String,
    workspace: Arc<Mutex<Workspace>>,
    reporter: Arc<StatusReporter>,
    scheduler: SaveScheduler,
    store: Arc<dyn RemoteStore>,
    publishing: tokio::sync::Mutex<()>,
}

impl Session {
    /// Open an existing quiz: fetch the root document and every collection,
    /// then start autosave.
    pub async fn open(
        store: Arc<dyn RemoteStore>,
        schema: Schema,
        quiz_id: &str,
        autosave: AutosaveConfig,
    ) -> Result<Self, SessionError> {
        let (root, records) = fetch_document(store.as_ref(), &schema, quiz_id).await?;
        let workspace = Workspace::load(schema, root, records)?;

        let session = Self::start(store, workspace, autosave, true);
        tracing::info!(
            session = %session.id,
            quiz = %quiz_id,
            entities = lock(&session.workspace).tree().len(),
            "Session opened"
        );
        Ok(session)
    }

    /// Start a quiz that does not exist remotely yet. Autosave stays off
    /// until [`publish`](Self::publish).
    pub fn draft(
        store: Arc<dyn RemoteStore>,
        schema: Schema,
        fields: Value,
        autosave: AutosaveConfig,
    ) -> Result<Self, SessionError> {
        let workspace = Workspace::draft(schema, fields)?;
        let session = Self::start(store, workspace, autosave, false);
        tracing::info!(session = %session.id, "Draft session opened");
        Ok(session)
    }

    fn start(
        store: Arc<dyn RemoteStore>,
        workspace: Workspace,
        autosave: AutosaveConfig,
        enabled: bool,
    ) -> Self {
        let workspace = Arc::new(Mutex::new(workspace));
        let reporter = Arc::new(StatusReporter::new(workspace.clone()));
        let scheduler = SaveScheduler::spawn(
            Executor::new(store.clone()),
            workspace.clone(),
            reporter.clone(),
            autosave,
            enabled,
        );

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workspace,
            reporter,
            scheduler,
            store,
            publishing: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Remote id of the quiz, once published.
    pub fn quiz_id(&self) -> Option<RecordId> {
        lock(&self.workspace).root_id().cloned()
    }

    /// A copy of the current tree.
    pub fn tree(&self) -> EntityTree {
        lock(&self.workspace).tree().clone()
    }

    pub fn status(&self) -> StatusReport {
        self.reporter.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusReport> {
        self.reporter.subscribe()
    }

    /// Apply an edit and schedule a save.
    pub fn mutate<T, F>(&self, apply: F) -> Result<T, quizdraft_engine::Error>
    where
        F: FnOnce(&mut Workspace) -> Result<T, quizdraft_engine::Error>,
    {
        let value = {
            let mut ws = lock(&self.workspace);
            apply(&mut *ws)?
        };
        self.scheduler.trigger_save();
        self.reporter.refresh();
        Ok(value)
    }

    pub fn set_root_fields(&self, fields: Value) -> Result<(), quizdraft_engine::Error> {
        self.mutate(|ws| ws.set_root_fields(fields))
    }

    pub fn insert(
        &self,
        collection: &str,
        parent: Option<Identity>,
        content: Value,
    ) -> Result<Identity, quizdraft_engine::Error> {
        self.mutate(|ws| ws.insert(collection, parent, content))
    }

    /// Replace content, move under another parent, or both.
    pub fn update(
        &self,
        collection: &str,
        id: &Identity,
        content: Option<Value>,
        parent: Option<Identity>,
    ) -> Result<(), quizdraft_engine::Error> {
        self.mutate(|ws| {
            if let Some(parent) = parent {
                ws.reparent(collection, id, parent)?;
            }
            match content {
                Some(content) => ws.update(collection, id, content),
                None => Ok(()),
            }
        })
    }

    /// Remove an entity and its children.
    pub fn remove(&self, collection: &str, id: &Identity) -> Result<usize, quizdraft_engine::Error> {
        self.mutate(|ws| ws.remove(collection, id))
    }

    /// Save right away. `None` while autosave is off or after close.
    pub async fn save_now(&self) -> Option<CycleSummary> {
        self.scheduler.save_now().await
    }

    /// Create the quiz remotely, then turn autosave on and save everything
    /// edited so far.
    pub async fn publish(&self) -> Result<RecordId, SessionError> {
        let _guard = self.publishing.lock().await;

        let (collection, fields) = {
            let ws = lock(&self.workspace);
            if let Some(id) = ws.root_id() {
                return Err(SessionError::AlreadyPublished(id.clone()));
            }
            (ws.schema().root.name.clone(), ws.tree().root().fields.clone())
        };

        let record = self.store.insert(&collection, &fields).await?;
        lock(&self.workspace).root_created(record.id.clone(), fields);
        tracing::info!(session = %self.id, quiz = %record.id, "Quiz published");

        self.scheduler.enable();
        self.scheduler.trigger_save();
        self.reporter.refresh();
        Ok(record.id)
    }

    /// Stop autosave. A cycle already running still completes.
    pub fn close(&self) {
        self.scheduler.shutdown();
        tracing::info!(session = %self.id, "Session closed");
    }
}

/// Fetch a quiz: the root document, top-level collections by quiz id, then
/// child collections by the ids of their parents.
async fn fetch_document(
    store: &dyn RemoteStore,
    schema: &Schema,
    quiz_id: &str,
) -> Result<(Record, BTreeMap<CollectionName, Vec<Record>>), SessionError> {
    let root = store
        .fetch_one(&schema.root.name, quiz_id)
        .await?
        .ok_or_else(|| SessionError::QuizNotFound(quiz_id.to_string()))?;

    let (top, nested): (Vec<&CollectionSchema>, Vec<&CollectionSchema>) = schema
        .collections
        .values()
        .partition(|c| c.parent.is_none());

    let mut records = BTreeMap::new();

    let filter = Filter::eq(&schema.root_field, quiz_id);
    let fetched = join_all(top.iter().map(|c| store.fetch_all(&c.name, &filter))).await;
    for (collection, result) in top.iter().zip(fetched) {
        records.insert(collection.name.clone(), result?);
    }

    let filters: Vec<(&CollectionName, Filter)> = nested
        .iter()
        .filter_map(|c| {
            let link = c.parent.as_ref()?;
            let parents = records.get(&link.collection)?;
            if parents.is_empty() {
                return None;
            }
            let ids = parents.iter().map(|r| r.id.clone());
            Some((&c.name, Filter::any_of(link.field.clone(), ids)))
        })
        .collect();
    let fetched = join_all(
        filters
            .iter()
            .map(|(name, filter)| store.fetch_all(name.as_str(), filter)),
    )
    .await;
    for ((name, _), result) in filters.iter().zip(fetched) {
        records.insert((*name).clone(), result?);
    }

    Ok((root, records))
}
