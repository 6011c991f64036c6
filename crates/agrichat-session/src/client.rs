//! Chat client orchestrating stores, the send coordinator, and the gateway.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use agrichat_core::{
    BackendGateway, ChatError, CredentialProvider, ErrorClass, HistoryLoad, Message, MessageStore,
    Notice, QuickAnswer, Removed, Session, SessionId, SessionStore, SessionUpdate,
};
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::{
    coordinator::{SendCoordinator, SendState, Step},
    view::{ChatView, ViewProjector},
};

/// Default title for sessions created by the client.
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Snapshot channel capacity; slow projectors skip to newer snapshots.
const VIEW_CHANNEL_CAPACITY: usize = 64;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Title requested when a session is created implicitly or via "new chat".
    pub default_title: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_title: DEFAULT_SESSION_TITLE.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct ClientState {
    sessions: SessionStore,
    messages: MessageStore,
    coordinator: SendCoordinator,
    /// History loads in flight.
    loads: usize,
    notice: Option<Notice>,
    login_required: bool,
}

impl ClientState {
    fn view(&self) -> ChatView {
        ChatView {
            sessions: self.sessions.sessions().to_vec(),
            selected: self.sessions.selected(),
            messages: self.messages.messages().to_vec(),
            suggestions: self.coordinator.suggestions().to_vec(),
            composer: self.coordinator.composer().to_string(),
            send_state: self.coordinator.state(),
            sending_to: self.coordinator.pending().map(|p| p.session_id),
            loading: self.loads > 0,
            notice: self.notice.clone(),
            login_required: self.login_required,
        }
    }

    /// Show `id` (or nothing): bind the history and drop stale suggestions.
    fn show(&mut self, id: Option<SessionId>) {
        self.messages.bind(id);
        self.coordinator.clear_suggestions();
    }
}

/// Client for chat sessions against a remote assistant service.
///
/// All operations take `&self`. State lives behind a mutex that is only held
/// for synchronous store updates, never across a network call, so gestures
/// such as selecting or deleting a session may interleave with a send.
pub struct ChatClient<G>
where
    G: BackendGateway,
{
    gateway: G,
    credentials: Arc<dyn CredentialProvider>,
    config: ClientConfig,
    state: Mutex<ClientState>,
    views: broadcast::Sender<ChatView>,
}

impl<G> ChatClient<G>
where
    G: BackendGateway,
{
    /// Create a client.
    #[must_use]
    pub fn new(gateway: G, credentials: Arc<dyn CredentialProvider>, config: ClientConfig) -> Self {
        let (views, _) = broadcast::channel(VIEW_CHANNEL_CAPACITY);
        Self {
            gateway,
            credentials,
            config,
            state: Mutex::new(ClientState::default()),
            views,
        }
    }

    /// The underlying gateway.
    #[must_use]
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate state and publish the resulting snapshot.
    fn update<R>(&self, f: impl FnOnce(&mut ClientState) -> R) -> R {
        let (result, view) = {
            let mut state = self.lock();
            let result = f(&mut state);
            (result, state.view())
        };
        // No receivers is fine.
        let _ = self.views.send(view);
        result
    }

    /// Record a failure. Authentication failures also drop the credential.
    fn fail(&self, err: ChatError) -> ChatError {
        if err.is_auth() {
            self.credentials.invalidate();
        }
        tracing::warn!(class = %err.class(), "chat operation failed: {err}");
        self.update(|s| {
            s.notice = Some(Notice::from(&err));
            if err.is_auth() {
                s.login_required = true;
            }
        });
        err
    }

    // ---- Session list ----

    /// Load all sessions and, if any exist, the history of the first one.
    ///
    /// # Errors
    /// Returns error if the session list or the first history fails to load.
    pub async fn bootstrap(&self) -> Result<(), ChatError> {
        self.refresh_sessions().await?;
        let first = self.lock().sessions.first().map(|s| s.id);
        match first {
            Some(id) => self.select_session(id).await.map(|_| ()),
            None => {
                self.update(|s| s.show(None));
                Ok(())
            }
        }
    }

    /// Replace the session list with the server's.
    ///
    /// # Errors
    /// Returns error if the list cannot be loaded; the local list is kept.
    pub async fn refresh_sessions(&self) -> Result<(), ChatError> {
        self.update(|s| s.loads += 1);
        let result = self.gateway.list_sessions().await;
        let listed = self.update(|s| {
            s.loads -= 1;
            let listed = result?;
            let count = listed.len();
            s.sessions.load(listed);
            if s.sessions.selected().is_none() && s.messages.session_id().is_some() {
                s.show(None);
            }
            Ok(count)
        });

        match listed {
            Ok(count) => {
                tracing::debug!(count, "session list loaded");
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Select a known session and load its history.
    ///
    /// Returns `Ok(false)` without any request when `id` is not in the list.
    ///
    /// # Errors
    /// Returns error if the history fails to load. The selection stays.
    pub async fn select_session(&self, id: SessionId) -> Result<bool, ChatError> {
        let known = self.update(|s| {
            if !s.sessions.select(Some(id)) {
                return false;
            }
            s.show(Some(id));
            true
        });
        if !known {
            tracing::debug!(session_id = id, "ignoring selection of unknown session");
            return Ok(false);
        }
        self.load_history(id).await?;
        Ok(true)
    }

    /// Return to the "no session yet" state. The next submit creates one.
    pub fn clear_selection(&self) {
        self.update(|s| {
            s.sessions.select(None);
            s.show(None);
        });
    }

    async fn load_history(&self, id: SessionId) -> Result<(), ChatError> {
        let generation = self.update(|s| {
            s.loads += 1;
            s.messages.generation()
        });
        let result = self.gateway.load_messages(id).await;
        let applied = self.update(|s| {
            s.loads -= 1;
            let history = result?;
            let count = history.messages.len();
            let outcome = s.messages.load_for(id, generation, history.messages);
            // A merged history predates a reply whose session is newer.
            if outcome == HistoryLoad::Replaced {
                s.sessions.upsert(history.session);
            }
            Ok((outcome, count))
        });

        match applied {
            Ok((outcome, count)) => {
                tracing::debug!(session_id = id, count, ?outcome, "history response");
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Create an empty session, put it first, and select it.
    ///
    /// # Errors
    /// Returns error if creation fails; nothing is registered locally.
    pub async fn new_chat(&self) -> Result<Session, ChatError> {
        let session = self
            .gateway
            .create_session(&self.config.default_title)
            .await
            .map_err(|e| self.fail(e))?;

        let id = session.id;
        self.update(|s| {
            s.sessions.upsert(session.clone());
            s.sessions.select(Some(id));
            s.messages.bind_empty(id);
            s.coordinator.clear_suggestions();
        });
        tracing::info!(session_id = id, "chat session created");
        Ok(session)
    }

    /// Delete a session on the server, then locally.
    ///
    /// Deleting the selected session selects the first remaining one and loads
    /// its history; deleting the last one clears the selection and history.
    ///
    /// # Errors
    /// Returns error if the server refuses; the local list is unchanged.
    pub async fn delete_session(&self, id: SessionId) -> Result<(), ChatError> {
        self.gateway
            .delete_session(id)
            .await
            .map_err(|e| self.fail(e))?;

        let removed = self.update(|s| {
            let removed = s.sessions.remove(id);
            if let Some(Removed {
                was_selected: true,
                successor,
                ..
            }) = &removed
            {
                s.show(*successor);
            }
            removed
        });
        tracing::info!(session_id = id, "chat session deleted");

        match removed {
            Some(Removed {
                was_selected: true,
                successor: Some(next),
                ..
            }) => self.load_history(next).await,
            _ => Ok(()),
        }
    }

    /// Rename a session.
    ///
    /// # Errors
    /// Returns error if the server rejects the update.
    pub async fn rename_session(&self, id: SessionId, title: &str) -> Result<Session, ChatError> {
        let update = SessionUpdate {
            title: Some(title.trim().to_string()),
            is_active: None,
        };
        self.apply_update(id, &update).await
    }

    /// Mark a session active or archived.
    ///
    /// # Errors
    /// Returns error if the server rejects the update.
    pub async fn set_session_active(
        &self,
        id: SessionId,
        is_active: bool,
    ) -> Result<Session, ChatError> {
        let update = SessionUpdate {
            title: None,
            is_active: Some(is_active),
        };
        self.apply_update(id, &update).await
    }

    async fn apply_update(
        &self,
        id: SessionId,
        update: &SessionUpdate,
    ) -> Result<Session, ChatError> {
        let session = self
            .gateway
            .update_session(id, update)
            .await
            .map_err(|e| self.fail(e))?;
        self.update(|s| s.sessions.upsert(session.clone()));
        Ok(session)
    }

    // ---- Composer and sending ----

    /// Replace the composer text.
    pub fn set_composer(&self, text: impl Into<String>) {
        let text = text.into();
        self.update(|s| s.coordinator.set_composer(text));
    }

    /// Copy the suggestion at `index` into the composer.
    pub fn use_suggestion(&self, index: usize) -> bool {
        self.update(|s| s.coordinator.use_suggestion(index))
    }

    /// Submit the composer text.
    ///
    /// Creates a session first when none is selected. Returns `Ok(None)` for
    /// a no-op (blank text, or a submission already in progress).
    ///
    /// # Errors
    /// Returns error if session creation or the send fails; the text is back
    /// in the composer and no message was recorded.
    pub async fn submit(&self) -> Result<Option<Message>, ChatError> {
        let title = self.config.default_title.as_str();
        let Some(step) = self.update(|s| {
            let selected = s.sessions.selected();
            s.coordinator.begin(selected, title)
        }) else {
            return Ok(None);
        };

        let pending = match step {
            Step::Send(pending) => pending,
            Step::CreateSession { title } => {
                match self.gateway.create_session(&title).await {
                    Ok(session) => {
                        let id = session.id;
                        let pending = self.update(|s| {
                            let ClientState {
                                sessions,
                                messages,
                                coordinator,
                                ..
                            } = s;
                            coordinator.session_ready(session, sessions, messages)
                        });
                        tracing::info!(session_id = id, "chat session created for submission");
                        match pending {
                            Some(pending) => pending,
                            None => return Ok(None),
                        }
                    }
                    Err(e) => {
                        self.update(|s| s.coordinator.session_failed());
                        return Err(self.fail(e));
                    }
                }
            }
        };

        tracing::debug!(
            submission = %pending.id,
            session_id = pending.session_id,
            "sending message"
        );
        match self
            .gateway
            .send_message(pending.session_id, &pending.text)
            .await
        {
            Ok(receipt) => {
                let reconciled = self.update(|s| {
                    let ClientState {
                        sessions,
                        messages,
                        coordinator,
                        notice,
                        ..
                    } = s;
                    let reconciled = coordinator.reconcile(&pending, receipt, sessions, messages);
                    if reconciled.is_some() {
                        *notice = None;
                    }
                    reconciled
                });
                Ok(reconciled.map(|r| r.message))
            }
            Err(e) => {
                self.update(|s| s.coordinator.send_failed(&pending));
                Err(self.fail(e))
            }
        }
    }

    /// Ask a one-off question outside any session.
    ///
    /// Replaces the suggestion list; the session and message stores are not
    /// touched. Returns `Ok(None)` for blank text.
    ///
    /// # Errors
    /// Returns error if the backend call fails.
    pub async fn quick_ask(&self, text: &str) -> Result<Option<QuickAnswer>, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let answer = self
            .gateway
            .quick_ask(text)
            .await
            .map_err(|e| self.fail(e))?;
        self.update(|s| s.coordinator.replace_suggestions(answer.suggestions.clone()));
        Ok(Some(answer))
    }

    // ---- Notices and credentials ----

    /// Clear the current notice.
    pub fn dismiss_notice(&self) {
        self.update(|s| s.notice = None);
    }

    /// The user logged in again; clear the login prompt.
    pub fn login_completed(&self) {
        self.update(|s| {
            s.login_required = false;
            if s.notice.as_ref().is_some_and(|n| n.class == ErrorClass::Auth) {
                s.notice = None;
            }
        });
    }

    // ---- Projection ----

    /// Current snapshot.
    #[must_use]
    pub fn view(&self) -> ChatView {
        self.lock().view()
    }

    /// Current submission state.
    #[must_use]
    pub fn send_state(&self) -> SendState {
        self.lock().coordinator.state()
    }

    /// Receiver for snapshots published after every change.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChatView> {
        self.views.subscribe()
    }

    /// Stream that yields the current snapshot, then every later one.
    #[must_use]
    pub fn view_stream(&self) -> futures::stream::BoxStream<'static, ChatView> {
        let (current, rx) = (self.view(), self.subscribe());

        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });
        futures::stream::iter([current]).chain(live).boxed()
    }

    /// Forward snapshots into `projector` until the client is dropped.
    pub fn spawn_projector<P>(&self, projector: P) -> tokio::task::JoinHandle<()>
    where
        P: ViewProjector + 'static,
    {
        let stream = self.view_stream();
        tokio::spawn(async move {
            tokio::pin!(stream);

            while let Some(view) = stream.next().await {
                projector.project(&view);
            }
        })
    }
}
