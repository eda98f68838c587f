use std::fmt;
use std::sync::Arc;

use geminis_llm::{BackendError, BackendResult, ChatBackend, ChatSession, Reply};

use crate::transcript::{Role, Transcript, Turn, TurnId};

/// Fixed user-facing text appended when a turn fails.
pub const DEFAULT_FALLBACK_REPLY: &str = "Sorry, something went wrong. Please try again.";

/// Request lifecycle of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    /// A backend call for `user_turn` is outstanding.
    AwaitingResponse { user_turn: TurnId },
}

impl SessionPhase {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::AwaitingResponse { .. })
    }
}

/// Why a submission was ignored. Informational only; nothing was mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmitRejected {
    EmptyInput,
    AwaitingResponse,
}

/// An accepted submission whose backend call has not run yet.
///
/// Owns the session handle for the duration of the call, so the future returned by
/// [`InFlight::resolve`] is `Send + 'static` and can run on any executor.
pub struct InFlight {
    user_turn: TurnId,
    message: String,
    session: BackendResult<Box<dyn ChatSession>>,
}

impl InFlight {
    pub fn user_turn(&self) -> TurnId {
        self.user_turn
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Performs the single backend round trip. Never fails; errors are carried in the
    /// returned [`Settled`].
    pub async fn resolve(self) -> Settled {
        let Self {
            user_turn,
            message,
            session,
        } = self;

        match session {
            Ok(mut session) => {
                let outcome = session.send(&message).await;
                Settled {
                    user_turn,
                    session: Some(session),
                    outcome,
                }
            }
            Err(error) => Settled {
                user_turn,
                session: None,
                outcome: Err(error),
            },
        }
    }
}

impl fmt::Debug for InFlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlight")
            .field("user_turn", &self.user_turn)
            .field("message", &self.message)
            .field("session_ready", &self.session.is_ok())
            .finish()
    }
}

/// Outcome of one backend round trip, ready to be folded back into the transcript.
pub struct Settled {
    user_turn: TurnId,
    session: Option<Box<dyn ChatSession>>,
    outcome: BackendResult<Reply>,
}

impl Settled {
    /// Builds a failed outcome for a request whose task never reported back.
    ///
    /// The session handle went down with the task, so the next submission opens a new one.
    pub fn interrupted(user_turn: TurnId, details: impl Into<String>) -> Self {
        Self {
            user_turn,
            session: None,
            outcome: Err(BackendError::Interrupted {
                stage: "await-backend-task",
                details: details.into(),
            }),
        }
    }
}

impl fmt::Debug for Settled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settled")
            .field("user_turn", &self.user_turn)
            .field("session_returned", &self.session.is_some())
            .field("outcome", &self.outcome)
            .finish()
    }
}

/// Owns the transcript, the pending phase and the backend session.
///
/// `submit` and `settle` bracket every backend call: `submit` appends the user turn and
/// hands out an [`InFlight`], `settle` appends the reply (or the fallback) and returns to
/// idle. Exactly one request can be outstanding.
pub struct SessionController {
    backend: Arc<dyn ChatBackend>,
    model_id: String,
    fallback_reply: String,
    transcript: Transcript,
    phase: SessionPhase,
    session: Option<Box<dyn ChatSession>>,
    draft: String,
}

impl SessionController {
    pub fn new(backend: Arc<dyn ChatBackend>, model_id: impl Into<String>) -> Self {
        Self {
            backend,
            model_id: model_id.into(),
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            transcript: Transcript::new(),
            phase: SessionPhase::Idle,
            session: None,
            draft: String::new(),
        }
    }

    pub fn with_fallback_reply(mut self, fallback_reply: impl Into<String>) -> Self {
        self.fallback_reply = fallback_reply.into();
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_pending(&self) -> bool {
        self.phase.is_pending()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// True once a backend session was opened and is currently held by the controller.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Replaces the draft, e.g. when a suggestion is picked.
    pub fn prefill(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Mirrors keystrokes into the draft. No other effect.
    pub fn update_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Submits the current draft.
    pub fn submit_draft(&mut self) -> Result<InFlight, SubmitRejected> {
        let text = self.draft.clone();
        self.submit(&text)
    }

    /// Starts a turn.
    ///
    /// Appends the user turn, enters [`SessionPhase::AwaitingResponse`], clears the draft
    /// and opens the backend session on first use. Blank input or an outstanding request
    /// leaves every piece of state untouched.
    pub fn submit(&mut self, text: &str) -> Result<InFlight, SubmitRejected> {
        if text.trim().is_empty() {
            tracing::debug!("ignoring blank submission");
            return Err(SubmitRejected::EmptyInput);
        }

        if let SessionPhase::AwaitingResponse { user_turn } = self.phase {
            tracing::debug!(
                pending_turn = ?user_turn,
                "ignoring submission while a response is pending"
            );
            return Err(SubmitRejected::AwaitingResponse);
        }

        let user_turn = self.transcript.append(Role::User, text);
        self.phase = SessionPhase::AwaitingResponse { user_turn };
        self.draft.clear();

        let session = match self.session.take() {
            Some(session) => Ok(session),
            None => self.open_session(),
        };

        Ok(InFlight {
            user_turn,
            message: text.to_string(),
            session,
        })
    }

    /// Folds a finished round trip back into the transcript.
    ///
    /// Appends the reply, or the fallback text on failure, then returns to idle. Returns the
    /// appended turn, or `None` when `settled` does not belong to the outstanding request.
    pub fn settle(&mut self, settled: Settled) -> Option<&Turn> {
        let SessionPhase::AwaitingResponse { user_turn } = self.phase else {
            tracing::warn!(
                settled_turn = ?settled.user_turn,
                "dropping settled response while no request is pending"
            );
            return None;
        };

        if settled.user_turn != user_turn {
            tracing::warn!(
                pending_turn = ?user_turn,
                settled_turn = ?settled.user_turn,
                "dropping settled response for a different request"
            );
            return None;
        }

        let Settled {
            session, outcome, ..
        } = settled;

        if session.is_some() {
            self.session = session;
        }

        let content = match outcome {
            Ok(reply) => reply.text,
            Err(error) => {
                tracing::error!(
                    backend_id = %self.backend.id(),
                    model_id = %self.model_id,
                    stage = error.stage(),
                    error = %error,
                    "backend call failed; appending fallback reply"
                );
                self.fallback_reply.clone()
            }
        };

        self.transcript.append(Role::Assistant, content);
        // Idle only after the reply is in the transcript.
        self.phase = SessionPhase::Idle;
        self.transcript.last()
    }

    /// Runs a whole turn in the current control flow: submit, await the backend, settle.
    pub async fn converse(&mut self, text: &str) -> Option<&Turn> {
        let in_flight = self.submit(text).ok()?;
        let settled = in_flight.resolve().await;
        self.settle(settled)
    }

    fn open_session(&self) -> BackendResult<Box<dyn ChatSession>> {
        let session = self.backend.create_session(&self.model_id)?;
        tracing::info!(
            backend_id = %self.backend.id(),
            backend = self.backend.name(),
            model_id = %self.model_id,
            "opened backend session"
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use geminis_llm::{BoxFuture, UnconfiguredBackend};

    use super::*;

    #[derive(Debug, Clone)]
    enum Script {
        Reply(&'static str),
        Fail(&'static str),
    }

    #[derive(Default)]
    struct Counters {
        sessions_created: AtomicUsize,
        create_failures_left: AtomicUsize,
        sends: AtomicUsize,
        model_ids: Mutex<Vec<String>>,
    }

    struct ScriptedBackend {
        counters: Arc<Counters>,
        script: Arc<Mutex<VecDeque<Script>>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Script>) -> (Arc<Self>, Arc<Counters>) {
            let counters = Arc::new(Counters::default());
            let backend = Arc::new(Self {
                counters: counters.clone(),
                script: Arc::new(Mutex::new(VecDeque::from(script))),
            });
            (backend, counters)
        }
    }

    impl ChatBackend for ScriptedBackend {
        fn id(&self) -> &str {
            "scripted"
        }

        fn name(&self) -> &str {
            "Scripted"
        }

        fn create_session(&self, model_id: &str) -> BackendResult<Box<dyn ChatSession>> {
            self.counters
                .model_ids
                .lock()
                .unwrap()
                .push(model_id.to_string());

            let failures_left = self.counters.create_failures_left.load(Ordering::SeqCst);
            if failures_left > 0 {
                self.counters
                    .create_failures_left
                    .store(failures_left - 1, Ordering::SeqCst);
                return Err(BackendError::MissingApiKey {
                    stage: "scripted-create",
                    provider_id: "scripted".to_string(),
                });
            }

            self.counters.sessions_created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedSession {
                counters: self.counters.clone(),
                script: self.script.clone(),
                seen: Vec::new(),
            }))
        }
    }

    struct ScriptedSession {
        counters: Arc<Counters>,
        script: Arc<Mutex<VecDeque<Script>>>,
        seen: Vec<String>,
    }

    impl ChatSession for ScriptedSession {
        fn send<'a>(&'a mut self, message: &'a str) -> BoxFuture<'a, BackendResult<Reply>> {
            self.counters.sends.fetch_add(1, Ordering::SeqCst);
            self.seen.push(message.to_string());
            let next = self.script.lock().unwrap().pop_front();
            let remembered = self.seen.len();

            Box::pin(async move {
                match next {
                    Some(Script::Reply(text)) => Ok(Reply::new(text)),
                    Some(Script::Fail(details)) => Err(BackendError::Interrupted {
                        stage: "scripted-send",
                        details: details.to_string(),
                    }),
                    None => Ok(Reply::new(format!("remembered {remembered}"))),
                }
            })
        }
    }

    fn controller(backend: Arc<ScriptedBackend>) -> SessionController {
        SessionController::new(backend, "gemini-2.5-flash")
    }

    fn roles_and_contents(controller: &SessionController) -> Vec<(Role, String)> {
        controller
            .transcript()
            .iter()
            .map(|turn| (turn.role(), turn.content().to_string()))
            .collect()
    }

    #[tokio::test]
    async fn successful_turn_appends_user_and_assistant() {
        let (backend, counters) = ScriptedBackend::new(vec![Script::Reply("Hi there")]);
        let mut controller = controller(backend);

        let reply = controller.converse("Hello").await.map(Turn::content);
        assert_eq!(reply, Some("Hi there"));
        assert_eq!(
            roles_and_contents(&controller),
            vec![
                (Role::User, "Hello".to_string()),
                (Role::Assistant, "Hi there".to_string()),
            ]
        );
        assert!(!controller.is_pending());
        assert_eq!(counters.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_input_is_a_no_op() {
        let (backend, counters) = ScriptedBackend::new(Vec::new());
        let mut controller = controller(backend);

        let result = controller.submit("  \n\t");
        assert!(matches!(result, Err(SubmitRejected::EmptyInput)));
        assert!(controller.transcript().is_empty());
        assert!(!controller.is_pending());
        assert!(controller.converse("").await.is_none());
        assert_eq!(counters.sessions_created.load(Ordering::SeqCst), 0);
        assert_eq!(counters.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_while_pending_is_rejected_without_backend_call() {
        let (backend, counters) = ScriptedBackend::new(vec![Script::Reply("first")]);
        let mut controller = controller(backend);

        let in_flight = controller.submit("Hello").expect("first submit is accepted");
        assert!(controller.is_pending());
        assert_eq!(controller.transcript().len(), 1);

        let second = controller.submit("Hi");
        assert!(matches!(second, Err(SubmitRejected::AwaitingResponse)));
        assert_eq!(controller.transcript().len(), 1);
        assert_eq!(counters.sessions_created.load(Ordering::SeqCst), 1);

        let settled = in_flight.resolve().await;
        assert_eq!(counters.sends.load(Ordering::SeqCst), 1);
        controller.settle(settled);
        assert_eq!(controller.transcript().len(), 2);
        assert!(!controller.is_pending());
    }

    #[tokio::test]
    async fn pending_clears_only_after_reply_is_appended() {
        let (backend, _counters) = ScriptedBackend::new(vec![Script::Reply("done")]);
        let mut controller = controller(backend);

        let in_flight = controller.submit("work").unwrap();
        let user_turn = in_flight.user_turn();
        assert_eq!(
            controller.phase(),
            SessionPhase::AwaitingResponse { user_turn }
        );
        assert_eq!(controller.transcript().last().map(Turn::role), Some(Role::User));

        let settled = in_flight.resolve().await;
        // Resolving alone never touches controller state.
        assert!(controller.is_pending());
        assert_eq!(controller.transcript().len(), 1);

        let appended = controller.settle(settled).map(Turn::id);
        assert_eq!(appended, controller.transcript().last().map(Turn::id));
        assert_eq!(controller.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn send_failure_appends_fallback_and_keeps_session() {
        let (backend, counters) = ScriptedBackend::new(vec![
            Script::Fail("network unreachable"),
            Script::Reply("back online"),
        ]);
        let mut controller = controller(backend);

        let reply = controller.converse("Hello").await.map(|turn| turn.content().to_string());
        assert_eq!(reply.as_deref(), Some(DEFAULT_FALLBACK_REPLY));
        assert!(!controller.is_pending());
        assert!(controller.has_session());

        let reply = controller.converse("Again").await.map(|turn| turn.content().to_string());
        assert_eq!(reply.as_deref(), Some("back online"));
        assert_eq!(counters.sessions_created.load(Ordering::SeqCst), 1);
        assert_eq!(controller.transcript().len(), 4);
    }

    #[tokio::test]
    async fn session_is_created_once_across_turns() {
        let (backend, counters) = ScriptedBackend::new(Vec::new());
        let mut controller = controller(backend);

        controller.converse("one").await;
        controller.converse("two").await;
        let reply = controller.converse("three").await.map(|turn| turn.content().to_string());

        // The scripted session counts the messages it has seen, proving one shared context.
        assert_eq!(reply.as_deref(), Some("remembered 3"));
        assert_eq!(counters.sessions_created.load(Ordering::SeqCst), 1);
        assert_eq!(
            *counters.model_ids.lock().unwrap(),
            vec![controller.model_id().to_string()]
        );
        assert_eq!(controller.model_id(), "gemini-2.5-flash");
    }

    #[tokio::test]
    async fn failed_session_creation_is_retried_on_next_submit() {
        let (backend, counters) = ScriptedBackend::new(vec![Script::Reply("hello again")]);
        counters.create_failures_left.store(1, Ordering::SeqCst);
        let mut controller = controller(backend).with_fallback_reply("try later");

        let reply = controller.converse("Hello").await.map(|turn| turn.content().to_string());
        assert_eq!(reply.as_deref(), Some("try later"));
        assert!(!controller.has_session());
        assert_eq!(counters.sends.load(Ordering::SeqCst), 0);

        let reply = controller.converse("Hello").await.map(|turn| turn.content().to_string());
        assert_eq!(reply.as_deref(), Some("hello again"));
        assert_eq!(counters.sessions_created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unconfigured_backend_yields_fallback_every_turn() {
        let backend = Arc::new(UnconfiguredBackend::new("gemini", "missing API key"));
        let mut controller = SessionController::new(backend, "gemini-2.5-flash");

        for _ in 0..2 {
            let reply = controller.converse("Hi").await.map(|turn| turn.content().to_string());
            assert_eq!(reply.as_deref(), Some(DEFAULT_FALLBACK_REPLY));
        }
        assert_eq!(controller.transcript().len(), 4);
        assert!(!controller.is_pending());
    }

    #[tokio::test]
    async fn prefilled_draft_is_submitted_and_cleared_on_start() {
        let (backend, _counters) = ScriptedBackend::new(vec![Script::Reply("Drops on the glass")]);
        let mut controller = controller(backend);

        controller.prefill("Write a poem");
        controller.prefill("Write a poem");
        assert_eq!(controller.draft(), "Write a poem");

        let in_flight = controller.submit_draft().unwrap();
        assert_eq!(in_flight.message(), "Write a poem");
        assert_eq!(controller.draft(), "");

        // Typing while pending edits the draft without touching the transcript.
        controller.update_draft("next question");
        assert_eq!(controller.transcript().len(), 1);

        controller.settle(in_flight.resolve().await);
        assert_eq!(controller.draft(), "next question");
        assert_eq!(
            controller.transcript().turns()[0].content(),
            "Write a poem"
        );
    }

    #[tokio::test]
    async fn rejected_draft_submission_keeps_draft() {
        let (backend, _counters) = ScriptedBackend::new(Vec::new());
        let mut controller = controller(backend);

        let _in_flight = controller.submit("busy").unwrap();
        controller.update_draft("queued?");
        assert!(matches!(
            controller.submit_draft(),
            Err(SubmitRejected::AwaitingResponse)
        ));
        assert_eq!(controller.draft(), "queued?");
    }

    #[tokio::test]
    async fn interrupted_request_recovers_and_reopens_session() {
        let (backend, counters) = ScriptedBackend::new(vec![Script::Reply("fresh")]);
        let mut controller = controller(backend);

        let in_flight = controller.submit("lost").unwrap();
        let user_turn = in_flight.user_turn();
        drop(in_flight);

        let appended = controller
            .settle(Settled::interrupted(user_turn, "task panicked"))
            .map(|turn| turn.content().to_string());
        assert_eq!(appended.as_deref(), Some(DEFAULT_FALLBACK_REPLY));
        assert!(!controller.is_pending());
        assert!(!controller.has_session());

        controller.converse("again").await;
        assert_eq!(counters.sessions_created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stale_settlement_is_ignored() {
        let (backend, _counters) = ScriptedBackend::new(Vec::new());
        let mut controller = controller(backend);

        assert!(
            controller
                .settle(Settled::interrupted(TurnId::new(7), "late"))
                .is_none()
        );
        assert!(controller.transcript().is_empty());

        let in_flight = controller.submit("current").unwrap();
        assert!(
            controller
                .settle(Settled::interrupted(TurnId::new(99), "other request"))
                .is_none()
        );
        assert!(controller.is_pending());
        controller.settle(in_flight.resolve().await);
        assert_eq!(controller.transcript().len(), 2);
    }

    #[tokio::test]
    async fn empty_reply_is_kept_as_an_empty_turn() {
        let (backend, _counters) = ScriptedBackend::new(vec![Script::Reply("   ")]);
        let mut controller = controller(backend);

        let reply = controller.converse("say nothing").await.map(|turn| turn.content().to_string());
        assert_eq!(reply.as_deref(), Some("   "));
    }

    #[tokio::test]
    async fn transcript_is_append_only_and_paired() {
        let (backend, _counters) = ScriptedBackend::new(vec![
            Script::Reply("a"),
            Script::Fail("quota"),
            Script::Reply("c"),
        ]);
        let mut controller = controller(backend);
        let mut snapshots: Vec<Vec<Turn>> = Vec::new();

        for text in ["first", " ", "second", "third"] {
            let before = controller.transcript().len();
            let accepted = controller.converse(text).await.is_some();
            let after = controller.transcript().len();
            assert_eq!(after - before, if accepted { 2 } else { 0 });
            snapshots.push(controller.transcript().turns().to_vec());
        }

        for pair in snapshots.windows(2) {
            assert!(pair[1].starts_with(&pair[0]));
        }

        for pair in controller.transcript().turns().chunks(2) {
            assert_eq!(pair[0].role(), Role::User);
            assert_eq!(pair[1].role(), Role::Assistant);
        }
    }
}
