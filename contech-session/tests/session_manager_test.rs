//! SessionManager behaviour against a scripted identity service

use contech_core::{
    async_trait, storage_error, ContechResult, ProfileUpdate, Role, SessionState, SignUpMetadata,
    UserProfile, UserRecord,
};
use contech_identity::{
    Credentials, FileTokenStore, IdentityClient, IdentityError, IdentityResult, LoginResponse,
    MemoryTokenStore, RegisterRequest, RegisterResponse, TokenStore,
};
use contech_session::{post_auth_route, RouteDecision, SessionError, SessionManager};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

fn user(id: u64, email: &str, role: Role) -> UserRecord {
    UserRecord {
        id,
        email: email.to_string(),
        username: email.split('@').next().unwrap_or_default().to_string(),
        first_name: String::new(),
        last_name: String::new(),
        profile: UserProfile {
            role,
            phone_number: None,
            avatar: None,
        },
    }
}

struct MockIdentity {
    /// email -> (password, token)
    accounts: Mutex<HashMap<String, (String, String)>>,
    /// token -> user
    users: Mutex<HashMap<String, UserRecord>>,
    /// tokens whose fetch waits for a notification
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    /// held by profile updates until notified
    update_gate: Mutex<Option<Arc<Notify>>>,
    fetch_error: Mutex<Option<IdentityError>>,
    panic_on_fetch: AtomicBool,
    panic_on_login: AtomicBool,
    next_id: AtomicU64,
    fetch_calls: AtomicUsize,
    login_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl MockIdentity {
    fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            users: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            update_gate: Mutex::new(None),
            fetch_error: Mutex::new(None),
            panic_on_fetch: AtomicBool::new(false),
            panic_on_login: AtomicBool::new(false),
            next_id: AtomicU64::new(7),
            fetch_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
        }
    }

    fn with_account(self, email: &str, password: &str, token: &str, record: UserRecord) -> Self {
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), token.to_string()));
        self.users.lock().unwrap().insert(token.to_string(), record);
        self
    }

    fn gate(&self, token: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(token.to_string(), notify.clone());
        notify
    }

    fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityClient for MockIdentity {
    async fn register(&self, request: &RegisterRequest) -> IdentityResult<RegisterResponse> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&request.email) {
            return Err(IdentityError::rejected(
                Some(400),
                "email: user with this email already exists.",
            ));
        }
        let role = request.role.unwrap_or(Role::Builder);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let token = format!("tok{}", accounts.len() + 1);

        accounts.insert(
            request.email.clone(),
            (request.password.clone(), token.clone()),
        );
        self.users
            .lock()
            .unwrap()
            .insert(token.clone(), user(id, &request.email, role));

        Ok(RegisterResponse {
            token,
            user_id: id,
            email: request.email.clone(),
            role: Some(role),
        })
    }

    async fn login(&self, credentials: &Credentials) -> IdentityResult<LoginResponse> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_login.load(Ordering::SeqCst) {
            panic!("login exploded");
        }
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(&credentials.email) {
            Some((password, token)) if *password == credentials.password => Ok(LoginResponse {
                token: token.clone(),
            }),
            _ => Err(IdentityError::rejected(Some(400), "Invalid credentials")),
        }
    }

    async fn fetch_current_user(&self, token: &str) -> IdentityResult<UserRecord> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.lock().unwrap().get(token).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.panic_on_fetch.load(Ordering::SeqCst) {
            panic!("fetch exploded");
        }
        if let Some(err) = self.fetch_error.lock().unwrap().clone() {
            return Err(err);
        }

        self.users
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or_else(|| IdentityError::rejected(Some(401), "Invalid token."))
    }

    async fn update_current_user(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> IdentityResult<UserRecord> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.update_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let mut users = self.users.lock().unwrap();
        let record = users
            .get_mut(token)
            .ok_or_else(|| IdentityError::rejected(Some(401), "Invalid token."))?;

        if let Some(first_name) = &update.first_name {
            record.first_name = first_name.clone();
        }
        if let Some(last_name) = &update.last_name {
            record.last_name = last_name.clone();
        }
        if let Some(phone) = &update.phone_number {
            record.profile.phone_number = Some(phone.clone());
        }
        Ok(record.clone())
    }
}

/// A store that can be read but never written
struct ReadOnlyStore;

impl TokenStore for ReadOnlyStore {
    fn save(&self, _token: &str) -> ContechResult<()> {
        Err(storage_error!("read-only token store", "test"))
    }

    fn load(&self) -> ContechResult<Option<String>> {
        Ok(None)
    }

    fn clear(&self) -> ContechResult<()> {
        Ok(())
    }
}

fn builder_account() -> MockIdentity {
    MockIdentity::new().with_account(
        "a@b.com",
        "secret123",
        "tok1",
        user(7, "a@b.com", Role::Builder),
    )
}

fn manager(store: Arc<dyn TokenStore>, identity: Arc<MockIdentity>) -> SessionManager {
    SessionManager::new(store, identity)
}

#[tokio::test]
async fn test_starts_unresolved() {
    let session = manager(Arc::new(MemoryTokenStore::new()), Arc::new(MockIdentity::new()));
    assert_eq!(session.state(), SessionState::Unresolved);
    assert_eq!(session.watcher().decide("/builder"), RouteDecision::Loading);
}

#[tokio::test]
async fn test_resolve_without_token_skips_network() {
    let identity = Arc::new(builder_account());
    let session = manager(Arc::new(MemoryTokenStore::new()), identity.clone());

    assert_eq!(session.resolve().await, SessionState::Anonymous);
    assert_eq!(identity.fetch_calls(), 0);
}

#[tokio::test]
async fn test_resolve_with_valid_token() {
    let identity = Arc::new(builder_account());
    let store = Arc::new(MemoryTokenStore::with_token("tok1"));
    let session = manager(store.clone(), identity.clone());

    let state = session.resolve().await;
    assert_eq!(state.role(), Some(Role::Builder));
    assert_eq!(session.current_user().map(|u| u.id), Some(7));
    assert_eq!(store.load().unwrap().as_deref(), Some("tok1"));
}

#[tokio::test]
async fn test_rejected_token_is_cleared() {
    let identity = Arc::new(builder_account());
    let store = Arc::new(MemoryTokenStore::with_token("expired"));
    let session = manager(store.clone(), identity.clone());

    assert_eq!(session.resolve().await, SessionState::Anonymous);
    assert_eq!(identity.fetch_calls(), 1);
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_unreachable_service_also_clears_token() {
    let identity = Arc::new(builder_account());
    *identity.fetch_error.lock().unwrap() = Some(IdentityError::transport("connection refused"));
    let store = Arc::new(MemoryTokenStore::with_token("tok1"));
    let session = manager(store.clone(), identity);

    assert_eq!(session.resolve().await, SessionState::Anonymous);
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_failed_sign_in_leaves_everything_untouched() {
    let identity = Arc::new(builder_account());
    let store = Arc::new(MemoryTokenStore::new());
    let session = manager(store.clone(), identity.clone());
    session.resolve().await;

    let err = session.sign_in("a@b.com", "wrong").await.unwrap_err();
    assert_eq!(err.message(), "Invalid credentials");
    assert!(matches!(err, SessionError::Identity(_)));

    assert_eq!(session.state(), SessionState::Anonymous);
    assert_eq!(store.load().unwrap(), None);
    assert_eq!(identity.fetch_calls(), 0);
}

#[tokio::test]
async fn test_failed_sign_in_keeps_existing_session() {
    let identity = Arc::new(builder_account());
    let store = Arc::new(MemoryTokenStore::with_token("tok1"));
    let session = manager(store.clone(), identity);
    let before = session.resolve().await;

    assert!(session.sign_in("a@b.com", "wrong").await.is_err());
    assert_eq!(session.state(), before);
    assert_eq!(store.load().unwrap().as_deref(), Some("tok1"));
}

#[tokio::test]
async fn test_sign_in_matches_fresh_resolve() {
    let identity = Arc::new(builder_account());
    let store = Arc::new(MemoryTokenStore::new());
    let session = manager(store.clone(), identity.clone());
    session.resolve().await;

    let signed_in = session.sign_in("a@b.com", "secret123").await.unwrap().unwrap();
    assert_eq!(identity.fetch_calls(), 1);
    assert_eq!(store.load().unwrap().as_deref(), Some("tok1"));
    assert_eq!(post_auth_route(Some(&signed_in)), "/builder");

    let restarted = manager(store, identity);
    let resolved = restarted.resolve().await;
    let resolved = resolved.user().unwrap();
    assert_eq!(resolved.id, signed_in.id);
    assert_eq!(resolved.email, signed_in.email);
    assert_eq!(resolved.role(), signed_in.role());
}

#[tokio::test]
async fn test_sign_in_with_failing_fetch_falls_back_to_dashboard() {
    let identity = Arc::new(builder_account());
    *identity.fetch_error.lock().unwrap() = Some(IdentityError::rejected(Some(500), "boom"));
    let store = Arc::new(MemoryTokenStore::new());
    let session = manager(store.clone(), identity);

    let signed_in = session.sign_in("a@b.com", "secret123").await.unwrap();
    assert_eq!(signed_in, None);
    assert_eq!(post_auth_route(signed_in.as_ref()), "/dashboard");
    assert_eq!(session.state(), SessionState::Anonymous);
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_sign_up_as_contractor() {
    let identity = Arc::new(MockIdentity::new());
    let store = Arc::new(MemoryTokenStore::new());
    let session = manager(store.clone(), identity);
    session.resolve().await;

    let metadata = SignUpMetadata {
        first_name: Some("Juma".to_string()),
        ..SignUpMetadata::with_role(Role::Contractor)
    };
    let record = session
        .sign_up("c@d.com", "secret123", metadata)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.id, 7);
    assert_eq!(record.role(), Role::Contractor);
    assert_eq!(store.load().unwrap().as_deref(), Some("tok1"));
    assert!(session.state().is_authenticated());
    assert_eq!(post_auth_route(Some(&record)), "/contractor");
}

#[tokio::test]
async fn test_sign_up_rejected_for_existing_email() {
    let identity = Arc::new(builder_account());
    let session = manager(Arc::new(MemoryTokenStore::new()), identity);
    session.resolve().await;

    let err = session
        .sign_up("a@b.com", "secret123", SignUpMetadata::default())
        .await
        .unwrap_err();
    assert_eq!(err.message(), "email: user with this email already exists.");
    assert_eq!(session.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn test_sign_in_reports_storage_failure() {
    let identity = Arc::new(builder_account());
    let session = manager(Arc::new(ReadOnlyStore), identity.clone());
    session.resolve().await;

    let err = session.sign_in("a@b.com", "secret123").await.unwrap_err();
    assert!(matches!(err, SessionError::Storage(_)));
    assert_eq!(session.state(), SessionState::Anonymous);
    assert_eq!(identity.fetch_calls(), 0);
}

#[tokio::test]
async fn test_sign_out_is_idempotent() {
    let identity = Arc::new(builder_account());
    let store = Arc::new(MemoryTokenStore::with_token("tok1"));
    let session = manager(store.clone(), identity.clone());
    session.resolve().await;

    session.sign_out();
    session.sign_out();

    assert_eq!(session.state(), SessionState::Anonymous);
    assert_eq!(store.load().unwrap(), None);
    assert_eq!(identity.fetch_calls(), 1);
}

#[tokio::test]
async fn test_subscribers_see_each_commit() {
    let identity = Arc::new(builder_account());
    let session = manager(Arc::new(MemoryTokenStore::new()), identity);
    let mut receiver = session.subscribe();
    let mut watcher = session.watcher();

    session.resolve().await;
    assert!(receiver.has_changed().unwrap());
    assert_eq!(*receiver.borrow_and_update(), SessionState::Anonymous);
    assert_eq!(watcher.settled().await, SessionState::Anonymous);

    session.sign_in("a@b.com", "secret123").await.unwrap();
    assert!(receiver.has_changed().unwrap());
    assert_eq!(receiver.borrow_and_update().role(), Some(Role::Builder));
    assert_eq!(watcher.decide("/dashboard"), RouteDecision::Redirect("/builder"));

    session.sign_out();
    assert_eq!(watcher.changed().await, Some(SessionState::Anonymous));
}

#[tokio::test]
async fn test_unchanged_state_does_not_notify() {
    let session = manager(Arc::new(MemoryTokenStore::new()), Arc::new(MockIdentity::new()));
    session.resolve().await;

    let receiver = session.subscribe();
    session.resolve().await;
    session.sign_out();
    assert!(!receiver.has_changed().unwrap());
}

#[tokio::test]
async fn test_stale_resolve_cannot_clear_newer_token() {
    let identity = Arc::new(builder_account());
    let gate = identity.gate("old");
    let store = Arc::new(MemoryTokenStore::with_token("old"));
    let session = Arc::new(manager(store.clone(), identity.clone()));

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.resolve().await }
    });
    while identity.fetch_calls() == 0 {
        tokio::task::yield_now().await;
    }

    // The slow resolve of "old" is still waiting; sign in over it
    let signed_in = session.sign_in("a@b.com", "secret123").await.unwrap();
    assert_eq!(signed_in.map(|u| u.id), Some(7));

    gate.notify_one();
    let after_stale = pending.await.unwrap();

    assert_eq!(after_stale.role(), Some(Role::Builder));
    assert_eq!(session.state().role(), Some(Role::Builder));
    assert_eq!(store.load().unwrap().as_deref(), Some("tok1"));
}

#[tokio::test]
async fn test_sign_out_wins_over_slow_resolve() {
    let identity = Arc::new(builder_account());
    let gate = identity.gate("tok1");
    let store = Arc::new(MemoryTokenStore::with_token("tok1"));
    let session = Arc::new(manager(store.clone(), identity.clone()));

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.resolve().await }
    });
    while identity.fetch_calls() == 0 {
        tokio::task::yield_now().await;
    }

    session.sign_out();
    gate.notify_one();

    assert_eq!(pending.await.unwrap(), SessionState::Anonymous);
    assert_eq!(session.state(), SessionState::Anonymous);
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_panicking_client_is_contained() {
    let identity = Arc::new(builder_account());
    identity.panic_on_fetch.store(true, Ordering::SeqCst);
    identity.panic_on_login.store(true, Ordering::SeqCst);
    let store = Arc::new(MemoryTokenStore::with_token("tok1"));
    let session = manager(store.clone(), identity.clone());

    assert_eq!(session.resolve().await, SessionState::Anonymous);
    assert_eq!(store.load().unwrap(), None);

    let err = session.sign_in("a@b.com", "secret123").await.unwrap_err();
    assert_eq!(err.message(), "Login failed");
    assert_eq!(identity.login_calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn test_update_profile() {
    let identity = Arc::new(builder_account());
    let session = manager(Arc::new(MemoryTokenStore::with_token("tok1")), identity.clone());

    let update = ProfileUpdate {
        phone_number: Some("+255700000000".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        session.update_profile(&update).await,
        Err(SessionError::NotAuthenticated)
    ));

    session.resolve().await;
    let updated = session.update_profile(&update).await.unwrap();
    assert_eq!(updated.profile.phone_number.as_deref(), Some("+255700000000"));
    assert_eq!(session.current_user(), Some(updated));

    let unchanged = session.update_profile(&ProfileUpdate::default()).await.unwrap();
    assert_eq!(unchanged.profile.phone_number.as_deref(), Some("+255700000000"));
    assert_eq!(identity.update_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_update_profile_after_sign_out_is_not_published() {
    let identity = Arc::new(builder_account());
    let gate = Arc::new(Notify::new());
    *identity.update_gate.lock().unwrap() = Some(gate.clone());
    let store = Arc::new(MemoryTokenStore::with_token("tok1"));
    let session = Arc::new(manager(store.clone(), identity.clone()));
    session.resolve().await;

    let pending = tokio::spawn({
        let session = session.clone();
        async move {
            let update = ProfileUpdate {
                first_name: Some("Asha".to_string()),
                ..Default::default()
            };
            session.update_profile(&update).await
        }
    });
    while identity.update_calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    session.sign_out();
    gate.notify_one();

    assert!(matches!(
        pending.await.unwrap(),
        Err(SessionError::NotAuthenticated)
    ));
    assert_eq!(session.state(), SessionState::Anonymous);
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_session_persists_across_managers_on_disk() {
    let temp = tempfile::tempdir().unwrap();
    let identity = Arc::new(builder_account());

    let first = manager(
        Arc::new(FileTokenStore::new(temp.path(), "auth_token").unwrap()),
        identity.clone(),
    );
    first.resolve().await;
    first.sign_in("a@b.com", "secret123").await.unwrap();

    let second = manager(
        Arc::new(FileTokenStore::new(temp.path(), "auth_token").unwrap()),
        identity.clone(),
    );
    assert_eq!(second.resolve().await.role(), Some(Role::Builder));

    second.sign_out();
    let third = manager(
        Arc::new(FileTokenStore::new(temp.path(), "auth_token").unwrap()),
        identity,
    );
    assert_eq!(third.resolve().await, SessionState::Anonymous);
}
