use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use tokio::sync::RwLock;

use super::entity::{Account, LocalRepository, PullRequestModel};
use super::session::Session;
use crate::domains::git::gateway::GitGateway;
use crate::domains::github::client::ReviewClient;
use crate::errors::ReviewError;
use crate::events::{EventHub, SessionEvent};

/// Answers "which pull request does this checkout correspond to right now".
/// Typically backed by branch metadata plus a host API lookup.
#[async_trait]
pub trait PullRequestResolver: Send + Sync {
    async fn current_pull_request(
        &self,
        repo: &LocalRepository,
    ) -> Result<Option<PullRequestModel>>;
}

/// Owns the current [`Session`] and swaps it as the checkout moves between
/// pull requests.
pub struct SessionManager {
    resolver: Arc<dyn PullRequestResolver>,
    gateway: Arc<dyn GitGateway>,
    client: Arc<dyn ReviewClient>,
    events: Arc<EventHub>,
    user: Account,
    current: RwLock<Option<Arc<Session>>>,
}

impl SessionManager {
    pub fn new(
        resolver: Arc<dyn PullRequestResolver>,
        gateway: Arc<dyn GitGateway>,
        client: Arc<dyn ReviewClient>,
        events: Arc<EventHub>,
        user: Account,
    ) -> Self {
        Self {
            resolver,
            gateway,
            client,
            events,
            user,
            current: RwLock::new(None),
        }
    }

    pub async fn current_session(&self) -> Option<Arc<Session>> {
        self.current.read().await.clone()
    }

    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    /// Re-resolves the checkout after a repository change (branch switch,
    /// pull, remote change).
    ///
    /// The same pull request updates the existing session in place; a
    /// different one replaces it; no pull request clears it. Listeners get a
    /// [`SessionEvent::SessionChanged`] only when the session object itself
    /// was swapped.
    pub async fn repo_changed(&self, repo: &LocalRepository) -> Result<(), ReviewError> {
        let resolved = self
            .resolver
            .current_pull_request(repo)
            .await
            .map_err(|e| ReviewError::review_action("resolve pull request", format!("{e:#}")))?;

        let Some(model) = resolved else {
            let had_session = self.current.write().await.take().is_some();
            if had_session {
                info!("checkout no longer tracks a pull request; session cleared");
                self.events
                    .emit(&SessionEvent::SessionChanged { pull_request: None });
            }
            return Ok(());
        };

        let existing = self.current_session().await;
        if let Some(session) = existing {
            let open = session.pull_request().await;
            if open.identity() == model.identity() {
                return session.update(model).await;
            }
        }

        let number = model.number;
        let session = Session::new(
            repo.clone(),
            self.user.clone(),
            model,
            self.gateway.clone(),
            self.client.clone(),
            self.events.clone(),
        );
        *self.current.write().await = Some(session);
        info!("session now tracks #{number}");
        self.events.emit(&SessionEvent::SessionChanged {
            pull_request: Some(number),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::git::gateway::GitGatewayError;
    use crate::domains::github::client::{NewCommentParams, ReviewEvent};
    use crate::domains::sessions::entity::{BranchRef, Review, ReviewComment};
    use anyhow::anyhow;
    use std::sync::Mutex;

    struct StubGateway;

    #[async_trait]
    impl GitGateway for StubGateway {
        async fn merge_base(
            &self,
            _repo: &LocalRepository,
            _base_url: &str,
            _head_url: &str,
            _base_sha: &str,
            _head_sha: &str,
            _base_ref: &str,
        ) -> Result<String, GitGatewayError> {
            Ok("mb0".into())
        }

        async fn fetch(
            &self,
            _repo: &LocalRepository,
            _remote_url: &str,
            _refspec: &str,
        ) -> Result<(), GitGatewayError> {
            Ok(())
        }

        async fn extract_blob(
            &self,
            _repo: &LocalRepository,
            _sha: &str,
            path: &str,
        ) -> Result<Vec<u8>, GitGatewayError> {
            Err(GitGatewayError::NotFound(path.to_string()))
        }

        async fn diff(
            &self,
            _repo: &LocalRepository,
            _base_sha: &str,
            _head_sha: &str,
            _path: &str,
            _live_content: Option<&[u8]>,
        ) -> Result<String, GitGatewayError> {
            Ok(String::new())
        }

        async fn is_unmodified_and_pushed(
            &self,
            _repo: &LocalRepository,
            _path: &str,
            _contents: &[u8],
        ) -> Result<bool, GitGatewayError> {
            Ok(true)
        }

        async fn head_sha(&self, _repo: &LocalRepository) -> Result<String, GitGatewayError> {
            Ok("head0".into())
        }
    }

    struct StubClient;

    #[async_trait]
    impl ReviewClient for StubClient {
        async fn create_pending_review(
            &self,
            _repo: &LocalRepository,
            _pr: &PullRequestModel,
        ) -> Result<Review> {
            Err(anyhow!("not used"))
        }

        async fn cancel_pending_review(
            &self,
            _repo: &LocalRepository,
            _review_id: u64,
        ) -> Result<()> {
            Ok(())
        }

        async fn submit_pending_review(
            &self,
            _repo: &LocalRepository,
            _review_id: u64,
            _body: Option<&str>,
            _event: ReviewEvent,
        ) -> Result<Review> {
            Err(anyhow!("not used"))
        }

        async fn post_pending_review_comment(
            &self,
            _repo: &LocalRepository,
            _review_id: u64,
            _params: &NewCommentParams,
        ) -> Result<ReviewComment> {
            Err(anyhow!("not used"))
        }

        async fn post_standalone_comment(
            &self,
            _repo: &LocalRepository,
            _pr: &PullRequestModel,
            _params: &NewCommentParams,
        ) -> Result<ReviewComment> {
            Err(anyhow!("not used"))
        }

        async fn post_pending_reply(
            &self,
            _repo: &LocalRepository,
            _review_id: u64,
            _body: &str,
            _in_reply_to: u64,
        ) -> Result<ReviewComment> {
            Err(anyhow!("not used"))
        }

        async fn post_standalone_reply(
            &self,
            _repo: &LocalRepository,
            _pr: &PullRequestModel,
            _body: &str,
            _in_reply_to: u64,
        ) -> Result<ReviewComment> {
            Err(anyhow!("not used"))
        }
    }

    struct QueueResolver {
        queue: Mutex<Vec<Option<PullRequestModel>>>,
    }

    #[async_trait]
    impl PullRequestResolver for QueueResolver {
        async fn current_pull_request(
            &self,
            _repo: &LocalRepository,
        ) -> Result<Option<PullRequestModel>> {
            Ok(self.queue.lock().unwrap().remove(0))
        }
    }

    fn model(number: u64, head_sha: &str) -> PullRequestModel {
        PullRequestModel {
            number,
            title: format!("pr {number}"),
            owner: "acme".into(),
            node_id: None,
            base: BranchRef {
                sha: "base0".into(),
                ref_name: "main".into(),
                repository_clone_url: String::new(),
            },
            head: BranchRef {
                sha: head_sha.into(),
                ref_name: "feature".into(),
                repository_clone_url: String::new(),
            },
            changed_files: vec![],
            review_comments: vec![],
            reviews: vec![],
        }
    }

    fn repo() -> LocalRepository {
        LocalRepository {
            local_path: "/tmp/widgets".into(),
            clone_url: "https://github.com/acme/widgets.git".into(),
            name: "widgets".into(),
        }
    }

    fn manager(queue: Vec<Option<PullRequestModel>>) -> (SessionManager, Arc<EventHub>) {
        let events = Arc::new(EventHub::new());
        let manager = SessionManager::new(
            Arc::new(QueueResolver {
                queue: Mutex::new(queue),
            }),
            Arc::new(StubGateway),
            Arc::new(StubClient),
            events.clone(),
            Account { login: "me".into() },
        );
        (manager, events)
    }

    fn record_session_changes(events: &EventHub) -> Arc<Mutex<Vec<Option<u64>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        events.subscribe(move |event| {
            if let SessionEvent::SessionChanged { pull_request } = event {
                sink.lock().unwrap().push(*pull_request);
            }
        });
        seen
    }

    #[tokio::test]
    async fn tracking_a_new_pull_request_creates_a_session() {
        let (manager, events) = manager(vec![Some(model(1, "head0"))]);
        let seen = record_session_changes(&events);

        manager.repo_changed(&repo()).await.unwrap();
        let session = manager.current_session().await.expect("session");
        assert_eq!(session.pull_request().await.number, 1);
        assert_eq!(*seen.lock().unwrap(), vec![Some(1)]);
    }

    #[tokio::test]
    async fn same_pull_request_updates_the_session_in_place() {
        let (manager, events) = manager(vec![Some(model(1, "head0")), Some(model(1, "head1"))]);
        let seen = record_session_changes(&events);

        manager.repo_changed(&repo()).await.unwrap();
        let first = manager.current_session().await.unwrap();
        manager.repo_changed(&repo()).await.unwrap();
        let second = manager.current_session().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.pull_request().await.head.sha, "head1");
        // Only the initial swap is announced.
        assert_eq!(*seen.lock().unwrap(), vec![Some(1)]);
    }

    #[tokio::test]
    async fn different_pull_request_replaces_the_session() {
        let (manager, events) = manager(vec![Some(model(1, "head0")), Some(model(2, "head0"))]);
        let seen = record_session_changes(&events);

        manager.repo_changed(&repo()).await.unwrap();
        let first = manager.current_session().await.unwrap();
        manager.repo_changed(&repo()).await.unwrap();
        let second = manager.current_session().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(*seen.lock().unwrap(), vec![Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn leaving_the_pull_request_clears_the_session() {
        let (manager, events) = manager(vec![Some(model(1, "head0")), None, None]);
        let seen = record_session_changes(&events);

        manager.repo_changed(&repo()).await.unwrap();
        manager.repo_changed(&repo()).await.unwrap();
        assert!(manager.current_session().await.is_none());

        // A second no-pull-request resolution stays silent.
        manager.repo_changed(&repo()).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Some(1), None]);
    }
}
