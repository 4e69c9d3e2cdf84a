//! The reconciliation procedure and the end-to-end run pipeline

use crate::context::{CredentialSource, ReconcileObserver, RemoteSession, SessionOpener};
use crate::error::{Error, Result};
use crate::session::SessionGuard;
use crate::types::{ClusterLevel, ReconcileOptions, ReconciliationOutcome};

/// Reconcile the session's cluster against `desired`.
///
/// A query failure is fatal and returned as [`Error::ResourceQuery`]. An
/// upgrade failure is recorded in the returned outcome. The upgrade is
/// attempted at most once and is not re-checked afterwards.
pub fn reconcile<S: RemoteSession + ?Sized>(
    session: &mut S,
    desired: ClusterLevel,
    options: ReconcileOptions,
    observer: &mut dyn ReconcileObserver,
) -> Result<ReconciliationOutcome> {
    let target = session.target().to_string();

    observer.on_query_start(&target);
    let observed = session
        .query_state()
        .map_err(|e| Error::ResourceQuery {
            target: target.clone(),
            message: e.to_string(),
        })?;
    observer.on_state_observed(&target, observed, desired);

    let mut outcome = ReconciliationOutcome::observed(&target, observed, desired);

    if !outcome.update_required() {
        observer.on_up_to_date(&target);
        return Ok(outcome);
    }

    if options.dry_run {
        return Ok(outcome);
    }

    observer.on_upgrade_start(&target);
    match session.force_upgrade() {
        Ok(()) => outcome.record_success(),
        Err(e) => outcome.record_failure(e.to_string()),
    }
    observer.on_upgrade_complete(&outcome);

    Ok(outcome)
}

/// Run the whole pipeline: credentials, session, reconciliation.
///
/// The session is closed before this returns, whether reconciliation
/// succeeded or not. Nothing is opened if credential acquisition fails.
pub fn run<C, O>(
    credentials: &mut C,
    opener: &O,
    target: &str,
    desired: ClusterLevel,
    options: ReconcileOptions,
    observer: &mut dyn ReconcileObserver,
) -> Result<ReconciliationOutcome>
where
    C: CredentialSource + ?Sized,
    O: SessionOpener + ?Sized,
{
    let credential = credentials.acquire()?;
    let mut session = SessionGuard::new(opener.open(target, &credential)?);
    reconcile(&mut *session, desired, options, observer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoObserver;
    use crate::error::RemoteError;
    use crate::report::{self, ABORT_EXIT_CODE, Verdict};
    use crate::types::Credential;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DESIRED: ClusterLevel = ClusterLevel {
        level: 12,
        version: 32774,
    };

    #[derive(Default)]
    struct Counters {
        opens: AtomicUsize,
        closes: AtomicUsize,
        queries: AtomicUsize,
        upgrades: AtomicUsize,
    }

    impl Counters {
        fn get(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    #[derive(Clone)]
    enum Query {
        Ok(ClusterLevel),
        Fail(&'static str),
    }

    #[derive(Clone)]
    enum Upgrade {
        Ok,
        Fail(&'static str),
    }

    struct MockSession {
        target: String,
        query: Query,
        upgrade: Upgrade,
        counters: Arc<Counters>,
        closed: bool,
    }

    impl RemoteSession for MockSession {
        fn target(&self) -> &str {
            &self.target
        }

        fn query_state(&mut self) -> std::result::Result<ClusterLevel, RemoteError> {
            self.counters.queries.fetch_add(1, Ordering::SeqCst);
            match &self.query {
                Query::Ok(level) => Ok(*level),
                Query::Fail(msg) => Err(RemoteError::Failed((*msg).to_string())),
            }
        }

        fn force_upgrade(&mut self) -> std::result::Result<(), RemoteError> {
            self.counters.upgrades.fetch_add(1, Ordering::SeqCst);
            match &self.upgrade {
                Upgrade::Ok => Ok(()),
                Upgrade::Fail(msg) => Err(RemoteError::Failed((*msg).to_string())),
            }
        }

        fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.counters.closes.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    struct MockOpener {
        query: Query,
        upgrade: Upgrade,
        refuse: bool,
        counters: Arc<Counters>,
    }

    impl MockOpener {
        fn new(query: Query, upgrade: Upgrade) -> Self {
            Self {
                query,
                upgrade,
                refuse: false,
                counters: Arc::new(Counters::default()),
            }
        }
    }

    impl SessionOpener for MockOpener {
        type Session = MockSession;

        fn open(&self, target: &str, _credential: &Credential) -> Result<MockSession> {
            if self.refuse {
                return Err(Error::Connect {
                    host: target.to_string(),
                    message: "Connection refused".into(),
                });
            }
            self.counters.opens.fetch_add(1, Ordering::SeqCst);
            Ok(MockSession {
                target: target.to_string(),
                query: self.query.clone(),
                upgrade: self.upgrade.clone(),
                counters: Arc::clone(&self.counters),
                closed: false,
            })
        }
    }

    struct StaticCredentials(Option<Credential>);

    impl CredentialSource for StaticCredentials {
        fn acquire(&mut self) -> Result<Credential> {
            self.0.clone().ok_or(Error::NoCredential)
        }
    }

    fn operator() -> StaticCredentials {
        StaticCredentials(Some(Credential::new("admin", Some("pw".into()))))
    }

    fn run_with(opener: &MockOpener, creds: &mut StaticCredentials) -> Result<ReconciliationOutcome> {
        run(
            creds,
            opener,
            "cl01.example.com",
            DESIRED,
            ReconcileOptions::default(),
            &mut NoObserver,
        )
    }

    #[test]
    fn test_scenario_a_already_at_desired_state() {
        let opener = MockOpener::new(Query::Ok(ClusterLevel::new(12, 32774)), Upgrade::Ok);
        let outcome = run_with(&opener, &mut operator()).unwrap();

        assert!(!outcome.update_required());
        assert!(!outcome.update_attempted());
        assert!(!outcome.update_succeeded());
        assert!(outcome.error_detail().is_none());
        assert_eq!(Counters::get(&opener.counters.upgrades), 0);

        let report = report::render(&outcome);
        assert_eq!(report.exit_code, 0);
        assert_eq!(report.verdict, Verdict::NotRequired);
        assert!(report.text.contains("NOT REQUIRED"));
    }

    #[test]
    fn test_scenario_b_upgrade_succeeds() {
        let opener = MockOpener::new(Query::Ok(ClusterLevel::new(10, 30000)), Upgrade::Ok);
        let outcome = run_with(&opener, &mut operator()).unwrap();

        assert!(outcome.update_required());
        assert!(outcome.update_attempted());
        assert!(outcome.update_succeeded());
        assert!(outcome.error_detail().is_none());
        assert_eq!(Counters::get(&opener.counters.upgrades), 1);

        let report = report::render(&outcome);
        assert_eq!(report.exit_code, 0);
        assert!(report.text.contains("SUCCESS"));
    }

    #[test]
    fn test_scenario_c_upgrade_fails() {
        let opener = MockOpener::new(
            Query::Ok(ClusterLevel::new(10, 30000)),
            Upgrade::Fail("access denied"),
        );
        let outcome = run_with(&opener, &mut operator()).unwrap();

        assert!(outcome.update_required());
        assert!(outcome.update_attempted());
        assert!(!outcome.update_succeeded());
        assert_eq!(outcome.error_detail(), Some("access denied"));
        assert_eq!(Counters::get(&opener.counters.upgrades), 1);
        assert_eq!(Counters::get(&opener.counters.closes), 1);

        let report = report::render(&outcome);
        assert_eq!(report.exit_code, 1);
        assert!(report.text.contains("FAILED"));
        assert!(report.text.contains("access denied"));
    }

    #[test]
    fn test_scenario_d_no_credential() {
        let opener = MockOpener::new(Query::Ok(ClusterLevel::new(12, 32774)), Upgrade::Ok);
        let err = run_with(&opener, &mut StaticCredentials(None)).unwrap_err();

        assert!(matches!(err, Error::NoCredential));
        assert_eq!(Counters::get(&opener.counters.opens), 0);
        assert_eq!(Counters::get(&opener.counters.closes), 0);
        assert_eq!(ABORT_EXIT_CODE, 1);
    }

    #[test]
    fn test_open_failure_closes_nothing() {
        let mut opener = MockOpener::new(Query::Ok(ClusterLevel::new(12, 32774)), Upgrade::Ok);
        opener.refuse = true;
        let err = run_with(&opener, &mut operator()).unwrap_err();

        assert!(err.is_transport());
        assert_eq!(Counters::get(&opener.counters.opens), 0);
        assert_eq!(Counters::get(&opener.counters.closes), 0);
    }

    #[test]
    fn test_query_failure_is_fatal_and_still_closes() {
        let opener = MockOpener::new(Query::Fail("cluster not found"), Upgrade::Ok);
        let err = run_with(&opener, &mut operator()).unwrap_err();

        assert_eq!(
            err.to_string(),
            "error accessing resource 'cl01.example.com': cluster not found"
        );
        assert_eq!(Counters::get(&opener.counters.upgrades), 0);
        assert_eq!(Counters::get(&opener.counters.opens), 1);
        assert_eq!(Counters::get(&opener.counters.closes), 1);
    }

    #[test]
    fn test_every_opened_session_is_closed_once() {
        let cases = [
            (Query::Ok(ClusterLevel::new(12, 32774)), Upgrade::Ok),
            (Query::Ok(ClusterLevel::new(10, 30000)), Upgrade::Ok),
            (Query::Ok(ClusterLevel::new(10, 30000)), Upgrade::Fail("x")),
            (Query::Fail("unreachable"), Upgrade::Ok),
        ];

        for (query, upgrade) in cases {
            let opener = MockOpener::new(query, upgrade);
            let _ = run_with(&opener, &mut operator());
            assert_eq!(Counters::get(&opener.counters.opens), 1);
            assert_eq!(Counters::get(&opener.counters.closes), 1);
        }
    }

    #[test]
    fn test_dry_run_never_upgrades() {
        let opener = MockOpener::new(Query::Ok(ClusterLevel::new(10, 30000)), Upgrade::Ok);
        let outcome = run(
            &mut operator(),
            &opener,
            "cl01",
            DESIRED,
            ReconcileOptions { dry_run: true },
            &mut NoObserver,
        )
        .unwrap();

        assert!(outcome.update_required());
        assert!(!outcome.update_attempted());
        assert_eq!(Counters::get(&opener.counters.upgrades), 0);
        assert_eq!(report::exit_code(&outcome), 1);
    }

    #[test]
    fn test_reconcile_uses_session_target() {
        let opener = MockOpener::new(Query::Ok(ClusterLevel::new(12, 32774)), Upgrade::Ok);
        let mut session = opener
            .open("hv-cluster.corp.local", &Credential::new("a", None))
            .unwrap();
        let outcome =
            reconcile(&mut session, DESIRED, ReconcileOptions::default(), &mut NoObserver).unwrap();
        assert_eq!(outcome.target_name(), "hv-cluster.corp.local");
    }

    #[test]
    fn test_observer_sees_upgrade_lifecycle() {
        #[derive(Default)]
        struct Recorder(Vec<&'static str>);

        impl ReconcileObserver for Recorder {
            fn on_query_start(&mut self, _target: &str) {
                self.0.push("query");
            }
            fn on_state_observed(&mut self, _t: &str, _o: ClusterLevel, _d: ClusterLevel) {
                self.0.push("observed");
            }
            fn on_up_to_date(&mut self, _target: &str) {
                self.0.push("up_to_date");
            }
            fn on_upgrade_start(&mut self, _target: &str) {
                self.0.push("upgrade");
            }
            fn on_upgrade_complete(&mut self, _outcome: &ReconciliationOutcome) {
                self.0.push("done");
            }
        }

        let opener = MockOpener::new(Query::Ok(ClusterLevel::new(10, 30000)), Upgrade::Ok);
        let mut recorder = Recorder::default();
        run(
            &mut operator(),
            &opener,
            "cl01",
            DESIRED,
            ReconcileOptions::default(),
            &mut recorder,
        )
        .unwrap();
        assert_eq!(recorder.0, vec!["query", "observed", "upgrade", "done"]);

        let opener = MockOpener::new(Query::Ok(DESIRED), Upgrade::Ok);
        let mut recorder = Recorder::default();
        run(
            &mut operator(),
            &opener,
            "cl01",
            DESIRED,
            ReconcileOptions::default(),
            &mut recorder,
        )
        .unwrap();
        assert_eq!(recorder.0, vec!["query", "observed", "up_to_date"]);
    }
}
