//! Property tests for `AuthState` transitions.
//!
//! Whatever sequence of transitions or lifecycle events is applied, a
//! snapshot never carries a profile or session without a user, and
//! `initialized` never reverts.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use rapport_core::adapters::{
    InMemoryKeyValueStore, InMemoryRealtimeTransport, InMemoryRequestRouter, ManualClock,
    MockIdentityProvider,
};
use rapport_core::application::{AuthDependencies, AuthStateMachine};
use rapport_core::config::SessionConfig;
use rapport_core::domain::auth::{AuthLifecycleEvent, AuthState, AuthUser, Session};
use rapport_core::domain::foundation::{Timestamp, UserId};
use rapport_core::domain::profile::{SubscriptionTier, UserProfile};

#[derive(Debug, Clone)]
enum Step {
    SignOut,
    Resolve(u8),
    Resolved { profile_of: u8, failed: bool },
    Refresh(u8),
    PushProfile(u8),
    Loading(bool),
    Error(bool),
}

fn user(n: u8) -> AuthUser {
    let id = UserId::new(format!("user-{}", n)).unwrap();
    AuthUser::new(id, format!("user-{}@example.com", n))
}

fn session(n: u8) -> Session {
    minted(n, 0)
}

fn minted(n: u8, generation: u8) -> Session {
    Session::new(
        format!("access-{}-{}", n, generation),
        format!("refresh-{}-{}", n, generation),
        Timestamp::from_unix_secs(1_700_003_600),
        user(n),
    )
}

fn profile(n: u8) -> Arc<UserProfile> {
    let mut profile = UserProfile::new_default(
        user(n).id,
        format!("user-{}@example.com", n),
        Timestamp::from_unix_secs(1_700_000_000),
    );
    profile.subscription_tier = SubscriptionTier::Premium;
    Arc::new(profile)
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::SignOut),
        (0u8..3).prop_map(Step::Resolve),
        ((0u8..3), any::<bool>())
            .prop_map(|(profile_of, failed)| Step::Resolved { profile_of, failed }),
        (0u8..3).prop_map(Step::Refresh),
        (0u8..3).prop_map(Step::PushProfile),
        any::<bool>().prop_map(Step::Loading),
        any::<bool>().prop_map(Step::Error),
    ]
}

fn lifecycle_event() -> impl Strategy<Value = AuthLifecycleEvent> {
    prop_oneof![
        Just(AuthLifecycleEvent::SignedOut),
        ((0u8..3), (0u8..3)).prop_map(|(n, g)| AuthLifecycleEvent::SignedIn(minted(n, g))),
        ((0u8..3), (0u8..3)).prop_map(|(n, g)| AuthLifecycleEvent::TokenRefreshed(minted(n, g))),
        prop::option::of((0u8..3, 0u8..3))
            .prop_map(|s| AuthLifecycleEvent::UserUpdated(s.map(|(n, g)| minted(n, g)))),
    ]
}

fn check_snapshot(previous: Option<&AuthState>, next: &AuthState) -> Result<(), TestCaseError> {
    prop_assert!(next.is_consistent());
    if let (Some(user), Some(profile)) = (next.user(), next.profile()) {
        prop_assert_eq!(&user.id, &profile.id);
    }
    if let (Some(user), Some(session)) = (next.user(), next.session()) {
        prop_assert_eq!(&user.id, session.user_id());
    }
    if previous.is_some_and(|p| p.is_initialized()) {
        prop_assert!(next.is_initialized());
    }
    Ok(())
}

async fn run_events(events: Vec<AuthLifecycleEvent>) -> Result<(), TestCaseError> {
    let clock = Arc::new(ManualClock::new(Timestamp::from_unix_secs(1_700_000_000)));
    let machine = AuthStateMachine::new(
        AuthDependencies {
            identity: Arc::new(MockIdentityProvider::new().with_clock(clock.clone())),
            router: Arc::new(InMemoryRequestRouter::new().with_clock(clock.clone())),
            realtime: Arc::new(InMemoryRealtimeTransport::new()),
            storage: Arc::new(InMemoryKeyValueStore::new()),
            clock,
        },
        SessionConfig::default(),
    );
    machine.start().await;

    let published = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&published);
    let _subscription = machine.subscribe(move |state| sink.lock().unwrap().push(Arc::clone(state)));

    for event in events {
        let signed_out = matches!(event, AuthLifecycleEvent::SignedOut);
        let after = machine.handle_event(event).await;
        if signed_out {
            prop_assert!(after.user().is_none());
            prop_assert!(after.session().is_none());
        }
    }

    let snapshots = published.lock().unwrap().clone();
    let mut previous: Option<&AuthState> = None;
    for snapshot in &snapshots {
        check_snapshot(previous, snapshot)?;
        previous = Some(&**snapshot);
    }
    machine.shutdown().await;
    Ok(())
}

fn apply(state: &AuthState, step: &Step) -> AuthState {
    let next = match step {
        Step::SignOut => AuthState::anonymous(),
        Step::Resolve(n) => state.resolving(session(*n)),
        Step::Resolved { profile_of, failed } => {
            if *failed {
                state.resolved(None, Some("profile fetch failed".to_string()))
            } else {
                state.resolved(Some(profile(*profile_of)), None)
            }
        }
        Step::Refresh(n) => state.with_session(session(*n)),
        Step::PushProfile(n) => state.with_profile(profile(*n)),
        Step::Loading(loading) => state.with_loading(*loading),
        Step::Error(set) => state.with_error(set.then(|| "boom".to_string())),
    };
    next.normalized().inherit_initialized(state)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn lifecycle_events_only_publish_consistent_snapshots(
        events in prop::collection::vec(lifecycle_event(), 0..24)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run_events(events))?;
    }
}

proptest! {
    #[test]
    fn profile_and_session_never_outlive_the_user(steps in prop::collection::vec(step(), 0..40)) {
        let mut state = AuthState::initial();
        for step in &steps {
            let next = apply(&state, step);

            prop_assert!(next.is_consistent());
            if let (Some(user), Some(profile)) = (next.user(), next.profile()) {
                prop_assert_eq!(&user.id, &profile.id);
            }
            if let (Some(user), Some(session)) = (next.user(), next.session()) {
                prop_assert_eq!(&user.id, session.user_id());
            }
            if state.is_initialized() {
                prop_assert!(next.is_initialized());
            }
            state = next;
        }
    }

    #[test]
    fn tier_checks_follow_tier_order(a in 0usize..3, b in 0usize..3) {
        let tiers = [SubscriptionTier::Free, SubscriptionTier::Premium, SubscriptionTier::Professional];
        prop_assert_eq!(tiers[a].is_at_least(tiers[b]), a >= b);
    }
}
