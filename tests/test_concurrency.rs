mod common;

use std::sync::Arc;

use common::{ALICE, BOB, Fixture, at};
use dueljack::config::DuelSettings;
use dueljack::duel::{
    CooldownTracker, DuelEngine, Effect, ManualScheduler, Scheduler, ScriptedDice, SessionStore,
    TimerFired, TimerKind, UserId,
};
use dueljack::error::DuelError;
use dueljack::stats::InMemoryStatsRepository;

fn shared_engine(rolls: Vec<u32>) -> (Arc<DuelEngine>, Arc<ManualScheduler>) {
    let scheduler = Arc::new(ManualScheduler::new());
    let engine = Arc::new(DuelEngine::new(
        DuelSettings::default(),
        Arc::new(InMemoryStatsRepository::new()),
        Arc::clone(&scheduler) as _,
        Box::new(ScriptedDice::new(rolls)),
    ));
    (engine, scheduler)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_challenges_admit_one_session_per_user() {
    let (engine, scheduler) = shared_engine(Vec::new());

    let mut tasks = Vec::new();
    for challenger in 10..42 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            engine.challenge(UserId(challenger), BOB, at(0)).await
        }));
    }

    let mut won = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => won += 1,
            Err(e) => assert_eq!(e, DuelError::AlreadyInDuel { user: BOB }),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(engine.store().live_count(), 1);
    // Rejected challenges left no timers behind.
    assert_eq!(scheduler.pending(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disjoint_pairs_run_in_parallel() {
    let (engine, _scheduler) = shared_engine(vec![10; 64]);

    let mut tasks = Vec::new();
    for pair in 0..16u64 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            let a = UserId(100 + pair * 2);
            let b = UserId(101 + pair * 2);
            engine.challenge(a, b, at(0)).await?;
            engine.accept(b, at(1)).await?;
            engine.attack(a, at(2)).await?;
            engine.attack(b, at(3)).await
        }));
    }
    for task in tasks {
        assert!(matches!(task.await.unwrap(), Ok(Effect::Moved { .. })));
    }
    assert_eq!(engine.store().live_count(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn both_players_moving_at_once_only_turn_owner_lands() {
    let (engine, _scheduler) = shared_engine(vec![10, 10]);
    engine.challenge(ALICE, BOB, at(0)).await.unwrap();
    engine.accept(BOB, at(1)).await.unwrap();

    let a = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.attack(ALICE, at(2)).await })
    };
    let b = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.attack(BOB, at(2)).await })
    };
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    let session = engine.status(ALICE, at(3)).await.unwrap();
    let landed = usize::from(a.is_ok()) + usize::from(b.is_ok());
    assert_eq!(session.move_log.len(), landed);
    // A always lands: either first, or after B was refused.
    assert!(a.is_ok());
    if let Err(e) = b {
        assert_eq!(e, DuelError::NotYourTurn { turn_owner: ALICE });
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timer_racing_action_finishes_once() {
    let fx = Fixture::new([10]);
    let id = fx.start_duel(ALICE, BOB, 0).await;
    let deadline = fx.deadline(id, TimerKind::DurationLimit).unwrap();
    let fx = Arc::new(fx);

    let timer = {
        let fx = Arc::clone(&fx);
        tokio::spawn(async move {
            fx.engine
                .handle_timer(TimerFired {
                    session_id: id,
                    kind: TimerKind::DurationLimit,
                    deadline,
                })
                .await
        })
    };
    let action = {
        let fx = Arc::clone(&fx);
        tokio::spawn(async move { fx.engine.attack(ALICE, deadline).await })
    };
    let (timer, action) = (timer.await.unwrap(), action.await.unwrap());

    let finishes =
        usize::from(matches!(timer, Some(Effect::Finished { .. }))) + usize::from(action.is_ok());
    assert!(finishes <= 1, "timer {timer:?} action {action:?}");
    assert!(action.is_err());

    let stats = fx.engine.stats(ALICE).await.unwrap().unwrap();
    assert_eq!(stats.duels_played, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn engines_sharing_tables_keep_one_session_per_user() {
    let mut settings = DuelSettings::default();
    settings.max_health = 10;
    let store = Arc::new(SessionStore::new(settings.archive_capacity));
    let cooldowns = Arc::new(CooldownTracker::new(settings.cooldown));
    let stats = Arc::new(InMemoryStatsRepository::new());

    let build = |rolls: Vec<u32>| {
        Arc::new(
            DuelEngine::new(
                settings.clone(),
                Arc::clone(&stats) as _,
                Arc::new(ManualScheduler::new()),
                Box::new(ScriptedDice::new(rolls)),
            )
            .with_store(Arc::clone(&store))
            .with_cooldowns(Arc::clone(&cooldowns)),
        )
    };
    let left = build(vec![13]);
    let right = build(Vec::new());

    let mut tasks = Vec::new();
    for challenger in 10..42 {
        let engine = Arc::clone(if challenger % 2 == 0 { &left } else { &right });
        tasks.push(tokio::spawn(async move {
            engine.challenge(UserId(challenger), BOB, at(0)).await
        }));
    }
    let mut won = Vec::new();
    for task in tasks {
        match task.await.unwrap() {
            Ok(effect) => won.push(effect.session().challenger.id),
            Err(e) => assert_eq!(e, DuelError::AlreadyInDuel { user: BOB }),
        }
    }
    assert_eq!(won.len(), 1);
    assert_eq!(store.live_count(), 1);

    // Either engine sees and drives the session.
    let winner = won[0];
    left.accept(BOB, at(1)).await.unwrap();
    assert!(matches!(
        right.challenge(ALICE, winner, at(2)).await,
        Err(DuelError::AlreadyInDuel { .. })
    ));
    let effect = left.attack(winner, at(3)).await.unwrap();
    assert!(matches!(effect, Effect::Finished { .. }));

    // The cooldown recorded through one engine binds the other.
    assert_eq!(store.live_count(), 0);
    assert!(matches!(
        right.challenge(winner, ALICE, at(4)).await,
        Err(DuelError::OnCooldown { .. })
    ));
    assert_eq!(cooldowns.len(), 2);
}
