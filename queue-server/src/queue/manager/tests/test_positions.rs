use super::*;

fn waiting_positions(ctx: &TestContext) -> Vec<(String, Option<u32>, Option<u32>)> {
    let key = PartitionKey::new(LOCATION, today());
    ctx.store
        .get(&key)
        .unwrap()
        .unwrap()
        .entries
        .values()
        .map(|e| (e.id.clone(), e.position, e.estimated_wait_time))
        .collect()
}

#[tokio::test]
async fn test_recalculate_assigns_positions() {
    let ctx = create_test_manager();
    let ids = seed_partition(&ctx, LOCATION, today(), 4);

    let metadata = ctx.manager.recalculate(LOCATION, None).await.unwrap();
    assert_eq!(metadata.current_count, 4);
    assert_eq!(metadata.estimated_wait_time, 75);
    assert_eq!(metadata.updated_at, ctx.clock.now_millis());

    for (index, id) in ids.iter().enumerate() {
        let entry = stored_entry(&ctx, id);
        let position = index as u32 + 1;
        assert_eq!(entry.position, Some(position));
        assert_eq!(entry.estimated_wait_time, Some((position * 15).max(5)));
    }
}

#[tokio::test]
async fn test_recalculate_is_idempotent() {
    let ctx = create_test_manager();
    let ids = seed_ranked(&ctx, 5).await;
    ctx.manager.seat(LOCATION, &ids[2], ADMIN, None).await;

    let first = waiting_positions(&ctx);
    let v1 = ctx.manager.recalculate(LOCATION, None).await.unwrap().version;
    let v2 = ctx.manager.recalculate(LOCATION, None).await.unwrap().version;

    assert_eq!(waiting_positions(&ctx), first);
    assert_eq!(v2, v1 + 1);
}

#[tokio::test]
async fn test_count_matches_waiting_pool_after_mixed_operations() {
    let ctx = create_test_manager();
    let ids = seed_ranked(&ctx, 6).await;

    ctx.manager.call(LOCATION, &ids[0], ADMIN, None).await;
    ctx.manager.seat(LOCATION, &ids[1], ADMIN, None).await;
    ctx.manager
        .remove(LOCATION, &ids[3], ADMIN, remove_reason::LEFT, None)
        .await;
    ctx.manager.seat(LOCATION, &ids[0], ADMIN, None).await;

    let view = ctx.manager.get_queue_status(LOCATION, None).await.unwrap();
    let waiting: Vec<&QueueEntry> = view.entries.iter().filter(|e| e.is_waiting()).collect();
    assert_eq!(view.metadata.current_count as usize, waiting.len());
    assert_eq!(waiting.len(), 3);

    // Contiguous 1..=N in arrival order
    let positions: Vec<u32> = waiting.iter().filter_map(|e| e.position).collect();
    assert_eq!(positions, vec![1, 2, 3]);
    let order: Vec<&str> = waiting.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(order, vec!["g3", "g5", "g6"]);

    for entry in view.entries.iter().filter(|e| !e.is_waiting()) {
        assert_eq!(entry.position, None);
        assert_eq!(entry.estimated_wait_time, None);
    }
}

#[tokio::test]
async fn test_recalculate_missing_partition() {
    let ctx = create_test_manager();
    let err = ctx.manager.recalculate(LOCATION, None).await.unwrap_err();
    assert!(matches!(err, QueueError::PartitionNotFound(_)));
}

#[tokio::test]
async fn test_notify_top_of_queue_once() {
    let ctx = create_test_manager();
    seed_ranked(&ctx, 7).await;

    let report = ctx.manager.notify_top_of_queue(LOCATION, None).await.unwrap();
    assert_eq!(report.sent, 5);
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped, 0);
    assert_eq!(
        ctx.gateway.recipients(NotificationKind::PositionUpdate),
        vec!["g1", "g2", "g3", "g4", "g5"]
    );

    let report = ctx.manager.notify_top_of_queue(LOCATION, None).await.unwrap();
    assert_eq!(report.sent, 0);
    assert_eq!(report.skipped, 5);
    assert_eq!(ctx.gateway.count(NotificationKind::PositionUpdate), 5);
    assert!(stored_entry(&ctx, "g1").notifications_sent.position_update);
    assert!(!stored_entry(&ctx, "g6").notifications_sent.position_update);
}

#[tokio::test]
async fn test_notify_reaches_guests_moving_up() {
    let ctx = create_test_manager();
    let ids = seed_ranked(&ctx, 7).await;
    ctx.manager.notify_top_of_queue(LOCATION, None).await.unwrap();

    ctx.manager.call(LOCATION, &ids[0], ADMIN, None).await;

    let report = ctx.manager.notify_top_of_queue(LOCATION, None).await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(report.skipped, 4);
    assert_eq!(
        ctx.gateway.recipients(NotificationKind::PositionUpdate).last().map(String::as_str),
        Some("g6")
    );
}

#[tokio::test]
async fn test_failed_position_updates_are_retried() {
    let ctx = create_test_manager();
    seed_ranked(&ctx, 3).await;

    ctx.gateway.set_failing(true);
    let report = ctx.manager.notify_top_of_queue(LOCATION, None).await.unwrap();
    assert_eq!(report.sent, 0);
    assert_eq!(report.failed, 3);
    assert!(!stored_entry(&ctx, "g1").notifications_sent.position_update);

    ctx.gateway.set_failing(false);
    let report = ctx.manager.notify_top_of_queue(LOCATION, None).await.unwrap();
    assert_eq!(report.sent, 3);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn test_notify_open_partitions_skips_paused_and_old_days() {
    let ctx = create_test_manager();
    seed_ranked(&ctx, 2).await;
    seed_partition(&ctx, "loc-paused", today(), 2);
    ctx.manager.recalculate("loc-paused", None).await.unwrap();
    ctx.manager
        .set_queue_status("loc-paused", QueueStatus::Paused, None)
        .await
        .unwrap();
    seed_partition(&ctx, LOCATION, date("2026-10-17"), 2);
    ctx.manager
        .recalculate(LOCATION, Some(date("2026-10-17")))
        .await
        .unwrap();

    let report = ctx.manager.notify_open_partitions().await.unwrap();
    assert_eq!(report.sent, 2);
    assert_eq!(ctx.gateway.count(NotificationKind::PositionUpdate), 2);
}

#[tokio::test]
async fn test_position_notifier_runs_until_shutdown() {
    use crate::queue::position_notifier::PositionNotifier;
    use tokio_util::sync::CancellationToken;

    let ctx = create_test_manager();
    seed_ranked(&ctx, 3).await;
    let gateway = ctx.gateway.clone();
    let manager = Arc::new(ctx.manager);
    let shutdown = CancellationToken::new();

    let notifier = PositionNotifier::new(manager, Duration::from_secs(3600), shutdown.clone());
    let handle = tokio::spawn(notifier.run());

    // First tick fires immediately
    tokio::time::timeout(Duration::from_secs(5), async {
        while gateway.count(NotificationKind::PositionUpdate) < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first round should notify every waiting guest");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("notifier should stop on shutdown")
        .unwrap();
    assert_eq!(gateway.count(NotificationKind::PositionUpdate), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_notify_runs_send_once() {
    let ctx = create_test_manager();
    seed_ranked(&ctx, 3).await;

    let (a, b) = tokio::join!(
        ctx.manager.notify_top_of_queue(LOCATION, None),
        ctx.manager.notify_top_of_queue(LOCATION, None),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.sent + b.sent, 3);
    assert_eq!(a.skipped + b.skipped, 3);
    assert_eq!(ctx.gateway.count(NotificationKind::PositionUpdate), 3);
}
