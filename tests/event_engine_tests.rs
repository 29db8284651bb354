//! # Event Engine Tests
//!
//! Number assignment, pending-entry lifecycle and folder summaries against an
//! in-memory remote disk.

mod common;

use chrono::{Duration, Utc};
use common::FakeDisk;
use photo_reports::categories::TwoStageKind;
use photo_reports::events::{EndResolution, EventEngine};
use photo_reports::stage_files::EventSummary;
use std::sync::Arc;

#[cfg(test)]
mod tests {
    use super::*;

    const FOLDER: &str = "/Reports/10.03.25 – 16.03.25/Налёты, захваты";
    const USER: u64 = 42;

    #[tokio::test]
    async fn test_start_takes_max_plus_one() {
        let disk = FakeDisk::with_files(FOLDER, &["1-1.jpg", "1-2.jpg", "3-1.png"]);
        let engine = EventEngine::in_memory();

        let number = engine
            .assign_number_for_start(&disk, USER, TwoStageKind::Raids, FOLDER)
            .await;
        assert_eq!(number, 4);

        let pending = engine.pending().get(USER, TwoStageKind::Raids).unwrap();
        assert_eq!(pending.event_number, 4);
        assert_eq!(pending.folder, FOLDER);
    }

    #[tokio::test]
    async fn test_start_in_empty_folder_is_one() {
        let disk = FakeDisk::with_files(FOLDER, &["notes.txt", "punishment_1_abc.jpg", "01-1.jpg"]);
        let engine = EventEngine::in_memory();

        let number = engine
            .assign_number_for_start(&disk, USER, TwoStageKind::Raids, FOLDER)
            .await;
        assert_eq!(number, 1);
    }

    #[tokio::test]
    async fn test_start_moves_past_numbers_taken_during_assignment() {
        let disk = FakeDisk::with_files(FOLDER, &["1-1.jpg", "1-2.jpg"]);
        disk.add_file_after_first_listing(FOLDER, "2-1.jpg");
        disk.add_file_after_first_listing(FOLDER, "3-2.jpg");
        let engine = EventEngine::in_memory();

        let number = engine
            .assign_number_for_start(&disk, USER, TwoStageKind::Raids, FOLDER)
            .await;
        assert_eq!(number, 4);
        assert_eq!(disk.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_start_falls_back_to_weekly_counter() {
        let disk = FakeDisk::with_files(FOLDER, &["7-1.jpg"]);
        disk.set_fail_listing(true);
        let engine = EventEngine::in_memory();

        let first = engine
            .assign_number_for_start(&disk, USER, TwoStageKind::Supplies, FOLDER)
            .await;
        let second = engine
            .assign_number_for_start(&disk, USER + 1, TwoStageKind::Supplies, FOLDER)
            .await;
        let other_kind = engine
            .assign_number_for_start(&disk, USER, TwoStageKind::Mp, FOLDER)
            .await;

        // Never checked against the remote folder
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(other_kind, 1);
    }

    #[tokio::test]
    async fn test_exhausted_folder_falls_back_to_weekly_counter() {
        let disk = FakeDisk::with_files(FOLDER, &["4294967295-1.jpg", "4294967295-2.jpg"]);
        let engine = EventEngine::in_memory();

        let start = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            engine.assign_number_for_start(&disk, USER, TwoStageKind::Raids, FOLDER),
        )
        .await
        .expect("start assignment should finish");
        assert_eq!(start, 1);

        let end = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            engine.assign_number_for_end(&disk, USER, TwoStageKind::Mp, FOLDER),
        )
        .await
        .expect("end assignment should finish");
        assert_eq!(end.number, 1);
        assert_eq!(end.resolution, EndResolution::Fresh);
    }

    #[tokio::test]
    async fn test_end_continues_pending_start() {
        let disk = FakeDisk::with_files(FOLDER, &["5-1.jpg"]);
        let engine = EventEngine::in_memory();
        engine
            .pending()
            .insert(USER, TwoStageKind::Raids, 5, FOLDER, Utc::now());

        let assignment = engine
            .assign_number_for_end(&disk, USER, TwoStageKind::Raids, FOLDER)
            .await;
        assert_eq!(assignment.number, 5);
        assert_eq!(assignment.resolution, EndResolution::Continuation);
        assert!(assignment.is_continuation());
        assert!(engine.pending().get(USER, TwoStageKind::Raids).is_none());
    }

    #[tokio::test]
    async fn test_end_ignores_pending_start_from_another_folder() {
        const NIGHT_FOLDER: &str = "/Reports/10.03.25 – 16.03.25/Ночные налёты, захваты";
        let disk = FakeDisk::with_files(FOLDER, &["5-1.jpg", "5-2.jpg"]);
        disk.add_file(NIGHT_FOLDER, "5-1.jpg");
        let engine = EventEngine::in_memory();
        engine
            .pending()
            .insert(USER, TwoStageKind::Raids, 5, NIGHT_FOLDER, Utc::now());

        let assignment = engine
            .assign_number_for_end(&disk, USER, TwoStageKind::Raids, FOLDER)
            .await;
        assert_eq!(assignment.number, 6);
        assert_eq!(assignment.resolution, EndResolution::Fresh);

        // Still open for an end in its own folder
        let pending = engine.pending().get(USER, TwoStageKind::Raids).unwrap();
        assert_eq!(pending.folder, NIGHT_FOLDER);

        let night_end = engine
            .assign_number_for_end(&disk, USER, TwoStageKind::Raids, NIGHT_FOLDER)
            .await;
        assert_eq!(night_end.number, 5);
        assert_eq!(night_end.resolution, EndResolution::Continuation);
        assert!(engine.pending().get(USER, TwoStageKind::Raids).is_none());
    }

    #[tokio::test]
    async fn test_end_after_remote_completion_allocates_new_number() {
        let disk = FakeDisk::with_files(FOLDER, &["5-1.jpg", "5-2.jpg", "6-1.jpg"]);
        let engine = EventEngine::in_memory();
        engine
            .pending()
            .insert(USER, TwoStageKind::Raids, 5, FOLDER, Utc::now());

        let assignment = engine
            .assign_number_for_end(&disk, USER, TwoStageKind::Raids, FOLDER)
            .await;
        assert_eq!(assignment.number, 7);
        assert_eq!(assignment.resolution, EndResolution::SupersededCompleted);
        assert!(!assignment.is_continuation());
        assert!(engine.pending().get(USER, TwoStageKind::Raids).is_none());
    }

    #[tokio::test]
    async fn test_end_trusts_pending_when_listing_fails() {
        let disk = FakeDisk::with_files(FOLDER, &["5-1.jpg", "5-2.jpg"]);
        disk.set_fail_listing(true);
        let engine = EventEngine::in_memory();
        engine
            .pending()
            .insert(USER, TwoStageKind::Raids, 5, FOLDER, Utc::now());

        let assignment = engine
            .assign_number_for_end(&disk, USER, TwoStageKind::Raids, FOLDER)
            .await;
        assert_eq!(assignment.number, 5);
        assert_eq!(assignment.resolution, EndResolution::Continuation);
    }

    #[tokio::test]
    async fn test_end_closes_lowest_orphaned_event() {
        let disk = FakeDisk::with_files(FOLDER, &["4-1.jpg", "2-1.jpg", "1-1.jpg", "1-2.jpg"]);
        let engine = EventEngine::in_memory();

        let assignment = engine
            .assign_number_for_end(&disk, USER, TwoStageKind::Mp, FOLDER)
            .await;
        assert_eq!(assignment.number, 2);
        assert_eq!(assignment.resolution, EndResolution::Orphaned);
        assert!(assignment.is_continuation());
    }

    #[tokio::test]
    async fn test_end_without_open_event_is_fresh() {
        let disk = FakeDisk::with_files(FOLDER, &["1-1.jpg", "1-2.jpg", "2-1.jpg", "2-2.jpg"]);
        let engine = EventEngine::in_memory();

        let assignment = engine
            .assign_number_for_end(&disk, USER, TwoStageKind::Supplies, FOLDER)
            .await;
        assert_eq!(assignment.number, 3);
        assert_eq!(assignment.resolution, EndResolution::Fresh);
        assert!(!assignment.is_continuation());
    }

    #[tokio::test]
    async fn test_end_falls_back_when_listing_fails() {
        let disk = FakeDisk::new();
        disk.set_fail_listing(true);
        let engine = EventEngine::in_memory();

        let assignment = engine
            .assign_number_for_end(&disk, USER, TwoStageKind::Supplies, FOLDER)
            .await;
        assert_eq!(assignment.number, 1);
        assert_eq!(assignment.resolution, EndResolution::Fresh);
    }

    #[tokio::test]
    async fn test_start_then_end_round_trip() {
        let disk = FakeDisk::with_files(FOLDER, &["1-1.jpg", "1-2.jpg"]);
        let engine = EventEngine::in_memory();

        let started = engine
            .assign_number_for_start(&disk, USER, TwoStageKind::Raids, FOLDER)
            .await;
        disk.add_file(FOLDER, &format!("{started}-1.jpg"));

        let ended = engine
            .assign_number_for_end(&disk, USER, TwoStageKind::Raids, FOLDER)
            .await;
        assert_eq!(ended.number, started);
        assert_eq!(ended.resolution, EndResolution::Continuation);
    }

    #[tokio::test]
    async fn test_second_start_replaces_pending_entry() {
        let disk = FakeDisk::new();
        let engine = EventEngine::in_memory();

        let first = engine
            .assign_number_for_start(&disk, USER, TwoStageKind::Raids, FOLDER)
            .await;
        disk.add_file(FOLDER, &format!("{first}-1.jpg"));
        let second = engine
            .assign_number_for_start(&disk, USER, TwoStageKind::Raids, FOLDER)
            .await;

        assert_eq!((first, second), (1, 2));
        let pending = engine.pending_for_user(USER);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_number, 2);
    }

    #[tokio::test]
    async fn test_release_start_only_drops_matching_number() {
        let disk = FakeDisk::new();
        let engine = EventEngine::in_memory();

        let number = engine
            .assign_number_for_start(&disk, USER, TwoStageKind::Mp, FOLDER)
            .await;
        assert!(!engine.release_start(USER, TwoStageKind::Mp, number + 1).await);
        assert!(engine.pending().get(USER, TwoStageKind::Mp).is_some());

        assert!(engine.release_start(USER, TwoStageKind::Mp, number).await);
        assert!(engine.pending().get(USER, TwoStageKind::Mp).is_none());
    }

    #[tokio::test]
    async fn test_concurrent_assignments_for_one_key_are_serialized() {
        let disk = Arc::new(FakeDisk::with_files(FOLDER, &["5-1.jpg"]));
        let engine = Arc::new(EventEngine::in_memory());
        engine
            .pending()
            .insert(USER, TwoStageKind::Raids, 5, FOLDER, Utc::now());

        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let disk = Arc::clone(&disk);
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    engine
                        .assign_number_for_end(disk.as_ref(), USER, TwoStageKind::Raids, FOLDER)
                        .await
                })
            })
            .collect();

        let mut resolutions = Vec::new();
        for task in tasks {
            let assignment = task.await.unwrap();
            assert_eq!(assignment.number, 5);
            resolutions.push(assignment.resolution);
        }
        resolutions.sort_by_key(|resolution| format!("{resolution:?}"));

        // Exactly one call consumed the pending entry
        assert_eq!(
            resolutions,
            vec![EndResolution::Continuation, EndResolution::Orphaned]
        );
        assert!(engine.pending_for_user(USER).is_empty());
    }

    #[tokio::test]
    async fn test_list_unfinished_and_summary() {
        let disk = FakeDisk::with_files(
            FOLDER,
            &["1-1.jpg", "1-2.jpg", "2-1.jpg", "4-1.JPG", "4-2.jpeg", "README.md"],
        );
        let engine = EventEngine::in_memory();

        assert_eq!(engine.list_unfinished(&disk, FOLDER).await.unwrap(), vec![2]);
        assert_eq!(
            engine.summarize(&disk, FOLDER).await.unwrap(),
            EventSummary {
                total: 3,
                completed: 2,
                incomplete: 1,
                end_only: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_summary_counts_end_without_start_separately() {
        let disk = FakeDisk::with_files(FOLDER, &["1-1.jpg", "2-2.png"]);
        let engine = EventEngine::in_memory();

        let summary = engine.summarize(&disk, FOLDER).await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.incomplete, 1);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.end_only, 1);
    }

    #[tokio::test]
    async fn test_listing_errors_propagate_from_reports() {
        let disk = FakeDisk::new();
        disk.set_fail_listing(true);
        let engine = EventEngine::in_memory();

        assert!(engine.list_unfinished(&disk, FOLDER).await.is_err());
        assert!(engine.summarize(&disk, FOLDER).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_folder_is_an_empty_listing() {
        let disk = FakeDisk::new();
        let engine = EventEngine::in_memory();

        assert!(engine.list_unfinished(&disk, FOLDER).await.unwrap().is_empty());
        assert_eq!(engine.summarize(&disk, FOLDER).await.unwrap(), EventSummary::default());
    }

    #[tokio::test]
    async fn test_sweep_expired_pending_is_idempotent() {
        let engine = EventEngine::in_memory();
        let now = Utc::now();
        engine
            .pending()
            .insert(1, TwoStageKind::Raids, 1, FOLDER, now - Duration::hours(30));
        engine
            .pending()
            .insert(2, TwoStageKind::Raids, 1, FOLDER, now - Duration::hours(1));

        assert_eq!(engine.sweep_expired_pending(now, Duration::hours(24)), 1);
        assert_eq!(engine.sweep_expired_pending(now, Duration::hours(24)), 0);
        assert!(engine.pending().get(2, TwoStageKind::Raids).is_some());
    }

    #[tokio::test]
    async fn test_clear_pending_for_user() {
        let engine = EventEngine::in_memory();
        let now = Utc::now();
        engine.pending().insert(USER, TwoStageKind::Raids, 1, FOLDER, now);
        engine.pending().insert(USER, TwoStageKind::Mp, 2, FOLDER, now);

        assert_eq!(engine.clear_pending_for_user(USER), 2);
        assert_eq!(engine.clear_pending_for_user(USER), 0);
    }
}
