use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use dossier_core::edit::{event_record, EditPhase, SaveOutcome};
use dossier_core::models::{Actor, EventPatch, NewEvent, Priority, Severity};
use dossier_core::store::{EventStore, InMemoryEventStore};
use dossier_core::{
    Candidate, ConflictDetector, EngineConfig, ScheduledEvent, SchedulingService,
    SuggestionConstraints, SuggestionRanker, TimeInterval,
};

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, minute, 0).unwrap()
}

fn interval(day: u32, start: (u32, u32), end: (u32, u32)) -> TimeInterval {
    TimeInterval::new(at(day, start.0, start.1), at(day, end.0, end.1)).unwrap()
}

fn booking(
    title: &str,
    interval: TimeInterval,
    venue: &str,
    people: &[&str],
    priority: Priority,
) -> NewEvent {
    NewEvent {
        title: title.to_string(),
        interval,
        venue: Some(venue.to_string()),
        participant_ids: people.iter().map(|p| (*p).to_string()).collect(),
        optional_participant_ids: BTreeSet::new(),
        organizer_id: None,
        resource_ids: BTreeSet::new(),
        priority,
    }
}

/// A busy Monday and Tuesday for a small protocol office.
fn busy_week() -> Vec<ScheduledEvent> {
    let actor = Actor::new("planner");
    let monday = [
        ("Credentials", (9, 0), (10, 0), "Hall", &["amb", "chief"][..], Priority::Critical),
        ("Press", (10, 30), (11, 30), "Room A", &["spokes"][..], Priority::Medium),
        ("Lunch", (12, 0), (13, 30), "Residence", &["amb"][..], Priority::Low),
        ("Cabinet", (14, 0), (15, 0), "Hall", &["chief"][..], Priority::High),
    ];
    let tuesday = [
        ("Visa review", (9, 0), (12, 0), "Room A", &["consul"][..], Priority::Medium),
        ("Trade", (13, 0), (14, 0), "Room B", &["amb", "consul"][..], Priority::High),
    ];

    monday
        .into_iter()
        .map(|entry| (3, entry))
        .chain(tuesday.into_iter().map(|entry| (4, entry)))
        .map(|(day, (title, start, end, venue, people, priority))| {
            let slot = interval(day, start, end);
            ScheduledEvent::from_new(booking(title, slot, venue, people, priority), &actor)
        })
        .collect()
}

fn sample_intervals() -> Vec<TimeInterval> {
    let mut intervals = Vec::new();
    for start in (0..8).map(|step| at(3, 9, 0) + Duration::minutes(step * 45)) {
        for minutes in [15, 30, 60, 120] {
            intervals.push(TimeInterval::from_start_and_duration(start, minutes).unwrap());
        }
    }
    intervals
}

#[test]
fn overlap_is_symmetric_and_reflexive() {
    let intervals = sample_intervals();
    for a in &intervals {
        assert!(a.overlaps(a));
        for b in &intervals {
            assert_eq!(a.overlaps(b), b.overlaps(a), "{a} vs {b}");
        }
    }
}

#[test]
fn back_to_back_intervals_never_overlap() {
    for minutes in [1, 30, 90] {
        let first = TimeInterval::from_start_and_duration(at(3, 9, 0), minutes).unwrap();
        let second = TimeInterval::from_start_and_duration(first.end(), minutes).unwrap();
        assert!(!first.overlaps(&second));
        assert!(!second.overlaps(&first));
    }
}

#[test]
fn inverted_or_empty_interval_is_rejected() {
    assert!(TimeInterval::new(at(3, 10, 0), at(3, 10, 0)).is_err());
    assert!(TimeInterval::new(at(3, 11, 0), at(3, 10, 0)).is_err());
}

#[test]
fn room_clash_example() {
    let actor = Actor::new("planner");
    let existing = vec![ScheduledEvent::from_new(
        booking("Press", interval(3, (10, 30), (11, 30)), "Room A", &[], Priority::Medium),
        &actor,
    )];
    let candidate = Candidate::new(interval(3, (10, 0), (11, 0))).with_venue("Room A");

    let report = ConflictDetector::default().detect(&candidate, &existing);

    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].severity, Severity::High);
    assert_eq!(report.conflicts[0].overlap_interval, interval(3, (10, 30), (11, 0)));
    assert_eq!(report.count(Severity::High), 1);
}

#[test]
fn detection_is_deterministic() {
    let config = EngineConfig::default();
    let detector = ConflictDetector::from_config(&config);
    let existing = busy_week();
    let mut shuffled = existing.clone();
    shuffled.reverse();

    for candidate_interval in sample_intervals() {
        let candidate = Candidate::new(candidate_interval)
            .with_venue("Hall")
            .with_participants(["amb", "chief"]);
        let first = detector.detect(&candidate, &existing);
        let second = detector.detect(&candidate, &existing);
        let reordered = detector.detect(&candidate, &shuffled);

        assert_eq!(first, second);
        assert_eq!(first.conflicts, reordered.conflicts);
        assert_eq!(
            serde_json::to_string(&first.severity_summary).unwrap(),
            serde_json::to_string(&reordered.severity_summary).unwrap()
        );
    }
}

#[test]
fn suggestions_never_carry_high_or_critical_conflicts() {
    let config = EngineConfig::default();
    let ranker = SuggestionRanker::from_config(&config);
    let existing = busy_week();
    let candidates = [
        Candidate::new(interval(3, (9, 0), (10, 0)))
            .with_venue("Hall")
            .with_participants(["chief"]),
        Candidate::new(interval(4, (10, 0), (11, 0)))
            .with_venue("Room A")
            .with_participants(["consul", "amb"]),
        Candidate::new(interval(3, (12, 30), (13, 0))).with_participants(["amb"]),
    ];

    for candidate in candidates {
        let conflicts = ranker.detector().detect(&candidate, &existing).conflicts;
        let constraints = SuggestionConstraints::from_config(
            candidate.interval.duration_minutes(),
            &config,
        )
        .with_required_participants(candidate.participant_ids.iter().cloned())
        .with_alternative_venues(["Room C"])
        .with_max_suggestions(10);

        let suggestions = ranker
            .suggest(&candidate, &conflicts, &constraints, &existing)
            .unwrap();
        assert!(!suggestions.is_empty());

        for suggestion in &suggestions {
            let venue = suggestion
                .alternative_venue
                .clone()
                .or_else(|| candidate.venue.clone());
            let probe = candidate.rescheduled(suggestion.interval, venue);
            let report = ranker.detector().detect(&probe, &existing);
            assert!(!report.has_conflict_at_least(Severity::High), "{}", suggestion.interval);
        }

        for pair in suggestions.windows(2) {
            let (left, right) = (&pair[0], &pair[1]);
            assert!(left.overall_score >= right.overall_score);
            if (left.overall_score - right.overall_score).abs() < f64::EPSILON
                && left.alternative_venue == right.alternative_venue
            {
                assert!(left.interval.start() <= right.interval.start());
            }
        }
    }
}

#[test]
fn busy_participant_example() {
    let actor = Actor::new("planner");
    let existing = vec![ScheduledEvent::from_new(
        booking("Cabinet", interval(3, (14, 0), (15, 0)), "Hall", &["A"], Priority::High),
        &actor,
    )];
    let candidate = Candidate::new(interval(3, (14, 0), (15, 0))).with_participants(["A", "B"]);
    let config = EngineConfig::default();
    let ranker = SuggestionRanker::from_config(&config);
    let constraints =
        SuggestionConstraints::from_config(60, &config).with_required_participants(["A", "B"]);

    let suggestions = ranker.suggest(&candidate, &[], &constraints, &existing).unwrap();

    let first = &suggestions[0];
    assert!(!first.interval.overlaps(&existing[0].interval));
    assert!((first.availability_score - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn edit_conflict_round_trip_through_service() {
    let store = Arc::new(InMemoryEventStore::with_events(busy_week()));
    let service = SchedulingService::new(store.clone(), EngineConfig::default()).unwrap();
    let target = store.snapshot().await.into_iter().find(|e| e.title == "Press").unwrap();

    let mut mine = service.edit_session(target.id).await.unwrap();
    let mut theirs = service.edit_session(target.id).await.unwrap();
    mine.set_field("venue", "Room C").unwrap();
    mine.set_field("title", "Press (moved)").unwrap();
    theirs.set_field("venue", "Room D").unwrap();

    assert!(matches!(
        theirs.save(store.as_ref(), &Actor::new("colleague")).await.unwrap(),
        SaveOutcome::Saved(_)
    ));
    let outcome = mine.save(store.as_ref(), &Actor::new("me")).await.unwrap();
    let SaveOutcome::Conflict(conflict) = outcome else {
        panic!("expected an edit conflict");
    };
    assert_eq!(
        conflict.conflicting_fields,
        BTreeSet::from(["title".to_string(), "venue".to_string()])
    );

    let local = mine.local_changes().clone();
    mine.force_overwrite(store.as_ref(), &Actor::new("me")).await.unwrap();
    assert_eq!(mine.phase(), EditPhase::Overwritten);

    let server = event_record(&store.get(target.id).await.unwrap()).unwrap();
    for field in &conflict.conflicting_fields {
        assert_eq!(server.get(field), local.get(field));
    }
}

#[tokio::test]
async fn store_rejects_stale_versions_from_any_client() {
    let store = InMemoryEventStore::with_events(busy_week());
    let target = store.snapshot().await.remove(0);
    let patch = EventPatch {
        priority: Some(Priority::Low),
        ..EventPatch::default()
    };

    store
        .update(target.id, &patch, target.version, &Actor::new("a"))
        .await
        .unwrap();
    assert!(store
        .update(target.id, &patch, target.version, &Actor::new("b"))
        .await
        .is_err());
}
