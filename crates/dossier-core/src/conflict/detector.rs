//! Time-window conflict detection

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Datelike, Offset, Utc};

use super::travel::TravelModel;
use crate::config::{ConflictRule, EngineConfig, HolidayCalendar, SeverityPolicy, WorkingHours};
use crate::models::{Candidate, Conflict, DetectionReport, ScheduledEvent, TimeInterval};
use crate::util::same_venue;

const DEFAULT_TRAVEL_BUFFER_MINUTES: u32 = 15;

/// Pure conflict detector.
///
/// Holds only read-only policy; `detect` has no side effects and can be
/// called speculatively on every form edit.
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    severity_policy: SeverityPolicy,
    holidays: HolidayCalendar,
    working_hours: Option<WorkingHours>,
    travel_buffer_minutes: u32,
    travel_model: Option<Arc<dyn TravelModel>>,
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new(SeverityPolicy::default())
    }
}

impl ConflictDetector {
    pub fn new(severity_policy: SeverityPolicy) -> Self {
        Self {
            severity_policy,
            holidays: HolidayCalendar::default(),
            working_hours: None,
            travel_buffer_minutes: DEFAULT_TRAVEL_BUFFER_MINUTES,
            travel_model: None,
        }
    }

    /// Detector wired with every policy from the engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            severity_policy: config.severity_policy.clone(),
            holidays: config.holidays.clone(),
            working_hours: Some(config.working_hours.clone()),
            travel_buffer_minutes: config.travel_buffer_minutes,
            travel_model: None,
        }
    }

    #[must_use]
    pub fn with_holidays(mut self, holidays: HolidayCalendar) -> Self {
        self.holidays = holidays;
        self
    }

    #[must_use]
    pub fn with_working_hours(mut self, working_hours: WorkingHours) -> Self {
        self.working_hours = Some(working_hours);
        self
    }

    #[must_use]
    pub const fn with_travel_buffer_minutes(mut self, minutes: u32) -> Self {
        self.travel_buffer_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_travel_model(mut self, model: Arc<dyn TravelModel>) -> Self {
        self.travel_model = Some(model);
        self
    }

    pub const fn severity_policy(&self) -> &SeverityPolicy {
        &self.severity_policy
    }

    pub fn travel_model(&self) -> Option<&dyn TravelModel> {
        self.travel_model.as_deref()
    }

    pub const fn travel_buffer_minutes(&self) -> u32 {
        self.travel_buffer_minutes
    }

    /// Check `candidate` against `existing` and classify every clash.
    pub fn detect(&self, candidate: &Candidate, existing: &[ScheduledEvent]) -> DetectionReport {
        let mut conflicts = Vec::new();
        let mut warnings = Vec::new();

        for event in existing {
            if candidate.exclude_event_id == Some(event.id) {
                continue;
            }
            match candidate.interval.intersection(&event.interval) {
                Some(overlap) => self.overlap_conflicts(candidate, event, overlap, &mut conflicts),
                None => self.travel_check(candidate, event, &mut conflicts, &mut warnings),
            }
        }

        self.holiday_conflicts(candidate, &mut conflicts);
        self.working_hours_warnings(candidate, &mut warnings);

        conflicts.sort_by(conflict_order);
        tracing::debug!(
            "Conflict check over {} events found {} conflicts and {} warnings",
            existing.len(),
            conflicts.len(),
            warnings.len()
        );
        DetectionReport::new(conflicts, warnings)
    }

    fn overlap_conflicts(
        &self,
        candidate: &Candidate,
        event: &ScheduledEvent,
        overlap: TimeInterval,
        conflicts: &mut Vec<Conflict>,
    ) {
        if same_venue(candidate.venue.as_deref(), event.venue.as_deref()) {
            let venue = event.venue.as_deref().unwrap_or_default().trim();
            conflicts.push(self.conflict(
                ConflictRule::Venue,
                overlap,
                Some(event),
                BTreeSet::new(),
                format!("Venue '{venue}' is already booked for '{}'", event.title),
            ));
        }

        let mut organizer_clash = None;
        if let Some(organizer) = candidate.organizer_id.as_deref() {
            if event.involves(organizer) {
                organizer_clash = Some(organizer);
                conflicts.push(self.conflict(
                    ConflictRule::Organizer,
                    overlap,
                    Some(event),
                    BTreeSet::from([organizer.to_string()]),
                    format!(
                        "Organizer '{organizer}' is already committed to '{}'",
                        event.title
                    ),
                ));
            }
        }

        let shared = candidate
            .attendees()
            .into_iter()
            .filter(|person| Some(*person) != organizer_clash && event.involves(person))
            .map(str::to_string)
            .collect::<BTreeSet<_>>();
        if !shared.is_empty() {
            let rule = if shared.iter().all(|person| candidate.is_optional_only(person)) {
                ConflictRule::OptionalParticipant
            } else {
                ConflictRule::Participant
            };
            let names = shared.iter().cloned().collect::<Vec<_>>().join(", ");
            let message = format!(
                "{} participant(s) already attending '{}': {names}",
                shared.len(),
                event.title
            );
            conflicts.push(self.conflict(rule, overlap, Some(event), shared, message));
        }

        let resources = candidate
            .resource_ids
            .intersection(&event.resource_ids)
            .cloned()
            .collect::<Vec<_>>();
        if !resources.is_empty() {
            conflicts.push(self.conflict(
                ConflictRule::Resource,
                overlap,
                Some(event),
                BTreeSet::new(),
                format!(
                    "Resource(s) already reserved for '{}': {}",
                    event.title,
                    resources.join(", ")
                ),
            ));
        }
    }

    fn travel_check(
        &self,
        candidate: &Candidate,
        event: &ScheduledEvent,
        conflicts: &mut Vec<Conflict>,
        warnings: &mut Vec<String>,
    ) {
        let (Some(candidate_venue), Some(event_venue)) =
            (candidate.venue.as_deref(), event.venue.as_deref())
        else {
            return;
        };
        if same_venue(Some(candidate_venue), Some(event_venue)) {
            return;
        }

        let mut people = candidate.attendees();
        if let Some(organizer) = candidate.organizer_id.as_deref() {
            people.insert(organizer);
        }
        let shared = people
            .into_iter()
            .filter(|person| event.involves(person))
            .map(str::to_string)
            .collect::<BTreeSet<_>>();
        if shared.is_empty() {
            return;
        }

        let (earlier, later) = if event.interval.end() <= candidate.interval.start() {
            (&event.interval, &candidate.interval)
        } else {
            (&candidate.interval, &event.interval)
        };
        let Some(gap) = earlier.gap_minutes_until(later) else {
            return;
        };

        let transit = self
            .travel_model
            .as_ref()
            .and_then(|model| model.transit_minutes(event_venue, candidate_venue));

        match transit {
            Some(transit) if i64::from(transit) > gap => {
                let Ok(window) = TimeInterval::from_start_and_duration(
                    earlier.end(),
                    i64::from(transit),
                ) else {
                    return;
                };
                conflicts.push(self.conflict(
                    ConflictRule::TravelTime,
                    window,
                    Some(event),
                    shared,
                    format!(
                        "Only {gap} min between '{}' at {event_venue} and {candidate_venue}; transit needs {transit} min",
                        event.title
                    ),
                ));
            }
            Some(_) => {}
            None if gap < i64::from(self.travel_buffer_minutes) => {
                warnings.push(format!(
                    "No travel buffer: only {gap} min between '{}' at {event_venue} and {candidate_venue} (buffer is {} min)",
                    event.title, self.travel_buffer_minutes
                ));
            }
            None => {}
        }
    }

    fn holiday_conflicts(&self, candidate: &Candidate, conflicts: &mut Vec<Conflict>) {
        let offset = self
            .working_hours
            .as_ref()
            .map_or_else(|| Utc.fix(), WorkingHours::offset);
        for (date, name, overlap) in self.holidays.holidays_within(&candidate.interval, offset) {
            conflicts.push(self.conflict(
                ConflictRule::Holiday,
                overlap,
                None,
                BTreeSet::new(),
                format!("Falls on {name} ({date})"),
            ));
        }
    }

    fn working_hours_warnings(&self, candidate: &Candidate, warnings: &mut Vec<String>) {
        let Some(hours) = self.working_hours.as_ref() else {
            return;
        };
        if hours.contains(&candidate.interval) {
            return;
        }

        let date = hours.local_date(candidate.interval.start());
        if hours.is_working_day(date) {
            warnings.push(format!(
                "Outside working hours ({} to {})",
                hours.start.format("%H:%M"),
                hours.end.format("%H:%M")
            ));
        } else {
            warnings.push(format!("Scheduled on a non-working day ({})", date.weekday()));
        }
    }

    fn conflict(
        &self,
        rule: ConflictRule,
        overlap_interval: TimeInterval,
        event: Option<&ScheduledEvent>,
        affected_participant_ids: BTreeSet<String>,
        message: String,
    ) -> Conflict {
        Conflict {
            conflict_type: rule.conflict_type(),
            severity: self.severity_policy.severity_for(rule),
            overlap_interval,
            conflicting_event_id: event.map(|event| event.id),
            conflicting_event_title: event.map(|event| event.title.clone()),
            affected_participant_ids,
            message,
        }
    }
}

/// Most severe first, then chronological, then by type and event id.
fn conflict_order(left: &Conflict, right: &Conflict) -> Ordering {
    right
        .severity
        .cmp(&left.severity)
        .then_with(|| left.overlap_interval.cmp(&right.overlap_interval))
        .then_with(|| left.conflict_type.cmp(&right.conflict_type))
        .then_with(|| left.conflicting_event_id.cmp(&right.conflicting_event_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::TransitTable;
    use crate::models::{ConflictType, EventId, Priority, Severity};
    use chrono::{DateTime, NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, hour, minute, 0).unwrap()
    }

    fn interval(start: (u32, u32), end: (u32, u32)) -> TimeInterval {
        TimeInterval::new(at(start.0, start.1), at(end.0, end.1)).unwrap()
    }

    fn event(title: &str, start: (u32, u32), end: (u32, u32)) -> ScheduledEvent {
        ScheduledEvent {
            id: EventId::new(),
            title: title.to_string(),
            interval: interval(start, end),
            venue: None,
            participant_ids: BTreeSet::new(),
            optional_participant_ids: BTreeSet::new(),
            organizer_id: None,
            resource_ids: BTreeSet::new(),
            priority: Priority::Medium,
            version: 1,
            updated_at: 0,
            created_by: None,
            updated_by: None,
        }
    }

    fn with_venue(mut event: ScheduledEvent, venue: &str) -> ScheduledEvent {
        event.venue = Some(venue.to_string());
        event
    }

    fn with_people(mut event: ScheduledEvent, people: &[&str]) -> ScheduledEvent {
        event.participant_ids = people.iter().map(|p| (*p).to_string()).collect();
        event
    }

    #[test]
    fn venue_clash_reports_overlap_window() {
        let detector = ConflictDetector::default();
        let candidate = Candidate::new(interval((10, 0), (11, 0))).with_venue("Room A");
        let existing = vec![with_venue(event("Trade briefing", (10, 30), (11, 30)), "Room A")];

        let report = detector.detect(&candidate, &existing);

        assert!(report.has_conflicts);
        assert_eq!(report.conflicts.len(), 1);
        let conflict = &report.conflicts[0];
        assert_eq!(conflict.conflict_type, ConflictType::Venue);
        assert_eq!(conflict.severity, Severity::High);
        assert_eq!(conflict.overlap_interval, interval((10, 30), (11, 0)));
        assert_eq!(conflict.conflicting_event_id, Some(existing[0].id));
        assert_eq!(report.count(Severity::High), 1);
    }

    #[test]
    fn empty_existing_set_has_no_conflicts() {
        let detector = ConflictDetector::default();
        let candidate = Candidate::new(interval((10, 0), (11, 0))).with_venue("Room A");
        let report = detector.detect(&candidate, &[]);
        assert!(!report.has_conflicts);
        assert!(report.conflicts.is_empty());
    }

    #[test]
    fn back_to_back_events_in_same_venue_do_not_conflict() {
        let detector = ConflictDetector::default();
        let first = with_venue(event("First", (9, 0), (9, 30)), "Room A");
        let second = with_venue(event("Second", (9, 30), (10, 0)), "Room A");

        let report = detector.detect(&Candidate::from_event(&second), &[first]);
        assert!(!report.has_conflicts);
    }

    #[test]
    fn participant_overlap_lists_intersection() {
        let detector = ConflictDetector::default();
        let candidate =
            Candidate::new(interval((10, 0), (11, 0))).with_participants(["amb", "attache"]);
        let existing = vec![with_people(event("Reception", (10, 45), (12, 0)), &["attache", "consul"])];

        let report = detector.detect(&candidate, &existing);

        assert_eq!(report.conflicts.len(), 1);
        let conflict = &report.conflicts[0];
        assert_eq!(conflict.conflict_type, ConflictType::Participant);
        assert_eq!(conflict.severity, Severity::Medium);
        assert_eq!(
            conflict.affected_participant_ids,
            BTreeSet::from(["attache".to_string()])
        );
    }

    #[test]
    fn optional_only_overlap_uses_optional_rule() {
        let detector = ConflictDetector::default();
        let candidate = Candidate::new(interval((10, 0), (11, 0)))
            .with_participants(["amb"])
            .with_optional_participants(["intern"]);
        let existing = vec![with_people(event("Workshop", (10, 0), (11, 0)), &["intern"])];

        let report = detector.detect(&candidate, &existing);

        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].severity, Severity::Low);
    }

    #[test]
    fn organizer_double_booking_is_critical_and_not_double_counted() {
        let detector = ConflictDetector::default();
        let candidate = Candidate::new(interval((10, 0), (11, 0)))
            .with_organizer("minister")
            .with_participants(["minister"]);
        let existing = vec![with_people(event("Cabinet", (10, 30), (11, 30)), &["minister"])];

        let report = detector.detect(&candidate, &existing);

        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].conflict_type, ConflictType::Organizer);
        assert_eq!(report.conflicts[0].severity, Severity::Critical);
    }

    #[test]
    fn shared_resource_is_reported() {
        let detector = ConflictDetector::default();
        let candidate = Candidate::new(interval((10, 0), (11, 0))).with_resources(["interpreter-ar"]);
        let mut booked = event("Press conference", (10, 0), (10, 30));
        booked.resource_ids = BTreeSet::from(["interpreter-ar".to_string()]);

        let report = detector.detect(&candidate, &[booked]);

        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].conflict_type, ConflictType::Resource);
        assert_eq!(report.conflicts[0].severity, Severity::High);
    }

    #[test]
    fn severity_comes_from_injected_policy() {
        let policy = SeverityPolicy::default().with_rule(ConflictRule::Venue, Severity::Low);
        let detector = ConflictDetector::new(policy);
        let candidate = Candidate::new(interval((10, 0), (11, 0))).with_venue("Room A");
        let existing = vec![with_venue(event("Briefing", (10, 0), (11, 0)), "room a")];

        let report = detector.detect(&candidate, &existing);
        assert_eq!(report.conflicts[0].severity, Severity::Low);
    }

    #[test]
    fn edited_event_is_not_compared_with_itself() {
        let detector = ConflictDetector::default();
        let existing = with_venue(event("Summit", (10, 0), (11, 0)), "Hall");
        let report = detector.detect(&Candidate::from_event(&existing), &[existing]);
        assert!(!report.has_conflicts);
    }

    #[test]
    fn tight_venue_change_without_model_is_a_warning() {
        let detector = ConflictDetector::default().with_travel_buffer_minutes(30);
        let candidate = Candidate::new(interval((10, 0), (11, 0)))
            .with_venue("Ministry")
            .with_participants(["amb"]);
        let before = with_people(with_venue(event("Breakfast", (9, 0), (9, 50)), "Embassy"), &["amb"]);

        let report = detector.detect(&candidate, &[before]);

        assert!(!report.has_conflicts);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("No travel buffer"));
    }

    #[test]
    fn infeasible_transit_is_a_travel_conflict() {
        let model = Arc::new(TransitTable::new().with_route("Embassy", "Ministry", 40));
        let detector = ConflictDetector::default().with_travel_model(model);
        let candidate = Candidate::new(interval((10, 0), (11, 0)))
            .with_venue("Ministry")
            .with_participants(["amb"]);
        let before = with_people(with_venue(event("Breakfast", (9, 0), (9, 45)), "Embassy"), &["amb"]);

        let report = detector.detect(&candidate, &[before]);

        assert_eq!(report.conflicts.len(), 1);
        let conflict = &report.conflicts[0];
        assert_eq!(conflict.conflict_type, ConflictType::TravelTime);
        assert_eq!(conflict.severity, Severity::Low);
        assert_eq!(conflict.overlap_interval, interval((9, 45), (10, 25)));
    }

    #[test]
    fn holiday_is_a_conflict_without_event() {
        let mut holidays = HolidayCalendar::new();
        holidays.add_holiday(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(), "Founding Day");
        let detector = ConflictDetector::default().with_holidays(holidays);

        let report = detector.detect(&Candidate::new(interval((10, 0), (11, 0))), &[]);

        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].conflict_type, ConflictType::Holiday);
        assert_eq!(report.conflicts[0].conflicting_event_id, None);
    }

    #[test]
    fn outside_working_hours_is_only_a_warning() {
        let detector = ConflictDetector::default().with_working_hours(WorkingHours::default());
        let report = detector.detect(&Candidate::new(interval((18, 0), (19, 0))), &[]);
        assert!(!report.has_conflicts);
        assert_eq!(report.warnings, vec!["Outside working hours (09:00 to 17:00)".to_string()]);
    }

    #[test]
    fn detection_is_deterministic_and_sorted() {
        let detector = ConflictDetector::default();
        let candidate = Candidate::new(interval((10, 0), (12, 0)))
            .with_venue("Room A")
            .with_organizer("chief")
            .with_participants(["amb"]);
        let existing = vec![
            with_people(event("Late", (11, 30), (12, 30)), &["amb"]),
            with_venue(event("Early", (10, 0), (10, 30)), "Room A"),
            with_people(event("Chief call", (11, 0), (11, 15)), &["chief"]),
        ];

        let first = detector.detect(&candidate, &existing);
        let second = detector.detect(&candidate, &existing);
        assert_eq!(first, second);

        let severities = first
            .conflicts
            .iter()
            .map(|conflict| conflict.severity)
            .collect::<Vec<_>>();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::High, Severity::Medium]
        );
    }
}
