use chrono::{Datelike, Days, Months, NaiveDate, Weekday};

use crate::model::{Cadence, ClassSchedule, MAX_DURATION_WEEKS, SessionPlanEntry};

/// Upper bound on cursor steps; explicit end dates are not capped.
const MAX_STEPS: u32 = MAX_DURATION_WEEKS;

//
// ─── SESSION GENERATION ────────────────────────────────────────────────────────
//

/// Expand a class schedule into its concrete, ordered list of sessions.
///
/// A cursor walks from the start date, one week at a time (one month for
/// `Monthly`). When the cadence pins a weekday, the cursor first snaps forward
/// to that weekday. `Biweekly` keeps the weekly step and drops every second
/// candidate, so sessions land fourteen days apart only when a weekday is set
/// or the start date already falls on the rhythm.
///
/// * `topics` - explicit session topics. When present (and non-empty),
///   generation stops once they run out; otherwise topics are
///   `"Session {n}"`.
/// * `content_notes` - optional notes, matched to sessions by position.
///
/// A schedule without a start date yields no sessions. So does one whose end
/// date precedes its start. Neither is an error: callers decide whether a
/// short plan deserves a warning. The cursor advances at most `MAX_DURATION_WEEKS`
/// times.
///
/// # Examples
///
/// ```
/// # use chrono::NaiveDate;
/// # use disciple_core::model::{Cadence, ClassSchedule};
/// # use disciple_core::scheduler::generate_sessions;
/// let start = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
/// let schedule = ClassSchedule::new(Cadence::Weekly, Some(start), 3)?;
///
/// let sessions = generate_sessions(&schedule, None, None);
/// assert_eq!(sessions.len(), 3);
/// assert_eq!(sessions[0].session_date, start);
/// assert_eq!(sessions[2].topic.as_deref(), Some("Session 3"));
/// # Ok::<(), disciple_core::model::ScheduleError>(())
/// ```
#[must_use]
pub fn generate_sessions(
    schedule: &ClassSchedule,
    topics: Option<&[String]>,
    content_notes: Option<&[String]>,
) -> Vec<SessionPlanEntry> {
    let (Some(start), Some(last)) = (schedule.start_date(), schedule.last_eligible_date()) else {
        return Vec::new();
    };

    let topics = topics.filter(|t| !t.is_empty());
    let weekday = schedule.effective_weekday();
    let cadence = schedule.cadence();

    let mut sessions: Vec<SessionPlanEntry> = Vec::new();
    let mut cursor = start;
    let mut steps = 0_u32;
    let mut candidates = 0_u32;
    let mut topic_index = 0_usize;

    while cursor <= last && steps < MAX_STEPS {
        if topics.is_some_and(|t| topic_index >= t.len()) {
            break;
        }

        if let Some(day) = weekday {
            cursor = next_on_or_after(cursor, day);
            if cursor > last {
                break;
            }
        }

        candidates += 1;
        let included = cadence != Cadence::Biweekly || candidates % 2 == 1;

        if included {
            let sequence_number = u32::try_from(sessions.len() + 1).unwrap_or(u32::MAX);
            let topic = match topics {
                Some(list) => {
                    let topic = list[topic_index].clone();
                    topic_index += 1;
                    topic
                }
                None => format!("Session {sequence_number}"),
            };
            let notes = content_notes
                .and_then(|notes| notes.get(sessions.len()))
                .cloned();

            sessions.push(
                SessionPlanEntry::new(cursor, sequence_number)
                    .with_topic(topic)
                    .with_notes(notes),
            );
        }

        steps += 1;
        let next = match cadence {
            // Anchored on the start date so a 31st clamps per month without drifting.
            Cadence::Monthly => start.checked_add_months(Months::new(steps)),
            Cadence::Weekly | Cadence::Biweekly | Cadence::Custom => {
                cursor.checked_add_days(Days::new(7))
            }
        };
        match next {
            Some(next) => cursor = next,
            None => break,
        }
    }

    sessions
}

/// Number of sessions a schedule would produce with no topic list, if it can
/// be told from `duration_weeks` alone.
///
/// Returns `None` for monthly schedules, schedules with an explicit end date,
/// and schedules without a start date.
#[must_use]
pub fn expected_session_count(schedule: &ClassSchedule) -> Option<u32> {
    schedule.start_date()?;
    if schedule.explicit_end_date().is_some() {
        return None;
    }

    let weeks = schedule.duration_weeks();
    match schedule.cadence() {
        Cadence::Weekly | Cadence::Custom => Some(weeks),
        Cadence::Biweekly => Some(weeks.div_ceil(2)),
        Cadence::Monthly => None,
    }
}

fn next_on_or_after(date: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = date.weekday().num_days_from_monday();
    let target = weekday.num_days_from_monday();
    let ahead = (target + 7 - current) % 7;
    date.checked_add_days(Days::new(u64::from(ahead)))
        .unwrap_or(NaiveDate::MAX)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn topics(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn weekly_without_weekday_yields_duration_sessions_seven_days_apart() {
        let start = date(2024, 3, 5);
        for weeks in [1, 4, 12, 52] {
            let schedule = ClassSchedule::new(Cadence::Weekly, Some(start), weeks).unwrap();
            let sessions = generate_sessions(&schedule, None, None);

            assert_eq!(sessions.len(), weeks as usize);
            assert_eq!(sessions[0].session_date, start);
            for pair in sessions.windows(2) {
                assert_eq!(pair[1].session_date - pair[0].session_date, Duration::days(7));
            }
        }
    }

    #[test]
    fn biweekly_eight_weeks_yields_four_sessions() {
        let start = date(2024, 1, 1);
        let schedule = ClassSchedule::new(Cadence::Biweekly, Some(start), 8).unwrap();
        let sessions = generate_sessions(&schedule, None, None);

        let dates: Vec<NaiveDate> = sessions.iter().map(|s| s.session_date).collect();
        assert_eq!(
            dates,
            vec![
                date(2024, 1, 1),
                date(2024, 1, 15),
                date(2024, 1, 29),
                date(2024, 2, 12)
            ]
        );
        let seq: Vec<u32> = sessions.iter().map(|s| s.sequence_number).collect();
        assert_eq!(seq, vec![1, 2, 3, 4]);
        assert_eq!(sessions[3].topic.as_deref(), Some("Session 4"));
    }

    #[test]
    fn biweekly_with_weekday_is_exactly_fortnightly() {
        // Monday start, Thursday meetings.
        let schedule = ClassSchedule::new(Cadence::Biweekly, Some(date(2024, 1, 1)), 10)
            .unwrap()
            .with_target_weekday(Weekday::Thu);
        let sessions = generate_sessions(&schedule, None, None);

        assert_eq!(sessions.len(), 5);
        assert_eq!(sessions[0].session_date, date(2024, 1, 4));
        for pair in sessions.windows(2) {
            assert_eq!(pair[1].session_date - pair[0].session_date, Duration::days(14));
            assert_eq!(pair[1].session_date.weekday(), Weekday::Thu);
        }
    }

    #[test]
    fn monthly_with_explicit_end_counts_months_inclusive() {
        let schedule = ClassSchedule::new(Cadence::Monthly, Some(date(2024, 1, 15)), 1)
            .unwrap()
            .with_end_date(date(2024, 4, 15));
        let sessions = generate_sessions(&schedule, None, None);

        let dates: Vec<NaiveDate> = sessions.iter().map(|s| s.session_date).collect();
        assert_eq!(
            dates,
            vec![
                date(2024, 1, 15),
                date(2024, 2, 15),
                date(2024, 3, 15),
                date(2024, 4, 15)
            ]
        );
    }

    #[test]
    fn monthly_month_end_start_does_not_drift() {
        let schedule = ClassSchedule::new(Cadence::Monthly, Some(date(2024, 1, 31)), 1)
            .unwrap()
            .with_end_date(date(2024, 4, 30));
        let dates: Vec<NaiveDate> = generate_sessions(&schedule, None, None)
            .iter()
            .map(|s| s.session_date)
            .collect();
        assert_eq!(
            dates,
            vec![
                date(2024, 1, 31),
                date(2024, 2, 29),
                date(2024, 3, 31),
                date(2024, 4, 30)
            ]
        );
    }

    #[test]
    fn monthly_ignores_pinned_weekday() {
        let schedule = ClassSchedule::new(Cadence::Monthly, Some(date(2024, 1, 15)), 1)
            .unwrap()
            .with_target_weekday(Weekday::Sun)
            .with_end_date(date(2024, 2, 20));
        let sessions = generate_sessions(&schedule, None, None);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_date, date(2024, 1, 15));
    }

    #[test]
    fn missing_start_date_yields_nothing() {
        let schedule = ClassSchedule::new(Cadence::Weekly, None, 6).unwrap();
        assert!(generate_sessions(&schedule, None, None).is_empty());
        assert!(generate_sessions(&schedule, Some(topics(&["A"]).as_slice()), None).is_empty());
    }

    #[test]
    fn far_off_end_date_is_bounded() {
        let schedule = ClassSchedule::new(Cadence::Weekly, Some(date(2024, 1, 1)), 1)
            .unwrap()
            .with_end_date(NaiveDate::MAX);
        let sessions = generate_sessions(&schedule, None, None);
        assert_eq!(sessions.len(), MAX_STEPS as usize);
        assert_eq!(sessions[1].session_date, date(2024, 1, 8));
    }

    #[test]
    fn end_before_start_yields_nothing() {
        let schedule = ClassSchedule::new(Cadence::Weekly, Some(date(2024, 6, 1)), 4)
            .unwrap()
            .with_end_date(date(2024, 5, 1));
        assert!(generate_sessions(&schedule, None, None).is_empty());
    }

    #[test]
    fn weekday_snap_past_end_stops() {
        // Saturday start, Friday meetings, explicit end on the following Thursday.
        let schedule = ClassSchedule::new(Cadence::Weekly, Some(date(2024, 1, 6)), 1)
            .unwrap()
            .with_target_weekday(Weekday::Fri)
            .with_end_date(date(2024, 1, 11));
        assert!(generate_sessions(&schedule, None, None).is_empty());
    }

    #[test]
    fn weekly_with_weekday_snaps_and_never_duplicates_dates() {
        let schedule = ClassSchedule::new(Cadence::Weekly, Some(date(2024, 1, 1)), 4)
            .unwrap()
            .with_target_weekday(Weekday::Wed);
        let sessions = generate_sessions(&schedule, None, None);

        let dates: Vec<NaiveDate> = sessions.iter().map(|s| s.session_date).collect();
        assert_eq!(
            dates,
            vec![
                date(2024, 1, 3),
                date(2024, 1, 10),
                date(2024, 1, 17),
                date(2024, 1, 24)
            ]
        );
    }

    #[test]
    fn topic_list_supplies_topics_and_stops_when_exhausted() {
        let schedule = ClassSchedule::new(Cadence::Weekly, Some(date(2024, 1, 1)), 10).unwrap();
        let list = topics(&["Salvation", "Prayer", "Scripture"]);
        let sessions = generate_sessions(&schedule, Some(list.as_slice()), None);

        assert_eq!(sessions.len(), 3);
        let names: Vec<&str> = sessions.iter().filter_map(|s| s.topic.as_deref()).collect();
        assert_eq!(names, vec!["Salvation", "Prayer", "Scripture"]);
    }

    #[test]
    fn end_date_stops_before_topics_run_out() {
        let schedule = ClassSchedule::new(Cadence::Weekly, Some(date(2024, 1, 1)), 2).unwrap();
        let list = topics(&["One", "Two", "Three", "Four"]);
        assert_eq!(generate_sessions(&schedule, Some(list.as_slice()), None).len(), 2);
    }

    #[test]
    fn biweekly_skips_do_not_consume_topics() {
        let schedule = ClassSchedule::new(Cadence::Biweekly, Some(date(2024, 1, 1)), 20).unwrap();
        let list = topics(&["A", "B", "C"]);
        let sessions = generate_sessions(&schedule, Some(list.as_slice()), None);

        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions[1].topic.as_deref(), Some("B"));
        assert_eq!(sessions[1].session_date, date(2024, 1, 15));
    }

    #[test]
    fn empty_topic_list_behaves_like_none() {
        let schedule = ClassSchedule::new(Cadence::Weekly, Some(date(2024, 1, 1)), 3).unwrap();
        let sessions = generate_sessions(&schedule, Some(&[][..]), None);
        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions[0].topic.as_deref(), Some("Session 1"));
    }

    #[test]
    fn notes_follow_emitted_sessions_by_position() {
        let schedule = ClassSchedule::new(Cadence::Biweekly, Some(date(2024, 1, 1)), 6).unwrap();
        let notes = topics(&["bring a bible", "read John 3"]);
        let sessions = generate_sessions(&schedule, None, Some(notes.as_slice()));

        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions[0].notes.as_deref(), Some("bring a bible"));
        assert_eq!(sessions[1].notes.as_deref(), Some("read John 3"));
        assert_eq!(sessions[2].notes, None);
    }

    #[test]
    fn custom_cadence_walks_weekly() {
        let schedule = ClassSchedule::new(Cadence::Custom, Some(date(2024, 1, 1)), 3).unwrap();
        let sessions = generate_sessions(&schedule, None, None);
        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions[2].session_date, date(2024, 1, 15));
    }

    #[test]
    fn dates_are_non_decreasing_and_sequence_is_dense() {
        for cadence in [
            Cadence::Weekly,
            Cadence::Biweekly,
            Cadence::Monthly,
            Cadence::Custom,
        ] {
            let schedule = ClassSchedule::new(cadence, Some(date(2024, 2, 29)), 30)
                .unwrap()
                .with_target_weekday(Weekday::Sun);
            let sessions = generate_sessions(&schedule, None, None);
            assert!(!sessions.is_empty());
            for (i, s) in sessions.iter().enumerate() {
                assert_eq!(s.sequence_number as usize, i + 1);
            }
            for pair in sessions.windows(2) {
                assert!(pair[0].session_date < pair[1].session_date);
            }
        }
    }

    #[test]
    fn expected_count_matches_generation() {
        let start = Some(date(2024, 1, 1));
        let weekly = ClassSchedule::new(Cadence::Weekly, start, 6).unwrap();
        assert_eq!(expected_session_count(&weekly), Some(6));

        let biweekly = ClassSchedule::new(Cadence::Biweekly, start, 7).unwrap();
        assert_eq!(expected_session_count(&biweekly), Some(4));
        assert_eq!(generate_sessions(&biweekly, None, None).len(), 4);

        let monthly = ClassSchedule::new(Cadence::Monthly, start, 7).unwrap();
        assert_eq!(expected_session_count(&monthly), None);

        let unscheduled = ClassSchedule::new(Cadence::Weekly, None, 7).unwrap();
        assert_eq!(expected_session_count(&unscheduled), None);
    }
}
