//! Per-category post-processing applied during aggregation

use crate::feeds::{CalendarEvent, TaskItem, TransitArrival};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Incomplete tasks due before `now + window`, overdue included, soonest first
pub fn urgent_tasks(tasks: &[TaskItem], now: DateTime<Utc>, window: Duration) -> Vec<TaskItem> {
    let cutoff = now + window;
    let mut urgent: Vec<TaskItem> = tasks
        .iter()
        .filter(|t| !t.completed && t.due.is_some_and(|due| due < cutoff))
        .cloned()
        .collect();
    urgent.sort_by_key(|t| t.due);
    urgent
}

/// Every incomplete task, dated ones first by due, undated last
pub fn open_tasks(tasks: &[TaskItem]) -> Vec<TaskItem> {
    let mut open: Vec<TaskItem> = tasks.iter().filter(|t| !t.completed).cloned().collect();
    open.sort_by_key(|t| (t.due.is_none(), t.due));
    open
}

/// Calendar section of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarView {
    pub next: Option<CalendarEvent>,
    pub upcoming: Vec<CalendarEvent>,
}

/// Events that have not ended, by start time, limited to `lookahead`
pub fn calendar_view(events: &[CalendarEvent], now: DateTime<Utc>, lookahead: usize) -> CalendarView {
    let mut live: Vec<CalendarEvent> = events.iter().filter(|e| e.end > now).cloned().collect();
    live.sort_by_key(|e| e.start);
    let next = live.first().cloned();
    live.truncate(lookahead);
    CalendarView {
        next,
        upcoming: live,
    }
}

/// Arrivals not yet departed, soonest first, with minutes until arrival
pub fn upcoming_arrivals(
    arrivals: &[TransitArrival],
    now: DateTime<Utc>,
    max: usize,
) -> Vec<TransitArrival> {
    let mut upcoming: Vec<TransitArrival> = arrivals
        .iter()
        .filter(|a| a.arrival >= now)
        .map(|a| TransitArrival {
            minutes_away: Some((a.arrival - now).num_minutes()),
            ..a.clone()
        })
        .collect();
    upcoming.sort_by_key(|a| a.arrival);
    upcoming.truncate(max);
    upcoming
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn task(id: &str, due: Option<DateTime<Utc>>, completed: bool) -> TaskItem {
        TaskItem {
            id: id.to_string(),
            title: id.to_string(),
            due,
            completed,
            priority: 1,
        }
    }

    fn event(id: &str, start_h: i64, end_h: i64) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            title: id.to_string(),
            location: None,
            start: now() + Duration::hours(start_h),
            end: now() + Duration::hours(end_h),
            all_day: false,
        }
    }

    fn arrival(route: &str, minutes: i64) -> TransitArrival {
        TransitArrival {
            route: route.to_string(),
            destination: None,
            arrival: now() + Duration::minutes(minutes),
            status: None,
            minutes_away: None,
        }
    }

    #[test]
    fn test_urgent_tasks_window() {
        let tasks = vec![
            task("later", Some(now() + Duration::hours(25)), false),
            task("soon", Some(now() + Duration::hours(23)), false),
            task("undated", None, false),
            task("done", Some(now()), true),
            task("overdue", Some(now() - Duration::hours(1)), false),
            task("edge", Some(now() + Duration::hours(24)), false),
        ];

        let urgent = urgent_tasks(&tasks, now(), Duration::hours(24));
        let ids: Vec<&str> = urgent.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["overdue", "soon"]);
    }

    #[test]
    fn test_open_tasks_puts_undated_last() {
        let tasks = vec![
            task("undated", None, false),
            task("b", Some(now() + Duration::hours(2)), false),
            task("a", Some(now() + Duration::hours(1)), false),
            task("done", Some(now()), true),
        ];

        let ids: Vec<String> = open_tasks(&tasks).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["a", "b", "undated"]);
    }

    #[test]
    fn test_calendar_view_skips_ended_and_limits() {
        let events = vec![
            event("third", 5, 6),
            event("ended", -3, -2),
            event("ongoing", -1, 1),
            event("second", 2, 3),
        ];

        let view = calendar_view(&events, now(), 2);
        assert_eq!(view.next.unwrap().id, "ongoing");
        let ids: Vec<&str> = view.upcoming.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["ongoing", "second"]);
    }

    #[test]
    fn test_calendar_view_next_survives_zero_lookahead() {
        let events = vec![event("second", 2, 3), event("first", 1, 2)];

        let view = calendar_view(&events, now(), 0);
        assert_eq!(view.next.map(|e| e.id).as_deref(), Some("first"));
        assert!(view.upcoming.is_empty());
    }

    #[test]
    fn test_calendar_view_empty() {
        let view = calendar_view(&[], now(), 5);
        assert!(view.next.is_none());
        assert!(view.upcoming.is_empty());
    }

    #[test]
    fn test_upcoming_arrivals_drop_departed_and_truncate() {
        let arrivals = vec![
            arrival("77", 12),
            arrival("Red", -2),
            arrival("Red", 3),
            arrival("Red", 9),
        ];

        let upcoming = upcoming_arrivals(&arrivals, now(), 2);
        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].minutes_away, Some(3));
        assert_eq!(upcoming[1].minutes_away, Some(9));
    }
}
