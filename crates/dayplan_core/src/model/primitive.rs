//! Task and habit primitives projected into days.
//!
//! These records are owned outside the day plan; the core reads them and
//! writes back only the fields a projected block edit may touch.

use crate::model::day::DayDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Active,
    Completed,
}

impl TaskStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub archived_at: Option<i64>,
    #[serde(default)]
    pub pillar_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl Task {
    pub fn new(id: &str, user_id: &str, content: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            user_id: user_id.to_string(),
            content: content.into(),
            description: None,
            due_date: None,
            section_id: None,
            order: 0,
            status: TaskStatus::Active,
            completed_at: None,
            archived_at: None,
            pillar_id: None,
            parent_id: None,
        }
    }

    /// A task is projected onto `date` iff it is due that day and not archived.
    pub fn is_eligible_on(&self, date: DayDate) -> bool {
        self.archived_at.is_none() && self.due_date.as_deref() == Some(date.to_string().as_str())
    }
}

/// Habit cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HabitSchedule {
    #[default]
    Daily,
    /// Days of week, Sunday = 0 through Saturday = 6.
    Weekly { days: Vec<u8> },
}

impl HabitSchedule {
    pub fn matches(&self, date: DayDate) -> bool {
        match self {
            Self::Daily => true,
            Self::Weekly { days } => days.contains(&date.weekday_from_sunday()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub schedule: HabitSchedule,
    /// Missing means inactive, matching the `isActive == true` list query.
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub archived_at: Option<i64>,
    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub pillar_id: Option<String>,
}

impl Habit {
    pub fn new(id: &str, user_id: &str, name: impl Into<String>, schedule: HabitSchedule) -> Self {
        Self {
            id: id.to_string(),
            user_id: user_id.to_string(),
            name: name.into(),
            schedule,
            is_active: true,
            archived_at: None,
            section_id: None,
            order: 0,
            pillar_id: None,
        }
    }

    /// A habit is projected onto `date` iff active and scheduled that weekday.
    pub fn is_eligible_on(&self, date: DayDate) -> bool {
        self.is_active && self.archived_at.is_none() && self.schedule.matches(date)
    }
}

/// Per-day habit completion record, keyed `<habitId>_<date>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitLog {
    pub id: String,
    pub habit_id: String,
    pub user_id: String,
    pub date: DayDate,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub updated_at: i64,
}

impl HabitLog {
    pub fn doc_id(habit_id: &str, date: DayDate) -> String {
        format!("{habit_id}_{date}")
    }

    /// The implicit log of a habit that has no record for `date` yet.
    pub fn default_for(habit: &Habit, date: DayDate) -> Self {
        Self {
            id: Self::doc_id(&habit.id, date),
            habit_id: habit.id.clone(),
            user_id: habit.user_id.clone(),
            date,
            completed: false,
            value: None,
            notes: String::new(),
            updated_at: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Habit, HabitLog, HabitSchedule, Task};
    use crate::model::day::DayDate;

    #[test]
    fn weekly_schedule_matches_listed_days_only() {
        let schedule: HabitSchedule =
            serde_json::from_value(serde_json::json!({"type": "weekly", "days": [1, 3]}))
                .unwrap();
        assert!(schedule.matches(DayDate::parse("2026-01-05").unwrap()));
        assert!(!schedule.matches(DayDate::parse("2026-01-06").unwrap()));
    }

    #[test]
    fn archived_tasks_and_inactive_habits_are_not_eligible() {
        let day = DayDate::parse("2026-01-05").unwrap();
        let mut task = Task::new("t1", "u1", "write");
        task.due_date = Some("2026-01-05".to_string());
        assert!(task.is_eligible_on(day));
        task.archived_at = Some(1);
        assert!(!task.is_eligible_on(day));

        let mut habit = Habit::new("h1", "u1", "stretch", HabitSchedule::Daily);
        assert!(habit.is_eligible_on(day));
        habit.is_active = false;
        assert!(!habit.is_eligible_on(day));
    }

    #[test]
    fn habit_without_active_flag_decodes_as_inactive() {
        let habit: Habit = serde_json::from_value(serde_json::json!({
            "id": "h1",
            "userId": "u1",
            "name": "Stretch",
            "schedule": {"type": "daily"}
        }))
        .unwrap();
        assert!(!habit.is_active);
        assert!(!habit.is_eligible_on(DayDate::parse("2026-01-05").unwrap()));
    }

    #[test]
    fn default_log_uses_composite_id() {
        let day = DayDate::parse("2026-01-05").unwrap();
        let habit = Habit::new("h1", "u1", "stretch", HabitSchedule::Daily);
        let log = HabitLog::default_for(&habit, day);
        assert_eq!(log.id, "h1_2026-01-05");
        assert!(!log.completed);
        assert!(log.notes.is_empty());
    }
}
