// ABOUTME: Tagged union of tool operations with typed per-operation parameters
// ABOUTME: Parses loose model-supplied JSON and rejects unknown operation names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use serde::Deserialize;
use serde_json::Value;

use crate::errors::{AppError, AppResult};
use crate::models::RoutineExercise;

/// Default trailing window for exercise-scoped lookups
const fn default_since_days() -> u32 {
    90
}

/// Default lookback for stats and breakdowns
const fn default_weeks() -> u32 {
    4
}

/// Default cap for session listings
const fn default_limit() -> usize {
    10
}

/// Parameters naming an exercise plus a trailing day window
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExerciseWindowParams {
    pub exercise_name: String,
    #[serde(default = "default_since_days")]
    pub since_days: u32,
}

/// Parameters selecting a trailing week window
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WeeksParams {
    #[serde(default = "default_weeks")]
    pub weeks: u32,
}

/// Parameters carrying optional focus categories for planning
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FocusParams {
    #[serde(default)]
    pub focus_targets: Vec<String>,
}

/// Parameters for appending one chat-log entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogChatParams {
    pub role: String,
    pub content: String,
}

/// Parameters naming one training record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordParams {
    pub record_id: String,
}

/// Parameters capping a listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LimitParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Parameters filtering the catalog by category
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryFilterParams {
    #[serde(default)]
    pub category: Option<String>,
}

/// Parameters for a catalog keyword search
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeywordParams {
    pub keyword: String,
}

/// Parameters naming one routine
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoutineIdParams {
    pub routine_id: String,
}

/// Parameters mirroring the routine-creation contract
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddRoutineParams {
    pub name: String,
    #[serde(default)]
    pub memo: Option<String>,
    pub exercises: Vec<RoutineExercise>,
}

/// One fully parsed tool invocation
///
/// Exactly the operations the registry advertises; anything else fails
/// [`ToolInvocation::parse`]. Identity fields (uid, session id) deliberately
/// do not appear in any params struct; they are injected server-side.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    GetExerciseTimeseries(ExerciseWindowParams),
    GetRecentStats(WeeksParams),
    DetectRisk,
    PlanNextWeek(FocusParams),
    LogChat(LogChatParams),
    GetDayRecordSummary(RecordParams),
    GetRecentSessions(LimitParams),
    GetCategoryBreakdown(WeeksParams),
    GetBestSet(ExerciseWindowParams),
    GetPrTrend(ExerciseWindowParams),
    ListExerciseTypes(CategoryFilterParams),
    SearchExerciseTypes(KeywordParams),
    ListRoutines,
    GetRoutineDetail(RoutineIdParams),
    RecommendRoutine(FocusParams),
    AddRoutine(AddRoutineParams),
}

impl ToolInvocation {
    /// Parse an operation name and loose argument JSON into a typed invocation
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error for unknown operation names or
    /// arguments that fail to deserialize into the operation's params.
    pub fn parse(name: &str, args: Value) -> AppResult<Self> {
        // Models occasionally send null/absent args for parameterless calls
        let args = if args.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            args
        };

        let parsed = match name {
            "get_exercise_timeseries" => Self::GetExerciseTimeseries(from_args(name, args)?),
            "get_recent_stats" => Self::GetRecentStats(from_args(name, args)?),
            "detect_risk" => Self::DetectRisk,
            "plan_next_week" => Self::PlanNextWeek(from_args(name, args)?),
            "log_chat" => Self::LogChat(from_args(name, args)?),
            "get_day_record_summary" => Self::GetDayRecordSummary(from_args(name, args)?),
            "get_recent_sessions" => Self::GetRecentSessions(from_args(name, args)?),
            "get_category_breakdown" => Self::GetCategoryBreakdown(from_args(name, args)?),
            "get_best_set" => Self::GetBestSet(from_args(name, args)?),
            "get_pr_trend" => Self::GetPrTrend(from_args(name, args)?),
            "list_exercise_types" => Self::ListExerciseTypes(from_args(name, args)?),
            "search_exercise_types" => Self::SearchExerciseTypes(from_args(name, args)?),
            "list_routines" => Self::ListRoutines,
            "get_routine_detail" => Self::GetRoutineDetail(from_args(name, args)?),
            "recommend_routine" => Self::RecommendRoutine(from_args(name, args)?),
            "add_routine" => Self::AddRoutine(from_args(name, args)?),
            _ => {
                return Err(AppError::invalid_input(format!(
                    "Unknown tool operation '{name}'"
                )))
            }
        };
        Ok(parsed)
    }

    /// Operation name as registered
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GetExerciseTimeseries(_) => "get_exercise_timeseries",
            Self::GetRecentStats(_) => "get_recent_stats",
            Self::DetectRisk => "detect_risk",
            Self::PlanNextWeek(_) => "plan_next_week",
            Self::LogChat(_) => "log_chat",
            Self::GetDayRecordSummary(_) => "get_day_record_summary",
            Self::GetRecentSessions(_) => "get_recent_sessions",
            Self::GetCategoryBreakdown(_) => "get_category_breakdown",
            Self::GetBestSet(_) => "get_best_set",
            Self::GetPrTrend(_) => "get_pr_trend",
            Self::ListExerciseTypes(_) => "list_exercise_types",
            Self::SearchExerciseTypes(_) => "search_exercise_types",
            Self::ListRoutines => "list_routines",
            Self::GetRoutineDetail(_) => "get_routine_detail",
            Self::RecommendRoutine(_) => "recommend_routine",
            Self::AddRoutine(_) => "add_routine",
        }
    }
}

/// Deserialize args into the operation's params with a named error
fn from_args<T: serde::de::DeserializeOwned>(name: &str, args: Value) -> AppResult<T> {
    serde_json::from_value(args)
        .map_err(|e| AppError::invalid_input(format!("Invalid arguments for '{name}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_operation_rejected() {
        let result = ToolInvocation::parse("drop_all_tables", json!({}));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.message.contains("drop_all_tables"));
    }

    #[test]
    fn test_defaults_applied() {
        let parsed = ToolInvocation::parse("get_recent_stats", json!({})).unwrap();
        assert_eq!(parsed, ToolInvocation::GetRecentStats(WeeksParams { weeks: 4 }));
    }

    #[test]
    fn test_identity_fields_in_args_are_ignored() {
        // A model trying to smuggle identity fields parses fine but the
        // fields have nowhere to land.
        let parsed = ToolInvocation::parse(
            "get_best_set",
            json!({"exercise_name": "Squat", "uid": "someone-else", "session_id": "x"}),
        )
        .unwrap();
        assert_eq!(
            parsed,
            ToolInvocation::GetBestSet(ExerciseWindowParams {
                exercise_name: "Squat".to_owned(),
                since_days: 90,
            })
        );
    }

    #[test]
    fn test_null_args_treated_as_empty() {
        let parsed = ToolInvocation::parse("detect_risk", Value::Null).unwrap();
        assert_eq!(parsed, ToolInvocation::DetectRisk);
        let parsed = ToolInvocation::parse("plan_next_week", Value::Null).unwrap();
        assert_eq!(
            parsed,
            ToolInvocation::PlanNextWeek(FocusParams {
                focus_targets: Vec::new()
            })
        );
    }
}
