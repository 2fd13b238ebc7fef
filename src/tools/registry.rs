// ABOUTME: Tool schema declarations advertised to the model and the dispatcher executing them
// ABOUTME: Bridges parsed invocations to the intelligence engines and the datastore
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use chrono::{Local, NaiveDate, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::invocation::ToolInvocation;
use super::{ToolIdentity, ToolResponse};
use crate::errors::AppResult;
use crate::intelligence;
use crate::llm::FunctionDeclaration;
use crate::models::{ChatLogEntry, RoutineDraft};
use crate::store::CoachStore;

// ============================================================================
// Schema Declarations
// ============================================================================

/// All tool declarations advertised to the model, registration order
#[must_use]
pub fn declarations() -> Vec<FunctionDeclaration> {
    let mut declarations = Vec::with_capacity(16);
    declarations.extend(analytics_tools());
    declarations.extend(planning_tools());
    declarations.extend(catalog_tools());
    declarations.extend(routine_tools());
    declarations
}

fn decl(name: &str, description: &str, parameters: Value) -> FunctionDeclaration {
    FunctionDeclaration {
        name: name.to_owned(),
        description: description.to_owned(),
        parameters: Some(parameters),
    }
}

fn analytics_tools() -> Vec<FunctionDeclaration> {
    vec![
        decl(
            "get_recent_stats",
            "Summary of recent training: session count, sets, reps, volume per category",
            json!({
                "type": "object",
                "properties": {"weeks": {"type": "integer", "description": "Lookback in weeks (default 4)"}}
            }),
        ),
        decl(
            "get_exercise_timeseries",
            "Weekly volume/sets/reps/top-set series for one exercise, with estimated 1RM",
            json!({
                "type": "object",
                "properties": {
                    "exercise_name": {"type": "string"},
                    "since_days": {"type": "integer", "description": "Lookback in days (default 90)"}
                },
                "required": ["exercise_name"]
            }),
        ),
        decl(
            "get_category_breakdown",
            "Per-category training volume and share over recent weeks",
            json!({
                "type": "object",
                "properties": {"weeks": {"type": "integer"}}
            }),
        ),
        decl(
            "get_recent_sessions",
            "Most recent training sessions, newest first",
            json!({
                "type": "object",
                "properties": {"limit": {"type": "integer", "description": "Max sessions (default 10)"}}
            }),
        ),
        decl(
            "get_day_record_summary",
            "Detailed summary of one logged training session",
            json!({
                "type": "object",
                "properties": {"record_id": {"type": "string"}},
                "required": ["record_id"]
            }),
        ),
        decl(
            "get_best_set",
            "Heaviest logged set of an exercise within a window",
            json!({
                "type": "object",
                "properties": {
                    "exercise_name": {"type": "string"},
                    "since_days": {"type": "integer"}
                },
                "required": ["exercise_name"]
            }),
        ),
        decl(
            "get_pr_trend",
            "Weekly best estimated one-rep-max trend for an exercise",
            json!({
                "type": "object",
                "properties": {
                    "exercise_name": {"type": "string"},
                    "since_days": {"type": "integer"}
                },
                "required": ["exercise_name"]
            }),
        ),
        decl(
            "detect_risk",
            "Heuristic safety signals over the last 14 days of training",
            json!({"type": "object", "properties": {}}),
        ),
    ]
}

fn planning_tools() -> Vec<FunctionDeclaration> {
    vec![
        decl(
            "plan_next_week",
            "Lightweight preview of a recommended 4-day split for next week",
            json!({
                "type": "object",
                "properties": {
                    "focus_targets": {"type": "array", "items": {"type": "string"}}
                }
            }),
        ),
        decl(
            "recommend_routine",
            "Full routine recommendation: day plans, weight suggestions, catalog gaps, and a persistable draft",
            json!({
                "type": "object",
                "properties": {
                    "focus_targets": {"type": "array", "items": {"type": "string"}}
                }
            }),
        ),
        decl(
            "log_chat",
            "Append one entry to the session chat log",
            json!({
                "type": "object",
                "properties": {
                    "role": {"type": "string"},
                    "content": {"type": "string"}
                },
                "required": ["role", "content"]
            }),
        ),
    ]
}

fn catalog_tools() -> Vec<FunctionDeclaration> {
    vec![
        decl(
            "list_exercise_types",
            "The user's exercise catalog, optionally filtered by category",
            json!({
                "type": "object",
                "properties": {"category": {"type": "string"}}
            }),
        ),
        decl(
            "search_exercise_types",
            "Search the exercise catalog by name keyword",
            json!({
                "type": "object",
                "properties": {"keyword": {"type": "string"}},
                "required": ["keyword"]
            }),
        ),
    ]
}

fn routine_tools() -> Vec<FunctionDeclaration> {
    vec![
        decl(
            "list_routines",
            "The user's saved routines, newest first",
            json!({"type": "object", "properties": {}}),
        ),
        decl(
            "get_routine_detail",
            "Full detail of one saved routine including sets",
            json!({
                "type": "object",
                "properties": {"routine_id": {"type": "string"}},
                "required": ["routine_id"]
            }),
        ),
        decl(
            "add_routine",
            "Persist a routine (name, memo, ordered exercises with sets), e.g. a confirmed recommendation draft",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "memo": {"type": "string"},
                    "exercises": {"type": "array", "items": {"type": "object"}}
                },
                "required": ["name", "exercises"]
            }),
        ),
    ]
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Executes parsed tool invocations against the engines and the datastore
///
/// Identity always comes from the server-side [`ToolIdentity`]; anything the
/// model put into the arguments was dropped during parsing.
pub struct ToolDispatcher {
    store: Arc<dyn CoachStore>,
}

impl ToolDispatcher {
    #[must_use]
    pub fn new(store: Arc<dyn CoachStore>) -> Self {
        Self { store }
    }

    /// Parse and execute one tool call, returning the uniform envelope
    ///
    /// Execution failures become `{ok:false, error}` rather than propagating:
    /// the model should see tool errors and react, not crash the loop.
    pub async fn dispatch(
        &self,
        identity: &ToolIdentity,
        name: &str,
        args: Value,
    ) -> ToolResponse {
        let invocation = match ToolInvocation::parse(name, args) {
            Ok(invocation) => invocation,
            Err(e) => {
                debug!("Rejected tool call '{name}': {e}");
                return ToolResponse::err(e.message);
            }
        };

        info!("Executing tool: {}", invocation.name());
        match self.execute(identity, invocation).await {
            Ok(data) => ToolResponse::ok(data),
            Err(e) => ToolResponse::err(e.message),
        }
    }

    async fn execute(&self, identity: &ToolIdentity, invocation: ToolInvocation) -> AppResult<Value> {
        let today = today();
        match invocation {
            ToolInvocation::GetRecentStats(params) => {
                let records = self.store.list_records(&identity.uid).await?;
                Ok(json!(intelligence::recent_stats(&records, today, params.weeks)))
            }
            ToolInvocation::GetExerciseTimeseries(params) => {
                let records = self.store.list_records(&identity.uid).await?;
                Ok(json!(intelligence::exercise_timeseries(
                    &records,
                    &params.exercise_name,
                    today,
                    params.since_days,
                )))
            }
            ToolInvocation::GetCategoryBreakdown(params) => {
                let records = self.store.list_records(&identity.uid).await?;
                Ok(json!(intelligence::category_breakdown(&records, today, params.weeks)))
            }
            ToolInvocation::GetRecentSessions(params) => {
                let records = self.store.list_records(&identity.uid).await?;
                Ok(json!(intelligence::recent_sessions(&records, params.limit)))
            }
            ToolInvocation::GetDayRecordSummary(params) => {
                let record = self
                    .store
                    .get_record(&identity.uid, &params.record_id)
                    .await?
                    .ok_or_else(|| crate::errors::AppError::not_found("Training record"))?;
                intelligence::day_record_summary(&record)
                    .map(|summary| json!(summary))
                    .ok_or_else(|| crate::errors::AppError::not_found("Training record"))
            }
            ToolInvocation::GetBestSet(params) => {
                let records = self.store.list_records(&identity.uid).await?;
                Ok(json!({
                    "best_set": intelligence::best_set(
                        &records,
                        &params.exercise_name,
                        today,
                        params.since_days,
                    )
                }))
            }
            ToolInvocation::GetPrTrend(params) => {
                let records = self.store.list_records(&identity.uid).await?;
                Ok(json!(intelligence::pr_trend(
                    &records,
                    &params.exercise_name,
                    today,
                    params.since_days,
                )))
            }
            ToolInvocation::DetectRisk => {
                let records = self.store.list_records(&identity.uid).await?;
                Ok(json!({"signals": intelligence::detect_risk(&records, today)}))
            }
            ToolInvocation::PlanNextWeek(params) => {
                let plan = self.build_plan(&identity.uid, today, &params.focus_targets).await?;
                // Preview only: day/exercise names without the draft payload
                let days: Vec<Value> = plan
                    .days
                    .iter()
                    .map(|day| {
                        json!({
                            "name": day.name,
                            "exercises": day.exercises.iter().map(|e| e.name.clone()).collect::<Vec<_>>(),
                        })
                    })
                    .collect();
                Ok(json!({"days": days, "focus_categories": plan.focus_categories}))
            }
            ToolInvocation::RecommendRoutine(params) => {
                let plan = self.build_plan(&identity.uid, today, &params.focus_targets).await?;
                Ok(json!(plan))
            }
            ToolInvocation::LogChat(params) => {
                let entry = ChatLogEntry {
                    role: params.role,
                    content: params.content,
                    logged_at: Utc::now(),
                };
                self.store
                    .append_chat(&identity.uid, &identity.session_id, &entry)
                    .await?;
                Ok(json!({"logged": true}))
            }
            ToolInvocation::ListExerciseTypes(params) => {
                let mut entries = self.store.list_exercise_types(&identity.uid).await?;
                if let Some(category) = params.category {
                    let wanted = category.to_lowercase();
                    entries.retain(|e| e.category.to_lowercase() == wanted);
                }
                Ok(json!(entries))
            }
            ToolInvocation::SearchExerciseTypes(params) => {
                let keyword = params.keyword.to_lowercase();
                let mut entries = self.store.list_exercise_types(&identity.uid).await?;
                entries.retain(|e| e.name.to_lowercase().contains(&keyword));
                Ok(json!(entries))
            }
            ToolInvocation::ListRoutines => {
                let routines = self.store.list_routines(&identity.uid).await?;
                let summaries: Vec<Value> = routines
                    .iter()
                    .map(|r| {
                        json!({
                            "id": r.id,
                            "name": r.name,
                            "memo": r.memo,
                            "exercise_count": r.exercises.len(),
                            "created_at": r.created_at,
                        })
                    })
                    .collect();
                Ok(json!(summaries))
            }
            ToolInvocation::GetRoutineDetail(params) => {
                let routine = self
                    .store
                    .get_routine(&identity.uid, &params.routine_id)
                    .await?
                    .ok_or_else(|| crate::errors::AppError::not_found("Routine"))?;
                Ok(json!(routine))
            }
            ToolInvocation::AddRoutine(params) => {
                let draft = RoutineDraft {
                    name: params.name,
                    memo: params.memo,
                    exercises: params.exercises,
                };
                let routine = self.store.add_routine(&identity.uid, &draft).await?;
                Ok(json!({"routine_id": routine.id, "name": routine.name}))
            }
        }
    }

    /// Run the recommendation engine with fresh records and catalog
    pub async fn build_plan(
        &self,
        uid: &str,
        today: NaiveDate,
        focus_targets: &[String],
    ) -> AppResult<intelligence::RecommendationPlan> {
        let records = self.store.list_records(uid).await?;
        let catalog = self.store.list_exercise_types(uid).await?;
        Ok(intelligence::recommend_routine(
            &records,
            &catalog,
            today,
            focus_targets,
        ))
    }
}

/// The server-local calendar date used for windowing
fn today() -> NaiveDate {
    Local::now().date_naive()
}
