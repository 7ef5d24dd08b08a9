//! End-to-end tests for plan generation and background jobs, run against the
//! in-memory store with a scripted completion provider.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;
use uuid::Uuid;

use goalplan_db::models::{Goal, GoalSummary, JobStatus, PlanJob, Task, TaskDependency};

use goalplan_core::completion::{
    CompletionClient, CompletionProvider, CompletionRequest, ModelParams, ProviderError,
    RetryPolicy,
};
use goalplan_core::goals::{GoalError, GoalService};
use goalplan_core::graph::{DependencyError, DependencyGraphBuilder, add_dependency};
use goalplan_core::orchestrator::{FallbackReason, PlanSource, PlanningOrchestrator};
use goalplan_core::plan::{Plan, TaskSpec, fallback_plan};
use goalplan_core::store::{EdgeInsert, GraphWriter, InMemoryPlanStore, PlanStore};

// ===========================================================================
// Test harness
// ===========================================================================

const CHAIN_RESPONSE: &str = r#"```json
{
  "tasks": [
    {"name": "A", "description": "Design the app", "duration_days": 5, "depends_on": []},
    {"name": "B", "description": "Build the app", "duration_days": 20, "depends_on": ["A"]},
    {"name": "C", "description": "Ship to stores", "duration_days": 3, "depends_on": ["B"]}
  ]
}
```"#;

/// Replays a fixed script of provider outcomes and counts calls.
struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: Mutex<usize>,
}

impl ScriptedProvider {
    fn new(script: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
        })
    }

    fn replying(text: &str) -> Arc<Self> {
        Self::new(vec![Ok(text.to_owned())])
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Network("script exhausted".to_owned())))
    }
}

fn orchestrator(provider: Arc<ScriptedProvider>) -> Arc<PlanningOrchestrator> {
    let client =
        CompletionClient::with_policy(provider, ModelParams::default(), RetryPolicy::default());
    Arc::new(PlanningOrchestrator::new(client))
}

fn service(provider: Arc<ScriptedProvider>, store: Arc<dyn PlanStore>) -> GoalService {
    GoalService::new(store, orchestrator(provider))
}

fn network_error() -> Result<String, ProviderError> {
    Err(ProviderError::Network("connection refused".to_owned()))
}

/// Delegates to an in-memory store. Can fail every graph write, and can
/// yield to the scheduler before each call the way a database round trip
/// would.
#[derive(Default)]
struct WrappedStore {
    inner: InMemoryPlanStore,
    broken_graph: bool,
    yielding: bool,
}

impl WrappedStore {
    fn broken_graph() -> Self {
        Self {
            broken_graph: true,
            ..Self::default()
        }
    }

    fn yielding() -> Self {
        Self {
            yielding: true,
            ..Self::default()
        }
    }

    async fn round_trip(&self) {
        if self.yielding {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl PlanStore for WrappedStore {
    async fn begin_graph(&self) -> Result<Box<dyn GraphWriter>> {
        self.round_trip().await;
        if self.broken_graph {
            bail!("connection reset while beginning transaction")
        }
        self.inner.begin_graph().await
    }
    async fn create_goal(&self, text: &str) -> Result<Goal> {
        self.round_trip().await;
        self.inner.create_goal(text).await
    }
    async fn get_goal(&self, goal_id: Uuid) -> Result<Option<Goal>> {
        self.round_trip().await;
        self.inner.get_goal(goal_id).await
    }
    async fn delete_goal(&self, goal_id: Uuid) -> Result<bool> {
        self.round_trip().await;
        self.inner.delete_goal(goal_id).await
    }
    async fn list_goals(&self, offset: i64, limit: i64) -> Result<Vec<GoalSummary>> {
        self.round_trip().await;
        self.inner.list_goals(offset, limit).await
    }
    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>> {
        self.round_trip().await;
        self.inner.get_task(task_id).await
    }
    async fn list_tasks(&self, goal_id: Uuid) -> Result<Vec<Task>> {
        self.round_trip().await;
        self.inner.list_tasks(goal_id).await
    }
    async fn delete_tasks(&self, goal_id: Uuid) -> Result<u64> {
        self.round_trip().await;
        self.inner.delete_tasks(goal_id).await
    }
    async fn list_edges(&self, goal_id: Uuid) -> Result<Vec<TaskDependency>> {
        self.round_trip().await;
        self.inner.list_edges(goal_id).await
    }
    async fn insert_edge_checked(
        &self,
        goal_id: Uuid,
        edge: TaskDependency,
    ) -> Result<EdgeInsert> {
        self.round_trip().await;
        self.inner.insert_edge_checked(goal_id, edge).await
    }
    async fn create_job(&self, goal_id: Uuid) -> Result<Option<PlanJob>> {
        self.round_trip().await;
        self.inner.create_job(goal_id).await
    }
    async fn transition_job(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
        detail: Option<&str>,
    ) -> Result<()> {
        self.round_trip().await;
        self.inner.transition_job(job_id, from, to, detail).await
    }
    async fn get_job(&self, job_id: Uuid) -> Result<Option<PlanJob>> {
        self.round_trip().await;
        self.inner.get_job(job_id).await
    }
    async fn active_job(&self, goal_id: Uuid) -> Result<Option<PlanJob>> {
        self.round_trip().await;
        self.inner.active_job(goal_id).await
    }
    async fn latest_job(&self, goal_id: Uuid) -> Result<Option<PlanJob>> {
        self.round_trip().await;
        self.inner.latest_job(goal_id).await
    }
}

// ===========================================================================
// generate_plan
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn model_plan_is_used_when_response_parses() {
    let provider = ScriptedProvider::replying(CHAIN_RESPONSE);
    let generated = orchestrator(provider.clone())
        .generate_plan("Launch a mobile app")
        .await;

    assert_eq!(generated.source, PlanSource::Model);
    let names: Vec<_> = generated.plan.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["A", "B", "C"]);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn prose_response_falls_back_without_re_requesting() {
    let prose = "I would be glad to help you launch your app! First, think about your audience.";
    let provider = ScriptedProvider::new(vec![
        Ok(prose.to_owned()),
        Ok(prose.to_owned()),
        Ok(prose.to_owned()),
    ]);
    let generated = orchestrator(provider.clone())
        .generate_plan("Launch a mobile app")
        .await;

    assert_eq!(generated.plan, fallback_plan("Launch a mobile app"));
    assert_eq!(generated.plan.tasks[0].name, "Complete: Launch a mobile app");
    assert_eq!(generated.plan.tasks[0].duration_days, 7);
    assert!(matches!(
        generated.source,
        PlanSource::Fallback(FallbackReason::Malformed(_))
    ));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fall_back() {
    let provider = ScriptedProvider::new(vec![network_error(), network_error(), network_error()]);
    let generated = orchestrator(provider.clone())
        .generate_plan("Launch a mobile app")
        .await;

    assert_eq!(generated.plan, fallback_plan("Launch a mobile app"));
    assert!(matches!(
        generated.source,
        PlanSource::Fallback(FallbackReason::Unavailable(_))
    ));
    assert_eq!(provider.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn auth_failure_falls_back_after_one_call() {
    let provider = ScriptedProvider::new(vec![Err(ProviderError::Http {
        status: 401,
        message: "Invalid API Key".to_owned(),
    })]);
    let generated = orchestrator(provider.clone()).generate_plan("Write a novel").await;

    assert!(generated.source.is_fallback());
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn long_goal_fallback_name_is_truncated() {
    let goal: String = "abcdefghij".repeat(15);
    assert_eq!(goal.chars().count(), 150);

    let provider = ScriptedProvider::replying("no json here");
    let generated = orchestrator(provider).generate_plan(&goal).await;

    let expected = format!("Complete: {}...", &goal[..97]);
    assert_eq!(generated.plan.tasks[0].name, expected);
}

// ===========================================================================
// Background jobs
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn launch_mobile_app_chain_materializes_two_edges() {
    let store = Arc::new(InMemoryPlanStore::new());
    let goals = service(ScriptedProvider::replying(CHAIN_RESPONSE), store.clone());

    let (goal, job) = goals.create_goal("Launch a mobile app").await.unwrap();
    assert_eq!(job.handle.await.unwrap(), JobStatus::Succeeded);

    let tasks = store.list_tasks(goal.id).await.unwrap();
    assert_eq!(tasks.len(), 3);
    let id = |name: &str| tasks.iter().find(|t| t.name == name).unwrap().id;

    let mut edges = store.list_edges(goal.id).await.unwrap();
    edges.sort_by_key(|e| tasks.iter().position(|t| t.id == e.task_id));
    assert_eq!(
        edges,
        vec![
            TaskDependency {
                task_id: id("B"),
                depends_on: id("A")
            },
            TaskDependency {
                task_id: id("C"),
                depends_on: id("B")
            },
        ]
    );

    let record = store.get_job(job.job_id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Succeeded);
    assert!(record.started_at.is_some());
    assert!(record.finished_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn fallback_job_records_reason() {
    let store = Arc::new(InMemoryPlanStore::new());
    let provider = ScriptedProvider::new(vec![network_error(), network_error(), network_error()]);
    let goals = service(provider, store.clone());

    let (goal, job) = goals.create_goal("Learn Rust").await.unwrap();
    assert_eq!(job.handle.await.unwrap(), JobStatus::FallbackUsed);

    let tasks = store.list_tasks(goal.id).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].name, "Complete: Learn Rust");
    assert_eq!(tasks[0].duration_days, 7);

    let record = store.get_job(job.job_id).await.unwrap().unwrap();
    let detail = record.detail.unwrap();
    assert!(detail.contains("service unavailable"), "{detail}");
}

#[tokio::test(start_paused = true)]
async fn dangling_dependency_creates_no_edge() {
    let response = r#"{"tasks":[
        {"name":"Research","duration_days":2,"depends_on":["Brainstorm"]},
        {"name":"Write","duration_days":4,"depends_on":["Research"]}
    ]}"#;
    let store = Arc::new(InMemoryPlanStore::new());
    let goals = service(ScriptedProvider::replying(response), store.clone());

    let (goal, job) = goals.create_goal("Write a blog post").await.unwrap();
    assert_eq!(job.handle.await.unwrap(), JobStatus::Succeeded);

    assert_eq!(store.list_tasks(goal.id).await.unwrap().len(), 2);
    assert_eq!(store.list_edges(goal.id).await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn duplicate_names_resolve_to_later_task() {
    let response = r#"{"tasks":[
        {"name":"Prepare","duration_days":1},
        {"name":"Prepare","duration_days":2},
        {"name":"Run","duration_days":1,"depends_on":["Prepare"]}
    ]}"#;
    let store = Arc::new(InMemoryPlanStore::new());
    let goals = service(ScriptedProvider::replying(response), store.clone());

    let (goal, job) = goals.create_goal("Run a marathon").await.unwrap();
    job.handle.await.unwrap();

    let tasks = store.list_tasks(goal.id).await.unwrap();
    let edges = store.list_edges(goal.id).await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].task_id, tasks[2].id);
    assert_eq!(edges[0].depends_on, tasks[1].id);
}

#[tokio::test(start_paused = true)]
async fn store_failure_marks_job_failed() {
    let store = Arc::new(WrappedStore::broken_graph());
    let goals = service(ScriptedProvider::replying(CHAIN_RESPONSE), store.clone());

    let (goal, job) = goals.create_goal("Launch a mobile app").await.unwrap();
    assert_eq!(job.handle.await.unwrap(), JobStatus::Failed);

    assert!(store.list_tasks(goal.id).await.unwrap().is_empty());
    let record = store.get_job(job.job_id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.detail.unwrap().contains("connection reset"));
}

// ===========================================================================
// Goal lifecycle
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn regenerate_replaces_tasks() {
    let store = Arc::new(InMemoryPlanStore::new());
    let provider = ScriptedProvider::new(vec![
        Ok(CHAIN_RESPONSE.to_owned()),
        Ok(r#"{"tasks":[{"name":"Only","duration_days":2}]}"#.to_owned()),
    ]);
    let goals = service(provider, store.clone());

    let (goal, job) = goals.create_goal("Launch a mobile app").await.unwrap();
    job.handle.await.unwrap();
    assert_eq!(store.list_tasks(goal.id).await.unwrap().len(), 3);

    let job = goals.regenerate_tasks(goal.id).await.unwrap();
    assert_eq!(job.handle.await.unwrap(), JobStatus::Succeeded);

    let tasks = store.list_tasks(goal.id).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].name, "Only");
    assert!(store.list_edges(goal.id).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn regenerate_is_refused_while_job_in_flight() {
    let store = Arc::new(InMemoryPlanStore::new());
    let goals = service(ScriptedProvider::replying(CHAIN_RESPONSE), store.clone());

    let goal = store.create_goal("Launch a mobile app").await.unwrap();
    let pending = store.create_job(goal.id).await.unwrap().unwrap();

    match goals.regenerate_tasks(goal.id).await {
        Err(GoalError::JobInFlight { job_id, .. }) => assert_eq!(job_id, Some(pending.id)),
        other => panic!("expected JobInFlight, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_regenerations_leave_one_plan() {
    let two_tasks = r#"{"tasks":[
        {"name":"X","duration_days":1},
        {"name":"Y","duration_days":2,"depends_on":["X"]}
    ]}"#;
    let store = Arc::new(WrappedStore::yielding());
    let provider = ScriptedProvider::new(vec![
        Ok(two_tasks.to_owned()),
        Ok(two_tasks.to_owned()),
        Ok(two_tasks.to_owned()),
    ]);
    let goals = service(provider, store.clone());

    let (goal, job) = goals.create_goal("Plan a trip").await.unwrap();
    job.handle.await.unwrap();

    let (first, second) = tokio::join!(
        goals.regenerate_tasks(goal.id),
        goals.regenerate_tasks(goal.id)
    );
    let mut started = 0;
    for outcome in [first, second] {
        match outcome {
            Ok(job) => {
                started += 1;
                job.handle.await.unwrap();
            }
            Err(GoalError::JobInFlight { goal_id, .. }) => assert_eq!(goal_id, goal.id),
            Err(e) => panic!("unexpected regeneration error: {e}"),
        }
    }
    assert!(started >= 1);

    let mut names: Vec<_> = store
        .list_tasks(goal.id)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    names.sort();
    assert_eq!(names, ["X", "Y"]);
    assert!(store.active_job(goal.id).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn concurrent_opposite_dependencies_cannot_both_land() {
    let store = WrappedStore::yielding();
    let goal = store.create_goal("Paint the house").await.unwrap();
    let spec = |name: &str| TaskSpec {
        name: name.to_owned(),
        description: String::new(),
        duration_days: 1,
        depends_on: Vec::new(),
    };
    let plan = Plan {
        tasks: vec![spec("Buy paint"), spec("Sand walls")],
    };
    let materialized = DependencyGraphBuilder::new(&store)
        .materialize(goal.id, &plan)
        .await
        .unwrap();
    let (paint, sand) = (materialized.tasks[0].id, materialized.tasks[1].id);

    let (forward, backward) = tokio::join!(
        add_dependency(&store, paint, sand),
        add_dependency(&store, sand, paint)
    );
    let results = [forward, backward];
    let added = results.iter().filter(|r| matches!(r, Ok(true))).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(DependencyError::WouldCycle { .. })))
        .count();
    assert_eq!((added, refused), (1, 1));
    assert_eq!(store.list_edges(goal.id).await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn regenerate_and_delete_unknown_goal() {
    let store = Arc::new(InMemoryPlanStore::new());
    let goals = service(ScriptedProvider::replying(CHAIN_RESPONSE), store);

    let missing = Uuid::new_v4();
    assert!(matches!(
        goals.regenerate_tasks(missing).await,
        Err(GoalError::NotFound(_))
    ));
    assert!(matches!(
        goals.delete_goal(missing).await,
        Err(GoalError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn delete_goal_removes_everything() {
    let store = Arc::new(InMemoryPlanStore::new());
    let goals = service(ScriptedProvider::replying(CHAIN_RESPONSE), store.clone());

    let (goal, job) = goals.create_goal("Launch a mobile app").await.unwrap();
    job.handle.await.unwrap();
    goals.delete_goal(goal.id).await.unwrap();

    assert!(store.get_goal(goal.id).await.unwrap().is_none());
    assert!(store.list_tasks(goal.id).await.unwrap().is_empty());
    assert!(store.get_job(job.job_id).await.unwrap().is_none());
}
