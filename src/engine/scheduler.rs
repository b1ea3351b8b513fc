// ABOUTME: Root task scheduling and the per-task execution algorithm
// ABOUTME: Enforces timeouts and cancellation, records status and merges task outputs

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::context::TaskContext;
use super::error::{ExecutionError, Result};
use super::instance::{TaskId, TaskInstance, TaskOptions, TaskState, TaskStatus};
use super::result::{RunSummary, TaskSnapshot};
use crate::services::ServicesProvider;
use crate::tasks::{Task, TaskRegistry};
use crate::vars::Variables;

/// How long an interrupted task may take to unwind its children before its
/// future is dropped.
const CANCEL_GRACE_PERIOD: Duration = Duration::from_secs(1);

enum Outcome {
    Finished(anyhow::Result<()>),
    Interrupted,
}

/// Arena of task instances plus the collaborators every execution needs.
pub(crate) struct ExecutionCore {
    services: ServicesProvider,
    arena: RwLock<Vec<Arc<TaskInstance>>>,
}

struct ResolvedTree {
    options: TaskOptions,
    task: Box<dyn Task>,
    children: Vec<ResolvedTree>,
}

impl ExecutionCore {
    fn new(services: ServicesProvider) -> Self {
        Self {
            services,
            arena: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn instance(&self, id: TaskId) -> Result<Arc<TaskInstance>> {
        let index = (id.get() as usize)
            .checked_sub(1)
            .ok_or(ExecutionError::TaskNotFound { task_id: id })?;
        self.arena
            .read()
            .get(index)
            .cloned()
            .ok_or(ExecutionError::TaskNotFound { task_id: id })
    }

    /// Insert a resolved tree, children first, and return the id of its root.
    fn insert(&self, tree: ResolvedTree) -> TaskId {
        let mut arena = self.arena.write();
        Self::insert_locked(&mut arena, tree, None)
    }

    fn insert_locked(
        arena: &mut Vec<Arc<TaskInstance>>,
        tree: ResolvedTree,
        parent: Option<TaskId>,
    ) -> TaskId {
        // Children are inserted before their parent, so reserve the parent's
        // id by counting the subtree first.
        let id = TaskId::new((arena.len() + tree.size()) as u64);
        let children = tree
            .children
            .into_iter()
            .map(|child| Self::insert_locked(arena, child, Some(id)))
            .collect();
        arena.push(Arc::new(TaskInstance::new(
            id,
            parent,
            tree.options,
            tree.task,
            children,
        )));
        id
    }

    /// Run one instance: derive its context from `parent_token`, execute it in
    /// a fresh child scope of `parent_scope`, and record the outcome.
    pub(crate) async fn execute(
        self: &Arc<Self>,
        id: TaskId,
        parent_token: &CancellationToken,
        parent_scope: &Variables,
    ) -> Result<()> {
        let instance = self.instance(id)?;
        let span = info_span!(
            "task",
            task_id = %id,
            name = %instance.name(),
            title = %instance.title()
        );
        self.execute_instance(instance, parent_token, parent_scope)
            .instrument(span)
            .await
    }

    async fn execute_instance(
        self: &Arc<Self>,
        instance: Arc<TaskInstance>,
        parent_token: &CancellationToken,
        parent_scope: &Variables,
    ) -> Result<()> {
        let ctx = TaskContext::new(
            instance.id(),
            instance.name().to_string(),
            instance.title().to_string(),
            instance.options().effective_timeout(),
            parent_token,
            instance.children().to_vec(),
            Arc::clone(self),
        );
        let scope = parent_scope.new_child_scope();

        instance.mark_started()?;
        info!(
            "Starting task {} ({}) timeout: {:?}",
            instance.id(),
            instance.title(),
            ctx.timeout()
        );

        let task_future = instance.task().execute(&ctx, &self.services, &scope);
        tokio::pin!(task_future);

        let deadline = ctx.deadline();
        let deadline_elapsed = async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = parent_token.cancelled() => Outcome::Interrupted,
            _ = deadline_elapsed => Outcome::Interrupted,
            result = &mut task_future => Outcome::Finished(result),
        };

        let result = match outcome {
            Outcome::Finished(Ok(())) => {
                instance.mark_finished(TaskStatus::Succeeded, None)?;
                parent_scope.merge(&scope);
                info!("Task {} ({}) succeeded", instance.id(), instance.title());
                Ok(())
            }
            Outcome::Finished(Err(e)) if !ctx.is_parent_cancelled() && !ctx.deadline_elapsed() => {
                instance.mark_finished(TaskStatus::Failed, Some(format!("{:#}", e)))?;
                error!("Task {} ({}) failed: {:#}", instance.id(), instance.title(), e);
                Err(ExecutionError::TaskFailed {
                    task_id: instance.id(),
                    name: instance.name().to_string(),
                    source: e,
                })
            }
            Outcome::Finished(Err(_)) => Self::record_interruption(&instance, &ctx),
            Outcome::Interrupted => {
                let result = Self::record_interruption(&instance, &ctx);
                // Give children the chance to observe the cancellation and
                // record their own status before the future is dropped.
                ctx.token().cancel();
                if timeout(CANCEL_GRACE_PERIOD, &mut task_future).await.is_err() {
                    debug!("Task {} did not unwind within grace period", instance.id());
                }
                result
            }
        };

        ctx.token().cancel();
        self.cancel_running_descendants(&instance);
        result
    }

    fn record_interruption(instance: &TaskInstance, ctx: &TaskContext) -> Result<()> {
        let err = ctx.interruption_error();
        if err.is_timeout() {
            instance.mark_finished(TaskStatus::TimedOut, Some(err.to_string()))?;
            warn!("{}", err);
        } else {
            instance.mark_finished(TaskStatus::Cancelled, None)?;
            warn!("Task {} ({}) cancelled", instance.id(), instance.title());
        }
        Err(err)
    }

    /// Mark descendants left running by a dropped task future as cancelled.
    fn cancel_running_descendants(&self, instance: &TaskInstance) {
        let mut stack = instance.children().to_vec();
        while let Some(id) = stack.pop() {
            let Ok(child) = self.instance(id) else {
                continue;
            };
            if child.status() == TaskStatus::Running
                && child.mark_finished(TaskStatus::Cancelled, None).is_ok()
            {
                debug!("Task {} cancelled with its parent {}", id, instance.id());
            }
            stack.extend_from_slice(child.children());
        }
    }
}

impl ResolvedTree {
    fn size(&self) -> usize {
        1 + self.children.iter().map(ResolvedTree::size).sum::<usize>()
    }
}

/// Owns the ordered list of root tasks and drives their execution.
pub struct TaskScheduler {
    registry: Arc<TaskRegistry>,
    core: Arc<ExecutionCore>,
    variables: Variables,
    root_tasks: RwLock<Vec<TaskId>>,
    run_lock: Mutex<()>,
}

impl TaskScheduler {
    pub fn new(registry: Arc<TaskRegistry>, services: ServicesProvider, variables: Variables) -> Self {
        Self {
            registry,
            core: Arc::new(ExecutionCore::new(services)),
            variables,
            root_tasks: RwLock::new(Vec::new()),
            run_lock: Mutex::new(()),
        }
    }

    /// Resolve `options` (and any child tasks it declares) and append a new
    /// pending root task. Nothing is appended if resolution fails.
    pub fn add_root_task(&self, options: TaskOptions) -> Result<TaskId> {
        let tree = self.resolve_tree(options)?;
        let title = tree.options.title().to_string();
        let id = self.core.insert(tree);
        self.root_tasks.write().push(id);
        debug!("Added root task {} ({})", id, title);
        Ok(id)
    }

    fn resolve_tree(&self, options: TaskOptions) -> Result<ResolvedTree> {
        let task = self.registry.resolve(&options.name, &options.config)?;
        let children = task
            .child_tasks()
            .iter()
            .cloned()
            .map(|child| self.resolve_tree(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(ResolvedTree {
            options,
            task,
            children,
        })
    }

    /// Execute root tasks in order starting at `start_index`.
    ///
    /// Already succeeded tasks are skipped; tasks that ended in any other
    /// terminal state are replaced by a fresh pending instance and re-run.
    /// Stops at the first task that does not succeed and returns its error.
    pub async fn run_tasks(&self, ctx: &CancellationToken, start_index: usize) -> Result<()> {
        let _guard = self.run_lock.lock().await;
        let run_id = uuid::Uuid::new_v4();

        let len = self.root_tasks.read().len();
        if len == 0 && start_index == 0 {
            return Ok(());
        }
        if start_index >= len {
            return Err(ExecutionError::InvalidIndex {
                index: start_index,
                len,
            });
        }

        info!(
            "Running {} root task(s) from index {} (run_id: {})",
            len - start_index,
            start_index,
            run_id
        );

        for index in start_index..len {
            let mut instance = self.root_instance(index)?;
            if instance.status() == TaskStatus::Succeeded {
                debug!("Skipping completed task {} at index {}", instance.id(), index);
                continue;
            }
            if ctx.is_cancelled() {
                return Err(ExecutionError::Cancelled {
                    task_id: instance.id(),
                    name: instance.name().to_string(),
                });
            }

            match instance.status() {
                TaskStatus::Pending => {}
                status => {
                    debug!(
                        "Re-creating task {} at index {} (was {})",
                        instance.id(),
                        index,
                        status
                    );
                    instance = self.reset_root(index, &instance)?;
                }
            }

            self.core
                .execute(instance.id(), ctx, &self.variables)
                .await?;
        }

        info!("All root tasks completed (run_id: {})", run_id);
        Ok(())
    }

    fn root_instance(&self, index: usize) -> Result<Arc<TaskInstance>> {
        let roots = self.root_tasks.read();
        let id = *roots.get(index).ok_or(ExecutionError::InvalidIndex {
            index,
            len: roots.len(),
        })?;
        drop(roots);
        self.core.instance(id)
    }

    fn reset_root(&self, index: usize, previous: &TaskInstance) -> Result<Arc<TaskInstance>> {
        let tree = self.resolve_tree(previous.options().clone())?;
        let id = self.core.insert(tree);
        self.root_tasks.write()[index] = id;
        self.core.instance(id)
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Ids of the current root tasks, in execution order.
    pub fn root_tasks(&self) -> Vec<TaskId> {
        self.root_tasks.read().clone()
    }

    pub fn task(&self, id: TaskId) -> Option<Arc<TaskInstance>> {
        self.core.instance(id).ok()
    }

    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.task(id).map(|t| t.state())
    }

    pub fn root_instances(&self) -> Vec<Arc<TaskInstance>> {
        self.root_tasks()
            .into_iter()
            .filter_map(|id| self.task(id))
            .collect()
    }

    /// Snapshot of the current root tasks and their descendants.
    pub fn summary(&self) -> RunSummary {
        let mut snapshots = Vec::new();
        for root in self.root_instances() {
            self.collect_snapshots(&root, 0, &mut snapshots);
        }
        RunSummary::new(snapshots)
    }

    fn collect_snapshots(&self, instance: &TaskInstance, depth: usize, out: &mut Vec<TaskSnapshot>) {
        out.push(TaskSnapshot::from_instance(instance, depth));
        for child in instance.children().iter().filter_map(|id| self.task(*id)) {
            self.collect_snapshots(&child, depth + 1, out);
        }
    }
}
