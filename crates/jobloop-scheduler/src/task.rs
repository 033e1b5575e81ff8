use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::TaskError;

/// Named arguments passed to a task.
pub type Kwargs = BTreeMap<String, Value>;

pub type TaskResult = std::result::Result<Value, TaskError>;

/// A unit of work the scheduler can invoke.
///
/// The scheduler knows nothing about what a task does. It calls `call`
/// synchronously from the run loop, so a slow task blocks every other job
/// for its whole duration.
pub trait Task: Send + Sync {
    /// Stable name, used as the snapshot matching key.
    fn name(&self) -> &str;

    fn call(&self, args: &[Value], kwargs: &Kwargs) -> TaskResult;
}

/// Adapter turning a closure into a [`Task`].
pub struct FnTask<F> {
    name: String,
    f: F,
}

impl<F> Task for FnTask<F>
where
    F: Fn(&[Value], &Kwargs) -> TaskResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, args: &[Value], kwargs: &Kwargs) -> TaskResult {
        (self.f)(args, kwargs)
    }
}

/// Wrap `f` as a shareable task called `name`.
pub fn task_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn Task>
where
    F: Fn(&[Value], &Kwargs) -> TaskResult + Send + Sync + 'static,
{
    Arc::new(FnTask {
        name: name.into(),
        f,
    })
}
