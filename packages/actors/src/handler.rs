//! Job definitions, the registry task processors look them up in, and plugin hooks.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use pool_core::{JobError, JobPayload, WorkerId};
use serde_json::{Map, Value};

/// Result type for job perform functions.
pub type PerformResult = Result<Value, String>;

/// Future type for async perform functions.
pub type PerformFuture = BoxFuture<'static, PerformResult>;

type PerformFn = dyn Fn(Vec<Value>) -> PerformFuture + Send + Sync;

/// What a plugin hook sees about the run it wraps.
pub struct Invocation<'a> {
    pub worker_id: &'a WorkerId,
    pub job: &'a JobPayload,
    /// The definition's plugin options.
    pub options: &'a Map<String, Value>,
}

/// Behavior wrapped around a job's perform function.
///
/// `before_perform` hooks run in registration order before the job; returning
/// `Ok(false)` skips the job. `after_perform` hooks run in the same order after it
/// and see the outcome.
pub trait JobPlugin: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn before_perform<'a>(
        &'a self,
        _invocation: &'a Invocation<'a>,
    ) -> BoxFuture<'a, Result<bool, String>> {
        Box::pin(async { Ok(true) })
    }

    fn after_perform<'a>(
        &'a self,
        _invocation: &'a Invocation<'a>,
        _outcome: &'a Result<Value, JobError>,
    ) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(async { Ok(()) })
    }
}

/// A named unit of work: the perform function plus its plugins.
///
/// Immutable once registered.
pub struct JobDefinition {
    perform: Arc<PerformFn>,
    plugins: Vec<Arc<dyn JobPlugin>>,
    plugin_options: Map<String, Value>,
}

impl JobDefinition {
    /// Create a definition from an async function over the job's arguments.
    pub fn new<F, Fut>(perform: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PerformResult> + Send + 'static,
    {
        Self {
            perform: Arc::new(move |args| Box::pin(perform(args))),
            plugins: Vec::new(),
            plugin_options: Map::new(),
        }
    }

    /// Append a plugin; plugins run in the order they were added.
    pub fn with_plugin<P: JobPlugin>(mut self, plugin: P) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Set the options passed to every plugin hook.
    pub fn with_plugin_options(mut self, options: Map<String, Value>) -> Self {
        self.plugin_options = options;
        self
    }

    pub fn plugins(&self) -> &[Arc<dyn JobPlugin>] {
        &self.plugins
    }

    pub fn plugin_options(&self) -> &Map<String, Value> {
        &self.plugin_options
    }

    /// Run the job with its plugin hooks around it.
    ///
    /// A skipped job resolves to `Value::Null`. Panics inside the perform
    /// function are caught and reported as [`JobError::Panicked`].
    pub async fn run(&self, worker_id: &WorkerId, job: &JobPayload) -> Result<Value, JobError> {
        let invocation = Invocation {
            worker_id,
            job,
            options: &self.plugin_options,
        };

        for plugin in &self.plugins {
            match plugin.before_perform(&invocation).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!("Plugin {} skipped job {}", plugin.name(), job.id);
                    return Ok(Value::Null);
                }
                Err(message) => {
                    return Err(JobError::Plugin {
                        plugin: plugin.name().to_string(),
                        message,
                    });
                }
            }
        }

        let perform = Arc::clone(&self.perform);
        let args = job.args.clone();
        let mut outcome = match AssertUnwindSafe(async move { perform(args).await })
            .catch_unwind()
            .await
        {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(JobError::Execution(message)),
            Err(panic) => Err(JobError::Panicked(panic_message(panic.as_ref()))),
        };

        for plugin in &self.plugins {
            if let Err(message) = plugin.after_perform(&invocation, &outcome).await {
                outcome = Err(JobError::Plugin {
                    plugin: plugin.name().to_string(),
                    message,
                });
                break;
            }
        }

        outcome
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Registry of job definitions by name.
///
/// Built before the pool is constructed and read-only afterwards.
#[derive(Default)]
pub struct JobRegistry {
    definitions: HashMap<String, Arc<JobDefinition>>,
}

impl JobRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
        }
    }

    /// Register a definition under a name, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, definition: JobDefinition) {
        self.definitions.insert(name.into(), Arc::new(definition));
    }

    /// Builder form of [`JobRegistry::register`].
    pub fn with_job(mut self, name: impl Into<String>, definition: JobDefinition) -> Self {
        self.register(name, definition);
        self
    }

    /// Get the definition for a job class.
    pub fn get(&self, name: &str) -> Option<Arc<JobDefinition>> {
        self.definitions.get(name).cloned()
    }

    /// Look up a definition, failing with the error task processors report.
    pub fn lookup(&self, name: &str) -> Result<Arc<JobDefinition>, JobError> {
        self.get(name)
            .ok_or_else(|| JobError::NotFound(name.to_string()))
    }

    /// Check if a definition exists for a job class.
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// List all registered job names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.definitions.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    struct Recorder {
        name: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
        allow: bool,
    }

    impl JobPlugin for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn before_perform<'a>(
            &'a self,
            _invocation: &'a Invocation<'a>,
        ) -> BoxFuture<'a, Result<bool, String>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(format!("before:{}", self.name));
                Ok(self.allow)
            })
        }

        fn after_perform<'a>(
            &'a self,
            _invocation: &'a Invocation<'a>,
            outcome: &'a Result<Value, JobError>,
        ) -> BoxFuture<'a, Result<(), String>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push(format!("after:{}:{}", self.name, outcome.is_ok()));
                Ok(())
            })
        }
    }

    fn worker() -> WorkerId {
        WorkerId::new("test", 1, 1)
    }

    #[test]
    fn lookup_missing_job_reports_class() {
        let registry = JobRegistry::new().with_job("echo", JobDefinition::new(|_| async { Ok(json!(1)) }));
        assert!(registry.contains("echo"));
        assert_eq!(registry.names(), vec!["echo"]);
        let err = registry.lookup("missingJob").err().unwrap();
        assert_eq!(err.to_string(), "No job defined for class \"missingJob\"");
    }

    #[tokio::test]
    async fn run_passes_arguments_in_order() {
        let definition = JobDefinition::new(|args: Vec<Value>| async move { Ok(json!(args)) });
        let job = JobPayload::new("q", "echo", vec![json!(1), json!("two")]);

        let result = definition.run(&worker(), &job).await;
        assert_eq!(result, Ok(json!([1, "two"])));
    }

    #[tokio::test]
    async fn execution_error_and_panic_become_job_errors() {
        let job = JobPayload::new("q", "bad", vec![]);

        let failing = JobDefinition::new(|_| async { Err("boom".to_string()) });
        assert_eq!(
            failing.run(&worker(), &job).await,
            Err(JobError::Execution("boom".into()))
        );

        let panicking = JobDefinition::new(|args: Vec<Value>| async move {
            if args.is_empty() {
                panic!("exploded");
            }
            Ok(Value::Null)
        });
        assert_eq!(
            panicking.run(&worker(), &job).await,
            Err(JobError::Panicked("exploded".into()))
        );
    }

    #[tokio::test]
    async fn plugins_wrap_perform_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let definition = JobDefinition::new(|_| async { Ok(Value::Null) })
            .with_plugin(Recorder {
                name: "first",
                calls: Arc::clone(&calls),
                allow: true,
            })
            .with_plugin(Recorder {
                name: "second",
                calls: Arc::clone(&calls),
                allow: true,
            });
        let job = JobPayload::new("q", "echo", vec![]);

        assert!(definition.run(&worker(), &job).await.is_ok());
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "before:first",
                "before:second",
                "after:first:true",
                "after:second:true"
            ]
        );
    }

    #[tokio::test]
    async fn plugin_can_skip_the_job() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let ran = Arc::new(Mutex::new(false));
        let ran_in_job = Arc::clone(&ran);
        let definition = JobDefinition::new(move |_| {
            let ran = Arc::clone(&ran_in_job);
            async move {
                *ran.lock().unwrap() = true;
                Ok(json!("ran"))
            }
        })
        .with_plugin(Recorder {
            name: "gate",
            calls: Arc::clone(&calls),
            allow: false,
        });
        let job = JobPayload::new("q", "gated", vec![]);

        assert_eq!(definition.run(&worker(), &job).await, Ok(Value::Null));
        assert!(!*ran.lock().unwrap());
        assert_eq!(*calls.lock().unwrap(), vec!["before:gate"]);
    }
}
