//! Demo jobs registered by the worker binary.

use std::time::Duration;

use actors::{JobDefinition, JobRegistry};
use serde_json::{Value, json};

pub fn registry() -> JobRegistry {
    JobRegistry::new()
        .with_job(
            "echo",
            JobDefinition::new(|args: Vec<Value>| async move {
                tracing::info!("Echo job: {:?}", args);
                Ok(json!(args))
            }),
        )
        .with_job(
            "sleep",
            JobDefinition::new(|args: Vec<Value>| async move {
                let ms = args.first().and_then(Value::as_u64).unwrap_or(1000);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(json!(format!("Slept for {}ms", ms)))
            }),
        )
        .with_job(
            "fail",
            JobDefinition::new(|args: Vec<Value>| async move {
                let should_fail = args.first().and_then(Value::as_bool).unwrap_or(true);
                if should_fail {
                    Err("Intentional failure".to_string())
                } else {
                    Ok(json!("Success"))
                }
            }),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_jobs_are_registered() {
        assert_eq!(registry().names(), vec!["echo", "fail", "sleep"]);
    }
}
