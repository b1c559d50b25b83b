//! Input validation for task descriptions.
//!
//! Runs before submission so obviously broken tasks never reach the service.

use crate::models::TaskDescription;

/// Validation error with details about what failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of validation - either Ok or a list of errors.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Join errors into a single line for display.
pub fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn push(errors: &mut Vec<ValidationError>, field: impl Into<String>, message: &str) {
    errors.push(ValidationError {
        field: field.into(),
        message: message.to_string(),
    });
}

/// Validates a task description before submission.
pub fn validate_task(task: &TaskDescription) -> ValidationResult {
    let mut errors = Vec::new();

    if task.name.trim().is_empty() {
        push(&mut errors, "name", "Task name cannot be empty");
    }

    let resources = &task.resources;
    if resources.cpu_cores == 0 {
        push(&mut errors, "resources.cpu_cores", "Must be greater than 0");
    }
    if !resources.ram_gb.is_finite() || resources.ram_gb <= 0.0 {
        push(&mut errors, "resources.ram_gb", "Must be a positive number");
    }
    if let Some(disk) = resources.disk_gb {
        if !disk.is_finite() || disk < 0.0 {
            push(&mut errors, "resources.disk_gb", "Cannot be negative");
        }
    }
    for (i, volume) in resources.volumes.iter().enumerate() {
        if !volume.size_gb.is_finite() || volume.size_gb <= 0.0 {
            push(
                &mut errors,
                format!("resources.volumes[{}].size_gb", i),
                "Must be a positive number",
            );
        }
        if !volume.mount_point.starts_with('/') {
            push(
                &mut errors,
                format!("resources.volumes[{}].mount_point", i),
                "Must be an absolute path",
            );
        }
    }

    if task.executors.is_empty() {
        push(&mut errors, "executors", "At least one executor is required");
    }
    for (i, executor) in task.executors.iter().enumerate() {
        if executor.image.trim().is_empty() {
            push(&mut errors, format!("executors[{}].image", i), "Image cannot be empty");
        }
        if executor.command.is_empty() {
            push(
                &mut errors,
                format!("executors[{}].command", i),
                "Command cannot be empty",
            );
        }
        if executor.ports.iter().any(|p| p.container == 0) {
            push(
                &mut errors,
                format!("executors[{}].ports", i),
                "Container port cannot be 0",
            );
        }
    }

    for (i, param) in task.inputs.iter().chain(task.outputs.iter()).enumerate() {
        if !param.path.starts_with('/') {
            push(
                &mut errors,
                format!("parameters[{}].path", i),
                "Must be an absolute path",
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
