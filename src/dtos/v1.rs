use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Executor, ParameterKind, PortMapping, Resources, TaskDescription, TaskParameter};

/// Task message in the GA4GH TES v1 layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDto {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub inputs: Vec<ParameterDto>,
    pub outputs: Vec<ParameterDto>,
    pub resources: ResourcesDto,
    pub executors: Vec<ExecutorDto>,
    /// Mount points of the task's working volumes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub url: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourcesDto {
    pub cpu_cores: u32,
    pub ram_gb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preemptible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortDto {
    pub container: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutorDto {
    pub image: String,
    pub command: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortDto>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl From<&TaskParameter> for ParameterDto {
    fn from(param: &TaskParameter) -> Self {
        Self {
            name: param.name.clone(),
            description: param.description.clone(),
            url: param.url.clone(),
            path: param.path.clone(),
            kind: match param.kind {
                ParameterKind::File => "FILE".to_string(),
                ParameterKind::Directory => "DIRECTORY".to_string(),
            },
        }
    }
}

impl From<&Resources> for ResourcesDto {
    fn from(resources: &Resources) -> Self {
        // v1 has no per-volume sizing; fold volume sizes into the disk request
        let volume_gb: f64 = resources.volumes.iter().map(|v| v.size_gb).sum();
        let disk_gb = match resources.disk_gb {
            Some(disk) => Some(disk),
            None if volume_gb > 0.0 => Some(volume_gb),
            None => None,
        };
        Self {
            cpu_cores: resources.cpu_cores,
            ram_gb: resources.ram_gb,
            disk_gb,
            preemptible: resources.preemptible,
            zones: resources.zones.clone(),
        }
    }
}

impl From<&PortMapping> for PortDto {
    fn from(port: &PortMapping) -> Self {
        Self {
            container: port.container,
            host: port.host,
        }
    }
}

impl From<&Executor> for ExecutorDto {
    fn from(executor: &Executor) -> Self {
        Self {
            image: executor.image.clone(),
            command: executor.command.clone(),
            workdir: executor.workdir.clone(),
            stdin: executor.stdin.clone(),
            stdout: executor.stdout.clone(),
            stderr: executor.stderr.clone(),
            ports: executor.ports.iter().map(PortDto::from).collect(),
            env: executor.env.clone(),
        }
    }
}

impl From<&TaskDescription> for TaskDto {
    fn from(task: &TaskDescription) -> Self {
        Self {
            name: task.name.clone(),
            description: task.description.clone(),
            inputs: task.inputs.iter().map(ParameterDto::from).collect(),
            outputs: task.outputs.iter().map(ParameterDto::from).collect(),
            resources: ResourcesDto::from(&task.resources),
            executors: task.executors.iter().map(ExecutorDto::from).collect(),
            volumes: task
                .resources
                .volumes
                .iter()
                .map(|v| v.mount_point.clone())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Volume;
    use serde_json::json;

    #[test]
    fn test_unset_fields_are_omitted() {
        let task = TaskDescription::builder("minimal", Resources::new(1, 2.0))
            .executor(Executor::new("alpine", vec!["true".into()]))
            .build();

        let body = serde_json::to_value(TaskDto::from(&task)).unwrap();
        assert_eq!(
            body,
            json!({
                "name": "minimal",
                "inputs": [],
                "outputs": [],
                "resources": {"cpu_cores": 1, "ram_gb": 2.0},
                "executors": [{"image": "alpine", "command": ["true"]}]
            })
        );
    }

    #[test]
    fn test_full_executor_layout() {
        let task = TaskDescription::builder("nb", Resources::new(2, 8.0).preemptible(false))
            .input(TaskParameter::new("s3://bucket/data", "/data").directory())
            .executor(
                Executor::new("jupyter/base-notebook", vec!["start.sh".into()])
                    .workdir("/home/jovyan")
                    .stdout("stdout")
                    .port(PortMapping::container(8888))
                    .env("JPY_USER", "alice"),
            )
            .build();

        let body = serde_json::to_value(TaskDto::from(&task)).unwrap();
        assert_eq!(body["inputs"][0]["type"], "DIRECTORY");
        assert_eq!(body["resources"]["preemptible"], false);
        let executor = &body["executors"][0];
        assert_eq!(executor["workdir"], "/home/jovyan");
        assert_eq!(executor["ports"], json!([{"container": 8888}]));
        assert_eq!(executor["env"], json!({"JPY_USER": "alice"}));
        assert!(executor.get("stdin").is_none());
        assert!(executor.get("stderr").is_none());
    }

    #[test]
    fn test_volumes_feed_disk_request() {
        let resources = Resources::new(1, 8.0).volume(Volume::new("/home/jovyan/work", 10.0));
        let task = TaskDescription::builder("nb", resources).build();

        let body = serde_json::to_value(TaskDto::from(&task)).unwrap();
        assert_eq!(body["resources"]["disk_gb"], 10.0);
        assert_eq!(body["volumes"], json!(["/home/jovyan/work"]));
    }
}
