use serde::{Deserialize, Serialize};

use crate::models::{Executor, ParameterKind, Resources, TaskDescription, TaskParameter, Volume};

/// Task message in the pre-v1 layout (`docker` executors, camelCase names).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDto {
    pub name: String,
    #[serde(rename = "projectID", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub inputs: Vec<ParameterDto>,
    pub outputs: Vec<ParameterDto>,
    pub resources: ResourcesDto,
    pub docker: Vec<DockerExecutorDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub location: String,
    pub path: String,
    #[serde(rename = "class")]
    pub param_class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub size_gb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub mount_point: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesDto {
    pub minimum_cpu_cores: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preemptible: Option<bool>,
    pub minimum_ram_gb: f64,
    pub volumes: Vec<VolumeDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerExecutorDto {
    pub image_name: String,
    pub cmd: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    /// Single exposed container port; the legacy layout cannot carry more.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl From<&TaskParameter> for ParameterDto {
    fn from(param: &TaskParameter) -> Self {
        Self {
            name: param.name.clone(),
            description: param.description.clone(),
            location: param.url.clone(),
            path: param.path.clone(),
            param_class: match param.kind {
                ParameterKind::File => "File".to_string(),
                ParameterKind::Directory => "Directory".to_string(),
            },
            create: param.create,
        }
    }
}

impl From<&Volume> for VolumeDto {
    fn from(volume: &Volume) -> Self {
        Self {
            name: volume.name.clone(),
            size_gb: volume.size_gb,
            source: volume.source.clone(),
            mount_point: volume.mount_point.clone(),
            read_only: volume.read_only,
        }
    }
}

impl From<&Resources> for ResourcesDto {
    fn from(resources: &Resources) -> Self {
        Self {
            minimum_cpu_cores: resources.cpu_cores,
            preemptible: resources.preemptible,
            minimum_ram_gb: resources.ram_gb,
            volumes: resources.volumes.iter().map(VolumeDto::from).collect(),
            zones: resources.zones.clone(),
        }
    }
}

impl From<&Executor> for DockerExecutorDto {
    fn from(executor: &Executor) -> Self {
        Self {
            image_name: executor.image.clone(),
            cmd: executor.command.clone(),
            work_dir: executor.workdir.clone(),
            stdin: executor.stdin.clone(),
            stdout: executor.stdout.clone(),
            stderr: executor.stderr.clone(),
            port: executor.ports.first().map(|p| p.container),
        }
    }
}

impl From<&TaskDescription> for TaskDto {
    fn from(task: &TaskDescription) -> Self {
        Self {
            name: task.name.clone(),
            project_id: task.project_id.clone(),
            description: task.description.clone(),
            inputs: task.inputs.iter().map(ParameterDto::from).collect(),
            outputs: task.outputs.iter().map(ParameterDto::from).collect(),
            resources: ResourcesDto::from(&task.resources),
            docker: task.executors.iter().map(DockerExecutorDto::from).collect(),
        }
    }
}
