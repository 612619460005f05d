use anyhow::Context as _;
use aws_sdk_ecs::types::TaskDefinition;
use clap::{Arg, ArgAction, ArgMatches, Command};
use shipyard_core::{
    task_definition_config_values, ConfigClient, ContainerPortMapping, CreateDeployableConfigRequest,
    TaskDefinitionSnapshot,
};
use tonic::Request;

use crate::context::{print_table, value_or_prompt, Context};

const DEFAULT_REGION: &str = "us-east-1";

pub fn args() -> Vec<Command> {
    vec![Command::new("clone_ecs_task_definition_to_deployable_config")
        .about("create a deployable config from the cpu, memory, environment and ports of a running task definition")
        .arg(
            Arg::new("task-definition")
                .long("task-definition")
                .help("task definition family, family:revision or arn")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("region")
                .long("region")
                .help("region the task definition lives in")
                .default_value(DEFAULT_REGION)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("deployable")
                .long("deployable")
                .help("deployable id")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("environment")
                .long("environment")
                .help("environment id")
                .action(ArgAction::Set),
        )]
}

/// Task level cpu and memory win over the first container's. Environment
/// and port mappings come from the first container.
pub fn task_definition_snapshot(task_definition: &TaskDefinition) -> anyhow::Result<TaskDefinitionSnapshot> {
    let container = task_definition
        .container_definitions()
        .first()
        .context("task definition has no container definitions")?;

    let cpu = task_definition
        .cpu()
        .map(str::to_string)
        .or_else(|| (container.cpu() > 0).then(|| container.cpu().to_string()));
    let memory = task_definition
        .memory()
        .map(str::to_string)
        .or_else(|| container.memory().map(|memory| memory.to_string()));

    let environment = container
        .environment()
        .iter()
        .filter_map(|pair| Some((pair.name()?.to_string(), pair.value().unwrap_or_default().to_string())))
        .collect();

    let mut port_mappings = vec![];
    for mapping in container.port_mappings() {
        let container_port = mapping
            .container_port()
            .context("port mapping without a container port")?;

        port_mappings.push(ContainerPortMapping {
            container_port,
            host_port: mapping.host_port().unwrap_or_default(),
            protocol: mapping
                .protocol()
                .map(|protocol| protocol.as_str().to_string())
                .unwrap_or_else(|| "tcp".to_string()),
        });
    }

    Ok(TaskDefinitionSnapshot {
        cpu,
        memory,
        environment,
        port_mappings,
    })
}

async fn describe_task_definition(name: &str, region: &str) -> anyhow::Result<TaskDefinition> {
    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()))
        .load()
        .await;

    let output = aws_sdk_ecs::Client::new(&sdk_config)
        .describe_task_definition()
        .task_definition(name)
        .send()
        .await
        .with_context(|| format!("describing task definition {name}"))?;

    output
        .task_definition()
        .cloned()
        .with_context(|| format!("task definition {name} not found"))
}

pub async fn clone(matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let name = value_or_prompt(matches, "task-definition", "task definition")?;
    let region = matches
        .get_one::<String>("region")
        .cloned()
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    let deployable_id = value_or_prompt(matches, "deployable", "deployable id")?;
    let environment_id = value_or_prompt(matches, "environment", "environment id")?;

    let task_definition = describe_task_definition(&name, &region).await?;
    let values = task_definition_config_values(&task_definition_snapshot(&task_definition)?);

    tracing::debug!("cloning {} values from {name}", values.len());

    let mut client = ConfigClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let config = client
        .create_deployable_config(Request::new(CreateDeployableConfigRequest {
            deployable_id,
            environment_id,
            source_config_id: String::new(),
            omit_from_source: vec![],
            values: values.into_iter().collect(),
        }))
        .await?
        .into_inner();

    println!("created deployable config {} from {name}", config.id);

    let mut table_data: Vec<Vec<String>> = config.values.into_iter().map(|(key, value)| vec![key, value]).collect();
    table_data.sort();
    print_table(&["KEY", "VALUE"], table_data, "no values");

    Ok(())
}
