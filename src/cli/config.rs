use std::collections::HashMap;

use clap::{Arg, ArgAction, ArgMatches, Command};
use shipyard_core::{
    ConfigClient, CreateDeployableConfigRequest, CreateEnvironmentConfigRequest,
    ListDeployableConfigsRequest, ListEnvironmentConfigsRequest,
};
use tonic::Request;

use crate::context::{parse_key_values, print_table, value_or_prompt, Context};

fn deployable_arg() -> Arg {
    Arg::new("deployable")
        .long("deployable")
        .help("deployable id")
        .action(ArgAction::Set)
}

fn environment_arg() -> Arg {
    Arg::new("environment")
        .long("environment")
        .help("environment id")
        .action(ArgAction::Set)
}

fn version_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("source")
                .long("source")
                .help("config id to copy values from")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("omit")
                .long("omit")
                .help("key of the source config to leave out (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("value")
                .long("value")
                .help("KEY=VALUE to set, wins over the source (repeatable)")
                .action(ArgAction::Append),
        )
}

fn status_arg() -> Arg {
    Arg::new("status")
        .long("status")
        .help("ACTIVE (default) or DEPRECATED")
        .action(ArgAction::Set)
}

pub fn args() -> Vec<Command> {
    vec![
        version_args(
            Command::new("create_deployable_config")
                .about("create a new active config for a deployable in an environment")
                .arg(deployable_arg())
                .arg(environment_arg()),
        ),
        version_args(
            Command::new("create_environment_config")
                .about("create a new active config for an environment")
                .arg(environment_arg()),
        ),
        Command::new("list_deployable_configs")
            .about("list the configs of a deployable in an environment")
            .arg(deployable_arg())
            .arg(environment_arg())
            .arg(status_arg()),
        Command::new("list_environment_configs")
            .about("list the configs of an environment")
            .arg(environment_arg())
            .arg(status_arg()),
    ]
}

struct VersionArgs {
    source_config_id: String,
    omit_from_source: Vec<String>,
    values: HashMap<String, String>,
}

fn version_values(matches: &ArgMatches) -> anyhow::Result<VersionArgs> {
    let values = match matches.get_many::<String>("value") {
        Some(pairs) => parse_key_values(pairs)?,
        None => HashMap::new(),
    };

    Ok(VersionArgs {
        source_config_id: matches.get_one::<String>("source").cloned().unwrap_or_default(),
        omit_from_source: matches
            .get_many::<String>("omit")
            .map(|omit| omit.cloned().collect())
            .unwrap_or_default(),
        values,
    })
}

fn print_config(id: &str, status: &str, values: HashMap<String, String>) {
    println!("{id} ({status})");

    let mut table_data: Vec<Vec<String>> = values.into_iter().map(|(key, value)| vec![key, value]).collect();
    table_data.sort();

    print_table(&["KEY", "VALUE"], table_data, "  no values");
}

pub async fn create_deployable_config(matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let deployable_id = value_or_prompt(matches, "deployable", "deployable id")?;
    let environment_id = value_or_prompt(matches, "environment", "environment id")?;
    let version = version_values(matches)?;

    let mut client = ConfigClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let config = client
        .create_deployable_config(Request::new(CreateDeployableConfigRequest {
            deployable_id,
            environment_id,
            source_config_id: version.source_config_id,
            omit_from_source: version.omit_from_source,
            values: version.values,
        }))
        .await?
        .into_inner();

    print_config(&config.id, &config.status, config.values);

    Ok(())
}

pub async fn create_environment_config(matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let environment_id = value_or_prompt(matches, "environment", "environment id")?;
    let version = version_values(matches)?;

    let mut client = ConfigClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let config = client
        .create_environment_config(Request::new(CreateEnvironmentConfigRequest {
            environment_id,
            source_config_id: version.source_config_id,
            omit_from_source: version.omit_from_source,
            values: version.values,
        }))
        .await?
        .into_inner();

    print_config(&config.id, &config.status, config.values);

    Ok(())
}

pub async fn list_deployable_configs(matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let deployable_id = value_or_prompt(matches, "deployable", "deployable id")?;
    let environment_id = value_or_prompt(matches, "environment", "environment id")?;
    let status = matches.get_one::<String>("status").cloned().unwrap_or_default();

    let mut client = ConfigClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let response = client
        .list_deployable_configs(Request::new(ListDeployableConfigsRequest {
            deployable_id,
            environment_id,
            status,
        }))
        .await?
        .into_inner();

    if response.configs.is_empty() {
        println!("No deployable configs found");
    }

    for config in response.configs {
        print_config(&config.id, &config.status, config.values);
    }

    Ok(())
}

pub async fn list_environment_configs(matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let environment_id = value_or_prompt(matches, "environment", "environment id")?;
    let status = matches.get_one::<String>("status").cloned().unwrap_or_default();

    let mut client = ConfigClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let response = client
        .list_environment_configs(Request::new(ListEnvironmentConfigsRequest { environment_id, status }))
        .await?
        .into_inner();

    if response.configs.is_empty() {
        println!("No environment configs found");
    }

    for config in response.configs {
        print_config(&config.id, &config.status, config.values);
    }

    Ok(())
}
