use clap::{Arg, ArgAction, ArgMatches, Command};
use shipyard_core::{
    CreateEnvironmentRequest, EnvironmentClient, ListEnvironmentsBy, ListEnvironmentsRequest,
};
use tonic::Request;

use crate::context::{print_table, value_or_prompt, Context};

pub fn args() -> Vec<Command> {
    vec![
        Command::new("create_environment")
            .about("create an environment in a deployable group")
            .arg(
                Arg::new("group")
                    .long("group")
                    .help("deployable group id")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("name")
                    .long("name")
                    .help("environment name")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("description")
                    .long("description")
                    .help("environment description")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("prod")
                    .long("prod")
                    .help("mark the environment as production")
                    .action(ArgAction::SetTrue),
            ),
        Command::new("list_environments")
            .about("list the environments of a group")
            .arg(
                Arg::new("group")
                    .long("group")
                    .help("deployable group id")
                    .action(ArgAction::Set),
            ),
    ]
}

pub async fn create(matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let deployable_group_id = value_or_prompt(matches, "group", "deployable group id")?;
    let name = value_or_prompt(matches, "name", "environment name")?;
    let description = value_or_prompt(matches, "description", "environment description")?;
    let is_prod = matches.get_flag("prod");

    let mut client = EnvironmentClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let environment = client
        .create(Request::new(CreateEnvironmentRequest {
            deployable_group_id,
            name,
            description,
            is_prod,
        }))
        .await?
        .into_inner();

    println!("created environment {} ({})", environment.name, environment.id);

    Ok(())
}

pub async fn list(matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let deployable_group_id = value_or_prompt(matches, "group", "deployable group id")?;

    let mut client = EnvironmentClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let response = client
        .list(Request::new(ListEnvironmentsRequest {
            by: Some(ListEnvironmentsBy::DeployableGroupId(deployable_group_id)),
        }))
        .await?
        .into_inner();

    let table_data = response
        .environments
        .into_iter()
        .map(|environment| {
            vec![
                environment.id,
                environment.name,
                environment.is_prod.to_string(),
                environment.description,
            ]
        })
        .collect();

    print_table(&["ID", "NAME", "PROD", "DESCRIPTION"], table_data, "No environments found");

    Ok(())
}
