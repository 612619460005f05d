use clap::{Arg, ArgAction, ArgMatches, Command};
use shipyard_core::{CreateDeployableRequest, DeployableClient, ListDeployablesBy, ListDeployablesRequest};
use tonic::Request;

use crate::context::{print_table, value_or_prompt, Context};

pub fn args() -> Vec<Command> {
    vec![
        Command::new("create_deployable")
            .about("create a deployable in a deployable group")
            .arg(
                Arg::new("group")
                    .long("group")
                    .help("deployable group id")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("name")
                    .long("name")
                    .help("deployable name")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("description")
                    .long("description")
                    .help("deployable description")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("git-url")
                    .long("git-url")
                    .help("repository the deployable is built from")
                    .action(ArgAction::Set),
            ),
        Command::new("list_deployables")
            .about("list the deployables of a group")
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
    let name = value_or_prompt(matches, "name", "deployable name")?;
    let description = value_or_prompt(matches, "description", "deployable description")?;
    let git_url = value_or_prompt(matches, "git-url", "git url")?;

    let mut client = DeployableClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let deployable = client
        .create(Request::new(CreateDeployableRequest {
            deployable_group_id,
            name,
            description,
            git_url,
        }))
        .await?
        .into_inner();

    println!("created deployable {} ({})", deployable.name, deployable.id);

    Ok(())
}

pub async fn list(matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let deployable_group_id = value_or_prompt(matches, "group", "deployable group id")?;

    let mut client = DeployableClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let response = client
        .list(Request::new(ListDeployablesRequest {
            by: Some(ListDeployablesBy::DeployableGroupId(deployable_group_id)),
        }))
        .await?
        .into_inner();

    let table_data = response
        .deployables
        .into_iter()
        .map(|deployable| vec![deployable.id, deployable.name, deployable.git_url])
        .collect();

    print_table(&["ID", "NAME", "GIT URL"], table_data, "No deployables found");

    Ok(())
}
