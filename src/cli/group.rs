use clap::{Arg, ArgAction, ArgMatches, Command};
use shipyard_core::{CreateDeployableGroupRequest, DeployableGroupClient, ListDeployableGroupsRequest};
use tonic::Request;

use crate::context::{print_table, value_or_prompt, Context};

pub fn args() -> Vec<Command> {
    vec![
        Command::new("create_deployable_group")
            .about("create a deployable group")
            .arg(
                Arg::new("name")
                    .long("name")
                    .help("group name")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("description")
                    .long("description")
                    .help("group description")
                    .action(ArgAction::Set),
            ),
        Command::new("list_deployable_groups").about("list deployable groups"),
    ]
}

pub async fn create(matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let name = value_or_prompt(matches, "name", "group name")?;
    let description = value_or_prompt(matches, "description", "group description")?;

    let mut client = DeployableGroupClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let group = client
        .create(Request::new(CreateDeployableGroupRequest { name, description }))
        .await?
        .into_inner();

    println!("created deployable group {} ({})", group.name, group.id);

    Ok(())
}

pub async fn list(_matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let mut client = DeployableGroupClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let response = client
        .list(Request::new(ListDeployableGroupsRequest {}))
        .await?
        .into_inner();

    let table_data = response
        .groups
        .into_iter()
        .map(|group| vec![group.id, group.name, group.description])
        .collect();

    print_table(&["ID", "NAME", "DESCRIPTION"], table_data, "No deployable groups found");

    Ok(())
}
