use clap::{Arg, ArgAction, ArgMatches, Command};
use shipyard_core::{
    CreateDeployableVectorRequest, DeployableVectorIdRequest, ListDeployableVectorsRequest,
    VectorClient, VectorSourceType,
};
use tonic::Request;

use crate::context::{print_table, value_or_prompt, Context};

fn deployable_arg() -> Arg {
    Arg::new("deployable")
        .long("deployable")
        .help("deployable id")
        .action(ArgAction::Set)
}

pub fn args() -> Vec<Command> {
    vec![
        Command::new("create_deployable_vector")
            .about("deploy a deployable into an environment after a build or another environment")
            .arg(deployable_arg())
            .arg(
                Arg::new("source-type")
                    .long("source-type")
                    .help("BUILD or ENVIRONMENT_ID")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("source-environment")
                    .long("source-environment")
                    .help("source environment id, for ENVIRONMENT_ID vectors")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("target-environment")
                    .long("target-environment")
                    .help("target environment id")
                    .action(ArgAction::Set),
            ),
        Command::new("list_deployable_vectors")
            .about("list the vectors of a deployable")
            .arg(deployable_arg()),
        Command::new("delete_deployable_vector")
            .about("delete a vector that has not produced deployments")
            .arg(
                Arg::new("vector")
                    .long("vector")
                    .help("deployable vector id")
                    .action(ArgAction::Set),
            ),
    ]
}

fn parse_source_type(source_type: &str) -> anyhow::Result<VectorSourceType> {
    match source_type.to_uppercase().as_str() {
        "BUILD" => Ok(VectorSourceType::Build),
        "ENVIRONMENT_ID" => Ok(VectorSourceType::EnvironmentId),
        _ => anyhow::bail!("unknown source type {source_type:?}, expected BUILD or ENVIRONMENT_ID"),
    }
}

fn source_type_name(source_type: i32) -> &'static str {
    match VectorSourceType::from_i32(source_type) {
        Some(VectorSourceType::Build) => "BUILD",
        Some(VectorSourceType::EnvironmentId) => "ENVIRONMENT_ID",
        None => "UNKNOWN",
    }
}

pub async fn create(matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let deployable_id = value_or_prompt(matches, "deployable", "deployable id")?;
    let source_type = parse_source_type(&value_or_prompt(matches, "source-type", "source type (BUILD or ENVIRONMENT_ID)")?)?;
    let source_environment_id = match source_type {
        VectorSourceType::Build => String::new(),
        VectorSourceType::EnvironmentId => {
            value_or_prompt(matches, "source-environment", "source environment id")?
        }
    };
    let target_environment_id = value_or_prompt(matches, "target-environment", "target environment id")?;

    let mut client = VectorClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let vector = client
        .create(Request::new(CreateDeployableVectorRequest {
            deployable_id,
            source_type: source_type as i32,
            source_environment_id,
            target_environment_id,
        }))
        .await?
        .into_inner();

    println!("created deployable vector {}", vector.id);

    Ok(())
}

pub async fn list(matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let deployable_id = value_or_prompt(matches, "deployable", "deployable id")?;

    let mut client = VectorClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let response = client
        .list(Request::new(ListDeployableVectorsRequest { deployable_id }))
        .await?
        .into_inner();

    let table_data = response
        .vectors
        .into_iter()
        .map(|vector| {
            vec![
                vector.id,
                source_type_name(vector.source_type).to_string(),
                vector.source_environment_id,
                vector.target_environment_id,
            ]
        })
        .collect();

    print_table(&["ID", "SOURCE TYPE", "SOURCE", "TARGET"], table_data, "No deployable vectors found");

    Ok(())
}

pub async fn delete(matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let deployable_vector_id = value_or_prompt(matches, "vector", "deployable vector id")?;

    let mut client = VectorClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let response = client
        .delete(Request::new(DeployableVectorIdRequest { deployable_vector_id }))
        .await?
        .into_inner();

    println!("deleted {} deployable vector(s)", response.deleted);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_type() {
        assert_eq!(parse_source_type("build").unwrap(), VectorSourceType::Build);
        assert_eq!(parse_source_type("ENVIRONMENT_ID").unwrap(), VectorSourceType::EnvironmentId);
        assert!(parse_source_type("manual").is_err());

        assert_eq!(source_type_name(VectorSourceType::EnvironmentId as i32), "ENVIRONMENT_ID");
    }
}
