use clap::{Arg, ArgAction, ArgMatches, Command};
use shipyard_core::{
    ArtifactType, DeploymentClient, DeploymentMessage, DeploymentStatusFilter,
    ListDeploymentsRequest, PromoteGroupRequest, PromoteRequest, ReportBuildCompleteRequest,
};
use tonic::Request;

use crate::context::{print_table, value_or_prompt, Context};

pub fn args() -> Vec<Command> {
    vec![
        Command::new("list_deployments")
            .about("list the deployments of a deployable in deployment number order")
            .arg(
                Arg::new("deployable")
                    .long("deployable")
                    .help("deployable id")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("status")
                    .long("status")
                    .help("any (default), pending, in_progress, complete or failed")
                    .action(ArgAction::Set),
            ),
        Command::new("promote")
            .about("redeploy a completed deployment along the vectors sourced from its environment")
            .arg(
                Arg::new("deployment")
                    .long("deployment")
                    .help("deployment id")
                    .action(ArgAction::Set),
            ),
        Command::new("promote_group")
            .about("promote the latest completed deployment of every deployable in a group")
            .arg(
                Arg::new("group")
                    .long("group")
                    .help("deployable group id")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("environment")
                    .long("environment")
                    .help("environment id to promote from")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("build-number")
                    .long("build-number")
                    .help("only promote deployments of this build")
                    .action(ArgAction::Set),
            ),
        Command::new("report_build_complete")
            .about("report a finished build, creating its BUILD deployments")
            .arg(
                Arg::new("deployable")
                    .long("deployable")
                    .help("deployable id")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("build-number")
                    .long("build-number")
                    .help("build number")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("git-hash")
                    .long("git-hash")
                    .help("git commit the build was made from")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("image")
                    .long("image")
                    .help("docker image the build produced")
                    .action(ArgAction::Set),
            ),
    ]
}

fn parse_status(status: Option<&String>) -> anyhow::Result<DeploymentStatusFilter> {
    let Some(status) = status else {
        return Ok(DeploymentStatusFilter::Any);
    };

    match status.to_lowercase().as_str() {
        "any" => Ok(DeploymentStatusFilter::Any),
        "pending" => Ok(DeploymentStatusFilter::Pending),
        "in_progress" => Ok(DeploymentStatusFilter::InProgress),
        "complete" => Ok(DeploymentStatusFilter::Complete),
        "failed" => Ok(DeploymentStatusFilter::Failed),
        _ => anyhow::bail!("unknown deployment status {status:?}"),
    }
}

fn print_deployments(deployments: Vec<DeploymentMessage>, empty_message: &str) {
    let table_data = deployments
        .into_iter()
        .map(|deployment| {
            vec![
                deployment.id,
                deployment.deployment_number.to_string(),
                deployment.status,
                deployment.build_number,
                deployment.environment_id,
            ]
        })
        .collect();

    print_table(
        &["ID", "NUMBER", "STATUS", "BUILD", "ENVIRONMENT"],
        table_data,
        empty_message,
    );
}

pub async fn list(matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let deployable_id = value_or_prompt(matches, "deployable", "deployable id")?;
    let status = parse_status(matches.get_one::<String>("status"))?;

    let mut client = DeploymentClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let response = client
        .list(Request::new(ListDeploymentsRequest {
            deployable_id,
            status: status as i32,
        }))
        .await?
        .into_inner();

    print_deployments(response.deployments, "No deployments found");

    Ok(())
}

pub async fn promote(matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let deployment_id = value_or_prompt(matches, "deployment", "deployment id")?;

    let mut client = DeploymentClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let response = client
        .promote(Request::new(PromoteRequest { deployment_id }))
        .await?
        .into_inner();

    print_deployments(response.deployments, "No vectors to promote along");

    Ok(())
}

pub async fn promote_group(matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let deployable_group_id = value_or_prompt(matches, "group", "deployable group id")?;
    let environment_id = value_or_prompt(matches, "environment", "environment id")?;
    let build_number = matches.get_one::<String>("build-number").cloned().unwrap_or_default();

    let mut client = DeploymentClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let response = client
        .promote_group(Request::new(PromoteGroupRequest {
            deployable_group_id,
            environment_id,
            build_number,
        }))
        .await?
        .into_inner();

    print_deployments(response.deployments, "No vectors to promote along");

    Ok(())
}

pub async fn report_build_complete(matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let deployable_id = value_or_prompt(matches, "deployable", "deployable id")?;
    let build_number = value_or_prompt(matches, "build-number", "build number")?;
    let git_hash = value_or_prompt(matches, "git-hash", "git hash")?;
    let docker_image = value_or_prompt(matches, "image", "docker image")?;

    let mut client = DeploymentClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let response = client
        .report_build_complete(Request::new(ReportBuildCompleteRequest {
            deployable_id,
            build_number,
            git_hash,
            artifact_type: ArtifactType::DockerImage as i32,
            docker_image,
        }))
        .await?
        .into_inner();

    print_deployments(response.deployments, "No BUILD vectors, nothing to deploy");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(None).unwrap(), DeploymentStatusFilter::Any);
        assert_eq!(
            parse_status(Some(&"IN_PROGRESS".to_string())).unwrap(),
            DeploymentStatusFilter::InProgress
        );
        assert!(parse_status(Some(&"done".to_string())).is_err());
    }
}
