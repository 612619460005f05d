use clap::{Arg, ArgAction, Command};

mod clone;
mod config;
mod context;
mod deployable;
mod deployment;
mod environment;
mod group;
mod login;
mod profile;
mod vector;

use context::Context;
use profile::Profile;

fn cli() -> Command {
    Command::new("shipyard")
        .about("deployment control for ECS services")
        .version("0.1.0")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("endpoint")
                .long("endpoint")
                .global(true)
                .help("api endpoint, defaults to the saved profile")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .global(true)
                .help("api token, defaults to the saved profile")
                .action(ArgAction::Set),
        )
        .subcommand(login::args())
        .subcommands(group::args())
        .subcommands(environment::args())
        .subcommands(deployable::args())
        .subcommands(config::args())
        .subcommands(vector::args())
        .subcommands(deployment::args())
        .subcommands(clone::args())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let matches = cli().get_matches();

    let context = Context::new(&matches, Profile::load()?);

    match matches.subcommand() {
        Some(("login", submatches)) => login::handlers(submatches, &context).await,
        Some(("create_deployable_group", submatches)) => group::create(submatches, &context).await,
        Some(("list_deployable_groups", submatches)) => group::list(submatches, &context).await,
        Some(("create_environment", submatches)) => environment::create(submatches, &context).await,
        Some(("list_environments", submatches)) => environment::list(submatches, &context).await,
        Some(("create_deployable", submatches)) => deployable::create(submatches, &context).await,
        Some(("list_deployables", submatches)) => deployable::list(submatches, &context).await,
        Some(("create_deployable_config", submatches)) => {
            config::create_deployable_config(submatches, &context).await
        }
        Some(("create_environment_config", submatches)) => {
            config::create_environment_config(submatches, &context).await
        }
        Some(("list_deployable_configs", submatches)) => {
            config::list_deployable_configs(submatches, &context).await
        }
        Some(("list_environment_configs", submatches)) => {
            config::list_environment_configs(submatches, &context).await
        }
        Some(("create_deployable_vector", submatches)) => vector::create(submatches, &context).await,
        Some(("list_deployable_vectors", submatches)) => vector::list(submatches, &context).await,
        Some(("delete_deployable_vector", submatches)) => vector::delete(submatches, &context).await,
        Some(("list_deployments", submatches)) => deployment::list(submatches, &context).await,
        Some(("promote", submatches)) => deployment::promote(submatches, &context).await,
        Some(("promote_group", submatches)) => deployment::promote_group(submatches, &context).await,
        Some(("report_build_complete", submatches)) => {
            deployment::report_build_complete(submatches, &context).await
        }
        Some(("clone_ecs_task_definition_to_deployable_config", submatches)) => {
            clone::clone(submatches, &context).await
        }
        _ => unreachable!(), // subcommand_required rejects anything not registered above
    }
}
