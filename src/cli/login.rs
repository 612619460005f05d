use clap::{ArgMatches, Command};
use shipyard_core::{HealthClient, HealthRequest};
use tonic::Request;

use crate::{context::Context, profile::Profile};

pub fn args() -> Command {
    Command::new("login").about(
        "check the endpoint answers with the given --endpoint and --token, then save both to the profile",
    )
}

pub async fn handlers(_matches: &ArgMatches, context: &Context) -> anyhow::Result<()> {
    let mut client = HealthClient::with_interceptor(context.channel().await?, context.interceptor()?);

    let response = client.health(Request::new(HealthRequest {})).await?.into_inner();
    if !response.ok {
        anyhow::bail!("{} reports it is not healthy", context.endpoint);
    }

    let profile = Profile {
        endpoint: Some(context.endpoint.clone()),
        token: context.token.clone(),
    };

    profile.save()?;

    tracing::info!("logged in to {}, profile saved", context.endpoint);

    Ok(())
}
