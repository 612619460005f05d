use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use anyhow::Context as _;
use ascii_table::{Align, AsciiTable};
use clap::ArgMatches;
use shipyard_core::ClientInterceptor;
use tonic::transport::Channel;

use crate::profile::Profile;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:50051";

pub struct Context {
    pub endpoint: String,
    pub token: Option<String>,
}

impl Context {
    /// Profile values, overridden by the global `--endpoint` and `--token`
    /// flags.
    pub fn new(matches: &ArgMatches, profile: Profile) -> Self {
        let endpoint = matches
            .get_one::<String>("endpoint")
            .cloned()
            .or(profile.endpoint)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let token = matches
            .get_one::<String>("token")
            .cloned()
            .or(profile.token);

        Context { endpoint, token }
    }

    pub async fn channel(&self) -> anyhow::Result<Channel> {
        let channel = Channel::from_shared(self.endpoint.clone())?
            .connect()
            .await
            .with_context(|| format!("connecting to {}", self.endpoint))?;

        Ok(channel)
    }

    pub fn interceptor(&self) -> anyhow::Result<ClientInterceptor> {
        let token = match &self.token {
            Some(token) => Some(format!("Bearer {token}").parse()?),
            None => None,
        };

        Ok(ClientInterceptor { token })
    }
}

/// The flag's value, or a line read from stdin when the flag is missing.
pub fn value_or_prompt(matches: &ArgMatches, name: &str, prompt: &str) -> anyhow::Result<String> {
    if let Some(value) = matches.get_one::<String>(name) {
        return Ok(value.clone());
    }

    let stdin = io::stdin();
    prompt_line(&mut stdin.lock(), &mut io::stderr(), prompt)
}

pub fn prompt_line(input: &mut impl BufRead, output: &mut impl Write, prompt: &str) -> anyhow::Result<String> {
    write!(output, "{prompt}: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    Ok(line.trim().to_string())
}

/// Parses repeated `KEY=VALUE` flags.
pub fn parse_key_values<'a>(pairs: impl IntoIterator<Item = &'a String>) -> anyhow::Result<HashMap<String, String>> {
    let mut values = HashMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("{pair:?} is not of the form KEY=VALUE"))?;
        if key.is_empty() {
            anyhow::bail!("{pair:?} has an empty key");
        }
        values.insert(key.to_string(), value.to_string());
    }

    Ok(values)
}

pub fn print_table(headers: &[&str], table_data: Vec<Vec<String>>, empty_message: &str) {
    if table_data.is_empty() {
        println!("{empty_message}");

        return;
    }

    let mut ascii_table = AsciiTable::default();
    for (index, header) in headers.iter().enumerate() {
        ascii_table
            .column(index)
            .set_header(*header)
            .set_align(Align::Left);
    }

    ascii_table.print(table_data);
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_parse_key_values() {
        let pairs = vec!["LOG_LEVEL=info".to_string(), "URL=http://x?a=b".to_string()];
        let values = parse_key_values(&pairs).unwrap();

        assert_eq!(values["LOG_LEVEL"], "info");
        assert_eq!(values["URL"], "http://x?a=b");

        assert!(parse_key_values(&["LOG_LEVEL".to_string()]).is_err());
        assert!(parse_key_values(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_prompt_line() {
        let mut input = Cursor::new("  svc-a \n");
        let mut output = vec![];

        let value = prompt_line(&mut input, &mut output, "deployable name").unwrap();

        assert_eq!(value, "svc-a");
        assert_eq!(String::from_utf8(output).unwrap(), "deployable name: ");
    }
}
