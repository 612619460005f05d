use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const CONFIG_CPU: &str = "ECS_CONFIG_CPU";
pub const CONFIG_MEMORY: &str = "ECS_CONFIG_MEMORY";
pub const CONFIG_PORT_PREFIX: &str = "ECS_CONFIG_PORT_MAPPING";

/// A `container_port:host_port:protocol` mapping, as carried in config values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerPortMapping {
    pub container_port: i32,
    pub host_port: i32,
    pub protocol: String,
}

impl fmt::Display for ContainerPortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.container_port, self.host_port, self.protocol
        )
    }
}

impl FromStr for ContainerPortMapping {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [container_port, host_port, protocol] = parts.as_slice() else {
            anyhow::bail!("port mapping {s:?} is not of the form container_port:host_port:protocol");
        };

        let container_port = container_port
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("port mapping {s:?} has an invalid container port"))?;
        let host_port = host_port
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("port mapping {s:?} has an invalid host port"))?;

        let protocol = protocol.trim().to_lowercase();
        if protocol != "tcp" && protocol != "udp" {
            anyhow::bail!("port mapping {s:?} has unsupported protocol {protocol:?}");
        }

        Ok(ContainerPortMapping {
            container_port,
            host_port,
            protocol,
        })
    }
}

/// The parts of a running task definition that can be carried over into a
/// deployable config.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskDefinitionSnapshot {
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub environment: Vec<(String, String)>,
    pub port_mappings: Vec<ContainerPortMapping>,
}

/// Converts a task definition into config values the orchestrator adapter
/// will turn back into the same task definition.
pub fn task_definition_config_values(snapshot: &TaskDefinitionSnapshot) -> BTreeMap<String, String> {
    let mut values: BTreeMap<String, String> = snapshot.environment.iter().cloned().collect();

    if let Some(cpu) = &snapshot.cpu {
        values.insert(CONFIG_CPU.to_string(), cpu.clone());
    }

    if let Some(memory) = &snapshot.memory {
        values.insert(CONFIG_MEMORY.to_string(), memory.clone());
    }

    for (index, mapping) in snapshot.port_mappings.iter().enumerate() {
        values.insert(format!("{CONFIG_PORT_PREFIX}_{index}"), mapping.to_string());
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_definition_config_values() {
        let snapshot = TaskDefinitionSnapshot {
            cpu: Some("256".to_string()),
            memory: Some("512".to_string()),
            environment: vec![("FOO".to_string(), "bar".to_string())],
            port_mappings: vec![ContainerPortMapping {
                container_port: 80,
                host_port: 0,
                protocol: "tcp".to_string(),
            }],
        };

        let values = task_definition_config_values(&snapshot);

        let expected: BTreeMap<String, String> = [
            ("FOO", "bar"),
            ("ECS_CONFIG_CPU", "256"),
            ("ECS_CONFIG_MEMORY", "512"),
            ("ECS_CONFIG_PORT_MAPPING_0", "80:0:tcp"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        assert_eq!(values, expected);
    }

    #[test]
    fn test_parse_port_mapping() {
        let mapping: ContainerPortMapping = "8080:0:UDP".parse().unwrap();

        assert_eq!(mapping.container_port, 8080);
        assert_eq!(mapping.host_port, 0);
        assert_eq!(mapping.protocol, "udp");

        assert!("80:0".parse::<ContainerPortMapping>().is_err());
        assert!("80:x:tcp".parse::<ContainerPortMapping>().is_err());
        assert!("80:0:sctp".parse::<ContainerPortMapping>().is_err());
    }
}
