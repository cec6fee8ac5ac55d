use std::{io::Write, sync::Arc, time::Duration};

use panopto_api::{
    endpoints::Endpoint, Arguments, AuthenticationManager, ClientOptions, ServiceProxy, Value,
};
use panopto_util::ReqwestTransport;
use serde_json::json;
use structopt::StructOpt;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum Error {
    #[error("Panopto API error")]
    ApiError(#[from] panopto_api::Error),

    #[error("Error creating HTTP transport")]
    TransportError(#[from] panopto_util::error::Error),

    #[error("Error writing output")]
    JsonError(#[from] serde_json::Error),

    #[error("Error")]
    IoError(#[from] std::io::Error),

    #[error("Missing --{0}")]
    MissingOption(&'static str),

    #[error("Invalid argument {0:?}, expected name=value")]
    InvalidArgument(String),
}

#[derive(StructOpt)]
struct Connection {
    /// Panopto server host name
    #[structopt(long, env = "PANOPTO_HOST")]
    host: Option<String>,

    #[structopt(short, long, env = "PANOPTO_USERNAME")]
    username: Option<String>,

    #[structopt(short, long, env = "PANOPTO_PASSWORD", hide_env_values = true, default_value = "")]
    password: String,

    /// Fetch descriptions and call services over https
    #[structopt(long)]
    tls: bool,

    /// Do not log on before calling
    #[structopt(long)]
    no_auth: bool,

    /// HTTP timeout in seconds
    #[structopt(long)]
    timeout: Option<u64>,

    #[structopt(long)]
    service: Option<String>,

    #[structopt(long)]
    port: Option<String>,
}

#[derive(StructOpt)]
enum Command {
    /// List the registered endpoint names
    Endpoints,

    /// List the operations of an endpoint, or show the signature of one
    Operations {
        #[structopt(flatten)]
        connection: Connection,

        endpoint: String,
        operation: Option<String>,
    },

    /// Show the element and type catalog of an endpoint
    Types {
        #[structopt(flatten)]
        connection: Connection,

        endpoint: String,
    },

    /// Call an operation with name=value arguments, values given as JSON or plain text
    Call {
        #[structopt(flatten)]
        connection: Connection,

        /// Print the HTTP response instead of the decoded result
        #[structopt(long)]
        raw: bool,

        endpoint: String,
        operation: String,
        arguments: Vec<String>,
    },
}

#[derive(StructOpt)]
struct Args {
    #[structopt(subcommand)]
    command: Command,
}

fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(value) => Value::Bool(value),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(value) => Value::Int(value),
            None => Value::Float(number.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(value) => Value::String(value),
        serde_json::Value::Array(values) => {
            Value::Sequence(values.into_iter().map(from_json).collect())
        }
        serde_json::Value::Object(map) => Value::Map(
            map.into_iter()
                .map(|(name, value)| (name, from_json(value)))
                .collect(),
        ),
    }
}

fn parse_arguments(arguments: &[String]) -> Result<Arguments, Error> {
    arguments
        .iter()
        .map(|argument| {
            let (name, value) = argument
                .split_once('=')
                .ok_or_else(|| Error::InvalidArgument(argument.clone()))?;

            let value = serde_json::from_str(value)
                .map(from_json)
                .unwrap_or_else(|_| Value::String(value.to_owned()));

            Ok((name.to_owned(), value))
        })
        .collect()
}

fn connect(connection: &Connection, endpoint: &str) -> Result<ServiceProxy, Error> {
    let host = connection.host.as_deref().ok_or(Error::MissingOption("host"))?;
    let username = connection
        .username
        .as_deref()
        .ok_or(Error::MissingOption("username"))?;

    let transport = match connection.timeout {
        Some(seconds) => ReqwestTransport::with_timeout(Duration::from_secs(seconds))?,
        None => ReqwestTransport::new(),
    };

    let manager = AuthenticationManager::with_transport(
        host,
        username,
        &connection.password,
        Arc::new(transport),
    )?;

    let mut proxy = manager.get_client(
        endpoint,
        ClientOptions {
            use_tls: connection.tls,
            authenticate_now: !connection.no_auth,
        },
    )?;

    if connection.service.is_some() || connection.port.is_some() {
        proxy.bind(connection.service.as_deref(), connection.port.as_deref())?;
    }

    debug!("Using {}/{}", proxy.binding().service, proxy.binding().port);
    Ok(proxy)
}

fn print(value: &serde_json::Value) -> Result<(), Error> {
    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();

    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(&mut stdout)?;
    Ok(())
}

#[paw::main]
fn main(args: Args) -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Endpoints => {
            if let Endpoint::Names(names) = AuthenticationManager::resolve_endpoint(None)? {
                for name in names {
                    println!("{}", name);
                }
            }
        }

        Command::Operations {
            connection,
            endpoint,
            operation,
        } => {
            let proxy = connect(&connection, &endpoint)?;
            print(&serde_json::to_value(proxy.list_operations(operation.as_deref()))?)?;
        }

        Command::Types {
            connection,
            endpoint,
        } => {
            let proxy = connect(&connection, &endpoint)?;
            print(&json!({
                "namespaces": proxy.namespaces(),
                "elements": proxy.elements(),
                "types": proxy.types(),
            }))?;
        }

        Command::Call {
            connection,
            raw,
            endpoint,
            operation,
            arguments,
        } => {
            let arguments = parse_arguments(&arguments)?;
            let proxy = connect(&connection, &endpoint)?;

            if raw {
                let response = proxy.call_service_raw(&operation, &arguments)?;

                println!("{}", response.status);
                for (name, value) in &response.headers {
                    println!("{}: {}", name, value);
                }
                println!();
                std::io::stdout().write_all(&response.body)?;
            } else {
                print(&serde_json::to_value(proxy.call_service(&operation, &arguments)?)?)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_parse_as_json_or_text() {
        let arguments = parse_arguments(&[
            "userId=00000000-0000-0000-0000-000000000001".to_owned(),
            "pagination={\"PageNumber\": 0, \"MaxNumberResults\": 25}".to_owned(),
            "includeDeleted=true".to_owned(),
            "ratio=0.5".to_owned(),
            "folder=null".to_owned(),
        ])
        .unwrap();

        assert_eq!(
            arguments["userId"],
            Value::String("00000000-0000-0000-0000-000000000001".to_owned())
        );
        assert_eq!(
            arguments["pagination"].get("MaxNumberResults"),
            Some(&Value::Int(25))
        );
        assert_eq!(arguments["includeDeleted"], Value::Bool(true));
        assert_eq!(arguments["ratio"], Value::Float(0.5));
        assert_eq!(arguments["folder"], Value::Null);
    }

    #[test]
    fn test_argument_without_value_is_rejected() {
        assert!(matches!(
            parse_arguments(&["userId".to_owned()]),
            Err(Error::InvalidArgument(argument)) if argument == "userId"
        ));
    }
}
