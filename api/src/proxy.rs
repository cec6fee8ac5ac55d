use indexmap::IndexMap;
use panopto_util::{Arguments, Client, RawResponse, Value};
use panopto_wsdl::signature::{operation_signature, Direction, Signature};
use serde::Serialize;
use tracing::{debug, info};

use super::{
    decode::Decode,
    error::{Error, Result},
    signature::{
        parse_operation_signature, parse_type_signature, Parameters, TypeDescriptor,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationSignature {
    pub input: Parameters,
    pub output: Parameters,
}

pub type OperationCatalog = IndexMap<String, OperationSignature>;
pub type PortCatalog = IndexMap<String, OperationCatalog>;
pub type ServiceCatalog = IndexMap<String, PortCatalog>;

/// The service and port a proxy sends its calls to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub service: String,
    pub port: String,
}

/// Result of [`ServiceProxy::list_operations`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationListing<'a> {
    Signature(&'a OperationSignature),
    Names(Vec<&'a str>),
}

/// A SOAP client together with catalogs of what its service description offers.
///
/// Catalog keys are `prefix:Name`, with the prefixes listed by
/// [`ServiceProxy::namespaces`].
pub struct ServiceProxy {
    client: Client,

    namespaces: IndexMap<String, String>,
    elements: IndexMap<String, TypeDescriptor>,
    types: IndexMap<String, TypeDescriptor>,
    services: ServiceCatalog,

    binding: Binding,

    // Calls go over https whichever port is bound
    secure: bool,
}

fn describe(signature: String) -> Result<(String, TypeDescriptor)> {
    let descriptor =
        parse_type_signature(&signature).map_err(|source| Error::InvalidType { signature, source })?;

    Ok((
        format!("{}:{}", descriptor.namespace, descriptor.name),
        descriptor,
    ))
}

fn invalid_configuration<E>(operation: &str, source: E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::InvalidServiceConfiguration {
        operation: operation.to_owned(),
        source: Box::new(source),
    }
}

fn unpack_services(client: &Client) -> Result<ServiceCatalog> {
    let definition = client.definition();
    let namespaces = client.namespaces();

    let mut services = ServiceCatalog::new();

    for service in &definition.services {
        let ports = services.entry(service.name.name.clone()).or_default();

        for port in &service.ports {
            let binding = definition.find_binding(&port.binding).ok_or_else(|| {
                invalid_configuration(
                    &port.name.name,
                    panopto_wsdl::error::Error::UnknownReference {
                        kind: "binding",
                        name: port.binding.name.clone(),
                    },
                )
            })?;

            let operations = ports.entry(port.name.name.clone()).or_default();

            for operation in &binding.operations {
                let name = &operation.name.name;

                let parameters = |direction: Direction| -> Result<Parameters> {
                    let rendered =
                        operation_signature(definition, namespaces, binding, name, direction)
                            .map_err(|source| invalid_configuration(name, source))?;

                    parse_operation_signature(&rendered)
                        .map_err(|source| invalid_configuration(name, source))
                };

                let signature = OperationSignature {
                    input: parameters(Direction::Input)?,
                    output: parameters(Direction::Output)?,
                };

                operations.insert(name.clone(), signature);
            }
        }
    }

    Ok(services)
}

fn select(services: &ServiceCatalog, service: Option<&str>, port: Option<&str>) -> Result<Binding> {
    let (service_name, ports) = match service {
        Some(name) => services
            .get_key_value(name)
            .ok_or_else(|| Error::UnknownService(name.to_owned()))?,

        None => services.first().ok_or(Error::NoServiceAvailable)?,
    };

    let port_name = match port {
        Some(name) => ports
            .get_key_value(name)
            .map(|(port, _)| port)
            .ok_or_else(|| Error::UnknownPort {
                service: service_name.clone(),
                port: name.to_owned(),
            })?,

        None => ports
            .first()
            .map(|(port, _)| port)
            .ok_or(Error::NoServiceAvailable)?,
    };

    Ok(Binding {
        service: service_name.clone(),
        port: port_name.clone(),
    })
}

impl ServiceProxy {
    pub fn new(client: Option<Client>) -> Result<Self> {
        let mut client = client.ok_or(Error::InvalidArgument("a client is required"))?;

        let namespaces: IndexMap<_, _> = client.namespaces().prefix_map().into_iter().collect();

        let elements: IndexMap<_, _> = client
            .definition()
            .elements
            .iter()
            .map(|element| describe(element.signature(client.definition(), client.namespaces())))
            .collect::<Result<_>>()?;

        let types: IndexMap<_, _> = client
            .definition()
            .types
            .iter()
            .map(|ty| describe(ty.signature(client.definition(), client.namespaces())))
            .collect::<Result<_>>()?;

        let services = unpack_services(&client)?;

        // Keep a binding the client already has, along with any address override
        let current = client
            .bound()
            .filter(|bound| {
                services
                    .get(&bound.service)
                    .map_or(false, |ports| ports.contains_key(&bound.port))
            })
            .map(|bound| Binding {
                service: bound.service.clone(),
                port: bound.port.clone(),
            });

        let binding = match current {
            Some(binding) => binding,
            None => {
                let binding = select(&services, None, None)?;
                client.bind(&binding.service, &binding.port)?;
                binding
            }
        };

        let secure = client
            .bound()
            .map_or(false, |bound| bound.address.scheme() == "https");

        info!(
            "Proxy for {} bound to {}/{}",
            client.wsdl_url(),
            binding.service,
            binding.port
        );

        Ok(Self {
            client,

            namespaces,
            elements,
            types,
            services,

            binding,
            secure,
        })
    }

    /// Selects the service and port subsequent calls go to.
    ///
    /// Either may be omitted, in which case the first one in document order is used.
    /// A proxy created over https stays on https.
    pub fn bind(&mut self, service: Option<&str>, port: Option<&str>) -> Result<&Binding> {
        let binding = select(&self.services, service, port)?;
        let bound = self.client.bind(&binding.service, &binding.port)?;

        if self.secure && bound.address.scheme() != "https" {
            let mut address = bound.address.clone();
            if address.set_scheme("https").is_ok() {
                debug!("Redirecting {}/{} to {}", binding.service, binding.port, address);
                self.client.set_address(address.as_str())?;
            }
        }

        debug!("Bound to {}/{}", binding.service, binding.port);
        self.binding = binding;

        Ok(&self.binding)
    }

    fn bound_operations(&self) -> Option<&OperationCatalog> {
        self.services
            .get(&self.binding.service)
            .and_then(|ports| ports.get(&self.binding.port))
    }

    /// The signature of `operation` when it exists on the bound port,
    /// otherwise the sorted names of every operation there.
    pub fn list_operations(&self, operation: Option<&str>) -> OperationListing<'_> {
        let operations = self.bound_operations();

        if let Some(signature) = operation.and_then(|name| operations?.get(name)) {
            return OperationListing::Signature(signature);
        }

        let mut names: Vec<_> = operations
            .into_iter()
            .flat_map(|operations| operations.keys().map(String::as_str))
            .collect();
        names.sort_unstable();

        OperationListing::Names(names)
    }

    /// Calls `operation` on the bound port and decodes the result.
    pub fn call_service(&self, operation: &str, arguments: &Arguments) -> Result<Value> {
        debug!("Calling {} with {} argument(s)", operation, arguments.len());
        Ok(self.client.call(operation, arguments)?.decode())
    }

    /// Calls `operation` on the bound port, returning the response undecoded.
    pub fn call_service_raw(&self, operation: &str, arguments: &Arguments) -> Result<RawResponse> {
        debug!("Calling {} (raw)", operation);
        Ok(self.client.call_raw(operation, arguments)?)
    }

    pub fn services(&self) -> &ServiceCatalog {
        &self.services
    }

    pub fn elements(&self) -> &IndexMap<String, TypeDescriptor> {
        &self.elements
    }

    pub fn types(&self) -> &IndexMap<String, TypeDescriptor> {
        &self.types
    }

    /// Prefix to namespace URI, for every prefix used in the catalogs.
    pub fn namespaces(&self) -> &IndexMap<String, String> {
        &self.namespaces
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The underlying client, for adjusting its headers or address.
    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    pub fn into_client(self) -> Client {
        self.client
    }
}

impl TryFrom<Option<Client>> for ServiceProxy {
    type Error = Error;

    fn try_from(client: Option<Client>) -> Result<Self> {
        Self::new(client)
    }
}

impl TryFrom<Client> for ServiceProxy {
    type Error = Error;

    fn try_from(client: Client) -> Result<Self> {
        Self::new(Some(client))
    }
}
