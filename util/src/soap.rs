use panopto_wsdl::{
    types::{Definition, Message, NamespacedName, Namespaces},
    Loader,
};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use super::{
    envelope::{decode_response, RequestEnvelope, Schema},
    error::Error,
    reply::Reply,
    transport::{HttpRequest, RawResponse, ReqwestTransport, Transport, TransportLoader},
    value::Arguments,
    xml::ToXml,
};

/// A SOAP client driven entirely by a parsed service description.
pub struct Client {
    transport: Arc<dyn Transport>,
    wsdl_url: Url,

    definition: Definition,
    namespaces: Namespaces,

    headers: Vec<(String, String)>,
    bound: Option<BoundPort>,
}

/// The service port operations are currently sent to.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundPort {
    pub service: String,
    pub port: String,
    pub binding: NamespacedName,
    pub address: Url,
}

struct PreparedCall<'a> {
    request: HttpRequest,
    output: Option<&'a Message>,
}

impl Client {
    pub fn from_url(url: &str) -> Result<Self, Error> {
        Self::from_url_with(url, Arc::new(ReqwestTransport::new()))
    }

    pub fn from_url_with(url: &str, transport: Arc<dyn Transport>) -> Result<Self, Error> {
        let url = panopto_wsdl::resolve_url(url)?;
        info!("Loading service description from {}", url);

        let (definition, namespaces) = {
            let loader = TransportLoader::new(transport.as_ref());
            let document = loader.load(&url)?;
            panopto_wsdl::parse_document(&url, &document, &loader)?
        };

        Self::from_definition(url, definition, namespaces, transport)
    }

    /// Wraps an already parsed description, bound to its first service and port when it has one.
    pub fn from_definition(
        wsdl_url: Url,
        definition: Definition,
        namespaces: Namespaces,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, Error> {
        let first = definition.services.iter().find_map(|service| {
            service
                .ports
                .first()
                .map(|port| (service.name.name.clone(), port.name.name.clone()))
        });

        let mut client = Self {
            transport,
            wsdl_url,

            definition,
            namespaces,

            headers: Vec::new(),
            bound: None,
        };

        if let Some((service, port)) = first {
            client.bind(&service, &port)?;
        }

        Ok(client)
    }

    pub fn bind(&mut self, service: &str, port: &str) -> Result<&BoundPort, Error> {
        let found = self
            .definition
            .find_service(service)
            .ok_or_else(|| Error::UnknownService(service.to_owned()))?
            .find_port(port)
            .ok_or_else(|| Error::UnknownPort {
                service: service.to_owned(),
                port: port.to_owned(),
            })?;

        let address = Url::parse(&found.location)?;
        debug!("Binding {}/{} at {}", service, port, address);

        Ok(self.bound.insert(BoundPort {
            service: service.to_owned(),
            port: port.to_owned(),
            binding: found.binding.clone(),
            address,
        }))
    }

    /// Binds directly to a binding by qualified name, sending operations to `address`.
    pub fn bind_to(
        &mut self,
        namespace: &str,
        binding: &str,
        address: &str,
    ) -> Result<&BoundPort, Error> {
        let name = self
            .definition
            .bindings
            .iter()
            .map(|candidate| &candidate.name)
            .find(|name| name.name == binding && name.namespace(&self.namespaces) == namespace)
            .cloned()
            .ok_or_else(|| Error::UnknownBinding(format!("{{{}}}{}", namespace, binding)))?;

        let (service, port) = self
            .definition
            .services
            .iter()
            .find_map(|service| {
                service
                    .ports
                    .iter()
                    .find(|port| port.binding == name)
                    .map(|port| (service.name.name.clone(), port.name.name.clone()))
            })
            .unwrap_or_else(|| (binding.to_owned(), binding.to_owned()));

        let address = Url::parse(address)?;
        debug!("Binding {} at {}", binding, address);

        Ok(self.bound.insert(BoundPort {
            service,
            port,
            binding: name,
            address,
        }))
    }

    pub fn set_address(&mut self, address: &str) -> Result<(), Error> {
        let bound = self.bound.as_mut().ok_or(Error::Unbound)?;
        bound.address = Url::parse(address)?;
        Ok(())
    }

    /// Sets a header sent with every call, replacing any header of the same name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.remove_header(name);
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers
            .retain(|(header, _)| !header.eq_ignore_ascii_case(name));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn bound(&self) -> Option<&BoundPort> {
        self.bound.as_ref()
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    pub fn wsdl_url(&self) -> &Url {
        &self.wsdl_url
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    fn prepare(&self, operation: &str, arguments: &Arguments) -> Result<PreparedCall<'_>, Error> {
        let bound = self.bound.as_ref().ok_or(Error::Unbound)?;
        let unknown_operation = || Error::UnknownOperation(operation.to_owned());

        let binding = self
            .definition
            .find_binding(&bound.binding)
            .ok_or_else(|| Error::UnknownBinding(bound.binding.name.clone()))?;
        let binding_operation = binding.find_operation(operation).ok_or_else(unknown_operation)?;

        let port_operation = self
            .definition
            .find_port_type(&binding.ty)
            .and_then(|port_type| port_type.find_operation(operation))
            .ok_or_else(unknown_operation)?;

        let find_message = |name: &Option<NamespacedName>| {
            name.as_ref()
                .and_then(|name| self.definition.find_message(name))
        };

        let body = RequestEnvelope {
            schema: Schema::new(&self.definition, &self.namespaces),
            operation,
            message: find_message(&port_operation.input),
            arguments,
        }
        .to_bytes()?;

        let mut headers = vec![
            (
                "Content-Type".to_owned(),
                "text/xml; charset=utf-8".to_owned(),
            ),
            (
                "SOAPAction".to_owned(),
                format!("\"{}\"", binding_operation.action.as_deref().unwrap_or_default()),
            ),
        ];
        headers.extend(self.headers.iter().cloned());

        Ok(PreparedCall {
            request: HttpRequest {
                url: bound.address.clone(),
                headers,
                body,
            },
            output: find_message(&port_operation.output),
        })
    }

    /// Calls `operation` on the bound port and decodes its response.
    pub fn call(&self, operation: &str, arguments: &Arguments) -> Result<Reply, Error> {
        let PreparedCall { request, output } = self.prepare(operation, arguments)?;

        debug!("Calling {} at {}", operation, request.url);
        let response = self.transport.post(request)?;

        let schema = Schema::new(&self.definition, &self.namespaces);
        match decode_response(schema, output, &response.body) {
            Ok(reply) if response.is_success() => Ok(reply),
            Err(err @ Error::Fault { .. }) => Err(err),
            Err(err) if response.is_success() => Err(err),

            _ => Err(Error::Status {
                status: response.status,
                body: response.text(),
            }),
        }
    }

    /// Calls `operation` on the bound port, returning the HTTP response as received.
    pub fn call_raw(&self, operation: &str, arguments: &Arguments) -> Result<RawResponse, Error> {
        let PreparedCall { request, .. } = self.prepare(operation, arguments)?;

        debug!("Calling {} at {} (raw)", operation, request.url);
        self.transport.post(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{arguments, reply::Scalar};
    use bytes::Bytes;
    use std::sync::Mutex;

    const USAGE_REPORTING: &str = include_str!("../../wsdl/tests/fixtures/UsageReporting.wsdl");

    const PING_RESPONSE: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><PingResponse xmlns="http://tempuri.org/"><PingResult>pong</PingResult></PingResponse></s:Body></s:Envelope>"#;

    #[derive(Default)]
    struct Recording {
        requests: Mutex<Vec<HttpRequest>>,
        status: u16,
    }

    impl Transport for Recording {
        fn get(&self, url: &Url, _: &[(String, String)]) -> Result<RawResponse, Error> {
            assert_eq!(url.query(), Some("singleWsdl"));
            Ok(RawResponse {
                status: 200,
                headers: Vec::new(),
                body: Bytes::from_static(USAGE_REPORTING.as_bytes()),
            })
        }

        fn post(&self, request: HttpRequest) -> Result<RawResponse, Error> {
            self.requests.lock().unwrap().push(request);
            Ok(RawResponse {
                status: self.status,
                headers: Vec::new(),
                body: Bytes::from_static(PING_RESPONSE.as_bytes()),
            })
        }
    }

    fn client(status: u16) -> (Client, Arc<Recording>) {
        let transport = Arc::new(Recording {
            status,
            ..Default::default()
        });

        let client = Client::from_url_with(
            "http://panopto.example.com/UsageReporting.svc?singleWsdl",
            transport.clone(),
        )
        .unwrap();

        (client, transport)
    }

    #[test]
    fn test_binds_first_port() {
        let (mut client, _) = client(200);

        let bound = client.bound().unwrap();
        assert_eq!(bound.service, "UsageReporting");
        assert_eq!(bound.port, "BasicHttpBinding_IUsageReporting");

        let bound = client
            .bind("UsageReporting", "BasicHttpsBinding_IUsageReporting")
            .unwrap();
        assert_eq!(bound.address.scheme(), "https");

        assert!(matches!(
            client.bind("UsageReporting", "Missing"),
            Err(Error::UnknownPort { .. })
        ));
    }

    #[test]
    fn test_call_sends_headers_and_decodes() {
        let (mut client, transport) = client(200);
        client.set_header("Cookie", "first");
        client.set_header("cookie", ".ASPXAUTH=abc");

        let reply = client.call("Ping", &arguments! {}).unwrap();
        assert_eq!(reply, Reply::Scalar(Scalar::String("pong".into())));

        let requests = transport.requests.lock().unwrap();
        let headers = &requests[0].headers;
        assert!(headers.contains(&(
            "SOAPAction".to_owned(),
            "\"http://tempuri.org/IUsageReporting/Ping\"".to_owned()
        )));
        assert!(headers.contains(&("cookie".to_owned(), ".ASPXAUTH=abc".to_owned())));
        assert_eq!(
            headers
                .iter()
                .filter(|(name, _)| name.eq_ignore_ascii_case("cookie"))
                .count(),
            1
        );
    }

    #[test]
    fn test_error_status_without_fault() {
        let (client, _) = client(503);

        assert!(matches!(
            client.call("Ping", &arguments! {}),
            Err(Error::Status { status: 503, .. })
        ));
        assert_eq!(client.call_raw("Ping", &arguments! {}).unwrap().status, 503);
        assert!(matches!(
            client.call("Missing", &arguments! {}),
            Err(Error::UnknownOperation(_))
        ));
    }

    #[test]
    fn test_bind_to_overrides_address() {
        let (mut client, _) = client(200);

        let bound = client
            .bind_to(
                "http://tempuri.org/",
                "BasicHttpsBinding_IUsageReporting",
                "https://override.example.com/UsageReporting.svc",
            )
            .unwrap();

        assert_eq!(bound.port, "BasicHttpsBinding_IUsageReporting");
        assert_eq!(bound.address.host_str(), Some("override.example.com"));
    }
}
