use panopto_wsdl::{
    error::Error,
    parse,
    signature::{operation_signature, Direction, Signature},
    types::{FieldKind, Occurs, TypeKind, XSD_NAMESPACE},
};

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

#[test]
fn test_parse_wcf_single_wsdl() {
    let (definition, namespaces) = parse(fixture("UsageReporting.wsdl")).unwrap();

    let service = definition.find_service("UsageReporting").unwrap();
    let ports: Vec<_> = service.ports.iter().map(|port| port.name.name.as_str()).collect();
    assert_eq!(
        ports,
        ["BasicHttpBinding_IUsageReporting", "BasicHttpsBinding_IUsageReporting"]
    );
    assert_eq!(
        service.ports[1].location,
        "https://panopto.example.com/Panopto/PublicAPI/4.0/UsageReporting.svc"
    );

    let binding = definition.find_binding(&service.ports[0].binding).unwrap();
    let operation = binding.find_operation("GetUserDetailedUsage").unwrap();
    assert_eq!(
        operation.action.as_deref(),
        Some("http://tempuri.org/IUsageReporting/GetUserDetailedUsage")
    );
    assert_eq!(operation.input.as_deref(), Some("literal"));

    let port_type = definition.find_port_type(&binding.ty).unwrap();
    assert_eq!(
        port_type
            .find_operation("GetUserDetailedUsage")
            .unwrap()
            .documentation
            .as_deref(),
        Some("Get detailed usage for a user")
    );

    let granularity = definition
        .types
        .iter()
        .find(|ty| ty.name.name == "Granularity")
        .unwrap();
    match &granularity.kind {
        TypeKind::Enumeration { base, values } => {
            assert_eq!(base.namespace(&namespaces), XSD_NAMESPACE);
            assert_eq!(values, &["Hourly", "Daily"]);
        }
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn test_parse_serialization_schema() {
    let (definition, namespaces) = parse(fixture("UsageReporting.wsdl")).unwrap();
    let serialization = "http://schemas.microsoft.com/2003/10/Serialization/";

    let simple_base = |name: &str| {
        let ty = definition
            .types
            .iter()
            .find(|ty| ty.name.name == name && ty.name.namespace(&namespaces) == serialization)
            .unwrap();

        match &ty.kind {
            TypeKind::Simple(base) => {
                assert_eq!(base.namespace(&namespaces), XSD_NAMESPACE);
                base.name.clone()
            }
            other => panic!("unexpected kind {:?}", other),
        }
    };

    assert_eq!(simple_base("char"), "int");
    assert_eq!(simple_base("duration"), "duration");
    assert_eq!(simple_base("guid"), "string");

    let any_type = definition
        .elements
        .iter()
        .find(|element| element.name.name == "anyType")
        .unwrap();
    match &any_type.kind {
        TypeKind::Alias(ty) => {
            assert_eq!(ty.namespace(&namespaces), XSD_NAMESPACE);
            assert_eq!(ty.name, "anyType");
        }
        other => panic!("unexpected kind {:?}", other),
    }

    // Top level attribute declarations are skipped
    let serialization_elements: Vec<_> = definition
        .elements
        .iter()
        .filter(|element| element.name.namespace(&namespaces) == serialization)
        .map(|element| element.name.name.as_str())
        .collect();
    assert_eq!(serialization_elements, ["string", "guid", "anyType", "char", "duration"]);

    // So are appinfo annotations on complex types
    let result = definition
        .types
        .iter()
        .find(|ty| ty.name.name == "DetailedUsageResult")
        .unwrap();
    assert_eq!(definition.fields(&result.kind).len(), 4);
}

#[test]
fn test_parse_follows_imports() {
    let (definition, namespaces) = parse(fixture("Imports.wsdl")).unwrap();

    let entry = definition
        .types
        .iter()
        .find(|ty| ty.name.name == "Entry")
        .unwrap();
    assert_eq!(entry.name.namespace(&namespaces), "urn:example:types");

    let fields = definition.fields(&entry.kind);
    let names: Vec<_> = fields.iter().map(|field| field.name.name.as_str()).collect();
    assert_eq!(names, ["Id", "Tags", "Amount"]);
    assert_eq!(fields[1].max_occurs, Occurs::Unbounded);
    assert!(fields[2].nillable);
    assert!(matches!(fields[2].ty, FieldKind::Inner(TypeKind::Simple(_))));

    let lookup = definition
        .elements
        .iter()
        .find(|element| element.name.name == "Lookup")
        .unwrap();
    let fields = definition.complex_fields(&lookup.kind).unwrap();
    assert!(matches!(fields[0].ty, FieldKind::Ref(_)));
    assert!(matches!(fields[1].ty, FieldKind::Any));

    let binding = &definition.bindings[0];
    assert_eq!(binding.style.as_deref(), Some("document"));
    assert_eq!(binding.operations[0].action, None);

    let types = namespaces.prefix_of("urn:example:types").unwrap();
    assert_eq!(
        lookup.signature(&definition, &namespaces),
        format!(
            "{}:Lookup(Key: {}:Key, None)",
            namespaces.prefix_of("urn:example:imports").unwrap(),
            types
        )
    );
    assert_eq!(
        operation_signature(&definition, &namespaces, binding, "Lookup", Direction::Output).unwrap(),
        format!("Id: xsd:long, Tags: xsd:string[], Amount: {}:Amount", types)
    );
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(matches!(
        parse(fixture("Missing.wsdl")),
        Err(Error::PathConversionError(Some(_)))
    ));
}
