use std::fs;
use std::path::Path;

use sipbag::xsd::{validate_file, Error, Schema};
use tempfile::TempDir;

const ORDER_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
    xmlns="urn:test:order" targetNamespace="urn:test:order" elementFormDefault="qualified">
  <xs:include schemaLocation="types/common.xsd"/>
  <xs:element name="order">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="item" type="item" maxOccurs="unbounded"/>
      </xs:sequence>
      <xs:attribute name="id" type="orderId" use="required"/>
    </xs:complexType>
  </xs:element>
</xs:schema>
"#;

const COMMON_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
    elementFormDefault="qualified">
  <xs:simpleType name="orderId">
    <xs:restriction base="xs:string">
      <xs:pattern value="O-[0-9]{4}"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:complexType name="item">
    <xs:sequence>
      <xs:element name="sku" type="xs:token"/>
      <xs:element name="quantity" type="xs:positiveInteger"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>
"#;

#[test]
fn valid_document_against_schema_with_include() {
    let temp = TempDir::new().unwrap();
    let schema = write_schemas(temp.path());
    let document = temp.path().join("order.xml");
    fs::write(
        &document,
        r#"<order xmlns="urn:test:order" id="O-0042">
  <item><sku>A-1</sku><quantity>2</quantity></item>
  <item><sku>B-7</sku><quantity>1</quantity></item>
</order>"#,
    )
    .unwrap();

    let report = validate_file(&document, &schema).unwrap();

    assert!(report.is_valid(), "{:?}", report.violations());
}

#[test]
fn invalid_document_reports_every_violation() {
    let temp = TempDir::new().unwrap();
    let schema = write_schemas(temp.path());
    let document = temp.path().join("order.xml");
    fs::write(
        &document,
        r#"<order xmlns="urn:test:order" id="42">
  <item><sku>A-1</sku><quantity>0</quantity></item>
  <item><sku>B-7</sku></item>
</order>"#,
    )
    .unwrap();

    let report = validate_file(&document, &schema).unwrap();

    assert!(!report.is_valid());
    let paths: Vec<&str> = report.violations().iter().map(|v| v.path()).collect();
    assert_eq!(
        vec!["/order/@id", "/order/item[1]/quantity", "/order/item[2]"],
        paths
    );
    assert_eq!(3, report.violations()[2].line());
    assert_eq!(
        "Element is incomplete; expected quantity",
        report.violations()[2].message()
    );
}

#[test]
fn same_schema_validates_many_documents() {
    let temp = TempDir::new().unwrap();
    let schema = Schema::from_file(write_schemas(temp.path())).unwrap();

    assert_eq!(Some("urn:test:order"), schema.target_namespace());

    let valid = r#"<order xmlns="urn:test:order" id="O-0001"><item><sku>x</sku><quantity>1</quantity></item></order>"#;
    let invalid = r#"<order xmlns="urn:test:order" id="O-0001"/>"#;

    assert!(schema.validate(valid).unwrap().is_valid());
    assert!(!schema.validate(invalid).unwrap().is_valid());
    assert!(schema.validate(valid).unwrap().is_valid());
}

#[test]
fn fail_when_included_schema_is_missing() {
    let temp = TempDir::new().unwrap();
    let schema = temp.path().join("order.xsd");
    fs::write(&schema, ORDER_XSD).unwrap();

    let error = Schema::from_file(&schema).unwrap_err();

    assert!(matches!(error, Error::IoRead { .. }), "{}", error);
}

#[test]
fn fail_when_document_is_missing() {
    let temp = TempDir::new().unwrap();
    let schema = write_schemas(temp.path());

    let error = validate_file(temp.path().join("missing.xml"), &schema).unwrap_err();

    assert!(matches!(error, Error::IoRead { .. }), "{}", error);
}

fn write_schemas(base: &Path) -> std::path::PathBuf {
    fs::create_dir_all(base.join("types")).unwrap();
    fs::write(base.join("types/common.xsd"), COMMON_XSD).unwrap();
    let schema = base.join("order.xsd");
    fs::write(&schema, ORDER_XSD).unwrap();
    schema
}
