//! Declaration file loading

mod fixtures;

use std::fs;

use serde_json::json;
use tempfile::TempDir;
use tfsynth::{synthesize, AppFile, AppFileError, ErrorCode, SynthError};

fn parse(text: &str) -> AppFile {
    AppFile::from_json(text).unwrap()
}

#[test]
fn test_scoped_ids_are_hashed_and_stable() {
    let app = fixtures::load_app("network.toml");
    let first = synthesize(app.build().unwrap(), fixtures::bare_options()).unwrap();
    let second = synthesize(app.build().unwrap(), fixtures::bare_options()).unwrap();

    let id = first.stack("network").unwrap().emission_order[1].clone();
    let suffix = id.rsplit('_').next().unwrap();
    assert_eq!(suffix.len(), 8);
    assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    assert_eq!(second.stack("network").unwrap().emission_order[1], id);
}

#[test]
fn test_logical_id_override() {
    let app = parse(
        r#"{"stacks": [{"name": "dev", "elements": [
            {"kind": "resource", "type": "aws_vpc", "id": "main", "scope": "net", "logical_id": "core_vpc"},
            {"kind": "output", "id": "vpc", "value": {"$ref": "net/aws_vpc.main.id"}}
        ]}]}"#,
    );
    let result = synthesize(app.build().unwrap(), fixtures::bare_options()).unwrap();
    let doc = result.stack("dev").unwrap();
    assert_eq!(doc.emission_order, vec!["aws_vpc.core_vpc", "output.vpc"]);
    assert_eq!(doc.get("output.vpc.value").unwrap(), "${aws_vpc.core_vpc.id}");
}

#[test]
fn test_unknown_reference() {
    let app = parse(
        r#"{"stacks": [{"name": "dev", "elements": [
            {"kind": "resource", "type": "aws_subnet", "id": "a",
             "properties": {"vpcId": {"$ref": "aws_vpc.missing.id"}}}
        ]}]}"#,
    );
    match app.build().unwrap_err() {
        AppFileError::Synth(err) => {
            assert!(matches!(err, SynthError::InvalidPropertyReference { .. }));
            assert_eq!(err.to_report().code, ErrorCode::InvalidPropertyReference);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_undeclared_attribute() {
    let app = parse(
        r#"{"stacks": [{"name": "dev", "elements": [
            {"kind": "resource", "type": "aws_vpc", "id": "main", "properties": {"cidrBlock": "10.0.0.0/16"}},
            {"kind": "resource", "type": "aws_subnet", "id": "a",
             "properties": {"vpcId": {"$ref": "aws_vpc.main.arn"}}}
        ]}]}"#,
    );
    let err = synthesize(app.build().unwrap(), fixtures::bare_options()).unwrap_err();
    match err {
        SynthError::InvalidPropertyReference { from, reason, .. } => {
            assert_eq!(from, "dev/a");
            assert!(reason.contains("arn"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_computed_attribute_can_be_referenced() {
    let app = parse(
        r#"{"stacks": [{"name": "dev", "elements": [
            {"kind": "resource", "type": "aws_vpc", "id": "main", "computed": ["arn"]},
            {"kind": "output", "id": "arn", "value": {"$ref": "aws_vpc.main.arn"}}
        ]}]}"#,
    );
    let result = synthesize(app.build().unwrap(), fixtures::bare_options()).unwrap();
    assert_eq!(result.stack("dev").unwrap().get("output.arn.value").unwrap(), "${aws_vpc.main.arn}");
}

#[test]
fn test_duplicate_sibling() {
    let app = parse(
        r#"{"stacks": [{"name": "dev", "elements": [
            {"kind": "resource", "type": "aws_vpc", "id": "main"},
            {"kind": "resource", "type": "aws_vpc", "id": "main"}
        ]}]}"#,
    );
    let err = app.build().unwrap_err();
    assert!(matches!(err, AppFileError::Synth(SynthError::DuplicateIdentifier { .. })));
}

#[test]
fn test_same_id_different_kinds_is_allowed() {
    let app = parse(
        r#"{"stacks": [{"name": "dev", "elements": [
            {"kind": "variable", "id": "region"},
            {"kind": "output", "id": "region", "value": {"$ref": "var.region"}}
        ]}]}"#,
    );
    let result = synthesize(app.build().unwrap(), fixtures::bare_options()).unwrap();
    assert_eq!(result.stack("dev").unwrap().get("output.region.value").unwrap(), "${var.region}");
}

#[test]
fn test_colliding_logical_ids() {
    let app = parse(
        r#"{"stacks": [{"name": "dev", "elements": [
            {"kind": "resource", "type": "aws_vpc", "id": "a", "logical_id": "shared"},
            {"kind": "resource", "type": "aws_vpc", "id": "b", "logical_id": "shared"}
        ]}]}"#,
    );
    let err = synthesize(app.build().unwrap(), fixtures::bare_options()).unwrap_err();
    assert_eq!(
        err,
        SynthError::DuplicateIdentifier {
            scope: "dev".into(),
            type_name: "aws_vpc".into(),
            id: "shared".into()
        }
    );
    assert_eq!(err.code(), ErrorCode::DuplicateIdentifier);
}

#[test]
fn test_ambiguous_reference_needs_scope() {
    let app = parse(
        r#"{"stacks": [{"name": "dev", "elements": [
            {"kind": "resource", "type": "aws_vpc", "id": "main", "scope": "east"},
            {"kind": "resource", "type": "aws_vpc", "id": "main", "scope": "west"},
            {"kind": "output", "id": "vpc", "value": {"$ref": "aws_vpc.main.id"}}
        ]}]}"#,
    );
    match app.build().unwrap_err() {
        AppFileError::Synth(SynthError::InvalidPropertyReference { reason, .. }) => {
            assert!(reason.contains("several scopes"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_invalid_stack_name() {
    let app = parse(r#"{"stacks": [{"name": "1st"}]}"#);
    let err = app.build().unwrap_err();
    assert!(matches!(err, AppFileError::Synth(SynthError::InvalidIdentifier { .. })));
}

#[test]
fn test_override_needs_value_or_remove() {
    let app = parse(
        r#"{"stacks": [{"name": "dev", "elements": [
            {"kind": "resource", "type": "aws_vpc", "id": "main",
             "overrides": [{"path": "tags", "value": {"a": 1}, "remove": true}]}
        ]}]}"#,
    );
    assert!(matches!(app.build().unwrap_err(), AppFileError::Invalid(_)));
}

#[test]
fn test_remove_override_from_file() {
    let app = parse(
        r#"{"stacks": [{"name": "dev", "elements": [
            {"kind": "resource", "type": "aws_vpc", "id": "main",
             "properties": {"cidrBlock": "10.0.0.0/16", "enableDnsSupport": true},
             "overrides": [{"path": "enable_dns_support", "remove": true}]}
        ]}]}"#,
    );
    let result = synthesize(app.build().unwrap(), fixtures::bare_options()).unwrap();
    assert_eq!(
        result.stack("dev").unwrap().get("resource.aws_vpc.main").unwrap(),
        &json!({"cidr_block": "10.0.0.0/16"})
    );
}

#[test]
fn test_missing_file() {
    let temp = TempDir::new().unwrap();
    let err = AppFile::from_path(&temp.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, AppFileError::Io { .. }));
}

#[test]
fn test_malformed_toml() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("app.toml");
    fs::write(&path, "[[stacks]\nname = ").unwrap();
    assert!(matches!(AppFile::from_path(&path).unwrap_err(), AppFileError::Parse(_)));
}

#[test]
fn test_reference_into_map_local() {
    let app = parse(
        r#"{"stacks": [{"name": "dev", "elements": [
            {"kind": "local", "id": "tags", "value": {"$map": {"CostCenter": "42", "Owner": {"TeamName": "core"}}}},
            {"kind": "output", "id": "cost", "value": {"$ref": "local.tags.CostCenter"}},
            {"kind": "output", "id": "team", "value": {"$ref": "local.tags.Owner.TeamName"}}
        ]}]}"#,
    );
    let result = synthesize(app.build().unwrap(), fixtures::bare_options()).unwrap();
    let doc = result.stack("dev").unwrap();
    assert_eq!(
        doc.get("locals.tags").unwrap(),
        &json!({"CostCenter": "42", "Owner": {"TeamName": "core"}})
    );
    assert_eq!(doc.get("output.cost.value").unwrap(), "${local.tags.CostCenter}");
    assert_eq!(doc.get("output.team.value").unwrap(), "${local.tags.Owner.TeamName}");
}
