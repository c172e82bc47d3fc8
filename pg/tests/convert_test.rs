//! End-to-end tests: schema file + JSON-lines file → mutation groups

use std::fs;

use protograph::sink::{CollectSink, JsonLinesSink};
use protograph::{MutationGroup, MutationStatement, Pipeline, RecordStream, Schema, Value};
use tempfile::TempDir;

const SCHEMA: &str = r#"
- label: Sample
  gid: "{{id}}"

- label: Individual
  gid: "individual:{{id}}"
  actions:
    - field: samples
      embedded_edges:
        edge_label: hasSample
        embedded_in: id
    - field: aliases
      join_list:
        delimiter: "|"
    - field: parent
      single_edge:
        edge_label: childOf
"#;

const INPUT: &str = r##"{"#label":"Sample","id":"S1","age":42}
{"#label":"Individual","id":"I1","aliases":["a","b"],"samples":[{"id":"S1"},{"id":"S2"}],"parent":"I0"}
this line is not json
{"#label":"Mystery","id":"M1"}
{"#label":"Individual","id":"I2","aliases":"solo"}
"##;

fn write_fixtures(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
    let schema = dir.path().join("schema.yml");
    let input = dir.path().join("input.jsonl");
    fs::write(&schema, SCHEMA).expect("Failed to write schema");
    fs::write(&input, INPUT).expect("Failed to write input");
    (schema, input)
}

#[tokio::test]
async fn test_convert_file_end_to_end() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (schema_path, input_path) = write_fixtures(&temp_dir);

    let schema = Schema::load(&schema_path).expect("Failed to load schema");
    let stream = RecordStream::open(&input_path, protograph::DEFAULT_BUFFER_CAPACITY)
        .await
        .expect("Failed to open input");

    let mut sink = CollectSink::new();
    let stats = Pipeline::new(&schema).run(stream, &mut sink).await.expect("Pipeline failed");

    assert_eq!(stats.lines, 5);
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.records, 4);
    assert_eq!(stats.rejected, 1);
    // parent (unimplemented) on I1 and the non-list aliases on I2
    assert_eq!(stats.skipped_fields, 2);

    let groups = &sink.groups;
    assert_eq!(groups.len(), 5);

    // Sample: vertex then properties in record order
    assert_eq!(
        groups[0].query,
        vec![
            MutationStatement::AddVertex("S1".to_string()),
            MutationStatement::Property([("id".to_string(), Value::from("S1"))].into()),
            MutationStatement::Property([("age".to_string(), Value::Number(42.0))].into()),
        ]
    );

    // Individual: vertex group first, then one edge group per embedded sample
    assert_eq!(groups[1].vertex_id(), Some("individual:I1"));
    assert_eq!(groups[1].property("aliases"), Some(&Value::from("a|b")));
    assert_eq!(groups[1].property("parent"), None);
    assert_eq!(groups[1].property("samples"), None);
    assert_eq!(groups[2], MutationGroup::create_edge("individual:I1", "hasSample", "S1"));
    assert_eq!(groups[3], MutationGroup::create_edge("individual:I1", "hasSample", "S2"));

    assert_eq!(groups[4].vertex_id(), Some("individual:I2"));
    assert_eq!(groups[4].property("aliases"), None);
}

#[tokio::test]
async fn test_every_resolvable_record_starts_with_vertex() {
    let schema = Schema::from_yaml(SCHEMA).expect("Failed to parse schema");
    let input: String = (0..200)
        .map(|i| {
            if i % 2 == 0 {
                format!("{{\"#label\":\"Sample\",\"id\":\"S{}\"}}\n", i)
            } else {
                format!("{{\"#label\":\"Individual\",\"id\":\"I{}\",\"samples\":[{{\"id\":\"S{}\"}}]}}\n", i, i - 1)
            }
        })
        .collect();

    let stream = RecordStream::spawn(std::io::Cursor::new(input.into_bytes()), 4);
    let mut sink = CollectSink::new();
    let stats = Pipeline::new(&schema).run(stream, &mut sink).await.expect("Pipeline failed");

    assert_eq!(stats.records, 200);
    assert_eq!(stats.groups, 300);

    // Output order follows input order
    let vertex_ids: Vec<&str> = sink.groups.iter().filter_map(MutationGroup::vertex_id).collect();
    let expected: Vec<String> = (0..200)
        .map(|i| {
            if i % 2 == 0 {
                format!("S{}", i)
            } else {
                format!("individual:I{}", i)
            }
        })
        .collect();
    assert_eq!(vertex_ids, expected);
}

#[tokio::test]
async fn test_json_lines_output() {
    let schema = Schema::from_yaml(SCHEMA).expect("Failed to parse schema");
    let stream = RecordStream::spawn(
        std::io::Cursor::new(b"{\"#label\":\"Sample\",\"id\":\"S1\",\"age\":42}\n".to_vec()),
        10,
    );

    let mut sink = JsonLinesSink::new(Vec::new());
    Pipeline::new(&schema).run(stream, &mut sink).await.expect("Pipeline failed");

    let out = String::from_utf8(sink.into_inner()).expect("Output is not UTF-8");
    assert_eq!(
        out,
        "{\"query\":[{\"addV\":\"S1\"},{\"property\":{\"id\":\"S1\"}},{\"property\":{\"age\":42}}]}\n"
    );
}
